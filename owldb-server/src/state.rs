//! Shared application state handed to every axum handler via `State`.

use owldb_storage::schema::Schema;
use owldb_storage::store::system::System;
use owldb_storage::subscription::SubscriptionRegistry;
use owldb_storage::token::TokenTable;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub system: Arc<System>,
    pub tokens: Arc<TokenTable>,
    pub subscriptions: Arc<SubscriptionRegistry>,
    pub schema: Arc<Schema>,
}

impl AppState {
    pub fn new(schema: Schema) -> Self {
        AppState {
            system: Arc::new(System::new()),
            tokens: Arc::new(TokenTable::new()),
            subscriptions: Arc::new(SubscriptionRegistry::new()),
            schema: Arc::new(schema),
        }
    }
}
