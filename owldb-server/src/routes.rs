//! Route table: `/auth` for token issuance/revocation and `/v1/*path` for
//! the document store, mirroring `system.go`'s two `mux.HandleFunc`
//! registrations.

use crate::auth_endpoint::{issue_token, revoke_token};
use crate::handlers::{dispatch_delete, dispatch_get, dispatch_patch, dispatch_post, dispatch_put, options_handler};
use crate::state::AppState;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route(
            "/auth",
            post(issue_token).delete(revoke_token).options(options_handler),
        )
        .route(
            "/v1/*path",
            get(dispatch_get)
                .put(dispatch_put)
                .delete(dispatch_delete)
                .post(dispatch_post)
                .patch(dispatch_patch)
                .options(options_handler),
        )
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
