//! Bearer-token authentication table.
//!
//! Grounded on `database/authentication/authentication.go`: tokens are 12
//! random bytes, standard base64 encoded, with `/` and `\` swapped for
//! `-` so the token is URL-safe without needing the base64-URL alphabet.
//! Built on the same [`crate::skiplist::SkipList`] everything else here
//! uses.

use crate::skiplist::SkipList;
use owldb_core::{now_ms, Error, Result, Timestamp};
use rand::RngCore;

const TOKEN_BYTES: usize = 12;
const TOKEN_TTL_MS: i64 = 60 * 60 * 1000;
/// Bulk-preloaded tokens get a 24h lifetime instead of the usual 1h, per
/// the original's `UnexpiredToken` (there expressed as `StartTime = now +
/// 23h` checked against a 1h window; here expressed directly as an
/// `expires_at` 24h out, which is equivalent and doesn't require reasoning
/// about a negative elapsed time).
const PRELOAD_TTL_MS: i64 = 24 * 60 * 60 * 1000;

struct UserRecord {
    username: String,
    expires_at: Timestamp,
}

/// A table mapping bearer tokens to the user that issued them.
pub struct TokenTable {
    records: SkipList<String, UserRecord>,
}

impl Default for TokenTable {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenTable {
    pub fn new() -> Self {
        TokenTable {
            records: SkipList::new(),
        }
    }

    /// Issues a fresh token for `username`, retrying on the (astronomically
    /// unlikely) event of a collision with an existing token.
    pub fn issue(&self, username: &str) -> Result<String> {
        if username.is_empty() {
            return Err(Error::BadRequest("no username in request body".into()));
        }
        loop {
            let token = generate_name();
            let record = UserRecord {
                username: username.to_string(),
                expires_at: now_ms() + TOKEN_TTL_MS,
            };
            let mut record = Some(record);
            let inserted = self.records.upsert(token.clone(), |_, _, exists| {
                if exists {
                    Err(Error::Internal("token collision".into()))
                } else {
                    Ok(record.take().expect("resolve called once on insert"))
                }
            });
            match inserted {
                Ok(_) => return Ok(token),
                Err(_) => continue,
            }
        }
    }

    /// Preloads `username -> token` pairs (e.g. from a startup token file),
    /// backdating their issue time so they are valid for 24h instead of 1h.
    pub fn preload(&self, username: &str, token: &str) {
        let record = UserRecord {
            username: username.to_string(),
            expires_at: now_ms() + PRELOAD_TTL_MS,
        };
        let mut record = Some(record);
        let _ = self.records.upsert(token.to_string(), |_, _, exists| {
            if exists {
                Err(Error::Internal("token collision".into()))
            } else {
                Ok(record.take().expect("resolve called once on insert"))
            }
        });
    }

    /// Returns the username for `token`, or `None` if absent or expired.
    /// An expired token is deleted as a side effect.
    pub fn check(&self, token: &str) -> Option<String> {
        let token_key = token.to_string();
        let record = self.records.find(&token_key)?;
        let val = record.value();
        if now_ms() > val.expires_at {
            self.records.delete(&token_key);
            return None;
        }
        Some(val.username.clone())
    }

    /// Revokes `token`. Returns `true` if it existed.
    pub fn revoke(&self, token: &str) -> bool {
        self.records.delete(&token.to_string()).is_some()
    }
}

/// Generates a random, URL-safe identifier: 12 random bytes, standard
/// base64 encoded, with `/` and `\` swapped for `-`. Used both for bearer
/// tokens here and for server-generated document names in
/// `store::collection::Collection::post`, matching the original's reuse of
/// the same scheme for both (`RandString` in the Go source).
pub(crate) fn generate_name() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    use base64::Engine;
    let token = base64::engine::general_purpose::STANDARD.encode(bytes);
    token.replace('/', "-").replace('\\', "-")
}
