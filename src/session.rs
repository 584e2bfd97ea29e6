use tower_sessions::{cookie::SameSite, Expiry, MemoryStore, SessionManagerLayer};

use crate::Config;

pub const USER_ID: &str = "user_id";
pub const CSRF_STATE: &str = "csrf_state";
pub const PKCE_VERIFIER: &str = "pkce_verifier";
pub const RETURN_URL: &str = "return_url";

/// The cookie session shared by the HTTP routes and the websocket handshake.
pub fn layer(config: &Config) -> SessionManagerLayer<MemoryStore> {
    let same_site = if config.is_production() {
        SameSite::None
    } else {
        SameSite::Lax
    };

    SessionManagerLayer::new(MemoryStore::default())
        .with_secure(config.is_production())
        .with_same_site(same_site)
        .with_expiry(Expiry::OnInactivity(time::Duration::milliseconds(config.cookie_max_age_ms)))
}
