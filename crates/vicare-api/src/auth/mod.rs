// OAuth2 + PKCE authentication
//
// `TokenManager` is the only mutable shared state in the client stack.
// Storage and time are injected through `TokenStore` and `Clock`.

mod manager;
mod pkce;
mod token;

pub use manager::{AuthState, OAuthConfig, REFRESH_BUFFER_SECS, TokenManager};
pub use pkce::PkcePair;
pub use token::{Clock, FileTokenStore, MemoryTokenStore, SystemClock, Token, TokenStore};
