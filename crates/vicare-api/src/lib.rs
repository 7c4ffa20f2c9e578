// vicare-api: Async Rust client for the ViCare IoT cloud API
//
// Owns everything that touches the wire: the OAuth2 + PKCE token
// lifecycle, the authenticated HTTP client, and the raw JSON shapes the
// API hands back. Flattening and validation live in `vicare-core`.

pub mod auth;
pub mod client;
pub mod error;
pub mod models;
pub mod redact;
pub mod transport;

pub use auth::{
    AuthState, Clock, FileTokenStore, MemoryTokenStore, OAuthConfig, PkcePair, SystemClock,
    Token, TokenManager, TokenStore,
};
pub use client::ViClient;
pub use error::Error;
pub use models::{
    CommandResponse, DeviceInfo, GatewayInfo, InstallationInfo, RawCommand, RawFeature,
};
pub use transport::{TlsMode, TransportConfig};
