// vicare-core: Flat feature layer between vicare-api and applications.
//
// Raw nested resources go in; flat, uniformly typed features come out.
// Writes travel the other way: a flat feature plus a new value resolve
// back into one locally validated command invocation.

pub mod config;
pub mod constraint;
pub mod error;
pub mod expand;
pub mod model;
pub mod resolve;
pub mod session;
pub mod snapshot;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::ClientConfig;
pub use constraint::{ParamConstraint, Pattern, validate};
pub use error::{CoreError, ValidationError, Violation};
pub use expand::{expand, is_valid_feature_name};
pub use resolve::{WriteRequest, resolve_command, resolve_write};
pub use session::Session;
pub use snapshot::{Device, Gateway, Installation};

pub use model::{CommandSpec, Feature, FeatureControl, FeatureValue, ParamSpec, Resource};

pub use vicare_api::CommandResponse;
