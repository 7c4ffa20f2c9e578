// ── Feature domain model ──
//
// `Resource` is the parsed nested form; `Feature` is the flat form
// applications consume. `expand` turns one into the other.

pub mod feature;
pub mod resource;
pub mod value;

pub use feature::{Feature, FeatureControl};
pub use resource::{CommandSpec, ParamSpec, Resource};
pub use value::FeatureValue;
