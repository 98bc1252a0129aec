//! Composite projections: one projection-shaped object assembled from
//! per-territory projections described by a configuration document.

pub mod builder;
pub mod engine;
pub mod loader;

pub use builder::build_sub_projection;
pub use engine::{CompositeProjection, Routed, SubProjection};
pub use formats::{CompositeConfig, ConfigError, validate_config};
pub use loader::*;
