//! Projection contract, geometry stream protocol and the projection registry.

pub mod builtin;
pub mod clip;
pub mod projection;
pub mod raw;
pub mod registry;
pub mod stream;

pub use builtin::{BuiltinProjection, Family, register_builtin_projections};
pub use clip::ClipRectStream;
pub use projection::*;
pub use registry::*;
pub use stream::*;
