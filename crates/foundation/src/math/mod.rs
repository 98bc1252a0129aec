pub mod rotation;
pub mod vec;

pub use rotation::*;
pub use vec::*;

/// Angles smaller than this are treated as zero by the projection math.
pub const EPSILON: f64 = 1e-6;
