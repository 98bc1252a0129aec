pub mod config;
pub mod geojson;
pub mod validate;

pub use config::*;
pub use geojson::*;
pub use validate::*;
