//! The projection contract shared by built-in families, user plugins and
//! composite projections.
//!
//! Every knob besides the forward transform is optional. Callers check
//! [`Projection::supports`] before using a setter; setters on unsupported
//! capabilities leave the projection untouched.

use std::fmt;

use foundation::Aabb2;

use crate::stream::GeoStream;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Capability {
    Center,
    Rotate,
    Parallels,
    Scale,
    Translate,
    ClipExtent,
    ClipAngle,
    Precision,
    Invert,
}

impl Capability {
    pub fn as_str(self) -> &'static str {
        match self {
            Capability::Center => "center",
            Capability::Rotate => "rotate",
            Capability::Parallels => "parallels",
            Capability::Scale => "scale",
            Capability::Translate => "translate",
            Capability::ClipExtent => "clipExtent",
            Capability::ClipAngle => "clipAngle",
            Capability::Precision => "precision",
            Capability::Invert => "invert",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProjectionError {
    Unsupported(Capability),
    /// The input has no image under this projection (e.g. a pole under Mercator).
    OutOfDomain,
    /// The pixel lies outside the projection's clip extent.
    OutsideClipExtent,
    NonFinite,
}

impl fmt::Display for ProjectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProjectionError::Unsupported(cap) => write!(f, "projection does not support {cap}"),
            ProjectionError::OutOfDomain => write!(f, "coordinate outside projection domain"),
            ProjectionError::OutsideClipExtent => write!(f, "pixel outside clip extent"),
            ProjectionError::NonFinite => write!(f, "non-finite coordinate"),
        }
    }
}

impl std::error::Error for ProjectionError {}

pub trait Projection: Send + Sync {
    /// Geographic degrees `(lon, lat)` to pixels. `None` when the point has no image.
    fn project(&self, lon: f64, lat: f64) -> Option<[f64; 2]>;

    /// Pixels to geographic degrees.
    fn invert(&self, _x: f64, _y: f64) -> Result<[f64; 2], ProjectionError> {
        Err(ProjectionError::Unsupported(Capability::Invert))
    }

    /// Wraps `sink` so that geographic events written to the returned stream
    /// arrive at `sink` in pixel space.
    fn stream<'a>(&'a self, sink: Box<dyn GeoStream + 'a>) -> Box<dyn GeoStream + 'a> {
        Box::new(PointTransformStream::new(self, sink))
    }

    fn supports(&self, _capability: Capability) -> bool {
        false
    }

    fn center(&self) -> Option<[f64; 2]> {
        None
    }
    fn set_center(&mut self, _center: [f64; 2]) {}

    fn rotate(&self) -> Option<[f64; 3]> {
        None
    }
    fn set_rotate(&mut self, _angles: [f64; 3]) {}

    fn parallels(&self) -> Option<[f64; 2]> {
        None
    }
    fn set_parallels(&mut self, _parallels: [f64; 2]) {}

    fn scale(&self) -> Option<f64> {
        None
    }
    fn set_scale(&mut self, _scale: f64) {}

    fn translate(&self) -> Option<[f64; 2]> {
        None
    }
    fn set_translate(&mut self, _translate: [f64; 2]) {}

    fn clip_extent(&self) -> Option<Aabb2> {
        None
    }
    fn set_clip_extent(&mut self, _extent: Option<Aabb2>) {}

    fn clip_angle(&self) -> Option<f64> {
        None
    }
    fn set_clip_angle(&mut self, _angle: Option<f64>) {}

    fn precision(&self) -> Option<f64> {
        None
    }
    fn set_precision(&mut self, _precision: f64) {}
}

/// Stream stage used by projections without a dedicated pipeline: each point
/// goes through [`Projection::project`] and points without an image are dropped.
pub struct PointTransformStream<'a, P: ?Sized> {
    projection: &'a P,
    sink: Box<dyn GeoStream + 'a>,
}

impl<'a, P: Projection + ?Sized> PointTransformStream<'a, P> {
    pub fn new(projection: &'a P, sink: Box<dyn GeoStream + 'a>) -> Self {
        Self { projection, sink }
    }
}

impl<P: Projection + ?Sized> GeoStream for PointTransformStream<'_, P> {
    fn point(&mut self, x: f64, y: f64) {
        if let Some([px, py]) = self.projection.project(x, y) {
            self.sink.point(px, py);
        }
    }
    fn line_start(&mut self) {
        self.sink.line_start()
    }
    fn line_end(&mut self) {
        self.sink.line_end()
    }
    fn polygon_start(&mut self) {
        self.sink.polygon_start()
    }
    fn polygon_end(&mut self) {
        self.sink.polygon_end()
    }
    fn sphere(&mut self) {
        self.sink.sphere()
    }
}

/// Forward transform through the projection's own stream, so the result
/// honours whatever clipping the stream applies.
pub fn project_through_stream<P: Projection + ?Sized>(
    projection: &P,
    lon: f64,
    lat: f64,
) -> Option<[f64; 2]> {
    let mut capture = crate::stream::PointCapture::new();
    {
        let mut stream = projection.stream(Box::new(&mut capture));
        stream.point(lon, lat);
    }
    capture.get()
}
