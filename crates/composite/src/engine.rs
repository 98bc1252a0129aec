//! Composite projection: several territory projections behind one
//! projection-shaped object.
//!
//! Forward transforms route by geographic bounds. Streams are fanned out to
//! every territory and rely on each territory's clip rectangle to drop what
//! it does not own.

use std::fmt;

use foundation::GeoBounds;
use projection::{
    Capability, GeoStream, MultiplexStream, Projection, ProjectionError, SharedSink,
    project_through_stream,
};

/// One territory's slot in a composite projection.
pub struct SubProjection {
    pub code: String,
    pub bounds: GeoBounds,
    pub projection: Box<dyn Projection>,
}

impl fmt::Debug for SubProjection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubProjection")
            .field("code", &self.code)
            .field("bounds", &self.bounds)
            .field("scale", &self.projection.scale())
            .field("translate", &self.projection.translate())
            .finish()
    }
}

/// Immutable after construction; every call is independent, so one instance
/// can serve concurrent readers.
#[derive(Debug)]
pub struct CompositeProjection {
    territories: Vec<SubProjection>,
    width: f64,
    height: f64,
    debug: bool,
}

impl CompositeProjection {
    /// `territories` must be non-empty and in configuration order.
    pub fn new(territories: Vec<SubProjection>, width: f64, height: f64, debug: bool) -> Self {
        debug_assert!(!territories.is_empty());
        Self {
            territories,
            width,
            height,
            debug,
        }
    }

    pub fn territories(&self) -> &[SubProjection] {
        &self.territories
    }

    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.territories.iter().map(|t| t.code.as_str())
    }

    pub fn sub_projection(&self, code: &str) -> Option<&dyn Projection> {
        self.territories
            .iter()
            .find(|t| t.code == code)
            .map(|t| t.projection.as_ref())
    }

    /// First territory whose bounds contain the point (edges inclusive).
    pub fn route(&self, lon: f64, lat: f64) -> Option<&SubProjection> {
        self.territories.iter().find(|t| t.bounds.contains(lon, lat))
    }

    pub fn canvas_size(&self) -> [f64; 2] {
        [self.width, self.height]
    }

    /// Forward transform that also reports which territory answered.
    ///
    /// `fallback` is set when the first territory answered because no bounds
    /// matched or the owning territory had no image for the point.
    pub fn project_routed(&self, lon: f64, lat: f64) -> Option<Routed<'_>> {
        if let Some(owner) = self.route(lon, lat) {
            if let Some(point) = project_through_stream(owner.projection.as_ref(), lon, lat) {
                return Some(Routed {
                    territory: owner,
                    point,
                    fallback: false,
                });
            }
        }
        let first = self.territories.first()?;
        let point = project_through_stream(first.projection.as_ref(), lon, lat)?;
        Some(Routed {
            territory: first,
            point,
            fallback: true,
        })
    }
}

#[derive(Debug)]
pub struct Routed<'a> {
    pub territory: &'a SubProjection,
    pub point: [f64; 2],
    pub fallback: bool,
}

impl Projection for CompositeProjection {
    /// Projects with the owning territory, falling back to the first
    /// territory when no bounds match or the owner has no image for the point.
    fn project(&self, lon: f64, lat: f64) -> Option<[f64; 2]> {
        self.project_routed(lon, lat).map(|r| r.point)
    }

    /// Tries each territory in order; failures are skipped.
    fn invert(&self, x: f64, y: f64) -> Result<[f64; 2], ProjectionError> {
        let mut any_invertible = false;
        for t in &self.territories {
            match t.projection.invert(x, y) {
                Ok([lon, lat]) if lon.is_finite() && lat.is_finite() => return Ok([lon, lat]),
                Ok(_) => {
                    any_invertible = true;
                    if self.debug {
                        tracing::debug!(territory = %t.code, x, y, "inversion produced non-finite result");
                    }
                }
                Err(ProjectionError::Unsupported(_)) => {}
                Err(e) => {
                    any_invertible = true;
                    if self.debug {
                        tracing::debug!(territory = %t.code, x, y, error = %e, "inversion failed");
                    }
                }
            }
        }
        if any_invertible {
            Err(ProjectionError::OutOfDomain)
        } else {
            Err(ProjectionError::Unsupported(Capability::Invert))
        }
    }

    /// Every event reaches every territory's stream, in territory order.
    fn stream<'a>(&'a self, sink: Box<dyn GeoStream + 'a>) -> Box<dyn GeoStream + 'a> {
        let shared = SharedSink::new(sink);
        let streams = self
            .territories
            .iter()
            .map(|t| t.projection.stream(Box::new(shared.clone())))
            .collect();
        Box::new(MultiplexStream::new(streams))
    }

    fn supports(&self, capability: Capability) -> bool {
        matches!(capability, Capability::Invert)
    }

    /// Reference value only: the first territory's scale.
    fn scale(&self) -> Option<f64> {
        Some(
            self.territories
                .first()
                .and_then(|t| t.projection.scale())
                .unwrap_or(1.0),
        )
    }

    /// Does nothing. Each territory owns its scale; rebuild from an edited
    /// configuration to change it.
    fn set_scale(&mut self, _scale: f64) {}

    /// Reference value only: the canvas center.
    fn translate(&self) -> Option<[f64; 2]> {
        Some([self.width / 2.0, self.height / 2.0])
    }

    /// Does nothing, like [`CompositeProjection::set_scale`].
    fn set_translate(&mut self, _translate: [f64; 2]) {}
}
