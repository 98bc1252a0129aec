//! Built-in projection families, configured and streamed the way d3-geo
//! projections are.
//!
//! Stream pipeline: degrees -> rotation -> clip-angle visibility -> raw
//! projection -> scale/center/translate -> adaptive resampling -> optional
//! rectangle clip -> sink.

use std::fmt;

use foundation::Aabb2;
use foundation::math::{SphericalRotation, Vec3};

use crate::clip::ClipRectStream;
use crate::projection::{Capability, Projection, ProjectionError};
use crate::raw::{
    AzimuthalEqualAreaRaw, ConicConformalRaw, ConicEqualAreaRaw, MercatorRaw, RawProjection,
};
use crate::registry::ProjectionRegistry;
use crate::stream::GeoStream;

const DEFAULT_TRANSLATE: [f64; 2] = [480.0, 250.0];
const MAX_RESAMPLE_DEPTH: u32 = 16;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Family {
    Mercator,
    ConicConformal,
    ConicEqualArea,
    AzimuthalEqualArea,
}

impl Family {
    pub const ALL: [Family; 4] = [
        Family::Mercator,
        Family::ConicConformal,
        Family::ConicEqualArea,
        Family::AzimuthalEqualArea,
    ];

    /// Registry id.
    pub fn id(self) -> &'static str {
        match self {
            Family::Mercator => "mercator",
            Family::ConicConformal => "conic-conformal",
            Family::ConicEqualArea => "conic-equal-area",
            Family::AzimuthalEqualArea => "azimuthal-equal-area",
        }
    }

    pub fn from_id(id: &str) -> Option<Family> {
        Family::ALL.into_iter().find(|f| f.id() == id)
    }

    fn is_conic(self) -> bool {
        matches!(self, Family::ConicConformal | Family::ConicEqualArea)
    }

    fn default_scale(self) -> f64 {
        match self {
            Family::Mercator => 961.0 / std::f64::consts::TAU,
            Family::ConicConformal => 109.5,
            Family::ConicEqualArea => 155.424,
            Family::AzimuthalEqualArea => 124.75,
        }
    }

    fn default_parallels(self) -> [f64; 2] {
        match self {
            Family::ConicConformal => [30.0, 30.0],
            _ => [0.0, 60.0],
        }
    }

    fn default_center(self) -> [f64; 2] {
        match self {
            Family::ConicEqualArea => [0.0, 33.6442],
            _ => [0.0, 0.0],
        }
    }

    fn default_clip_angle(self) -> Option<f64> {
        match self {
            Family::AzimuthalEqualArea => Some(180.0 - 1e-3),
            _ => None,
        }
    }

    fn raw(self, parallels: [f64; 2]) -> Box<dyn RawProjection> {
        let (p0, p1) = (parallels[0].to_radians(), parallels[1].to_radians());
        match self {
            Family::Mercator => Box::new(MercatorRaw),
            Family::ConicConformal => ConicConformalRaw::with_parallels(p0, p1),
            Family::ConicEqualArea => ConicEqualAreaRaw::with_parallels(p0, p1),
            Family::AzimuthalEqualArea => Box::new(AzimuthalEqualAreaRaw),
        }
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

#[derive(Debug)]
pub struct BuiltinProjection {
    family: Family,
    raw: Box<dyn RawProjection>,
    rotate: [f64; 3],
    rotation: SphericalRotation,
    center: [f64; 2],
    parallels: [f64; 2],
    scale: f64,
    translate: [f64; 2],
    clip_extent: Option<Aabb2>,
    clip_angle: Option<f64>,
    cos_clip_angle: f64,
    precision: f64,
    // Pixel offset of the raw origin, derived from center/scale/translate.
    dx: f64,
    dy: f64,
}

impl BuiltinProjection {
    pub fn new(family: Family) -> Self {
        let parallels = family.default_parallels();
        let mut p = Self {
            family,
            raw: family.raw(parallels),
            rotate: [0.0, 0.0, 0.0],
            rotation: SphericalRotation::identity(),
            center: family.default_center(),
            parallels,
            scale: family.default_scale(),
            translate: DEFAULT_TRANSLATE,
            clip_extent: None,
            clip_angle: None,
            cos_clip_angle: -1.0,
            precision: 0.5_f64.sqrt(),
            dx: 0.0,
            dy: 0.0,
        };
        p.set_clip_angle(family.default_clip_angle());
        p.recenter();
        p
    }

    pub fn family(&self) -> Family {
        self.family
    }

    fn recenter(&mut self) {
        let (cx, cy) = self
            .raw
            .forward(self.center[0].to_radians(), self.center[1].to_radians())
            .unwrap_or((0.0, 0.0));
        self.dx = self.translate[0] - cx * self.scale;
        self.dy = self.translate[1] + cy * self.scale;
    }

    fn visible(&self, lambda: f64, phi: f64) -> bool {
        self.clip_angle.is_none() || lambda.cos() * phi.cos() > self.cos_clip_angle
    }

    /// Rotated radians to pixels.
    fn to_pixels(&self, lambda: f64, phi: f64) -> Option<[f64; 2]> {
        let (x, y) = self.raw.forward(lambda, phi)?;
        Some([x * self.scale + self.dx, self.dy - y * self.scale])
    }
}

impl Projection for BuiltinProjection {
    fn project(&self, lon: f64, lat: f64) -> Option<[f64; 2]> {
        let (lambda, phi) = self.rotation.forward(lon.to_radians(), lat.to_radians());
        if !self.visible(lambda, phi) {
            return None;
        }
        self.to_pixels(lambda, phi)
    }

    fn invert(&self, x: f64, y: f64) -> Result<[f64; 2], ProjectionError> {
        if !x.is_finite() || !y.is_finite() {
            return Err(ProjectionError::NonFinite);
        }
        if let Some(extent) = &self.clip_extent {
            if !extent.contains([x, y]) {
                return Err(ProjectionError::OutsideClipExtent);
            }
        }
        let (lambda, phi) = self
            .raw
            .invert((x - self.dx) / self.scale, (self.dy - y) / self.scale)
            .ok_or(ProjectionError::OutOfDomain)?;
        let (lambda, phi) = self.rotation.invert(lambda, phi);
        Ok([lambda.to_degrees(), phi.to_degrees()])
    }

    fn stream<'a>(&'a self, sink: Box<dyn GeoStream + 'a>) -> Box<dyn GeoStream + 'a> {
        let sink: Box<dyn GeoStream + 'a> = match self.clip_extent {
            Some(extent) => Box::new(ClipRectStream::new(extent, sink)),
            None => sink,
        };
        Box::new(ProjectStream {
            projection: self,
            sink,
            delta2: self.precision * self.precision,
            in_line: false,
            in_polygon: false,
            line_open: false,
            prev: None,
            first: None,
        })
    }

    fn supports(&self, capability: Capability) -> bool {
        match capability {
            Capability::Parallels => self.family.is_conic(),
            _ => true,
        }
    }

    fn center(&self) -> Option<[f64; 2]> {
        Some(self.center)
    }
    fn set_center(&mut self, center: [f64; 2]) {
        self.center = center;
        self.recenter();
    }

    fn rotate(&self) -> Option<[f64; 3]> {
        Some(self.rotate)
    }
    fn set_rotate(&mut self, angles: [f64; 3]) {
        self.rotate = angles;
        self.rotation = SphericalRotation::from_degrees(angles);
        self.recenter();
    }

    fn parallels(&self) -> Option<[f64; 2]> {
        self.family.is_conic().then_some(self.parallels)
    }
    fn set_parallels(&mut self, parallels: [f64; 2]) {
        if !self.family.is_conic() {
            return;
        }
        self.parallels = parallels;
        self.raw = self.family.raw(parallels);
        self.recenter();
    }

    fn scale(&self) -> Option<f64> {
        Some(self.scale)
    }
    fn set_scale(&mut self, scale: f64) {
        self.scale = scale;
        self.recenter();
    }

    fn translate(&self) -> Option<[f64; 2]> {
        Some(self.translate)
    }
    fn set_translate(&mut self, translate: [f64; 2]) {
        self.translate = translate;
        self.recenter();
    }

    fn clip_extent(&self) -> Option<Aabb2> {
        self.clip_extent
    }
    fn set_clip_extent(&mut self, extent: Option<Aabb2>) {
        self.clip_extent = extent;
    }

    fn clip_angle(&self) -> Option<f64> {
        self.clip_angle
    }
    fn set_clip_angle(&mut self, angle: Option<f64>) {
        self.clip_angle = angle.filter(|a| *a > 0.0);
        self.cos_clip_angle = self.clip_angle.map_or(-1.0, |a| a.to_radians().cos());
    }

    fn precision(&self) -> Option<f64> {
        Some(self.precision)
    }
    fn set_precision(&mut self, precision: f64) {
        self.precision = precision.max(0.0);
    }
}

#[derive(Copy, Clone)]
struct Sample {
    v: Vec3,
    p: [f64; 2],
}

struct ProjectStream<'a> {
    projection: &'a BuiltinProjection,
    sink: Box<dyn GeoStream + 'a>,
    delta2: f64,
    in_line: bool,
    in_polygon: bool,
    line_open: bool,
    prev: Option<Sample>,
    first: Option<Sample>,
}

impl ProjectStream<'_> {
    fn break_line(&mut self) {
        if !self.in_polygon && self.line_open {
            self.sink.line_end();
            self.line_open = false;
        }
        if !self.in_polygon {
            self.prev = None;
        }
    }

    /// Emits intermediate points between `a` and `b` (exclusive) until the
    /// projected path deviates from the true curve by less than the precision.
    fn resample(&mut self, a: Sample, b: Sample, depth: u32) {
        if self.delta2 <= 0.0 || depth == 0 {
            return;
        }
        let dx = b.p[0] - a.p[0];
        let dy = b.p[1] - a.p[1];
        let d2 = dx * dx + dy * dy;
        if d2 <= 4.0 * self.delta2 {
            return;
        }
        let mid = a.v + b.v;
        if mid.length() < 1e-12 {
            return;
        }
        let (lambda, phi) = mid.to_lon_lat();
        let Some(pm) = self.projection.to_pixels(lambda, phi) else {
            return;
        };
        let ox = pm[0] - a.p[0];
        let oy = pm[1] - a.p[1];
        let dz = dy * ox - dx * oy;
        let along = (dx * ox + dy * oy) / d2 - 0.5;
        if dz * dz / d2 > self.delta2 || along.abs() > 0.3 {
            let m = Sample {
                v: mid.normalized(),
                p: pm,
            };
            self.resample(a, m, depth - 1);
            self.sink.point(pm[0], pm[1]);
            self.resample(m, b, depth - 1);
        }
    }
}

impl GeoStream for ProjectStream<'_> {
    fn point(&mut self, x: f64, y: f64) {
        let (lambda, phi) = self
            .projection
            .rotation
            .forward(x.to_radians(), y.to_radians());
        let projected = if self.projection.visible(lambda, phi) {
            self.projection.to_pixels(lambda, phi)
        } else {
            None
        };
        let Some(p) = projected else {
            self.break_line();
            return;
        };

        if !self.in_line {
            self.sink.point(p[0], p[1]);
            return;
        }

        let sample = Sample {
            v: Vec3::from_lon_lat(lambda, phi),
            p,
        };
        if !self.in_polygon && !self.line_open {
            self.sink.line_start();
            self.line_open = true;
        }
        if let Some(prev) = self.prev {
            self.resample(prev, sample, MAX_RESAMPLE_DEPTH);
        }
        self.sink.point(p[0], p[1]);
        self.prev = Some(sample);
        if self.first.is_none() {
            self.first = Some(sample);
        }
    }

    fn line_start(&mut self) {
        self.in_line = true;
        self.line_open = false;
        self.prev = None;
        self.first = None;
        if self.in_polygon {
            self.sink.line_start();
        }
    }

    fn line_end(&mut self) {
        if self.in_polygon {
            if let (Some(last), Some(first)) = (self.prev, self.first) {
                self.resample(last, first, MAX_RESAMPLE_DEPTH);
            }
            self.sink.line_end();
        } else if self.line_open {
            self.sink.line_end();
        }
        self.in_line = false;
        self.line_open = false;
        self.prev = None;
        self.first = None;
    }

    fn polygon_start(&mut self) {
        self.in_polygon = true;
        self.sink.polygon_start();
    }

    fn polygon_end(&mut self) {
        self.in_polygon = false;
        self.sink.polygon_end();
    }

    fn sphere(&mut self) {
        self.sink.sphere();
    }
}

pub fn mercator() -> BuiltinProjection {
    BuiltinProjection::new(Family::Mercator)
}

pub fn conic_conformal() -> BuiltinProjection {
    BuiltinProjection::new(Family::ConicConformal)
}

/// Registers every built-in family under its [`Family::id`].
pub fn register_builtin_projections(registry: &mut ProjectionRegistry) {
    for family in Family::ALL {
        registry.register(family.id(), move || {
            Box::new(BuiltinProjection::new(family)) as Box<dyn Projection>
        });
    }
}

#[cfg(test)]
mod tests {
    use super::{
        BuiltinProjection, Family, conic_conformal, mercator, register_builtin_projections,
    };
    use crate::projection::{Capability, Projection, ProjectionError};
    use crate::registry::ProjectionRegistry;
    use crate::stream::{GeoStream, RecordingStream, StreamEvent};
    use foundation::Aabb2;

    fn assert_close(a: f64, b: f64, eps: f64) {
        let diff = (a - b).abs();
        assert!(diff <= eps, "expected {a} ~= {b} (diff {diff})");
    }

    #[test]
    fn center_maps_to_translate() {
        let mut p = mercator();
        p.set_center([-61.46, 16.14]);
        p.set_scale(3780.0);
        p.set_translate([156.0, 212.0]);
        let [x, y] = p.project(-61.46, 16.14).expect("project");
        assert_close(x, 156.0, 1e-9);
        assert_close(y, 212.0, 1e-9);
    }

    #[test]
    fn north_is_up_and_east_is_right() {
        let p = mercator();
        let [x0, y0] = p.project(0.0, 0.0).expect("origin");
        let [x1, y1] = p.project(10.0, 10.0).expect("north east");
        assert!(x1 > x0);
        assert!(y1 < y0);
    }

    #[test]
    fn invert_round_trips_with_rotation() {
        let mut p = conic_conformal();
        p.set_rotate([-3.0, -46.2, 0.0]);
        p.set_parallels([0.0, 60.0]);
        p.set_scale(2700.0);
        let [x, y] = p.project(2.35, 48.85).expect("project");
        let [lon, lat] = p.invert(x, y).expect("invert");
        assert_close(lon, 2.35, 1e-9);
        assert_close(lat, 48.85, 1e-9);
    }

    #[test]
    fn invert_rejects_pixels_outside_clip_extent() {
        let mut p = mercator();
        p.set_clip_extent(Some(Aabb2::new([0.0, 0.0], [100.0, 100.0])));
        assert_eq!(p.invert(150.0, 50.0), Err(ProjectionError::OutsideClipExtent));
        assert_eq!(p.invert(f64::NAN, 50.0), Err(ProjectionError::NonFinite));
    }

    #[test]
    fn parallels_only_supported_by_conics() {
        let mut m = mercator();
        assert!(!m.supports(Capability::Parallels));
        m.set_parallels([10.0, 20.0]);
        assert_eq!(m.parallels(), None);

        let c = conic_conformal();
        assert!(c.supports(Capability::Parallels));
        assert_eq!(c.parallels(), Some([30.0, 30.0]));
    }

    #[test]
    fn clip_angle_hides_far_side() {
        let p = BuiltinProjection::new(Family::AzimuthalEqualArea);
        assert!(p.project(10.0, 10.0).is_some());
        let mut narrow = BuiltinProjection::new(Family::AzimuthalEqualArea);
        narrow.set_clip_angle(Some(30.0));
        assert!(narrow.project(10.0, 10.0).is_some());
        assert!(narrow.project(60.0, 0.0).is_none());
    }

    #[test]
    fn stream_applies_clip_extent() {
        let mut p = mercator();
        p.set_scale(1000.0);
        p.set_translate([0.0, 0.0]);
        p.set_clip_extent(Some(Aabb2::new([-10.0, -10.0], [10.0, 10.0])));
        let mut out = RecordingStream::new();
        {
            let mut s = p.stream(Box::new(&mut out));
            s.point(0.0, 0.0);
            s.point(20.0, 0.0);
        }
        let points = out.points();
        assert_eq!(points.len(), 1);
        assert_close(points[0][0], 0.0, 1e-9);
        assert_close(points[0][1], 0.0, 1e-9);
        assert!(matches!(out.events()[0], StreamEvent::Point(..)));
    }

    #[test]
    fn resampling_adds_points_on_long_curved_segments() {
        let mut p = conic_conformal();
        p.set_scale(2000.0);
        let mut coarse = RecordingStream::new();
        {
            let mut s = p.stream(Box::new(&mut coarse));
            s.line_start();
            s.point(-20.0, 45.0);
            s.point(20.0, 45.0);
            s.line_end();
        }
        assert!(coarse.points().len() > 2);

        p.set_precision(0.0);
        let mut exact = RecordingStream::new();
        {
            let mut s = p.stream(Box::new(&mut exact));
            s.line_start();
            s.point(-20.0, 45.0);
            s.point(20.0, 45.0);
            s.line_end();
        }
        assert_eq!(exact.points().len(), 2);
    }

    #[test]
    fn registers_all_families() {
        let mut registry = ProjectionRegistry::new();
        register_builtin_projections(&mut registry);
        for family in Family::ALL {
            assert!(registry.has(family.id()));
            assert_eq!(Family::from_id(family.id()), Some(family));
        }
        assert_eq!(registry.list().len(), 4);
    }
}
