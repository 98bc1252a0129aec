/// Axis-aligned pixel rectangle. Used for clip extents and for accumulating
/// the screen bounds of streamed geometry.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Aabb2 {
    pub min: [f64; 2],
    pub max: [f64; 2],
}

impl Aabb2 {
    pub fn new(min: [f64; 2], max: [f64; 2]) -> Self {
        Aabb2 { min, max }
    }

    /// Builds a rectangle from two arbitrary corners, normalizing the order.
    pub fn from_corners(a: [f64; 2], b: [f64; 2]) -> Self {
        Aabb2 {
            min: [a[0].min(b[0]), a[1].min(b[1])],
            max: [a[0].max(b[0]), a[1].max(b[1])],
        }
    }

    /// Square of half-size `half` centered on `center`.
    pub fn centered(center: [f64; 2], half: f64) -> Self {
        Aabb2::from_corners(
            [center[0] - half, center[1] - half],
            [center[0] + half, center[1] + half],
        )
    }

    /// The inverted rectangle; grows from nothing through `include`.
    pub fn empty() -> Self {
        Aabb2 {
            min: [f64::INFINITY, f64::INFINITY],
            max: [f64::NEG_INFINITY, f64::NEG_INFINITY],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.min[0] > self.max[0] || self.min[1] > self.max[1]
    }

    pub fn include(&mut self, p: [f64; 2]) {
        self.min[0] = self.min[0].min(p[0]);
        self.min[1] = self.min[1].min(p[1]);
        self.max[0] = self.max[0].max(p[0]);
        self.max[1] = self.max[1].max(p[1]);
    }

    /// Inclusive on every edge.
    pub fn contains(&self, p: [f64; 2]) -> bool {
        p[0] >= self.min[0] && p[0] <= self.max[0] && p[1] >= self.min[1] && p[1] <= self.max[1]
    }

    pub fn width(&self) -> f64 {
        self.max[0] - self.min[0]
    }

    pub fn height(&self) -> f64 {
        self.max[1] - self.min[1]
    }

    pub fn translated(&self, d: [f64; 2]) -> Self {
        Aabb2 {
            min: [self.min[0] + d[0], self.min[1] + d[1]],
            max: [self.max[0] + d[0], self.max[1] + d[1]],
        }
    }

    pub fn to_corners(&self) -> [[f64; 2]; 2] {
        [self.min, self.max]
    }
}

/// Geographic rectangle in degrees, `[[lon_min, lat_min], [lon_max, lat_max]]`.
///
/// Only used to decide which territory owns a coordinate; it never clips
/// rendered geometry.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct GeoBounds {
    pub lon_min: f64,
    pub lat_min: f64,
    pub lon_max: f64,
    pub lat_max: f64,
}

impl GeoBounds {
    pub fn new(lon_min: f64, lat_min: f64, lon_max: f64, lat_max: f64) -> Self {
        Self {
            lon_min,
            lat_min,
            lon_max,
            lat_max,
        }
    }

    pub fn from_pairs(pairs: [[f64; 2]; 2]) -> Self {
        Self::new(pairs[0][0], pairs[0][1], pairs[1][0], pairs[1][1])
    }

    pub fn to_pairs(&self) -> [[f64; 2]; 2] {
        [[self.lon_min, self.lat_min], [self.lon_max, self.lat_max]]
    }

    /// Inclusive on all four edges.
    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        lon >= self.lon_min && lon <= self.lon_max && lat >= self.lat_min && lat <= self.lat_max
    }
}

impl From<[[f64; 2]; 2]> for GeoBounds {
    fn from(pairs: [[f64; 2]; 2]) -> Self {
        GeoBounds::from_pairs(pairs)
    }
}
