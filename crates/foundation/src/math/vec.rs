/// Cartesian point on (or near) the unit sphere.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Unit vector for a longitude/latitude pair given in radians.
    pub fn from_lon_lat(lambda: f64, phi: f64) -> Self {
        let cos_phi = phi.cos();
        Self::new(cos_phi * lambda.cos(), cos_phi * lambda.sin(), phi.sin())
    }

    /// Longitude/latitude in radians. The vector does not need to be unit length.
    pub fn to_lon_lat(self) -> (f64, f64) {
        let len = self.length();
        if len == 0.0 {
            return (0.0, 0.0);
        }
        (self.y.atan2(self.x), (self.z / len).clamp(-1.0, 1.0).asin())
    }

    pub fn dot(self, other: Self) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn length(self) -> f64 {
        self.dot(self).sqrt()
    }

    pub fn normalized(self) -> Self {
        let len = self.length();
        if len == 0.0 {
            self
        } else {
            Self::new(self.x / len, self.y / len, self.z / len)
        }
    }
}

impl std::ops::Add for Vec3 {
    type Output = Self;

    fn add(self, other: Self) -> Self::Output {
        Self::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }
}

impl std::ops::Sub for Vec3 {
    type Output = Self;

    fn sub(self, other: Self) -> Self::Output {
        Self::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }
}
