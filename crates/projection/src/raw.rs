//! Raw projections: unit-sphere radians in, unscaled plane coordinates out
//! (y pointing north). Scale, translation and the y flip happen in
//! [`crate::builtin::BuiltinProjection`].

use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, PI};

use foundation::math::EPSILON;

pub trait RawProjection: Send + Sync + std::fmt::Debug {
    fn forward(&self, lambda: f64, phi: f64) -> Option<(f64, f64)>;
    fn invert(&self, x: f64, y: f64) -> Option<(f64, f64)>;
}

fn finite(p: (f64, f64)) -> Option<(f64, f64)> {
    (p.0.is_finite() && p.1.is_finite()).then_some(p)
}

#[derive(Debug, Copy, Clone, Default)]
pub struct MercatorRaw;

impl RawProjection for MercatorRaw {
    fn forward(&self, lambda: f64, phi: f64) -> Option<(f64, f64)> {
        if phi.abs() > FRAC_PI_2 - EPSILON {
            return None;
        }
        finite((lambda, (FRAC_PI_4 + phi / 2.0).tan().ln()))
    }

    fn invert(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        finite((x, 2.0 * y.exp().atan() - FRAC_PI_2))
    }
}

#[derive(Debug, Copy, Clone)]
pub struct CylindricalEqualAreaRaw {
    cos_phi0: f64,
}

impl CylindricalEqualAreaRaw {
    pub fn new(phi0: f64) -> Self {
        Self {
            cos_phi0: phi0.cos(),
        }
    }
}

impl RawProjection for CylindricalEqualAreaRaw {
    fn forward(&self, lambda: f64, phi: f64) -> Option<(f64, f64)> {
        finite((lambda * self.cos_phi0, phi.sin() / self.cos_phi0))
    }

    fn invert(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        let s = y * self.cos_phi0;
        if s.abs() > 1.0 {
            return None;
        }
        finite((x / self.cos_phi0, s.asin()))
    }
}

fn tan_half(phi: f64) -> f64 {
    ((FRAC_PI_2 + phi) / 2.0).tan()
}

/// Lambert conformal conic.
#[derive(Debug, Copy, Clone)]
pub struct ConicConformalRaw {
    n: f64,
    f: f64,
}

impl ConicConformalRaw {
    /// Standard parallels in radians. Returns Mercator when the cone
    /// degenerates to a cylinder.
    pub fn with_parallels(phi0: f64, phi1: f64) -> Box<dyn RawProjection> {
        let cy0 = phi0.cos();
        let n = if phi0 == phi1 {
            phi0.sin()
        } else {
            (cy0 / phi1.cos()).ln() / (tan_half(phi1) / tan_half(phi0)).ln()
        };
        if n.abs() < EPSILON || !n.is_finite() {
            return Box::new(MercatorRaw);
        }
        let f = cy0 * tan_half(phi0).powf(n) / n;
        Box::new(Self { n, f })
    }
}

impl RawProjection for ConicConformalRaw {
    fn forward(&self, lambda: f64, phi: f64) -> Option<(f64, f64)> {
        let phi = if self.f > 0.0 {
            phi.max(-FRAC_PI_2 + EPSILON)
        } else {
            phi.min(FRAC_PI_2 - EPSILON)
        };
        let r = self.f / tan_half(phi).powf(self.n);
        finite((r * (self.n * lambda).sin(), self.f - r * (self.n * lambda).cos()))
    }

    fn invert(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        let fy = self.f - y;
        let r = self.n.signum() * (x * x + fy * fy).sqrt();
        let mut l = x.atan2(fy.abs()) * fy.signum();
        if fy * self.n < 0.0 {
            l -= PI * x.signum() * fy.signum();
        }
        finite((
            l / self.n,
            2.0 * (self.f / r).powf(1.0 / self.n).atan() - FRAC_PI_2,
        ))
    }
}

/// Albers equal-area conic.
#[derive(Debug, Copy, Clone)]
pub struct ConicEqualAreaRaw {
    n: f64,
    c: f64,
    r0: f64,
}

impl ConicEqualAreaRaw {
    /// Standard parallels in radians. Returns cylindrical equal-area when the
    /// cone degenerates.
    pub fn with_parallels(phi0: f64, phi1: f64) -> Box<dyn RawProjection> {
        let sy0 = phi0.sin();
        let n = (sy0 + phi1.sin()) / 2.0;
        if n.abs() < EPSILON {
            return Box::new(CylindricalEqualAreaRaw::new(phi0));
        }
        let c = 1.0 + sy0 * (2.0 * n - sy0);
        let r0 = c.sqrt() / n;
        Box::new(Self { n, c, r0 })
    }
}

impl RawProjection for ConicEqualAreaRaw {
    fn forward(&self, lambda: f64, phi: f64) -> Option<(f64, f64)> {
        let r = (self.c - 2.0 * self.n * phi.sin()).max(0.0).sqrt() / self.n;
        let x = lambda * self.n;
        finite((r * x.sin(), self.r0 - r * x.cos()))
    }

    fn invert(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        let r0y = self.r0 - y;
        let mut l = x.atan2(r0y.abs()) * r0y.signum();
        if r0y * self.n < 0.0 {
            l -= PI * x.signum() * r0y.signum();
        }
        let s = (self.c - (x * x + r0y * r0y) * self.n * self.n) / (2.0 * self.n);
        if s.abs() > 1.0 {
            return None;
        }
        finite((l / self.n, s.asin()))
    }
}

/// Lambert azimuthal equal-area.
#[derive(Debug, Copy, Clone, Default)]
pub struct AzimuthalEqualAreaRaw;

impl RawProjection for AzimuthalEqualAreaRaw {
    fn forward(&self, lambda: f64, phi: f64) -> Option<(f64, f64)> {
        let cxcy = lambda.cos() * phi.cos();
        let k = (2.0 / (1.0 + cxcy)).sqrt();
        if !k.is_finite() {
            // Antipode of the center: d3 maps it to the outline.
            return Some((2.0, 0.0));
        }
        finite((k * phi.cos() * lambda.sin(), k * phi.sin()))
    }

    fn invert(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        let z = (x * x + y * y).sqrt();
        if z > 2.0 {
            return None;
        }
        let c = 2.0 * (z / 2.0).asin();
        let (sc, cc) = (c.sin(), c.cos());
        let phi = if z == 0.0 { 0.0 } else { (y * sc / z).asin() };
        finite(((x * sc).atan2(z * cc), phi))
    }
}
