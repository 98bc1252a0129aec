//! Spherical rotations in the d3-geo convention.
//!
//! A rotation `[lambda, phi, gamma]` (degrees) first spins the sphere about its
//! polar axis by `lambda`, then tilts it by `phi` and rolls it by `gamma`. All
//! angles handled here are radians unless a name says otherwise.

use std::f64::consts::{PI, TAU};

/// Wraps a longitude in radians into `[-PI, PI]`.
pub fn wrap_longitude(lambda: f64) -> f64 {
    if lambda > PI {
        lambda - TAU
    } else if lambda < -PI {
        lambda + TAU
    } else {
        lambda
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct SphericalRotation {
    delta_lambda: f64,
    cos_phi: f64,
    sin_phi: f64,
    cos_gamma: f64,
    sin_gamma: f64,
    tilted: bool,
}

impl SphericalRotation {
    /// Rotation from `[lambda, phi, gamma]` given in degrees.
    pub fn from_degrees(angles: [f64; 3]) -> Self {
        Self::from_radians(
            angles[0].to_radians(),
            angles[1].to_radians(),
            angles[2].to_radians(),
        )
    }

    pub fn from_radians(delta_lambda: f64, delta_phi: f64, delta_gamma: f64) -> Self {
        Self {
            delta_lambda: delta_lambda % TAU,
            cos_phi: delta_phi.cos(),
            sin_phi: delta_phi.sin(),
            cos_gamma: delta_gamma.cos(),
            sin_gamma: delta_gamma.sin(),
            tilted: delta_phi != 0.0 || delta_gamma != 0.0,
        }
    }

    pub fn identity() -> Self {
        Self::from_radians(0.0, 0.0, 0.0)
    }

    pub fn forward(&self, lambda: f64, phi: f64) -> (f64, f64) {
        let lambda = wrap_longitude(lambda + self.delta_lambda);
        if !self.tilted {
            return (lambda, phi);
        }
        let cos_p = phi.cos();
        let x = lambda.cos() * cos_p;
        let y = lambda.sin() * cos_p;
        let z = phi.sin();
        let k = z * self.cos_phi + x * self.sin_phi;
        (
            (y * self.cos_gamma - k * self.sin_gamma).atan2(x * self.cos_phi - z * self.sin_phi),
            (k * self.cos_gamma + y * self.sin_gamma).clamp(-1.0, 1.0).asin(),
        )
    }

    pub fn invert(&self, lambda: f64, phi: f64) -> (f64, f64) {
        let (lambda, phi) = if self.tilted {
            let cos_p = phi.cos();
            let x = lambda.cos() * cos_p;
            let y = lambda.sin() * cos_p;
            let z = phi.sin();
            let k = z * self.cos_gamma - y * self.sin_gamma;
            (
                (y * self.cos_gamma + z * self.sin_gamma).atan2(x * self.cos_phi + k * self.sin_phi),
                (k * self.cos_phi - x * self.sin_phi).clamp(-1.0, 1.0).asin(),
            )
        } else {
            (lambda, phi)
        };
        (wrap_longitude(lambda - self.delta_lambda), phi)
    }
}

impl Default for SphericalRotation {
    fn default() -> Self {
        Self::identity()
    }
}
