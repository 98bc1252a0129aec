//! Turns one configured territory into a ready-to-use projection instance.

use foundation::Aabb2;
use formats::{ConfigError, Territory};
use projection::{Capability, Projection, ProjectionRegistry};

use crate::loader::LoaderOptions;

const DEFAULT_ROTATE: [f64; 3] = [0.0, 0.0, 0.0];
const DEFAULT_PARALLELS: [f64; 2] = [0.0, 60.0];
/// Half-size of the synthesized clip rectangle, as a fraction of scale.
const FALLBACK_CLIP_FRACTION: f64 = 0.1;

/// Builds the projection for `territory` on a `width` x `height` canvas.
///
/// Parameters the instance does not support are skipped. Clipping is always
/// applied to instances that support it unless `options.enable_clipping` is
/// off.
pub fn build_sub_projection(
    registry: &ProjectionRegistry,
    territory: &Territory,
    width: f64,
    height: f64,
    reference_scale: f64,
    options: &LoaderOptions,
) -> Result<Box<dyn Projection>, ConfigError> {
    let resolved = &territory.projection;
    let mut projection =
        registry
            .create(&resolved.id)
            .ok_or_else(|| ConfigError::UnregisteredProjection {
                code: territory.code.clone(),
                projection_id: resolved.id.clone(),
                available: registry.list(),
            })?;
    let p = &resolved.parameters;

    if let Some(center) = p.center {
        if projection.supports(Capability::Center) {
            projection.set_center(center);
        }
    }
    if let Some(rotate) = &p.rotate {
        if projection.supports(Capability::Rotate) {
            projection.set_rotate(rotate.coerce(DEFAULT_ROTATE));
        }
    }
    if let Some(parallels) = &p.parallels {
        if projection.supports(Capability::Parallels) {
            projection.set_parallels(parallels.coerce(DEFAULT_PARALLELS));
        }
    }

    let scale = match (given(p.scale), given(p.scale_multiplier)) {
        (Some(absolute), _) => Some(absolute),
        (None, Some(multiplier)) => Some(reference_scale * multiplier),
        (None, None) => None,
    };
    if let Some(scale) = scale {
        if projection.supports(Capability::Scale) {
            projection.set_scale(scale);
        }
    }

    if let Some(angle) = p.clip_angle {
        if projection.supports(Capability::ClipAngle) {
            projection.set_clip_angle(Some(angle));
        }
    }
    if let Some(precision) = given(p.precision) {
        if projection.supports(Capability::Precision) {
            projection.set_precision(precision);
        }
    }

    let [ox, oy] = territory.layout.offset();
    let mut translate = [width / 2.0 + ox, height / 2.0 + oy];
    if let Some([nx, ny]) = p.translate {
        translate = [translate[0] + nx, translate[1] + ny];
    }
    if projection.supports(Capability::Translate) {
        projection.set_translate(translate);
    }

    if options.enable_clipping && projection.supports(Capability::ClipExtent) {
        let extent = clip_rect(territory, projection.as_ref(), translate);
        if options.debug {
            tracing::debug!(
                territory = %territory.code,
                min = ?extent.min,
                width = extent.width(),
                height = extent.height(),
                "clip extent"
            );
        }
        projection.set_clip_extent(Some(extent));
    }

    if options.debug {
        tracing::debug!(
            territory = %territory.code,
            projection = %resolved.id,
            scale = ?projection.scale(),
            translate = ?projection.translate(),
            "sub-projection built"
        );
    }
    Ok(projection)
}

/// Zero and NaN count as unset for numeric parameters.
fn given(value: Option<f64>) -> Option<f64> {
    value.filter(|v| *v != 0.0 && !v.is_nan())
}

/// Absolute `clipExtent` first, then `pixelClipExtent` relative to the
/// territory's translate, then a box of +-10% of scale around that translate.
fn clip_rect(territory: &Territory, projection: &dyn Projection, translate: [f64; 2]) -> Aabb2 {
    if let Some([a, b]) = territory.layout.clip_extent {
        return Aabb2::from_corners(a, b);
    }
    let [tx, ty] = projection.translate().unwrap_or(translate);
    if let Some([x1, y1, x2, y2]) = territory.layout.pixel_clip_extent {
        return Aabb2::from_corners([x1, y1], [x2, y2]).translated([tx, ty]);
    }
    let scale = projection.scale().unwrap_or(1.0);
    Aabb2::centered([tx, ty], scale * FALLBACK_CLIP_FRACTION)
}
