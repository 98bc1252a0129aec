//! Entry points that turn configuration documents into composite projections,
//! plus the process-wide default registry.

use std::fmt;
use std::sync::OnceLock;

use formats::{CompositeConfig, ConfigError, validate_config};
use parking_lot::RwLock;
use projection::{Projection, ProjectionFactory, ProjectionRegistry};
use serde_json::Value;

use crate::builder::build_sub_projection;
use crate::engine::{CompositeProjection, SubProjection};

#[derive(Debug, Clone, PartialEq)]
pub struct LoaderOptions {
    pub width: f64,
    pub height: f64,
    /// Apply each territory's clip rectangle.
    pub enable_clipping: bool,
    /// Emit `tracing` debug events while building and inverting.
    pub debug: bool,
}

impl LoaderOptions {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            enable_clipping: true,
            debug: false,
        }
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_clipping(mut self, enable_clipping: bool) -> Self {
        self.enable_clipping = enable_clipping;
        self
    }
}

impl Default for LoaderOptions {
    fn default() -> Self {
        let canvas = formats::DEFAULT_CANVAS;
        Self::new(canvas.width, canvas.height)
    }
}

#[derive(Debug)]
pub enum LoadError {
    Json(serde_json::Error),
    Config(ConfigError),
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::Json(e) => write!(f, "Invalid JSON: {e}"),
            LoadError::Config(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for LoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LoadError::Json(e) => Some(e),
            LoadError::Config(e) => Some(e),
        }
    }
}

impl From<ConfigError> for LoadError {
    fn from(e: ConfigError) -> Self {
        LoadError::Config(e)
    }
}

/// Builds a composite projection against an explicit registry. Nothing is
/// returned unless every territory builds.
pub fn load_composite_projection_with(
    registry: &ProjectionRegistry,
    config: &CompositeConfig,
    options: &LoaderOptions,
) -> Result<CompositeProjection, ConfigError> {
    config.ensure_supported_version()?;
    if config.territories.is_empty() {
        return Err(ConfigError::NoTerritories);
    }

    let reference_scale = config.effective_reference_scale();
    let mut territories = Vec::with_capacity(config.territories.len());
    for territory in &config.territories {
        let projection = build_sub_projection(
            registry,
            territory,
            options.width,
            options.height,
            reference_scale,
            options,
        )?;
        territories.push(SubProjection {
            code: territory.code.clone(),
            bounds: territory.bounds,
            projection,
        });
    }

    if options.debug {
        tracing::debug!(
            atlas = %config.metadata.atlas_id,
            territories = territories.len(),
            "composite projection loaded"
        );
    }
    Ok(CompositeProjection::new(
        territories,
        options.width,
        options.height,
        options.debug,
    ))
}

/// Parses, validates and builds in one step against an explicit registry.
pub fn load_from_json_with(
    registry: &ProjectionRegistry,
    json: &str,
    options: &LoaderOptions,
) -> Result<CompositeProjection, LoadError> {
    let raw: Value = serde_json::from_str(json).map_err(LoadError::Json)?;
    let config = validate_config(&raw)?;
    Ok(load_composite_projection_with(registry, &config, options)?)
}

/// [`load_composite_projection_with`] against the default registry.
pub fn load_composite_projection(
    config: &CompositeConfig,
    options: &LoaderOptions,
) -> Result<CompositeProjection, ConfigError> {
    load_composite_projection_with(&default_registry().read(), config, options)
}

/// [`load_from_json_with`] against the default registry.
pub fn load_from_json(json: &str, options: &LoaderOptions) -> Result<CompositeProjection, LoadError> {
    load_from_json_with(&default_registry().read(), json, options)
}

/// Process-wide registry used by the functions without a registry argument.
/// Starts empty.
pub fn default_registry() -> &'static RwLock<ProjectionRegistry> {
    static REGISTRY: OnceLock<RwLock<ProjectionRegistry>> = OnceLock::new();
    REGISTRY.get_or_init(|| RwLock::new(ProjectionRegistry::new()))
}

pub fn register_projection<F>(id: impl Into<String>, factory: F)
where
    F: Fn() -> Box<dyn Projection> + Send + Sync + 'static,
{
    default_registry().write().register(id, factory);
}

pub fn register_projections<I, S>(factories: I)
where
    I: IntoIterator<Item = (S, ProjectionFactory)>,
    S: Into<String>,
{
    default_registry().write().register_all(factories);
}

pub fn unregister_projection(id: &str) -> bool {
    default_registry().write().unregister(id)
}

pub fn clear_projections() {
    default_registry().write().clear();
}

pub fn registered_projections() -> Vec<String> {
    default_registry().read().list()
}

pub fn is_projection_registered(id: &str) -> bool {
    default_registry().read().has(id)
}

#[cfg(test)]
mod tests {
    use super::{
        LoadError, LoaderOptions, is_projection_registered, load_composite_projection,
        load_composite_projection_with, load_from_json_with, register_projection,
        register_projections, registered_projections, unregister_projection,
    };
    use formats::{CompositeConfig, ConfigError, FeatureCollection, validate_config};
    use pretty_assertions::assert_eq;
    use projection::{
        BoundsStream, Capability, Projection, ProjectionError, ProjectionFactory,
        ProjectionRegistry, register_builtin_projections,
    };
    use serde_json::{Value, json};
    use std::sync::Arc;

    fn assert_close(a: f64, b: f64, eps: f64) {
        let diff = (a - b).abs();
        assert!(diff <= eps, "expected {a} ~= {b} (diff {diff})");
    }

    /// Spherical Mercator without clipping, for deterministic routing checks.
    #[derive(Default)]
    struct MercatorStub {
        scale: f64,
        translate: [f64; 2],
    }

    impl Projection for MercatorStub {
        fn project(&self, lon: f64, lat: f64) -> Option<[f64; 2]> {
            if lat.abs() >= 89.0 {
                return None;
            }
            let phi = lat.to_radians();
            let y = (std::f64::consts::FRAC_PI_4 + phi / 2.0).tan().ln();
            Some([
                self.translate[0] + self.scale * lon.to_radians(),
                self.translate[1] - self.scale * y,
            ])
        }
        fn invert(&self, x: f64, y: f64) -> Result<[f64; 2], ProjectionError> {
            let lambda = (x - self.translate[0]) / self.scale;
            let phi = 2.0 * ((self.translate[1] - y) / self.scale).exp().atan()
                - std::f64::consts::FRAC_PI_2;
            Ok([lambda.to_degrees(), phi.to_degrees()])
        }
        fn supports(&self, capability: Capability) -> bool {
            matches!(
                capability,
                Capability::Scale | Capability::Translate | Capability::Invert
            )
        }
        fn scale(&self) -> Option<f64> {
            Some(self.scale)
        }
        fn set_scale(&mut self, scale: f64) {
            self.scale = scale;
        }
        fn translate(&self) -> Option<[f64; 2]> {
            Some(self.translate)
        }
        fn set_translate(&mut self, translate: [f64; 2]) {
            self.translate = translate;
        }
    }

    fn stub_registry() -> ProjectionRegistry {
        let mut r = ProjectionRegistry::new();
        r.register("mercator-stub", || {
            Box::new(MercatorStub {
                scale: 1.0,
                ..MercatorStub::default()
            }) as Box<dyn Projection>
        });
        r
    }

    fn france() -> Value {
        json!({
            "version": "1.0",
            "metadata": { "atlasId": "france", "atlasName": "France" },
            "pattern": "single-focus",
            "referenceScale": 1000,
            "territories": [
                {
                    "code": "FR-MET", "name": "France metropolitaine", "role": "primary",
                    "projection": { "id": "mercator-stub", "parameters": { "scaleMultiplier": 1 } },
                    "layout": { "translateOffset": [0, 0] },
                    "bounds": [[-6.5, 41], [10, 51]]
                },
                {
                    "code": "FR-GP", "name": "Guadeloupe", "role": "secondary",
                    "projectionId": "mercator-stub",
                    "parameters": { "scaleMultiplier": 2 },
                    "layout": { "translateOffset": [-300, -50] },
                    "bounds": [[-62, 15.5], [-61, 16.5]]
                }
            ]
        })
    }

    fn config(v: &Value) -> CompositeConfig {
        validate_config(v).expect("valid config")
    }

    fn options() -> LoaderOptions {
        LoaderOptions::new(960.0, 500.0)
    }

    #[test]
    fn routes_paris_and_guadeloupe() {
        let c = load_composite_projection_with(&stub_registry(), &config(&france()), &options())
            .expect("load");

        let met = c.sub_projection("FR-MET").expect("FR-MET");
        let gp = c.sub_projection("FR-GP").expect("FR-GP");
        assert_eq!(met.scale(), Some(1000.0));
        assert_eq!(gp.scale(), Some(2000.0));
        assert_eq!(gp.translate(), Some([180.0, 200.0]));

        let paris = c.project(2.3, 48.8).expect("paris");
        assert_eq!(Some(paris), met.project(2.3, 48.8));

        let [x, y] = c.project(-61.5, 16.1).expect("guadeloupe");
        assert_eq!(Some([x, y]), gp.project(-61.5, 16.1));
        let unshifted = 480.0 + 2000.0 * (-61.5_f64).to_radians();
        assert_close(x - unshifted, -300.0, 1e-9);
        assert!(y.is_finite());
    }

    #[test]
    fn unmatched_points_fall_back_to_first_territory() {
        let c = load_composite_projection_with(&stub_registry(), &config(&france()), &options())
            .expect("load");
        let met = c.sub_projection("FR-MET").expect("FR-MET");
        assert!(c.route(100.0, -30.0).is_none());
        assert_eq!(c.project(100.0, -30.0), met.project(100.0, -30.0));
        assert!(c.project(100.0, -30.0).is_some());
    }

    #[test]
    fn bounds_edges_route_to_their_territory() {
        let c = load_composite_projection_with(&stub_registry(), &config(&france()), &options())
            .expect("load");
        let gp = c.sub_projection("FR-GP").expect("FR-GP");
        assert_eq!(c.route(-62.0, 16.0).map(|t| t.code.as_str()), Some("FR-GP"));
        assert_eq!(c.route(-61.5, 16.5).map(|t| t.code.as_str()), Some("FR-GP"));
        assert_eq!(c.project(-62.0, 16.0), gp.project(-62.0, 16.0));
        assert_eq!(c.project(-61.5, 16.5), gp.project(-61.5, 16.5));
    }

    #[test]
    fn invert_round_trips_inside_first_territory() {
        let c = load_composite_projection_with(&stub_registry(), &config(&france()), &options())
            .expect("load");
        for (lon, lat) in [(2.3, 48.8), (-6.5, 41.0), (10.0, 51.0), (5.0, 45.0)] {
            let [x, y] = c.project(lon, lat).expect("forward");
            let [ilon, ilat] = c.invert(x, y).expect("inverse");
            assert_close(ilon, lon, 1e-9);
            assert_close(ilat, lat, 1e-9);
        }
    }

    #[test]
    fn builtin_round_trip_routes_inversion_by_clip_extent() {
        let mut registry = ProjectionRegistry::new();
        register_builtin_projections(&mut registry);
        let doc = json!({
            "version": "1.0",
            "metadata": { "atlasId": "france" },
            "referenceScale": 2700,
            "territories": [
                {
                    "code": "FR-MET",
                    "projection": { "id": "conic-conformal", "family": "CONIC", "parameters": {
                        "rotate": [-3, -46.2], "parallels": [0, 60], "scaleMultiplier": 1
                    } },
                    "layout": { "translateOffset": [0, 0], "pixelClipExtent": [-230, -240, 230, 240] },
                    "bounds": [[-6.5, 41], [10, 51]]
                },
                {
                    "code": "FR-GP",
                    "projection": { "id": "mercator", "family": "CYLINDRICAL", "parameters": {
                        "center": [-61.46, 16.14], "scaleMultiplier": 1.4
                    } },
                    "layout": { "translateOffset": [-324, -38], "pixelClipExtent": [-54, -48, 55, 38] },
                    "bounds": [[-61.81, 15.83], [-61.0, 16.52]]
                }
            ]
        });
        let c = load_composite_projection_with(&registry, &config(&doc), &options()).expect("load");

        let [x, y] = c.project(-61.46, 16.14).expect("guadeloupe");
        assert_close(x, 156.0, 1e-6);
        assert_close(y, 212.0, 1e-6);
        let [lon, lat] = c.invert(x, y).expect("inverse");
        assert_close(lon, -61.46, 1e-6);
        assert_close(lat, 16.14, 1e-6);

        let [x, y] = c.project(2.3, 48.8).expect("paris");
        let [lon, lat] = c.invert(x, y).expect("inverse");
        assert_close(lon, 2.3, 1e-6);
        assert_close(lat, 48.8, 1e-6);
    }

    #[test]
    fn streaming_features_stays_inside_clip_rectangles() {
        let mut registry = ProjectionRegistry::new();
        register_builtin_projections(&mut registry);
        let doc = json!({
            "version": "1.0",
            "metadata": { "atlasId": "gp" },
            "territories": [{
                "code": "FR-GP",
                "projection": { "id": "mercator", "parameters": { "center": [-61.46, 16.14], "scaleMultiplier": 1.4 } },
                "layout": { "pixelClipExtent": [-54, -48, 55, 38] },
                "bounds": [[-61.81, 15.83], [-61.0, 16.52]]
            }]
        });
        let c = load_composite_projection_with(&registry, &config(&doc), &options()).expect("load");
        let features = FeatureCollection::from_geojson_str(
            r#"{"type":"FeatureCollection","features":[{"type":"Feature","properties":{},
                "geometry":{"type":"Polygon","coordinates":[[[-63,15],[-60,15],[-60,17],[-63,17],[-63,15]]]}}]}"#,
        )
        .expect("geojson");
        let mut bounds = BoundsStream::new();
        {
            let mut s = c.stream(Box::new(&mut bounds));
            features.stream(&mut s);
        }
        let b = bounds.bounds().expect("something drawn");
        assert!(b.min[0] >= 480.0 - 54.0 - 1e-6 && b.max[0] <= 480.0 + 55.0 + 1e-6, "{b:?}");
        assert!(b.min[1] >= 250.0 - 48.0 - 1e-6 && b.max[1] <= 250.0 + 38.0 + 1e-6, "{b:?}");
    }

    #[test]
    fn missing_registration_fails_with_available_ids() {
        let mut registry = stub_registry();
        registry.register("spare", || Box::new(MercatorStub::default()) as Box<dyn Projection>);
        let cfg = config(&france());
        assert!(load_composite_projection_with(&registry, &cfg, &options()).is_ok());

        assert!(registry.unregister("mercator-stub"));
        let err = load_composite_projection_with(&registry, &cfg, &options())
            .err()
            .expect("must fail");
        match err {
            ConfigError::UnregisteredProjection {
                projection_id,
                available,
                ..
            } => {
                assert_eq!(projection_id, "mercator-stub");
                assert_eq!(available, vec!["spare".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn unsupported_version_is_rejected_at_load() {
        let mut doc = france();
        doc["version"] = json!("0.9");
        let err = load_composite_projection_with(&stub_registry(), &config(&doc), &options())
            .err()
            .expect("must fail");
        assert_eq!(
            err,
            ConfigError::UnsupportedVersion {
                found: "0.9".to_string()
            }
        );
    }

    #[test]
    fn json_errors_are_distinct_from_config_errors() {
        let registry = stub_registry();
        let err = load_from_json_with(&registry, "{ not json", &options())
            .err()
            .expect("must fail");
        assert!(matches!(err, LoadError::Json(_)));
        assert!(err.to_string().starts_with("Invalid JSON: "));

        let err = load_from_json_with(&registry, r#"{"version":"1.0"}"#, &options())
            .err()
            .expect("must fail");
        assert!(matches!(err, LoadError::Config(ConfigError::MissingAtlasId)));

        let text = serde_json::to_string(&france()).expect("serialize");
        let c = load_from_json_with(&registry, &text, &options()).expect("load");
        assert_eq!(c.codes().collect::<Vec<_>>(), vec!["FR-MET", "FR-GP"]);
    }

    #[test]
    fn loader_options_defaults() {
        let o = LoaderOptions::default();
        assert_eq!((o.width, o.height), (960.0, 500.0));
        assert!(o.enable_clipping);
        assert!(!o.debug);
        let o = LoaderOptions::new(800.0, 600.0).with_debug(true).with_clipping(false);
        assert!(o.debug && !o.enable_clipping);
    }

    #[test]
    fn france_demo_loads_with_builtins() {
        let mut registry = ProjectionRegistry::new();
        register_builtin_projections(&mut registry);
        let c = load_from_json_with(&registry, include_str!("../../../demos/france.json"), &options())
            .expect("demo config");
        assert_eq!(c.territories().len(), 14);
        assert_eq!(c.route(2.35, 48.85).map(|t| t.code.as_str()), Some("FR-MET"));
        assert!(c.project(2.35, 48.85).is_some());

        let cfg = config(&serde_json::from_str(include_str!("../../../demos/france.json")).expect("json"));
        for t in &cfg.territories {
            let Some(center) = t.projection.parameters.center else {
                continue;
            };
            let sub = c.sub_projection(&t.code).expect("territory");
            let [x, y] = sub.project(center[0], center[1]).expect("center");
            let [tx, ty] = sub.translate().expect("translate");
            assert_close(x, tx, 1e-6);
            assert_close(y, ty, 1e-6);
        }
    }

    // The only test touching the process-wide registry; ids are unique to it.
    #[test]
    fn default_registry_wrappers() {
        register_projection("test-global-stub", || {
            Box::new(MercatorStub {
                scale: 1.0,
                ..MercatorStub::default()
            }) as Box<dyn Projection>
        });
        let extra: ProjectionFactory = Arc::new(|| Box::new(MercatorStub::default()) as Box<dyn Projection>);
        register_projections([("test-global-extra", extra)]);
        assert!(is_projection_registered("test-global-stub"));
        assert!(registered_projections().contains(&"test-global-extra".to_string()));

        let mut doc = france();
        doc["territories"][0]["projection"]["id"] = json!("test-global-stub");
        doc["territories"][1]["projectionId"] = json!("test-global-stub");
        let cfg = config(&doc);
        assert!(load_composite_projection(&cfg, &options()).is_ok());

        assert!(unregister_projection("test-global-stub"));
        assert!(!unregister_projection("test-global-stub"));
        match load_composite_projection(&cfg, &options()) {
            Err(ConfigError::UnregisteredProjection { available, .. }) => {
                assert!(!available.contains(&"test-global-stub".to_string()));
                assert!(available.contains(&"test-global-extra".to_string()));
            }
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
        assert!(unregister_projection("test-global-extra"));
    }
}
