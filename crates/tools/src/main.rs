use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use composite::{CompositeProjection, LoaderOptions, load_composite_projection_with};
use formats::{CompositeConfig, FeatureCollection, validate_config};
use foundation::Aabb2;
use projection::{BoundsStream, Projection, ProjectionRegistry, register_builtin_projections};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = real_main() {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn real_main() -> Result<(), String> {
    let mut args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        return Err(usage());
    }

    let cmd = args[1].clone();
    args.drain(0..2);

    match cmd.as_str() {
        "validate" => cmd_validate(args),
        "project" => cmd_project(args),
        "invert" => cmd_invert(args),
        "bounds" => cmd_bounds(args),
        "normalize" => cmd_normalize(args),
        _ => Err(usage()),
    }
}

/// Flags shared by every command that builds a projection.
struct LoadFlags {
    width: Option<f64>,
    height: Option<f64>,
    no_clip: bool,
    debug: bool,
}

/// Splits `args` into positionals and load flags.
fn parse_args(args: Vec<String>) -> Result<(Vec<String>, LoadFlags), String> {
    let mut flags = LoadFlags {
        width: None,
        height: None,
        no_clip: false,
        debug: false,
    };
    let mut positional = Vec::new();

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--width" | "--height" => {
                let name = args[i].clone();
                i += 1;
                let v = args
                    .get(i)
                    .ok_or_else(|| format!("{name} requires a value"))?;
                let v = parse_f64(&name, v)?;
                if name == "--width" {
                    flags.width = Some(v);
                } else {
                    flags.height = Some(v);
                }
            }
            "--no-clip" => flags.no_clip = true,
            "--debug" => flags.debug = true,
            // Negative coordinates are positionals, not flags.
            s if s.starts_with("--") => {
                return Err(format!("unknown arg: {s}\n\n{}", usage()));
            }
            _ => positional.push(args[i].clone()),
        }
        i += 1;
    }
    Ok((positional, flags))
}

fn parse_f64(name: &str, s: &str) -> Result<f64, String> {
    s.parse::<f64>()
        .map_err(|e| format!("{name}: expected a number, got {s:?}: {e}"))
}

fn read_config(path: &Path) -> Result<CompositeConfig, String> {
    let text = fs::read_to_string(path).map_err(|e| format!("read {path:?}: {e}"))?;
    let raw: serde_json::Value =
        serde_json::from_str(&text).map_err(|e| format!("{path:?}: Invalid JSON: {e}"))?;
    let config = validate_config(&raw).map_err(|e| format!("{path:?}: {e}"))?;
    tracing::debug!(
        path = %path.display(),
        atlas = %config.metadata.atlas_id,
        territories = config.territories.len(),
        "configuration read"
    );
    Ok(config)
}

fn builtin_registry() -> ProjectionRegistry {
    let mut registry = ProjectionRegistry::new();
    register_builtin_projections(&mut registry);
    registry
}

fn load(config: &CompositeConfig, flags: &LoadFlags) -> Result<CompositeProjection, String> {
    let canvas = config.canvas_size();
    let options = LoaderOptions::new(
        flags.width.unwrap_or(canvas.width),
        flags.height.unwrap_or(canvas.height),
    )
    .with_clipping(!flags.no_clip)
    .with_debug(flags.debug);
    load_composite_projection_with(&builtin_registry(), config, &options).map_err(|e| e.to_string())
}

fn print_json<T: Serialize>(value: &T) -> Result<(), String> {
    let payload = serde_json::to_string_pretty(value).map_err(|e| format!("json: {e}"))?;
    println!("{payload}");
    Ok(())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TerritorySummary {
    code: String,
    projection: String,
    scale: Option<f64>,
    translate: Option<[f64; 2]>,
    clip_extent: Option<[[f64; 2]; 2]>,
    bounds: [[f64; 2]; 2],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ValidateReport {
    atlas_id: String,
    version: String,
    canvas: [f64; 2],
    territories: Vec<TerritorySummary>,
}

fn cmd_validate(args: Vec<String>) -> Result<(), String> {
    // atlas validate <config.json> [--width W] [--height H] [--no-clip]
    let (positional, flags) = parse_args(args)?;
    let [path] = positional.as_slice() else {
        return Err(usage());
    };

    let config = read_config(Path::new(path))?;
    let composite = load(&config, &flags)?;

    let territories = config
        .territories
        .iter()
        .zip(composite.territories())
        .map(|(t, sub)| TerritorySummary {
            code: t.code.clone(),
            projection: t.projection.id.clone(),
            scale: sub.projection.scale(),
            translate: sub.projection.translate(),
            clip_extent: sub.projection.clip_extent().map(|e| e.to_corners()),
            bounds: t.bounds.to_pairs(),
        })
        .collect();

    print_json(&ValidateReport {
        atlas_id: config.metadata.atlas_id.clone(),
        version: config.version.clone(),
        canvas: composite.canvas_size(),
        territories,
    })
}

#[derive(Debug, Serialize)]
struct ProjectReport {
    /// Territory whose projection produced the pixel.
    territory: String,
    /// Territory whose bounds contain the point, if any.
    owner: Option<String>,
    fallback: bool,
    x: f64,
    y: f64,
}

fn cmd_project(args: Vec<String>) -> Result<(), String> {
    // atlas project <config.json> <lon> <lat> [--width W] [--height H] [--no-clip]
    let (positional, flags) = parse_args(args)?;
    let [path, lon, lat] = positional.as_slice() else {
        return Err(usage());
    };
    let (lon, lat) = (parse_f64("lon", lon)?, parse_f64("lat", lat)?);

    let config = read_config(Path::new(path))?;
    let composite = load(&config, &flags)?;

    let routed = composite
        .project_routed(lon, lat)
        .ok_or_else(|| format!("({lon}, {lat}) has no image in any territory"))?;
    let [x, y] = routed.point;
    print_json(&ProjectReport {
        territory: routed.territory.code.clone(),
        owner: composite.route(lon, lat).map(|t| t.code.clone()),
        fallback: routed.fallback,
        x,
        y,
    })
}

#[derive(Debug, Serialize)]
struct InvertReport {
    lon: f64,
    lat: f64,
}

fn cmd_invert(args: Vec<String>) -> Result<(), String> {
    // atlas invert <config.json> <x> <y> [--width W] [--height H] [--no-clip]
    let (positional, flags) = parse_args(args)?;
    let [path, x, y] = positional.as_slice() else {
        return Err(usage());
    };
    let (x, y) = (parse_f64("x", x)?, parse_f64("y", y)?);

    let config = read_config(Path::new(path))?;
    let composite = load(&config, &flags)?;

    let [lon, lat] = composite
        .invert(x, y)
        .map_err(|e| format!("({x}, {y}): {e}"))?;
    print_json(&InvertReport { lon, lat })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BoundsReport {
    features: usize,
    bounds: Option<[[f64; 2]; 2]>,
}

fn cmd_bounds(args: Vec<String>) -> Result<(), String> {
    // atlas bounds <config.json> <features.geojson> [--width W] [--height H] [--no-clip]
    let (positional, flags) = parse_args(args)?;
    let [config_path, features_path] = positional.as_slice() else {
        return Err(usage());
    };

    let config = read_config(Path::new(config_path))?;
    let composite = load(&config, &flags)?;

    let features_path = PathBuf::from(features_path);
    let text = fs::read_to_string(&features_path)
        .map_err(|e| format!("read {features_path:?}: {e}"))?;
    let features = FeatureCollection::from_geojson_str(&text)
        .map_err(|e| format!("{features_path:?}: {e}"))?;

    let mut sink = BoundsStream::new();
    {
        let mut stream = composite.stream(Box::new(&mut sink));
        features.stream(&mut stream);
    }
    let bounds: Option<Aabb2> = sink.bounds();
    print_json(&BoundsReport {
        features: features.features.len(),
        bounds: bounds.map(|b| b.to_corners()),
    })
}

fn cmd_normalize(args: Vec<String>) -> Result<(), String> {
    // atlas normalize <input.json> <output.json>
    let (positional, _flags) = parse_args(args)?;
    let [input, output] = positional.as_slice() else {
        return Err(usage());
    };

    let config = read_config(Path::new(input))?;
    config.ensure_supported_version().map_err(|e| e.to_string())?;
    let payload = serde_json::to_string_pretty(&config).map_err(|e| format!("json: {e}"))?;
    fs::write(output, payload).map_err(|e| format!("write {output:?}: {e}"))?;
    eprintln!("wrote {output} ({} territories)", config.territories.len());
    Ok(())
}

fn usage() -> String {
    let exe = env::args().next().unwrap_or_else(|| "atlas".to_string());
    format!(
        "Usage:\n  {exe} validate <config.json> [--width W] [--height H] [--no-clip] [--debug]\n  {exe} project <config.json> <lon> <lat> [--width W] [--height H] [--no-clip] [--debug]\n  {exe} invert <config.json> <x> <y> [--width W] [--height H] [--no-clip] [--debug]\n  {exe} bounds <config.json> <features.geojson> [--width W] [--height H] [--no-clip] [--debug]\n  {exe} normalize <input.json> <output.json>\n\nNotes:\n- Uses the built-in projections (mercator, conic-conformal, conic-equal-area, azimuthal-equal-area).\n- Canvas size defaults to the config's canvasDimensions, else 960x500.\n- Set RUST_LOG=debug together with --debug to trace sub-projection building.\n"
    )
}
