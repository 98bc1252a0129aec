//! GeoJSON boundary data and its conversion into geometry stream events.
//!
//! Rings are streamed without their closing vertex, matching what
//! projections and clip stages expect.

use projection::GeoStream;
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq)]
pub struct GeoPoint {
    pub lon_deg: f64,
    pub lat_deg: f64,
}

impl GeoPoint {
    pub fn new(lon_deg: f64, lat_deg: f64) -> Self {
        Self { lon_deg, lat_deg }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GeoGeometry {
    Point(GeoPoint),
    MultiPoint(Vec<GeoPoint>),
    LineString(Vec<GeoPoint>),
    MultiLineString(Vec<Vec<GeoPoint>>),
    Polygon(Vec<Vec<GeoPoint>>),
    MultiPolygon(Vec<Vec<Vec<GeoPoint>>>),
    GeometryCollection(Vec<GeoGeometry>),
    /// The whole globe (d3 extension, used for graticule outlines).
    Sphere,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeoFeature {
    pub id: Option<String>,
    pub properties: Map<String, Value>,
    pub geometry: Option<GeoGeometry>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct FeatureCollection {
    pub features: Vec<GeoFeature>,
}

#[derive(Debug)]
pub enum GeoJsonError {
    Json(serde_json::Error),
    NotAFeatureCollection,
    InvalidFeature { index: usize, reason: String },
    InvalidGeometry(String),
}

impl std::fmt::Display for GeoJsonError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GeoJsonError::Json(e) => write!(f, "GeoJSON parse error: {e}"),
            GeoJsonError::NotAFeatureCollection => {
                write!(f, "expected GeoJSON FeatureCollection")
            }
            GeoJsonError::InvalidFeature { index, reason } => {
                write!(f, "invalid feature at index {index}: {reason}")
            }
            GeoJsonError::InvalidGeometry(reason) => write!(f, "invalid geometry: {reason}"),
        }
    }
}

impl std::error::Error for GeoJsonError {}

impl FeatureCollection {
    pub fn from_geojson_str(payload: &str) -> Result<Self, GeoJsonError> {
        let value: Value = serde_json::from_str(payload).map_err(GeoJsonError::Json)?;
        Self::from_geojson_value(&value)
    }

    /// Accepts a `FeatureCollection`, a single `Feature`, or a bare geometry
    /// (wrapped into one anonymous feature).
    pub fn from_geojson_value(value: &Value) -> Result<Self, GeoJsonError> {
        let obj = value
            .as_object()
            .ok_or(GeoJsonError::NotAFeatureCollection)?;
        let ty = obj
            .get("type")
            .and_then(|v| v.as_str())
            .ok_or(GeoJsonError::NotAFeatureCollection)?;

        match ty {
            "FeatureCollection" => {
                let features_val = obj
                    .get("features")
                    .and_then(|v| v.as_array())
                    .ok_or(GeoJsonError::NotAFeatureCollection)?;
                let mut features = Vec::with_capacity(features_val.len());
                for (index, feat_val) in features_val.iter().enumerate() {
                    features.push(parse_feature(index, feat_val)?);
                }
                Ok(Self { features })
            }
            "Feature" => Ok(Self {
                features: vec![parse_feature(0, value)?],
            }),
            _ => {
                let geometry = parse_geometry(value).map_err(GeoJsonError::InvalidGeometry)?;
                Ok(Self {
                    features: vec![GeoFeature {
                        id: None,
                        properties: Map::new(),
                        geometry: Some(geometry),
                    }],
                })
            }
        }
    }

    pub fn stream(&self, sink: &mut dyn GeoStream) {
        for feature in &self.features {
            feature.stream(sink);
        }
    }
}

impl GeoFeature {
    pub fn stream(&self, sink: &mut dyn GeoStream) {
        if let Some(geometry) = &self.geometry {
            geometry.stream(sink);
        }
    }
}

impl GeoGeometry {
    pub fn from_geojson_value(value: &Value) -> Result<Self, GeoJsonError> {
        parse_geometry(value).map_err(GeoJsonError::InvalidGeometry)
    }

    /// Writes this geometry to `sink` as stream events.
    pub fn stream(&self, sink: &mut dyn GeoStream) {
        match self {
            GeoGeometry::Point(p) => sink.point(p.lon_deg, p.lat_deg),
            GeoGeometry::MultiPoint(ps) => {
                for p in ps {
                    sink.point(p.lon_deg, p.lat_deg);
                }
            }
            GeoGeometry::LineString(ps) => stream_line(ps, false, sink),
            GeoGeometry::MultiLineString(lines) => {
                for line in lines {
                    stream_line(line, false, sink);
                }
            }
            GeoGeometry::Polygon(rings) => stream_polygon(rings, sink),
            GeoGeometry::MultiPolygon(polys) => {
                for rings in polys {
                    stream_polygon(rings, sink);
                }
            }
            GeoGeometry::GeometryCollection(geoms) => {
                for g in geoms {
                    g.stream(sink);
                }
            }
            GeoGeometry::Sphere => sink.sphere(),
        }
    }
}

fn stream_line(points: &[GeoPoint], closed: bool, sink: &mut dyn GeoStream) {
    let n = if closed && points.len() > 1 && points.first() == points.last() {
        points.len() - 1
    } else {
        points.len()
    };
    sink.line_start();
    for p in &points[..n] {
        sink.point(p.lon_deg, p.lat_deg);
    }
    sink.line_end();
}

fn stream_polygon(rings: &[Vec<GeoPoint>], sink: &mut dyn GeoStream) {
    sink.polygon_start();
    for ring in rings {
        stream_line(ring, true, sink);
    }
    sink.polygon_end();
}

fn parse_feature(index: usize, value: &Value) -> Result<GeoFeature, GeoJsonError> {
    let feat_obj = value.as_object().ok_or(GeoJsonError::InvalidFeature {
        index,
        reason: "feature must be an object".to_string(),
    })?;

    let feat_type = feat_obj.get("type").and_then(|v| v.as_str()).ok_or(
        GeoJsonError::InvalidFeature {
            index,
            reason: "feature missing type".to_string(),
        },
    )?;
    if feat_type != "Feature" {
        return Err(GeoJsonError::InvalidFeature {
            index,
            reason: format!("unexpected feature type: {feat_type}"),
        });
    }

    let id = match feat_obj.get("id") {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    };

    let properties = feat_obj
        .get("properties")
        .and_then(|v| v.as_object())
        .cloned()
        .unwrap_or_default();

    let geometry = match feat_obj.get("geometry") {
        None | Some(Value::Null) => None,
        Some(g) => Some(
            parse_geometry(g).map_err(|reason| GeoJsonError::InvalidFeature { index, reason })?,
        ),
    };

    Ok(GeoFeature {
        id,
        properties,
        geometry,
    })
}

fn parse_geometry(value: &Value) -> Result<GeoGeometry, String> {
    let obj = value
        .as_object()
        .ok_or("geometry must be an object".to_string())?;
    let ty = obj
        .get("type")
        .and_then(|v| v.as_str())
        .ok_or("geometry missing type".to_string())?;

    match ty {
        "Sphere" => return Ok(GeoGeometry::Sphere),
        "GeometryCollection" => {
            let geoms = obj
                .get("geometries")
                .and_then(|v| v.as_array())
                .ok_or("GeometryCollection missing geometries".to_string())?;
            let mut out = Vec::with_capacity(geoms.len());
            for g in geoms {
                out.push(parse_geometry(g)?);
            }
            return Ok(GeoGeometry::GeometryCollection(out));
        }
        _ => {}
    }

    let coords = obj
        .get("coordinates")
        .ok_or("geometry missing coordinates".to_string())?;

    match ty {
        "Point" => Ok(GeoGeometry::Point(parse_point(coords)?)),
        "MultiPoint" => Ok(GeoGeometry::MultiPoint(parse_points(coords)?)),
        "LineString" => Ok(GeoGeometry::LineString(parse_points(coords)?)),
        "MultiLineString" => Ok(GeoGeometry::MultiLineString(parse_rings(coords)?)),
        "Polygon" => Ok(GeoGeometry::Polygon(parse_rings(coords)?)),
        "MultiPolygon" => Ok(GeoGeometry::MultiPolygon(parse_multi_polygon(coords)?)),
        other => Err(format!("unsupported geometry type: {other}")),
    }
}

fn parse_point(coords: &Value) -> Result<GeoPoint, String> {
    let arr = coords
        .as_array()
        .ok_or("Point coordinates must be an array".to_string())?;
    if arr.len() < 2 {
        return Err("Point coordinates must have [lon, lat]".to_string());
    }
    let lon = arr[0]
        .as_f64()
        .ok_or("Point lon must be a number".to_string())?;
    let lat = arr[1]
        .as_f64()
        .ok_or("Point lat must be a number".to_string())?;
    Ok(GeoPoint::new(lon, lat))
}

fn parse_points(coords: &Value) -> Result<Vec<GeoPoint>, String> {
    let arr = coords
        .as_array()
        .ok_or("coordinates must be an array".to_string())?;
    arr.iter().map(parse_point).collect()
}

fn parse_rings(coords: &Value) -> Result<Vec<Vec<GeoPoint>>, String> {
    let arr = coords
        .as_array()
        .ok_or("coordinates must be an array of rings".to_string())?;
    arr.iter().map(parse_points).collect()
}

fn parse_multi_polygon(coords: &Value) -> Result<Vec<Vec<Vec<GeoPoint>>>, String> {
    let polys = coords
        .as_array()
        .ok_or("MultiPolygon coordinates must be an array of polygons".to_string())?;
    polys.iter().map(parse_rings).collect()
}
