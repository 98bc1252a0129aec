//! Versioned composite projection document.
//!
//! Territories accept three projection spellings on input (nested
//! `projection` object, legacy `projectionId` + `parameters`, and
//! `projectionFamily` + `parameters`). They are resolved into a single
//! [`ResolvedProjection`] while deserializing and always written back in the
//! nested form.

use std::fmt;

use foundation::GeoBounds;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const CONFIG_VERSION: &str = "1.0";
pub const DEFAULT_REFERENCE_SCALE: f64 = 2700.0;
pub const DEFAULT_CANVAS: CanvasDimensions = CanvasDimensions {
    width: 960.0,
    height: 500.0,
};

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    NotAnObject,
    MissingVersion,
    UnsupportedVersion {
        found: String,
    },
    MissingAtlasId,
    /// `territories` absent or not a list.
    MissingTerritories,
    NoTerritories,
    MissingTerritoryCode {
        index: usize,
        territory: String,
    },
    MissingProjection {
        code: String,
        available_fields: Vec<String>,
    },
    MissingBounds {
        code: String,
    },
    InvalidBounds {
        code: String,
    },
    UnregisteredProjection {
        code: String,
        projection_id: String,
        available: Vec<String>,
    },
    /// Structurally valid but a field has the wrong type.
    Malformed(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::NotAnObject => write!(f, "configuration must be an object"),
            ConfigError::MissingVersion => write!(f, "configuration must have a version field"),
            ConfigError::UnsupportedVersion { found } => {
                write!(f, "unsupported configuration version: {found} (expected {CONFIG_VERSION})")
            }
            ConfigError::MissingAtlasId => {
                write!(f, "configuration must have metadata with atlasId")
            }
            ConfigError::MissingTerritories => {
                write!(f, "configuration must have territories array")
            }
            ConfigError::NoTerritories => {
                write!(f, "configuration must have at least one territory")
            }
            ConfigError::MissingTerritoryCode { index, territory } => {
                write!(f, "territory {index} missing required field 'code': {territory}")
            }
            ConfigError::MissingProjection {
                code,
                available_fields,
            } => write!(
                f,
                "territory {code} missing projection configuration. Available fields: {}",
                available_fields.join(", ")
            ),
            ConfigError::MissingBounds { code } => write!(f, "territory {code} missing bounds"),
            ConfigError::InvalidBounds { code } => write!(
                f,
                "territory {code} has malformed bounds (expected [[lonMin, latMin], [lonMax, latMax]])"
            ),
            ConfigError::UnregisteredProjection {
                code,
                projection_id,
                available,
            } => {
                let list = if available.is_empty() {
                    "none".to_string()
                } else {
                    available.join(", ")
                };
                write!(
                    f,
                    "projection \"{projection_id}\" (territory {code}) is not registered. Available projections: {list}"
                )
            }
            ConfigError::Malformed(msg) => write!(f, "malformed configuration: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CompositeConfig {
    pub version: String,
    pub metadata: Metadata,
    /// Descriptive layout tag ("single-focus", ...); not interpreted.
    #[serde(default)]
    pub pattern: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_scale: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canvas_dimensions: Option<CanvasDimensions>,
    /// Order matters: bounds fallback and inversion both walk this list.
    pub territories: Vec<Territory>,
}

impl CompositeConfig {
    pub fn ensure_supported_version(&self) -> Result<(), ConfigError> {
        if self.version != CONFIG_VERSION {
            return Err(ConfigError::UnsupportedVersion {
                found: self.version.clone(),
            });
        }
        Ok(())
    }

    pub fn canvas_size(&self) -> CanvasDimensions {
        self.canvas_dimensions.unwrap_or(DEFAULT_CANVAS)
    }

    pub fn effective_reference_scale(&self) -> f64 {
        self.reference_scale
            .filter(|s| *s != 0.0 && !s.is_nan())
            .unwrap_or(DEFAULT_REFERENCE_SCALE)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    pub atlas_id: String,
    #[serde(default)]
    pub atlas_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_with: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq)]
pub struct CanvasDimensions {
    pub width: f64,
    pub height: f64,
}

/// Numeric list read leniently: anything that is not a list of numbers is
/// kept as `Other` and replaced by a default when applied.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum NumberList {
    List(Vec<f64>),
    Other(Value),
}

impl NumberList {
    /// Pads with zeros or truncates to exactly `N` components; `fallback`
    /// when the input was not a numeric list.
    pub fn coerce<const N: usize>(&self, fallback: [f64; N]) -> [f64; N] {
        match self {
            NumberList::List(values) => {
                let mut out = [0.0; N];
                for (slot, v) in out.iter_mut().zip(values) {
                    *slot = *v;
                }
                out
            }
            NumberList::Other(_) => fallback,
        }
    }
}

impl From<Vec<f64>> for NumberList {
    fn from(values: Vec<f64>) -> Self {
        NumberList::List(values)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProjectionParameters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub center: Option<[f64; 2]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotate: Option<NumberList>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parallels: Option<NumberList>,
    /// Absolute scale; wins over `scale_multiplier`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_scale: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale_multiplier: Option<f64>,
    /// Extra pixel nudge added on top of the layout translation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translate: Option<[f64; 2]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clip_angle: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precision: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Layout {
    /// Pixels relative to the canvas center.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translate_offset: Option<[f64; 2]>,
    /// Absolute pixel rectangle `[[x0, y0], [x1, y1]]`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clip_extent: Option<[[f64; 2]; 2]>,
    /// `[x1, y1, x2, y2]` relative to the territory's translate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pixel_clip_extent: Option<[f64; 4]>,
}

impl Layout {
    pub fn offset(&self) -> [f64; 2] {
        self.translate_offset.unwrap_or([0.0, 0.0])
    }
}

/// Canonical projection reference of one territory.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedProjection {
    pub id: String,
    pub family: Option<String>,
    pub parameters: ProjectionParameters,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawTerritory", into = "RawTerritory")]
pub struct Territory {
    pub code: String,
    pub name: String,
    /// "primary" / "secondary"; descriptive only.
    pub role: String,
    pub projection: ResolvedProjection,
    pub layout: Layout,
    /// Routing rectangle, never used for clipping.
    pub bounds: GeoBounds,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NestedProjection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<ProjectionParameters>,
}

/// Territory as written on disk, before the projection spelling is resolved.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RawTerritory {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub projection: Option<NestedProjection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub projection_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub projection_family: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<ProjectionParameters>,
    #[serde(default)]
    pub layout: Layout,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounds: Option<[[f64; 2]; 2]>,
}

impl RawTerritory {
    fn present_fields(&self) -> Vec<String> {
        let mut fields = Vec::new();
        let mut mark = |present: bool, name: &str| {
            if present {
                fields.push(name.to_string());
            }
        };
        mark(self.code.is_some(), "code");
        mark(!self.name.is_empty(), "name");
        mark(!self.role.is_empty(), "role");
        mark(self.projection.is_some(), "projection");
        mark(self.projection_id.is_some(), "projectionId");
        mark(self.projection_family.is_some(), "projectionFamily");
        mark(self.parameters.is_some(), "parameters");
        mark(true, "layout");
        mark(self.bounds.is_some(), "bounds");
        fields
    }

    /// Picks the projection spelling by priority: nested object, then
    /// `projectionId`, then `projectionFamily` with id inference.
    pub fn resolve_projection(&self) -> Option<ResolvedProjection> {
        if let Some(nested) = &self.projection {
            if let (Some(id), Some(parameters)) = (non_empty(&nested.id), &nested.parameters) {
                return Some(ResolvedProjection {
                    id: id.to_string(),
                    family: nested.family.clone(),
                    parameters: parameters.clone(),
                });
            }
        }
        let parameters = self.parameters.as_ref()?;
        if let Some(id) = non_empty(&self.projection_id) {
            return Some(ResolvedProjection {
                id: id.to_string(),
                family: self.projection_family.clone(),
                parameters: parameters.clone(),
            });
        }
        let family = non_empty(&self.projection_family)?;
        Some(ResolvedProjection {
            id: infer_projection_id(family, parameters).to_string(),
            family: Some(family.to_string()),
            parameters: parameters.clone(),
        })
    }
}

fn non_empty(s: &Option<String>) -> Option<&str> {
    s.as_deref().filter(|s| !s.is_empty())
}

/// Registry id for a projection family name. Unknown families map to
/// Mercator with a warning.
pub fn infer_projection_id(family: &str, parameters: &ProjectionParameters) -> &'static str {
    match family.to_ascii_uppercase().as_str() {
        "CYLINDRICAL" => "mercator",
        "CONIC" => {
            if parameters.parallels.is_some() {
                "conic-conformal"
            } else {
                "conic-equal-area"
            }
        }
        "AZIMUTHAL" => "azimuthal-equal-area",
        _ => {
            tracing::warn!("unknown projection family: {family}, falling back to mercator");
            "mercator"
        }
    }
}

impl TryFrom<RawTerritory> for Territory {
    type Error = ConfigError;

    fn try_from(raw: RawTerritory) -> Result<Self, Self::Error> {
        let Some(code) = non_empty(&raw.code).map(str::to_string) else {
            return Err(ConfigError::MissingTerritoryCode {
                index: 0,
                territory: raw.name.clone(),
            });
        };
        let projection = raw
            .resolve_projection()
            .ok_or_else(|| ConfigError::MissingProjection {
                code: code.clone(),
                available_fields: raw.present_fields(),
            })?;
        let bounds = raw
            .bounds
            .ok_or_else(|| ConfigError::MissingBounds { code: code.clone() })?;

        Ok(Territory {
            code,
            name: raw.name,
            role: raw.role,
            projection,
            layout: raw.layout,
            bounds: GeoBounds::from_pairs(bounds),
        })
    }
}

impl From<Territory> for RawTerritory {
    fn from(t: Territory) -> Self {
        RawTerritory {
            code: Some(t.code),
            name: t.name,
            role: t.role,
            projection: Some(NestedProjection {
                id: Some(t.projection.id),
                family: t.projection.family,
                parameters: Some(t.projection.parameters),
            }),
            projection_id: None,
            projection_family: None,
            parameters: None,
            layout: t.layout,
            bounds: Some(t.bounds.to_pairs()),
        }
    }
}
