//! Widget descriptors, grid geometry, and the templates used by "add widget".

use std::fmt;
use std::str::FromStr;

use rand::RngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value, json};

use crate::error::HostError;

const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const WIDGET_ID_PREFIX: &str = "w_";
const WIDGET_ID_LEN: usize = 6;

/// Payload key the surface uses to ask for automatic placement.
pub const AUTO_POSITION_KEY: &str = "autoPosition";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum WidgetKind {
    Spotify,
    Grid,
    Gauge,
    Stat,
    /// Any other tag. The raw string is written back untouched.
    Unknown(String),
}

impl From<String> for WidgetKind {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "spotify" => Self::Spotify,
            "grid" => Self::Grid,
            "gauge" => Self::Gauge,
            "stat" => Self::Stat,
            _ => Self::Unknown(raw),
        }
    }
}

impl From<WidgetKind> for String {
    fn from(kind: WidgetKind) -> Self {
        match kind {
            WidgetKind::Spotify => "spotify".to_string(),
            WidgetKind::Grid => "grid".to_string(),
            WidgetKind::Gauge => "gauge".to_string(),
            WidgetKind::Stat => "stat".to_string(),
            WidgetKind::Unknown(raw) => raw,
        }
    }
}

/// Position and size of an item in grid cell units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Geometry {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl Geometry {
    pub const fn new(x: u32, y: u32, w: u32, h: u32) -> Self {
        Self { x, y, w, h }
    }
}

/// One entry of the live geometry reported by the interactive surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacedItem {
    pub id: String,
    #[serde(flatten)]
    pub geometry: Geometry,
}

impl PlacedItem {
    pub fn new(id: impl Into<String>, geometry: Geometry) -> Self {
        Self {
            id: id.into(),
            geometry,
        }
    }
}

/// A placed item on a page, as stored by the backend.
///
/// Everything that is not identity or geometry lives in `extra` and is
/// written back exactly as it was received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Widget {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<WidgetKind>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub x: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub y: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub w: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub h: u32,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Widget {
    pub fn new(id: impl Into<String>, kind: WidgetKind, geometry: Geometry) -> Self {
        Self {
            id: Some(id.into()),
            kind: Some(kind),
            x: geometry.x,
            y: geometry.y,
            w: geometry.w,
            h: geometry.h,
            extra: Map::new(),
        }
    }

    pub fn with_extra(mut self, key: &str, value: Value) -> Self {
        self.extra.insert(key.to_string(), value);
        self
    }

    /// A widget without an id or without a type can never be persisted.
    pub fn is_ghost(&self) -> bool {
        self.id().is_none() || self.kind.is_none()
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref().filter(|id| !id.is_empty())
    }

    pub fn geometry(&self) -> Geometry {
        Geometry::new(self.x, self.y, self.w, self.h)
    }

    /// Overwrites the geometry, returning whether anything changed.
    pub fn set_geometry(&mut self, geometry: Geometry) -> bool {
        if self.geometry() == geometry {
            return false;
        }

        self.x = geometry.x;
        self.y = geometry.y;
        self.w = geometry.w;
        self.h = geometry.h;
        true
    }

    pub fn metric(&self) -> Option<&str> {
        self.extra.get("metric").and_then(Value::as_str)
    }

    pub fn label(&self) -> Option<&str> {
        self.extra.get("label").and_then(Value::as_str)
    }

    /// Buttons of a `grid` widget. Malformed entries are skipped.
    pub fn buttons(&self) -> Vec<GridButton> {
        self.extra
            .get("buttons")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| serde_json::from_value(item.clone()).ok())
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridButton {
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub action: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accent: Option<String>,
}

/// Widget types offered by the "add widget" menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WidgetTemplate {
    Cpu,
    Ram,
    Temp,
    Spotify,
}

impl WidgetTemplate {
    pub const ALL: [WidgetTemplate; 4] = [Self::Cpu, Self::Ram, Self::Temp, Self::Spotify];

    pub fn name(self) -> &'static str {
        match self {
            Self::Cpu => "cpu",
            Self::Ram => "ram",
            Self::Temp => "temp",
            Self::Spotify => "spotify",
        }
    }

    /// Builds a new widget with this template's defaults. Geometry starts at
    /// the origin; the surface picks the real spot.
    pub fn instantiate(self, id: impl Into<String>) -> Widget {
        let id = id.into();
        match self {
            Self::Cpu => gauge(id, "cpu", "CPU Load"),
            Self::Ram => gauge(id, "ram", "RAM Usage"),
            Self::Temp => gauge(id, "temp", "Temp"),
            Self::Spotify => Widget::new(id, WidgetKind::Spotify, Geometry::new(0, 0, 4, 2)),
        }
    }
}

fn gauge(id: String, metric: &str, label: &str) -> Widget {
    Widget::new(id, WidgetKind::Gauge, Geometry::new(0, 0, 2, 2))
        .with_extra("metric", json!(metric))
        .with_extra("label", json!(label))
}

impl FromStr for WidgetTemplate {
    type Err = HostError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|template| template.name() == raw)
            .ok_or_else(|| HostError::UnknownTemplate(raw.to_string()))
    }
}

impl fmt::Display for WidgetTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub fn new_widget_id() -> String {
    format!("{WIDGET_ID_PREFIX}{}", random_base36(WIDGET_ID_LEN))
}

pub(crate) fn random_base36(len: usize) -> String {
    let mut buf = vec![0_u8; len];
    OsRng.fill_bytes(&mut buf);
    buf.iter()
        .map(|byte| char::from(BASE36[usize::from(*byte) % BASE36.len()]))
        .collect()
}

/// Treats an explicit `null` like a missing field. Profiles written by older
/// backends carry `null` geometry and page maps.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}
