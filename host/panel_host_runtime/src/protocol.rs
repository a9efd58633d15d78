//! Messages exchanged with the backend over the duplex channel.

use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::HostResult;
use crate::widget::{Widget, null_as_default};

pub const DEFAULT_ROOT_PAGE: &str = "home";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEnvelope {
    #[serde(rename = "config")]
    Config { data: ConfigPayload },

    #[serde(rename = "now_playing")]
    NowPlaying(NowPlaying),

    #[serde(rename = "telemetry")]
    Telemetry(Telemetry),

    #[serde(other)]
    Unrecognized,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum ClientEnvelope {
    #[serde(rename = "save_layout")]
    SaveLayout {
        #[serde(rename = "pageId")]
        page_id: String,
        layout: Vec<Widget>,
    },

    #[serde(rename = "exec")]
    Exec { action: Value },
}

/// Full widget configuration for this device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigPayload {
    #[serde(default, deserialize_with = "null_as_default")]
    pub pages: IndexMap<String, Vec<Widget>>,
    #[serde(rename = "rootPage", default = "default_root_page", deserialize_with = "root_page")]
    pub root_page: String,
}

impl Default for ConfigPayload {
    fn default() -> Self {
        Self {
            pages: IndexMap::new(),
            root_page: default_root_page(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NowPlaying {
    pub id: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(deserialize_with = "null_as_default")]
    pub artist: String,
    #[serde(deserialize_with = "null_as_default")]
    pub image: String,
    #[serde(deserialize_with = "null_as_default")]
    pub is_playing: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub is_liked: bool,
    /// Null while nothing is loaded in the player.
    #[serde(deserialize_with = "null_as_default")]
    pub progress_ms: u64,
    #[serde(deserialize_with = "null_as_default")]
    pub duration_ms: u64,
}

/// One telemetry sample, keyed by metric name (`cpu`, `ram`, `net_up`, ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Telemetry {
    #[serde(flatten)]
    pub metrics: BTreeMap<String, f64>,
}

impl Telemetry {
    pub fn get(&self, metric: &str) -> Option<f64> {
        self.metrics.get(metric).copied()
    }
}

pub fn save_layout_envelope(page_id: impl Into<String>, layout: Vec<Widget>) -> ClientEnvelope {
    ClientEnvelope::SaveLayout {
        page_id: page_id.into(),
        layout,
    }
}

pub fn exec_envelope(action: Value) -> ClientEnvelope {
    ClientEnvelope::Exec { action }
}

pub fn encode_client_envelope(envelope: &ClientEnvelope) -> HostResult<String> {
    Ok(serde_json::to_string(envelope)?)
}

pub fn decode_server_envelope(payload: &str) -> HostResult<ServerEnvelope> {
    Ok(serde_json::from_str(payload)?)
}

fn default_root_page() -> String {
    DEFAULT_ROOT_PAGE.to_string()
}

fn root_page<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw
        .filter(|page| !page.is_empty())
        .unwrap_or_else(default_root_page))
}
