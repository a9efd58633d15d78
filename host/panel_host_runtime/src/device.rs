//! Stable per-installation device identifier.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use tracing::info;

use crate::error::{HostError, HostResult};
use crate::widget::random_base36;

const DEVICE_ID_PREFIX: &str = "device_";
const DEVICE_ID_LEN: usize = 9;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity(String);

impl DeviceIdentity {
    /// Reads the identifier stored at `path`, generating and persisting a new
    /// one on first run.
    pub fn load_or_create(path: &Path) -> HostResult<Self> {
        let device_error = |source: std::io::Error| HostError::Device {
            path: path.to_path_buf(),
            source,
        };

        match fs::read_to_string(path) {
            Ok(raw) if !raw.trim().is_empty() => return Ok(Self(raw.trim().to_string())),
            Ok(_) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => return Err(device_error(err)),
        }

        let identity = Self::generate();
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(device_error)?;
        }
        fs::write(path, &identity.0).map_err(device_error)?;
        info!(device = %identity.0, path = %path.display(), "generated device identifier");
        Ok(identity)
    }

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn generate() -> Self {
        Self(format!("{DEVICE_ID_PREFIX}{}", random_base36(DEVICE_ID_LEN)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}
