//! The persisted position record.
//!
//! A small human-readable JSON file holding the current X/Y/Z coordinates in
//! mm. Read once at startup, written once at shutdown; a cancelled run
//! therefore keeps the last persisted record.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Current machine position in mm.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    #[serde(rename = "X")]
    pub x: f64,
    #[serde(rename = "Y")]
    pub y: f64,
    #[serde(rename = "Z")]
    pub z: f64,
}

impl Position {
    /// Read the record, treating a missing file as the origin (first run).
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("no position record at {}, assuming origin", path.display());
            return Ok(Self::default());
        }
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read position record {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("malformed position record {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let text = serde_json::to_string_pretty(self).context("failed to encode position")?;
        fs::write(path, text)
            .with_context(|| format!("failed to write position record {}", path.display()))
    }
}
