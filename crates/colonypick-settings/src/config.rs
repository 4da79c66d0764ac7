//! Configuration model for ColonyPick
//!
//! Provides the durable settings schema and file I/O. Supports JSON and
//! TOML files stored in the platform configuration directory.
//!
//! Settings are organized into logical sections:
//! - Connection (last-good port and baud)
//! - Per-camera calibration
//! - Marlin parameter set mirrored to the firmware on connect

use colonypick_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Per-axis scalar values for Marlin parameters
///
/// Axes left unset are omitted from the generated firmware command.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AxisValues {
    /// X axis value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    /// Y axis value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    /// Z axis value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z: Option<f64>,
    /// Extruder axis value (unused by the gantry but accepted by Marlin)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub e: Option<f64>,
}

impl AxisValues {
    /// True when no axis is set
    pub fn is_empty(&self) -> bool {
        self.x.is_none() && self.y.is_none() && self.z.is_none() && self.e.is_none()
    }

    /// Iterate `(letter, value)` pairs for the axes that are set
    pub fn entries(&self) -> impl Iterator<Item = (char, f64)> {
        [('X', self.x), ('Y', self.y), ('Z', self.z), ('E', self.e)]
            .into_iter()
            .filter_map(|(letter, value)| value.map(|v| (letter, v)))
    }
}

/// Marlin parameters mirrored to the firmware after every connect
///
/// Each field maps onto one firmware command; unset fields are skipped.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarlinSettings {
    /// Steps per millimetre per axis (`M92`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub steps_per_mm: Option<AxisValues>,
    /// Stepper driver current, one scalar applied to each axis (`M906`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub motor_current: Option<f64>,
    /// Print and travel acceleration (`M204 P… T…`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acceleration: Option<f64>,
    /// Jerk limits per axis (`M205`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jerk: Option<AxisValues>,
    /// Maximum feedrate per axis (`M203`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_feedrate: Option<AxisValues>,
    /// Maximum acceleration per axis (`M201`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_acceleration: Option<AxisValues>,
    /// Default feedrate applied with a bare `G1 F…`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedrate: Option<f64>,
    /// Logical home position (`G92`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub home_position: Option<AxisValues>,
}

/// Per-camera calibration
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CameraSettings {
    /// Image pixels per physical centimetre on the dish plane
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pixel_per_cm: Option<f64>,
}

/// Complete durable application settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Port of the last successful handshake
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_port: Option<String>,
    /// Baud rate of the last successful handshake
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baud: Option<u32>,
    /// Calibration per camera index
    #[serde(default)]
    pub camera_settings: HashMap<String, CameraSettings>,
    /// UI hint only: open the pipeline view fullscreen
    #[serde(default)]
    pub pipeline_fullscreen: bool,
    /// Marlin parameter set mirrored on connect
    #[serde(default)]
    pub marlin_settings: MarlinSettings,
}

impl Settings {
    /// Create settings with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Platform default settings file location
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("colonypick")
            .join("settings.json")
    }

    /// Load settings from file (JSON or TOML)
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::other(format!("Failed to read settings file: {}", e)))?;

        let settings: Self = if path.extension().is_some_and(|ext| ext == "toml") {
            toml::from_str(&content)
                .map_err(|e| Error::other(format!("Invalid TOML settings: {}", e)))?
        } else {
            serde_json::from_str(&content)
                .map_err(|e| Error::other(format!("Invalid JSON settings: {}", e)))?
        };

        settings.validate()?;
        Ok(settings)
    }

    /// Save settings to file (JSON or TOML)
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        self.validate()?;

        let content = if path.extension().is_some_and(|ext| ext == "toml") {
            toml::to_string_pretty(self)
                .map_err(|e| Error::other(format!("Failed to serialize settings: {}", e)))?
        } else {
            serde_json::to_string_pretty(self)
                .map_err(|e| Error::other(format!("Failed to serialize settings: {}", e)))?
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::other(format!("Failed to create settings dir: {}", e)))?;
        }
        std::fs::write(path, content)
            .map_err(|e| Error::other(format!("Failed to write settings file: {}", e)))?;

        Ok(())
    }

    /// Validate the settings
    pub fn validate(&self) -> Result<()> {
        if let Some(baud) = self.baud {
            if baud == 0 {
                return Err(Error::other("Baud rate must be > 0".to_string()));
            }
        }

        for (index, camera) in &self.camera_settings {
            if let Some(scale) = camera.pixel_per_cm {
                if scale <= 0.0 {
                    return Err(Error::other(format!(
                        "Camera {} pixel_per_cm must be > 0",
                        index
                    )));
                }
            }
        }

        Ok(())
    }
}
