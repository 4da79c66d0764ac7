//! Settings store
//!
//! Wraps the [`Settings`] model with a file location and the operations the
//! rest of the application needs: load-or-default at startup, save after
//! changes, and recording the last-good connection after every successful
//! handshake so reconnection is deterministic.

use crate::config::{MarlinSettings, Settings};
use colonypick_core::Result;
use std::path::{Path, PathBuf};

/// Durable settings with their on-disk location
#[derive(Debug, Clone)]
pub struct SettingsStore {
    settings: Settings,
    path: PathBuf,
}

impl SettingsStore {
    /// Load settings from `path`, falling back to defaults when the file is
    /// missing or unreadable (a corrupt file is logged, not fatal).
    pub fn load_or_default(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let settings = if path.exists() {
            match Settings::load_from_file(&path) {
                Ok(settings) => settings,
                Err(e) => {
                    tracing::warn!("Ignoring unreadable settings file {}: {}", path.display(), e);
                    Settings::default()
                }
            }
        } else {
            Settings::default()
        };
        Self { settings, path }
    }

    /// Create a store around in-memory settings (tests, ephemeral runs)
    pub fn in_memory(settings: Settings, path: impl Into<PathBuf>) -> Self {
        Self {
            settings,
            path: path.into(),
        }
    }

    /// Persist the current settings
    pub fn save(&self) -> Result<()> {
        self.settings.save_to_file(&self.path)
    }

    /// The on-disk location
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read access to the settings
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Write access to the settings; callers are responsible for `save()`
    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    /// The `(port, baud)` pair of the last successful handshake
    pub fn saved_connection(&self) -> Option<(String, u32)> {
        match (&self.settings.selected_port, self.settings.baud) {
            (Some(port), Some(baud)) => Some((port.clone(), baud)),
            _ => None,
        }
    }

    /// Record a successful handshake and persist it immediately
    pub fn record_connection(&mut self, port: &str, baud: u32) -> Result<()> {
        self.settings.selected_port = Some(port.to_string());
        self.settings.baud = Some(baud);
        self.save()
    }

    /// Calibration scale for a camera index, if configured
    pub fn pixel_per_cm(&self, camera_index: u32) -> Option<f64> {
        self.settings
            .camera_settings
            .get(&camera_index.to_string())
            .and_then(|camera| camera.pixel_per_cm)
    }

    /// The Marlin parameter set mirrored on connect
    pub fn marlin(&self) -> &MarlinSettings {
        &self.settings.marlin_settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AxisValues, CameraSettings};

    #[test]
    fn saved_connection_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");

        let mut store = SettingsStore::load_or_default(&path);
        assert_eq!(store.saved_connection(), None);

        store.record_connection("/dev/ttyUSB0", 250_000).unwrap();

        let reloaded = SettingsStore::load_or_default(&path);
        assert_eq!(
            reloaded.saved_connection(),
            Some(("/dev/ttyUSB0".to_string(), 250_000))
        );
    }

    #[test]
    fn toml_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");

        let mut store = SettingsStore::load_or_default(&path);
        store.settings_mut().marlin_settings.steps_per_mm = Some(AxisValues {
            x: Some(80.0),
            y: Some(80.0),
            z: Some(400.0),
            e: None,
        });
        store.settings_mut().pipeline_fullscreen = true;
        store.save().unwrap();

        let reloaded = SettingsStore::load_or_default(&path);
        assert_eq!(reloaded.settings(), store.settings());
    }

    #[test]
    fn corrupt_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{not json").unwrap();

        let store = SettingsStore::load_or_default(&path);
        assert_eq!(store.settings(), &Settings::default());
    }

    #[test]
    fn camera_scale_lookup_by_index() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = SettingsStore::load_or_default(dir.path().join("settings.json"));
        store.settings_mut().camera_settings.insert(
            "1".to_string(),
            CameraSettings {
                pixel_per_cm: Some(42.5),
            },
        );
        assert_eq!(store.pixel_per_cm(1), Some(42.5));
        assert_eq!(store.pixel_per_cm(0), None);
    }
}
