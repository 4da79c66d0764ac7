//! # ColonyPick Settings
//!
//! Durable configuration for the operator console: the last-good serial
//! connection, per-camera calibration, and the Marlin parameter set
//! mirrored to the firmware on connect.

pub mod config;
pub mod store;

pub use config::{AxisValues, CameraSettings, MarlinSettings, Settings};
pub use store::SettingsStore;
