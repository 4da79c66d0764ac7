//! # ColonyPick Control
//!
//! The intent-level facade every UI producer calls: command builders for
//! the rig's Marlin dialect, the dispatch-path decisions (funnel versus
//! direct transport), the emergency latch policy, and the reconnection and
//! recovery sequences.

pub mod actions;
pub mod gcode;

pub use actions::{ControlActions, ScrubScope};
pub use gcode::{Axis, JogDirection};
