//! # ColonyPick Core
//!
//! Core types, errors, and shared state for the ColonyPick operator console.
//! Provides the fundamental abstractions shared by the communication,
//! control, and picking layers: the error taxonomy, the operator message
//! dispatcher, the process-wide machine flags, and the motion service seam.

pub mod error;
pub mod machine;
pub mod message;
pub mod motion;
pub mod point;

pub use error::{ConnectionError, ControlError, Error, PickingError, Result};
pub use machine::{MachineFlags, MachineSnapshot};
pub use message::{Message, MessageDispatcher, MessageLevel, MessageSink, SinkId};
pub use motion::MotionActions;
pub use point::PixelPoint;
