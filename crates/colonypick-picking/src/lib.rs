//! # ColonyPick Picking
//!
//! The picking state machine: visits an immutable plan of dish points one
//! move at a time, gated on the machine draining between moves, with
//! pause/stop/resume semantics that survive an emergency stop.

pub mod engine;
pub mod plan;

pub use engine::{PickState, PickingEngine, PICK_FEEDRATE};
pub use plan::PickPlan;
