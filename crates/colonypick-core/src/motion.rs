//! Motion service seam.
//!
//! The picking engine never touches the transport or the dispatcher; it
//! drives the machine through this trait. The control facade is the one
//! production implementation, and tests substitute a mock.

use crate::error::Result;
use crate::point::PixelPoint;

/// Intent-level motion operations required by the picking engine
pub trait MotionActions: Send + Sync {
    /// Issue an absolute combined-axis move to a dish point.
    ///
    /// The call only enqueues; completion is observed through the shared
    /// pending-motion counter.
    fn move_to(&self, point: PixelPoint, feedrate: u32) -> Result<()>;

    /// Trigger an emergency stop, latching the machine.
    fn emergency_stop(&self, context: &str) -> Result<()>;

    /// Run the recovery sequence: reconnect if needed, clear the latch,
    /// scrub the queues.
    fn recover_from_emergency(&self) -> Result<()>;

    /// Drop every queued motion command; returns how many were removed.
    fn clear_pending_motion(&self) -> usize;
}
