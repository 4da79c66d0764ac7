//! Process-wide machine state flags.
//!
//! Three facts about the rig are shared by every layer: whether the link is
//! up, whether the emergency latch is set, and how many motion commands are
//! still unacknowledged. They are plain atomics so UI state queries never
//! take a lock.
//!
//! Writers are well-defined: the transport flips `connected` (and sets the
//! latch on I/O failure), the dispatcher maintains `pending_motion`, and the
//! control facade owns latch set/clear during stop and recovery.

use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// Shared machine state flags
#[derive(Debug, Default)]
pub struct MachineFlags {
    connected: AtomicBool,
    latched: AtomicBool,
    pending_motion: AtomicU32,
}

/// Point-in-time copy of the flags, for UI state queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MachineSnapshot {
    /// Whether a serial link is open and handshaken
    pub connected: bool,
    /// Whether the emergency latch is set
    pub emergency_latched: bool,
    /// Motion commands submitted but not yet acknowledged
    pub pending_motion: u32,
}

impl MachineFlags {
    /// Create flags for a disconnected, unlatched machine
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a serial link is open
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Record a connection state transition
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::Release);
    }

    /// Whether the emergency latch is set
    pub fn is_latched(&self) -> bool {
        self.latched.load(Ordering::Acquire)
    }

    /// Set the emergency latch
    pub fn latch(&self) {
        self.latched.store(true, Ordering::Release);
    }

    /// Clear the emergency latch
    pub fn unlatch(&self) {
        self.latched.store(false, Ordering::Release);
    }

    /// Number of motion commands submitted but not yet acknowledged
    pub fn pending_motion(&self) -> u32 {
        self.pending_motion.load(Ordering::Acquire)
    }

    /// Record that a motion command entered an acknowledgment-gated lane
    pub fn motion_enqueued(&self) {
        self.pending_motion.fetch_add(1, Ordering::AcqRel);
    }

    /// Record that a motion command finished its wait.
    ///
    /// Saturates at zero: a late `ok` drained by the response listener after
    /// the lane worker already gave up on the same command must not
    /// underflow the counter.
    pub fn motion_completed(&self) {
        let _ = self
            .pending_motion
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
    }

    /// Discard all pending motion accounting (disconnect, emergency stop)
    pub fn reset_pending(&self) {
        self.pending_motion.store(0, Ordering::Release);
    }

    /// Copy the flags for a UI state query
    pub fn snapshot(&self) -> MachineSnapshot {
        MachineSnapshot {
            connected: self.is_connected(),
            emergency_latched: self.is_latched(),
            pending_motion: self.pending_motion(),
        }
    }
}
