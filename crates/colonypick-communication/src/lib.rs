//! # ColonyPick Communication
//!
//! The motion command pipeline's transport layer: serial link ownership,
//! command classification onto per-resource lanes, the lane workers with
//! their acknowledgment discipline, the UI-facing command funnel, and the
//! background response listener.
//!
//! No UI types appear anywhere in this crate; everything reports through
//! the core message dispatcher.

pub mod classify;
pub mod dispatcher;
pub mod funnel;
pub mod listener;
pub mod ports;
pub mod transport;

pub use classify::{classify, is_any, is_jog, is_motion, Lane};
pub use dispatcher::{CommandPredicate, Dispatcher, DispatcherConfig};
pub use funnel::CommandFunnel;
pub use listener::ResponseListener;
pub use ports::{find_device, list_ports, probe, SerialPortInfo, BAUD_CANDIDATES};
pub use transport::{is_ack, ReadWrite, SendOutcome, SerialTransport, DEFAULT_ACK_TIMEOUT};
