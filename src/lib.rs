//! # ColonyPick
//!
//! Operator console for a camera-guided colony picking rig: a camera
//! watches Petri dishes, colony points of interest are selected, and an XY
//! gantry driven by Marlin-class firmware visits each point in sequence.
//!
//! ## Architecture
//!
//! ColonyPick is organized as a workspace with multiple crates:
//!
//! 1. **colonypick-core** - Errors, operator messages, shared machine flags
//! 2. **colonypick-communication** - Serial transport, lane dispatch, funnel
//! 3. **colonypick-control** - Intent-level control facade, Marlin dialect
//! 4. **colonypick-picking** - The picking state machine
//! 5. **colonypick-settings** - Durable configuration
//! 6. **colonypick** - The terminal console binary integrating all crates

pub use colonypick_communication::{
    classify, find_device, is_any, is_jog, is_motion, list_ports, CommandFunnel, Dispatcher,
    DispatcherConfig, Lane, ResponseListener, SerialPortInfo, SerialTransport, BAUD_CANDIDATES,
};
pub use colonypick_control::{Axis, ControlActions, JogDirection, ScrubScope};
pub use colonypick_core::{
    ConnectionError, ControlError, Error, MachineFlags, MachineSnapshot, Message,
    MessageDispatcher, MessageLevel, MessageSink, MotionActions, PickingError, PixelPoint, Result,
};
pub use colonypick_picking::{PickPlan, PickState, PickingEngine, PICK_FEEDRATE};
pub use colonypick_settings::{AxisValues, MarlinSettings, Settings, SettingsStore};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build date (set at compile time)
pub const BUILD_DATE: &str = env!("BUILD_DATE");

/// Initialize logging with the default configuration
///
/// Sets up structured logging with:
/// - Output on stderr, keeping stdout clear for the operator console
/// - RUST_LOG environment variable support
pub fn init_logging() -> anyhow::Result<()> {
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into());

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    Ok(())
}
