//! Control Actions facade
//!
//! The single API every UI producer goes through. Builds the command
//! strings, decides whether each goes through the funnel or straight to
//! the transport, owns the emergency latch policy, and runs the
//! reconnection and recovery sequences.
//!
//! While the emergency latch is set, everything except
//! `recover_from_emergency`, `reconnect_saved`, `query_settings`, and
//! `emergency_stop` itself is refused with a logged warning.

use crate::gcode::{self, Axis, JogDirection};
use colonypick_communication::{
    classify, find_device, CommandFunnel, CommandPredicate, Dispatcher, DispatcherConfig,
    ResponseListener, SerialTransport,
};
use colonypick_core::{
    ControlError, MachineFlags, MachineSnapshot, MessageDispatcher, MotionActions, PixelPoint,
    Result,
};
use colonypick_settings::{AxisValues, SettingsStore};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Minimum spacing between jog log entries. Held jog buttons repeat-fire
/// at ~4 Hz; every command still transmits, only the log is thinned.
const JOG_LOG_INTERVAL: Duration = Duration::from_millis(250);

/// Which queued commands a scrub removes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrubScope {
    /// Only relative jog pairs
    Jog,
    /// Every motion command
    Motion,
    /// Everything queued
    All,
}

impl ScrubScope {
    fn predicate(self) -> Option<CommandPredicate> {
        match self {
            ScrubScope::Jog => Some(classify::is_jog),
            ScrubScope::Motion => Some(classify::is_motion),
            ScrubScope::All => None,
        }
    }
}

/// The worker set torn down and rebuilt on every (re)connect
struct Pipeline {
    dispatcher: Arc<Dispatcher>,
    funnel: Arc<CommandFunnel>,
    listener: ResponseListener,
}

/// Intent-level service facade over the motion command pipeline
pub struct ControlActions {
    transport: Arc<SerialTransport>,
    flags: Arc<MachineFlags>,
    messages: Arc<MessageDispatcher>,
    settings: Mutex<SettingsStore>,
    pipeline: Mutex<Option<Pipeline>>,
    dispatcher_config: DispatcherConfig,
    jog_log_gate: Mutex<Option<Instant>>,
}

impl ControlActions {
    /// Create the facade; no pipeline runs until a connect
    pub fn new(
        transport: Arc<SerialTransport>,
        flags: Arc<MachineFlags>,
        messages: Arc<MessageDispatcher>,
        settings: SettingsStore,
    ) -> Arc<Self> {
        Self::with_config(
            transport,
            flags,
            messages,
            settings,
            DispatcherConfig::default(),
        )
    }

    /// Create the facade with dispatcher tuning (tests shorten the ack
    /// deadline)
    pub fn with_config(
        transport: Arc<SerialTransport>,
        flags: Arc<MachineFlags>,
        messages: Arc<MessageDispatcher>,
        settings: SettingsStore,
        dispatcher_config: DispatcherConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            transport,
            flags,
            messages,
            settings: Mutex::new(settings),
            pipeline: Mutex::new(None),
            dispatcher_config,
            jog_log_gate: Mutex::new(None),
        })
    }

    // ----- connection management -------------------------------------

    /// Open `port` at `baud`, record the pair as the saved connection,
    /// start the worker set, and mirror the stored Marlin parameters.
    pub fn connect(&self, port: &str, baud: u32) -> Result<()> {
        self.teardown_pipeline();
        self.transport.close();
        self.transport.open(port, baud)?;

        if let Err(e) = self.settings.lock().record_connection(port, baud) {
            self.messages
                .warn(format!("Could not persist connection settings: {}", e));
        }

        self.start_pipeline();
        self.mirror_marlin_settings();
        self.messages.info(format!("Connected to {} @ {}", port, baud));
        Ok(())
    }

    /// Reconnect using the last-good `(port, baud)`.
    ///
    /// When that fails and `fallback` is set, every candidate port is
    /// scanned against every candidate baud rate. Allowed while latched.
    pub fn reconnect_saved(&self, fallback: bool) -> Result<()> {
        let saved = self.settings.lock().saved_connection();
        if let Some((port, baud)) = saved {
            match self.connect(&port, baud) {
                Ok(()) => return Ok(()),
                Err(e) => self.messages.warn(format!(
                    "Saved connection {} @ {} failed: {}",
                    port, baud, e
                )),
            }
        }

        if !fallback {
            return Err(colonypick_core::ConnectionError::NoDeviceFound.into());
        }

        let (port, baud) = find_device()?;
        self.connect(&port, baud)
    }

    /// Tear down the workers and release the link
    pub fn disconnect(&self) {
        self.teardown_pipeline();
        self.transport.close();
        self.messages.info("Disconnected");
    }

    /// Spawn the dispatcher, funnel, and response listener over the
    /// current link. Public so a link attached by other means (tests,
    /// loopback rigs) can get a working pipeline.
    pub fn start_pipeline(&self) {
        self.teardown_pipeline();
        let dispatcher = Dispatcher::start_with_config(
            self.transport.clone(),
            self.flags.clone(),
            self.messages.clone(),
            self.dispatcher_config.clone(),
        );
        let funnel = CommandFunnel::start(dispatcher.clone());
        let listener = ResponseListener::start(
            self.transport.clone(),
            self.flags.clone(),
            self.messages.clone(),
        );
        *self.pipeline.lock() = Some(Pipeline {
            dispatcher,
            funnel,
            listener,
        });
    }

    /// Stop the worker set; in-flight commands are abandoned
    fn teardown_pipeline(&self) {
        if let Some(pipeline) = self.pipeline.lock().take() {
            pipeline.funnel.shutdown();
            pipeline.dispatcher.shutdown();
            pipeline.listener.stop();
        }
        self.flags.reset_pending();
    }

    /// Whether the dispatcher, funnel, and listener are all alive
    pub fn workers_alive(&self) -> bool {
        self.pipeline.lock().as_ref().is_some_and(|pipeline| {
            pipeline.dispatcher.is_running()
                && pipeline.funnel.is_running()
                && pipeline.listener.is_alive()
        })
    }

    /// Point-in-time machine state for UI queries
    pub fn snapshot(&self) -> MachineSnapshot {
        self.flags.snapshot()
    }

    // ----- command producers ------------------------------------------

    /// Relative jog from a held direction button.
    ///
    /// Every call enqueues a command; the log line is debounced so a
    /// repeat-firing button does not flood the console.
    pub fn manual_jog(&self, direction: JogDirection, step_mm: f64, feedrate: u32) -> Result<()> {
        self.refuse_if_latched("manual_jog")?;
        self.submit_via_funnel(gcode::relative_jog(direction, step_mm, feedrate))?;

        let mut gate = self.jog_log_gate.lock();
        let due = gate.map_or(true, |last| last.elapsed() >= JOG_LOG_INTERVAL);
        if due {
            *gate = Some(Instant::now());
            self.messages
                .info(format!("Jog {} by {}mm", direction, step_mm));
        }
        Ok(())
    }

    /// Absolute combined-axis move in machine millimetres
    pub fn move_xy(&self, x: f64, y: f64, feedrate: u32) -> Result<()> {
        self.refuse_if_latched("move_xy")?;
        self.submit_via_funnel(gcode::absolute_move(x, y, feedrate))
    }

    /// Set the ring-light PWM. Clamps to `[0, 255]`; refused while
    /// disconnected because a stale LED state is worse than none.
    pub fn led_pwm(&self, value: i32) -> Result<()> {
        self.refuse_if_latched("led_pwm")?;
        if !self.flags.is_connected() {
            self.messages.error("Cannot set LED: not connected");
            return Err(ControlError::NotConnected {
                operation: "led_pwm".to_string(),
            }
            .into());
        }
        self.submit_via_funnel(gcode::led_pwm(value))
    }

    /// Home the given axes (all when empty)
    pub fn home(&self, axes: &[Axis]) -> Result<()> {
        self.refuse_if_latched("home")?;
        self.submit_via_funnel(gcode::home(axes))
    }

    /// Unconditional firmware pause
    pub fn pause(&self) -> Result<()> {
        self.refuse_if_latched("pause")?;
        self.submit_via_funnel(gcode::PAUSE)
    }

    /// Break out of a firmware pause
    pub fn resume(&self) -> Result<()> {
        self.refuse_if_latched("resume")?;
        self.submit_via_funnel(gcode::RESUME)
    }

    /// Ask the firmware to report its stored parameters. Allowed while
    /// latched: reading state is part of diagnosing a stop.
    pub fn query_settings(&self) -> Result<()> {
        self.submit_via_funnel(gcode::QUERY_SETTINGS)
    }

    /// Report current position
    pub fn query_position(&self) -> Result<()> {
        self.refuse_if_latched("query_position")?;
        self.submit_via_funnel(gcode::QUERY_POSITION)
    }

    /// Report endstop states
    pub fn query_endstops(&self) -> Result<()> {
        self.refuse_if_latched("query_endstops")?;
        self.submit_via_funnel(gcode::QUERY_ENDSTOPS)
    }

    /// Update steps-per-millimetre
    pub fn set_steps(&self, axes: &AxisValues) -> Result<()> {
        self.refuse_if_latched("set_steps")?;
        self.submit_via_funnel(gcode::steps_per_mm(axes))
    }

    /// Persist the firmware parameter set to EEPROM
    pub fn save_settings(&self) -> Result<()> {
        self.refuse_if_latched("save_settings")?;
        self.submit_via_funnel(gcode::SAVE_SETTINGS)
    }

    /// Enable or disable firmware soft endstops
    pub fn soft_endstops(&self, enabled: bool) -> Result<()> {
        self.refuse_if_latched("soft_endstops")?;
        self.submit_via_funnel(gcode::soft_endstops(enabled))
    }

    /// Re-enable steppers after a manual reposition
    pub fn enable_steppers(&self) -> Result<()> {
        self.refuse_if_latched("enable_steppers")?;
        self.submit_via_funnel(gcode::STEPPERS_ON)
    }

    /// Disable steppers so the gantry can be moved by hand
    pub fn disable_steppers(&self) -> Result<()> {
        self.refuse_if_latched("disable_steppers")?;
        self.submit_via_funnel(gcode::STEPPERS_OFF)
    }

    /// Direct digital/PWM pin write (vacuum pump, dish illumination)
    pub fn pin_write(&self, pin: u8, value: u8) -> Result<()> {
        self.refuse_if_latched("pin_write")?;
        self.submit_via_funnel(gcode::pin_write(pin, value))
    }

    // ----- emergency stop and recovery --------------------------------

    /// Emergency stop.
    ///
    /// Latches, writes `M112` on the lowest-level path so it preempts
    /// everything queued, then scrubs the funnel and every lane. With
    /// `send_reset`, follows up with `M999` and clears the latch only when
    /// that dispatch succeeds.
    pub fn emergency_stop(&self, context: Option<&str>, send_reset: bool) -> Result<()> {
        self.flags.latch();
        // The stop write can wait behind an in-flight ack on the link
        // mutex; empty the queues first so no queued move follows it out.
        self.scrub_everything();
        let wrote = self.transport.send_line(gcode::EMERGENCY_STOP);
        match context {
            Some(context) => self.messages.error(format!("EMERGENCY STOP ({})", context)),
            None => self.messages.error("EMERGENCY STOP"),
        }
        if let Err(e) = &wrote {
            self.messages
                .error(format!("Emergency stop write failed: {}", e));
        }
        self.scrub_everything();

        if send_reset && wrote.is_ok() {
            self.transport.send_line(gcode::RESET)?;
            self.flags.unlatch();
        }
        wrote
    }

    /// Recovery from an emergency stop.
    ///
    /// Reconnects if the link or the workers are gone, clears the halt
    /// with `M999`, drops the latch, and scrubs the queues one final time.
    pub fn recover_from_emergency(&self) -> Result<()> {
        if !self.transport.is_connected() || !self.workers_alive() {
            self.reconnect_saved(true)?;
        }
        if self.flags.is_latched() {
            self.transport.send_line(gcode::RESET)?;
        }
        self.flags.unlatch();
        self.scrub_everything();
        if !self.workers_alive() {
            self.reconnect_saved(true)?;
        }
        self.messages.info("Recovered from emergency stop");
        Ok(())
    }

    /// Apply a named scrub to the funnel and every lane queue.
    ///
    /// Allowed while latched: scrubbing transmits nothing and is part of
    /// every recovery path. Returns how many commands were removed.
    pub fn clear_pending(&self, scope: ScrubScope) -> usize {
        let predicate = scope.predicate();
        let mut removed = 0;
        if let Some(pipeline) = self.pipeline.lock().as_ref() {
            removed += pipeline.funnel.scrub(predicate);
            removed += pipeline.dispatcher.scrub(predicate);
        }
        if matches!(scope, ScrubScope::All) {
            self.flags.reset_pending();
        }
        if removed > 0 {
            tracing::debug!("Scrubbed {} queued command(s) ({:?})", removed, scope);
        }
        removed
    }

    // ----- internals --------------------------------------------------

    fn scrub_everything(&self) {
        self.clear_pending(ScrubScope::All);
    }

    fn refuse_if_latched(&self, operation: &str) -> Result<()> {
        if self.flags.is_latched() {
            self.messages
                .warn(format!("Refused {}: emergency latch is set", operation));
            return Err(ControlError::LatchRefused {
                operation: operation.to_string(),
            }
            .into());
        }
        Ok(())
    }

    fn submit_via_funnel(&self, command: impl Into<String>) -> Result<()> {
        match self.pipeline.lock().as_ref() {
            Some(pipeline) => {
                pipeline.funnel.submit(command.into());
                Ok(())
            }
            None => Err(ControlError::PipelineDown.into()),
        }
    }

    /// Mirror the stored Marlin parameter set onto the firmware, straight
    /// through the dispatcher's control lane
    fn mirror_marlin_settings(&self) {
        let commands = gcode::marlin_commands(self.settings.lock().marlin());
        if commands.is_empty() {
            return;
        }
        let pipeline = self.pipeline.lock();
        let Some(pipeline) = pipeline.as_ref() else {
            return;
        };
        for command in &commands {
            pipeline.dispatcher.submit(command);
        }
        self.messages
            .info(format!("Mirrored {} Marlin parameter(s)", commands.len()));
    }
}

impl MotionActions for ControlActions {
    /// Move to a dish point. Pixel coordinates are translated to machine
    /// millimetres through the camera calibration when one is configured;
    /// otherwise they are taken as millimetres directly.
    fn move_to(&self, point: PixelPoint, feedrate: u32) -> Result<()> {
        let scale = self.settings.lock().pixel_per_cm(0);
        let (x, y) = match scale {
            Some(pixel_per_cm) => (
                f64::from(point.x) / pixel_per_cm * 10.0,
                f64::from(point.y) / pixel_per_cm * 10.0,
            ),
            None => (f64::from(point.x), f64::from(point.y)),
        };
        self.move_xy(x, y, feedrate)
    }

    fn emergency_stop(&self, context: &str) -> Result<()> {
        ControlActions::emergency_stop(self, Some(context), false)
    }

    fn recover_from_emergency(&self) -> Result<()> {
        ControlActions::recover_from_emergency(self)
    }

    fn clear_pending_motion(&self) -> usize {
        self.clear_pending(ScrubScope::Motion)
    }
}

impl Drop for ControlActions {
    fn drop(&mut self) {
        self.teardown_pipeline();
    }
}
