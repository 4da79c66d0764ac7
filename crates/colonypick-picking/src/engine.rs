//! Picking state machine
//!
//! Visits the plan's targets one at a time with a strict discipline: a move
//! is issued only after the previous one has fully drained out of the
//! machine. The engine is an explicit state value driven by a periodic
//! `step()` from the host's scheduler (~10 Hz); it never blocks, and all
//! its I/O goes through the [`MotionActions`] seam, which only enqueues.
//!
//! Stop semantics: `stop()` fires an emergency stop and latches the
//! machine; `resume_after_stop()` must run a successful recovery before
//! the run continues, and the point whose move was cut short is issued
//! again.

use crate::plan::PickPlan;
use colonypick_core::{
    MachineFlags, MessageDispatcher, MotionActions, PickingError, Result,
};
use std::sync::Arc;

/// Feedrate for every picking move, in mm/min
pub const PICK_FEEDRATE: u32 = 6000;

/// Externally observable engine state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickState {
    /// No run active
    Idle,
    /// Advancing through the plan
    Running,
    /// A move is in flight; waiting for the machine to drain
    AwaitingDrain,
    /// Paused by the operator; `toggle_pause` resumes
    Paused,
    /// Emergency-stopped; `resume_after_stop` may continue
    Stopped,
    /// Every target visited
    Done,
}

/// Cooperative state machine that visits a plan point by point
pub struct PickingEngine {
    plan: PickPlan,
    actions: Arc<dyn MotionActions>,
    flags: Arc<MachineFlags>,
    messages: Arc<MessageDispatcher>,
    state: PickState,
    /// Index of the most recently issued target; -1 before the first
    index: i64,
    /// Whether the pause interrupted an in-flight move
    paused_awaiting: bool,
    reconnect_required: bool,
    resume_available: bool,
}

impl PickingEngine {
    /// Create an idle engine over a plan.
    ///
    /// The plan is captured by value: later edits in the UI do not affect
    /// a run in progress.
    pub fn new(
        plan: PickPlan,
        actions: Arc<dyn MotionActions>,
        flags: Arc<MachineFlags>,
        messages: Arc<MessageDispatcher>,
    ) -> Self {
        Self {
            plan,
            actions,
            flags,
            messages,
            state: PickState::Idle,
            index: -1,
            paused_awaiting: false,
            reconnect_required: false,
            resume_available: false,
        }
    }

    /// Current state
    pub fn state(&self) -> PickState {
        self.state
    }

    /// Index of the most recently issued target (-1 before the first)
    pub fn index(&self) -> i64 {
        self.index
    }

    /// Whether a stop left the machine needing a reconnect
    pub fn reconnect_required(&self) -> bool {
        self.reconnect_required
    }

    /// Whether a stopped run can be resumed
    pub fn resume_available(&self) -> bool {
        self.resume_available
    }

    /// Begin a run from the first target.
    ///
    /// Fails on an empty plan or when a run is already active. Runs the
    /// recovery sequence first if the machine is latched.
    pub fn start(&mut self) -> Result<()> {
        if self.plan.is_empty() {
            return Err(PickingError::NoPlan.into());
        }
        if matches!(
            self.state,
            PickState::Running | PickState::AwaitingDrain | PickState::Paused
        ) {
            return Err(PickingError::AlreadyRunning.into());
        }
        if self.flags.is_latched() {
            self.actions.recover_from_emergency()?;
        }

        self.index = -1;
        self.paused_awaiting = false;
        self.reconnect_required = false;
        self.resume_available = false;
        self.state = PickState::Running;
        self.messages
            .info(format!("Picking {} ROI position(s)", self.plan.len()));
        Ok(())
    }

    /// One scheduler tick.
    ///
    /// Issues at most one move, and only once the previous move has
    /// drained (`pending_motion == 0`).
    pub fn step(&mut self) {
        match self.state {
            PickState::Running => {}
            PickState::AwaitingDrain => {
                if self.flags.pending_motion() > 0 {
                    return;
                }
                self.state = PickState::Running;
            }
            _ => return,
        }

        self.index += 1;
        let next = self.index as usize;
        if next >= self.plan.len() {
            if self.flags.pending_motion() > 0 {
                // Final move still in flight.
                self.index = self.plan.len() as i64 - 1;
                self.state = PickState::AwaitingDrain;
                return;
            }
            self.state = PickState::Done;
            self.messages.info("All ROI positions visited.");
            return;
        }

        let point = self.plan.get(next).expect("index bounded by len");
        match self.actions.move_to(point, PICK_FEEDRATE) {
            Ok(()) => {
                tracing::debug!("Issued move {} of {} to {}", next + 1, self.plan.len(), point);
                self.state = PickState::AwaitingDrain;
            }
            Err(e) => {
                self.messages
                    .error(format!("Move to {} failed: {}; stopping run", point, e));
                // The move never went out; rewind so a resume retries it.
                self.resume_available = self.index >= 0;
                self.index -= 1;
                self.state = PickState::Stopped;
            }
        }
    }

    /// Pause or resume the run
    pub fn toggle_pause(&mut self) {
        match self.state {
            PickState::Running | PickState::AwaitingDrain => {
                self.paused_awaiting = self.state == PickState::AwaitingDrain;
                self.state = PickState::Paused;
                self.messages.info("Picking paused");
            }
            PickState::Paused => {
                self.state = if self.paused_awaiting {
                    PickState::AwaitingDrain
                } else {
                    PickState::Running
                };
                self.messages.info("Picking resumed");
            }
            _ => {}
        }
    }

    /// Emergency-stop the run.
    ///
    /// Fires the machine emergency stop (latching it), drops every queued
    /// motion command, and records whether a resume is possible. The point
    /// whose move was interrupted will be issued again on resume.
    pub fn stop(&mut self) {
        if self.state == PickState::Stopped {
            return;
        }
        let had_run = matches!(
            self.state,
            PickState::Running | PickState::AwaitingDrain | PickState::Paused
        );

        if let Err(e) = self.actions.emergency_stop("picking stop") {
            self.messages
                .warn(format!("Emergency stop reported: {}", e));
        }
        self.actions.clear_pending_motion();

        self.resume_available = had_run && self.index >= 0;
        // An in-flight move did not complete; revisit its target.
        let interrupted = self.state == PickState::AwaitingDrain
            || (self.state == PickState::Paused && self.paused_awaiting);
        if interrupted {
            self.index -= 1;
        }
        self.reconnect_required = true;
        self.paused_awaiting = false;
        self.state = PickState::Stopped;
        self.messages.info("Picking stopped");
    }

    /// Continue a stopped run.
    ///
    /// Requires the recovery sequence to succeed; the index is kept, so
    /// the next tick issues the point that did not complete.
    pub fn resume_after_stop(&mut self) -> Result<()> {
        if self.state != PickState::Stopped || !self.resume_available {
            return Err(PickingError::NotResumable.into());
        }
        self.actions.recover_from_emergency()?;
        self.reconnect_required = false;
        self.state = PickState::Running;
        self.messages.info("Picking resumed after stop");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use colonypick_core::{Error, PixelPoint};
    use parking_lot::Mutex;

    #[derive(Default)]
    struct MockActions {
        moves: Mutex<Vec<PixelPoint>>,
        stops: Mutex<Vec<String>>,
        recoveries: Mutex<u32>,
        flags: Option<Arc<MachineFlags>>,
    }

    impl MockActions {
        fn with_flags(flags: Arc<MachineFlags>) -> Self {
            Self {
                flags: Some(flags),
                ..Self::default()
            }
        }
    }

    impl MotionActions for MockActions {
        fn move_to(&self, point: PixelPoint, _feedrate: u32) -> Result<()> {
            self.moves.lock().push(point);
            if let Some(flags) = &self.flags {
                flags.motion_enqueued();
            }
            Ok(())
        }

        fn emergency_stop(&self, context: &str) -> Result<()> {
            self.stops.lock().push(context.to_string());
            if let Some(flags) = &self.flags {
                flags.latch();
                flags.reset_pending();
            }
            Ok(())
        }

        fn recover_from_emergency(&self) -> Result<()> {
            *self.recoveries.lock() += 1;
            if let Some(flags) = &self.flags {
                flags.unlatch();
            }
            Ok(())
        }

        fn clear_pending_motion(&self) -> usize {
            0
        }
    }

    fn engine_with(
        plan: Vec<(i32, i32)>,
    ) -> (PickingEngine, Arc<MockActions>, Arc<MachineFlags>) {
        let flags = Arc::new(MachineFlags::new());
        let actions = Arc::new(MockActions::with_flags(flags.clone()));
        let engine = PickingEngine::new(
            PickPlan::from(plan),
            actions.clone(),
            flags.clone(),
            Arc::new(MessageDispatcher::new()),
        );
        (engine, actions, flags)
    }

    #[test]
    fn empty_plan_is_rejected() {
        let (mut engine, _, _) = engine_with(vec![]);
        let err = engine.start().unwrap_err();
        assert!(matches!(err, Error::Picking(PickingError::NoPlan)));
    }

    #[test]
    fn visits_every_point_in_order_with_drain_gating() {
        let plan = vec![(100, 100), (200, 100), (200, 200)];
        let (mut engine, actions, flags) = engine_with(plan.clone());
        engine.start().unwrap();

        for _ in 0..plan.len() {
            engine.step();
            assert_eq!(engine.state(), PickState::AwaitingDrain);
            // Machine still executing: further ticks issue nothing.
            engine.step();
            engine.step();
            flags.motion_completed();
        }
        engine.step();
        assert_eq!(engine.state(), PickState::Done);

        let moves = actions.moves.lock();
        let expected: Vec<PixelPoint> = plan.into_iter().map(PixelPoint::from).collect();
        assert_eq!(*moves, expected);
    }

    #[test]
    fn done_waits_for_the_final_move_to_drain() {
        let (mut engine, _, flags) = engine_with(vec![(1, 1)]);
        engine.start().unwrap();
        engine.step();
        // Ack never arrived yet; the run must not finish.
        engine.step();
        assert_eq!(engine.state(), PickState::AwaitingDrain);
        flags.motion_completed();
        engine.step();
        assert_eq!(engine.state(), PickState::Done);
    }

    #[test]
    fn stop_midrun_latches_and_allows_resume() {
        let (mut engine, actions, flags) = engine_with(vec![(1, 1), (2, 2), (3, 3)]);
        engine.start().unwrap();

        engine.step(); // issue point 0
        flags.motion_completed();
        engine.step(); // issue point 1
        assert_eq!(engine.index(), 1);

        engine.stop();
        assert_eq!(engine.state(), PickState::Stopped);
        assert!(engine.reconnect_required());
        assert!(engine.resume_available());
        assert_eq!(actions.stops.lock().len(), 1);

        // No further moves while stopped.
        engine.step();
        assert_eq!(actions.moves.lock().len(), 2);
    }

    #[test]
    fn resume_reissues_the_interrupted_point() {
        let (mut engine, actions, flags) = engine_with(vec![(1, 1), (2, 2), (3, 3)]);
        engine.start().unwrap();
        engine.step();
        flags.motion_completed();
        engine.step(); // point (2,2) in flight
        engine.stop();

        engine.resume_after_stop().unwrap();
        assert_eq!(*actions.recoveries.lock(), 1);
        assert!(!engine.reconnect_required());

        engine.step();
        let moves = actions.moves.lock();
        assert_eq!(moves.len(), 3);
        assert_eq!(moves[2], PixelPoint::new(2, 2));
    }

    #[test]
    fn resume_without_a_stop_is_rejected() {
        let (mut engine, _, _) = engine_with(vec![(1, 1)]);
        let err = engine.resume_after_stop().unwrap_err();
        assert!(matches!(err, Error::Picking(PickingError::NotResumable)));
    }

    #[test]
    fn pause_holds_position_and_resumes() {
        let (mut engine, actions, flags) = engine_with(vec![(1, 1), (2, 2)]);
        engine.start().unwrap();
        engine.step();
        engine.toggle_pause();
        assert_eq!(engine.state(), PickState::Paused);

        flags.motion_completed();
        engine.step();
        assert_eq!(actions.moves.lock().len(), 1);

        engine.toggle_pause();
        engine.step();
        assert_eq!(actions.moves.lock().len(), 2);
    }

    #[test]
    fn start_runs_recovery_when_latched() {
        let (mut engine, actions, flags) = engine_with(vec![(1, 1)]);
        flags.latch();
        engine.start().unwrap();
        assert_eq!(*actions.recoveries.lock(), 1);
        assert!(!flags.is_latched());
    }

    struct FailingActions;

    impl MotionActions for FailingActions {
        fn move_to(&self, _point: PixelPoint, _feedrate: u32) -> Result<()> {
            Err(colonypick_core::ControlError::PipelineDown.into())
        }
        fn emergency_stop(&self, _context: &str) -> Result<()> {
            Ok(())
        }
        fn recover_from_emergency(&self) -> Result<()> {
            Ok(())
        }
        fn clear_pending_motion(&self) -> usize {
            0
        }
    }

    #[test]
    fn move_failure_stops_the_run() {
        let flags = Arc::new(MachineFlags::new());
        let mut engine = PickingEngine::new(
            PickPlan::from(vec![(5, 5)]),
            Arc::new(FailingActions),
            flags,
            Arc::new(MessageDispatcher::new()),
        );
        engine.start().unwrap();
        engine.step();
        assert_eq!(engine.state(), PickState::Stopped);
    }
}
