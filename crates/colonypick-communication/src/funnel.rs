//! Command funnel
//!
//! Thread-safe ingress between UI callbacks and the dispatcher. Submitting
//! never blocks the caller; a drain thread hands queued commands to the
//! dispatcher one at a time, sleeping briefly when idle.
//!
//! The funnel is also the first place queue scrubbing applies, so an
//! emergency stop can drop commands before they ever reach a lane.

use crate::dispatcher::{CommandPredicate, Dispatcher};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Idle poll period of the drain thread
const DRAIN_POLL: Duration = Duration::from_millis(50);

/// How long `shutdown` waits for the drain thread
const JOIN_TIMEOUT: Duration = Duration::from_secs(2);

/// UI-facing ordered command ingress
pub struct CommandFunnel {
    queue: Arc<Mutex<VecDeque<String>>>,
    running: Arc<AtomicBool>,
    drain: Mutex<Option<JoinHandle<()>>>,
}

impl CommandFunnel {
    /// Create a funnel with no drain thread; commands accumulate until
    /// `start_drain` is called
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            queue: Arc::new(Mutex::new(VecDeque::new())),
            running: Arc::new(AtomicBool::new(true)),
            drain: Mutex::new(None),
        })
    }

    /// Create a funnel and start its drain loop feeding the dispatcher
    pub fn start(dispatcher: Arc<Dispatcher>) -> Arc<Self> {
        let funnel = Self::new();
        funnel.start_drain(dispatcher);
        funnel
    }

    /// Spawn the drain thread
    pub fn start_drain(&self, dispatcher: Arc<Dispatcher>) {
        let queue = self.queue.clone();
        let running = self.running.clone();
        let drain = std::thread::Builder::new()
            .name("command-funnel".to_string())
            .spawn(move || {
                while running.load(Ordering::Acquire) {
                    let next = queue.lock().pop_front();
                    match next {
                        Some(command) => {
                            if !dispatcher.submit(&command) {
                                tracing::warn!("Dispatcher is down; dropping {:?}", command);
                            }
                        }
                        None => std::thread::sleep(DRAIN_POLL),
                    }
                }
            })
            .expect("spawn funnel drain");
        *self.drain.lock() = Some(drain);
    }

    /// Append a command; never blocks
    pub fn submit(&self, command: impl Into<String>) {
        self.queue.lock().push_back(command.into());
    }

    /// Remove queued commands matching the predicate, preserving the
    /// relative order of the rest. `None` removes everything. Returns how
    /// many were removed.
    pub fn scrub(&self, predicate: Option<CommandPredicate>) -> usize {
        let mut queue = self.queue.lock();
        let before = queue.len();
        queue.retain(|command| !predicate.map_or(true, |p| p(command)));
        before - queue.len()
    }

    /// Commands waiting to be drained
    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    /// Whether nothing is waiting
    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }

    /// Whether the drain thread is accepting work
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Stop the drain thread with a bounded join
    pub fn shutdown(&self) {
        if !self.running.swap(false, Ordering::AcqRel) {
            return;
        }
        if let Some(drain) = self.drain.lock().take() {
            let deadline = Instant::now() + JOIN_TIMEOUT;
            while !drain.is_finished() && Instant::now() < deadline {
                std::thread::sleep(Duration::from_millis(10));
            }
            if drain.is_finished() {
                let _ = drain.join();
            } else {
                tracing::warn!("Funnel drain did not stop in time; detaching");
            }
        }
    }
}

impl Drop for CommandFunnel {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::{is_jog, is_motion};

    #[test]
    fn scrub_preserves_order_of_survivors() {
        let funnel = CommandFunnel::new();
        funnel.submit("G91\nG1 X5 F3000");
        funnel.submit("M503");
        funnel.submit("G0 X1 Y2 F6000");
        funnel.submit("G91\nG1 Y-5 F3000");
        funnel.submit("M106 S128");

        let removed = funnel.scrub(Some(is_jog));
        assert_eq!(removed, 2);

        let rest: Vec<String> = funnel.queue.lock().iter().cloned().collect();
        assert_eq!(rest, vec!["M503", "G0 X1 Y2 F6000", "M106 S128"]);
    }

    #[test]
    fn scrub_motion_spares_aux_and_control() {
        let funnel = CommandFunnel::new();
        funnel.submit("G0 X1 Y2 F6000");
        funnel.submit("M42 P58 S200");
        funnel.submit("G1 X5 F3000");

        assert_eq!(funnel.scrub(Some(is_motion)), 2);
        assert_eq!(funnel.len(), 1);
    }

    #[test]
    fn scrub_all_with_no_predicate() {
        let funnel = CommandFunnel::new();
        funnel.submit("M503");
        funnel.submit("G28");
        assert_eq!(funnel.scrub(None), 2);
        assert!(funnel.is_empty());
    }
}
