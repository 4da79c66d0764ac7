//! Lane dispatch
//!
//! Classifies each submitted command onto one of five lanes, each with its
//! own FIFO queue and worker thread. Motion lanes (X, Y, XY) transmit one
//! command at a time and block for the firmware acknowledgment before
//! pulling the next; the aux and control lanes fire and forget.
//!
//! The dispatcher also maintains the shared pending-motion counter: bumped
//! when a command enters a gated lane, dropped when its wait completes or
//! the queued command is scrubbed away.

use crate::classify::{classify, Lane};
use crate::transport::{SendOutcome, SerialTransport, DEFAULT_ACK_TIMEOUT};
use colonypick_core::{MachineFlags, MessageDispatcher};
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Predicate over command strings used by queue scrubbing.
/// `None` in a scrub call means "remove all".
pub type CommandPredicate = fn(&str) -> bool;

/// How long `shutdown` waits for each worker to observe its stop token
const JOIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Dispatcher tuning
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Deadline for each motion acknowledgment
    pub ack_timeout: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            ack_timeout: DEFAULT_ACK_TIMEOUT,
        }
    }
}

/// An entry on a lane queue
enum LaneItem {
    Command(String),
    /// Ends the worker loop on controlled shutdown
    Stop,
}

/// One lane's FIFO plus its wakeup signal
#[derive(Default)]
struct LaneQueue {
    items: Mutex<VecDeque<LaneItem>>,
    ready: Condvar,
}

impl LaneQueue {
    fn push(&self, item: LaneItem) {
        self.items.lock().push_back(item);
        self.ready.notify_one();
    }

    fn pop_blocking(&self) -> LaneItem {
        let mut items = self.items.lock();
        while items.is_empty() {
            self.ready.wait(&mut items);
        }
        items.pop_front().expect("queue non-empty")
    }

    /// Remove queued commands matching the predicate, preserving the order
    /// of the rest. Stop tokens are never removed.
    fn scrub(&self, predicate: Option<CommandPredicate>) -> usize {
        let mut items = self.items.lock();
        let before = items.len();
        items.retain(|item| match item {
            LaneItem::Stop => true,
            LaneItem::Command(cmd) => !predicate.map_or(true, |p| p(cmd)),
        });
        before - items.len()
    }

    fn len(&self) -> usize {
        self.items.lock().len()
    }
}

/// Classifying router with one worker per lane
pub struct Dispatcher {
    lanes: Vec<Arc<LaneQueue>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    running: AtomicBool,
    flags: Arc<MachineFlags>,
}

impl Dispatcher {
    /// Spawn the five lane workers with default tuning
    pub fn start(
        transport: Arc<SerialTransport>,
        flags: Arc<MachineFlags>,
        messages: Arc<MessageDispatcher>,
    ) -> Arc<Self> {
        Self::start_with_config(transport, flags, messages, DispatcherConfig::default())
    }

    /// Spawn the five lane workers
    pub fn start_with_config(
        transport: Arc<SerialTransport>,
        flags: Arc<MachineFlags>,
        messages: Arc<MessageDispatcher>,
        config: DispatcherConfig,
    ) -> Arc<Self> {
        let lanes: Vec<Arc<LaneQueue>> = Lane::ALL
            .iter()
            .map(|_| Arc::new(LaneQueue::default()))
            .collect();

        let workers = Lane::ALL
            .iter()
            .map(|&lane| {
                let queue = lanes[lane.index()].clone();
                let transport = transport.clone();
                let flags = flags.clone();
                let messages = messages.clone();
                let ack_timeout = config.ack_timeout;
                std::thread::Builder::new()
                    .name(format!("lane-{}", lane))
                    .spawn(move || {
                        lane_worker(lane, queue, transport, flags, messages, ack_timeout)
                    })
                    .expect("spawn lane worker")
            })
            .collect();

        Arc::new(Self {
            lanes,
            workers: Mutex::new(workers),
            running: AtomicBool::new(true),
            flags,
        })
    }

    /// Classify and enqueue a command.
    ///
    /// Non-blocking. Returns false once the dispatcher has been shut down.
    pub fn submit(&self, command: &str) -> bool {
        if !self.is_running() {
            return false;
        }
        let lane = classify(command);
        if lane.is_gated() {
            self.flags.motion_enqueued();
        }
        self.lanes[lane.index()].push(LaneItem::Command(command.to_string()));
        tracing::trace!("Queued on {} lane: {:?}", lane, command);
        true
    }

    /// Remove queued commands matching the predicate from every lane.
    ///
    /// Atomic per queue; commands already handed to the transport are not
    /// affected. Pending-motion accounting is released for every scrubbed
    /// gated-lane command. Returns the total number removed.
    pub fn scrub(&self, predicate: Option<CommandPredicate>) -> usize {
        let mut removed = 0;
        for &lane in &Lane::ALL {
            let count = self.lanes[lane.index()].scrub(predicate);
            if lane.is_gated() {
                for _ in 0..count {
                    self.flags.motion_completed();
                }
            }
            removed += count;
        }
        removed
    }

    /// Number of commands waiting on a lane (tests and status displays)
    pub fn queued(&self, lane: Lane) -> usize {
        self.lanes[lane.index()].len()
    }

    /// Whether the workers are accepting commands
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Stop every worker: place a stop token on each lane and join with a
    /// bounded wait. Queued commands behind the tokens are discarded.
    pub fn shutdown(&self) {
        if !self.running.swap(false, Ordering::AcqRel) {
            return;
        }
        for queue in &self.lanes {
            queue.push(LaneItem::Stop);
        }
        let workers = std::mem::take(&mut *self.workers.lock());
        let deadline = Instant::now() + JOIN_TIMEOUT;
        for worker in workers {
            while !worker.is_finished() && Instant::now() < deadline {
                std::thread::sleep(Duration::from_millis(10));
            }
            if worker.is_finished() {
                let _ = worker.join();
            } else {
                tracing::warn!("Lane worker did not stop in time; detaching");
            }
        }
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// One lane's pull-transmit loop
fn lane_worker(
    lane: Lane,
    queue: Arc<LaneQueue>,
    transport: Arc<SerialTransport>,
    flags: Arc<MachineFlags>,
    messages: Arc<MessageDispatcher>,
    ack_timeout: Duration,
) {
    loop {
        let command = match queue.pop_blocking() {
            LaneItem::Stop => break,
            LaneItem::Command(command) => command,
        };

        if lane.is_gated() {
            match transport.send_and_wait(&command, ack_timeout) {
                Ok(SendOutcome::Ack(_)) => {}
                Ok(SendOutcome::Timeout) => {
                    messages.warn(format!(
                        "No acknowledgment within {}ms on {} lane; continuing",
                        ack_timeout.as_millis(),
                        lane
                    ));
                }
                Err(e) => {
                    messages.error(format!("Motion command dropped on {} lane: {}", lane, e));
                }
            }
            // Ack, timeout, or failure: the wait is over either way.
            flags.motion_completed();
        } else if let Err(e) = transport.send_line(&command) {
            messages.error(format!("Command dropped on {} lane: {}", lane, e));
        }
    }
    tracing::debug!("Lane worker {} stopped", lane);
}
