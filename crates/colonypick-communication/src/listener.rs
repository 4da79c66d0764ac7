//! Response listener
//!
//! Background reader that drains unsolicited firmware output. `ok` lines
//! arriving here are late acknowledgments (a lane worker already gave up on
//! them); they release any pending-motion accounting that is still held.
//! Everything else is forwarded to the operator log as firmware chatter.
//!
//! The listener is the only steady-state reader of the transport. It reads
//! with a short timeout and yields the link between reads so lane workers
//! get fair access, and it exits on its own when the link drops.

use crate::transport::{is_ack, SerialTransport};
use colonypick_core::{MachineFlags, MessageDispatcher};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Per-iteration read timeout; bounds both shutdown latency and how long
/// the listener keeps the link from writers
const READ_TIMEOUT: Duration = Duration::from_millis(20);

/// Idle pause between reads, with the link released
const YIELD_PAUSE: Duration = Duration::from_millis(10);

/// How long `stop` waits for the reader thread
const JOIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Background firmware-output reader
pub struct ResponseListener {
    running: Arc<AtomicBool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl ResponseListener {
    /// Spawn the reader thread
    pub fn start(
        transport: Arc<SerialTransport>,
        flags: Arc<MachineFlags>,
        messages: Arc<MessageDispatcher>,
    ) -> Self {
        let running = Arc::new(AtomicBool::new(true));
        let handle = {
            let running = running.clone();
            std::thread::Builder::new()
                .name("response-listener".to_string())
                .spawn(move || {
                    while running.load(Ordering::Acquire) {
                        match transport.read_line(READ_TIMEOUT) {
                            Ok(Some(line)) => {
                                if is_ack(&line) {
                                    if flags.pending_motion() > 0 {
                                        tracing::debug!("Late acknowledgment: {:?}", line);
                                        flags.motion_completed();
                                    }
                                } else if !line.is_empty() {
                                    messages.firmware(line);
                                }
                            }
                            Ok(None) => std::thread::sleep(YIELD_PAUSE),
                            Err(e) => {
                                tracing::info!("Response listener exiting: {}", e);
                                break;
                            }
                        }
                    }
                    running.store(false, Ordering::Release);
                })
                .expect("spawn response listener")
        };

        Self {
            running,
            handle: Mutex::new(Some(handle)),
        }
    }

    /// Whether the reader thread is still alive
    pub fn is_alive(&self) -> bool {
        self.running.load(Ordering::Acquire)
            && self
                .handle
                .lock()
                .as_ref()
                .is_some_and(|handle| !handle.is_finished())
    }

    /// Stop the reader with a bounded join
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.handle.lock().take() {
            let deadline = Instant::now() + JOIN_TIMEOUT;
            while !handle.is_finished() && Instant::now() < deadline {
                std::thread::sleep(Duration::from_millis(10));
            }
            if handle.is_finished() {
                let _ = handle.join();
            } else {
                tracing::warn!("Response listener did not stop in time; detaching");
            }
        }
    }
}

impl Drop for ResponseListener {
    fn drop(&mut self) {
        self.stop();
    }
}
