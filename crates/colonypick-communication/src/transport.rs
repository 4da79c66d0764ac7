//! Serial transport to the rig firmware
//!
//! Owns the serial link. The send path is mutually exclusive: one writer at
//! a time holds the link, and a motion sender keeps holding it while it
//! polls for the firmware acknowledgment. The response listener reads with
//! a short timeout and releases the link between reads so writers get fair
//! access.
//!
//! Motion completion is synthesized by writing an `M400` (wait for moves to
//! finish) after the command and blocking until a line containing `ok`
//! arrives. Any `ok` between issuance and the deadline is treated as
//! completion of the batch.

use colonypick_core::{ConnectionError, MachineFlags, Result};
use parking_lot::{Mutex, MutexGuard};
use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Default deadline for a motion acknowledgment
pub const DEFAULT_ACK_TIMEOUT: Duration = Duration::from_secs(5);

/// Wait-for-queue-empty directive written after every motion command
const WAIT_DIRECTIVE: &str = "M400";

/// Serial read granularity; keeps lock hold times and shutdown latency low
const READ_POLL: Duration = Duration::from_millis(10);

/// Trait for serial port I/O operations
pub trait ReadWrite: Read + Write + Send {}
impl<T: Read + Write + Send> ReadWrite for T {}

/// Outcome of a gated send
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// The acknowledgment line that completed the batch
    Ack(String),
    /// No acknowledgment arrived before the deadline
    Timeout,
}

/// The open link plus its line reassembly buffer.
///
/// The buffer lives under the same lock as the port so a partial line read
/// by one lock holder is finished by the next.
struct Link {
    port: Box<dyn ReadWrite>,
    read_buf: String,
    port_name: String,
    baud: u32,
}

impl Link {
    /// Pull whatever bytes are ready into the reassembly buffer.
    /// Returns false when the port had nothing within its poll timeout.
    fn fill(&mut self) -> std::io::Result<bool> {
        let mut chunk = [0u8; 256];
        match self.port.read(&mut chunk) {
            Ok(0) => Ok(false),
            Ok(n) => {
                self.read_buf
                    .push_str(&String::from_utf8_lossy(&chunk[..n]));
                Ok(true)
            }
            Err(e)
                if e.kind() == std::io::ErrorKind::TimedOut
                    || e.kind() == std::io::ErrorKind::WouldBlock =>
            {
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Take the next complete line out of the buffer, if any
    fn take_line(&mut self) -> Option<String> {
        let pos = self.read_buf.find('\n')?;
        let line = self.read_buf[..pos].trim().to_string();
        self.read_buf.drain(..=pos);
        Some(line)
    }

    fn write_command(&mut self, command: &str) -> std::io::Result<()> {
        for line in command.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            self.port.write_all(line.as_bytes())?;
            self.port.write_all(b"\n")?;
        }
        self.port.flush()
    }

    /// Write the command and the wait directive, then poll for an ack
    fn gated_send(&mut self, command: &str, timeout: Duration) -> std::io::Result<SendOutcome> {
        self.write_command(command)?;
        self.write_command(WAIT_DIRECTIVE)?;

        let deadline = Instant::now() + timeout;
        loop {
            while let Some(line) = self.take_line() {
                if is_ack(&line) {
                    return Ok(SendOutcome::Ack(line));
                }
                if !line.is_empty() {
                    tracing::debug!(target: "firmware", "{}", line);
                }
            }
            if Instant::now() >= deadline {
                return Ok(SendOutcome::Timeout);
            }
            self.fill()?;
        }
    }

    /// Poll for one complete line until `timeout`
    fn poll_line(&mut self, timeout: Duration) -> std::io::Result<Option<String>> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(line) = self.take_line() {
                return Ok(Some(line));
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
            self.fill()?;
        }
    }
}

/// Exclusive-writer serial transport
pub struct SerialTransport {
    link: Mutex<Option<Link>>,
    connected: AtomicBool,
    flags: Arc<MachineFlags>,
}

impl SerialTransport {
    /// Create a closed transport
    pub fn new(flags: Arc<MachineFlags>) -> Self {
        Self {
            link: Mutex::new(None),
            connected: AtomicBool::new(false),
            flags,
        }
    }

    /// Open a serial port at the given baud rate.
    ///
    /// The previous link, if any, is released first.
    pub fn open(&self, port_name: &str, baud: u32) -> Result<()> {
        let port = serialport::new(port_name, baud)
            .timeout(READ_POLL)
            .open_native()
            .map_err(|e| ConnectionError::FailedToOpen {
                port: port_name.to_string(),
                reason: e.to_string(),
            })?;
        self.attach(Box::new(port), port_name, baud);
        Ok(())
    }

    /// Install an already-open link.
    ///
    /// Used by `open`, and directly by tests to attach a scripted port.
    pub fn attach(&self, port: Box<dyn ReadWrite>, port_name: &str, baud: u32) {
        let mut link = self.link.lock();
        *link = Some(Link {
            port,
            read_buf: String::new(),
            port_name: port_name.to_string(),
            baud,
        });
        self.connected.store(true, Ordering::Release);
        self.flags.set_connected(true);
        tracing::info!("Serial link open: {} @ {}", port_name, baud);
    }

    /// Release the link
    pub fn close(&self) {
        let mut link = self.link.lock();
        if link.take().is_some() {
            tracing::info!("Serial link closed");
        }
        self.connected.store(false, Ordering::Release);
        self.flags.set_connected(false);
    }

    /// Whether a link is open
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// The `(port, baud)` identity of the open link
    pub fn connection(&self) -> Option<(String, u32)> {
        self.link
            .lock()
            .as_ref()
            .map(|link| (link.port_name.clone(), link.baud))
    }

    /// Write a command (one or more lines) without waiting for anything
    pub fn send_line(&self, command: &str) -> Result<()> {
        let mut guard = self.link.lock();
        let result = match guard.as_mut() {
            None => return Err(ConnectionError::Disconnected.into()),
            Some(link) => link.write_command(command),
        };
        result.map_err(|e| self.drop_link(&mut guard, e))
    }

    /// Write a motion command, then the wait directive, and block until a
    /// line containing `ok` (case-insensitive) arrives or `timeout` passes.
    ///
    /// Other lines read while waiting are informational and go to the
    /// structured log. Holds the link for the whole wait: the per-lane
    /// one-in-flight discipline is enforced right here.
    pub fn send_and_wait(&self, command: &str, timeout: Duration) -> Result<SendOutcome> {
        let mut guard = self.link.lock();
        let result = match guard.as_mut() {
            None => return Err(ConnectionError::Disconnected.into()),
            Some(link) => link.gated_send(command, timeout),
        };
        result.map_err(|e| self.drop_link(&mut guard, e))
    }

    /// Read one complete line, waiting at most `timeout`.
    ///
    /// Returns `Ok(None)` when nothing arrived. The caller is expected to
    /// call again; the transport yields the link between calls.
    pub fn read_line(&self, timeout: Duration) -> Result<Option<String>> {
        let mut guard = self.link.lock();
        let result = match guard.as_mut() {
            None => return Err(ConnectionError::Disconnected.into()),
            Some(link) => link.poll_line(timeout),
        };
        result.map_err(|e| self.drop_link(&mut guard, e))
    }

    /// Tear down the link after an I/O failure.
    ///
    /// The connection drops and the emergency latch is set: the machine may
    /// still be executing stale commands and must not accept more until an
    /// explicit recovery.
    fn drop_link(
        &self,
        guard: &mut MutexGuard<'_, Option<Link>>,
        error: std::io::Error,
    ) -> colonypick_core::Error {
        tracing::error!("Serial I/O failure, dropping link: {}", error);
        **guard = None;
        self.connected.store(false, Ordering::Release);
        self.flags.set_connected(false);
        self.flags.latch();
        ConnectionError::Io {
            reason: error.to_string(),
        }
        .into()
    }
}

/// The firmware acknowledgment predicate: a line containing `ok`
/// (case-insensitive). Everything else is informational.
pub fn is_ack(line: &str) -> bool {
    line.to_ascii_lowercase().contains("ok")
}
