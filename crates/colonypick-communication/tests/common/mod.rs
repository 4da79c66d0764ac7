#![allow(dead_code)]

//! Shared test support: a scripted in-memory serial port and polling helpers.

use colonypick_core::{Message, MessageSink};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Everything observed on (and scripted into) the fake serial line
pub struct Wire {
    written: Mutex<Vec<String>>,
    partial: Mutex<String>,
    replies: Mutex<VecDeque<u8>>,
    auto_ack: bool,
}

impl Wire {
    /// Complete lines the crate has written so far
    pub fn lines(&self) -> Vec<String> {
        self.written.lock().clone()
    }

    /// Queue a reply line for the crate to read
    pub fn push_reply(&self, line: &str) {
        let mut replies = self.replies.lock();
        replies.extend(line.as_bytes());
        replies.push_back(b'\n');
    }

    /// Whether any written line satisfies the predicate
    pub fn has_line(&self, predicate: impl Fn(&str) -> bool) -> bool {
        self.lines().iter().any(|line| predicate(line))
    }

    /// Number of written lines satisfying the predicate
    pub fn count_lines(&self, predicate: impl Fn(&str) -> bool) -> usize {
        self.lines().iter().filter(|line| predicate(line)).count()
    }
}

/// In-memory serial port endpoint handed to the transport
pub struct FakePort {
    wire: Arc<Wire>,
}

/// Create a fake port. With `auto_ack`, every `M400` the crate writes is
/// answered with an immediate `ok`, mimicking firmware that drains its
/// queue instantly.
pub fn fake_port(auto_ack: bool) -> (FakePort, Arc<Wire>) {
    let wire = Arc::new(Wire {
        written: Mutex::new(Vec::new()),
        partial: Mutex::new(String::new()),
        replies: Mutex::new(VecDeque::new()),
        auto_ack,
    });
    (FakePort { wire: wire.clone() }, wire)
}

impl Read for FakePort {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut replies = self.wire.replies.lock();
        if replies.is_empty() {
            drop(replies);
            // Emulate the serial read timeout.
            std::thread::sleep(Duration::from_millis(2));
            return Err(io::Error::new(io::ErrorKind::TimedOut, "no data"));
        }
        let n = buf.len().min(replies.len());
        for slot in buf.iter_mut().take(n) {
            *slot = replies.pop_front().expect("length checked");
        }
        Ok(n)
    }
}

impl Write for FakePort {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        let mut partial = self.wire.partial.lock();
        partial.push_str(&String::from_utf8_lossy(data));
        while let Some(pos) = partial.find('\n') {
            let line = partial[..pos].trim().to_string();
            partial.drain(..=pos);
            if line.is_empty() {
                continue;
            }
            if self.wire.auto_ack && line == "M400" {
                self.wire.push_reply("ok");
            }
            self.wire.written.lock().push(line);
        }
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Poll `condition` until it holds or `timeout` passes
pub fn wait_until(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    condition()
}

/// Message sink that records everything for assertions
#[derive(Default)]
pub struct Recorder {
    messages: Mutex<Vec<Message>>,
}

impl Recorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn texts(&self) -> Vec<String> {
        self.messages
            .lock()
            .iter()
            .map(|message| message.text.clone())
            .collect()
    }

    pub fn count_containing(&self, needle: &str) -> usize {
        self.texts()
            .iter()
            .filter(|text| text.contains(needle))
            .count()
    }
}

impl MessageSink for Recorder {
    fn message(&self, message: &Message) {
        self.messages.lock().push(message.clone());
    }
}
