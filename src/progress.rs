//! One-way event plumbing between the engine and whatever front end drives it.
//!
//! The engine never reads front-end state. It gets a [`ProgressSink`] to push
//! console lines, progress and alerts into, and a [`Confirm`] to ask yes/no
//! questions before destructive work.

use std::sync::mpsc::{self, Receiver, SyncSender};
use tracing::{debug, info};

pub trait ProgressSink {
    fn console(&self, message: &str);
    /// Percent in `0.0..=100.0`.
    fn progress(&self, percent: f32);
    fn critical(&self, title: &str, message: &str);
    fn info(&self, title: &str, message: &str);
}

pub trait Confirm {
    fn confirm(&self, title: &str, message: &str) -> bool;
}

/// Sink that drops everything. Handy for callers that only want the result.
pub struct NullSink;

impl ProgressSink for NullSink {
    fn console(&self, _message: &str) {}
    fn progress(&self, _percent: f32) {}
    fn critical(&self, _title: &str, _message: &str) {}
    fn info(&self, _title: &str, _message: &str) {}
}

#[derive(Debug)]
pub enum EngineEvent {
    Console(String),
    Progress(f32),
    CriticalAlert {
        title: String,
        message: String,
    },
    InfoAlert {
        title: String,
        message: String,
    },
    ConfirmRequest {
        title: String,
        message: String,
        reply: SyncSender<bool>,
    },
}

/// Forwards engine output over a bounded channel to another thread.
///
/// Sends block when the mailbox is full and are dropped once the receiver is
/// gone, so a closed front end never stalls or kills the worker.
pub struct ChannelSink {
    tx: SyncSender<EngineEvent>,
}

pub const EVENT_MAILBOX: usize = 256;

impl ChannelSink {
    pub fn new(tx: SyncSender<EngineEvent>) -> Self {
        Self { tx }
    }

    pub fn channel() -> (Self, Receiver<EngineEvent>) {
        let (tx, rx) = mpsc::sync_channel(EVENT_MAILBOX);
        (Self::new(tx), rx)
    }

    fn send(&self, event: EngineEvent) {
        if self.tx.send(event).is_err() {
            debug!("event receiver closed; dropping event");
        }
    }
}

impl ProgressSink for ChannelSink {
    fn console(&self, message: &str) {
        self.send(EngineEvent::Console(message.to_string()));
    }

    fn progress(&self, percent: f32) {
        self.send(EngineEvent::Progress(percent));
    }

    fn critical(&self, title: &str, message: &str) {
        self.send(EngineEvent::CriticalAlert {
            title: title.to_string(),
            message: message.to_string(),
        });
    }

    fn info(&self, title: &str, message: &str) {
        self.send(EngineEvent::InfoAlert {
            title: title.to_string(),
            message: message.to_string(),
        });
    }
}

impl Confirm for ChannelSink {
    // Blocks the worker until the front end answers. A vanished front end is a "no".
    fn confirm(&self, title: &str, message: &str) -> bool {
        let (reply, answer) = mpsc::sync_channel(1);
        if self
            .tx
            .send(EngineEvent::ConfirmRequest {
                title: title.to_string(),
                message: message.to_string(),
                reply,
            })
            .is_err()
        {
            return false;
        }
        answer.recv().unwrap_or(false)
    }
}

/// Fixed answer, for unattended runs (`--yes`) and tests.
pub struct AutoConfirm(pub bool);

impl Confirm for AutoConfirm {
    fn confirm(&self, _title: &str, _message: &str) -> bool {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProgressState {
    processed_bytes: u64,
    total_bytes: u64,
}

impl ProgressState {
    pub fn new(total_bytes: u64) -> Self {
        Self {
            processed_bytes: 0,
            total_bytes,
        }
    }

    pub fn processed_bytes(&self) -> u64 {
        self.processed_bytes
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    pub fn add(&mut self, bytes: u64) {
        self.processed_bytes = self.processed_bytes.saturating_add(bytes);
    }

    // The total is an estimate and can be exceeded; the percentage never is.
    pub fn percent(&self) -> f32 {
        let total = self.total_bytes.max(1) as f64;
        let fraction = (self.processed_bytes as f64) / total;
        (fraction * 100.0).clamp(0.0, 100.0) as f32
    }
}

/// Per-run pairing of the sink with the run's own byte counter.
pub struct Reporter<'a> {
    sink: &'a dyn ProgressSink,
    state: ProgressState,
}

impl<'a> Reporter<'a> {
    pub fn new(sink: &'a dyn ProgressSink, total_bytes: u64) -> Self {
        Self {
            sink,
            state: ProgressState::new(total_bytes),
        }
    }

    pub fn log(&self, message: impl AsRef<str>) {
        let message = message.as_ref();
        info!(target: "ddmi::console", "{message}");
        self.sink.console(message);
    }

    pub fn advance(&mut self, bytes: u64) {
        self.state.add(bytes);
        self.sink.progress(self.state.percent());
    }

    pub fn finish(&mut self) {
        self.sink.progress(100.0);
    }

    pub fn state(&self) -> ProgressState {
        self.state
    }
}
