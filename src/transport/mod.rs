//! Outbound channel to the controller
//!
//! Messages leave in the order they are sent. A transport that can transfer
//! buffers takes ownership of report storage; one that cannot gets a copy and
//! the encoder keeps its buffer.

use std::collections::VecDeque;

use serde_json::Value;

use crate::core::ReportBuffer;

#[cfg(target_arch = "wasm32")]
mod post_message;
#[cfg(target_arch = "wasm32")]
pub use post_message::PostMessageTransport;

pub const EVENT_WORLD_READY: &str = "worldReady";
pub const EVENT_OBJECT_READY: &str = "objectReady";
pub const EVENT_COMMAND_FAILED: &str = "commandFailed";

#[derive(Debug)]
pub enum Outbound {
    /// `{ cmd, params }` event
    Event { cmd: &'static str, params: Option<Value> },
    /// Report whose storage moved to the controller
    Report(ReportBuffer),
    /// Report copied out of a buffer the worker keeps
    ReportCopy(Vec<f32>),
}

impl Outbound {
    /// Report floats, for either report variant
    pub fn report_data(&self) -> Option<&[f32]> {
        match self {
            Outbound::Report(buf) => Some(buf.as_slice()),
            Outbound::ReportCopy(data) => Some(data),
            Outbound::Event { .. } => None,
        }
    }
}

pub trait Transport {
    fn supports_transfer(&self) -> bool;

    fn send(&mut self, message: Outbound);

    fn send_event(&mut self, cmd: &'static str, params: Option<Value>) {
        self.send(Outbound::Event { cmd, params });
    }

    /// Send a report; the buffer comes back when it was copied instead of moved
    fn send_report(&mut self, buf: ReportBuffer) -> Option<ReportBuffer> {
        if self.supports_transfer() {
            self.send(Outbound::Report(buf));
            None
        } else {
            self.send(Outbound::ReportCopy(buf.as_slice().to_vec()));
            Some(buf)
        }
    }
}

/// In-process queue used by native hosts and tests
pub struct QueueTransport {
    queue: VecDeque<Outbound>,
    transfer: bool,
}

impl QueueTransport {
    pub fn new(transfer: bool) -> Self {
        Self {
            queue: VecDeque::new(),
            transfer,
        }
    }

    pub fn pop(&mut self) -> Option<Outbound> {
        self.queue.pop_front()
    }

    pub fn drain(&mut self) -> impl Iterator<Item = Outbound> + '_ {
        self.queue.drain(..)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Names of queued events, oldest first
    pub fn event_names(&self) -> Vec<&'static str> {
        self.queue
            .iter()
            .filter_map(|m| match m {
                Outbound::Event { cmd, .. } => Some(*cmd),
                _ => None,
            })
            .collect()
    }
}

impl Default for QueueTransport {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Transport for QueueTransport {
    fn supports_transfer(&self) -> bool {
        self.transfer
    }

    fn send(&mut self, message: Outbound) {
        self.queue.push_back(message);
    }
}
