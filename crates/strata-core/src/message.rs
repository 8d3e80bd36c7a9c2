//! Best-effort messages between component instances.
//!
//! Messages are a side channel: a sender addresses one or more instances by
//! name, the [`Postbox`] appends a copy to each recipient's inbox, and the
//! scheduler drains the inbox right before the recipient's next tick, calling
//! [`Tickable::handle_message()`](crate::Tickable::handle_message) in FIFO
//! order. Unknown recipients are skipped.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use parking_lot::{Mutex, RwLock};

/// Number of free numeric slots in a message.
pub const MESSAGE_SLOTS: usize = 8;

/// A message between instances.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    /// Message type, used by the receiver to dispatch (e.g. `"source.stop"`).
    pub kind: String,
    /// Free-form name.
    pub name: String,
    /// Sending instance, filled in on send.
    pub sender: String,
    /// Caller-defined id.
    pub id: i64,
    /// Sequence number assigned by the postbox.
    pub seq: u64,
    /// Seconds since the postbox was created, filled in on send.
    pub stamp: f64,
    /// Stream time the message refers to, or -1.
    pub reader_time: f64,
    /// Numeric payload.
    pub floats: [f64; MESSAGE_SLOTS],
    /// Integer payload.
    pub ints: [i64; MESSAGE_SLOTS],
    /// Text payload.
    pub text: String,
}

impl Message {
    /// Creates an empty message of type `kind`.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            name: String::new(),
            sender: String::new(),
            id: -1,
            seq: 0,
            stamp: 0.0,
            reader_time: -1.0,
            floats: [0.0; MESSAGE_SLOTS],
            ints: [0; MESSAGE_SLOTS],
            text: String::new(),
        }
    }

    /// Sets the name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the text payload.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Sets float slot `i` (ignored if out of range).
    pub fn with_float(mut self, i: usize, v: f64) -> Self {
        if let Some(slot) = self.floats.get_mut(i) {
            *slot = v;
        }
        self
    }

    /// Sets int slot `i` (ignored if out of range).
    pub fn with_int(mut self, i: usize, v: i64) -> Self {
        if let Some(slot) = self.ints.get_mut(i) {
            *slot = v;
        }
        self
    }
}

/// A per-instance FIFO.
pub type Inbox = Arc<Mutex<VecDeque<Message>>>;

/// Routes messages to instance inboxes.
#[derive(Debug)]
pub struct Postbox {
    inboxes: RwLock<HashMap<String, Inbox>>,
    seq: AtomicU64,
    started: Instant,
}

impl Default for Postbox {
    fn default() -> Self {
        Self::new()
    }
}

impl Postbox {
    /// Creates an empty postbox.
    pub fn new() -> Self {
        Self {
            inboxes: RwLock::new(HashMap::new()),
            seq: AtomicU64::new(0),
            started: Instant::now(),
        }
    }

    /// Returns the inbox of `name`, creating it on first use.
    pub fn register(&self, name: &str) -> Inbox {
        self.inboxes
            .write()
            .entry(name.to_string())
            .or_default()
            .clone()
    }

    /// Sends `msg` from `sender` to every name in `recipients`
    /// (separated by `,` or `;`). Returns the number of inboxes reached.
    pub fn send(&self, sender: &str, recipients: &str, mut msg: Message) -> usize {
        msg.sender = sender.to_string();
        msg.stamp = self.started.elapsed().as_secs_f64();
        let inboxes = self.inboxes.read();
        let mut delivered = 0;
        for name in recipients.split([',', ';']).map(str::trim).filter(|s| !s.is_empty()) {
            match inboxes.get(name) {
                Some(inbox) => {
                    let mut m = msg.clone();
                    m.seq = self.seq.fetch_add(1, Ordering::Relaxed);
                    inbox.lock().push_back(m);
                    delivered += 1;
                }
                None => tracing::debug!(sender, recipient = name, kind = %msg.kind, "message to unknown instance dropped"),
            }
        }
        delivered
    }

    /// Number of pending messages for `name`.
    pub fn pending(&self, name: &str) -> usize {
        self.inboxes
            .read()
            .get(name)
            .map(|i| i.lock().len())
            .unwrap_or(0)
    }
}

/// Removes and returns every message in `inbox`, oldest first.
pub fn drain(inbox: &Inbox) -> Vec<Message> {
    inbox.lock().drain(..).collect()
}
