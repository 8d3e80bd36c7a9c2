//! Abort, pause and wake-up state shared between a running loop and the host.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::external::{DataSignal, ExternalHub, ExternalInput, ExternalOutput};
use crate::message::{Message, Postbox};

/// How a pause takes effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseMode {
    /// Suspend after the current round.
    Immediate,
    /// Keep ticking until a quiescent round, then suspend. Cancelled if no
    /// quiescent round happens within `timeout` rounds.
    DrainThenSuspend {
        /// Rounds to wait for quiescence.
        timeout: u64,
    },
}

#[derive(Debug, Default)]
struct PauseState {
    requested: Option<PauseMode>,
    /// Round at which a drain pause was first seen by the loop.
    started_at: Option<u64>,
}

#[derive(Debug)]
pub(crate) struct Control {
    abort: AtomicBool,
    pause: Mutex<PauseState>,
    resumed: Condvar,
    signal: Arc<DataSignal>,
}

impl Control {
    pub fn new(signal: Arc<DataSignal>) -> Self {
        Self {
            abort: AtomicBool::new(false),
            pause: Mutex::new(PauseState::default()),
            resumed: Condvar::new(),
            signal,
        }
    }

    pub fn signal(&self) -> &DataSignal {
        &self.signal
    }

    pub fn abort_flag(&self) -> &AtomicBool {
        &self.abort
    }

    pub fn is_aborted(&self) -> bool {
        self.abort.load(Ordering::Acquire)
    }

    pub fn clear_abort(&self) {
        self.abort.store(false, Ordering::Release);
    }

    pub fn request_abort(&self) {
        self.abort.store(true, Ordering::Release);
        self.resume();
        self.signal.notify();
    }

    pub fn pause(&self, mode: PauseMode) {
        let mut st = self.pause.lock();
        st.requested = Some(mode);
        st.started_at = None;
    }

    pub fn resume(&self) {
        let mut st = self.pause.lock();
        st.requested = None;
        st.started_at = None;
        self.resumed.notify_all();
    }

    pub fn requested(&self) -> Option<PauseMode> {
        self.pause.lock().requested
    }

    /// Records `tick` as the start of a drain pause; returns the start round.
    pub fn drain_started_at(&self, tick: u64) -> u64 {
        *self.pause.lock().started_at.get_or_insert(tick)
    }

    /// Returns `true` the first time the loop sees the current drain pause.
    pub fn is_drain_start(&self) -> bool {
        self.pause.lock().started_at.is_none()
    }

    /// Sleeps until resumed or aborted.
    pub fn wait_resumed(&self, slice: Duration) {
        let mut st = self.pause.lock();
        while st.requested.is_some() && !self.is_aborted() {
            self.resumed.wait_for(&mut st, slice);
        }
    }
}

/// Cloneable, thread-safe remote control for a [`Scheduler`](super::Scheduler).
///
/// Obtain one with [`Scheduler::handle()`](super::Scheduler::handle) before
/// calling `run`, then drive the run from other threads.
#[derive(Debug, Clone)]
pub struct SchedulerHandle {
    pub(crate) control: Arc<Control>,
    pub(crate) hub: Arc<ExternalHub>,
    pub(crate) postbox: Arc<Postbox>,
}

impl SchedulerHandle {
    /// Stops the run after the in-flight round. Wakes any pause or data wait.
    pub fn request_abort(&self) {
        tracing::info!("abort requested");
        self.control.request_abort();
    }

    /// Returns `true` once an abort was requested.
    pub fn is_abort_requested(&self) -> bool {
        self.control.is_aborted()
    }

    /// Requests a pause.
    pub fn pause(&self, mode: PauseMode) {
        tracing::debug!(?mode, "pause requested");
        self.control.pause(mode);
    }

    /// Ends a pause, or cancels a pending one.
    pub fn resume(&self) {
        self.control.resume();
    }

    /// Returns `true` while a pause is requested and not yet resumed.
    pub fn is_pause_requested(&self) -> bool {
        self.control.requested().is_some()
    }

    /// Wakes a loop waiting on external data.
    pub fn signal_data_available(&self) {
        self.control.signal().notify();
    }

    /// The input port of an external source level, once its source is registered.
    pub fn external_input(&self, level: &str) -> Option<ExternalInput> {
        self.hub.input(level)
    }

    /// The output port of a level, created on first use.
    pub fn external_output(&self, level: &str) -> ExternalOutput {
        self.hub.output(level)
    }

    /// Sends `msg` from the host to the comma-separated `recipients`.
    pub fn send_message(&self, recipients: &str, msg: Message) -> usize {
        self.postbox.send("host", recipients, msg)
    }
}
