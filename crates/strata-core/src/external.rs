//! Host boundary: pushing data in and receiving data out while a run is live.
//!
//! # Architecture
//!
//! ```text
//! host thread                 ExternalHub                  tick loop
//! ───────────                 ───────────                  ─────────
//! ExternalInput::push ──► bounded queue per level ──► source component drains
//!        │                                                  into its level
//!        └──► DataSignal::notify ──► wakes a scheduler waiting on Ext* results
//!
//! ExternalOutput::on_data ◄── callbacks per level ◄── sink component delivers
//! ```
//!
//! Every type here is `Send + Sync` and safe to use concurrently with the tick
//! loop. Nothing blocks: a full queue is reported as
//! [`PushError::BufferFull`].

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use thiserror::Error;

use crate::frame::{Matrix, Sample};

/// Errors from [`ExternalInput::push()`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PushError {
    /// The queue cannot take the whole block.
    #[error("external input '{level}' is full: {queued}/{capacity} frames queued, {requested} more requested")]
    BufferFull {
        /// Level name.
        level: String,
        /// Queue capacity in frames.
        capacity: usize,
        /// Frames currently queued.
        queued: usize,
        /// Frames in the rejected block.
        requested: usize,
    },

    /// The block is not a whole number of frames.
    #[error("external input '{level}': {got} samples is not a multiple of frame width {width}")]
    WidthMismatch {
        /// Level name.
        level: String,
        /// Frame width.
        width: usize,
        /// Samples supplied.
        got: usize,
    },

    /// End of input was already signalled.
    #[error("external input '{level}' has already ended")]
    Ended {
        /// Level name.
        level: String,
    },
}

/// Wake-up signal for a scheduler waiting on external data.
///
/// A generation counter makes the wait race-free: the scheduler remembers
/// the generation at the start of a round and only sleeps if nothing was
/// signalled since.
#[derive(Debug, Default)]
pub struct DataSignal {
    generation: Mutex<u64>,
    cond: Condvar,
}

impl DataSignal {
    /// Creates a signal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current generation.
    pub fn generation(&self) -> u64 {
        *self.generation.lock()
    }

    /// Bumps the generation and wakes every waiter.
    pub fn notify(&self) {
        let mut g = self.generation.lock();
        *g = g.wrapping_add(1);
        self.cond.notify_all();
    }

    /// Blocks until the generation differs from `seen` or `abort` is set.
    ///
    /// `abort` is re-checked every `slice`. Returns `true` if woken by data.
    pub fn wait_past(&self, seen: u64, abort: &AtomicBool, slice: Duration) -> bool {
        let mut g = self.generation.lock();
        loop {
            if *g != seen {
                return true;
            }
            if abort.load(Ordering::Acquire) {
                return false;
            }
            self.cond.wait_for(&mut g, slice);
        }
    }
}

struct InputShared {
    level: String,
    width: usize,
    capacity: usize,
    queue: Mutex<VecDeque<Sample>>,
    ended: AtomicBool,
    signal: Arc<DataSignal>,
}

/// Producer side of an external source level.
#[derive(Clone)]
pub struct ExternalInput {
    shared: Arc<InputShared>,
}

impl std::fmt::Debug for ExternalInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExternalInput")
            .field("level", &self.shared.level)
            .field("width", &self.shared.width)
            .field("queued", &self.queued())
            .field("ended", &self.is_ended())
            .finish()
    }
}

impl ExternalInput {
    /// Level name.
    pub fn level(&self) -> &str {
        &self.shared.level
    }

    /// Frame width.
    pub fn width(&self) -> usize {
        self.shared.width
    }

    /// Queue capacity in frames.
    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    /// Frames waiting to be drained.
    pub fn queued(&self) -> usize {
        self.shared.queue.lock().len() / self.shared.width.max(1)
    }

    /// Queues a frame-major block. Never blocks.
    ///
    /// Returns the number of frames queued.
    pub fn push(&self, data: &[Sample]) -> Result<usize, PushError> {
        let s = &self.shared;
        if s.ended.load(Ordering::Acquire) {
            return Err(PushError::Ended {
                level: s.level.clone(),
            });
        }
        if s.width == 0 || data.len() % s.width != 0 {
            return Err(PushError::WidthMismatch {
                level: s.level.clone(),
                width: s.width,
                got: data.len(),
            });
        }
        let frames = data.len() / s.width;
        {
            let mut q = s.queue.lock();
            let queued = q.len() / s.width;
            if queued + frames > s.capacity {
                return Err(PushError::BufferFull {
                    level: s.level.clone(),
                    capacity: s.capacity,
                    queued,
                    requested: frames,
                });
            }
            q.extend(data.iter().copied());
        }
        s.signal.notify();
        Ok(frames)
    }

    /// Signals that no more data will follow. Returns `true` the first time.
    pub fn end_of_input(&self) -> bool {
        let first = !self.shared.ended.swap(true, Ordering::AcqRel);
        if first {
            tracing::debug!(level = %self.shared.level, "external end of input");
            self.shared.signal.notify();
        }
        first
    }

    /// Returns `true` once end of input was signalled.
    pub fn is_ended(&self) -> bool {
        self.shared.ended.load(Ordering::Acquire)
    }

    /// Returns `true` once ended and every queued frame was drained.
    pub fn is_drained(&self) -> bool {
        self.is_ended() && self.shared.queue.lock().is_empty()
    }

    /// Removes up to `max_frames` frames, oldest first.
    pub fn pop(&self, max_frames: usize) -> Option<Matrix> {
        let w = self.shared.width;
        let mut q = self.shared.queue.lock();
        let frames = (q.len() / w.max(1)).min(max_frames);
        if frames == 0 {
            return None;
        }
        let data: Vec<Sample> = q.drain(..frames * w).collect();
        Matrix::from_frames(w, data)
    }
}

type Callback = Box<dyn FnMut(&Matrix) + Send>;

/// Consumer side of an external sink level.
#[derive(Clone)]
pub struct ExternalOutput {
    level: Arc<str>,
    callbacks: Arc<Mutex<Vec<Callback>>>,
}

impl std::fmt::Debug for ExternalOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExternalOutput")
            .field("level", &self.level)
            .field("callbacks", &self.callbacks.lock().len())
            .finish()
    }
}

impl ExternalOutput {
    fn new(level: &str) -> Self {
        Self {
            level: Arc::from(level),
            callbacks: Arc::default(),
        }
    }

    /// Level name.
    pub fn level(&self) -> &str {
        &self.level
    }

    /// Registers a callback invoked with every block read from the level.
    pub fn on_data(&self, callback: impl FnMut(&Matrix) + Send + 'static) {
        self.callbacks.lock().push(Box::new(callback));
    }

    /// Number of registered callbacks.
    pub fn callback_count(&self) -> usize {
        self.callbacks.lock().len()
    }

    /// Invokes every callback with `block`.
    pub fn deliver(&self, block: &Matrix) {
        for cb in self.callbacks.lock().iter_mut() {
            cb(block);
        }
    }
}

/// Registry of external ports, keyed by level name.
#[derive(Debug)]
pub struct ExternalHub {
    inputs: Mutex<HashMap<String, ExternalInput>>,
    outputs: Mutex<HashMap<String, ExternalOutput>>,
    signal: Arc<DataSignal>,
}

impl Default for ExternalHub {
    fn default() -> Self {
        Self::new(Arc::new(DataSignal::new()))
    }
}

impl ExternalHub {
    /// Creates a hub that notifies `signal` on every push.
    pub fn new(signal: Arc<DataSignal>) -> Self {
        Self {
            inputs: Mutex::new(HashMap::new()),
            outputs: Mutex::new(HashMap::new()),
            signal,
        }
    }

    /// The shared data-available signal.
    pub fn signal(&self) -> &Arc<DataSignal> {
        &self.signal
    }

    /// Creates the input port for `level`, or returns the existing one.
    pub fn create_input(&self, level: &str, width: usize, capacity: usize) -> ExternalInput {
        self.inputs
            .lock()
            .entry(level.to_string())
            .or_insert_with(|| ExternalInput {
                shared: Arc::new(InputShared {
                    level: level.to_string(),
                    width,
                    capacity: capacity.max(1),
                    queue: Mutex::new(VecDeque::with_capacity(width * capacity)),
                    ended: AtomicBool::new(false),
                    signal: Arc::clone(&self.signal),
                }),
            })
            .clone()
    }

    /// The input port for `level`, if a source created one.
    pub fn input(&self, level: &str) -> Option<ExternalInput> {
        self.inputs.lock().get(level).cloned()
    }

    /// The output port for `level`, created on first use.
    pub fn output(&self, level: &str) -> ExternalOutput {
        self.outputs
            .lock()
            .entry(level.to_string())
            .or_insert_with(|| ExternalOutput::new(level))
            .clone()
    }
}
