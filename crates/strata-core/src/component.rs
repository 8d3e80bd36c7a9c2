//! Component capability traits and the lifecycle that drives them.
//!
//! A component is assembled from small capabilities instead of a class
//! hierarchy:
//!
//! - [`Tickable`]: the per-round work and the scheduler notifications.
//! - [`HasWriter`]: owns a [`WriterHandle`] and derives the output level.
//! - [`HasReader`]: owns a [`ReaderHandle`].
//! - [`Component`]: `Tickable + Send`, exposing the optional capabilities
//!   and the setup hooks.
//!
//! [`Lifecycle`] walks a component through register → configure → finalize.
//! Each phase is idempotent: once completed, calling it again returns
//! [`Progress::Ready`] without touching the component.
//!
//! # Example
//!
//! ```rust
//! use strata_core::{
//!     Component, Frame, HasWriter, Result, TickContext, TickResult, Tickable, WriterHandle,
//!     FieldLayout,
//! };
//!
//! struct Counter {
//!     writer: WriterHandle,
//!     next: f32,
//! }
//!
//! impl Tickable for Counter {
//!     fn tick(&mut self, ctx: &mut TickContext<'_>) -> Result<TickResult> {
//!         if !self.writer.check_write(ctx.store(), 1) {
//!             return Ok(TickResult::DestinationNoSpace);
//!         }
//!         self.writer.set_next_frame(ctx.store(), &Frame::new(vec![self.next]))?;
//!         self.next += 1.0;
//!         Ok(TickResult::Success)
//!     }
//! }
//!
//! impl HasWriter for Counter {
//!     fn writer(&self) -> &WriterHandle { &self.writer }
//!     fn writer_mut(&mut self) -> &mut WriterHandle { &mut self.writer }
//!     fn setup_new_names(&mut self, _input: Option<&FieldLayout>) -> Result<()> {
//!         self.writer.add_field("count", 1, 0)
//!     }
//! }
//!
//! impl Component for Counter {
//!     fn as_writer(&mut self) -> Option<&mut dyn HasWriter> { Some(self) }
//! }
//! ```

use crate::config::LevelConfig;
use crate::error::{Error, Result};
use crate::external::ExternalHub;
use crate::frame::FieldLayout;
use crate::logger::Logger;
use crate::message::{Message, Postbox};
use crate::reader::ReaderHandle;
use crate::store::LevelStore;
use crate::writer::WriterHandle;

/// Outcome of one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TickResult {
    /// Nothing to do and not waiting on anything.
    Inactive,
    /// Progress was made.
    Success,
    /// Input level has no new data.
    SourceNotAvailable,
    /// Waiting on data from outside the pipeline.
    ExtSourceNotAvailable,
    /// Output level is full.
    DestinationNoSpace,
    /// Waiting on room outside the pipeline.
    ExtDestinationNoSpace,
}

impl TickResult {
    /// All variants, in reporting order.
    pub const ALL: [TickResult; 6] = [
        Self::Inactive,
        Self::Success,
        Self::SourceNotAvailable,
        Self::ExtSourceNotAvailable,
        Self::DestinationNoSpace,
        Self::ExtDestinationNoSpace,
    ];

    /// Returns `true` for the outcomes that wait on the host.
    pub fn is_external(self) -> bool {
        matches!(self, Self::ExtSourceNotAvailable | Self::ExtDestinationNoSpace)
    }

    /// Dense index into [`ALL`](Self::ALL).
    pub fn index(self) -> usize {
        self as usize
    }

    /// Short name for reports.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Inactive => "inactive",
            Self::Success => "success",
            Self::SourceNotAvailable => "source_not_available",
            Self::ExtSourceNotAvailable => "ext_source_not_available",
            Self::DestinationNoSpace => "destination_no_space",
            Self::ExtDestinationNoSpace => "ext_destination_no_space",
        }
    }

    /// Maps a transient access error to the matching outcome.
    pub fn from_transient(err: &Error) -> Option<Self> {
        match err {
            Error::NotAvailable { .. } | Error::Overwritten { .. } => Some(Self::SourceNotAvailable),
            Error::NoSpace { .. } => Some(Self::DestinationNoSpace),
            _ => None,
        }
    }
}

/// Outcome of a setup phase step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Progress {
    /// The phase completed.
    Ready,
    /// A dependency is missing; try again in a later pass.
    Retry(String),
}

impl Progress {
    /// Returns `true` for [`Progress::Ready`].
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }
}

/// Everything a component may touch during a tick.
pub struct TickContext<'a> {
    store: &'a LevelStore,
    postbox: &'a Postbox,
    logger: &'a Logger,
    eoi: bool,
    eoi_counter: u32,
    tick: u64,
}

impl<'a> TickContext<'a> {
    /// Creates a context. The scheduler builds one per instance per round.
    pub fn new(
        store: &'a LevelStore,
        postbox: &'a Postbox,
        logger: &'a Logger,
        eoi: bool,
        eoi_counter: u32,
        tick: u64,
    ) -> Self {
        Self {
            store,
            postbox,
            logger,
            eoi,
            eoi_counter,
            tick,
        }
    }

    /// The level store.
    pub fn store(&self) -> &'a LevelStore {
        self.store
    }

    /// Returns `true` while the pipeline drains at end of input.
    pub fn is_eoi(&self) -> bool {
        self.eoi
    }

    /// How many times EOI has been entered in this run.
    pub fn eoi_counter(&self) -> u32 {
        self.eoi_counter
    }

    /// Round number.
    pub fn tick_number(&self) -> u64 {
        self.tick
    }

    /// Name of the instance being ticked.
    pub fn name(&self) -> &str {
        self.logger.name()
    }

    /// The instance logger.
    pub fn logger(&self) -> &Logger {
        self.logger
    }

    /// Sends `msg` to the comma-separated `recipients`; returns the number reached.
    pub fn send_message(&self, recipients: &str, msg: Message) -> usize {
        self.postbox.send(self.logger.name(), recipients, msg)
    }
}

/// What the setup hooks may touch.
pub struct SetupContext<'a> {
    /// The level store.
    pub store: &'a LevelStore,
    /// External ports.
    pub external: &'a ExternalHub,
    /// The instance logger.
    pub logger: &'a Logger,
}

/// Per-round work plus the scheduler's notifications.
pub trait Tickable {
    /// Does one unit of work.
    ///
    /// Transient store errors (`NotAvailable`, `Overwritten`, `NoSpace`)
    /// returned through `?` are mapped to the matching [`TickResult`]; every
    /// other error aborts the run.
    fn tick(&mut self, ctx: &mut TickContext<'_>) -> Result<TickResult>;

    /// Called on a round where nobody made progress. Returning `true` keeps
    /// the loop going, e.g. to flush internal state.
    fn notify_empty_tick_loop(&mut self) -> bool {
        false
    }

    /// A pause was requested. Returning `false` rejects it.
    fn pause_event(&mut self) -> bool {
        true
    }

    /// The loop resumes after a pause.
    fn resume_event(&mut self) {}

    /// Handles one message; returns `true` if it was understood.
    fn handle_message(&mut self, _msg: &Message) -> bool {
        false
    }

    /// Returns `false` if the component never needs ticking.
    fn runs(&self) -> bool {
        true
    }
}

/// A component with one output level.
pub trait HasWriter {
    /// The writer handle.
    fn writer(&self) -> &WriterHandle;

    /// The writer handle, mutably.
    fn writer_mut(&mut self) -> &mut WriterHandle;

    /// Derives the output config from the merged input config, if any.
    ///
    /// The default copies period and frame size from the input.
    fn configure_writer(
        &mut self,
        config: &mut LevelConfig,
        input: Option<&LevelConfig>,
    ) -> Result<()> {
        if let Some(input) = input {
            config.period = input.period;
            config.frame_size_sec = input.frame_size_sec;
        }
        Ok(())
    }

    /// Declares the output fields, usually via
    /// [`WriterHandle::add_field()`](crate::WriterHandle::add_field).
    fn setup_new_names(&mut self, input: Option<&FieldLayout>) -> Result<()>;
}

/// A component with an input.
pub trait HasReader {
    /// The reader handle.
    fn reader(&self) -> &ReaderHandle;

    /// The reader handle, mutably.
    fn reader_mut(&mut self) -> &mut ReaderHandle;

    /// Inspects the merged input config before the read blocksize is
    /// reserved; may adjust the window or history.
    fn configure_reader(&mut self, _input: &LevelConfig) -> Result<()> {
        Ok(())
    }
}

/// A pipeline stage.
pub trait Component: Tickable + Send {
    /// The writer capability, if any.
    fn as_writer(&mut self) -> Option<&mut dyn HasWriter> {
        None
    }

    /// The reader capability, if any.
    fn as_reader(&mut self) -> Option<&mut dyn HasReader> {
        None
    }

    /// Extra work during registration.
    fn on_register(&mut self, _ctx: &SetupContext<'_>) -> Result<Progress> {
        Ok(Progress::Ready)
    }

    /// Extra work before the handles are configured.
    fn on_configure(&mut self, _ctx: &SetupContext<'_>) -> Result<Progress> {
        Ok(Progress::Ready)
    }

    /// Extra work before the handles are finalized.
    fn on_finalize(&mut self, _ctx: &SetupContext<'_>) -> Result<Progress> {
        Ok(Progress::Ready)
    }
}

/// Lifecycle position of an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum LifecycleState {
    /// Constructed.
    #[default]
    Unregistered,
    /// Read and write requests declared.
    Registered,
    /// Levels added and blocksizes reserved.
    Configured,
    /// Levels fixated; the instance can be ticked.
    Ready,
}

/// Drives one component through its setup phases.
#[derive(Debug, Clone, Copy, Default)]
pub struct Lifecycle {
    state: LifecycleState,
}

impl Lifecycle {
    /// Starts in [`LifecycleState::Unregistered`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state.
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    fn require(&self, state: LifecycleState, what: &str, ctx: &SetupContext<'_>) -> Result<()> {
        if self.state < state {
            return Err(Error::NotSetUp(format!("{what} of '{}'", ctx.logger.name())));
        }
        Ok(())
    }

    /// Declares read and write requests, then runs `on_register`.
    pub fn register(&mut self, c: &mut dyn Component, ctx: &SetupContext<'_>) -> Result<Progress> {
        if self.state >= LifecycleState::Registered {
            return Ok(Progress::Ready);
        }
        if let Some(r) = c.as_reader() {
            r.reader_mut().register(ctx.store)?;
        }
        if let Some(w) = c.as_writer() {
            w.writer_mut().register(ctx.store)?;
        }
        let progress = c.on_register(ctx)?;
        if progress.is_ready() {
            self.state = LifecycleState::Registered;
        }
        Ok(progress)
    }

    /// Resolves inputs, derives the output config and adds the output level.
    pub fn configure(&mut self, c: &mut dyn Component, ctx: &SetupContext<'_>) -> Result<Progress> {
        if self.state >= LifecycleState::Configured {
            return Ok(Progress::Ready);
        }
        self.require(LifecycleState::Registered, "configure", ctx)?;
        if let Progress::Retry(reason) = c.on_configure(ctx)? {
            return Ok(Progress::Retry(reason));
        }

        let mut input = None;
        if let Some(r) = c.as_reader() {
            if let Progress::Retry(reason) = r.reader_mut().resolve(ctx.store)? {
                return Ok(Progress::Retry(reason));
            }
            let merged = r.reader().config().clone();
            r.configure_reader(&merged)?;
            if let Progress::Retry(reason) = r.reader_mut().configure(ctx.store)? {
                return Ok(Progress::Retry(reason));
            }
            input = Some(r.reader().config().clone());
        }
        if let Some(w) = c.as_writer() {
            let mut cfg = w.writer().config().clone();
            w.configure_writer(&mut cfg, input.as_ref())?;
            w.writer_mut().set_config(cfg, false)?;
            w.writer_mut().configure(ctx.store)?;
        }
        self.state = LifecycleState::Configured;
        Ok(Progress::Ready)
    }

    /// Finalizes the reader, declares output names and fixates the output level.
    pub fn finalize(&mut self, c: &mut dyn Component, ctx: &SetupContext<'_>) -> Result<Progress> {
        if self.state >= LifecycleState::Ready {
            return Ok(Progress::Ready);
        }
        self.require(LifecycleState::Configured, "finalize", ctx)?;
        if let Progress::Retry(reason) = c.on_finalize(ctx)? {
            return Ok(Progress::Retry(reason));
        }

        let mut layout = None;
        if let Some(r) = c.as_reader() {
            if let Progress::Retry(reason) = r.reader_mut().finalize(ctx.store)? {
                return Ok(Progress::Retry(reason));
            }
            layout = Some(r.reader().layout().clone());
        }
        if let Some(w) = c.as_writer() {
            if !w.writer().is_fixated() {
                w.setup_new_names(layout.as_ref())?;
            }
            w.writer_mut().finalize(ctx.store)?;
        }
        self.state = LifecycleState::Ready;
        Ok(Progress::Ready)
    }
}
