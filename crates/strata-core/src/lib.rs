//! Strata Core - streaming dataflow engine
//!
//! This crate provides the runtime that moves frames of samples between
//! processing stages: named ring-buffer levels, the handles stages use to
//! read and write them, the component lifecycle, and the tick scheduler.
//!
//! # Core Abstractions
//!
//! ## Data
//!
//! - [`LevelStore`] - Named ring buffers ("levels") with one writer and any number of readers
//! - [`Frame`] / [`Matrix`] - One time step, or a block of time steps, with [`TimeMeta`]
//! - [`FieldLayout`] - Named fields that make up a frame
//! - [`LevelConfig`] - Period, buffer size, ring/linear mode and overflow policy of a level
//!
//! ## Handles
//!
//! - [`WriterHandle`] - Owns one output level, negotiates its config and fields
//! - [`ReaderHandle`] - Reads one or more levels as a single concatenated input,
//!   frame by frame or through a sliding window
//!
//! ## Components
//!
//! - [`Tickable`], [`HasWriter`], [`HasReader`] - Capability traits
//! - [`Component`] - A pipeline stage, set up by [`Lifecycle`]
//! - [`ComponentRegistry`] - Type id → constructor, passed around as a value
//!
//! ## Running
//!
//! - [`Scheduler`] - Fixed-point setup, then single- or multi-threaded tick rounds
//! - [`SchedulerHandle`] - Abort, pause and external data from other threads
//! - [`ExternalInput`] / [`ExternalOutput`] - Push data in, receive blocks out
//! - [`Postbox`] / [`Message`] - Side-channel messages between instances
//!
//! # Example
//!
//! ```rust,ignore
//! use strata_core::{Params, Scheduler, SchedulerConfig, ThreadAssignment};
//!
//! let registry = strata_components::builtin_registry();
//! let mut sched = Scheduler::new(SchedulerConfig::default());
//! sched.add_instance(&registry, "src", "signal_source",
//!     Params::new().with("frames", 100), ThreadAssignment::Default)?;
//! sched.add_instance(&registry, "mon", "monitor",
//!     Params::new().with("reader", Params::new().with("levels", "src")), ThreadAssignment::Default)?;
//! sched.setup()?;
//! let report = sched.run()?;
//! assert_eq!(report.level("src").unwrap().cur_w, 100);
//! ```
//!
//! # Design Principles
//!
//! - **Copy in, copy out**: levels own their storage; callers never alias it
//! - **Absolute cursors**: frame indices are `i64` and never wrap
//! - **Transient vs fatal**: data not yet available or no space are tick
//!   outcomes, everything else aborts
//! - **No globals**: the store lives in the scheduler, the registry is a value

pub mod component;
pub mod config;
pub mod error;
pub mod external;
pub mod frame;
pub mod level;
pub mod logger;
pub mod message;
pub mod params;
pub mod reader;
pub mod registry;
pub mod scheduler;
pub mod store;
pub mod writer;

// Re-export main types at crate root
pub use component::{
    Component, HasReader, HasWriter, Lifecycle, LifecycleState, Progress, SetupContext, TickContext,
    TickResult, Tickable,
};
pub use config::{DEFAULT_BUFFER_SIZE, LevelConfig, NoHang, WriterOptions, sec_to_vidx, vidx_to_sec};
pub use error::{Error, Result};
pub use external::{DataSignal, ExternalHub, ExternalInput, ExternalOutput, PushError};
pub use frame::{FieldLayout, FieldMeta, Frame, Matrix, Padding, Sample, TimeMeta};
pub use level::{LevelStatus, ReaderId};
pub use logger::Logger;
pub use message::{MESSAGE_SLOTS, Message, Postbox};
pub use params::{ParamValue, Params};
pub use reader::ReaderHandle;
pub use registry::{
    ComponentArgs, ComponentCategory, ComponentDescriptor, ComponentFactory, ComponentRegistry,
};
pub use scheduler::{
    DEFAULT_WAIT_SLICE, InstanceProfile, PauseMode, RunReport, RunStatus, Scheduler, SchedulerConfig,
    SchedulerHandle, ThreadAssignment,
};
pub use store::{LevelId, LevelStore, WriteMode};
pub use writer::WriterHandle;
