//! Pipeline files for strata.
//!
//! A pipeline file is TOML: a `[scheduler]` table and one `[[component]]`
//! entry per instance. This crate parses it, checks it against a
//! [`ComponentRegistry`], and turns it into a [`Scheduler`](strata_core::Scheduler)
//! ready for setup.
//!
//! # Features
//!
//! - **Load / save**: [`PipelineConfig::load()`], [`PipelineConfig::from_toml()`],
//!   [`PipelineConfig::save()`]
//! - **Validation**: unique names, known types and keys, one writer per level,
//!   every read level written ([`validate_pipeline()`])
//! - **Build**: [`PipelineConfig::build()`] creates every instance in file order
//!
//! # Example
//!
//! ```rust
//! use strata_config::PipelineConfig;
//!
//! let pipeline = PipelineConfig::from_toml(r#"
//!     [scheduler]
//!     threads = 1
//!
//!     [[component]]
//!     name = "src"
//!     type = "signal_source"
//!     [component.params]
//!     frames = 50
//!
//!     [[component]]
//!     name = "mon"
//!     type = "monitor"
//!     [component.reader]
//!     levels = "src"
//! "#).unwrap();
//!
//! let registry = strata_components::builtin_registry();
//! let mut sched = pipeline.build(&registry).unwrap();
//! sched.setup().unwrap();
//! let report = sched.run().unwrap();
//! assert_eq!(report.level("src").unwrap().cur_w, 50);
//! ```

mod error;
mod pipeline;

/// TOML to engine parameter conversion.
pub mod params;

/// Pipeline validation.
pub mod validation;

pub use error::ConfigError;
pub use params::{table_to_params, value_to_param};
pub use pipeline::{ComponentEntry, PipelineConfig, SchedulerSection, ThreadSpec};
pub use validation::{ValidationError, ValidationResult, validate_pipeline};

/// Re-export commonly used types from strata-core
pub use strata_core::{ComponentCategory, ComponentDescriptor, ComponentRegistry};
