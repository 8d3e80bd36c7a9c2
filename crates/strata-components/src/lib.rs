//! Built-in component types for strata pipelines.
//!
//! This crate fills a [`ComponentRegistry`] with the stock stages a pipeline
//! file can name by type id: test sources, the bridge to the host
//! application, and a handful of small processors.
//!
//! # Components
//!
//! | id | category | does |
//! |----|----------|------|
//! | `signal_source` | Source | ramp, sine or constant frames at a fixed period |
//! | `external_source` | Source | drains data pushed by the host |
//! | `external_sink` | Sink | hands blocks to host callbacks |
//! | `scale` | Processor | `out = in * gain + offset` |
//! | `framer` | Processor | sliding window, one flattened window per output frame |
//! | `delta` | Processor | `out[i] = in[i] - in[i - lag]` |
//! | `monitor` | Sink | counts frames, reports at end of input |
//!
//! # Example
//!
//! ```rust
//! use strata_components::builtin_registry;
//! use strata_core::{Params, Scheduler, SchedulerConfig, ThreadAssignment};
//!
//! let registry = builtin_registry();
//! let mut sched = Scheduler::new(SchedulerConfig::default());
//! sched
//!     .add_instance(&registry, "src", "signal_source",
//!         Params::new().with("frames", 20_i64), ThreadAssignment::Default)
//!     .unwrap();
//! sched
//!     .add_instance(&registry, "mon", "monitor",
//!         Params::new().with("reader", Params::new().with("levels", "src")),
//!         ThreadAssignment::Default)
//!     .unwrap();
//! sched.setup().unwrap();
//! let report = sched.run().unwrap();
//! assert_eq!(report.level("src").unwrap().cur_w, 20);
//! ```
//!
//! Every component reads its own keys from the instance `params` table; the
//! nested `writer` and `reader` tables are handed to
//! [`WriterHandle::from_params()`](strata_core::WriterHandle::from_params) and
//! [`ReaderHandle::from_params()`](strata_core::ReaderHandle::from_params).

pub mod delta;
pub mod external;
pub mod framer;
pub mod monitor;
pub mod scale;
pub mod source;

pub use delta::Delta;
pub use external::{ExternalSink, ExternalSource};
pub use framer::Framer;
pub use monitor::Monitor;
pub use scale::Scale;
pub use source::{SignalSource, Waveform};

use strata_core::{
    ComponentCategory, ComponentDescriptor, ComponentRegistry, Matrix, ReaderHandle, Result,
    LevelStore,
};

/// Creates a registry holding every built-in component type.
pub fn builtin_registry() -> ComponentRegistry {
    let mut registry = ComponentRegistry::new();
    register_builtin_components(&mut registry);
    registry
}

/// Adds the built-in component types to `registry`.
pub fn register_builtin_components(registry: &mut ComponentRegistry) {
    // Sources
    registry.register(
        ComponentDescriptor {
            id: "signal_source",
            name: "Signal Source",
            description: "Ramp, sine or constant frames at a fixed period",
            category: ComponentCategory::Source,
            params: source::PARAMS,
        },
        |args| Ok(Box::new(SignalSource::from_args(args)?)),
    );

    registry.register(
        ComponentDescriptor {
            id: "external_source",
            name: "External Source",
            description: "Frames pushed by the host application",
            category: ComponentCategory::Source,
            params: external::SOURCE_PARAMS,
        },
        |args| Ok(Box::new(ExternalSource::from_args(args)?)),
    );

    // Sinks
    registry.register(
        ComponentDescriptor {
            id: "external_sink",
            name: "External Sink",
            description: "Delivers blocks of its input to host callbacks",
            category: ComponentCategory::Sink,
            params: external::SINK_PARAMS,
        },
        |args| Ok(Box::new(ExternalSink::from_args(args)?)),
    );

    registry.register(
        ComponentDescriptor {
            id: "monitor",
            name: "Monitor",
            description: "Counts frames and reports the total at end of input",
            category: ComponentCategory::Sink,
            params: monitor::PARAMS,
        },
        |args| Ok(Box::new(Monitor::from_args(args)?)),
    );

    // Processors
    registry.register(
        ComponentDescriptor {
            id: "scale",
            name: "Scale",
            description: "Multiplies by a gain and adds an offset",
            category: ComponentCategory::Processor,
            params: scale::PARAMS,
        },
        |args| Ok(Box::new(Scale::from_args(args)?)),
    );

    registry.register(
        ComponentDescriptor {
            id: "framer",
            name: "Framer",
            description: "Sliding window over the input, one window per output frame",
            category: ComponentCategory::Processor,
            params: framer::PARAMS,
        },
        |args| Ok(Box::new(Framer::from_args(args)?)),
    );

    registry.register(
        ComponentDescriptor {
            id: "delta",
            name: "Delta",
            description: "Difference between each frame and the one `lag` frames earlier",
            category: ComponentCategory::Processor,
            params: delta::PARAMS,
        },
        |args| Ok(Box::new(Delta::from_args(args)?)),
    );
}

/// Input levels used when the `reader` table names none.
const NO_DEFAULT_LEVELS: &[&str] = &[];

/// Reads up to `max` frames from the cursor, whatever is available, and
/// moves the cursor past them. Returns `None` if nothing is available.
pub(crate) fn read_available(
    reader: &mut ReaderHandle,
    store: &LevelStore,
    max: usize,
) -> Result<Option<Matrix>> {
    let n = reader.n_avail(store).min(max);
    if n == 0 {
        return Ok(None);
    }
    let start = reader.cursor();
    let block = reader.matrix_at(store, start, n)?;
    reader.catchup(store, start + n as i64)?;
    Ok(Some(block))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_holds_every_builtin() {
        let registry = builtin_registry();
        assert_eq!(registry.len(), 7);
        for id in [
            "signal_source",
            "external_source",
            "external_sink",
            "monitor",
            "scale",
            "framer",
            "delta",
        ] {
            assert!(registry.contains(id), "missing {id}");
        }
    }

    #[test]
    fn components_by_category() {
        let registry = builtin_registry();
        assert_eq!(registry.in_category(ComponentCategory::Source).len(), 2);
        assert_eq!(registry.in_category(ComponentCategory::Sink).len(), 2);
        assert_eq!(registry.in_category(ComponentCategory::Processor).len(), 3);
    }

    #[test]
    fn descriptors_list_their_keys() {
        let registry = builtin_registry();
        let framer = registry.get("framer").unwrap();
        assert_eq!(framer.name, "Framer");
        assert!(framer.params.contains(&"length"));
        assert!(framer.params.contains(&"step"));
    }

    #[test]
    fn readers_require_an_input_level() {
        let registry = builtin_registry();
        for id in ["scale", "framer", "delta", "monitor", "external_sink"] {
            let args = strata_core::ComponentArgs::new("x", id, strata_core::Params::new());
            let err = registry.create(&args).err().unwrap();
            let msg = err.to_string();
            assert!(msg.contains("reader.levels"), "{id} got: {msg}");
        }
    }
}
