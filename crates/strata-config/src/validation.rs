//! Pipeline validation.
//!
//! Checks a [`PipelineConfig`] against a [`ComponentRegistry`] before
//! anything is constructed: instance names are unique, every type is
//! registered and only gets the parameter keys it declares, no two
//! instances write the same level, and every level someone reads is
//! written by someone.
//!
//! Every problem is collected; more than one is reported as
//! [`ValidationError::Multiple`].
//!
//! # Example
//!
//! ```rust
//! use strata_config::{ComponentEntry, PipelineConfig, ValidationError};
//! use strata_core::ComponentRegistry;
//!
//! let pipeline = PipelineConfig::new().with_component(ComponentEntry::new("a", "nope"));
//! let err = pipeline.validate(&ComponentRegistry::new()).unwrap_err();
//! assert!(matches!(err, ValidationError::UnknownType { .. }));
//! ```

use std::collections::{HashMap, HashSet};

use strata_core::{ComponentCategory, ComponentRegistry};
use thiserror::Error;

use crate::pipeline::PipelineConfig;

/// Validation error types.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    /// Two entries share an instance name.
    #[error("duplicate component name '{0}'")]
    DuplicateName(String),

    /// The type id is not registered.
    #[error("component '{component}': unknown type '{type_name}'")]
    UnknownType {
        /// Instance name.
        component: String,
        /// The unregistered type id.
        type_name: String,
    },

    /// A `params` key the type does not declare.
    #[error("component '{component}': unknown parameter '{param}'")]
    UnknownParameter {
        /// Instance name.
        component: String,
        /// The unrecognized key.
        param: String,
    },

    /// Two instances write the same level.
    #[error("level '{level}' is written by both '{first}' and '{second}'")]
    DuplicateWriter {
        /// Level name.
        level: String,
        /// Instance declared first.
        first: String,
        /// Instance declared later.
        second: String,
    },

    /// A reading component names no input level.
    #[error("component '{0}' reads no level (set reader.levels)")]
    MissingInput(String),

    /// An input level nobody writes.
    #[error("component '{component}' reads level '{level}', which no component writes")]
    UnknownLevel {
        /// Instance name.
        component: String,
        /// The unwritten level.
        level: String,
    },

    /// Multiple validation errors.
    #[error("multiple validation errors: {}", .0.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("; "))]
    Multiple(Vec<ValidationError>),
}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

fn writes(category: ComponentCategory) -> bool {
    matches!(category, ComponentCategory::Source | ComponentCategory::Processor)
}

fn reads(category: ComponentCategory) -> bool {
    matches!(category, ComponentCategory::Sink | ComponentCategory::Processor)
}

/// Validates `pipeline` against `registry`.
pub fn validate_pipeline(
    pipeline: &PipelineConfig,
    registry: &ComponentRegistry,
) -> ValidationResult<()> {
    let mut errors = Vec::new();
    let mut names = HashSet::new();
    let mut writers: HashMap<&str, &str> = HashMap::new();

    for entry in &pipeline.components {
        if !names.insert(entry.name.as_str()) {
            errors.push(ValidationError::DuplicateName(entry.name.clone()));
        }
        let Some(descriptor) = registry.get(&entry.type_name) else {
            errors.push(ValidationError::UnknownType {
                component: entry.name.clone(),
                type_name: entry.type_name.clone(),
            });
            continue;
        };
        for key in entry.params.keys() {
            if !descriptor.params.contains(&key.as_str()) {
                errors.push(ValidationError::UnknownParameter {
                    component: entry.name.clone(),
                    param: key.clone(),
                });
            }
        }
        if writes(descriptor.category) {
            let level = entry.output_level();
            if let Some(first) = writers.insert(level, &entry.name) {
                errors.push(ValidationError::DuplicateWriter {
                    level: level.to_string(),
                    first: first.to_string(),
                    second: entry.name.clone(),
                });
            }
        }
    }

    for entry in &pipeline.components {
        let Some(descriptor) = registry.get(&entry.type_name) else {
            continue;
        };
        if !reads(descriptor.category) {
            continue;
        }
        let levels = entry.input_levels();
        if levels.is_empty() {
            errors.push(ValidationError::MissingInput(entry.name.clone()));
        }
        for level in levels {
            if !writers.contains_key(level.as_str()) {
                errors.push(ValidationError::UnknownLevel {
                    component: entry.name.clone(),
                    level,
                });
            }
        }
    }

    match errors.len() {
        0 => Ok(()),
        1 => Err(errors.remove(0)),
        _ => Err(ValidationError::Multiple(errors)),
    }
}
