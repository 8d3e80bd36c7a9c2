//! Pipeline file format and operations.

use serde::{Deserialize, Serialize};
use std::path::Path;

use strata_core::{ComponentRegistry, Params, Scheduler, SchedulerConfig, ThreadAssignment};

use crate::error::ConfigError;
use crate::params::table_to_params;
use crate::validation::{ValidationError, validate_pipeline};

/// A pipeline: scheduler settings plus the component instances to create.
///
/// # TOML Format
///
/// ```toml
/// [scheduler]
/// threads = 2
/// max_ticks = 100000
///
/// [[component]]
/// name = "src"
/// type = "signal_source"
/// [component.params]
/// frames = 1000
/// [component.writer]
/// buffer_size = 256
///
/// [[component]]
/// name = "mon"
/// type = "monitor"
/// thread = 1
/// [component.reader]
/// levels = "src"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct PipelineConfig {
    /// Optional pipeline name, used in logs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Scheduler settings.
    #[serde(default)]
    pub scheduler: SchedulerSection,

    /// Component instances in creation order.
    #[serde(default, rename = "component")]
    pub components: Vec<ComponentEntry>,
}

/// The `[scheduler]` table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SchedulerSection {
    /// Worker threads; `0` gives every instance its own thread.
    pub threads: usize,
    /// Stop after this many rounds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_ticks: Option<u64>,
    /// Pass cap per setup phase.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_passes: Option<usize>,
    /// Re-run after each EOI drain.
    pub multi_eoi: bool,
    /// Measure tick durations.
    pub profiling: bool,
    /// Print every level's counters after the run.
    pub print_level_states: bool,
}

impl Default for SchedulerSection {
    fn default() -> Self {
        Self {
            threads: 1,
            max_ticks: None,
            max_passes: None,
            multi_eoi: false,
            profiling: false,
            print_level_states: false,
        }
    }
}

impl SchedulerSection {
    /// Converts to the engine's settings.
    pub fn to_scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            threads: self.threads,
            max_ticks: self.max_ticks,
            max_passes: self.max_passes,
            multi_eoi: self.multi_eoi,
            profiling: self.profiling,
            ..SchedulerConfig::default()
        }
    }
}

/// Thread assignment as written in a pipeline file: an integer group or
/// `"never"`. Absent means group 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "RawThread", into = "RawThread")]
pub enum ThreadSpec {
    /// Group 0.
    #[default]
    Default,
    /// An explicit group.
    Group(usize),
    /// Set up but never ticked.
    Never,
}

impl ThreadSpec {
    fn is_default(&self) -> bool {
        *self == Self::Default
    }
}

impl From<ThreadSpec> for ThreadAssignment {
    fn from(spec: ThreadSpec) -> Self {
        match spec {
            ThreadSpec::Default => ThreadAssignment::Default,
            ThreadSpec::Group(n) => ThreadAssignment::Group(n),
            ThreadSpec::Never => ThreadAssignment::Never,
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RawThread {
    Group(usize),
    Name(String),
}

impl TryFrom<RawThread> for ThreadSpec {
    type Error = String;

    fn try_from(raw: RawThread) -> Result<Self, Self::Error> {
        match raw {
            RawThread::Group(n) => Ok(Self::Group(n)),
            RawThread::Name(s) => match s.as_str() {
                "never" => Ok(Self::Never),
                "default" => Ok(Self::Default),
                other => Err(format!(
                    "thread must be a group number, \"default\" or \"never\", got \"{other}\""
                )),
            },
        }
    }
}

impl From<ThreadSpec> for RawThread {
    fn from(spec: ThreadSpec) -> Self {
        match spec {
            ThreadSpec::Default => Self::Name("default".to_string()),
            ThreadSpec::Group(n) => Self::Group(n),
            ThreadSpec::Never => Self::Name("never".to_string()),
        }
    }
}

/// One `[[component]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ComponentEntry {
    /// Unique instance name.
    pub name: String,

    /// Registered type id.
    #[serde(rename = "type")]
    pub type_name: String,

    /// Worker group.
    #[serde(default, skip_serializing_if = "ThreadSpec::is_default")]
    pub thread: ThreadSpec,

    /// Type-specific parameters.
    #[serde(default, skip_serializing_if = "toml::Table::is_empty")]
    pub params: toml::Table,

    /// Output level options.
    #[serde(default, skip_serializing_if = "toml::Table::is_empty")]
    pub writer: toml::Table,

    /// Input level options.
    #[serde(default, skip_serializing_if = "toml::Table::is_empty")]
    pub reader: toml::Table,
}

impl ComponentEntry {
    /// Creates an entry with empty tables.
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            thread: ThreadSpec::Default,
            params: toml::Table::new(),
            writer: toml::Table::new(),
            reader: toml::Table::new(),
        }
    }

    /// Sets a parameter.
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<toml::Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Sets a writer option.
    pub fn with_writer(mut self, key: impl Into<String>, value: impl Into<toml::Value>) -> Self {
        self.writer.insert(key.into(), value.into());
        self
    }

    /// Sets a reader option.
    pub fn with_reader(mut self, key: impl Into<String>, value: impl Into<toml::Value>) -> Self {
        self.reader.insert(key.into(), value.into());
        self
    }

    /// Sets the worker group.
    pub fn with_thread(mut self, thread: ThreadSpec) -> Self {
        self.thread = thread;
        self
    }

    /// Builds the engine parameter tree: `params` with `writer` and `reader`
    /// nested as tables. Entries in the dedicated tables win over same-named
    /// keys inside `params`.
    pub fn to_params(&self) -> Params {
        let mut params = table_to_params(&self.params);
        if !self.writer.is_empty() {
            params.insert("writer", table_to_params(&self.writer));
        }
        if !self.reader.is_empty() {
            params.insert("reader", table_to_params(&self.reader));
        }
        params
    }

    /// Output level name: `writer.level`, or the instance name.
    pub fn output_level(&self) -> &str {
        self.writer
            .get("level")
            .and_then(toml::Value::as_str)
            .unwrap_or(self.name.as_str())
    }

    /// Input level names from `reader.levels` (a list, or a string split on `;` and `,`).
    pub fn input_levels(&self) -> Vec<String> {
        match self.reader.get("levels") {
            Some(toml::Value::String(s)) => s
                .split([';', ','])
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect(),
            Some(toml::Value::Array(items)) => items
                .iter()
                .filter_map(toml::Value::as_str)
                .map(String::from)
                .collect(),
            _ => Vec::new(),
        }
    }
}

impl PipelineConfig {
    /// Create an empty pipeline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a component.
    pub fn with_component(mut self, entry: ComponentEntry) -> Self {
        self.components.push(entry);
        self
    }

    /// Load a pipeline from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
        let pipeline = Self::from_toml(&content)?;
        tracing::debug!(path = %path.display(), components = pipeline.components.len(), "pipeline loaded");
        Ok(pipeline)
    }

    /// Load a pipeline from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Save the pipeline to a TOML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::create_dir(parent, e))?;
        }

        let content = self.to_toml()?;
        std::fs::write(path, content).map_err(|e| ConfigError::write_file(path, e))?;
        Ok(())
    }

    /// Convert the pipeline to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Look up a component entry by instance name.
    pub fn component(&self, name: &str) -> Option<&ComponentEntry> {
        self.components.iter().find(|c| c.name == name)
    }

    /// Check the pipeline against `registry` without constructing anything.
    pub fn validate(&self, registry: &ComponentRegistry) -> Result<(), ValidationError> {
        validate_pipeline(self, registry)
    }

    /// Validate, then create every instance in file order.
    ///
    /// The returned scheduler is not set up yet.
    pub fn build(&self, registry: &ComponentRegistry) -> Result<Scheduler, ConfigError> {
        self.validate(registry)?;
        let mut sched = Scheduler::new(self.scheduler.to_scheduler_config());
        for entry in &self.components {
            sched.add_instance(
                registry,
                &entry.name,
                &entry.type_name,
                entry.to_params(),
                entry.thread.into(),
            )?;
        }
        tracing::info!(
            pipeline = self.name.as_deref().unwrap_or("unnamed"),
            components = self.components.len(),
            threads = self.scheduler.threads,
            "pipeline built"
        );
        Ok(sched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::ParamValue;

    const PIPELINE: &str = r#"
        name = "demo"

        [scheduler]
        threads = 2
        max_ticks = 500
        print_level_states = true

        [[component]]
        name = "src"
        type = "signal_source"
        [component.params]
        frames = 100
        [component.writer]
        level = "raw"

        [[component]]
        name = "mon"
        type = "monitor"
        thread = "never"
        [component.reader]
        levels = ["raw"]
    "#;

    #[test]
    fn parses_scheduler_and_components() {
        let p = PipelineConfig::from_toml(PIPELINE).unwrap();
        assert_eq!(p.name.as_deref(), Some("demo"));
        assert_eq!(p.scheduler.threads, 2);
        assert_eq!(p.scheduler.max_ticks, Some(500));
        assert!(p.scheduler.print_level_states);
        assert!(!p.scheduler.multi_eoi);
        assert_eq!(p.components.len(), 2);
        assert_eq!(p.components[0].output_level(), "raw");
        assert_eq!(p.components[1].thread, ThreadSpec::Never);
        assert_eq!(p.components[1].input_levels(), vec!["raw"]);
    }

    #[test]
    fn defaults_when_sections_are_missing() {
        let p = PipelineConfig::from_toml("").unwrap();
        assert_eq!(p.scheduler, SchedulerSection::default());
        assert!(p.components.is_empty());
        assert_eq!(p.scheduler.to_scheduler_config(), SchedulerConfig::default());
    }

    #[test]
    fn thread_accepts_numbers_and_never_only() {
        let ok = PipelineConfig::from_toml(
            "[[component]]\nname = \"a\"\ntype = \"x\"\nthread = 3\n",
        )
        .unwrap();
        assert_eq!(ok.components[0].thread, ThreadSpec::Group(3));

        let err = PipelineConfig::from_toml(
            "[[component]]\nname = \"a\"\ntype = \"x\"\nthread = \"often\"\n",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::TomlParse(_)), "got: {err}");
    }

    #[test]
    fn params_nest_writer_and_reader() {
        let p = PipelineConfig::from_toml(PIPELINE).unwrap();
        let params = p.components[0].to_params();
        assert_eq!(params.get("frames"), Some(&ParamValue::Int(100)));
        let writer = params.table("src", "writer").unwrap();
        assert_eq!(writer.opt_str("src", "level").unwrap().as_deref(), Some("raw"));
        assert!(params.get("reader").is_none());
    }

    #[test]
    fn string_levels_are_split() {
        let entry = ComponentEntry::new("s", "scale").with_reader("levels", "a; b,c");
        assert_eq!(entry.input_levels(), vec!["a", "b", "c"]);
        assert_eq!(entry.output_level(), "s");
    }

    #[test]
    fn toml_round_trip_preserves_entries() {
        let p = PipelineConfig::new().with_component(
            ComponentEntry::new("src", "signal_source")
                .with_param("frames", 10_i64)
                .with_writer("buffer_size", 64_i64)
                .with_thread(ThreadSpec::Group(1)),
        );
        let text = p.to_toml().unwrap();
        assert!(text.contains("[[component]]"), "got: {text}");
        assert_eq!(PipelineConfig::from_toml(&text).unwrap(), p);
    }
}
