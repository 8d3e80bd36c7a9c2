//! Integration tests for strata-config.
//!
//! Pipelines go from TOML text or files through validation to a finished run.

use strata_components::builtin_registry;
use strata_config::{ComponentEntry, ConfigError, PipelineConfig, ThreadSpec, ValidationError};
use strata_core::{RunStatus, ThreadAssignment};
use tempfile::TempDir;

const CHAIN: &str = r#"
name = "chain"

[scheduler]
threads = 2
profiling = true

[[component]]
name = "src"
type = "signal_source"
[component.params]
frames = 120
width = 2
block = 8

[[component]]
name = "gain"
type = "scale"
thread = 1
[component.params]
gain = 0.5
[component.reader]
levels = "src"
[component.writer]
level = "half"
buffer_size = 32

[[component]]
name = "mon"
type = "monitor"
thread = 1
[component.reader]
levels = "half"
"#;

/// A pipeline parsed from text builds, sets up and drains.
#[test]
fn toml_pipeline_runs_to_completion() {
    let pipeline = PipelineConfig::from_toml(CHAIN).expect("should parse");
    let mut sched = pipeline.build(&builtin_registry()).expect("should build");
    assert_eq!(sched.instance_names(), vec!["src", "gain", "mon"]);
    assert_eq!(sched.config().threads, 2);

    sched.setup().expect("should set up");
    let report = sched.run().expect("should run");

    assert_eq!(report.status, RunStatus::Completed);
    let half = report.level("half").expect("level 'half'");
    assert_eq!(half.cur_w, 120);
    assert_eq!(half.width, 2);
    assert!(half.depth >= 32);
    let profile = report.profile("gain").expect("gain profile");
    assert!(profile.ticks > 0);
}

/// Save then load gives back the same document.
#[test]
fn save_load_roundtrip() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let path = temp_dir.path().join("nested").join("pipeline.toml");

    let original = PipelineConfig::from_toml(CHAIN).unwrap();
    original.save(&path).expect("should save");
    assert!(path.exists());

    let loaded = PipelineConfig::load(&path).expect("should load");
    assert_eq!(loaded, original);
    assert_eq!(loaded.component("gain").unwrap().thread, ThreadSpec::Group(1));
}

#[test]
fn missing_file_is_a_read_error() {
    let temp_dir = TempDir::new().unwrap();
    let err = PipelineConfig::load(temp_dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::ReadFile { .. }), "got: {err}");
}

#[test]
fn malformed_toml_is_a_parse_error() {
    let err = PipelineConfig::from_toml("[[component]\nname = ").unwrap_err();
    assert!(matches!(err, ConfigError::TomlParse(_)), "got: {err}");
}

/// Validation runs before anything is constructed.
#[test]
fn build_rejects_invalid_pipelines() {
    let pipeline = PipelineConfig::new()
        .with_component(ComponentEntry::new("src", "signal_source"))
        .with_component(ComponentEntry::new("mon", "monitor").with_reader("levels", "nowhere"));
    let err = pipeline.build(&builtin_registry()).err().expect("should fail");
    assert!(
        matches!(err, ConfigError::Validation(ValidationError::UnknownLevel { ref level, .. }) if level == "nowhere"),
        "got: {err}"
    );
}

/// Parameter errors surface from the component constructor as engine errors.
#[test]
fn bad_parameter_value_is_an_engine_error() {
    let pipeline = PipelineConfig::new().with_component(
        ComponentEntry::new("src", "signal_source").with_param("waveform", "square"),
    );
    let err = pipeline.build(&builtin_registry()).err().expect("should fail");
    assert!(matches!(err, ConfigError::Engine(_)), "got: {err}");
    let msg = err.to_string();
    assert!(msg.contains("square"), "got: {msg}");
}

/// `thread = "never"` instances are set up but not ticked.
#[test]
fn never_thread_is_honored() {
    let pipeline = PipelineConfig::new()
        .with_component(
            ComponentEntry::new("src", "signal_source").with_param("frames", 10_i64),
        )
        .with_component(
            ComponentEntry::new("mon", "monitor")
                .with_reader("levels", "src")
                .with_thread(ThreadSpec::Never),
        );
    assert_eq!(ThreadAssignment::from(ThreadSpec::Never), ThreadAssignment::Never);

    let mut sched = pipeline.build(&builtin_registry()).unwrap();
    sched.setup().unwrap();
    let report = sched.run().unwrap();
    assert_eq!(report.profile("mon").unwrap().ticks, 0);
}

/// Every type in the builtin registry validates with only its declared keys.
#[test]
fn declared_keys_pass_validation() {
    let registry = builtin_registry();
    let pipeline = PipelineConfig::new()
        .with_component(
            ComponentEntry::new("src", "signal_source")
                .with_param("frames", 8_i64)
                .with_param("waveform", "sine")
                .with_param("frequency", 2.0),
        )
        .with_component(
            ComponentEntry::new("win", "framer")
                .with_param("length", 4_i64)
                .with_param("step", 2_i64)
                .with_reader("levels", "src"),
        )
        .with_component(
            ComponentEntry::new("mon", "monitor")
                .with_param("every", 2_i64)
                .with_reader("levels", "win"),
        );
    assert_eq!(pipeline.validate(&registry), Ok(()));
}
