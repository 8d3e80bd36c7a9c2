//! CLI command implementations.

pub mod components;
pub mod run;
pub mod validate;

use std::process::ExitCode;

use strata_config::ConfigError;
use strata_core::RunStatus;

/// Exit code for a failed configuration or a logic error during the run.
const EXIT_PIPELINE_ERROR: u8 = 2;
/// Exit code for a run stopped by Ctrl-C.
const EXIT_ABORTED: u8 = 3;

/// Maps how a run ended to the process exit code.
pub fn status_exit_code(status: RunStatus) -> ExitCode {
    match status {
        RunStatus::Completed => ExitCode::SUCCESS,
        RunStatus::Aborted => ExitCode::from(EXIT_ABORTED),
    }
}

/// Maps an error to the process exit code: `2` for anything the pipeline or
/// engine rejected, `1` for I/O and everything else.
pub fn error_exit_code(err: &anyhow::Error) -> ExitCode {
    if let Some(config) = err.downcast_ref::<ConfigError>() {
        return if config.is_io() {
            ExitCode::FAILURE
        } else {
            ExitCode::from(EXIT_PIPELINE_ERROR)
        };
    }
    if err.downcast_ref::<strata_core::Error>().is_some() {
        return ExitCode::from(EXIT_PIPELINE_ERROR);
    }
    ExitCode::FAILURE
}

/// Loads a pipeline file and builds it against the builtin registry.
pub fn load_pipeline(
    path: &std::path::Path,
) -> Result<(strata_config::PipelineConfig, strata_core::ComponentRegistry), ConfigError> {
    let pipeline = strata_config::PipelineConfig::load(path)?;
    Ok((pipeline, strata_components::builtin_registry()))
}
