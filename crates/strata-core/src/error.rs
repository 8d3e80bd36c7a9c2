//! Error type for the dataflow engine.
//!
//! A single [`Error`] covers three kinds of failure:
//!
//! - **Transient** conditions ([`NotAvailable`](Error::NotAvailable),
//!   [`Overwritten`](Error::Overwritten), [`NoSpace`](Error::NoSpace)) that a
//!   component turns into a [`TickResult`](crate::TickResult). The scheduler
//!   maps them automatically when a tick returns one through `?`.
//! - **Configuration** errors raised while the scheduler registers, configures
//!   and finalizes instances. The run never starts.
//! - **Logic** errors that abort a running loop because continuing would
//!   corrupt buffer math.
//!
//! Use [`Error::is_transient()`] to tell them apart.

use thiserror::Error;

/// Result alias used throughout `strata-core`.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors produced by the level store, the handles and the scheduler.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    // --- transient ---
    /// The requested frame has not been written yet.
    #[error("level '{level}': frame {index} not available yet (write cursor {cur_w})")]
    NotAvailable {
        /// Level name.
        level: String,
        /// Requested absolute index.
        index: i64,
        /// Write cursor at the time of the request.
        cur_w: i64,
    },

    /// The requested frame was already overwritten or lies outside a linear level.
    #[error("level '{level}': frame {index} is no longer in the buffer")]
    Overwritten {
        /// Level name.
        level: String,
        /// Requested absolute index.
        index: i64,
    },

    /// The level has no room for the frames being written.
    #[error("level '{level}': no space for {requested} frame(s) ({free} free)")]
    NoSpace {
        /// Level name.
        level: String,
        /// Number of frames the writer tried to add.
        requested: usize,
        /// Free slots at the time of the request.
        free: usize,
    },

    // --- configuration ---
    /// Two components claimed the same level as writer.
    #[error("level '{level}' already has writer '{existing}', cannot add writer '{requested}'")]
    DuplicateWriter {
        /// Level name.
        level: String,
        /// Component that owns the level.
        existing: String,
        /// Component that tried to claim it.
        requested: String,
    },

    /// A level was redefined with a config that conflicts with the fixated one.
    #[error("level '{level}' redefined incompatibly: {reason}")]
    IncompatibleLevel {
        /// Level name.
        level: String,
        /// What differs.
        reason: String,
    },

    /// No level with this name exists.
    #[error("level '{0}' not found")]
    LevelNotFound(String),

    /// A reader registered after the level was fixated.
    #[error("reader '{reader}' registered on level '{level}' after it was fixated")]
    ReaderAfterFixation {
        /// Level name.
        level: String,
        /// Component name.
        reader: String,
    },

    /// A reader asked for a larger block than the fixated level can hold.
    #[error("level '{level}': blocksize {requested} exceeds fixated reader blocksize {committed}")]
    BlocksizeFixed {
        /// Level name.
        level: String,
        /// Requested blocksize.
        requested: usize,
        /// Committed blocksize.
        committed: usize,
    },

    /// Levels merged by one reader have different periods.
    #[error("reader '{reader}': period of level '{level}' ({period}) differs from {expected}")]
    PeriodMismatch {
        /// Component name.
        reader: String,
        /// Offending level.
        level: String,
        /// Its period.
        period: f64,
        /// Period of the first level.
        expected: f64,
    },

    /// The registry has no constructor for this type.
    #[error("unknown component type '{0}'")]
    UnknownComponentType(String),

    /// Two instances share a name.
    #[error("component instance '{0}' already exists")]
    DuplicateInstance(String),

    /// A parameter is missing or has the wrong type or range.
    #[error("component '{component}': invalid parameter '{param}': {reason}")]
    InvalidParam {
        /// Component instance name.
        component: String,
        /// Parameter key.
        param: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A setup phase did not converge within the pass cap.
    #[error("{phase} did not converge after {passes} pass(es); pending: {}", format_pending(.pending))]
    NotConverged {
        /// Phase name.
        phase: &'static str,
        /// Number of passes executed.
        passes: usize,
        /// Pending instances with their last retry reason.
        pending: Vec<(String, String)>,
    },

    // --- logic ---
    /// A level or writer finalized without any output element.
    #[error("level '{0}' has zero output width")]
    ZeroWidth(String),

    /// A frame or matrix does not match the level width.
    #[error("level '{level}': width mismatch, got {got}, expected {expected}")]
    WidthMismatch {
        /// Level name.
        level: String,
        /// Width supplied by the caller.
        got: usize,
        /// Level width.
        expected: usize,
    },

    /// Fields were added to a fixated level.
    #[error("level '{0}' is fixated, its field layout cannot change")]
    FieldsFixated(String),

    /// Frame access on a level that has not been fixated.
    #[error("level '{0}' is not fixated yet")]
    NotFixated(String),

    /// A write index outside the writable window.
    #[error("level '{level}': index {index} outside writable range")]
    InvalidIndex {
        /// Level name.
        level: String,
        /// Offending absolute index.
        index: i64,
    },

    /// A handle or scheduler was used before its setup phase.
    #[error("{0} used before setup")]
    NotSetUp(String),

    /// A `grow_dyn` level could not allocate more storage.
    #[error("level '{level}': failed to grow to {frames} frames")]
    GrowFailed {
        /// Level name.
        level: String,
        /// Requested depth.
        frames: usize,
    },

    /// Failure reported by a component's own code.
    #[error("component '{component}': {message}")]
    Component {
        /// Component instance name.
        component: String,
        /// Description.
        message: String,
    },

    /// A worker thread disappeared while the controller was waiting for it.
    #[error("worker thread {0} terminated unexpectedly")]
    WorkerLost(usize),
}

fn format_pending(pending: &[(String, String)]) -> String {
    pending
        .iter()
        .map(|(name, reason)| format!("{name} ({reason})"))
        .collect::<Vec<_>>()
        .join(", ")
}

impl Error {
    /// Returns `true` for conditions a component may see during normal
    /// streaming and that resolve themselves on a later tick.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::NotAvailable { .. } | Self::Overwritten { .. } | Self::NoSpace { .. }
        )
    }

    /// Create an invalid parameter error.
    pub fn invalid_param(
        component: impl Into<String>,
        param: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidParam {
            component: component.into(),
            param: param.into(),
            reason: reason.into(),
        }
    }

    /// Create a component error.
    pub fn component(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Component {
            component: component.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        let na = Error::NotAvailable {
            level: "a".into(),
            index: 3,
            cur_w: 3,
        };
        assert!(na.is_transient());
        let full = Error::NoSpace {
            level: "a".into(),
            requested: 1,
            free: 0,
        };
        assert!(full.is_transient());
        assert!(!Error::ZeroWidth("a".into()).is_transient());
        assert!(!Error::LevelNotFound("a".into()).is_transient());
    }

    #[test]
    fn duplicate_writer_names_both_components() {
        let err = Error::DuplicateWriter {
            level: "wave".into(),
            existing: "src1".into(),
            requested: "src2".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("wave"), "got: {msg}");
        assert!(msg.contains("src1"), "got: {msg}");
        assert!(msg.contains("src2"), "got: {msg}");
    }

    #[test]
    fn not_converged_lists_pending() {
        let err = Error::NotConverged {
            phase: "configure",
            passes: 4,
            pending: vec![
                ("reader".into(), "waiting for level 'x'".into()),
                ("other".into(), "waiting for level 'y'".into()),
            ],
        };
        assert_eq!(
            err.to_string(),
            "configure did not converge after 4 pass(es); pending: reader (waiting for level 'x'), other (waiting for level 'y')"
        );
    }

    #[test]
    fn invalid_param_factory() {
        let err = Error::invalid_param("src", "frames", "must be positive");
        assert!(
            matches!(err, Error::InvalidParam { ref component, ref param, .. } if component == "src" && param == "frames")
        );
    }
}
