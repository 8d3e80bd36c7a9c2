//! Per-instance logging context.

use std::sync::Arc;

use tracing::Span;

/// A `tracing` span carrying a component instance name.
///
/// The scheduler creates one per instance and hands it to the constructor
/// through [`ComponentArgs`](crate::ComponentArgs). It also enters the span
/// around every lifecycle hook and tick, so plain `tracing::debug!` calls in
/// component code already carry the instance name. The helpers below are for
/// code running outside those scopes.
#[derive(Debug, Clone)]
pub struct Logger {
    name: Arc<str>,
    span: Span,
}

impl Logger {
    /// Creates a logger for instance `name`.
    pub fn new(name: &str) -> Self {
        Self {
            name: Arc::from(name),
            span: tracing::info_span!("component", name = %name),
        }
    }

    /// A logger whose span records nothing, for tests and ad-hoc construction.
    pub fn detached(name: &str) -> Self {
        Self {
            name: Arc::from(name),
            span: Span::none(),
        }
    }

    /// Instance name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The underlying span.
    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Runs `f` inside the span.
    pub fn in_scope<R>(&self, f: impl FnOnce() -> R) -> R {
        self.span.in_scope(f)
    }

    /// Logs at debug level inside the span.
    pub fn debug(&self, message: &str) {
        self.in_scope(|| tracing::debug!("{message}"));
    }

    /// Logs at info level inside the span.
    pub fn info(&self, message: &str) {
        self.in_scope(|| tracing::info!("{message}"));
    }

    /// Logs at warn level inside the span.
    pub fn warn(&self, message: &str) {
        self.in_scope(|| tracing::warn!("{message}"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn carries_instance_name() {
        let log = Logger::new("framer");
        assert_eq!(log.name(), "framer");
        assert_eq!(log.in_scope(|| 7), 7);
        let detached = Logger::detached("x");
        assert!(detached.span().is_none());
        detached.info("no subscriber installed");
    }
}
