//! The tracing façade handed to call sites.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};

use tracing::warn;

use crate::config::{BackendKind, TracingConfig};
use crate::trace::backend::TraceBackend;
use crate::trace::noop::NoopBackend;
use crate::trace::otlp::OtlpBackend;
use crate::trace::span::{KeyValue, ScopedSpan};
use crate::trace::transform::ResourceSpans;
use crate::trace::xray::XrayBackend;

/// Construct the backend selected by the configuration.
pub fn build_backend(config: &TracingConfig) -> Box<dyn TraceBackend> {
    match config.backend {
        BackendKind::Disabled => Box::new(NoopBackend::new()),
        BackendKind::Otlp => Box::new(OtlpBackend::new(config)),
        BackendKind::Xray => Box::new(XrayBackend::new(config)),
    }
}

/// Owns the process's single tracing backend and shields traced operations
/// from tracing failures.
///
/// Construct one manager at startup and pass it by reference to call sites;
/// the backend cannot be reconfigured afterward.
#[derive(Debug)]
pub struct TraceManager {
    backend: Box<dyn TraceBackend>,
}

impl TraceManager {
    /// Wrap an explicitly constructed backend.
    pub fn new(backend: Box<dyn TraceBackend>) -> Self {
        TraceManager { backend }
    }

    /// Build the backend selected by `config`.
    pub fn from_config(config: &TracingConfig) -> Self {
        Self::new(build_backend(config))
    }

    /// Build from the process environment.
    pub fn from_env() -> Self {
        Self::from_config(&TracingConfig::from_env())
    }

    /// Begin a scoped span for `operation`.
    ///
    /// Tracing failure never breaks the traced operation: if span setup
    /// panics inside the backend, the failure is logged and an inert guard
    /// is returned.
    pub fn trace(&self, operation: &str, attributes: Vec<KeyValue>) -> ScopedSpan {
        match catch_unwind(AssertUnwindSafe(|| {
            self.backend.create_span(operation, attributes)
        })) {
            Ok(span) => span,
            Err(_) => {
                warn!(operation, "span setup failed, continuing without tracing");
                ScopedSpan::inert()
            }
        }
    }

    /// Run a fallible operation inside a scoped span.
    ///
    /// On `Err` the span status is set to `Error` with the error's display
    /// message and the error is returned to the caller unchanged. The guard
    /// also finalizes the span if `f` unwinds.
    pub fn in_span<T, E, F>(&self, operation: &str, attributes: Vec<KeyValue>, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut ScopedSpan) -> Result<T, E>,
        E: fmt::Display,
    {
        let mut span = self.trace(operation, attributes);
        match f(&mut span) {
            Ok(value) => Ok(value),
            Err(error) => {
                span.record_error(&error);
                Err(error)
            }
        }
    }

    /// Serialize and drain the backend's span buffer.
    pub fn get_resource_spans(&self) -> ResourceSpans {
        self.backend.get_resource_spans()
    }

    /// Attach result metadata to the currently open recording scope; only
    /// meaningful for the X-Ray backend.
    pub fn add_result_metadata(&self, result: &serde_json::Value) {
        self.backend.add_result_metadata(result);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::transform::StatusCode;

    #[derive(Debug)]
    struct PanickingBackend;

    impl TraceBackend for PanickingBackend {
        fn create_span(&self, _name: &str, _attributes: Vec<KeyValue>) -> ScopedSpan {
            panic!("backend bug");
        }

        fn get_resource_spans(&self) -> ResourceSpans {
            ResourceSpans::empty()
        }
    }

    fn otlp_manager() -> TraceManager {
        TraceManager::new(Box::new(OtlpBackend::buffered()))
    }

    #[test]
    fn disabled_and_unknown_select_noop() {
        let manager = TraceManager::from_config(&TracingConfig::default());
        let span = manager.trace("op", vec![]);
        assert!(!span.is_recording());
        assert_eq!(manager.get_resource_spans().span_count(), 0);
    }

    #[test]
    fn backend_panic_degrades_to_inert_span() {
        let manager = TraceManager::new(Box::new(PanickingBackend));
        let span = manager.trace("op", vec![KeyValue::new("k", "v")]);
        assert!(!span.is_recording());
    }

    #[test]
    fn in_span_returns_the_operation_error_unchanged() {
        let manager = otlp_manager();
        let result: Result<(), String> = manager.in_span("op", vec![], |_span| {
            Err("access denied".to_string())
        });
        assert_eq!(result.unwrap_err(), "access denied");

        let batch = manager.get_resource_spans();
        assert_eq!(batch.span_count(), 1);
        let status = &batch.scope_spans[0].spans[0].status;
        assert_eq!(status.code, StatusCode::Error);
        assert_eq!(status.message.as_deref(), Some("access denied"));
    }

    #[test]
    fn in_span_success_keeps_ok_status() {
        let manager = otlp_manager();
        let result: Result<u32, String> = manager.in_span("op", vec![], |_span| Ok(7));
        assert_eq!(result.unwrap(), 7);
        let batch = manager.get_resource_spans();
        assert_eq!(batch.scope_spans[0].spans[0].status.code, StatusCode::Ok);
    }

    #[test]
    fn unwinding_operation_still_finalizes_the_span() {
        let manager = otlp_manager();
        let result = std::panic::catch_unwind(AssertUnwindSafe(|| {
            let _span = manager.trace("op", vec![]);
            panic!("operation exploded");
        }));
        assert!(result.is_err());
        assert_eq!(manager.get_resource_spans().span_count(), 1);
    }

    #[test]
    fn repeated_export_without_new_spans_is_empty() {
        let manager = otlp_manager();
        drop(manager.trace("op", vec![]));
        assert_eq!(manager.get_resource_spans().span_count(), 1);
        assert_eq!(manager.get_resource_spans().span_count(), 0);
    }
}
