//! The pluggable backend interface.

use std::fmt;

use crate::trace::span::{KeyValue, ScopedSpan};
use crate::trace::transform::ResourceSpans;

/// An interchangeable span-recording backend.
///
/// Backends never fail the traced operation: `create_span` is infallible and
/// degrades to an inert guard when the backend cannot record, and
/// `get_resource_spans` returns an empty structure when there is nothing to
/// export.
pub trait TraceBackend: Send + Sync + fmt::Debug {
    /// Begin a scoped span.
    ///
    /// The returned guard is finalized on every exit path of the caller's
    /// scope; a successfully created span is buffered exactly once,
    /// regardless of whether the scope succeeds or fails.
    fn create_span(&self, name: &str, attributes: Vec<KeyValue>) -> ScopedSpan;

    /// Serialize and drain the buffered spans.
    ///
    /// Draining is a side effect: repeated calls return only spans completed
    /// since the previous call, never duplicates.
    fn get_resource_spans(&self) -> ResourceSpans;

    /// Attach result metadata to the currently open recording scope.
    ///
    /// Only the X-Ray backend records anything here; everywhere else this is
    /// a no-op.
    fn add_result_metadata(&self, _result: &serde_json::Value) {}
}
