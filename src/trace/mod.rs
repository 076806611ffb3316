//! Span model, backend interface and the built-in backends.

pub(crate) mod backend;
pub(crate) mod noop;
pub(crate) mod otlp;
pub(crate) mod span;
pub(crate) mod transform;
pub(crate) mod xray;

pub use backend::TraceBackend;
pub use noop::NoopBackend;
pub use otlp::OtlpBackend;
pub use span::{KeyValue, ScopedSpan, SpanData, SpanId, SpanStatus, TraceId};
pub use transform::{
    Attribute, AttributeValue, Resource, ResourceSpans, Scope, ScopeSpans, Span, SpanKind, Status,
    StatusCode,
};
pub use xray::XrayBackend;
