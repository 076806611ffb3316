//! Span identity, attributes and the scoped span guard.
//!
//! A span is created when a traced scope is entered and finalized exactly
//! once when the scope exits, whether it returns normally, propagates an
//! error, or unwinds. Finalization is driven by [`ScopedSpan`]'s `Drop`
//! implementation, so no exit path can leak an unfinished span.

use std::cell::RefCell;
use std::fmt;
use std::time::SystemTime;

use rand::{rngs, Rng, SeedableRng};

thread_local! {
    /// Store random number generator for each thread
    static CURRENT_RNG: RefCell<rngs::SmallRng> = RefCell::new(rngs::SmallRng::from_entropy());
}

/// A 128-bit trace identifier, random per span and scoped to one export
/// batch.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TraceId(u128);

impl TraceId {
    /// Generate a fresh random trace id.
    pub fn random() -> Self {
        CURRENT_RNG.with(|rng| TraceId(rng.borrow_mut().gen::<u128>()))
    }
}

impl From<u128> for TraceId {
    fn from(value: u128) -> Self {
        TraceId(value)
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

impl fmt::Debug for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TraceId({:032x})", self.0)
    }
}

/// A 64-bit span identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SpanId(u64);

impl SpanId {
    /// Generate a fresh random span id.
    pub fn random() -> Self {
        CURRENT_RNG.with(|rng| SpanId(rng.borrow_mut().gen::<u64>()))
    }
}

impl From<u64> for SpanId {
    fn from(value: u64) -> Self {
        SpanId(value)
    }
}

impl fmt::Display for SpanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl fmt::Debug for SpanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SpanId({:016x})", self.0)
    }
}

pub(crate) fn random_hex_96() -> String {
    CURRENT_RNG.with(|rng| {
        let id: u128 = rng.borrow_mut().gen();
        format!("{:024x}", id & ((1u128 << 96) - 1))
    })
}

/// A string attribute attached to a span.
///
/// Values are stringified at construction time; the original type is not
/// retained.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyValue {
    /// Attribute key.
    pub key: String,
    /// Stringified attribute value.
    pub value: String,
}

impl KeyValue {
    /// Create a new key/value pair, stringifying the value.
    pub fn new(key: impl Into<String>, value: impl ToString) -> Self {
        KeyValue {
            key: key.into(),
            value: value.to_string(),
        }
    }
}

/// Terminal outcome of a span.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum SpanStatus {
    /// The operation completed normally.
    #[default]
    Ok,
    /// The operation failed.
    Error {
        /// The failure message, taken from the operation's error.
        message: String,
    },
}

impl SpanStatus {
    /// Create an error status with the given message.
    pub fn error(message: impl Into<String>) -> Self {
        SpanStatus::Error {
            message: message.into(),
        }
    }

    /// Returns `true` for [`SpanStatus::Error`].
    pub fn is_error(&self) -> bool {
        matches!(self, SpanStatus::Error { .. })
    }
}

/// A finished or in-flight span record.
#[derive(Clone, Debug)]
pub struct SpanData {
    /// Trace identity, fresh per span.
    pub trace_id: TraceId,
    /// Span identity, fresh per span.
    pub span_id: SpanId,
    /// Operation name.
    pub name: String,
    /// When the scope was entered.
    pub start_time: SystemTime,
    /// When the scope exited. Equal to `start_time` until the span is ended;
    /// finalization stamps the current time if no explicit end was recorded.
    pub end_time: SystemTime,
    /// String attributes, in insertion order.
    pub attributes: Vec<KeyValue>,
    /// Terminal status.
    pub status: SpanStatus,
}

impl SpanData {
    pub(crate) fn begin(name: &str, attributes: Vec<KeyValue>) -> Self {
        let start_time = SystemTime::now();
        SpanData {
            trace_id: TraceId::random(),
            span_id: SpanId::random(),
            name: name.to_string(),
            start_time,
            end_time: start_time,
            attributes,
            status: SpanStatus::default(),
        }
    }

    /// Ensure the end time is set, stamping `now` if the span was never
    /// explicitly ended.
    pub(crate) fn finalize_end_time(&mut self) {
        if self.end_time == self.start_time {
            self.end_time = SystemTime::now();
        }
    }
}

/// Backend-specific operations on a live span.
///
/// Implementations must make `end` idempotent; the guard calls it at most
/// once, but backends are free to call it themselves.
pub(crate) trait ActiveSpan: Send {
    fn set_attribute(&mut self, attribute: KeyValue);
    fn set_status(&mut self, status: SpanStatus);
    fn end(&mut self);
}

/// Scoped acquisition of a span, yielded to the traced scope.
///
/// Dropping the guard finalizes the span on every exit path, including
/// unwinding. An inert guard (tracing disabled, backend degraded, or a
/// subsegment with no open root) accepts all calls and records nothing.
pub struct ScopedSpan {
    inner: Option<Box<dyn ActiveSpan>>,
}

impl ScopedSpan {
    pub(crate) fn new(span: Box<dyn ActiveSpan>) -> Self {
        ScopedSpan { inner: Some(span) }
    }

    /// A guard that records nothing and never fails.
    pub(crate) fn inert() -> Self {
        ScopedSpan { inner: None }
    }

    /// Returns `true` if this guard is backed by a recording span.
    pub fn is_recording(&self) -> bool {
        self.inner.is_some()
    }

    /// Attach an attribute to the span.
    pub fn set_attribute(&mut self, attribute: KeyValue) {
        if let Some(span) = self.inner.as_mut() {
            span.set_attribute(attribute);
        }
    }

    /// Set the span's terminal status.
    pub fn set_status(&mut self, status: SpanStatus) {
        if let Some(span) = self.inner.as_mut() {
            span.set_status(status);
        }
    }

    /// Record an error as the span's status.
    pub fn record_error(&mut self, error: &dyn fmt::Display) {
        self.set_status(SpanStatus::error(error.to_string()));
    }

    /// Finalize the span now instead of at the end of the scope.
    pub fn end(mut self) {
        if let Some(mut span) = self.inner.take() {
            span.end();
        }
    }
}

impl fmt::Debug for ScopedSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopedSpan")
            .field("recording", &self.is_recording())
            .finish()
    }
}

impl Drop for ScopedSpan {
    /// Finalize on scope exit
    fn drop(&mut self) {
        if let Some(mut span) = self.inner.take() {
            span.end();
        }
    }
}
