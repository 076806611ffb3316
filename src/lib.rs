//! Operation-span tracing for the AWS API MCP server.
//!
//! Traced operations are recorded as spans through one of several
//! interchangeable backends, selected once at process startup:
//!
//! * `disabled` — a no-op backend with zero overhead beyond an inert guard.
//! * `otlp` — spans are buffered in memory, printed to the console, and sent
//!   on a best-effort basis to an OTLP collector.
//! * `xray` — operations are recorded as X-Ray segments and subsegments and
//!   shipped to the local X-Ray daemon.
//!
//! Tracing is strictly best-effort: a missing daemon, an unreachable
//! collector, or a failure inside the tracing layer itself degrades to inert
//! behavior and never surfaces to the traced operation.
//!
//! # Examples
//!
//! ```no_run
//! use aws_mcp_tracing::{KeyValue, TraceManager, TracingConfig};
//!
//! let manager = TraceManager::from_config(&TracingConfig::from_env());
//!
//! {
//!     let mut span = manager.trace("describe_instances", vec![KeyValue::new("aws.region", "us-east-1")]);
//!     span.set_attribute(KeyValue::new("aws.account", "123456789012"));
//!     // span is finalized and buffered when it goes out of scope
//! }
//!
//! let batch = manager.get_resource_spans();
//! println!("{}", serde_json::to_string_pretty(&batch).unwrap());
//! ```
#![warn(missing_debug_implementations, missing_docs)]

pub mod config;
pub mod error;
pub mod instrument;
pub mod manager;
pub mod trace;

pub use config::{BackendKind, TracingConfig};
pub use error::{TraceError, TraceResult};
pub use manager::TraceManager;
pub use trace::{
    KeyValue, NoopBackend, OtlpBackend, ResourceSpans, ScopedSpan, SpanStatus, TraceBackend,
    XrayBackend,
};

/// Service name reported in exported resource and scope blocks.
pub const SERVICE_NAME: &str = env!("CARGO_PKG_NAME");
/// Service version reported in exported resource and scope blocks.
pub const SERVICE_VERSION: &str = env!("CARGO_PKG_VERSION");
