//! Span exporters driven by the batch worker.
//!
//! The console exporter is always attached; the OTLP/HTTP exporter is
//! attached best-effort at backend construction. Both run on the worker
//! thread only, so exports never block span finalization.

use std::fmt;
#[cfg(test)]
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use url::Url;

use crate::error::{TraceError, TraceResult};
use crate::trace::span::{SpanData, SpanStatus};
use crate::trace::transform::{ExportRequest, ResourceSpans};

const EXPORT_TIMEOUT: Duration = Duration::from_secs(10);

/// Destination for batches of finished spans.
pub(crate) trait SpanExporter: Send + fmt::Debug {
    fn export(&mut self, batch: Vec<SpanData>) -> TraceResult<()>;
}

/// Writes each finished span to stdout.
#[derive(Debug, Default)]
pub(crate) struct ConsoleSpanExporter {
    _private: (),
}

impl SpanExporter for ConsoleSpanExporter {
    fn export(&mut self, batch: Vec<SpanData>) -> TraceResult<()> {
        for (i, span) in batch.iter().enumerate() {
            println!("Span #{i}");
            println!("\t Name: {:?}", span.name);
            println!("\t TraceId: {}", span.trace_id);
            println!("\t SpanId: {}", span.span_id);
            let datetime: DateTime<Utc> = span.start_time.into();
            println!(
                "\t Start time: {}",
                datetime.format("%Y-%m-%d %H:%M:%S%.6f")
            );
            let datetime: DateTime<Utc> = span.end_time.into();
            println!("\t End time: {}", datetime.format("%Y-%m-%d %H:%M:%S%.6f"));
            match &span.status {
                SpanStatus::Ok => println!("\t Status: Ok"),
                SpanStatus::Error { message } => println!("\t Status: Error({message:?})"),
            }
            let mut print_header = true;
            for kv in &span.attributes {
                if print_header {
                    println!("\t Attributes:");
                    print_header = false;
                }
                println!("\t\t {}: {:?}", kv.key, kv.value);
            }
        }
        Ok(())
    }
}

/// Posts batches as OTLP/HTTP JSON to the configured collector.
pub(crate) struct OtlpHttpExporter {
    collector_url: Url,
    client: reqwest::blocking::Client,
}

impl fmt::Debug for OtlpHttpExporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OtlpHttpExporter")
            .field("collector_url", &self.collector_url.as_str())
            .finish()
    }
}

impl OtlpHttpExporter {
    /// Build an exporter for the given endpoint.
    ///
    /// Fails only on a malformed endpoint or client construction; the
    /// collector is not contacted here, so an unreachable endpoint still
    /// builds.
    pub(crate) fn new(endpoint: &str) -> TraceResult<Self> {
        let base = Url::parse(endpoint).map_err(|err| TraceError::InvalidEndpoint {
            endpoint: endpoint.to_string(),
            reason: err.to_string(),
        })?;
        let collector_url = base
            .join("v1/traces")
            .map_err(|err| TraceError::InvalidEndpoint {
                endpoint: endpoint.to_string(),
                reason: err.to_string(),
            })?;
        let client = reqwest::blocking::Client::builder()
            .timeout(EXPORT_TIMEOUT)
            .build()
            .map_err(|err| TraceError::Internal(err.to_string()))?;
        Ok(OtlpHttpExporter {
            collector_url,
            client,
        })
    }

    #[cfg(test)]
    pub(crate) fn collector_url(&self) -> &str {
        self.collector_url.as_str()
    }
}

impl SpanExporter for OtlpHttpExporter {
    fn export(&mut self, batch: Vec<SpanData>) -> TraceResult<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let request = ExportRequest::new(vec![ResourceSpans::from_spans(batch)]);
        self.client
            .post(self.collector_url.clone())
            .json(&request)
            .send()
            .and_then(|response| response.error_for_status())
            .map_err(|err| TraceError::ExportFailed(err.to_string()))?;
        Ok(())
    }
}

/// Stores exported batches in memory; the exporter used by tests.
#[cfg(test)]
#[derive(Clone, Debug, Default)]
pub(crate) struct InMemorySpanExporter {
    spans: Arc<Mutex<Vec<SpanData>>>,
}

#[cfg(test)]
impl InMemorySpanExporter {
    pub(crate) fn exported_spans(&self) -> Vec<SpanData> {
        self.spans
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
impl SpanExporter for InMemorySpanExporter {
    fn export(&mut self, mut batch: Vec<SpanData>) -> TraceResult<()> {
        self.spans.lock()?.append(&mut batch);
        Ok(())
    }
}
