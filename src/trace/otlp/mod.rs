//! The OTLP-exporting backend.
//!
//! Finished spans land in an in-memory buffer drained by
//! `get_resource_spans`, and are forwarded to a background worker that
//! writes them to the console and posts them to the configured collector.

pub(crate) mod exporter;
pub(crate) mod processor;

use std::sync::{Arc, Mutex};

use tracing::warn;

use crate::config::TracingConfig;
use crate::trace::backend::TraceBackend;
use crate::trace::otlp::exporter::{ConsoleSpanExporter, OtlpHttpExporter, SpanExporter};
use crate::trace::otlp::processor::BatchSpanProcessor;
use crate::trace::span::{ActiveSpan, KeyValue, ScopedSpan, SpanData, SpanStatus};
use crate::trace::transform::ResourceSpans;

type SpanBuffer = Arc<Mutex<Vec<SpanData>>>;

/// Backend that buffers spans in memory and exports them via OTLP.
///
/// Construction never fails: a bad collector endpoint drops the network
/// exporter (console export continues), and a worker spawn failure drops
/// background export entirely while the buffer keeps working.
#[derive(Debug)]
pub struct OtlpBackend {
    buffer: SpanBuffer,
    processor: Option<Arc<BatchSpanProcessor>>,
}

impl OtlpBackend {
    /// Build the backend for the configured collector endpoint.
    pub fn new(config: &TracingConfig) -> Self {
        let mut exporters: Vec<Box<dyn SpanExporter>> =
            vec![Box::new(ConsoleSpanExporter::default())];
        match OtlpHttpExporter::new(&config.otlp_endpoint) {
            Ok(exporter) => exporters.push(Box::new(exporter)),
            Err(err) => warn!(
                endpoint = %config.otlp_endpoint,
                error = %err,
                "OTLP exporter unavailable, continuing with console export only"
            ),
        }
        Self::with_exporters(exporters)
    }

    fn with_exporters(exporters: Vec<Box<dyn SpanExporter>>) -> Self {
        let processor = match BatchSpanProcessor::new(exporters) {
            Ok(processor) => Some(Arc::new(processor)),
            Err(err) => {
                warn!(error = %err, "trace worker unavailable, spans will only be buffered");
                None
            }
        };
        OtlpBackend {
            buffer: Arc::new(Mutex::new(Vec::new())),
            processor,
        }
    }

    #[cfg(test)]
    pub(crate) fn buffered() -> Self {
        OtlpBackend {
            buffer: Arc::new(Mutex::new(Vec::new())),
            processor: None,
        }
    }
}

impl TraceBackend for OtlpBackend {
    fn create_span(&self, name: &str, attributes: Vec<KeyValue>) -> ScopedSpan {
        ScopedSpan::new(Box::new(OtlpSpan {
            data: Some(SpanData::begin(name, attributes)),
            buffer: self.buffer.clone(),
            processor: self.processor.clone(),
        }))
    }

    fn get_resource_spans(&self) -> ResourceSpans {
        let drained = match self.buffer.lock() {
            Ok(mut guard) => std::mem::take(&mut *guard),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        };
        ResourceSpans::from_spans(drained)
    }
}

/// A live span owned by the OTLP backend.
struct OtlpSpan {
    /// Taken on finalization; `None` means already ended.
    data: Option<SpanData>,
    buffer: SpanBuffer,
    processor: Option<Arc<BatchSpanProcessor>>,
}

impl ActiveSpan for OtlpSpan {
    fn set_attribute(&mut self, attribute: KeyValue) {
        if let Some(data) = self.data.as_mut() {
            data.attributes.push(attribute);
        }
    }

    fn set_status(&mut self, status: SpanStatus) {
        if let Some(data) = self.data.as_mut() {
            data.status = status;
        }
    }

    fn end(&mut self) {
        let mut data = match self.data.take() {
            Some(data) => data,
            None => return, // Already ended
        };
        data.finalize_end_time();
        if let Some(processor) = self.processor.as_ref() {
            processor.on_end(data.clone());
        }
        match self.buffer.lock() {
            Ok(mut guard) => guard.push(data),
            Err(poisoned) => poisoned.into_inner().push(data),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::otlp::exporter::InMemorySpanExporter;
    use crate::trace::transform::StatusCode;

    #[test]
    fn finished_spans_are_buffered_once() {
        let backend = OtlpBackend::buffered();
        {
            let mut span = backend.create_span("op", vec![KeyValue::new("k", "v")]);
            assert!(span.is_recording());
            span.set_attribute(KeyValue::new("late", 1));
        }
        let batch = backend.get_resource_spans();
        assert_eq!(batch.span_count(), 1);
        let span = &batch.scope_spans[0].spans[0];
        assert_eq!(span.name, "op");
        assert_eq!(span.attributes.len(), 2);
        assert_eq!(span.status.code, StatusCode::Ok);
    }

    #[test]
    fn export_drains_the_buffer() {
        let backend = OtlpBackend::buffered();
        drop(backend.create_span("op", vec![]));
        assert_eq!(backend.get_resource_spans().span_count(), 1);
        assert_eq!(backend.get_resource_spans().span_count(), 0);
    }

    #[test]
    fn end_time_is_at_least_start_time() {
        let backend = OtlpBackend::buffered();
        drop(backend.create_span("op", vec![]));
        let batch = serde_json::to_value(backend.get_resource_spans()).unwrap();
        let span = &batch["scopeSpans"][0]["spans"][0];
        let start: u128 = span["startTimeUnixNano"].as_str().unwrap().parse().unwrap();
        let end: u128 = span["endTimeUnixNano"].as_str().unwrap().parse().unwrap();
        assert!(start <= end);
    }

    #[test]
    fn errored_scope_still_buffers_the_span() {
        let backend = OtlpBackend::buffered();
        {
            let mut span = backend.create_span("op", vec![]);
            span.set_status(SpanStatus::error("boom"));
        }
        let batch = backend.get_resource_spans();
        assert_eq!(batch.scope_spans[0].spans[0].status.code, StatusCode::Error);
    }

    #[test]
    fn worker_receives_finished_spans() {
        let exporter = InMemorySpanExporter::default();
        let backend = OtlpBackend::with_exporters(vec![Box::new(exporter.clone())]);
        drop(backend.create_span("op", vec![]));
        backend
            .processor
            .as_ref()
            .expect("worker should be running")
            .shutdown();
        assert_eq!(exporter.exported_spans().len(), 1);
    }

    #[test]
    fn construction_survives_bad_endpoint() {
        let config = TracingConfig {
            otlp_endpoint: "not a url".to_string(),
            ..TracingConfig::default()
        };
        let backend = OtlpBackend::new(&config);
        drop(backend.create_span("op", vec![]));
        assert_eq!(backend.get_resource_spans().span_count(), 1);
    }
}
