//! Batch processing on a dedicated worker thread.
//!
//! Finished spans are handed to the worker over a bounded channel and
//! flushed to every attached exporter when the batch fills or the schedule
//! delay elapses. Span finalization itself never blocks on I/O; when the
//! queue is full the span is dropped from export (it remains in the buffer
//! for `get_resource_spans`).

use std::sync::mpsc::{sync_channel, RecvTimeoutError, SyncSender, TrySendError};
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::error::{TraceError, TraceResult};
use crate::trace::otlp::exporter::SpanExporter;
use crate::trace::span::SpanData;

/// Maximum number of spans queued for the worker.
const MAX_QUEUE_SIZE: usize = 2_048;
/// Maximum number of spans per export call.
const MAX_EXPORT_BATCH_SIZE: usize = 512;
/// Delay between two consecutive scheduled exports.
const SCHEDULED_DELAY: Duration = Duration::from_millis(5_000);

/// Messages exchanged between callers and the worker thread.
#[derive(Debug)]
enum BatchMessage {
    ExportSpan(Box<SpanData>),
    Shutdown,
}

/// A batch span processor with a dedicated background thread.
#[derive(Debug)]
pub(crate) struct BatchSpanProcessor {
    message_sender: SyncSender<BatchMessage>,
    handle: Mutex<Option<thread::JoinHandle<()>>>,
}

impl BatchSpanProcessor {
    /// Spawn the worker thread owning the given exporters.
    pub(crate) fn new(mut exporters: Vec<Box<dyn SpanExporter>>) -> TraceResult<Self> {
        let (message_sender, message_receiver) = sync_channel(MAX_QUEUE_SIZE);

        let handle = thread::Builder::new()
            .name("TraceBatchWorker".to_string())
            .spawn(move || {
                let mut spans: Vec<SpanData> = Vec::new();
                let mut last_export_time = Instant::now();

                let flush = |spans: &mut Vec<SpanData>,
                             exporters: &mut Vec<Box<dyn SpanExporter>>| {
                    if spans.is_empty() {
                        return;
                    }
                    let batch = std::mem::take(spans);
                    for exporter in exporters.iter_mut() {
                        if let Err(err) = exporter.export(batch.clone()) {
                            debug!(error = %err, "span export failed");
                        }
                    }
                };

                loop {
                    let timeout = SCHEDULED_DELAY.saturating_sub(last_export_time.elapsed());
                    match message_receiver.recv_timeout(timeout) {
                        Ok(BatchMessage::ExportSpan(span)) => {
                            spans.push(*span);
                            if spans.len() >= MAX_EXPORT_BATCH_SIZE
                                || last_export_time.elapsed() >= SCHEDULED_DELAY
                            {
                                flush(&mut spans, &mut exporters);
                                last_export_time = Instant::now();
                            }
                        }
                        Ok(BatchMessage::Shutdown) => {
                            flush(&mut spans, &mut exporters);
                            break;
                        }
                        Err(RecvTimeoutError::Timeout) => {
                            flush(&mut spans, &mut exporters);
                            last_export_time = Instant::now();
                        }
                        Err(RecvTimeoutError::Disconnected) => {
                            flush(&mut spans, &mut exporters);
                            break;
                        }
                    }
                }
            })
            .map_err(|err| TraceError::Internal(format!("failed to spawn trace worker: {err}")))?;

        Ok(BatchSpanProcessor {
            message_sender,
            handle: Mutex::new(Some(handle)),
        })
    }

    /// Queue a finished span for export.
    pub(crate) fn on_end(&self, span: SpanData) {
        match self
            .message_sender
            .try_send(BatchMessage::ExportSpan(Box::new(span)))
        {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                debug!("trace worker queue full, dropping span from export");
            }
            Err(TrySendError::Disconnected(_)) => {
                debug!("trace worker gone, dropping span from export");
            }
        }
    }

    /// Flush pending spans and stop the worker.
    pub(crate) fn shutdown(&self) {
        let _ = self.message_sender.send(BatchMessage::Shutdown);
        if let Ok(mut guard) = self.handle.lock() {
            if let Some(handle) = guard.take() {
                if handle.join().is_err() {
                    warn!("trace worker panicked during shutdown");
                }
            }
        }
    }
}

impl Drop for BatchSpanProcessor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::otlp::exporter::InMemorySpanExporter;

    #[test]
    fn shutdown_flushes_pending_spans() {
        let exporter = InMemorySpanExporter::default();
        let processor = BatchSpanProcessor::new(vec![Box::new(exporter.clone())]).unwrap();

        processor.on_end(SpanData::begin("first", vec![]));
        processor.on_end(SpanData::begin("second", vec![]));
        processor.shutdown();

        let names: Vec<String> = exporter
            .exported_spans()
            .into_iter()
            .map(|span| span.name)
            .collect();
        assert_eq!(names, ["first", "second"]);
    }

    #[test]
    fn every_exporter_sees_the_batch() {
        let first = InMemorySpanExporter::default();
        let second = InMemorySpanExporter::default();
        let processor =
            BatchSpanProcessor::new(vec![Box::new(first.clone()), Box::new(second.clone())])
                .unwrap();

        processor.on_end(SpanData::begin("op", vec![]));
        processor.shutdown();

        assert_eq!(first.exported_spans().len(), 1);
        assert_eq!(second.exported_spans().len(), 1);
    }

    #[test]
    fn on_end_after_shutdown_is_ignored() {
        let exporter = InMemorySpanExporter::default();
        let processor = BatchSpanProcessor::new(vec![Box::new(exporter.clone())]).unwrap();
        processor.shutdown();
        processor.on_end(SpanData::begin("late", vec![]));
        assert_eq!(exporter.exported_spans().len(), 0);
    }
}
