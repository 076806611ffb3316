//! The X-Ray segment-recorder backend.
//!
//! Operations are recorded as a nesting of segments: the configured root
//! operation opens a root segment, and every other operation traced while a
//! root is open becomes an embedded subsegment. A fine-grained operation
//! traced with no root open records nothing; that telemetry is meaningless
//! without the enclosing top-level operation.

pub(crate) mod daemon;
pub(crate) mod segment;

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, warn};

use crate::config::TracingConfig;
use crate::trace::backend::TraceBackend;
use crate::trace::span::{ActiveSpan, KeyValue, ScopedSpan, SpanStatus};
use crate::trace::transform::ResourceSpans;
use crate::trace::xray::daemon::{DaemonEmitter, SegmentEmitter};
use crate::trace::xray::segment::{SegmentDocument, ANNOTATION_VALUE_MAX_LEN};
use crate::SERVICE_NAME;

type SharedSegment = Arc<Mutex<Option<SegmentDocument>>>;

/// Backend that records operations as X-Ray segments.
///
/// Never participates in the OTLP export format; `get_resource_spans`
/// always returns the empty structure. If the daemon socket cannot be set
/// up the backend degrades to inert behavior.
#[derive(Debug)]
pub struct XrayBackend {
    recorder: Option<Recorder>,
}

#[derive(Debug)]
struct Recorder {
    emitter: Arc<dyn SegmentEmitter>,
    root_operation: String,
    current: SharedSegment,
}

impl XrayBackend {
    /// Build the backend for the configured daemon address.
    pub fn new(config: &TracingConfig) -> Self {
        match DaemonEmitter::connect(&config.xray_daemon_address) {
            Ok(emitter) => Self::with_emitter(Arc::new(emitter), &config.root_operation),
            Err(err) => {
                warn!(
                    address = %config.xray_daemon_address,
                    error = %err,
                    "X-Ray daemon unavailable, recording disabled"
                );
                XrayBackend { recorder: None }
            }
        }
    }

    fn with_emitter(emitter: Arc<dyn SegmentEmitter>, root_operation: &str) -> Self {
        XrayBackend {
            recorder: Some(Recorder {
                emitter,
                root_operation: root_operation.to_string(),
                current: Arc::new(Mutex::new(None)),
            }),
        }
    }
}

fn lock_segment(state: &Mutex<Option<SegmentDocument>>) -> MutexGuard<'_, Option<SegmentDocument>> {
    match state.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl TraceBackend for XrayBackend {
    fn create_span(&self, name: &str, attributes: Vec<KeyValue>) -> ScopedSpan {
        let Some(recorder) = self.recorder.as_ref() else {
            return ScopedSpan::inert();
        };

        if name == recorder.root_operation {
            let mut segment = SegmentDocument::root(name);
            segment.put_annotation("service", SERVICE_NAME);
            for attribute in &attributes {
                segment.put_attribute(&attribute.key, &attribute.value);
            }
            let segment_id = segment.id.clone();

            let mut current = lock_segment(&recorder.current);
            if let Some(mut stale) = current.take() {
                debug!(segment = %stale.name, "closing stale root segment");
                stale.close();
                if let Err(err) = recorder.emitter.emit(&stale) {
                    debug!(error = %err, "segment emit failed");
                }
            }
            *current = Some(segment);
            drop(current);

            ScopedSpan::new(Box::new(XraySpan {
                role: XraySpanRole::Root { segment_id },
                state: recorder.current.clone(),
                emitter: recorder.emitter.clone(),
            }))
        } else {
            let root_open = lock_segment(&recorder.current).is_some();
            if !root_open {
                debug!(operation = name, "no open root segment, span not recorded");
                return ScopedSpan::inert();
            }
            let mut subsegment = SegmentDocument::subsegment(name);
            for attribute in &attributes {
                subsegment.put_attribute(&attribute.key, &attribute.value);
            }
            ScopedSpan::new(Box::new(XraySpan {
                role: XraySpanRole::Subsegment {
                    segment: Some(subsegment),
                },
                state: recorder.current.clone(),
                emitter: recorder.emitter.clone(),
            }))
        }
    }

    fn get_resource_spans(&self) -> ResourceSpans {
        ResourceSpans::empty()
    }

    /// Attach command-result data to the open root segment.
    ///
    /// The full result lands in metadata; `exit_code` and a size-capped
    /// `command` are additionally indexed as annotations. No-op when no root
    /// segment is open.
    fn add_result_metadata(&self, result: &serde_json::Value) {
        let Some(recorder) = self.recorder.as_ref() else {
            return;
        };
        let mut current = lock_segment(&recorder.current);
        let Some(segment) = current.as_mut() else {
            return;
        };
        segment.put_metadata("output", result.clone());
        if let Some(exit_code) = result.get("exit_code") {
            segment.put_annotation("exit_code", &value_to_string(exit_code));
        }
        if let Some(command) = result.get("command") {
            let command = value_to_string(command);
            let capped: String = command.chars().take(ANNOTATION_VALUE_MAX_LEN).collect();
            segment.put_annotation("command", &capped);
            segment.put_metadata("full_command", serde_json::Value::String(command));
        }
    }
}

fn value_to_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

enum XraySpanRole {
    /// Owns the shared root slot; the id guards against a replacement root.
    Root { segment_id: String },
    /// Carries its document until finalization embeds it in the root.
    Subsegment { segment: Option<SegmentDocument> },
}

struct XraySpan {
    role: XraySpanRole,
    state: SharedSegment,
    emitter: Arc<dyn SegmentEmitter>,
}

impl XraySpan {
    fn with_segment(&mut self, f: impl FnOnce(&mut SegmentDocument)) {
        match &mut self.role {
            XraySpanRole::Root { segment_id } => {
                let mut current = lock_segment(&self.state);
                if let Some(segment) = current.as_mut() {
                    if segment.id == *segment_id {
                        f(segment);
                    }
                }
            }
            XraySpanRole::Subsegment { segment } => {
                if let Some(segment) = segment.as_mut() {
                    f(segment);
                }
            }
        }
    }
}

impl ActiveSpan for XraySpan {
    fn set_attribute(&mut self, attribute: KeyValue) {
        self.with_segment(|segment| segment.put_attribute(&attribute.key, &attribute.value));
    }

    fn set_status(&mut self, status: SpanStatus) {
        if let SpanStatus::Error { message } = status {
            self.with_segment(|segment| segment.add_exception(&message));
        }
    }

    fn end(&mut self) {
        match &mut self.role {
            XraySpanRole::Root { segment_id } => {
                let taken = {
                    let mut current = lock_segment(&self.state);
                    if current
                        .as_ref()
                        .map(|segment| segment.id == *segment_id)
                        .unwrap_or(false)
                    {
                        current.take()
                    } else {
                        // Replaced by a newer root; the stale copy was
                        // already emitted.
                        None
                    }
                };
                if let Some(mut segment) = taken {
                    segment.close();
                    if let Err(err) = self.emitter.emit(&segment) {
                        debug!(error = %err, "segment emit failed");
                    }
                }
            }
            XraySpanRole::Subsegment { segment } => {
                let Some(mut subsegment) = segment.take() else {
                    return; // Already ended
                };
                subsegment.close();
                let mut current = lock_segment(&self.state);
                match current.as_mut() {
                    Some(root) => root.subsegments.push(subsegment),
                    None => debug!(
                        subsegment = %subsegment.name,
                        "root segment closed before subsegment, dropping"
                    ),
                }
            }
        }
    }
}
