//! Serde model of the resource-spans export shape.
//!
//! This is the structure returned by `get_resource_spans` and posted by the
//! OTLP/HTTP exporter. Field names and value encodings follow the OTLP JSON
//! mapping: camelCase keys, hex-encoded ids, decimal-string nanosecond
//! timestamps, and `{key, value: {stringValue}}` attribute pairs.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Serialize, Serializer};

use crate::trace::span::{KeyValue, SpanData, SpanStatus};
use crate::{SERVICE_NAME, SERVICE_VERSION};

/// Serialize a timestamp as decimal-string nanoseconds since the Unix epoch.
fn as_unix_nano<S>(time: &SystemTime, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let nanos = time
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    serializer.collect_str(&nanos)
}

/// One batch of exported spans, grouped under the service resource and a
/// single instrumentation scope.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceSpans {
    /// Service identity attributes.
    pub resource: Resource,
    /// Spans grouped per instrumentation scope.
    pub scope_spans: Vec<ScopeSpans>,
}

impl ResourceSpans {
    /// The empty structure returned by backends that have nothing to export.
    pub(crate) fn empty() -> Self {
        ResourceSpans {
            resource: Resource { attributes: vec![] },
            scope_spans: vec![],
        }
    }

    /// Group a drained buffer under the service resource and scope.
    pub(crate) fn from_spans(spans: Vec<SpanData>) -> Self {
        ResourceSpans {
            resource: Resource {
                attributes: vec![
                    Attribute::new("service.name", SERVICE_NAME),
                    Attribute::new("service.version", SERVICE_VERSION),
                ],
            },
            scope_spans: vec![ScopeSpans {
                scope: Scope {
                    name: SERVICE_NAME,
                    version: SERVICE_VERSION,
                },
                spans: spans.into_iter().map(Span::from).collect(),
            }],
        }
    }

    /// Number of spans in the batch.
    pub fn span_count(&self) -> usize {
        self.scope_spans.iter().map(|ss| ss.spans.len()).sum()
    }
}

/// The wire envelope posted to an OTLP/HTTP collector.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ExportRequest {
    resource_spans: Vec<ResourceSpans>,
}

impl ExportRequest {
    pub(crate) fn new(resource_spans: Vec<ResourceSpans>) -> Self {
        ExportRequest { resource_spans }
    }
}

/// Service identity block.
#[derive(Debug, Serialize)]
pub struct Resource {
    /// Resource attributes; empty for backends with no export data.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<Attribute>,
}

/// Spans produced by one instrumentation scope.
#[derive(Debug, Serialize)]
pub struct ScopeSpans {
    /// The producing scope.
    pub scope: Scope,
    /// The serialized spans.
    pub spans: Vec<Span>,
}

/// Instrumentation scope identity.
#[derive(Debug, Serialize)]
pub struct Scope {
    /// Scope name; the service name.
    pub name: &'static str,
    /// Scope version; the service version.
    pub version: &'static str,
}

/// One exported span.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Span {
    /// 32-character lowercase hex trace id.
    pub trace_id: String,
    /// 16-character lowercase hex span id.
    pub span_id: String,
    /// Operation name.
    pub name: String,
    /// Fixed kind marker; all operation spans are internal.
    pub kind: SpanKind,
    /// Start time, decimal-string nanoseconds.
    #[serde(serialize_with = "as_unix_nano")]
    pub start_time_unix_nano: SystemTime,
    /// End time, decimal-string nanoseconds.
    #[serde(serialize_with = "as_unix_nano")]
    pub end_time_unix_nano: SystemTime,
    /// String attributes.
    pub attributes: Vec<Attribute>,
    /// Terminal status.
    pub status: Status,
}

impl From<SpanData> for Span {
    fn from(value: SpanData) -> Self {
        Span {
            trace_id: value.trace_id.to_string(),
            span_id: value.span_id.to_string(),
            name: value.name,
            kind: SpanKind::Internal,
            start_time_unix_nano: value.start_time,
            end_time_unix_nano: value.end_time,
            attributes: value.attributes.into_iter().map(Attribute::from).collect(),
            status: value.status.into(),
        }
    }
}

/// Span kind marker.
#[derive(Clone, Copy, Debug, Serialize)]
pub enum SpanKind {
    /// An operation internal to the service.
    #[serde(rename = "SPAN_KIND_INTERNAL")]
    Internal,
}

/// An exported attribute pair.
#[derive(Debug, Serialize)]
pub struct Attribute {
    /// Attribute key.
    pub key: String,
    /// Attribute value wrapper.
    pub value: AttributeValue,
}

impl Attribute {
    fn new(key: &str, value: &str) -> Self {
        Attribute {
            key: key.to_string(),
            value: AttributeValue {
                string_value: value.to_string(),
            },
        }
    }
}

impl From<KeyValue> for Attribute {
    fn from(value: KeyValue) -> Self {
        Attribute {
            key: value.key,
            value: AttributeValue {
                string_value: value.value,
            },
        }
    }
}

/// The string value wrapper used for every attribute.
#[derive(Debug, Serialize)]
pub struct AttributeValue {
    /// The stringified value.
    #[serde(rename = "stringValue")]
    pub string_value: String,
}

/// Exported status block.
#[derive(Debug, Serialize)]
pub struct Status {
    /// Failure message, present only for errored spans.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Status code string.
    pub code: StatusCode,
}

/// Exported status code.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum StatusCode {
    /// The operation completed normally.
    #[serde(rename = "STATUS_CODE_OK")]
    Ok,
    /// The operation failed.
    #[serde(rename = "STATUS_CODE_ERROR")]
    Error,
}

impl From<SpanStatus> for Status {
    fn from(value: SpanStatus) -> Self {
        match value {
            SpanStatus::Ok => Status {
                message: None,
                code: StatusCode::Ok,
            },
            SpanStatus::Error { message } => Status {
                message: Some(message),
                code: StatusCode::Error,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::span::{SpanId, TraceId};
    use serde_json::json;
    use std::time::Duration;

    fn sample_span() -> SpanData {
        let start = UNIX_EPOCH + Duration::from_nanos(1_700_000_000_000_000_000);
        SpanData {
            trace_id: TraceId::from(0xabcd),
            span_id: SpanId::from(0x1234),
            name: "op".to_string(),
            start_time: start,
            end_time: start + Duration::from_nanos(42),
            attributes: vec![KeyValue::new("k", "v")],
            status: SpanStatus::Ok,
        }
    }

    #[test]
    fn empty_batch_serializes_to_empty_structure() {
        let value = serde_json::to_value(ResourceSpans::empty()).unwrap();
        assert_eq!(value, json!({"resource": {}, "scopeSpans": []}));
    }

    #[test]
    fn span_serializes_to_export_shape() {
        let value = serde_json::to_value(Span::from(sample_span())).unwrap();
        assert_eq!(
            value,
            json!({
                "traceId": "0000000000000000000000000000abcd",
                "spanId": "0000000000001234",
                "name": "op",
                "kind": "SPAN_KIND_INTERNAL",
                "startTimeUnixNano": "1700000000000000000",
                "endTimeUnixNano": "1700000000000000042",
                "attributes": [{"key": "k", "value": {"stringValue": "v"}}],
                "status": {"code": "STATUS_CODE_OK"},
            })
        );
    }

    #[test]
    fn errored_span_carries_message_and_error_code() {
        let mut data = sample_span();
        data.status = SpanStatus::error("connection reset");
        let value = serde_json::to_value(Span::from(data)).unwrap();
        assert_eq!(
            value["status"],
            json!({"message": "connection reset", "code": "STATUS_CODE_ERROR"})
        );
    }

    #[test]
    fn batch_nests_spans_under_service_resource_and_scope() {
        let value = serde_json::to_value(ResourceSpans::from_spans(vec![sample_span()])).unwrap();
        assert_eq!(
            value["resource"]["attributes"][0],
            json!({"key": "service.name", "value": {"stringValue": crate::SERVICE_NAME}})
        );
        assert_eq!(
            value["resource"]["attributes"][1],
            json!({"key": "service.version", "value": {"stringValue": crate::SERVICE_VERSION}})
        );
        assert_eq!(value["scopeSpans"][0]["scope"]["name"], crate::SERVICE_NAME);
        assert_eq!(value["scopeSpans"][0]["spans"].as_array().unwrap().len(), 1);
    }
}
