//! X-Ray segment documents.
//!
//! Segments carry two attribute stores with different ingestion semantics:
//! annotations are indexed for search but size-limited, metadata is
//! unindexed and unlimited. Attribute routing picks the store from the
//! stringified value length, so oversized values never hit the annotation
//! index.

use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

use crate::trace::span::{random_hex_96, SpanId};

/// Longest value the trace-ingestion system indexes as an annotation.
pub(crate) const ANNOTATION_VALUE_MAX_LEN: usize = 50;

/// One segment or embedded subsegment, serialized as the daemon document.
#[derive(Clone, Debug, Serialize)]
pub(crate) struct SegmentDocument {
    pub(crate) name: String,
    pub(crate) id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) trace_id: Option<String>,
    pub(crate) start_time: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) end_time: Option<f64>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub(crate) annotations: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub(crate) metadata: BTreeMap<String, serde_json::Value>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub(crate) fault: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) cause: Option<Cause>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub(crate) subsegments: Vec<SegmentDocument>,
}

/// Exceptions recorded against a segment.
#[derive(Clone, Debug, Default, Serialize)]
pub(crate) struct Cause {
    pub(crate) exceptions: Vec<ExceptionEntry>,
}

#[derive(Clone, Debug, Serialize)]
pub(crate) struct ExceptionEntry {
    pub(crate) id: String,
    pub(crate) message: String,
    #[serde(rename = "type")]
    pub(crate) kind: String,
}

impl SegmentDocument {
    /// Open a root segment with a fresh X-Ray trace id.
    pub(crate) fn root(name: &str) -> Self {
        SegmentDocument {
            name: name.to_string(),
            id: SpanId::random().to_string(),
            trace_id: Some(new_trace_id(SystemTime::now())),
            start_time: epoch_seconds(SystemTime::now()),
            end_time: None,
            annotations: BTreeMap::new(),
            metadata: BTreeMap::new(),
            fault: false,
            cause: None,
            subsegments: Vec::new(),
        }
    }

    /// Open a subsegment; it inherits the trace id from the enclosing root
    /// document when embedded.
    pub(crate) fn subsegment(name: &str) -> Self {
        SegmentDocument {
            name: name.to_string(),
            id: SpanId::random().to_string(),
            trace_id: None,
            start_time: epoch_seconds(SystemTime::now()),
            end_time: None,
            annotations: BTreeMap::new(),
            metadata: BTreeMap::new(),
            fault: false,
            cause: None,
            subsegments: Vec::new(),
        }
    }

    /// Route an attribute to annotations or metadata by value size.
    ///
    /// Keys are normalized for the ingestion system: `.` and `-` become `_`.
    pub(crate) fn put_attribute(&mut self, key: &str, value: &str) {
        let clean_key = key.replace(['.', '-'], "_");
        if value.chars().count() <= ANNOTATION_VALUE_MAX_LEN {
            self.annotations.insert(clean_key, value.to_string());
        } else {
            self.metadata
                .insert(clean_key, serde_json::Value::String(value.to_string()));
        }
    }

    /// Record a searchable annotation, bypassing routing.
    pub(crate) fn put_annotation(&mut self, key: &str, value: &str) {
        self.annotations.insert(key.to_string(), value.to_string());
    }

    /// Record unindexed metadata, bypassing routing.
    pub(crate) fn put_metadata(&mut self, key: &str, value: serde_json::Value) {
        self.metadata.insert(key.to_string(), value);
    }

    /// Attach an exception and flag the segment as faulted.
    pub(crate) fn add_exception(&mut self, message: &str) {
        self.fault = true;
        self.cause
            .get_or_insert_with(Cause::default)
            .exceptions
            .push(ExceptionEntry {
                id: SpanId::random().to_string(),
                message: message.to_string(),
                kind: "error".to_string(),
            });
    }

    /// Stamp the end time if not already closed.
    pub(crate) fn close(&mut self) {
        if self.end_time.is_none() {
            self.end_time = Some(epoch_seconds(SystemTime::now()));
        }
    }
}

fn epoch_seconds(time: SystemTime) -> f64 {
    time.duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

/// X-Ray trace id: version, epoch seconds in hex, 96 random bits in hex.
fn new_trace_id(now: SystemTime) -> String {
    let epoch = now
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as u32;
    format!("1-{epoch:08x}-{}", random_hex_96())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_of_limit_length_routes_to_annotation() {
        let mut segment = SegmentDocument::root("op");
        segment.put_attribute("aws.cli.command", &"x".repeat(50));
        assert!(segment.annotations.contains_key("aws_cli_command"));
        assert!(!segment.metadata.contains_key("aws_cli_command"));
    }

    #[test]
    fn oversized_value_routes_to_metadata() {
        let mut segment = SegmentDocument::root("op");
        segment.put_attribute("aws.cli.command", &"x".repeat(51));
        assert!(!segment.annotations.contains_key("aws_cli_command"));
        assert!(segment.metadata.contains_key("aws_cli_command"));
    }

    #[test]
    fn keys_are_normalized() {
        let mut segment = SegmentDocument::root("op");
        segment.put_attribute("mcp.tool-name", "call_aws");
        assert_eq!(
            segment.annotations.get("mcp_tool_name").map(String::as_str),
            Some("call_aws")
        );
    }

    #[test]
    fn trace_id_has_xray_shape() {
        let trace_id = new_trace_id(SystemTime::now());
        let parts: Vec<&str> = trace_id.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "1");
        assert_eq!(parts[1].len(), 8);
        assert_eq!(parts[2].len(), 24);
    }

    #[test]
    fn exception_sets_fault_flag() {
        let mut segment = SegmentDocument::root("op");
        segment.add_exception("access denied");
        assert!(segment.fault);
        let exceptions = &segment.cause.as_ref().unwrap().exceptions;
        assert_eq!(exceptions.len(), 1);
        assert_eq!(exceptions[0].message, "access denied");
    }

    #[test]
    fn closed_root_serializes_expected_fields() {
        let mut segment = SegmentDocument::root("op");
        segment.put_annotation("service", "aws-mcp-tracing");
        segment.close();
        let value = serde_json::to_value(&segment).unwrap();
        assert_eq!(value["name"], "op");
        assert_eq!(value["id"].as_str().unwrap().len(), 16);
        assert!(value["trace_id"].as_str().unwrap().starts_with("1-"));
        assert!(value["end_time"].as_f64().unwrap() >= value["start_time"].as_f64().unwrap());
        assert_eq!(value["annotations"]["service"], "aws-mcp-tracing");
        assert!(value.get("fault").is_none());
        assert!(value.get("subsegments").is_none());
    }
}
