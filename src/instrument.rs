//! Instrumentation helpers for traced server operations.
//!
//! Builds the standard attribute set from a traced call's arguments and
//! wraps the operation in a scoped span. Two entry points share the one
//! attribute builder; callers pick [`traced`] or [`traced_async`] to match
//! their own concurrency model.

use std::fmt;
use std::future::Future;

use crate::manager::TraceManager;
use crate::trace::span::{KeyValue, SpanStatus};
use crate::SERVICE_NAME;

/// Attribute carrying the server identity.
pub const ATTR_SERVER_NAME: &str = "mcp.server.name";
/// Attribute carrying the traced operation name.
pub const ATTR_OPERATION: &str = "mcp.operation";
/// Attribute carrying the invoked tool name.
pub const ATTR_TOOL_NAME: &str = "mcp.tool.name";
/// Attribute carrying the full CLI command text.
pub const ATTR_CLI_COMMAND: &str = "aws.cli.command";
/// Attribute carrying the AWS service parsed from the command.
pub const ATTR_AWS_SERVICE: &str = "aws.service";
/// Attribute carrying the AWS operation parsed from the command.
pub const ATTR_AWS_OPERATION: &str = "aws.operation";

/// Build the standard attributes for a traced operation.
///
/// When a CLI command is supplied, the service and operation words are
/// parsed out of it (`aws <service> <operation> ...`) so they can be
/// searched independently of the full command text.
pub fn standard_attributes(operation: &str, cli_command: Option<&str>) -> Vec<KeyValue> {
    let mut attributes = vec![
        KeyValue::new(ATTR_SERVER_NAME, SERVICE_NAME),
        KeyValue::new(ATTR_OPERATION, operation),
    ];

    if let Some(command) = cli_command {
        attributes.push(KeyValue::new(ATTR_TOOL_NAME, "call_aws"));
        attributes.push(KeyValue::new(ATTR_CLI_COMMAND, command));

        let mut words = command.split_whitespace();
        if words.next() == Some("aws") {
            if let Some(service) = words.next() {
                attributes.push(KeyValue::new(ATTR_AWS_SERVICE, service));
                if let Some(op) = words.next() {
                    attributes.push(KeyValue::new(ATTR_AWS_OPERATION, op));
                }
            }
        }
    }

    attributes
}

/// Run a synchronous operation inside a scoped span with the standard
/// attributes.
pub fn traced<T, E, F>(
    manager: &TraceManager,
    operation: &str,
    cli_command: Option<&str>,
    f: F,
) -> Result<T, E>
where
    F: FnOnce() -> Result<T, E>,
    E: fmt::Display,
{
    manager.in_span(operation, standard_attributes(operation, cli_command), |_span| f())
}

/// Run an asynchronous operation inside a scoped span with the standard
/// attributes.
pub async fn traced_async<T, E, F, Fut>(
    manager: &TraceManager,
    operation: &str,
    cli_command: Option<&str>,
    f: F,
) -> Result<T, E>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Display,
{
    let mut span = manager.trace(operation, standard_attributes(operation, cli_command));
    match f().await {
        Ok(value) => Ok(value),
        Err(error) => {
            span.set_status(SpanStatus::error(error.to_string()));
            Err(error)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::otlp::OtlpBackend;
    use crate::trace::transform::StatusCode;

    fn attribute<'a>(attributes: &'a [KeyValue], key: &str) -> Option<&'a str> {
        attributes
            .iter()
            .find(|kv| kv.key == key)
            .map(|kv| kv.value.as_str())
    }

    #[test]
    fn base_attributes_identify_server_and_operation() {
        let attributes = standard_attributes("list_buckets", None);
        assert_eq!(attribute(&attributes, ATTR_SERVER_NAME), Some(SERVICE_NAME));
        assert_eq!(attribute(&attributes, ATTR_OPERATION), Some("list_buckets"));
        assert_eq!(attribute(&attributes, ATTR_CLI_COMMAND), None);
    }

    #[test]
    fn cli_command_is_parsed_into_service_and_operation() {
        let attributes =
            standard_attributes("aws_cli_command", Some("aws s3 list-buckets --output json"));
        assert_eq!(attribute(&attributes, ATTR_TOOL_NAME), Some("call_aws"));
        assert_eq!(
            attribute(&attributes, ATTR_CLI_COMMAND),
            Some("aws s3 list-buckets --output json")
        );
        assert_eq!(attribute(&attributes, ATTR_AWS_SERVICE), Some("s3"));
        assert_eq!(attribute(&attributes, ATTR_AWS_OPERATION), Some("list-buckets"));
    }

    #[test]
    fn non_aws_command_keeps_only_the_command_attribute() {
        let attributes = standard_attributes("aws_cli_command", Some("kubectl get pods"));
        assert_eq!(
            attribute(&attributes, ATTR_CLI_COMMAND),
            Some("kubectl get pods")
        );
        assert_eq!(attribute(&attributes, ATTR_AWS_SERVICE), None);
    }

    #[test]
    fn traced_records_span_with_standard_attributes() {
        let manager = TraceManager::new(Box::new(OtlpBackend::buffered()));
        let result: Result<(), String> =
            traced(&manager, "aws_cli_command", Some("aws ec2 describe-instances"), || {
                Err("throttled".to_string())
            });
        assert_eq!(result.unwrap_err(), "throttled");

        let batch = manager.get_resource_spans();
        let span = &batch.scope_spans[0].spans[0];
        assert_eq!(span.name, "aws_cli_command");
        assert_eq!(span.status.code, StatusCode::Error);
        assert!(span
            .attributes
            .iter()
            .any(|a| a.key == ATTR_AWS_SERVICE && a.value.string_value == "ec2"));
    }

    #[test]
    fn traced_async_finalizes_across_await_points() {
        let manager = TraceManager::new(Box::new(OtlpBackend::buffered()));
        let result: Result<u32, String> = futures_executor::block_on(traced_async(
            &manager,
            "aws_cli_command",
            Some("aws sts get-caller-identity"),
            || async { Ok(99) },
        ));
        assert_eq!(result.unwrap(), 99);

        let batch = manager.get_resource_spans();
        assert_eq!(batch.span_count(), 1);
        assert_eq!(batch.scope_spans[0].spans[0].status.code, StatusCode::Ok);
    }
}
