//! Environment-driven tracing configuration.
//!
//! The backend is fixed for the process lifetime: configuration is read once
//! at startup and handed to [`TraceManager::from_config`].
//!
//! [`TraceManager::from_config`]: crate::TraceManager::from_config

use std::str::FromStr;

use tracing::warn;

/// Selects the tracing backend. One of `disabled`, `otlp` or `xray`; any
/// other value falls back to `disabled`.
pub const AWS_MCP_TRACING_BACKEND: &str = "AWS_MCP_TRACING_BACKEND";
/// Target the OTLP exporter sends spans to.
pub const OTEL_EXPORTER_OTLP_ENDPOINT: &str = "OTEL_EXPORTER_OTLP_ENDPOINT";
/// Default OTLP collector endpoint.
pub const OTEL_EXPORTER_OTLP_ENDPOINT_DEFAULT: &str = "http://localhost:4317";
/// Address of the local X-Ray daemon, as `host:port`.
pub const AWS_XRAY_DAEMON_ADDRESS: &str = "AWS_XRAY_DAEMON_ADDRESS";
/// Default X-Ray daemon address.
pub const AWS_XRAY_DAEMON_ADDRESS_DEFAULT: &str = "127.0.0.1:2000";
/// Operation name that opens a root X-Ray segment.
pub const AWS_MCP_TRACING_ROOT_OPERATION: &str = "AWS_MCP_TRACING_ROOT_OPERATION";
/// Default root operation name.
pub const ROOT_OPERATION_DEFAULT: &str = "aws_cli_command";

/// The tracing backend to construct at startup.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BackendKind {
    /// Tracing disabled; all spans are inert.
    #[default]
    Disabled,
    /// Buffer spans in memory and export them to the console and an OTLP
    /// collector.
    Otlp,
    /// Record operations as X-Ray segments via the local daemon.
    Xray,
}

impl FromStr for BackendKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "disabled" => Ok(BackendKind::Disabled),
            "otlp" => Ok(BackendKind::Otlp),
            "xray" => Ok(BackendKind::Xray),
            _ => Err(()),
        }
    }
}

/// Tracing settings resolved from the environment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TracingConfig {
    /// Which backend to construct.
    pub backend: BackendKind,
    /// OTLP collector endpoint.
    pub otlp_endpoint: String,
    /// X-Ray daemon address, as `host:port`.
    pub xray_daemon_address: String,
    /// Operation name that opens a root X-Ray segment; trace calls for other
    /// names record subsegments under it.
    pub root_operation: String,
}

impl Default for TracingConfig {
    fn default() -> Self {
        TracingConfig {
            backend: BackendKind::default(),
            otlp_endpoint: OTEL_EXPORTER_OTLP_ENDPOINT_DEFAULT.to_string(),
            xray_daemon_address: AWS_XRAY_DAEMON_ADDRESS_DEFAULT.to_string(),
            root_operation: ROOT_OPERATION_DEFAULT.to_string(),
        }
    }
}

impl TracingConfig {
    /// Resolve the configuration from the process environment.
    ///
    /// Unset variables take their defaults; an unrecognized backend value
    /// disables tracing rather than failing startup.
    pub fn from_env() -> Self {
        let backend = match std::env::var(AWS_MCP_TRACING_BACKEND) {
            Ok(value) => value.parse().unwrap_or_else(|_| {
                warn!(
                    backend = %value,
                    "unrecognized tracing backend, tracing disabled"
                );
                BackendKind::Disabled
            }),
            Err(_) => BackendKind::Disabled,
        };

        TracingConfig {
            backend,
            otlp_endpoint: env_or(
                OTEL_EXPORTER_OTLP_ENDPOINT,
                OTEL_EXPORTER_OTLP_ENDPOINT_DEFAULT,
            ),
            xray_daemon_address: env_or(AWS_XRAY_DAEMON_ADDRESS, AWS_XRAY_DAEMON_ADDRESS_DEFAULT),
            root_operation: env_or(AWS_MCP_TRACING_ROOT_OPERATION, ROOT_OPERATION_DEFAULT),
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    match std::env::var(key) {
        Ok(value) if !value.is_empty() => value,
        _ => default.to_string(),
    }
}
