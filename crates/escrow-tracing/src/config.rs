//! Tracing configuration types.

use serde::Deserialize;

/// Configuration for the logging subsystem.
#[derive(Debug, Clone, Deserialize)]
pub struct TracingConfig {
    /// The service name included in log output.
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// Log level filter (e.g. "info", "debug", "escrow_gateway=debug,info").
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Output format for log lines.
    #[serde(default)]
    pub format: LogFormat,
}

/// Log line output format.
#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Plain,
    Json,
}

fn default_service_name() -> String {
    "escrow-gateway".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            service_name: default_service_name(),
            log_level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}
