//! Configuration types and loading logic.

use figment::providers::{Env, Format, Toml};
use figment::Figment;
use serde::Deserialize;

use escrow_tracing::TracingConfig;

use crate::rewrite::Endpoint;
use crate::routes::RouteConfig;

/// Top-level gateway configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub server: ServerConfig,
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub escrow: EscrowConfig,
    pub domains: DomainsConfig,
    #[serde(default)]
    pub routes: Vec<RouteConfig>,
    #[serde(default)]
    pub tracing: TracingConfig,
}

/// Server listen configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen_address")]
    pub listen_address: String,
}

/// Downstream application (the app being fronted) configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamConfig {
    pub base_url: String,

    #[serde(default = "default_upstream_timeout")]
    pub timeout_secs: u64,
}

/// Escrow protocol parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct EscrowConfig {
    /// Seconds an escrowed response stays retrievable.
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,

    /// Cookie/query parameter name carrying the token.
    #[serde(default = "default_data_key")]
    pub data_key: String,

    /// Namespace prefix for store keys.
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

/// The insecure/secure endpoint pair used for URL rewriting.
#[derive(Debug, Clone, Deserialize)]
pub struct DomainsConfig {
    pub insecure: Endpoint,
    pub secure: Endpoint,
}

fn default_listen_address() -> String {
    "0.0.0.0:3090".to_string()
}

fn default_upstream_timeout() -> u64 {
    30
}

fn default_ttl_secs() -> u64 {
    180
}

fn default_data_key() -> String {
    "escrow".to_string()
}

fn default_key_prefix() -> String {
    "escrow:".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_address: default_listen_address(),
        }
    }
}

impl Default for EscrowConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
            data_key: default_data_key(),
            key_prefix: default_key_prefix(),
        }
    }
}

impl GatewayConfig {
    /// Load configuration from TOML file and environment variables.
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables (ESCROW_ prefix, __ for nesting)
    /// 2. TOML config file
    /// 3. Defaults
    pub fn load(config_path: &str) -> anyhow::Result<Self> {
        let config: GatewayConfig = Figment::new()
            .merge(Toml::file(config_path))
            .merge(Env::prefixed("ESCROW_").split("__"))
            .extract()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_optional_sections() {
        let toml = r#"
            [upstream]
            base_url = "http://localhost:3000"

            [domains.insecure]
            protocol = "http"
            host = "www.example.com"
            port = 80

            [domains.secure]
            protocol = "https"
            host = "www.example.com"
            port = 443
        "#;
        let config: GatewayConfig = Figment::new()
            .merge(Toml::string(toml))
            .extract()
            .unwrap();

        assert_eq!(config.server.listen_address, "0.0.0.0:3090");
        assert_eq!(config.escrow.ttl_secs, 180);
        assert_eq!(config.escrow.data_key, "escrow");
        assert_eq!(config.escrow.key_prefix, "escrow:");
        assert!(config.routes.is_empty());
    }

    #[test]
    fn test_route_table_parses() {
        let toml = r#"
            [upstream]
            base_url = "http://localhost:3000"

            [domains.insecure]
            protocol = "http"
            host = "www.example.com"

            [domains.secure]
            protocol = "https"
            host = "ssl.example.com"

            [[routes]]
            path = "/sessions"
            method = "POST"
            controller = "sessions"
            action = "create"
            escrow = true
        "#;
        let config: GatewayConfig = Figment::new()
            .merge(Toml::string(toml))
            .extract()
            .unwrap();

        assert_eq!(config.routes.len(), 1);
        assert!(config.routes[0].escrow);
        assert_eq!(config.routes[0].path, "/sessions");
    }
}
