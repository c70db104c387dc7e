//! Environment configuration
//!
//! Warehouse credentials and the LLM API key are supplied as environment
//! variables (optionally via a .env file) and validated for presence before
//! first use. Every missing key is reported in a single error.

use crate::error::{NlqError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Warehouse connection parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarehouseConfig {
    pub user: String,
    pub password: String,
    /// Account identifier, used as the connection host.
    pub account: String,
    /// Compute warehouse label, recorded as the connection's application name.
    pub warehouse: String,
    pub database: String,
    pub schema: String,
    pub port: u16,
}

/// LLM service parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub warehouse: WarehouseConfig,
    pub llm: LlmConfig,
    /// Optional JSONL audit log path.
    pub log_file: Option<String>,
    pub query_timeout_secs: u64,
}

const REQUIRED_WAREHOUSE_KEYS: [&str; 6] = [
    "WAREHOUSE_USER",
    "WAREHOUSE_PASSWORD",
    "WAREHOUSE_ACCOUNT",
    "WAREHOUSE_NAME",
    "WAREHOUSE_DATABASE",
    "WAREHOUSE_SCHEMA",
];

impl AppConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load via an injectable key lookup. Tests pass a map-backed closure so
    /// they never touch the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut missing: Vec<&str> = Vec::new();

        let get = |key: &'static str, missing: &mut Vec<&str>| -> String {
            match lookup(key) {
                Some(v) if !v.trim().is_empty() => v,
                _ => {
                    missing.push(key);
                    String::new()
                }
            }
        };

        let user = get("WAREHOUSE_USER", &mut missing);
        let password = get("WAREHOUSE_PASSWORD", &mut missing);
        let account = get("WAREHOUSE_ACCOUNT", &mut missing);
        let warehouse = get("WAREHOUSE_NAME", &mut missing);
        let database = get("WAREHOUSE_DATABASE", &mut missing);
        let schema = get("WAREHOUSE_SCHEMA", &mut missing);
        let api_key = get("OPENAI_API_KEY", &mut missing);

        if !missing.is_empty() {
            return Err(NlqError::Config(format!(
                "Missing configuration: {}",
                missing.join(", ")
            )));
        }

        let port = match lookup("WAREHOUSE_PORT") {
            Some(raw) => raw.parse::<u16>().map_err(|_| {
                NlqError::Config(format!("Invalid WAREHOUSE_PORT: {}", raw))
            })?,
            None => 5432,
        };

        let model = lookup("OPENAI_MODEL").unwrap_or_else(|| "gpt-4".to_string());
        let base_url = lookup("OPENAI_BASE_URL")
            .unwrap_or_else(|| "https://api.openai.com/v1".to_string());

        Ok(Self {
            warehouse: WarehouseConfig {
                user,
                password,
                account,
                warehouse,
                database,
                schema,
                port,
            },
            llm: LlmConfig {
                api_key,
                model,
                base_url,
                timeout_secs: 30,
            },
            log_file: lookup("NLQ_LOG_FILE"),
            query_timeout_secs: 60,
        })
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }

    /// The set of keys that must be present for `from_lookup` to succeed.
    pub fn required_keys() -> Vec<&'static str> {
        let mut keys = REQUIRED_WAREHOUSE_KEYS.to_vec();
        keys.push("OPENAI_API_KEY");
        keys
    }
}

impl LlmConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn full_env() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("WAREHOUSE_USER", "analyst"),
            ("WAREHOUSE_PASSWORD", "secret"),
            ("WAREHOUSE_ACCOUNT", "warehouse.internal"),
            ("WAREHOUSE_NAME", "compute_wh"),
            ("WAREHOUSE_DATABASE", "userprofiles"),
            ("WAREHOUSE_SCHEMA", "public"),
            ("OPENAI_API_KEY", "sk-test"),
        ])
    }

    fn lookup_in<'a>(env: &'a HashMap<&'static str, &'static str>) -> impl Fn(&str) -> Option<String> + 'a {
        move |key| env.get(key).map(|v| v.to_string())
    }

    #[test]
    fn loads_full_configuration() {
        let env = full_env();
        let config = AppConfig::from_lookup(lookup_in(&env)).unwrap();
        assert_eq!(config.warehouse.user, "analyst");
        assert_eq!(config.warehouse.database, "userprofiles");
        assert_eq!(config.warehouse.port, 5432);
        assert_eq!(config.llm.model, "gpt-4");
        assert_eq!(config.llm.base_url, "https://api.openai.com/v1");
    }

    #[test]
    fn reports_all_missing_keys_at_once() {
        let mut env = full_env();
        env.remove("WAREHOUSE_PASSWORD");
        env.remove("OPENAI_API_KEY");

        let err = AppConfig::from_lookup(lookup_in(&env)).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("WAREHOUSE_PASSWORD"));
        assert!(message.contains("OPENAI_API_KEY"));
    }

    #[test]
    fn blank_value_counts_as_missing() {
        let mut env = full_env();
        env.insert("WAREHOUSE_USER", "  ");

        let err = AppConfig::from_lookup(lookup_in(&env)).unwrap_err();
        assert!(err.to_string().contains("WAREHOUSE_USER"));
    }

    #[test]
    fn optional_overrides_are_honored() {
        let mut env = full_env();
        env.insert("WAREHOUSE_PORT", "6543");
        env.insert("OPENAI_MODEL", "gpt-4o");
        env.insert("NLQ_LOG_FILE", "queries.jsonl");

        let config = AppConfig::from_lookup(lookup_in(&env)).unwrap();
        assert_eq!(config.warehouse.port, 6543);
        assert_eq!(config.llm.model, "gpt-4o");
        assert_eq!(config.log_file.as_deref(), Some("queries.jsonl"));
    }

    #[test]
    fn invalid_port_is_a_config_error() {
        let mut env = full_env();
        env.insert("WAREHOUSE_PORT", "not-a-port");

        let err = AppConfig::from_lookup(lookup_in(&env)).unwrap_err();
        assert!(matches!(err, NlqError::Config(_)));
    }
}
