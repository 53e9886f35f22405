//! Load config from JSON documents or the process environment, and read connection / credential lists from it.

use crate::config::types::{ConfigParams, ConnectionParams, CredentialParams};
use crate::error::ConfigError;
use serde_json::Value;

/// Environment variables read by [`ConfigParams::from_env`] and the config key each one fills.
const ENV_KEYS: &[(&str, &str)] = &[
    ("POSTGRES_URI", "connection.uri"),
    ("POSTGRES_HOST", "connection.host"),
    ("POSTGRES_PORT", "connection.port"),
    ("POSTGRES_DB", "connection.database"),
    ("POSTGRES_USER", "credential.username"),
    ("POSTGRES_PASSWORD", "credential.password"),
];

impl ConfigParams {
    /// Flatten a nested JSON object into dotted keys. Arrays use the element index as key segment;
    /// nulls are skipped.
    pub fn from_json(value: &Value) -> Result<Self, ConfigError> {
        let Value::Object(_) = value else {
            return Err(ConfigError::Load("config root must be a JSON object".into()));
        };
        let mut config = ConfigParams::new();
        flatten_into(&mut config, "", value);
        Ok(config)
    }

    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let value: Value = serde_json::from_str(s).map_err(|e| ConfigError::Load(e.to_string()))?;
        ConfigParams::from_json(&value)
    }

    /// Connection and credential keys from `POSTGRES_*` variables (a `.env` file is honoured).
    /// Unset or empty variables are left out.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let mut config = ConfigParams::new();
        for (var, key) in ENV_KEYS {
            if let Ok(v) = std::env::var(var) {
                if !v.is_empty() {
                    config.set(*key, v);
                }
            }
        }
        config
    }
}

fn flatten_into(config: &mut ConfigParams, prefix: &str, value: &Value) {
    let join = |k: &str| {
        if prefix.is_empty() {
            k.to_string()
        } else {
            format!("{}.{}", prefix, k)
        }
    };
    match value {
        Value::Object(map) => {
            for (k, v) in map {
                flatten_into(config, &join(k), v);
            }
        }
        Value::Array(items) => {
            for (i, v) in items.iter().enumerate() {
                flatten_into(config, &join(&i.to_string()), v);
            }
        }
        Value::Null => {}
        Value::String(s) => config.set(prefix, s),
        other => config.set(prefix, other),
    }
}

impl ConnectionParams {
    /// All connections in config: each `connections.<name>` section, or the single `connection` section
    /// when no list is given.
    pub fn many_from_config(config: &ConfigParams) -> Vec<ConnectionParams> {
        let list = config.get_section("connections");
        let mut result: Vec<ConnectionParams> = list
            .section_names()
            .iter()
            .map(|name| ConnectionParams::from_config(&list.get_section(name)))
            .filter(|c| !c.is_empty())
            .collect();
        if result.is_empty() {
            let single = ConnectionParams::from_config(&config.get_section("connection"));
            if !single.is_empty() {
                result.push(single);
            }
        }
        result
    }
}

impl CredentialParams {
    /// All credentials in config: each `credentials.<name>` section, or the single `credential` section.
    pub fn many_from_config(config: &ConfigParams) -> Vec<CredentialParams> {
        let list = config.get_section("credentials");
        let mut result: Vec<CredentialParams> = list
            .section_names()
            .iter()
            .map(|name| CredentialParams::from_config(&list.get_section(name)))
            .filter(|c| !c.is_empty())
            .collect();
        if result.is_empty() {
            let single = CredentialParams::from_config(&config.get_section("credential"));
            if !single.is_empty() {
                result.push(single);
            }
        }
        result
    }
}
