//! Raw config types: flat dotted-key parameters and the connection / credential records read from them.

use std::collections::{BTreeMap, BTreeSet};

/// Flat configuration map keyed by dotted paths (e.g. `connection.host`, `options.max_pool_size`).
/// Keys are kept ordered so sections and composed query strings come out stable.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConfigParams {
    values: BTreeMap<String, String>,
}

impl ConfigParams {
    pub fn new() -> Self {
        ConfigParams::default()
    }

    /// Build from key/value pairs: `ConfigParams::from_tuples([("connection.host", "localhost")])`.
    pub fn from_tuples<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: ToString,
        I: IntoIterator<Item = (K, V)>,
    {
        ConfigParams {
            values: pairs.into_iter().map(|(k, v)| (k.into(), v.to_string())).collect(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Value for key, treating an empty string as absent.
    pub fn get_non_empty(&self, key: &str) -> Option<&str> {
        self.get(key).filter(|v| !v.is_empty())
    }

    pub fn get_as_string_or(&self, key: &str, default: &str) -> String {
        self.get_non_empty(key).unwrap_or(default).to_string()
    }

    pub fn get_as_nullable_integer(&self, key: &str) -> Option<i64> {
        self.get_non_empty(key).and_then(|v| v.trim().parse().ok())
    }

    pub fn get_as_integer_or(&self, key: &str, default: i64) -> i64 {
        self.get_as_nullable_integer(key).unwrap_or(default)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl ToString) {
        self.values.insert(key.into(), value.to_string());
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.values.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Keys under `name.` with the prefix stripped.
    pub fn get_section(&self, name: &str) -> ConfigParams {
        let prefix = format!("{}.", name);
        ConfigParams {
            values: self
                .values
                .iter()
                .filter_map(|(k, v)| k.strip_prefix(&prefix).map(|rest| (rest.to_string(), v.clone())))
                .collect(),
        }
    }

    /// Distinct first path segments of keys that have a nested part (`a.b` -> `a`). Numeric
    /// segments come first in numeric order (`2` before `10`), the rest follow by name.
    pub fn section_names(&self) -> Vec<String> {
        let names: BTreeSet<&str> = self
            .values
            .keys()
            .filter_map(|k| k.split_once('.').map(|(head, _)| head))
            .collect();
        let mut names: Vec<&str> = names.into_iter().collect();
        names.sort_by_key(|name| match name.parse::<u64>() {
            Ok(n) => (0, n, ""),
            Err(_) => (1, 0, *name),
        });
        names.into_iter().map(String::from).collect()
    }

    /// Returns a copy where every key of `defaults` missing here is filled in.
    pub fn set_defaults(&self, defaults: &ConfigParams) -> ConfigParams {
        let mut values = defaults.values.clone();
        values.extend(self.values.iter().map(|(k, v)| (k.clone(), v.clone())));
        ConfigParams { values }
    }

    /// Returns a copy where keys of `other` replace keys here.
    pub fn override_with(&self, other: &ConfigParams) -> ConfigParams {
        other.set_defaults(self)
    }
}

/// Keys with a fixed meaning in a connection record; anything else is passed to the driver.
const CONNECTION_KEYS: &[&str] = &["discovery_key", "host", "port", "uri", "database"];
/// Keys with a fixed meaning in a credential record.
const CREDENTIAL_KEYS: &[&str] = &["store_key", "username", "password"];

/// One database node descriptor.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConnectionParams {
    pub discovery_key: Option<String>,
    pub host: Option<String>,
    /// Raw port text; see [`ConnectionParams::port`].
    pub port: Option<String>,
    pub uri: Option<String>,
    pub database: Option<String>,
    /// Remaining keys (e.g. `sslmode`, `application_name`).
    pub extra: BTreeMap<String, String>,
}

impl ConnectionParams {
    /// Read a single connection section (keys relative to the section).
    pub fn from_config(section: &ConfigParams) -> Self {
        let field = |k: &str| section.get_non_empty(k).map(String::from);
        ConnectionParams {
            discovery_key: field("discovery_key"),
            host: field("host"),
            port: field("port"),
            uri: field("uri"),
            database: field("database"),
            extra: section
                .iter()
                .filter(|(k, _)| !CONNECTION_KEYS.contains(k))
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    /// Port as a number. Zero and unparsable values count as not set.
    pub fn port(&self) -> Option<u16> {
        self.port
            .as_deref()
            .and_then(|p| p.trim().parse::<u16>().ok())
            .filter(|p| *p != 0)
    }

    pub fn uri(&self) -> Option<&str> {
        self.uri.as_deref()
    }

    pub fn database(&self) -> Option<&str> {
        self.database.as_deref()
    }

    pub fn discovery_key(&self) -> Option<&str> {
        self.discovery_key.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.discovery_key.is_none()
            && self.host.is_none()
            && self.port.is_none()
            && self.uri.is_none()
            && self.database.is_none()
            && self.extra.is_empty()
    }
}

/// Username/password pair or a key into a credential store.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CredentialParams {
    pub store_key: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub extra: BTreeMap<String, String>,
}

impl CredentialParams {
    pub fn from_config(section: &ConfigParams) -> Self {
        let field = |k: &str| section.get_non_empty(k).map(String::from);
        CredentialParams {
            store_key: field("store_key"),
            username: field("username"),
            password: field("password"),
            extra: section
                .iter()
                .filter(|(k, _)| !CREDENTIAL_KEYS.contains(k))
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    pub fn store_key(&self) -> Option<&str> {
        self.store_key.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.store_key.is_none() && self.username.is_none() && self.password.is_none() && self.extra.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn section_strips_prefix() {
        let config = ConfigParams::from_tuples([
            ("connection.host", "localhost"),
            ("connection.port", "5432"),
            ("credential.username", "postgres"),
        ]);
        let section = config.get_section("connection");
        assert_eq!(section.len(), 2);
        assert_eq!(section.get("host"), Some("localhost"));
        assert_eq!(config.section_names(), vec!["connection", "credential"]);
    }

    #[test]
    fn indexed_sections_sort_numerically() {
        let config = ConfigParams::from_tuples((0..12).map(|i| (format!("{}.host", i), format!("db{}", i))));
        let expected: Vec<String> = (0..12).map(|i| i.to_string()).collect();
        assert_eq!(config.section_names(), expected);

        let mixed = ConfigParams::from_tuples([("10.a", "x"), ("b.a", "x"), ("2.a", "x"), ("a.a", "x")]);
        assert_eq!(mixed.section_names(), vec!["2", "10", "a", "b"]);
    }

    #[test]
    fn defaults_do_not_override_explicit_values() {
        let defaults = ConfigParams::from_tuples([("options.max_pool_size", "3"), ("options.idle_timeout", "10000")]);
        let config = ConfigParams::from_tuples([("options.max_pool_size", "7")]).set_defaults(&defaults);
        assert_eq!(config.get_as_integer_or("options.max_pool_size", 0), 7);
        assert_eq!(config.get_as_integer_or("options.idle_timeout", 0), 10000);
    }

    #[test]
    fn connection_record_splits_reserved_and_extra_keys() {
        let section = ConfigParams::from_tuples([
            ("host", "db1"),
            ("port", "5432"),
            ("database", "test"),
            ("sslmode", "disable"),
            ("uri", ""),
        ]);
        let conn = ConnectionParams::from_config(&section);
        assert_eq!(conn.host(), Some("db1"));
        assert_eq!(conn.port(), Some(5432));
        assert_eq!(conn.uri(), None);
        assert_eq!(conn.extra.get("sslmode").map(String::as_str), Some("disable"));
        assert_eq!(conn.extra.len(), 1);
    }

    #[test]
    fn zero_or_garbage_port_is_not_set() {
        let mut conn = ConnectionParams {
            port: Some("0".into()),
            ..Default::default()
        };
        assert_eq!(conn.port(), None);
        conn.port = Some("abc".into());
        assert_eq!(conn.port(), None);
    }
}
