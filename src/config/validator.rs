//! Connection validation: every endpoint must be addressable before a URI is composed.

use crate::config::ConnectionParams;
use crate::error::ConfigError;

/// An endpoint with an explicit `uri` is accepted as is; otherwise host, port and database are required.
pub fn validate_connection(connection: &ConnectionParams) -> Result<(), ConfigError> {
    if connection.uri().is_some() {
        return Ok(());
    }
    if connection.host().is_none() {
        return Err(ConfigError::NoHost);
    }
    if connection.port().is_none() {
        return Err(ConfigError::NoPort);
    }
    if connection.database().is_none() {
        return Err(ConfigError::NoDatabase);
    }
    Ok(())
}

pub fn validate_connections(connections: &[ConnectionParams]) -> Result<(), ConfigError> {
    if connections.is_empty() {
        return Err(ConfigError::NoConnection);
    }
    connections.iter().try_for_each(validate_connection)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint(host: Option<&str>, port: Option<&str>, database: Option<&str>) -> ConnectionParams {
        ConnectionParams {
            host: host.map(String::from),
            port: port.map(String::from),
            database: database.map(String::from),
            ..Default::default()
        }
    }

    #[test]
    fn missing_fields_are_reported_in_order() {
        assert_eq!(validate_connection(&endpoint(None, Some("5432"), Some("test"))), Err(ConfigError::NoHost));
        assert_eq!(validate_connection(&endpoint(Some("h"), None, Some("test"))), Err(ConfigError::NoPort));
        assert_eq!(validate_connection(&endpoint(Some("h"), Some("5432"), None)), Err(ConfigError::NoDatabase));
        assert_eq!(validate_connection(&endpoint(Some("h"), Some("5432"), Some("test"))), Ok(()));
    }

    #[test]
    fn uri_skips_field_checks() {
        let conn = ConnectionParams {
            uri: Some("postgres://localhost/test".into()),
            ..Default::default()
        };
        assert_eq!(validate_connection(&conn), Ok(()));
    }

    #[test]
    fn no_endpoints_is_no_connection() {
        assert_eq!(validate_connections(&[]), Err(ConfigError::NoConnection));
    }

    #[test]
    fn every_endpoint_is_checked() {
        let conns = vec![endpoint(Some("a"), Some("5432"), Some("db")), endpoint(Some("b"), None, None)];
        assert_eq!(validate_connections(&conns), Err(ConfigError::NoPort));
    }
}
