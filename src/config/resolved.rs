//! Compose one connection URI from resolved endpoints and an optional credential.

use crate::config::{ConnectionParams, CredentialParams};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use std::collections::BTreeMap;

pub const URI_SCHEME: &str = "postgres";

/// Everything but the RFC 3986 unreserved characters.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'.').remove(b'_').remove(b'~');

fn encode(value: &str) -> String {
    utf8_percent_encode(value, COMPONENT).to_string()
}

/// `postgres://[user[:password]@]host1:port1,host2:port2/database[?k1=v1&k2]`.
///
/// The first endpoint carrying a literal `uri` wins and is returned verbatim. Query parameters are
/// the non-reserved keys of all endpoints, then of the credential; a later value replaces an
/// earlier one, each key appears once. User, password and query parameters are percent-encoded.
pub fn compose_uri(connections: &[ConnectionParams], credential: Option<&CredentialParams>) -> String {
    if let Some(uri) = connections.iter().find_map(|c| c.uri()) {
        return uri.to_string();
    }

    let hosts = connections
        .iter()
        .map(|c| match (c.host(), c.port()) {
            (Some(host), Some(port)) => format!("{}:{}", host, port),
            (Some(host), None) => host.to_string(),
            _ => String::new(),
        })
        .collect::<Vec<_>>()
        .join(",");

    let database = connections
        .iter()
        .find_map(|c| c.database())
        .map(|d| format!("/{}", d))
        .unwrap_or_default();

    let auth = match credential.and_then(|c| c.username().map(|u| (u, c.password()))) {
        Some((user, Some(password))) => format!("{}:{}@", encode(user), encode(password)),
        Some((user, None)) => format!("{}@", encode(user)),
        None => String::new(),
    };

    let mut options: BTreeMap<&str, &str> = BTreeMap::new();
    for c in connections {
        options.extend(c.extra.iter().map(|(k, v)| (k.as_str(), v.as_str())));
    }
    if let Some(c) = credential {
        options.extend(c.extra.iter().map(|(k, v)| (k.as_str(), v.as_str())));
    }
    let params = options
        .iter()
        .map(|(k, v)| {
            if v.is_empty() {
                encode(k)
            } else {
                format!("{}={}", encode(k), encode(v))
            }
        })
        .collect::<Vec<_>>()
        .join("&");
    let params = if params.is_empty() { params } else { format!("?{}", params) };

    format!("{}://{}{}{}{}", URI_SCHEME, auth, hosts, database, params)
}
