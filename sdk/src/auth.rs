//! Per-request identity headers
//!
//! envd runs each process as the sandbox user named in the `authorization`
//! header: HTTP Basic with the user name and an empty password.

use std::collections::HashMap;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tonic::metadata::{AsciiMetadataValue, MetadataKey, MetadataMap};

use crate::error::{Error, Result};

/// Sandbox user processes run as unless told otherwise
pub const DEFAULT_USER: &str = "user";

/// Header carrying the sandbox user
pub const AUTHORIZATION_HEADER: &str = "authorization";

/// Build the identity header for `user`
pub fn authentication_header(user: &str) -> (&'static str, String) {
    let encoded = STANDARD.encode(format!("{}:", user));
    (AUTHORIZATION_HEADER, format!("Basic {}", encoded))
}

/// Recover the user name from an identity header value
pub fn parse_authentication_header(value: &str) -> Option<String> {
    let encoded = value.strip_prefix("Basic ")?;
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (user, password) = decoded.split_once(':')?;
    if user.is_empty() || !password.is_empty() {
        return None;
    }
    Some(user.to_string())
}

/// Assemble the metadata attached to one envd call
pub fn request_metadata(
    headers: &HashMap<String, String>,
    user: Option<&str>,
) -> Result<MetadataMap> {
    let mut metadata = MetadataMap::new();

    for (name, value) in headers {
        insert(&mut metadata, name, value)?;
    }

    let (name, value) = authentication_header(user.unwrap_or(DEFAULT_USER));
    insert(&mut metadata, name, &value)?;

    Ok(metadata)
}

fn insert(metadata: &mut MetadataMap, name: &str, value: &str) -> Result<()> {
    let key = MetadataKey::from_bytes(name.to_ascii_lowercase().as_bytes())
        .map_err(|_| Error::InvalidArgument(format!("invalid header name: {}", name)))?;
    let value: AsciiMetadataValue = value
        .parse()
        .map_err(|_| Error::InvalidArgument(format!("invalid value for header {}", name)))?;
    metadata.insert(key, value);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_user_header() {
        let (name, value) = authentication_header(DEFAULT_USER);
        assert_eq!(name, "authorization");
        // base64("user:")
        assert_eq!(value, "Basic dXNlcjo=");
    }

    #[test]
    fn test_header_round_trip() {
        let (_, value) = authentication_header("root");
        assert_eq!(parse_authentication_header(&value), Some("root".to_string()));
    }

    #[test]
    fn test_rejects_malformed_header() {
        assert_eq!(parse_authentication_header("Bearer abc"), None);
        assert_eq!(parse_authentication_header("Basic !!!"), None);
        // base64("root:secret")
        assert_eq!(parse_authentication_header("Basic cm9vdDpzZWNyZXQ="), None);
    }

    #[test]
    fn test_request_metadata() {
        let mut headers = HashMap::new();
        headers.insert("X-Access-Token".to_string(), "tok".to_string());

        let metadata = request_metadata(&headers, Some("root")).unwrap();
        assert_eq!(
            metadata.get("x-access-token").and_then(|v| v.to_str().ok()),
            Some("tok")
        );
        assert_eq!(
            metadata.get("authorization").and_then(|v| v.to_str().ok()),
            Some("Basic cm9vdDo=")
        );
    }

    #[test]
    fn test_request_metadata_rejects_bad_header() {
        let mut headers = HashMap::new();
        headers.insert("bad header".to_string(), "x".to_string());
        assert!(matches!(
            request_metadata(&headers, None),
            Err(Error::InvalidArgument(_))
        ));
    }
}
