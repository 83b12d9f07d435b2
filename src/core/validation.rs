// src/core/validation.rs

use crate::core::models::CustomHeaders;
use crate::error::ValidationError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::fmt;
use std::net::Ipv4Addr;
use tracing::debug;
use url::Url;

static RE_DOMAIN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:[a-zA-Z0-9](?:[a-zA-Z0-9-]*[a-zA-Z0-9])?\.)+[a-zA-Z]{2,}$").unwrap()
});
static RE_IPV4: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(?:\d{1,3}\.){3}\d{1,3}$").unwrap());
// Authority without userinfo or port, optional path.
static RE_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^https?://([^/\s:@?#]+)(?:/\S*)?$").unwrap());

/// A scan target that has passed syntax checks: a bare domain, an
/// `http(s)://` URL with optional path, or an IPv4 dotted quad.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target(String);

impl Target {
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(ValidationError::MissingTarget);
        }
        if is_host(raw) || is_url(raw) {
            Ok(Self(raw.to_string()))
        } else {
            debug!(target = raw, "Rejected malformed target.");
            Err(ValidationError::InvalidTarget)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn is_host(candidate: &str) -> bool {
    if RE_IPV4.is_match(candidate) {
        return candidate.parse::<Ipv4Addr>().is_ok();
    }
    RE_DOMAIN.is_match(candidate)
}

fn is_url(candidate: &str) -> bool {
    let Some(host) = RE_URL.captures(candidate).and_then(|caps| caps.get(1)) else {
        return false;
    };
    is_host(host.as_str()) && Url::parse(candidate).is_ok()
}

/// Normalizes the `headers` option: a JSON object, or a string that holds one.
///
/// Absent, `null` and empty-string values mean "no custom headers".
pub fn custom_headers(value: Option<&Value>) -> Result<Option<CustomHeaders>, ValidationError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(map)) => Ok(Some(map.clone())),
        Some(Value::String(text)) if text.trim().is_empty() => Ok(None),
        Some(Value::String(text)) => match serde_json::from_str::<Value>(text) {
            Ok(Value::Object(map)) => Ok(Some(map)),
            _ => Err(ValidationError::InvalidHeaders),
        },
        Some(_) => Err(ValidationError::InvalidHeaders),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_domains_urls_and_ipv4() {
        for ok in [
            "example.com",
            "sub.example.co.uk",
            "https://example.com",
            "http://example.com/login?next=/",
            "https://10.0.0.1/admin",
            "192.168.1.1",
            "  example.org  ",
        ] {
            assert!(Target::parse(ok).is_ok(), "{ok}");
        }
        assert_eq!(Target::parse(" example.org ").unwrap().as_str(), "example.org");
    }

    #[test]
    fn rejects_everything_else() {
        for bad in [
            "localhost",
            "example",
            "example.c",
            "ftp://example.com",
            "example.com:8080",
            "https://example.com:8443/",
            "256.1.1.1",
            "::1",
            "https://user@example.com",
            "example.com; rm -rf /",
        ] {
            assert_eq!(Target::parse(bad), Err(ValidationError::InvalidTarget), "{bad}");
        }
        assert_eq!(Target::parse("   "), Err(ValidationError::MissingTarget));
    }

    #[test]
    fn headers_object_or_json_text() {
        let obj = json!({"Authorization": "x"});
        assert_eq!(
            custom_headers(Some(&obj)).unwrap().unwrap().get("Authorization"),
            Some(&json!("x"))
        );
        let text = json!("{\"A\":\"b\"}");
        assert!(custom_headers(Some(&text)).unwrap().is_some());
        assert_eq!(custom_headers(None).unwrap(), None);
        assert_eq!(custom_headers(Some(&json!(""))).unwrap(), None);
    }

    #[test]
    fn malformed_headers_are_rejected() {
        for bad in [json!("{not json"), json!("[1,2]"), json!(42), json!(["a"])] {
            assert_eq!(custom_headers(Some(&bad)), Err(ValidationError::InvalidHeaders));
        }
    }
}
