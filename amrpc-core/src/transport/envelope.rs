use std::collections::HashMap;

use base64::Engine as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// The metadata + body carried over one framed message.
///
/// Plays the role the original's HTTP/WebSocket-upgrade machinery played:
/// status code, headers (`Content-Type`, `Accept`, `amrpc_check_enabled`,
/// `Sec-WebSocket-Protocol`), and the payload bytes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    /// Set on requests; absent on responses. There is no separate
    /// request/response type since every connection carries exactly one
    /// logical exchange before being closed or upgraded.
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub status: u16,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default, with = "body_as_base64")]
    pub body: Vec<u8>,
}

impl Envelope {
    pub fn request(method: impl Into<String>, body: Vec<u8>) -> Self {
        Envelope {
            method: Some(method.into()),
            status: 0,
            reason: None,
            headers: HashMap::new(),
            body,
        }
    }

    pub fn ok(body: Vec<u8>) -> Self {
        Envelope {
            method: None,
            status: 200,
            reason: None,
            headers: HashMap::new(),
            body,
        }
    }

    pub fn error(status: u16, reason: impl Into<String>) -> Self {
        Envelope {
            method: None,
            status,
            reason: Some(reason.into()),
            headers: HashMap::new(),
            body: Vec::new(),
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

mod body_as_base64 {
    use super::*;

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&base64::engine::general_purpose::STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(d)?;
        base64::engine::general_purpose::STANDARD
            .decode(s.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_json() {
        let env = Envelope::ok(b"hello".to_vec()).with_header("content-type", "text/plain");
        let json = serde_json::to_vec(&env).unwrap();
        let back: Envelope = serde_json::from_slice(&json).unwrap();
        assert_eq!(back.status, 200);
        assert_eq!(back.body, b"hello");
        assert_eq!(back.header("Content-Type"), Some("text/plain"));
    }

    #[test]
    fn error_envelope_has_empty_body() {
        let env = Envelope::error(500, "boom");
        assert_eq!(env.status, 500);
        assert_eq!(env.reason.as_deref(), Some("boom"));
        assert!(env.body.is_empty());
    }
}
