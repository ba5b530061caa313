//! base64url codec and compact-JWT splitting.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde_json::{Map, Value};

use crate::error::{Error, Result};

pub fn decode_base64_url(segment: &str) -> Result<Vec<u8>> {
    URL_SAFE_NO_PAD
        .decode(segment.trim_end_matches('='))
        .map_err(|e| Error::invalid_jwt(format!("invalid base64url segment: {e}")))
}

pub fn encode_base64_url(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

/// The three decoded segments of a compact JWT, plus the exact bytes that
/// were signed (`header_b64 "." payload_b64`, as ASCII).
pub struct CompactJwt<'a> {
    pub header_b64: &'a str,
    pub payload_b64: &'a str,
    pub signature_b64: &'a str,
    pub signing_input: Vec<u8>,
}

pub fn split_compact_jwt(jwt: &str) -> Result<CompactJwt<'_>> {
    let mut parts = jwt.split('.');
    let header_b64 = parts.next().filter(|s| !s.is_empty());
    let payload_b64 = parts.next().filter(|s| !s.is_empty());
    let signature_b64 = parts.next().filter(|s| !s.is_empty());
    let (header_b64, payload_b64, signature_b64) = match (header_b64, payload_b64, signature_b64) {
        (Some(h), Some(p), Some(s)) => (h, p, s),
        _ => return Err(Error::invalid_jwt("jwt must have exactly three non-empty segments")),
    };
    if parts.next().is_some() {
        return Err(Error::invalid_jwt("jwt must have exactly three segments"));
    }
    let signing_input = format!("{header_b64}.{payload_b64}").into_bytes();
    Ok(CompactJwt { header_b64, payload_b64, signature_b64, signing_input })
}

pub fn parse_json_object(bytes: &[u8]) -> Result<Map<String, Value>> {
    match serde_json::from_slice::<Value>(bytes)? {
        Value::Object(map) => Ok(map),
        _ => Err(Error::invalid_jwt("expected a json object")),
    }
}
