//! The verifier facade: a synchronous, no-I/O surface for callers who already
//! hold a JWKS, and an asynchronous surface that consults the shared cache.

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::cache::JwksCache;
use crate::claims::{assert_claims, ClaimPolicy, SpecializationCheck};
use crate::codec::{decode_base64_url, parse_json_object, split_compact_jwt};
use crate::error::{Error, Result};
use crate::jwk::{jwk_to_native_key, validate_jwk, Alg, Jwk, RawJwk};
use crate::signature;

/// Per-issuer verifier configuration.
#[derive(Clone)]
pub struct VerifierConfig {
    pub issuer: String,
    pub jwks_uri: String,
    pub policy: ClaimPolicy,
}

impl VerifierConfig {
    pub fn new(issuer: impl Into<String>, jwks_uri: impl Into<String>) -> Self {
        Self { issuer: issuer.into(), jwks_uri: jwks_uri.into(), policy: ClaimPolicy::default() }
    }

    #[must_use]
    pub fn with_audience(mut self, audience: Vec<String>) -> Self {
        self.policy.audience = Some(audience);
        self
    }

    #[must_use]
    pub fn with_grace_seconds(mut self, grace: i64) -> Self {
        self.policy.grace_seconds = grace;
        self
    }

    #[must_use]
    pub fn with_scope(mut self, scope: Vec<String>) -> Self {
        self.policy.scope = Some(scope);
        self
    }
}

/// A decoded, not-yet-verified JWT header/payload pair, plus the bytes
/// needed to verify its signature.
struct Decoded {
    alg: Alg,
    kid: Option<String>,
    payload: Map<String, Value>,
    signing_input: Vec<u8>,
    signature: Vec<u8>,
}

fn decode(jwt: &str) -> Result<Decoded> {
    let parts = split_compact_jwt(jwt)?;
    let header = parse_json_object(&decode_base64_url(parts.header_b64)?)?;
    let payload = parse_json_object(&decode_base64_url(parts.payload_b64)?)?;
    let signature = decode_base64_url(parts.signature_b64)?;

    let alg_str = header
        .get("alg")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::JwtInvalidSignatureAlgorithm("<missing>".to_string()))?;
    let alg = Alg::parse(alg_str)?;
    let kid = header.get("kid").and_then(Value::as_str).map(str::to_owned);

    Ok(Decoded { alg, kid, payload, signing_input: parts.signing_input, signature })
}

/// Verifies a decoded JWT's signature against a single caller-supplied slice
/// of already-validated JWKs (no key resolution, no cache).
fn select_from_slice<'a>(jwks: &'a [Jwk], kid: Option<&str>) -> Result<&'a Jwk> {
    match kid {
        Some(kid) => {
            let mut matches = jwks.iter().filter(|k| k.kid() == Some(kid));
            let first = matches.next().ok_or_else(|| Error::KidNotFoundInJwks {
                issuer: String::new(),
                kid: Some(kid.to_string()),
            })?;
            if matches.next().is_some() {
                return Err(Error::JwksMultipleKeysFound { issuer: String::new(), kid: Some(kid.to_string()) });
            }
            Ok(first)
        }
        None => match jwks.len() {
            0 => Err(Error::KidNotFoundInJwks { issuer: String::new(), kid: None }),
            1 => Ok(&jwks[0]),
            _ => Err(Error::JwksMultipleKeysFound { issuer: String::new(), kid: None }),
        },
    }
}

pub struct Verifier {
    config: VerifierConfig,
    cache: Arc<JwksCache>,
    specialization: Option<Arc<dyn SpecializationCheck>>,
}

impl Verifier {
    pub fn new(config: VerifierConfig, cache: Arc<JwksCache>) -> Self {
        Self { config, cache, specialization: None }
    }

    #[must_use]
    pub fn with_specialization(mut self, specialization: Arc<dyn SpecializationCheck>) -> Self {
        self.specialization = Some(specialization);
        self
    }

    /// Verifies `jwt` against a JWKS the caller already holds. Performs no
    /// I/O and never touches the shared cache; a `kid` absent from `jwks`
    /// fails immediately rather than triggering a fetch.
    pub fn verify_sync(&self, jwt: &str, jwks: &[RawJwk]) -> Result<Map<String, Value>> {
        let decoded = decode(jwt)?;
        let validated: Vec<Jwk> = jwks.iter().map(validate_jwk).collect::<Result<_>>()?;
        let jwk = select_from_slice(&validated, decoded.kid.as_deref())?;
        let key = jwk_to_native_key(jwk, decoded.alg)?;
        self.verify_signature_and_claims(decoded, &key)
    }

    /// Verifies `jwt`, consulting the shared JWKS cache (and triggering a
    /// fetch) if the key is not already resident.
    pub async fn verify(&self, jwt: &str) -> Result<Map<String, Value>> {
        let decoded = decode(jwt)?;
        let key = self
            .cache
            .get_key(&self.config.issuer, &self.config.jwks_uri, decoded.kid.as_deref(), decoded.alg)
            .await?;
        self.verify_signature_and_claims(decoded, &key)
    }

    fn verify_signature_and_claims(
        &self,
        decoded: Decoded,
        key: &crate::jwk::NativeKey,
    ) -> Result<Map<String, Value>> {
        let ok = signature::verify(key, decoded.alg, &decoded.signing_input, &decoded.signature)?;
        if !ok {
            return Err(Error::InvalidSignature);
        }
        let now = now_seconds();
        assert_claims(&decoded.payload, &self.config.policy, self.specialization.as_deref(), now)?;
        Ok(decoded.payload)
    }
}

fn now_seconds() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("system clock is before the unix epoch")
        .as_secs() as i64
}
