//! JWK validation and conversion into native verification keys.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use rsa::BigUint;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// The signature algorithm named in a JWT header's `alg` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Alg {
    Rs256,
    Rs384,
    Rs512,
    Ps256,
    Ps384,
    Ps512,
    Es256,
    Es384,
    Es512,
    EdDsa,
}

impl Alg {
    pub fn parse(s: &str) -> Result<Self> {
        Ok(match s {
            "RS256" => Alg::Rs256,
            "RS384" => Alg::Rs384,
            "RS512" => Alg::Rs512,
            "PS256" => Alg::Ps256,
            "PS384" => Alg::Ps384,
            "PS512" => Alg::Ps512,
            "ES256" => Alg::Es256,
            "ES384" => Alg::Es384,
            "ES512" => Alg::Es512,
            "EdDSA" => Alg::EdDsa,
            other => return Err(Error::JwtInvalidSignatureAlgorithm(other.to_string())),
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Alg::Rs256 => "RS256",
            Alg::Rs384 => "RS384",
            Alg::Rs512 => "RS512",
            Alg::Ps256 => "PS256",
            Alg::Ps384 => "PS384",
            Alg::Ps512 => "PS512",
            Alg::Es256 => "ES256",
            Alg::Es384 => "ES384",
            Alg::Es512 => "ES512",
            Alg::EdDsa => "EdDSA",
        }
    }
}

/// A raw JWK as received over the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawJwk {
    pub kty: String,
    pub kid: Option<String>,
    #[serde(rename = "use")]
    pub use_: Option<String>,
    pub alg: Option<String>,
    pub crv: Option<String>,
    pub n: Option<String>,
    pub e: Option<String>,
    pub x: Option<String>,
    pub y: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawJwks {
    pub keys: Vec<RawJwk>,
}

/// A validated key, closed over the three key types the wire format allows.
#[derive(Debug, Clone)]
pub enum Jwk {
    Rsa { kid: Option<String>, alg: Option<Alg>, n: Vec<u8>, e: Vec<u8> },
    Ec { kid: Option<String>, alg: Option<Alg>, crv: EcCurve, x: Vec<u8>, y: Vec<u8> },
    Okp { kid: Option<String>, alg: Option<Alg>, crv: OkpCurve, x: Vec<u8> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EcCurve {
    P256,
    P384,
    P521,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OkpCurve {
    Ed25519,
    Ed448,
}

impl Jwk {
    pub fn kid(&self) -> Option<&str> {
        match self {
            Jwk::Rsa { kid, .. } | Jwk::Ec { kid, .. } | Jwk::Okp { kid, .. } => kid.as_deref(),
        }
    }

    pub fn alg(&self) -> Option<Alg> {
        match self {
            Jwk::Rsa { alg, .. } | Jwk::Ec { alg, .. } | Jwk::Okp { alg, .. } => *alg,
        }
    }
}

pub fn validate_jwk(raw: &RawJwk) -> Result<Jwk> {
    if let Some(use_) = &raw.use_ {
        if use_ != "sig" {
            return Err(Error::JwkInvalid(format!("unsupported key use: {use_}")));
        }
    }
    let alg = raw.alg.as_deref().map(Alg::parse).transpose()?;

    match raw.kty.as_str() {
        "RSA" => {
            let n = decode_field(raw.n.as_deref(), "n")?;
            let e = decode_field(raw.e.as_deref(), "e")?;
            Ok(Jwk::Rsa { kid: raw.kid.clone(), alg, n, e })
        }
        "EC" => {
            let crv = match raw.crv.as_deref() {
                Some("P-256") => EcCurve::P256,
                Some("P-384") => EcCurve::P384,
                Some("P-521") => EcCurve::P521,
                Some(other) => return Err(Error::JwkInvalid(format!("unsupported EC curve: {other}"))),
                None => return Err(Error::JwkInvalid("EC key missing crv".into())),
            };
            let x = decode_field(raw.x.as_deref(), "x")?;
            let y = decode_field(raw.y.as_deref(), "y")?;
            Ok(Jwk::Ec { kid: raw.kid.clone(), alg, crv, x, y })
        }
        "OKP" => {
            let crv = match raw.crv.as_deref() {
                Some("Ed25519") => OkpCurve::Ed25519,
                Some("Ed448") => OkpCurve::Ed448,
                Some(other) => return Err(Error::JwkInvalid(format!("unsupported OKP curve: {other}"))),
                None => return Err(Error::JwkInvalid("OKP key missing crv".into())),
            };
            let x = decode_field(raw.x.as_deref(), "x")?;
            Ok(Jwk::Okp { kid: raw.kid.clone(), alg, crv, x })
        }
        other => Err(Error::JwkInvalid(format!("unsupported kty: {other}"))),
    }
}

fn decode_field(field: Option<&str>, name: &str) -> Result<Vec<u8>> {
    let field = field.ok_or_else(|| Error::JwkInvalid(format!("missing field {name}")))?;
    URL_SAFE_NO_PAD
        .decode(field.trim_end_matches('='))
        .map_err(|e| Error::JwkInvalid(format!("invalid base64url in field {name}: {e}")))
}

/// A key ready to verify signatures, materialized from a `Jwk`.
pub enum NativeKey {
    Rsa(rsa::RsaPublicKey),
    EcP256(p256::ecdsa::VerifyingKey),
    EcP384(p384::ecdsa::VerifyingKey),
    EcP521(p521::ecdsa::VerifyingKey),
    Ed25519(ed25519_dalek::VerifyingKey),
}

/// Converts a validated JWK into a native key, given the effective algorithm
/// taken from the JWT header (used when the JWK itself carries no `alg`).
pub fn jwk_to_native_key(jwk: &Jwk, alg_hint: Alg) -> Result<NativeKey> {
    let effective_alg = jwk.alg().unwrap_or(alg_hint);
    match jwk {
        Jwk::Rsa { n, e, .. } => {
            if !matches!(
                effective_alg,
                Alg::Rs256 | Alg::Rs384 | Alg::Rs512 | Alg::Ps256 | Alg::Ps384 | Alg::Ps512
            ) {
                return Err(Error::JwtInvalidSignatureAlgorithm(effective_alg.as_str().to_string()));
            }
            let n = BigUint::from_bytes_be(n);
            let e = BigUint::from_bytes_be(e);
            let key = rsa::RsaPublicKey::new(n, e)
                .map_err(|e| Error::JwkInvalid(format!("invalid RSA key material: {e}")))?;
            Ok(NativeKey::Rsa(key))
        }
        Jwk::Ec { crv, x, y, .. } => {
            if !matches!(effective_alg, Alg::Es256 | Alg::Es384 | Alg::Es512) {
                return Err(Error::JwtInvalidSignatureAlgorithm(effective_alg.as_str().to_string()));
            }
            match crv {
                EcCurve::P256 => {
                    let point = sec1_uncompressed_point::<32>(x, y)?;
                    let key = p256::ecdsa::VerifyingKey::from_sec1_bytes(&point)
                        .map_err(|e| Error::JwkInvalid(format!("invalid P-256 key: {e}")))?;
                    Ok(NativeKey::EcP256(key))
                }
                EcCurve::P384 => {
                    let point = sec1_uncompressed_point::<48>(x, y)?;
                    let key = p384::ecdsa::VerifyingKey::from_sec1_bytes(&point)
                        .map_err(|e| Error::JwkInvalid(format!("invalid P-384 key: {e}")))?;
                    Ok(NativeKey::EcP384(key))
                }
                EcCurve::P521 => {
                    let point = sec1_uncompressed_point::<66>(x, y)?;
                    let key = p521::ecdsa::VerifyingKey::from_sec1_bytes(&point)
                        .map_err(|e| Error::JwkInvalid(format!("invalid P-521 key: {e}")))?;
                    Ok(NativeKey::EcP521(key))
                }
            }
        }
        Jwk::Okp { crv, x, .. } => {
            if effective_alg != Alg::EdDsa {
                return Err(Error::JwtInvalidSignatureAlgorithm(effective_alg.as_str().to_string()));
            }
            match crv {
                OkpCurve::Ed25519 => {
                    let bytes: [u8; 32] = x
                        .as_slice()
                        .try_into()
                        .map_err(|_| Error::JwkInvalid("Ed25519 x must be 32 bytes".into()))?;
                    let key = ed25519_dalek::VerifyingKey::from_bytes(&bytes)
                        .map_err(|e| Error::JwkInvalid(format!("invalid Ed25519 key: {e}")))?;
                    Ok(NativeKey::Ed25519(key))
                }
                OkpCurve::Ed448 => Err(Error::NotSupported("Ed448 is not supported".into())),
            }
        }
    }
}

/// Builds an uncompressed SEC1 point (`0x04 || x || y`), left-padding each
/// coordinate to `N` bytes as JWK big-endian encodings may be shorter.
fn sec1_uncompressed_point<const N: usize>(x: &[u8], y: &[u8]) -> Result<Vec<u8>> {
    if x.len() > N || y.len() > N {
        return Err(Error::JwkInvalid("EC coordinate longer than curve field size".into()));
    }
    let mut point = Vec::with_capacity(1 + 2 * N);
    point.push(0x04);
    point.extend(std::iter::repeat(0u8).take(N - x.len()));
    point.extend_from_slice(x);
    point.extend(std::iter::repeat(0u8).take(N - y.len()));
    point.extend_from_slice(y);
    Ok(point)
}
