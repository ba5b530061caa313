//! Per-algorithm signature verification, dispatched on the JWT's `alg`.

mod ecdsa_verify;
mod eddsa_verify;
mod rsa_verify;

use crate::error::Result;
use crate::jwk::{Alg, NativeKey};

/// Verifies `signature` over `signing_input` with `key`, for the given
/// `alg`. Returns `Ok(false)` when the signature is well-formed but does not
/// match (wrong key or tampered bytes); returns `Err` when the signature or
/// key shape itself is malformed in a way that makes verification
/// impossible (e.g. wrong-length ECDSA signature).
pub fn verify(key: &NativeKey, alg: Alg, signing_input: &[u8], signature: &[u8]) -> Result<bool> {
    match (key, alg) {
        (NativeKey::Rsa(k), Alg::Rs256 | Alg::Rs384 | Alg::Rs512) => {
            rsa_verify::verify_pkcs1v15(k, alg, signing_input, signature)
        }
        (NativeKey::Rsa(k), Alg::Ps256 | Alg::Ps384 | Alg::Ps512) => {
            rsa_verify::verify_pss(k, alg, signing_input, signature)
        }
        (NativeKey::EcP256(k), Alg::Es256) => ecdsa_verify::verify_p256(k, signing_input, signature),
        (NativeKey::EcP384(k), Alg::Es384) => ecdsa_verify::verify_p384(k, signing_input, signature),
        (NativeKey::EcP521(k), Alg::Es512) => ecdsa_verify::verify_p521(k, signing_input, signature),
        (NativeKey::Ed25519(k), Alg::EdDsa) => eddsa_verify::verify_ed25519(k, signing_input, signature),
        (_, other) => Err(crate::error::Error::JwtInvalidSignatureAlgorithm(other.as_str().to_string())),
    }
}
