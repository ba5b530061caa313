//! ECDSA verification over JOSE's raw `r‖s` signature encoding (not DER).

use p256::ecdsa::signature::Verifier;

use crate::error::Result;

pub fn verify_p256(key: &p256::ecdsa::VerifyingKey, signing_input: &[u8], sig: &[u8]) -> Result<bool> {
    let signature = match p256::ecdsa::Signature::from_slice(sig) {
        Ok(s) => s,
        Err(_) => return Ok(false),
    };
    Ok(key.verify(signing_input, &signature).is_ok())
}

pub fn verify_p384(key: &p384::ecdsa::VerifyingKey, signing_input: &[u8], sig: &[u8]) -> Result<bool> {
    let signature = match p384::ecdsa::Signature::from_slice(sig) {
        Ok(s) => s,
        Err(_) => return Ok(false),
    };
    Ok(key.verify(signing_input, &signature).is_ok())
}

pub fn verify_p521(key: &p521::ecdsa::VerifyingKey, signing_input: &[u8], sig: &[u8]) -> Result<bool> {
    let signature = match p521::ecdsa::Signature::from_slice(sig) {
        Ok(s) => s,
        Err(_) => return Ok(false),
    };
    Ok(key.verify(signing_input, &signature).is_ok())
}
