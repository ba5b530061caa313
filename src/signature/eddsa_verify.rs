use ed25519_dalek::{Signature, Verifier, VerifyingKey};

use crate::error::Result;

pub fn verify_ed25519(key: &VerifyingKey, signing_input: &[u8], sig: &[u8]) -> Result<bool> {
    let bytes: [u8; 64] = match sig.try_into() {
        Ok(b) => b,
        Err(_) => return Ok(false),
    };
    let signature = Signature::from_bytes(&bytes);
    Ok(key.verify(signing_input, &signature).is_ok())
}
