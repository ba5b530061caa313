use rsa::pkcs1v15::{Signature as Pkcs1v15Signature, VerifyingKey as Pkcs1v15VerifyingKey};
use rsa::pss::{Signature as PssSignature, VerifyingKey as PssVerifyingKey};
use rsa::signature::Verifier;
use rsa::RsaPublicKey;
use sha2::{Sha256, Sha384, Sha512};

use crate::error::Result;
use crate::jwk::Alg;

pub fn verify_pkcs1v15(key: &RsaPublicKey, alg: Alg, signing_input: &[u8], sig: &[u8]) -> Result<bool> {
    let signature = match Pkcs1v15Signature::try_from(sig) {
        Ok(s) => s,
        Err(_) => return Ok(false),
    };
    let ok = match alg {
        Alg::Rs256 => Pkcs1v15VerifyingKey::<Sha256>::new(key.clone())
            .verify(signing_input, &signature)
            .is_ok(),
        Alg::Rs384 => Pkcs1v15VerifyingKey::<Sha384>::new(key.clone())
            .verify(signing_input, &signature)
            .is_ok(),
        Alg::Rs512 => Pkcs1v15VerifyingKey::<Sha512>::new(key.clone())
            .verify(signing_input, &signature)
            .is_ok(),
        _ => unreachable!("dispatched only for RS* algs"),
    };
    Ok(ok)
}

pub fn verify_pss(key: &RsaPublicKey, alg: Alg, signing_input: &[u8], sig: &[u8]) -> Result<bool> {
    let signature = match PssSignature::try_from(sig) {
        Ok(s) => s,
        Err(_) => return Ok(false),
    };
    let ok = match alg {
        Alg::Ps256 => PssVerifyingKey::<Sha256>::new(key.clone())
            .verify(signing_input, &signature)
            .is_ok(),
        Alg::Ps384 => PssVerifyingKey::<Sha384>::new(key.clone())
            .verify(signing_input, &signature)
            .is_ok(),
        Alg::Ps512 => PssVerifyingKey::<Sha512>::new(key.clone())
            .verify(signing_input, &signature)
            .is_ok(),
        _ => unreachable!("dispatched only for PS* algs"),
    };
    Ok(ok)
}
