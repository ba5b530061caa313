//! Verification of JWTs issued by an OIDC/OAuth2 identity provider against a
//! cached JWKS.
//!
//! The pipeline is: split the compact JWT, resolve the signing key (from a
//! caller-supplied JWKS via [`verifier::Verifier::verify_sync`], or from the
//! shared [`cache::JwksCache`] via [`verifier::Verifier::verify`]), verify the
//! signature, then assert claims in a fixed order (issuer, audience,
//! expiration, not-before, issuer specialization, scope, custom check).

#![forbid(unsafe_code)]

pub mod cache;
pub mod claims;
pub mod codec;
pub mod cognito;
pub mod error;
pub mod fetch;
pub mod jwk;
pub mod signature;
pub mod verifier;

pub use cache::JwksCache;
pub use claims::{ClaimPolicy, SpecializationCheck};
pub use error::{Error, Result};
pub use fetch::Fetcher;
#[cfg(feature = "fetch-reqwest")]
pub use fetch::ReqwestFetcher;
pub use jwk::{Alg, Jwk, NativeKey, RawJwk, RawJwks};
pub use verifier::{Verifier, VerifierConfig};
