use std::fmt;

/// Every failure mode the verification pipeline can surface.
///
/// Variants are grouped the way they are checked: parsing, key resolution,
/// crypto, claims, transport. `retryable` tells a caller whether reattempting
/// the same call (without changing the token or policy) could plausibly
/// succeed.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    // --- parsing ---
    #[error("invalid jwt: {0}")]
    InvalidJwt(String),

    #[error("invalid jwk: {0}")]
    JwkInvalid(String),

    #[error("jwks failed validation: {0}")]
    JwksValidationError(String),

    // --- key resolution ---
    #[error("no key with kid {kid:?} found in jwks for issuer {issuer}")]
    KidNotFoundInJwks { issuer: String, kid: Option<String> },

    #[error("jwks for issuer {issuer} contains multiple matching keys for kid {kid:?}")]
    JwksMultipleKeysFound { issuer: String, kid: Option<String> },

    // --- crypto ---
    #[error("unsupported or missing signature algorithm: {0:?}")]
    JwtInvalidSignatureAlgorithm(String),

    #[error("signature verification failed")]
    InvalidSignature,

    #[error("not supported: {0}")]
    NotSupported(String),

    // --- claims ---
    #[error("token expired at {exp}, now is {now} (grace {grace}s)")]
    JwtExpired { exp: i64, now: i64, grace: i64 },

    #[error("token not valid until {nbf}, now is {now} (grace {grace}s)")]
    JwtNotBefore { nbf: i64, now: i64, grace: i64 },

    #[error("issuer {actual:?} is not in the allowed set {allowed:?}")]
    JwtIssuerNotAllowed { actual: Option<String>, allowed: Vec<String> },

    #[error("audience {actual:?} does not intersect the allowed set {allowed:?}")]
    JwtAudienceNotAllowed { actual: Vec<String>, allowed: Vec<String> },

    #[error("scope {actual:?} does not contain any of the required scopes {required:?}")]
    JwtScopeNotAllowed { actual: Option<String>, required: Vec<String> },

    #[error("custom claim check failed: {0}")]
    JwtCustomCheckFailed(String),

    // --- transport ---
    #[error("fetching jwks failed: {0}")]
    FetchError(String),

    #[error("fetching jwks failed with a non-retryable response: {0}")]
    NonRetryableFetchError(String),

    #[cfg(feature = "fetch-reqwest")]
    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Whether reattempting the same call might succeed without the caller
    /// changing anything. Used by embedding services to decide whether to
    /// retry a verification call versus surface the failure immediately.
    #[must_use]
    pub fn retryable(&self) -> bool {
        matches!(self, Error::FetchError(_))
    }

    pub(crate) fn invalid_jwt(msg: impl fmt::Display) -> Self {
        Error::InvalidJwt(msg.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
