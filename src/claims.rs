//! Fixed-order claim assertion: iss -> aud -> exp -> nbf -> specialization ->
//! scope -> custom. Order is part of the contract: callers can rely on which
//! error surfaces when more than one assertion would fail.

use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Claim-level policy evaluated after signature verification succeeds.
#[derive(Clone, Default)]
pub struct ClaimPolicy {
    pub issuer: Option<Vec<String>>,
    pub audience: Option<Vec<String>>,
    pub grace_seconds: i64,
    pub scope: Option<Vec<String>>,
    /// Opaque check run last; receives the decoded payload.
    pub custom_check: Option<std::sync::Arc<dyn Fn(&Map<String, Value>) -> Result<()> + Send + Sync>>,
}

/// A hook for issuer specializations (e.g. token_use / client_id checks) run
/// between nbf and scope, per spec §4.4. The generic pipeline has none by
/// default.
pub trait SpecializationCheck: Send + Sync {
    fn check(&self, payload: &Map<String, Value>) -> Result<()>;
}

pub fn assert_claims(
    payload: &Map<String, Value>,
    policy: &ClaimPolicy,
    specialization: Option<&dyn SpecializationCheck>,
    now: i64,
) -> Result<()> {
    assert_issuer(payload, policy)?;
    assert_audience(payload, policy)?;
    assert_expiry(payload, policy, now)?;
    assert_not_before(payload, policy, now)?;
    if let Some(specialization) = specialization {
        specialization.check(payload)?;
    }
    assert_scope(payload, policy)?;
    if let Some(custom) = &policy.custom_check {
        custom(payload)?;
    }
    Ok(())
}

fn assert_issuer(payload: &Map<String, Value>, policy: &ClaimPolicy) -> Result<()> {
    let Some(allowed) = &policy.issuer else { return Ok(()) };
    let actual = payload.get("iss").and_then(Value::as_str).map(str::to_owned);
    match &actual {
        Some(iss) if allowed.iter().any(|a| a == iss) => Ok(()),
        _ => Err(Error::JwtIssuerNotAllowed { actual, allowed: allowed.clone() }),
    }
}

fn assert_audience(payload: &Map<String, Value>, policy: &ClaimPolicy) -> Result<()> {
    let Some(allowed) = &policy.audience else { return Ok(()) };
    let actual = audience_values(payload);
    if actual.iter().any(|a| allowed.contains(a)) {
        Ok(())
    } else {
        Err(Error::JwtAudienceNotAllowed { actual, allowed: allowed.clone() })
    }
}

fn audience_values(payload: &Map<String, Value>) -> Vec<String> {
    match payload.get("aud") {
        Some(Value::String(s)) => vec![s.clone()],
        Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).map(str::to_owned).collect(),
        _ => Vec::new(),
    }
}

fn assert_expiry(payload: &Map<String, Value>, policy: &ClaimPolicy, now: i64) -> Result<()> {
    let Some(exp) = payload.get("exp").and_then(Value::as_i64) else { return Ok(()) };
    if now > exp + policy.grace_seconds {
        return Err(Error::JwtExpired { exp, now, grace: policy.grace_seconds });
    }
    Ok(())
}

fn assert_not_before(payload: &Map<String, Value>, policy: &ClaimPolicy, now: i64) -> Result<()> {
    let Some(nbf) = payload.get("nbf").and_then(Value::as_i64) else { return Ok(()) };
    if now < nbf - policy.grace_seconds {
        return Err(Error::JwtNotBefore { nbf, now, grace: policy.grace_seconds });
    }
    Ok(())
}

fn assert_scope(payload: &Map<String, Value>, policy: &ClaimPolicy) -> Result<()> {
    let Some(required) = &policy.scope else { return Ok(()) };
    let actual = payload.get("scope").and_then(Value::as_str).map(str::to_owned);
    let granted: Vec<&str> = actual.as_deref().map(|s| s.split(' ').collect()).unwrap_or_default();
    if required.iter().any(|r| granted.contains(&r.as_str())) {
        Ok(())
    } else {
        Err(Error::JwtScopeNotAllowed { actual, required: required.clone() })
    }
}
