//! Issuer specialization for a hosted user-directory-style OIDC provider.
//!
//! Adds the `token_use` / `client_id` distinction between ID and access
//! tokens on top of the generic verifier; composes over
//! [`crate::verifier::Verifier`] without adding new pipeline stages.

use serde_json::{Map, Value};

use crate::claims::SpecializationCheck;
use crate::error::{Error, Result};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TokenKind {
    Id,
    Access,
}

pub struct UserDirectorySpecialization {
    pub kind: TokenKind,
    pub client_ids: Vec<String>,
    pub required_groups: Option<Vec<String>>,
}

impl SpecializationCheck for UserDirectorySpecialization {
    fn check(&self, payload: &Map<String, Value>) -> Result<()> {
        let token_use = payload.get("token_use").and_then(Value::as_str);
        let expected_use = match self.kind {
            TokenKind::Id => "id",
            TokenKind::Access => "access",
        };
        if token_use != Some(expected_use) {
            return Err(Error::JwtCustomCheckFailed(format!(
                "expected token_use {expected_use:?}, got {token_use:?}"
            )));
        }

        match self.kind {
            TokenKind::Id => {
                let aud = payload.get("aud").and_then(Value::as_str);
                if !aud.is_some_and(|aud| self.client_ids.iter().any(|c| c == aud)) {
                    return Err(Error::JwtCustomCheckFailed(format!(
                        "id token aud {aud:?} not in configured client ids {:?}",
                        self.client_ids
                    )));
                }
            }
            TokenKind::Access => {
                let client_id = payload.get("client_id").and_then(Value::as_str);
                if !client_id.is_some_and(|c| self.client_ids.iter().any(|configured| configured == c)) {
                    return Err(Error::JwtCustomCheckFailed(format!(
                        "access token client_id {client_id:?} not in configured client ids {:?}",
                        self.client_ids
                    )));
                }
            }
        }

        if let Some(required_groups) = &self.required_groups {
            let actual_groups: Vec<&str> = payload
                .get("cognito:groups")
                .and_then(Value::as_array)
                .map(|groups| groups.iter().filter_map(Value::as_str).collect())
                .unwrap_or_default();
            if !required_groups.iter().any(|g| actual_groups.contains(&g.as_str())) {
                return Err(Error::JwtCustomCheckFailed(format!(
                    "groups {actual_groups:?} do not intersect required groups {required_groups:?}"
                )));
            }
        }

        Ok(())
    }
}
