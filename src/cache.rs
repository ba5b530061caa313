//! Per-issuer JWKS cache: pull-based refresh on `kid` miss, FIFO penalty box,
//! at-most-one-fetch-in-flight coalescing.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::Mutex;

use crate::error::{Error, Result};
use crate::fetch::{Fetcher, DEFAULT_RESPONSE_TIMEOUT};
use crate::jwk::{jwk_to_native_key, validate_jwk, Alg, Jwk, NativeKey, RawJwks};

const DEFAULT_PENALTY_BOX_CAPACITY: usize = 10;

type FetchResult = std::result::Result<Arc<Vec<Jwk>>, Arc<Error>>;
type SharedFetch = Shared<BoxFuture<'static, FetchResult>>;

struct CacheEntry {
    jwks: Option<Arc<Vec<Jwk>>>,
    fetched_at: Option<Instant>,
    in_flight: Option<SharedFetch>,
    penalty_box: VecDeque<String>,
}

impl CacheEntry {
    fn new() -> Self {
        Self { jwks: None, fetched_at: None, in_flight: None, penalty_box: VecDeque::new() }
    }

    fn is_penalized(&self, kid: &str) -> bool {
        self.penalty_box.iter().any(|k| k == kid)
    }

    fn clear_penalty(&mut self, kid: &str) {
        self.penalty_box.retain(|k| k != kid);
    }

    fn penalize(&mut self, kid: &str, capacity: usize) {
        if self.is_penalized(kid) {
            return;
        }
        if self.penalty_box.len() >= capacity {
            self.penalty_box.pop_front();
        }
        self.penalty_box.push_back(kid.to_string());
    }
}

/// The JWKS cache shared by a verifier across all of its callers.
pub struct JwksCache {
    entries: DashMap<String, Arc<Mutex<CacheEntry>>>,
    fetcher: Arc<dyn Fetcher>,
    response_timeout: Duration,
    penalty_box_capacity: usize,
}

impl JwksCache {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            entries: DashMap::new(),
            fetcher,
            response_timeout: DEFAULT_RESPONSE_TIMEOUT,
            penalty_box_capacity: DEFAULT_PENALTY_BOX_CAPACITY,
        }
    }

    #[must_use]
    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_penalty_box_capacity(mut self, capacity: usize) -> Self {
        self.penalty_box_capacity = capacity;
        self
    }

    fn entry_for(&self, issuer: &str) -> Arc<Mutex<CacheEntry>> {
        self.entries.entry(issuer.to_string()).or_insert_with(|| Arc::new(Mutex::new(CacheEntry::new()))).clone()
    }

    /// Returns a verification key for `kid` under `issuer`, fetching (or
    /// awaiting an in-flight fetch of) the JWKS at `jwks_uri` if needed.
    pub async fn get_key(
        &self,
        issuer: &str,
        jwks_uri: &str,
        kid: Option<&str>,
        alg: Alg,
    ) -> Result<NativeKey> {
        let entry = self.entry_for(issuer);

        {
            let guard = entry.lock().await;
            if let Some(jwk) = select_key(issuer, &guard.jwks, kid)? {
                return jwk_to_native_key(jwk, alg);
            }
            if let Some(kid) = kid {
                if guard.is_penalized(kid) {
                    return Err(Error::KidNotFoundInJwks {
                        issuer: issuer.to_string(),
                        kid: Some(kid.to_string()),
                    });
                }
            }
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(issuer, kid = ?kid, "jwks key miss, refreshing");

        let jwks = self.refresh(jwks_uri, &entry).await?;

        let mut guard = entry.lock().await;
        match select_key(issuer, &Some(jwks), kid)? {
            Some(jwk) => {
                if let Some(kid) = kid {
                    guard.clear_penalty(kid);
                }
                jwk_to_native_key(jwk, alg)
            }
            None => {
                if let Some(kid) = kid {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(issuer, kid, "kid not found after refresh, penalizing");
                    guard.penalize(kid, self.penalty_box_capacity);
                }
                Err(Error::KidNotFoundInJwks { issuer: issuer.to_string(), kid: kid.map(str::to_string) })
            }
        }
    }

    /// Fetches (or joins an in-flight fetch of) the JWKS for `jwks_uri`,
    /// ensuring at most one network request is outstanding per issuer at a
    /// time. The mutex is never held across the `.await` on the network
    /// call itself, only across the state transitions around it.
    async fn refresh(&self, jwks_uri: &str, entry: &Arc<Mutex<CacheEntry>>) -> Result<Arc<Vec<Jwk>>> {
        let shared: SharedFetch = {
            let mut guard = entry.lock().await;
            if let Some(existing) = &guard.in_flight {
                existing.clone()
            } else {
                let fetcher = self.fetcher.clone();
                let uri = jwks_uri.to_string();
                let timeout = self.response_timeout;
                let fut: BoxFuture<'static, FetchResult> = async move {
                    let bytes = fetcher.fetch(&uri, timeout).await.map_err(Arc::new)?;
                    let raw: RawJwks = serde_json::from_slice(&bytes).map_err(|e| Arc::new(Error::from(e)))?;
                    let keys: Vec<Jwk> =
                        raw.keys.iter().map(validate_jwk).collect::<Result<_>>().map_err(Arc::new)?;
                    Ok(Arc::new(keys))
                }
                .boxed();
                let shared = fut.shared();
                guard.in_flight = Some(shared.clone());
                shared
            }
        };

        let result = shared.await;

        {
            let mut guard = entry.lock().await;
            guard.in_flight = None;
            if let Ok(keys) = &result {
                guard.jwks = Some(keys.clone());
                guard.fetched_at = Some(Instant::now());
            }
        }

        result.map_err(|arc_err| rehydrate_error(&arc_err))
    }
}

fn select_key<'a>(issuer: &str, jwks: &'a Option<Arc<Vec<Jwk>>>, kid: Option<&str>) -> Result<Option<&'a Jwk>> {
    let Some(keys) = jwks else { return Ok(None) };
    match kid {
        Some(kid) => {
            let mut matches = keys.iter().filter(|k| k.kid() == Some(kid));
            let first = matches.next();
            if matches.next().is_some() {
                return Err(Error::JwksMultipleKeysFound {
                    issuer: issuer.to_string(),
                    kid: Some(kid.to_string()),
                });
            }
            Ok(first)
        }
        // No kid in the header: a single-key JWKS is unambiguous; more than
        // one key means we cannot tell which one signed the token.
        None => match keys.len() {
            0 => Ok(None),
            1 => Ok(Some(&keys[0])),
            _ => Err(Error::JwksMultipleKeysFound { issuer: issuer.to_string(), kid: None }),
        },
    }
}

/// `Error` is not `Clone` (it wraps non-`Clone` upstream error types), so a
/// `Shared` future's error is carried as `Arc<Error>`. This turns that back
/// into an owned `Error` for each awaiter, preserving the retryability-
/// relevant distinctions and falling back to a message-only variant for the
/// rest.
fn rehydrate_error(e: &Error) -> Error {
    match e {
        Error::FetchError(s) => Error::FetchError(s.clone()),
        Error::NonRetryableFetchError(s) => Error::NonRetryableFetchError(s.clone()),
        Error::JwkInvalid(s) => Error::JwkInvalid(s.clone()),
        other => Error::JwksValidationError(other.to_string()),
    }
}
