use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use jwks_verifier::{Error, Fetcher, JwksCache, RawJwk, ReqwestFetcher, Verifier, VerifierConfig};
use rand::rngs::OsRng;
use rsa::pkcs1v15::SigningKey;
use rsa::signature::{SignatureEncoding, Signer};
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde_json::{json, Value};
use sha2::Sha256;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn now() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs() as i64
}

fn b64(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

fn encode_segment(value: &Value) -> String {
    b64(&serde_json::to_vec(value).unwrap())
}

struct RsaTestKey {
    private: RsaPrivateKey,
    jwk: RawJwk,
}

fn generate_rsa_key(kid: &str) -> RsaTestKey {
    let mut rng = OsRng;
    let private = RsaPrivateKey::new(&mut rng, 2048).expect("rsa keygen");
    let public: RsaPublicKey = private.to_public_key();
    let jwk = RawJwk {
        kty: "RSA".into(),
        kid: Some(kid.into()),
        use_: Some("sig".into()),
        alg: Some("RS256".into()),
        crv: None,
        n: Some(b64(&public.n().to_bytes_be())),
        e: Some(b64(&public.e().to_bytes_be())),
        x: None,
        y: None,
    };
    RsaTestKey { private, jwk }
}

fn sign_rs256(private: &RsaPrivateKey, header: &Value, payload: &Value) -> String {
    let signing_input = format!("{}.{}", encode_segment(header), encode_segment(payload));
    let signing_key = SigningKey::<Sha256>::new(private.clone());
    let signature = signing_key.sign(signing_input.as_bytes());
    format!("{signing_input}.{}", b64(&signature.to_vec()))
}

fn rs256_header(kid: &str) -> Value {
    json!({ "alg": "RS256", "kid": kid })
}

#[test]
fn happy_path_rs256() {
    let key = generate_rsa_key("k1");
    let payload = json!({ "iss": "https://issuer.example/", "aud": "my-app", "exp": now() + 100 });
    let jwt = sign_rs256(&key.private, &rs256_header("k1"), &payload);

    let cache = Arc::new(JwksCache::new(Arc::new(NullFetcher)));
    let config = VerifierConfig::new("https://issuer.example/", "https://issuer.example/jwks.json")
        .with_audience(vec!["my-app".into()]);
    let verifier = Verifier::new(config, cache);

    let claims = verifier.verify_sync(&jwt, std::slice::from_ref(&key.jwk)).expect("verification should succeed");
    assert_eq!(claims.get("aud").and_then(Value::as_str), Some("my-app"));
}

#[test]
fn expired_token_is_rejected() {
    let key = generate_rsa_key("k1");
    let payload = json!({ "iss": "https://issuer.example/", "aud": "my-app", "exp": now() - 1 });
    let jwt = sign_rs256(&key.private, &rs256_header("k1"), &payload);

    let cache = Arc::new(JwksCache::new(Arc::new(NullFetcher)));
    let config = VerifierConfig::new("https://issuer.example/", "https://issuer.example/jwks.json")
        .with_audience(vec!["my-app".into()]);
    let verifier = Verifier::new(config, cache);

    let err = verifier.verify_sync(&jwt, std::slice::from_ref(&key.jwk)).unwrap_err();
    assert!(matches!(err, Error::JwtExpired { .. }), "expected JwtExpired, got {err:?}");
}

#[test]
fn wrong_audience_is_rejected() {
    let key = generate_rsa_key("k1");
    let payload = json!({ "iss": "https://issuer.example/", "aud": "other-app", "exp": now() + 100 });
    let jwt = sign_rs256(&key.private, &rs256_header("k1"), &payload);

    let cache = Arc::new(JwksCache::new(Arc::new(NullFetcher)));
    let config = VerifierConfig::new("https://issuer.example/", "https://issuer.example/jwks.json")
        .with_audience(vec!["my-app".into()]);
    let verifier = Verifier::new(config, cache);

    let err = verifier.verify_sync(&jwt, std::slice::from_ref(&key.jwk)).unwrap_err();
    assert!(matches!(err, Error::JwtAudienceNotAllowed { .. }), "expected JwtAudienceNotAllowed, got {err:?}");
}

#[test]
fn tampered_signature_is_rejected() {
    let key = generate_rsa_key("k1");
    let payload = json!({ "iss": "https://issuer.example/", "aud": "my-app", "exp": now() + 100 });
    let jwt = sign_rs256(&key.private, &rs256_header("k1"), &payload);
    let mut chars: Vec<char> = jwt.chars().collect();
    let last = chars.len() - 1;
    chars[last] = if chars[last] == 'A' { 'B' } else { 'A' };
    let jwt: String = chars.into_iter().collect();

    let cache = Arc::new(JwksCache::new(Arc::new(NullFetcher)));
    let config = VerifierConfig::new("https://issuer.example/", "https://issuer.example/jwks.json")
        .with_audience(vec!["my-app".into()]);
    let verifier = Verifier::new(config, cache);

    let err = verifier.verify_sync(&jwt, std::slice::from_ref(&key.jwk)).unwrap_err();
    assert!(
        matches!(err, Error::InvalidSignature | Error::InvalidJwt(_)),
        "expected InvalidSignature, got {err:?}"
    );
}

/// `verify_sync` never performs I/O; a fetcher that panics if ever invoked
/// proves that the sync path doesn't secretly touch the cache.
struct NullFetcher;

#[async_trait]
impl Fetcher for NullFetcher {
    async fn fetch(&self, _uri: &str, _timeout: Duration) -> jwks_verifier::Result<Vec<u8>> {
        panic!("verify_sync must not perform I/O");
    }
}

struct CountingFetcher {
    inner: ReqwestFetcher,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl Fetcher for CountingFetcher {
    async fn fetch(&self, uri: &str, timeout: Duration) -> jwks_verifier::Result<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.fetch(uri, timeout).await
    }
}

#[tokio::test]
async fn unknown_kid_is_penalized_and_not_refetched() {
    let server = MockServer::start().await;
    let published = generate_rsa_key("known-kid");
    Mock::given(method("GET"))
        .and(path("/jwks.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "keys": [published.jwk] })))
        .expect(1)
        .mount(&server)
        .await;

    let calls = Arc::new(AtomicUsize::new(0));
    let fetcher = Arc::new(CountingFetcher { inner: ReqwestFetcher::new(), calls: calls.clone() });
    let cache = Arc::new(JwksCache::new(fetcher));
    let config = VerifierConfig::new("https://issuer.example/", format!("{}/jwks.json", server.uri()));
    let verifier = Verifier::new(config, cache);

    let unknown = generate_rsa_key("unknown-kid");
    let payload = json!({ "exp": now() + 100 });
    let jwt = sign_rs256(&unknown.private, &rs256_header("unknown-kid"), &payload);

    let first = verifier.verify(&jwt).await.unwrap_err();
    assert!(matches!(first, Error::KidNotFoundInJwks { .. }));
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let second = verifier.verify(&jwt).await.unwrap_err();
    assert!(matches!(second, Error::KidNotFoundInJwks { .. }));
    assert_eq!(calls.load(Ordering::SeqCst), 1, "penalty box must suppress the second refetch");
}

#[test]
fn es512_uses_p521_not_p512() {
    use p521::ecdsa::signature::Signer as EcSigner;
    use p521::ecdsa::{Signature, SigningKey};

    let signing_key = SigningKey::random(&mut OsRng);
    let verifying_key = signing_key.verifying_key();
    let point = verifying_key.to_encoded_point(false);
    let jwk = RawJwk {
        kty: "EC".into(),
        kid: Some("es512-k1".into()),
        use_: Some("sig".into()),
        alg: Some("ES512".into()),
        crv: Some("P-521".into()),
        n: None,
        e: None,
        x: Some(b64(point.x().expect("uncompressed point has x"))),
        y: Some(b64(point.y().expect("uncompressed point has y"))),
    };

    let header = json!({ "alg": "ES512", "kid": "es512-k1" });
    let payload = json!({ "iss": "https://issuer.example/", "aud": "my-app", "exp": now() + 100 });
    let signing_input = format!("{}.{}", encode_segment(&header), encode_segment(&payload));
    let signature: Signature = signing_key.sign(signing_input.as_bytes());
    let jwt = format!("{signing_input}.{}", b64(&signature.to_bytes()));

    let cache = Arc::new(JwksCache::new(Arc::new(NullFetcher)));
    let config = VerifierConfig::new("https://issuer.example/", "https://issuer.example/jwks.json")
        .with_audience(vec!["my-app".into()]);
    let verifier = Verifier::new(config, cache);

    verifier.verify_sync(&jwt, std::slice::from_ref(&jwk)).expect("ES512 over P-521 must verify");
}

#[tokio::test]
async fn concurrent_verifications_coalesce_into_one_fetch() {
    let server = MockServer::start().await;
    let key = generate_rsa_key("k1");
    Mock::given(method("GET"))
        .and(path("/jwks.json"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "keys": [key.jwk] }))
                .set_delay(Duration::from_millis(150)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let calls = Arc::new(AtomicUsize::new(0));
    let fetcher = Arc::new(CountingFetcher { inner: ReqwestFetcher::new(), calls: calls.clone() });
    let cache = Arc::new(JwksCache::new(fetcher));
    let config = VerifierConfig::new("https://issuer.example/", format!("{}/jwks.json", server.uri()))
        .with_audience(vec!["my-app".into()]);
    let verifier = Arc::new(Verifier::new(config, cache));

    let payload = json!({ "iss": "https://issuer.example/", "aud": "my-app", "exp": now() + 100 });
    let jwt = sign_rs256(&key.private, &rs256_header("k1"), &payload);

    let handles: Vec<_> = (0..10)
        .map(|_| {
            let verifier = verifier.clone();
            let jwt = jwt.clone();
            tokio::spawn(async move { verifier.verify(&jwt).await })
        })
        .collect();

    for handle in handles {
        handle.await.unwrap().expect("each concurrent verification should succeed");
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1, "concurrent callers must coalesce into a single fetch");
}
