use intake_crypto::url_token::{NONCE_FIELD, TIMESTAMP_FIELD};
use intake_crypto::{KdfParams, KeyProvider, TokenKey, TokenPayload, UrlTokenCodec};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

fn codec() -> UrlTokenCodec {
    UrlTokenCodec::new(&TokenKey::from_secret(&"5a".repeat(32)).unwrap())
}

fn object(value: Value) -> TokenPayload {
    value.as_object().cloned().unwrap()
}

fn sample() -> TokenPayload {
    object(json!({"requestId": "req-991", "clientId": 17}))
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PortalClaims {
    request_id: String,
    client_id: u64,
}

// ── Uniqueness ──

#[test]
fn identical_payloads_produce_different_tokens() {
    let c = codec();
    let a = c.create(&sample()).unwrap();
    let b = c.create(&sample()).unwrap();
    assert_ne!(a, b);

    let da = c.verify(&a).unwrap();
    let db = c.verify(&b).unwrap();
    assert_ne!(da[NONCE_FIELD], db[NONCE_FIELD]);
}

// ── Tampering ──

#[test]
fn mutating_any_segment_returns_none() {
    let c = codec();
    let token = c.create(&sample()).unwrap();
    let parts: Vec<String> = token.split('.').map(str::to_string).collect();

    for seg in 0..3 {
        for pos in [0, parts[seg].len() - 1] {
            let mut mutated = parts.clone();
            let mut chars: Vec<char> = mutated[seg].chars().collect();
            chars[pos] = if chars[pos] == '0' { '1' } else { '0' };
            mutated[seg] = chars.into_iter().collect();
            assert!(
                c.verify(&mutated.join(".")).is_none(),
                "mutation in segment {seg} at {pos} must be rejected"
            );
        }
    }
}

#[test]
fn truncating_any_segment_returns_none() {
    let c = codec();
    let token = c.create(&sample()).unwrap();
    let parts: Vec<&str> = token.split('.').collect();

    for seg in 0..3 {
        let mut truncated: Vec<&str> = parts.clone();
        truncated[seg] = &parts[seg][..parts[seg].len() - 2];
        assert!(c.verify(&truncated.join(".")).is_none());
    }
    assert!(c.verify(&token[..token.len() - 1]).is_none());
}

#[test]
fn dropped_or_extra_segment_returns_none() {
    let c = codec();
    let token = c.create(&sample()).unwrap();
    let parts: Vec<&str> = token.split('.').collect();
    assert!(c.verify(&parts[..2].join(".")).is_none());
    assert!(c.verify(&format!("{token}.")).is_none());
    assert!(c.verify(&format!(".{token}")).is_none());
}

#[test]
fn non_hex_segment_returns_none() {
    let c = codec();
    let token = c.create(&sample()).unwrap();
    let mangled = token.replacen(|ch: char| ch.is_ascii_hexdigit(), "z", 1);
    assert!(c.verify(&mangled).is_none());
}

#[test]
fn uppercase_hex_still_verifies() {
    let c = codec();
    let token = c.create(&sample()).unwrap();
    assert!(c.verify(&token.to_uppercase()).is_some());
}

#[test]
fn other_key_returns_none() {
    let token = codec().create(&sample()).unwrap();
    let other = UrlTokenCodec::new(&TokenKey::from_secret("different secret").unwrap());
    assert!(other.verify(&token).is_none());
}

#[test]
fn token_key_is_independent_of_field_key() {
    let secret = "shared-secret-value-used-for-both-keys!";
    let provider =
        KeyProvider::with_params(secret, secret, &KdfParams::with_iterations(1_000)).unwrap();
    let codec = provider.url_token_codec();
    let cipher = provider.field_cipher();

    let token = codec.create(&sample()).unwrap();
    assert!(codec.verify(&token).is_some());

    // A field blob is not a token and vice versa
    let blob = cipher.encrypt_string("123-45-6789").unwrap().unwrap();
    assert!(codec.verify(&blob).is_none());
    assert!(cipher.decrypt_string(&token).is_err());
}

// ── Expiry ──

#[test]
fn fresh_token_passes_max_age() {
    let c = codec();
    let token = c.create(&sample()).unwrap();
    let decoded = c.verify_with_max_age(&token, Duration::from_secs(3600)).unwrap();
    assert_eq!(decoded["requestId"], "req-991");
}

#[test]
fn stale_token_fails_max_age() {
    let c = codec();
    let token = c.create(&sample()).unwrap();
    std::thread::sleep(Duration::from_millis(20));
    assert!(c.verify_with_max_age(&token, Duration::from_millis(1)).is_none());
    // Still authentic without an age limit
    assert!(c.verify(&token).is_some());
}

#[test]
fn decoded_timestamp_is_recent_milliseconds() {
    let c = codec();
    let before = chrono::Utc::now().timestamp_millis();
    let decoded = c.verify(&c.create(&sample()).unwrap()).unwrap();
    let ts = decoded[TIMESTAMP_FIELD].as_i64().unwrap();
    assert!(ts >= before && ts <= before + 5_000);
}

// ── Typed claims ──

#[test]
fn typed_claims_roundtrip() {
    let c = codec();
    let claims = PortalClaims {
        request_id: "req-5".into(),
        client_id: 9,
    };
    let token = c.create_claims(&claims).unwrap();
    let decoded: PortalClaims = c.verify_claims(&token, Duration::from_secs(60)).unwrap();
    assert_eq!(decoded, claims);
}

#[test]
fn typed_claims_shape_mismatch_is_none() {
    let c = codec();
    let token = c.create(&object(json!({"unrelated": true}))).unwrap();
    let decoded: Option<PortalClaims> = c.verify_claims(&token, Duration::from_secs(60));
    assert!(decoded.is_none());
}
