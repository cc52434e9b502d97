use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

#[derive(Serialize)]
struct Claims<'a> {
    user_id: &'a str,
    username: &'a str,
    exp: i64,
}

/// Mints a claims token in the same `base64url(claims) "." hex(hmac)` shape the
/// endpoint verifies, standing in for the external auth issuer in tests.
pub fn sign_test_token(secret: &str, user_id: &str, username: &str, exp: i64) -> String {
    let claims = Claims {
        user_id,
        username,
        exp,
    };
    let claims_json = serde_json::to_vec(&claims).expect("claims always serialize");
    let encoded = URL_SAFE_NO_PAD.encode(&claims_json);

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("hmac accepts any key length");
    mac.update(&claims_json);
    let signature = hex::encode(mac.finalize().into_bytes());

    format!("{encoded}.{signature}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_test_token_produces_two_dot_separated_parts() {
        let token = sign_test_token("secret", "u1", "alice", 9_999_999_999);
        let parts: Vec<&str> = token.split('.').collect();
        assert_eq!(parts.len(), 2);
        assert!(!parts[0].is_empty());
        assert!(!parts[1].is_empty());
    }

    #[test]
    fn sign_test_token_is_deterministic_for_same_inputs() {
        let a = sign_test_token("secret", "u1", "alice", 100);
        let b = sign_test_token("secret", "u1", "alice", 100);
        assert_eq!(a, b);
    }

    #[test]
    fn sign_test_token_differs_across_secrets() {
        let a = sign_test_token("secret-a", "u1", "alice", 100);
        let b = sign_test_token("secret-b", "u1", "alice", 100);
        assert_ne!(a, b);
    }
}
