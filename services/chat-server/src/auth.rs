use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Decoded claims carried by a verified connection token.
pub struct TokenClaims {
    pub user_id: String,
    pub username: String,
}

#[derive(Deserialize)]
struct Claims {
    user_id: String,
    username: String,
    exp: i64,
}

/// Verifies a `base64url(claims) "." hex(hmac_sha256(secret, claims))` token:
/// decodes the claims, recomputes the MAC and compares it in constant time,
/// then checks `exp` against the current time. Any failure returns `None`;
/// the endpoint never distinguishes the reason to the client.
pub fn verify_token(secret: &str, token: &str) -> Option<TokenClaims> {
    let (encoded_claims, signature_hex) = token.split_once('.')?;

    let claims_json = URL_SAFE_NO_PAD.decode(encoded_claims).ok()?;
    let expected_signature = hex::decode(signature_hex).ok()?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(&claims_json);
    let computed_signature = mac.finalize().into_bytes();

    if computed_signature.as_slice().ct_eq(&expected_signature).unwrap_u8() != 1 {
        return None;
    }

    let claims: Claims = serde_json::from_slice(&claims_json).ok()?;
    if claims.exp <= Utc::now().timestamp() {
        return None;
    }

    Some(TokenClaims {
        user_id: claims.user_id,
        username: claims.username,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(secret: &str, user_id: &str, username: &str, exp: i64) -> String {
        #[derive(serde::Serialize)]
        struct SignClaims<'a> {
            user_id: &'a str,
            username: &'a str,
            exp: i64,
        }
        let claims_json = serde_json::to_vec(&SignClaims { user_id, username, exp }).unwrap();
        let encoded = URL_SAFE_NO_PAD.encode(&claims_json);
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(&claims_json);
        let signature = hex::encode(mac.finalize().into_bytes());
        format!("{encoded}.{signature}")
    }

    #[test]
    fn verify_token_accepts_a_correctly_signed_unexpired_token() {
        let token = sign("secret", "u1", "alice", Utc::now().timestamp() + 3600);
        let claims = verify_token("secret", &token).unwrap();
        assert_eq!(claims.user_id, "u1");
        assert_eq!(claims.username, "alice");
    }

    #[test]
    fn verify_token_rejects_wrong_secret() {
        let token = sign("secret", "u1", "alice", Utc::now().timestamp() + 3600);
        assert!(verify_token("other-secret", &token).is_none());
    }

    #[test]
    fn verify_token_rejects_expired_token() {
        let token = sign("secret", "u1", "alice", Utc::now().timestamp() - 10);
        assert!(verify_token("secret", &token).is_none());
    }

    #[test]
    fn verify_token_rejects_malformed_input() {
        assert!(verify_token("secret", "not-a-token").is_none());
        assert!(verify_token("secret", "onlyonepart").is_none());
    }

    #[test]
    fn verify_token_rejects_tampered_claims() {
        let token = sign("secret", "u1", "alice", Utc::now().timestamp() + 3600);
        let (claims_part, sig_part) = token.split_once('.').unwrap();
        let tampered = format!("{claims_part}x.{sig_part}");
        assert!(verify_token("secret", &tampered).is_none());
    }
}
