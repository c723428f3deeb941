//! Stateless signed authentication tokens.
//!
//! Tokens are compact JWS documents signed with HMAC-SHA256, so standard JWT
//! tooling can inspect them. Nothing is stored server side; rotating the
//! secret is the only way to revoke outstanding tokens.

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::clock;

/// Shortest secret accepted for signing.
pub const MIN_SECRET_LEN: usize = 32;

const MAX_TOKEN_LEN: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("invalid token")]
    Invalid,

    #[error("token expired")]
    Expired,

    #[error("signing secret must be at least 32 bytes")]
    WeakSecret,
}

/// Claims carried by every token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: i64,
    pub username: String,
    pub is_admin: bool,
    pub iat: u64,
    pub exp: u64,
}

impl Claims {
    /// Identifier used when rate limiting by subject.
    pub fn subject(&self) -> String {
        format!("user:{}", self.user_id)
    }
}

pub struct IdentityTokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl_secs: u64,
}

impl IdentityTokenService {
    pub fn new(secret: &[u8], ttl_secs: u64) -> Result<Self, TokenError> {
        if secret.len() < MIN_SECRET_LEN {
            return Err(TokenError::WeakSecret);
        }
        Ok(Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl_secs,
        })
    }

    /// Read the secret from `var`, or generate a random one.
    ///
    /// A generated secret invalidates every token issued before a restart.
    pub fn from_env(var: &str, ttl_secs: u64) -> Result<Self, TokenError> {
        if let Ok(secret) = std::env::var(var) {
            match Self::new(secret.as_bytes(), ttl_secs) {
                Ok(service) => return Ok(service),
                Err(e) => tracing::warn!(env = var, error = %e, "Ignoring configured token secret"),
            }
        } else {
            tracing::warn!(env = var, "No token secret configured, generating one for this process");
        }
        Self::random(ttl_secs)
    }

    pub fn random(ttl_secs: u64) -> Result<Self, TokenError> {
        let mut secret = [0u8; 2 * MIN_SECRET_LEN];
        rand::thread_rng().fill_bytes(&mut secret);
        Self::new(&secret, ttl_secs)
    }

    pub fn ttl_secs(&self) -> u64 {
        self.ttl_secs
    }

    pub fn generate(&self, user_id: i64, username: &str, is_admin: bool) -> String {
        self.generate_at(user_id, username, is_admin, clock::now_secs())
    }

    pub fn generate_at(&self, user_id: i64, username: &str, is_admin: bool, now_secs: u64) -> String {
        let claims = Claims {
            user_id,
            username: username.to_owned(),
            is_admin,
            iat: now_secs,
            exp: now_secs.saturating_add(self.ttl_secs),
        };
        // HS256 over a plain struct of strings and integers does not fail.
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .unwrap_or_default()
    }

    /// Verify against the wall clock, with no leeway on `exp`.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        self.decode(token, &validation)
    }

    /// Verify with expiry judged at `now_secs` instead of the wall clock.
    pub fn verify_at(&self, token: &str, now_secs: u64) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        let claims = self.decode(token, &validation)?;
        if now_secs >= claims.exp {
            return Err(TokenError::Expired);
        }
        Ok(claims)
    }

    /// Pull the token out of an `Authorization: Bearer <token>` value.
    pub fn extract_from_header(value: &str) -> Option<&str> {
        let mut parts = value.split_whitespace();
        match (parts.next(), parts.next(), parts.next()) {
            (Some(scheme), Some(token), None) if scheme.eq_ignore_ascii_case("bearer") => Some(token),
            _ => None,
        }
    }

    fn decode(&self, token: &str, validation: &Validation) -> Result<Claims, TokenError> {
        if token.len() > MAX_TOKEN_LEN {
            return Err(TokenError::Invalid);
        }
        jsonwebtoken::decode::<Claims>(token, &self.decoding, validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid,
            })
    }
}

#[cfg(test)]
mod tests {
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;

    use super::*;

    const NOW: u64 = 1_700_000_000;
    const SECRET: &[u8] = b"0123456789abcdef0123456789abcdef";

    fn service() -> IdentityTokenService {
        IdentityTokenService::new(SECRET, 86_400).unwrap()
    }

    fn claims(is_admin: bool, iat: u64) -> Claims {
        Claims {
            user_id: 7,
            username: "alice".into(),
            is_admin,
            iat,
            exp: iat + 86_400,
        }
    }

    #[test]
    fn generate_then_verify() {
        let svc = service();
        let token = svc.generate_at(7, "alice", true, NOW);
        let claims = svc.verify_at(&token, NOW + 60).unwrap();
        assert_eq!(claims.user_id, 7);
        assert_eq!(claims.username, "alice");
        assert!(claims.is_admin);
        assert_eq!(claims.exp, NOW + 86_400);
        assert_eq!(claims.subject(), "user:7");
    }

    #[test]
    fn expired_after_lifetime() {
        let svc = service();
        let token = svc.generate_at(7, "alice", false, NOW);
        assert_eq!(svc.verify_at(&token, NOW + 86_400), Err(TokenError::Expired));
    }

    #[test]
    fn wall_clock_verification() {
        let svc = service();
        let fresh = svc.generate(7, "alice", false);
        assert_eq!(svc.verify(&fresh).unwrap().username, "alice");

        let stale = svc.generate_at(7, "alice", false, NOW);
        assert_eq!(svc.verify(&stale), Err(TokenError::Expired));
    }

    #[test]
    fn header_without_typ_is_accepted() {
        let header = Header {
            typ: None,
            ..Header::new(Algorithm::HS256)
        };
        let token = jsonwebtoken::encode(
            &header,
            &claims(false, NOW),
            &EncodingKey::from_secret(SECRET),
        )
        .unwrap();
        assert_eq!(service().verify_at(&token, NOW).unwrap().user_id, 7);
    }

    #[test]
    fn other_algorithms_are_invalid() {
        let token = jsonwebtoken::encode(
            &Header::new(Algorithm::HS512),
            &claims(true, NOW),
            &EncodingKey::from_secret(SECRET),
        )
        .unwrap();
        assert_eq!(service().verify_at(&token, NOW), Err(TokenError::Invalid));

        let unsigned = format!(
            "{}.{}.",
            URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#),
            URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims(true, NOW)).unwrap()),
        );
        assert_eq!(service().verify_at(&unsigned, NOW), Err(TokenError::Invalid));
    }

    #[test]
    fn tampered_payload_is_invalid() {
        let svc = service();
        let token = svc.generate_at(7, "alice", false, NOW);
        let parts: Vec<&str> = token.split('.').collect();

        let forged_payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims(true, NOW)).unwrap());
        let forged = format!("{}.{}.{}", parts[0], forged_payload, parts[2]);
        assert_eq!(svc.verify_at(&forged, NOW), Err(TokenError::Invalid));
    }

    #[test]
    fn other_secret_is_invalid() {
        let token = service().generate_at(1, "bob", false, NOW);
        let other = IdentityTokenService::new(&[b'x'; 48], 86_400).unwrap();
        assert_eq!(other.verify_at(&token, NOW), Err(TokenError::Invalid));
    }

    #[test]
    fn malformed_tokens_are_invalid() {
        let svc = service();
        let oversized = "a".repeat(MAX_TOKEN_LEN + 1);
        for token in ["", "abc", "a.b", "a.b.c.d", "!!.??.**", oversized.as_str()] {
            assert_eq!(svc.verify_at(token, NOW), Err(TokenError::Invalid), "{token}");
        }
    }

    #[test]
    fn short_secret_is_refused() {
        assert!(matches!(
            IdentityTokenService::new(b"short", 60),
            Err(TokenError::WeakSecret)
        ));
    }

    #[test]
    fn bearer_extraction() {
        assert_eq!(IdentityTokenService::extract_from_header("Bearer abc"), Some("abc"));
        assert_eq!(IdentityTokenService::extract_from_header("bearer   abc"), Some("abc"));
        assert_eq!(IdentityTokenService::extract_from_header("Basic abc"), None);
        assert_eq!(IdentityTokenService::extract_from_header("Bearer"), None);
        assert_eq!(IdentityTokenService::extract_from_header("Bearer a b"), None);
    }
}
