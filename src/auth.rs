// Authentication: JWT tokens for socket identity and the admin API.

use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    Json,
};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::AuthError;

// ── JWT ──────────────────────────────────────────────────────────────

/// JWT secret – in production this should come from an env var.
fn jwt_secret() -> Vec<u8> {
    std::env::var("JWT_SECRET")
        .unwrap_or_else(|_| "arena-dev-secret-change-in-production".to_string())
        .into_bytes()
}

pub const ROLE_PLAYER: &str = "player";
pub const ROLE_LOBBY: &str = "lobby";
pub const ROLE_ADMIN: &str = "admin";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Claims {
    pub sub: String, // user id
    pub username: String,
    pub role: String,
    pub exp: usize, // expiry (unix timestamp)
}

pub fn create_token(user_id: &str, username: &str, role: &str) -> Result<String, AuthError> {
    let expiration = chrono::Utc::now()
        .checked_add_signed(chrono::Duration::hours(24))
        .ok_or_else(|| AuthError::TokenCreation("expiry out of range".into()))?
        .timestamp() as usize;

    let claims = Claims {
        sub: user_id.to_string(),
        username: username.to_string(),
        role: role.to_string(),
        exp: expiration,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(&jwt_secret()),
    )
    .map_err(|e| AuthError::TokenCreation(e.to_string()))
}

pub fn verify_token(token: &str) -> Result<Claims, AuthError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(&jwt_secret()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| AuthError::InvalidToken(e.to_string()))
}

// ── Socket identity ──────────────────────────────────────────────────

/// Resolves the opaque token sent in `Authenticate` to a user id.
pub trait TokenVerifier: Send + Sync {
    fn verify(&self, token: &str) -> Result<String, AuthError>;
}

/// JWT verification. In local mode a token that is not a JWT is taken as the user id.
pub struct JwtVerifier {
    pub local_mode: bool,
}

impl TokenVerifier for JwtVerifier {
    fn verify(&self, token: &str) -> Result<String, AuthError> {
        match verify_token(token) {
            Ok(claims) => Ok(claims.sub),
            Err(_) if self.local_mode && !token.is_empty() && token.split('.').count() != 3 => {
                Ok(token.to_string())
            }
            Err(e) => Err(e),
        }
    }
}

// ── Axum extractor: AdminUser ────────────────────────────────────────

fn reject(status: StatusCode, msg: &str) -> (StatusCode, Json<serde_json::Value>) {
    (status, Json(serde_json::json!({ "error": msg })))
}

/// Bearer token holder allowed to manage matches (role `lobby` or `admin`).
/// Usage: `AdminUser(claims)` in handler parameters.
#[derive(Debug, Clone)]
pub struct AdminUser(pub Claims);

impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<serde_json::Value>);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get("Authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| reject(StatusCode::UNAUTHORIZED, "Missing Authorization header"))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| reject(StatusCode::UNAUTHORIZED, "Invalid Authorization header format"))?;

        let claims =
            verify_token(token).map_err(|_| reject(StatusCode::UNAUTHORIZED, "Invalid token"))?;

        if claims.role != ROLE_LOBBY && claims.role != ROLE_ADMIN {
            return Err(reject(StatusCode::FORBIDDEN, "Insufficient role"));
        }
        Ok(AdminUser(claims))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jwt_create_and_verify() {
        let token = create_token("u-1", "testuser", ROLE_PLAYER).unwrap();
        let claims = verify_token(&token).unwrap();
        assert_eq!(claims.sub, "u-1");
        assert_eq!(claims.username, "testuser");
        assert_eq!(claims.role, ROLE_PLAYER);
    }

    #[test]
    fn test_jwt_invalid_token() {
        assert!(matches!(
            verify_token("invalid.token.here"),
            Err(AuthError::InvalidToken(_))
        ));
    }

    #[test]
    fn test_verifier_resolves_subject() {
        let token = create_token("u-9", "nine", ROLE_PLAYER).unwrap();
        let strict = JwtVerifier { local_mode: false };
        assert_eq!(strict.verify(&token).unwrap(), "u-9");
        assert!(strict.verify("alice").is_err());
    }

    #[test]
    fn test_local_mode_accepts_plain_user_id() {
        let local = JwtVerifier { local_mode: true };
        assert_eq!(local.verify("alice").unwrap(), "alice");
        assert!(local.verify("").is_err());
        assert!(local.verify("bad.jwt.value").is_err());
    }
}
