//! Bearer-token auth collaborator: issues HS256 tokens backed by a session
//! row, and resolves `Authorization` headers into a request context.

use chrono::{Duration, Utc};
use jsonwebtoken::{errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use store::Store;

const TOKEN_LIFETIME_HOURS: i64 = 24;

/// Identity attached to every authenticated request.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: String,
    pub username: String,
    pub role: String,
}

impl AuthContext {
    pub fn is_admin(&self) -> bool {
        self.role == "admin"
    }
}

#[derive(thiserror::Error, Debug)]
pub enum AuthError {
    #[error("authorization token missing")]
    MissingToken,
    #[error("malformed authorization header")]
    MalformedHeader,
    #[error("invalid token")]
    InvalidToken,
    #[error("session expired")]
    SessionExpired,
    #[error("session lookup failed")]
    Store(#[from] store::StoreError),
}

#[derive(Serialize, Deserialize, Debug)]
pub struct Claims {
    pub user_id: String,
    pub username: String,
    pub role: String,
    pub exp: i64,
    pub iat: i64,
}

pub fn issue_token(
    secret: &str,
    user_id: &str,
    username: &str,
    role: &str,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now();
    let claims = Claims {
        user_id: user_id.to_string(),
        username: username.to_string(),
        role: role.to_string(),
        iat: now.timestamp(),
        exp: (now + Duration::hours(TOKEN_LIFETIME_HOURS)).timestamp(),
    };
    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

/// Resolves a raw `Authorization` header value. The token must both decode
/// and still have a session row; an expired token also revokes its session.
pub async fn authorize(
    store: &Store,
    secret: &str,
    header: Option<String>,
) -> Result<AuthContext, AuthError> {
    let header = header.ok_or(AuthError::MissingToken)?;
    let token = header
        .strip_prefix("Bearer ")
        .ok_or(AuthError::MalformedHeader)?;

    let session = store
        .get_session(token)
        .await?
        .ok_or(AuthError::InvalidToken)?;

    let validation = Validation::new(Algorithm::HS256);
    match jsonwebtoken::decode::<Claims>(
        &session.token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    ) {
        Ok(data) => Ok(AuthContext {
            user_id: data.claims.user_id,
            username: data.claims.username,
            role: data.claims.role,
        }),
        Err(err) if matches!(err.kind(), ErrorKind::ExpiredSignature) => {
            if let Err(err) = store.delete_session(token).await {
                tracing::warn!(error = %err, "failed to delete expired session");
            }
            Err(AuthError::SessionExpired)
        }
        Err(_) => Err(AuthError::InvalidToken),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_tokens_decode_with_the_same_secret() {
        let token = issue_token("secret", "u-1", "alice", "admin").unwrap();
        let data = jsonwebtoken::decode::<Claims>(
            &token,
            &DecodingKey::from_secret(b"secret"),
            &Validation::new(Algorithm::HS256),
        )
        .unwrap();
        assert_eq!(data.claims.user_id, "u-1");
        assert_eq!(data.claims.username, "alice");
        assert_eq!(data.claims.role, "admin");
        assert!(data.claims.exp > data.claims.iat);
    }

    #[test]
    fn a_different_secret_rejects_the_token() {
        let token = issue_token("secret", "u-1", "alice", "user").unwrap();
        let outcome = jsonwebtoken::decode::<Claims>(
            &token,
            &DecodingKey::from_secret(b"other"),
            &Validation::new(Algorithm::HS256),
        );
        assert!(outcome.is_err());
    }
}
