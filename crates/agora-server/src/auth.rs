//! Bearer-token identity resolution for the socket handshake.
//!
//! Tokens are HS256 JWTs minted by the REST layer with `sub` (user id),
//! `exp`, and `type` (`access` or `refresh`). Only access tokens open a socket.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::debug;

use agora_core::collaborators::{IdentityResolver, UserDirectory};
use agora_core::{AuthError, UserId};

const ACCESS: &str = "access";

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    #[serde(default)]
    pub sub: Option<String>,
    pub exp: i64,
    #[serde(rename = "type", default)]
    pub token_type: Option<String>,
}

pub struct JwtResolver {
    secret: SecretString,
    users: Option<Arc<dyn UserDirectory>>,
}

impl JwtResolver {
    pub fn new(secret: SecretString) -> Self {
        Self {
            secret,
            users: None,
        }
    }

    /// Also require the token's subject to exist in `users`.
    pub fn with_user_directory(mut self, users: Arc<dyn UserDirectory>) -> Self {
        self.users = Some(users);
        self
    }

    fn decode_claims(&self, token: &str) -> Result<Claims, AuthError> {
        let validation = Validation::new(Algorithm::HS256);
        let key = DecodingKey::from_secret(self.secret.expose_secret().as_bytes());
        decode::<Claims>(token, &key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::Expired,
                _ => AuthError::Invalid(e.to_string()),
            })
    }
}

#[async_trait]
impl IdentityResolver for JwtResolver {
    async fn resolve(&self, token: &str) -> Result<UserId, AuthError> {
        if token.is_empty() {
            return Err(AuthError::Missing);
        }
        let claims = self.decode_claims(token)?;

        if claims.token_type.as_deref() != Some(ACCESS) {
            return Err(AuthError::Invalid("not an access token".into()));
        }
        let user = match claims.sub {
            Some(sub) if !sub.is_empty() => UserId::from_raw(sub),
            _ => return Err(AuthError::Invalid("missing subject".into())),
        };

        if let Some(users) = &self.users {
            match users.user_exists(&user).await {
                Ok(true) => {}
                Ok(false) => return Err(AuthError::UnknownUser(user.into_inner())),
                Err(e) => {
                    debug!(user_id = %user, error = %e, "user lookup failed during auth");
                    return Err(AuthError::Invalid(format!("user lookup failed: {e}")));
                }
            }
        }
        Ok(user)
    }
}

/// Mint a token of the given type. Negative `ttl` yields an already-expired token.
pub fn issue_token(
    secret: &SecretString,
    user: &UserId,
    token_type: &str,
    ttl: chrono::Duration,
) -> Result<String, jsonwebtoken::errors::Error> {
    let claims = Claims {
        sub: Some(user.to_string()),
        exp: (Utc::now() + ttl).timestamp(),
        token_type: Some(token_type.to_string()),
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.expose_secret().as_bytes()),
    )
}

pub fn issue_access_token(
    secret: &SecretString,
    user: &UserId,
    ttl: chrono::Duration,
) -> Result<String, jsonwebtoken::errors::Error> {
    issue_token(secret, user, ACCESS, ttl)
}
