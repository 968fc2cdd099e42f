//! Authentication Extractor
//!
//! Verifies the handshake token before the WebSocket upgrade. The token is
//! read from the `token` query parameter, falling back to an
//! `Authorization: Bearer` header.

use axum::{
    extract::{FromRequestParts, Query},
    http::{header::AUTHORIZATION, request::Parts},
};
use jsonwebtoken::{decode, errors::ErrorKind, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::shared::error::AppError;
use crate::startup::AppState;

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (user ID as a string)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    /// User ID as issued by the clinic backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at time (Unix timestamp)
    #[serde(default)]
    pub iat: i64,
}

impl Claims {
    /// Principal id from `id`, else a numeric `sub`
    pub fn principal_id(&self) -> Option<i64> {
        self.id
            .or_else(|| self.sub.as_deref().and_then(|s| s.parse().ok()))
            .filter(|id| *id > 0)
    }
}

/// Authenticated principal attached to a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: i64,
}

#[derive(Debug, Deserialize)]
struct HandshakeQuery {
    token: Option<String>,
}

/// Decode and verify a token, returning its principal
pub fn verify_token(token: &str, secret: &str) -> Result<AuthUser, AppError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => AppError::Unauthorized("Token expired".into()),
        _ => AppError::Unauthorized("Invalid token".into()),
    })?;

    let user_id = token_data
        .claims
        .principal_id()
        .ok_or_else(|| AppError::Unauthorized("Invalid token claims".into()))?;

    Ok(AuthUser { user_id })
}

fn token_from_parts(parts: &Parts) -> Option<String> {
    let from_query = Query::<HandshakeQuery>::try_from_uri(&parts.uri)
        .ok()
        .and_then(|Query(q)| q.token)
        .filter(|t| !t.is_empty());

    from_query.or_else(|| {
        parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))
            .map(str::to_string)
    })
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = token_from_parts(parts).ok_or_else(|| {
            tracing::debug!("Handshake rejected: missing token");
            AppError::Unauthorized("Missing token".into())
        })?;

        verify_token(&token, &state.settings.jwt.secret).inspect_err(|e| {
            tracing::debug!(error = %e, "Handshake rejected");
        })
    }
}
