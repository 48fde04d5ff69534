// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! JWT authentication middleware.
//!
//! The token subject is the participant's event-network identifier.

use crate::error::AppError;
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Session cookie name.
pub const SESSION_COOKIE: &str = "season_token";

/// JWT claims structure.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (participant id)
    pub sub: String,
    /// Expiration time (Unix timestamp)
    pub exp: usize,
    /// Issued at (Unix timestamp)
    pub iat: usize,
}

/// Authenticated participant extracted from JWT.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub participant_id: String,
}

/// Optional identity for routes that also serve anonymous callers.
#[derive(Debug, Clone, Default)]
pub struct Viewer(pub Option<String>);

impl Viewer {
    pub fn id(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

/// Token from the session cookie, else the bearer header.
///
/// `Err` means a credential was present but unusable.
fn extract_token(jar: &CookieJar, request: &Request) -> Result<Option<String>, AppError> {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        return Ok(Some(cookie.value().to_string()));
    }

    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    match auth_header {
        None => Ok(None),
        Some(h) => match h.strip_prefix("Bearer ") {
            Some(token) => Ok(Some(token.to_string())),
            None => Err(AppError::InvalidToken),
        },
    }
}

fn verify(token: &str, signing_key: &[u8]) -> Result<String, AppError> {
    let key = DecodingKey::from_secret(signing_key);
    let validation = Validation::new(Algorithm::HS256);

    let token_data =
        decode::<Claims>(token, &key, &validation).map_err(|_| AppError::InvalidToken)?;

    let participant_id = token_data.claims.sub.trim().to_string();
    if participant_id.is_empty() {
        return Err(AppError::InvalidToken);
    }
    Ok(participant_id)
}

/// Middleware that requires valid JWT authentication.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = extract_token(&jar, &request)?.ok_or(AppError::Unauthorized)?;
    let participant_id = verify(&token, &state.config.jwt_signing_key)?;

    request.extensions_mut().insert(AuthUser { participant_id });

    Ok(next.run(request).await)
}

/// Middleware that accepts anonymous callers but rejects bad tokens.
pub async fn optional_auth(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let viewer = match extract_token(&jar, &request)? {
        Some(token) => Viewer(Some(verify(&token, &state.config.jwt_signing_key)?)),
        None => Viewer(None),
    };

    request.extensions_mut().insert(viewer);

    Ok(next.run(request).await)
}

/// Create a JWT for a participant session.
pub fn create_jwt(participant_id: &str, signing_key: &[u8]) -> anyhow::Result<String> {
    use jsonwebtoken::{encode, EncodingKey, Header};
    use std::time::{SystemTime, UNIX_EPOCH};

    let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs() as usize;

    let claims = Claims {
        sub: participant_id.to_string(),
        iat: now,
        exp: now + 30 * 24 * 60 * 60, // 30 days
    };

    Ok(encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(signing_key),
    )?)
}
