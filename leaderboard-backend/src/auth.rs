//! Session tokens and the cookie guard.
//!
//! Tokens are HS256 JWTs carrying whatever object the client posted to `/jwt`
//! plus `iat`/`exp`. Nothing is stored server-side: logging out only tells the
//! browser to drop the cookie, so a copied token stays valid until it expires.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use cookie::time::Duration as CookieDuration;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

use crate::AppState;
use crate::error::AppError;
use crate::helpers::now;

/// Name of the cookie holding the session token.
pub const TOKEN_COOKIE: &str = "token";

/// Caller-supplied token contents, embedded without validation.
pub type Payload = Map<String, Value>;

/// Decoded payload attached to requests that passed the guard.
#[derive(Debug, Clone)]
pub struct Session(pub Payload);

#[derive(Debug, Error, PartialEq)]
pub enum AuthError {
    #[error("no session token")]
    MissingToken,

    #[error("invalid token format")]
    Malformed,

    #[error("invalid signature")]
    InvalidSignature,

    #[error("token expired")]
    Expired,

    #[error("failed to sign token: {0}")]
    Signing(String),
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    #[serde(flatten)]
    payload: Payload,
    #[serde(default)]
    iat: u64,
    exp: u64,
}

/// Issues and verifies session tokens.
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl TokenService {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        // payloads are caller-defined; an `aud` key is just data
        validation.validate_aud = false;

        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Sign `payload` with an expiry `ttl` from now.
    pub fn issue(&self, payload: Payload) -> Result<String, AuthError> {
        self.issue_at(payload, now())
    }

    /// Sign `payload` as if issued at `issued_at` (unix seconds). Any `iat` or
    /// `exp` keys in the payload are replaced.
    pub fn issue_at(&self, mut payload: Payload, issued_at: u64) -> Result<String, AuthError> {
        payload.remove("iat");
        payload.remove("exp");
        let claims = Claims {
            payload,
            iat: issued_at,
            exp: issued_at.saturating_add(self.ttl.as_secs()),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AuthError::Signing(e.to_string()))
    }

    /// Check signature and expiry and hand back the original payload.
    pub fn verify(&self, token: &str) -> Result<Payload, AuthError> {
        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims.payload)
            .map_err(map_jwt_error)
    }

    /// Cookie carrying a freshly issued token. It lives as long as the token.
    pub fn session_cookie(&self, token: String) -> Cookie<'static> {
        let mut cookie = cookie_base(token);
        let secs = i64::try_from(self.ttl().as_secs()).unwrap_or(i64::MAX);
        cookie.set_max_age(CookieDuration::seconds(secs));
        cookie
    }
}

fn cookie_base(value: String) -> Cookie<'static> {
    Cookie::build((TOKEN_COOKIE, value))
        .http_only(true)
        .secure(true)
        .same_site(SameSite::None)
        .path("/")
        .build()
}

/// Tell the client to discard its session cookie. The token itself is not revoked.
pub fn invalidate(jar: CookieJar) -> CookieJar {
    let mut removal = cookie_base(String::new());
    removal.make_removal();
    jar.add(removal)
}

/// Pass/reject decision for a request's cookies.
pub fn authorize(tokens: &TokenService, jar: &CookieJar) -> Result<Payload, AuthError> {
    let token = jar.get(TOKEN_COOKIE).ok_or(AuthError::MissingToken)?;
    tokens.verify(token.value())
}

/// Route layer for guarded endpoints. Rejected requests never reach the handler.
pub(crate) async fn require_token(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let payload = authorize(&state.tokens, &jar).inspect_err(|e| {
        debug!(reason = %e, path = %request.uri().path(), "rejected request");
    })?;

    request.extensions_mut().insert(Session(payload));
    Ok(next.run(request).await)
}

fn map_jwt_error(err: jsonwebtoken::errors::Error) -> AuthError {
    use jsonwebtoken::errors::ErrorKind;
    match err.kind() {
        ErrorKind::ExpiredSignature => AuthError::Expired,
        ErrorKind::InvalidSignature => AuthError::InvalidSignature,
        _ => AuthError::Malformed,
    }
}
