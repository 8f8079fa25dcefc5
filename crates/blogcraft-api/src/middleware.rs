use axum::{
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use serde::Serialize;
use tracing::debug;

use blogcraft_types::api::Claims;

use crate::AppState;
use crate::auth::verify_token;
use crate::error::ApiError;

/// Who made the request, as proven by a valid session token. Carries no
/// authorization data: it says "some valid user", nothing more.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub id: String,
    pub email: String,
}

impl From<Claims> for Identity {
    fn from(claims: Claims) -> Self {
        Self {
            id: claims.id,
            email: claims.email,
        }
    }
}

/// The session cookie wins; the `Authorization: Bearer` header is the
/// fallback. Empty values count as absent.
pub fn extract_token(jar: &CookieJar, headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    if let Some(cookie) = jar.get(cookie_name).filter(|c| !c.value().is_empty()) {
        return Some(cookie.value().to_string());
    }

    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

/// No token is 401, a bad token is 403. On success the request carries an
/// [`Identity`] extension.
pub async fn require_auth(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_token(&jar, req.headers(), &state.config.cookie_name).ok_or_else(|| {
        debug!("No session token on {}", req.uri().path());
        ApiError::AuthenticationRequired
    })?;

    let claims = verify_token(&state.config, &token)?;
    debug!(user_id = %claims.id, "Request authenticated");

    req.extensions_mut().insert(Identity::from(claims));
    Ok(next.run(req).await)
}
