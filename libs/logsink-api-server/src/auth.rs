use std::sync::Arc;

use axum::extract::{Query, Request, State};
use axum::http::{HeaderMap, Uri, header::AUTHORIZATION};
use axum::middleware::Next;
use axum::response::Response;
use serde::Deserialize;

use crate::AppState;
use crate::error::ApiError;

/// Shared-secret check in front of `/logs`.
#[derive(Clone)]
pub struct AccessGuard {
    secret: Arc<str>,
}

impl std::fmt::Debug for AccessGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessGuard").field("secret", &"<redacted>").finish()
    }
}

impl AccessGuard {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: Arc::from(secret.into()),
        }
    }

    /// `Unauthenticated` without a credential, `Forbidden` on mismatch or
    /// when the query string cannot be read unambiguously.
    pub fn check(&self, presented: &Credential) -> Result<(), ApiError> {
        match presented {
            Credential::Missing => Err(ApiError::Unauthenticated),
            Credential::Token(token) if constant_time_eq(token.as_bytes(), self.secret.as_bytes()) => Ok(()),
            Credential::Token(_) | Credential::Malformed => Err(ApiError::Forbidden),
        }
    }

    /// Check the credential carried by a request.
    pub fn authorize(&self, uri: &Uri, headers: &HeaderMap) -> Result<(), ApiError> {
        self.check(&presented_credential(uri, headers))
    }
}

/// What a request offers as proof of the shared secret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    Missing,
    Token(String),
    /// The query string does not parse, e.g. `token` appears twice.
    Malformed,
}

#[derive(Deserialize)]
struct TokenParams {
    token: Option<String>,
}

/// `?token=` wins when present and non-empty, otherwise the second
/// whitespace-separated segment of `Authorization`. A query string that
/// fails to parse never falls through to the header.
pub fn presented_credential(uri: &Uri, headers: &HeaderMap) -> Credential {
    let from_query = match Query::<TokenParams>::try_from_uri(uri) {
        Ok(Query(params)) => params.token.filter(|t| !t.is_empty()),
        Err(e) => {
            tracing::debug!(error = %e, "unreadable query string on guarded route");
            return Credential::Malformed;
        }
    };
    match from_query.or_else(|| token_from_header(headers).map(str::to_owned)) {
        Some(token) => Credential::Token(token),
        None => Credential::Missing,
    }
}

fn token_from_header(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .split_whitespace()
        .nth(1)
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff: u8 = 0;
    for (x, y) in a.iter().zip(b) {
        diff |= x ^ y;
    }
    diff == 0
}

/// Route layer: rejects before any handler (and before the body is read).
pub(crate) async fn require_token(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    state.guard.authorize(request.uri(), request.headers())?;
    Ok(next.run(request).await)
}
