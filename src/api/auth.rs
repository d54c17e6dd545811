// =============================================================================
// Bearer Token Authentication — Axum extractor
// =============================================================================
//
// Validates the `Authorization: Bearer <token>` header against the
// `HELIOS_ADMIN_TOKEN` environment variable. The comparison runs in constant
// time so a mismatch reveals nothing about where the token diverged.
//
// Usage:
//
//   async fn handler(_auth: AuthBearer, ...) { ... }
//
// A missing or invalid token short-circuits the request with 403 before the
// handler body executes. If no token is configured, every authenticated
// route rejects.
// =============================================================================

use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
};
use tracing::warn;

/// Name of the environment variable holding the admin token.
const TOKEN_ENV: &str = "HELIOS_ADMIN_TOKEN";

/// Compare two byte slices in constant time. Always examines every byte so
/// timing does not leak the position of the first mismatch. A length
/// difference is observable, which is acceptable here: the attacker does not
/// control the expected token's length.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Axum extractor that yields the validated token string.
pub struct AuthBearer(pub String);

/// Rejection returned when authentication fails.
pub struct AuthRejection(&'static str);

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": self.0 });
        (StatusCode::FORBIDDEN, axum::Json(body)).into_response()
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthBearer
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Read on every request so token rotation needs no restart.
        let expected = std::env::var(TOKEN_ENV).unwrap_or_default();
        if expected.is_empty() {
            warn!("{TOKEN_ENV} is not set — rejecting all authenticated requests");
            return Err(AuthRejection("server authentication not configured"));
        }

        let presented = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "));

        let Some(token) = presented else {
            warn!("missing or malformed Authorization header");
            return Err(AuthRejection("missing or invalid authorization token"));
        };

        if !constant_time_eq(token.as_bytes(), expected.as_bytes()) {
            warn!("invalid admin token presented");
            return Err(AuthRejection("invalid authorization token"));
        }

        Ok(AuthBearer(token.to_string()))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_tokens_match() {
        assert!(constant_time_eq(b"secret-token", b"secret-token"));
        assert!(constant_time_eq(b"", b""));
    }

    #[test]
    fn unequal_tokens_reject() {
        assert!(!constant_time_eq(b"secret-token", b"secret-tokex"));
        assert!(!constant_time_eq(b"\x00", b"\x01"));
    }

    #[test]
    fn length_mismatch_rejects() {
        assert!(!constant_time_eq(b"short", b"a-much-longer-token"));
        assert!(!constant_time_eq(b"x", b""));
    }
}
