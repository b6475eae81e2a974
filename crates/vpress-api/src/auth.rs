//! Shared-key service authentication.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use tracing::warn;

use crate::error::ApiError;
use crate::state::AppState;

/// Header alternative to `Authorization: Bearer <key>`.
pub const SERVICE_KEY_HEADER: &str = "X-Internal-Service-Key";

/// Proof that the caller presented the configured service key.
#[derive(Debug, Clone, Copy)]
pub struct ServiceAuth;

/// Axum extractor for an authenticated service caller.
#[axum::async_trait]
impl FromRequestParts<AppState> for ServiceAuth {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let expected = match state.config.service_key.as_deref() {
            Some(key) => key,
            None => {
                warn!("Rejecting request: INTERNAL_SERVICE_KEY is not configured");
                return Err(ApiError::unauthorized("Service key not configured"));
            }
        };

        let presented = parts
            .headers
            .get("Authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .or_else(|| {
                parts
                    .headers
                    .get(SERVICE_KEY_HEADER)
                    .and_then(|v| v.to_str().ok())
            })
            .ok_or_else(|| ApiError::unauthorized("Missing service key"))?;

        if keys_match(presented.trim(), expected) {
            Ok(ServiceAuth)
        } else {
            Err(ApiError::unauthorized("Invalid service key"))
        }
    }
}

/// Compare without short-circuiting on the first differing byte.
fn keys_match(presented: &str, expected: &str) -> bool {
    let (a, b) = (presented.as_bytes(), expected.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
