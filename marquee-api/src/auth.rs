use crate::{error::AppError, state::AppState};
use axum::{extract::State, http::HeaderMap, routing::post, Json, Router};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use marquee_booking::HolderId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    pub role: String,
    pub exp: usize,
}

/// The caller's resolved identity. Guests are first-class: their session id
/// owns holds and bookings exactly like an account subject does.
#[derive(Debug, Clone)]
pub struct Identity {
    pub holder: HolderId,
    pub is_guest: bool,
    pub is_admin: bool,
}

#[derive(Debug, Serialize)]
struct AuthResponse {
    token: String,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/auth/guest", post(login_guest))
}

/// Issue a short-lived guest token so anonymous visitors can hold seats and
/// check out without creating an account.
async fn login_guest(State(state): State<AppState>) -> Result<Json<AuthResponse>, AppError> {
    let claims = Claims {
        sub: format!("guest-{}", Uuid::new_v4()),
        role: "GUEST".to_owned(),
        exp: (Utc::now() + Duration::seconds(state.auth.expiration as i64)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(state.auth.secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(anyhow::anyhow!("Token encoding failed: {}", e)))?;

    Ok(Json(AuthResponse { token }))
}

/// Decode the bearer token from the request headers, if present.
pub fn identity_from_headers(headers: &HeaderMap, secret: &str) -> Option<Identity> {
    let auth_header = headers.get("Authorization")?.to_str().ok()?;
    let token = auth_header.strip_prefix("Bearer ")?;

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .ok()?;

    let claims = token_data.claims;
    Some(Identity {
        holder: HolderId::new(claims.sub),
        is_guest: claims.role == "GUEST",
        is_admin: claims.role == "ADMIN",
    })
}

/// Like `identity_from_headers` but a missing or invalid token is an error.
pub fn require_identity(headers: &HeaderMap, secret: &str) -> Result<Identity, AppError> {
    identity_from_headers(headers, secret)
        .ok_or_else(|| AppError::Unauthorized("Missing or invalid bearer token".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_token(secret: &str, role: &str) -> String {
        let claims = Claims {
            sub: "user-1".to_string(),
            role: role.to_string(),
            exp: (Utc::now() + Duration::hours(1)).timestamp() as usize,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn test_identity_round_trip() {
        let token = make_token("s3cret", "CUSTOMER");
        let mut headers = HeaderMap::new();
        headers.insert("Authorization", format!("Bearer {token}").parse().unwrap());

        let identity = identity_from_headers(&headers, "s3cret").unwrap();
        assert_eq!(identity.holder.as_str(), "user-1");
        assert!(!identity.is_guest);
        assert!(!identity.is_admin);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = make_token("s3cret", "CUSTOMER");
        let mut headers = HeaderMap::new();
        headers.insert("Authorization", format!("Bearer {token}").parse().unwrap());

        assert!(identity_from_headers(&headers, "other").is_none());
        assert!(require_identity(&headers, "other").is_err());
    }

    #[test]
    fn test_guest_and_admin_roles() {
        let mut headers = HeaderMap::new();
        let token = make_token("s3cret", "GUEST");
        headers.insert("Authorization", format!("Bearer {token}").parse().unwrap());
        assert!(identity_from_headers(&headers, "s3cret").unwrap().is_guest);

        let token = make_token("s3cret", "ADMIN");
        headers.insert("Authorization", format!("Bearer {token}").parse().unwrap());
        assert!(identity_from_headers(&headers, "s3cret").unwrap().is_admin);
    }
}
