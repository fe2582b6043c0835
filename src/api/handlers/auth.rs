//! Registration and login.
//!
//! Both endpoints answer 200 with a fresh `session` cookie; registering
//! logs the user in immediately.

use axum::{
    body::Bytes,
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
};
use sha2::{Digest, Sha256};
use std::sync::Arc;

use crate::api::handlers::{
    ApiError, INTERNAL_SERVER_ERROR, INVALID_CREDENTIALS, INVALID_JSON, LOGIN_ALREADY_IN_USE,
};
use crate::auth::session;
use crate::models::Credentials;
use crate::repository::RepositoryError;
use crate::AppState;

/// Hex SHA-256, the stored password form.
pub fn password_hash(password: &str) -> String {
    hex::encode(Sha256::digest(password.as_bytes()))
}

fn decode_credentials(body: &[u8]) -> Result<Credentials, ApiError> {
    serde_json::from_slice(body).map_err(|e| {
        tracing::debug!("rejected credentials body: {}", e);
        (StatusCode::BAD_REQUEST, INVALID_JSON)
    })
}

fn logged_in(user_id: i64, secret: &[u8]) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(
            header::SET_COOKIE,
            session::set_cookie_header(user_id, secret),
        )],
    )
}

pub async fn register(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let creds = decode_credentials(&body)?;

    let user_id = state
        .repo
        .create_user(&creds.login, &password_hash(&creds.password))
        .await
        .map_err(|e| match e {
            RepositoryError::LoginTaken => (StatusCode::CONFLICT, LOGIN_ALREADY_IN_USE),
            other => {
                tracing::error!(login = %creds.login, "registration failed: {}", other);
                (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_SERVER_ERROR)
            }
        })?;

    tracing::info!(user_id, login = %creds.login, "user registered");
    Ok(logged_in(user_id, &state.session_secret))
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let creds = decode_credentials(&body)?;

    let user_id = state
        .repo
        .auth_user(&creds.login, &password_hash(&creds.password))
        .await
        .map_err(|e| match e {
            RepositoryError::BadCredentials => (StatusCode::UNAUTHORIZED, INVALID_CREDENTIALS),
            other => {
                tracing::error!(login = %creds.login, "login failed: {}", other);
                (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_SERVER_ERROR)
            }
        })?;

    Ok(logged_in(user_id, &state.session_secret))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_is_hex_sha256() {
        // SHA-256 of the empty string.
        assert_eq!(
            password_hash(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        let hash = password_hash("correct horse battery staple");
        assert_eq!(hash.len(), 64);
        assert!(hash.bytes().all(|b| b.is_ascii_hexdigit()));
        assert_ne!(hash, password_hash("Correct horse battery staple"));
    }

    #[test]
    fn malformed_credential_bodies_are_bad_requests() {
        assert!(decode_credentials(b"not json").is_err());
        assert!(decode_credentials(br#"{"login":"alice"}"#).is_err());
        assert!(decode_credentials(br#"{"login":"alice","password":"pw"}"#).is_ok());
    }
}
