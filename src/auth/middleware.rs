use axum::{
    body::Body,
    extract::State,
    http::{header, Request, StatusCode},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use crate::auth::session::{self, COOKIE_NAME};
use crate::AppState;

/// The authenticated caller, injected into request extensions for
/// downstream handlers.
#[derive(Clone, Copy, Debug)]
pub struct AuthUser {
    pub user_id: i64,
}

const INVALID_CREDENTIALS: &str = "Invalid credentials";
const INVALID_COOKIE: &str = "Invalid cookie";

/// Rejects requests without a valid `session` cookie, otherwise records
/// the verified user id on the request.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, (StatusCode, &'static str)> {
    let cookie_value = session_cookie(&request)
        .ok_or((StatusCode::UNAUTHORIZED, INVALID_CREDENTIALS))?;

    let user_id = session::verify(&cookie_value, &state.session_secret).map_err(|e| {
        tracing::debug!("rejected session cookie: {}", e);
        (StatusCode::UNAUTHORIZED, INVALID_COOKIE)
    })?;

    request.extensions_mut().insert(AuthUser { user_id });
    Ok(next.run(request).await)
}

/// Finds the `session` cookie across all `Cookie` headers.
fn session_cookie(request: &Request<Body>) -> Option<String> {
    request
        .headers()
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| {
            let (name, value) = pair.trim().split_once('=')?;
            (name == COOKIE_NAME).then(|| value.to_string())
        })
        .next()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn request_with_cookies(values: &[&str]) -> Request<Body> {
        let mut request = Request::new(Body::empty());
        for v in values {
            request
                .headers_mut()
                .append(header::COOKIE, HeaderValue::from_str(v).unwrap());
        }
        request
    }

    #[test]
    fn finds_session_among_other_cookies() {
        let request = request_with_cookies(&["theme=dark; session=abc123; lang=en"]);
        assert_eq!(session_cookie(&request), Some("abc123".to_string()));
    }

    #[test]
    fn finds_session_in_second_header() {
        let request = request_with_cookies(&["theme=dark", "session=abc123"]);
        assert_eq!(session_cookie(&request), Some("abc123".to_string()));
    }

    #[test]
    fn missing_session_yields_none() {
        let request = request_with_cookies(&["theme=dark; lang=en"]);
        assert_eq!(session_cookie(&request), None);
        let request = request_with_cookies(&[]);
        assert_eq!(session_cookie(&request), None);
    }
}
