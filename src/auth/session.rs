//! HMAC-signed session cookies.
//!
//! The cookie value is `hex( user_id_ascii ‖ HMAC-SHA256(key, user_id_ascii) )`
//! where `key = SHA-256(secret)`. The cookie authenticates but does not
//! encrypt: the user id is readable, forging one requires the secret.

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

pub const COOKIE_NAME: &str = "session";
pub const COOKIE_PATH: &str = "/";

/// Length of the HMAC-SHA256 tag at the end of a decoded cookie.
const SIGNATURE_LEN: usize = 32;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("malformed session cookie")]
    Malformed,
    #[error("session signature mismatch")]
    BadSignature,
}

fn mac_for(secret: &[u8]) -> HmacSha256 {
    let key = Sha256::digest(secret);
    HmacSha256::new_from_slice(&key).expect("HMAC can take key of any size")
}

/// Issues a cookie value binding this user id to the process secret.
pub fn issue(user_id: i64, secret: &[u8]) -> String {
    let uid = user_id.to_string();
    let mut mac = mac_for(secret);
    mac.update(uid.as_bytes());
    let tag = mac.finalize().into_bytes();

    let mut session = uid.into_bytes();
    session.extend_from_slice(&tag);
    hex::encode(session)
}

/// Verifies a cookie value and returns the embedded user id.
///
/// The tag comparison is constant-time (`Mac::verify_slice`).
pub fn verify(cookie_value: &str, secret: &[u8]) -> Result<i64, SessionError> {
    let session = hex::decode(cookie_value).map_err(|_| SessionError::Malformed)?;
    if session.len() <= SIGNATURE_LEN {
        return Err(SessionError::Malformed);
    }

    let (uid, tag) = session.split_at(session.len() - SIGNATURE_LEN);
    let mut mac = mac_for(secret);
    mac.update(uid);
    mac.verify_slice(tag)
        .map_err(|_| SessionError::BadSignature)?;

    std::str::from_utf8(uid)
        .map_err(|_| SessionError::Malformed)?
        .parse::<i64>()
        .map_err(|_| SessionError::Malformed)
}

/// Renders the `Set-Cookie` header value for a fresh session. Session
/// scoped: no Expires or Max-Age, so it dies with the browser session.
pub fn set_cookie_header(user_id: i64, secret: &[u8]) -> String {
    format!(
        "{}={}; Path={}",
        COOKIE_NAME,
        issue(user_id, secret),
        COOKIE_PATH
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"test-secret-key!";

    #[test]
    fn round_trip() {
        for user_id in [1i64, 42, 999_999_999_999] {
            let cookie = issue(user_id, SECRET);
            assert_eq!(verify(&cookie, SECRET), Ok(user_id));
        }
    }

    #[test]
    fn flipping_any_nibble_rejects() {
        let cookie = issue(7, SECRET);
        for i in 0..cookie.len() {
            let mut forged: Vec<u8> = cookie.bytes().collect();
            forged[i] = if forged[i] == b'0' { b'1' } else { b'0' };
            let forged = String::from_utf8(forged).unwrap();
            if forged == cookie {
                continue;
            }
            assert!(verify(&forged, SECRET).is_err(), "flip at {} accepted", i);
        }
    }

    #[test]
    fn wrong_secret_rejects() {
        let cookie = issue(7, SECRET);
        assert_eq!(
            verify(&cookie, b"another-secret"),
            Err(SessionError::BadSignature)
        );
    }

    #[test]
    fn too_short_values_are_malformed() {
        // 32 decoded bytes carries a tag but no user id.
        let short = hex::encode([0u8; 32]);
        assert_eq!(verify(&short, SECRET), Err(SessionError::Malformed));
        assert_eq!(verify("", SECRET), Err(SessionError::Malformed));
        assert_eq!(verify("zz", SECRET), Err(SessionError::Malformed));
    }

    #[test]
    fn set_cookie_header_shape() {
        let header = set_cookie_header(12, SECRET);
        assert!(header.starts_with("session="));
        assert!(header.ends_with("; Path=/"));
        assert!(!header.contains("Expires"));
        assert!(!header.contains("Max-Age"));
    }
}
