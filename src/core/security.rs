use std::env;
use std::fs;
use std::path::Path;

use axum::http::HeaderMap;
use uuid::Uuid;

use crate::core::errors::ApiError;

pub const API_KEY_HEADER: &str = "x-api-key";
pub const USER_ID_HEADER: &str = "x-user-id";

#[derive(Debug, Clone)]
pub struct SessionToken {
    value: String,
}

impl SessionToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

/// The signed-in user a turn or request acts for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSession {
    pub user_id: String,
}

pub fn init_session_token(data_dir: &Path) -> SessionToken {
    if let Ok(token) = env::var("MENTOR_RAG_SESSION_TOKEN") {
        if !token.trim().is_empty() {
            return SessionToken { value: token };
        }
    }

    let token = format!("{}{}", Uuid::new_v4(), Uuid::new_v4());
    let token_path = data_dir.join(".session_token");
    if let Some(parent) = token_path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    if let Err(err) = fs::write(&token_path, &token) {
        tracing::warn!("Failed to write session token: {}", err);
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Ok(metadata) = fs::metadata(&token_path) {
            let mut perms = metadata.permissions();
            perms.set_mode(0o600);
            let _ = fs::set_permissions(&token_path, perms);
        }
    }

    SessionToken { value: token }
}

pub fn require_api_key(headers: &HeaderMap, expected: &SessionToken) -> Result<(), ApiError> {
    let header_value = headers
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("");

    if header_value.is_empty() {
        return Err(ApiError::Unauthorized);
    }

    if header_value != expected.value() {
        return Err(ApiError::Unauthorized);
    }

    Ok(())
}

/// Reads the user named by `x-user-id`. Missing or blank means anonymous.
pub fn user_session(headers: &HeaderMap) -> Option<AuthSession> {
    headers
        .get(USER_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(|value| AuthSession {
            user_id: value.to_string(),
        })
}

/// Requires both a valid api key and a named user.
pub fn require_user(headers: &HeaderMap, expected: &SessionToken) -> Result<AuthSession, ApiError> {
    require_api_key(headers, expected)?;
    user_session(headers).ok_or(ApiError::Unauthorized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn require_api_key_accepts_valid_header() {
        let expected = SessionToken::new("secret");
        let mut headers = HeaderMap::new();
        headers.insert(API_KEY_HEADER, HeaderValue::from_static("secret"));

        let result = require_api_key(&headers, &expected);

        assert!(result.is_ok());
    }

    #[test]
    fn require_api_key_rejects_missing_or_invalid_header() {
        let expected = SessionToken::new("secret");
        let headers = HeaderMap::new();

        let missing = require_api_key(&headers, &expected);
        assert!(matches!(missing, Err(ApiError::Unauthorized)));

        let mut invalid_headers = HeaderMap::new();
        invalid_headers.insert(API_KEY_HEADER, HeaderValue::from_static("wrong"));
        let invalid = require_api_key(&invalid_headers, &expected);
        assert!(matches!(invalid, Err(ApiError::Unauthorized)));
    }

    #[test]
    fn require_api_key_rejects_non_utf8_header_value() {
        let expected = SessionToken::new("secret");
        let mut headers = HeaderMap::new();
        let non_utf8 = HeaderValue::from_bytes(&[0xFF, 0xFE, 0xFD])
            .expect("header value bytes should be accepted");
        headers.insert(API_KEY_HEADER, non_utf8);

        let result = require_api_key(&headers, &expected);

        assert!(matches!(result, Err(ApiError::Unauthorized)));
    }

    #[test]
    fn blank_user_header_is_anonymous() {
        let mut headers = HeaderMap::new();
        assert_eq!(user_session(&headers), None);

        headers.insert(USER_ID_HEADER, HeaderValue::from_static("   "));
        assert_eq!(user_session(&headers), None);

        headers.insert(USER_ID_HEADER, HeaderValue::from_static("user-1"));
        assert_eq!(
            user_session(&headers),
            Some(AuthSession {
                user_id: "user-1".to_string()
            })
        );
    }

    #[test]
    fn require_user_needs_key_and_user() {
        let expected = SessionToken::new("secret");
        let mut headers = HeaderMap::new();
        headers.insert(API_KEY_HEADER, HeaderValue::from_static("secret"));
        assert!(matches!(
            require_user(&headers, &expected),
            Err(ApiError::Unauthorized)
        ));

        headers.insert(USER_ID_HEADER, HeaderValue::from_static("user-1"));
        let session = require_user(&headers, &expected).unwrap();
        assert_eq!(session.user_id, "user-1");
    }

    #[test]
    fn generated_token_is_written_to_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        if env::var("MENTOR_RAG_SESSION_TOKEN").is_ok() {
            return;
        }
        let token = init_session_token(dir.path());
        let written = fs::read_to_string(dir.path().join(".session_token")).unwrap();
        assert_eq!(written, token.value());
    }
}
