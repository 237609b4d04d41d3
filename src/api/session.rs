//! Login and refresh handlers.

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::{HeaderMap, HeaderValue, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tracing::debug;

use super::AppState;
use super::error::ApiError;
use crate::auth::{AuthError, LoginRequest, UserPrincipal};

/// Cookie carrying the refresh token.
pub const REFRESH_COOKIE: &str = "refresh_token";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest {
    refresh_token: Option<String>,
}

fn principal_response(prefix: &str, principal: UserPrincipal) -> Response {
    let authorization = format!("{}{}", prefix, principal.access_token);
    let mut response = Json(principal).into_response();
    if let Ok(value) = HeaderValue::from_str(&authorization) {
        response.headers_mut().insert(header::AUTHORIZATION, value);
    }
    response
}

fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim())
        .filter(|value| !value.is_empty())
}

/// Refresh token candidates, cookie first, then the JSON body.
fn refresh_tokens_from(headers: &HeaderMap, body: &[u8]) -> Vec<String> {
    let mut tokens = Vec::new();
    if let Some(token) = cookie_value(headers, REFRESH_COOKIE) {
        tokens.push(token.to_string());
    }

    let from_body = serde_json::from_slice::<RefreshRequest>(body)
        .ok()
        .and_then(|req| req.refresh_token)
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty());
    if let Some(token) = from_body
        && !tokens.contains(&token)
    {
        tokens.push(token);
    }

    tokens
}

/// Token failures that let the next candidate be tried. Subject refusals and
/// internal errors end the attempt.
fn is_unusable_token(err: &AuthError) -> bool {
    matches!(
        err,
        AuthError::MalformedToken(_) | AuthError::ExpiredToken | AuthError::EmptyToken
    )
}

pub(super) async fn login(State(state): State<AppState>, body: Bytes) -> Result<Response, ApiError> {
    let request = LoginRequest::from_json(&body)?;
    let principal = state.authenticator.login(&request).await?;
    Ok(principal_response(&state.token_prefix, principal))
}

pub(super) async fn refresh(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let mut last_err = AuthError::EmptyToken;
    for token in refresh_tokens_from(&headers, &body) {
        match state.refresher.refresh(&token).await {
            Ok(principal) => return Ok(principal_response(&state.token_prefix, principal)),
            Err(err) if is_unusable_token(&err) => {
                debug!("refresh token candidate rejected: {}", err);
                last_err = err;
            }
            Err(err) => return Err(err.into()),
        }
    }
    Err(last_err.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers_with_cookie(cookie: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_str(cookie).unwrap());
        headers
    }

    #[test]
    fn test_cookie_comes_before_body() {
        let headers = headers_with_cookie("theme=dark; refresh_token=from-cookie");
        let tokens = refresh_tokens_from(&headers, br#"{"refreshToken":"from-body"}"#);
        assert_eq!(tokens, vec!["from-cookie".to_string(), "from-body".to_string()]);
    }

    #[test]
    fn test_body_only() {
        let tokens = refresh_tokens_from(&HeaderMap::new(), br#"{"refreshToken":"from-body"}"#);
        assert_eq!(tokens, vec!["from-body".to_string()]);
    }

    #[test]
    fn test_same_token_is_tried_once() {
        let headers = headers_with_cookie("refresh_token=same");
        let tokens = refresh_tokens_from(&headers, br#"{"refreshToken":"same"}"#);
        assert_eq!(tokens, vec!["same".to_string()]);
    }

    #[test]
    fn test_missing_or_blank_token() {
        assert!(refresh_tokens_from(&HeaderMap::new(), b"").is_empty());
        assert!(refresh_tokens_from(&HeaderMap::new(), br#"{"refreshToken":" "}"#).is_empty());
        assert!(refresh_tokens_from(&headers_with_cookie("refresh_token="), b"{}").is_empty());
    }

    #[test]
    fn test_only_token_failures_fall_through() {
        assert!(is_unusable_token(&AuthError::MalformedToken("x".into())));
        assert!(is_unusable_token(&AuthError::ExpiredToken));
        assert!(!is_unusable_token(&AuthError::SecurityException("locked".into())));
        assert!(!is_unusable_token(&AuthError::Internal("db".into())));
    }
}
