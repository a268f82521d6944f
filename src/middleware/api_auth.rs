use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};

use crate::{error::ApiError, services::api_token_service::ApiTokenError, AppState};

/// Plaintext bearer token of the current API request, kept so logout can
/// revoke it.
#[derive(Debug, Clone)]
pub struct BearerToken(pub String);

pub fn extract_bearer_token(headers: &HeaderMap) -> Result<String, ApiError> {
    let auth_header = headers
        .get("authorization")
        .ok_or(ApiError::Unauthorized("Missing authorization header"))?
        .to_str()
        .map_err(|_| ApiError::Unauthorized("Invalid authorization format"))?;

    match auth_header.strip_prefix("Bearer ") {
        Some(token) if !token.trim().is_empty() => Ok(token.trim().to_string()),
        _ => Err(ApiError::Unauthorized("Invalid authorization format")),
    }
}

/// Rejects API requests without a live bearer token. On success the
/// `ValidatedToken` and the `BearerToken` are attached to the request.
pub async fn require_api_token(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_bearer_token(&headers)?;

    let validated = state
        .api_token_service
        .validate(&token)
        .await
        .map_err(|err| match err {
            ApiTokenError::InvalidToken => ApiError::Unauthorized("Invalid token"),
            ApiTokenError::Expired => ApiError::Unauthorized("Token expired"),
            ApiTokenError::DatabaseError(e) => ApiError::Internal(e.to_string()),
        })?;

    request.extensions_mut().insert(validated);
    request.extensions_mut().insert(BearerToken(token));

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_extract_bearer_token() {
        let mut headers = HeaderMap::new();
        assert!(matches!(
            extract_bearer_token(&headers),
            Err(ApiError::Unauthorized("Missing authorization header"))
        ));

        headers.insert("authorization", HeaderValue::from_static("Basic abc"));
        assert!(extract_bearer_token(&headers).is_err());

        headers.insert("authorization", HeaderValue::from_static("Bearer "));
        assert!(extract_bearer_token(&headers).is_err());

        headers.insert("authorization", HeaderValue::from_static("Bearer abc123"));
        assert_eq!(extract_bearer_token(&headers).unwrap(), "abc123");
    }
}
