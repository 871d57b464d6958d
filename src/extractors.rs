use axum::extract::FromRequestParts;
use axum::http::header;
use axum::http::request::Parts;

use crate::error::AppError;
use crate::state::AppState;

/// The external-auth identity asserted for this request.
///
/// Token verification is the auth provider's job (upstream of this service);
/// what reaches us is the provider-issued subject carried as a bearer
/// credential. This extractor is the only place that header is read.
#[derive(Debug, Clone)]
pub struct ExternalIdentity(pub String);

/// Extractor that requires an asserted identity.
/// Returns 401 if the request carries no bearer credential.
impl FromRequestParts<AppState> for ExternalIdentity {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        extract_bearer(parts)
            .map(ExternalIdentity)
            .ok_or(AppError::Unauthenticated)
    }
}

/// Optional identity extractor — returns None instead of 401 when the
/// request is anonymous. Used by read endpoints that annotate responses
/// (like state, is_following) only when a caller is present.
pub struct MaybeIdentity(pub Option<String>);

impl FromRequestParts<AppState> for MaybeIdentity {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(MaybeIdentity(extract_bearer(parts)))
    }
}

fn extract_bearer(parts: &Parts) -> Option<String> {
    let value = parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())?;

    let token = value.strip_prefix("Bearer ").or_else(|| value.strip_prefix("bearer "))?;
    let token = token.trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts_with_auth(value: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/");
        if let Some(v) = value {
            builder = builder.header(header::AUTHORIZATION, v);
        }
        let (parts, _) = builder.body(()).unwrap().into_parts();
        parts
    }

    #[test]
    fn extracts_bearer_token() {
        let parts = parts_with_auth(Some("Bearer ext-user-1"));
        assert_eq!(extract_bearer(&parts), Some("ext-user-1".to_string()));
    }

    #[test]
    fn accepts_lowercase_scheme() {
        let parts = parts_with_auth(Some("bearer ext-user-1"));
        assert_eq!(extract_bearer(&parts), Some("ext-user-1".to_string()));
    }

    #[test]
    fn missing_header_yields_none() {
        let parts = parts_with_auth(None);
        assert_eq!(extract_bearer(&parts), None);
    }

    #[test]
    fn empty_token_yields_none() {
        let parts = parts_with_auth(Some("Bearer   "));
        assert_eq!(extract_bearer(&parts), None);
    }

    #[test]
    fn non_bearer_scheme_yields_none() {
        let parts = parts_with_auth(Some("Basic dXNlcjpwYXNz"));
        assert_eq!(extract_bearer(&parts), None);
    }
}
