//! Session resolution extractors for Axum.

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{HeaderMap, header, request::Parts},
    response::{IntoResponse, Response},
};
use axum_extra::extract::CookieJar;
use lexcase_access::{AuthenticationError, CurrentUser, SessionId};
use lexcase_audit::RequestContext;
use std::convert::Infallible;
use std::sync::Arc;
use tracing::{debug, warn};

use super::db::{SessionRepository, UserRepository};
use crate::error::ApiError;
use crate::state::AppState;

/// Returns the token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// Finds the session token: the session cookie first, then a bearer header.
pub fn session_token(jar: &CookieJar, headers: &HeaderMap, cookie_name: &str) -> Option<SessionId> {
    jar.get(cookie_name)
        .map(|cookie| cookie.value().to_string())
        .filter(|value| !value.is_empty())
        .or_else(|| bearer_token(headers).map(str::to_string))
        .map(SessionId::new)
}

/// Resolves a session token to the acting user.
///
/// Expired sessions are deleted on sight.
pub async fn resolve_session(
    state: &AppState,
    token: Option<SessionId>,
) -> Result<CurrentUser, AuthenticationError> {
    let session_id = token.ok_or(AuthenticationError::MissingToken)?;
    let store_unavailable = |e: sqlx::Error| AuthenticationError::StoreUnavailable {
        details: e.to_string(),
    };

    let session_repo = SessionRepository::new(state.db_pool.clone());
    let session = session_repo
        .find_by_id(&session_id)
        .await
        .map_err(store_unavailable)?
        .ok_or_else(|| AuthenticationError::InvalidSession {
            session_id: session_id.to_string(),
        })?;

    if session.is_expired() {
        if let Err(e) = session_repo.delete(&session_id).await {
            warn!(error = %e, "failed to delete expired session");
        }
        return Err(AuthenticationError::SessionExpired {
            session_id: session_id.to_string(),
        });
    }

    let user_repo = UserRepository::new(state.db_pool.clone());
    let user = user_repo
        .find_by_id(session.user_id())
        .await
        .map_err(store_unavailable)?
        .ok_or(AuthenticationError::UserNotFound {
            user_id: session.user_id(),
        })?;

    Ok(CurrentUser::new(session, user))
}

/// Extractor for requiring an authenticated user.
pub struct RequireAuth(pub CurrentUser);

impl<S> FromRequestParts<S> for RequireAuth
where
    Arc<AppState>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = Arc::<AppState>::from_ref(state);
        let jar = CookieJar::from_headers(&parts.headers);
        let token = session_token(&jar, &parts.headers, &app_state.config.session.cookie_name);

        match resolve_session(&app_state, token).await {
            Ok(user) => Ok(RequireAuth(user)),
            Err(AuthenticationError::StoreUnavailable { details }) => {
                warn!(error = %details, "session lookup failed");
                Err(AuthRejection::InternalError)
            }
            Err(e) => {
                debug!(reason = %e, "request not authenticated");
                Err(AuthRejection::NotAuthenticated)
            }
        }
    }
}

/// Extractor for requiring an effective super admin.
pub struct RequireSuperAdmin(pub CurrentUser);

impl<S> FromRequestParts<S> for RequireSuperAdmin
where
    Arc<AppState>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let RequireAuth(user) = RequireAuth::from_request_parts(parts, state).await?;

        if !user.is_super_admin() {
            return Err(AuthRejection::SuperAdminRequired);
        }

        Ok(RequireSuperAdmin(user))
    }
}

/// Client address and agent for audit rows.
pub struct ClientContext(pub RequestContext);

impl<S> FromRequestParts<S> for ClientContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header_str = |name: &str| parts.headers.get(name).and_then(|v| v.to_str().ok());
        Ok(ClientContext(RequestContext::from_headers(
            header_str("x-forwarded-for"),
            header_str(header::USER_AGENT.as_str()),
        )))
    }
}

/// Rejection type for authentication extractors.
#[derive(Debug)]
pub enum AuthRejection {
    NotAuthenticated,
    SuperAdminRequired,
    InternalError,
}

impl From<AuthRejection> for ApiError {
    fn from(rejection: AuthRejection) -> Self {
        match rejection {
            AuthRejection::NotAuthenticated => ApiError::AuthenticationRequired,
            AuthRejection::SuperAdminRequired => ApiError::Forbidden,
            AuthRejection::InternalError => ApiError::internal("session store unavailable"),
        }
    }
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        ApiError::from(self).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_token_is_parsed() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc123"));
        assert_eq!(bearer_token(&headers), Some("abc123"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("bearer  xyz "));
        assert_eq!(bearer_token(&headers), Some("xyz"));
    }

    #[test]
    fn other_schemes_are_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic Zm9vOmJhcg=="));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), None);
    }

    #[test]
    fn cookie_wins_over_header() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("session=from-cookie"));
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer from-header"));
        let jar = CookieJar::from_headers(&headers);

        let token = session_token(&jar, &headers, "session").expect("token");
        assert_eq!(token.as_str(), "from-cookie");
    }

    #[test]
    fn header_used_without_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer from-header"));
        let jar = CookieJar::from_headers(&headers);

        let token = session_token(&jar, &headers, "session").expect("token");
        assert_eq!(token.as_str(), "from-header");
        assert!(session_token(&CookieJar::new(), &HeaderMap::new(), "session").is_none());
    }

    #[test]
    fn rejections_map_to_status_codes() {
        use axum::http::StatusCode;
        assert_eq!(
            AuthRejection::NotAuthenticated.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AuthRejection::SuperAdminRequired.into_response().status(),
            StatusCode::FORBIDDEN
        );
    }
}
