use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::{header, HeaderMap};
use axum::http::request::Parts;
use std::net::SocketAddr;

use crate::auth::session;
use crate::db::analytics::Visit;
use crate::db::models::User;
use crate::db::users;
use crate::error::AppError;
use crate::plans::{self, Plan};
use crate::state::AppState;

/// The authenticated user, the session token that identified them and the
/// plan their subscription grants.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: User,
    pub token: String,
    pub plan: &'static Plan,
}

impl CurrentUser {
    pub fn id(&self) -> &str {
        &self.user.id
    }

    pub fn plan(&self) -> &'static Plan {
        self.plan
    }
}

/// Extractor that requires authentication.
/// Returns 401 if no valid session found.
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_bearer_token(parts)
            .or_else(|| extract_cookie(&parts.headers, &state.config.auth.cookie_name))
            .ok_or(AppError::Unauthorized)?
            .to_string();

        let conn = state.db.get()?;
        let user = session::user_for_token(&conn, &token)?.ok_or(AppError::Unauthorized)?;
        let plan = plans::plan_for(&conn, &user)?;
        Ok(CurrentUser { user, token, plan })
    }
}

/// Optional user extractor: None instead of 401 when not authenticated.
pub struct MaybeUser(pub Option<CurrentUser>);

impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match CurrentUser::from_request_parts(parts, state).await {
            Ok(user) => Ok(MaybeUser(Some(user))),
            Err(AppError::Unauthorized) => Ok(MaybeUser(None)),
            Err(e) => Err(e),
        }
    }
}

/// Authenticated user whose role grants `admin.access`; 403 otherwise.
pub struct AdminUser(pub CurrentUser);

impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let current = CurrentUser::from_request_parts(parts, state).await?;
        let conn = state.db.get()?;
        if users::has_permission(&conn, current.user.role, "admin.access")? {
            Ok(AdminUser(current))
        } else {
            Err(AppError::forbidden("This action is unauthorized."))
        }
    }
}

/// Client details recorded with analytics events.
pub struct VisitInfo(pub Visit);

impl<S: Send + Sync> FromRequestParts<S> for VisitInfo {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header_value = |name: header::HeaderName| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        let ip = parts
            .headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .or_else(|| header_value(header::HeaderName::from_static("x-real-ip")))
            .or_else(|| {
                parts
                    .extensions
                    .get::<ConnectInfo<SocketAddr>>()
                    .map(|ConnectInfo(addr)| addr.ip().to_string())
            });

        Ok(VisitInfo(Visit::new(
            ip,
            header_value(header::USER_AGENT),
            header_value(header::REFERER),
        )))
    }
}

fn extract_bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

pub(crate) fn extract_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|s| s.split(';'))
        .map(|s| s.trim())
        .find_map(|cookie| {
            let mut split = cookie.splitn(2, '=');
            let key = split.next()?.trim();
            let val = split.next()?.trim();
            if key == name && !val.is_empty() {
                Some(val)
            } else {
                None
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts(headers: &[(&str, &str)]) -> Parts {
        let mut builder = Request::builder().uri("/");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn cookie_is_found_among_others() {
        let p = parts(&[("cookie", "theme=dark; linkfolio_session=abc123; x=y")]);
        assert_eq!(extract_cookie(&p.headers, "linkfolio_session"), Some("abc123"));
        assert_eq!(extract_cookie(&p.headers, "missing"), None);
    }

    #[test]
    fn bearer_token_is_parsed() {
        let p = parts(&[("authorization", "Bearer tok")]);
        assert_eq!(extract_bearer_token(&p), Some("tok"));
        let p = parts(&[("authorization", "Basic abc")]);
        assert_eq!(extract_bearer_token(&p), None);
    }

    #[tokio::test]
    async fn visit_prefers_forwarded_address() {
        let mut p = parts(&[
            ("x-forwarded-for", "203.0.113.7, 10.0.0.1"),
            (
                "user-agent",
                "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Mobile/15E148 Safari/604.1",
            ),
            ("referer", "https://twitter.com/"),
        ]);
        let VisitInfo(visit) = VisitInfo::from_request_parts(&mut p, &()).await.unwrap();
        assert_eq!(visit.ip.as_deref(), Some("203.0.113.7"));
        assert_eq!(visit.referrer.as_deref(), Some("https://twitter.com/"));
        assert_eq!(visit.client.device, "mobile");
        assert_eq!(visit.client.os, "iOS");
    }
}
