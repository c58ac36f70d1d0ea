pub mod admin;
pub mod appointments;
pub mod assets;
pub mod auth;
pub mod bio_link_items;
pub mod bio_links;
pub mod card_components;
pub mod cards;
pub mod home;
pub mod public;
pub mod subscriptions;
pub mod templates;

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::auth::password;
use crate::config::CorsConfig;
use crate::error::{AppError, AppResult};
use crate::plans::Plan;
use crate::slug::{slugify, unique_slug};
use crate::state::AppState;

// -- Shared request helpers --

/// Blank strings in a nullable patch clear the column.
pub fn blank_to_null(value: &mut Option<Option<String>>) {
    if matches!(value, Some(Some(v)) if v.trim().is_empty()) {
        *value = Some(None);
    }
}

/// Hash a password patch: `Some(Some(hash))` sets protection, `Some(None)` lifts it.
pub async fn hash_password_patch(
    state: &AppState,
    plan: &Plan,
    value: Option<Option<String>>,
) -> AppResult<Option<Option<String>>> {
    match value {
        None => Ok(None),
        Some(None) => Ok(Some(None)),
        Some(Some(plain)) => {
            plan.require_password_protection()?;
            let hash = password::hash_blocking(plain, state.config.auth.bcrypt_cost).await?;
            Ok(Some(Some(hash)))
        }
    }
}

/// Pick the slug for a page. A requested slug is normalised and must be
/// free; otherwise the current slug stays, or one is derived from `fallback`.
pub fn resolve_slug(
    requested: Option<&str>,
    fallback: &str,
    current: Option<&str>,
    mut taken: impl FnMut(&str) -> rusqlite::Result<bool>,
) -> AppResult<String> {
    if let Some(requested) = requested {
        let slug = slugify(requested);
        if Some(slug.as_str()) != current && taken(&slug)? {
            return Err(AppError::field("slug", "The slug has already been taken."));
        }
        return Ok(slug);
    }
    if let Some(current) = current {
        return Ok(current.to_string());
    }
    Ok(unique_slug(&slugify(fallback), taken)?)
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct StatsQuery {
    pub days: Option<u32>,
}

/// Requested analytics window, clamped to what the plan keeps.
pub fn analytics_window(plan: &Plan, requested: Option<u32>) -> u32 {
    let max = plan.limits.analytics_days.max(1);
    requested.unwrap_or(max).clamp(1, max)
}

#[derive(Debug, Deserialize)]
pub struct ReorderRequest {
    pub ids: Vec<String>,
}

// -- Router assembly --

/// Every JSON endpoint; mounted at the root and again under `/api`.
pub fn api_router() -> Router<AppState> {
    Router::new()
        .merge(auth::router())
        .merge(cards::router())
        .merge(card_components::router())
        .merge(bio_links::router())
        .merge(bio_link_items::router())
        .merge(templates::router())
        .merge(subscriptions::router())
        .merge(appointments::router())
        .merge(admin::router())
}

fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT]);

    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin {:?}", origin);
                None
            }
        })
        .collect();

    if origins.is_empty() {
        layer.allow_origin(Any)
    } else {
        layer
            .allow_origin(AllowOrigin::list(origins))
            .allow_credentials(true)
    }
}

pub fn build_router(state: AppState) -> Router {
    let api = api_router();
    // Multipart framing plus two image fields on one request.
    let body_limit = state.config.storage.max_upload_bytes * 3;
    // Blobs share the app origin, so browsers must never sniff or run them.
    let storage = ServiceBuilder::new()
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::CONTENT_SECURITY_POLICY,
            HeaderValue::from_static("sandbox; default-src 'none'"),
        ))
        .service(ServeDir::new(state.config.uploads_path()));

    Router::new()
        .route("/", get(home::index))
        .route("/assets/{*path}", get(assets::serve))
        .merge(public::router())
        .merge(api.clone())
        .nest("/api", api)
        .nest_service("/storage", storage)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors_layer(&state.config.cors))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
