use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::auth::handlers::UserResource;
use crate::db::analytics::{self, PlatformTotals};
use crate::db::models::Role;
use crate::db::uploads;
use crate::db::users::{self, UserSummary};
use crate::error::{AppError, AppResult};
use crate::extractors::AdminUser;
use crate::plans;
use crate::state::AppState;
use crate::storage::media;

const PER_PAGE_MAX: u32 = 100;

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PageQuery {
    pub page: u32,
    pub per_page: u32,
}

impl Default for PageQuery {
    fn default() -> Self {
        Self { page: 1, per_page: 20 }
    }
}

#[derive(Debug, Serialize)]
pub struct UserPage {
    pub data: Vec<UserSummary>,
    pub total: i64,
    pub page: u32,
    pub per_page: u32,
}

#[derive(Debug, Deserialize)]
pub struct RoleRequest {
    pub role: Role,
}

/// GET /admin/users
pub async fn users_index(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Query(query): Query<PageQuery>,
) -> AppResult<Json<UserPage>> {
    let page = query.page.max(1);
    let per_page = query.per_page.clamp(1, PER_PAGE_MAX);
    let offset = i64::from(page - 1) * i64::from(per_page);

    let conn = state.db.get()?;
    Ok(Json(UserPage {
        data: users::list_with_counts(&conn, i64::from(per_page), offset)?,
        total: users::count(&conn)?,
        page,
        per_page,
    }))
}

/// PUT /admin/users/{id}/role
pub async fn update_role(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
    Json(req): Json<RoleRequest>,
) -> AppResult<Json<UserResource>> {
    if id == admin.id() {
        return Err(AppError::forbidden("You cannot change your own role."));
    }
    let conn = state.db.get()?;
    let user = users::find(&conn, &id)?.ok_or(AppError::NotFound)?;
    users::set_role(&conn, &user.id, req.role)?;
    tracing::info!("Admin {} set role of {} to {}", admin.id(), user.id, req.role);

    let user = users::get(&conn, &user.id)?;
    let plan = plans::plan_for(&conn, &user)?;
    Ok(Json(UserResource::new(&state, user, plan)))
}

/// DELETE /admin/users/{id}: removes the account, its pages and its files.
pub async fn destroy_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    if id == admin.id() {
        return Err(AppError::forbidden("You cannot delete your own account."));
    }
    let blobs = {
        let conn = state.db.get()?;
        let user = users::find(&conn, &id)?.ok_or(AppError::NotFound)?;
        let blobs = uploads::paths_for_user(&conn, &user.id)?;
        users::delete(&conn, &user.id)?;
        blobs
    };
    media::remove_all(&state, &blobs).await;
    tracing::info!("Admin {} deleted user {} ({} files)", admin.id(), id, blobs.len());
    Ok(StatusCode::NO_CONTENT)
}

/// GET /admin/stats
pub async fn stats(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
) -> AppResult<Json<PlatformTotals>> {
    let conn = state.db.get()?;
    Ok(Json(analytics::platform_totals(&conn)?))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/admin/users", get(users_index))
        .route("/admin/users/{id}/role", put(update_role))
        .route("/admin/users/{id}", delete(destroy_user))
        .route("/admin/stats", get(stats))
}
