use axum::extract::{Multipart, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::auth::{password, session};
use crate::config::AuthConfig;
use crate::db::models::{Role, User};
use crate::db::users;
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::plans::{self, Plan};
use crate::state::AppState;
use crate::storage::{media, upload};

// -- Request types --

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 255, message = "The name field is required."))]
    pub name: String,
    #[validate(email(message = "The email must be a valid email address."))]
    pub email: String,
    #[validate(
        length(min = 8, message = "The password must be at least 8 characters."),
        must_match(other = "password_confirmation", message = "The password confirmation does not match.")
    )]
    pub password: String,
    pub password_confirmation: String,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct LoginRequest {
    #[validate(email(message = "The email must be a valid email address."))]
    pub email: String,
    #[validate(length(min = 1, message = "The password field is required."))]
    pub password: String,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct ProfileRequest {
    #[validate(length(min = 1, max = 255, message = "The name field is required."))]
    pub name: String,
    #[validate(email(message = "The email must be a valid email address."))]
    pub email: String,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct PasswordRequest {
    #[validate(length(min = 1, message = "The current password field is required."))]
    pub current_password: String,
    #[validate(
        length(min = 8, message = "The password must be at least 8 characters."),
        must_match(other = "password_confirmation", message = "The password confirmation does not match.")
    )]
    pub password: String,
    pub password_confirmation: String,
}

// -- Response types --

#[derive(Debug, Serialize)]
pub struct UserResource {
    #[serde(flatten)]
    pub user: User,
    pub photo_url: Option<String>,
    pub plan: &'static Plan,
}

impl UserResource {
    pub fn new(state: &AppState, user: User, plan: &'static Plan) -> Self {
        Self {
            photo_url: state.storage_url(user.photo_path.as_deref()),
            plan,
            user,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: UserResource,
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    #[serde(flatten)]
    pub user: UserResource,
    pub permissions: Vec<String>,
}

// -- Cookie helpers --

fn session_cookie(auth: &AuthConfig, token: &str) -> String {
    let max_age_secs = auth.session_hours * 3600;
    format!(
        "{}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}",
        auth.cookie_name, token, max_age_secs
    )
}

fn clear_session_cookie(auth: &AuthConfig) -> String {
    format!(
        "{}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0",
        auth.cookie_name
    )
}

fn signed_in(
    state: &AppState,
    status: StatusCode,
    user: User,
    plan: &'static Plan,
    token: String,
) -> Response {
    let cookie = session_cookie(&state.config.auth, &token);
    let body = AuthResponse {
        user: UserResource::new(state, user, plan),
        token,
    };
    (status, [(header::SET_COOKIE, cookie)], Json(body)).into_response()
}

// -- Handlers --

/// POST /register
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> AppResult<Response> {
    req.validate()?;
    {
        let conn = state.db.get()?;
        if users::email_taken(&conn, &req.email, None)? {
            return Err(AppError::field("email", "The email has already been taken."));
        }
    }

    let hash = password::hash_blocking(req.password, state.config.auth.bcrypt_cost).await?;

    let conn = state.db.get()?;
    let user = users::insert(&conn, req.name.trim(), &req.email, &hash, Role::Free)?;
    let token = session::create_session(&conn, &user.id, state.config.auth.session_hours)?;
    let plan = plans::plan_for(&conn, &user)?;
    tracing::info!("Registered user {} ({})", user.id, user.email);

    Ok(signed_in(&state, StatusCode::CREATED, user, plan, token))
}

/// POST /login
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> AppResult<Response> {
    req.validate()?;
    let invalid = || AppError::field("email", "These credentials do not match our records.");

    let user = {
        let conn = state.db.get()?;
        users::find_by_email(&conn, &req.email)?.ok_or_else(invalid)?
    };
    if !password::verify_blocking(req.password, user.password_hash.clone()).await? {
        return Err(invalid());
    }

    let conn = state.db.get()?;
    session::purge_expired(&conn, &user.id)?;
    let token = session::create_session(&conn, &user.id, state.config.auth.session_hours)?;
    let plan = plans::plan_for(&conn, &user)?;
    tracing::info!("User {} logged in", user.id);

    Ok(signed_in(&state, StatusCode::OK, user, plan, token))
}

/// POST /logout
pub async fn logout(State(state): State<AppState>, current: CurrentUser) -> AppResult<Response> {
    let conn = state.db.get()?;
    session::delete_session(&conn, &current.token)?;

    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, clear_session_cookie(&state.config.auth))],
        Json(serde_json::json!({ "message": "Logged out" })),
    )
        .into_response())
}

/// GET /user
pub async fn me(State(state): State<AppState>, current: CurrentUser) -> AppResult<Json<MeResponse>> {
    let conn = state.db.get()?;
    let permissions = users::permissions_for(&conn, current.user.role)?;
    Ok(Json(MeResponse {
        user: UserResource::new(&state, current.user, current.plan),
        permissions,
    }))
}

/// PUT /profile
pub async fn update_profile(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(req): Json<ProfileRequest>,
) -> AppResult<Json<UserResource>> {
    req.validate()?;
    let conn = state.db.get()?;
    if users::email_taken(&conn, &req.email, Some(current.id()))? {
        return Err(AppError::field("email", "The email has already been taken."));
    }
    users::update_profile(&conn, current.id(), req.name.trim(), &req.email)?;
    let user = users::get(&conn, current.id())?;
    Ok(Json(UserResource::new(&state, user, current.plan)))
}

/// POST /profile/photo (multipart `photo`)
pub async fn upload_photo(
    State(state): State<AppState>,
    current: CurrentUser,
    multipart: Multipart,
) -> AppResult<Json<UserResource>> {
    let mut parts = upload::read_files(multipart).await?;
    let photo = upload::take(&mut parts, "photo")?;
    photo.validate_image(state.config.storage.max_upload_bytes)?;

    let user_id = current.user.id.clone();
    media::replace(
        &state,
        &current.user,
        "avatars",
        &photo,
        current.user.photo_path.as_deref(),
        |conn, path| users::update_photo(conn, &user_id, Some(path)),
    )
    .await?;

    let conn = state.db.get()?;
    let user = users::get(&conn, current.id())?;
    Ok(Json(UserResource::new(&state, user, current.plan)))
}

/// PUT /profile/password; other sessions are signed out.
pub async fn update_password(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(req): Json<PasswordRequest>,
) -> AppResult<Json<serde_json::Value>> {
    req.validate()?;
    if !password::verify_blocking(req.current_password, current.user.password_hash.clone()).await? {
        return Err(AppError::field(
            "current_password",
            "The provided password does not match your current password.",
        ));
    }

    let hash = password::hash_blocking(req.password, state.config.auth.bcrypt_cost).await?;
    let conn = state.db.get()?;
    users::update_password(&conn, current.id(), &hash)?;
    let revoked = session::delete_other_sessions(&conn, current.id(), &current.token)?;
    tracing::info!("User {} changed password, {} other sessions revoked", current.id(), revoked);

    Ok(Json(serde_json::json!({ "message": "Password updated" })))
}
