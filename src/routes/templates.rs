use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use validator::Validate;

use crate::db::models::CardTemplate;
use crate::db::templates::{self, TemplateFields};
use crate::db::users;
use crate::error::{AppError, AppResult};
use crate::extractors::{AdminUser, CurrentUser};
use crate::state::AppState;
use crate::validation::json_object;

fn json_array(value: &serde_json::Value) -> Result<(), validator::ValidationError> {
    if value.is_array() {
        Ok(())
    } else {
        Err(validator::ValidationError::new("array").with_message("must be an array.".into()))
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct TemplateRequest {
    #[validate(length(min = 1, max = 255, message = "The name must be between 1 and 255 characters."))]
    pub name: Option<String>,
    #[validate(length(max = 1000, message = "The description may not be greater than 1000 characters."))]
    pub description: Option<String>,
    #[validate(length(min = 1, max = 50, message = "The layout must be between 1 and 50 characters."))]
    pub layout: Option<String>,
    #[validate(custom(function = "json_object"))]
    pub color_scheme: Option<serde_json::Value>,
    #[validate(custom(function = "json_array"))]
    pub components: Option<serde_json::Value>,
    pub is_premium: Option<bool>,
    pub is_active: Option<bool>,
}

impl TemplateRequest {
    fn apply(self, fields: &mut TemplateFields) {
        if let Some(name) = self.name {
            fields.name = name.trim().to_string();
        }
        if let Some(description) = self.description {
            fields.description = description.trim().to_string();
        }
        if let Some(layout) = self.layout {
            fields.layout = layout.trim().to_string();
        }
        if let Some(color_scheme) = self.color_scheme {
            fields.color_scheme = color_scheme;
        }
        if let Some(components) = self.components {
            fields.components = components;
        }
        if let Some(is_premium) = self.is_premium {
            fields.is_premium = is_premium;
        }
        if let Some(is_active) = self.is_active {
            fields.is_active = is_active;
        }
    }
}

fn can_manage(conn: &rusqlite::Connection, current: &CurrentUser) -> AppResult<bool> {
    Ok(users::has_permission(conn, current.user.role, "admin.access")?)
}

/// GET /card-templates: active templates, or every template for admins.
pub async fn index(
    State(state): State<AppState>,
    current: CurrentUser,
) -> AppResult<Json<Vec<CardTemplate>>> {
    let conn = state.db.get()?;
    let include_inactive = can_manage(&conn, &current)?;
    Ok(Json(templates::list(&conn, include_inactive)?))
}

/// GET /card-templates/{id}
pub async fn show(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<CardTemplate>> {
    let conn = state.db.get()?;
    let include_inactive = can_manage(&conn, &current)?;
    let template = templates::find(&conn, &id)?
        .filter(|t| t.is_active || include_inactive)
        .ok_or(AppError::NotFound)?;
    Ok(Json(template))
}

/// POST /card-templates (admin)
pub async fn store(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Json(req): Json<TemplateRequest>,
) -> AppResult<(StatusCode, Json<CardTemplate>)> {
    req.validate()?;
    let name = req.name.as_deref().map(str::trim).unwrap_or_default();
    if name.is_empty() {
        return Err(AppError::field("name", "The name field is required."));
    }

    let conn = state.db.get()?;
    if templates::name_taken(&conn, name, None)? {
        return Err(AppError::field("name", "The name has already been taken."));
    }
    let mut fields = TemplateFields {
        name: String::new(),
        description: String::new(),
        layout: "classic".to_string(),
        color_scheme: serde_json::json!({}),
        components: serde_json::json!([]),
        is_premium: false,
        is_active: true,
    };
    req.apply(&mut fields);
    let template = templates::insert(&conn, &fields)?;
    tracing::info!("Admin {} created template {} ({})", admin.id(), template.id, template.name);
    Ok((StatusCode::CREATED, Json(template)))
}

/// PUT /card-templates/{id} (admin)
pub async fn update(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Path(id): Path<String>,
    Json(req): Json<TemplateRequest>,
) -> AppResult<Json<CardTemplate>> {
    req.validate()?;
    let conn = state.db.get()?;
    let template = templates::find(&conn, &id)?.ok_or(AppError::NotFound)?;

    let mut fields = TemplateFields::from(&template);
    req.apply(&mut fields);
    if fields.name.is_empty() {
        return Err(AppError::field("name", "The name field is required."));
    }
    if templates::name_taken(&conn, &fields.name, Some(&template.id))? {
        return Err(AppError::field("name", "The name has already been taken."));
    }
    Ok(Json(templates::update(&conn, &template.id, &fields)?))
}

/// DELETE /card-templates/{id} (admin); cards using it fall back to no template.
pub async fn destroy(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    let conn = state.db.get()?;
    if !templates::delete(&conn, &id)? {
        return Err(AppError::NotFound);
    }
    tracing::info!("Admin {} deleted template {}", admin.id(), id);
    Ok(StatusCode::NO_CONTENT)
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/card-templates", get(index).post(store))
        .route("/card-templates/{id}", get(show).put(update).delete(destroy))
}
