use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::Deserialize;
use validator::Validate;

use crate::auth::guards;
use crate::db::cards::{self, ComponentFields};
use crate::db::models::{CardComponent, ComponentKind};
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::routes::{blank_to_null, ReorderRequest};
use crate::state::AppState;
use crate::validation::{json_object, nullable, patch};

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct ComponentRequest {
    #[serde(rename = "type", alias = "kind")]
    pub kind: Option<ComponentKind>,
    #[serde(deserialize_with = "nullable")]
    #[validate(length(max = 255, message = "The title may not be greater than 255 characters."))]
    pub title: Option<Option<String>>,
    #[serde(deserialize_with = "nullable")]
    #[validate(length(max = 5000, message = "The content may not be greater than 5000 characters."))]
    pub content: Option<Option<String>>,
    #[validate(custom(function = "json_object"))]
    pub settings: Option<serde_json::Value>,
    pub is_active: Option<bool>,
}

impl ComponentRequest {
    fn apply(&mut self, fields: &mut ComponentFields) {
        blank_to_null(&mut self.title);
        if let Some(kind) = self.kind {
            fields.kind = kind;
        }
        patch(&mut fields.title, self.title.take());
        // Content keeps its whitespace; only null clears it.
        if let Some(content) = self.content.take() {
            fields.content = content;
        }
        if let Some(settings) = self.settings.take() {
            fields.settings = settings;
        }
        if let Some(is_active) = self.is_active {
            fields.is_active = is_active;
        }
    }
}

/// GET /cards/{id}/components
pub async fn index(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(card_id): Path<String>,
) -> AppResult<Json<Vec<CardComponent>>> {
    let conn = state.db.get()?;
    let card = guards::owned_card(&conn, &current, &card_id)?;
    Ok(Json(cards::list_components(&conn, &card.id, false)?))
}

/// POST /cards/{id}/components
pub async fn store(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(card_id): Path<String>,
    Json(mut req): Json<ComponentRequest>,
) -> AppResult<(StatusCode, Json<CardComponent>)> {
    let conn = state.db.get()?;
    let card = guards::owned_card(&conn, &current, &card_id)?;
    req.validate()?;
    let kind = req
        .kind
        .ok_or_else(|| AppError::field("type", "The type field is required."))?;

    let mut fields = ComponentFields {
        kind,
        title: None,
        content: None,
        settings: serde_json::json!({}),
        is_active: true,
    };
    req.apply(&mut fields);
    let component = cards::insert_component(&conn, &card.id, &fields)?;
    Ok((StatusCode::CREATED, Json(component)))
}

/// PUT /card-components/{id}
pub async fn update(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
    Json(mut req): Json<ComponentRequest>,
) -> AppResult<Json<CardComponent>> {
    let conn = state.db.get()?;
    let (component, _card) = guards::owned_component(&conn, &current, &id)?;
    req.validate()?;

    let mut fields = ComponentFields::from(&component);
    req.apply(&mut fields);
    Ok(Json(cards::update_component(&conn, &component.id, &fields)?))
}

/// DELETE /card-components/{id}
pub async fn destroy(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    let conn = state.db.get()?;
    let (component, _card) = guards::owned_component(&conn, &current, &id)?;
    cards::delete_component(&conn, &component.id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /cards/{id}/components/reorder
pub async fn reorder(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(card_id): Path<String>,
    Json(req): Json<ReorderRequest>,
) -> AppResult<Json<Vec<CardComponent>>> {
    let mut conn = state.db.get()?;
    let card = guards::owned_card(&conn, &current, &card_id)?;
    cards::reorder_components(&mut conn, &card.id, &req.ids)?;
    Ok(Json(cards::list_components(&conn, &card.id, false)?))
}

pub fn router() -> Router<AppState> {
    let mut router = Router::new()
        .route("/card-components/{id}", put(update).delete(destroy));
    for prefix in ["/cards", "/digital-cards"] {
        router = router
            .route(&format!("{}/{{id}}/components", prefix), get(index).post(store))
            .route(&format!("{}/{{id}}/components/reorder", prefix), post(reorder));
    }
    router
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_accepts_type_key() {
        let req: ComponentRequest =
            serde_json::from_str(r#"{"type":"video","settings":{"autoplay":false}}"#).unwrap();
        assert_eq!(req.kind, Some(ComponentKind::Video));
        assert!(req.validate().is_ok());
    }

    #[test]
    fn settings_must_be_an_object() {
        let req: ComponentRequest = serde_json::from_str(r#"{"settings":[1,2]}"#).unwrap();
        assert!(req.validate().is_err());
    }

    #[test]
    fn unknown_type_is_rejected() {
        assert!(serde_json::from_str::<ComponentRequest>(r#"{"type":"hologram"}"#).is_err());
    }
}
