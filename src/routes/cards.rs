use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::auth::{guards, password};
use crate::db::analytics::{self, CardAction, CardStats};
use crate::db::cards::{self, CardFields};
use crate::db::models::{Card, CardComponent};
use crate::db::templates;
use crate::error::{AppError, AppResult};
use crate::extractors::{CurrentUser, VisitInfo};
use crate::plans::Plan;
use crate::routes::{analytics_window, blank_to_null, hash_password_patch, resolve_slug, StatsQuery};
use crate::state::AppState;
use crate::storage::{media, upload};
use crate::validation::{hex_color, nullable, patch};

/// Card payload for create and partial update.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct CardRequest {
    #[validate(length(min = 1, max = 255, message = "The name must be between 1 and 255 characters."))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 80, message = "The slug must be between 1 and 80 characters."))]
    pub slug: Option<String>,
    #[serde(deserialize_with = "nullable")]
    #[validate(length(max = 255, message = "The title may not be greater than 255 characters."))]
    pub title: Option<Option<String>>,
    #[serde(deserialize_with = "nullable")]
    #[validate(length(max = 255, message = "The company may not be greater than 255 characters."))]
    pub company: Option<Option<String>>,
    #[serde(deserialize_with = "nullable")]
    #[validate(email(message = "The email must be a valid email address."))]
    pub email: Option<Option<String>>,
    #[serde(deserialize_with = "nullable")]
    #[validate(length(max = 50, message = "The phone may not be greater than 50 characters."))]
    pub phone: Option<Option<String>>,
    #[serde(deserialize_with = "nullable")]
    #[validate(url(message = "The website must be a valid URL."))]
    pub website: Option<Option<String>>,
    #[serde(deserialize_with = "nullable")]
    #[validate(length(max = 500, message = "The address may not be greater than 500 characters."))]
    pub address: Option<Option<String>>,
    #[serde(deserialize_with = "nullable")]
    #[validate(length(max = 2000, message = "The bio may not be greater than 2000 characters."))]
    pub bio: Option<Option<String>>,
    #[serde(deserialize_with = "nullable")]
    pub template_id: Option<Option<String>>,
    #[validate(custom(function = "hex_color"))]
    pub primary_color: Option<String>,
    #[validate(custom(function = "hex_color"))]
    pub secondary_color: Option<String>,
    #[validate(custom(function = "hex_color"))]
    pub text_color: Option<String>,
    pub is_public: Option<bool>,
    /// Set to protect the card; null or blank removes protection.
    #[serde(deserialize_with = "nullable")]
    #[validate(length(min = 4, max = 255, message = "The password must be between 4 and 255 characters."))]
    pub password: Option<Option<String>>,
}

impl CardRequest {
    fn normalize(&mut self) {
        for field in [
            &mut self.title,
            &mut self.company,
            &mut self.email,
            &mut self.phone,
            &mut self.website,
            &mut self.address,
            &mut self.bio,
            &mut self.template_id,
            &mut self.password,
        ] {
            blank_to_null(field);
        }
    }

    /// Copy the plain columns onto `fields`; slug, template and password are resolved separately.
    fn apply(&self, fields: &mut CardFields) {
        if let Some(name) = &self.name {
            fields.name = name.trim().to_string();
        }
        patch(&mut fields.title, self.title.clone());
        patch(&mut fields.company, self.company.clone());
        patch(&mut fields.email, self.email.clone());
        patch(&mut fields.phone, self.phone.clone());
        patch(&mut fields.website, self.website.clone());
        patch(&mut fields.address, self.address.clone());
        patch(&mut fields.bio, self.bio.clone());
        patch(&mut fields.template_id, self.template_id.clone());
        if let Some(color) = &self.primary_color {
            fields.primary_color = color.to_lowercase();
        }
        if let Some(color) = &self.secondary_color {
            fields.secondary_color = color.to_lowercase();
        }
        if let Some(color) = &self.text_color {
            fields.text_color = color.to_lowercase();
        }
        if let Some(is_public) = self.is_public {
            fields.is_public = is_public;
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CardResource {
    #[serde(flatten)]
    pub card: Card,
    pub photo_url: Option<String>,
    pub public_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub components: Option<Vec<CardComponent>>,
}

impl CardResource {
    pub fn new(state: &AppState, card: Card) -> Self {
        Self {
            photo_url: state.storage_url(card.photo_path.as_deref()),
            public_url: public_url(state, &card.slug),
            components: None,
            card,
        }
    }

    fn with_components(mut self, components: Vec<CardComponent>) -> Self {
        self.components = Some(components);
        self
    }
}

pub fn public_url(state: &AppState, slug: &str) -> String {
    format!("{}/card/{}", state.config.base_url(), slug)
}

/// A requested template must exist, be active and be allowed by the plan.
fn check_template(conn: &Connection, plan: &Plan, template_id: Option<&Option<String>>) -> AppResult<()> {
    let Some(Some(id)) = template_id else {
        return Ok(());
    };
    let template = templates::find(conn, id)?
        .filter(|t| t.is_active)
        .ok_or_else(|| AppError::field("template_id", "The selected template is invalid."))?;
    if template.is_premium {
        plan.require_premium_templates()?;
    }
    Ok(())
}

// -- Handlers --

/// GET /cards
pub async fn index(
    State(state): State<AppState>,
    current: CurrentUser,
) -> AppResult<Json<Vec<CardResource>>> {
    let conn = state.db.get()?;
    let cards = cards::list_for_user(&conn, current.id())?;
    Ok(Json(
        cards
            .into_iter()
            .map(|card| CardResource::new(&state, card))
            .collect(),
    ))
}

/// POST /cards
pub async fn store(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(mut req): Json<CardRequest>,
) -> AppResult<(StatusCode, Json<CardResource>)> {
    req.normalize();
    req.validate()?;
    let name = req
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .ok_or_else(|| AppError::field("name", "The name field is required."))?
        .to_string();

    let plan = current.plan();
    {
        let conn = state.db.get()?;
        let existing = cards::count_for_user(&conn, current.id())?;
        plan.check_count("cards", existing, plan.limits.max_cards)?;
        check_template(&conn, plan, req.template_id.as_ref())?;
    }
    let password_hash = hash_password_patch(&state, plan, req.password.take()).await?;

    let conn = state.db.get()?;
    let slug = resolve_slug(req.slug.as_deref(), &name, None, |s| cards::slug_taken(&conn, s))?;
    let mut fields = CardFields::new(name);
    req.apply(&mut fields);
    if let Some(hash) = password_hash {
        fields.password_hash = hash;
    }
    let card = cards::insert(&conn, current.id(), &slug, &fields)?;
    tracing::info!("User {} created card {} ({})", current.id(), card.id, card.slug);

    Ok((StatusCode::CREATED, Json(CardResource::new(&state, card))))
}

/// GET /cards/{id}
pub async fn show(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<CardResource>> {
    let conn = state.db.get()?;
    let card = guards::owned_card(&conn, &current, &id)?;
    let components = cards::list_components(&conn, &card.id, false)?;
    Ok(Json(CardResource::new(&state, card).with_components(components)))
}

/// PUT /cards/{id}
pub async fn update(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
    Json(mut req): Json<CardRequest>,
) -> AppResult<Json<CardResource>> {
    let plan = current.plan();
    let card = {
        let conn = state.db.get()?;
        let card = guards::owned_card(&conn, &current, &id)?;
        req.normalize();
        req.validate()?;
        check_template(&conn, plan, req.template_id.as_ref())?;
        card
    };
    let password_hash = hash_password_patch(&state, plan, req.password.take()).await?;

    let conn = state.db.get()?;
    let slug = resolve_slug(req.slug.as_deref(), &card.name, Some(&card.slug), |s| {
        cards::slug_taken(&conn, s)
    })?;
    let mut fields = CardFields::from(&card);
    req.apply(&mut fields);
    if fields.name.is_empty() {
        return Err(AppError::field("name", "The name field is required."));
    }
    if let Some(hash) = password_hash {
        fields.password_hash = hash;
    }
    let card = cards::update(&conn, &card.id, &slug, &fields)?;
    Ok(Json(CardResource::new(&state, card)))
}

/// DELETE /cards/{id}
pub async fn destroy(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    let card = {
        let conn = state.db.get()?;
        let card = guards::owned_card(&conn, &current, &id)?;
        cards::delete(&conn, &card.id)?;
        card
    };
    if let Some(photo) = &card.photo_path {
        media::remove(&state, photo).await;
    }
    tracing::info!("User {} deleted card {}", current.id(), card.id);
    Ok(StatusCode::NO_CONTENT)
}

/// POST /cards/{id}/photo (multipart `photo`)
pub async fn upload_photo(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
    multipart: Multipart,
) -> AppResult<Json<CardResource>> {
    let card = {
        let conn = state.db.get()?;
        guards::owned_card(&conn, &current, &id)?
    };
    let mut parts = upload::read_files(multipart).await?;
    let photo = upload::take(&mut parts, "photo")?;
    photo.validate_image(state.config.storage.max_upload_bytes)?;

    media::replace(
        &state,
        &current.user,
        "cards",
        &photo,
        card.photo_path.as_deref(),
        |conn, path| cards::set_photo(conn, &card.id, Some(path)),
    )
    .await?;

    let conn = state.db.get()?;
    let card = cards::get(&conn, &card.id)?;
    Ok(Json(CardResource::new(&state, card)))
}

/// GET /cards/{id}/stats
pub async fn stats(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
    Query(query): Query<StatsQuery>,
) -> AppResult<Json<CardStats>> {
    let conn = state.db.get()?;
    let card = guards::owned_card(&conn, &current, &id)?;
    let days = analytics_window(current.plan(), query.days);
    Ok(Json(analytics::card_stats(&conn, &card.id, days)?))
}

/// POST /cards/{id}/stats/reset
pub async fn reset_stats(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<CardResource>> {
    let conn = state.db.get()?;
    let card = guards::owned_card(&conn, &current, &id)?;
    analytics::reset_card(&conn, &card.id)?;
    let card = cards::get(&conn, &card.id)?;
    Ok(Json(CardResource::new(&state, card)))
}

#[derive(Debug, Serialize)]
pub struct ShareResponse {
    pub share_url: String,
    pub qr_code_url: String,
    pub shares: i64,
}

pub fn qr_code_url(state: &AppState, target: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(target.as_bytes()).collect();
    format!("{}{}", state.config.share.qr_service_url, encoded)
}

/// Public card by id; hidden cards are indistinguishable from missing ones.
fn public_card(conn: &Connection, id: &str) -> AppResult<Card> {
    cards::find(conn, id)?
        .filter(|card| card.is_public)
        .ok_or(AppError::NotFound)
}

/// POST /cards/{id}/share (public)
pub async fn share(
    State(state): State<AppState>,
    Path(id): Path<String>,
    VisitInfo(visit): VisitInfo,
) -> AppResult<Json<ShareResponse>> {
    let mut conn = state.db.get()?;
    let card = public_card(&conn, &id)?;
    analytics::record_card_event(&mut conn, &card.id, CardAction::Share, &visit)?;
    let card = cards::get(&conn, &card.id)?;

    let share_url = public_url(&state, &card.slug);
    Ok(Json(ShareResponse {
        qr_code_url: qr_code_url(&state, &share_url),
        share_url,
        shares: card.shares,
    }))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ViewQuery {
    pub password: Option<String>,
}

/// GET /cards/{id}/view (public): the card with its active components.
pub async fn view(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<ViewQuery>,
    VisitInfo(visit): VisitInfo,
) -> AppResult<Json<CardResource>> {
    let card = {
        let conn = state.db.get()?;
        public_card(&conn, &id)?
    };
    if let Some(hash) = card.password_hash.clone() {
        let given = query.password.unwrap_or_default();
        if given.is_empty() || !password::verify_blocking(given, hash).await? {
            return Err(AppError::forbidden("This card is password protected."));
        }
    }

    let mut conn = state.db.get()?;
    analytics::record_card_event(&mut conn, &card.id, CardAction::View, &visit)?;
    let card = cards::get(&conn, &card.id)?;
    let components = cards::list_components(&conn, &card.id, true)?;
    Ok(Json(CardResource::new(&state, card).with_components(components)))
}

pub fn router() -> Router<AppState> {
    let mut router = Router::new();
    for prefix in ["/cards", "/digital-cards"] {
        router = router
            .route(prefix, get(index).post(store))
            .route(&format!("{}/{{id}}", prefix), get(show).put(update).delete(destroy))
            .route(&format!("{}/{{id}}/photo", prefix), post(upload_photo))
            .route(&format!("{}/{{id}}/stats", prefix), get(stats))
            .route(&format!("{}/{{id}}/stats/reset", prefix), post(reset_stats))
            .route(&format!("{}/{{id}}/share", prefix), post(share))
            .route(&format!("{}/{{id}}/view", prefix), get(view));
    }
    router
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_turns_blank_into_null() {
        let mut req: CardRequest =
            serde_json::from_str(r#"{"email":"  ","website":"https://example.com","bio":null}"#).unwrap();
        req.normalize();
        assert_eq!(req.email, Some(None));
        assert_eq!(req.bio, Some(None));
        assert_eq!(req.title, None);
        assert!(req.validate().is_ok());
    }

    #[test]
    fn invalid_fields_are_reported() {
        let mut req: CardRequest = serde_json::from_str(
            r##"{"email":"nope","website":"not a url","primary_color":"red"}"##,
        )
        .unwrap();
        req.normalize();
        let err: AppError = req.validate().unwrap_err().into();
        match err {
            AppError::Validation(fields) => {
                assert!(fields.contains_key("email"));
                assert!(fields.contains_key("website"));
                assert!(fields.contains_key("primary_color"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn apply_patches_only_present_fields() {
        let mut fields = CardFields::new("Ada");
        fields.title = Some("Engineer".into());
        let req: CardRequest =
            serde_json::from_str(r##"{"company":"Analytical Engines","primary_color":"#ABCDEF"}"##).unwrap();
        req.apply(&mut fields);
        assert_eq!(fields.title.as_deref(), Some("Engineer"));
        assert_eq!(fields.company.as_deref(), Some("Analytical Engines"));
        assert_eq!(fields.primary_color, "#abcdef");
    }
}
