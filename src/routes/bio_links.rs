use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::auth::guards;
use crate::db::analytics::{self, BioLinkStats};
use crate::db::bio_links::{self, BioLinkFields, ImageSlot};
use crate::db::models::{BioLink, BioLinkSocial};
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::routes::bio_link_items::ItemResource;
use crate::routes::{analytics_window, blank_to_null, hash_password_patch, resolve_slug, StatsQuery};
use crate::state::AppState;
use crate::storage::{media, upload};
use crate::validation::{hex_color, nullable, patch};

const BUTTON_STYLES: &[&str] = &["rounded", "pill", "square", "outline", "shadow"];

fn valid_button_style(value: &str) -> Result<(), validator::ValidationError> {
    if BUTTON_STYLES.contains(&value) {
        Ok(())
    } else {
        Err(validator::ValidationError::new("button_style")
            .with_message("must be one of: rounded, pill, square, outline, shadow.".into()))
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct BioLinkRequest {
    #[validate(length(min = 1, max = 255, message = "The title must be between 1 and 255 characters."))]
    pub title: Option<String>,
    #[validate(length(min = 1, max = 80, message = "The slug must be between 1 and 80 characters."))]
    pub slug: Option<String>,
    #[serde(deserialize_with = "nullable")]
    #[validate(length(max = 1000, message = "The description may not be greater than 1000 characters."))]
    pub description: Option<Option<String>>,
    #[validate(custom(function = "hex_color"))]
    pub background_color: Option<String>,
    #[validate(custom(function = "hex_color"))]
    pub text_color: Option<String>,
    #[validate(custom(function = "hex_color"))]
    pub button_color: Option<String>,
    #[validate(custom(function = "hex_color"))]
    pub button_text_color: Option<String>,
    #[validate(length(min = 1, max = 100, message = "The font family must be between 1 and 100 characters."))]
    pub font_family: Option<String>,
    #[validate(custom(function = "valid_button_style"))]
    pub button_style: Option<String>,
    pub is_active: Option<bool>,
    #[serde(deserialize_with = "nullable")]
    #[validate(length(min = 4, max = 255, message = "The password must be between 4 and 255 characters."))]
    pub password: Option<Option<String>>,
}

impl BioLinkRequest {
    fn normalize(&mut self) {
        blank_to_null(&mut self.description);
        blank_to_null(&mut self.password);
    }

    fn apply(&self, fields: &mut BioLinkFields) {
        if let Some(title) = &self.title {
            fields.title = title.trim().to_string();
        }
        patch(&mut fields.description, self.description.clone());
        for (target, value) in [
            (&mut fields.background_color, &self.background_color),
            (&mut fields.text_color, &self.text_color),
            (&mut fields.button_color, &self.button_color),
            (&mut fields.button_text_color, &self.button_text_color),
        ] {
            if let Some(color) = value {
                *target = color.to_lowercase();
            }
        }
        if let Some(font) = &self.font_family {
            fields.font_family = font.trim().to_string();
        }
        if let Some(style) = &self.button_style {
            fields.button_style = style.clone();
        }
        if let Some(is_active) = self.is_active {
            fields.is_active = is_active;
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BioLinkResource {
    #[serde(flatten)]
    pub bio_link: BioLink,
    pub avatar_url: Option<String>,
    pub background_url: Option<String>,
    pub public_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<ItemResource>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub social_media: Option<Vec<BioLinkSocial>>,
}

impl BioLinkResource {
    pub fn new(state: &AppState, bio_link: BioLink) -> Self {
        Self {
            avatar_url: state.storage_url(bio_link.avatar_path.as_deref()),
            background_url: state.storage_url(bio_link.background_path.as_deref()),
            public_url: public_url(state, &bio_link.slug),
            items: None,
            social_media: None,
            bio_link,
        }
    }
}

pub fn public_url(state: &AppState, slug: &str) -> String {
    format!("{}/bio/{}", state.config.base_url(), slug)
}

/// GET /bio-links
pub async fn index(
    State(state): State<AppState>,
    current: CurrentUser,
) -> AppResult<Json<Vec<BioLinkResource>>> {
    let conn = state.db.get()?;
    let links = bio_links::list_for_user(&conn, current.id())?;
    Ok(Json(
        links
            .into_iter()
            .map(|link| BioLinkResource::new(&state, link))
            .collect(),
    ))
}

/// POST /bio-links
pub async fn store(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(mut req): Json<BioLinkRequest>,
) -> AppResult<(StatusCode, Json<BioLinkResource>)> {
    req.normalize();
    req.validate()?;
    let title = req
        .title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::field("title", "The title field is required."))?
        .to_string();

    let plan = current.plan();
    {
        let conn = state.db.get()?;
        let existing = bio_links::count_for_user(&conn, current.id())?;
        plan.check_count("bio links", existing, plan.limits.max_bio_links)?;
    }
    let password_hash = hash_password_patch(&state, plan, req.password.take()).await?;

    let conn = state.db.get()?;
    let slug = resolve_slug(req.slug.as_deref(), &title, None, |s| {
        bio_links::slug_taken(&conn, s)
    })?;
    let mut fields = BioLinkFields::new(title);
    req.apply(&mut fields);
    if let Some(hash) = password_hash {
        fields.password_hash = hash;
    }
    let bio_link = bio_links::insert(&conn, current.id(), &slug, &fields)?;
    tracing::info!("User {} created bio link {} ({})", current.id(), bio_link.id, bio_link.slug);

    Ok((StatusCode::CREATED, Json(BioLinkResource::new(&state, bio_link))))
}

/// GET /bio-links/{id}: the page with all its items and social handles.
pub async fn show(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<BioLinkResource>> {
    let conn = state.db.get()?;
    let bio_link = guards::owned_bio_link(&conn, &current, &id)?;
    let items = bio_links::list_items(&conn, &bio_link.id, false)?
        .into_iter()
        .map(|item| ItemResource::new(&state, item))
        .collect();
    let socials = bio_links::list_socials(&conn, &bio_link.id, false)?;

    let mut resource = BioLinkResource::new(&state, bio_link);
    resource.items = Some(items);
    resource.social_media = Some(socials);
    Ok(Json(resource))
}

/// PUT /bio-links/{id}
pub async fn update(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
    Json(mut req): Json<BioLinkRequest>,
) -> AppResult<Json<BioLinkResource>> {
    let bio_link = {
        let conn = state.db.get()?;
        guards::owned_bio_link(&conn, &current, &id)?
    };
    req.normalize();
    req.validate()?;
    let password_hash = hash_password_patch(&state, current.plan(), req.password.take()).await?;

    let conn = state.db.get()?;
    let slug = resolve_slug(req.slug.as_deref(), &bio_link.title, Some(&bio_link.slug), |s| {
        bio_links::slug_taken(&conn, s)
    })?;
    let mut fields = BioLinkFields::from(&bio_link);
    req.apply(&mut fields);
    if fields.title.is_empty() {
        return Err(AppError::field("title", "The title field is required."));
    }
    if let Some(hash) = password_hash {
        fields.password_hash = hash;
    }
    let bio_link = bio_links::update(&conn, &bio_link.id, &slug, &fields)?;
    Ok(Json(BioLinkResource::new(&state, bio_link)))
}

/// DELETE /bio-links/{id}; images and uploaded item files go with it.
pub async fn destroy(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    let blobs = {
        let conn = state.db.get()?;
        let bio_link = guards::owned_bio_link(&conn, &current, &id)?;
        let mut blobs = bio_links::file_item_paths(&conn, &bio_link.id)?;
        blobs.extend(bio_link.avatar_path.clone());
        blobs.extend(bio_link.background_path.clone());
        bio_links::delete(&conn, &bio_link.id)?;
        blobs.retain(|p| !p.is_empty());
        blobs
    };
    media::remove_all(&state, &blobs).await;
    tracing::info!("User {} deleted bio link {}", current.id(), id);
    Ok(StatusCode::NO_CONTENT)
}

/// POST /bio-links/{id}/images (multipart `avatar` and/or `background`)
pub async fn upload_images(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
    multipart: Multipart,
) -> AppResult<Json<BioLinkResource>> {
    let bio_link = {
        let conn = state.db.get()?;
        guards::owned_bio_link(&conn, &current, &id)?
    };
    let mut parts = upload::read_files(multipart).await?;
    let avatar = upload::take_optional(&mut parts, "avatar");
    let background = upload::take_optional(&mut parts, "background");
    if avatar.is_none() && background.is_none() {
        return Err(AppError::field(
            "avatar",
            "An avatar or background image is required.",
        ));
    }

    let max = state.config.storage.max_upload_bytes;
    for image in avatar.iter().chain(background.iter()) {
        image.validate_image(max)?;
    }

    let slots = [
        (avatar, ImageSlot::Avatar, "bio-links/avatars", bio_link.avatar_path.as_deref()),
        (
            background,
            ImageSlot::Background,
            "bio-links/backgrounds",
            bio_link.background_path.as_deref(),
        ),
    ];
    for (image, slot, dir, previous) in slots {
        let Some(image) = image else {
            continue;
        };
        media::replace(&state, &current.user, dir, &image, previous, |conn, path| {
            bio_links::set_image(conn, &bio_link.id, slot, Some(path))
        })
        .await?;
    }

    let conn = state.db.get()?;
    let bio_link = bio_links::get(&conn, &bio_link.id)?;
    Ok(Json(BioLinkResource::new(&state, bio_link)))
}

/// GET /bio-links/{id}/analytics
pub async fn analytics(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
    Query(query): Query<StatsQuery>,
) -> AppResult<Json<BioLinkStats>> {
    let conn = state.db.get()?;
    let bio_link = guards::owned_bio_link(&conn, &current, &id)?;
    let days = analytics_window(current.plan(), query.days);
    Ok(Json(analytics::bio_link_stats(&conn, &bio_link.id, days)?))
}

/// POST /bio-links/{id}/analytics/reset
pub async fn reset_analytics(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<BioLinkResource>> {
    let mut conn = state.db.get()?;
    let bio_link = guards::owned_bio_link(&conn, &current, &id)?;
    analytics::reset_bio_link(&mut conn, &bio_link.id)?;
    let bio_link = bio_links::get(&conn, &bio_link.id)?;
    Ok(Json(BioLinkResource::new(&state, bio_link)))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/bio-links", get(index).post(store))
        .route("/bio-links/{id}", get(show).put(update).delete(destroy))
        .route("/bio-links/{id}/images", post(upload_images))
        .route("/bio-links/{id}/analytics", get(analytics))
        .route("/bio-links/{id}/analytics/reset", post(reset_analytics))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn button_style_is_restricted() {
        let req: BioLinkRequest = serde_json::from_str(r#"{"button_style":"wobbly"}"#).unwrap();
        assert!(req.validate().is_err());
        let req: BioLinkRequest = serde_json::from_str(r#"{"button_style":"pill"}"#).unwrap();
        assert!(req.validate().is_ok());
    }

    #[test]
    fn apply_lowercases_colors() {
        let mut fields = BioLinkFields::new("Links");
        let req: BioLinkRequest =
            serde_json::from_str(r##"{"button_color":"#FF0000","description":"hello"}"##).unwrap();
        req.apply(&mut fields);
        assert_eq!(fields.button_color, "#ff0000");
        assert_eq!(fields.description.as_deref(), Some("hello"));
        assert_eq!(fields.text_color, "#1c1917");
    }
}
