use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidateEmail};

use crate::auth::guards;
use crate::db::bio_links::{self, ItemFields, SocialFields};
use crate::db::models::{BioLinkItem, BioLinkSocial, ItemKind};
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::routes::{blank_to_null, ReorderRequest};
use crate::state::AppState;
use crate::storage::{media, upload};
use crate::validation::{nullable, patch};

// -- Items --

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct ItemRequest {
    #[validate(length(min = 1, max = 255, message = "The title must be between 1 and 255 characters."))]
    pub title: Option<String>,
    #[validate(length(max = 2048, message = "The url may not be greater than 2048 characters."))]
    pub url: Option<String>,
    #[serde(rename = "type", alias = "kind")]
    pub kind: Option<ItemKind>,
    #[serde(deserialize_with = "nullable")]
    #[validate(length(max = 100, message = "The icon may not be greater than 100 characters."))]
    pub icon: Option<Option<String>>,
    pub is_active: Option<bool>,
}

impl ItemRequest {
    /// File targets only change through the upload endpoint, so any switch
    /// to or from `file` drops the old target.
    fn apply(&mut self, fields: &mut ItemFields) {
        blank_to_null(&mut self.icon);
        if let Some(title) = &self.title {
            fields.title = title.trim().to_string();
        }
        if let Some(kind) = self.kind {
            if kind != fields.kind && (kind == ItemKind::File || fields.kind == ItemKind::File) {
                fields.url.clear();
            }
            fields.kind = kind;
        }
        if fields.kind != ItemKind::File {
            if let Some(url) = &self.url {
                fields.url = url.trim().to_string();
            }
        }
        patch(&mut fields.icon, self.icon.take());
        if let Some(is_active) = self.is_active {
            fields.is_active = is_active;
        }
    }
}

/// The target must suit the item type.
fn check_target(fields: &ItemFields) -> AppResult<()> {
    match fields.kind {
        ItemKind::Link => {
            let web = url::Url::parse(&fields.url)
                .map(|u| matches!(u.scheme(), "http" | "https"))
                .unwrap_or(false);
            if !web {
                return Err(AppError::field("url", "The url must be a valid URL."));
            }
        }
        ItemKind::Email => {
            if !fields.url.validate_email() {
                return Err(AppError::field("url", "The url must be a valid email address."));
            }
        }
        ItemKind::File => {}
    }
    Ok(())
}

/// Where a visitor ends up after clicking the item.
pub fn target_url(state: &AppState, item: &BioLinkItem) -> Option<String> {
    if item.url.is_empty() {
        return None;
    }
    match item.kind {
        ItemKind::Link => Some(item.url.clone()),
        ItemKind::Email => Some(format!("mailto:{}", item.url)),
        ItemKind::File => state.storage_url(Some(&item.url)),
    }
}

#[derive(Debug, Serialize)]
pub struct ItemResource {
    #[serde(flatten)]
    pub item: BioLinkItem,
    pub target_url: Option<String>,
}

impl ItemResource {
    pub fn new(state: &AppState, item: BioLinkItem) -> Self {
        Self {
            target_url: target_url(state, &item),
            item,
        }
    }
}

fn resources(state: &AppState, items: Vec<BioLinkItem>) -> Vec<ItemResource> {
    items
        .into_iter()
        .map(|item| ItemResource::new(state, item))
        .collect()
}

/// GET /bio-links/{id}/items
pub async fn index(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(bio_link_id): Path<String>,
) -> AppResult<Json<Vec<ItemResource>>> {
    let conn = state.db.get()?;
    let bio_link = guards::owned_bio_link(&conn, &current, &bio_link_id)?;
    let items = bio_links::list_items(&conn, &bio_link.id, false)?;
    Ok(Json(resources(&state, items)))
}

/// POST /bio-links/{id}/items
pub async fn store(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(bio_link_id): Path<String>,
    Json(mut req): Json<ItemRequest>,
) -> AppResult<(StatusCode, Json<ItemResource>)> {
    let conn = state.db.get()?;
    let bio_link = guards::owned_bio_link(&conn, &current, &bio_link_id)?;
    req.validate()?;
    let title = req
        .title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::field("title", "The title field is required."))?
        .to_string();

    let plan = current.plan();
    let existing = bio_links::count_items(&conn, &bio_link.id)?;
    plan.check_count("links per bio link", existing, plan.limits.max_items_per_bio_link)?;

    let mut fields = ItemFields {
        title,
        url: String::new(),
        kind: ItemKind::Link,
        icon: None,
        is_active: true,
    };
    req.apply(&mut fields);
    check_target(&fields)?;
    let item = bio_links::insert_item(&conn, &bio_link.id, &fields)?;
    Ok((StatusCode::CREATED, Json(ItemResource::new(&state, item))))
}

/// PUT /bio-link-items/{id}
pub async fn update(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
    Json(mut req): Json<ItemRequest>,
) -> AppResult<Json<ItemResource>> {
    let (previous, updated) = {
        let conn = state.db.get()?;
        let (item, _bio_link) = guards::owned_item(&conn, &current, &id)?;
        req.validate()?;

        let mut fields = ItemFields::from(&item);
        req.apply(&mut fields);
        if fields.title.is_empty() {
            return Err(AppError::field("title", "The title field is required."));
        }
        check_target(&fields)?;
        let updated = bio_links::update_item(&conn, &item.id, &fields)?;
        (item, updated)
    };

    // Switching away from a file leaves its blob behind.
    if previous.kind == ItemKind::File && updated.kind != ItemKind::File && !previous.url.is_empty() {
        media::remove(&state, &previous.url).await;
    }
    Ok(Json(ItemResource::new(&state, updated)))
}

/// DELETE /bio-link-items/{id}
pub async fn destroy(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    let item = {
        let conn = state.db.get()?;
        let (item, _bio_link) = guards::owned_item(&conn, &current, &id)?;
        bio_links::delete_item(&conn, &item.id)?;
        item
    };
    if item.kind == ItemKind::File && !item.url.is_empty() {
        media::remove(&state, &item.url).await;
    }
    Ok(StatusCode::NO_CONTENT)
}

/// POST /bio-link-items/{id}/file (multipart `file`): turns the item into a download.
pub async fn upload_file(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
    multipart: Multipart,
) -> AppResult<Json<ItemResource>> {
    let item = {
        let conn = state.db.get()?;
        guards::owned_item(&conn, &current, &id)?.0
    };
    let mut parts = upload::read_files(multipart).await?;
    let file = upload::take(&mut parts, "file")?;
    file.validate_size(state.config.storage.max_upload_bytes)?;

    let previous = (item.kind == ItemKind::File && !item.url.is_empty()).then_some(item.url.as_str());
    let mut fields = ItemFields::from(&item);
    fields.kind = ItemKind::File;
    media::replace(&state, &current.user, "bio-links/files", &file, previous, |conn, path| {
        fields.url = path.to_string();
        bio_links::update_item(conn, &item.id, &fields).map(|_| ())
    })
    .await?;

    let conn = state.db.get()?;
    let item = bio_links::find_item(&conn, &item.id)?.ok_or(AppError::NotFound)?;
    Ok(Json(ItemResource::new(&state, item)))
}

/// POST /bio-links/{id}/items/reorder
pub async fn reorder(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(bio_link_id): Path<String>,
    Json(req): Json<ReorderRequest>,
) -> AppResult<Json<Vec<ItemResource>>> {
    let mut conn = state.db.get()?;
    let bio_link = guards::owned_bio_link(&conn, &current, &bio_link_id)?;
    bio_links::reorder_items(&mut conn, &bio_link.id, &req.ids)?;
    let items = bio_links::list_items(&conn, &bio_link.id, false)?;
    Ok(Json(resources(&state, items)))
}

// -- Social handles --

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct SocialRequest {
    #[validate(length(min = 1, max = 50, message = "The platform must be between 1 and 50 characters."))]
    pub platform: Option<String>,
    #[validate(length(min = 1, max = 255, message = "The url must be between 1 and 255 characters."))]
    pub url: Option<String>,
    pub is_active: Option<bool>,
    #[validate(range(min = 0, message = "The position must be at least 0."))]
    pub position: Option<i64>,
}

impl SocialRequest {
    fn apply(&self, fields: &mut SocialFields) {
        if let Some(platform) = &self.platform {
            fields.platform = platform.trim().to_lowercase();
        }
        if let Some(url) = &self.url {
            fields.url = url.trim().to_string();
        }
        if let Some(is_active) = self.is_active {
            fields.is_active = is_active;
        }
    }
}

fn require_social(fields: &SocialFields) -> AppResult<()> {
    if fields.platform.is_empty() {
        return Err(AppError::field("platform", "The platform field is required."));
    }
    if fields.url.is_empty() {
        return Err(AppError::field("url", "The url field is required."));
    }
    Ok(())
}

/// GET /bio-links/{id}/socials
pub async fn social_index(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(bio_link_id): Path<String>,
) -> AppResult<Json<Vec<BioLinkSocial>>> {
    let conn = state.db.get()?;
    let bio_link = guards::owned_bio_link(&conn, &current, &bio_link_id)?;
    Ok(Json(bio_links::list_socials(&conn, &bio_link.id, false)?))
}

/// POST /bio-links/{id}/socials
pub async fn social_store(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(bio_link_id): Path<String>,
    Json(req): Json<SocialRequest>,
) -> AppResult<(StatusCode, Json<BioLinkSocial>)> {
    let conn = state.db.get()?;
    let bio_link = guards::owned_bio_link(&conn, &current, &bio_link_id)?;
    req.validate()?;

    let mut fields = SocialFields {
        platform: String::new(),
        url: String::new(),
        is_active: true,
    };
    req.apply(&mut fields);
    require_social(&fields)?;
    let social = bio_links::insert_social(&conn, &bio_link.id, &fields)?;
    let social = match req.position {
        Some(position) => bio_links::update_social(&conn, &social.id, &fields, Some(position))?,
        None => social,
    };
    Ok((StatusCode::CREATED, Json(social)))
}

/// PUT /bio-link-socials/{id}
pub async fn social_update(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
    Json(req): Json<SocialRequest>,
) -> AppResult<Json<BioLinkSocial>> {
    let conn = state.db.get()?;
    let (social, _bio_link) = guards::owned_social(&conn, &current, &id)?;
    req.validate()?;

    let mut fields = SocialFields {
        platform: social.platform.clone(),
        url: social.url.clone(),
        is_active: social.is_active,
    };
    req.apply(&mut fields);
    require_social(&fields)?;
    Ok(Json(bio_links::update_social(&conn, &social.id, &fields, req.position)?))
}

/// DELETE /bio-link-socials/{id}
pub async fn social_destroy(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    let conn = state.db.get()?;
    let (social, _bio_link) = guards::owned_social(&conn, &current, &id)?;
    bio_links::delete_social(&conn, &social.id)?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/bio-links/{id}/items", get(index).post(store))
        .route("/bio-links/{id}/items/reorder", post(reorder))
        .route("/bio-link-items/{id}", put(update).delete(destroy))
        .route("/bio-link-items/{id}/file", post(upload_file))
        .route("/bio-links/{id}/socials", get(social_index).post(social_store))
        .route("/bio-link-socials/{id}", put(social_update).delete(social_destroy))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link(url: &str) -> ItemFields {
        ItemFields {
            title: "Site".into(),
            url: url.into(),
            kind: ItemKind::Link,
            icon: None,
            is_active: true,
        }
    }

    #[test]
    fn targets_are_checked_by_type() {
        assert!(check_target(&link("https://example.com")).is_ok());
        assert!(check_target(&link("not a url")).is_err());
        assert!(check_target(&link("javascript:alert(1)")).is_err());

        let mut email = link("ada@example.com");
        email.kind = ItemKind::Email;
        assert!(check_target(&email).is_ok());
        email.url = "nope".into();
        assert!(check_target(&email).is_err());

        let mut file = link("");
        file.kind = ItemKind::File;
        assert!(check_target(&file).is_ok());
    }

    #[test]
    fn file_url_is_not_patched_directly() {
        let mut fields = link("bio-links/files/a.pdf");
        fields.kind = ItemKind::File;
        let mut req: ItemRequest =
            serde_json::from_str(r#"{"url":"https://evil.example","title":"Menu"}"#).unwrap();
        req.apply(&mut fields);
        assert_eq!(fields.url, "bio-links/files/a.pdf");
        assert_eq!(fields.title, "Menu");
    }

    #[test]
    fn switching_to_file_waits_for_an_upload() {
        let mut fields = link("https://ada.dev/post");
        let mut req: ItemRequest =
            serde_json::from_str(r#"{"type":"file","url":"https://ada.dev/other"}"#).unwrap();
        req.apply(&mut fields);
        assert_eq!(fields.kind, ItemKind::File);
        assert_eq!(fields.url, "");
    }

    #[test]
    fn switching_from_file_clears_the_path() {
        let mut fields = link("bio-links/files/a.pdf");
        fields.kind = ItemKind::File;
        let mut req: ItemRequest = serde_json::from_str(r#"{"type":"email"}"#).unwrap();
        req.apply(&mut fields);
        assert_eq!(fields.kind, ItemKind::Email);
        assert_eq!(fields.url, "");
    }
}
