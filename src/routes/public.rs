//! Visitor-facing pages: bio link pages, card pages and their side doors
//! (click tracking, vCard download, booking requests).
//!
//! Protected pages are unlocked per browser with an HttpOnly cookie scoped to
//! the page path. Its value is the page's current password hash, so changing
//! the password locks everyone out again.

use askama::Template;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Router};
use chrono::Utc;
use rusqlite::Connection;
use serde::Deserialize;
use validator::Validate;

use crate::auth::password;
use crate::db::analytics::{self, CardAction, Visit};
use crate::db::appointments::{self, NewAppointment};
use crate::db::models::{BioLink, Card};
use crate::db::{bio_links, cards, users};
use crate::error::{AppError, AppResult};
use crate::extractors::{extract_cookie, VisitInfo};
use crate::plans;
use crate::routes::appointments::parse_schedule;
use crate::routes::bio_link_items::target_url;
use crate::routes::cards::qr_code_url;
use crate::routes::home::Html;
use crate::state::AppState;
use crate::validation::clean;

const UNLOCK_COOKIE: &str = "linkfolio_unlock";
const UNLOCK_HOURS: u64 = 24;

// -- Page models --

pub struct ItemLink {
    pub title: String,
    pub icon: Option<String>,
    pub href: String,
}

pub struct SocialLink {
    pub platform: String,
    pub href: Option<String>,
    pub label: String,
}

pub struct ComponentView {
    pub kind: &'static str,
    pub title: Option<String>,
    pub content: Option<String>,
    pub href: Option<String>,
}

#[derive(Template)]
#[template(path = "pages/bio.html")]
pub struct BioPage {
    pub bio_link: BioLink,
    pub font_family: String,
    pub avatar_url: Option<String>,
    pub background_url: Option<String>,
    pub items: Vec<ItemLink>,
    pub socials: Vec<SocialLink>,
    pub show_branding: bool,
}

#[derive(Template)]
#[template(path = "pages/card.html")]
pub struct CardPage {
    pub card: Card,
    pub photo_url: Option<String>,
    pub website_href: Option<String>,
    pub components: Vec<ComponentView>,
    pub vcard_url: String,
    pub booking_url: String,
    pub qr_code_url: String,
    pub booked: bool,
    pub booking_error: Option<String>,
    pub show_branding: bool,
}

#[derive(Template)]
#[template(path = "pages/unlock.html")]
pub struct UnlockPage {
    pub title: String,
    pub action: String,
    pub error: Option<String>,
}

/// Only web, mail and phone links are rendered as anchors.
fn safe_href(value: &str) -> Option<String> {
    let parsed = url::Url::parse(value.trim()).ok()?;
    matches!(parsed.scheme(), "http" | "https" | "mailto" | "tel").then(|| parsed.to_string())
}

/// Font stacks end up in a style attribute.
fn css_font(value: &str) -> String {
    let cleaned: String = value
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, ' ' | ',' | '-' | '\''))
        .collect();
    if cleaned.trim().is_empty() {
        "system-ui".to_string()
    } else {
        cleaned
    }
}

fn shows_branding(conn: &Connection, owner_id: &str) -> AppResult<bool> {
    let owner = users::get(conn, owner_id)?;
    Ok(!plans::plan_for(conn, &owner)?.features.remove_branding)
}

// -- Unlock cookie --

fn unlocked(headers: &HeaderMap, password_hash: Option<&str>) -> bool {
    match password_hash {
        None => true,
        Some(hash) => extract_cookie(headers, UNLOCK_COOKIE) == Some(hash),
    }
}

fn unlock_cookie(path: &str, hash: &str) -> String {
    format!(
        "{}={}; HttpOnly; SameSite=Lax; Path={}; Max-Age={}",
        UNLOCK_COOKIE,
        hash,
        path,
        UNLOCK_HOURS * 3600
    )
}

async fn password_matches(given: String, hash: String) -> AppResult<bool> {
    if given.is_empty() {
        return Ok(false);
    }
    password::verify_blocking(given, hash).await
}

fn unlock_form(title: &str, action: String, error: Option<&str>) -> Response {
    let status = if error.is_some() {
        StatusCode::UNPROCESSABLE_ENTITY
    } else {
        StatusCode::OK
    };
    let page = UnlockPage {
        title: title.to_string(),
        action,
        error: error.map(str::to_string),
    };
    (status, Html(page)).into_response()
}

fn see_other(location: &str) -> AppResult<Response> {
    let value = HeaderValue::try_from(location).map_err(|_| AppError::NotFound)?;
    Ok((StatusCode::SEE_OTHER, [(header::LOCATION, value)]).into_response())
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct UnlockForm {
    pub password: String,
}

// -- Bio link pages --

fn active_bio_link(conn: &Connection, slug: &str) -> AppResult<BioLink> {
    bio_links::find_by_slug(conn, slug)?
        .filter(|b| b.is_active)
        .ok_or(AppError::NotFound)
}

/// Count the view and render the page.
fn render_bio(state: &AppState, conn: &mut Connection, bio_link: &BioLink, visit: &Visit) -> AppResult<Response> {
    analytics::record_bio_view(conn, &bio_link.id, visit)?;
    let bio_link = bio_links::get(conn, &bio_link.id)?;

    let items = bio_links::list_items(conn, &bio_link.id, true)?
        .into_iter()
        .filter(|item| target_url(state, item).is_some())
        .map(|item| ItemLink {
            href: format!("/bio/{}/click/{}", bio_link.slug, item.id),
            title: item.title,
            icon: item.icon,
        })
        .collect();
    let socials = bio_links::list_socials(conn, &bio_link.id, true)?
        .into_iter()
        .map(|s| SocialLink {
            href: safe_href(&s.url),
            label: s.url,
            platform: s.platform,
        })
        .collect();

    let page = BioPage {
        font_family: css_font(&bio_link.font_family),
        avatar_url: state.storage_url(bio_link.avatar_path.as_deref()),
        background_url: state.storage_url(bio_link.background_path.as_deref()),
        items,
        socials,
        show_branding: shows_branding(conn, &bio_link.user_id)?,
        bio_link,
    };
    Ok(Html(page).into_response())
}

/// GET /bio/{slug}
pub async fn bio_page(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    headers: HeaderMap,
    VisitInfo(visit): VisitInfo,
) -> AppResult<Response> {
    let mut conn = state.db.get()?;
    let bio_link = active_bio_link(&conn, &slug)?;
    if !unlocked(&headers, bio_link.password_hash.as_deref()) {
        return Ok(unlock_form(&bio_link.title, format!("/bio/{}/unlock", bio_link.slug), None));
    }
    render_bio(&state, &mut conn, &bio_link, &visit)
}

/// POST /bio/{slug}/unlock
pub async fn bio_unlock(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    VisitInfo(visit): VisitInfo,
    Form(form): Form<UnlockForm>,
) -> AppResult<Response> {
    let bio_link = {
        let conn = state.db.get()?;
        active_bio_link(&conn, &slug)?
    };
    let page_path = format!("/bio/{}", bio_link.slug);
    let Some(hash) = bio_link.password_hash.clone() else {
        return see_other(&page_path);
    };
    if !password_matches(form.password, hash.clone()).await? {
        return Ok(unlock_form(
            &bio_link.title,
            format!("{}/unlock", page_path),
            Some("The password is incorrect."),
        ));
    }

    let mut conn = state.db.get()?;
    let page = render_bio(&state, &mut conn, &bio_link, &visit)?;
    Ok(([(header::SET_COOKIE, unlock_cookie(&page_path, &hash))], page).into_response())
}

/// GET /bio/{slug}/click/{item_id}
pub async fn bio_click(
    State(state): State<AppState>,
    Path((slug, item_id)): Path<(String, String)>,
    headers: HeaderMap,
    VisitInfo(visit): VisitInfo,
) -> AppResult<Response> {
    let mut conn = state.db.get()?;
    let bio_link = active_bio_link(&conn, &slug)?;
    if !unlocked(&headers, bio_link.password_hash.as_deref()) {
        return see_other(&format!("/bio/{}", bio_link.slug));
    }
    let item = bio_links::find_item(&conn, &item_id)?
        .filter(|item| item.bio_link_id == bio_link.id && item.is_active)
        .ok_or(AppError::NotFound)?;
    let target = target_url(&state, &item).ok_or(AppError::NotFound)?;

    analytics::record_bio_click(&mut conn, &bio_link.id, &item.id, &visit)?;
    see_other(&target)
}

// -- Card pages --

fn public_card(conn: &Connection, slug: &str) -> AppResult<Card> {
    cards::find_by_slug(conn, slug)?
        .filter(|c| c.is_public)
        .ok_or(AppError::NotFound)
}

fn card_page(
    state: &AppState,
    conn: &Connection,
    card: Card,
    booked: bool,
    booking_error: Option<String>,
) -> AppResult<CardPage> {
    let components = cards::list_components(conn, &card.id, true)?
        .into_iter()
        .map(|c| ComponentView {
            kind: c.kind.as_str(),
            href: c.content.as_deref().and_then(safe_href),
            title: c.title,
            content: c.content,
        })
        .collect();
    let share_url = crate::routes::cards::public_url(state, &card.slug);

    Ok(CardPage {
        photo_url: state.storage_url(card.photo_path.as_deref()),
        website_href: card.website.as_deref().and_then(safe_href),
        components,
        vcard_url: format!("/card/{}/vcard", card.slug),
        booking_url: format!("/card/{}/appointments", card.slug),
        qr_code_url: qr_code_url(state, &share_url),
        booked,
        booking_error,
        show_branding: shows_branding(conn, &card.user_id)?,
        card,
    })
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CardPageQuery {
    pub booked: Option<String>,
}

/// GET /card/{slug}
pub async fn card_view(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(query): Query<CardPageQuery>,
    headers: HeaderMap,
    VisitInfo(visit): VisitInfo,
) -> AppResult<Response> {
    let mut conn = state.db.get()?;
    let card = public_card(&conn, &slug)?;
    if !unlocked(&headers, card.password_hash.as_deref()) {
        return Ok(unlock_form(&card.name, format!("/card/{}/unlock", card.slug), None));
    }
    analytics::record_card_event(&mut conn, &card.id, CardAction::View, &visit)?;
    let card = cards::get(&conn, &card.id)?;
    let page = card_page(&state, &conn, card, query.booked.is_some(), None)?;
    Ok(Html(page).into_response())
}

/// POST /card/{slug}/unlock
pub async fn card_unlock(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    VisitInfo(visit): VisitInfo,
    Form(form): Form<UnlockForm>,
) -> AppResult<Response> {
    let card = {
        let conn = state.db.get()?;
        public_card(&conn, &slug)?
    };
    let page_path = format!("/card/{}", card.slug);
    let Some(hash) = card.password_hash.clone() else {
        return see_other(&page_path);
    };
    if !password_matches(form.password, hash.clone()).await? {
        return Ok(unlock_form(
            &card.name,
            format!("{}/unlock", page_path),
            Some("The password is incorrect."),
        ));
    }

    let mut conn = state.db.get()?;
    analytics::record_card_event(&mut conn, &card.id, CardAction::View, &visit)?;
    let card = cards::get(&conn, &card.id)?;
    let page = card_page(&state, &conn, card, false, None)?;
    Ok(([(header::SET_COOKIE, unlock_cookie(&page_path, &hash))], Html(page)).into_response())
}

/// vCard 3.0 text escaping.
fn escape_vcard(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            ',' => out.push_str("\\,"),
            ';' => out.push_str("\\;"),
            '\n' => out.push_str("\\n"),
            '\r' => {}
            other => out.push(other),
        }
    }
    out
}

pub fn vcard(card: &Card, photo_url: Option<&str>, page_url: &str) -> String {
    let name = card.name.trim();
    let (given, family) = match name.rsplit_once(' ') {
        Some((given, family)) => (given.trim(), family.trim()),
        None => (name, ""),
    };

    let mut lines = vec![
        "BEGIN:VCARD".to_string(),
        "VERSION:3.0".to_string(),
        format!("N:{};{};;;", escape_vcard(family), escape_vcard(given)),
        format!("FN:{}", escape_vcard(name)),
    ];
    let optional = [
        ("ORG", card.company.as_deref()),
        ("TITLE", card.title.as_deref()),
        ("TEL;TYPE=CELL", card.phone.as_deref()),
        ("EMAIL;TYPE=INTERNET", card.email.as_deref()),
        ("URL", card.website.as_deref()),
        ("NOTE", card.bio.as_deref()),
    ];
    for (key, value) in optional {
        if let Some(value) = value.filter(|v| !v.trim().is_empty()) {
            lines.push(format!("{}:{}", key, escape_vcard(value)));
        }
    }
    if let Some(address) = card.address.as_deref().filter(|v| !v.trim().is_empty()) {
        lines.push(format!("ADR;TYPE=WORK:;;{};;;;", escape_vcard(address)));
    }
    if let Some(photo) = photo_url {
        lines.push(format!("PHOTO;VALUE=URI:{}", photo));
    }
    lines.push(format!("SOURCE:{}", page_url));
    lines.push("END:VCARD".to_string());

    let mut out = lines.join("\r\n");
    out.push_str("\r\n");
    out
}

/// GET /card/{slug}/vcard
pub async fn card_vcard(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    headers: HeaderMap,
    VisitInfo(visit): VisitInfo,
) -> AppResult<Response> {
    let mut conn = state.db.get()?;
    let card = public_card(&conn, &slug)?;
    if !unlocked(&headers, card.password_hash.as_deref()) {
        return Err(AppError::forbidden("This card is password protected."));
    }
    analytics::record_card_event(&mut conn, &card.id, CardAction::Download, &visit)?;

    let photo_url = state.storage_url(card.photo_path.as_deref());
    let page_url = crate::routes::cards::public_url(&state, &card.slug);
    let body = vcard(&card, photo_url.as_deref(), &page_url);
    Ok((
        [
            (header::CONTENT_TYPE, "text/vcard; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}.vcf\"", card.slug),
            ),
        ],
        body,
    )
        .into_response())
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct BookingForm {
    #[validate(length(min = 1, max = 255, message = "The name field is required."))]
    pub name: String,
    #[validate(email(message = "The email must be a valid email address."))]
    pub email: String,
    #[validate(length(max = 50, message = "The phone may not be greater than 50 characters."))]
    pub phone: String,
    pub scheduled_at: String,
    #[validate(length(max = 2000, message = "The notes may not be greater than 2000 characters."))]
    pub notes: String,
}

/// POST /card/{slug}/appointments: a visitor asks the card owner for a meeting.
pub async fn card_book(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    headers: HeaderMap,
    Form(form): Form<BookingForm>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let card = public_card(&conn, &slug)?;
    if !unlocked(&headers, card.password_hash.as_deref()) {
        return Err(AppError::forbidden("This card is password protected."));
    }

    let checked = form
        .validate()
        .map_err(AppError::from)
        .and_then(|_| parse_schedule(&form.scheduled_at, Utc::now()));
    let scheduled_at = match checked {
        Ok(scheduled_at) => scheduled_at,
        Err(AppError::Validation(errors)) => {
            let message = errors.into_values().flatten().next();
            let page = card_page(&state, &conn, card, false, message)?;
            return Ok((StatusCode::UNPROCESSABLE_ENTITY, Html(page)).into_response());
        }
        Err(e) => return Err(e),
    };

    let appointment = appointments::insert(
        &conn,
        &NewAppointment {
            card_id: card.id.clone(),
            user_id: card.user_id.clone(),
            name: form.name.trim().to_string(),
            email: form.email.trim().to_lowercase(),
            phone: clean(Some(form.phone)),
            scheduled_at,
            notes: clean(Some(form.notes)),
        },
    )?;
    tracing::info!("Appointment {} requested on card {}", appointment.id, card.id);
    see_other(&format!("/card/{}?booked=1", card.slug))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/bio/{slug}", get(bio_page))
        .route("/bio/{slug}/unlock", post(bio_unlock))
        .route("/bio/{slug}/click/{item_id}", get(bio_click))
        .route("/card/{slug}", get(card_view))
        .route("/card/{slug}/unlock", post(card_unlock))
        .route("/card/{slug}/vcard", get(card_vcard))
        .route("/card/{slug}/appointments", post(card_book))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::cards::CardFields;
    use crate::db::models::Role;
    use crate::db::{test_pool, users};

    #[test]
    fn vcard_escapes_and_splits_name() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        let owner = users::insert(&conn, "Ada", "ada@example.com", "h", Role::Free).unwrap();
        let mut fields = CardFields::new("Ada King Lovelace");
        fields.company = Some("Engines, Ltd; London".into());
        fields.email = Some("ada@example.com".into());
        fields.bio = Some("line one\nline two".into());
        let card = cards::insert(&conn, &owner.id, "ada", &fields).unwrap();

        let text = vcard(&card, None, "http://localhost/card/ada");
        assert!(text.starts_with("BEGIN:VCARD\r\nVERSION:3.0\r\n"));
        assert!(text.contains("N:Lovelace;Ada King;;;\r\n"));
        assert!(text.contains("FN:Ada King Lovelace\r\n"));
        assert!(text.contains("ORG:Engines\\, Ltd\\; London\r\n"));
        assert!(text.contains("EMAIL;TYPE=INTERNET:ada@example.com\r\n"));
        assert!(text.contains("NOTE:line one\\nline two\r\n"));
        assert!(!text.contains("TEL"));
        assert!(text.ends_with("END:VCARD\r\n"));
    }

    #[test]
    fn only_safe_schemes_become_links() {
        assert_eq!(safe_href("https://example.com/x").as_deref(), Some("https://example.com/x"));
        assert!(safe_href("mailto:ada@example.com").is_some());
        assert!(safe_href("javascript:alert(1)").is_none());
        assert!(safe_href("@ada").is_none());
    }

    #[test]
    fn unlock_cookie_must_match_current_hash() {
        let mut headers = HeaderMap::new();
        assert!(unlocked(&headers, None));
        assert!(!unlocked(&headers, Some("$2b$04$hash")));
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("linkfolio_unlock=$2b$04$hash"),
        );
        assert!(unlocked(&headers, Some("$2b$04$hash")));
        assert!(!unlocked(&headers, Some("$2b$04$other")));
    }

    #[test]
    fn font_stack_is_sanitized() {
        assert_eq!(css_font("'Inter', sans-serif"), "'Inter', sans-serif");
        assert_eq!(css_font("x;}body{display:none"), "xbodydisplaynone");
        assert_eq!(css_font(";;"), "system-ui");
    }
}
