use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::db::models::{BioLink, BioLinkItem, BioLinkSocial, ItemKind};
use crate::db::new_id;

const COLUMNS: &str = "id, user_id, slug, title, description, avatar_path, background_path, \
     background_color, text_color, button_color, button_text_color, font_family, button_style, \
     is_active, password_hash, views, created_at, updated_at";

fn from_row(row: &Row<'_>) -> rusqlite::Result<BioLink> {
    let password_hash: Option<String> = row.get(14)?;
    Ok(BioLink {
        id: row.get(0)?,
        user_id: row.get(1)?,
        slug: row.get(2)?,
        title: row.get(3)?,
        description: row.get(4)?,
        avatar_path: row.get(5)?,
        background_path: row.get(6)?,
        background_color: row.get(7)?,
        text_color: row.get(8)?,
        button_color: row.get(9)?,
        button_text_color: row.get(10)?,
        font_family: row.get(11)?,
        button_style: row.get(12)?,
        is_active: row.get(13)?,
        is_protected: password_hash.is_some(),
        password_hash,
        views: row.get(15)?,
        created_at: row.get(16)?,
        updated_at: row.get(17)?,
    })
}

#[derive(Debug, Clone)]
pub struct BioLinkFields {
    pub title: String,
    pub description: Option<String>,
    pub background_color: String,
    pub text_color: String,
    pub button_color: String,
    pub button_text_color: String,
    pub font_family: String,
    pub button_style: String,
    pub is_active: bool,
    pub password_hash: Option<String>,
}

impl BioLinkFields {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: None,
            background_color: "#ffffff".to_string(),
            text_color: "#1c1917".to_string(),
            button_color: "#1c1917".to_string(),
            button_text_color: "#ffffff".to_string(),
            font_family: "system-ui".to_string(),
            button_style: "rounded".to_string(),
            is_active: true,
            password_hash: None,
        }
    }
}

impl From<&BioLink> for BioLinkFields {
    fn from(b: &BioLink) -> Self {
        Self {
            title: b.title.clone(),
            description: b.description.clone(),
            background_color: b.background_color.clone(),
            text_color: b.text_color.clone(),
            button_color: b.button_color.clone(),
            button_text_color: b.button_text_color.clone(),
            font_family: b.font_family.clone(),
            button_style: b.button_style.clone(),
            is_active: b.is_active,
            password_hash: b.password_hash.clone(),
        }
    }
}

pub fn slug_taken(conn: &Connection, slug: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT COUNT(*) > 0 FROM bio_links WHERE slug = ?1",
        params![slug],
        |row| row.get(0),
    )
}

pub fn insert(conn: &Connection, user_id: &str, slug: &str, f: &BioLinkFields) -> rusqlite::Result<BioLink> {
    let id = new_id();
    conn.execute(
        "INSERT INTO bio_links (id, user_id, slug, title, description, background_color, text_color,
                                button_color, button_text_color, font_family, button_style, is_active, password_hash)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            id,
            user_id,
            slug,
            f.title,
            f.description,
            f.background_color,
            f.text_color,
            f.button_color,
            f.button_text_color,
            f.font_family,
            f.button_style,
            f.is_active,
            f.password_hash,
        ],
    )?;
    get(conn, &id)
}

pub fn update(conn: &Connection, id: &str, slug: &str, f: &BioLinkFields) -> rusqlite::Result<BioLink> {
    conn.execute(
        "UPDATE bio_links SET slug = ?1, title = ?2, description = ?3, background_color = ?4,
                text_color = ?5, button_color = ?6, button_text_color = ?7, font_family = ?8,
                button_style = ?9, is_active = ?10, password_hash = ?11, updated_at = datetime('now')
         WHERE id = ?12",
        params![
            slug,
            f.title,
            f.description,
            f.background_color,
            f.text_color,
            f.button_color,
            f.button_text_color,
            f.font_family,
            f.button_style,
            f.is_active,
            f.password_hash,
            id,
        ],
    )?;
    get(conn, id)
}

pub fn get(conn: &Connection, id: &str) -> rusqlite::Result<BioLink> {
    conn.query_row(
        &format!("SELECT {} FROM bio_links WHERE id = ?1", COLUMNS),
        params![id],
        from_row,
    )
}

pub fn find(conn: &Connection, id: &str) -> rusqlite::Result<Option<BioLink>> {
    get(conn, id).optional()
}

pub fn find_by_slug(conn: &Connection, slug: &str) -> rusqlite::Result<Option<BioLink>> {
    conn.query_row(
        &format!("SELECT {} FROM bio_links WHERE slug = ?1", COLUMNS),
        params![slug],
        from_row,
    )
    .optional()
}

pub fn list_for_user(conn: &Connection, user_id: &str) -> rusqlite::Result<Vec<BioLink>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM bio_links WHERE user_id = ?1 ORDER BY created_at DESC, id DESC",
        COLUMNS
    ))?;
    let rows = stmt.query_map(params![user_id], from_row)?;
    rows.collect()
}

pub fn count_for_user(conn: &Connection, user_id: &str) -> rusqlite::Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM bio_links WHERE user_id = ?1",
        params![user_id],
        |row| row.get(0),
    )
}

/// Which image slot an upload replaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSlot {
    Avatar,
    Background,
}

pub fn set_image(conn: &Connection, id: &str, slot: ImageSlot, path: Option<&str>) -> rusqlite::Result<()> {
    let sql = match slot {
        ImageSlot::Avatar => {
            "UPDATE bio_links SET avatar_path = ?1, updated_at = datetime('now') WHERE id = ?2"
        }
        ImageSlot::Background => {
            "UPDATE bio_links SET background_path = ?1, updated_at = datetime('now') WHERE id = ?2"
        }
    };
    conn.execute(sql, params![path, id])?;
    Ok(())
}

pub fn delete(conn: &Connection, id: &str) -> rusqlite::Result<bool> {
    let rows = conn.execute("DELETE FROM bio_links WHERE id = ?1", params![id])?;
    Ok(rows > 0)
}

// --- Items ---

const ITEM_COLUMNS: &str =
    "id, bio_link_id, title, url, kind, icon, position, is_active, clicks, created_at, updated_at";

fn item_from_row(row: &Row<'_>) -> rusqlite::Result<BioLinkItem> {
    Ok(BioLinkItem {
        id: row.get(0)?,
        bio_link_id: row.get(1)?,
        title: row.get(2)?,
        url: row.get(3)?,
        kind: row.get(4)?,
        icon: row.get(5)?,
        position: row.get(6)?,
        is_active: row.get(7)?,
        clicks: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

#[derive(Debug, Clone)]
pub struct ItemFields {
    pub title: String,
    pub url: String,
    pub kind: ItemKind,
    pub icon: Option<String>,
    pub is_active: bool,
}

impl From<&BioLinkItem> for ItemFields {
    fn from(i: &BioLinkItem) -> Self {
        Self {
            title: i.title.clone(),
            url: i.url.clone(),
            kind: i.kind,
            icon: i.icon.clone(),
            is_active: i.is_active,
        }
    }
}

pub fn list_items(conn: &Connection, bio_link_id: &str, active_only: bool) -> rusqlite::Result<Vec<BioLinkItem>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM bio_link_items
         WHERE bio_link_id = ?1 AND (?2 = 0 OR is_active = 1)
         ORDER BY position ASC, created_at ASC",
        ITEM_COLUMNS
    ))?;
    let rows = stmt.query_map(params![bio_link_id, active_only], item_from_row)?;
    rows.collect()
}

pub fn count_items(conn: &Connection, bio_link_id: &str) -> rusqlite::Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM bio_link_items WHERE bio_link_id = ?1",
        params![bio_link_id],
        |row| row.get(0),
    )
}

pub fn find_item(conn: &Connection, id: &str) -> rusqlite::Result<Option<BioLinkItem>> {
    conn.query_row(
        &format!("SELECT {} FROM bio_link_items WHERE id = ?1", ITEM_COLUMNS),
        params![id],
        item_from_row,
    )
    .optional()
}

pub fn insert_item(conn: &Connection, bio_link_id: &str, f: &ItemFields) -> rusqlite::Result<BioLinkItem> {
    let id = new_id();
    conn.execute(
        "INSERT INTO bio_link_items (id, bio_link_id, title, url, kind, icon, position, is_active)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6,
                 (SELECT COALESCE(MAX(position) + 1, 0) FROM bio_link_items WHERE bio_link_id = ?2), ?7)",
        params![id, bio_link_id, f.title, f.url, f.kind, f.icon, f.is_active],
    )?;
    conn.query_row(
        &format!("SELECT {} FROM bio_link_items WHERE id = ?1", ITEM_COLUMNS),
        params![id],
        item_from_row,
    )
}

pub fn update_item(conn: &Connection, id: &str, f: &ItemFields) -> rusqlite::Result<BioLinkItem> {
    conn.execute(
        "UPDATE bio_link_items SET title = ?1, url = ?2, kind = ?3, icon = ?4, is_active = ?5,
                updated_at = datetime('now')
         WHERE id = ?6",
        params![f.title, f.url, f.kind, f.icon, f.is_active, id],
    )?;
    conn.query_row(
        &format!("SELECT {} FROM bio_link_items WHERE id = ?1", ITEM_COLUMNS),
        params![id],
        item_from_row,
    )
}

pub fn delete_item(conn: &Connection, id: &str) -> rusqlite::Result<bool> {
    let rows = conn.execute("DELETE FROM bio_link_items WHERE id = ?1", params![id])?;
    Ok(rows > 0)
}

pub fn reorder_items(conn: &mut Connection, bio_link_id: &str, ids: &[String]) -> rusqlite::Result<()> {
    let tx = conn.transaction()?;
    for (position, id) in ids.iter().enumerate() {
        tx.execute(
            "UPDATE bio_link_items SET position = ?1 WHERE id = ?2 AND bio_link_id = ?3",
            params![position as i64, id, bio_link_id],
        )?;
    }
    tx.commit()
}

/// Stored paths of file-type items, for blob cleanup on delete.
pub fn file_item_paths(conn: &Connection, bio_link_id: &str) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT url FROM bio_link_items WHERE bio_link_id = ?1 AND kind = 'file'",
    )?;
    let rows = stmt.query_map(params![bio_link_id], |row| row.get(0))?;
    rows.collect()
}

// --- Social handles ---

const SOCIAL_COLUMNS: &str =
    "id, bio_link_id, platform, url, position, is_active, created_at, updated_at";

fn social_from_row(row: &Row<'_>) -> rusqlite::Result<BioLinkSocial> {
    Ok(BioLinkSocial {
        id: row.get(0)?,
        bio_link_id: row.get(1)?,
        platform: row.get(2)?,
        url: row.get(3)?,
        position: row.get(4)?,
        is_active: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

#[derive(Debug, Clone)]
pub struct SocialFields {
    pub platform: String,
    pub url: String,
    pub is_active: bool,
}

pub fn list_socials(conn: &Connection, bio_link_id: &str, active_only: bool) -> rusqlite::Result<Vec<BioLinkSocial>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM bio_link_social_media
         WHERE bio_link_id = ?1 AND (?2 = 0 OR is_active = 1)
         ORDER BY position ASC, created_at ASC",
        SOCIAL_COLUMNS
    ))?;
    let rows = stmt.query_map(params![bio_link_id, active_only], social_from_row)?;
    rows.collect()
}

pub fn find_social(conn: &Connection, id: &str) -> rusqlite::Result<Option<BioLinkSocial>> {
    conn.query_row(
        &format!("SELECT {} FROM bio_link_social_media WHERE id = ?1", SOCIAL_COLUMNS),
        params![id],
        social_from_row,
    )
    .optional()
}

pub fn insert_social(conn: &Connection, bio_link_id: &str, f: &SocialFields) -> rusqlite::Result<BioLinkSocial> {
    let id = new_id();
    conn.execute(
        "INSERT INTO bio_link_social_media (id, bio_link_id, platform, url, position, is_active)
         VALUES (?1, ?2, ?3, ?4,
                 (SELECT COALESCE(MAX(position) + 1, 0) FROM bio_link_social_media WHERE bio_link_id = ?2), ?5)",
        params![id, bio_link_id, f.platform, f.url, f.is_active],
    )?;
    conn.query_row(
        &format!("SELECT {} FROM bio_link_social_media WHERE id = ?1", SOCIAL_COLUMNS),
        params![id],
        social_from_row,
    )
}

pub fn update_social(
    conn: &Connection,
    id: &str,
    f: &SocialFields,
    position: Option<i64>,
) -> rusqlite::Result<BioLinkSocial> {
    conn.execute(
        "UPDATE bio_link_social_media SET platform = ?1, url = ?2, is_active = ?3,
                position = COALESCE(?4, position), updated_at = datetime('now')
         WHERE id = ?5",
        params![f.platform, f.url, f.is_active, position, id],
    )?;
    conn.query_row(
        &format!("SELECT {} FROM bio_link_social_media WHERE id = ?1", SOCIAL_COLUMNS),
        params![id],
        social_from_row,
    )
}

pub fn delete_social(conn: &Connection, id: &str) -> rusqlite::Result<bool> {
    let rows = conn.execute("DELETE FROM bio_link_social_media WHERE id = ?1", params![id])?;
    Ok(rows > 0)
}
