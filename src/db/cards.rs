use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::db::models::{json_column, Card, CardComponent, ComponentKind};
use crate::db::new_id;

const COLUMNS: &str = "id, user_id, slug, name, title, company, email, phone, website, address, bio, \
     photo_path, template_id, primary_color, secondary_color, text_color, is_public, password_hash, \
     views, shares, downloads, created_at, updated_at";

fn from_row(row: &Row<'_>) -> rusqlite::Result<Card> {
    let password_hash: Option<String> = row.get(17)?;
    Ok(Card {
        id: row.get(0)?,
        user_id: row.get(1)?,
        slug: row.get(2)?,
        name: row.get(3)?,
        title: row.get(4)?,
        company: row.get(5)?,
        email: row.get(6)?,
        phone: row.get(7)?,
        website: row.get(8)?,
        address: row.get(9)?,
        bio: row.get(10)?,
        photo_path: row.get(11)?,
        template_id: row.get(12)?,
        primary_color: row.get(13)?,
        secondary_color: row.get(14)?,
        text_color: row.get(15)?,
        is_public: row.get(16)?,
        is_protected: password_hash.is_some(),
        password_hash,
        views: row.get(18)?,
        shares: row.get(19)?,
        downloads: row.get(20)?,
        created_at: row.get(21)?,
        updated_at: row.get(22)?,
    })
}

/// Owner-editable card columns.
#[derive(Debug, Clone)]
pub struct CardFields {
    pub name: String,
    pub title: Option<String>,
    pub company: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub address: Option<String>,
    pub bio: Option<String>,
    pub template_id: Option<String>,
    pub primary_color: String,
    pub secondary_color: String,
    pub text_color: String,
    pub is_public: bool,
    pub password_hash: Option<String>,
}

impl CardFields {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            title: None,
            company: None,
            email: None,
            phone: None,
            website: None,
            address: None,
            bio: None,
            template_id: None,
            primary_color: "#1c1917".to_string(),
            secondary_color: "#fafaf9".to_string(),
            text_color: "#1c1917".to_string(),
            is_public: true,
            password_hash: None,
        }
    }
}

impl From<&Card> for CardFields {
    fn from(card: &Card) -> Self {
        Self {
            name: card.name.clone(),
            title: card.title.clone(),
            company: card.company.clone(),
            email: card.email.clone(),
            phone: card.phone.clone(),
            website: card.website.clone(),
            address: card.address.clone(),
            bio: card.bio.clone(),
            template_id: card.template_id.clone(),
            primary_color: card.primary_color.clone(),
            secondary_color: card.secondary_color.clone(),
            text_color: card.text_color.clone(),
            is_public: card.is_public,
            password_hash: card.password_hash.clone(),
        }
    }
}

pub fn slug_taken(conn: &Connection, slug: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT COUNT(*) > 0 FROM cards WHERE slug = ?1",
        params![slug],
        |row| row.get(0),
    )
}

pub fn insert(conn: &Connection, user_id: &str, slug: &str, f: &CardFields) -> rusqlite::Result<Card> {
    let id = new_id();
    conn.execute(
        "INSERT INTO cards (id, user_id, slug, name, title, company, email, phone, website, address, bio,
                            template_id, primary_color, secondary_color, text_color, is_public, password_hash)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
        params![
            id,
            user_id,
            slug,
            f.name,
            f.title,
            f.company,
            f.email,
            f.phone,
            f.website,
            f.address,
            f.bio,
            f.template_id,
            f.primary_color,
            f.secondary_color,
            f.text_color,
            f.is_public,
            f.password_hash,
        ],
    )?;
    get(conn, &id)
}

pub fn update(conn: &Connection, id: &str, slug: &str, f: &CardFields) -> rusqlite::Result<Card> {
    conn.execute(
        "UPDATE cards SET slug = ?1, name = ?2, title = ?3, company = ?4, email = ?5, phone = ?6,
                website = ?7, address = ?8, bio = ?9, template_id = ?10, primary_color = ?11,
                secondary_color = ?12, text_color = ?13, is_public = ?14, password_hash = ?15,
                updated_at = datetime('now')
         WHERE id = ?16",
        params![
            slug,
            f.name,
            f.title,
            f.company,
            f.email,
            f.phone,
            f.website,
            f.address,
            f.bio,
            f.template_id,
            f.primary_color,
            f.secondary_color,
            f.text_color,
            f.is_public,
            f.password_hash,
            id,
        ],
    )?;
    get(conn, id)
}

pub fn get(conn: &Connection, id: &str) -> rusqlite::Result<Card> {
    conn.query_row(
        &format!("SELECT {} FROM cards WHERE id = ?1", COLUMNS),
        params![id],
        from_row,
    )
}

pub fn find(conn: &Connection, id: &str) -> rusqlite::Result<Option<Card>> {
    get(conn, id).optional()
}

pub fn find_by_slug(conn: &Connection, slug: &str) -> rusqlite::Result<Option<Card>> {
    conn.query_row(
        &format!("SELECT {} FROM cards WHERE slug = ?1", COLUMNS),
        params![slug],
        from_row,
    )
    .optional()
}

pub fn list_for_user(conn: &Connection, user_id: &str) -> rusqlite::Result<Vec<Card>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM cards WHERE user_id = ?1 ORDER BY created_at DESC, id DESC",
        COLUMNS
    ))?;
    let rows = stmt.query_map(params![user_id], from_row)?;
    rows.collect()
}

pub fn count_for_user(conn: &Connection, user_id: &str) -> rusqlite::Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM cards WHERE user_id = ?1",
        params![user_id],
        |row| row.get(0),
    )
}

pub fn set_photo(conn: &Connection, id: &str, photo_path: Option<&str>) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE cards SET photo_path = ?1, updated_at = datetime('now') WHERE id = ?2",
        params![photo_path, id],
    )?;
    Ok(())
}

pub fn delete(conn: &Connection, id: &str) -> rusqlite::Result<bool> {
    let rows = conn.execute("DELETE FROM cards WHERE id = ?1", params![id])?;
    Ok(rows > 0)
}

// --- Components ---

const COMPONENT_COLUMNS: &str =
    "id, card_id, kind, title, content, settings, position, is_active, created_at, updated_at";

fn component_from_row(row: &Row<'_>) -> rusqlite::Result<CardComponent> {
    Ok(CardComponent {
        id: row.get(0)?,
        card_id: row.get(1)?,
        kind: row.get(2)?,
        title: row.get(3)?,
        content: row.get(4)?,
        settings: json_column(row.get(5)?, serde_json::json!({})),
        position: row.get(6)?,
        is_active: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

#[derive(Debug, Clone)]
pub struct ComponentFields {
    pub kind: ComponentKind,
    pub title: Option<String>,
    pub content: Option<String>,
    pub settings: serde_json::Value,
    pub is_active: bool,
}

impl From<&CardComponent> for ComponentFields {
    fn from(c: &CardComponent) -> Self {
        Self {
            kind: c.kind,
            title: c.title.clone(),
            content: c.content.clone(),
            settings: c.settings.clone(),
            is_active: c.is_active,
        }
    }
}

pub fn list_components(
    conn: &Connection,
    card_id: &str,
    active_only: bool,
) -> rusqlite::Result<Vec<CardComponent>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM card_components
         WHERE card_id = ?1 AND (?2 = 0 OR is_active = 1)
         ORDER BY position ASC, created_at ASC",
        COMPONENT_COLUMNS
    ))?;
    let rows = stmt.query_map(params![card_id, active_only], component_from_row)?;
    rows.collect()
}

pub fn find_component(conn: &Connection, id: &str) -> rusqlite::Result<Option<CardComponent>> {
    conn.query_row(
        &format!("SELECT {} FROM card_components WHERE id = ?1", COMPONENT_COLUMNS),
        params![id],
        component_from_row,
    )
    .optional()
}

pub fn insert_component(
    conn: &Connection,
    card_id: &str,
    f: &ComponentFields,
) -> rusqlite::Result<CardComponent> {
    let id = new_id();
    conn.execute(
        "INSERT INTO card_components (id, card_id, kind, title, content, settings, position, is_active)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6,
                 (SELECT COALESCE(MAX(position) + 1, 0) FROM card_components WHERE card_id = ?2), ?7)",
        params![
            id,
            card_id,
            f.kind,
            f.title,
            f.content,
            f.settings.to_string(),
            f.is_active,
        ],
    )?;
    conn.query_row(
        &format!("SELECT {} FROM card_components WHERE id = ?1", COMPONENT_COLUMNS),
        params![id],
        component_from_row,
    )
}

pub fn update_component(
    conn: &Connection,
    id: &str,
    f: &ComponentFields,
) -> rusqlite::Result<CardComponent> {
    conn.execute(
        "UPDATE card_components SET kind = ?1, title = ?2, content = ?3, settings = ?4, is_active = ?5,
                updated_at = datetime('now')
         WHERE id = ?6",
        params![
            f.kind,
            f.title,
            f.content,
            f.settings.to_string(),
            f.is_active,
            id
        ],
    )?;
    conn.query_row(
        &format!("SELECT {} FROM card_components WHERE id = ?1", COMPONENT_COLUMNS),
        params![id],
        component_from_row,
    )
}

pub fn delete_component(conn: &Connection, id: &str) -> rusqlite::Result<bool> {
    let rows = conn.execute("DELETE FROM card_components WHERE id = ?1", params![id])?;
    Ok(rows > 0)
}

/// Assign positions 0..n in the given order. Ids not belonging to the card are ignored.
pub fn reorder_components(conn: &mut Connection, card_id: &str, ids: &[String]) -> rusqlite::Result<()> {
    let tx = conn.transaction()?;
    for (position, id) in ids.iter().enumerate() {
        tx.execute(
            "UPDATE card_components SET position = ?1 WHERE id = ?2 AND card_id = ?3",
            params![position as i64, id, card_id],
        )?;
    }
    tx.commit()
}
