use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;

use crate::db::models::{Role, User};
use crate::db::new_id;

const COLUMNS: &str = "id, name, email, password_hash, role, photo_path, created_at, updated_at";

fn from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        role: row.get(4)?,
        photo_path: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

/// Emails are compared case-insensitively by storing them lower-cased.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn insert(
    conn: &Connection,
    name: &str,
    email: &str,
    password_hash: &str,
    role: Role,
) -> rusqlite::Result<User> {
    let id = new_id();
    conn.execute(
        "INSERT INTO users (id, name, email, password_hash, role) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![id, name, normalize_email(email), password_hash, role],
    )?;
    get(conn, &id)
}

pub fn get(conn: &Connection, id: &str) -> rusqlite::Result<User> {
    conn.query_row(
        &format!("SELECT {} FROM users WHERE id = ?1", COLUMNS),
        params![id],
        from_row,
    )
}

pub fn find(conn: &Connection, id: &str) -> rusqlite::Result<Option<User>> {
    get(conn, id).optional()
}

pub fn find_by_email(conn: &Connection, email: &str) -> rusqlite::Result<Option<User>> {
    conn.query_row(
        &format!("SELECT {} FROM users WHERE email = ?1", COLUMNS),
        params![normalize_email(email)],
        from_row,
    )
    .optional()
}

/// Owner of an unexpired session token.
pub fn find_by_session_token(conn: &Connection, token: &str) -> rusqlite::Result<Option<User>> {
    conn.query_row(
        "SELECT u.id, u.name, u.email, u.password_hash, u.role, u.photo_path, u.created_at, u.updated_at
         FROM sessions s JOIN users u ON u.id = s.user_id
         WHERE s.token = ?1 AND s.expires_at > datetime('now')",
        params![token],
        from_row,
    )
    .optional()
}

/// True when another account already uses `email`.
pub fn email_taken(conn: &Connection, email: &str, except_id: Option<&str>) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT COUNT(*) > 0 FROM users WHERE email = ?1 AND id != ?2",
        params![normalize_email(email), except_id.unwrap_or("")],
        |row| row.get(0),
    )
}

pub fn update_profile(conn: &Connection, id: &str, name: &str, email: &str) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE users SET name = ?1, email = ?2, updated_at = datetime('now') WHERE id = ?3",
        params![name, normalize_email(email), id],
    )?;
    Ok(())
}

pub fn update_password(conn: &Connection, id: &str, password_hash: &str) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE users SET password_hash = ?1, updated_at = datetime('now') WHERE id = ?2",
        params![password_hash, id],
    )?;
    Ok(())
}

pub fn update_photo(conn: &Connection, id: &str, photo_path: Option<&str>) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE users SET photo_path = ?1, updated_at = datetime('now') WHERE id = ?2",
        params![photo_path, id],
    )?;
    Ok(())
}

pub fn set_role(conn: &Connection, id: &str, role: Role) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE users SET role = ?1, updated_at = datetime('now') WHERE id = ?2",
        params![role, id],
    )?;
    Ok(())
}

pub fn delete(conn: &Connection, id: &str) -> rusqlite::Result<bool> {
    let rows = conn.execute("DELETE FROM users WHERE id = ?1", params![id])?;
    Ok(rows > 0)
}

pub fn has_permission(conn: &Connection, role: Role, permission: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT COUNT(*) > 0 FROM role_permissions WHERE role = ?1 AND permission = ?2",
        params![role, permission],
        |row| row.get(0),
    )
}

pub fn permissions_for(conn: &Connection, role: Role) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn
        .prepare("SELECT permission FROM role_permissions WHERE role = ?1 ORDER BY permission")?;
    let rows = stmt.query_map(params![role], |row| row.get(0))?;
    rows.collect()
}

/// Admin listing row.
#[derive(Debug, Clone, Serialize)]
pub struct UserSummary {
    #[serde(flatten)]
    pub user: User,
    pub cards_count: i64,
    pub bio_links_count: i64,
}

pub fn list_with_counts(conn: &Connection, limit: i64, offset: i64) -> rusqlite::Result<Vec<UserSummary>> {
    let mut stmt = conn.prepare(
        "SELECT u.id, u.name, u.email, u.password_hash, u.role, u.photo_path, u.created_at, u.updated_at,
                (SELECT COUNT(*) FROM cards c WHERE c.user_id = u.id),
                (SELECT COUNT(*) FROM bio_links b WHERE b.user_id = u.id)
         FROM users u
         ORDER BY u.created_at DESC, u.id DESC
         LIMIT ?1 OFFSET ?2",
    )?;
    let rows = stmt.query_map(params![limit, offset], |row| {
        Ok(UserSummary {
            user: from_row(row)?,
            cards_count: row.get(8)?,
            bio_links_count: row.get(9)?,
        })
    })?;
    rows.collect()
}

pub fn count(conn: &Connection) -> rusqlite::Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
}
