use rusqlite::{params, Connection};

pub fn record(
    conn: &Connection,
    path: &str,
    user_id: &str,
    content_type: &str,
    size: u64,
) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO uploads (path, user_id, content_type, size) VALUES (?1, ?2, ?3, ?4)",
        params![path, user_id, content_type, size as i64],
    )?;
    Ok(())
}

pub fn forget(conn: &Connection, path: &str) -> rusqlite::Result<()> {
    conn.execute("DELETE FROM uploads WHERE path = ?1", params![path])?;
    Ok(())
}

/// Bytes currently stored for a user.
pub fn used_bytes(conn: &Connection, user_id: &str) -> rusqlite::Result<u64> {
    let total: i64 = conn.query_row(
        "SELECT COALESCE(SUM(size), 0) FROM uploads WHERE user_id = ?1",
        params![user_id],
        |row| row.get(0),
    )?;
    Ok(total.max(0) as u64)
}

pub fn paths_for_user(conn: &Connection, user_id: &str) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT path FROM uploads WHERE user_id = ?1")?;
    let rows = stmt.query_map(params![user_id], |row| row.get(0))?;
    rows.collect()
}
