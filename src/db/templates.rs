use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::db::models::{json_column, CardTemplate};
use crate::db::new_id;

const COLUMNS: &str = "id, name, description, layout, color_scheme, components, is_premium, is_active, \
     created_at, updated_at";

fn from_row(row: &Row<'_>) -> rusqlite::Result<CardTemplate> {
    Ok(CardTemplate {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        layout: row.get(3)?,
        color_scheme: json_column(row.get(4)?, serde_json::json!({})),
        components: json_column(row.get(5)?, serde_json::json!([])),
        is_premium: row.get(6)?,
        is_active: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

#[derive(Debug, Clone)]
pub struct TemplateFields {
    pub name: String,
    pub description: String,
    pub layout: String,
    pub color_scheme: serde_json::Value,
    pub components: serde_json::Value,
    pub is_premium: bool,
    pub is_active: bool,
}

impl From<&CardTemplate> for TemplateFields {
    fn from(t: &CardTemplate) -> Self {
        Self {
            name: t.name.clone(),
            description: t.description.clone(),
            layout: t.layout.clone(),
            color_scheme: t.color_scheme.clone(),
            components: t.components.clone(),
            is_premium: t.is_premium,
            is_active: t.is_active,
        }
    }
}

pub fn list(conn: &Connection, include_inactive: bool) -> rusqlite::Result<Vec<CardTemplate>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM card_templates WHERE (?1 = 1 OR is_active = 1)
         ORDER BY is_premium ASC, name ASC",
        COLUMNS
    ))?;
    let rows = stmt.query_map(params![include_inactive], from_row)?;
    rows.collect()
}

pub fn find(conn: &Connection, id: &str) -> rusqlite::Result<Option<CardTemplate>> {
    conn.query_row(
        &format!("SELECT {} FROM card_templates WHERE id = ?1", COLUMNS),
        params![id],
        from_row,
    )
    .optional()
}

pub fn name_taken(conn: &Connection, name: &str, except_id: Option<&str>) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT COUNT(*) > 0 FROM card_templates WHERE name = ?1 AND id != ?2",
        params![name, except_id.unwrap_or("")],
        |row| row.get(0),
    )
}

pub fn insert(conn: &Connection, f: &TemplateFields) -> rusqlite::Result<CardTemplate> {
    let id = new_id();
    conn.execute(
        "INSERT INTO card_templates (id, name, description, layout, color_scheme, components, is_premium, is_active)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            id,
            f.name,
            f.description,
            f.layout,
            f.color_scheme.to_string(),
            f.components.to_string(),
            f.is_premium,
            f.is_active,
        ],
    )?;
    conn.query_row(
        &format!("SELECT {} FROM card_templates WHERE id = ?1", COLUMNS),
        params![id],
        from_row,
    )
}

pub fn update(conn: &Connection, id: &str, f: &TemplateFields) -> rusqlite::Result<CardTemplate> {
    conn.execute(
        "UPDATE card_templates SET name = ?1, description = ?2, layout = ?3, color_scheme = ?4,
                components = ?5, is_premium = ?6, is_active = ?7, updated_at = datetime('now')
         WHERE id = ?8",
        params![
            f.name,
            f.description,
            f.layout,
            f.color_scheme.to_string(),
            f.components.to_string(),
            f.is_premium,
            f.is_active,
            id,
        ],
    )?;
    conn.query_row(
        &format!("SELECT {} FROM card_templates WHERE id = ?1", COLUMNS),
        params![id],
        from_row,
    )
}

/// Cards using the template fall back to no template (ON DELETE SET NULL).
pub fn delete(conn: &Connection, id: &str) -> rusqlite::Result<bool> {
    let rows = conn.execute("DELETE FROM card_templates WHERE id = ?1", params![id])?;
    Ok(rows > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;

    #[test]
    fn seeded_catalog_is_listed() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        let all = list(&conn, false).unwrap();
        assert_eq!(all.len(), 4);
        assert!(!all[0].is_premium);
        let modern = find(&conn, "tpl-modern").unwrap().unwrap();
        assert!(modern.is_premium);
        assert_eq!(modern.color_scheme["primary"], "#4f46e5");
    }

    #[test]
    fn inactive_templates_hidden_unless_requested() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        let classic = find(&conn, "tpl-classic").unwrap().unwrap();
        let mut fields = TemplateFields::from(&classic);
        fields.is_active = false;
        update(&conn, &classic.id, &fields).unwrap();

        assert_eq!(list(&conn, false).unwrap().len(), 3);
        assert_eq!(list(&conn, true).unwrap().len(), 4);
    }

    #[test]
    fn names_are_unique() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        assert!(name_taken(&conn, "Classic", None).unwrap());
        assert!(!name_taken(&conn, "Classic", Some("tpl-classic")).unwrap());
    }
}
