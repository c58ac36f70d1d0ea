use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::db::models::{Appointment, AppointmentStatus};
use crate::db::new_id;

const COLUMNS: &str = "id, card_id, user_id, name, email, phone, scheduled_at, notes, status, \
     created_at, updated_at";

fn from_row(row: &Row<'_>) -> rusqlite::Result<Appointment> {
    Ok(Appointment {
        id: row.get(0)?,
        card_id: row.get(1)?,
        user_id: row.get(2)?,
        name: row.get(3)?,
        email: row.get(4)?,
        phone: row.get(5)?,
        scheduled_at: row.get(6)?,
        notes: row.get(7)?,
        status: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

#[derive(Debug, Clone)]
pub struct NewAppointment {
    pub card_id: String,
    pub user_id: String,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    /// `%Y-%m-%d %H:%M:%S`, UTC.
    pub scheduled_at: String,
    pub notes: Option<String>,
}

pub fn insert(conn: &Connection, a: &NewAppointment) -> rusqlite::Result<Appointment> {
    let id = new_id();
    conn.execute(
        "INSERT INTO appointments (id, card_id, user_id, name, email, phone, scheduled_at, notes)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            id,
            a.card_id,
            a.user_id,
            a.name,
            a.email,
            a.phone,
            a.scheduled_at,
            a.notes
        ],
    )?;
    get(conn, &id)
}

pub fn get(conn: &Connection, id: &str) -> rusqlite::Result<Appointment> {
    conn.query_row(
        &format!("SELECT {} FROM appointments WHERE id = ?1", COLUMNS),
        params![id],
        from_row,
    )
}

pub fn find(conn: &Connection, id: &str) -> rusqlite::Result<Option<Appointment>> {
    get(conn, id).optional()
}

pub fn list_for_user(
    conn: &Connection,
    user_id: &str,
    status: Option<AppointmentStatus>,
) -> rusqlite::Result<Vec<Appointment>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM appointments
         WHERE user_id = ?1 AND (?2 IS NULL OR status = ?2)
         ORDER BY scheduled_at ASC",
        COLUMNS
    ))?;
    let rows = stmt.query_map(params![user_id, status], from_row)?;
    rows.collect()
}

pub fn update(
    conn: &Connection,
    id: &str,
    status: AppointmentStatus,
    scheduled_at: &str,
    notes: Option<&str>,
) -> rusqlite::Result<Appointment> {
    conn.execute(
        "UPDATE appointments SET status = ?1, scheduled_at = ?2, notes = ?3, updated_at = datetime('now')
         WHERE id = ?4",
        params![status, scheduled_at, notes, id],
    )?;
    get(conn, id)
}

pub fn delete(conn: &Connection, id: &str) -> rusqlite::Result<bool> {
    let rows = conn.execute("DELETE FROM appointments WHERE id = ?1", params![id])?;
    Ok(rows > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::cards::{self, CardFields};
    use crate::db::models::Role;
    use crate::db::{test_pool, users};

    #[test]
    fn booking_lifecycle() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        let owner = users::insert(&conn, "Ada", "ada@example.com", "h", Role::Free).unwrap();
        let card = cards::insert(&conn, &owner.id, "ada", &CardFields::new("Ada")).unwrap();

        let appt = insert(
            &conn,
            &NewAppointment {
                card_id: card.id.clone(),
                user_id: owner.id.clone(),
                name: "Charles".into(),
                email: "charles@example.com".into(),
                phone: None,
                scheduled_at: "2030-01-02 10:00:00".into(),
                notes: Some("Coffee".into()),
            },
        )
        .unwrap();
        assert_eq!(appt.status, AppointmentStatus::Pending);

        let confirmed = update(
            &conn,
            &appt.id,
            AppointmentStatus::Confirmed,
            &appt.scheduled_at,
            appt.notes.as_deref(),
        )
        .unwrap();
        assert_eq!(confirmed.status, AppointmentStatus::Confirmed);

        assert_eq!(
            list_for_user(&conn, &owner.id, Some(AppointmentStatus::Pending))
                .unwrap()
                .len(),
            0
        );
        assert_eq!(list_for_user(&conn, &owner.id, None).unwrap().len(), 1);
        assert!(delete(&conn, &appt.id).unwrap());
    }
}
