use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::db::models::{Role, Subscription};
use crate::db::new_id;
use crate::plans::Plan;

const COLUMNS: &str = "id, user_id, plan, status, started_at, ends_at, cancelled_at, created_at";

fn from_row(row: &Row<'_>) -> rusqlite::Result<Subscription> {
    Ok(Subscription {
        id: row.get(0)?,
        user_id: row.get(1)?,
        plan: row.get(2)?,
        status: row.get(3)?,
        started_at: row.get(4)?,
        ends_at: row.get(5)?,
        cancelled_at: row.get(6)?,
        created_at: row.get(7)?,
    })
}

pub fn list_for_user(conn: &Connection, user_id: &str) -> rusqlite::Result<Vec<Subscription>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM subscriptions WHERE user_id = ?1 ORDER BY created_at DESC, id DESC",
        COLUMNS
    ))?;
    let rows = stmt.query_map(params![user_id], from_row)?;
    rows.collect()
}

pub fn find(conn: &Connection, id: &str) -> rusqlite::Result<Option<Subscription>> {
    conn.query_row(
        &format!("SELECT {} FROM subscriptions WHERE id = ?1", COLUMNS),
        params![id],
        from_row,
    )
    .optional()
}

pub fn active_for_user(conn: &Connection, user_id: &str) -> rusqlite::Result<Option<Subscription>> {
    conn.query_row(
        &format!(
            "SELECT {} FROM subscriptions WHERE user_id = ?1 AND status = 'active'
             ORDER BY created_at DESC, id DESC LIMIT 1",
            COLUMNS
        ),
        params![user_id],
        from_row,
    )
    .optional()
}

/// Cancel whatever is active, start `plan` for a month, and move the user to the plan's role.
pub fn subscribe(conn: &mut Connection, user_id: &str, plan: &Plan) -> rusqlite::Result<Subscription> {
    let tx = conn.transaction()?;
    tx.execute(
        "UPDATE subscriptions SET status = 'cancelled', cancelled_at = datetime('now')
         WHERE user_id = ?1 AND status = 'active'",
        params![user_id],
    )?;

    let id = new_id();
    tx.execute(
        "INSERT INTO subscriptions (id, user_id, plan, status, ends_at)
         VALUES (?1, ?2, ?3, 'active', datetime('now', '+1 month'))",
        params![id, user_id, plan.slug],
    )?;
    tx.execute(
        "UPDATE users SET role = ?1, updated_at = datetime('now') WHERE id = ?2 AND role != 'admin'",
        params![plan.role, user_id],
    )?;
    tx.commit()?;

    conn.query_row(
        &format!("SELECT {} FROM subscriptions WHERE id = ?1", COLUMNS),
        params![id],
        from_row,
    )
}

/// Cancel one subscription and drop the user back to the free role.
pub fn cancel(conn: &mut Connection, id: &str) -> rusqlite::Result<Subscription> {
    let tx = conn.transaction()?;
    let user_id: String = tx.query_row(
        "SELECT user_id FROM subscriptions WHERE id = ?1",
        params![id],
        |row| row.get(0),
    )?;
    tx.execute(
        "UPDATE subscriptions SET status = 'cancelled', cancelled_at = datetime('now')
         WHERE id = ?1 AND status = 'active'",
        params![id],
    )?;
    tx.execute(
        "UPDATE users SET role = ?1, updated_at = datetime('now') WHERE id = ?2 AND role != 'admin'",
        params![Role::Free, user_id],
    )?;
    tx.commit()?;

    conn.query_row(
        &format!("SELECT {} FROM subscriptions WHERE id = ?1", COLUMNS),
        params![id],
        from_row,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::SubscriptionStatus;
    use crate::db::{test_pool, users};
    use crate::plans;

    #[test]
    fn subscribe_replaces_active_and_sets_role() {
        let pool = test_pool();
        let mut conn = pool.get().unwrap();
        let user = users::insert(&conn, "Ada", "ada@example.com", "h", Role::Free).unwrap();

        let first = subscribe(&mut conn, &user.id, &plans::PREMIUM).unwrap();
        assert_eq!(first.status, SubscriptionStatus::Active);
        assert!(first.ends_at.is_some());
        assert_eq!(users::get(&conn, &user.id).unwrap().role, Role::Premium);

        let second = subscribe(&mut conn, &user.id, &plans::BUSINESS).unwrap();
        assert_eq!(users::get(&conn, &user.id).unwrap().role, Role::Business);
        assert_eq!(active_for_user(&conn, &user.id).unwrap().unwrap().id, second.id);
        assert_eq!(
            find(&conn, &first.id).unwrap().unwrap().status,
            SubscriptionStatus::Cancelled
        );
    }

    #[test]
    fn cancel_returns_user_to_free() {
        let pool = test_pool();
        let mut conn = pool.get().unwrap();
        let user = users::insert(&conn, "Ada", "ada@example.com", "h", Role::Free).unwrap();
        let sub = subscribe(&mut conn, &user.id, &plans::PREMIUM).unwrap();

        let cancelled = cancel(&mut conn, &sub.id).unwrap();
        assert_eq!(cancelled.status, SubscriptionStatus::Cancelled);
        assert!(cancelled.cancelled_at.is_some());
        assert_eq!(users::get(&conn, &user.id).unwrap().role, Role::Free);
        assert!(active_for_user(&conn, &user.id).unwrap().is_none());
    }

    #[test]
    fn admins_keep_their_role() {
        let pool = test_pool();
        let mut conn = pool.get().unwrap();
        let admin = users::insert(&conn, "Root", "root@example.com", "h", Role::Admin).unwrap();
        let sub = subscribe(&mut conn, &admin.id, &plans::PREMIUM).unwrap();
        cancel(&mut conn, &sub.id).unwrap();
        assert_eq!(users::get(&conn, &admin.id).unwrap().role, Role::Admin);
    }
}
