use rand::Rng;
use rusqlite::{params, Connection};

use crate::db::models::User;
use crate::db::{new_id, users};

/// Create a new session for a user. Returns the session token.
pub fn create_session(conn: &Connection, user_id: &str, hours: u64) -> rusqlite::Result<String> {
    let token = generate_token();

    conn.execute(
        "INSERT INTO sessions (id, user_id, token, expires_at) VALUES (?1, ?2, ?3, datetime('now', ?4))",
        params![new_id(), user_id, token, format!("+{} hours", hours)],
    )?;

    Ok(token)
}

/// Delete a session by token.
pub fn delete_session(conn: &Connection, token: &str) -> rusqlite::Result<()> {
    conn.execute("DELETE FROM sessions WHERE token = ?1", params![token])?;
    Ok(())
}

/// Drop a user's expired sessions; called on login so the table stays bounded.
pub fn purge_expired(conn: &Connection, user_id: &str) -> rusqlite::Result<usize> {
    conn.execute(
        "DELETE FROM sessions WHERE user_id = ?1 AND expires_at <= datetime('now')",
        params![user_id],
    )
}

/// Sign a user out everywhere except `keep`.
pub fn delete_other_sessions(conn: &Connection, user_id: &str, keep: &str) -> rusqlite::Result<usize> {
    conn.execute(
        "DELETE FROM sessions WHERE user_id = ?1 AND token != ?2",
        params![user_id, keep],
    )
}

pub fn user_for_token(conn: &Connection, token: &str) -> rusqlite::Result<Option<User>> {
    users::find_by_session_token(conn, token)
}

/// Generate a cryptographically random 32-byte hex token.
pub fn generate_token() -> String {
    let mut rng = rand::thread_rng();
    let bytes: [u8; 32] = rng.gen();
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::Role;
    use crate::db::test_pool;

    #[test]
    fn generate_token_is_64_hex_chars() {
        let token = generate_token();
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn generate_token_is_unique() {
        let t1 = generate_token();
        let t2 = generate_token();
        assert_ne!(t1, t2);
    }

    #[test]
    fn session_resolves_until_deleted() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        let user = users::insert(&conn, "Ada", "ada@example.com", "h", Role::Free).unwrap();

        let token = create_session(&conn, &user.id, 1).unwrap();
        assert_eq!(user_for_token(&conn, &token).unwrap().unwrap().id, user.id);

        delete_session(&conn, &token).unwrap();
        assert!(user_for_token(&conn, &token).unwrap().is_none());
    }

    #[test]
    fn expired_sessions_do_not_resolve() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        let user = users::insert(&conn, "Ada", "ada@example.com", "h", Role::Free).unwrap();
        conn.execute(
            "INSERT INTO sessions (id, user_id, token, expires_at) VALUES ('s1', ?1, 'old', datetime('now', '-1 hours'))",
            params![user.id],
        )
        .unwrap();

        assert!(user_for_token(&conn, "old").unwrap().is_none());
        assert_eq!(purge_expired(&conn, &user.id).unwrap(), 1);
    }
}
