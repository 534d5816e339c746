//! 登录会话
//!
//! 令牌原文只返回给客户端一次，数据库中保存 SHA-256 摘要。

use rusqlite::{params, OptionalExtension};
use tracing::debug;

use crate::database::{now_timestamp, StudyDatabase};
use crate::error::AppResult;

pub struct SessionRepo;

impl SessionRepo {
    pub fn create(
        db: &StudyDatabase,
        token_hash: &str,
        user_id: &str,
        expires_at: &str,
    ) -> AppResult<()> {
        let conn = db.get_conn_safe()?;
        conn.execute(
            "INSERT INTO auth_sessions (token_hash, user_id, expires_at, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![token_hash, user_id, expires_at, now_timestamp()],
        )?;
        debug!("[SessionRepo] Created session for user {}", user_id);
        Ok(())
    }

    /// 返回令牌对应的用户 ID（已过期或用户已删除时返回 None）
    pub fn find_user_id(db: &StudyDatabase, token_hash: &str) -> AppResult<Option<String>> {
        let conn = db.get_conn_safe()?;
        let user_id = conn
            .query_row(
                "SELECT s.user_id FROM auth_sessions s
                 JOIN users u ON u.id = s.user_id
                 WHERE s.token_hash = ?1 AND s.expires_at > ?2 AND u.is_deleted = 0",
                params![token_hash, now_timestamp()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(user_id)
    }

    pub fn revoke(db: &StudyDatabase, token_hash: &str) -> AppResult<()> {
        let conn = db.get_conn_safe()?;
        conn.execute(
            "DELETE FROM auth_sessions WHERE token_hash = ?1",
            params![token_hash],
        )?;
        Ok(())
    }

    pub fn revoke_all_for_user(db: &StudyDatabase, user_id: &str) -> AppResult<usize> {
        let conn = db.get_conn_safe()?;
        let removed = conn.execute(
            "DELETE FROM auth_sessions WHERE user_id = ?1",
            params![user_id],
        )?;
        debug!(
            "[SessionRepo] Revoked {} sessions for user {}",
            removed, user_id
        );
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_support::{insert_user, setup_test_db};

    #[test]
    fn test_session_lookup_and_expiry() {
        let (_dir, db) = setup_test_db();
        let user_id = insert_user(&db, "s@example.com");

        SessionRepo::create(&db, "live", &user_id, "2999-01-01T00:00:00.000Z").expect("create");
        SessionRepo::create(&db, "stale", &user_id, "2000-01-01T00:00:00.000Z").expect("create");

        assert_eq!(
            SessionRepo::find_user_id(&db, "live").expect("query"),
            Some(user_id.clone())
        );
        assert_eq!(SessionRepo::find_user_id(&db, "stale").expect("query"), None);

        SessionRepo::revoke(&db, "live").expect("revoke");
        assert_eq!(SessionRepo::find_user_id(&db, "live").expect("query"), None);
    }
}
