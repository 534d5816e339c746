//! 用户表 CRUD
//!
//! 密码、重置令牌、恢复验证码只以哈希形式存储，读取时通过
//! `UserCredentials` 单独返回，`User` 本身可以直接序列化给客户端。

use rusqlite::{params, Connection, OptionalExtension};
use tracing::info;

use crate::database::{new_id, now_timestamp, StudyDatabase};
use crate::error::{AppError, AppResult};
use crate::models::{Grade, UpdateProfileParams, User, UserCredentials};

const USER_COLUMNS: &str = "id, name, email, avatar, bio, grade, study_streak, last_study_date, \
                            is_deleted, deleted_at, created_at, updated_at";

const CREDENTIAL_COLUMNS: &str = "id, password_hash, reset_token_hash, reset_token_expires_at, \
                                  restore_otp_hash, restore_otp_expires_at";

pub struct UserRepo;

impl UserRepo {
    /// 规范化邮箱（去空白、小写）
    pub fn normalize_email(email: &str) -> String {
        email.trim().to_lowercase()
    }

    // ========================================================================
    // 创建
    // ========================================================================

    pub fn create_user(
        db: &StudyDatabase,
        name: &str,
        email: &str,
        password_hash: &str,
    ) -> AppResult<User> {
        let conn = db.get_conn_safe()?;
        Self::create_user_with_conn(&conn, name, email, password_hash)
    }

    pub fn create_user_with_conn(
        conn: &Connection,
        name: &str,
        email: &str,
        password_hash: &str,
    ) -> AppResult<User> {
        let email = Self::normalize_email(email);
        let exists: bool = conn
            .query_row(
                "SELECT 1 FROM users WHERE email = ?1",
                params![email],
                |_| Ok(true),
            )
            .optional()?
            .unwrap_or(false);
        if exists {
            return Err(AppError::conflict("User already exists"));
        }

        let id = new_id("user");
        let now = now_timestamp();
        conn.execute(
            "INSERT INTO users (id, name, email, password_hash, grade, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
            params![id, name.trim(), email, password_hash, Grade::default().as_str(), now],
        )?;

        info!("[UserRepo] Created user: {}", id);
        Self::find_any_with_conn(conn, &id)?.ok_or_else(|| AppError::not_found("User", &id))
    }

    // ========================================================================
    // 查询
    // ========================================================================

    /// 获取未删除的用户
    pub fn find_by_id(db: &StudyDatabase, user_id: &str) -> AppResult<Option<User>> {
        let conn = db.get_conn_safe()?;
        Self::find_by_id_with_conn(&conn, user_id)
    }

    pub fn find_by_id_with_conn(conn: &Connection, user_id: &str) -> AppResult<Option<User>> {
        let sql = format!(
            "SELECT {} FROM users WHERE id = ?1 AND is_deleted = 0",
            USER_COLUMNS
        );
        let user = conn
            .query_row(&sql, params![user_id], Self::row_to_user)
            .optional()?;
        Ok(user)
    }

    /// 获取用户（包含已软删除）
    pub fn find_any(db: &StudyDatabase, user_id: &str) -> AppResult<Option<User>> {
        let conn = db.get_conn_safe()?;
        Self::find_any_with_conn(&conn, user_id)
    }

    pub fn find_any_with_conn(conn: &Connection, user_id: &str) -> AppResult<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS);
        let user = conn
            .query_row(&sql, params![user_id], Self::row_to_user)
            .optional()?;
        Ok(user)
    }

    /// 按邮箱查找（包含已软删除，由调用方判断状态）
    pub fn find_by_email_any(db: &StudyDatabase, email: &str) -> AppResult<Option<User>> {
        let conn = db.get_conn_safe()?;
        let sql = format!("SELECT {} FROM users WHERE email = ?1", USER_COLUMNS);
        let user = conn
            .query_row(
                &sql,
                params![Self::normalize_email(email)],
                Self::row_to_user,
            )
            .optional()?;
        Ok(user)
    }

    pub fn get_credentials(db: &StudyDatabase, user_id: &str) -> AppResult<UserCredentials> {
        let conn = db.get_conn_safe()?;
        let sql = format!("SELECT {} FROM users WHERE id = ?1", CREDENTIAL_COLUMNS);
        conn.query_row(&sql, params![user_id], |row| {
            Ok(UserCredentials {
                user_id: row.get(0)?,
                password_hash: row.get(1)?,
                reset_token_hash: row.get(2)?,
                reset_token_expires_at: row.get(3)?,
                restore_otp_hash: row.get(4)?,
                restore_otp_expires_at: row.get(5)?,
            })
        })
        .optional()?
        .ok_or_else(|| AppError::not_found("User", user_id))
    }

    /// 按重置令牌哈希查找仍在有效期内的用户
    pub fn find_by_reset_token(
        db: &StudyDatabase,
        token_hash: &str,
        now: &str,
    ) -> AppResult<Option<User>> {
        let conn = db.get_conn_safe()?;
        let sql = format!(
            "SELECT {} FROM users
             WHERE reset_token_hash = ?1 AND reset_token_expires_at > ?2 AND is_deleted = 0",
            USER_COLUMNS
        );
        let user = conn
            .query_row(&sql, params![token_hash, now], Self::row_to_user)
            .optional()?;
        Ok(user)
    }

    // ========================================================================
    // 更新
    // ========================================================================

    pub fn update_profile(
        db: &StudyDatabase,
        user_id: &str,
        update: &UpdateProfileParams,
    ) -> AppResult<User> {
        let conn = db.get_conn_safe()?;
        let current = Self::find_by_id_with_conn(&conn, user_id)?
            .ok_or_else(|| AppError::not_found("User", user_id))?;

        let name = match &update.name {
            Some(name) if name.trim().is_empty() => {
                return Err(AppError::validation("Name cannot be empty"))
            }
            Some(name) => name.trim().to_string(),
            None => current.name,
        };
        let bio = update.bio.clone().unwrap_or(current.bio);
        let grade = update.grade.unwrap_or(current.grade);
        let avatar = update.avatar.clone().or(current.avatar);

        conn.execute(
            "UPDATE users SET name = ?1, bio = ?2, grade = ?3, avatar = ?4, updated_at = ?5
             WHERE id = ?6",
            params![name, bio, grade.as_str(), avatar, now_timestamp(), user_id],
        )?;

        Self::find_by_id_with_conn(&conn, user_id)?
            .ok_or_else(|| AppError::not_found("User", user_id))
    }

    /// 更新密码，同时清除未使用的重置令牌
    pub fn update_password(db: &StudyDatabase, user_id: &str, password_hash: &str) -> AppResult<()> {
        let conn = db.get_conn_safe()?;
        conn.execute(
            "UPDATE users SET password_hash = ?1, reset_token_hash = NULL,
                 reset_token_expires_at = NULL, updated_at = ?2
             WHERE id = ?3",
            params![password_hash, now_timestamp(), user_id],
        )?;
        Ok(())
    }

    pub fn set_reset_token(
        db: &StudyDatabase,
        user_id: &str,
        token_hash: &str,
        expires_at: &str,
    ) -> AppResult<()> {
        let conn = db.get_conn_safe()?;
        conn.execute(
            "UPDATE users SET reset_token_hash = ?1, reset_token_expires_at = ?2 WHERE id = ?3",
            params![token_hash, expires_at, user_id],
        )?;
        Ok(())
    }

    pub fn set_restore_otp(
        db: &StudyDatabase,
        user_id: &str,
        otp_hash: Option<&str>,
        expires_at: Option<&str>,
    ) -> AppResult<()> {
        let conn = db.get_conn_safe()?;
        conn.execute(
            "UPDATE users SET restore_otp_hash = ?1, restore_otp_expires_at = ?2,
                 restore_otp_attempts = 0 WHERE id = ?3",
            params![otp_hash, expires_at, user_id],
        )?;
        Ok(())
    }

    /// 记录一次恢复验证码错误；达到上限时作废验证码，返回是否已作废
    pub fn record_failed_restore_attempt(
        db: &StudyDatabase,
        user_id: &str,
        max_attempts: u32,
    ) -> AppResult<bool> {
        let mut conn = db.get_conn_safe()?;
        let tx = conn.transaction()?;
        tx.execute(
            "UPDATE users SET restore_otp_attempts = restore_otp_attempts + 1 WHERE id = ?1",
            params![user_id],
        )?;
        let cleared = tx.execute(
            "UPDATE users SET restore_otp_hash = NULL, restore_otp_expires_at = NULL
             WHERE id = ?1 AND restore_otp_attempts >= ?2",
            params![user_id, max_attempts],
        )?;
        tx.commit()?;
        Ok(cleared > 0)
    }

    pub fn set_study_streak(db: &StudyDatabase, user_id: &str, streak: i64) -> AppResult<()> {
        let conn = db.get_conn_safe()?;
        conn.execute(
            "UPDATE users SET study_streak = ?1, last_study_date = CASE WHEN ?1 > 0 THEN ?2 ELSE last_study_date END
             WHERE id = ?3",
            params![streak, now_timestamp(), user_id],
        )?;
        Ok(())
    }

    // ========================================================================
    // 删除 / 恢复
    // ========================================================================

    pub fn soft_delete(db: &StudyDatabase, user_id: &str) -> AppResult<()> {
        let conn = db.get_conn_safe()?;
        let now = now_timestamp();
        let updated = conn.execute(
            "UPDATE users SET is_deleted = 1, deleted_at = ?1, updated_at = ?1
             WHERE id = ?2 AND is_deleted = 0",
            params![now, user_id],
        )?;
        if updated == 0 {
            return Err(AppError::not_found("User", user_id));
        }
        info!("[UserRepo] Soft deleted user: {}", user_id);
        Ok(())
    }

    pub fn restore(db: &StudyDatabase, user_id: &str) -> AppResult<User> {
        let conn = db.get_conn_safe()?;
        conn.execute(
            "UPDATE users SET is_deleted = 0, deleted_at = NULL, restore_otp_hash = NULL,
                 restore_otp_expires_at = NULL, restore_otp_attempts = 0, updated_at = ?1
             WHERE id = ?2",
            params![now_timestamp(), user_id],
        )?;
        info!("[UserRepo] Restored user: {}", user_id);
        Self::find_by_id_with_conn(&conn, user_id)?
            .ok_or_else(|| AppError::not_found("User", user_id))
    }

    fn row_to_user(row: &rusqlite::Row) -> rusqlite::Result<User> {
        let grade: String = row.get(5)?;
        Ok(User {
            id: row.get(0)?,
            name: row.get(1)?,
            email: row.get(2)?,
            avatar: row.get(3)?,
            bio: row.get(4)?,
            grade: Grade::from_str(&grade).unwrap_or_default(),
            study_streak: row.get(6)?,
            last_study_date: row.get(7)?,
            is_deleted: row.get::<_, i32>(8)? != 0,
            deleted_at: row.get(9)?,
            created_at: row.get(10)?,
            updated_at: row.get(11)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_support::setup_test_db;
    use assert_matches::assert_matches;

    #[test]
    fn test_create_and_find_user() {
        let (_dir, db) = setup_test_db();
        let user = UserRepo::create_user(&db, " Ada ", "Ada@Example.com ", "hash")
            .expect("create user");
        assert_eq!(user.name, "Ada");
        assert_eq!(user.email, "ada@example.com");
        assert_eq!(user.grade, Grade::Ten);

        let found = UserRepo::find_by_email_any(&db, "ADA@example.com")
            .expect("query")
            .expect("user exists");
        assert_eq!(found.id, user.id);
    }

    #[test]
    fn test_duplicate_email_conflict() {
        let (_dir, db) = setup_test_db();
        UserRepo::create_user(&db, "A", "a@example.com", "h").expect("first");
        let err = UserRepo::create_user(&db, "B", "a@example.com", "h").unwrap_err();
        assert_matches!(err, AppError::Conflict(_));
    }

    #[test]
    fn test_soft_delete_and_restore() {
        let (_dir, db) = setup_test_db();
        let user = UserRepo::create_user(&db, "A", "a@example.com", "h").expect("create");
        UserRepo::soft_delete(&db, &user.id).expect("delete");

        assert!(UserRepo::find_by_id(&db, &user.id).expect("query").is_none());
        let any = UserRepo::find_any(&db, &user.id).expect("query").expect("still stored");
        assert!(any.is_deleted);

        let restored = UserRepo::restore(&db, &user.id).expect("restore");
        assert!(!restored.is_deleted);
    }

    #[test]
    fn test_update_profile_partial() {
        let (_dir, db) = setup_test_db();
        let user = UserRepo::create_user(&db, "A", "a@example.com", "h").expect("create");
        let updated = UserRepo::update_profile(
            &db,
            &user.id,
            &UpdateProfileParams {
                bio: Some("Physics fan".to_string()),
                grade: Some(Grade::Undergraduate),
                ..Default::default()
            },
        )
        .expect("update");
        assert_eq!(updated.name, "A");
        assert_eq!(updated.bio, "Physics fan");
        assert_eq!(updated.grade, Grade::Undergraduate);
    }
}
