//! 笔记表 CRUD
//!
//! ## 核心方法
//! - `create`: 创建笔记（标题、内容必填）
//! - `find_and_increment_views`: 单条读取，同时 `view_count + 1`
//! - `set_summary`: 写入 AI 摘要
//! - `soft_delete`: 软删除

use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use super::{parse_json_column, soft_delete_owned, SubjectRepo};
use crate::database::{new_id, now_timestamp, StudyDatabase};
use crate::error::{AppError, AppResult};
use crate::models::{CreateNoteParams, Note, UpdateNoteParams};

const NOTE_COLUMNS: &str = "id, user_id, subject_id, title, content, summary, tags, is_pinned, \
                            view_count, is_deleted, deleted_at, deleted_by, created_at, updated_at";

pub struct NoteRepo;

impl NoteRepo {
    // ========================================================================
    // 创建
    // ========================================================================

    pub fn create(db: &StudyDatabase, user_id: &str, params: &CreateNoteParams) -> AppResult<Note> {
        let conn = db.get_conn_safe()?;
        Self::create_with_conn(&conn, user_id, params)
    }

    pub fn create_with_conn(
        conn: &Connection,
        user_id: &str,
        params: &CreateNoteParams,
    ) -> AppResult<Note> {
        let title = params.title.trim();
        if title.is_empty() {
            return Err(AppError::validation("Note title is required"));
        }
        if params.content.trim().is_empty() {
            return Err(AppError::validation("Note content is required"));
        }
        SubjectRepo::ensure_owned_with_conn(conn, user_id, params.subject_id.as_deref())?;

        let id = new_id("note");
        let now = now_timestamp();
        let tags_json = serde_json::to_string(&params.tags)?;
        conn.execute(
            "INSERT INTO notes (id, user_id, subject_id, title, content, summary, tags, is_pinned,
                                created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)",
            params![
                id,
                user_id,
                params.subject_id,
                title,
                params.content,
                params.summary,
                tags_json,
                params.is_pinned as i32,
                now
            ],
        )?;

        info!("[NoteRepo] Created note: {}", id);
        Self::find_any_with_conn(conn, &id)?.ok_or_else(|| AppError::not_found("Note", &id))
    }

    // ========================================================================
    // 查询
    // ========================================================================

    /// 列出用户的笔记，可按科目过滤；置顶优先，其次按创建时间倒序
    pub fn list(
        db: &StudyDatabase,
        user_id: &str,
        subject_id: Option<&str>,
    ) -> AppResult<Vec<Note>> {
        let conn = db.get_conn_safe()?;
        Self::list_with_conn(&conn, user_id, subject_id)
    }

    pub fn list_with_conn(
        conn: &Connection,
        user_id: &str,
        subject_id: Option<&str>,
    ) -> AppResult<Vec<Note>> {
        let mut sql = format!(
            "SELECT {} FROM notes WHERE user_id = ?1 AND is_deleted = 0",
            NOTE_COLUMNS
        );
        let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(user_id.to_string())];
        if let Some(subject_id) = subject_id {
            sql.push_str(" AND subject_id = ?2");
            params_vec.push(Box::new(subject_id.to_string()));
        }
        sql.push_str(" ORDER BY is_pinned DESC, created_at DESC");

        let mut stmt = conn.prepare(&sql)?;
        let params_refs: Vec<&dyn rusqlite::ToSql> =
            params_vec.iter().map(|p| p.as_ref()).collect();
        let rows = stmt.query_map(params_refs.as_slice(), Self::row_to_note)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// 最近创建的笔记（仪表盘）
    pub fn recent(db: &StudyDatabase, user_id: &str, limit: u32) -> AppResult<Vec<Note>> {
        let conn = db.get_conn_safe()?;
        let sql = format!(
            "SELECT {} FROM notes WHERE user_id = ?1 AND is_deleted = 0
             ORDER BY created_at DESC LIMIT ?2",
            NOTE_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![user_id, limit], Self::row_to_note)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn count(db: &StudyDatabase, user_id: &str) -> AppResult<i64> {
        let conn = db.get_conn_safe()?;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM notes WHERE user_id = ?1 AND is_deleted = 0",
            params![user_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// 获取当前用户的未删除笔记（不计浏览次数）
    pub fn find(db: &StudyDatabase, user_id: &str, id: &str) -> AppResult<Note> {
        let conn = db.get_conn_safe()?;
        Self::find_with_conn(&conn, user_id, id)
    }

    pub fn find_with_conn(conn: &Connection, user_id: &str, id: &str) -> AppResult<Note> {
        let sql = format!(
            "SELECT {} FROM notes WHERE id = ?1 AND user_id = ?2 AND is_deleted = 0",
            NOTE_COLUMNS
        );
        conn.query_row(&sql, params![id, user_id], Self::row_to_note)
            .optional()?
            .ok_or_else(|| AppError::not_found("Note", id))
    }

    /// 单条读取并累加浏览次数
    pub fn find_and_increment_views(
        db: &StudyDatabase,
        user_id: &str,
        id: &str,
    ) -> AppResult<Note> {
        let conn = db.get_conn_safe()?;
        let updated = conn.execute(
            "UPDATE notes SET view_count = view_count + 1
             WHERE id = ?1 AND user_id = ?2 AND is_deleted = 0",
            params![id, user_id],
        )?;
        if updated == 0 {
            return Err(AppError::not_found("Note", id));
        }
        debug!("[NoteRepo] Incremented view count: {}", id);
        Self::find_with_conn(&conn, user_id, id)
    }

    /// 管理用查询：忽略软删除与归属
    pub fn find_any(db: &StudyDatabase, id: &str) -> AppResult<Option<Note>> {
        let conn = db.get_conn_safe()?;
        Self::find_any_with_conn(&conn, id)
    }

    pub fn find_any_with_conn(conn: &Connection, id: &str) -> AppResult<Option<Note>> {
        let sql = format!("SELECT {} FROM notes WHERE id = ?1", NOTE_COLUMNS);
        Ok(conn
            .query_row(&sql, params![id], Self::row_to_note)
            .optional()?)
    }

    // ========================================================================
    // 更新
    // ========================================================================

    pub fn update(
        db: &StudyDatabase,
        user_id: &str,
        id: &str,
        update: &UpdateNoteParams,
    ) -> AppResult<Note> {
        let conn = db.get_conn_safe()?;
        let current = Self::find_with_conn(&conn, user_id, id)?;

        let title = match &update.title {
            Some(t) if t.trim().is_empty() => {
                return Err(AppError::validation("Note title cannot be empty"))
            }
            Some(t) => t.trim().to_string(),
            None => current.title,
        };
        let content = match &update.content {
            Some(c) if c.trim().is_empty() => {
                return Err(AppError::validation("Note content cannot be empty"))
            }
            Some(c) => c.clone(),
            None => current.content,
        };
        if update.subject_id.is_some() {
            SubjectRepo::ensure_owned_with_conn(&conn, user_id, update.subject_id.as_deref())?;
        }
        let subject_id = update.subject_id.clone().or(current.subject_id);
        let tags = update.tags.clone().unwrap_or(current.tags);
        let summary = update.summary.clone().or(current.summary);
        let is_pinned = update.is_pinned.unwrap_or(current.is_pinned);

        conn.execute(
            "UPDATE notes SET title = ?1, content = ?2, subject_id = ?3, tags = ?4, summary = ?5,
                 is_pinned = ?6, updated_at = ?7
             WHERE id = ?8 AND user_id = ?9",
            params![
                title,
                content,
                subject_id,
                serde_json::to_string(&tags)?,
                summary,
                is_pinned as i32,
                now_timestamp(),
                id,
                user_id
            ],
        )?;
        info!("[NoteRepo] Updated note: {}", id);
        Self::find_with_conn(&conn, user_id, id)
    }

    pub fn set_summary(db: &StudyDatabase, user_id: &str, id: &str, summary: &str) -> AppResult<Note> {
        let conn = db.get_conn_safe()?;
        let updated = conn.execute(
            "UPDATE notes SET summary = ?1, updated_at = ?2
             WHERE id = ?3 AND user_id = ?4 AND is_deleted = 0",
            params![summary, now_timestamp(), id, user_id],
        )?;
        if updated == 0 {
            return Err(AppError::not_found("Note", id));
        }
        Self::find_with_conn(&conn, user_id, id)
    }

    pub fn soft_delete(db: &StudyDatabase, user_id: &str, id: &str) -> AppResult<()> {
        let conn = db.get_conn_safe()?;
        soft_delete_owned(&conn, "notes", "Note", id, user_id)
    }

    fn row_to_note(row: &rusqlite::Row) -> rusqlite::Result<Note> {
        let id: String = row.get(0)?;
        let tags_json: String = row.get(6)?;
        let tags: Vec<String> = parse_json_column(&tags_json, "notes", &id);
        Ok(Note {
            id,
            user_id: row.get(1)?,
            subject_id: row.get(2)?,
            title: row.get(3)?,
            content: row.get(4)?,
            summary: row.get(5)?,
            tags,
            is_pinned: row.get::<_, i32>(7)? != 0,
            view_count: row.get(8)?,
            is_deleted: row.get::<_, i32>(9)? != 0,
            deleted_at: row.get(10)?,
            deleted_by: row.get(11)?,
            created_at: row.get(12)?,
            updated_at: row.get(13)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_support::{insert_user, setup_test_db};
    use crate::models::CreateSubjectParams;
    use assert_matches::assert_matches;

    fn note(title: &str) -> CreateNoteParams {
        CreateNoteParams {
            title: title.to_string(),
            content: "Photosynthesis converts light into chemical energy.".to_string(),
            tags: vec!["biology".to_string()],
            ..Default::default()
        }
    }

    #[test]
    fn test_create_and_list_notes() {
        let (_dir, db) = setup_test_db();
        let user = insert_user(&db, "a@example.com");
        let created = NoteRepo::create(&db, &user, &note("Cells")).expect("create");
        assert_eq!(created.tags, vec!["biology".to_string()]);
        assert_eq!(created.view_count, 0);

        let notes = NoteRepo::list(&db, &user, None).expect("list");
        assert_eq!(notes.len(), 1);
        assert_eq!(NoteRepo::count(&db, &user).expect("count"), 1);
    }

    #[test]
    fn test_missing_content_rejected() {
        let (_dir, db) = setup_test_db();
        let user = insert_user(&db, "a@example.com");
        let mut params = note("Empty");
        params.content = "  ".to_string();
        assert_matches!(
            NoteRepo::create(&db, &user, &params),
            Err(AppError::Validation(_))
        );
    }

    #[test]
    fn test_subject_filter_and_foreign_subject() {
        let (_dir, db) = setup_test_db();
        let user = insert_user(&db, "a@example.com");
        let other = insert_user(&db, "b@example.com");
        let subject = SubjectRepo::create(
            &db,
            &user,
            &CreateSubjectParams {
                name: "Bio".to_string(),
                ..Default::default()
            },
        )
        .expect("subject");

        let mut with_subject = note("Tagged");
        with_subject.subject_id = Some(subject.id.clone());
        NoteRepo::create(&db, &user, &with_subject).expect("create");
        NoteRepo::create(&db, &user, &note("Loose")).expect("create");

        let filtered = NoteRepo::list(&db, &user, Some(&subject.id)).expect("list");
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].title, "Tagged");

        // 不能挂到别人的科目
        assert!(NoteRepo::create(&db, &other, &with_subject)
            .unwrap_err()
            .is_not_found());
    }

    #[test]
    fn test_view_count_increments() {
        let (_dir, db) = setup_test_db();
        let user = insert_user(&db, "a@example.com");
        let created = NoteRepo::create(&db, &user, &note("Views")).expect("create");
        NoteRepo::find_and_increment_views(&db, &user, &created.id).expect("get");
        let fetched = NoteRepo::find_and_increment_views(&db, &user, &created.id).expect("get");
        assert_eq!(fetched.view_count, 2);
    }

    #[test]
    fn test_soft_delete_excluded_but_retrievable_by_admin_lookup() {
        let (_dir, db) = setup_test_db();
        let user = insert_user(&db, "a@example.com");
        let created = NoteRepo::create(&db, &user, &note("Gone")).expect("create");

        NoteRepo::soft_delete(&db, &user, &created.id).expect("delete");

        assert!(NoteRepo::list(&db, &user, None).expect("list").is_empty());
        assert!(NoteRepo::find(&db, &user, &created.id).unwrap_err().is_not_found());
        let stored = NoteRepo::find_any(&db, &created.id)
            .expect("query")
            .expect("row retained");
        assert!(stored.is_deleted);
        assert!(stored.deleted_at.is_some());
    }
}
