//! 科目表 CRUD

use rusqlite::{params, Connection, OptionalExtension};
use tracing::info;

use super::soft_delete_owned;
use crate::database::{new_id, now_timestamp, StudyDatabase};
use crate::error::{AppError, AppResult};
use crate::models::{
    CreateSubjectParams, Subject, SubjectResourceKind, UpdateSubjectParams, DEFAULT_SUBJECT_COLOR,
};

const SUBJECT_COLUMNS: &str = "id, user_id, name, description, color, total_study_hours, \
                               is_deleted, deleted_at, deleted_by, created_at, updated_at";

pub struct SubjectRepo;

impl SubjectRepo {
    pub fn create(
        db: &StudyDatabase,
        user_id: &str,
        params: &CreateSubjectParams,
    ) -> AppResult<Subject> {
        let conn = db.get_conn_safe()?;
        Self::create_with_conn(&conn, user_id, params)
    }

    pub fn create_with_conn(
        conn: &Connection,
        user_id: &str,
        params: &CreateSubjectParams,
    ) -> AppResult<Subject> {
        let name = params.name.trim();
        if name.is_empty() {
            return Err(AppError::validation("Subject name is required"));
        }
        let color = params
            .color
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or(DEFAULT_SUBJECT_COLOR);

        let id = new_id("sub");
        let now = now_timestamp();
        conn.execute(
            "INSERT INTO subjects (id, user_id, name, description, color, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
            params![
                id,
                user_id,
                name,
                params.description.clone().unwrap_or_default(),
                color,
                now
            ],
        )?;

        info!("[SubjectRepo] Created subject: {}", id);
        Self::find_any_with_conn(conn, &id)?.ok_or_else(|| AppError::not_found("Subject", &id))
    }

    pub fn list(db: &StudyDatabase, user_id: &str) -> AppResult<Vec<Subject>> {
        let conn = db.get_conn_safe()?;
        Self::list_with_conn(&conn, user_id)
    }

    pub fn list_with_conn(conn: &Connection, user_id: &str) -> AppResult<Vec<Subject>> {
        let sql = format!(
            "SELECT {} FROM subjects WHERE user_id = ?1 AND is_deleted = 0 ORDER BY created_at DESC",
            SUBJECT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![user_id], Self::row_to_subject)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn count(db: &StudyDatabase, user_id: &str) -> AppResult<i64> {
        let conn = db.get_conn_safe()?;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM subjects WHERE user_id = ?1 AND is_deleted = 0",
            params![user_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// 获取当前用户的未删除科目
    pub fn find(db: &StudyDatabase, user_id: &str, id: &str) -> AppResult<Subject> {
        let conn = db.get_conn_safe()?;
        Self::find_with_conn(&conn, user_id, id)
    }

    pub fn find_with_conn(conn: &Connection, user_id: &str, id: &str) -> AppResult<Subject> {
        let sql = format!(
            "SELECT {} FROM subjects WHERE id = ?1 AND user_id = ?2 AND is_deleted = 0",
            SUBJECT_COLUMNS
        );
        conn.query_row(&sql, params![id, user_id], Self::row_to_subject)
            .optional()?
            .ok_or_else(|| AppError::not_found("Subject", id))
    }

    /// 管理用查询：忽略软删除与归属
    pub fn find_any(db: &StudyDatabase, id: &str) -> AppResult<Option<Subject>> {
        let conn = db.get_conn_safe()?;
        Self::find_any_with_conn(&conn, id)
    }

    pub fn find_any_with_conn(conn: &Connection, id: &str) -> AppResult<Option<Subject>> {
        let sql = format!("SELECT {} FROM subjects WHERE id = ?1", SUBJECT_COLUMNS);
        Ok(conn
            .query_row(&sql, params![id], Self::row_to_subject)
            .optional()?)
    }

    /// 校验科目存在且属于该用户；用于挂接笔记 / 闪卡 / 测验
    pub fn ensure_owned_with_conn(
        conn: &Connection,
        user_id: &str,
        subject_id: Option<&str>,
    ) -> AppResult<()> {
        if let Some(subject_id) = subject_id {
            Self::find_with_conn(conn, user_id, subject_id)?;
        }
        Ok(())
    }

    pub fn update(
        db: &StudyDatabase,
        user_id: &str,
        id: &str,
        update: &UpdateSubjectParams,
    ) -> AppResult<Subject> {
        let conn = db.get_conn_safe()?;
        let current = Self::find_with_conn(&conn, user_id, id)?;

        let name = match &update.name {
            Some(name) if name.trim().is_empty() => {
                return Err(AppError::validation("Subject name cannot be empty"))
            }
            Some(name) => name.trim().to_string(),
            None => current.name,
        };
        let description = update.description.clone().unwrap_or(current.description);
        let color = update.color.clone().unwrap_or(current.color);
        let hours = update.total_study_hours.unwrap_or(current.total_study_hours);
        if hours < 0.0 {
            return Err(AppError::validation("totalStudyHours cannot be negative"));
        }

        conn.execute(
            "UPDATE subjects SET name = ?1, description = ?2, color = ?3, total_study_hours = ?4,
                 updated_at = ?5
             WHERE id = ?6 AND user_id = ?7",
            params![name, description, color, hours, now_timestamp(), id, user_id],
        )?;
        Self::find_with_conn(&conn, user_id, id)
    }

    pub fn soft_delete(db: &StudyDatabase, user_id: &str, id: &str) -> AppResult<()> {
        let conn = db.get_conn_safe()?;
        soft_delete_owned(&conn, "subjects", "Subject", id, user_id)
    }

    /// 把笔记 / 测验 / 闪卡挂到科目下
    pub fn attach_resource(
        db: &StudyDatabase,
        user_id: &str,
        subject_id: &str,
        kind: SubjectResourceKind,
        resource_id: &str,
    ) -> AppResult<()> {
        let conn = db.get_conn_safe()?;
        Self::find_with_conn(&conn, user_id, subject_id)?;

        let (table, resource) = match kind {
            SubjectResourceKind::Note => ("notes", "Note"),
            SubjectResourceKind::Quiz => ("quizzes", "Quiz"),
            SubjectResourceKind::Flashcard => ("flashcards", "Flashcard"),
        };
        let sql = format!(
            "UPDATE {} SET subject_id = ?1, updated_at = ?2
             WHERE id = ?3 AND user_id = ?4 AND is_deleted = 0",
            table
        );
        let updated = conn.execute(
            &sql,
            params![subject_id, now_timestamp(), resource_id, user_id],
        )?;
        if updated == 0 {
            return Err(AppError::not_found(resource, resource_id));
        }
        info!(
            "[SubjectRepo] Attached {} {} to subject {}",
            resource, resource_id, subject_id
        );
        Ok(())
    }

    fn row_to_subject(row: &rusqlite::Row) -> rusqlite::Result<Subject> {
        Ok(Subject {
            id: row.get(0)?,
            user_id: row.get(1)?,
            name: row.get(2)?,
            description: row.get(3)?,
            color: row.get(4)?,
            total_study_hours: row.get(5)?,
            is_deleted: row.get::<_, i32>(6)? != 0,
            deleted_at: row.get(7)?,
            deleted_by: row.get(8)?,
            created_at: row.get(9)?,
            updated_at: row.get(10)?,
        })
    }
}
