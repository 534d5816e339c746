//! 闪卡表 CRUD
//!
//! 直接创建要求问题与答案都非空；AI 批量生成的闪卡经 `insert_generated_with_conn`
//! 写入，答案是否可为空由解析模式决定。

use rusqlite::{params, Connection, OptionalExtension};
use tracing::info;

use super::{soft_delete_owned, SubjectRepo};
use crate::database::{new_id, now_timestamp, StudyDatabase};
use crate::error::{AppError, AppResult};
use crate::llm::parser::GeneratedFlashcard;
use crate::models::{CreateFlashcardParams, Difficulty, Flashcard, UpdateFlashcardParams};

const FLASHCARD_COLUMNS: &str = "id, user_id, subject_id, note_id, question, answer, difficulty, \
                                 correct_count, wrong_count, last_reviewed_at, next_review_date, \
                                 is_deleted, deleted_at, deleted_by, created_at, updated_at";

pub struct FlashcardRepo;

impl FlashcardRepo {
    pub fn create(
        db: &StudyDatabase,
        user_id: &str,
        params: &CreateFlashcardParams,
    ) -> AppResult<Flashcard> {
        let conn = db.get_conn_safe()?;
        if params.question.trim().is_empty() || params.answer.trim().is_empty() {
            return Err(AppError::validation("Question and answer are required"));
        }
        SubjectRepo::ensure_owned_with_conn(&conn, user_id, params.subject_id.as_deref())?;

        let id = Self::insert_with_conn(
            &conn,
            user_id,
            params.subject_id.as_deref(),
            params.note_id.as_deref(),
            params.question.trim(),
            params.answer.trim(),
            params.difficulty.unwrap_or_default(),
        )?;
        info!("[FlashcardRepo] Created flashcard: {}", id);
        Self::find_with_conn(&conn, user_id, &id)
    }

    /// 批量写入生成的闪卡，返回新记录（按输入顺序）
    pub fn insert_generated_with_conn(
        conn: &Connection,
        user_id: &str,
        subject_id: Option<&str>,
        note_id: &str,
        cards: &[GeneratedFlashcard],
    ) -> AppResult<Vec<Flashcard>> {
        let mut created = Vec::with_capacity(cards.len());
        for card in cards {
            let id = Self::insert_with_conn(
                conn,
                user_id,
                subject_id,
                Some(note_id),
                &card.question,
                &card.answer,
                Difficulty::default(),
            )?;
            created.push(Self::find_with_conn(conn, user_id, &id)?);
        }
        info!(
            "[FlashcardRepo] Inserted {} generated flashcards for note {}",
            created.len(),
            note_id
        );
        Ok(created)
    }

    fn insert_with_conn(
        conn: &Connection,
        user_id: &str,
        subject_id: Option<&str>,
        note_id: Option<&str>,
        question: &str,
        answer: &str,
        difficulty: Difficulty,
    ) -> AppResult<String> {
        let id = new_id("card");
        let now = now_timestamp();
        conn.execute(
            "INSERT INTO flashcards (id, user_id, subject_id, note_id, question, answer, difficulty,
                                     created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
            params![
                id,
                user_id,
                subject_id,
                note_id,
                question,
                answer,
                difficulty.as_str(),
                now
            ],
        )?;
        Ok(id)
    }

    /// 软删除某篇笔记此前生成的闪卡，返回删除条数
    pub fn soft_delete_generated_for_note_with_conn(
        conn: &Connection,
        user_id: &str,
        note_id: &str,
    ) -> AppResult<usize> {
        let now = now_timestamp();
        let removed = conn.execute(
            "UPDATE flashcards SET is_deleted = 1, deleted_at = ?1, deleted_by = ?2, updated_at = ?1
             WHERE note_id = ?3 AND user_id = ?2 AND is_deleted = 0",
            params![now, user_id, note_id],
        )?;
        if removed > 0 {
            info!(
                "[FlashcardRepo] Replaced {} previously generated flashcards for note {}",
                removed, note_id
            );
        }
        Ok(removed)
    }

    pub fn list(
        db: &StudyDatabase,
        user_id: &str,
        subject_id: Option<&str>,
    ) -> AppResult<Vec<Flashcard>> {
        let conn = db.get_conn_safe()?;
        let mut sql = format!(
            "SELECT {} FROM flashcards WHERE user_id = ?1 AND is_deleted = 0",
            FLASHCARD_COLUMNS
        );
        let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(user_id.to_string())];
        if let Some(subject_id) = subject_id {
            sql.push_str(" AND subject_id = ?2");
            params_vec.push(Box::new(subject_id.to_string()));
        }
        sql.push_str(" ORDER BY created_at DESC, rowid DESC");

        let mut stmt = conn.prepare(&sql)?;
        let params_refs: Vec<&dyn rusqlite::ToSql> =
            params_vec.iter().map(|p| p.as_ref()).collect();
        let rows = stmt.query_map(params_refs.as_slice(), Self::row_to_flashcard)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn find(db: &StudyDatabase, user_id: &str, id: &str) -> AppResult<Flashcard> {
        let conn = db.get_conn_safe()?;
        Self::find_with_conn(&conn, user_id, id)
    }

    pub fn find_with_conn(conn: &Connection, user_id: &str, id: &str) -> AppResult<Flashcard> {
        let sql = format!(
            "SELECT {} FROM flashcards WHERE id = ?1 AND user_id = ?2 AND is_deleted = 0",
            FLASHCARD_COLUMNS
        );
        conn.query_row(&sql, params![id, user_id], Self::row_to_flashcard)
            .optional()?
            .ok_or_else(|| AppError::not_found("Flashcard", id))
    }

    /// 管理用查询：忽略软删除与归属
    pub fn find_any(db: &StudyDatabase, id: &str) -> AppResult<Option<Flashcard>> {
        let conn = db.get_conn_safe()?;
        let sql = format!("SELECT {} FROM flashcards WHERE id = ?1", FLASHCARD_COLUMNS);
        Ok(conn
            .query_row(&sql, params![id], Self::row_to_flashcard)
            .optional()?)
    }

    pub fn update(
        db: &StudyDatabase,
        user_id: &str,
        id: &str,
        update: &UpdateFlashcardParams,
    ) -> AppResult<Flashcard> {
        let conn = db.get_conn_safe()?;
        let current = Self::find_with_conn(&conn, user_id, id)?;

        let question = match &update.question {
            Some(q) if q.trim().is_empty() => {
                return Err(AppError::validation("Question cannot be empty"))
            }
            Some(q) => q.trim().to_string(),
            None => current.question,
        };
        let answer = match &update.answer {
            Some(a) if a.trim().is_empty() => {
                return Err(AppError::validation("Answer cannot be empty"))
            }
            Some(a) => a.trim().to_string(),
            None => current.answer,
        };
        if update.subject_id.is_some() {
            SubjectRepo::ensure_owned_with_conn(&conn, user_id, update.subject_id.as_deref())?;
        }
        let subject_id = update.subject_id.clone().or(current.subject_id);
        let difficulty = update.difficulty.unwrap_or(current.difficulty);
        let next_review = update.next_review_date.clone().or(current.next_review_date);

        conn.execute(
            "UPDATE flashcards SET question = ?1, answer = ?2, subject_id = ?3, difficulty = ?4,
                 next_review_date = ?5, updated_at = ?6
             WHERE id = ?7 AND user_id = ?8",
            params![
                question,
                answer,
                subject_id,
                difficulty.as_str(),
                next_review,
                now_timestamp(),
                id,
                user_id
            ],
        )?;
        Self::find_with_conn(&conn, user_id, id)
    }

    /// 记录一次复习结果
    pub fn record_review(
        db: &StudyDatabase,
        user_id: &str,
        id: &str,
        is_correct: bool,
    ) -> AppResult<Flashcard> {
        let conn = db.get_conn_safe()?;
        let column = if is_correct { "correct_count" } else { "wrong_count" };
        let now = now_timestamp();
        let sql = format!(
            "UPDATE flashcards SET {col} = {col} + 1, last_reviewed_at = ?1, updated_at = ?1
             WHERE id = ?2 AND user_id = ?3 AND is_deleted = 0",
            col = column
        );
        let updated = conn.execute(&sql, params![now, id, user_id])?;
        if updated == 0 {
            return Err(AppError::not_found("Flashcard", id));
        }
        Self::find_with_conn(&conn, user_id, id)
    }

    pub fn soft_delete(db: &StudyDatabase, user_id: &str, id: &str) -> AppResult<()> {
        let conn = db.get_conn_safe()?;
        soft_delete_owned(&conn, "flashcards", "Flashcard", id, user_id)
    }

    fn row_to_flashcard(row: &rusqlite::Row) -> rusqlite::Result<Flashcard> {
        let difficulty: String = row.get(6)?;
        Ok(Flashcard {
            id: row.get(0)?,
            user_id: row.get(1)?,
            subject_id: row.get(2)?,
            note_id: row.get(3)?,
            question: row.get(4)?,
            answer: row.get(5)?,
            difficulty: Difficulty::from_str(&difficulty).unwrap_or_default(),
            correct_count: row.get(7)?,
            wrong_count: row.get(8)?,
            last_reviewed_at: row.get(9)?,
            next_review_date: row.get(10)?,
            is_deleted: row.get::<_, i32>(11)? != 0,
            deleted_at: row.get(12)?,
            deleted_by: row.get(13)?,
            created_at: row.get(14)?,
            updated_at: row.get(15)?,
        })
    }
}
