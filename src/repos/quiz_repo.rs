//! 测验与作答记录
//!
//! 题目以 JSON 数组存储在 `quizzes.questions`，写入前逐题校验
//! （恰好 4 个选项、正确答案下标在范围内），不合法的题目不会入库。
//! 作答记录只追加，不提供更新与删除。

use rusqlite::{params, Connection, OptionalExtension};
use tracing::info;

use super::{parse_json_column, soft_delete_owned, SubjectRepo};
use crate::database::{new_id, now_timestamp, StudyDatabase};
use crate::error::{AppError, AppResult};
use crate::models::{
    CreateQuizParams, Quiz, QuizAttempt, QuizAttemptSummary, QuizQuestion, UpdateQuizParams,
};

const QUIZ_COLUMNS: &str = "id, user_id, subject_id, note_id, title, description, questions, \
                            duration, total_marks, passing_marks, is_deleted, deleted_at, \
                            deleted_by, created_at, updated_at";

const ATTEMPT_COLUMNS: &str = "a.id, a.quiz_id, a.user_id, a.answers, a.score, a.total_marks, \
                               a.percentage, a.passed, a.time_taken, a.completed_at, \
                               q.title, q.subject_id";

/// 及格线缺省为题目数量的一半（向上取整）
pub fn default_passing_marks(question_count: usize) -> i64 {
    ((question_count as f64) * 0.5).ceil() as i64
}

fn validate_questions(questions: &[QuizQuestion]) -> AppResult<()> {
    if questions.is_empty() {
        return Err(AppError::validation("A quiz needs at least one question"));
    }
    for (i, q) in questions.iter().enumerate() {
        q.validate(i)?;
    }
    Ok(())
}

fn validate_passing_marks(passing: i64, total: i64) -> AppResult<()> {
    if passing < 0 || passing > total {
        return Err(AppError::validation(format!(
            "passingMarks must be between 0 and {}",
            total
        )));
    }
    Ok(())
}

/// 新作答记录
#[derive(Debug, Clone)]
pub struct NewQuizAttempt {
    pub quiz_id: String,
    pub user_id: String,
    pub answers: Vec<Option<usize>>,
    pub score: i64,
    pub total_marks: i64,
    pub percentage: f64,
    pub passed: bool,
    pub time_taken: Option<i64>,
}

pub struct QuizRepo;

impl QuizRepo {
    // ========================================================================
    // 测验
    // ========================================================================

    pub fn create(db: &StudyDatabase, user_id: &str, params: &CreateQuizParams) -> AppResult<Quiz> {
        let conn = db.get_conn_safe()?;
        Self::create_with_conn(&conn, user_id, params)
    }

    pub fn create_with_conn(
        conn: &Connection,
        user_id: &str,
        params: &CreateQuizParams,
    ) -> AppResult<Quiz> {
        let title = params.title.trim();
        if title.is_empty() {
            return Err(AppError::validation("Quiz title is required"));
        }
        validate_questions(&params.questions)?;
        SubjectRepo::ensure_owned_with_conn(conn, user_id, params.subject_id.as_deref())?;

        let total_marks = params.questions.len() as i64;
        let passing_marks = params
            .passing_marks
            .unwrap_or_else(|| default_passing_marks(params.questions.len()));
        validate_passing_marks(passing_marks, total_marks)?;

        let id = new_id("quiz");
        let now = now_timestamp();
        conn.execute(
            "INSERT INTO quizzes (id, user_id, subject_id, note_id, title, description, questions,
                                  duration, total_marks, passing_marks, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)",
            params![
                id,
                user_id,
                params.subject_id,
                params.note_id,
                title,
                params.description.clone().unwrap_or_default(),
                serde_json::to_string(&params.questions)?,
                params.duration,
                total_marks,
                passing_marks,
                now
            ],
        )?;

        info!(
            "[QuizRepo] Created quiz {} with {} questions",
            id, total_marks
        );
        Self::find_any_with_conn(conn, &id)?.ok_or_else(|| AppError::not_found("Quiz", &id))
    }

    pub fn list(
        db: &StudyDatabase,
        user_id: &str,
        subject_id: Option<&str>,
    ) -> AppResult<Vec<Quiz>> {
        let conn = db.get_conn_safe()?;
        let mut sql = format!(
            "SELECT {} FROM quizzes WHERE user_id = ?1 AND is_deleted = 0",
            QUIZ_COLUMNS
        );
        let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(user_id.to_string())];
        if let Some(subject_id) = subject_id {
            sql.push_str(" AND subject_id = ?2");
            params_vec.push(Box::new(subject_id.to_string()));
        }
        sql.push_str(" ORDER BY created_at DESC");

        let mut stmt = conn.prepare(&sql)?;
        let params_refs: Vec<&dyn rusqlite::ToSql> =
            params_vec.iter().map(|p| p.as_ref()).collect();
        let rows = stmt.query_map(params_refs.as_slice(), Self::row_to_quiz)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn find(db: &StudyDatabase, user_id: &str, id: &str) -> AppResult<Quiz> {
        let conn = db.get_conn_safe()?;
        Self::find_with_conn(&conn, user_id, id)
    }

    pub fn find_with_conn(conn: &Connection, user_id: &str, id: &str) -> AppResult<Quiz> {
        let sql = format!(
            "SELECT {} FROM quizzes WHERE id = ?1 AND user_id = ?2 AND is_deleted = 0",
            QUIZ_COLUMNS
        );
        conn.query_row(&sql, params![id, user_id], Self::row_to_quiz)
            .optional()?
            .ok_or_else(|| AppError::not_found("Quiz", id))
    }

    /// 管理用查询：忽略软删除与归属
    pub fn find_any(db: &StudyDatabase, id: &str) -> AppResult<Option<Quiz>> {
        let conn = db.get_conn_safe()?;
        Self::find_any_with_conn(&conn, id)
    }

    pub fn find_any_with_conn(conn: &Connection, id: &str) -> AppResult<Option<Quiz>> {
        let sql = format!("SELECT {} FROM quizzes WHERE id = ?1", QUIZ_COLUMNS);
        Ok(conn
            .query_row(&sql, params![id], Self::row_to_quiz)
            .optional()?)
    }

    pub fn update(
        db: &StudyDatabase,
        user_id: &str,
        id: &str,
        update: &UpdateQuizParams,
    ) -> AppResult<Quiz> {
        let conn = db.get_conn_safe()?;
        let current = Self::find_with_conn(&conn, user_id, id)?;

        let title = match &update.title {
            Some(t) if t.trim().is_empty() => {
                return Err(AppError::validation("Quiz title cannot be empty"))
            }
            Some(t) => t.trim().to_string(),
            None => current.title,
        };
        let questions = match &update.questions {
            Some(questions) => {
                validate_questions(questions)?;
                questions.clone()
            }
            None => current.questions,
        };
        if update.subject_id.is_some() {
            SubjectRepo::ensure_owned_with_conn(&conn, user_id, update.subject_id.as_deref())?;
        }
        let subject_id = update.subject_id.clone().or(current.subject_id);
        let description = update.description.clone().unwrap_or(current.description);
        let duration = update.duration.or(current.duration);
        let total_marks = questions.len() as i64;
        let passing_marks = update
            .passing_marks
            .unwrap_or_else(|| current.passing_marks.min(total_marks));
        validate_passing_marks(passing_marks, total_marks)?;

        conn.execute(
            "UPDATE quizzes SET title = ?1, description = ?2, subject_id = ?3, questions = ?4,
                 duration = ?5, total_marks = ?6, passing_marks = ?7, updated_at = ?8
             WHERE id = ?9 AND user_id = ?10",
            params![
                title,
                description,
                subject_id,
                serde_json::to_string(&questions)?,
                duration,
                total_marks,
                passing_marks,
                now_timestamp(),
                id,
                user_id
            ],
        )?;
        info!("[QuizRepo] Updated quiz: {}", id);
        Self::find_with_conn(&conn, user_id, id)
    }

    pub fn soft_delete(db: &StudyDatabase, user_id: &str, id: &str) -> AppResult<()> {
        let conn = db.get_conn_safe()?;
        soft_delete_owned(&conn, "quizzes", "Quiz", id, user_id)
    }

    /// 软删除某篇笔记此前生成的测验（标题相同才算），返回删除条数
    pub fn soft_delete_generated_for_note_with_conn(
        conn: &Connection,
        user_id: &str,
        note_id: &str,
        title: &str,
    ) -> AppResult<usize> {
        let now = now_timestamp();
        let removed = conn.execute(
            "UPDATE quizzes SET is_deleted = 1, deleted_at = ?1, deleted_by = ?2, updated_at = ?1
             WHERE note_id = ?3 AND title = ?4 AND user_id = ?2 AND is_deleted = 0",
            params![now, user_id, note_id, title],
        )?;
        if removed > 0 {
            info!(
                "[QuizRepo] Replaced {} previously generated quiz(zes) for note {}",
                removed, note_id
            );
        }
        Ok(removed)
    }

    // ========================================================================
    // 作答记录
    // ========================================================================

    pub fn record_attempt(db: &StudyDatabase, attempt: &NewQuizAttempt) -> AppResult<QuizAttempt> {
        let conn = db.get_conn_safe()?;
        let id = new_id("att");
        let now = now_timestamp();
        conn.execute(
            "INSERT INTO quiz_attempts (id, quiz_id, user_id, answers, score, total_marks,
                                        percentage, passed, time_taken, completed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                id,
                attempt.quiz_id,
                attempt.user_id,
                serde_json::to_string(&attempt.answers)?,
                attempt.score,
                attempt.total_marks,
                attempt.percentage,
                attempt.passed as i32,
                attempt.time_taken,
                now
            ],
        )?;
        info!(
            "[QuizRepo] Recorded attempt {} for quiz {} ({}/{})",
            id, attempt.quiz_id, attempt.score, attempt.total_marks
        );

        Ok(QuizAttempt {
            id,
            quiz_id: attempt.quiz_id.clone(),
            user_id: attempt.user_id.clone(),
            answers: attempt.answers.clone(),
            score: attempt.score,
            total_marks: attempt.total_marks,
            percentage: attempt.percentage,
            passed: attempt.passed,
            time_taken: attempt.time_taken,
            completed_at: now,
        })
    }

    /// 当前用户在某测验上的全部作答，最新在前
    pub fn list_attempts_for_quiz(
        db: &StudyDatabase,
        user_id: &str,
        quiz_id: &str,
    ) -> AppResult<Vec<QuizAttemptSummary>> {
        let conn = db.get_conn_safe()?;
        let sql = format!(
            "SELECT {} FROM quiz_attempts a JOIN quizzes q ON q.id = a.quiz_id
             WHERE a.user_id = ?1 AND a.quiz_id = ?2
             ORDER BY a.completed_at DESC, a.rowid DESC",
            ATTEMPT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![user_id, quiz_id], Self::row_to_attempt_summary)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// 时间区间 [start, end] 内的作答
    pub fn list_attempts_between(
        db: &StudyDatabase,
        user_id: &str,
        start: &str,
        end: &str,
    ) -> AppResult<Vec<QuizAttemptSummary>> {
        let conn = db.get_conn_safe()?;
        let sql = format!(
            "SELECT {} FROM quiz_attempts a JOIN quizzes q ON q.id = a.quiz_id
             WHERE a.user_id = ?1 AND a.completed_at >= ?2 AND a.completed_at <= ?3
             ORDER BY a.completed_at ASC",
            ATTEMPT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![user_id, start, end], Self::row_to_attempt_summary)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn recent_attempts(
        db: &StudyDatabase,
        user_id: &str,
        limit: u32,
    ) -> AppResult<Vec<QuizAttemptSummary>> {
        let conn = db.get_conn_safe()?;
        let sql = format!(
            "SELECT {} FROM quiz_attempts a JOIN quizzes q ON q.id = a.quiz_id
             WHERE a.user_id = ?1
             ORDER BY a.completed_at DESC, a.rowid DESC LIMIT ?2",
            ATTEMPT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![user_id, limit], Self::row_to_attempt_summary)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn count_attempts(db: &StudyDatabase, user_id: &str) -> AppResult<i64> {
        let conn = db.get_conn_safe()?;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM quiz_attempts WHERE user_id = ?1",
            params![user_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn row_to_quiz(row: &rusqlite::Row) -> rusqlite::Result<Quiz> {
        let id: String = row.get(0)?;
        let questions_json: String = row.get(6)?;
        let questions: Vec<QuizQuestion> = parse_json_column(&questions_json, "quizzes", &id);
        Ok(Quiz {
            id,
            user_id: row.get(1)?,
            subject_id: row.get(2)?,
            note_id: row.get(3)?,
            title: row.get(4)?,
            description: row.get(5)?,
            questions,
            duration: row.get(7)?,
            total_marks: row.get(8)?,
            passing_marks: row.get(9)?,
            is_deleted: row.get::<_, i32>(10)? != 0,
            deleted_at: row.get(11)?,
            deleted_by: row.get(12)?,
            created_at: row.get(13)?,
            updated_at: row.get(14)?,
        })
    }

    fn row_to_attempt_summary(row: &rusqlite::Row) -> rusqlite::Result<QuizAttemptSummary> {
        let id: String = row.get(0)?;
        let answers_json: String = row.get(3)?;
        let answers: Vec<Option<usize>> = parse_json_column(&answers_json, "quiz_attempts", &id);
        Ok(QuizAttemptSummary {
            attempt: QuizAttempt {
                id,
                quiz_id: row.get(1)?,
                user_id: row.get(2)?,
                answers,
                score: row.get(4)?,
                total_marks: row.get(5)?,
                percentage: row.get(6)?,
                passed: row.get::<_, i32>(7)? != 0,
                time_taken: row.get(8)?,
                completed_at: row.get(9)?,
            },
            quiz_title: row.get(10)?,
            subject_id: row.get(11)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_support::{insert_user, setup_test_db};
    use crate::models::CreateNoteParams;
    use crate::repos::NoteRepo;
    use assert_matches::assert_matches;

    fn question(correct: usize) -> QuizQuestion {
        QuizQuestion {
            question: "Which organelle makes ATP?".to_string(),
            options: vec![
                "Nucleus".to_string(),
                "Mitochondria".to_string(),
                "Ribosome".to_string(),
                "Golgi".to_string(),
            ],
            correct_answer: correct,
            explanation: String::new(),
        }
    }

    fn quiz_params(questions: Vec<QuizQuestion>) -> CreateQuizParams {
        CreateQuizParams {
            title: "Cell Biology".to_string(),
            questions,
            ..Default::default()
        }
    }

    #[test]
    fn test_create_quiz_derives_marks() {
        let (_dir, db) = setup_test_db();
        let user = insert_user(&db, "a@example.com");
        let quiz = QuizRepo::create(&db, &user, &quiz_params(vec![question(1); 3])).expect("create");
        assert_eq!(quiz.total_marks, 3);
        assert_eq!(quiz.passing_marks, 2);
        assert_eq!(quiz.questions[0].correct_answer, 1);
    }

    #[test]
    fn test_invalid_question_never_persisted() {
        let (_dir, db) = setup_test_db();
        let user = insert_user(&db, "a@example.com");

        let mut three_options = question(0);
        three_options.options.pop();
        assert_matches!(
            QuizRepo::create(&db, &user, &quiz_params(vec![question(0), three_options])),
            Err(AppError::Validation(_))
        );
        assert_matches!(
            QuizRepo::create(&db, &user, &quiz_params(vec![question(4)])),
            Err(AppError::Validation(_))
        );
        assert!(QuizRepo::list(&db, &user, None).expect("list").is_empty());
    }

    #[test]
    fn test_attempts_are_appended() {
        let (_dir, db) = setup_test_db();
        let user = insert_user(&db, "a@example.com");
        let quiz = QuizRepo::create(&db, &user, &quiz_params(vec![question(0)])).expect("create");

        for score in [0, 1] {
            QuizRepo::record_attempt(
                &db,
                &NewQuizAttempt {
                    quiz_id: quiz.id.clone(),
                    user_id: user.clone(),
                    answers: vec![Some(score as usize)],
                    score,
                    total_marks: 1,
                    percentage: score as f64 * 100.0,
                    passed: score == 1,
                    time_taken: Some(30),
                },
            )
            .expect("attempt");
        }

        let attempts = QuizRepo::list_attempts_for_quiz(&db, &user, &quiz.id).expect("list");
        assert_eq!(attempts.len(), 2);
        assert_eq!(attempts[0].quiz_title, "Cell Biology");
        assert_eq!(QuizRepo::count_attempts(&db, &user).expect("count"), 2);
    }

    #[test]
    fn test_replace_generated_quiz_is_scoped_to_note() {
        let (_dir, db) = setup_test_db();
        let user = insert_user(&db, "a@example.com");
        let note_params = CreateNoteParams {
            title: "Chapter 1".to_string(),
            content: "Cells".to_string(),
            ..Default::default()
        };
        let first_note = NoteRepo::create(&db, &user, &note_params).expect("note");
        let second_note = NoteRepo::create(&db, &user, &note_params).expect("note");

        let generated_for = |note_id: &str| {
            let mut params = quiz_params(vec![question(0)]);
            params.title = "Quiz: Chapter 1".to_string();
            params.note_id = Some(note_id.to_string());
            QuizRepo::create(&db, &user, &params).expect("create")
        };
        let first = generated_for(&first_note.id);
        let second = generated_for(&second_note.id);
        let mut manual = quiz_params(vec![question(0)]);
        manual.title = "Quiz: Chapter 1".to_string();
        let manual = QuizRepo::create(&db, &user, &manual).expect("create");

        let conn = db.get_conn_safe().expect("conn");
        let removed = QuizRepo::soft_delete_generated_for_note_with_conn(
            &conn,
            &user,
            &first_note.id,
            "Quiz: Chapter 1",
        )
        .expect("replace");
        assert_eq!(removed, 1);
        assert!(QuizRepo::find_any(&db, &first.id)
            .expect("query")
            .expect("row retained")
            .is_deleted);

        let live: Vec<String> = QuizRepo::list(&db, &user, None)
            .expect("list")
            .into_iter()
            .map(|q| q.id)
            .collect();
        assert_eq!(live.len(), 2);
        assert!(live.contains(&second.id));
        assert!(live.contains(&manual.id));
    }
}
