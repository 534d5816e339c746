//! 番茄钟会话

use rusqlite::{params, Connection, OptionalExtension};
use tracing::info;

use super::soft_delete_owned;
use crate::database::{new_id, now_timestamp, StudyDatabase};
use crate::error::{AppError, AppResult};
use crate::models::{
    PomodoroKind, PomodoroSession, PomodoroTodayStats, StartPomodoroParams, UpdatePomodoroParams,
};

const POMODORO_COLUMNS: &str = "id, user_id, kind, duration, started_at, ended_at, completed, \
                                is_deleted, deleted_at, deleted_by, created_at, updated_at";

pub struct PomodoroRepo;

impl PomodoroRepo {
    pub fn start(
        db: &StudyDatabase,
        user_id: &str,
        params: &StartPomodoroParams,
    ) -> AppResult<PomodoroSession> {
        if params.duration <= 0 {
            return Err(AppError::validation("Duration must be a positive number of seconds"));
        }
        let conn = db.get_conn_safe()?;
        let id = new_id("pomo");
        let now = now_timestamp();
        conn.execute(
            "INSERT INTO pomodoro_sessions (id, user_id, kind, duration, started_at, created_at,
                                            updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5, ?5)",
            params![id, user_id, params.kind.as_str(), params.duration, now],
        )?;
        info!(
            "[PomodoroRepo] Started {} session {} ({}s)",
            params.kind.as_str(),
            id,
            params.duration
        );
        Self::find_with_conn(&conn, user_id, &id)
    }

    /// 结束会话：记录结束时间并标记完成
    pub fn end(db: &StudyDatabase, user_id: &str, id: &str) -> AppResult<PomodoroSession> {
        let conn = db.get_conn_safe()?;
        let now = now_timestamp();
        let updated = conn.execute(
            "UPDATE pomodoro_sessions SET ended_at = ?1, completed = 1, updated_at = ?1
             WHERE id = ?2 AND user_id = ?3 AND is_deleted = 0",
            params![now, id, user_id],
        )?;
        if updated == 0 {
            return Err(AppError::not_found("PomodoroSession", id));
        }
        Self::find_with_conn(&conn, user_id, id)
    }

    pub fn find(db: &StudyDatabase, user_id: &str, id: &str) -> AppResult<PomodoroSession> {
        let conn = db.get_conn_safe()?;
        Self::find_with_conn(&conn, user_id, id)
    }

    pub fn find_with_conn(
        conn: &Connection,
        user_id: &str,
        id: &str,
    ) -> AppResult<PomodoroSession> {
        let sql = format!(
            "SELECT {} FROM pomodoro_sessions WHERE id = ?1 AND user_id = ?2 AND is_deleted = 0",
            POMODORO_COLUMNS
        );
        conn.query_row(&sql, params![id, user_id], Self::row_to_session)
            .optional()?
            .ok_or_else(|| AppError::not_found("PomodoroSession", id))
    }

    /// 管理用查询：忽略软删除与归属
    pub fn find_any(db: &StudyDatabase, id: &str) -> AppResult<Option<PomodoroSession>> {
        let conn = db.get_conn_safe()?;
        let sql = format!(
            "SELECT {} FROM pomodoro_sessions WHERE id = ?1",
            POMODORO_COLUMNS
        );
        Ok(conn
            .query_row(&sql, params![id], Self::row_to_session)
            .optional()?)
    }

    /// 历史记录，最新在前
    pub fn history(db: &StudyDatabase, user_id: &str) -> AppResult<Vec<PomodoroSession>> {
        let conn = db.get_conn_safe()?;
        let sql = format!(
            "SELECT {} FROM pomodoro_sessions WHERE user_id = ?1 AND is_deleted = 0
             ORDER BY started_at DESC, rowid DESC",
            POMODORO_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![user_id], Self::row_to_session)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// 区间内已完成的会话（报告 / 连续学习天数统计）
    pub fn completed_between(
        db: &StudyDatabase,
        user_id: &str,
        start: &str,
        end: &str,
    ) -> AppResult<Vec<PomodoroSession>> {
        let conn = db.get_conn_safe()?;
        let sql = format!(
            "SELECT {} FROM pomodoro_sessions
             WHERE user_id = ?1 AND is_deleted = 0 AND completed = 1
               AND started_at >= ?2 AND started_at <= ?3
             ORDER BY started_at ASC",
            POMODORO_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![user_id, start, end], Self::row_to_session)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// 自 `since` 起已完成会话的统计
    pub fn stats_since(
        db: &StudyDatabase,
        user_id: &str,
        since: &str,
    ) -> AppResult<PomodoroTodayStats> {
        let conn = db.get_conn_safe()?;
        let (focus_time, sessions): (i64, i64) = conn.query_row(
            "SELECT COALESCE(SUM(CASE WHEN kind = 'WORK' THEN duration ELSE 0 END), 0), COUNT(*)
             FROM pomodoro_sessions
             WHERE user_id = ?1 AND is_deleted = 0 AND completed = 1 AND started_at >= ?2",
            params![user_id, since],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok(PomodoroTodayStats {
            focus_time,
            sessions,
        })
    }

    pub fn update(
        db: &StudyDatabase,
        user_id: &str,
        id: &str,
        update: &UpdatePomodoroParams,
    ) -> AppResult<PomodoroSession> {
        let conn = db.get_conn_safe()?;
        let current = Self::find_with_conn(&conn, user_id, id)?;

        let duration = update.duration.unwrap_or(current.duration);
        if duration <= 0 {
            return Err(AppError::validation("Duration must be a positive number of seconds"));
        }
        let kind = update.kind.unwrap_or(current.kind);
        let completed = update.completed.unwrap_or(current.completed);
        let ended_at = update.ended_at.clone().or(current.ended_at);

        conn.execute(
            "UPDATE pomodoro_sessions SET kind = ?1, duration = ?2, completed = ?3, ended_at = ?4,
                 updated_at = ?5
             WHERE id = ?6 AND user_id = ?7",
            params![
                kind.as_str(),
                duration,
                completed as i32,
                ended_at,
                now_timestamp(),
                id,
                user_id
            ],
        )?;
        Self::find_with_conn(&conn, user_id, id)
    }

    pub fn soft_delete(db: &StudyDatabase, user_id: &str, id: &str) -> AppResult<()> {
        let conn = db.get_conn_safe()?;
        soft_delete_owned(&conn, "pomodoro_sessions", "PomodoroSession", id, user_id)
    }

    fn row_to_session(row: &rusqlite::Row) -> rusqlite::Result<PomodoroSession> {
        let kind: String = row.get(2)?;
        Ok(PomodoroSession {
            id: row.get(0)?,
            user_id: row.get(1)?,
            kind: PomodoroKind::from_str(&kind).unwrap_or(PomodoroKind::Work),
            duration: row.get(3)?,
            started_at: row.get(4)?,
            ended_at: row.get(5)?,
            completed: row.get::<_, i32>(6)? != 0,
            is_deleted: row.get::<_, i32>(7)? != 0,
            deleted_at: row.get(8)?,
            deleted_by: row.get(9)?,
            created_at: row.get(10)?,
            updated_at: row.get(11)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_support::{insert_user, setup_test_db};
    use assert_matches::assert_matches;

    fn start(db: &StudyDatabase, user: &str, kind: PomodoroKind, duration: i64) -> PomodoroSession {
        PomodoroRepo::start(db, user, &StartPomodoroParams { kind, duration }).expect("start")
    }

    #[test]
    fn test_zero_duration_rejected() {
        let (_dir, db) = setup_test_db();
        let user = insert_user(&db, "a@example.com");
        assert_matches!(
            PomodoroRepo::start(
                &db,
                &user,
                &StartPomodoroParams {
                    kind: PomodoroKind::Work,
                    duration: 0
                }
            ),
            Err(AppError::Validation(_))
        );
    }

    #[test]
    fn test_stats_only_count_completed_work_time() {
        let (_dir, db) = setup_test_db();
        let user = insert_user(&db, "a@example.com");

        let work = start(&db, &user, PomodoroKind::Work, 1500);
        let rest = start(&db, &user, PomodoroKind::Break, 300);
        start(&db, &user, PomodoroKind::Work, 1500); // 未结束

        PomodoroRepo::end(&db, &user, &work.id).expect("end");
        PomodoroRepo::end(&db, &user, &rest.id).expect("end");

        let stats =
            PomodoroRepo::stats_since(&db, &user, "2000-01-01T00:00:00.000Z").expect("stats");
        assert_eq!(
            stats,
            PomodoroTodayStats {
                focus_time: 1500,
                sessions: 2
            }
        );
    }

    #[test]
    fn test_soft_deleted_session_hidden_from_history() {
        let (_dir, db) = setup_test_db();
        let user = insert_user(&db, "a@example.com");
        let session = start(&db, &user, PomodoroKind::Work, 600);
        PomodoroRepo::soft_delete(&db, &user, &session.id).expect("delete");

        assert!(PomodoroRepo::history(&db, &user).expect("history").is_empty());
        assert!(PomodoroRepo::find_any(&db, &session.id)
            .expect("query")
            .expect("row retained")
            .is_deleted);
    }
}
