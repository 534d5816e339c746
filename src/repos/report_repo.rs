//! 学习报告持久化

use std::collections::BTreeMap;

use rusqlite::{params, OptionalExtension};
use tracing::info;

use super::{parse_json_column, soft_delete_owned};
use crate::database::{new_id, now_timestamp, StudyDatabase};
use crate::error::{AppError, AppResult};
use crate::models::{Report, ReportType};

const REPORT_COLUMNS: &str = "id, user_id, report_type, start_date, end_date, total_study_hours, \
                              topics_covered, quizzes_taken, average_score, subject_performance, \
                              improvement, ai_insights, is_deleted, deleted_at, deleted_by, \
                              created_at, updated_at";

/// 新报告
#[derive(Debug, Clone)]
pub struct NewReport {
    pub user_id: String,
    pub report_type: ReportType,
    pub start_date: String,
    pub end_date: String,
    pub total_study_hours: f64,
    pub topics_covered: i64,
    pub quizzes_taken: i64,
    pub average_score: f64,
    pub subject_performance: BTreeMap<String, i64>,
    pub improvement: i64,
    pub ai_insights: Option<String>,
}

pub struct ReportRepo;

impl ReportRepo {
    pub fn insert(db: &StudyDatabase, report: &NewReport) -> AppResult<Report> {
        let conn = db.get_conn_safe()?;
        let id = new_id("rep");
        let now = now_timestamp();
        conn.execute(
            "INSERT INTO reports (id, user_id, report_type, start_date, end_date,
                                  total_study_hours, topics_covered, quizzes_taken, average_score,
                                  subject_performance, improvement, ai_insights, created_at,
                                  updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?13)",
            params![
                id,
                report.user_id,
                report.report_type.as_str(),
                report.start_date,
                report.end_date,
                report.total_study_hours,
                report.topics_covered,
                report.quizzes_taken,
                report.average_score,
                serde_json::to_string(&report.subject_performance)?,
                report.improvement,
                report.ai_insights,
                now
            ],
        )?;
        info!(
            "[ReportRepo] Stored {} report {}",
            report.report_type.as_str(),
            id
        );
        drop(conn);
        Self::find(db, &report.user_id, &id)
    }

    pub fn find(db: &StudyDatabase, user_id: &str, id: &str) -> AppResult<Report> {
        let conn = db.get_conn_safe()?;
        let sql = format!(
            "SELECT {} FROM reports WHERE id = ?1 AND user_id = ?2 AND is_deleted = 0",
            REPORT_COLUMNS
        );
        conn.query_row(&sql, params![id, user_id], Self::row_to_report)
            .optional()?
            .ok_or_else(|| AppError::not_found("Report", id))
    }

    /// 管理用查询：忽略软删除与归属
    pub fn find_any(db: &StudyDatabase, id: &str) -> AppResult<Option<Report>> {
        let conn = db.get_conn_safe()?;
        let sql = format!("SELECT {} FROM reports WHERE id = ?1", REPORT_COLUMNS);
        Ok(conn
            .query_row(&sql, params![id], Self::row_to_report)
            .optional()?)
    }

    pub fn list(db: &StudyDatabase, user_id: &str) -> AppResult<Vec<Report>> {
        let conn = db.get_conn_safe()?;
        let sql = format!(
            "SELECT {} FROM reports WHERE user_id = ?1 AND is_deleted = 0 ORDER BY created_at DESC",
            REPORT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![user_id], Self::row_to_report)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn soft_delete(db: &StudyDatabase, user_id: &str, id: &str) -> AppResult<()> {
        let conn = db.get_conn_safe()?;
        soft_delete_owned(&conn, "reports", "Report", id, user_id)
    }

    fn row_to_report(row: &rusqlite::Row) -> rusqlite::Result<Report> {
        let id: String = row.get(0)?;
        let report_type: String = row.get(2)?;
        let perf_json: String = row.get(9)?;
        let subject_performance: BTreeMap<String, i64> =
            parse_json_column(&perf_json, "reports", &id);
        Ok(Report {
            id,
            user_id: row.get(1)?,
            report_type: ReportType::from_str(&report_type).unwrap_or(ReportType::Custom),
            start_date: row.get(3)?,
            end_date: row.get(4)?,
            total_study_hours: row.get(5)?,
            topics_covered: row.get(6)?,
            quizzes_taken: row.get(7)?,
            average_score: row.get(8)?,
            subject_performance,
            improvement: row.get(10)?,
            ai_insights: row.get(11)?,
            is_deleted: row.get::<_, i32>(12)? != 0,
            deleted_at: row.get(13)?,
            deleted_by: row.get(14)?,
            created_at: row.get(15)?,
            updated_at: row.get(16)?,
        })
    }
}
