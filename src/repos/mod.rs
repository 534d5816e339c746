//! 数据仓储层
//!
//! 每个 Repo 是无状态的单元结构体：`xxx(db, ..)` 从连接池取连接，
//! `xxx_with_conn(conn, ..)` 复用调用方的连接（事务场景）。
//!
//! 可软删除的表统一使用 `is_deleted / deleted_at / deleted_by` 三列，
//! 普通查询过滤 `is_deleted = 0`，`find_any` 系列方法忽略该过滤。

pub mod chat_repo;
pub mod flashcard_repo;
pub mod note_repo;
pub mod pomodoro_repo;
pub mod quiz_repo;
pub mod report_repo;
pub mod session_repo;
pub mod study_plan_repo;
pub mod subject_repo;
pub mod user_repo;

pub use chat_repo::ChatRepo;
pub use flashcard_repo::FlashcardRepo;
pub use note_repo::NoteRepo;
pub use pomodoro_repo::PomodoroRepo;
pub use quiz_repo::QuizRepo;
pub use report_repo::ReportRepo;
pub use session_repo::SessionRepo;
pub use study_plan_repo::StudyPlanRepo;
pub use subject_repo::SubjectRepo;
pub use user_repo::UserRepo;

use rusqlite::{params, Connection};
use tracing::info;

use crate::database::now_timestamp;
use crate::error::{AppError, AppResult};

/// 软删除归属于 `owner_id` 的一条记录
///
/// 记录不存在、已删除或不属于该用户时返回 NotFound。
pub(crate) fn soft_delete_owned(
    conn: &Connection,
    table: &'static str,
    resource: &str,
    id: &str,
    owner_id: &str,
) -> AppResult<()> {
    let now = now_timestamp();
    let sql = format!(
        "UPDATE {} SET is_deleted = 1, deleted_at = ?1, deleted_by = ?2, updated_at = ?1
         WHERE id = ?3 AND user_id = ?2 AND is_deleted = 0",
        table
    );
    let updated = conn.execute(&sql, params![now, owner_id, id])?;
    if updated == 0 {
        return Err(AppError::not_found(resource, id));
    }
    info!("[Repo::{}] Soft deleted {}", resource, id);
    Ok(())
}

/// 解析 JSON 文本列，失败时回退为默认值
pub(crate) fn parse_json_column<T>(raw: &str, table: &str, id: &str) -> T
where
    T: serde::de::DeserializeOwned + Default,
{
    serde_json::from_str(raw).unwrap_or_else(|e| {
        tracing::warn!(
            "[Repo::{}] Failed to parse JSON column for {}: {}, using default",
            table,
            id,
            e
        );
        T::default()
    })
}
