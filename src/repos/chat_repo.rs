//! 聊天记录
//!
//! 删除分两段：第一次删除只把内容替换为占位文本并打标记，
//! 对已标记的消息再次删除才会物理移除。

use rusqlite::{params, OptionalExtension};
use tracing::info;

use crate::database::{new_id, now_timestamp, StudyDatabase};
use crate::error::{AppError, AppResult};
use crate::models::{ChatMessage, ChatSender, DELETED_MESSAGE_TEXT};

/// 删除结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatDeleteOutcome {
    /// 内容已替换为占位文本
    SoftDeleted,
    /// 已物理删除
    Removed,
}

pub struct ChatRepo;

impl ChatRepo {
    pub fn append(
        db: &StudyDatabase,
        user_id: &str,
        sender: ChatSender,
        text: &str,
    ) -> AppResult<ChatMessage> {
        let conn = db.get_conn_safe()?;
        let id = new_id("msg");
        let now = now_timestamp();
        conn.execute(
            "INSERT INTO chat_messages (id, user_id, sender, text, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![id, user_id, sender.as_str(), text, now],
        )?;
        Ok(ChatMessage {
            id,
            user_id: user_id.to_string(),
            sender,
            text: text.to_string(),
            deleted: false,
            created_at: now,
        })
    }

    /// 按时间正序返回全部消息
    pub fn history(db: &StudyDatabase, user_id: &str) -> AppResult<Vec<ChatMessage>> {
        let conn = db.get_conn_safe()?;
        let mut stmt = conn.prepare(
            "SELECT id, user_id, sender, text, deleted, created_at FROM chat_messages
             WHERE user_id = ?1 ORDER BY created_at ASC, rowid ASC",
        )?;
        let rows = stmt.query_map(params![user_id], Self::row_to_message)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn delete(db: &StudyDatabase, user_id: &str, id: &str) -> AppResult<ChatDeleteOutcome> {
        let conn = db.get_conn_safe()?;
        let deleted: Option<bool> = conn
            .query_row(
                "SELECT deleted FROM chat_messages WHERE id = ?1 AND user_id = ?2",
                params![id, user_id],
                |row| Ok(row.get::<_, i32>(0)? != 0),
            )
            .optional()?;

        match deleted {
            None => Err(AppError::not_found("ChatMessage", id)),
            Some(true) => {
                conn.execute(
                    "DELETE FROM chat_messages WHERE id = ?1 AND user_id = ?2",
                    params![id, user_id],
                )?;
                info!("[ChatRepo] Removed message {}", id);
                Ok(ChatDeleteOutcome::Removed)
            }
            Some(false) => {
                conn.execute(
                    "UPDATE chat_messages SET deleted = 1, text = ?1 WHERE id = ?2 AND user_id = ?3",
                    params![DELETED_MESSAGE_TEXT, id, user_id],
                )?;
                info!("[ChatRepo] Soft deleted message {}", id);
                Ok(ChatDeleteOutcome::SoftDeleted)
            }
        }
    }

    pub fn clear(db: &StudyDatabase, user_id: &str) -> AppResult<usize> {
        let conn = db.get_conn_safe()?;
        let removed = conn.execute(
            "DELETE FROM chat_messages WHERE user_id = ?1",
            params![user_id],
        )?;
        info!("[ChatRepo] Cleared {} messages for user {}", removed, user_id);
        Ok(removed)
    }

    fn row_to_message(row: &rusqlite::Row) -> rusqlite::Result<ChatMessage> {
        let sender: String = row.get(2)?;
        Ok(ChatMessage {
            id: row.get(0)?,
            user_id: row.get(1)?,
            sender: ChatSender::from_str(&sender).unwrap_or(ChatSender::User),
            text: row.get(3)?,
            deleted: row.get::<_, i32>(4)? != 0,
            created_at: row.get(5)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_support::{insert_user, setup_test_db};

    #[test]
    fn test_two_stage_delete() {
        let (_dir, db) = setup_test_db();
        let user = insert_user(&db, "a@example.com");
        let msg = ChatRepo::append(&db, &user, ChatSender::User, "What is entropy?").expect("append");

        assert_eq!(
            ChatRepo::delete(&db, &user, &msg.id).expect("first delete"),
            ChatDeleteOutcome::SoftDeleted
        );
        let history = ChatRepo::history(&db, &user).expect("history");
        assert_eq!(history[0].text, DELETED_MESSAGE_TEXT);
        assert!(history[0].deleted);

        assert_eq!(
            ChatRepo::delete(&db, &user, &msg.id).expect("second delete"),
            ChatDeleteOutcome::Removed
        );
        assert!(ChatRepo::history(&db, &user).expect("history").is_empty());
        assert!(ChatRepo::delete(&db, &user, &msg.id).unwrap_err().is_not_found());
    }

    #[test]
    fn test_history_order_and_clear() {
        let (_dir, db) = setup_test_db();
        let user = insert_user(&db, "a@example.com");
        ChatRepo::append(&db, &user, ChatSender::User, "first").expect("append");
        ChatRepo::append(&db, &user, ChatSender::Ai, "second").expect("append");

        let history = ChatRepo::history(&db, &user).expect("history");
        assert_eq!(history[0].text, "first");
        assert_eq!(history[1].sender, ChatSender::Ai);

        assert_eq!(ChatRepo::clear(&db, &user).expect("clear"), 2);
    }
}
