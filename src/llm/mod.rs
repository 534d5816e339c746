//! 文本生成
//!
//! - `client`: OpenAI 兼容的 chat completions 客户端
//! - `prompts`: 各类生成任务的指令模板
//! - `parser`: 把生成文本解析为结构化记录

pub mod client;
pub mod parser;
pub mod prompts;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AppResult;
pub use client::ChatCompletionClient;
pub use prompts::InstructionPayload;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// 对话中的一轮消息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// 文本生成服务
///
/// 单次调用，不做重试；上游失败映射为 `AppError::Upstream`。
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, payload: &InstructionPayload) -> AppResult<String>;
}
