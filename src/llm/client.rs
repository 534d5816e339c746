//! OpenAI 兼容 chat completions 客户端
//!
//! 请求 `POST {base_url}/chat/completions`，读取 `choices[0].message.content`。
//! 失败时优先使用上游返回的 `error.message`，其次是原始响应体。

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, error, info};

use super::{InstructionPayload, TextGenerator};
use crate::config::LlmConfig;
use crate::error::{AppError, AppResult};

const GENERIC_FAILURE: &str = "Text generation failed";

pub struct ChatCompletionClient {
    client: Client,
    config: LlmConfig,
}

impl ChatCompletionClient {
    pub fn new(config: LlmConfig) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .connect_timeout(std::time::Duration::from_secs(15))
            .use_rustls_tls()
            .build()
            .map_err(|e| AppError::internal(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }

    /// 组装请求体
    pub fn build_request_body(&self, payload: &InstructionPayload) -> Value {
        let mut messages = Vec::with_capacity(payload.turns.len() + 1);
        messages.push(json!({ "role": "system", "content": payload.system }));
        for turn in &payload.turns {
            messages.push(json!({ "role": turn.role, "content": turn.content }));
        }
        json!({
            "model": self.config.model,
            "messages": messages,
            "temperature": self.config.temperature,
            "max_tokens": self.config.max_tokens,
        })
    }
}

/// 从失败响应体中提取上游错误信息
pub fn upstream_error_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        if let Some(message) = value
            .get("error")
            .and_then(|e| e.get("message"))
            .and_then(|m| m.as_str())
            .filter(|m| !m.trim().is_empty())
        {
            return message.to_string();
        }
        return value.to_string();
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        GENERIC_FAILURE.to_string()
    } else {
        trimmed.to_string()
    }
}

#[async_trait]
impl TextGenerator for ChatCompletionClient {
    async fn generate(&self, payload: &InstructionPayload) -> AppResult<String> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| AppError::upstream("Text generation API key is not configured"))?;

        let body = self.build_request_body(payload);
        debug!(
            "[LLM::Client] POST {} (model={}, turns={})",
            self.endpoint(),
            self.config.model,
            payload.turns.len()
        );

        let response = self
            .client
            .post(self.endpoint())
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!("[LLM::Client] Request failed: {}", e);
                AppError::upstream(format!("{}: {}", GENERIC_FAILURE, e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            let message = upstream_error_message(&error_text);
            error!("[LLM::Client] Upstream returned {} - {}", status, message);
            return Err(AppError::upstream(message));
        }

        let response_json: Value = response.json().await.map_err(|e| {
            AppError::upstream(format!("Failed to decode generation response: {}", e))
        })?;

        let content = response_json["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| AppError::upstream("Generation response has no message content"))?;

        info!(
            "[LLM::Client] Generated {} chars with {}",
            content.chars().count(),
            self.config.model
        );
        Ok(content.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::prompts;

    #[test]
    fn test_upstream_error_message_extraction() {
        assert_eq!(
            upstream_error_message(r#"{"error":{"message":"Rate limit reached","type":"tokens"}}"#),
            "Rate limit reached"
        );
        assert_eq!(
            upstream_error_message(r#"{"detail":"bad"}"#),
            r#"{"detail":"bad"}"#
        );
        assert_eq!(upstream_error_message("Bad Gateway"), "Bad Gateway");
        assert_eq!(upstream_error_message(""), GENERIC_FAILURE);
    }

    #[test]
    fn test_request_body_shape() {
        let client = ChatCompletionClient::new(LlmConfig::default()).expect("client");
        let body = client.build_request_body(&prompts::summary("text"));
        assert_eq!(body["model"], "llama-3.1-8b-instant");
        assert_eq!(body["max_tokens"], 800);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["role"], "user");
        assert!(body["messages"][1]["content"]
            .as_str()
            .unwrap()
            .ends_with("text"));
    }
}
