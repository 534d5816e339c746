//! 服务配置
//!
//! 加载顺序：`.env`（dotenvy）→ 可选 `config/study_assistant.toml` →
//! `STUDY__SECTION__KEY` 形式的环境变量 → 常用的扁平环境变量兜底
//! （`PORT`、`GROQ_API_KEY`、`SMTP_HOST` 等）。

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

const CONFIG_FILE: &str = "config/study_assistant";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub llm: LlmConfig,
    pub smtp: Option<SmtpConfig>,
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// 允许的前端来源；为空时放开所有来源
    pub cors_origin: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            cors_origin: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "data/study_assistant.db".to_string(),
        }
    }
}

/// OpenAI 兼容的 chat completions 服务配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.groq.com/openai/v1".to_string(),
            api_key: None,
            model: "llama-3.1-8b-instant".to_string(),
            temperature: 0.7,
            max_tokens: 800,
            timeout_secs: 60,
        }
    }
}

impl LlmConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    pub user: String,
    pub pass: String,
}

fn default_smtp_port() -> u16 {
    587
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub session_ttl_hours: i64,
    pub reset_token_expire_minutes: i64,
    pub restore_otp_expire_minutes: i64,
    pub frontend_url: String,
    pub app_name: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_ttl_hours: 24 * 7,
            reset_token_expire_minutes: 15,
            restore_otp_expire_minutes: 10,
            frontend_url: "http://localhost:5173".to_string(),
            app_name: "Study Assistant".to_string(),
        }
    }
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let mut builder = config::Config::builder();
        if std::path::Path::new(&format!("{}.toml", CONFIG_FILE)).exists() {
            info!("[Config] Loading {}.toml", CONFIG_FILE);
            builder = builder.add_source(config::File::with_name(CONFIG_FILE));
        }
        builder = builder.add_source(
            config::Environment::with_prefix("STUDY")
                .separator("__")
                .list_separator(","),
        );

        let mut cfg = match builder.build() {
            Ok(loaded) => loaded.try_deserialize::<AppConfig>().unwrap_or_else(|e| {
                warn!("[Config] Invalid configuration, using defaults: {}", e);
                AppConfig::default()
            }),
            Err(e) => {
                warn!("[Config] Failed to build configuration: {}", e);
                AppConfig::default()
            }
        };

        cfg.apply_env_fallbacks();
        Ok(cfg)
    }

    /// 扁平环境变量兜底
    fn apply_env_fallbacks(&mut self) {
        if let Some(port) = env_parse::<u16>("PORT") {
            self.server.port = port;
        }
        if self.server.cors_origin.is_none() {
            self.server.cors_origin = env_opt("CORS_ORIGIN");
        }
        if let Some(path) = env_opt("DATABASE_PATH") {
            self.database.path = path;
        }
        if self.llm.api_key.is_none() {
            self.llm.api_key = env_opt("GROQ_API_KEY");
        }
        if let Some(url) = env_opt("FRONTEND_URL") {
            self.auth.frontend_url = url;
        }
        if let Some(name) = env_opt("APP_NAME") {
            self.auth.app_name = name;
        }
        if let Some(minutes) = env_parse::<i64>("RESET_TOKEN_EXPIRE_MINUTES") {
            self.auth.reset_token_expire_minutes = minutes;
        }
        if self.smtp.is_none() {
            if let (Some(host), Some(user), Some(pass)) =
                (env_opt("SMTP_HOST"), env_opt("SMTP_USER"), env_opt("SMTP_PASS"))
            {
                self.smtp = Some(SmtpConfig {
                    host,
                    port: env_parse::<u16>("SMTP_PORT").unwrap_or_else(default_smtp_port),
                    user,
                    pass,
                });
            }
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env_opt(key).and_then(|v| v.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.server.port, 5000);
        assert_eq!(cfg.llm.model, "llama-3.1-8b-instant");
        assert_eq!(cfg.llm.max_tokens, 800);
        assert!((cfg.llm.temperature - 0.7).abs() < f32::EPSILON);
        assert_eq!(cfg.auth.restore_otp_expire_minutes, 10);
        assert!(cfg.smtp.is_none());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let loaded = config::Config::builder()
            .add_source(config::File::from_str(
                "[server]\nport = 8088\n[llm]\nmodel = \"test-model\"\n",
                config::FileFormat::Toml,
            ))
            .build()
            .expect("build config");
        let cfg: AppConfig = loaded.try_deserialize().expect("deserialize");
        assert_eq!(cfg.server.port, 8088);
        assert_eq!(cfg.server.host, "0.0.0.0");
        assert_eq!(cfg.llm.model, "test-model");
        assert_eq!(cfg.llm.base_url, "https://api.groq.com/openai/v1");
    }
}
