//! 数据库管理模块
//!
//! 提供 SQLite 数据库初始化与 r2d2 连接池。
//!
//! ## 设计
//! - 单一数据库文件，路径来自 `DatabaseConfig::path`
//! - WAL 模式 + 外键约束
//! - Schema 幂等创建，启动时自动执行

pub mod schema;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;
use tracing::{debug, error, info};

use crate::error::{AppError, AppResult};
use schema::{CURRENT_SCHEMA_VERSION, SCHEMA_SQL};

/// SQLite 连接池类型
pub type DbPool = Pool<SqliteConnectionManager>;

/// SQLite 池化连接类型
pub type DbPooledConnection = r2d2::PooledConnection<SqliteConnectionManager>;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// 当前时间（存储格式）
pub fn now_timestamp() -> String {
    format_timestamp(&Utc::now())
}

pub fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.format(TIMESTAMP_FORMAT).to_string()
}

pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// 生成带前缀的记录 ID，例如 `note_V1StGXR8_Z`
pub fn new_id(prefix: &str) -> String {
    format!("{}_{}", prefix, nanoid::nanoid!(10))
}

/// 学习助手数据库
pub struct StudyDatabase {
    pool: DbPool,
    db_path: PathBuf,
}

impl StudyDatabase {
    /// 打开（必要时创建）数据库并执行 Schema 初始化
    pub fn new(db_path: &Path) -> AppResult<Self> {
        info!("[Database] Initializing database: {}", db_path.display());

        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    error!("[Database] Failed to create data directory: {}", e);
                    AppError::database(format!("Failed to create data directory: {}", e))
                })?;
            }
        }

        let pool = Self::build_pool(db_path)?;
        let db = Self {
            pool,
            db_path: db_path.to_path_buf(),
        };
        db.initialize_schema()?;

        info!(
            "[Database] Database ready (schema v{}): {}",
            CURRENT_SCHEMA_VERSION,
            db.db_path.display()
        );
        Ok(db)
    }

    fn build_pool(db_path: &Path) -> AppResult<DbPool> {
        debug!(
            "[Database] Building connection pool for: {}",
            db_path.display()
        );

        let manager = SqliteConnectionManager::file(db_path).with_init(|conn| {
            conn.pragma_update(None, "foreign_keys", "ON")?;
            conn.pragma_update(None, "journal_mode", "WAL")?;
            conn.pragma_update(None, "synchronous", "NORMAL")?;
            conn.pragma_update(None, "busy_timeout", 5000i64)?;
            Ok(())
        });

        Pool::builder()
            .max_size(15)
            .min_idle(Some(2))
            .connection_timeout(Duration::from_secs(5))
            .max_lifetime(Some(Duration::from_secs(1800)))
            .idle_timeout(Some(Duration::from_secs(600)))
            .build(manager)
            .map_err(|e| AppError::database(format!("Failed to create connection pool: {}", e)))
    }

    fn initialize_schema(&self) -> AppResult<()> {
        let conn = self.get_conn_safe()?;
        conn.execute_batch(SCHEMA_SQL)?;
        conn.execute(
            "INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (?1, ?2)",
            params![CURRENT_SCHEMA_VERSION, now_timestamp()],
        )?;
        Ok(())
    }

    /// 从连接池取出一个连接
    pub fn get_conn_safe(&self) -> AppResult<DbPooledConnection> {
        Ok(self.pool.get()?)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn get_schema_version(&self) -> AppResult<u32> {
        let conn = self.get_conn_safe()?;
        let version: u32 = conn.query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |row| row.get(0),
        )?;
        Ok(version)
    }

    pub fn is_foreign_keys_enabled(&self) -> AppResult<bool> {
        let conn = self.get_conn_safe()?;
        let enabled: i64 = conn.pragma_query_value(None, "foreign_keys", |row| row.get(0))?;
        Ok(enabled == 1)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use tempfile::TempDir;

    /// 创建测试数据库
    pub fn setup_test_db() -> (TempDir, StudyDatabase) {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db = StudyDatabase::new(&temp_dir.path().join("test.db"))
            .expect("Failed to create database");
        (temp_dir, db)
    }

    /// 插入一个测试用户，返回用户 ID
    pub fn insert_user(db: &StudyDatabase, email: &str) -> String {
        let conn = db.get_conn_safe().expect("conn");
        let id = new_id("user");
        let now = now_timestamp();
        conn.execute(
            "INSERT INTO users (id, name, email, password_hash, created_at, updated_at)
             VALUES (?1, 'Tester', ?2, 'x', ?3, ?3)",
            params![id, email, now],
        )
        .expect("insert user");
        id
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::setup_test_db;
    use super::*;

    #[test]
    fn test_database_creation() {
        let (temp_dir, db) = setup_test_db();
        assert!(temp_dir.path().join("test.db").exists());
        assert_eq!(db.get_schema_version().expect("version"), CURRENT_SCHEMA_VERSION);
    }

    #[test]
    fn test_schema_idempotent() {
        let (temp_dir, db) = setup_test_db();
        drop(db);
        let db2 = StudyDatabase::new(&temp_dir.path().join("test.db")).expect("reopen");
        assert_eq!(db2.get_schema_version().expect("version"), CURRENT_SCHEMA_VERSION);
    }

    #[test]
    fn test_foreign_keys_enabled() {
        let (_temp_dir, db) = setup_test_db();
        assert!(db.is_foreign_keys_enabled().expect("pragma"));
    }

    #[test]
    fn test_pool_shared_across_threads() {
        let (_temp_dir, db) = setup_test_db();
        let db = std::sync::Arc::new(db);
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let db = db.clone();
                std::thread::spawn(move || {
                    let conn = db.get_conn_safe().expect("conn");
                    conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get::<_, i64>(0))
                        .expect("count")
                })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().expect("thread"), 0);
        }
    }

    #[test]
    fn test_timestamp_format_sortable() {
        let a = format_timestamp(&(Utc::now() - chrono::Duration::seconds(5)));
        let b = now_timestamp();
        assert!(a < b);
        assert!(b.ends_with('Z'));
        assert!(parse_timestamp(&b).is_some());
    }

    #[test]
    fn test_new_id_prefix() {
        let id = new_id("quiz");
        assert!(id.starts_with("quiz_"));
        assert_eq!(id.len(), "quiz_".len() + 10);
    }
}
