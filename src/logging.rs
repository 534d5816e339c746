use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

/// 初始化全局日志；`RUST_LOG` 可覆盖默认的 INFO 级别
pub fn init() {
    let filter = EnvFilter::from_default_env().add_directive(LevelFilter::INFO.into());
    if tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .is_err()
    {
        tracing::debug!("[Logging] Subscriber already installed");
    }
}
