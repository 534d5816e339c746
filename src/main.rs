use study_assistant_lib::{config::AppConfig, logging};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();
    let config = AppConfig::load()?;
    study_assistant_lib::run(config).await
}
