use anyhow::Context;
use personal_library::config::AppConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = AppConfig::from_env().context("failed to load configuration")?;
    personal_library::interface::http::run(config).await
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("personal_library=debug,tower_http=info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
