mod api;
mod cli;
mod files;
mod router;
mod settings;
mod startup;
mod state;

use clap::Parser;
use tracing::info;

fn load_config(cli: &cli::Cli) -> intake_core::Config {
    intake_core::config::load_dotenv();
    let mut config = intake_core::Config::from_env();
    if let Some(dir) = &cli.data_dir {
        config.storage.data_dir = dir.clone();
    }
    config
}

async fn serve(config: &intake_core::Config) -> anyhow::Result<()> {
    config.log_summary();
    let state = startup::build_app_state(config)?;
    let app = router::build_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server listening on http://{}", addr);
    info!("API docs at {}/docs", config.server.public_base_url);
    axum::serve(listener, app).await?;

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = cli::Cli::parse();
    let config = load_config(&cli);

    if cli::dispatch(&config, cli.command).await? {
        return Ok(());
    }
    serve(&config).await
}
