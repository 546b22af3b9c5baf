use anyhow::Result;
use clap::Parser;
use insight_agents::cli::Args;
use insight_agents::launch;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = args.into_config()?;
    let mode = args.launch_mode()?;

    // RUST_LOG 优先，否则按 verbose 选择级别
    let default_level = if config.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    launch(&config, mode).await
}
