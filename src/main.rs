use anyhow::Result;
use chatcast::server::{self, Args};
use clap::Parser;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Create ~/.chatcast directory if it doesn't exist
    let home_dir = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    let chatcast_dir = format!("{home_dir}/.chatcast");
    std::fs::create_dir_all(&chatcast_dir)?;

    // Configure logging to both console and file, clearing the previous log
    let log_path = format!("{chatcast_dir}/server.log");
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&log_path)?;

    use tracing_subscriber::fmt::writer::MakeWriterExt;
    let writer = std::io::stdout.and(log_file);

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(writer)
        .init();

    info!("Starting chatcast server");

    server::run_chat_server(args).await
}
