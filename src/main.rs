use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::{error, info};

use teleimagine_core::app::{self, ServeMode};
use teleimagine_core::config::{Config, SharedConfig};

/// A Telegram bot that chats and draws with hosted models.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Path to a JSON config file, environment variables override it.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Pull updates with long polling instead of serving a webhook.
    #[arg(long)]
    polling: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let mut logger = pretty_env_logger::formatted_timed_builder();
    logger.filter_level(log::LevelFilter::Info);
    if let Ok(filters) = std::env::var("RUST_LOG") {
        logger.parse_filters(&filters);
    }
    logger.init();

    let args = Args::parse();
    let config = match Config::load(args.config.as_deref()) {
        Ok(config) => SharedConfig::new(config),
        Err(err) => {
            error!("Failed to load config: {:#}", err);
            return ExitCode::FAILURE;
        }
    };

    info!("Bot is starting...");
    let mode = if args.polling {
        ServeMode::Polling
    } else {
        ServeMode::Webhook
    };
    if let Err(err) = app::run(config, mode).await {
        error!("Bot stopped: {:#}", err);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
