mod config;

use std::sync::Arc;

use clap::{Parser, Subcommand};
use config::*;
use raidbot::bot::Bot;
use raidbot::services::issues::{DisabledIssueTracker, GithubIssueTracker, IssueTracker};
use raidbot::services::store::{DocumentStore, GuildStore};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[clap(author, version)]
struct Arguments {
    #[clap(short = 'f', long = "filename")]
    config: String,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    Start,
    DeleteCommands,
}

async fn build_bot(config: &Configuration) -> anyhow::Result<Bot> {
    let store: Arc<dyn GuildStore> = match &config.storage.path {
        Some(path) => Arc::new(DocumentStore::open(path).await?),
        None => {
            tracing::warn!("storage path is not configured, documents are kept in memory");
            Arc::new(DocumentStore::in_memory())
        },
    };

    let issue_tracker: Box<dyn IssueTracker> = match &config.github {
        Some(github) => Box::new(GithubIssueTracker::new(github.into())?),
        None => Box::new(DisabledIssueTracker),
    };

    Ok(Bot::new(config.bot(), store, issue_tracker))
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Arguments = Arguments::parse();
    let config = match Configuration::load(args.config) {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(?err, "couldn't read config file");
            return;
        },
    };

    let bot = match build_bot(&config).await {
        Ok(bot) => bot,
        Err(err) => {
            tracing::error!(?err, "couldn't set up bot");
            return;
        },
    };

    let result = match args.command {
        Commands::Start => bot.start().await,
        Commands::DeleteCommands => bot.delete_commands().await,
    };

    if let Err(err) = result {
        tracing::error!(?err, "finished unsuccessfully");
    }
}
