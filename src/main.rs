use clap::Parser;
use flair_engine::{run_pass, FlairTable, PassSummary, ProcessorContext};
use flairbot_core::{CoreError, ErrorReporter, FlairSession, Settings};
use reddit_client::{RedditClient, RedditConfig};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "flairbot=info,flair_engine=info,reddit_client=info";

/// Assigns subreddit flair from unread flair-request messages.
#[derive(Debug, Parser)]
#[command(name = "flairbot", version, about)]
struct Cli {
    /// Settings file
    #[arg(long, default_value = "conf.toml")]
    config: PathBuf,

    /// CSV table of `class key,flair text` rows
    #[arg(long, default_value = "flair_list.csv")]
    flairs: PathBuf,

    /// Audit log, appended to when `[log] logging = true`
    #[arg(long, default_value = "log.txt")]
    log_file: PathBuf,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER)),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(&cli).await {
        Ok(summary) => {
            if summary.flair_failed > 0 || summary.mark_read_failed > 0 {
                tracing::warn!(
                    "{} flair updates failed and {} messages could not be marked read",
                    summary.flair_failed,
                    summary.mark_read_failed
                );
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            ErrorReporter::new().report_error(&e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli) -> Result<PassSummary, CoreError> {
    let settings = Settings::load(&cli.config)?;
    tracing::info!(
        "Starting flairbot for r/{} (subject '{}')",
        settings.subreddit,
        settings.subject
    );

    let client = RedditClient::new(RedditConfig::from_settings(&settings))?;
    client.authenticate().await?;

    let username = client.current_user().await?;
    println!("{}", username);

    let table = FlairTable::load(&cli.flairs)?;
    let ctx = ProcessorContext::from_settings(&settings, table, &cli.log_file);

    run_pass(&client, &ctx).await
}
