use clap::Parser;
use color_eyre::eyre::{
    Result,
    WrapErr,
};
use std::{
    path::{
        Path,
        PathBuf,
    },
    time::Duration,
};
use ticket_board::{
    client,
    summary_client::DEFAULT_SUMMARY_URL,
};
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling,
};
use tracing_subscriber::{
    EnvFilter,
    fmt,
};

const LOG_FILE_PREFIX: &str = "ticket-board.log";

#[derive(Parser, Debug)]
#[command(version, about = "Terminal board for regular and HODL ticket totals", long_about = None)]
struct Args {
    /// Base URL of the summary server
    #[arg(long, default_value = DEFAULT_SUMMARY_URL)]
    url: String,

    /// Fetch once, print the board as plain text and exit
    #[arg(long)]
    once: bool,

    /// Directory for the daily rolling log file
    #[arg(long, default_value = "logs")]
    log_dir: PathBuf,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 30, value_parser = clap::value_parser!(u64).range(1..))]
    timeout_secs: u64,
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

// the TUI owns stdout, so logs go to a file
fn init_file_tracing(log_dir: &Path) -> Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir)
        .wrap_err_with(|| format!("creating log directory {}", log_dir.display()))?;
    let appender = rolling::daily(log_dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let _ = fmt()
        .with_env_filter(env_filter())
        .with_writer(writer)
        .with_ansi(false)
        .try_init();
    Ok(guard)
}

fn init_stderr_tracing() {
    let _ = fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Args::parse();
    let config = client::AppConfig {
        base_url: args.url,
        request_timeout: Duration::from_secs(args.timeout_secs),
    };

    if args.once {
        init_stderr_tracing();
        let succeeded = client::run_once(&config).await?;
        if !succeeded {
            std::process::exit(1);
        }
        return Ok(());
    }

    let _guard = init_file_tracing(&args.log_dir)?;
    tracing::info!("starting ticket-board against {}", config.base_url);
    client::run_app(config).await
}
