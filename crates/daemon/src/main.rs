use std::io::{BufRead, Write};

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use herald_common::config::AppConfig;
use herald_notifier::{FormatHint, TelegramSink};
use herald_poller::DevmanPoller;

use review_herald::{LifecycleEvent, LifecycleReporter, PollLoop};

/// Forward dvmn.org code review results to a Telegram chat.
#[derive(Debug, Parser)]
#[command(name = "review-herald", version)]
struct Cli {
    /// Telegram chat that receives review notifications (overrides TELEGRAM_CHAT_ID)
    #[arg(long)]
    chat_id: Option<String>,

    /// Telegram chat that receives start/stop/crash messages (overrides OPERATOR_CHAT_ID)
    #[arg(long)]
    operator_chat_id: Option<String>,

    /// Emit JSON log lines
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing first so configuration errors are logged too
    init_tracing(cli.log_json || AppConfig::log_json_from_env());

    if let Err(e) = run(cli).await {
        tracing::error!(error = %format!("{:#}", e), "ReviewHerald exited with an error");
        return Err(e);
    }
    Ok(())
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    // Load configuration
    let config = AppConfig::from_env()?;

    let operator = cli
        .operator_chat_id
        .or_else(|| config.operator_chat_id.clone())
        .map(|id| TelegramSink::from_config(&config, id).map(|s| s.with_format(FormatHint::Html)))
        .transpose()?;
    let reporter = LifecycleReporter::new(operator);

    // From here on, failures also reach the operator chat
    let result = serve(cli.chat_id, &config, &reporter).await;
    reporter.finish(result).await
}

async fn serve(
    chat_id: Option<String>,
    config: &AppConfig,
    reporter: &LifecycleReporter<TelegramSink>,
) -> anyhow::Result<()> {
    let chat_id = match chat_id.or_else(|| config.telegram_chat_id.clone()) {
        Some(id) => id,
        None => tokio::task::spawn_blocking(prompt_chat_id).await??,
    };

    let poller = DevmanPoller::from_config(config)?;
    let sink = TelegramSink::from_config(config, chat_id)?;

    let shutdown = CancellationToken::new();
    spawn_shutdown_listener(shutdown.clone());

    reporter
        .announce(LifecycleEvent::Started {
            chat_id: sink.chat_id().to_string(),
        })
        .await;

    let mut poll_loop = PollLoop::new(poller, sink, config.backoff());
    poll_loop.run(shutdown).await?;
    Ok(())
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("review_herald=info,herald_poller=info,herald_notifier=info")
    });

    if json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

/// Ask for the chat id on stdin when neither the CLI nor the environment has one.
///
/// Blocks on stdin, so it runs on the blocking pool.
fn prompt_chat_id() -> anyhow::Result<String> {
    let mut stdout = std::io::stdout();
    writeln!(stdout, "\nReviewHerald needs the Telegram chat id to send notifications to.")?;
    writeln!(stdout, "1. Send any message to your bot in Telegram")?;
    writeln!(stdout, "2. Ask @userinfobot for your chat id")?;
    writeln!(stdout, "3. Or copy it from the chat URL in Telegram Web")?;
    write!(stdout, "\nEnter your chat id: ")?;
    stdout.flush()?;

    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    let chat_id = line.trim();
    if chat_id.is_empty() {
        anyhow::bail!("a Telegram chat id is required (--chat-id or TELEGRAM_CHAT_ID)");
    }
    Ok(chat_id.to_string())
}

/// Cancel `token` on Ctrl+C, or SIGTERM on unix.
fn spawn_shutdown_listener(token: CancellationToken) {
    tokio::spawn(async move {
        wait_for_signal().await;
        tracing::info!("Received shutdown signal, stopping gracefully...");
        token.cancel();
    });
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut term) => {
            tokio::select! {
                _ = ctrl_c() => {}
                _ = term.recv() => {}
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "SIGTERM handler unavailable, listening for Ctrl+C only");
            ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    ctrl_c().await;
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Ctrl+C handler unavailable");
        std::future::pending::<()>().await;
    }
}
