//! `notekey` command-line driver.
//!
//! # Responsibility
//! - Wire config, logging, storage and the explanation client into one
//!   running coordinator.
//! - Speak the JSON message protocol over stdin/stdout, one message per line.

use clap::{Parser, Subcommand};
use log::{error, info};
use notekey_core::coordinator::{spawn as spawn_coordinator, Coordinator, DEFAULT_QUEUE_CAPACITY};
use notekey_core::db::open_db;
use notekey_core::{
    logging, ExplanationClient, GeminiClient, KvNoteRepository, NoteKeyConfig, Notification,
    NotificationHub, Response, SqliteKvStore, Subscription, SystemClock,
};
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

/// NoteKey coordinator over stdin/stdout.
#[derive(Parser)]
#[command(name = "notekey")]
#[command(about = "Capture highlighted text into notes")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// SQLite database path (overrides `storage.db_path`)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Absolute log directory (overrides `logging.dir`)
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Read JSON requests from stdin (default)
    Serve,
    /// Print the core version
    Version,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match cli.command {
        Some(Commands::Version) => {
            println!("notekey_core version={}", notekey_core::core_version());
            ExitCode::SUCCESS
        }
        Some(Commands::Serve) | None => match serve(cli).await {
            Ok(()) => ExitCode::SUCCESS,
            Err(err) => {
                error!("event=cli_exit module=cli status=error error={}", err);
                eprintln!("notekey: {err}");
                ExitCode::FAILURE
            }
        },
    }
}

fn load_config(cli: &Cli) -> Result<NoteKeyConfig, Box<dyn Error>> {
    let mut config = match &cli.config {
        Some(path) => NoteKeyConfig::load(path)?,
        None => NoteKeyConfig::from_env()?,
    };
    if let Some(db) = &cli.db {
        config.storage.db_path = db.clone();
    }
    if let Some(dir) = &cli.log_dir {
        config.logging.dir = Some(dir.clone());
    }
    Ok(config)
}

async fn serve(cli: Cli) -> Result<(), Box<dyn Error>> {
    let config = load_config(&cli)?;
    if let Err(err) = logging::init_from_config(&config.logging) {
        eprintln!("notekey: file logging disabled: {err}");
    }

    let conn = open_db(&config.storage.db_path)?;
    let repo = KvNoteRepository::new(SqliteKvStore::new(conn));
    let hub = NotificationHub::new();
    let mut coordinator = Coordinator::new(
        repo,
        hub.clone(),
        Arc::new(SystemClock),
        config.debounce.windows(),
    );

    let gemini = GeminiClient::new(&config.gemini)?;
    if gemini.is_configured() {
        let explainer: Arc<dyn ExplanationClient> = Arc::new(gemini);
        coordinator = coordinator.with_explainer(explainer);
    } else {
        info!("event=cli_start module=cli status=ok explain=unconfigured");
    }
    coordinator.initialize()?;

    let mut notifications = hub.subscribe();
    drop(hub);
    let (handle, task) = spawn_coordinator(coordinator, DEFAULT_QUEUE_CAPACITY);
    let mut out = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let response = handle.send_json(line).await;
                write_reply(&response, &mut notifications, &mut out).await?;
            }
            Some(notification) = notifications.recv() => {
                write_notification(&notification, &mut out).await?;
            }
        }
    }

    drop(handle);
    task.await?;
    drain_notifications(&mut notifications, &mut out).await?;
    Ok(())
}

/// Writes a reply after the broadcasts its request raised.
///
/// The coordinator publishes before it answers, so everything queued on the
/// subscription at this point belongs to this request or an earlier one.
async fn write_reply<W: AsyncWrite + Unpin>(
    response: &Response,
    notifications: &mut Subscription,
    out: &mut W,
) -> Result<(), Box<dyn Error>> {
    drain_notifications(notifications, out).await?;
    let line = serde_json::to_string(response)?;
    write_line(out, &line).await?;
    Ok(())
}

async fn drain_notifications<W: AsyncWrite + Unpin>(
    notifications: &mut Subscription,
    out: &mut W,
) -> std::io::Result<()> {
    while let Ok(notification) = notifications.try_recv() {
        write_notification(&notification, out).await?;
    }
    Ok(())
}

async fn write_notification<W: AsyncWrite + Unpin>(
    notification: &Notification,
    out: &mut W,
) -> std::io::Result<()> {
    match serde_json::to_string(notification) {
        Ok(line) => write_line(out, &format!("notify {line}")).await,
        Err(err) => {
            error!(
                "event=notify_print module=cli status=error type={} error={}",
                notification.kind(),
                err
            );
            Ok(())
        }
    }
}

async fn write_line<W: AsyncWrite + Unpin>(out: &mut W, line: &str) -> std::io::Result<()> {
    out.write_all(line.as_bytes()).await?;
    out.write_all(b"\n").await?;
    out.flush().await
}

#[cfg(test)]
mod tests {
    use super::write_reply;
    use notekey_core::coordinator::{spawn, Coordinator, DEFAULT_QUEUE_CAPACITY};
    use notekey_core::{
        DebounceWindows, KvNoteRepository, ManualClock, MemoryKvStore, NotificationHub,
    };
    use std::sync::Arc;

    #[tokio::test]
    async fn reply_follows_the_notifications_it_raised() {
        let hub = NotificationHub::new();
        let mut notifications = hub.subscribe();
        let mut coordinator = Coordinator::new(
            KvNoteRepository::new(MemoryKvStore::new()),
            hub,
            Arc::new(ManualClock::new(10_000)),
            DebounceWindows::default(),
        );
        coordinator.initialize().unwrap();
        let (handle, _task) = spawn(coordinator, DEFAULT_QUEUE_CAPACITY);

        let response = handle
            .send_json(r#"{"action":"add","text":"hello"}"#)
            .await;
        let mut out = Vec::new();
        write_reply(&response, &mut notifications, &mut out)
            .await
            .unwrap();

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3, "{text}");
        assert!(lines[0].starts_with("notify ") && lines[0].contains("noteUpdated"));
        assert!(lines[1].starts_with("notify ") && lines[1].contains("clearHighlightedText"));
        assert!(lines[2].starts_with('{') && lines[2].contains("\"success\":true"));
    }
}
