// Foodlog CLI - Meal and Condition Journal
// Runs the logging dialogue in the terminal and writes Markdown notes under the data directory

mod console;

use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use color_eyre::{eyre::Context, Result};
use foodlog_core::services::{ConditionService, CONDITION_LOG_DIR, FOODS_DIR, FOOD_LOG_DIR};
use foodlog_core::{
    AppContext, BreathSmell, Clock, DialogueEngine, Event, FileStore, Keyboard, SessionKey,
    Settings, SystemClock,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, error, info};

use console::{parse_line, render_reply, Input, HELP};

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "foodlog=debug,foodlog_core=debug,warn"
    } else {
        "foodlog=info,foodlog_core=info,warn"
    };

    use tracing_subscriber::prelude::*;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr)
                .with_filter(tracing_subscriber::EnvFilter::new(filter)),
        )
        .init();

    let settings = cli.settings.load()?;
    debug!(
        data_dir = %settings.data_dir.display(),
        timezone = %settings.timezone,
        "settings loaded"
    );

    match &cli.command {
        Command::Chat(args) => handle_chat(&settings, args).await?,
        Command::Breath { smell } => handle_breath(&settings, smell)?,
        Command::Stats => handle_stats(&settings)?,
    }
    Ok(())
}

#[derive(Parser, Debug)]
#[command(
    name = "foodlog",
    author,
    version,
    about = "Foodlog: meal and condition journal in plain Markdown",
    long_about = "Log meals and how you felt afterwards.\nNotes are plain Markdown files."
)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(flatten)]
    settings: SettingsArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct SettingsArgs {
    /// Data directory (default: ./data)
    #[arg(long, env = "DATA_DIR", global = true)]
    data_dir: Option<PathBuf>,
    /// IANA timezone for note timestamps (default: UTC)
    #[arg(long, env = "TZ", global = true)]
    tz: Option<String>,
    /// Base URL of the photo recognition service
    #[arg(long, env = "PHOTO_INTAKE_URL", global = true)]
    photo_intake_url: Option<String>,
    /// Bearer token for the photo recognition service
    #[arg(long, env = "PHOTO_INTAKE_TOKEN", hide_env_values = true, global = true)]
    photo_intake_token: Option<String>,
    /// Seconds to wait for photo recognition
    #[arg(long, env = "PHOTO_INTAKE_TIMEOUT_SECS", global = true)]
    photo_timeout_secs: Option<u64>,
    /// SQLite file for dialogue sessions (in memory when unset)
    #[arg(long, env = "SESSION_DB", global = true)]
    session_db: Option<PathBuf>,
}

impl SettingsArgs {
    fn load(&self) -> Result<Settings> {
        let mut values: HashMap<&str, String> = HashMap::new();
        if let Some(ref dir) = self.data_dir {
            values.insert("DATA_DIR", dir.display().to_string());
        }
        if let Some(ref tz) = self.tz {
            values.insert("TZ", tz.clone());
        }
        if let Some(ref url) = self.photo_intake_url {
            values.insert("PHOTO_INTAKE_URL", url.clone());
        }
        if let Some(ref token) = self.photo_intake_token {
            values.insert("PHOTO_INTAKE_TOKEN", token.clone());
        }
        if let Some(secs) = self.photo_timeout_secs {
            values.insert("PHOTO_INTAKE_TIMEOUT_SECS", secs.to_string());
        }
        if let Some(ref db) = self.session_db {
            values.insert("SESSION_DB", db.display().to_string());
        }
        Settings::from_lookup(|key| values.get(key).cloned())
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Talk to the journal bot in the terminal
    Chat(ChatArgs),
    /// Record today's breath smell, replacing an earlier entry for the day
    Breath {
        /// none, mild or strong
        #[arg(value_parser = ["none", "mild", "strong"])]
        smell: String,
    },
    /// Count notes in each journal directory
    Stats,
}

#[derive(Args, Debug)]
struct ChatArgs {
    /// Chat identifier for the session
    #[arg(long, default_value_t = 1)]
    chat_id: i64,
    /// User identifier for the session
    #[arg(long, default_value_t = 1)]
    user_id: i64,
}

async fn handle_chat(settings: &Settings, args: &ChatArgs) -> Result<()> {
    let ctx = AppContext::from_settings(settings)?;
    let engine = DialogueEngine::new(Arc::new(ctx));
    let key = SessionKey::new(args.chat_id, args.user_id);

    info!(session = %key, data_dir = %settings.data_dir.display(), "starting console chat");
    eprintln!("Foodlog chat. Type /help for commands.\n");

    let mut keyboard: Option<Keyboard> = None;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    prompt()?;

    while let Some(line) = lines.next_line().await.context("Failed to read from stdin")? {
        let event = match parse_line(&line, keyboard) {
            Input::Event(event) => event,
            Input::Photo(path) => read_photo(&path).await,
            Input::Help => {
                println!("{}", HELP);
                prompt()?;
                continue;
            }
            Input::Quit => break,
            Input::UnknownButton(number) => {
                println!("No button /{} here.", number);
                prompt()?;
                continue;
            }
            Input::Empty => {
                prompt()?;
                continue;
            }
        };

        match engine.handle(key, event).await {
            Ok(replies) => {
                for reply in replies {
                    if reply.keyboard.is_some() {
                        keyboard = reply.keyboard;
                    }
                    println!("{}\n", render_reply(&reply));
                }
            }
            Err(e) => {
                error!(session = %key, error = ?e, "failed to handle event");
                println!("Something went wrong: {}. Try /cancel to start over.\n", e);
            }
        }
        prompt()?;
    }

    Ok(())
}

async fn read_photo(path: &str) -> Event {
    let path = shellexpand_home(path);
    match tokio::fs::read(&path).await {
        Ok(bytes) => Event::Photo(bytes),
        Err(e) => {
            debug!(path = %path.display(), error = %e, "failed to read photo");
            Event::PhotoDownloadFailed
        }
    }
}

fn shellexpand_home(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), std::env::var("HOME")) {
        (Some(rest), Ok(home)) => PathBuf::from(home).join(rest),
        _ => PathBuf::from(path),
    }
}

fn prompt() -> Result<()> {
    print!("> ");
    std::io::stdout().flush().context("Failed to flush stdout")
}

fn handle_breath(settings: &Settings, smell: &str) -> Result<()> {
    let smell: BreathSmell = smell.parse()?;
    let now = SystemClock::new(settings.timezone).now();
    let service = ConditionService::new(FileStore::new(settings.data_dir.clone()));
    let record = service.persist_breath(&now, smell)?;

    info!(path = %record.path.display(), smell = %smell, "breath note written");
    println!("✓ Breath: {} ({})", smell, record.path.display());
    Ok(())
}

fn handle_stats(settings: &Settings) -> Result<()> {
    let store = FileStore::new(settings.data_dir.clone());

    println!("\n📊 Foodlog Statistics\n");
    for dir in [FOODS_DIR, FOOD_LOG_DIR, CONDITION_LOG_DIR] {
        let count = store.count_notes(dir)?;
        println!("  {:<14} {}", dir, count);
    }
    println!("\n📍 Data location: {}\n", settings.data_dir.display());
    Ok(())
}
