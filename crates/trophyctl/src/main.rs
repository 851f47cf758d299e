//! Trophy Control - CLI front end for the Trophy Case engine
//!
//! Plays the part of the portfolio renderer: feeds input to the egg
//! detectors, calls the progression store and prints announcements as
//! they come due.

mod commands;
mod display;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use trophy_shared::{Locale, TrophyConfig};

#[derive(Parser)]
#[command(name = "trophyctl")]
#[command(about = "Trophy Case - achievements and progression for the portfolio", long_about = None)]
#[command(version = trophy_shared::VERSION)]
struct Cli {
    /// Config file (overrides $TROPHY_CONFIG and the default location)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding saved progression
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Print pending announcements immediately instead of waiting for them
    #[arg(long, global = true)]
    no_wait: bool,

    /// Display language (en, es)
    #[arg(long, global = true, default_value = "en", value_parser = parse_locale)]
    lang: Locale,

    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show level, XP and stats
    Status {
        /// Output JSON snapshot
        #[arg(long)]
        json: bool,
    },

    /// List achievements
    List {
        /// Only this category (easter-egg, interaction, exploration, mastery, social)
        #[arg(long)]
        category: Option<String>,

        #[arg(long, conflicts_with = "unlocked")]
        locked: bool,

        #[arg(long)]
        unlocked: bool,
    },

    /// Unlock an achievement
    Unlock {
        id: String,

        /// Do not announce the unlock
        #[arg(long)]
        quiet: bool,
    },

    /// Set progress on an incremental achievement
    Progress {
        id: String,

        #[arg(allow_negative_numbers = true)]
        value: i64,
    },

    /// Add XP outside of any achievement
    Xp { amount: u64, reason: String },

    /// Show a stat, or bump it by an amount (minutes may be fractional)
    Stat { name: String, amount: Option<f64> },

    /// Feed key codes (KeyS, ArrowUp, Digit1, F12...) to the egg detectors
    Keys {
        codes: Vec<String>,

        /// Page the keys are typed on
        #[arg(long)]
        route: Option<String>,

        #[arg(long)]
        ctrl: bool,

        #[arg(long)]
        shift: bool,

        #[arg(long)]
        alt: bool,

        #[arg(long)]
        meta: bool,
    },

    /// Feed a click to the egg detectors
    Click {
        /// Consecutive click count
        #[arg(long, default_value_t = 1)]
        count: u32,

        /// Tag on the clicked element (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,

        #[arg(long)]
        route: Option<String>,
    },

    /// Type text into the command palette
    Palette { text: String },

    /// Show XP history
    History,

    /// Wipe all progression
    Reset,
}

fn parse_locale(value: &str) -> Result<Locale, String> {
    match value.to_ascii_lowercase().as_str() {
        "en" => Ok(Locale::En),
        "es" => Ok(Locale::Es),
        other => Err(format!("unsupported language '{}'", other)),
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = TrophyConfig::load(cli.config.as_deref());
    if let Some(dir) = cli.data_dir {
        config.storage.data_dir = dir;
    }
    let ctx = commands::Context::new(config, cli.lang, !cli.no_wait);

    match cli.command {
        Commands::Status { json } => commands::status(&ctx, json),
        Commands::List { category, locked, unlocked } => commands::list(&ctx, category.as_deref(), locked, unlocked),
        Commands::Unlock { id, quiet } => commands::unlock(&ctx, &id, quiet).await,
        Commands::Progress { id, value } => commands::progress(&ctx, &id, value).await,
        Commands::Xp { amount, reason } => commands::xp(&ctx, amount, &reason),
        Commands::Stat { name, amount } => commands::stat(&ctx, &name, amount),
        Commands::Keys { codes, route, ctrl, shift, alt, meta } => {
            let modifiers = trophy_shared::triggers::Modifiers { ctrl, shift, alt, meta };
            commands::keys(&ctx, &codes, route.as_deref(), modifiers).await
        }
        Commands::Click { count, tags, route } => commands::click(&ctx, count, &tags, route.as_deref()).await,
        Commands::Palette { text } => commands::palette(&ctx, &text).await,
        Commands::History => commands::history(&ctx),
        Commands::Reset => commands::reset(&ctx),
    }
}
