//! Diagnostic CLI for `mailcanon`: parse a message file and print the result.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use uuid::Uuid;

use mailcanon::config::{self, Config};
use mailcanon::model::discussion::{LookupPlan, EXCERPT_LEN};
use mailcanon::parser::eml;
use mailcanon::{plan, CanonicalMessage, CanonicalMessageBuilder, SpamVerdict};

#[derive(Parser)]
#[command(name = "mailcanon", version, about = "Inspect how raw messages are canonicalized and threaded")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to $MAILCANON_CONFIG or the user config dir)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a message and print the canonical form and lookup plan as JSON
    Inspect {
        path: PathBuf,
        /// Recipient user id used for the lookup plan (random if omitted)
        #[arg(long)]
        user: Option<Uuid>,
        /// Raw-message reference id (defaults to the file name)
        #[arg(long)]
        raw_id: Option<String>,
        /// Treat the message as flagged by the spam classifier
        #[arg(long)]
        spam: bool,
        /// Omit attachment payloads from the output
        #[arg(long)]
        no_data: bool,
    },
    /// Print the effective configuration as TOML
    Config {
        /// Also write it to the config file path
        #[arg(long)]
        write: bool,
    },
}

#[derive(Serialize)]
struct Report<'a> {
    message: &'a CanonicalMessage,
    excerpt: String,
    plan: &'a LookupPlan,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => config::load_config_from(path)?,
        None => config::load_config(),
    };

    let log_level = match cli.verbose {
        0 => config.logging.level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level);

    match cli.command {
        Commands::Inspect {
            path,
            user,
            raw_id,
            spam,
            no_data,
        } => cmd_inspect(&config, &path, user, raw_id, spam, no_data),
        Commands::Config { write } => {
            print!("{}", toml::to_string_pretty(&config)?);
            if write {
                let path = cli
                    .config
                    .or_else(config::config_file_path)
                    .context("no configuration directory available")?;
                config::save_config(&config, &path)?;
                eprintln!("Wrote {}", path.display());
            }
            Ok(())
        }
    }
}

/// Set up tracing with stderr output.
fn setup_logging(level: &str) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .init();
}

fn cmd_inspect(
    config: &Config,
    path: &Path,
    user: Option<Uuid>,
    raw_id: Option<String>,
    spam: bool,
    no_data: bool,
) -> anyhow::Result<()> {
    let raw = eml::load_eml(path, raw_id)?;
    let verdict = if spam {
        SpamVerdict::Spam
    } else {
        SpamVerdict::Unknown
    };

    let mut message = match CanonicalMessageBuilder::new(config).ingest(&raw, verdict) {
        Ok(message) => message,
        Err(e) if e.is_rejection() => {
            tracing::warn!(raw_id = %raw.id, error = %e, "Message rejected");
            return Err(e.into());
        }
        Err(e) => return Err(e.into()),
    };
    let lookups = plan(&message, user.unwrap_or_else(Uuid::new_v4));
    let excerpt = message.excerpt(EXCERPT_LEN);

    if no_data {
        for part in &mut message.attachments {
            part.data.clear();
        }
    }

    let report = Report {
        message: &message,
        excerpt,
        plan: &lookups,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
