use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use tracing::info;

use sessionstore::SessionStore;
use sessionstore::cli::{Cli, Command};
use sessionstore::config::Config;

fn setup_logging(level: Option<&str>) -> Result<()> {
    let level = match level.map(|s| s.to_uppercase()) {
        Some(s) if s == "TRACE" => tracing::Level::TRACE,
        Some(s) if s == "DEBUG" => tracing::Level::DEBUG,
        Some(s) if s == "WARN" || s == "WARNING" => tracing::Level::WARN,
        Some(s) if s == "ERROR" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .try_init()
        .map_err(|e| eyre::eyre!("Failed to install subscriber: {}", e))?;
    Ok(())
}

fn format_ms(ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(ms)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    setup_logging(cli.log_level.as_deref().or(config.log_level.as_deref())).context("Failed to setup logging")?;
    info!("sessionstore starting");

    let store_path = cli.store.unwrap_or(config.store_path);
    let store = SessionStore::open(&store_path)
        .with_context(|| format!("Failed to open session store at {}", store_path.display()))?
        .with_compression_level(config.compression_level);

    match cli.command {
        Command::List { tag } => {
            let entries: Vec<_> = store
                .list()?
                .into_iter()
                .filter(|e| tag.as_ref().map(|t| e.header.tags.contains(t)).unwrap_or(true))
                .collect();
            if entries.is_empty() {
                println!("No sessions found");
            } else {
                for entry in entries {
                    let h = &entry.header;
                    println!(
                        "{} {} {} {}",
                        h.id.cyan(),
                        h.title,
                        format_ms(h.updated_at).dimmed(),
                        format!("{:.1}KB", entry.size_bytes as f64 / 1024.0).dimmed()
                    );
                }
            }
        }
        Command::Info { session_id } => {
            let header = store.header(&session_id)?;
            let size = store.size(&session_id)?;
            println!("Session: {}", header.id.cyan());
            println!("  Title: {}", header.title);
            println!("  Created: {}", format_ms(header.created_at));
            println!("  Updated: {}", format_ms(header.updated_at));
            println!("  Messages: {}", header.message_count);
            println!("  Has plan: {}", header.has_plan);
            if !header.tags.is_empty() {
                println!("  Tags: {}", header.tags.join(", "));
            }
            println!("  Size: {} bytes", size);
        }
        Command::Delete { session_id } => {
            if store.delete(&session_id)? {
                println!("{} Deleted session: {}", "✓".green(), session_id);
            } else {
                println!("{} No such session: {}", "✗".red(), session_id);
            }
        }
    }

    Ok(())
}
