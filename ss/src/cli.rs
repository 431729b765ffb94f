//! CLI argument parsing for sessionstore

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "ss")]
#[command(author, version, about = "Inspect stored planning sessions", long_about = None)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Session directory (overrides config)
    #[arg(short, long)]
    pub store: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List stored sessions, newest first
    List {
        /// Only show sessions carrying this tag
        #[arg(short, long)]
        tag: Option<String>,
    },

    /// Show a session's header
    Info {
        /// Session ID
        #[arg(required = true)]
        session_id: String,
    },

    /// Delete a session
    Delete {
        /// Session ID to delete
        #[arg(required = true)]
        session_id: String,
    },
}
