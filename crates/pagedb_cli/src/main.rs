//! PageDB CLI
//!
//! Command-line tools for inspecting and maintaining PageDB stores.
//!
//! # Commands
//!
//! - `inspect` - Store statistics and live page listing
//! - `verify` - Journal and record file integrity checks
//! - `dump-journal` - Commit journal dump for debugging
//! - `show` - Print a page's content or metadata
//! - `history` - List a page's versions, newest first
//! - `put` - Create or update a page from a file or stdin
//! - `mv` - Move a page to a new path
//! - `rm` - Delete a page
//! - `version` - Version information

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// PageDB command-line store tools.
#[derive(Parser)]
#[command(name = "pagedb")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the store directory
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display store statistics and metadata
    Inspect {
        /// List live page paths
        #[arg(long)]
        pages: bool,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Verify store file integrity
    Verify {
        /// Check the commit journal
        #[arg(short, long)]
        journal: bool,

        /// Check the version record file
        #[arg(short, long)]
        records: bool,

        /// Check everything (default when no flags are given)
        #[arg(short, long)]
        all: bool,
    },

    /// Dump commit journal records for debugging
    DumpJournal {
        /// Maximum number of records to dump
        #[arg(short, long)]
        limit: Option<usize>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Print a page's content, or its metadata with --meta
    Show {
        /// Page path
        page: String,

        /// Show a specific version instead of the current one
        #[arg(long)]
        version: Option<u64>,

        /// Print attributes and version metadata instead of content
        #[arg(short, long)]
        meta: bool,
    },

    /// List a page's versions, newest first
    History {
        /// Page path
        page: String,

        /// Maximum number of versions to list
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Create or update a page from a file or stdin
    Put {
        /// Page path
        page: String,

        /// File to read content from (stdin when omitted)
        file: Option<PathBuf>,

        /// Commit message
        #[arg(short, long, default_value = "updated via cli")]
        message: String,

        /// Version the edit was based on
        #[arg(short, long)]
        base: Option<u64>,

        /// Attribute to set, as key=value (repeatable)
        #[arg(short, long = "attr")]
        attrs: Vec<String>,
    },

    /// Move a page to a new path
    Mv {
        /// Current page path
        source: String,

        /// New page path
        destination: String,

        /// Commit message
        #[arg(short, long, default_value = "moved via cli")]
        message: String,

        /// Version the move was based on
        #[arg(short, long)]
        base: Option<u64>,
    },

    /// Delete a page
    Rm {
        /// Page path
        page: String,

        /// Commit message
        #[arg(short, long, default_value = "deleted via cli")]
        message: String,

        /// Version the delete was based on
        #[arg(short, long)]
        base: Option<u64>,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Inspect { pages, format } => {
            let path = cli.path.ok_or("Store path required for inspect")?;
            commands::inspect::run(&path, pages, &format)?;
        }
        Commands::Verify {
            journal,
            records,
            all,
        } => {
            let path = cli.path.ok_or("Store path required for verify")?;
            let check_all = all || (!journal && !records);
            commands::verify::run(&path, journal || check_all, records || check_all)?;
        }
        Commands::DumpJournal { limit, format } => {
            let path = cli.path.ok_or("Store path required for dump-journal")?;
            commands::dump_journal::run(&path, limit, &format)?;
        }
        Commands::Show {
            page,
            version,
            meta,
        } => {
            let path = cli.path.ok_or("Store path required for show")?;
            commands::show::run(&path, &page, version, meta)?;
        }
        Commands::History { page, limit } => {
            let path = cli.path.ok_or("Store path required for history")?;
            commands::history::run(&path, &page, limit)?;
        }
        Commands::Put {
            page,
            file,
            message,
            base,
            attrs,
        } => {
            let path = cli.path.ok_or("Store path required for put")?;
            commands::put::run(&path, &page, file.as_deref(), &message, base, &attrs)?;
        }
        Commands::Mv {
            source,
            destination,
            message,
            base,
        } => {
            let path = cli.path.ok_or("Store path required for mv")?;
            commands::mv::run(&path, &source, &destination, &message, base)?;
        }
        Commands::Rm {
            page,
            message,
            base,
        } => {
            let path = cli.path.ok_or("Store path required for rm")?;
            commands::rm::run(&path, &page, &message, base)?;
        }
        Commands::Version => {
            println!("PageDB CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("PageDB Core v{}", pagedb_core::VERSION);
        }
    }

    Ok(())
}
