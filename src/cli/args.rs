//! CLI argument definitions using clap

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueHint};

use crate::config::OutputFormat;
use crate::domain::BranchPolicy;

/// Flatten hierarchical JSON records into pre-order: parents first, siblings in order
#[derive(Parser, Debug)]
#[command(name = "hiersort")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Debug output on stderr (-d info, -dd debug, -ddd trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub debug: u8,

    /// Project directory holding .hiersort.toml (default: cwd)
    #[arg(short = 'C', long, global = true, value_hint = ValueHint::DirPath)]
    pub project_dir: Option<PathBuf>,

    /// Record field holding the identifier
    #[arg(long = "id", global = true, value_name = "FIELD")]
    pub id_property: Option<String>,

    /// Record field marking branch records
    #[arg(long = "node", global = true, value_name = "FIELD")]
    pub node_property: Option<String>,

    /// Record field referencing the parent identifier
    #[arg(long = "parent", global = true, value_name = "FIELD")]
    pub parent_property: Option<String>,

    /// Branch policy: always | matching
    #[arg(long, global = true)]
    pub policy: Option<BranchPolicy>,

    /// JSON pointer to the record array, e.g. /data/items
    #[arg(long, global = true)]
    pub pointer: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Flatten records into hierarchy order
    Sort {
        /// Input JSON file (default or "-": stdin)
        #[arg(value_hint = ValueHint::FilePath)]
        file: Option<PathBuf>,
        /// Output format
        #[arg(short, long, value_enum)]
        format: Option<OutputFormat>,
        /// Write to file instead of stdout
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        output: Option<PathBuf>,
    },

    /// Show hierarchy as tree
    Tree {
        /// Input JSON file (default or "-": stdin)
        #[arg(value_hint = ValueHint::FilePath)]
        file: Option<PathBuf>,
        /// Record field appended to each identifier
        #[arg(short, long, value_name = "FIELD")]
        label: Option<String>,
    },

    /// Report duplicates, orphans, missing fields and cycles
    Check {
        /// Input JSON file (default or "-": stdin)
        #[arg(value_hint = ValueHint::FilePath)]
        file: Option<PathBuf>,
    },

    /// Manage settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Generate shell completions
    Completion {
        /// Shell type
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show effective settings
    Show,
    /// Show config file locations
    Path,
    /// Print a commented config template
    Template,
}
