//! CLI argument parsing using clap.
//!
//! Contains the Cli struct and the Commands enum.

use clap::{
    Parser, Subcommand,
    builder::styling::{AnsiColor, Effects, Styles},
};
use std::path::PathBuf;

fn clap_cargo_style() -> Styles {
    Styles::styled()
        .header(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Green.on_default())
}

/// Live JSON data directory with jq queries over MCP
#[derive(Parser, Debug)]
#[command(
    name = "jqdex",
    version = env!("CARGO_PKG_VERSION"),
    about = "Serve a directory of JSON files to LLM clients over MCP",
    long_about = "Index a directory of JSON files, keep the index fresh with a file watcher, \
                  and answer jq queries over MCP (stdio or streamable HTTP).",
    next_line_help = true,
    styles = clap_cargo_style()
)]
pub struct Cli {
    /// Path to a settings file (TOML, or YAML by extension)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start MCP server
    #[command(
        about = "Start MCP server",
        long_about = "Start the MCP server over stdio (default) or streamable HTTP.",
        after_help = "Examples:\n  jqdex serve -p ./data\n  jqdex serve -p ./data -t http -a 0.0.0.0:8080 --token s3cret\n  jqdex serve -p ./data --no-watch"
    )]
    Serve {
        /// Directory containing the JSON files (overrides config)
        #[arg(short = 'p', long)]
        data_path: Option<PathBuf>,

        /// Transport: stdio or http (overrides config)
        #[arg(short, long)]
        transport: Option<String>,

        /// Listen address for the http transport (overrides config)
        #[arg(short = 'a', long)]
        bind: Option<String>,

        /// Bearer token required by the http transport (overrides config)
        #[arg(long)]
        token: Option<String>,

        /// Server instructions sent to clients (overrides config)
        #[arg(short, long)]
        instructions: Option<String>,

        /// Disable file system watching
        #[arg(long)]
        no_watch: bool,
    },

    /// Run a jq filter over JSON files
    #[command(
        about = "Run a jq filter over JSON files and print the result",
        after_help = "Examples:\n  jqdex query -f users.json -q '.[0].name'\n  jqdex query -f 'logs/*.json' -q '[inputs | .level] | unique'\n  jqdex query -p ./data -f '**/*.json' -q '[inputs] | length'"
    )]
    Query {
        /// Files or glob patterns (repeatable)
        #[arg(short = 'f', long = "file", value_name = "FILE", required = true, num_args = 1..)]
        files: Vec<String>,

        /// jq filter to run
        #[arg(short = 'q', long = "query", value_name = "FILTER")]
        filter: String,

        /// Resolve files under this directory and refuse paths outside it
        #[arg(short = 'p', long)]
        data_path: Option<PathBuf>,
    },

    /// Print the file manifest
    #[command(about = "Print the manifest of JSON files under the data directory")]
    List {
        /// Directory containing the JSON files (overrides config)
        #[arg(short = 'p', long)]
        data_path: Option<PathBuf>,
    },

    /// Show current configuration settings
    #[command(about = "Display effective settings as TOML (token redacted)")]
    Config,
}
