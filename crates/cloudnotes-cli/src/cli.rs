use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "cloudnotes")]
#[command(about = "Read and write Nextcloud Notes from the command line")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// CLI profile name (server, username and stored app password)
    #[arg(long, global = true, value_name = "NAME")]
    pub profile: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Configure CLI profiles
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Log in through the browser (Login Flow v2) and store an app password
    Login {
        /// Give up after this many seconds
        #[arg(long, value_name = "SECS", default_value = "300")]
        timeout: u64,
    },
    /// Revoke the stored app password and forget it
    Logout,
    /// Show the server status
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show Notes app capabilities of the server
    Capabilities,
    /// List notes
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print one note
    Get {
        /// Note ID
        id: i64,
    },
    /// Create a new note
    #[command(alias = "new")]
    Add {
        /// Note content
        content: Vec<String>,
    },
    /// Replace the content of a note (opens $EDITOR when no content is given)
    Edit {
        /// Note ID
        id: i64,
        /// New content
        content: Vec<String>,
    },
    /// Delete a note
    Delete {
        /// Note ID
        id: i64,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Initialize or update profile config
    Init {
        /// Nextcloud server URL, including any sub-path
        #[arg(long, value_name = "URL")]
        server: Option<String>,
        /// Login name (filled in by `cloudnotes login` when omitted)
        #[arg(long, value_name = "NAME")]
        username: Option<String>,
        /// Accept invalid TLS certificates
        #[arg(long)]
        insecure: bool,
        /// Keep current active profile instead of activating this one
        #[arg(long)]
        no_activate: bool,
    },
    /// Show the resolved profile
    Show,
}
