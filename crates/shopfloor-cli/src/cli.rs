use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use shopfloor_core::ConflictResolution;

#[derive(Parser)]
#[command(name = "shopfloor")]
#[command(about = "Queue and sync shop-floor transactions from the command line")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// CLI profile name for backend and session configuration
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
    /// Authenticate a profile with Supabase
    Auth {
        #[command(subcommand)]
        command: AuthCommands,
    },
    /// Inspect and sync the offline transaction queue
    Offline {
        #[command(subcommand)]
        command: OfflineCommands,
    },
    /// Drive a work order through its lifecycle
    WorkOrder {
        #[command(subcommand)]
        command: WorkOrderCommands,
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

/// Which side wins when resolving a conflict.
#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum KeepChoice {
    Local,
    Server,
    Merge,
}

impl From<KeepChoice> for ConflictResolution {
    fn from(choice: KeepChoice) -> Self {
        match choice {
            KeepChoice::Local => Self::KeepLocal,
            KeepChoice::Server => Self::KeepServer,
            KeepChoice::Merge => Self::Merge,
        }
    }
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Initialize or update profile config
    Init {
        /// Profile name to initialize
        #[arg(long, value_name = "NAME")]
        profile: Option<String>,
        /// Supabase project URL
        #[arg(long, value_name = "URL")]
        supabase_url: Option<String>,
        /// Supabase anon/public key
        #[arg(long, value_name = "KEY")]
        supabase_anon_key: Option<String>,
        /// Functions base URL (derived from the project URL when omitted)
        #[arg(long, value_name = "URL")]
        functions_url: Option<String>,
        /// Device identifier stamped on queued transactions
        #[arg(long, value_name = "ID")]
        device_id: Option<String>,
        /// Keep current active profile instead of activating this one
        #[arg(long)]
        no_activate: bool,
    },
}

#[derive(Subcommand)]
pub enum AuthCommands {
    /// Login with Supabase email/password and store session in keychain
    Login {
        /// Supabase account email
        #[arg(long, value_name = "EMAIL")]
        email: String,
        /// Supabase account password
        #[arg(long, value_name = "PASSWORD")]
        password: String,
    },
    /// Show auth status for profile
    Status,
    /// Logout profile and clear stored session
    Logout,
}

#[derive(Subcommand)]
pub enum OfflineCommands {
    /// List queued transactions
    List {
        /// Only show conflicting transactions
        #[arg(long)]
        conflicts: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show queue counts
    Stats {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Queue a synthetic test transaction
    CreateTest,
    /// Sync pending transactions now
    Sync,
    /// Resolve one conflicting transaction
    Resolve {
        /// Transaction ID
        id: String,
        /// Which version to keep
        #[arg(long, value_enum)]
        keep: KeepChoice,
    },
    /// Delete every synced transaction
    ClearSynced {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// Watch connectivity and sync automatically on reconnect
    Watch {
        /// Seconds between reachability checks
        #[arg(long, default_value = "15", value_name = "SECONDS")]
        interval_secs: u64,
    },
}

#[derive(Subcommand)]
pub enum WorkOrderCommands {
    /// Show a work order
    Show {
        /// Work order ID
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Start a planned work order
    Start {
        /// Work order ID
        id: String,
    },
    /// Issue raw material against a work order
    Issue {
        /// Work order ID
        id: String,
        /// Material item ID
        #[arg(long, value_name = "ITEM")]
        item: String,
        /// Quantity to issue
        #[arg(long)]
        quantity: f64,
        /// Queue the issue for the next sync instead of sending it now
        #[arg(long)]
        queue: bool,
    },
    /// Record produced quantity
    Produce {
        /// Work order ID
        id: String,
        /// Good quantity produced
        #[arg(long)]
        quantity: f64,
        /// Scrapped quantity
        #[arg(long, default_value = "0")]
        scrap: f64,
        /// Queue the record for the next sync instead of sending it now
        #[arg(long)]
        queue: bool,
    },
    /// Submit a work order for quality inspection
    SubmitQc {
        /// Work order ID
        id: String,
    },
    /// Approve a work order after inspection
    Approve {
        /// Work order ID
        id: String,
    },
    /// Reject a work order after inspection
    Reject {
        /// Work order ID
        id: String,
        /// Rejection reason
        #[arg(long)]
        reason: String,
    },
    /// Send a rejected work order back to production
    Rework {
        /// Work order ID
        id: String,
    },
}
