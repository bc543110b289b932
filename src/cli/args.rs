use clap::{Parser, Subcommand};

use crate::state::DEFAULT_STATE_DIR;

/// Bootguard - startup checks and license provisioning for the backend
#[derive(Parser)]
#[command(name = "bootguard")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Directory holding the license key, cache backend record, and token store
    #[arg(long, global = true, env = "STATE_DIR", default_value = DEFAULT_STATE_DIR)]
    pub state_dir: String,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commands {
    /// Run the bootstrap guard and provision the license key (default)
    Check,
    /// Print the license key, creating and registering it if needed
    LicenseKey,
    /// Show what is stored in the state directory
    Status,
}
