mod check;
mod license_key;
mod status;

pub use check::run_check;
pub use license_key::run_license_key;
pub use status::run_status;

use anyhow::{Context, Result};

use crate::config::EnvSnapshot;
use crate::guard::{BootstrapGuard, Step, StepStatus};
use crate::state::StateDir;

/// Bot token for key derivation, read without requiring the rest of the config.
fn bot_token(env: &EnvSnapshot) -> Result<String> {
    env.get("BOT_TOKEN")
        .filter(|token| !token.trim().is_empty())
        .map(ToOwned::to_owned)
        .context("BOT_TOKEN is missing, please declare it in the .env file")
}

/// Run the guard, exiting with status 1 when startup must not continue.
fn guard_or_exit(env: EnvSnapshot, state_dir: StateDir) -> BootstrapGuard {
    let mut guard = BootstrapGuard::new(env, state_dir);
    if !guard.check_readiness() {
        eprintln!("Startup aborted: bootstrap checks failed.");
        for step in Step::ALL {
            match guard.status(step) {
                StepStatus::Success => eprintln!("   ✅ {}", step.label()),
                StepStatus::Skipped => eprintln!("   ➖ {} (skipped)", step.label()),
                StepStatus::NotStarted => eprintln!("   ⏸  {} (not reached)", step.label()),
                StepStatus::Failed(reason) => eprintln!("   ❌ {}: {}", step.label(), reason),
            }
        }
        std::process::exit(1);
    }
    guard
}
