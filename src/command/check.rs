use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::config::EnvSnapshot;
use crate::license::{LicenseKeyProvisioner, LicenseKeyStore, RegistryClient};
use crate::state::StateDir;

pub async fn run_check(env: EnvSnapshot, state_dir: StateDir) -> Result<()> {
    let registrar = Arc::new(RegistryClient::from_env(&env));
    let guard = super::guard_or_exit(env, state_dir.clone());
    let config = guard
        .into_configuration()
        .context("Bootstrap guard passed without a configuration")?;

    let provisioner = LicenseKeyProvisioner::new(
        LicenseKeyStore::new(state_dir.license_key_path()),
        config.bot_token.as_str(),
        registrar,
    );
    let provisioned = provisioner.provision();
    info!(
        "License key {} ({})",
        provisioned.key.describe(),
        provisioner.store().path().display()
    );
    if provisioned.key.is_recovered() {
        warn!("Stored license key state was unusable; a new key was generated");
    }

    match provisioned.registration.await {
        Ok(outcome) if outcome.requires_restart() => {
            println!("🔁 License registered. Please restart the backend.");
            std::process::exit(0);
        }
        Ok(outcome) if !outcome.is_success() => {
            info!("Continuing without a registered license");
        }
        Ok(_) => {}
        Err(e) => warn!("License registration task failed: {}", e),
    }

    println!("✅ {} is ready to start", config.name);
    println!("   Port: {}", config.port);
    println!("   Game servers: {}", config.game_servers.join(", "));
    if config.uses_external_cache() {
        println!("   External cache: enabled");
    }
    if config.uses_object_storage() {
        println!("   Object storage: enabled");
    }
    for module in ["Shop", "Matchmaking"] {
        if config.module_enabled(module) {
            println!("   Module enabled: {}", module);
        }
    }
    if config.is_dev {
        println!("   Development deployment");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn env_with_registry(url: &str) -> EnvSnapshot {
        [
            ("MONGO_URI", "mongodb://127.0.0.1/momentum"),
            ("BOT_TOKEN", "bot-token"),
            ("NAME", "Momentum"),
            ("PORT", "3551"),
            ("GAME_SERVERS", "127.0.0.1:7777"),
            ("ALLOW_REBOOT", "false"),
            ("MATCHMAKER_IP", "127.0.0.1:80"),
            ("MAIN_SEASON", "12"),
            ("USE_S3", "false"),
            ("USE_REDIS", "false"),
            ("LOOPKEY_REGISTRY_URL", url),
        ]
        .into_iter()
        .collect()
    }

    #[tokio::test]
    async fn test_invalid_registry_url_does_not_block_startup() {
        let tmp = tempdir().unwrap();
        let state_dir = StateDir::new(tmp.path().join("state"));

        run_check(env_with_registry("not a url"), state_dir.clone())
            .await
            .unwrap();

        assert!(state_dir.path().is_dir());
        assert!(state_dir.token_store_path().exists());
        let key = LicenseKeyStore::new(state_dir.license_key_path()).read().unwrap();
        assert!(key.is_some());
    }
}
