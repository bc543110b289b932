use std::sync::Arc;

use anyhow::Result;

use crate::config::EnvSnapshot;
use crate::license::{
    KeyOutcome, LicenseKeyProvisioner, LicenseKeyStore, RegistrationOutcome, RegistryClient,
};
use crate::state::StateDir;

pub async fn run_license_key(env: EnvSnapshot, state_dir: StateDir) -> Result<()> {
    let registrar = Arc::new(RegistryClient::from_env(&env));
    let provisioner = LicenseKeyProvisioner::new(
        LicenseKeyStore::new(state_dir.license_key_path()),
        super::bot_token(&env)?,
        registrar,
    );

    let outcome = provisioner.get_license_key();
    if let KeyOutcome::Recovered { cause, .. } = &outcome {
        println!("⚠️  Stored license key was unusable ({}); a new one was generated.", cause);
    }
    let key = outcome.into_key();
    println!("{}", key);

    match provisioner.register(&key).await {
        RegistrationOutcome::RegisteredRestartRequired => {
            println!("🔁 License registered. Please restart the backend.");
        }
        RegistrationOutcome::AlreadyRegistered => println!("✅ License already registered"),
        RegistrationOutcome::Failed(_) => println!("⚠️  License registration failed (see log)"),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_invalid_registry_url_still_yields_a_key() {
        let tmp = tempdir().unwrap();
        let state_dir = StateDir::new(tmp.path());
        let env: EnvSnapshot = [("BOT_TOKEN", "bot-token"), ("LOOPKEY_REGISTRY_URL", "not a url")]
            .into_iter()
            .collect();

        run_license_key(env, state_dir.clone()).await.unwrap();

        let key = LicenseKeyStore::new(state_dir.license_key_path()).read().unwrap();
        assert!(key.is_some());
    }

    #[tokio::test]
    async fn test_missing_bot_token_is_an_error() {
        let tmp = tempdir().unwrap();
        let err = run_license_key(EnvSnapshot::default(), StateDir::new(tmp.path()))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("BOT_TOKEN"));
    }
}
