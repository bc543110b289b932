use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::derive::{KeyDeriver, TokenSeededDeriver};
use super::registry::{LicenseRegistrar, RegistrationOutcome};
use super::store::LicenseKeyStore;
use crate::state::StateError;

const REGISTRATION_FAILED_HINT: &str = "You can safely ignore this error if you haven't purchased anything. Loopkey registration failed. Please register with the Zero Point bot on the NexusFN discord with /register.";

/// How a license key was obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyOutcome {
    /// Read from `loopkey.json`.
    Loaded(String),
    /// Newly generated because no usable key was stored.
    Generated(String),
    /// Newly generated after the stored state could not be read or written.
    Recovered { key: String, cause: String },
}

impl KeyOutcome {
    pub fn key(&self) -> &str {
        match self {
            KeyOutcome::Loaded(key)
            | KeyOutcome::Generated(key)
            | KeyOutcome::Recovered { key, .. } => key,
        }
    }

    pub fn into_key(self) -> String {
        match self {
            KeyOutcome::Loaded(key)
            | KeyOutcome::Generated(key)
            | KeyOutcome::Recovered { key, .. } => key,
        }
    }

    pub fn is_recovered(&self) -> bool {
        matches!(self, KeyOutcome::Recovered { .. })
    }

    pub fn describe(&self) -> &'static str {
        match self {
            KeyOutcome::Loaded(_) => "loaded",
            KeyOutcome::Generated(_) => "generated",
            KeyOutcome::Recovered { .. } => "regenerated after recovery",
        }
    }
}

/// A key ready for use, plus the in-flight registration for it.
pub struct Provisioned {
    pub key: KeyOutcome,
    pub registration: JoinHandle<RegistrationOutcome>,
}

/// Get-or-create access to the license key, with registration on every read.
pub struct LicenseKeyProvisioner<R, D = TokenSeededDeriver> {
    store: LicenseKeyStore,
    bot_token: String,
    registrar: Arc<R>,
    deriver: D,
}

impl<R: LicenseRegistrar> LicenseKeyProvisioner<R> {
    pub fn new(store: LicenseKeyStore, bot_token: impl Into<String>, registrar: Arc<R>) -> Self {
        Self::with_deriver(store, bot_token, registrar, TokenSeededDeriver)
    }
}

impl<R: LicenseRegistrar, D: KeyDeriver> LicenseKeyProvisioner<R, D> {
    /// Provisioner that derives new keys with `deriver`.
    pub fn with_deriver(
        store: LicenseKeyStore,
        bot_token: impl Into<String>,
        registrar: Arc<R>,
        deriver: D,
    ) -> Self {
        Self {
            store,
            bot_token: bot_token.into(),
            registrar,
            deriver,
        }
    }

    pub fn store(&self) -> &LicenseKeyStore {
        &self.store
    }

    /// Return the deployment's license key, creating it if needed.
    ///
    /// Never fails: if the stored state cannot be read or written, a fresh key
    /// is generated (and persisted if at all possible) and reported as
    /// [`KeyOutcome::Recovered`].
    pub fn get_license_key(&self) -> KeyOutcome {
        match self.load_or_generate() {
            Ok(outcome) => outcome,
            Err(cause) => {
                warn!("Failed to load license key, generating a new one: {}", cause);
                let key = self.deriver.derive(&self.bot_token);
                if let Err(e) = self.store.write(&key) {
                    error!("Failed to persist regenerated license key: {}", e);
                }
                KeyOutcome::Recovered {
                    key,
                    cause: cause.to_string(),
                }
            }
        }
    }

    fn load_or_generate(&self) -> Result<KeyOutcome, StateError> {
        if let Some(key) = self.store.read()? {
            debug!("License key loaded from {:?}", self.store.path());
            return Ok(KeyOutcome::Loaded(key));
        }

        let key = self.deriver.derive(&self.bot_token);
        self.store.write(&key)?;
        info!("Generated new license key");
        Ok(KeyOutcome::Generated(key))
    }

    /// Register a key with the licensing service and log the outcome.
    pub async fn register(&self, key: &str) -> RegistrationOutcome {
        register_and_log(self.registrar.as_ref(), key).await
    }

    /// Get the key and start registering it in the background.
    ///
    /// Must be called from within a Tokio runtime. The key is available
    /// immediately; the registration handle resolves independently.
    pub fn provision(&self) -> Provisioned {
        let key = self.get_license_key();
        let registrar = Arc::clone(&self.registrar);
        let to_register = key.key().to_string();

        let registration =
            tokio::spawn(async move { register_and_log(registrar.as_ref(), &to_register).await });

        Provisioned { key, registration }
    }
}

async fn register_and_log<R: LicenseRegistrar>(registrar: &R, key: &str) -> RegistrationOutcome {
    let outcome = registrar.register(key).await;
    match &outcome {
        RegistrationOutcome::RegisteredRestartRequired => {
            info!("Loopkey registration successful. Please restart the backend.");
        }
        RegistrationOutcome::AlreadyRegistered => {
            debug!("Loopkey already registered. Continuing...");
        }
        RegistrationOutcome::Failed(reason) => {
            warn!("{}", REGISTRATION_FAILED_HINT);
            debug!("Registration failure: {}", reason);
        }
    }
    outcome
}
