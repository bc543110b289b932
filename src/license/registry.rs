//! Client for the remote license registry.

use std::future::Future;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;
use uuid::Uuid;

use crate::config::EnvSnapshot;

/// Default registration endpoint
pub const DEFAULT_REGISTRY_URL: &str = "http://api.nexusfn.net/api/v2/loopkey/register";

/// Environment variable overriding the registration endpoint
pub const REGISTRY_URL_ENV: &str = "LOOPKEY_REGISTRY_URL";

/// Default request timeout in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Error classification the registry uses for a key it already knows
const ALREADY_REGISTERED: &str = "Loopkey already registered";

/// Longest response body quoted back in errors
const MAX_BODY_IN_ERROR: usize = 200;

const DEFAULT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Result of one registration attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationOutcome {
    /// The key was registered by this call. The backend only picks the
    /// license up after a restart; the caller decides how to restart.
    RegisteredRestartRequired,
    /// The registry already knew the key.
    AlreadyRegistered,
    /// Unreachable registry or any rejection other than "already registered".
    Failed(String),
}

impl RegistrationOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, RegistrationOutcome::Failed(_))
    }

    pub fn requires_restart(&self) -> bool {
        matches!(self, RegistrationOutcome::RegisteredRestartRequired)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RegistrationError {
    #[error("registry request to {url} failed: {source}")]
    Transport {
        url: Url,
        #[source]
        source: reqwest::Error,
    },
    #[error("registry returned an unreadable response (HTTP {status}): {body}")]
    Decode { status: u16, body: String },
}

/// Registers license keys with the licensing service.
pub trait LicenseRegistrar: Send + Sync + 'static {
    fn register(&self, key: &str) -> impl Future<Output = RegistrationOutcome> + Send;
}

/// Registry response body
#[derive(Debug, Deserialize)]
struct RegistrationResponse {
    #[serde(default)]
    status: String,
    #[serde(default)]
    error: Option<String>,
}

impl RegistrationResponse {
    fn outcome(self) -> RegistrationOutcome {
        if self.status == "ok" {
            return RegistrationOutcome::RegisteredRestartRequired;
        }
        match self.error {
            Some(error) if error == ALREADY_REGISTERED => RegistrationOutcome::AlreadyRegistered,
            Some(error) => RegistrationOutcome::Failed(error),
            None => RegistrationOutcome::Failed(format!("registry status {:?}", self.status)),
        }
    }
}

/// Where registrations are sent.
struct Endpoint {
    client: Client,
    url: Url,
}

impl Endpoint {
    fn connect(url: &str) -> Result<Self> {
        let url = Url::parse(url).with_context(|| format!("Invalid registry URL: {}", url))?;
        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client, url })
    }
}

/// HTTP registrar: `PUT <registry>` with the key in a `loopkey` header.
///
/// Construction never fails. An unusable registry URL or HTTP client is kept
/// as the reason every registration attempt reports as
/// [`RegistrationOutcome::Failed`].
pub struct RegistryClient {
    endpoint: Result<Endpoint, String>,
    user_agent: String,
}

impl RegistryClient {
    pub fn new(url: &str) -> Self {
        let endpoint = Endpoint::connect(url).map_err(|e| {
            warn!("License registry unavailable, registration will fail: {:#}", e);
            format!("{:#}", e)
        });

        Self {
            endpoint,
            user_agent: format!("bootguard/{}", DEFAULT_VERSION),
        }
    }

    /// Build a client for `LOOPKEY_REGISTRY_URL`, or the default registry.
    pub fn from_env(env: &EnvSnapshot) -> Self {
        Self::new(env.get(REGISTRY_URL_ENV).unwrap_or(DEFAULT_REGISTRY_URL))
    }

    async fn send_registration(
        &self,
        endpoint: &Endpoint,
        key: &str,
    ) -> Result<RegistrationOutcome, RegistrationError> {
        let transport = |source| RegistrationError::Transport {
            url: endpoint.url.clone(),
            source,
        };

        debug!("=== Registry Request ===");
        debug!("URL: {}", endpoint.url);

        let response = endpoint
            .client
            .put(endpoint.url.clone())
            .header("User-Agent", &self.user_agent)
            .header("x-request-id", Uuid::new_v4().to_string())
            .header("loopkey", key)
            .send()
            .await
            .map_err(transport)?;

        // The registry reports rejections in the body, whatever the HTTP status.
        let status = response.status();
        debug!("Status: {}", status);
        let body = response.text().await.map_err(transport)?;

        let parsed: RegistrationResponse =
            serde_json::from_str(&body).map_err(|_| RegistrationError::Decode {
                status: status.as_u16(),
                body: body.chars().take(MAX_BODY_IN_ERROR).collect(),
            })?;
        Ok(parsed.outcome())
    }
}

impl LicenseRegistrar for RegistryClient {
    async fn register(&self, key: &str) -> RegistrationOutcome {
        let endpoint = match &self.endpoint {
            Ok(endpoint) => endpoint,
            Err(reason) => return RegistrationOutcome::Failed(reason.clone()),
        };
        self.send_registration(endpoint, key)
            .await
            .unwrap_or_else(|e| RegistrationOutcome::Failed(e.to_string()))
    }
}
