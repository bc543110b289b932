//! Bootstrap guard.
//!
//! Runs once at process start, before any listener is bound or bot command
//! registered:
//! 1. ensure the state directory exists
//! 2. enforce the minimum runtime version
//! 3. reconcile the cache backend record (only when `USE_REDIS=true`)
//! 4. ensure the token store exists
//! 5. validate the configuration
//!
//! The first failing step ends the run. Failures are logged and turned into a
//! `false` readiness result; nothing is raised to the caller.

mod runtime;

pub use runtime::{RuntimeVersion, MIN_RUNTIME_VERSION};

use tracing::{debug, error, info, warn};

use crate::config::{self, ConfigError, Configuration, EnvSnapshot};
use crate::state::{
    CacheBackendReconciler, FileTokenCache, Reconciliation, StateDir, StateError, TokenCache,
    TokenStoreInitializer,
};

/// Fatal guard failures
#[derive(Debug, thiserror::Error)]
pub enum GuardError {
    #[error("Your runtime version is too old, please update to at least {required}. Your version: {found}")]
    UnsupportedRuntime {
        found: String,
        required: RuntimeVersion,
    },
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    State(#[from] StateError),
}

/// Guard steps, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    StateDir,
    Runtime,
    CacheBackend,
    TokenStore,
    Config,
}

impl Step {
    pub const ALL: [Step; 5] = [
        Step::StateDir,
        Step::Runtime,
        Step::CacheBackend,
        Step::TokenStore,
        Step::Config,
    ];

    fn index(self) -> usize {
        self as usize
    }

    pub fn label(self) -> &'static str {
        match self {
            Step::StateDir => "state directory",
            Step::Runtime => "runtime version",
            Step::CacheBackend => "cache backend",
            Step::TokenStore => "token store",
            Step::Config => "configuration",
        }
    }
}

/// State of each guard step
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum StepStatus {
    #[default]
    NotStarted,
    Success,
    Skipped,
    Failed(String),
}

/// Orchestrates the startup checks and holds the validated configuration.
///
/// # Example
/// ```ignore
/// let mut guard = BootstrapGuard::new(EnvSnapshot::from_process(), StateDir::new("state"));
/// if !guard.check_readiness() {
///     std::process::exit(1);
/// }
/// let config = guard.into_configuration();
/// ```
pub struct BootstrapGuard {
    env: EnvSnapshot,
    state_dir: StateDir,
    runtime_version: Option<RuntimeVersion>,
    token_cache: Box<dyn TokenCache>,
    statuses: [StepStatus; 5],
    readiness: Option<bool>,
    configuration: Option<Configuration>,
}

impl BootstrapGuard {
    /// Guard for the running binary, resetting tokens in `tokens.json`.
    pub fn new(env: EnvSnapshot, state_dir: StateDir) -> Self {
        Self::with_runtime_version(env, state_dir, RuntimeVersion::current())
    }

    /// Guard that checks `runtime_version` against the floor instead of the
    /// compiler that built this binary.
    pub fn with_runtime_version(
        env: EnvSnapshot,
        state_dir: StateDir,
        runtime_version: Option<RuntimeVersion>,
    ) -> Self {
        let token_cache = Box::new(FileTokenCache::new(state_dir.token_store_path()));
        Self {
            env,
            state_dir,
            runtime_version,
            token_cache,
            statuses: Default::default(),
            readiness: None,
            configuration: None,
        }
    }

    /// Run every step and report whether startup may continue.
    ///
    /// Meant to be called once; later calls return the first result.
    pub fn check_readiness(&mut self) -> bool {
        if let Some(ready) = self.readiness {
            warn!("Bootstrap guard already ran; reusing its result");
            return ready;
        }

        let ready = match self.run_steps() {
            Ok(configuration) => {
                info!("✅ Bootstrap checks passed for {}", configuration.name);
                self.configuration = Some(configuration);
                true
            }
            Err(e) => {
                error!("❌ Bootstrap guard failed: {}", e);
                false
            }
        };
        self.readiness = Some(ready);
        ready
    }

    fn run_steps(&mut self) -> Result<Configuration, GuardError> {
        let created = self.record(Step::StateDir, |g| Ok(g.state_dir.ensure()?))?;
        if created {
            info!("Created state directory {:?}", self.state_dir.path());
        }

        self.record(Step::Runtime, |g| g.ensure_runtime())?;

        match config::external_cache_endpoint(&self.env) {
            Some(endpoint) => {
                let outcome = self.record(Step::CacheBackend, |g| {
                    let reconciler = CacheBackendReconciler::new(
                        g.state_dir.cache_record_path(),
                        g.token_cache.as_ref(),
                    );
                    Ok(reconciler.reconcile(&endpoint)?)
                })?;
                if outcome == Reconciliation::NewEndpoint {
                    info!("Token store reset for new cache backend");
                }
            }
            None => {
                debug!("External cache disabled, skipping cache backend check");
                self.statuses[Step::CacheBackend.index()] = StepStatus::Skipped;
            }
        }

        self.record(Step::TokenStore, |g| {
            Ok(TokenStoreInitializer::new(g.state_dir.token_store_path()).ensure()?)
        })?;

        self.record(Step::Config, |g| Ok(config::validate(&g.env)?))
    }

    /// Run one step, recording its status.
    fn record<T>(
        &mut self,
        step: Step,
        run: impl FnOnce(&Self) -> Result<T, GuardError>,
    ) -> Result<T, GuardError> {
        debug!("Checking {}...", step.label());
        let result = run(self);
        self.statuses[step.index()] = match &result {
            Ok(_) => StepStatus::Success,
            Err(e) => StepStatus::Failed(e.to_string()),
        };
        result
    }

    fn ensure_runtime(&self) -> Result<(), GuardError> {
        match self.runtime_version {
            Some(version) if version >= MIN_RUNTIME_VERSION => {
                debug!("Runtime version {} meets {}", version, MIN_RUNTIME_VERSION);
                Ok(())
            }
            found => Err(GuardError::UnsupportedRuntime {
                found: found.map_or_else(|| "unknown".to_string(), |v| v.to_string()),
                required: MIN_RUNTIME_VERSION,
            }),
        }
    }

    pub fn status(&self, step: Step) -> &StepStatus {
        &self.statuses[step.index()]
    }

    /// The validated configuration, once `check_readiness` has returned `true`.
    pub fn into_configuration(self) -> Option<Configuration> {
        self.configuration
    }
}
