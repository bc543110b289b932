//! License key ("loopkey") provisioning.
//!
//! The key identifies this deployment to the remote licensing service. It is
//! created on first use, kept in `loopkey.json`, and (re-)registered with the
//! registry on every read; registration is idempotent on the server side.

mod derive;
mod provisioner;
mod registry;
mod store;

pub use provisioner::{KeyOutcome, LicenseKeyProvisioner};
pub use registry::{RegistrationOutcome, RegistryClient};
pub use store::LicenseKeyStore;
