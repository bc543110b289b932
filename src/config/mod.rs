//! Runtime configuration for the backend.
//!
//! The configuration is read once at startup from the process environment
//! (after `.env` is loaded), validated as a whole, and then passed by value to
//! whatever needs it. Nothing here touches global state: validation works on an
//! [`EnvSnapshot`] so it can be exercised without mutating the process env.

mod env;
mod validation;

pub use env::EnvSnapshot;
pub use validation::{external_cache_endpoint, is_dev, validate, ConfigError, Configuration};
