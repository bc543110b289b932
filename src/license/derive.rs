use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Produces a fresh license key for a deployment.
pub trait KeyDeriver: Send + Sync {
    fn derive(&self, bot_token: &str) -> String;
}

/// Derives keys from SHA-256 over the bot token and 32 random bytes.
///
/// Seeding with the token ties the key to the bot it was issued for; the
/// random salt makes every derivation unique.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenSeededDeriver;

impl KeyDeriver for TokenSeededDeriver {
    fn derive(&self, bot_token: &str) -> String {
        let mut salt = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut salt);

        let mut hasher = Sha256::new();
        hasher.update(bot_token.as_bytes());
        hasher.update(salt);
        URL_SAFE_NO_PAD.encode(hasher.finalize())
    }
}
