use anyhow::Result;

use crate::license::LicenseKeyStore;
use crate::state::{read_json, CacheBackendRecord, StateDir, TokenStore};

pub fn run_status(state_dir: StateDir) -> Result<()> {
    println!("State directory: {}", state_dir.path().display());
    if !state_dir.path().is_dir() {
        println!("❌ Not initialised. Run 'bootguard check' first.");
        return Ok(());
    }

    match LicenseKeyStore::new(state_dir.license_key_path()).read() {
        Ok(Some(key)) => println!("✅ License key: {}", mask(&key)),
        Ok(None) => println!("❌ No license key"),
        Err(e) => println!("⚠️  License key unreadable: {}", e),
    }

    match read_json::<CacheBackendRecord>(&state_dir.cache_record_path()) {
        Ok(Some(record)) => {
            println!("✅ Known cache backends: {}", record.known_urls().len());
            for url in record.known_urls() {
                println!("   - {}", url);
            }
        }
        Ok(None) => println!("   No cache backend recorded"),
        Err(e) => println!("⚠️  Cache backend record unreadable: {}", e),
    }

    match read_json::<TokenStore>(&state_dir.token_store_path()) {
        Ok(Some(tokens)) if tokens.is_empty() => println!("✅ Token store: empty"),
        Ok(Some(tokens)) => println!(
            "✅ Token store: {} access, {} refresh, {} client",
            tokens.access_tokens.len(),
            tokens.refresh_tokens.len(),
            tokens.client_tokens.len()
        ),
        Ok(None) => println!("❌ No token store"),
        Err(e) => println!("⚠️  Token store unreadable: {}", e),
    }

    Ok(())
}

/// Show only the first and last few characters of a key.
fn mask(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}…{}", head, tail)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask() {
        assert_eq!(mask("short"), "*****");
        assert_eq!(mask("abcdefghijkl"), "abcd…ijkl");
    }
}
