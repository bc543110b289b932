use std::env;
use std::process::Command;

/// Record the compiler release (`rustc 1.80.1 (...)` -> `1.80.1`) for the
/// runtime floor check.
fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=RUSTC");

    let rustc = env::var("RUSTC").unwrap_or_else(|_| "rustc".to_string());
    let Ok(output) = Command::new(rustc).arg("--version").output() else {
        println!("cargo:warning=could not run rustc --version");
        return;
    };
    let version = String::from_utf8_lossy(&output.stdout);
    if let Some(release) = version.split_whitespace().nth(1) {
        println!("cargo:rustc-env=BOOTGUARD_RUSTC_VERSION={}", release);
    }
}
