use std::fmt;

/// Oldest toolchain the guard accepts.
pub const MIN_RUNTIME_VERSION: RuntimeVersion = RuntimeVersion::new(1, 75);

/// A `major.minor` version; patch levels are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RuntimeVersion {
    major: u32,
    minor: u32,
}

impl RuntimeVersion {
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    /// Parse `1.75`, `1.75.0`, or `v1.75.0`.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        let raw = raw.strip_prefix('v').unwrap_or(raw);
        let mut parts = raw.split('.');
        let major = parts.next()?.parse().ok()?;
        let minor = match parts.next() {
            Some(minor) => minor.parse().ok()?,
            None => 0,
        };
        Some(Self::new(major, minor))
    }

    /// The rustc release that compiled this binary, as recorded by the build
    /// script. `None` when the build could not determine it.
    pub fn current() -> Option<Self> {
        option_env!("BOOTGUARD_RUSTC_VERSION").and_then(Self::parse)
    }
}

impl fmt::Display for RuntimeVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}
