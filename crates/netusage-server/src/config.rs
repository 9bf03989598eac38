use std::env;
use std::path::PathBuf;

pub const DEFAULT_BIND: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8001;
pub const DEFAULT_ARCHIVE_DIR: &str = "files/archive";

/// Server settings read from `NETUSAGE_*` environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    /// Directory holding rotated snapshot files.
    pub archive_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            port: DEFAULT_PORT,
            archive_dir: PathBuf::from(DEFAULT_ARCHIVE_DIR),
        }
    }
}

fn lookup_str(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: &str) -> String {
    lookup(name)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn lookup_u16(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: u16) -> u16 {
    lookup(name)
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build from any variable source; unset, blank or unparsable values fall
    /// back to the defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            bind: lookup_str(&lookup, "NETUSAGE_BIND", DEFAULT_BIND),
            port: lookup_u16(&lookup, "NETUSAGE_PORT", DEFAULT_PORT),
            archive_dir: PathBuf::from(lookup_str(
                &lookup,
                "NETUSAGE_ARCHIVE_DIR",
                DEFAULT_ARCHIVE_DIR,
            )),
        }
    }
}
