//! Runtime settings: CLI flag > environment variable > built-in default.
//!
//! resolve(flags, env) -> Settings
//! parse_base_url validates the API root (http/https only).

use anyhow::{Context, Result, bail};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://game.spacemolt.com/api/v1";
pub const DEFAULT_SESSION_FILE: &str = "/tmp/sm-session";
pub const DEFAULT_CRED_FILE: &str = "./me/credentials.txt";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_ACTION_INTERVAL_SECS: u64 = 11;

pub const ENV_BASE_URL: &str = "SM_API_BASE";
pub const ENV_SESSION_FILE: &str = "SM_SESSION_FILE";
pub const ENV_CRED_FILE: &str = "SM_CRED_FILE";
pub const ENV_TIMEOUT: &str = "SM_TIMEOUT";
pub const ENV_ACTION_INTERVAL: &str = "SM_ACTION_INTERVAL";

/// Values given explicitly on the command line.
#[derive(Debug, Clone, Default)]
pub struct Flags {
    pub base_url: Option<String>,
    pub session_file: Option<PathBuf>,
    pub cred_file: Option<PathBuf>,
    pub timeout: Option<u64>,
    pub action_interval: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub base_url: Url,
    pub session_file: PathBuf,
    pub cred_file: PathBuf,
    pub timeout: Duration,
    pub action_interval: Duration,
}

/// Resolve every setting. `env` is the variable lookup (blank values
/// count as unset).
pub fn resolve(flags: &Flags, env: impl Fn(&str) -> Option<String>) -> Result<Settings> {
    let lookup = |key: &str| env(key).filter(|v| !v.trim().is_empty());

    let base_raw = flags
        .base_url
        .clone()
        .or_else(|| lookup(ENV_BASE_URL))
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

    let session_file = flags
        .session_file
        .clone()
        .or_else(|| lookup(ENV_SESSION_FILE).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SESSION_FILE));

    let cred_file = flags
        .cred_file
        .clone()
        .or_else(|| lookup(ENV_CRED_FILE).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CRED_FILE));

    let timeout = match flags.timeout {
        Some(secs) => secs,
        None => env_secs(lookup(ENV_TIMEOUT), ENV_TIMEOUT)?.unwrap_or(DEFAULT_TIMEOUT_SECS),
    };
    if timeout == 0 {
        bail!("timeout must be at least one second");
    }

    let action_interval = match flags.action_interval {
        Some(secs) => secs,
        None => env_secs(lookup(ENV_ACTION_INTERVAL), ENV_ACTION_INTERVAL)?
            .unwrap_or(DEFAULT_ACTION_INTERVAL_SECS),
    };

    Ok(Settings {
        base_url: parse_base_url(&base_raw)?,
        session_file,
        cred_file,
        timeout: Duration::from_secs(timeout),
        action_interval: Duration::from_secs(action_interval),
    })
}

fn env_secs(raw: Option<String>, name: &str) -> Result<Option<u64>> {
    raw.map(|v| {
        v.trim()
            .parse::<u64>()
            .with_context(|| format!("{name} must be a whole number of seconds, got '{v}'"))
    })
    .transpose()
}

/// Parse and check the API root URL.
pub fn parse_base_url(raw: &str) -> Result<Url> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        bail!("base URL is empty");
    }
    let url = Url::parse(trimmed).with_context(|| format!("invalid base URL '{trimmed}'"))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => bail!("unsupported base URL scheme '{other}' (expected http or https)"),
    }
}
