//! Credential file and persisted session token.
//!
//! The credential file is read as YAML (`Username: x` / `Password: y` is
//! valid YAML); files YAML cannot digest are scanned line by line for the
//! same keys. The token file is a single opaque slot overwritten on every
//! successful (re-)authentication.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use super::error::ApiError;

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    pub fn load(path: &Path) -> Result<Self, ApiError> {
        if !path.exists() {
            return Err(ApiError::Credentials(format!(
                "no credentials at {}",
                path.display()
            )));
        }
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ApiError::io("failed to read credential file", path, e))?;
        Self::parse(&raw).map_err(|e| match e {
            ApiError::Credentials(msg) => {
                ApiError::Credentials(format!("{msg} in {}", path.display()))
            }
            other => other,
        })
    }

    pub fn parse(raw: &str) -> Result<Self, ApiError> {
        let fields = parse_yaml(raw).unwrap_or_else(|| parse_lines(raw));
        let pick = |key: &str| {
            fields
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(key))
                .map(|(_, v)| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        match (pick("username"), pick("password")) {
            (Some(username), Some(password)) => Ok(Credentials { username, password }),
            _ => Err(ApiError::Credentials(
                "can't parse username/password".into(),
            )),
        }
    }

    /// Write a credential file unless one already exists. Returns whether
    /// a file was written.
    pub fn write_if_absent(&self, path: &Path) -> Result<bool, ApiError> {
        if path.exists() {
            return Ok(false);
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| ApiError::io("failed to create credential directory", parent, e))?;
        }
        let text = format!("Username: {}\nPassword: {}\n", self.username, self.password);
        std::fs::write(path, text)
            .map_err(|e| ApiError::io("failed to write credential file", path, e))?;
        Ok(true)
    }
}

fn parse_yaml(raw: &str) -> Option<Vec<(String, String)>> {
    let map: BTreeMap<String, serde_yaml::Value> = serde_yaml::from_str(raw).ok()?;
    let fields: Vec<(String, String)> = map
        .into_iter()
        .filter_map(|(k, v)| {
            let text = match v {
                serde_yaml::Value::String(s) => s,
                serde_yaml::Value::Number(n) => n.to_string(),
                serde_yaml::Value::Bool(b) => b.to_string(),
                _ => return None,
            };
            Some((k, text))
        })
        .collect();
    (!fields.is_empty()).then_some(fields)
}

fn parse_lines(raw: &str) -> Vec<(String, String)> {
    raw.lines()
        .filter_map(|line| line.trim().split_once(':'))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect()
}

/// Single-slot persisted session token. `None` path = in-memory only.
#[derive(Debug, Clone, Default)]
pub struct TokenStore {
    path: Option<PathBuf>,
}

impl TokenStore {
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    pub fn ephemeral() -> Self {
        Self { path: None }
    }

    pub fn load(&self) -> Result<Option<String>, ApiError> {
        let Some(path) = &self.path else {
            return Ok(None);
        };
        match std::fs::read_to_string(path) {
            Ok(s) => Ok(Some(s.trim().to_string()).filter(|t| !t.is_empty())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ApiError::io("failed to read session file", path, e)),
        }
    }

    pub fn save(&self, token: &str) -> Result<(), ApiError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        std::fs::write(path, token).map_err(|e| ApiError::io("failed to write session file", path, e))
    }

    pub fn clear(&self) -> Result<(), ApiError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        match std::fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ApiError::io("failed to remove session file", path, e)),
        }
    }
}
