//! Shared types for the remote file host
//!
//! Connection configuration, listing entries, batch results and the error type
//! returned by every `RemoteClient` call.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Credentials presented to the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AuthDetails {
    /// Pre-issued API token, sent verbatim in the `Authorization` header
    Token { token: String },
    /// Account login, exchanged for a token on first use
    Credentials { username: String, password: String },
}

impl fmt::Display for AuthDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthDetails::Token { .. } => write!(f, "token"),
            AuthDetails::Credentials { username, .. } => write!(f, "login as {}", username),
        }
    }
}

/// Everything needed to talk to one backend
///
/// Travels inside share tokens, so field names are part of the token format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionConfig {
    /// Base URL without trailing slash (e.g. `https://files.example.com`)
    pub server_url: String,
    /// `None` for backends that allow guest access
    #[serde(default)]
    pub auth_details: Option<AuthDetails>,
    /// Origin substituted into direct links (CDN or reverse proxy)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_domain_override: Option<String>,
}

impl ConnectionConfig {
    /// Build a config, trimming any trailing slashes from the server URL
    pub fn new(server_url: &str, auth_details: Option<AuthDetails>) -> Self {
        Self {
            server_url: server_url.trim().trim_end_matches('/').to_string(),
            auth_details,
            custom_domain_override: None,
        }
    }

    pub fn with_custom_domain(mut self, domain: &str) -> Self {
        let domain = domain.trim().trim_end_matches('/');
        self.custom_domain_override = if domain.is_empty() {
            None
        } else {
            Some(domain.to_string())
        };
        self
    }

    /// Check the invariants a decoded or loaded config must hold
    pub fn validate(&self) -> Result<(), RemoteError> {
        if self.server_url.is_empty() {
            return Err(RemoteError::InvalidConfig("Server URL cannot be empty".to_string()));
        }
        if self.server_url.ends_with('/') {
            return Err(RemoteError::InvalidConfig(
                "Server URL must not end with '/'".to_string(),
            ));
        }
        url::Url::parse(&self.server_url)
            .map_err(|e| RemoteError::InvalidConfig(format!("Invalid server URL: {}", e)))?;
        Ok(())
    }
}

/// One entry of a directory listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileInfo {
    pub name: String,
    pub is_dir: bool,
    /// Size in bytes (0 for directories on most storages)
    pub size: u64,
    pub modified: Option<DateTime<Utc>>,
    pub thumbnail_url: Option<String>,
    /// Backend type code (0 unknown, 1 folder, 2 video, 3 audio, 4 text, 5 image)
    pub raw_type: i32,
}

impl FileInfo {
    pub fn file(name: &str, size: u64) -> Self {
        Self {
            name: name.to_string(),
            is_dir: false,
            size,
            modified: None,
            thumbnail_url: None,
            raw_type: 0,
        }
    }

    pub fn directory(name: &str) -> Self {
        Self {
            name: name.to_string(),
            is_dir: true,
            size: 0,
            modified: None,
            thumbnail_url: None,
            raw_type: 1,
        }
    }
}

/// One page of a directory listing
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Listing {
    pub items: Vec<FileInfo>,
    /// Total number of entries in the directory, across all pages
    pub total: u64,
}

/// Outcome of a single path inside a batch operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PathResult {
    pub path: String,
    pub success: bool,
    pub error: Option<String>,
}

/// Aggregated per-path outcome of a batch operation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub results: Vec<PathResult>,
}

impl BatchReport {
    pub fn record(&mut self, path: &str, outcome: Result<(), RemoteError>) {
        let (success, error) = match outcome {
            Ok(()) => (true, None),
            Err(e) => (false, Some(e.to_string())),
        };
        self.results.push(PathResult { path: path.to_string(), success, error });
    }

    pub fn success_count(&self) -> usize {
        self.results.iter().filter(|r| r.success).count()
    }

    pub fn fail_count(&self) -> usize {
        self.results.len() - self.success_count()
    }

    /// True when every path succeeded (vacuously true for an empty batch)
    pub fn success(&self) -> bool {
        self.fail_count() == 0
    }

    /// Some paths succeeded and some failed
    pub fn is_partial_failure(&self) -> bool {
        self.success_count() > 0 && self.fail_count() > 0
    }

    pub fn failures(&self) -> impl Iterator<Item = &PathResult> {
        self.results.iter().filter(|r| !r.success)
    }
}

/// Remote operation errors
#[derive(Error, Debug)]
pub enum RemoteError {
    /// No response at all (DNS, TLS, connection reset, timeout)
    #[error("Transport error: {0}")]
    Transport(String),

    /// The backend's envelope asked for a (directory) password
    #[error("Authentication required: {0}")]
    AuthRequired(String),

    /// HTTP 401/403 on the request itself: the account token or login was refused
    #[error("Account credentials rejected: {0}")]
    AccountRejected(String),

    /// The backend answered with a non-success application code
    #[error("Server error {code}: {message}")]
    Api { code: i64, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RemoteError {
    /// Message text as reported by the backend, used for error classification
    pub fn backend_message(&self) -> Option<&str> {
        match self {
            RemoteError::Api { message, .. } | RemoteError::AuthRequired(message) => Some(message),
            _ => None,
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, RemoteError::Transport(_))
    }
}

/// Join a directory and a child name into an absolute remote path
pub fn join_path(dir: &str, name: &str) -> String {
    let dir = normalize_path(dir);
    let name = name.trim_matches('/');
    if dir == "/" {
        format!("/{}", name)
    } else {
        format!("{}/{}", dir, name)
    }
}

/// Split an absolute path into (parent, name)
pub fn split_path(path: &str) -> (String, String) {
    let path = normalize_path(path);
    match path.rfind('/') {
        Some(0) => ("/".to_string(), path[1..].to_string()),
        Some(idx) => (path[..idx].to_string(), path[idx + 1..].to_string()),
        None => ("/".to_string(), path),
    }
}

/// Normalize a remote path: forward slashes, leading `/`, no trailing `/`,
/// `.` and `..` segments resolved
pub fn normalize_path(path: &str) -> String {
    let normalized = path.trim().replace('\\', "/");
    let mut segments: Vec<&str> = Vec::new();
    for segment in normalized.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                let _ = segments.pop();
            }
            _ => segments.push(segment),
        }
    }

    if segments.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", segments.join("/"))
    }
}
