//! Link consumer.
//!
//! Opening a share link is a small state machine, independent of how the
//! prompt is drawn:
//!
//! ```text
//!            passwordless params decode
//!   new ───────────────────────────────────────► Unlocked
//!    │                                              ▲
//!    ▼            prompt            submit(ok)      │
//!  Locked ───────────────► Prompting ───────────────┘
//!    │                      │    ▲
//!    │ cancel        cancel │    │ submit(wrong): stay, with inline error
//!    ▼                      ▼    │
//!  Failed ◄─────────────────┘────┘
//! ```
//!
//! A link whose format version is newer than this build goes straight to
//! `Failed` without prompting.

use tracing::{info, warn};

use super::codec::{ShareBundle, ShareBundleCodec};
use super::link::{parse_link, ParsedLink, ShareTarget};
use super::ShareError;
use crate::providers::{split_path, AListClient, RemoteClient, RemoteError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnlockState {
    /// Waiting for the caller to ask for a password
    Locked,
    /// Password prompt open; `error` is shown inline after a failed attempt
    Prompting { error: Option<String> },
    Unlocked(ShareBundle),
    Failed(String),
}

/// One item of an opened share
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedItem {
    pub path: String,
    pub name: String,
    pub direct_url: Option<String>,
    pub error: Option<String>,
}

pub struct LinkConsumer {
    link: ParsedLink,
    codec: ShareBundleCodec,
    state: UnlockState,
}

impl LinkConsumer {
    /// Parse `link` and try the passwordless parameters, if any
    pub fn open(link: &str, codec: ShareBundleCodec) -> Result<Self, ShareError> {
        let link = parse_link(link)?;
        Ok(Self::from_parsed(link, codec))
    }

    pub fn from_parsed(link: ParsedLink, codec: ShareBundleCodec) -> Self {
        let state = match codec.inspect(&link.token) {
            Err(e) => UnlockState::Failed(e.to_string()),
            Ok(_) => match link.embedded_password.as_deref() {
                Some(password) => match codec.decode(&link.token, password) {
                    Ok(bundle) => {
                        info!("[SHARE] link unlocked with embedded default password");
                        UnlockState::Unlocked(bundle)
                    }
                    Err(_) => {
                        warn!("[SHARE] embedded password did not unlock link, prompting instead");
                        UnlockState::Locked
                    }
                },
                None => UnlockState::Locked,
            },
        };
        Self { link, codec, state }
    }

    pub fn state(&self) -> &UnlockState {
        &self.state
    }

    pub fn target(&self) -> &ShareTarget {
        &self.link.target
    }

    pub fn is_unlocked(&self) -> bool {
        matches!(self.state, UnlockState::Unlocked(_))
    }

    pub fn bundle(&self) -> Option<&ShareBundle> {
        match &self.state {
            UnlockState::Unlocked(bundle) => Some(bundle),
            _ => None,
        }
    }

    /// Locked -> Prompting. No effect in any other state.
    pub fn prompt(&mut self) -> &UnlockState {
        if self.state == UnlockState::Locked {
            self.state = UnlockState::Prompting { error: None };
        }
        &self.state
    }

    /// Try a password. Valid from Locked or Prompting; a failure keeps the
    /// prompt open with an inline error.
    pub fn submit(&mut self, password: &str) -> &UnlockState {
        if !matches!(self.state, UnlockState::Locked | UnlockState::Prompting { .. }) {
            return &self.state;
        }
        if password.is_empty() {
            self.state = UnlockState::Prompting { error: Some("Enter the share password".to_string()) };
            return &self.state;
        }
        self.state = match self.codec.decode(&self.link.token, password) {
            Ok(bundle) => UnlockState::Unlocked(bundle),
            Err(e) => UnlockState::Prompting { error: Some(e.to_string()) },
        };
        &self.state
    }

    /// Abandon the prompt
    pub fn cancel(&mut self) -> &UnlockState {
        if matches!(self.state, UnlockState::Locked | UnlockState::Prompting { .. }) {
            self.state = UnlockState::Failed("Cancelled".to_string());
        }
        &self.state
    }

    /// Remote paths this share refers to, once unlocked
    pub fn item_paths(&self) -> Vec<String> {
        match (&self.link.target, self.bundle()) {
            (_, None) => Vec::new(),
            (ShareTarget::Single(path), Some(_)) => vec![path.clone()],
            (ShareTarget::Gallery, Some(bundle)) => bundle.image_paths.clone().unwrap_or_default(),
        }
    }

    /// Build a client for the backend recorded in the bundle
    pub fn hydrate(&self) -> Result<AListClient, RemoteError> {
        let bundle = self
            .bundle()
            .ok_or_else(|| RemoteError::InvalidConfig("Share is still locked".to_string()))?;
        AListClient::new(bundle.connection.clone())
    }

    /// Resolve every item to a direct URL, one request per item.
    ///
    /// Per-item failures are reported on the item; the rest still resolve.
    pub async fn fetch_items(&self, client: &dyn RemoteClient) -> Vec<SharedItem> {
        let mut items = Vec::new();
        for path in self.item_paths() {
            let (_, name) = split_path(&path);
            let item = match client.get_direct_link(&path, None).await {
                Ok(url) => SharedItem { path, name, direct_url: Some(url), error: None },
                Err(e) => {
                    warn!("[SHARE] could not resolve {}: {}", path, e);
                    SharedItem { path, name, direct_url: None, error: Some(e.to_string()) }
                }
            };
            items.push(item);
        }
        items
    }
}
