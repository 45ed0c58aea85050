//! Share link composition and parsing.
//!
//! Link shapes:
//! - single item: `<base>?path=<remote path>&c=<token>`
//! - gallery:     `<base>?type=gallery&c=<token>`
//! - either, with the default password embedded: `...&pm=1&pk=<obfuscated>`

use url::Url;

use super::codec::{ShareBundle, ShareBundleCodec};
use super::passwordless::{self, KEY_PARAM, MODE_ENABLED, MODE_PARAM};
use super::ShareError;
use crate::config::ShareSettings;
use crate::providers::{normalize_path, ConnectionConfig};

const PATH_PARAM: &str = "path";
const TYPE_PARAM: &str = "type";
const TOKEN_PARAM: &str = "c";
const GALLERY_TYPE: &str = "gallery";

/// What a link opens
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShareTarget {
    /// One file; the path travels in the URL
    Single(String),
    /// Several files; the paths travel inside the token
    Gallery,
}

pub struct ShareLinkComposer {
    base_url: Url,
    settings: ShareSettings,
}

impl ShareLinkComposer {
    pub fn new(base_url: &str, settings: ShareSettings) -> Result<Self, ShareError> {
        let base_url = Url::parse(base_url.trim())
            .map_err(|e| ShareError::InvalidLink(format!("bad base URL: {}", e)))?;
        Ok(Self { base_url, settings })
    }

    /// Use the base URL stored in the share settings
    pub fn from_settings(settings: &ShareSettings) -> Result<Self, ShareError> {
        let base = settings
            .base_url
            .as_deref()
            .ok_or_else(|| ShareError::InvalidLink("no share base URL configured".to_string()))?;
        Self::new(base, settings.clone())
    }

    /// Build the final URL for an already encoded token.
    ///
    /// `password_used` is the password the token was locked with; it is
    /// embedded only when it is the configured default and passwordless mode is on.
    pub fn compose(&self, target: &ShareTarget, token: &str, password_used: &str) -> String {
        let mut url = self.base_url.clone();
        {
            let mut query = url.query_pairs_mut();
            match target {
                ShareTarget::Single(path) => {
                    query.append_pair(PATH_PARAM, &normalize_path(path));
                }
                ShareTarget::Gallery => {
                    query.append_pair(TYPE_PARAM, GALLERY_TYPE);
                }
            }
            query.append_pair(TOKEN_PARAM, token);
            if passwordless::allowed_for(&self.settings, password_used) {
                query.append_pair(MODE_PARAM, MODE_ENABLED);
                query.append_pair(KEY_PARAM, &passwordless::obfuscate(password_used));
            }
        }
        url.into()
    }

    /// Bundle, lock and compose in one step.
    ///
    /// One path gives a single-item link; more give a gallery link.
    pub fn share_link(
        &self,
        codec: &ShareBundleCodec,
        connection: &ConnectionConfig,
        paths: &[String],
        title: Option<String>,
        password: &str,
    ) -> Result<String, ShareError> {
        let (bundle, target) = match paths {
            [] => return Err(ShareError::Encode("nothing to share".to_string())),
            [single] => (ShareBundle::single(connection.clone()), ShareTarget::Single(single.clone())),
            many => (
                ShareBundle::gallery(connection.clone(), many.to_vec(), title),
                ShareTarget::Gallery,
            ),
        };
        let token = codec.encode(&bundle, password)?;
        tracing::info!("[SHARE] created {} link", if bundle.is_gallery() { "gallery" } else { "single-item" });
        Ok(self.compose(&target, &token, password))
    }
}

/// A share link taken apart
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedLink {
    pub target: ShareTarget,
    pub token: String,
    /// Password recovered from passwordless parameters, if present and valid
    pub embedded_password: Option<String>,
}

/// Parse a full URL, or a bare query string starting with `?`
pub fn parse_link(link: &str) -> Result<ParsedLink, ShareError> {
    let link = link.trim();
    let url = if link.starts_with('?') {
        Url::parse(&format!("http://localhost/{}", link))
    } else {
        Url::parse(link)
    }
    .map_err(|e| ShareError::InvalidLink(e.to_string()))?;

    let mut path = None;
    let mut link_type = None;
    let mut token = None;
    let mut mode = None;
    let mut key = None;
    for (name, value) in url.query_pairs() {
        match name.as_ref() {
            PATH_PARAM => path = Some(value.into_owned()),
            TYPE_PARAM => link_type = Some(value.into_owned()),
            TOKEN_PARAM => token = Some(value.into_owned()),
            MODE_PARAM => mode = Some(value.into_owned()),
            KEY_PARAM => key = Some(value.into_owned()),
            _ => {}
        }
    }

    let token = token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ShareError::InvalidLink("missing token parameter".to_string()))?;

    let target = if link_type.as_deref() == Some(GALLERY_TYPE) {
        ShareTarget::Gallery
    } else {
        match path.filter(|p| !p.is_empty()) {
            Some(p) => ShareTarget::Single(normalize_path(&p)),
            None => return Err(ShareError::InvalidLink("missing path parameter".to_string())),
        }
    };

    let embedded_password = if mode.as_deref() == Some(MODE_ENABLED) {
        key.as_deref().and_then(passwordless::reveal)
    } else {
        None
    };

    Ok(ParsedLink { target, token, embedded_password })
}
