//! Share token codec.
//!
//! Token layout (before base64url, no padding):
//!
//! ```text
//! [version u8][compression u8][salt 16B][nonce 12B][AES-256-GCM ciphertext + tag]
//! ```
//!
//! Version 1 carries plain JSON and is used for single-item shares. Version 2
//! carries deflated JSON and is used for galleries. The two header bytes are
//! authenticated as associated data. Key = Argon2id(password, salt).

use std::io::{Read, Write};

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};

use super::ShareError;
use crate::crypto::{self, KdfParams, NONCE_LEN, SALT_LEN};
use crate::providers::ConnectionConfig;

pub const FORMAT_V1: u8 = 1;
pub const FORMAT_V2: u8 = 2;
pub const LATEST_FORMAT: u8 = FORMAT_V2;

const COMPRESSION_NONE: u8 = 0;
const COMPRESSION_DEFLATE: u8 = 1;
pub const DEFLATE_TAG: &str = "deflate";

const HEADER_LEN: usize = 2;
/// AES-GCM tag
const TAG_LEN: usize = 16;
/// Upper bound on inflated payload size
const MAX_PLAINTEXT: u64 = 4 * 1024 * 1024;

/// Connection plus what to show, before encryption
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareBundle {
    pub connection: ConnectionConfig,
    /// Present only for gallery shares
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_paths: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Taken from the token header on decode
    #[serde(skip)]
    pub format_version: u8,
    #[serde(skip)]
    pub compression_tag: Option<String>,
}

impl ShareBundle {
    /// Single-item share: the path travels in the link, not the bundle
    pub fn single(connection: ConnectionConfig) -> Self {
        Self::build(connection, None, None)
    }

    pub fn gallery(connection: ConnectionConfig, image_paths: Vec<String>, title: Option<String>) -> Self {
        Self::build(connection, Some(image_paths), title)
    }

    fn build(connection: ConnectionConfig, image_paths: Option<Vec<String>>, title: Option<String>) -> Self {
        let (format_version, compression) = format_for(image_paths.as_deref());
        Self {
            connection,
            image_paths,
            title: title.filter(|t| !t.trim().is_empty()),
            format_version,
            compression_tag: compression_tag(compression).map(str::to_string),
        }
    }

    pub fn is_gallery(&self) -> bool {
        self.image_paths.as_ref().is_some_and(|p| !p.is_empty())
    }
}

/// Header fields readable without the password
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenInfo {
    pub format_version: u8,
    pub compression_tag: Option<String>,
}

fn format_for(image_paths: Option<&[String]>) -> (u8, u8) {
    match image_paths {
        Some(paths) if !paths.is_empty() => (FORMAT_V2, COMPRESSION_DEFLATE),
        _ => (FORMAT_V1, COMPRESSION_NONE),
    }
}

fn compression_tag(id: u8) -> Option<&'static str> {
    match id {
        COMPRESSION_DEFLATE => Some(DEFLATE_TAG),
        _ => None,
    }
}

/// The compression id each known version must carry
fn expected_compression(version: u8) -> Option<u8> {
    match version {
        FORMAT_V1 => Some(COMPRESSION_NONE),
        FORMAT_V2 => Some(COMPRESSION_DEFLATE),
        _ => None,
    }
}

/// Password-locked bundle <-> URL-safe token
#[derive(Debug, Clone)]
pub struct ShareBundleCodec {
    kdf: KdfParams,
    max_version: u8,
}

impl Default for ShareBundleCodec {
    fn default() -> Self {
        Self { kdf: KdfParams::default(), max_version: LATEST_FORMAT }
    }
}

impl ShareBundleCodec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_kdf(mut self, kdf: KdfParams) -> Self {
        self.kdf = kdf;
        self
    }

    /// Restrict decoding to versions up to `max_version`
    pub fn with_max_version(mut self, max_version: u8) -> Self {
        self.max_version = max_version;
        self
    }

    pub fn encode(&self, bundle: &ShareBundle, password: &str) -> Result<String, ShareError> {
        if password.is_empty() {
            return Err(ShareError::Encode("password must not be empty".to_string()));
        }
        let (version, compression) = format_for(bundle.image_paths.as_deref());

        let json = serde_json::to_vec(bundle).map_err(|e| ShareError::Encode(e.to_string()))?;
        let plaintext = if compression == COMPRESSION_DEFLATE {
            let mut encoder = DeflateEncoder::new(Vec::new(), Compression::best());
            encoder.write_all(&json).map_err(|e| ShareError::Encode(e.to_string()))?;
            encoder.finish().map_err(|e| ShareError::Encode(e.to_string()))?
        } else {
            json
        };

        let header = [version, compression];
        let salt = crypto::random_bytes(SALT_LEN);
        let nonce = crypto::random_bytes(NONCE_LEN);
        let key = crypto::derive_key(password, &salt, &self.kdf).map_err(ShareError::Encode)?;
        let ciphertext =
            crypto::encrypt_aes_gcm(&key, &nonce, &plaintext, &header).map_err(ShareError::Encode)?;

        let mut raw = Vec::with_capacity(HEADER_LEN + SALT_LEN + NONCE_LEN + ciphertext.len());
        raw.extend_from_slice(&header);
        raw.extend_from_slice(&salt);
        raw.extend_from_slice(&nonce);
        raw.extend_from_slice(&ciphertext);

        tracing::debug!(
            "[SHARE] encoded v{} token ({} paths, {} bytes)",
            version,
            bundle.image_paths.as_ref().map_or(0, Vec::len),
            raw.len()
        );
        Ok(URL_SAFE_NO_PAD.encode(raw))
    }

    /// Decode a token. Every failure is `DecryptionFailed`.
    pub fn decode(&self, token: &str, password: &str) -> Result<ShareBundle, ShareError> {
        self.try_decode(token, password).ok_or(ShareError::DecryptionFailed)
    }

    fn try_decode(&self, token: &str, password: &str) -> Option<ShareBundle> {
        let raw = URL_SAFE_NO_PAD.decode(token.trim()).ok()?;
        if raw.len() < HEADER_LEN + SALT_LEN + NONCE_LEN + TAG_LEN {
            return None;
        }
        let (header, rest) = raw.split_at(HEADER_LEN);
        let (version, compression) = (header[0], header[1]);
        if version > self.max_version || expected_compression(version) != Some(compression) {
            return None;
        }

        let (salt, rest) = rest.split_at(SALT_LEN);
        let (nonce, ciphertext) = rest.split_at(NONCE_LEN);
        let key = crypto::derive_key(password, salt, &self.kdf).ok()?;
        let plaintext = crypto::decrypt_aes_gcm(&key, nonce, ciphertext, header).ok()?;

        let json = if compression == COMPRESSION_DEFLATE {
            let mut out = Vec::new();
            DeflateDecoder::new(plaintext.as_slice())
                .take(MAX_PLAINTEXT)
                .read_to_end(&mut out)
                .ok()?;
            out
        } else {
            plaintext
        };

        let mut bundle: ShareBundle = serde_json::from_slice(&json).ok()?;
        bundle.connection.validate().ok()?;
        bundle.format_version = version;
        bundle.compression_tag = compression_tag(compression).map(str::to_string);
        Some(bundle)
    }

    /// Read the header without a password.
    ///
    /// Lets a consumer refuse a link from a newer release before prompting.
    pub fn inspect(&self, token: &str) -> Result<TokenInfo, ShareError> {
        let raw = URL_SAFE_NO_PAD
            .decode(token.trim())
            .map_err(|_| ShareError::DecryptionFailed)?;
        if raw.len() < HEADER_LEN {
            return Err(ShareError::DecryptionFailed);
        }
        let (version, compression) = (raw[0], raw[1]);
        if version == 0 || version > self.max_version {
            return Err(ShareError::UnsupportedFormatVersion(version));
        }
        if expected_compression(version) != Some(compression) {
            return Err(ShareError::DecryptionFailed);
        }
        Ok(TokenInfo {
            format_version: version,
            compression_tag: compression_tag(compression).map(str::to_string),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::AuthDetails;

    fn codec() -> ShareBundleCodec {
        ShareBundleCodec::new().with_kdf(KdfParams::insecure_fast())
    }

    fn connection(auth: Option<AuthDetails>) -> ConnectionConfig {
        ConnectionConfig::new("https://files.example.com", auth)
    }

    fn sample_connections() -> Vec<ConnectionConfig> {
        vec![
            connection(None),
            connection(Some(AuthDetails::Token { token: "tok-123".to_string() })),
            connection(Some(AuthDetails::Credentials {
                username: "guest".to_string(),
                password: "p@ss wörd".to_string(),
            }))
            .with_custom_domain("https://cdn.example.com"),
        ]
    }

    #[test]
    fn test_roundtrip_single_and_gallery() {
        let paths = vec!["/albums/2024/a.jpg".to_string(), "/albums/2024/b c.png".to_string()];
        for conn in sample_connections() {
            for bundle in [
                ShareBundle::single(conn.clone()),
                ShareBundle::gallery(conn.clone(), paths.clone(), Some("Trip".to_string())),
                ShareBundle::gallery(conn.clone(), paths.clone(), None),
            ] {
                let token = codec().encode(&bundle, "hunter2").unwrap();
                assert_eq!(codec().decode(&token, "hunter2").unwrap(), bundle);
            }
        }
    }

    #[test]
    fn test_version_and_compression_selection() {
        let single = ShareBundle::single(connection(None));
        assert_eq!(single.format_version, FORMAT_V1);
        assert!(single.compression_tag.is_none());

        let gallery = ShareBundle::gallery(connection(None), vec!["/a.jpg".to_string()], None);
        assert_eq!(gallery.format_version, FORMAT_V2);
        assert_eq!(gallery.compression_tag.as_deref(), Some(DEFLATE_TAG));

        let token = codec().encode(&gallery, "pw").unwrap();
        let info = codec().inspect(&token).unwrap();
        assert_eq!(info.format_version, FORMAT_V2);
        assert_eq!(info.compression_tag.as_deref(), Some(DEFLATE_TAG));

        let token = codec().encode(&single, "pw").unwrap();
        assert_eq!(codec().inspect(&token).unwrap().format_version, FORMAT_V1);
    }

    #[test]
    fn test_wrong_password_fails() {
        let bundle = ShareBundle::gallery(connection(None), vec!["/x.jpg".to_string()], None);
        let token = codec().encode(&bundle, "right").unwrap();
        for wrong in ["wrong", "Right", "right ", "r"] {
            assert_eq!(codec().decode(&token, wrong), Err(ShareError::DecryptionFailed));
        }
    }

    #[test]
    fn test_v1_only_decoder_rejects_v2() {
        let bundle = ShareBundle::gallery(connection(None), vec!["/x.jpg".to_string()], None);
        let token = codec().encode(&bundle, "pw").unwrap();

        let v1_only = codec().with_max_version(FORMAT_V1);
        assert_eq!(v1_only.decode(&token, "pw"), Err(ShareError::DecryptionFailed));
        assert_eq!(v1_only.inspect(&token), Err(ShareError::UnsupportedFormatVersion(2)));

        // Single-item tokens still open on the old decoder
        let single = codec().encode(&ShareBundle::single(connection(None)), "pw").unwrap();
        assert!(v1_only.decode(&single, "pw").is_ok());
    }

    #[test]
    fn test_header_tampering_detected() {
        let bundle = ShareBundle::single(connection(None));
        let token = codec().encode(&bundle, "pw").unwrap();
        let mut raw = URL_SAFE_NO_PAD.decode(&token).unwrap();

        // Claim v2/deflate on a v1 body: header is authenticated
        raw[0] = FORMAT_V2;
        raw[1] = COMPRESSION_DEFLATE;
        let forged = URL_SAFE_NO_PAD.encode(&raw);
        assert_eq!(codec().decode(&forged, "pw"), Err(ShareError::DecryptionFailed));

        // Unknown version
        raw[0] = 9;
        let forged = URL_SAFE_NO_PAD.encode(&raw);
        assert_eq!(codec().decode(&forged, "pw"), Err(ShareError::DecryptionFailed));
        assert_eq!(codec().inspect(&forged), Err(ShareError::UnsupportedFormatVersion(9)));
    }

    #[test]
    fn test_corrupt_tokens_fail_uniformly() {
        let bundle = ShareBundle::single(connection(None));
        let token = codec().encode(&bundle, "pw").unwrap();

        let mut flipped = URL_SAFE_NO_PAD.decode(&token).unwrap();
        let last = flipped.len() - 1;
        flipped[last] ^= 0x01;

        for bad in [
            String::new(),
            "not base64 !!".to_string(),
            token[..10].to_string(),
            URL_SAFE_NO_PAD.encode(&flipped),
        ] {
            assert_eq!(codec().decode(&bad, "pw"), Err(ShareError::DecryptionFailed));
        }
    }

    #[test]
    fn test_empty_password_rejected() {
        let bundle = ShareBundle::single(connection(None));
        assert!(matches!(codec().encode(&bundle, ""), Err(ShareError::Encode(_))));
    }

    #[test]
    fn test_tokens_are_url_safe_and_salted() {
        let bundle = ShareBundle::gallery(connection(None), vec!["/ä ö/ü.jpg".to_string()], None);
        let a = codec().encode(&bundle, "pw").unwrap();
        let b = codec().encode(&bundle, "pw").unwrap();
        assert_ne!(a, b);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn test_gallery_compression_shrinks_payload() {
        let paths: Vec<String> = (0..200).map(|i| format!("/albums/summer-2024/IMG_{:04}.jpg", i)).collect();
        let json_len = serde_json::to_vec(&ShareBundle::gallery(connection(None), paths.clone(), None))
            .unwrap()
            .len();
        let token = codec().encode(&ShareBundle::gallery(connection(None), paths, None), "pw").unwrap();
        assert!(URL_SAFE_NO_PAD.decode(&token).unwrap().len() < json_len / 2);
    }
}
