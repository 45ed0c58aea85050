//! Passwordless link parameters.
//!
//! When the operator opts in, links locked with the pre-shared default password
//! carry that password in the `pk` query parameter so the recipient is not
//! prompted. The encoding is a fixed-key XOR plus base64url: it keeps the
//! password out of casual view and nothing more. Anyone holding such a link can
//! open it. Changing the encoding changes the link format.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};

use crate::config::ShareSettings;

pub const MODE_PARAM: &str = "pm";
pub const KEY_PARAM: &str = "pk";
pub const MODE_ENABLED: &str = "1";

const OBFUSCATION_KEY: &[u8] = b"aeroshare-pm";

fn xor(data: &[u8]) -> Vec<u8> {
    data.iter()
        .zip(OBFUSCATION_KEY.iter().cycle())
        .map(|(b, k)| b ^ k)
        .collect()
}

pub fn obfuscate(password: &str) -> String {
    URL_SAFE_NO_PAD.encode(xor(password.as_bytes()))
}

/// Reverse `obfuscate`. `None` for anything that does not decode to a
/// non-empty UTF-8 string.
pub fn reveal(encoded: &str) -> Option<String> {
    let raw = URL_SAFE_NO_PAD.decode(encoded.trim()).ok()?;
    let plain = String::from_utf8(xor(&raw)).ok()?;
    (!plain.is_empty()).then_some(plain)
}

/// Whether a link locked with `password` may embed it
pub fn allowed_for(settings: &ShareSettings, password: &str) -> bool {
    settings.passwordless_enabled
        && !password.is_empty()
        && settings.default_password.as_deref() == Some(password)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(enabled: bool, default: Option<&str>) -> ShareSettings {
        ShareSettings {
            base_url: None,
            default_password: default.map(str::to_string),
            passwordless_enabled: enabled,
        }
    }

    #[test]
    fn test_obfuscate_reveal() {
        for pw in ["letmein", "ünïcödé pass", "a"] {
            let encoded = obfuscate(pw);
            assert_ne!(encoded, pw);
            assert_eq!(reveal(&encoded).as_deref(), Some(pw));
        }
    }

    #[test]
    fn test_reveal_rejects_garbage() {
        assert!(reveal("").is_none());
        assert!(reveal("***").is_none());
    }

    #[test]
    fn test_allowed_only_for_default_password() {
        assert!(allowed_for(&settings(true, Some("shared")), "shared"));
        assert!(!allowed_for(&settings(true, Some("shared")), "other"));
        assert!(!allowed_for(&settings(false, Some("shared")), "shared"));
        assert!(!allowed_for(&settings(true, None), "shared"));
        assert!(!allowed_for(&settings(true, Some("")), ""));
    }
}
