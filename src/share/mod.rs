//! Share Link Module
//!
//! Everything between a resolved list of paths and a shareable URL, and back:
//!
//! ```text
//!  paths ─► ShareBundle ─► codec::encode ─► token ─► link::ShareLinkComposer ─► URL
//!  URL ─► link::parse_link ─► unlock::LinkConsumer ─► codec::decode ─► ShareBundle
//!                                   └─► hydrate ─► RemoteClient ─► direct links
//! ```

pub mod codec;
pub mod link;
pub mod passwordless;
pub mod unlock;

pub use codec::{ShareBundle, ShareBundleCodec, TokenInfo};
pub use link::{parse_link, ParsedLink, ShareLinkComposer, ShareTarget};
pub use unlock::{LinkConsumer, SharedItem, UnlockState};

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShareError {
    /// Wrong password, corrupt token or unsupported format. Deliberately
    /// carries no detail about which.
    #[error("Could not unlock share: wrong password or damaged link")]
    DecryptionFailed,

    #[error("Share link uses format version {0}, which this version cannot open")]
    UnsupportedFormatVersion(u8),

    #[error("Could not create share token: {0}")]
    Encode(String),

    #[error("Invalid share link: {0}")]
    InvalidLink(String),
}
