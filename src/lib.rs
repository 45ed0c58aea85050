// AeroShare - Password-locked share links for AList-compatible file hosts
// Browse protected directories page by page, resolve selections to images,
// and pack connection + paths into a single encrypted link token.

pub mod browser;
pub mod config;
pub mod crypto;
pub mod dir_passwords;
pub mod error_class;
pub mod providers;
pub mod resolver;
pub mod session;
pub mod share;

pub use browser::{ListFailure, PageState, PaginatedBrowser};
pub use config::{AppConfig, ConfigError, ShareSettings};
pub use dir_passwords::DirectoryPasswordStore;
pub use error_class::{classify, ErrorClass};
pub use providers::{AListClient, BatchReport, ConnectionConfig, FileInfo, RemoteClient, RemoteError};
pub use resolver::{resolve, ListingContext, Resolution, SelectionSet};
pub use session::{Session, SessionError};
pub use share::{LinkConsumer, ShareBundle, ShareBundleCodec, ShareError, ShareLinkComposer};

/// Install the fmt subscriber used by the binaries
pub fn init_logging(verbose: bool) {
    let level = if verbose { tracing::Level::DEBUG } else { tracing::Level::WARN };
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
