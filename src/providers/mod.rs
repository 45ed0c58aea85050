//! Remote File Host Module
//!
//! The browser, resolver and link consumer only ever talk to the backend through
//! the `RemoteClient` trait. `AListClient` is the HTTP implementation; tests
//! substitute an in-memory host.
//!
//! ```text
//! ┌──────────────────┐   ┌──────────────────┐   ┌──────────────┐
//! │ PaginatedBrowser │   │ SelectionResolver│   │ LinkConsumer │
//! └────────┬─────────┘   └────────┬─────────┘   └──────┬───────┘
//!          └──────────────┬───────┴────────────────────┘
//!                         ▼
//!               ┌───────────────────┐
//!               │ RemoteClient trait│
//!               └─────────┬─────────┘
//!                         ▼
//!                  ┌─────────────┐
//!                  │ AListClient │
//!                  └─────────────┘
//! ```

pub mod types;
pub mod alist;
pub mod http_retry;
#[cfg(test)]
pub mod mock;

pub use types::*;
pub use alist::AListClient;
pub use http_retry::{send_with_retry, HttpRetryConfig};

use async_trait::async_trait;

/// Authenticated access to one remote file host
///
/// Pure I/O boundary: implementations translate calls to requests and backend
/// answers to `RemoteError`, nothing more.
#[async_trait]
pub trait RemoteClient: Send + Sync {
    /// Base URL of the backend this client talks to
    fn server_url(&self) -> &str;

    /// List one page of a directory. `page` is 1-based.
    async fn list(
        &self,
        path: &str,
        password: Option<&str>,
        page: u32,
        per_page: u32,
    ) -> Result<Listing, RemoteError>;

    /// Resolve a file path to a URL the browser can fetch directly
    async fn get_direct_link(&self, path: &str, password: Option<&str>) -> Result<String, RemoteError>;

    /// Upload `content` as `dir/desired_name`
    async fn upload_file(
        &self,
        dir: &str,
        desired_name: &str,
        content: Vec<u8>,
        declared_type: Option<&str>,
    ) -> Result<(), RemoteError>;

    /// Create `parent/name`. An already existing folder is success.
    async fn create_folder(&self, parent: &str, name: &str) -> Result<(), RemoteError>;

    /// Delete a single file or directory
    async fn delete(&self, path: &str) -> Result<(), RemoteError>;

    /// Delete every path, one request per path, in order.
    ///
    /// A failure on one path never stops the rest; the report names each path.
    async fn delete_many(&self, paths: &[String]) -> BatchReport {
        let mut report = BatchReport::default();
        for path in paths {
            let outcome = self.delete(path).await;
            if let Err(ref e) = outcome {
                tracing::warn!("[BATCH] delete {} failed: {}", path, e);
            }
            report.record(path, outcome);
        }
        report
    }
}

/// Pick the upload content type: trust the declared type unless it is missing
/// or generic, otherwise guess from the file name extension
pub fn content_type_for(file_name: &str, declared: Option<&str>) -> String {
    match declared.map(str::trim) {
        Some(t) if !t.is_empty() && t != "application/octet-stream" => t.to_string(),
        _ => mime_guess::from_path(file_name)
            .first_or_octet_stream()
            .to_string(),
    }
}
