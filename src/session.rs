// AeroShare Browse Session
// One user's view of the backend: current directory, selection, share and delete.
// The directory password store is passed into each call, never held.

use tracing::info;

use crate::browser::{ListFailure, PaginatedBrowser};
use crate::config::AppConfig;
use crate::dir_passwords::DirectoryPasswordStore;
use crate::providers::{BatchReport, ConnectionConfig, RemoteClient};
use crate::resolver::{resolve, ListingContext, Resolution, SelectionSet};
use crate::share::{ShareBundleCodec, ShareError, ShareLinkComposer};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Every selection resolved to zero images
    #[error("Nothing to share: the selection contains no images ({failed} folders could not be read)")]
    NothingToShare { failed: usize, resolution: Resolution },

    #[error(transparent)]
    Share(#[from] ShareError),
}

/// A created share link and how the selection was resolved
#[derive(Debug, Clone)]
pub struct ShareOutcome {
    pub link: String,
    pub resolution: Resolution,
}

pub struct Session<'c> {
    client: &'c dyn RemoteClient,
    browser: PaginatedBrowser<'c>,
    selection: SelectionSet,
}

impl<'c> Session<'c> {
    pub fn new(client: &'c dyn RemoteClient, config: &AppConfig) -> Self {
        Self {
            client,
            browser: PaginatedBrowser::with_page_sizes(client, config.page_size, config.load_all_page_size),
            selection: SelectionSet::new(),
        }
    }

    pub fn browser(&self) -> &PaginatedBrowser<'c> {
        &self.browser
    }

    pub fn browser_mut(&mut self) -> &mut PaginatedBrowser<'c> {
        &mut self.browser
    }

    pub fn current_path(&self) -> &str {
        &self.browser.state().path
    }

    pub fn selection(&self) -> &SelectionSet {
        &self.selection
    }

    pub fn selection_mut(&mut self) -> &mut SelectionSet {
        &mut self.selection
    }

    /// Open `path`. Navigation always drops the selection.
    pub async fn navigate(&mut self, path: &str, store: &mut DirectoryPasswordStore) -> Result<(), ListFailure> {
        self.selection.clear();
        self.browser.open(path, store).await
    }

    /// Resolve the selection and turn it into a share link.
    ///
    /// The selection is cleared only when a link was produced.
    pub async fn share_selection(
        &mut self,
        codec: &ShareBundleCodec,
        composer: &ShareLinkComposer,
        connection: &ConnectionConfig,
        title: Option<String>,
        password: &str,
        store: &mut DirectoryPasswordStore,
    ) -> Result<ShareOutcome, SessionError> {
        let state = self.browser.state();
        let context = ListingContext::new(&state.path, &state.items)
            .with_load_all_page_size(self.browser.load_all_page_size());
        let resolution = resolve(self.client, &self.selection, context, store).await;

        if resolution.is_empty() {
            return Err(SessionError::NothingToShare { failed: resolution.folders_failed(), resolution });
        }

        let link = composer.share_link(codec, connection, &resolution.paths, title, password)?;
        self.selection.clear();
        Ok(ShareOutcome { link, resolution })
    }

    /// Delete every selected path, then reload the current directory.
    ///
    /// Paths that failed stay selected so the user can retry them.
    pub async fn delete_selection(&mut self, store: &mut DirectoryPasswordStore) -> BatchReport {
        let paths = self.selection.to_vec();
        let report = self.client.delete_many(&paths).await;
        info!(
            "Deleted {} of {} selected paths ({} failed)",
            report.success_count(),
            paths.len(),
            report.fail_count()
        );

        self.selection = report.failures().map(|r| r.path.as_str()).collect();
        let current = self.current_path().to_string();
        if let Err(e) = self.browser.open(&current, store).await {
            tracing::warn!("Reload after delete failed: {}", e);
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ShareSettings;
    use crate::crypto::KdfParams;
    use crate::providers::mock::MockRemote;
    use crate::share::{LinkConsumer, ShareTarget};

    fn codec() -> ShareBundleCodec {
        ShareBundleCodec::new().with_kdf(KdfParams::insecure_fast())
    }

    fn composer() -> ShareLinkComposer {
        ShareLinkComposer::from_settings(&ShareSettings {
            base_url: Some("https://share.example.com/view".to_string()),
            ..Default::default()
        })
        .unwrap()
    }

    fn conn() -> ConnectionConfig {
        ConnectionConfig::new("https://files.example.com", None)
    }

    #[tokio::test]
    async fn test_share_selection_end_to_end() {
        let remote = MockRemote::new();
        remote.add_file("/trip", "1.jpg");
        remote.add_file("/trip", "2.png");
        remote.add_file("/trip/raw", "3.jpg");
        remote.add_file("/", "cover.jpg");
        let config = AppConfig::default();
        let mut store = DirectoryPasswordStore::new();
        let mut session = Session::new(&remote, &config);

        session.navigate("/", &mut store).await.unwrap();
        session.selection_mut().insert("/trip");
        session.selection_mut().insert("/cover.jpg");

        let outcome = session
            .share_selection(&codec(), &composer(), &conn(), Some("Trip".to_string()), "pw", &mut store)
            .await
            .unwrap();
        assert!(session.selection().is_empty());
        assert_eq!(outcome.resolution.paths.len(), 3);

        let mut consumer = LinkConsumer::open(&outcome.link, codec()).unwrap();
        assert_eq!(consumer.target(), &ShareTarget::Gallery);
        consumer.submit("pw");
        let mut paths = consumer.item_paths();
        paths.sort();
        assert_eq!(paths, vec!["/cover.jpg", "/trip/1.jpg", "/trip/2.png"]);
    }

    #[tokio::test]
    async fn test_share_expands_folders_with_configured_page_size() {
        let remote = MockRemote::new();
        for i in 1..=7 {
            remote.add_file("/burst", &format!("IMG_{}.jpg", i));
        }
        let config = AppConfig { page_size: 2, load_all_page_size: 3, ..Default::default() };
        let mut store = DirectoryPasswordStore::new();
        let mut session = Session::new(&remote, &config);

        session.navigate("/", &mut store).await.unwrap();
        session.selection_mut().insert("/burst");
        let outcome = session
            .share_selection(&codec(), &composer(), &conn(), None, "pw", &mut store)
            .await
            .unwrap();

        assert_eq!(outcome.resolution.paths.len(), 7);
        assert!(outcome.resolution.warnings.is_empty());
        assert!(remote
            .list_calls()
            .iter()
            .filter(|c| c.path == "/burst")
            .all(|c| c.per_page == 3));
    }

    #[tokio::test]
    async fn test_share_nothing_keeps_selection() {
        let remote = MockRemote::new();
        remote.add_dir("/empty");
        let config = AppConfig::default();
        let mut store = DirectoryPasswordStore::new();
        let mut session = Session::new(&remote, &config);

        session.navigate("/", &mut store).await.unwrap();
        session.selection_mut().insert("/empty");
        let err = session
            .share_selection(&codec(), &composer(), &conn(), None, "pw", &mut store)
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::NothingToShare { failed: 0, .. }));
        assert_eq!(session.selection().len(), 1);
    }

    #[tokio::test]
    async fn test_navigation_clears_selection() {
        let remote = MockRemote::new();
        remote.add_file("/a", "x.jpg");
        let config = AppConfig::default();
        let mut store = DirectoryPasswordStore::new();
        let mut session = Session::new(&remote, &config);

        session.navigate("/a", &mut store).await.unwrap();
        session.selection_mut().insert("/a/x.jpg");
        session.navigate("/", &mut store).await.unwrap();
        assert!(session.selection().is_empty());
    }

    #[tokio::test]
    async fn test_delete_selection_partial_failure() {
        let remote = MockRemote::new();
        for name in ["1.jpg", "2.jpg", "3.jpg", "4.jpg", "5.jpg"] {
            remote.add_file("/d", name);
        }
        remote.fail_delete("/d/2.jpg");
        remote.fail_delete("/d/4.jpg");
        let config = AppConfig::default();
        let mut store = DirectoryPasswordStore::new();
        let mut session = Session::new(&remote, &config);

        session.navigate("/d", &mut store).await.unwrap();
        for name in ["1.jpg", "2.jpg", "3.jpg", "4.jpg", "5.jpg"] {
            session.selection_mut().insert(&format!("/d/{}", name));
        }
        let report = session.delete_selection(&mut store).await;

        assert_eq!(report.success_count(), 3);
        assert_eq!(report.fail_count(), 2);
        assert_eq!(session.selection().to_vec(), vec!["/d/2.jpg".to_string(), "/d/4.jpg".to_string()]);
        assert_eq!(session.browser().items().len(), 2);
    }
}
