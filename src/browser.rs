//! Paginated directory browser.
//!
//! Fetches one directory page by page into an accumulated listing. Requests
//! are strictly sequential: page N+1 is only requested after page N merged.
//! Failures are sorted into "ask for a password" and "give up" using the
//! message heuristics in `error_class`.

use tracing::{debug, warn};

use crate::config::{DEFAULT_PAGE_SIZE, LOAD_ALL_PAGE_SIZE};
use crate::dir_passwords::DirectoryPasswordStore;
use crate::error_class::{classify_for_path, ErrorClass};
use crate::providers::{normalize_path, FileInfo, Listing, RemoteClient, RemoteError};

/// Why a listing could not be shown
#[derive(Debug, thiserror::Error)]
pub enum ListFailure {
    /// Prompt for a directory password. `incorrect` is set when a password was
    /// sent and rejected, as opposed to none having been tried yet.
    #[error("Password required for {path}")]
    PasswordRequired { path: String, incorrect: bool },

    #[error(transparent)]
    Failed(#[from] RemoteError),
}

/// Decide how to surface a failed listing of `path`.
///
/// `password_tried` is true when the request carried a password, either typed
/// for this attempt or taken from the directory password store. A refused
/// account token is a plain failure, never a directory password prompt.
pub fn classify_failure(path: &str, error: RemoteError, password_tried: bool) -> ListFailure {
    let path = normalize_path(path);
    if let RemoteError::AuthRequired(_) = error {
        return ListFailure::PasswordRequired { path, incorrect: password_tried };
    }
    let class = match error.backend_message() {
        Some(message) => classify_for_path(message, password_tried),
        None => ErrorClass::Other,
    };
    match class {
        ErrorClass::AuthRequired => ListFailure::PasswordRequired { path, incorrect: password_tried },
        ErrorClass::AmbiguousNotFoundOrProtected => ListFailure::PasswordRequired { path, incorrect: false },
        ErrorClass::Other => ListFailure::Failed(error),
    }
}

/// List one page of `path`, recording the password in `store` on success.
///
/// `password` overrides the cached one; with `None` the cached password (if
/// any) is sent.
pub async fn list_page(
    client: &dyn RemoteClient,
    store: &mut DirectoryPasswordStore,
    path: &str,
    password: Option<&str>,
    page: u32,
    page_size: u32,
) -> Result<Listing, ListFailure> {
    let path = normalize_path(path);
    let password = password
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .or_else(|| store.get(&path).map(str::to_string));

    match client.list(&path, password.as_deref(), page, page_size).await {
        Ok(listing) => {
            if let Some(pw) = &password {
                store.set(&path, pw);
            }
            Ok(listing)
        }
        Err(e) => {
            debug!("[BROWSER] list {} page {} failed: {}", path, page, e);
            Err(classify_failure(&path, e, password.is_some()))
        }
    }
}

/// View state of one directory
#[derive(Debug, Clone, PartialEq)]
pub struct PageState {
    pub path: String,
    /// Last page merged into `items` (1-based)
    pub current_page: u32,
    pub page_size: u32,
    /// Entries in the directory as reported by the backend
    pub total: u64,
    pub total_pages: u32,
    pub items: Vec<FileInfo>,
    pub loading: bool,
    pub loading_more: bool,
}

impl PageState {
    pub fn new(path: &str, page_size: u32) -> Self {
        Self {
            path: normalize_path(path),
            current_page: 1,
            page_size: page_size.max(1),
            total: 0,
            total_pages: 0,
            items: Vec::new(),
            loading: false,
            loading_more: false,
        }
    }

    fn reset(&mut self) {
        self.current_page = 1;
        self.total = 0;
        self.total_pages = 0;
        self.items.clear();
    }

    fn set_total(&mut self, total: u64) {
        self.total = total;
        self.total_pages = total.div_ceil(self.page_size as u64) as u32;
    }

    pub fn has_more(&self) -> bool {
        (self.items.len() as u64) < self.total && self.current_page < self.total_pages
    }
}

/// Accumulating browser over one directory at a time
pub struct PaginatedBrowser<'c> {
    client: &'c dyn RemoteClient,
    state: PageState,
    /// Password typed for the current path, overriding the cached one
    password: Option<String>,
    load_all_page_size: u32,
}

impl<'c> PaginatedBrowser<'c> {
    pub fn new(client: &'c dyn RemoteClient) -> Self {
        Self::with_page_sizes(client, DEFAULT_PAGE_SIZE, LOAD_ALL_PAGE_SIZE)
    }

    pub fn with_page_sizes(client: &'c dyn RemoteClient, page_size: u32, load_all_page_size: u32) -> Self {
        Self {
            client,
            state: PageState::new("/", page_size),
            password: None,
            load_all_page_size: load_all_page_size.max(page_size),
        }
    }

    pub fn state(&self) -> &PageState {
        &self.state
    }

    pub fn items(&self) -> &[FileInfo] {
        &self.state.items
    }

    pub fn load_all_page_size(&self) -> u32 {
        self.load_all_page_size
    }

    /// Navigate to `path` and fetch its first page. Clears the accumulated
    /// listing and any typed password before the request goes out.
    pub async fn open(&mut self, path: &str, store: &mut DirectoryPasswordStore) -> Result<(), ListFailure> {
        self.state.path = normalize_path(path);
        self.password = None;
        self.reload_first_page(store).await
    }

    /// Retry the current path with a typed password
    pub async fn submit_password(
        &mut self,
        password: &str,
        store: &mut DirectoryPasswordStore,
    ) -> Result<(), ListFailure> {
        self.password = Some(password.to_string()).filter(|p| !p.is_empty());
        self.reload_first_page(store).await
    }

    async fn reload_first_page(&mut self, store: &mut DirectoryPasswordStore) -> Result<(), ListFailure> {
        self.state.reset();
        self.state.loading = true;
        let result = self.fetch(1, self.state.page_size, store).await;
        self.state.loading = false;

        let listing = result?;
        self.state.set_total(listing.total);
        self.state.items = listing.items;
        Ok(())
    }

    /// Append the next page. Returns `false` when there was nothing left.
    pub async fn load_more(&mut self, store: &mut DirectoryPasswordStore) -> Result<bool, ListFailure> {
        if !self.state.has_more() || self.state.loading || self.state.loading_more {
            return Ok(false);
        }
        let next = self.state.current_page + 1;
        self.state.loading_more = true;
        let result = self.fetch(next, self.state.page_size, store).await;
        self.state.loading_more = false;

        let listing = result?;
        self.state.set_total(listing.total);
        self.state.items.extend(listing.items);
        self.state.current_page = next;
        Ok(true)
    }

    /// Fetch the whole directory in a single oversized page and replace the
    /// accumulated listing. Costs one large response; opt-in only.
    pub async fn load_all(&mut self, store: &mut DirectoryPasswordStore) -> Result<(), ListFailure> {
        self.state.loading = true;
        let result = self.fetch(1, self.load_all_page_size, store).await;
        self.state.loading = false;

        let listing = result?;
        if (listing.items.len() as u64) < listing.total {
            warn!(
                "[BROWSER] load all for {} returned {} of {} entries",
                self.state.path,
                listing.items.len(),
                listing.total
            );
        }
        self.state.set_total(listing.total);
        self.state.items = listing.items;
        self.state.current_page = self.state.total_pages.max(1);
        Ok(())
    }

    async fn fetch(
        &mut self,
        page: u32,
        page_size: u32,
        store: &mut DirectoryPasswordStore,
    ) -> Result<Listing, ListFailure> {
        list_page(self.client, store, &self.state.path, self.password.as_deref(), page, page_size).await
    }
}
