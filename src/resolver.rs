//! Selection resolver.
//!
//! Turns a user selection of files and folders into the flat list of image
//! paths that goes into a share bundle. Folders are expanded exactly one level:
//! images directly inside a selected folder are included, sub-folders found
//! there are skipped and never listed. Deeper expansion would change what a
//! share contains and would need a new bundle format version.

use std::collections::{BTreeSet, HashSet};
use std::fmt;

use tracing::{info, warn};

use crate::browser::{list_page, ListFailure};
use crate::config::LOAD_ALL_PAGE_SIZE;
use crate::dir_passwords::DirectoryPasswordStore;
use crate::providers::{join_path, normalize_path, split_path, FileInfo, RemoteClient};

/// Extensions (lowercase, no dot) treated as shareable images
pub const IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "webp", "bmp", "svg", "avif", "heic", "heif", "tif", "tiff", "ico",
];

pub fn is_image_path(path: &str) -> bool {
    path.rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
}

/// Paths the user picked. Cleared after a share, a delete or navigation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionSet {
    paths: BTreeSet<String>,
}

impl SelectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a path; returns false if it was already selected
    pub fn insert(&mut self, path: &str) -> bool {
        self.paths.insert(normalize_path(path))
    }

    pub fn remove(&mut self, path: &str) -> bool {
        self.paths.remove(&normalize_path(path))
    }

    /// Flip selection state; returns whether the path is now selected
    pub fn toggle(&mut self, path: &str) -> bool {
        let path = normalize_path(path);
        if self.paths.remove(&path) {
            false
        } else {
            self.paths.insert(path);
            true
        }
    }

    pub fn contains(&self, path: &str) -> bool {
        self.paths.contains(&normalize_path(path))
    }

    pub fn clear(&mut self) {
        self.paths.clear();
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.paths.iter().map(String::as_str)
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.paths.iter().cloned().collect()
    }
}

impl<S: AsRef<str>> FromIterator<S> for SelectionSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = Self::new();
        for p in iter {
            set.insert(p.as_ref());
        }
        set
    }
}

/// The directory the selection was made in, with the entries shown for it.
/// Used to tell files from folders without extra requests.
#[derive(Debug, Clone, Copy)]
pub struct ListingContext<'a> {
    pub dir: &'a str,
    pub items: &'a [FileInfo],
    /// Page size used when listing a selected folder
    pub load_all_page_size: u32,
}

impl<'a> ListingContext<'a> {
    pub fn new(dir: &'a str, items: &'a [FileInfo]) -> Self {
        Self { dir, items, load_all_page_size: LOAD_ALL_PAGE_SIZE }
    }

    pub fn with_load_all_page_size(mut self, page_size: u32) -> Self {
        self.load_all_page_size = page_size.max(1);
        self
    }

    fn lookup(&self, path: &str) -> Option<&'a FileInfo> {
        let (parent, name) = split_path(path);
        if parent != normalize_path(self.dir) {
            return None;
        }
        self.items.iter().find(|f| f.name == name)
    }
}

/// A folder that could not be expanded, or only partly
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveWarning {
    pub folder: String,
    pub password_required: bool,
    pub reason: String,
}

impl fmt::Display for ResolveWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.password_required {
            write!(f, "Folder {} is password protected and was skipped", self.folder)
        } else {
            write!(f, "Could not read folder {}: {}", self.folder, self.reason)
        }
    }
}

/// Result of resolving a selection
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    /// De-duplicated leaf image paths in selection order
    pub paths: Vec<String>,
    pub folders_expanded: usize,
    pub warnings: Vec<ResolveWarning>,
}

impl Resolution {
    /// Folders that were skipped or listed only in part
    pub fn folders_failed(&self) -> usize {
        self.warnings.len()
    }

    /// Everything resolved to nothing (e.g. only empty folders were picked)
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

/// Every entry of one folder, possibly fewer than `total` if paging stopped early
struct FolderListing {
    items: Vec<FileInfo>,
    total: u64,
    stopped_by: Option<String>,
}

/// List `path` page by page until the backend's reported total is reached.
///
/// Only a failure on the first page is an error; a later one ends the listing
/// with what was collected so far.
async fn list_folder(
    client: &dyn RemoteClient,
    store: &mut DirectoryPasswordStore,
    path: &str,
    page_size: u32,
) -> Result<FolderListing, ListFailure> {
    let page_size = page_size.max(1);
    let first = list_page(client, store, path, None, 1, page_size).await?;
    let total = first.total;
    let last_page = total.div_ceil(page_size as u64);
    let mut items = first.items;
    let mut stopped_by = None;

    let mut page: u32 = 2;
    while (items.len() as u64) < total && u64::from(page) <= last_page {
        match list_page(client, store, path, None, page, page_size).await {
            Ok(next) if next.items.is_empty() => break,
            Ok(next) => items.extend(next.items),
            Err(e) => {
                stopped_by = Some(e.to_string());
                break;
            }
        }
        page += 1;
    }
    Ok(FolderListing { items, total, stopped_by })
}

/// Expand `selected` into leaf image paths.
///
/// Folders are listed sequentially with their cached password (if any), one
/// page of `context.load_all_page_size` at a time until complete. A folder
/// that fails to list contributes nothing and adds a warning; one that stops
/// part way keeps what was listed and also adds a warning. The remaining
/// selections still resolve.
pub async fn resolve(
    client: &dyn RemoteClient,
    selected: &SelectionSet,
    context: ListingContext<'_>,
    store: &mut DirectoryPasswordStore,
) -> Resolution {
    let mut resolution = Resolution::default();
    let mut seen: HashSet<String> = HashSet::new();
    let mut push = |path: String, resolution: &mut Resolution| {
        if seen.insert(path.clone()) {
            resolution.paths.push(path);
        }
    };

    for path in selected.iter() {
        let is_dir = match context.lookup(path) {
            Some(entry) => entry.is_dir,
            // Outside the visible listing: go by the name
            None => !is_image_path(path),
        };

        if !is_dir {
            if is_image_path(path) {
                push(path.to_string(), &mut resolution);
            }
            continue;
        }

        match list_folder(client, store, path, context.load_all_page_size).await {
            Ok(listing) => {
                resolution.folders_expanded += 1;
                for entry in listing.items.iter().filter(|f| !f.is_dir && is_image_path(&f.name)) {
                    push(join_path(path, &entry.name), &mut resolution);
                }
                if (listing.items.len() as u64) < listing.total {
                    let warning = ResolveWarning {
                        folder: normalize_path(path),
                        password_required: false,
                        reason: format!(
                            "only {} of {} entries could be listed{}",
                            listing.items.len(),
                            listing.total,
                            listing.stopped_by.map(|e| format!(" ({})", e)).unwrap_or_default()
                        ),
                    };
                    warn!("[RESOLVE] {}", warning);
                    resolution.warnings.push(warning);
                }
            }
            Err(failure) => {
                let warning = match failure {
                    ListFailure::PasswordRequired { path, .. } => ResolveWarning {
                        folder: path,
                        password_required: true,
                        reason: "password required".to_string(),
                    },
                    ListFailure::Failed(e) => ResolveWarning {
                        folder: path.to_string(),
                        password_required: false,
                        reason: e.to_string(),
                    },
                };
                warn!("[RESOLVE] {}", warning);
                resolution.warnings.push(warning);
            }
        }
    }

    info!(
        "[RESOLVE] {} selections -> {} images ({} folders expanded, {} failed)",
        selected.len(),
        resolution.paths.len(),
        resolution.folders_expanded,
        resolution.folders_failed()
    );
    resolution
}
