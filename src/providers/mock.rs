//! In-memory file host used by unit tests.
//!
//! Mimics the backend's quirks that matter to the browser: 1-based paging,
//! generic "object not found" answers and per-directory passwords.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;

use super::{join_path, normalize_path, split_path, FileInfo, Listing, RemoteClient, RemoteError};

pub const NOT_FOUND_MESSAGE: &str = "failed get objs: failed get dir: object not found";
pub const WRONG_PASSWORD_MESSAGE: &str = "password is incorrect or you have no permission";

#[derive(Debug, Clone, PartialEq)]
pub struct ListCall {
    pub path: String,
    pub password: Option<String>,
    pub page: u32,
    pub per_page: u32,
}

#[derive(Default)]
struct Inner {
    dirs: BTreeMap<String, Vec<FileInfo>>,
    protected: HashMap<String, String>,
    /// Protected dirs that answer with the generic not-found message
    generic_protected: HashSet<String>,
    failing_deletes: HashSet<String>,
    failing_pages: HashSet<(String, u32)>,
    unreachable: bool,
    list_calls: Vec<ListCall>,
    uploads: Vec<(String, String)>,
}

#[derive(Default)]
pub struct MockRemote {
    inner: Mutex<Inner>,
}

impl MockRemote {
    pub fn new() -> Self {
        let remote = Self::default();
        remote.add_dir("/");
        remote
    }

    pub fn add_dir(&self, path: &str) {
        let path = normalize_path(path);
        let mut inner = self.inner.lock().unwrap();
        if !inner.dirs.contains_key(&path) {
            inner.dirs.insert(path.clone(), Vec::new());
            if path != "/" {
                let (parent, name) = split_path(&path);
                drop(inner);
                self.add_dir(&parent);
                let mut inner = self.inner.lock().unwrap();
                let siblings = inner.dirs.entry(parent).or_default();
                if !siblings.iter().any(|f| f.name == name) {
                    siblings.push(FileInfo::directory(&name));
                }
            }
        }
    }

    pub fn add_file(&self, dir: &str, name: &str) {
        let dir = normalize_path(dir);
        self.add_dir(&dir);
        let mut inner = self.inner.lock().unwrap();
        inner.dirs.entry(dir).or_default().push(FileInfo::file(name, 1024));
    }

    pub fn protect(&self, dir: &str, password: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.protected.insert(normalize_path(dir), password.to_string());
    }

    pub fn protect_generic(&self, dir: &str, password: &str) {
        self.protect(dir, password);
        self.inner.lock().unwrap().generic_protected.insert(normalize_path(dir));
    }

    pub fn fail_delete(&self, path: &str) {
        self.inner.lock().unwrap().failing_deletes.insert(normalize_path(path));
    }

    /// Make one listing page of `dir` fail with a server error
    pub fn fail_list_page(&self, dir: &str, page: u32) {
        self.inner.lock().unwrap().failing_pages.insert((normalize_path(dir), page));
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.inner.lock().unwrap().unreachable = unreachable;
    }

    pub fn list_calls(&self) -> Vec<ListCall> {
        self.inner.lock().unwrap().list_calls.clone()
    }

    pub fn uploads(&self) -> Vec<(String, String)> {
        self.inner.lock().unwrap().uploads.clone()
    }

    pub fn exists(&self, path: &str) -> bool {
        let path = normalize_path(path);
        let inner = self.inner.lock().unwrap();
        if inner.dirs.contains_key(&path) {
            return true;
        }
        let (parent, name) = split_path(&path);
        inner.dirs.get(&parent).is_some_and(|items| items.iter().any(|f| f.name == name))
    }
}

#[async_trait]
impl RemoteClient for MockRemote {
    fn server_url(&self) -> &str {
        "https://mock.invalid"
    }

    async fn list(
        &self,
        path: &str,
        password: Option<&str>,
        page: u32,
        per_page: u32,
    ) -> Result<Listing, RemoteError> {
        let path = normalize_path(path);
        let mut inner = self.inner.lock().unwrap();
        inner.list_calls.push(ListCall {
            path: path.clone(),
            password: password.map(str::to_string),
            page,
            per_page,
        });
        if inner.unreachable {
            return Err(RemoteError::Transport("connection refused".to_string()));
        }
        if let Some(expected) = inner.protected.get(&path) {
            if password != Some(expected.as_str()) {
                let message = if inner.generic_protected.contains(&path) {
                    NOT_FOUND_MESSAGE
                } else {
                    WRONG_PASSWORD_MESSAGE
                };
                return Err(RemoteError::Api { code: 500, message: message.to_string() });
            }
        }
        if inner.failing_pages.contains(&(path.clone(), page)) {
            return Err(RemoteError::Api { code: 500, message: "storage driver timeout".to_string() });
        }
        let items = inner.dirs.get(&path).ok_or_else(|| RemoteError::Api {
            code: 500,
            message: NOT_FOUND_MESSAGE.to_string(),
        })?;
        let start = (page.max(1) as usize - 1) * per_page as usize;
        let page_items = items.iter().skip(start).take(per_page as usize).cloned().collect();
        Ok(Listing { items: page_items, total: items.len() as u64 })
    }

    async fn get_direct_link(&self, path: &str, _password: Option<&str>) -> Result<String, RemoteError> {
        if !self.exists(path) {
            return Err(RemoteError::Api { code: 500, message: NOT_FOUND_MESSAGE.to_string() });
        }
        Ok(format!("{}/d{}", self.server_url(), normalize_path(path)))
    }

    async fn upload_file(
        &self,
        dir: &str,
        desired_name: &str,
        _content: Vec<u8>,
        declared_type: Option<&str>,
    ) -> Result<(), RemoteError> {
        let content_type = super::content_type_for(desired_name, declared_type);
        self.add_file(dir, desired_name);
        self.inner
            .lock()
            .unwrap()
            .uploads
            .push((join_path(dir, desired_name), content_type));
        Ok(())
    }

    async fn create_folder(&self, parent: &str, name: &str) -> Result<(), RemoteError> {
        self.add_dir(&join_path(parent, name));
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<(), RemoteError> {
        let path = normalize_path(path);
        let mut inner = self.inner.lock().unwrap();
        if inner.failing_deletes.contains(&path) {
            return Err(RemoteError::Api { code: 500, message: "delete failed".to_string() });
        }
        let (parent, name) = split_path(&path);
        if let Some(items) = inner.dirs.get_mut(&parent) {
            items.retain(|f| f.name != name);
        }
        inner.dirs.remove(&path);
        Ok(())
    }
}
