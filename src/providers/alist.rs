//! AList-compatible File Host Client
//!
//! Implements RemoteClient against the AList v3 REST API.
//! Authentication: raw token in the `Authorization` header; username/password
//! configs are exchanged for a token via /api/auth/login on first use.
//!
//! API Base: {server_url}/api
//! Envelope: `{ "code": 200, "message": "success", "data": ... }`. The HTTP
//! status is 200 for most failures, so success is decided by `code`.
//! Directory passwords travel in the request body of fs/list and fs/get.

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::{debug, info};

use super::{
    content_type_for, join_path, normalize_path, send_with_retry, split_path, AuthDetails,
    ConnectionConfig, FileInfo, HttpRetryConfig, Listing, RemoteClient, RemoteError,
};

fn alist_log(msg: &str) {
    info!("[ALIST] {}", msg);
}

// ─── API Types ───────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    code: i64,
    #[serde(default)]
    message: String,
    data: Option<T>,
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoginData {
    token: String,
}

#[derive(Serialize)]
struct ListRequest<'a> {
    path: &'a str,
    password: &'a str,
    page: u32,
    per_page: u32,
    refresh: bool,
}

#[derive(Debug, Deserialize)]
struct ListData {
    /// `null` for an empty directory
    content: Option<Vec<ObjEntry>>,
    #[serde(default)]
    total: u64,
}

#[derive(Debug, Deserialize)]
struct ObjEntry {
    name: String,
    #[serde(default)]
    is_dir: bool,
    #[serde(default)]
    size: u64,
    #[serde(default)]
    modified: Option<String>,
    #[serde(default)]
    thumb: Option<String>,
    #[serde(default, rename = "type")]
    obj_type: i32,
}

impl From<ObjEntry> for FileInfo {
    fn from(entry: ObjEntry) -> Self {
        let modified = entry
            .modified
            .as_deref()
            .and_then(|m| chrono::DateTime::parse_from_rfc3339(m).ok())
            .map(|dt| dt.with_timezone(&chrono::Utc));
        FileInfo {
            name: entry.name,
            is_dir: entry.is_dir,
            size: entry.size,
            modified,
            thumbnail_url: entry.thumb.filter(|t| !t.is_empty()),
            raw_type: entry.obj_type,
        }
    }
}

#[derive(Serialize)]
struct GetRequest<'a> {
    path: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct GetData {
    #[serde(default)]
    raw_url: String,
}

#[derive(Serialize)]
struct MkdirRequest<'a> {
    path: &'a str,
}

#[derive(Serialize)]
struct RemoveRequest<'a> {
    dir: &'a str,
    names: Vec<&'a str>,
}

// ─── Client ──────────────────────────────────────────────────────────────

pub struct AListClient {
    config: ConnectionConfig,
    client: reqwest::Client,
    retry: HttpRetryConfig,
    /// Token from config or from the first successful login
    token: OnceCell<Option<String>>,
}

impl AListClient {
    pub fn new(config: ConnectionConfig) -> Result<Self, RemoteError> {
        config.validate()?;
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(300))
            .connect_timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| RemoteError::Transport(format!("HTTP client init failed: {}", e)))?;
        Ok(Self {
            config,
            client,
            retry: HttpRetryConfig::default(),
            token: OnceCell::new(),
        })
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    fn api_url(&self, endpoint: &str) -> String {
        format!("{}/api/{}", self.config.server_url, endpoint.trim_start_matches('/'))
    }

    /// Resolve the token to send, logging in once for credential configs
    async fn auth_token(&self) -> Result<Option<String>, RemoteError> {
        let token = self
            .token
            .get_or_try_init(|| async {
                match &self.config.auth_details {
                    None => Ok(None),
                    Some(AuthDetails::Token { token }) => Ok(Some(token.clone())),
                    Some(AuthDetails::Credentials { username, password }) => {
                        self.login(username, password).await.map(Some)
                    }
                }
            })
            .await?;
        Ok(token.clone())
    }

    async fn login(&self, username: &str, password: &str) -> Result<String, RemoteError> {
        alist_log(&format!("Logging in as {}", username));
        let request = self
            .client
            .post(self.api_url("auth/login"))
            .json(&LoginRequest { username, password })
            .build()
            .map_err(|e| RemoteError::Transport(format!("Build login request failed: {}", e)))?;
        let resp = send_with_retry(&self.client, request, &self.retry)
            .await
            .map_err(|e| RemoteError::Transport(format!("Login failed: {}", e)))?;
        let data: LoginData = Self::parse_api(resp).await?;
        Ok(data.token)
    }

    async fn post_json<B: Serialize + ?Sized, T: for<'de> Deserialize<'de>>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<T, RemoteError> {
        let mut builder = self.client.post(self.api_url(endpoint)).json(body);
        if let Some(token) = self.auth_token().await? {
            builder = builder.header(AUTHORIZATION, token);
        }
        let request = builder
            .build()
            .map_err(|e| RemoteError::Transport(format!("Build {} request failed: {}", endpoint, e)))?;
        let resp = send_with_retry(&self.client, request, &self.retry)
            .await
            .map_err(|e| RemoteError::Transport(format!("{} failed: {}", endpoint, e)))?;
        Self::parse_api(resp).await
    }

    /// Like `post_json` for endpoints whose `data` is null on success
    async fn post_ack<B: Serialize + ?Sized>(&self, endpoint: &str, body: &B) -> Result<(), RemoteError> {
        let _: Option<serde_json::Value> = self.post_json(endpoint, body).await?;
        Ok(())
    }

    async fn parse_api<T: for<'de> Deserialize<'de>>(resp: reqwest::Response) -> Result<T, RemoteError> {
        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| RemoteError::Transport(format!("Failed to read response: {}", e)))?;

        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(RemoteError::AccountRejected(format!("HTTP {}", status)));
        }
        if !status.is_success() {
            return Err(RemoteError::Api {
                code: status.as_u16() as i64,
                message: text.chars().take(200).collect(),
            });
        }

        let api_resp: ApiResponse<T> = serde_json::from_str(&text).map_err(|e| {
            RemoteError::Parse(format!(
                "JSON parse error: {}. Body: {}",
                e,
                text.chars().take(200).collect::<String>()
            ))
        })?;

        match api_resp.code {
            200 => match api_resp.data {
                Some(data) => Ok(data),
                // Ack endpoints answer `data: null`; only an Option<_> target accepts it
                None => serde_json::from_value(serde_json::Value::Null).map_err(|_| {
                    RemoteError::Parse("API response missing 'data' field".to_string())
                }),
            },
            401 | 403 => Err(RemoteError::AuthRequired(api_resp.message)),
            code => Err(RemoteError::Api { code, message: api_resp.message }),
        }
    }

    /// Swap the origin of a backend link for the configured custom domain
    fn apply_custom_domain(&self, raw_url: &str) -> String {
        let Some(domain) = self.config.custom_domain_override.as_deref() else {
            return raw_url.to_string();
        };
        match url::Url::parse(raw_url) {
            Ok(parsed) => {
                let mut tail = parsed.path().to_string();
                if let Some(q) = parsed.query() {
                    tail.push('?');
                    tail.push_str(q);
                }
                format!("{}{}", domain.trim_end_matches('/'), tail)
            }
            Err(_) => raw_url.to_string(),
        }
    }
}

/// mkdir on an existing folder answers with an "already exists" style message
fn is_already_exists(error: &RemoteError) -> bool {
    matches!(error, RemoteError::Api { message, .. } if message.to_lowercase().contains("exist"))
}

#[async_trait]
impl RemoteClient for AListClient {
    fn server_url(&self) -> &str {
        &self.config.server_url
    }

    async fn list(
        &self,
        path: &str,
        password: Option<&str>,
        page: u32,
        per_page: u32,
    ) -> Result<Listing, RemoteError> {
        let path = normalize_path(path);
        debug!("[ALIST] list {} page={} per_page={}", path, page, per_page);
        let data: ListData = self
            .post_json(
                "fs/list",
                &ListRequest {
                    path: &path,
                    password: password.unwrap_or(""),
                    page: page.max(1),
                    per_page,
                    refresh: false,
                },
            )
            .await?;
        Ok(Listing {
            items: data.content.unwrap_or_default().into_iter().map(FileInfo::from).collect(),
            total: data.total,
        })
    }

    async fn get_direct_link(&self, path: &str, password: Option<&str>) -> Result<String, RemoteError> {
        let path = normalize_path(path);
        let data: GetData = self
            .post_json("fs/get", &GetRequest { path: &path, password: password.unwrap_or("") })
            .await?;
        if data.raw_url.is_empty() {
            return Err(RemoteError::Parse(format!("No direct link for {}", path)));
        }
        Ok(self.apply_custom_domain(&data.raw_url))
    }

    async fn upload_file(
        &self,
        dir: &str,
        desired_name: &str,
        content: Vec<u8>,
        declared_type: Option<&str>,
    ) -> Result<(), RemoteError> {
        let full_path = join_path(dir, desired_name);
        let content_type = content_type_for(desired_name, declared_type);
        alist_log(&format!("Uploading {} ({} bytes, {})", full_path, content.len(), content_type));

        let mut builder = self
            .client
            .put(self.api_url("fs/put"))
            .header("File-Path", urlencoding::encode(&full_path).into_owned())
            .header(CONTENT_TYPE, content_type)
            .body(content);
        if let Some(token) = self.auth_token().await? {
            builder = builder.header(AUTHORIZATION, token);
        }
        let request = builder
            .build()
            .map_err(|e| RemoteError::Transport(format!("Build upload request failed: {}", e)))?;
        let resp = send_with_retry(&self.client, request, &self.retry)
            .await
            .map_err(|e| RemoteError::Transport(format!("Upload failed: {}", e)))?;
        let _: Option<serde_json::Value> = Self::parse_api(resp).await?;
        Ok(())
    }

    async fn create_folder(&self, parent: &str, name: &str) -> Result<(), RemoteError> {
        let path = join_path(parent, name);
        match self.post_ack("fs/mkdir", &MkdirRequest { path: &path }).await {
            Err(e) if is_already_exists(&e) => {
                debug!("[ALIST] mkdir {}: already exists", path);
                Ok(())
            }
            other => other,
        }
    }

    async fn delete(&self, path: &str) -> Result<(), RemoteError> {
        let (dir, name) = split_path(path);
        if name.is_empty() {
            return Err(RemoteError::InvalidConfig("Refusing to delete the root directory".to_string()));
        }
        alist_log(&format!("Deleting {}", path));
        self.post_ack("fs/remove", &RemoveRequest { dir: &dir, names: vec![&name] }).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(domain: Option<&str>) -> AListClient {
        let mut config = ConnectionConfig::new("https://files.example.com/", None);
        if let Some(d) = domain {
            config = config.with_custom_domain(d);
        }
        AListClient::new(config).unwrap()
    }

    #[test]
    fn test_api_url() {
        let c = client(None);
        assert_eq!(c.api_url("fs/list"), "https://files.example.com/api/fs/list");
        assert_eq!(c.api_url("/fs/get"), "https://files.example.com/api/fs/get");
    }

    #[test]
    fn test_custom_domain_override() {
        let raw = "https://internal:5244/p/albums/a.jpg?sign=xyz";
        assert_eq!(client(None).apply_custom_domain(raw), raw);
        assert_eq!(
            client(Some("https://cdn.example.com/")).apply_custom_domain(raw),
            "https://cdn.example.com/p/albums/a.jpg?sign=xyz"
        );
    }

    #[test]
    fn test_obj_entry_conversion() {
        let entry: ObjEntry = serde_json::from_str(
            r#"{"name":"a.jpg","is_dir":false,"size":2048,"modified":"2024-03-01T10:00:00+08:00","thumb":"","type":5}"#,
        )
        .unwrap();
        let info = FileInfo::from(entry);
        assert_eq!(info.name, "a.jpg");
        assert_eq!(info.size, 2048);
        assert_eq!(info.raw_type, 5);
        assert!(info.thumbnail_url.is_none());
        assert_eq!(info.modified.unwrap().to_rfc3339(), "2024-03-01T02:00:00+00:00");
    }

    #[test]
    fn test_list_data_null_content() {
        let resp: ApiResponse<ListData> =
            serde_json::from_str(r#"{"code":200,"message":"success","data":{"content":null,"total":0}}"#)
                .unwrap();
        let data = resp.data.unwrap();
        assert!(data.content.is_none());
        assert_eq!(data.total, 0);
    }

    fn response(status: u16, body: &str) -> reqwest::Response {
        http::Response::builder()
            .status(status)
            .header("content-type", "application/json")
            .body(body.to_string())
            .unwrap()
            .into()
    }

    #[tokio::test]
    async fn test_envelope_code_decides_success() {
        let ok = AListClient::parse_api::<ListData>(response(
            200,
            r#"{"code":200,"message":"success","data":{"content":[{"name":"a.jpg","size":3}],"total":1}}"#,
        ))
        .await
        .unwrap();
        assert_eq!(ok.total, 1);
        assert_eq!(ok.content.unwrap()[0].name, "a.jpg");

        let denied = AListClient::parse_api::<ListData>(response(
            200,
            r#"{"code":403,"message":"password is incorrect or you have no permission","data":null}"#,
        ))
        .await
        .unwrap_err();
        assert!(
            matches!(denied, RemoteError::AuthRequired(ref m) if m.contains("password is incorrect"))
        );

        let failed = AListClient::parse_api::<ListData>(response(
            200,
            r#"{"code":500,"message":"failed get objs: failed get dir: object not found","data":null}"#,
        ))
        .await
        .unwrap_err();
        assert!(matches!(failed, RemoteError::Api { code: 500, ref message } if message.contains("object not found")));
    }

    #[tokio::test]
    async fn test_null_data_is_success_for_ack_endpoints() {
        let ack: Option<serde_json::Value> =
            AListClient::parse_api(response(200, r#"{"code":200,"message":"success","data":null}"#))
                .await
                .unwrap();
        assert!(ack.is_none());

        // A typed payload cannot be conjured from null
        let missing = AListClient::parse_api::<GetData>(response(200, r#"{"code":200,"message":"success","data":null}"#))
            .await
            .unwrap_err();
        assert!(matches!(missing, RemoteError::Parse(_)));
    }

    #[tokio::test]
    async fn test_http_status_errors() {
        let rejected = AListClient::parse_api::<ListData>(response(401, r#"{"message":"token is expired"}"#))
            .await
            .unwrap_err();
        assert!(matches!(rejected, RemoteError::AccountRejected(_)));

        let gateway = AListClient::parse_api::<ListData>(response(502, "Bad Gateway"))
            .await
            .unwrap_err();
        assert!(matches!(gateway, RemoteError::Api { code: 502, .. }));

        let garbage = AListClient::parse_api::<ListData>(response(200, "<html>"))
            .await
            .unwrap_err();
        assert!(matches!(garbage, RemoteError::Parse(_)));
    }

    #[test]
    fn test_mkdir_existing_folder_tolerated() {
        assert!(is_already_exists(&RemoteError::Api { code: 500, message: "file exists".to_string() }));
        assert!(is_already_exists(&RemoteError::Api { code: 403, message: "Object Already Exists".to_string() }));
        assert!(!is_already_exists(&RemoteError::Api { code: 500, message: "permission denied".to_string() }));
        assert!(!is_already_exists(&RemoteError::Transport("exists".to_string())));
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(AListClient::new(ConnectionConfig::new("not a url", None)).is_err());
    }
}
