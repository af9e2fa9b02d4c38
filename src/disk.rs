use surf::StatusCode;
use url::Url;

use crate::error::{decode, BackupError};
use vk_photo_backup_api_structs::disk::{ErrorBody, Link, Operation, OperationStatus};

pub const DEFAULT_API_BASE: &str = "https://cloud-api.yandex.net/v1/disk";

/// Outcome of asking the storage to fetch a photo by URL.
#[derive(Debug)]
pub enum UploadRequest {
    /// Operation started, poll `href` for its status.
    Accepted { href: String },
    /// The token was rejected; the raw payload is kept for the caller.
    Unauthorized(serde_json::Value),
    Rejected { status: u16, message: String },
}

#[async_trait::async_trait]
pub trait CloudStorage {
    async fn create_folder(&self, path: &str) -> Result<(), BackupError>;

    async fn request_upload(&self, source_url: &str, path: &str)
        -> Result<UploadRequest, BackupError>;

    async fn operation_status(&self, href: &str) -> Result<OperationStatus, BackupError>;
}

pub struct DiskClient {
    http: surf::Client,
    api_base: String,
    authorization: String,
}

impl DiskClient {
    pub fn new(api_base: &str, token: &str) -> Self {
        DiskClient {
            http: surf::Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
            authorization: authorization_header(token),
        }
    }

    fn endpoint(&self, resource: &str, params: &[(&str, &str)]) -> Result<Url, BackupError> {
        let url = Url::parse_with_params(&format!("{}/{}", self.api_base, resource), params)?;
        Ok(url)
    }
}

/// Bare tokens get the `OAuth` scheme, anything with a scheme is sent as-is.
pub fn authorization_header(token: &str) -> String {
    let token = token.trim();
    if token.contains(' ') {
        token.to_string()
    } else {
        format!("OAuth {}", token)
    }
}

/// Best-effort extraction of the provider's `message` field.
fn error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(error) => error.message,
        Err(_) => body.to_string(),
    }
}

/// Folder creation succeeds on 201 only.
fn folder_outcome(path: &str, status: StatusCode, body: &str) -> Result<(), BackupError> {
    if status != StatusCode::Created {
        return Err(BackupError::FolderCreation {
            path: path.to_string(),
            status: status.into(),
            message: error_message(body),
        });
    }

    Ok(())
}

fn upload_outcome(status: StatusCode, body: &str) -> Result<UploadRequest, BackupError> {
    if status == StatusCode::Unauthorized {
        let payload = serde_json::from_str(body)
            .unwrap_or_else(|_| serde_json::Value::String(body.to_string()));
        return Ok(UploadRequest::Unauthorized(payload));
    }

    if !status.is_success() {
        return Ok(UploadRequest::Rejected {
            status: status.into(),
            message: error_message(body),
        });
    }

    let link: Link = decode("upload operation link", body)?;
    Ok(UploadRequest::Accepted { href: link.href })
}

#[async_trait::async_trait]
impl CloudStorage for DiskClient {
    async fn create_folder(&self, path: &str) -> Result<(), BackupError> {
        let url = self.endpoint("resources", &[("path", path)])?;
        let mut res = self
            .http
            .put(url.as_str())
            .header("Authorization", self.authorization.as_str())
            .await?;

        let status = res.status();
        let body = res.body_string().await?;
        folder_outcome(path, status, &body)
    }

    async fn request_upload(
        &self,
        source_url: &str,
        path: &str,
    ) -> Result<UploadRequest, BackupError> {
        let url = self.endpoint("resources/upload", &[("url", source_url), ("path", path)])?;
        let mut res = self
            .http
            .post(url.as_str())
            .header("Authorization", self.authorization.as_str())
            .await?;

        let status = res.status();
        let body = res.body_string().await?;
        upload_outcome(status, &body)
    }

    async fn operation_status(&self, href: &str) -> Result<OperationStatus, BackupError> {
        let body = self
            .http
            .get(href)
            .header("Authorization", self.authorization.as_str())
            .recv_string()
            .await?;

        let operation: Operation = decode("upload operation status", &body)?;
        Ok(operation.status)
    }
}
