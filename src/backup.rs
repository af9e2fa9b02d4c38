use std::time::Duration;

use time::{OffsetDateTime, UtcOffset};

use crate::disk::{CloudStorage, UploadRequest};
use crate::error::BackupError;
use crate::models::photos::{Photo, UploadRecord, UploadStatus, STAMP_FORMAT};
use crate::record::RecordLog;
use crate::vk::PhotoSource;
use vk_photo_backup_api_structs::disk::OperationStatus;

pub const DEFAULT_FOLDER_PREFIX: &str = "vkphotobackup";

#[derive(Clone, Debug, PartialEq)]
pub struct PollConfig {
    pub attempts: u32,
    pub interval: Duration,
}

impl PollConfig {
    /// Total time a photo is given, one interval after every status check.
    pub fn window(&self) -> Duration {
        self.interval * self.attempts
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        PollConfig {
            attempts: 5,
            interval: Duration::from_secs(2),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct BackupConfig {
    pub folder_prefix: String,
    pub poll: PollConfig,
    pub utc_offset: UtcOffset,
}

impl Default for BackupConfig {
    fn default() -> Self {
        BackupConfig {
            folder_prefix: DEFAULT_FOLDER_PREFIX.to_string(),
            poll: PollConfig::default(),
            utc_offset: UtcOffset::UTC,
        }
    }
}

#[derive(Debug)]
pub struct Summary {
    pub folder: String,
    pub uploaded: usize,
    pub total: usize,
    pub records: Vec<UploadRecord>,
}

impl std::fmt::Display for Summary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{} photos successfully uploaded", self.uploaded, self.total)
    }
}

pub fn folder_name(prefix: &str, now: OffsetDateTime) -> Result<String, BackupError> {
    Ok(format!("{}_{}", prefix, now.format(STAMP_FORMAT)?))
}

/// Copies the profile photos of one VK user into a fresh Yandex Disk folder.
pub struct Backup<S, C> {
    source: S,
    storage: C,
    records: RecordLog,
    config: BackupConfig,
}

impl<S: PhotoSource, C: CloudStorage> Backup<S, C> {
    pub fn new(source: S, storage: C, records: RecordLog, config: BackupConfig) -> Self {
        Backup {
            source,
            storage,
            records,
            config,
        }
    }

    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc().to_offset(self.config.utc_offset)
    }

    pub async fn run(&self, owner_id: &str) -> Result<Summary, BackupError> {
        let photos = self.source.profile_photos(owner_id).await?;
        let folder = self.create_folder().await?;

        tracing::info!("Uploading photos to folder '{}'", folder);
        let total = photos.len();
        let mut uploaded = 0;
        let mut records = Vec::with_capacity(total);

        for (index, photo) in photos.iter().enumerate() {
            let status = self.upload(&folder, photo, index + 1, total).await?;
            if status == UploadStatus::Success {
                uploaded += 1;
            }
            records.push(UploadRecord::new(photo, status));
        }

        tracing::info!("Successfully uploaded {}/{} photos", uploaded, total);
        self.records.append_session(self.now(), &records)?;

        Ok(Summary {
            folder,
            uploaded,
            total,
            records,
        })
    }

    async fn create_folder(&self) -> Result<String, BackupError> {
        let folder = folder_name(&self.config.folder_prefix, self.now())?;
        tracing::info!("Creating folder '{}' on Yandex Disk", folder);

        if let Err(err) = self.storage.create_folder(&folder).await {
            tracing::error!("Failed to create folder '{}' on Yandex Disk: {}", folder, err);
            return Err(err);
        }

        tracing::info!("Successfully created folder '{}'", folder);
        Ok(folder)
    }

    /// Only an authorization failure aborts the run; every other outcome
    /// becomes the photo's record status.
    async fn upload(
        &self,
        folder: &str,
        photo: &Photo,
        position: usize,
        total: usize,
    ) -> Result<UploadStatus, BackupError> {
        tracing::info!(
            "Uploading [{}/{}] photo '{}'",
            position,
            total,
            photo.file_name
        );

        let path = format!("{}/{}", folder, photo.file_name);
        let href = match self.storage.request_upload(&photo.url, &path).await? {
            UploadRequest::Accepted { href } => href,
            UploadRequest::Unauthorized(payload) => {
                tracing::error!(
                    "Failed to upload [{}/{}] photo '{}': Yandex Disk rejected the token",
                    position,
                    total,
                    photo.file_name
                );
                return Err(BackupError::Unauthorized(payload));
            },
            UploadRequest::Rejected { status, message } => {
                tracing::error!(
                    "Failed to upload [{}/{}] photo '{}' (HTTP {}): {}",
                    position,
                    total,
                    photo.file_name,
                    status,
                    message
                );
                return Ok(UploadStatus::Failed);
            },
        };

        let status = self.await_operation(&href).await?;
        match status {
            UploadStatus::Success => {
                tracing::info!("Successfully uploaded photo '{}'", photo.file_name)
            },
            UploadStatus::Failed => {
                tracing::warn!("Yandex Disk failed to upload photo '{}'", photo.file_name)
            },
            UploadStatus::Timeout => tracing::warn!(
                "Photo '{}' could not be uploaded in {} seconds",
                photo.file_name,
                self.config.poll.window().as_secs()
            ),
        }

        Ok(status)
    }

    async fn await_operation(&self, href: &str) -> Result<UploadStatus, BackupError> {
        let attempts = self.config.poll.attempts;
        for attempt in 1..=attempts {
            match self.storage.operation_status(href).await? {
                OperationStatus::Success => return Ok(UploadStatus::Success),
                OperationStatus::Failed => return Ok(UploadStatus::Failed),
                status => tracing::debug!(attempt, ?status, "Upload not finished yet"),
            }

            async_std::task::sleep(self.config.poll.interval).await;
        }

        Ok(UploadStatus::Timeout)
    }
}
