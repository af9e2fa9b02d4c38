use serde::Serialize;
use time::format_description::FormatItem;
use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};

use crate::error::BackupError;
use vk_photo_backup_api_structs::vk::PhotoItem;

pub(crate) const STAMP_FORMAT: &[FormatItem<'_>] =
    format_description!("[day][month][year]_[hour][minute][second]");

/// A profile photo ready to be copied, using its largest size variant.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Photo {
    pub file_name: String,
    pub size: String,
    pub url: String,
}

impl Photo {
    /// Returns `None` for items without any size variants.
    pub fn from_item(item: &PhotoItem, offset: UtcOffset) -> Result<Option<Self>, BackupError> {
        let largest = match item.sizes.last() {
            Some(size) => size,
            None => return Ok(None),
        };

        Ok(Some(Photo {
            file_name: file_name(item.likes.count, item.date, offset)?,
            size: largest.kind.clone(),
            url: largest.url.clone(),
        }))
    }
}

/// `<likes>_<DDMMYYYY_HHMMSS>.jpg`
pub fn file_name(likes: u64, date: i64, offset: UtcOffset) -> Result<String, BackupError> {
    let taken = OffsetDateTime::from_unix_timestamp(date)
        .map_err(|_| BackupError::Timestamp(date))?
        .to_offset(offset);

    Ok(format!("{}_{}.jpg", likes, taken.format(STAMP_FORMAT)?))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    Success,
    /// Never reported success within the polling window.
    Timeout,
    Failed,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct UploadRecord {
    pub file_name: String,
    pub size: String,
    pub status: UploadStatus,
}

impl UploadRecord {
    pub fn new(photo: &Photo, status: UploadStatus) -> Self {
        UploadRecord {
            file_name: photo.file_name.clone(),
            size: photo.size.clone(),
            status,
        }
    }
}
