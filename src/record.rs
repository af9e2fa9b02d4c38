use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use time::format_description::FormatItem;
use time::macros::format_description;
use time::OffsetDateTime;

use crate::error::BackupError;
use crate::models::photos::UploadRecord;

pub const DEFAULT_PATH: &str = "uploaded_photos.json";
const SEPARATOR: &str = "===================================================================";
const SESSION_FORMAT: &[FormatItem<'_>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

/// Append-only log of upload sessions.
///
/// Every session adds a header line followed by the pretty-printed JSON list
/// of its records, so the file as a whole is not a single JSON document. The
/// file is never rotated or truncated.
#[derive(Clone, Debug)]
pub struct RecordLog {
    path: PathBuf,
}

impl RecordLog {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        RecordLog {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append_session(
        &self,
        started: OffsetDateTime,
        records: &[UploadRecord],
    ) -> Result<(), BackupError> {
        tracing::info!("Saving uploaded photos to file: '{}'", self.path.display());

        let block = session_block(started, records)?;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(block.as_bytes())?;

        tracing::info!("Successfully saved photos to file '{}'", self.path.display());
        Ok(())
    }
}

fn session_block(started: OffsetDateTime, records: &[UploadRecord]) -> Result<String, BackupError> {
    let mut json = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut json, formatter);
    records.serialize(&mut serializer)?;

    Ok(format!(
        "{}\nUpload session from {}:\n{}\n\n",
        SEPARATOR,
        started.format(SESSION_FORMAT)?,
        String::from_utf8_lossy(&json),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::photos::UploadStatus;

    fn record(file_name: &str, status: UploadStatus) -> UploadRecord {
        UploadRecord {
            file_name: file_name.to_string(),
            size: "z".to_string(),
            status,
        }
    }

    #[test]
    fn block_layout() {
        let started = OffsetDateTime::from_unix_timestamp(1614556800).unwrap();
        let records = [record("1_01032021_000000.jpg", UploadStatus::Success)];
        let block = session_block(started, &records).unwrap();

        assert_eq!(
            block,
            format!(
                "{}\nUpload session from 2021-03-01 00:00:00:\n[\n    {{\n        \"file_name\": \"1_01032021_000000.jpg\",\n        \"size\": \"z\",\n        \"status\": \"success\"\n    }}\n]\n\n",
                SEPARATOR
            )
        );
    }

    #[test]
    fn sessions_are_appended() {
        let path = std::env::temp_dir().join(format!(
            "vk-photo-backup-record-{}.json",
            std::process::id()
        ));
        let _ = std::fs::remove_file(&path);

        let log = RecordLog::new(&path);
        let started = OffsetDateTime::from_unix_timestamp(1614556800).unwrap();
        log.append_session(started, &[record("a.jpg", UploadStatus::Success)])
            .unwrap();
        log.append_session(started, &[record("b.jpg", UploadStatus::Timeout)])
            .unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(contents.matches("Upload session from").count(), 2);
        let a = contents.find("\"a.jpg\"").unwrap();
        let b = contents.find("\"b.jpg\"").unwrap();
        assert!(a < b);
        assert!(contents.contains("\"status\": \"timeout\""));
        assert!(contents.ends_with("]\n\n"));
    }
}
