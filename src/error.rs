use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackupError {
    /// VK answered with an error envelope.
    #[error("{message}")]
    Source { message: String },
    #[error("The user does not have any profile photos")]
    NoProfilePhotos,
    #[error("Failed to create folder '{path}' (HTTP {status}): {message}")]
    FolderCreation {
        path: String,
        status: u16,
        message: String,
    },
    /// Raw payload of a 401 answer to an upload request.
    #[error("{0}")]
    Unauthorized(serde_json::Value),
    #[error("HTTP request failed: {0}")]
    Http(surf::Error),
    #[error("couldn't decode {what}: {source}")]
    Decode {
        what: &'static str,
        source: serde_json::Error,
    },
    #[error("couldn't encode upload records")]
    Encode(#[from] serde_json::Error),
    #[error("invalid API URL")]
    Url(#[from] url::ParseError),
    #[error("photo date {0} is out of range")]
    Timestamp(i64),
    #[error("timestamp formatting error")]
    Format(#[from] time::error::Format),
    #[error("upload record log error")]
    Io(#[from] std::io::Error),
}

// surf::Error doesn't implement std::error::Error, so it can't be a #[from] source.
impl From<surf::Error> for BackupError {
    fn from(error: surf::Error) -> Self {
        BackupError::Http(error)
    }
}

pub(crate) fn decode<T: serde::de::DeserializeOwned>(
    what: &'static str,
    body: &str,
) -> Result<T, BackupError> {
    serde_json::from_str(body).map_err(|source| BackupError::Decode { what, source })
}
