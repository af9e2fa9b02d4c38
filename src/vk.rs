use time::UtcOffset;
use url::Url;

use crate::error::{decode, BackupError};
use crate::models::photos::Photo;
use vk_photo_backup_api_structs::vk::{Envelope, PhotoList};

pub const DEFAULT_API_BASE: &str = "https://api.vk.com/method";
const API_VERSION: &str = "5.130";
const ALBUM_ID: &str = "profile";

#[async_trait::async_trait]
pub trait PhotoSource {
    /// Lists the profile photos of `owner_id`, largest size variant each.
    async fn profile_photos(&self, owner_id: &str) -> Result<Vec<Photo>, BackupError>;
}

pub struct VkClient {
    http: surf::Client,
    api_base: String,
    access_token: String,
    utc_offset: UtcOffset,
}

impl VkClient {
    pub fn new(api_base: &str, access_token: String, utc_offset: UtcOffset) -> Self {
        VkClient {
            http: surf::Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
            access_token,
            utc_offset,
        }
    }

    fn photos_url(&self, owner_id: &str) -> Result<Url, BackupError> {
        let url = Url::parse_with_params(
            &format!("{}/photos.get", self.api_base),
            &[
                ("owner_id", owner_id),
                ("album_id", ALBUM_ID),
                ("extended", "1"),
                ("access_token", self.access_token.as_str()),
                ("v", API_VERSION),
            ],
        )?;
        Ok(url)
    }
}

#[async_trait::async_trait]
impl PhotoSource for VkClient {
    async fn profile_photos(&self, owner_id: &str) -> Result<Vec<Photo>, BackupError> {
        tracing::info!("Getting photos from 'https://vk.com/id{}'", owner_id);

        let url = self.photos_url(owner_id)?;
        let body = self.http.get(url.as_str()).recv_string().await?;
        let envelope: Envelope<PhotoList> = decode("VK photos.get response", &body)?;

        let photos = photos_from_envelope(envelope, self.utc_offset).map_err(|err| {
            tracing::error!("Failed to get photos from 'https://vk.com/id{}'", owner_id);
            tracing::error!("Error: {}", err);
            err
        })?;

        tracing::info!("Successfully got [{}] photos", photos.len());
        tracing::debug!("Obtained photos: {:?}", photos);
        Ok(photos)
    }
}

/// Unwraps a `photos.get` answer into the photos worth copying.
pub fn photos_from_envelope(
    envelope: Envelope<PhotoList>,
    offset: UtcOffset,
) -> Result<Vec<Photo>, BackupError> {
    let list = match envelope {
        Envelope::Error { error } => {
            return Err(BackupError::Source {
                message: error.error_msg,
            })
        },
        Envelope::Response { response } => response,
    };

    if list.count == 0 {
        return Err(BackupError::NoProfilePhotos);
    }

    let mut photos = Vec::with_capacity(list.items.len());
    for item in &list.items {
        match Photo::from_item(item, offset)? {
            Some(photo) => photos.push(photo),
            None => tracing::warn!("Skipping photo {} without any size variants", item.id),
        }
    }

    Ok(photos)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope(body: &str) -> Envelope<PhotoList> {
        serde_json::from_str(body).unwrap()
    }

    #[test]
    fn error_envelope_is_surfaced() {
        let envelope = envelope(
            r#"{"error":{"error_code":30,"error_msg":"This profile is private"}}"#,
        );
        match photos_from_envelope(envelope, UtcOffset::UTC) {
            Err(BackupError::Source { message }) => {
                assert_eq!(message, "This profile is private")
            },
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn zero_count_is_an_error() {
        let envelope = envelope(r#"{"response":{"count":0,"items":[]}}"#);
        let err = photos_from_envelope(envelope, UtcOffset::UTC).unwrap_err();
        assert!(matches!(err, BackupError::NoProfilePhotos));
        assert_eq!(err.to_string(), "The user does not have any profile photos");
    }

    #[test]
    fn items_are_mapped_in_order() {
        let envelope = envelope(
            r#"{"response":{"count":3,"items":[
                {"id":1,"date":1614556800,"likes":{"count":7},"sizes":[{"type":"s","url":"https://a/s"},{"type":"y","url":"https://a/y"}]},
                {"id":2,"date":1614556801,"likes":{"count":0},"sizes":[]},
                {"id":3,"date":1614643200,"likes":{"count":12},"sizes":[{"type":"w","url":"https://b/w"}]}
            ]}}"#,
        );
        let photos = photos_from_envelope(envelope, UtcOffset::UTC).unwrap();

        assert_eq!(
            photos,
            vec![
                Photo {
                    file_name: "7_01032021_000000.jpg".to_string(),
                    size: "y".to_string(),
                    url: "https://a/y".to_string(),
                },
                Photo {
                    file_name: "12_02032021_000000.jpg".to_string(),
                    size: "w".to_string(),
                    url: "https://b/w".to_string(),
                },
            ]
        );
    }

    #[test]
    fn request_parameters() {
        let client = VkClient::new(
            "https://api.vk.com/method/",
            "token".to_string(),
            UtcOffset::UTC,
        );
        let url = client.photos_url("1").unwrap();

        assert_eq!(url.path(), "/method/photos.get");
        let params: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            params,
            vec![
                ("owner_id".to_string(), "1".to_string()),
                ("album_id".to_string(), "profile".to_string()),
                ("extended".to_string(), "1".to_string()),
                ("access_token".to_string(), "token".to_string()),
                ("v".to_string(), "5.130".to_string()),
            ]
        );
    }
}
