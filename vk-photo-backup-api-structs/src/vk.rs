//! Response bodies of the VK `photos.get` method.

/// Every VK method answers with either an `error` or a `response` object.
#[derive(Debug, serde::Deserialize)]
#[serde(untagged)]
pub enum Envelope<T> {
    Error { error: ApiError },
    Response { response: T },
}

#[derive(Clone, Debug, PartialEq, serde::Deserialize)]
pub struct ApiError {
    #[serde(default)]
    pub error_code: i64,
    pub error_msg: String,
}

#[derive(Debug, serde::Deserialize)]
pub struct PhotoList {
    pub count: u64,
    #[serde(default)]
    pub items: Vec<PhotoItem>,
}

#[derive(Clone, Debug, serde::Deserialize)]
pub struct PhotoItem {
    #[serde(default)]
    pub id: i64,
    /// Unix timestamp in seconds.
    pub date: i64,
    pub likes: Likes,
    /// Ordered from the smallest variant to the largest one.
    #[serde(default)]
    pub sizes: Vec<PhotoSize>,
}

#[derive(Clone, Debug, serde::Deserialize)]
pub struct Likes {
    pub count: u64,
}

#[derive(Clone, Debug, PartialEq, serde::Deserialize)]
pub struct PhotoSize {
    #[serde(rename = "type")]
    pub kind: String,
    pub url: String,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
}
