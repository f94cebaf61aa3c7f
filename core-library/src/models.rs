//! Domain models for photo search results
//!
//! These types mirror the remote listing envelope field-for-field so that a
//! decoded page can be re-encoded (favorites archive) without losing data.

use bytes::Bytes;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of items on every full listing page, as requested by the
/// search configuration.
pub const RESULTS_PER_PAGE: usize = core_runtime::config::RESULTS_PER_PAGE as usize;

/// `stat` value of a usable listing envelope.
pub const STAT_OK: &str = "ok";

// =============================================================================
// ID Types
// =============================================================================

/// Stable identity of a photo as assigned by the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhotoId(pub String);

impl PhotoId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PhotoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PhotoId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

// =============================================================================
// Photo
// =============================================================================

/// One listing entry.
///
/// Equality is by [`PhotoId`] only: two photos with the same id are
/// interchangeable whatever their other fields hold.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Photo {
    pub id: PhotoId,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub views: Option<String>,
    /// Epoch seconds, as sent by the remote service
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub dateupload: Option<String>,
    #[serde(default)]
    pub farm: Option<i64>,
    #[serde(default)]
    pub isfamily: Option<i64>,
    #[serde(default)]
    pub isfriend: Option<i64>,
    #[serde(default)]
    pub ispublic: Option<i64>,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub secret: Option<String>,
    #[serde(default)]
    pub server: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub url_s: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub height_s: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub width_s: Option<String>,
    #[serde(default)]
    pub url_m: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub height_m: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub width_m: Option<String>,
    /// Thumbnail bytes, fetched lazily after the listing arrives
    #[serde(
        rename = "imageThumbnailData",
        default,
        skip_serializing_if = "Option::is_none",
        with = "base64_bytes"
    )]
    pub thumbnail: Option<Bytes>,
}

impl PartialEq for Photo {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Photo {}

impl Photo {
    /// A photo with only its identity set.
    pub fn new(id: impl Into<PhotoId>) -> Self {
        Self {
            id: id.into(),
            views: None,
            dateupload: None,
            farm: None,
            isfamily: None,
            isfriend: None,
            ispublic: None,
            owner: None,
            secret: None,
            server: None,
            title: None,
            url_s: None,
            height_s: None,
            width_s: None,
            url_m: None,
            height_m: None,
            width_m: None,
            thumbnail: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_thumbnail_url(mut self, url: impl Into<String>) -> Self {
        self.url_s = Some(url.into());
        self
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// Upload time in epoch seconds.
    pub fn upload_timestamp(&self) -> Option<i64> {
        self.dateupload.as_deref()?.trim().parse().ok()
    }

    pub fn uploaded_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.upload_timestamp()?, 0).single()
    }

    /// View count; missing or malformed values count as 0.
    pub fn view_count(&self) -> u64 {
        self.views
            .as_deref()
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(0)
    }

    /// Small image URL (`url_s`), non-empty.
    pub fn thumbnail_url(&self) -> Option<&str> {
        self.url_s.as_deref().filter(|url| !url.is_empty())
    }

    /// Medium image URL (`url_m`), non-empty.
    pub fn medium_url(&self) -> Option<&str> {
        self.url_m.as_deref().filter(|url| !url.is_empty())
    }

    pub fn has_thumbnail(&self) -> bool {
        self.thumbnail.is_some()
    }
}

impl From<&str> for Photo {
    fn from(id: &str) -> Self {
        Photo::new(id)
    }
}

// =============================================================================
// Listing envelope
// =============================================================================

/// Top-level listing response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultsEnvelope {
    pub stat: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photos: Option<PhotoListPage>,
}

impl ResultsEnvelope {
    pub fn is_ok(&self) -> bool {
        self.stat == STAT_OK
    }
}

/// The `photos` object of a listing response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhotoListPage {
    pub page: u32,
    pub pages: u32,
    pub perpage: u32,
    #[serde(default)]
    pub photo: Option<Vec<Photo>>,
    /// Declared total number of results, sent as a string
    #[serde(deserialize_with = "lenient::string")]
    pub total: String,
}

impl PhotoListPage {
    /// Parsed [`total`](Self::total); a malformed value counts as 0.
    pub fn total_count(&self) -> u64 {
        self.total.trim().parse().unwrap_or(0)
    }

    pub fn photos(&self) -> &[Photo] {
        self.photo.as_deref().unwrap_or(&[])
    }
}

/// Serde helpers for `Option<Bytes>` carried as standard base64.
pub(crate) mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use bytes::Bytes;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Option<Bytes>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(bytes) => serializer.serialize_str(&STANDARD.encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Bytes>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded: Option<String> = Option::deserialize(deserializer)?;
        encoded
            .map(|text| {
                STANDARD
                    .decode(text.as_bytes())
                    .map(Bytes::from)
                    .map_err(serde::de::Error::custom)
            })
            .transpose()
    }
}

/// The remote service is inconsistent about quoting numeric fields.
mod lenient {
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrNumber {
        Text(String),
        Int(i64),
        Float(f64),
    }

    impl From<StringOrNumber> for String {
        fn from(value: StringOrNumber) -> Self {
            match value {
                StringOrNumber::Text(text) => text,
                StringOrNumber::Int(n) => n.to_string(),
                StringOrNumber::Float(n) => n.to_string(),
            }
        }
    }

    pub fn string<'de, D>(deserializer: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        StringOrNumber::deserialize(deserializer).map(String::from)
    }

    pub fn opt_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<StringOrNumber>::deserialize(deserializer).map(|v| v.map(String::from))
    }
}
