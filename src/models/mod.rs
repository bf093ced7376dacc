use serde::{Deserialize, Serialize};

// ============================================================================
// Metadata Models
// ============================================================================

/// Open Graph metadata extracted from a single page.
///
/// Every field is a plain string where the empty string means "absent".
/// The serialized field names (`Title`, `SiteName`, ...) are the cache wire
/// format and the `data.data` shape of the preview response, so renaming a
/// field invalidates every cached entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MetadataRecord {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub site_name: String,
    #[serde(default)]
    pub icon: String,
}

impl MetadataRecord {
    /// Returns `true` when no field was populated.
    pub fn is_empty(&self) -> bool {
        self.title.is_empty()
            && self.description.is_empty()
            && self.image.is_empty()
            && self.site_name.is_empty()
            && self.icon.is_empty()
    }
}

// ============================================================================
// Response Models
// ============================================================================

/// Payload of a successful `GET /?url=...`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviewDto {
    pub url: String,
    pub data: MetadataRecord,
}

/// Response envelope shared by every route.
///
/// Logical failures are carried in `status`/`message`; the HTTP status code
/// stays 200.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub data: Option<T>,
    pub status: bool,
    pub message: String,
    pub current_time: i64,
}

impl<T> Envelope<T> {
    pub fn ok(data: T) -> Self {
        Envelope {
            data: Some(data),
            status: true,
            message: String::new(),
            current_time: chrono::Utc::now().timestamp(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Envelope {
            data: None,
            status: false,
            message: message.into(),
            current_time: chrono::Utc::now().timestamp(),
        }
    }
}
