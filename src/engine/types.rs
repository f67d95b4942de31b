//! Core record types.
//!
//! [`PhotoAsset`] (an uploaded photo, temporary or attached), [`Diary`] (an
//! entry that owns its photos), [`Album`] (a location album derived by the
//! reconciler), plus the input shapes accepted by the create paths.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Location hierarchy resolved from raw coordinates. Missing levels are empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedLocation {
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub admin1: String,
    #[serde(default)]
    pub locality: String,
}

impl ResolvedLocation {
    pub fn new(country: &str, admin1: &str, locality: &str) -> Self {
        Self {
            country: country.trim().to_string(),
            admin1: admin1.trim().to_string(),
            locality: locality.trim().to_string(),
        }
    }
}

/// A photo record, matching the `photos` table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhotoAsset {
    pub id: i64,
    pub owner_id: i64,
    /// Storage URL returned by the storage port.
    pub url: String,
    /// ISO 8601 capture time, if the client supplied one.
    pub captured_at: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// `None` until the geocoder has run for this photo.
    pub location: Option<ResolvedLocation>,
    /// 1-based position, set at finalize and on attachment.
    pub sequence: Option<u32>,
    /// Owning diary. `None` means the photo is temporary.
    pub diary_id: Option<i64>,
    pub created_at: String,
}

impl PhotoAsset {
    pub fn is_temporary(&self) -> bool {
        self.diary_id.is_none()
    }
}

/// A diary entry together with its attached photos in sequence order.
#[derive(Debug, Clone, Serialize)]
pub struct Diary {
    pub id: i64,
    pub owner_id: i64,
    pub title: String,
    pub content: String,
    pub mood: Option<String>,
    pub favorite: bool,
    pub created_at: String,
    pub updated_at: String,
    /// Set while the diary sits in the trash.
    pub deleted_at: Option<String>,
    pub photos: Vec<PhotoAsset>,
}

impl Diary {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Album {
    pub id: i64,
    pub owner_id: i64,
    pub name: String,
    pub cover_url: Option<String>,
    pub created_at: String,
}

/// An album with the number of active diaries linked to it.
#[derive(Debug, Clone, Serialize)]
pub struct AlbumSummary {
    #[serde(flatten)]
    pub album: Album,
    pub diary_count: i64,
}

/// Text fields of a diary, shared by both create paths.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DiaryDraft {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    pub mood: Option<String>,
}

/// Inline photo descriptor accepted by manual diary creation.
#[derive(Debug, Clone, Deserialize)]
pub struct NewPhoto {
    pub url: String,
    pub captured_at: Option<DateTime<Utc>>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Already-resolved location, if the client has one.
    pub location: Option<ResolvedLocation>,
}

/// Client-supplied metadata for an upload.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UploadMeta {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub captured_at: Option<DateTime<Utc>>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}
