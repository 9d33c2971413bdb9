//! Catalog data models.
//!
//! `VideoRecord` is the unit of storage and travels camelCase over the RPC
//! wire. The companion app's snake_case shape lives in `sync::descriptor`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum IsNew {
    #[default]
    Yes,
    No,
}

impl IsNew {
    pub fn as_str(&self) -> &'static str {
        match self {
            IsNew::Yes => "Yes",
            IsNew::No => "No",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Channel {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VideoRecord {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub secondary_url: Option<String>,
    #[serde(default)]
    pub channel: Option<Channel>,
    #[serde(default)]
    pub duration_seconds: Option<f64>,
    /// Display copy of `duration_seconds`.
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub artwork_url: Option<String>,
    #[serde(default)]
    pub artwork_url_high_res: Option<String>,
    #[serde(default)]
    pub is_new: IsNew,
    #[serde(default = "default_star_rating")]
    pub star_rating: String,
    #[serde(default)]
    pub date_watched: Option<String>,
    #[serde(default)]
    pub date_added: Option<String>,
    #[serde(default)]
    pub date_published: Option<String>,
    #[serde(default)]
    pub start_at_seconds: Option<f64>,
    #[serde(default = "Utc::now")]
    pub saved_at: DateTime<Utc>,
    #[serde(default)]
    pub last_synced_at: Option<DateTime<Utc>>,
}

pub fn default_star_rating() -> String {
    "0".to_string()
}

impl VideoRecord {
    /// Minimal record with defaults for everything but the key fields.
    pub fn new(id: impl Into<String>, url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: None,
            url: url.into(),
            secondary_url: None,
            channel: None,
            duration_seconds: None,
            duration: None,
            source: String::new(),
            notes: String::new(),
            tags: Vec::new(),
            artwork_url: None,
            artwork_url_high_res: None,
            is_new: IsNew::Yes,
            star_rating: default_star_rating(),
            date_watched: None,
            date_added: None,
            date_published: None,
            start_at_seconds: None,
            saved_at: Utc::now(),
            last_synced_at: None,
        }
    }
}
