//! Companion app descriptors: the snake_case JSON the companion app exports.
//!
//! Values arrive untyped. Each one is checked into `ExternalDescriptor`
//! before any field is trusted, then mapped 1:1 onto a `VideoRecord`.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use url::Url;

use crate::db::{helpers::parse_external_datetime, models::video::default_star_rating};
use crate::db::{Channel, IsNew, VideoRecord};

#[derive(Debug, Error)]
pub enum DescriptorError {
    #[error("descriptor is not a JSON object")]
    NotAnObject,
    #[error("descriptor has no id")]
    MissingId,
    #[error("descriptor has invalid field types: {0}")]
    InvalidShape(#[from] serde_json::Error),
    #[error("descriptor {id} has unrecognised is_new value {value}")]
    InvalidIsNew { id: String, value: Value },
    #[error("descriptor {id} has non-numeric star_rating {value}")]
    InvalidStarRating { id: String, value: Value },
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ExternalDescriptor {
    pub id: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
    pub secondary_url: Option<String>,
    pub channel_url: Option<String>,
    pub channel_name: Option<String>,
    pub duration_seconds: Option<f64>,
    pub duration: Option<f64>,
    pub source: Option<String>,
    pub notes: Option<String>,
    pub tags: Option<Vec<String>>,
    pub artwork_url: Option<String>,
    pub artwork_url_high_res: Option<String>,
    pub is_new: Option<Value>,
    pub star_rating: Option<Value>,
    pub date_watched: Option<String>,
    pub date_added: Option<String>,
    pub date_published: Option<String>,
    pub start_at_seconds: Option<f64>,
}

/// Sequence → as is, single object → one-element list, anything else → empty.
pub fn normalize(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        Value::Object(_) => vec![value],
        _ => Vec::new(),
    }
}

pub fn parse_descriptor(value: Value) -> Result<ExternalDescriptor, DescriptorError> {
    if !value.is_object() {
        return Err(DescriptorError::NotAnObject);
    }
    let descriptor: ExternalDescriptor = serde_json::from_value(value)?;
    match descriptor.id.as_deref().map(str::trim) {
        Some(id) if !id.is_empty() => Ok(descriptor),
        _ => Err(DescriptorError::MissingId),
    }
}

impl ExternalDescriptor {
    /// Map onto a record stamped as synced at `synced_at`. `saved_at` comes
    /// from the descriptor's own `date_added` when it parses.
    pub fn into_record(self, synced_at: DateTime<Utc>) -> Result<VideoRecord, DescriptorError> {
        let id = match self.id {
            Some(id) if !id.trim().is_empty() => id,
            _ => return Err(DescriptorError::MissingId),
        };
        let is_new = parse_is_new(&id, self.is_new)?;
        let star_rating = parse_star_rating(&id, self.star_rating)?;
        let channel = self
            .channel_url
            .as_deref()
            .and_then(|url| channel_from_url(url, self.channel_name.as_deref()));
        let saved_at = self
            .date_added
            .as_deref()
            .and_then(parse_external_datetime)
            .unwrap_or(synced_at);

        Ok(VideoRecord {
            id,
            title: self.title.unwrap_or_default(),
            description: self.description,
            url: self.url.unwrap_or_default(),
            secondary_url: self.secondary_url,
            channel,
            duration_seconds: self.duration_seconds,
            duration: self.duration.or(self.duration_seconds),
            source: self.source.unwrap_or_default(),
            notes: self.notes.unwrap_or_default(),
            tags: self.tags.unwrap_or_default(),
            artwork_url: self.artwork_url,
            artwork_url_high_res: self.artwork_url_high_res,
            is_new,
            star_rating,
            date_watched: self.date_watched,
            date_added: self.date_added,
            date_published: self.date_published,
            start_at_seconds: self.start_at_seconds,
            saved_at,
            last_synced_at: Some(synced_at),
        })
    }
}

fn parse_is_new(id: &str, value: Option<Value>) -> Result<IsNew, DescriptorError> {
    match value {
        None | Some(Value::Null) => Ok(IsNew::Yes),
        Some(Value::Bool(true)) => Ok(IsNew::Yes),
        Some(Value::Bool(false)) => Ok(IsNew::No),
        Some(Value::String(ref s)) if s.eq_ignore_ascii_case("yes") => Ok(IsNew::Yes),
        Some(Value::String(ref s)) if s.eq_ignore_ascii_case("no") => Ok(IsNew::No),
        Some(other) => Err(DescriptorError::InvalidIsNew {
            id: id.to_string(),
            value: other,
        }),
    }
}

fn parse_star_rating(id: &str, value: Option<Value>) -> Result<String, DescriptorError> {
    match value {
        None | Some(Value::Null) => Ok(default_star_rating()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(Value::String(s))
            if s.trim().parse::<f64>().map(f64::is_finite).unwrap_or(false) =>
        {
            Ok(s.trim().to_string())
        }
        Some(other) => Err(DescriptorError::InvalidStarRating {
            id: id.to_string(),
            value: other,
        }),
    }
}

/// Channel id is the last non-empty path segment of the channel url
/// (`/channel/UC123` → `UC123`, `/@handle` → `@handle`).
pub fn channel_from_url(channel_url: &str, name: Option<&str>) -> Option<Channel> {
    let parsed = Url::parse(channel_url.trim()).ok()?;
    let id = parsed
        .path_segments()?
        .filter(|segment| !segment.is_empty())
        .last()?
        .to_string();
    let name = name
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| id.clone());
    Some(Channel { id, name })
}
