//! Catalog service: the only writer of the record store.
//!
//! `add_video` and `update_video` are the same upsert; the split lets
//! callers count intent. A partial-field merge for `update_video` would
//! belong here, but every write is currently a full replace.

use anyhow::Result;
use log::{debug, warn};

use crate::db::{Database, IsNew, VideoRecord};

#[derive(Clone)]
pub struct CatalogService {
    db: Database,
}

impl CatalogService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub async fn get_video(&self, id: &str) -> Result<Option<VideoRecord>> {
        self.db.get_video(id).await
    }

    pub async fn get_video_by_url(&self, url: &str) -> Result<Option<VideoRecord>> {
        self.db.get_video_by_url(url).await
    }

    pub async fn get_all_videos(&self) -> Result<Vec<VideoRecord>> {
        self.db.get_all_videos().await
    }

    /// Write a record the caller believes is new. Overwrites silently if not.
    pub async fn add_video(&self, video: VideoRecord) -> Result<VideoRecord> {
        debug!("adding video {}", video.id);
        self.db.put_video(video).await
    }

    /// Write a record the caller looked up beforehand.
    pub async fn update_video(&self, video: VideoRecord) -> Result<VideoRecord> {
        debug!("updating video {}", video.id);
        self.db.put_video(video).await
    }
}

/// True when a write would move a watched record back to new. The store
/// still accepts it; callers flag it.
pub fn is_repromotion(existing: &VideoRecord, incoming: &VideoRecord) -> bool {
    let repromoted = existing.is_new == IsNew::No && incoming.is_new == IsNew::Yes;
    if repromoted {
        warn!(
            "video {} re-promoted from watched to new; incoming write wins",
            incoming.id
        );
    }
    repromoted
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn add_and_update_are_both_upserts() {
        let catalog = CatalogService::new(Database::in_memory().unwrap());
        let record = VideoRecord::new("v1", "https://x/v1", "T");

        catalog.add_video(record.clone()).await.unwrap();
        catalog.add_video(record.clone()).await.unwrap();
        assert_eq!(catalog.get_all_videos().await.unwrap().len(), 1);

        let mut renamed = record.clone();
        renamed.title = "Renamed".into();
        catalog.update_video(renamed).await.unwrap();

        let stored = catalog.get_video("v1").await.unwrap().unwrap();
        assert_eq!(stored.title, "Renamed");
        let by_url = catalog.get_video_by_url("https://x/v1").await.unwrap().unwrap();
        assert_eq!(by_url.id, "v1");
    }

    #[test]
    fn repromotion_is_only_no_to_yes() {
        let mut watched = VideoRecord::new("v1", "u", "t");
        watched.is_new = IsNew::No;
        let fresh = VideoRecord::new("v1", "u", "t");

        assert!(is_repromotion(&watched, &fresh));
        assert!(!is_repromotion(&fresh, &watched));
        assert!(!is_repromotion(&watched, &watched));
    }
}
