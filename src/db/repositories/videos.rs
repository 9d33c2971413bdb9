use anyhow::{Context, Result};
use rusqlite::{params, OptionalExtension, Row};

use crate::db::{
    connection::Database,
    helpers::{decode_tags, encode_tags, parse_datetime, parse_is_new, parse_optional_datetime},
    models::{Channel, VideoRecord},
};

const VIDEO_COLUMNS: &str = "id, title, description, url, secondary_url, channel_id, channel_name,
     duration_seconds, duration, source, notes, tags, artwork_url, artwork_url_high_res,
     is_new, star_rating, date_watched, date_added, date_published, start_at_seconds,
     saved_at, last_synced_at";

fn row_to_video(row: &Row) -> Result<VideoRecord> {
    let channel_id: Option<String> = row.get("channel_id")?;
    let channel_name: Option<String> = row.get("channel_name")?;
    let tags: String = row.get("tags")?;
    let is_new: String = row.get("is_new")?;
    let saved_at: String = row.get("saved_at")?;
    let last_synced_at: Option<String> = row.get("last_synced_at")?;

    Ok(VideoRecord {
        id: row.get("id")?,
        title: row.get("title")?,
        description: row.get("description")?,
        url: row.get("url")?,
        secondary_url: row.get("secondary_url")?,
        channel: channel_id.map(|id| Channel {
            name: channel_name.unwrap_or_else(|| id.clone()),
            id,
        }),
        duration_seconds: row.get("duration_seconds")?,
        duration: row.get("duration")?,
        source: row.get("source")?,
        notes: row.get("notes")?,
        tags: decode_tags(&tags)?,
        artwork_url: row.get("artwork_url")?,
        artwork_url_high_res: row.get("artwork_url_high_res")?,
        is_new: parse_is_new(&is_new)?,
        star_rating: row.get("star_rating")?,
        date_watched: row.get("date_watched")?,
        date_added: row.get("date_added")?,
        date_published: row.get("date_published")?,
        start_at_seconds: row.get("start_at_seconds")?,
        saved_at: parse_datetime(&saved_at, "saved_at")?,
        last_synced_at: parse_optional_datetime(last_synced_at, "last_synced_at")?,
    })
}

impl Database {
    /// Get a video by its external id
    pub async fn get_video(&self, id: &str) -> Result<Option<VideoRecord>> {
        let id = id.to_string();
        self.execute(move |conn| {
            let mut stmt =
                conn.prepare(&format!("SELECT {VIDEO_COLUMNS} FROM videos WHERE id = ?1"))?;
            let mut rows = stmt.query(params![id])?;
            match rows.next()? {
                Some(row) => Ok(Some(row_to_video(row)?)),
                None => Ok(None),
            }
        })
        .await
    }

    /// Get the earliest stored video with this url. Urls are not unique.
    pub async fn get_video_by_url(&self, url: &str) -> Result<Option<VideoRecord>> {
        let url = url.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {VIDEO_COLUMNS} FROM videos WHERE url = ?1 ORDER BY rowid ASC LIMIT 1"
            ))?;
            let mut rows = stmt.query(params![url])?;
            match rows.next()? {
                Some(row) => Ok(Some(row_to_video(row)?)),
                None => Ok(None),
            }
        })
        .await
    }

    /// Get all videos, most recently saved first
    pub async fn get_all_videos(&self) -> Result<Vec<VideoRecord>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {VIDEO_COLUMNS} FROM videos ORDER BY saved_at DESC, rowid DESC"
            ))?;

            let mut rows = stmt.query([])?;
            let mut videos = Vec::new();
            while let Some(row) = rows.next()? {
                videos.push(row_to_video(row)?);
            }

            Ok(videos)
        })
        .await
    }

    pub async fn count_videos(&self) -> Result<u64> {
        self.execute(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM videos", [], |row| row.get(0))?;
            Ok(count.max(0) as u64)
        })
        .await
    }

    /// Insert or fully replace a video keyed by id.
    ///
    /// An existing row keeps its `saved_at`, and `last_synced_at` never moves
    /// backwards. Returns the record as stored.
    pub async fn put_video(&self, video: VideoRecord) -> Result<VideoRecord> {
        self.execute(move |conn| {
            let tx = conn.transaction()?;

            let existing: Option<(String, Option<String>)> = tx
                .query_row(
                    "SELECT saved_at, last_synced_at FROM videos WHERE id = ?1",
                    params![video.id],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;

            let mut record = video;
            if let Some((saved_at, last_synced_at)) = existing {
                record.saved_at = parse_datetime(&saved_at, "saved_at")?;
                let previous = parse_optional_datetime(last_synced_at, "last_synced_at")?;
                record.last_synced_at = match (previous, record.last_synced_at) {
                    (Some(prev), Some(next)) => Some(prev.max(next)),
                    (prev, next) => next.or(prev),
                };
            }

            tx.execute(
                &format!(
                    "INSERT INTO videos ({VIDEO_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15,
                             ?16, ?17, ?18, ?19, ?20, ?21, ?22)
                     ON CONFLICT(id) DO UPDATE SET
                         title = excluded.title,
                         description = excluded.description,
                         url = excluded.url,
                         secondary_url = excluded.secondary_url,
                         channel_id = excluded.channel_id,
                         channel_name = excluded.channel_name,
                         duration_seconds = excluded.duration_seconds,
                         duration = excluded.duration,
                         source = excluded.source,
                         notes = excluded.notes,
                         tags = excluded.tags,
                         artwork_url = excluded.artwork_url,
                         artwork_url_high_res = excluded.artwork_url_high_res,
                         is_new = excluded.is_new,
                         star_rating = excluded.star_rating,
                         date_watched = excluded.date_watched,
                         date_added = excluded.date_added,
                         date_published = excluded.date_published,
                         start_at_seconds = excluded.start_at_seconds,
                         last_synced_at = excluded.last_synced_at"
                ),
                params![
                    record.id,
                    record.title,
                    record.description,
                    record.url,
                    record.secondary_url,
                    record.channel.as_ref().map(|c| c.id.clone()),
                    record.channel.as_ref().map(|c| c.name.clone()),
                    record.duration_seconds,
                    record.duration,
                    record.source,
                    record.notes,
                    encode_tags(&record.tags)?,
                    record.artwork_url,
                    record.artwork_url_high_res,
                    record.is_new.as_str(),
                    record.star_rating,
                    record.date_watched,
                    record.date_added,
                    record.date_published,
                    record.start_at_seconds,
                    record.saved_at.to_rfc3339(),
                    record.last_synced_at.map(|dt| dt.to_rfc3339()),
                ],
            )
            .with_context(|| format!("failed to write video {}", record.id))?;

            tx.commit().context("failed to commit video write")?;
            Ok(record)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;
    use crate::db::models::IsNew;

    fn sample(id: &str, url: &str) -> VideoRecord {
        let mut record = VideoRecord::new(id, url, format!("Title {id}"));
        record.tags = vec!["a".into(), "b".into()];
        record.channel = Some(Channel {
            id: "UC1".into(),
            name: "Channel One".into(),
        });
        record.duration_seconds = Some(61.0);
        record.duration = Some(61.0);
        record
    }

    #[tokio::test]
    async fn put_then_get_returns_same_fields() {
        let db = Database::in_memory().unwrap();
        let record = sample("v1", "https://x/v1");
        db.put_video(record.clone()).await.unwrap();

        let stored = db.get_video("v1").await.unwrap().unwrap();
        assert_eq!(stored.title, record.title);
        assert_eq!(stored.tags, record.tags);
        assert_eq!(stored.channel, record.channel);
        assert_eq!(stored.duration_seconds, Some(61.0));
        assert_eq!(stored.is_new, IsNew::Yes);
        assert!(db.get_video("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn put_replaces_by_id_and_keeps_saved_at() {
        let db = Database::in_memory().unwrap();
        let first = db.put_video(sample("v1", "https://x/v1")).await.unwrap();

        let mut replacement = sample("v1", "https://x/v1-moved");
        replacement.saved_at = first.saved_at + Duration::days(3);
        replacement.is_new = IsNew::No;
        replacement.tags = Vec::new();
        db.put_video(replacement).await.unwrap();

        assert_eq!(db.count_videos().await.unwrap(), 1);
        let stored = db.get_video("v1").await.unwrap().unwrap();
        assert_eq!(stored.url, "https://x/v1-moved");
        assert_eq!(stored.is_new, IsNew::No);
        assert!(stored.tags.is_empty());
        assert_eq!(
            stored.saved_at.timestamp_millis(),
            first.saved_at.timestamp_millis()
        );
    }

    #[tokio::test]
    async fn last_synced_at_never_moves_backwards() {
        let db = Database::in_memory().unwrap();
        let now = Utc::now();

        let mut record = sample("v1", "https://x/v1");
        record.last_synced_at = Some(now);
        db.put_video(record.clone()).await.unwrap();

        record.last_synced_at = Some(now - Duration::hours(1));
        let stored = db.put_video(record.clone()).await.unwrap();
        assert_eq!(stored.last_synced_at, Some(now));

        record.last_synced_at = None;
        let stored = db.put_video(record).await.unwrap();
        assert_eq!(stored.last_synced_at, Some(now));
    }

    #[tokio::test]
    async fn get_by_url_returns_first_inserted_match() {
        let db = Database::in_memory().unwrap();
        db.put_video(sample("first", "https://x/shared")).await.unwrap();
        db.put_video(sample("second", "https://x/shared")).await.unwrap();

        let found = db.get_video_by_url("https://x/shared").await.unwrap().unwrap();
        assert_eq!(found.id, "first");
        assert!(db.get_video_by_url("https://x/none").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn get_all_orders_newest_first() {
        let db = Database::in_memory().unwrap();
        let mut old = sample("old", "https://x/old");
        old.saved_at = Utc::now() - Duration::days(1);
        db.put_video(old).await.unwrap();
        db.put_video(sample("new", "https://x/new")).await.unwrap();

        let ids: Vec<String> = db
            .get_all_videos()
            .await
            .unwrap()
            .into_iter()
            .map(|v| v.id)
            .collect();
        assert_eq!(ids, vec!["new", "old"]);
    }

    #[tokio::test]
    async fn writes_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.sqlite3");

        {
            let db = Database::new(path.clone()).unwrap();
            db.put_video(sample("v1", "https://x/v1")).await.unwrap();
        }

        let reopened = Database::new(path).unwrap();
        let stored = reopened.get_video("v1").await.unwrap().unwrap();
        assert_eq!(stored.url, "https://x/v1");
    }
}
