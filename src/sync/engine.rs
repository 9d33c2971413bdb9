use anyhow::Result;
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;

use crate::catalog::{is_repromotion, CatalogService};

use super::{
    acquire::PayloadAcquirer,
    descriptor::{normalize, parse_descriptor},
    SyncError,
};

// Set to true to log per-descriptor reconciliation
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncOutcome {
    pub videos_added: u32,
    pub videos_updated: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub outcome: SyncOutcome,
    pub summary: String,
    /// Source that produced the payload text, when it was acquired.
    pub source: Option<&'static str>,
}

enum Reconciled {
    Added,
    Updated { repromoted: bool },
}

pub struct SyncEngine {
    catalog: CatalogService,
    acquirer: PayloadAcquirer,
}

impl SyncEngine {
    pub fn new(catalog: CatalogService, acquirer: PayloadAcquirer) -> Self {
        Self { catalog, acquirer }
    }

    /// Acquire the companion export and reconcile it into the catalog.
    pub async fn sync(&self) -> Result<SyncReport, SyncError> {
        let acquired = self.acquirer.acquire().await.ok_or(SyncError::NoPayload)?;
        let mut report = self.sync_text(&acquired.text).await?;
        report.source = Some(acquired.source);
        Ok(report)
    }

    /// Reconcile caller-provided payload text (the manual paste path).
    pub async fn sync_text(&self, text: &str) -> Result<SyncReport, SyncError> {
        if text.trim().is_empty() {
            return Err(SyncError::NoPayload);
        }

        let value: Value = serde_json::from_str(text)
            .map_err(|err| SyncError::MalformedPayload(err.to_string()))?;
        let descriptors = normalize(value);
        if descriptors.is_empty() {
            return Err(SyncError::NoData);
        }

        let total = descriptors.len();
        let mut outcome = SyncOutcome::default();
        let mut repromoted = 0u32;
        let mut skipped = 0u32;

        for (index, descriptor) in descriptors.into_iter().enumerate() {
            match self.reconcile_one(descriptor).await {
                Ok(Reconciled::Added) => outcome.videos_added += 1,
                Ok(Reconciled::Updated { repromoted: flagged }) => {
                    outcome.videos_updated += 1;
                    if flagged {
                        repromoted += 1;
                    }
                }
                Err(err) => {
                    skipped += 1;
                    log_warn!("skipping descriptor #{} of {}: {err:#}", index + 1, total);
                }
            }
        }

        let mut summary = format!(
            "Synced {} videos ({} added, {} updated)",
            outcome.videos_added + outcome.videos_updated,
            outcome.videos_added,
            outcome.videos_updated
        );
        if repromoted > 0 {
            summary.push_str(&format!("; {repromoted} watched videos marked new again"));
        }
        log_info!("{summary}; {skipped} descriptors skipped");

        Ok(SyncReport {
            outcome,
            summary,
            source: None,
        })
    }

    async fn reconcile_one(&self, descriptor: Value) -> Result<Reconciled> {
        let record = parse_descriptor(descriptor)?.into_record(Utc::now())?;
        let id = record.id.clone();

        match self.catalog.get_video(&id).await? {
            None => {
                self.catalog.add_video(record).await?;
                log_debug!("added video {}", id);
                Ok(Reconciled::Added)
            }
            Some(existing) => {
                let repromoted = is_repromotion(&existing, &record);
                self.catalog.update_video(record).await?;
                log_debug!("updated video {}", id);
                Ok(Reconciled::Updated { repromoted })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::{
        db::{Database, IsNew, VideoRecord},
        sync::acquire::tests::FixedSource,
    };

    fn engine_with(sources: Vec<FixedSource>) -> (SyncEngine, CatalogService) {
        let catalog = CatalogService::new(Database::in_memory().unwrap());
        let sources = sources
            .into_iter()
            .map(|s| Box::new(s) as Box<dyn crate::sync::PayloadSource>)
            .collect();
        let acquirer = PayloadAcquirer::new(sources, Duration::from_secs(1));
        (SyncEngine::new(catalog.clone(), acquirer), catalog)
    }

    #[tokio::test]
    async fn replaying_the_same_payload_is_idempotent() {
        let payload = json!([
            {"id": "a", "title": "A", "url": "https://x/a", "tags": ["t"]},
            {"id": "b", "title": "B", "url": "https://x/b", "is_new": "No"}
        ])
        .to_string();
        let (engine, catalog) = engine_with(vec![FixedSource::ok("fixed", &payload)]);

        let first = engine.sync().await.unwrap();
        assert_eq!(
            first.outcome,
            SyncOutcome {
                videos_added: 2,
                videos_updated: 0
            }
        );
        assert_eq!(first.source, Some("fixed"));
        let state_after_first = catalog.get_all_videos().await.unwrap();

        let second = engine.sync().await.unwrap();
        assert_eq!(
            second.outcome,
            SyncOutcome {
                videos_added: 0,
                videos_updated: 2
            }
        );
        let state_after_second = catalog.get_all_videos().await.unwrap();

        assert_eq!(state_after_first.len(), state_after_second.len());
        for (before, after) in state_after_first.iter().zip(&state_after_second) {
            assert_eq!(before.id, after.id);
            assert_eq!(before.title, after.title);
            assert_eq!(before.tags, after.tags);
            assert_eq!(before.is_new, after.is_new);
            assert_eq!(before.saved_at, after.saved_at);
            assert!(after.last_synced_at >= before.last_synced_at);
        }
    }

    #[tokio::test]
    async fn one_bad_descriptor_does_not_abort_the_batch() {
        let (engine, catalog) = engine_with(vec![]);
        let payload = json!([
            {"id": "one", "title": "1"},
            {"title": "no id here"},
            {"id": "three", "title": "3"}
        ])
        .to_string();

        let report = engine.sync_text(&payload).await.unwrap();
        assert_eq!(
            report.outcome.videos_added + report.outcome.videos_updated,
            2
        );
        assert!(catalog.get_video("one").await.unwrap().is_some());
        assert!(catalog.get_video("three").await.unwrap().is_some());
        assert_eq!(catalog.get_all_videos().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn duplicate_ids_in_one_payload_collapse_to_one_record() {
        let (engine, catalog) = engine_with(vec![]);
        let payload = json!([
            {"id": "dup", "title": "first"},
            {"id": "dup", "title": "second"}
        ])
        .to_string();

        let report = engine.sync_text(&payload).await.unwrap();
        assert_eq!(report.outcome.videos_added, 1);
        assert_eq!(report.outcome.videos_updated, 1);

        let all = catalog.get_all_videos().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].title, "second");
    }

    #[tokio::test]
    async fn malformed_text_is_rejected_without_writes() {
        let (engine, catalog) = engine_with(vec![]);
        let err = engine.sync_text("not json").await.unwrap_err();
        assert!(matches!(err, SyncError::MalformedPayload(_)));
        assert!(err.needs_manual_paste());
        assert!(catalog.get_all_videos().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn scalar_or_empty_payload_reports_no_data() {
        let (engine, _) = engine_with(vec![]);
        assert!(matches!(
            engine.sync_text("[]").await,
            Err(SyncError::NoData)
        ));
        assert!(matches!(
            engine.sync_text("\"just a string\"").await,
            Err(SyncError::NoData)
        ));
    }

    #[tokio::test]
    async fn nothing_acquired_needs_manual_paste() {
        let (engine, _) = engine_with(vec![
            FixedSource::failing("surface"),
            FixedSource::ok("system", ""),
        ]);
        let err = engine.sync().await.unwrap_err();
        assert!(matches!(err, SyncError::NoPayload));
        assert!(err.needs_manual_paste());
    }

    #[tokio::test]
    async fn single_object_payload_is_accepted() {
        let (engine, catalog) = engine_with(vec![]);
        let report = engine
            .sync_text(&json!({"id": "solo", "url": "https://x/solo"}).to_string())
            .await
            .unwrap();
        assert_eq!(report.outcome.videos_added, 1);
        assert_eq!(report.summary, "Synced 1 videos (1 added, 0 updated)");
        assert!(catalog.get_video("solo").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn mixed_new_and_existing_records() {
        let (engine, catalog) = engine_with(vec![]);
        catalog
            .add_video(VideoRecord::new("a", "https://x/a", "A"))
            .await
            .unwrap();

        let payload = json!([
            {"id": "a", "is_new": "No", "title": "A", "url": "https://x/a"},
            {"id": "b", "is_new": "Yes", "title": "B", "url": "https://x/b"}
        ])
        .to_string();
        let report = engine.sync_text(&payload).await.unwrap();

        assert_eq!(
            report.outcome,
            SyncOutcome {
                videos_added: 1,
                videos_updated: 1
            }
        );
        let a = catalog.get_video("a").await.unwrap().unwrap();
        assert_eq!(a.is_new, IsNew::No);
        assert!(catalog.get_video("b").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn repromotion_is_written_but_flagged_in_summary() {
        let (engine, catalog) = engine_with(vec![]);
        let mut watched = VideoRecord::new("a", "https://x/a", "A");
        watched.is_new = IsNew::No;
        catalog.add_video(watched).await.unwrap();

        let report = engine
            .sync_text(&json!([{"id": "a", "is_new": "Yes"}]).to_string())
            .await
            .unwrap();

        assert!(report.summary.contains("1 watched videos marked new again"));
        let a = catalog.get_video("a").await.unwrap().unwrap();
        assert_eq!(a.is_new, IsNew::Yes);
    }
}
