//! One function per action. Each returns `anyhow::Result<Response>`; the
//! dispatcher turns errors into `{success: false, error}`.

use anyhow::{bail, Context, Result};
use chrono::Utc;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::{catalog, db::VideoRecord, rpc::Response};

use super::PrivilegedContext;

const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

pub const SAVED_DIRECT: &str = "Video saved to database";
pub const SAVED_VIA_COMPANION: &str = "Video sent to companion app and saved";

fn has_text(fields: &Map<String, Value>, key: &str) -> bool {
    fields
        .get(key)
        .and_then(Value::as_str)
        .map(|value| !value.trim().is_empty())
        .unwrap_or(false)
}

pub async fn save_video(ctx: &PrivilegedContext, data: Value) -> Result<Response> {
    let Value::Object(mut fields) = data else {
        bail!("saveVideo data must be an object");
    };

    if has_text(&fields, "url") && has_text(&fields, "id") {
        return save_direct(ctx, fields).await;
    }

    if !has_text(&fields, "id") {
        fields.insert("id".into(), Value::String(Uuid::new_v4().to_string()));
    }
    if !has_text(&fields, "url") {
        fields.insert("url".into(), Value::String(String::new()));
    }
    let mut record: VideoRecord =
        serde_json::from_value(Value::Object(fields)).context("invalid video data")?;
    let now = Utc::now();
    record.saved_at = now;
    record.last_synced_at = Some(now);

    if let Err(err) = ctx.launcher.hand_off(&record).await {
        log_warn!("companion handoff for {} failed: {err:#}", record.id);
    }
    ctx.catalog.add_video(record).await?;
    Ok(Response::ok_message(SAVED_VIA_COMPANION))
}

/// Direct capture from a page. Fields the page did not send keep their
/// stored values; the timestamps always belong to the store.
async fn save_direct(ctx: &PrivilegedContext, mut fields: Map<String, Value>) -> Result<Response> {
    fields.remove("savedAt");
    fields.remove("lastSyncedAt");

    let id = fields
        .get("id")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let existing = ctx.catalog.get_video(&id).await?;

    let merged = match &existing {
        Some(stored) => {
            let Value::Object(mut base) =
                serde_json::to_value(stored).context("failed to encode stored video")?
            else {
                bail!("stored video {id} did not encode as an object");
            };
            base.extend(fields);
            base
        }
        None => fields,
    };

    let mut record: VideoRecord =
        serde_json::from_value(Value::Object(merged)).context("invalid video data")?;
    record.saved_at = Utc::now();
    record.last_synced_at = None;

    let repromoted = existing
        .as_ref()
        .map(|stored| catalog::is_repromotion(stored, &record))
        .unwrap_or(false);
    ctx.catalog.add_video(record).await?;

    if repromoted {
        log_warn!("page capture marked watched video {id} as new again");
        return Ok(Response::ok_message(format!(
            "{SAVED_DIRECT}; watched video marked new again"
        )));
    }
    Ok(Response::ok_message(SAVED_DIRECT))
}

pub async fn sync_videos(ctx: &PrivilegedContext) -> Result<Response> {
    match ctx.sync.sync().await {
        Ok(report) => Ok(Response::ok_message(report.summary)
            .with_counts(report.outcome.videos_added, report.outcome.videos_updated)),
        Err(err) => {
            log_info!("sync did not run: {err}");
            Ok(Response::failure(err.to_string()).with_manual_paste(err.needs_manual_paste()))
        }
    }
}

pub async fn get_video_info(ctx: &PrivilegedContext, url: &str) -> Result<Response> {
    let video = ctx.catalog.get_video_by_url(url).await?;
    Ok(Response::ok().with_video(video))
}

pub async fn get_video_by_url(ctx: &PrivilegedContext, url: &str) -> Result<Response> {
    let video = ctx.catalog.get_video_by_url(url).await?;
    Ok(Response::ok().with_video(video))
}

pub async fn get_all_videos(ctx: &PrivilegedContext) -> Result<Response> {
    let videos = ctx.catalog.get_all_videos().await?;
    Ok(Response::ok().with_videos(videos))
}
