use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde_json::{json, Value};

use super::affordance::{
    AffordanceBoard, AffordanceKey, AffordanceState, ApplyOutcome, PassEntry, PassTicket,
};
use crate::{
    db::IsNew,
    rpc::{authorize_and_decode, Request, RequestHandler, Response, RpcClient},
    sync::PayloadSource,
};

// Set to true to log reconciliation passes
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_warn};

/// Tally of one reconciliation pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PassReport {
    pub applied: usize,
    pub unchanged: usize,
    pub refused: usize,
    pub stale: usize,
    pub failed: usize,
}

impl PassReport {
    fn record(&mut self, outcome: ApplyOutcome) {
        match outcome {
            ApplyOutcome::Applied(_) => self.applied += 1,
            ApplyOutcome::Unchanged => self.unchanged += 1,
            ApplyOutcome::Refused => self.refused += 1,
            ApplyOutcome::Stale => self.stale += 1,
        }
    }
}

/// Requester side of the channel. Holds no catalog data of its own; every
/// badge state comes from a lookup answered by the privileged side.
#[derive(Clone)]
pub struct SandboxedContext {
    client: RpcClient,
    board: Arc<Mutex<AffordanceBoard>>,
}

impl SandboxedContext {
    pub fn new(client: RpcClient) -> Self {
        Self {
            client,
            board: Arc::new(Mutex::new(AffordanceBoard::new())),
        }
    }

    pub fn client(&self) -> &RpcClient {
        &self.client
    }

    fn board(&self) -> MutexGuard<'_, AffordanceBoard> {
        self.board.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Ask the privileged side to store a captured video. Badges are left
    /// alone until the next reconciliation pass.
    pub async fn save_video(&self, data: Value) -> Result<Response> {
        self.client.call(Request::SaveVideo { data }).await
    }

    pub async fn request_sync(&self) -> Result<Response> {
        self.client.call(Request::SyncVideos).await
    }

    pub fn state(&self, slot: &str) -> Option<AffordanceState> {
        self.board().state(slot)
    }

    /// Discover a fresh set of affordances, e.g. after navigation.
    pub fn begin_pass(&self, targets: Vec<(String, AffordanceKey)>) -> PassTicket {
        self.board().begin_pass(targets)
    }

    pub async fn reconcile(&self, targets: Vec<(String, AffordanceKey)>) -> PassReport {
        let ticket = self.begin_pass(targets);
        self.resolve(ticket).await
    }

    /// Look up every entry of `ticket` and apply what is still current.
    ///
    /// Url-keyed entries are resolved one lookup each; id-keyed entries
    /// share a single full listing.
    pub async fn resolve(&self, ticket: PassTicket) -> PassReport {
        let mut report = PassReport::default();
        let (by_id, by_url): (Vec<PassEntry>, Vec<PassEntry>) = ticket
            .entries
            .into_iter()
            .partition(|entry| matches!(entry.key, AffordanceKey::Id(_)));

        for entry in &by_url {
            let AffordanceKey::Url(url) = &entry.key else {
                continue;
            };
            match self.lookup_url(url).await {
                Ok(lookup) => report.record(self.board().apply(ticket.epoch, entry, lookup)),
                Err(err) => {
                    log_warn!("lookup for {} failed: {err:#}", entry.slot);
                    report.failed += 1;
                }
            }
        }

        if !by_id.is_empty() {
            match self.lookup_all().await {
                Ok(known) => {
                    let mut board = self.board();
                    for entry in &by_id {
                        let AffordanceKey::Id(id) = &entry.key else {
                            continue;
                        };
                        report.record(board.apply(ticket.epoch, entry, known.get(id).copied()));
                    }
                }
                Err(err) => {
                    log_warn!("catalog listing for {} affordances failed: {err:#}", by_id.len());
                    report.failed += by_id.len();
                }
            }
        }

        log_debug!("pass {} resolved: {:?}", ticket.epoch, report);
        report
    }

    async fn lookup_url(&self, url: &str) -> Result<Option<IsNew>> {
        let response = self
            .client
            .call(Request::GetVideoByUrl {
                url: url.to_string(),
            })
            .await?;
        if !response.success {
            bail!("{}", response.error.unwrap_or_default());
        }
        Ok(response.video.map(|video| video.is_new))
    }

    async fn lookup_all(&self) -> Result<HashMap<String, IsNew>> {
        let response = self.client.call(Request::GetAllVideos).await?;
        if !response.success {
            bail!("{}", response.error.unwrap_or_default());
        }
        Ok(response
            .videos
            .unwrap_or_default()
            .into_iter()
            .map(|video| (video.id, video.is_new))
            .collect())
    }
}

/// Inbound side of a browsing surface: answers `readClipboard` for the
/// privileged context and nothing else.
pub struct SurfaceService {
    extension_id: String,
    clipboard: Box<dyn PayloadSource>,
}

impl SurfaceService {
    pub fn new(extension_id: impl Into<String>, clipboard: Box<dyn PayloadSource>) -> Self {
        Self {
            extension_id: extension_id.into(),
            clipboard,
        }
    }

    async fn read_clipboard(&self) -> Response {
        match self.clipboard.read().await {
            Ok(text) => {
                let debug_info = json!({
                    "source": self.clipboard.name(),
                    "length": text.len(),
                });
                Response::ok().with_text(text, debug_info)
            }
            Err(err) => {
                log_warn!("clipboard read via {} failed: {err:#}", self.clipboard.name());
                Response::failure(format!("Clipboard read failed: {err:#}"))
            }
        }
    }
}

#[async_trait]
impl RequestHandler for SurfaceService {
    async fn handle(&self, message: Value) -> Response {
        match authorize_and_decode(message, &self.extension_id) {
            Ok((_, Request::ReadClipboard)) => self.read_clipboard().await,
            Ok((_, request)) => Response::unsupported(request.action()),
            Err(rejection) => rejection,
        }
    }
}
