//! The privileged context: sole owner of the catalog and the sync engine,
//! reachable only through RPC messages.

pub mod companion;
pub mod handlers;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::{
    catalog::CatalogService,
    rpc::{authorize_and_decode, Request, RequestHandler, Response},
    sync::SyncEngine,
};

pub use companion::{CompanionLauncher, DisabledLauncher, UrlSchemeLauncher};

pub struct PrivilegedContext {
    extension_id: String,
    catalog: CatalogService,
    sync: SyncEngine,
    launcher: Arc<dyn CompanionLauncher>,
}

impl PrivilegedContext {
    pub fn new(
        extension_id: impl Into<String>,
        catalog: CatalogService,
        sync: SyncEngine,
        launcher: Arc<dyn CompanionLauncher>,
    ) -> Self {
        Self {
            extension_id: extension_id.into(),
            catalog,
            sync,
            launcher,
        }
    }

    pub fn extension_id(&self) -> &str {
        &self.extension_id
    }

    pub fn catalog(&self) -> &CatalogService {
        &self.catalog
    }

    pub async fn dispatch(&self, request: Request) -> Response {
        let action = request.action();
        let result = match request {
            Request::SaveVideo { data } => handlers::save_video(self, data).await,
            Request::SyncVideos => handlers::sync_videos(self).await,
            Request::GetVideoInfo { url } => handlers::get_video_info(self, &url).await,
            Request::GetVideoByUrl { url } => handlers::get_video_by_url(self, &url).await,
            Request::GetAllVideos => handlers::get_all_videos(self).await,
            Request::ReadClipboard => return Response::unsupported(action),
        };

        result.unwrap_or_else(|err| {
            log::error!("{action} failed: {err:#}");
            Response::failure(err.to_string())
        })
    }
}

#[async_trait]
impl RequestHandler for PrivilegedContext {
    async fn handle(&self, message: Value) -> Response {
        match authorize_and_decode(message, &self.extension_id) {
            Ok((_, request)) => self.dispatch(request).await,
            Err(rejection) => {
                log::warn!(
                    "rejected message: {}",
                    rejection.error.as_deref().unwrap_or_default()
                );
                rejection
            }
        }
    }
}
