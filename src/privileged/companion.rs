//! Handoff to the companion app through its custom URL scheme.

use std::{process::Stdio, time::Duration};

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use log::info;
use tokio::process::Command;
use url::Url;

use crate::db::VideoRecord;

#[async_trait]
pub trait CompanionLauncher: Send + Sync {
    async fn hand_off(&self, video: &VideoRecord) -> Result<()>;
}

const DEFAULT_OPEN_TIMEOUT: Duration = Duration::from_secs(3);

/// Opens `<scheme>://add?url=..&title=..` with the platform opener.
pub struct UrlSchemeLauncher {
    scheme: String,
    opener: Vec<String>,
    timeout: Duration,
}

impl UrlSchemeLauncher {
    pub fn new(scheme: impl Into<String>) -> Self {
        let (program, args) = platform_opener();
        let opener = std::iter::once(program)
            .chain(args.iter().copied())
            .map(str::to_string)
            .collect();
        Self {
            scheme: scheme.into(),
            opener,
            timeout: DEFAULT_OPEN_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Replace the platform opener; the handoff url is appended as the last argument.
    pub fn with_opener(mut self, argv: Vec<String>) -> Self {
        self.opener = argv;
        self
    }

    pub fn handoff_url(&self, video: &VideoRecord) -> Result<Url> {
        let mut url = Url::parse(&format!("{}://add", self.scheme))
            .with_context(|| format!("invalid companion scheme {}", self.scheme))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("id", &video.id);
            if !video.url.is_empty() {
                query.append_pair("url", &video.url);
            }
            if !video.title.is_empty() {
                query.append_pair("title", &video.title);
            }
        }
        Ok(url)
    }
}

fn platform_opener() -> (&'static str, &'static [&'static str]) {
    if cfg!(target_os = "macos") {
        ("open", &[])
    } else if cfg!(target_os = "windows") {
        ("cmd", &["/C", "start", ""])
    } else {
        ("xdg-open", &[])
    }
}

#[async_trait]
impl CompanionLauncher for UrlSchemeLauncher {
    async fn hand_off(&self, video: &VideoRecord) -> Result<()> {
        let url = self.handoff_url(video)?;
        let Some((program, args)) = self.opener.split_first() else {
            bail!("no opener configured for companion handoff");
        };

        let status = Command::new(program)
            .args(args)
            .arg(url.as_str())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status();
        let status = tokio::time::timeout(self.timeout, status)
            .await
            .map_err(|_| {
                anyhow!(
                    "{program} did not finish within {}ms",
                    self.timeout.as_millis()
                )
            })?
            .with_context(|| format!("failed to run {program}"))?;
        if !status.success() {
            bail!("{program} exited with {status}");
        }

        info!("handed video {} to companion app", video.id);
        Ok(())
    }
}

/// Used when companion launching is disabled in settings.
pub struct DisabledLauncher;

#[async_trait]
impl CompanionLauncher for DisabledLauncher {
    async fn hand_off(&self, video: &VideoRecord) -> Result<()> {
        info!("companion launch disabled; video {} saved locally only", video.id);
        Ok(())
    }
}
