//! Payload acquisition: an ordered list of fallible sources for the
//! companion app's export text. The first non-empty text wins; the
//! orchestrator itself never fails, it only comes back empty-handed.

use std::{path::PathBuf, time::Duration};

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use tokio::process::Command;

use crate::{
    rpc::{FocusedSurface, Request},
    settings::CatalogSettings,
};

// Set to true to log every strategy attempt
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

#[async_trait]
pub trait PayloadSource: Send + Sync {
    fn name(&self) -> &'static str;

    async fn read(&self) -> Result<String>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Acquired {
    pub text: String,
    pub source: &'static str,
}

pub struct PayloadAcquirer {
    sources: Vec<Box<dyn PayloadSource>>,
    timeout: Duration,
}

impl PayloadAcquirer {
    pub fn new(sources: Vec<Box<dyn PayloadSource>>, timeout: Duration) -> Self {
        Self { sources, timeout }
    }

    /// Standard strategy order: focused surface, system clipboard, relay buffer.
    pub fn from_settings(settings: &CatalogSettings, focused: FocusedSurface) -> Self {
        let mut sources: Vec<Box<dyn PayloadSource>> = vec![
            Box::new(SurfaceClipboard::new(focused)),
            Box::new(CommandClipboard::from_settings(settings)),
        ];
        if let Some(path) = &settings.relay_path {
            sources.push(Box::new(RelayBuffer::new(path.clone())));
        }
        Self::new(sources, Duration::from_millis(settings.acquire_timeout_ms))
    }

    pub async fn acquire(&self) -> Option<Acquired> {
        for source in &self.sources {
            let name = source.name();
            match tokio::time::timeout(self.timeout, source.read()).await {
                Ok(Ok(text)) if !text.trim().is_empty() => {
                    log_info!("acquired {} bytes of payload via {}", text.len(), name);
                    return Some(Acquired { text, source: name });
                }
                Ok(Ok(_)) => log_debug!("payload source {} returned empty text", name),
                Ok(Err(err)) => log_warn!("payload source {} failed: {err:#}", name),
                Err(_) => log_warn!(
                    "payload source {} timed out after {}ms",
                    name,
                    self.timeout.as_millis()
                ),
            }
        }

        log_warn!("no payload source produced text");
        None
    }
}

/// Asks the focused browsing surface to read the clipboard on our behalf.
pub struct SurfaceClipboard {
    focused: FocusedSurface,
}

impl SurfaceClipboard {
    pub fn new(focused: FocusedSurface) -> Self {
        Self { focused }
    }
}

#[async_trait]
impl PayloadSource for SurfaceClipboard {
    fn name(&self) -> &'static str {
        "focused-surface"
    }

    async fn read(&self) -> Result<String> {
        let client = self
            .focused
            .current()
            .await
            .ok_or_else(|| anyhow!("no focused surface to read from"))?;
        let response = client.call(Request::ReadClipboard).await?;
        if !response.success {
            bail!(
                "surface refused clipboard read: {}",
                response.error.unwrap_or_default()
            );
        }
        response
            .text
            .ok_or_else(|| anyhow!("surface response carried no text"))
    }
}

/// Reads the system clipboard through a platform command.
pub struct CommandClipboard {
    candidates: Vec<Vec<String>>,
}

impl CommandClipboard {
    pub fn new(candidates: Vec<Vec<String>>) -> Self {
        Self { candidates }
    }

    pub fn from_settings(settings: &CatalogSettings) -> Self {
        match &settings.system_clipboard_command {
            Some(argv) => Self::new(vec![argv.clone()]),
            None => Self::new(default_clipboard_commands()),
        }
    }
}

fn default_clipboard_commands() -> Vec<Vec<String>> {
    let commands: &[&[&str]] = if cfg!(target_os = "macos") {
        &[&["pbpaste"]]
    } else if cfg!(target_os = "windows") {
        &[&["powershell", "-NoProfile", "-Command", "Get-Clipboard -Raw"]]
    } else {
        &[
            &["wl-paste", "--no-newline"],
            &["xclip", "-selection", "clipboard", "-o"],
            &["xsel", "--clipboard", "--output"],
        ]
    };
    commands
        .iter()
        .map(|argv| argv.iter().map(|s| s.to_string()).collect())
        .collect()
}

#[async_trait]
impl PayloadSource for CommandClipboard {
    fn name(&self) -> &'static str {
        "system-clipboard"
    }

    async fn read(&self) -> Result<String> {
        let mut last_error = anyhow!("no clipboard command configured");
        for argv in &self.candidates {
            let Some((program, args)) = argv.split_first() else {
                continue;
            };
            let output = Command::new(program)
                .args(args)
                .kill_on_drop(true)
                .output()
                .await;
            match output {
                Ok(output) if output.status.success() => {
                    let text = String::from_utf8(output.stdout)
                        .with_context(|| format!("{program} produced non UTF-8 output"))?;
                    if !text.trim().is_empty() {
                        return Ok(text);
                    }
                    log_debug!("{} returned an empty clipboard", program);
                    last_error = anyhow!("{program} returned an empty clipboard");
                }
                Ok(output) => {
                    last_error = anyhow!("{program} exited with {}", output.status);
                }
                Err(err) => {
                    last_error = anyhow::Error::new(err).context(format!("failed to run {program}"));
                }
            }
        }
        Err(last_error)
    }
}

/// Shared text buffer file the companion app can drop its export into.
pub struct RelayBuffer {
    path: PathBuf,
}

impl RelayBuffer {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[async_trait]
impl PayloadSource for RelayBuffer {
    fn name(&self) -> &'static str {
        "relay-buffer"
    }

    async fn read(&self) -> Result<String> {
        tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("failed to read relay buffer {}", self.path.display()))
    }
}
