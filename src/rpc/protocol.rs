//! Wire shapes shared by both contexts.
//!
//! A message is one JSON object: `{sender, action, ...payload}`. Replies
//! are `{success: true, ...data}` or `{success: false, error}`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::db::VideoRecord;

pub const ACTIONS: [&str; 6] = [
    "saveVideo",
    "syncVideos",
    "getVideoInfo",
    "getVideoByUrl",
    "getAllVideos",
    "readClipboard",
];

pub const UNAUTHORIZED_SENDER: &str = "Unauthorized sender";
pub const UNKNOWN_ACTION: &str = "Unknown action";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sender {
    pub extension_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub surface_id: Option<String>,
}

impl Sender {
    pub fn new(extension_id: impl Into<String>) -> Self {
        Self {
            extension_id: extension_id.into(),
            surface_id: None,
        }
    }

    pub fn surface(extension_id: impl Into<String>, surface_id: impl Into<String>) -> Self {
        Self {
            extension_id: extension_id.into(),
            surface_id: Some(surface_id.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Request {
    SaveVideo { data: Value },
    SyncVideos,
    GetVideoInfo { url: String },
    GetVideoByUrl { url: String },
    GetAllVideos,
    ReadClipboard,
}

impl Request {
    pub fn action(&self) -> &'static str {
        match self {
            Request::SaveVideo { .. } => "saveVideo",
            Request::SyncVideos => "syncVideos",
            Request::GetVideoInfo { .. } => "getVideoInfo",
            Request::GetVideoByUrl { .. } => "getVideoByUrl",
            Request::GetAllVideos => "getAllVideos",
            Request::ReadClipboard => "readClipboard",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub sender: Sender,
    #[serde(flatten)]
    pub request: Request,
}

/// Check the sender against `own_id`, then decode the action.
///
/// Authorization runs first, so an unauthorized message with a bogus
/// action is still reported as unauthorized.
pub fn authorize_and_decode(message: Value, own_id: &str) -> Result<(Sender, Request), Response> {
    let sender = message
        .get("sender")
        .cloned()
        .and_then(|raw| serde_json::from_value::<Sender>(raw).ok());
    let sender = match sender {
        Some(sender) if sender.extension_id == own_id => sender,
        _ => return Err(Response::failure(UNAUTHORIZED_SENDER)),
    };

    let known = message
        .get("action")
        .and_then(Value::as_str)
        .map(|action| ACTIONS.contains(&action))
        .unwrap_or(false);
    if !known {
        return Err(Response::failure(UNKNOWN_ACTION));
    }

    let request = serde_json::from_value::<Request>(message)
        .map_err(|err| Response::failure(format!("Invalid request: {err}")))?;
    Ok((sender, request))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video: Option<VideoRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub videos: Option<Vec<VideoRecord>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub videos_added: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub videos_updated: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub needs_manual_paste: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug_info: Option<Value>,
}

impl Response {
    pub fn ok() -> Self {
        Self {
            success: true,
            ..Self::default()
        }
    }

    pub fn ok_message(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::ok()
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Self::default()
        }
    }

    pub fn unsupported(action: &str) -> Self {
        Self::failure(format!("Unsupported action: {action}"))
    }

    pub fn with_video(mut self, video: Option<VideoRecord>) -> Self {
        self.video = video;
        self
    }

    pub fn with_videos(mut self, videos: Vec<VideoRecord>) -> Self {
        self.videos = Some(videos);
        self
    }

    pub fn with_counts(mut self, added: u32, updated: u32) -> Self {
        self.videos_added = Some(added);
        self.videos_updated = Some(updated);
        self
    }

    pub fn with_manual_paste(mut self, needed: bool) -> Self {
        self.needs_manual_paste = Some(needed);
        self
    }

    pub fn with_text(mut self, text: String, debug_info: Value) -> Self {
        self.text = Some(text);
        self.debug_info = Some(debug_info);
        self
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn envelope_serializes_flat_with_action_tag() {
        let envelope = Envelope {
            sender: Sender::new("ext"),
            request: Request::GetVideoByUrl {
                url: "https://x/v1".into(),
            },
        };
        let value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(
            value,
            json!({
                "sender": {"extensionId": "ext"},
                "action": "getVideoByUrl",
                "url": "https://x/v1"
            })
        );
    }

    #[test]
    fn unit_actions_decode() {
        let message = json!({"sender": {"extensionId": "ext"}, "action": "syncVideos"});
        let (sender, request) = authorize_and_decode(message, "ext").unwrap();
        assert_eq!(sender, Sender::new("ext"));
        assert_eq!(request, Request::SyncVideos);
    }

    #[test]
    fn foreign_sender_is_rejected_before_action_check() {
        let message = json!({"sender": {"extensionId": "other"}, "action": "bogus"});
        let response = authorize_and_decode(message, "ext").unwrap_err();
        assert_eq!(response.error.as_deref(), Some(UNAUTHORIZED_SENDER));

        let anonymous = json!({"action": "getAllVideos"});
        let response = authorize_and_decode(anonymous, "ext").unwrap_err();
        assert_eq!(response.error.as_deref(), Some(UNAUTHORIZED_SENDER));
    }

    #[test]
    fn unknown_and_malformed_actions() {
        let unknown = json!({"sender": {"extensionId": "ext"}, "action": "deleteVideo"});
        let response = authorize_and_decode(unknown, "ext").unwrap_err();
        assert_eq!(response.error.as_deref(), Some(UNKNOWN_ACTION));
        assert!(!response.success);

        let missing_url = json!({"sender": {"extensionId": "ext"}, "action": "getVideoByUrl"});
        let response = authorize_and_decode(missing_url, "ext").unwrap_err();
        assert!(response.error.unwrap().starts_with("Invalid request"));
    }

    #[test]
    fn response_omits_absent_fields() {
        let value = serde_json::to_value(Response::ok_message("done")).unwrap();
        assert_eq!(value, json!({"success": true, "message": "done"}));

        let value = serde_json::to_value(
            Response::failure("nope").with_manual_paste(true),
        )
        .unwrap();
        assert_eq!(
            value,
            json!({"success": false, "error": "nope", "needsManualPaste": true})
        );
    }
}
