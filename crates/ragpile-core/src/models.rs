//! Records exchanged with the ragpile API.

use crate::tool_calls::{StructuredToolCall, looks_like_repr, parse_tool_calls};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// Chat
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }
}

/// Body of `POST /api/chat`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub stream: bool,
}

impl ChatRequest {
    /// A streaming request. The chat endpoint only streams.
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            stream: true,
        }
    }
}

// ============================================================================
// Auth
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct AuthUrl {
    pub auth_url: String,
}

/// Purpose of a Google token grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthReason {
    Email,
}

impl AuthReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthReason::Email => "email",
        }
    }
}

impl std::fmt::Display for AuthReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Integration {
    pub name: String,
    pub active: bool,
}

/// A connected third-party app with an expiring refresh token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct App {
    pub name: String,
    /// Unix timestamp, seconds.
    pub refresh_token_expiry: i64,
}

impl App {
    pub fn is_connected(&self, now: DateTime<Utc>) -> bool {
        now.timestamp() < self.refresh_token_expiry
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub integrations: BTreeMap<String, Integration>,
    #[serde(default)]
    pub apps: BTreeMap<String, App>,
}

/// Payload produced by the Telegram login widget.
///
/// The server verifies `hash` over exactly the keys it receives, so absent
/// optional fields are left out of the JSON rather than sent as null.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelegramAuthPayload {
    pub id: i64,
    pub first_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    pub auth_date: i64,
    pub hash: String,
}

// ============================================================================
// Threads
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadItem {
    pub id: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thread {
    pub id: String,
    pub ts: String,
    pub channel_values: ChannelValues,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelValues {
    #[serde(default)]
    pub messages: Vec<ThreadMessage>,
}

/// A native tool call as persisted by the agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub args: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadMessage {
    /// `human`, `ai`, `tool`, `system`.
    #[serde(rename = "type")]
    pub message_type: String,
    /// A string, or a list of content parts.
    #[serde(default)]
    pub content: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
}

impl ThreadMessage {
    pub fn is_human(&self) -> bool {
        self.message_type == "human"
    }

    /// Text view of the content: the string itself, or the concatenated text parts.
    pub fn text(&self) -> String {
        match &self.content {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Array(parts) => parts
                .iter()
                .filter_map(|part| match part {
                    serde_json::Value::String(s) => Some(s.as_str()),
                    other => other.get("text").and_then(|t| t.as_str()),
                })
                .collect(),
            _ => String::new(),
        }
    }

    /// Every tool call on this message as structured records.
    ///
    /// Native `tool_calls` take precedence. Without them, a content body in
    /// the legacy repr format is parsed instead.
    pub fn structured_tool_calls(&self) -> Vec<StructuredToolCall> {
        if let Some(calls) = self.tool_calls.as_ref().filter(|c| !c.is_empty()) {
            return calls
                .iter()
                .map(|call| StructuredToolCall {
                    tool_type: call.name.clone(),
                    attributes: call
                        .args
                        .iter()
                        .map(|(k, v)| {
                            let value = match v {
                                serde_json::Value::String(s) => s.clone(),
                                other => other.to_string(),
                            };
                            (k.clone(), value)
                        })
                        .collect(),
                })
                .collect();
        }
        let text = self.text();
        if looks_like_repr(&text) {
            parse_tool_calls(text.trim())
        } else {
            Vec::new()
        }
    }
}

// ============================================================================
// Schedules
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    pub id: String,
    pub user_id: String,
    pub code: String,
    pub interval_seconds: i64,
    #[serde(default)]
    pub next_run_time: Option<DateTime<Utc>>,
}

// ============================================================================
// Models
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    #[serde(default)]
    pub owned_by: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelPage {
    #[serde(default)]
    pub data: Vec<ModelInfo>,
}
