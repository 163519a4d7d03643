//! Output handling for the CLI.
//!
//! Results go to stdout, diagnostics and errors to stderr. With `--json`
//! every result is one JSON object per line.

use chrono::{DateTime, Utc};
use ragpile_core::StructuredToolCall;
use ragpile_core::models::{ModelInfo, Schedule, Thread, ThreadItem, User};
use ragpile_core::pricing::cost_for_model;
use serde::Serialize;
use std::io;

/// Map an error to a stable coarse-grained code string.
///
/// Errors raised by ragpile-core keep their own code; anything else is
/// classified by `io::ErrorKind`.
pub fn error_code(e: &io::Error) -> &'static str {
    if let Some(inner) = e.get_ref().and_then(|inner| inner.downcast_ref::<ragpile_core::Error>()) {
        return inner.code();
    }
    match e.kind() {
        io::ErrorKind::NotFound => "not_found",
        io::ErrorKind::InvalidInput => "invalid_input",
        io::ErrorKind::PermissionDenied => "permission_denied",
        io::ErrorKind::InvalidData => "invalid_data",
        _ => "internal_error",
    }
}

/// CLI output handler.
pub struct OutputHandler {
    json: bool,
}

impl OutputHandler {
    pub fn new(json: bool) -> Self {
        Self { json }
    }

    pub fn is_json(&self) -> bool {
        self.json
    }

    /// Emit a result: `data` as JSON in JSON mode, otherwise the text rendering.
    pub fn emit<T: Serialize>(&self, data: &T, text: impl FnOnce() -> String) -> io::Result<()> {
        if self.json {
            let json = serde_json::json!({"type": "result", "data": data});
            println!("{}", json);
        } else {
            let text = text();
            if !text.is_empty() {
                println!("{}", text);
            }
        }
        Ok(())
    }

    /// Informational line for humans. Suppressed in JSON mode.
    pub fn diagnostic(&self, message: &str) {
        if !self.json {
            eprintln!("{}", message);
        }
    }

    pub fn emit_error(&self, e: &io::Error) {
        if self.json {
            let json = serde_json::json!({
                "type": "error",
                "code": error_code(e),
                "message": e.to_string(),
            });
            eprintln!("{}", json);
        } else {
            eprintln!("Error: {}", e);
        }
    }
}

fn format_time(t: &DateTime<Utc>) -> String {
    t.format("%Y-%m-%d %H:%M").to_string()
}

/// `3600` -> `1h`, `90` -> `1m30s`.
pub fn format_interval(seconds: i64) -> String {
    if seconds <= 0 {
        return format!("{}s", seconds);
    }
    let (h, m, s) = (seconds / 3600, seconds % 3600 / 60, seconds % 60);
    let mut out = String::new();
    if h > 0 {
        out.push_str(&format!("{}h", h));
    }
    if m > 0 {
        out.push_str(&format!("{}m", m));
    }
    if s > 0 {
        out.push_str(&format!("{}s", s));
    }
    out
}

pub fn render_threads(threads: &[ThreadItem]) -> String {
    if threads.is_empty() {
        return "No threads.".to_string();
    }
    threads
        .iter()
        .map(|t| format!("{}  {}", t.id, format_time(&t.created_at)))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn render_tool_calls(calls: &[StructuredToolCall]) -> String {
    calls
        .iter()
        .map(|call| {
            let args: Vec<_> = call
                .attributes
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect();
            format!("{}({})", call.tool_type, args.join(", "))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn render_thread(thread: &Thread) -> String {
    let mut lines = vec![format!("Thread {} ({})", thread.id, thread.ts)];
    for message in &thread.channel_values.messages {
        let calls = message.structured_tool_calls();
        if calls.is_empty() {
            lines.push(format!("[{}] {}", message.message_type, message.text()));
        } else {
            for call in render_tool_calls(&calls).lines() {
                lines.push(format!("[{}] -> {}", message.message_type, call));
            }
        }
    }
    lines.join("\n")
}

pub fn render_schedules(schedules: &[Schedule]) -> String {
    if schedules.is_empty() {
        return "No schedules.".to_string();
    }
    schedules
        .iter()
        .map(|s| {
            let next = s
                .next_run_time
                .as_ref()
                .map(format_time)
                .unwrap_or_else(|| "paused".to_string());
            let code: Vec<_> = s.code.lines().map(|l| format!("    {}", l)).collect();
            format!(
                "{}  every {}  next {}\n{}",
                s.id,
                format_interval(s.interval_seconds),
                next,
                code.join("\n")
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn render_user(user: &User, now: DateTime<Utc>) -> String {
    let mut lines = vec![format!("{} ({})", user.email, user.id)];
    for integration in user.integrations.values() {
        let state = if integration.active { "active" } else { "inactive" };
        lines.push(format!("  integration {}: {}", integration.name, state));
    }
    for app in user.apps.values() {
        let state = if app.is_connected(now) { "connected" } else { "expired" };
        lines.push(format!("  app {}: {}", app.name, state));
    }
    lines.join("\n")
}

#[derive(Serialize)]
pub struct PricedModel<'a> {
    #[serde(flatten)]
    pub model: &'a ModelInfo,
    pub cost: Option<ragpile_core::pricing::ModelCost>,
}

pub fn priced_models(models: &[ModelInfo]) -> Vec<PricedModel<'_>> {
    models
        .iter()
        .map(|model| PricedModel {
            model,
            cost: cost_for_model(&model.id),
        })
        .collect()
}

pub fn render_models(models: &[PricedModel<'_>]) -> String {
    models
        .iter()
        .map(|m| match &m.cost {
            Some(cost) => format!(
                "{}  ${:.2} in / ${:.2} out per 1M tokens",
                m.model.id, cost.input, cost.output
            ),
            None => m.model.id.clone(),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragpile_core::parse_tool_calls;

    #[test]
    fn test_error_code_from_core_error() {
        let e: io::Error = ragpile_core::Error::MalformedChunk("no JSON object".into()).into();
        assert_eq!(e.kind(), io::ErrorKind::InvalidData);
        assert_eq!(error_code(&e), "malformed_chunk");
    }

    #[test]
    fn test_error_code_fallback_to_kind() {
        let e = io::Error::new(io::ErrorKind::NotFound, "no schedule s9");
        assert_eq!(error_code(&e), "not_found");
        let e = io::Error::other("boom");
        assert_eq!(error_code(&e), "internal_error");
    }

    #[test]
    fn test_format_interval() {
        assert_eq!(format_interval(3600), "1h");
        assert_eq!(format_interval(90), "1m30s");
        assert_eq!(format_interval(3725), "1h2m5s");
        assert_eq!(format_interval(0), "0s");
    }

    #[test]
    fn test_render_tool_calls() {
        let calls = parse_tool_calls("Search(query='cats', limit='5')");
        assert_eq!(render_tool_calls(&calls), "Search(limit=5, query=cats)");
    }

    #[test]
    fn test_render_models_with_cost() {
        let models = vec![
            ModelInfo {
                id: "gpt-4.1-2025-04-14".into(),
                owned_by: None,
            },
            ModelInfo {
                id: "gpt-4o".into(),
                owned_by: None,
            },
        ];
        let priced = priced_models(&models);
        assert_eq!(
            render_models(&priced),
            "gpt-4.1-2025-04-14  $2.00 in / $8.00 out per 1M tokens\ngpt-4o"
        );
        let json = serde_json::to_value(&priced).unwrap();
        assert_eq!(json[0]["id"], "gpt-4.1-2025-04-14");
        assert_eq!(json[0]["cost"]["in"], 2.0);
        assert!(json[1]["cost"].is_null());
    }

    #[test]
    fn test_render_empty_lists() {
        assert_eq!(render_threads(&[]), "No threads.");
        assert_eq!(render_schedules(&[]), "No schedules.");
    }
}
