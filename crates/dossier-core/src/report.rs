//! Report assembly and rendering (JSON + Markdown).

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
    domain::DealId,
    dossier::{is_truthy, Dossier, ResourceKey, Slot},
    timeline::{self, TimelineEvent},
    Result,
};

const NOT_SPECIFIED: &str = "Not specified";
const UNKNOWN_DATE: &str = "Unknown date";
const UNKNOWN_AUTHOR: &str = "Unknown author";
const NO_TEXT: &str = "No text";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub deal_id: u64,
    pub timeline: Vec<TimelineEvent>,
    pub user: Slot,
    pub dialog: Slot,
}

impl Report {
    /// Build the report for a finished aggregation run.
    ///
    /// Fails only when the timeline cannot be merged.
    pub fn from_dossier(deal_id: DealId, dossier: &Dossier) -> Result<Self> {
        let slot = |key: ResourceKey| dossier.get(key).cloned().unwrap_or_else(Slot::empty);
        Ok(Self {
            deal_id: deal_id.0,
            timeline: timeline::merge(dossier)?,
            user: slot(ResourceKey::User),
            dialog: slot(ResourceKey::DialogMessages),
        })
    }
}

/// Pretty JSON (2-space indent, UTF-8 kept literal, keys in insertion order).
pub fn render_json(report: &Report) -> Result<String> {
    Ok(serde_json::to_string_pretty(report)?)
}

pub fn render_markdown(report: &Report) -> String {
    let mut md = String::new();
    let _ = writeln!(md, "# Deal report {}\n", report.deal_id);

    for event in &report.timeline {
        let details = event
            .data
            .get("SUBJECT")
            .map(display_value)
            .unwrap_or_default();
        let _ = writeln!(md, "## {}", event.date.format("%Y-%m-%d %H:%M"));
        let _ = writeln!(md, "- Type: {}", event.kind.as_str());
        let _ = writeln!(md, "- Details: {details}\n");
    }

    render_user(&mut md, &report.user);
    render_dialog(&mut md, &report.dialog);
    md
}

fn render_user(md: &mut String, user: &Slot) {
    let user = match user {
        Slot::Failed(error) => {
            let _ = writeln!(md, "## Responsible: {error}\n");
            return;
        }
        Slot::Missing(_) => {
            md.push_str("## Responsible: no data\n\n");
            return;
        }
        Slot::Fetched(Value::Object(user)) => user,
        Slot::Fetched(_) => {
            md.push_str("## Responsible: invalid format\n\n");
            return;
        }
    };

    if user.get("ID").is_some_and(is_truthy) {
        md.push_str("## Responsible\n");
        let _ = writeln!(md, "- Name: {}", field_or(user, "NAME", NOT_SPECIFIED));
        let _ = writeln!(md, "- Last name: {}", field_or(user, "LAST_NAME", NOT_SPECIFIED));
        let _ = writeln!(
            md,
            "- Position: {}",
            field_or(user, "WORK_POSITION", NOT_SPECIFIED)
        );
        let _ = writeln!(md, "- Email: {}\n", field_or(user, "EMAIL", NOT_SPECIFIED));
    } else if let Some(error) = user.get("error").filter(|v| is_truthy(v)) {
        let _ = writeln!(md, "## Responsible: {}\n", display_value(error));
    } else {
        md.push_str("## Responsible: no data\n\n");
    }
}

fn render_dialog(md: &mut String, dialog: &Slot) {
    let dialog = match dialog {
        Slot::Missing(info) => {
            let _ = writeln!(md, "## Conversation: {info}\n");
            return;
        }
        Slot::Fetched(Value::Object(dialog)) => dialog,
        Slot::Fetched(_) | Slot::Failed(_) => return,
    };

    if let Some(info) = dialog.get("info") {
        let _ = writeln!(md, "## Conversation: {}\n", display_value(info));
    } else if let Some(messages) = dialog.get("messages") {
        md.push_str("## Conversation history\n");
        for msg in messages.as_array().into_iter().flatten() {
            let msg = msg.as_object();
            let field = |key: &str, fallback: &str| {
                msg.map(|m| field_or(m, key, fallback))
                    .unwrap_or_else(|| fallback.to_string())
            };
            let _ = writeln!(
                md,
                "**{} {}**: {}",
                field("DATE", UNKNOWN_DATE),
                field("AUTHOR", UNKNOWN_AUTHOR),
                field("MESSAGE", NO_TEXT)
            );
        }
        md.push('\n');
    }
}

fn field_or(obj: &Map<String, Value>, key: &str, fallback: &str) -> String {
    obj.get(key)
        .map(display_value)
        .unwrap_or_else(|| fallback.to_string())
}

fn display_value(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
