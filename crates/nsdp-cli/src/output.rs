//! Result rendering for stdout

use anyhow::Result;
use nsdp_core::{Reply, SwitchInfo};
use std::fmt::Write;

const RESPONSE_SEPARATOR: &str = "---------- Response ----------";

/// Human-readable blocks, one per reply, records in wire order
pub fn render_text(replies: &[Reply]) -> String {
    if replies.is_empty() {
        return "no response\n".to_string();
    }

    let mut out = String::new();
    for reply in replies {
        let _ = writeln!(out, "{}", RESPONSE_SEPARATOR);
        for (record_type, value) in &reply.values {
            let _ = writeln!(out, "{:<16}: {}", record_type.label(), value);
        }
    }
    out
}

/// Pretty-printed JSON array of reply summaries
pub fn render_json(replies: &[Reply]) -> Result<String> {
    let summaries: Vec<SwitchInfo> = replies.iter().map(Reply::summary).collect();
    Ok(serde_json::to_string_pretty(&summaries)?)
}
