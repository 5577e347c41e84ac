use lazy_static::lazy_static;
use log::{debug, info, warn};
use regex::Regex;
use serde_json::Value;
use shared::MessTask;

use crate::ai::provider::AiError;

/// Providers are not guaranteed to honor the requested output schema, so
/// parsing degrades gracefully: fenced JSON, then bare JSON, then a
/// line-based heuristic. Only when nothing usable remains does this fail.
const MAX_FALLBACK_TASKS: usize = 10;
const MIN_LINE_LENGTH: usize = 11;

lazy_static! {
    static ref FENCED_BLOCK: Regex =
        Regex::new(r"(?s)```(?:json)?\s*(.*?)\s*```").expect("hard-coded regex");
    // Lines that open as refusals or "nothing found" commentary rather
    // than task descriptions. Anchored at the start so negated task
    // phrasing ("clothes not put away") still counts as a task.
    static ref NON_TASK_LINE: Regex =
        Regex::new(r"(?i)^(no|not|none|nothing|sorry|i\s+cannot|i\s+can't|unable)\b")
            .expect("hard-coded regex");
}

pub fn parse(raw_text: &str) -> Result<Vec<MessTask>, AiError> {
    debug!("Attempting to parse AI response: {raw_text}");

    let content = FENCED_BLOCK
        .captures(raw_text)
        .and_then(|captures| captures.get(1))
        .map(|inner| inner.as_str())
        .unwrap_or(raw_text)
        .trim();

    // The JSON-decode failure is deliberately the one recovered error
    // here; it selects the line-based fallback.
    match serde_json::from_str::<Value>(content) {
        Ok(value) => {
            let tasks = parse_structured(&value).ok_or_else(AiError::unexpected_format)?;
            info!("Parsed {} tasks from structured response", tasks.len());
            Ok(tasks)
        }
        Err(_) => {
            warn!("AI response is not valid JSON, falling back to line parsing");
            let tasks = parse_lines(content);
            if tasks.is_empty() {
                return Err(AiError::unexpected_format());
            }
            info!("Extracted {} tasks with the line-based fallback", tasks.len());
            Ok(tasks)
        }
    }
}

fn parse_structured(value: &Value) -> Option<Vec<MessTask>> {
    if let Some(tasks) = value.get("tasks").and_then(Value::as_array) {
        return Some(tasks.iter().map(task_from_value).collect());
    }

    // Legacy shape: a bare array of task descriptions.
    if let Some(items) = value.as_array() {
        return Some(
            items
                .iter()
                .map(|item| MessTask::without_reason(stringify(item)))
                .collect(),
        );
    }

    None
}

fn task_from_value(value: &Value) -> MessTask {
    if let Some(object) = value.as_object() {
        let mess = object
            .get("mess")
            .or_else(|| object.get("description"))
            .map(stringify)
            .unwrap_or_else(|| stringify(value));
        let reason = object
            .get("reason")
            .and_then(Value::as_str)
            .filter(|reason| !reason.is_empty())
            .map(str::to_string)
            .unwrap_or_else(shared::default_reason);
        return MessTask::new(mess, reason);
    }
    MessTask::without_reason(stringify(value))
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn parse_lines(text: &str) -> Vec<MessTask> {
    text.lines()
        .map(str::trim)
        .filter(|line| !is_trivial_line(line))
        .map(strip_list_decoration)
        .filter(|line| line.len() >= MIN_LINE_LENGTH && !NON_TASK_LINE.is_match(line))
        .map(MessTask::without_reason)
        .take(MAX_FALLBACK_TASKS)
        .collect()
}

fn is_trivial_line(line: &str) -> bool {
    line.is_empty()
        || line.starts_with('#')
        || line.starts_with('{')
        || line.starts_with('}')
        || matches!(line, "```" | "```json" | "tasks:")
}

fn strip_list_decoration(line: &str) -> &str {
    line.trim_start_matches(['•', '-', '*', '[', ']', '"', ' '])
        .trim_end_matches(['"', ',', ' '])
}
