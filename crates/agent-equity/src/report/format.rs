//! Display helpers shared by the report templates

use crate::agents::{Action, RiskLevel};
use crate::data::model::NOT_AVAILABLE;
use minijinja::{Environment, Value};

const BAR_WIDTH: u8 = 10;
const UNKNOWN_MARKER: &str = "⚪";

/// `█` per point of `score`, padded with `░` to ten cells
pub fn confidence_bar(score: Option<u8>) -> String {
    let filled = score.unwrap_or(0).min(BAR_WIDTH);
    let mut bar = "█".repeat(filled.into());
    bar.push_str(&"░".repeat((BAR_WIDTH - filled).into()));
    bar
}

/// Risk score as coloured cells: green up to 3, yellow up to 7, red above
pub fn risk_bar(score: Option<u8>) -> String {
    let filled = score.unwrap_or(0).min(BAR_WIDTH);
    let cell = match filled {
        0..=3 => "🟢",
        4..=7 => "🟡",
        _ => "🔴",
    };
    let mut bar = cell.repeat(filled.into());
    bar.push_str(&UNKNOWN_MARKER.repeat((BAR_WIDTH - filled).into()));
    bar
}

pub fn action_marker(action: Option<Action>) -> &'static str {
    action.map_or(UNKNOWN_MARKER, Action::emoji)
}

pub fn risk_marker(level: Option<RiskLevel>) -> &'static str {
    level.map_or(UNKNOWN_MARKER, RiskLevel::emoji)
}

/// Markdown bullet list, or `- 无` when empty
pub fn bullet_list<S: AsRef<str>>(items: &[S]) -> String {
    if items.is_empty() {
        return "- 无".to_string();
    }
    items
        .iter()
        .map(|item| format!("- {}", item.as_ref()))
        .collect::<Vec<_>>()
        .join("\n")
}

fn score_of(value: &Value) -> Option<u8> {
    i64::try_from(value.clone())
        .ok()
        .or_else(|| f64::try_from(value.clone()).ok().map(|f| f.round() as i64))
        .map(|score| score.clamp(0, i64::from(BAR_WIDTH)) as u8)
}

fn is_blank(value: &Value) -> bool {
    value.is_undefined() || value.is_none() || value.as_str().is_some_and(|s| s.trim().is_empty())
}

fn na_filter(value: Value) -> String {
    if is_blank(&value) {
        NOT_AVAILABLE.to_string()
    } else {
        value.to_string()
    }
}

fn bullets_filter(value: Value) -> String {
    if is_blank(&value) {
        return bullet_list::<&str>(&[]);
    }
    if value.as_str().is_some() {
        return bullet_list(&[value.to_string()]);
    }
    let items: Vec<String> = value
        .try_iter()
        .map(|iter| iter.map(|item| item.to_string()).collect())
        .unwrap_or_default();
    bullet_list(&items)
}

fn action_filter(value: Value) -> String {
    action_marker(value.as_str().and_then(|label| label.parse().ok())).to_string()
}

fn risk_filter(value: Value) -> String {
    risk_marker(value.as_str().and_then(|label| label.parse().ok())).to_string()
}

fn confidence_bar_filter(value: Value) -> String {
    confidence_bar(score_of(&value))
}

fn risk_bar_filter(value: Value) -> String {
    risk_bar(score_of(&value))
}

/// Template environment with the report filters registered
pub(crate) fn environment() -> Environment<'static> {
    let mut env = Environment::new();
    env.add_filter("na", na_filter);
    env.add_filter("bullets", bullets_filter);
    env.add_filter("action_marker", action_filter);
    env.add_filter("risk_marker", risk_filter);
    env.add_filter("confidence_bar", confidence_bar_filter);
    env.add_filter("risk_bar", risk_bar_filter);
    env
}
