//! Decoding of generated monthly plans
//!
//! Generators are asked for a JSON array, but do not always comply. Decoding
//! tries the structured form first and only falls back to a line-scanning
//! heuristic when no JSON array can be read. The fallback is lossy: it
//! guesses day numbers from stray digits, treats any long line as a topic
//! and fills explanation, tone and platforms with fixed defaults.

use serde_json::Value;

use crate::types::{unique_platforms, MonthlyTopic, Platform, Tone, DEFAULT_PLATFORMS};

/// Upper bound on decoded entries
pub const MAX_PLAN_ENTRIES: usize = 30;

const FALLBACK_EXPLANATION: &str = "Generated content topic";
const FALLBACK_MIN_LINE_CHARS: usize = 20;

/// Decode a generated plan, structured form first, heuristic second.
///
/// Never returns more than [`MAX_PLAN_ENTRIES`] entries.
pub fn parse_monthly_plan(text: &str) -> Vec<MonthlyTopic> {
    match parse_structured(text) {
        Some(topics) => topics,
        None => {
            tracing::warn!("Monthly plan is not a JSON array, falling back to line scanning");
            parse_lines(text)
        }
    }
}

/// The span from the first `[` to the last `]`, read as a JSON array
fn parse_structured(text: &str) -> Option<Vec<MonthlyTopic>> {
    let start = text.find('[')?;
    let end = text.rfind(']')?;
    if end < start {
        return None;
    }
    let entries: Vec<Value> = serde_json::from_str(&text[start..=end]).ok()?;

    Some(
        entries
            .iter()
            .enumerate()
            .filter_map(|(index, entry)| structured_entry(index, entry))
            .take(MAX_PLAN_ENTRIES)
            .collect(),
    )
}

fn structured_entry(index: usize, entry: &Value) -> Option<MonthlyTopic> {
    let topic = entry.get("topic")?.as_str()?.trim();
    if topic.is_empty() {
        return None;
    }

    let day = match entry.get("day") {
        Some(Value::Number(n)) => u32::try_from(n.as_u64()?).ok()?,
        Some(Value::String(s)) => s.trim().parse().ok()?,
        _ => u32::try_from(index + 1).ok()?,
    };
    if !(1..=31).contains(&day) {
        return None;
    }

    let explanation = entry
        .get("explanation")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .trim()
        .to_string();
    let tone = entry
        .get("tone")
        .and_then(Value::as_str)
        .and_then(|t| t.parse::<Tone>().ok())
        .unwrap_or_default();
    let platforms = entry
        .get("platforms")
        .and_then(Value::as_array)
        .map(|names| {
            unique_platforms(
                names
                    .iter()
                    .filter_map(Value::as_str)
                    .filter_map(|name| name.parse::<Platform>().ok()),
            )
        })
        .unwrap_or_default();

    Some(MonthlyTopic {
        day,
        topic: topic.to_string(),
        explanation,
        tone,
        platforms,
    })
}

/// Heuristic fallback: one topic per long line, days taken from leading numbers
fn parse_lines(text: &str) -> Vec<MonthlyTopic> {
    let mut plan = Vec::new();
    let mut current_day: u32 = 1;

    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if let Some(day) = first_number(line) {
            current_day = day;
        }

        let is_topic =
            line.to_lowercase().contains("topic") || line.chars().count() > FALLBACK_MIN_LINE_CHARS;
        if is_topic && !(1..=31).contains(&current_day) {
            tracing::debug!("Dropping fallback topic outside the month (day {})", current_day);
            current_day = current_day.saturating_add(1);
            continue;
        }
        if is_topic {
            plan.push(MonthlyTopic {
                day: current_day,
                topic: strip_numbering(line).to_string(),
                explanation: FALLBACK_EXPLANATION.to_string(),
                tone: Tone::Professional,
                platforms: DEFAULT_PLATFORMS.to_vec(),
            });
            current_day = current_day.saturating_add(1);

            if plan.len() == MAX_PLAN_ENTRIES {
                break;
            }
        }
    }

    plan
}

fn first_number(line: &str) -> Option<u32> {
    let start = line.find(|c: char| c.is_ascii_digit())?;
    let digits: String = line[start..]
        .chars()
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse().ok()
}

/// Drop a leading "12." or "12 " list marker
fn strip_numbering(line: &str) -> &str {
    let rest = line.trim_start_matches(|c: char| c.is_ascii_digit());
    if rest.len() == line.len() {
        return line;
    }
    rest.strip_prefix('.').unwrap_or(rest).trim()
}
