//! Rule-based natural-language task extraction.
//!
//! Mirrors the contract the remote assistant is prompted with, so the
//! client can fall back to this path offline and get compatible drafts.
//! Everything here is a pure function of the input text and the supplied
//! "now" instant; tests freeze the clock.

use std::sync::LazyLock;

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use regex::{Captures, Regex};

use super::task::{Priority, TaskDraft};

static TODAY_AT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\btoday\s+at\s+(\d{1,2}):?(\d{2})?\s*(am|pm)\b").unwrap()
});

static TOMORROW_AT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\btomorrow\s+at\s+(\d{1,2}):?(\d{2})?\s*(am|pm)\b").unwrap()
});

static MONTH_DAY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d{1,2})/(\d{1,2})(?:\s+at\s+(\d{1,2}):?(\d{2})?\s*(am|pm))?\b").unwrap()
});

static RELATIVE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bin\s+(\d+)\s+(hour|minute|day)s?\b").unwrap());

/// Ordered by precedence: the first bucket with a keyword hit wins.
const URGENT_KEYWORDS: &[&str] = &["urgent", "asap", "immediately"];
const HIGH_KEYWORDS: &[&str] = &["important", "high priority"];
const LOW_KEYWORDS: &[&str] = &["low priority", "whenever"];

/// Ordered category table; the first category with a keyword hit wins.
const CATEGORY_KEYWORDS: &[(&str, &[&str])] = &[
    ("Work", &["work", "meeting", "office"]),
    ("Health", &["health", "doctor", "gym"]),
    ("Shopping", &["shopping", "buy", "grocery"]),
    ("Family", &["family"]),
    ("Bills", &["bill", "pay"]),
];

/// Split free text into clauses and produce one task draft per non-empty
/// clause. Deterministic given a fixed `now`.
pub fn extract_tasks(text: &str, now: DateTime<Utc>) -> Vec<TaskDraft> {
    text.split([',', ';', '\n'])
        .map(str::trim)
        .filter(|clause| !clause.is_empty())
        .map(|clause| extract_clause(clause, now))
        .collect()
}

fn extract_clause(text: &str, now: DateTime<Utc>) -> TaskDraft {
    let lower = text.to_lowercase();

    let (due_date, stripped_title) = extract_due_date(text, now);
    // Relative phrases only apply when no absolute pattern matched
    let due_date = due_date.or_else(|| extract_relative(text, now));

    // If stripping the date emptied the title, keep the clause verbatim
    let title = stripped_title.unwrap_or_else(|| text.to_string());

    let reminder_date = due_date.and_then(|due| {
        let reminder = due - Duration::minutes(30);
        (reminder > now).then_some(reminder)
    });

    let mut draft = TaskDraft::new(title);
    draft.priority = extract_priority(&lower);
    draft.category = extract_category(&lower).to_string();
    draft.due_date = due_date;
    draft.reminder_date = reminder_date;
    draft
}

fn extract_priority(lower: &str) -> Priority {
    let hit = |keywords: &[&str]| keywords.iter().any(|k| lower.contains(k));
    if hit(URGENT_KEYWORDS) {
        Priority::Urgent
    } else if hit(HIGH_KEYWORDS) {
        Priority::High
    } else if hit(LOW_KEYWORDS) {
        Priority::Low
    } else {
        Priority::Medium
    }
}

fn extract_category(lower: &str) -> &'static str {
    for (category, keywords) in CATEGORY_KEYWORDS {
        if keywords.iter().any(|k| lower.contains(k)) {
            return category;
        }
    }
    "General"
}

/// Try the absolute date patterns in order. On a match, returns the due
/// instant and the clause with the matched span (and stray "at" tokens)
/// removed; `None` title means stripping left nothing usable.
fn extract_due_date(text: &str, now: DateTime<Utc>) -> (Option<DateTime<Utc>>, Option<String>) {
    let today = now.date_naive();

    if let Some(caps) = TODAY_AT_RE.captures(text) {
        if let Some(due) = at_time(today, &caps, 1) {
            return (Some(due), strip_match(text, &caps));
        }
    }

    if let Some(caps) = TOMORROW_AT_RE.captures(text) {
        if let Some(due) = at_time(today + Duration::days(1), &caps, 1) {
            return (Some(due), strip_match(text, &caps));
        }
    }

    if let Some(caps) = MONTH_DAY_RE.captures(text) {
        let month: u32 = caps[1].parse().unwrap_or(0);
        let day: u32 = caps[2].parse().unwrap_or(0);
        if let Some(date) = NaiveDate::from_ymd_opt(now.year(), month, day) {
            let due = if caps.get(3).is_some() {
                at_time(date, &caps, 3)
            } else {
                // Date without a time defaults to 09:00
                Some(Utc.from_utc_datetime(&date.and_time(NaiveTime::from_hms_opt(9, 0, 0).unwrap())))
            };
            if let Some(due) = due {
                return (Some(due), strip_match(text, &caps));
            }
        }
    }

    (None, None)
}

/// Build a due instant from a date plus captured hour/minute/am-pm groups
/// starting at `idx`, with 12-hour to 24-hour conversion.
fn at_time(date: NaiveDate, caps: &Captures<'_>, idx: usize) -> Option<DateTime<Utc>> {
    let mut hour: u32 = caps.get(idx)?.as_str().parse().ok()?;
    let minute: u32 = caps
        .get(idx + 1)
        .map(|m| m.as_str().parse().unwrap_or(0))
        .unwrap_or(0);

    match caps.get(idx + 2).map(|m| m.as_str().to_lowercase()) {
        Some(ref ampm) if ampm == "pm" && hour < 12 => hour += 12,
        Some(ref ampm) if ampm == "am" && hour == 12 => hour = 0,
        _ => {}
    }

    let time = NaiveTime::from_hms_opt(hour, minute, 0)?;
    Some(Utc.from_utc_datetime(&date.and_time(time)))
}

fn extract_relative(text: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let caps = RELATIVE_RE.captures(text)?;
    let amount: i64 = caps[1].parse().ok()?;
    // Absurd amounts fall out of chrono's range; treat them as no match
    let delta = match caps[2].to_lowercase().as_str() {
        "minute" => Duration::try_minutes(amount),
        "day" => Duration::try_days(amount),
        _ => Duration::try_hours(amount),
    }?;
    now.checked_add_signed(delta)
}

/// Remove the matched span from the clause, plus a standalone "at" left
/// stranded right next to it; "at" elsewhere in the clause is part of the
/// title. Returns `None` when nothing remains.
fn strip_match(text: &str, caps: &Captures<'_>) -> Option<String> {
    let m = caps.get(0).unwrap();

    let mut words: Vec<&str> = text[..m.start()].split_whitespace().collect();
    if words.last().is_some_and(|w| w.eq_ignore_ascii_case("at")) {
        words.pop();
    }

    let mut tail: Vec<&str> = text[m.end()..].split_whitespace().collect();
    if tail.first().is_some_and(|w| w.eq_ignore_ascii_case("at")) {
        tail.remove(0);
    }
    words.extend(tail);

    let title = words.join(" ");
    (!title.is_empty()).then_some(title)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn frozen_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap()
    }

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn tomorrow_at_2pm() {
        let drafts = extract_tasks("call dentist tomorrow at 2pm", frozen_now());
        assert_eq!(drafts.len(), 1);
        let draft = &drafts[0];
        assert_eq!(draft.title, "call dentist");
        assert_eq!(draft.due_date, Some(utc(2024, 1, 16, 14, 0)));
        assert_eq!(draft.reminder_date, Some(utc(2024, 1, 16, 13, 30)));
    }

    #[test]
    fn reminder_suppressed_when_already_past() {
        let drafts = extract_tasks("meeting today at 10:15am", frozen_now());
        assert_eq!(drafts.len(), 1);
        let draft = &drafts[0];
        assert_eq!(draft.due_date, Some(utc(2024, 1, 15, 10, 15)));
        // 09:45 is before the frozen now of 10:00
        assert_eq!(draft.reminder_date, None);
        assert_eq!(draft.title, "meeting");
        assert_eq!(draft.category, "Work");
    }

    #[test]
    fn priority_and_category_precedence() {
        let drafts = extract_tasks("buy groceries urgent", frozen_now());
        assert_eq!(drafts[0].priority, Priority::Urgent);
        assert_eq!(drafts[0].category, "Shopping");
        assert_eq!(drafts[0].due_date, None);
    }

    #[test]
    fn urgent_outranks_high() {
        let drafts = extract_tasks("important and urgent work thing", frozen_now());
        assert_eq!(drafts[0].priority, Priority::Urgent);
    }

    #[test]
    fn clause_splitting() {
        let drafts = extract_tasks("call mom at 3pm, buy milk", frozen_now());
        assert_eq!(drafts.len(), 2);
        assert_eq!(drafts[1].title, "buy milk");
        assert_eq!(drafts[1].category, "Shopping");
    }

    #[test]
    fn empty_clauses_skipped() {
        let drafts = extract_tasks("buy milk,, ;\n  \npay rent", frozen_now());
        assert_eq!(drafts.len(), 2);
    }

    #[test]
    fn month_day_without_time_defaults_to_nine() {
        let drafts = extract_tasks("pay rent 3/20", frozen_now());
        let draft = &drafts[0];
        assert_eq!(draft.due_date, Some(utc(2024, 3, 20, 9, 0)));
        assert_eq!(draft.title, "pay rent");
        assert_eq!(draft.category, "Bills");
        assert_eq!(draft.reminder_date, Some(utc(2024, 3, 20, 8, 30)));
    }

    #[test]
    fn month_day_with_time() {
        let drafts = extract_tasks("doctor visit 2/1 at 4:30pm", frozen_now());
        let draft = &drafts[0];
        assert_eq!(draft.due_date, Some(utc(2024, 2, 1, 16, 30)));
        assert_eq!(draft.title, "doctor visit");
        assert_eq!(draft.category, "Health");
    }

    #[test]
    fn invalid_month_day_ignored() {
        let drafts = extract_tasks("look into 13/45 widget", frozen_now());
        assert_eq!(drafts[0].due_date, None);
        assert_eq!(drafts[0].title, "look into 13/45 widget");
    }

    #[test]
    fn twelve_hour_conversion() {
        let drafts = extract_tasks("lunch today at 12pm", frozen_now());
        assert_eq!(drafts[0].due_date, Some(utc(2024, 1, 15, 12, 0)));

        let drafts = extract_tasks("standup tomorrow at 12am", frozen_now());
        assert_eq!(drafts[0].due_date, Some(utc(2024, 1, 16, 0, 0)));
    }

    #[test]
    fn relative_time_fallback() {
        let drafts = extract_tasks("take out trash in 2 hours", frozen_now());
        let draft = &drafts[0];
        assert_eq!(draft.due_date, Some(utc(2024, 1, 15, 12, 0)));
        assert_eq!(draft.reminder_date, Some(utc(2024, 1, 15, 11, 30)));

        let drafts = extract_tasks("check oven in 20 minutes", frozen_now());
        assert_eq!(drafts[0].due_date, Some(utc(2024, 1, 15, 10, 20)));
        // due - 30min is in the past, so no reminder
        assert_eq!(drafts[0].reminder_date, None);
    }

    #[test]
    fn relative_time_out_of_range_is_ignored() {
        let drafts = extract_tasks("do it in 9223372036854775807 hours", frozen_now());
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].due_date, None);
        assert_eq!(drafts[0].reminder_date, None);
        assert_eq!(drafts[0].title, "do it in 9223372036854775807 hours");

        let drafts = extract_tasks("follow up in 99999999999 days", frozen_now());
        assert_eq!(drafts[0].due_date, None);
    }

    #[test]
    fn interior_at_survives_date_stripping() {
        let drafts = extract_tasks("meet Sam at the office tomorrow at 2pm", frozen_now());
        assert_eq!(drafts[0].title, "meet Sam at the office");
        assert_eq!(drafts[0].due_date, Some(utc(2024, 1, 16, 14, 0)));
    }

    #[test]
    fn stray_at_next_to_date_is_dropped() {
        let drafts = extract_tasks("dinner at 3/20 at 7pm", frozen_now());
        assert_eq!(drafts[0].title, "dinner");
        assert_eq!(drafts[0].due_date, Some(utc(2024, 3, 20, 19, 0)));
    }

    #[test]
    fn stripped_empty_title_falls_back_to_clause() {
        let drafts = extract_tasks("tomorrow at 2pm", frozen_now());
        assert_eq!(drafts[0].title, "tomorrow at 2pm");
        assert_eq!(drafts[0].due_date, Some(utc(2024, 1, 16, 14, 0)));
    }

    #[test]
    fn deterministic_under_frozen_clock() {
        let a = extract_tasks("call dentist tomorrow at 2pm, buy milk", frozen_now());
        let b = extract_tasks("call dentist tomorrow at 2pm, buy milk", frozen_now());
        assert_eq!(a, b);
    }
}
