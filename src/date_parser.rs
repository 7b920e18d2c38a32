//! Date parsing for history filters.
//!
//! Filters use half-open windows: the start is inclusive and the end is
//! exclusive. A date without a time therefore covers the whole day, and as an
//! upper bound it resolves to midnight of the following day.
//!
//! Accepted forms, tried in order:
//!
//! - RFC 3339 (`2024-01-15T10:30:00Z`)
//! - `YYYY-MM-DD` (UTC day)
//! - `YYYY-MM-DD HH:MM[:SS]` (local time)
//! - `YYYY-MM` and `Jan 2024` (UTC month)
//! - `today`, `yesterday`, `this month`, `this year`, `last N days|weeks`,
//!   `N days|weeks|months ago`
//! - anything `chrono-english` understands (`last friday`, `March 3`)

use crate::error::{ChatDbError, Result};
use crate::model::MessageFilter;
use chrono::{
    DateTime, Datelike, Duration, Local, LocalResult, NaiveDate, NaiveDateTime, TimeZone, Utc,
};
use chrono_english::{Dialect, parse_date_string};
use tracing::{debug, trace, warn};

/// A parsed expression: an instant or a half-open span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParsedDate {
    Point(DateTime<Utc>),
    Span {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

impl ParsedDate {
    const fn bound(self, prefer_end: bool) -> DateTime<Utc> {
        match self {
            Self::Point(dt) => dt,
            Self::Span { start, end } => {
                if prefer_end {
                    end
                } else {
                    start
                }
            }
        }
    }
}

/// Parse `input` as a filter bound.
///
/// With `prefer_end` set, spans such as whole days resolve to their
/// exclusive end.
///
/// # Errors
///
/// Returns [`ChatDbError::InvalidDate`] echoing `input` when nothing matches.
pub fn parse_date_flexible(input: &str, prefer_end: bool) -> Result<DateTime<Utc>> {
    let context = if prefer_end { "end bound" } else { "start bound" };
    parse_bound(input, prefer_end, context, Local::now())
}

fn parse_bound(
    input: &str,
    prefer_end: bool,
    context: &str,
    base: DateTime<Local>,
) -> Result<DateTime<Utc>> {
    parse_with_base(input, base)
        .map(|parsed| parsed.bound(prefer_end))
        .ok_or_else(|| {
            warn!(input, "Failed to parse date expression");
            ChatDbError::invalid_date(input, context)
        })
}

fn parse_with_base(input: &str, base: DateTime<Local>) -> Option<ParsedDate> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        trace!(input = trimmed, "Parsed RFC 3339 timestamp");
        return Some(ParsedDate::Point(dt.with_timezone(&Utc)));
    }
    if let Some(parsed) = try_parse_iso_date(trimmed) {
        trace!(input = trimmed, "Parsed ISO date");
        return Some(parsed);
    }
    if let Some(parsed) = try_parse_local_datetime(trimmed) {
        trace!(input = trimmed, "Parsed local datetime");
        return Some(parsed);
    }

    let normalized = trimmed.to_lowercase();
    if let Some(parsed) = try_parse_month_year(&normalized) {
        debug!(input = trimmed, "Parsed month range");
        return Some(parsed);
    }
    if is_relative_form(&normalized) {
        let parsed = try_parse_relative(&normalized, base);
        if parsed.is_some() {
            debug!(input = trimmed, "Parsed relative date expression");
        }
        return parsed;
    }
    // Huge counts overflow the natural-language parser's duration arithmetic.
    if longest_digit_run(&normalized) > MAX_NATURAL_DIGITS {
        return None;
    }

    let dt = parse_date_string(&normalized, base, Dialect::Us).ok()?;
    debug!(input = trimmed, "Parsed natural language date");
    if has_explicit_time(&normalized) {
        Some(ParsedDate::Point(dt.with_timezone(&Utc)))
    } else {
        local_days(dt.date_naive(), dt.date_naive())
    }
}

/// Build a history filter from CLI-style arguments.
///
/// # Errors
///
/// Returns [`ChatDbError::InvalidDate`] for an unparsable bound and
/// [`ChatDbError::InvalidArgument`] when the window is empty.
pub fn build_filter(
    since: Option<&str>,
    until: Option<&str>,
    participants: &[String],
) -> Result<MessageFilter> {
    build_filter_with_base(since, until, participants, Local::now())
}

fn build_filter_with_base(
    since: Option<&str>,
    until: Option<&str>,
    participants: &[String],
    base: DateTime<Local>,
) -> Result<MessageFilter> {
    let start = since
        .map(|s| parse_bound(s, false, "--since", base))
        .transpose()?;
    let end = until
        .map(|s| parse_bound(s, true, "--until", base))
        .transpose()?;

    if let (Some(start), Some(end)) = (start, end) {
        if start >= end {
            return Err(ChatDbError::invalid_argument(format!(
                "--since ({}) must be before --until ({})",
                since.unwrap_or_default(),
                until.unwrap_or_default()
            )));
        }
    }

    let participants = participants
        .iter()
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect();

    Ok(MessageFilter {
        participants,
        start,
        end,
    })
}

fn try_parse_iso_date(input: &str) -> Option<ParsedDate> {
    let date = NaiveDate::parse_from_str(input, "%Y-%m-%d").ok()?;
    let start = date.and_hms_opt(0, 0, 0)?.and_utc();
    Some(ParsedDate::Span {
        start,
        end: start + Duration::days(1),
    })
}

fn try_parse_local_datetime(input: &str) -> Option<ParsedDate> {
    let naive = NaiveDateTime::parse_from_str(input, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(input, "%Y-%m-%d %H:%M"))
        .ok()?;
    local_to_utc(naive).map(ParsedDate::Point)
}

fn has_explicit_time(input: &str) -> bool {
    if input.contains(':') {
        return true;
    }
    input
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|token| !token.is_empty())
        .any(|token| {
            matches!(token, "am" | "pm" | "noon" | "midnight")
                || token
                    .strip_suffix("am")
                    .or_else(|| token.strip_suffix("pm"))
                    .is_some_and(|num| !num.is_empty() && num.chars().all(|c| c.is_ascii_digit()))
        })
}

#[derive(Clone, Copy)]
enum RelativeUnit {
    Day,
    Week,
    Month,
}

fn parse_unit(token: &str) -> Option<RelativeUnit> {
    match token.trim_end_matches('s') {
        "day" => Some(RelativeUnit::Day),
        "week" => Some(RelativeUnit::Week),
        "month" => Some(RelativeUnit::Month),
        _ => None,
    }
}

fn parse_count(token: &str) -> Option<i64> {
    token.parse::<i64>().ok().filter(|&n| n > 0)
}

/// Longest number the natural-language fallback is given.
const MAX_NATURAL_DIGITS: usize = 6;

fn longest_digit_run(input: &str) -> usize {
    input
        .split(|c: char| !c.is_ascii_digit())
        .map(str::len)
        .max()
        .unwrap_or(0)
}

/// Whether `input` has the shape of a relative expression handled here, valid
/// or not. Such input never reaches the natural-language fallback.
fn is_relative_form(input: &str) -> bool {
    let tokens: Vec<&str> = input.split_whitespace().collect();
    match tokens.as_slice() {
        ["today" | "yesterday"] | ["this", "month" | "year"] => true,
        ["last" | "past", count, unit] | [count, unit, "ago"] => {
            count.chars().all(|c| c.is_ascii_digit()) && parse_unit(unit).is_some()
        }
        _ => false,
    }
}

fn try_parse_relative(input: &str, base: DateTime<Local>) -> Option<ParsedDate> {
    let tokens: Vec<&str> = input.split_whitespace().collect();
    let today = base.date_naive();

    match tokens.as_slice() {
        ["today"] => local_days(today, today),
        ["yesterday"] => {
            let day = today.pred_opt()?;
            local_days(day, day)
        }
        ["this", "month"] => local_days(today.with_day(1)?, today),
        ["this", "year"] => local_days(NaiveDate::from_ymd_opt(today.year(), 1, 1)?, today),
        ["last" | "past", count, unit] => {
            let days = match parse_unit(unit)? {
                RelativeUnit::Day => parse_count(count)?,
                RelativeUnit::Week => parse_count(count)?.checked_mul(7)?,
                RelativeUnit::Month => {
                    let months = chrono::Months::new(u32::try_from(parse_count(count)?).ok()?);
                    let first = today.checked_sub_months(months)?.succ_opt()?;
                    return local_days(first, today);
                }
            };
            let first = today.checked_sub_signed(Duration::try_days(days - 1)?)?;
            local_days(first, today)
        }
        [count, unit, "ago"] => {
            let count = parse_count(count)?;
            let day = match parse_unit(unit)? {
                RelativeUnit::Day => today.checked_sub_signed(Duration::try_days(count)?)?,
                RelativeUnit::Week => {
                    today.checked_sub_signed(Duration::try_days(count.checked_mul(7)?)?)?
                }
                RelativeUnit::Month => {
                    today.checked_sub_months(chrono::Months::new(u32::try_from(count).ok()?))?
                }
            };
            Some(ParsedDate::Point(local_to_utc(day.and_hms_opt(0, 0, 0)?)?))
        }
        _ => None,
    }
}

fn try_parse_month_year(input: &str) -> Option<ParsedDate> {
    let (year, month) = parse_year_month_numeric(input).or_else(|| {
        let mut parts = input.split_whitespace();
        let month = parse_month_name(parts.next()?)?;
        let year = parts.next()?.parse::<i32>().ok()?;
        parts.next().is_none().then_some((year, month))
    })?;

    let start = Utc.with_ymd_and_hms(year, month, 1, 0, 0, 0).single()?;
    let end = start.checked_add_months(chrono::Months::new(1))?;
    Some(ParsedDate::Span { start, end })
}

fn parse_year_month_numeric(input: &str) -> Option<(i32, u32)> {
    let mut parts = input.split(['-', '/']);
    let year_str = parts.next()?;
    let month_str = parts.next()?;
    if parts.next().is_some() || year_str.len() != 4 {
        return None;
    }
    let year = year_str.parse::<i32>().ok()?;
    let month = month_str.parse::<u32>().ok()?;
    (1..=12).contains(&month).then_some((year, month))
}

fn parse_month_name(input: &str) -> Option<u32> {
    match input {
        "jan" | "january" => Some(1),
        "feb" | "february" => Some(2),
        "mar" | "march" => Some(3),
        "apr" | "april" => Some(4),
        "may" => Some(5),
        "jun" | "june" => Some(6),
        "jul" | "july" => Some(7),
        "aug" | "august" => Some(8),
        "sep" | "sept" | "september" => Some(9),
        "oct" | "october" => Some(10),
        "nov" | "november" => Some(11),
        "dec" | "december" => Some(12),
        _ => None,
    }
}

/// Local days `first..=last` as a half-open span.
fn local_days(first: NaiveDate, last: NaiveDate) -> Option<ParsedDate> {
    let start = local_to_utc(first.and_hms_opt(0, 0, 0)?)?;
    let end = local_to_utc(last.succ_opt()?.and_hms_opt(0, 0, 0)?)?;
    Some(ParsedDate::Span { start, end })
}

fn local_to_utc(naive: NaiveDateTime) -> Option<DateTime<Utc>> {
    match Local.from_local_datetime(&naive) {
        LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => Some(dt.with_timezone(&Utc)),
        LocalResult::None => None,
    }
}
