//! Classification and reconciliation of reaction ("tapback") rows.
//!
//! Reactions are stored as ordinary message rows whose
//! `associated_message_type` falls in one of two code ranges:
//!
//! | codes         | meaning                                    |
//! |---------------|--------------------------------------------|
//! | `2000..=2005` | add love, like, dislike, laugh, emphasis, question |
//! | `2006`        | add custom emoji (emoji carried in `text`) |
//! | `3000..=3006` | remove the matching add                    |
//!
//! Everything else is content, including replies, which are type `0` rows
//! with a non-empty associated GUID.

use crate::model::{Reaction, ReactionKind};
use chrono::{DateTime, Utc};
use tracing::{debug, trace};

/// First "add" code.
pub const REACTION_ADD_BASE: i64 = 2000;
/// Offset of the custom-emoji code from [`REACTION_ADD_BASE`].
pub const CUSTOM_EMOJI_OFFSET: i64 = 6;
/// Offset from an "add" code to its "remove" code.
pub const REACTION_REMOVE_OFFSET: i64 = 1000;

const ADD_RANGE: std::ops::RangeInclusive<i64> =
    REACTION_ADD_BASE..=REACTION_ADD_BASE + CUSTOM_EMOJI_OFFSET;
const REMOVE_RANGE: std::ops::RangeInclusive<i64> = REACTION_ADD_BASE + REACTION_REMOVE_OFFSET
    ..=REACTION_ADD_BASE + REACTION_REMOVE_OFFSET + CUSTOM_EMOJI_OFFSET;

/// Whether a reaction is being added or withdrawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReactionAction {
    Add,
    Remove,
}

/// A classified reaction row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReactionEvent {
    pub action: ReactionAction,
    pub kind: ReactionKind,
}

/// Result of classifying one raw row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowClass {
    /// Ordinary content, replies included.
    Content,
    Reaction(ReactionEvent),
}

/// True for codes in either the add or the remove range.
#[must_use]
pub fn is_reaction_code(associated_type: i64) -> bool {
    ADD_RANGE.contains(&associated_type) || REMOVE_RANGE.contains(&associated_type)
}

/// SQL predicate matching rows that are not reactions. `column` is the
/// qualified `associated_message_type` column.
#[must_use]
pub fn content_predicate(column: &str) -> String {
    format!(
        "({column} IS NULL OR ({column} NOT BETWEEN {} AND {} AND {column} NOT BETWEEN {} AND {}))",
        ADD_RANGE.start(),
        ADD_RANGE.end(),
        REMOVE_RANGE.start(),
        REMOVE_RANGE.end(),
    )
}

/// Classify a row from its type code and literal text.
#[must_use]
pub fn classify(associated_type: i64, text: &str) -> RowClass {
    let (action, offset) = if ADD_RANGE.contains(&associated_type) {
        (ReactionAction::Add, associated_type - ADD_RANGE.start())
    } else if REMOVE_RANGE.contains(&associated_type) {
        (ReactionAction::Remove, associated_type - REMOVE_RANGE.start())
    } else {
        return RowClass::Content;
    };

    let kind = usize::try_from(offset)
        .ok()
        .and_then(|idx| ReactionKind::FIXED.get(idx).cloned())
        .unwrap_or_else(|| ReactionKind::Custom(extract_custom_emoji(text).unwrap_or_default()));

    RowClass::Reaction(ReactionEvent { action, kind })
}

/// Strip the conventional `p:0/` or `bp:` prefix from an associated GUID.
#[must_use]
pub fn normalize_target_guid(raw: &str) -> &str {
    if let Some((_, rest)) = raw.rsplit_once('/') {
        return rest;
    }
    if let Some((prefix, rest)) = raw.split_once(':') {
        if !prefix.is_empty() && prefix.chars().all(|c| c.is_ascii_alphanumeric()) {
            return rest;
        }
    }
    raw
}

/// Match an associated GUID against a message GUID: exact first, then with
/// the prefix stripped.
#[must_use]
pub fn target_matches(associated: &str, guid: &str) -> bool {
    !guid.is_empty() && (associated == guid || normalize_target_guid(associated) == guid)
}

/// The GUID a content row replies to, if any.
#[must_use]
pub fn reply_target(
    associated_type: i64,
    associated_guid: Option<&str>,
    thread_originator_guid: Option<&str>,
) -> Option<String> {
    if is_reaction_code(associated_type) {
        return None;
    }
    associated_guid
        .map(|guid| normalize_target_guid(guid.trim()))
        .filter(|guid| !guid.is_empty())
        .or_else(|| thread_originator_guid.map(str::trim).filter(|guid| !guid.is_empty()))
        .map(str::to_string)
}

// =============================================================================
// Custom emoji extraction
// =============================================================================

/// English sentence frames wrapping the emoji of a custom reaction.
const SENTENCE_FRAMES: &[(&str, &str)] = &[("Reacted ", " to "), ("Removed ", " from ")];

/// Pull the single emoji out of a custom reaction's text.
///
/// The English form is `Reacted 🔥 to “…”`. Other locales wrap the emoji in
/// different words, so when no English frame fits, the first emoji cluster
/// anywhere in the text is used.
#[must_use]
pub fn extract_custom_emoji(text: &str) -> Option<String> {
    for (prefix, suffix) in SENTENCE_FRAMES {
        if let Some(rest) = text.strip_prefix(prefix) {
            let inner = rest.split_once(suffix).map_or(rest, |(emoji, _)| emoji);
            if let Some(emoji) = first_emoji_cluster(inner.trim()) {
                return Some(emoji);
            }
        }
    }
    first_emoji_cluster(text)
}

const ZWJ: char = '\u{200D}';
const VS15: char = '\u{FE0E}';
const VS16: char = '\u{FE0F}';
const KEYCAP: char = '\u{20E3}';

/// First emoji grapheme cluster in `text`.
fn first_emoji_cluster(text: &str) -> Option<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let next = chars.get(i + 1).copied();
        if let Some(len) = cluster_len(&chars[i..], next) {
            return Some(chars[i..i + len].iter().collect());
        }
        i += 1;
    }
    None
}

/// Length in chars of the emoji cluster starting at `chars[0]`, if it starts one.
fn cluster_len(chars: &[char], next: Option<char>) -> Option<usize> {
    let first = chars[0];

    if is_regional_indicator(first) {
        return Some(if next.is_some_and(is_regional_indicator) { 2 } else { 1 });
    }
    if matches!(first, '0'..='9' | '#' | '*') {
        return (next == Some(VS16) && chars.get(2) == Some(&KEYCAP)).then_some(3);
    }
    let presentation = is_pictographic(first) || (is_text_default(first) && next == Some(VS16));
    if !presentation {
        return None;
    }

    let mut len = 1;
    while len < chars.len() {
        let c = chars[len];
        if c == VS16 || c == VS15 || c == KEYCAP || is_skin_tone(c) || is_tag(c) {
            len += 1;
        } else if c == ZWJ
            && chars
                .get(len + 1)
                .is_some_and(|&joined| is_pictographic(joined) || is_text_default(joined))
        {
            len += 2;
        } else {
            break;
        }
    }
    Some(len)
}

fn is_pictographic(c: char) -> bool {
    matches!(c,
        '\u{1F000}'..='\u{1FAFF}'
        | '\u{2600}'..='\u{27BF}'
        | '\u{2300}'..='\u{23FF}'
        | '\u{2B00}'..='\u{2BFF}'
        | '\u{3030}' | '\u{303D}' | '\u{3297}' | '\u{3299}')
        && !is_skin_tone(c)
        && !is_regional_indicator(c)
}

/// Symbols that render as text unless followed by VS16.
fn is_text_default(c: char) -> bool {
    matches!(c,
        '\u{00A9}' | '\u{00AE}' | '\u{203C}' | '\u{2049}' | '\u{2122}' | '\u{2139}'
        | '\u{2194}'..='\u{21AA}'
        | '\u{24C2}'
        | '\u{25AA}'..='\u{25FE}'
        | '\u{2934}' | '\u{2935}')
}

fn is_regional_indicator(c: char) -> bool {
    matches!(c, '\u{1F1E6}'..='\u{1F1FF}')
}

fn is_skin_tone(c: char) -> bool {
    matches!(c, '\u{1F3FB}'..='\u{1F3FF}')
}

fn is_tag(c: char) -> bool {
    matches!(c, '\u{E0020}'..='\u{E007F}')
}

// =============================================================================
// Reconciliation
// =============================================================================

/// A raw row that may react to some message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReactionRow {
    pub row_id: i64,
    pub associated_type: i64,
    pub associated_guid: String,
    pub text: String,
    pub sender: String,
    pub is_from_me: bool,
    pub date: DateTime<Utc>,
}

/// Fold add/remove rows into the reactions currently active on one message.
///
/// Rows that do not target `target_guid` or are not reactions are ignored.
/// A remove cancels the earlier add with the same sender and kind, and both
/// disappear from the output. The result is ordered by source row id.
#[must_use]
pub fn resolve_reactions(target_row_id: i64, target_guid: &str, rows: &[ReactionRow]) -> Vec<Reaction> {
    let mut ordered: Vec<&ReactionRow> = rows
        .iter()
        .filter(|row| target_matches(&row.associated_guid, target_guid))
        .collect();
    ordered.sort_by_key(|row| row.row_id);

    let mut active: Vec<Reaction> = Vec::new();
    for row in ordered {
        let RowClass::Reaction(event) = classify(row.associated_type, &row.text) else {
            continue;
        };
        let same_sender =
            |r: &Reaction| r.is_from_me == row.is_from_me && r.sender == row.sender;

        match event.action {
            ReactionAction::Add => {
                if matches!(&event.kind, ReactionKind::Custom(emoji) if emoji.is_empty()) {
                    debug!(row_id = row.row_id, "Custom reaction without a recognisable emoji");
                    continue;
                }
                active.retain(|r| !(same_sender(r) && r.kind == event.kind));
                active.push(Reaction {
                    target_row_id,
                    kind: event.kind,
                    sender: row.sender.clone(),
                    is_from_me: row.is_from_me,
                    date: row.date,
                    source_row_id: row.row_id,
                });
            }
            ReactionAction::Remove => {
                let before = active.len();
                active.retain(|r| !(same_sender(r) && cancels(&event.kind, &r.kind)));
                trace!(
                    row_id = row.row_id,
                    removed = before - active.len(),
                    "Applied reaction removal"
                );
            }
        }
    }
    active
}

/// Whether a removal of `removed` cancels an active `existing` reaction.
/// A custom removal whose emoji could not be read cancels any custom reaction.
fn cancels(removed: &ReactionKind, existing: &ReactionKind) -> bool {
    match (removed, existing) {
        (ReactionKind::Custom(r), ReactionKind::Custom(_)) if r.is_empty() => true,
        _ => removed == existing,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn row(row_id: i64, code: i64, target: &str, sender: &str, text: &str) -> ReactionRow {
        ReactionRow {
            row_id,
            associated_type: code,
            associated_guid: target.to_string(),
            text: text.to_string(),
            sender: sender.to_string(),
            is_from_me: false,
            date: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
                + chrono::Duration::seconds(row_id),
        }
    }

    #[test]
    fn fixed_codes_map_in_order() {
        let expected = [
            ReactionKind::Love,
            ReactionKind::Like,
            ReactionKind::Dislike,
            ReactionKind::Laugh,
            ReactionKind::Emphasis,
            ReactionKind::Question,
        ];
        for (offset, kind) in (0_i64..).zip(expected) {
            assert_eq!(
                classify(2000 + offset, ""),
                RowClass::Reaction(ReactionEvent {
                    action: ReactionAction::Add,
                    kind: kind.clone()
                })
            );
            assert_eq!(
                classify(3000 + offset, ""),
                RowClass::Reaction(ReactionEvent {
                    action: ReactionAction::Remove,
                    kind
                })
            );
        }
    }

    #[test]
    fn codes_outside_ranges_are_content() {
        for code in [0, 1, 1000, 1999, 2007, 2999, 3007, 4000] {
            assert_eq!(classify(code, "hi"), RowClass::Content, "code {code}");
            assert!(!is_reaction_code(code));
        }
        assert!(is_reaction_code(2006));
        assert!(is_reaction_code(3006));
    }

    #[test]
    fn custom_emoji_from_english_sentence() {
        assert_eq!(
            extract_custom_emoji("Reacted 🔥 to “ship it”").as_deref(),
            Some("🔥")
        );
        assert_eq!(
            extract_custom_emoji("Removed 🎉 from “party”").as_deref(),
            Some("🎉")
        );
    }

    #[test]
    fn custom_emoji_keeps_whole_cluster() {
        assert_eq!(
            extract_custom_emoji("Reacted 👍🏽 to “ok”").as_deref(),
            Some("👍🏽")
        );
        assert_eq!(
            extract_custom_emoji("Reacted 👩‍💻 to “deploy”").as_deref(),
            Some("👩‍💻")
        );
        assert_eq!(
            extract_custom_emoji("Reacted ❤️ to “x”").as_deref(),
            Some("❤️")
        );
        assert_eq!(extract_custom_emoji("Reacted 🇫🇷 to “x”").as_deref(), Some("🇫🇷"));
    }

    #[test]
    fn custom_emoji_falls_back_for_other_locales() {
        assert_eq!(
            extract_custom_emoji("A réagi avec 😮 à « bonjour »").as_deref(),
            Some("😮")
        );
        assert_eq!(extract_custom_emoji("no emoji here"), None);
    }

    #[test]
    fn custom_emoji_fallback_takes_first_cluster() {
        // The quoted message itself may contain an emoji after the reaction.
        assert_eq!(
            extract_custom_emoji("Hat mit 🙏 auf „Danke 😊“ reagiert").as_deref(),
            Some("🙏")
        );
    }

    #[test]
    fn classify_custom_code() {
        assert_eq!(
            classify(2006, "Reacted 🤯 to “news”"),
            RowClass::Reaction(ReactionEvent {
                action: ReactionAction::Add,
                kind: ReactionKind::Custom("🤯".into()),
            })
        );
    }

    #[test]
    fn normalize_strips_conventional_prefixes() {
        assert_eq!(normalize_target_guid("p:0/ABC-123"), "ABC-123");
        assert_eq!(normalize_target_guid("p:1/ABC-123"), "ABC-123");
        assert_eq!(normalize_target_guid("bp:ABC-123"), "ABC-123");
        assert_eq!(normalize_target_guid("ABC-123"), "ABC-123");
    }

    #[test]
    fn target_matching_tries_exact_then_stripped() {
        assert!(target_matches("ABC", "ABC"));
        assert!(target_matches("p:0/ABC", "ABC"));
        assert!(target_matches("bp:ABC", "ABC"));
        assert!(!target_matches("p:0/ABD", "ABC"));
        assert!(!target_matches("", ""));
    }

    #[test]
    fn reply_target_for_content_rows_only() {
        assert_eq!(reply_target(0, Some("p:0/PARENT"), None).as_deref(), Some("PARENT"));
        assert_eq!(reply_target(0, Some("PARENT"), None).as_deref(), Some("PARENT"));
        assert_eq!(reply_target(0, None, Some("THREAD")).as_deref(), Some("THREAD"));
        assert_eq!(reply_target(0, Some(""), None), None);
        assert_eq!(reply_target(0, Some(""), Some("THREAD")).as_deref(), Some("THREAD"));
        assert_eq!(reply_target(2001, Some("p:0/PARENT"), None), None);
    }

    #[test]
    fn removal_cancels_matching_add() {
        let rows = vec![
            row(10, 2000, "p:0/T", "alice", ""),
            row(11, 2001, "p:0/T", "bob", ""),
            row(12, 3000, "p:0/T", "alice", ""),
        ];
        let active = resolve_reactions(1, "T", &rows);
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].sender, "bob");
        assert_eq!(active[0].kind, ReactionKind::Like);
        assert_eq!(active[0].source_row_id, 11);
        assert_eq!(active[0].target_row_id, 1);
    }

    #[test]
    fn removal_from_other_sender_does_not_cancel() {
        let rows = vec![
            row(10, 2003, "T", "alice", ""),
            row(11, 3003, "T", "bob", ""),
        ];
        let active = resolve_reactions(1, "T", &rows);
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].kind, ReactionKind::Laugh);
    }

    #[test]
    fn removal_before_add_does_not_cancel() {
        let rows = vec![
            row(20, 2000, "T", "alice", ""),
            row(15, 3000, "T", "alice", ""),
        ];
        let active = resolve_reactions(1, "T", &rows);
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].source_row_id, 20);
    }

    #[test]
    fn rows_for_other_targets_are_ignored() {
        let rows = vec![
            row(10, 2000, "p:0/OTHER", "alice", ""),
            row(11, 0, "p:0/T", "alice", "a reply"),
        ];
        assert!(resolve_reactions(1, "T", &rows).is_empty());
    }

    #[test]
    fn custom_reactions_match_by_emoji() {
        let rows = vec![
            row(10, 2006, "T", "alice", "Reacted 🔥 to “x”"),
            row(11, 2006, "T", "alice", "Reacted 🎉 to “x”"),
            row(12, 3006, "T", "alice", "Removed 🔥 from “x”"),
        ];
        let active = resolve_reactions(1, "T", &rows);
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].kind, ReactionKind::Custom("🎉".into()));
    }

    #[test]
    fn duplicate_add_keeps_latest() {
        let rows = vec![row(10, 2000, "T", "alice", ""), row(11, 2000, "T", "alice", "")];
        let active = resolve_reactions(1, "T", &rows);
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].source_row_id, 11);
    }

    #[test]
    fn content_predicate_names_both_ranges() {
        let sql = content_predicate("m.associated_message_type");
        assert!(sql.contains("NOT BETWEEN 2000 AND 2006"));
        assert!(sql.contains("NOT BETWEEN 3000 AND 3006"));
    }
}
