//! Best-effort plain-text recovery from the binary rich-text body.
//!
//! When a message's `text` column is empty, its content usually survives in
//! `attributedBody`, a typedstream archive of an attributed string. The layout
//! of that archive is not stable, so nothing here trusts a single frame.
//! Instead every plausible string is collected and the longest one wins.
//!
//! Two kinds of candidates are considered:
//!
//! - **Framed**: the top-level string object is introduced by `0x01 0x2B`,
//!   followed by a length prefix and the UTF-8 bytes, and is normally closed
//!   by `0x86 0x84`.
//! - **Loose**: any other printable run in the buffer. Class names and
//!   attribute keys are skipped.
//!
//! A framed candidate always beats a loose one. Malformed input yields an
//! empty or partial string, never an error.

use aho_corasick::AhoCorasick;
use memchr::memmem;
use std::sync::LazyLock;

/// Introduces the top-level string object.
const START_MARKER: [u8; 2] = [0x01, 0x2B];
/// Closes the top-level string object.
const END_MARKER: [u8; 2] = [0x86, 0x84];

/// Two-byte little-endian length follows.
const LEN_U16: u8 = 0x81;
/// Four-byte little-endian length follows.
const LEN_U32: u8 = 0x82;

/// Loose runs shorter than this (in characters) are noise.
const MIN_LOOSE_RUN: usize = 3;

/// Archive vocabulary that shows up as printable text but is never content.
const ARCHIVE_KEYWORDS: &[&str] = &[
    "streamtyped",
    "NSAttributedString",
    "NSMutableAttributedString",
    "NSString",
    "NSMutableString",
    "NSDictionary",
    "NSMutableDictionary",
    "NSArray",
    "NSNumber",
    "NSValue",
    "NSObject",
    "NSData",
    "NSColor",
    "NSFont",
    "__kIM",
];

static KEYWORDS: LazyLock<Option<AhoCorasick>> =
    LazyLock::new(|| AhoCorasick::new(ARCHIVE_KEYWORDS).ok());

/// Decode a binary body into plain text. Returns an empty string when
/// nothing recoverable is found.
#[must_use]
pub fn decode_attributed_body(data: &[u8]) -> String {
    if data.is_empty() {
        return String::new();
    }

    let best = longest(framed_candidates(data)).or_else(|| longest(loose_candidates(data)));

    best.map(|s| trim_controls(s).to_string())
        .unwrap_or_default()
}

fn longest<'a>(candidates: impl Iterator<Item = &'a str>) -> Option<&'a str> {
    candidates
        .filter(|s| !trim_controls(s).is_empty())
        .fold(None, |best: Option<&str>, candidate| match best {
            Some(current) if current.chars().count() >= candidate.chars().count() => {
                Some(current)
            }
            _ => Some(candidate),
        })
}

/// Strings introduced by [`START_MARKER`].
fn framed_candidates(data: &[u8]) -> impl Iterator<Item = &str> {
    memmem::find_iter(data, &START_MARKER).filter_map(move |marker_at| {
        let prefix_at = marker_at + START_MARKER.len();
        let (declared, body_at) = read_length(data, prefix_at)?;
        let available = data.len() - body_at;
        let mut end = body_at + declared.min(available);
        if let Some(close) = memmem::find(&data[body_at..end], &END_MARKER) {
            end = body_at + close;
        }
        let run = printable_prefix(&data[body_at..end]);
        (!run.is_empty()).then_some(run)
    })
}

/// Read a typedstream length prefix at `at`. Returns the declared length and
/// the offset of the first body byte.
fn read_length(data: &[u8], at: usize) -> Option<(usize, usize)> {
    let tag = *data.get(at)?;
    match tag {
        LEN_U16 => {
            let bytes = data.get(at + 1..at + 3)?;
            let len = u16::from_le_bytes([bytes[0], bytes[1]]);
            Some((usize::from(len), at + 3))
        }
        LEN_U32 => {
            let bytes = data.get(at + 1..at + 5)?;
            let len = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
            Some((usize::try_from(len).unwrap_or(usize::MAX), at + 5))
        }
        len if len < 0x80 => Some((usize::from(len), at + 1)),
        _ => None,
    }
}

/// Every maximal printable run in the buffer that is not archive vocabulary.
fn loose_candidates(data: &[u8]) -> impl Iterator<Item = &str> {
    data.utf8_chunks()
        .flat_map(|chunk| chunk.valid().split(|c: char| !is_printable(c)))
        .filter(|run| run.chars().count() >= MIN_LOOSE_RUN)
        .filter(|run| !is_archive_keyword(run))
}

fn is_archive_keyword(run: &str) -> bool {
    KEYWORDS
        .as_ref()
        .is_some_and(|matcher| matcher.is_match(run))
}

/// Longest leading slice of `bytes` that is valid UTF-8 and printable.
fn printable_prefix(bytes: &[u8]) -> &str {
    let valid = match std::str::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => std::str::from_utf8(&bytes[..e.valid_up_to()]).unwrap_or_default(),
    };
    let valid = valid.trim_start_matches(char::is_control);
    let end = valid
        .char_indices()
        .find(|&(_, c)| !is_printable(c))
        .map_or(valid.len(), |(idx, _)| idx);
    &valid[..end]
}

fn is_printable(c: char) -> bool {
    !c.is_control() || matches!(c, '\n' | '\t' | '\r')
}

fn trim_controls(s: &str) -> &str {
    s.trim_matches(|c: char| c.is_control() || c.is_whitespace())
}
