//! RFC 5322 header fields: unfolding, grouping, encoded-words (RFC 2047), and dates.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use mail_parser::Header;
use tracing::warn;

use crate::error::Defect;
use crate::parser::transfer;

/// One unfolded header field. The name is ASCII-lowercased.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderField {
    pub name: String,
    pub value: String,
}

/// Header values grouped by (lowercased) name.
///
/// Every occurrence of a name is kept, in the order it appeared. Ordering
/// between different names is lexicographic and carries no meaning.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct HeaderTable {
    groups: BTreeMap<String, Vec<String>>,
}

impl HeaderTable {
    /// Group fields by name with a stable sort, then a single grouping pass.
    pub fn from_fields(fields: &[HeaderField]) -> Self {
        let mut sorted: Vec<&HeaderField> = fields.iter().collect();
        sorted.sort_by(|a, b| a.name.cmp(&b.name));

        let mut groups: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for field in sorted {
            groups
                .entry(field.name.clone())
                .or_default()
                .push(field.value.clone());
        }
        Self { groups }
    }

    /// All values for a name (case-insensitive), in original order.
    pub fn get_all(&self, name: &str) -> &[String] {
        self.groups
            .get(&name.to_ascii_lowercase())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// The first value for a name (case-insensitive).
    pub fn first(&self, name: &str) -> Option<&str> {
        self.get_all(name).first().map(String::as_str)
    }

    /// Number of distinct header names.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Decode raw header bytes to a string.
///
/// Tries UTF-8 first, then falls back to Windows-1252 (which accepts every byte).
pub fn decode_header_bytes(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => {
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
            decoded.into_owned()
        }
    }
}

/// Turn the fields `mail-parser` found in a header block into [`HeaderField`]s.
///
/// `raw` is the buffer the header offsets index into and `block_end` is where
/// the header block stops. Folded values are unfolded and trimmed.
///
/// `mail-parser` steps over lines without a colon; whatever it stepped over
/// between two fields is reported here. Fields with an illegal name are
/// dropped together with their continuation lines.
pub fn collect_fields(
    raw: &[u8],
    headers: &[Header<'_>],
    block_end: usize,
) -> (Vec<HeaderField>, Vec<Defect>) {
    let mut fields = Vec::with_capacity(headers.len());
    let mut defects = Vec::new();
    let mut cursor = headers.first().map_or(block_end, |h| h.offset_field);

    for h in headers {
        report_skipped_lines(slice(raw, cursor, h.offset_field), &mut defects);
        cursor = h.offset_end;

        // A name cut short by the end of input has no colon after it.
        let Some(name_end) = h
            .offset_start
            .checked_sub(1)
            .filter(|&colon| raw.get(colon) == Some(&b':'))
        else {
            report_skipped_lines(slice(raw, h.offset_field, h.offset_end), &mut defects);
            continue;
        };

        let name = decode_header_bytes(slice(raw, h.offset_field, name_end).trim_ascii());
        if !is_valid_field_name(&name) {
            defects.push(Defect::header(truncate(&name, 40), "illegal field name"));
            continue;
        }

        fields.push(HeaderField {
            name: name.to_ascii_lowercase(),
            value: unfold(&decode_header_bytes(slice(raw, h.offset_start, h.offset_end))),
        });
    }
    report_skipped_lines(slice(raw, cursor, block_end), &mut defects);

    (fields, defects)
}

fn slice(raw: &[u8], start: usize, end: usize) -> &[u8] {
    raw.get(start..end).unwrap_or_default()
}

fn report_skipped_lines(skipped: &[u8], defects: &mut Vec<Defect>) {
    let text = decode_header_bytes(skipped);
    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        defects.push(Defect::header(
            truncate(line, 40),
            "line without a colon in header block",
        ));
    }
}

/// Join continuation lines with a single space.
fn unfold(value: &str) -> String {
    value
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// A field name is printable US-ASCII without colon or whitespace (RFC 5322 §3.6.8).
fn is_valid_field_name(name: &str) -> bool {
    !name.is_empty() && name.bytes().all(|b| (33..=126).contains(&b) && b != b':')
}

fn truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

/// Decode RFC 2047 encoded-words in a header value.
///
/// Malformed words are kept verbatim. Whitespace that only separates two
/// encoded words is dropped.
pub fn decode_encoded_words(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    let mut after_word = false;

    while let Some(start) = rest.find("=?") {
        let (gap, candidate) = rest.split_at(start);
        let decoded = EncodedWord::parse(candidate)
            .and_then(|(word, len)| Some((word.decode()?, len)));
        match decoded {
            Some((text, len)) => {
                if !(after_word && gap.trim().is_empty()) {
                    out.push_str(gap);
                }
                out.push_str(&text);
                rest = &candidate[len..];
                after_word = true;
            }
            None => {
                out.push_str(gap);
                out.push_str("=?");
                rest = &candidate[2..];
                after_word = false;
            }
        }
    }

    out.push_str(rest);
    out
}

/// `=?charset?B|Q?text?=`
struct EncodedWord<'a> {
    charset: &'a str,
    base64: bool,
    text: &'a str,
}

impl<'a> EncodedWord<'a> {
    /// Parse a word at the start of `s`, returning it with its byte length.
    fn parse(s: &'a str) -> Option<(Self, usize)> {
        let body = s.strip_prefix("=?")?;
        let (charset, body) = body.split_once('?')?;
        let (encoding, body) = body.split_once('?')?;
        let (text, _) = body.split_once("?=")?;

        let base64 = match encoding {
            "B" | "b" => true,
            "Q" | "q" => false,
            _ => return None,
        };
        if charset.is_empty() || charset.contains(char::is_whitespace) {
            return None;
        }

        let len = 2 + charset.len() + 1 + encoding.len() + 1 + text.len() + 2;
        // RFC 2231 language suffix: "utf-8*en"
        let charset = charset.split_once('*').map_or(charset, |(c, _)| c);
        Some((
            Self {
                charset,
                base64,
                text,
            },
            len,
        ))
    }

    fn decode(&self) -> Option<String> {
        let bytes = if self.base64 {
            transfer::decode_base64(self.text.as_bytes()).ok()?
        } else {
            // RFC 2047 "Q": quoted-printable where `_` stands for a space.
            let text = self.text.replace('_', " ");
            transfer::decode_quoted_printable(text.as_bytes()).ok()?
        };
        Some(decode_charset(self.charset, &bytes))
    }
}

/// Decode bytes using a named charset, falling back to UTF-8 lossy.
pub fn decode_charset(charset: &str, bytes: &[u8]) -> String {
    match decode_with_label(charset, bytes) {
        Some(text) => text,
        None => {
            warn!(
                charset = charset,
                "Unknown charset, falling back to UTF-8 lossy"
            );
            String::from_utf8_lossy(bytes).into_owned()
        }
    }
}

/// Labels `encoding_rs` would map to Windows-1252 but that name 7-bit ASCII.
const ASCII_LABELS: [&str; 3] = ["us-ascii", "ascii", "ansi_x3.4-1968"];

pub(crate) fn is_ascii_label(charset: &str) -> bool {
    let label = charset.trim();
    ASCII_LABELS.iter().any(|a| label.eq_ignore_ascii_case(a))
}

/// Decode bytes with lossy substitution if `charset` is a known label.
///
/// ASCII labels decode as UTF-8, so stray 8-bit text is not read as Windows-1252.
pub(crate) fn decode_with_label(charset: &str, bytes: &[u8]) -> Option<String> {
    let label = charset.trim();
    if label.eq_ignore_ascii_case("utf-8")
        || label.eq_ignore_ascii_case("utf8")
        || is_ascii_label(label)
    {
        return Some(String::from_utf8_lossy(bytes).into_owned());
    }
    let encoding = encoding_rs::Encoding::for_label(label.as_bytes())?;
    let (decoded, _, _) = encoding.decode(bytes);
    Some(decoded.into_owned())
}

const DATE_FORMATS: [&str; 7] = [
    "%d %b %Y %H:%M:%S %z",
    "%d %b %Y %H:%M %z",
    "%d %b %Y %H:%M:%S",
    "%b %d %H:%M:%S %Y",
    "%Y-%m-%dT%H:%M:%S%z",
    "%Y-%m-%d %H:%M:%S %z",
    "%Y-%m-%d %H:%M:%S",
];

const NAMED_ZONES: [(&str, &str); 13] = [
    ("UT", "+0000"),
    ("UTC", "+0000"),
    ("GMT", "+0000"),
    ("EST", "-0500"),
    ("EDT", "-0400"),
    ("CST", "-0600"),
    ("CDT", "-0500"),
    ("MST", "-0700"),
    ("MDT", "-0600"),
    ("PST", "-0800"),
    ("PDT", "-0700"),
    ("CET", "+0100"),
    ("CEST", "+0200"),
];

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Parse a `Date:` value, tolerating the usual real-world deviations from
/// RFC 5322: missing weekday, IMAP-style `16-JUL-2025`, named zones, ISO 8601,
/// and no zone at all (read as UTC).
pub fn parse_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc2822(value) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }

    let cleaned = numeric_zone(&imap_to_rfc(strip_weekday(value)));
    DATE_FORMATS
        .iter()
        .find_map(|fmt| parse_with_format(&cleaned, fmt))
        .or_else(|| mail_parser_date(value))
}

fn parse_with_format(value: &str, fmt: &str) -> Option<DateTime<Utc>> {
    if fmt.contains("%z") {
        DateTime::parse_from_str(value, fmt)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    } else {
        NaiveDateTime::parse_from_str(value, fmt)
            .ok()
            .map(|ndt| Utc.from_utc_datetime(&ndt))
    }
}

/// Last resort: let `mail-parser` have a go at it.
fn mail_parser_date(value: &str) -> Option<DateTime<Utc>> {
    if !value.bytes().any(|b| b.is_ascii_digit()) {
        return None;
    }
    let wrapped = format!("Date: {value}\n\n");
    let parsed = mail_parser::MessageParser::default().parse(wrapped.as_bytes())?;
    DateTime::parse_from_rfc3339(&parsed.date()?.to_rfc3339())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// `"Thu, 04 Jan 2024"` and `"Thu 04 Jan 2024"` → `"04 Jan 2024"`.
fn strip_weekday(value: &str) -> &str {
    let head = value.get(..3).unwrap_or_default();
    let is_weekday = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"]
        .iter()
        .any(|day| head.eq_ignore_ascii_case(day));
    if !is_weekday {
        return value;
    }
    let rest = &value[3..];
    rest.strip_prefix(',')
        .or_else(|| rest.strip_prefix(' '))
        .map_or(value, str::trim_start)
}

/// `"16-JUL-2025 03:01:03"` → `"16 Jul 2025 03:01:03"`.
fn imap_to_rfc(value: &str) -> String {
    let (date, time) = value.split_once(' ').unwrap_or((value, ""));
    let mut pieces = date.splitn(3, '-');
    let (Some(day), Some(month), Some(year)) = (pieces.next(), pieces.next(), pieces.next())
    else {
        return value.to_string();
    };
    let Some(month) = MONTHS.iter().find(|m| m.eq_ignore_ascii_case(month)) else {
        return value.to_string();
    };
    format!("{day} {month} {year} {time}").trim_end().to_string()
}

/// Replace a trailing zone abbreviation (`EST`, `GMT`, ...) with its offset.
fn numeric_zone(value: &str) -> String {
    let (head, zone) = value.rsplit_once(' ').unwrap_or(("", value));
    NAMED_ZONES
        .iter()
        .find(|(name, _)| zone.eq_ignore_ascii_case(name))
        .map_or_else(|| value.to_string(), |(_, offset)| format!("{head} {offset}"))
}
