//! Top-level entry: raw bytes to a [`ParsedMessage`].

use chrono::{DateTime, Utc};
use mail_parser::{MessageParser, MessagePart};
use tracing::{debug, warn};

use crate::config::ParserConfig;
use crate::error::{Defect, IngestError, Result};
use crate::model::address::Participant;
use crate::model::attachment::AttachmentPart;
use crate::model::message::ExternalReferences;
use crate::parser::attachment::extract_attachments;
use crate::parser::header::{self, HeaderField, HeaderTable};
use crate::parser::mime::{self, TreeBuilder};
use crate::parser::participant::{extract_participants, primary_sender};
use crate::parser::reference::{extract_list_ids, extract_references};

/// Everything the extractors produced for one message.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedMessage {
    pub headers: HeaderTable,
    pub participants: Vec<Participant>,
    pub attachments: Vec<AttachmentPart>,
    pub references: ExternalReferences,
    pub list_ids: Vec<String>,
    /// Decoded `Subject`, empty if absent.
    pub subject: String,
    pub date: DateTime<Utc>,
    /// `false` when `date` is the ingestion instant.
    pub date_from_header: bool,
    /// Serialized length of the parsed structure.
    pub size: u64,
    pub defects: Vec<Defect>,
}

impl ParsedMessage {
    pub fn sender(&self) -> Option<&Participant> {
        primary_sender(&self.participants)
    }
}

/// Parses raw bytes with `mail-parser`, then runs every extractor.
#[derive(Debug, Clone, Default)]
pub struct RawMessageParser {
    config: ParserConfig,
}

impl RawMessageParser {
    pub fn new(config: ParserConfig) -> Self {
        Self { config }
    }

    /// Parse with the current time as the ingestion instant.
    pub fn parse(&self, data: &[u8]) -> Result<ParsedMessage> {
        self.parse_at(data, Utc::now())
    }

    /// Parse a message; `ingested_at` is used when the message has no usable date.
    pub fn parse_at(&self, data: &[u8], ingested_at: DateTime<Utc>) -> Result<ParsedMessage> {
        if data.len() > self.config.max_message_size {
            return Err(IngestError::MessageTooLarge {
                size: data.len(),
                limit: self.config.max_message_size,
            });
        }

        let data = mime::skip_from_line(data);
        if data.trim_ascii().is_empty() {
            return Err(IngestError::MalformedMessage("empty message".into()));
        }

        if data.starts_with(b" ") || data.starts_with(b"\t") {
            return Err(IngestError::MalformedMessage(
                "message starts with a continuation line".into(),
            ));
        }

        let message = MessageParser::default()
            .parse(data)
            .ok_or_else(|| IngestError::MalformedMessage("no parseable header field".into()))?;
        let Some(root) = message.parts.first() else {
            return Err(IngestError::MalformedMessage(
                "no parseable header field".into(),
            ));
        };

        let first_field = root
            .headers
            .first()
            .map_or(root.offset_body, |h| h.offset_field);
        if !data.get(..first_field).unwrap_or_default().trim_ascii().is_empty() {
            return Err(IngestError::MalformedMessage(
                "message does not start with a header field".into(),
            ));
        }

        let (fields, mut defects) = header::collect_fields(data, &root.headers, root.offset_body);
        if fields.is_empty() {
            return Err(IngestError::MalformedMessage(
                "no parseable header field".into(),
            ));
        }
        if body_swallowed(data, root) {
            defects.push(Defect::structure(
                "missing blank line between headers and body",
            ));
        }
        for defect in &defects {
            warn!(%defect, "Header defect");
        }
        let body = data.get(root.offset_body..).unwrap_or_default();

        let headers = HeaderTable::from_fields(&fields);
        let participants = extract_participants(&headers, &mut defects);
        let (date, date_from_header) = message_date(&headers, ingested_at, &mut defects);
        let subject = headers
            .first("subject")
            .map(header::decode_encoded_words)
            .unwrap_or_default();

        let tree = TreeBuilder::new(self.config.max_part_depth, &mut defects).build(&message);
        let attachments = extract_attachments(&tree, &self.config, &mut defects)?;
        let depth = tree.depth();

        let parsed = ParsedMessage {
            references: extract_references(&headers),
            list_ids: extract_list_ids(&headers),
            size: serialized_size(&fields, body),
            headers,
            participants,
            attachments,
            subject,
            date,
            date_from_header,
            defects,
        };

        debug!(
            message_id = parsed.references.message_id.as_deref().unwrap_or("-"),
            size = parsed.size,
            parts = parsed.attachments.len(),
            depth,
            defects = parsed.defects.len(),
            "Parsed message"
        );
        Ok(parsed)
    }
}

/// The `Date` header, or `ingested_at` when it is missing or unparseable.
fn message_date(
    headers: &HeaderTable,
    ingested_at: DateTime<Utc>,
    defects: &mut Vec<Defect>,
) -> (DateTime<Utc>, bool) {
    match headers.first("date") {
        Some(raw) => match header::parse_date(raw) {
            Some(date) => (date, true),
            None => {
                warn!(date = raw, "Unparseable date, using ingestion time (UTC)");
                defects.push(Defect::header("date", format!("unparseable date '{raw}'")));
                (ingested_at, false)
            }
        },
        None => {
            debug!("No date on message, using ingestion time (UTC)");
            (ingested_at, false)
        }
    }
}

/// `true` when the header block ran to the end of input over text that is not
/// a header field, so what was meant as the body was read as headers.
fn body_swallowed(data: &[u8], root: &MessagePart<'_>) -> bool {
    let block = data.get(..root.offset_body).unwrap_or_default();
    let last_line = block
        .strip_suffix(b"\n")
        .and_then(|rest| rest.rsplit(|&b| b == b'\n').next());
    let has_separator =
        last_line.is_some_and(|line| line.iter().all(|b| matches!(b, b' ' | b'\t' | b'\r')));

    let after_fields = root.headers.last().map_or(0, |h| h.offset_end);
    let trailing = data.get(after_fields..root.offset_body).unwrap_or_default();
    !has_separator && !trailing.trim_ascii().is_empty()
}

/// Length of `name: value\r\n` per field, the blank line, and the body.
fn serialized_size(fields: &[HeaderField], body: &[u8]) -> u64 {
    let headers: usize = fields
        .iter()
        .map(|f| f.name.len() + 2 + f.value.len() + 2)
        .sum();
    (headers + 2 + body.len()) as u64
}
