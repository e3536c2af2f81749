//! Assemble a [`CanonicalMessage`] from parser output.
//!
//! Importance scoring is pluggable through [`ImportanceScorer`]; the default
//! [`PlaceholderScorer`] is deterministic and stands in for a real model.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::config::Config;
use crate::error::Result;
use crate::model::attachment::AttachmentPart;
use crate::model::message::{CanonicalMessage, MessageFlags, MessageType, RawMessage};
use crate::parser::mime::html_to_text;
use crate::parser::raw::{ParsedMessage, RawMessageParser};

/// Verdict of the external spam classifier, if one ran.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpamVerdict {
    #[default]
    Unknown,
    Ham,
    Spam,
}

/// Computes the 0–100 importance level of a parsed message.
pub trait ImportanceScorer {
    fn score(&self, message: &ParsedMessage, verdict: SpamVerdict) -> u8;
}

/// 0 for spam, a fixed score in 50–100 otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaceholderScorer {
    score: u8,
}

impl PlaceholderScorer {
    pub const MIN: u8 = 50;
    pub const MAX: u8 = 100;

    pub fn new(score: u8) -> Self {
        Self {
            score: score.clamp(Self::MIN, Self::MAX),
        }
    }
}

impl Default for PlaceholderScorer {
    fn default() -> Self {
        Self::new(75)
    }
}

impl ImportanceScorer for PlaceholderScorer {
    fn score(&self, _message: &ParsedMessage, verdict: SpamVerdict) -> u8 {
        match verdict {
            SpamVerdict::Spam => 0,
            SpamVerdict::Ham | SpamVerdict::Unknown => self.score,
        }
    }
}

/// Runs the raw parser and turns its output into canonical messages.
#[derive(Debug, Clone)]
pub struct CanonicalMessageBuilder<S = PlaceholderScorer> {
    parser: RawMessageParser,
    scorer: S,
}

impl CanonicalMessageBuilder<PlaceholderScorer> {
    pub fn new(config: &Config) -> Self {
        Self {
            parser: RawMessageParser::new(config.parser.clone()),
            scorer: PlaceholderScorer::new(config.scoring.placeholder_score),
        }
    }
}

impl Default for CanonicalMessageBuilder<PlaceholderScorer> {
    fn default() -> Self {
        Self::new(&Config::default())
    }
}

impl<S: ImportanceScorer> CanonicalMessageBuilder<S> {
    pub fn with_scorer(parser: RawMessageParser, scorer: S) -> Self {
        Self { parser, scorer }
    }

    /// Parse and build, using the current time as the ingestion instant.
    pub fn ingest(&self, raw: &RawMessage, verdict: SpamVerdict) -> Result<CanonicalMessage> {
        self.ingest_at(raw, verdict, Utc::now())
    }

    pub fn ingest_at(
        &self,
        raw: &RawMessage,
        verdict: SpamVerdict,
        ingested_at: DateTime<Utc>,
    ) -> Result<CanonicalMessage> {
        let parsed = self.parser.parse_at(&raw.data, ingested_at)?;
        Ok(self.build(parsed, &raw.id, verdict))
    }

    /// Combine extractor output into a canonical message.
    pub fn build(
        &self,
        parsed: ParsedMessage,
        raw_message_id: &str,
        verdict: SpamVerdict,
    ) -> CanonicalMessage {
        let importance_level = self.scorer.score(&parsed, verdict).min(100);
        let body_text = primary_body_text(&parsed.attachments);

        debug!(
            raw_message_id,
            importance_level,
            participants = parsed.participants.len(),
            "Built canonical message"
        );

        CanonicalMessage {
            message_type: MessageType::Email,
            subject: parsed.subject,
            date: parsed.date,
            body_text,
            participants: parsed.participants,
            attachments: parsed.attachments,
            external_references: parsed.references,
            list_ids: parsed.list_ids,
            importance_level,
            privacy_features: BTreeMap::new(),
            flags: MessageFlags::INGESTED,
            raw_message_id: raw_message_id.to_string(),
            size_bytes: parsed.size,
            defects: parsed.defects,
        }
    }
}

/// Text of the first indexable `text/plain` part, else the first indexable
/// `text/html` part converted to text, else empty.
pub fn primary_body_text(parts: &[AttachmentPart]) -> String {
    let first_text = |mime: &str| {
        parts
            .iter()
            .filter(|p| p.content_type == mime)
            .find_map(AttachmentPart::text)
    };

    if let Some(plain) = first_text("text/plain") {
        return plain.to_string();
    }
    first_text("text/html").map(html_to_text).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn part(content_type: &str, text: &str, can_index: bool) -> AttachmentPart {
        AttachmentPart {
            content_type: content_type.to_string(),
            filename: None,
            size_bytes: text.len() as u64,
            data: text.as_bytes().to_vec(),
            can_index,
            charset: can_index.then(|| "utf-8".to_string()),
        }
    }

    #[test]
    fn test_placeholder_scorer_is_deterministic() {
        let parsed = RawMessageParser::default()
            .parse(b"Subject: x\n\nbody")
            .expect("parse");
        let scorer = PlaceholderScorer::default();
        assert_eq!(scorer.score(&parsed, SpamVerdict::Spam), 0);
        assert_eq!(scorer.score(&parsed, SpamVerdict::Ham), 75);
        assert_eq!(scorer.score(&parsed, SpamVerdict::Unknown), 75);
        assert_eq!(PlaceholderScorer::new(10).score(&parsed, SpamVerdict::Ham), 50);
        assert_eq!(PlaceholderScorer::new(200).score(&parsed, SpamVerdict::Ham), 100);
    }

    #[test]
    fn test_primary_body_prefers_plain() {
        let parts = vec![
            part("text/html", "<p>html</p>", true),
            part("text/plain", "plain", true),
        ];
        assert_eq!(primary_body_text(&parts), "plain");
    }

    #[test]
    fn test_primary_body_falls_back_to_html() {
        let parts = vec![
            part("image/png", "PNG", false),
            part("text/html", "<p>Hello &amp; bye</p>", true),
        ];
        assert_eq!(primary_body_text(&parts), "Hello & bye");
        assert_eq!(primary_body_text(&[]), "");
    }

    #[test]
    fn test_build_sets_ingestion_defaults() {
        let raw = RawMessage::new("raw-42", &b"From: a@example.com\nSubject: Hi\n\nbody\n"[..]);
        let ingested = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let msg = CanonicalMessageBuilder::default()
            .ingest_at(&raw, SpamVerdict::Unknown, ingested)
            .expect("ingest");

        assert_eq!(msg.message_type, MessageType::Email);
        assert_eq!(msg.flags, MessageFlags::INGESTED);
        assert!(msg.flags.is_unread && !msg.flags.is_draft && !msg.flags.is_answered);
        assert_eq!(msg.raw_message_id, "raw-42");
        assert_eq!(msg.subject, "Hi");
        assert_eq!(msg.body_text, "body\n");
        assert_eq!(msg.date, ingested);
        assert_eq!(msg.importance_level, 75);
        assert!(msg.privacy_features.is_empty());
    }

    #[test]
    fn test_custom_scorer() {
        struct Fixed;
        impl ImportanceScorer for Fixed {
            fn score(&self, _: &ParsedMessage, _: SpamVerdict) -> u8 {
                250
            }
        }
        let builder = CanonicalMessageBuilder::with_scorer(RawMessageParser::default(), Fixed);
        let msg = builder
            .ingest(&RawMessage::new("r", &b"Subject: x\n\n"[..]), SpamVerdict::Spam)
            .expect("ingest");
        assert_eq!(msg.importance_level, 100);
    }
}
