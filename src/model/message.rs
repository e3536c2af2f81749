//! Raw input and canonical message types.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use super::address::Participant;
use super::attachment::AttachmentPart;
use crate::error::Defect;
use crate::parser::participant::primary_sender;

/// One raw message as handed over by the raw-store collaborator.
#[derive(Debug, Clone)]
pub struct RawMessage {
    /// Reference id of the stored raw bytes, forwarded verbatim.
    pub id: String,
    pub data: Vec<u8>,
}

impl RawMessage {
    pub fn new(id: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            id: id.into(),
            data: data.into(),
        }
    }
}

/// Opaque identifiers taken from the source message, used for threading.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ExternalReferences {
    /// The `Message-ID` header value.
    pub message_id: Option<String>,
    /// The `In-Reply-To` header value.
    pub parent_id: Option<String>,
}

/// Per-user state flags on a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct MessageFlags {
    pub is_unread: bool,
    pub is_draft: bool,
    pub is_answered: bool,
}

impl MessageFlags {
    /// Flags every freshly ingested message starts with.
    pub const INGESTED: MessageFlags = MessageFlags {
        is_unread: true,
        is_draft: false,
        is_answered: false,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Email,
}

/// Protocol-agnostic representation of one ingested message.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CanonicalMessage {
    pub message_type: MessageType,

    /// Decoded subject line (RFC 2047 encoded-words resolved). Empty if absent.
    pub subject: String,

    /// Parsed `Date:` header, or the ingestion instant when missing or invalid.
    pub date: DateTime<Utc>,

    /// Text of the primary indexable part.
    pub body_text: String,

    /// Participants in extraction order (From, To, Cc, Bcc).
    pub participants: Vec<Participant>,

    /// Leaf parts in tree order.
    pub attachments: Vec<AttachmentPart>,

    pub external_references: ExternalReferences,

    /// Every `List-ID` occurrence, in header order.
    pub list_ids: Vec<String>,

    /// Estimated importance, 0–100.
    pub importance_level: u8,

    /// Reserved for privacy feature detectors. Empty by default.
    pub privacy_features: BTreeMap<String, String>,

    pub flags: MessageFlags,

    pub raw_message_id: String,

    /// Serialized length of the parsed structure.
    pub size_bytes: u64,

    /// Non-fatal problems found while parsing.
    pub defects: Vec<Defect>,
}

impl CanonicalMessage {
    /// The primary sender: the first participant with role `From`.
    pub fn sender(&self) -> Option<&Participant> {
        primary_sender(&self.participants)
    }

    /// A short single-line excerpt of the body, at most `max_chars` characters.
    pub fn excerpt(&self, max_chars: usize) -> String {
        let collapsed = self.body_text.split_whitespace().collect::<Vec<_>>().join(" ");
        collapsed.chars().take(max_chars).collect()
    }
}
