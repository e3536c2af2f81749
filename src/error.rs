//! Centralized error and defect types for mailcanon.
//!
//! Fatal problems are returned as [`IngestError`] and produce no message.
//! Non-fatal problems are collected as [`Defect`] values on the parsed result.

use std::path::PathBuf;
use thiserror::Error;

use crate::model::address::Role;

/// Fatal errors produced while ingesting a raw message.
#[derive(Error, Debug)]
pub enum IngestError {
    /// The input cannot be split into a header block and a body at all.
    #[error("Malformed message: {0}")]
    MalformedMessage(String),

    /// A textual part declared zero or several charsets.
    #[error("Charset ambiguity in part {part} ({content_type}): declared {declared:?}")]
    CharsetAmbiguity {
        /// Zero-based leaf index of the offending part, in tree order.
        part: usize,
        content_type: String,
        declared: Vec<String>,
    },

    /// The raw message exceeds the configured size limit.
    #[error("Message is {size} bytes, limit is {limit}")]
    MessageTooLarge { size: usize, limit: usize },

    /// The specified file does not exist.
    #[error("Message file not found: {0}")]
    FileNotFound(PathBuf),

    /// I/O error with the associated file path.
    #[error("I/O error reading '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The configuration file could not be parsed.
    #[error("Invalid configuration in '{path}': {reason}")]
    Config { path: PathBuf, reason: String },
}

/// Convenience alias for `Result<T, IngestError>`.
pub type Result<T> = std::result::Result<T, IngestError>;

impl IngestError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// `true` for errors caused by the message content itself.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::MalformedMessage(_) | Self::CharsetAmbiguity { .. } | Self::MessageTooLarge { .. }
        )
    }
}

/// A non-fatal problem found while parsing. Recorded, never raised.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Defect {
    /// Malformed syntax in an individual header field.
    Header { name: String, reason: String },

    /// An address that failed normalization and was dropped.
    InvalidParticipantAddress { role: Role, value: String },

    /// A problem with the message structure (separators, boundaries, nesting).
    Structure { reason: String },

    /// A decoding problem inside one leaf part, by leaf index in tree order.
    Body { part: usize, reason: String },
}

impl Defect {
    pub(crate) fn header(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Header {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn structure(reason: impl Into<String>) -> Self {
        Self::Structure {
            reason: reason.into(),
        }
    }

    pub(crate) fn body(part: usize, reason: impl Into<String>) -> Self {
        Self::Body {
            part,
            reason: reason.into(),
        }
    }
}

impl std::fmt::Display for Defect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Header { name, reason } => write!(f, "header '{name}': {reason}"),
            Self::InvalidParticipantAddress { role, value } => {
                write!(f, "invalid {role} address '{value}'")
            }
            Self::Structure { reason } => write!(f, "structure: {reason}"),
            Self::Body { part, reason } => write!(f, "part {part}: {reason}"),
        }
    }
}
