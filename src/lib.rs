//! `mailcanon`: turn raw RFC 822 messages into canonical messages and plan
//! which discussion (thread) each one belongs to.
//!
//! Parsing is synchronous and keeps no state between calls, so distinct
//! messages can be processed in parallel without coordination.
//!
//! ```no_run
//! use mailcanon::{plan, CanonicalMessageBuilder, RawMessage, SpamVerdict};
//!
//! let raw = RawMessage::new("raw-1", std::fs::read("message.eml").unwrap());
//! let message = CanonicalMessageBuilder::default()
//!     .ingest(&raw, SpamVerdict::Unknown)
//!     .unwrap();
//! let lookups = plan(&message, uuid::Uuid::new_v4());
//! ```

pub mod canonical;
pub mod config;
pub mod discussion;
pub mod error;
pub mod model;
pub mod parser;

pub use canonical::{CanonicalMessageBuilder, ImportanceScorer, PlaceholderScorer, SpamVerdict};
pub use discussion::{plan, resolve_discussion, DiscussionIndex, Resolution};
pub use error::{Defect, IngestError, Result};
pub use model::message::{CanonicalMessage, RawMessage};
pub use parser::raw::{ParsedMessage, RawMessageParser};
