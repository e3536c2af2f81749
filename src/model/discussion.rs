//! Discussion (thread) types shared with the storage collaborator.

use std::fmt;

use chrono::{DateTime, Utc};
use uuid::Uuid;

pub type UserId = Uuid;
pub type DiscussionId = Uuid;

/// Maximum excerpt length stored on a new discussion.
pub const EXCERPT_LEN: usize = 200;

/// A persisted grouping of related messages. Owned by the storage layer.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Discussion {
    pub user_id: UserId,
    pub discussion_id: DiscussionId,
    pub insert_date: DateTime<Utc>,
    pub importance_level: u8,
    pub excerpt: String,
}

/// Which lookup index a candidate key is meant for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LookupStrategy {
    /// External root/parent message id.
    Parent,
    /// Mailing list identifier.
    List,
    /// Primary sender address.
    Sender,
}

impl fmt::Display for LookupStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LookupStrategy::Parent => "parent",
            LookupStrategy::List => "list",
            LookupStrategy::Sender => "sender",
        };
        f.write_str(s)
    }
}

/// A (strategy, key) pair to try against the discussion indexes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct LookupCandidate {
    pub strategy: LookupStrategy,
    pub key: String,
}

impl LookupCandidate {
    pub fn new(strategy: LookupStrategy, key: impl Into<String>) -> Self {
        Self {
            strategy,
            key: key.into(),
        }
    }
}

/// Ordered candidates for one user. Earlier candidates take priority.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct LookupPlan {
    pub user_id: UserId,
    pub candidates: Vec<LookupCandidate>,
}

impl LookupPlan {
    /// `true` when the caller should create a new discussion unconditionally.
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}
