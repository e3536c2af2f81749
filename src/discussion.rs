//! Discussion resolution: which thread does a message belong to?
//!
//! [`plan`] turns a canonical message into an ordered list of lookup
//! candidates. Direct reply-chain evidence comes first, then mailing list
//! identity, then the sender address. The storage layer tries them strictly in
//! order through [`DiscussionIndex`] and stops at the first match;
//! [`resolve_discussion`] implements that loop.

use tracing::debug;

use crate::model::discussion::{
    DiscussionId, LookupCandidate, LookupPlan, LookupStrategy, UserId,
};
use crate::model::message::CanonicalMessage;

/// Build the ordered lookup candidates for `message` as received by `user_id`.
pub fn plan(message: &CanonicalMessage, user_id: UserId) -> LookupPlan {
    let mut candidates = Vec::new();

    if let Some(parent_id) = &message.external_references.parent_id {
        candidates.push(LookupCandidate::new(LookupStrategy::Parent, parent_id));
    }

    candidates.extend(
        message
            .list_ids
            .iter()
            .map(|id| LookupCandidate::new(LookupStrategy::List, id)),
    );

    if let Some(sender) = message.sender() {
        candidates.push(LookupCandidate::new(LookupStrategy::Sender, &sender.address));
    }

    LookupPlan {
        user_id,
        candidates,
    }
}

/// Lookup and creation operations of the discussion storage layer.
///
/// Implementations must be idempotent and safe to retry.
pub trait DiscussionIndex {
    type Error;

    fn lookup_by_parent(
        &self,
        user_id: UserId,
        parent_id: &str,
    ) -> Result<Option<DiscussionId>, Self::Error>;

    fn lookup_by_list(
        &self,
        user_id: UserId,
        list_id: &str,
    ) -> Result<Option<DiscussionId>, Self::Error>;

    fn lookup_by_sender(
        &self,
        user_id: UserId,
        address: &str,
    ) -> Result<Option<DiscussionId>, Self::Error>;

    fn create_discussion(
        &self,
        user_id: UserId,
        excerpt: &str,
        importance_level: u8,
    ) -> Result<DiscussionId, Self::Error>;
}

/// Outcome of [`resolve_discussion`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub discussion_id: DiscussionId,
    /// The candidate that matched, or `None` if a discussion was created.
    pub matched: Option<LookupCandidate>,
}

/// Try each candidate in order; create a discussion if none matches.
pub fn resolve_discussion<I: DiscussionIndex>(
    index: &I,
    plan: &LookupPlan,
    excerpt: &str,
    importance_level: u8,
) -> Result<Resolution, I::Error> {
    for candidate in &plan.candidates {
        let found = match candidate.strategy {
            LookupStrategy::Parent => index.lookup_by_parent(plan.user_id, &candidate.key)?,
            LookupStrategy::List => index.lookup_by_list(plan.user_id, &candidate.key)?,
            LookupStrategy::Sender => index.lookup_by_sender(plan.user_id, &candidate.key)?,
        };
        if let Some(discussion_id) = found {
            debug!(strategy = %candidate.strategy, %discussion_id, "Discussion matched");
            return Ok(Resolution {
                discussion_id,
                matched: Some(candidate.clone()),
            });
        }
    }

    let discussion_id = index.create_discussion(plan.user_id, excerpt, importance_level)?;
    debug!(%discussion_id, "Created discussion");
    Ok(Resolution {
        discussion_id,
        matched: None,
    })
}
