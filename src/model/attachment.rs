//! Attachment parts: the leaves of a message's MIME tree.

/// One leaf part of a message.
///
/// Containers (`multipart/*`, `message/rfc822`) are never materialized as
/// parts; only their leaves are.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct AttachmentPart {
    /// MIME content type, lowercased (e.g. `"text/plain"`, `"image/png"`).
    pub content_type: String,

    /// Filename from `Content-Disposition` or the `name` parameter.
    pub filename: Option<String>,

    /// Length of the raw payload, before any transfer or charset decoding.
    pub size_bytes: u64,

    /// UTF-8 text for indexable parts, raw payload bytes otherwise.
    pub data: Vec<u8>,

    /// `true` if `data` is decoded text suitable for indexing.
    pub can_index: bool,

    /// The declared charset. Present only when `can_index` is set.
    pub charset: Option<String>,
}

impl AttachmentPart {
    /// The decoded text of an indexable part.
    pub fn text(&self) -> Option<&str> {
        if self.can_index {
            std::str::from_utf8(&self.data).ok()
        } else {
            None
        }
    }
}
