//! Opaque external identifiers: message id, parent id, mailing list ids.

use crate::model::message::ExternalReferences;
use crate::parser::header::HeaderTable;

/// Read `Message-ID` and `In-Reply-To` verbatim (trimmed). Missing or blank is `None`.
pub fn extract_references(headers: &HeaderTable) -> ExternalReferences {
    ExternalReferences {
        message_id: opaque(headers.first("message-id")),
        parent_id: opaque(headers.first("in-reply-to")),
    }
}

/// Every `List-ID` occurrence, in header order, blanks skipped.
pub fn extract_list_ids(headers: &HeaderTable) -> Vec<String> {
    headers
        .get_all("list-id")
        .iter()
        .filter_map(|v| opaque(Some(v)))
        .collect()
}

fn opaque(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}
