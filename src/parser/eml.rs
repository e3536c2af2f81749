//! Loading individual `.eml` files (RFC 5322 messages without MBOX framing).

use std::path::Path;

use crate::error::{IngestError, Result};
use crate::model::message::RawMessage;

/// Read a single `.eml` file into a [`RawMessage`].
///
/// Without an explicit `id`, the file name is used as the raw-message reference.
pub fn load_eml(path: impl AsRef<Path>, id: Option<String>) -> Result<RawMessage> {
    let path = path.as_ref();
    let data = std::fs::read(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            IngestError::FileNotFound(path.to_path_buf())
        } else {
            IngestError::io(path, e)
        }
    })?;

    let id = id.unwrap_or_else(|| {
        path.file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    });

    Ok(RawMessage::new(id, data))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_eml_uses_file_name() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path = tmp.path().join("message-7.eml");
        std::fs::write(&path, b"Subject: Hi\n\nBody\n").expect("write");

        let raw = load_eml(&path, None).expect("load");
        assert_eq!(raw.id, "message-7.eml");
        assert_eq!(raw.data, b"Subject: Hi\n\nBody\n");

        let raw = load_eml(&path, Some("raw-1".into())).expect("load");
        assert_eq!(raw.id, "raw-1");
    }

    #[test]
    fn test_load_eml_missing_file() {
        let tmp = tempfile::tempdir().expect("tempdir");
        assert!(matches!(
            load_eml(tmp.path().join("absent.eml"), None),
            Err(IngestError::FileNotFound(_))
        ));
    }
}
