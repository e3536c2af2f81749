//! Turn the leaves of a part tree into [`AttachmentPart`]s.

use tracing::{debug, warn};

use crate::config::ParserConfig;
use crate::error::{Defect, IngestError, Result};
use crate::model::attachment::AttachmentPart;
use crate::parser::header;
use crate::parser::mime::{MimeLeaf, MimeNode};
use crate::parser::transfer::{self, TransferEncoding};

/// Extract every leaf of `tree`, in tree order.
///
/// A textual leaf that does not declare exactly one charset aborts the whole
/// extraction with [`IngestError::CharsetAmbiguity`].
pub fn extract_attachments(
    tree: &MimeNode<'_>,
    config: &ParserConfig,
    defects: &mut Vec<Defect>,
) -> Result<Vec<AttachmentPart>> {
    tree.leaves()
        .into_iter()
        .enumerate()
        .map(|(idx, leaf)| extract_leaf(idx, leaf, config, defects))
        .collect()
}

fn extract_leaf(
    idx: usize,
    leaf: &MimeLeaf<'_>,
    config: &ParserConfig,
    defects: &mut Vec<Defect>,
) -> Result<AttachmentPart> {
    let content_type = leaf.content_type.mime_type.clone();
    let size_bytes = leaf.body.len() as u64;

    if !leaf.content_type.is_text() {
        return Ok(AttachmentPart {
            content_type,
            filename: leaf.filename.clone(),
            size_bytes,
            data: leaf.body.to_vec(),
            can_index: false,
            charset: None,
        });
    }

    let charset = match leaf.charsets.as_slice() {
        [single] => single.clone(),
        declared => {
            return Err(IngestError::CharsetAmbiguity {
                part: idx,
                content_type,
                declared: declared.to_vec(),
            });
        }
    };

    let payload = match leaf.transfer_encoding {
        TransferEncoding::Base64 => match transfer::decode_base64(leaf.body) {
            Ok(bytes) => bytes,
            Err(e) => {
                record(defects, Defect::body(idx, format!("invalid base64 payload: {e}")));
                leaf.body.to_vec()
            }
        },
        TransferEncoding::QuotedPrintable if config.decode_quoted_printable => {
            match transfer::decode_quoted_printable(leaf.body) {
                Ok(bytes) => bytes,
                Err(e) => {
                    record(
                        defects,
                        Defect::body(idx, format!("invalid quoted-printable payload: {e}")),
                    );
                    leaf.body.to_vec()
                }
            }
        }
        _ => leaf.body.to_vec(),
    };

    if header::is_ascii_label(&charset) && !payload.is_ascii() {
        record(
            defects,
            Defect::body(idx, format!("8-bit data in a '{charset}' part, decoded as UTF-8")),
        );
    }

    let text = match header::decode_with_label(&charset, &payload) {
        Some(text) => text,
        None => {
            record(
                defects,
                Defect::body(idx, format!("unknown charset '{charset}', decoded as UTF-8")),
            );
            String::from_utf8_lossy(&payload).into_owned()
        }
    };

    debug!(part = idx, content_type = %content_type, charset = %charset, "Decoded text part");

    Ok(AttachmentPart {
        content_type,
        filename: leaf.filename.clone(),
        size_bytes,
        data: text.into_bytes(),
        can_index: true,
        charset: Some(charset),
    })
}

fn record(defects: &mut Vec<Defect>, defect: Defect) {
    warn!(%defect, "Attachment defect");
    defects.push(defect);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::mime::TreeBuilder;
    use mail_parser::MessageParser;

    fn extract(raw: &[u8]) -> (Result<Vec<AttachmentPart>>, Vec<Defect>) {
        let message = MessageParser::default().parse(raw).expect("headers");
        let config = ParserConfig::default();
        let mut defects = Vec::new();
        let tree = TreeBuilder::new(config.max_part_depth, &mut defects).build(&message);
        let result = extract_attachments(&tree, &config, &mut defects);
        (result, defects)
    }

    #[test]
    fn test_base64_utf8_text_part() {
        // "Héllo wörld"
        let raw = b"Content-Type: text/plain; charset=utf-8\n\
Content-Transfer-Encoding: base64\n\
\n\
SMOpbGxvIHfDtnJsZA==\n";
        let (parts, defects) = extract(raw);
        let parts = parts.expect("parse");
        assert!(defects.is_empty());
        assert_eq!(parts.len(), 1);
        assert!(parts[0].can_index);
        assert_eq!(parts[0].text(), Some("Héllo wörld"));
        assert_eq!(parts[0].charset.as_deref(), Some("utf-8"));
        assert_eq!(parts[0].size_bytes, 21);
    }

    #[test]
    fn test_latin1_quoted_printable() {
        let raw = b"Content-Type: text/plain; charset=iso-8859-1\n\
Content-Transfer-Encoding: quoted-printable\n\
\n\
R=E9sum=E9";
        let (parts, _) = extract(raw);
        assert_eq!(parts.expect("parse")[0].text(), Some("Résumé"));
    }

    #[test]
    fn test_binary_part_kept_raw() {
        let raw = b"Content-Type: image/png; name=dot.png\n\
Content-Transfer-Encoding: base64\n\
\n\
iVBORw0KGgo=";
        let (parts, _) = extract(raw);
        let parts = parts.expect("parse");
        assert!(!parts[0].can_index);
        assert_eq!(parts[0].charset, None);
        assert_eq!(parts[0].data, b"iVBORw0KGgo=");
        assert_eq!(parts[0].filename.as_deref(), Some("dot.png"));
    }

    #[test]
    fn test_text_without_charset_is_ambiguous() {
        let raw = b"Content-Type: text/html\n\n<p>hi</p>";
        let (result, _) = extract(raw);
        match result {
            Err(IngestError::CharsetAmbiguity { part, declared, .. }) => {
                assert_eq!(part, 0);
                assert!(declared.is_empty());
            }
            other => panic!("expected CharsetAmbiguity, got {other:?}"),
        }
    }

    #[test]
    fn test_invalid_base64_recorded() {
        let raw = b"Content-Type: text/plain; charset=utf-8\n\
Content-Transfer-Encoding: base64\n\
\n\
not*base64";
        let (parts, defects) = extract(raw);
        assert_eq!(parts.expect("parse")[0].text(), Some("not*base64"));
        assert!(matches!(defects[0], Defect::Body { part: 0, .. }));
    }

    #[test]
    fn test_unknown_charset_falls_back() {
        let raw = b"Content-Type: text/plain; charset=x-martian\n\nhello";
        let (parts, defects) = extract(raw);
        let parts = parts.expect("parse");
        assert_eq!(parts[0].text(), Some("hello"));
        assert_eq!(parts[0].charset.as_deref(), Some("x-martian"));
        assert_eq!(defects.len(), 1);
    }

    #[test]
    fn test_eight_bit_in_ascii_part_is_utf8() {
        let (parts, defects) = extract("Subject: x\n\ncafé\n".as_bytes());
        let parts = parts.expect("parse");
        assert_eq!(parts[0].text(), Some("café\n"));
        assert_eq!(parts[0].charset.as_deref(), Some("us-ascii"));
        assert!(matches!(&defects[..], [Defect::Body { part: 0, .. }]));

        let (parts, defects) =
            extract(b"Content-Type: text/plain; charset=US-ASCII\n\nplain ascii");
        assert_eq!(parts.expect("parse")[0].text(), Some("plain ascii"));
        assert!(defects.is_empty());
    }
}
