//! MIME structure: the depth-bounded part tree and leaf metadata.
//!
//! `mail-parser` does the MIME parsing. This module turns its flat part list
//! into a [`MimeNode`] tree and records the structural defects it finds.

use mail_parser::{HeaderName, Message, MessagePart, MimeHeaders, PartType};
use tracing::warn;

use crate::error::Defect;
use crate::parser::header;
use crate::parser::transfer::TransferEncoding;

/// Default maximum nesting depth for containers (guards against adversarial input).
pub const MAX_DEPTH: usize = 10;

/// A `Content-Type` value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentType {
    /// Lowercased `type/subtype`.
    pub mime_type: String,
    /// Parameters in order, with lowercased names.
    pub params: Vec<(String, String)>,
}

impl ContentType {
    /// Convert a value parsed by `mail-parser`. Returns `None` unless it is `type/subtype`.
    pub fn from_parsed(parsed: &mail_parser::ContentType<'_>) -> Option<Self> {
        let main = parsed.ctype().trim();
        let sub = parsed.subtype()?.trim();
        if [main, sub]
            .iter()
            .any(|s| s.is_empty() || s.contains(char::is_whitespace))
        {
            return None;
        }
        let params = parsed
            .attributes()
            .unwrap_or_default()
            .iter()
            .map(|(name, value)| (name.to_ascii_lowercase(), value.to_string()))
            .collect();
        Some(Self {
            mime_type: format!("{main}/{sub}").to_ascii_lowercase(),
            params,
        })
    }

    /// The RFC 2045 default: `text/plain; charset=us-ascii`.
    pub fn default_text() -> Self {
        Self {
            mime_type: "text/plain".to_string(),
            params: vec![("charset".to_string(), "us-ascii".to_string())],
        }
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn main_type(&self) -> &str {
        self.mime_type.split('/').next().unwrap_or("")
    }

    pub fn is_text(&self) -> bool {
        self.main_type() == "text"
    }

    pub fn is_multipart(&self) -> bool {
        self.main_type() == "multipart"
    }

    pub fn is_message(&self) -> bool {
        self.mime_type == "message/rfc822"
    }
}

/// A non-container part with everything needed to decode it.
#[derive(Debug, Clone)]
pub struct MimeLeaf<'a> {
    /// Effective content type (first valid `Content-Type`, else the default).
    pub content_type: ContentType,
    /// Distinct charsets declared across all `Content-Type` occurrences.
    pub charsets: Vec<String>,
    pub transfer_encoding: TransferEncoding,
    pub filename: Option<String>,
    /// Raw payload, before transfer or charset decoding.
    pub body: &'a [u8],
}

/// The part tree of a message.
#[derive(Debug, Clone)]
pub enum MimeNode<'a> {
    /// `multipart/*` or `message/rfc822`, with children in order.
    Container(Vec<MimeNode<'a>>),
    Leaf(MimeLeaf<'a>),
}

impl<'a> MimeNode<'a> {
    /// All leaves in tree order, each exactly once.
    pub fn leaves(&self) -> Vec<&MimeLeaf<'a>> {
        let mut out = Vec::new();
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            match node {
                MimeNode::Leaf(leaf) => out.push(leaf),
                MimeNode::Container(children) => stack.extend(children.iter().rev()),
            }
        }
        out
    }

    /// Depth of the deepest leaf (a lone leaf has depth 0).
    pub fn depth(&self) -> usize {
        match self {
            MimeNode::Leaf(_) => 0,
            MimeNode::Container(children) => {
                1 + children.iter().map(MimeNode::depth).max().unwrap_or(0)
            }
        }
    }
}

/// Builds a [`MimeNode`] tree from a parsed message, bounded by a maximum
/// container depth.
pub struct TreeBuilder<'d> {
    max_depth: usize,
    defects: &'d mut Vec<Defect>,
}

impl<'d> TreeBuilder<'d> {
    pub fn new(max_depth: usize, defects: &'d mut Vec<Defect>) -> Self {
        Self { max_depth, defects }
    }

    pub fn build<'a>(&mut self, message: &'a Message<'_>) -> MimeNode<'a> {
        self.message_node(message, 0)
    }

    fn message_node<'a>(&mut self, message: &'a Message<'_>, depth: usize) -> MimeNode<'a> {
        match message.parts.first() {
            Some(root) => self.part_node(message, root, depth),
            None => MimeNode::Container(Vec::new()),
        }
    }

    /// Part offsets index into the raw bytes of the message that owns them.
    fn part_node<'a>(
        &mut self,
        message: &'a Message<'_>,
        part: &'a MessagePart<'_>,
        depth: usize,
    ) -> MimeNode<'a> {
        let raw: &'a [u8] = &message.raw_message;
        let declared = self.declared_types(raw, part);
        let content_type = declared
            .first()
            .cloned()
            .unwrap_or_else(ContentType::default_text);

        let is_container = matches!(part.body, PartType::Multipart(_) | PartType::Message(_));
        if is_container && depth >= self.max_depth {
            self.record(Defect::structure(format!(
                "{} nested deeper than {} levels kept as a single part",
                content_type.mime_type, self.max_depth
            )));
        } else {
            match &part.body {
                PartType::Multipart(ids) => {
                    self.check_closed(raw, part);
                    let children = ids
                        .iter()
                        .filter_map(|&id| message.parts.get(id))
                        .map(|child| self.part_node(message, child, depth + 1))
                        .collect();
                    return MimeNode::Container(children);
                }
                PartType::Message(nested) => {
                    return MimeNode::Container(vec![self.message_node(nested, depth + 1)]);
                }
                _ if content_type.is_multipart() => {
                    self.record(Defect::structure(format!(
                        "{} without a usable boundary kept as a single part",
                        content_type.mime_type
                    )));
                }
                _ if content_type.is_message() => {
                    self.record(Defect::structure(
                        "unparseable message/rfc822 kept as a single part",
                    ));
                }
                _ => {}
            }
        }

        let charsets = if declared.is_empty() {
            content_type
                .param("charset")
                .map(|c| vec![c.to_string()])
                .unwrap_or_default()
        } else {
            distinct_charsets(&declared)
        };

        MimeNode::Leaf(MimeLeaf {
            content_type,
            charsets,
            transfer_encoding: TransferEncoding::from_header(part.content_transfer_encoding()),
            filename: part
                .attachment_name()
                .map(header::decode_encoded_words)
                .filter(|name| !name.trim().is_empty()),
            body: raw.get(part.offset_body..part.offset_end).unwrap_or_default(),
        })
    }

    /// Every valid `Content-Type` occurrence on a part, in order.
    fn declared_types(&mut self, raw: &[u8], part: &MessagePart<'_>) -> Vec<ContentType> {
        let mut declared = Vec::new();
        for field in part
            .headers
            .iter()
            .filter(|h| h.name == HeaderName::ContentType)
        {
            match field.value.as_content_type().and_then(ContentType::from_parsed) {
                Some(ct) => declared.push(ct),
                None => {
                    let value = raw
                        .get(field.offset_start..field.offset_end)
                        .map(header::decode_header_bytes)
                        .unwrap_or_default();
                    self.record(Defect::header(
                        "content-type",
                        format!("invalid value '{}'", value.trim()),
                    ));
                }
            }
        }
        declared
    }

    /// `mail-parser` lets a multipart run to the end of input without its
    /// closing delimiter.
    fn check_closed(&mut self, raw: &[u8], part: &MessagePart<'_>) {
        let Some(boundary) = part.content_type().and_then(|ct| ct.attribute("boundary")) else {
            return;
        };
        let close = format!("--{boundary}--");
        let body = raw.get(part.offset_body..part.offset_end).unwrap_or_default();
        let closed = body
            .split(|&b| b == b'\n')
            .any(|line| line.trim_ascii() == close.as_bytes());
        if !closed {
            self.record(Defect::structure(format!(
                "closing boundary '{boundary}' not found"
            )));
        }
    }

    fn record(&mut self, defect: Defect) {
        warn!(%defect, "MIME defect");
        self.defects.push(defect);
    }
}

/// Distinct (case-insensitive) charset parameters across declarations, in order.
fn distinct_charsets(declared: &[ContentType]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for ct in declared {
        for (key, value) in &ct.params {
            if key != "charset" {
                continue;
            }
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            if !out.iter().any(|c| c.eq_ignore_ascii_case(value)) {
                out.push(value.to_string());
            }
        }
    }
    out
}

/// Skip the `From ` separator line at the start of MBOX messages.
pub fn skip_from_line(data: &[u8]) -> &[u8] {
    let data = data.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(data);

    if data.starts_with(b"From ") {
        if let Some(pos) = data.iter().position(|&b| b == b'\n') {
            return &data[pos + 1..];
        }
    }
    data
}

/// Block-level tags that start a new line of text.
const BLOCK_TAGS: [&str; 14] = [
    "br", "p", "div", "tr", "li", "ul", "ol", "table", "h1", "h2", "h3", "h4", "h5", "h6",
];

const ENTITIES: [(&str, &str); 8] = [
    ("&lt;", "<"),
    ("&gt;", ">"),
    ("&quot;", "\""),
    ("&#39;", "'"),
    ("&apos;", "'"),
    ("&nbsp;", " "),
    ("&#160;", " "),
    ("&amp;", "&"),
];

/// Reduce an HTML body to readable plain text.
///
/// Tags are dropped, block-level tags become line breaks, `<script>` and
/// `<style>` contents are skipped, and runs of blank lines collapse to one.
pub fn html_to_text(html: &str) -> String {
    let mut raw = String::with_capacity(html.len());
    let mut rest = html;

    while let Some(open) = rest.find('<') {
        raw.push_str(&rest[..open]);
        let tag_src = &rest[open + 1..];
        let Some(close) = tag_src.find('>') else {
            rest = "";
            break;
        };
        let name = tag_name(&tag_src[..close]);
        rest = &tag_src[close + 1..];

        if name == "script" || name == "style" {
            rest = skip_past_closing(rest, &name);
        } else if BLOCK_TAGS.contains(&name.trim_start_matches('/')) {
            raw.push('\n');
        }
    }
    raw.push_str(rest);

    let decoded = ENTITIES
        .iter()
        .fold(raw, |text, (entity, ch)| text.replace(entity, ch));

    let mut out = String::with_capacity(decoded.len());
    let mut blank_run = false;
    for line in decoded.lines().map(str::trim) {
        if line.is_empty() {
            if !blank_run && !out.is_empty() {
                out.push('\n');
            }
            blank_run = true;
        } else {
            out.push_str(line);
            out.push('\n');
            blank_run = false;
        }
    }
    out.trim().to_string()
}

/// Lowercased tag name, keeping a leading `/` for closing tags.
fn tag_name(tag: &str) -> String {
    let tag = tag.trim();
    let end = tag
        .char_indices()
        .skip(1)
        .find(|(_, c)| c.is_whitespace() || *c == '/')
        .map_or(tag.len(), |(i, _)| i);
    tag[..end].to_ascii_lowercase()
}

/// Skip everything up to and including `</name>`.
fn skip_past_closing<'a>(rest: &'a str, name: &str) -> &'a str {
    let closing = format!("</{name}");
    let lower = rest.to_ascii_lowercase();
    let Some(at) = lower.find(&closing) else {
        return "";
    };
    rest[at..].find('>').map_or("", |gt| &rest[at + gt + 1..])
}

#[cfg(test)]
mod tests {
    use super::*;
    use mail_parser::MessageParser;

    fn parse(raw: &[u8]) -> Message<'_> {
        MessageParser::default().parse(raw).expect("headers")
    }

    fn build<'a>(
        message: &'a Message<'_>,
        max_depth: usize,
        defects: &mut Vec<Defect>,
    ) -> MimeNode<'a> {
        TreeBuilder::new(max_depth, defects).build(message)
    }

    #[test]
    fn test_content_type_from_parsed() {
        let message = parse(b"Content-Type: Text/HTML; Charset=\"UTF-8\"\n\n<p>x</p>");
        let ct = message.parts[0]
            .content_type()
            .and_then(ContentType::from_parsed)
            .expect("valid");
        assert_eq!(ct.mime_type, "text/html");
        assert_eq!(ct.param("charset"), Some("UTF-8"));
        assert!(ct.is_text());
    }

    #[test]
    fn test_invalid_content_type_falls_back_to_default() {
        let message = parse(b"Content-Type: garbage\n\nhello");
        let mut defects = Vec::new();
        let node = build(&message, MAX_DEPTH, &mut defects);
        let leaves = node.leaves();
        assert_eq!(leaves[0].content_type, ContentType::default_text());
        assert_eq!(leaves[0].charsets, ["us-ascii"]);
        assert!(matches!(&defects[..], [Defect::Header { name, .. }] if name == "content-type"));
    }

    #[test]
    fn test_tree_order_nested() {
        let raw = b"Content-Type: multipart/mixed; boundary=outer\n\
\n\
preamble\n\
--outer\n\
Content-Type: multipart/alternative; boundary=inner\n\
\n\
--inner\n\
Content-Type: text/plain; charset=utf-8\n\
\n\
plain\n\
--inner\n\
Content-Type: text/html; charset=utf-8\n\
\n\
<p>html</p>\n\
--inner--\n\
--outer\n\
Content-Type: image/png\n\
\n\
PNG\n\
--outer--\n\
epilogue\n";
        let message = parse(raw);
        let mut defects = Vec::new();
        let node = build(&message, MAX_DEPTH, &mut defects);
        assert!(defects.is_empty(), "{defects:?}");
        let leaves = node.leaves();
        let types: Vec<_> = leaves.iter().map(|l| l.content_type.mime_type.as_str()).collect();
        assert_eq!(types, ["text/plain", "text/html", "image/png"]);
        assert_eq!(leaves[0].body, b"plain");
        assert_eq!(leaves[2].body, b"PNG");
        assert_eq!(node.depth(), 2);
    }

    #[test]
    fn test_depth_bound_degrades_to_leaf() {
        let raw = b"Content-Type: multipart/mixed; boundary=a\n\
\n\
--a\n\
Content-Type: multipart/mixed; boundary=b\n\
\n\
--b\n\
\n\
deep\n\
--b--\n\
--a--\n";
        let message = parse(raw);
        let mut defects = Vec::new();
        let node = build(&message, 1, &mut defects);
        let leaves = node.leaves();
        assert_eq!(leaves.len(), 1);
        assert_eq!(leaves[0].content_type.mime_type, "multipart/mixed");
        assert_eq!(defects.len(), 1);
        assert!(matches!(defects[0], Defect::Structure { .. }));
    }

    #[test]
    fn test_unterminated_multipart() {
        let raw = b"Content-Type: multipart/mixed; boundary=x\n\n--x\n\nfirst\n--x\n\nsecond\n";
        let message = parse(raw);
        let mut defects = Vec::new();
        let node = build(&message, MAX_DEPTH, &mut defects);
        let leaves = node.leaves();
        assert_eq!(leaves.len(), 2);
        assert_eq!(leaves[0].body, b"first");
        assert_eq!(leaves[1].body, b"second\n");
        assert_eq!(
            defects,
            [Defect::structure("closing boundary 'x' not found")]
        );
    }

    #[test]
    fn test_missing_boundary_is_leaf() {
        let message = parse(b"Content-Type: multipart/mixed\n\nwhatever\n");
        let mut defects = Vec::new();
        let node = build(&message, MAX_DEPTH, &mut defects);
        assert!(matches!(node, MimeNode::Leaf(_)));
        assert_eq!(defects.len(), 1);
    }

    #[test]
    fn test_embedded_message_is_container() {
        let raw = b"Content-Type: message/rfc822\n\nSubject: inner\nContent-Type: text/plain; charset=latin1\n\ninner body\n";
        let message = parse(raw);
        let node = build(&message, MAX_DEPTH, &mut Vec::new());
        assert!(matches!(node, MimeNode::Container(_)));
        let leaves = node.leaves();
        assert_eq!(leaves.len(), 1);
        assert_eq!(leaves[0].charsets, ["latin1"]);
        assert_eq!(leaves[0].body, b"inner body\n");
    }

    #[test]
    fn test_default_content_type_and_charsets() {
        let message = parse(b"Subject: x\n\nhello\n");
        let node = build(&message, MAX_DEPTH, &mut Vec::new());
        let leaves = node.leaves();
        assert_eq!(leaves[0].content_type.mime_type, "text/plain");
        assert_eq!(leaves[0].charsets, ["us-ascii"]);

        let message = parse(
            b"Content-Type: text/plain; charset=utf-8; charset=UTF-8\nContent-Type: text/plain; charset=latin1\n\nx",
        );
        let node = build(&message, MAX_DEPTH, &mut Vec::new());
        assert_eq!(node.leaves()[0].charsets, ["utf-8", "latin1"]);
    }

    #[test]
    fn test_leaf_filename() {
        let raw = b"Content-Type: application/pdf; name=\"fallback.pdf\"\nContent-Disposition: attachment; filename=\"=?UTF-8?B?w6l0w6kucGRm?=\"\n\n%PDF";
        let message = parse(raw);
        let node = build(&message, MAX_DEPTH, &mut Vec::new());
        assert_eq!(node.leaves()[0].filename.as_deref(), Some("été.pdf"));

        let message = parse(b"Content-Type: application/pdf; name=report.pdf\n\n%PDF");
        let node = build(&message, MAX_DEPTH, &mut Vec::new());
        assert_eq!(node.leaves()[0].filename.as_deref(), Some("report.pdf"));
    }

    #[test]
    fn test_skip_from_line() {
        let data = b"From user@example.com Thu Jan 01 00:00:00 2024\nSubject: Test\n\nBody\n";
        assert!(skip_from_line(data).starts_with(b"Subject:"));
        let data = b"Subject: Test\n\nBody\n";
        assert_eq!(skip_from_line(data), data);
    }

    #[test]
    fn test_html_to_text_basic() {
        let text = html_to_text("<p>Hello <b>world</b></p><p>Second paragraph</p>");
        assert!(text.contains("Hello world"));
        assert!(text.contains("Second paragraph"));
    }

    #[test]
    fn test_html_to_text_entities_and_scripts() {
        assert_eq!(html_to_text("Tom &amp; Jerry &lt;3&gt;"), "Tom & Jerry <3>");
        assert_eq!(html_to_text("Before<script>alert('x')</script>After"), "BeforeAfter");
        assert_eq!(html_to_text("<STYLE>p { color: red }</STYLE>Styled"), "Styled");
    }

    #[test]
    fn test_html_to_text_block_breaks() {
        assert_eq!(
            html_to_text("<DIV>one</DIV><div class=\"x\">two<br/>three</div>\n\n\n<p>four</p>"),
            "one\n\ntwo\nthree\n\nfour"
        );
    }
}
