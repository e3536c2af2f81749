//! Email address parsing and normalization (RFC 5322 §3.4), and participants.

use std::fmt;

/// Protocol tag attached to every participant extracted from mail.
pub const EMAIL_PROTOCOL: &str = "email";

/// The role an address plays on a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Role {
    From,
    To,
    Cc,
    Bcc,
}

impl Role {
    /// Roles in the order participants are extracted.
    pub const ORDERED: [Role; 4] = [Role::From, Role::To, Role::Cc, Role::Bcc];

    /// Lowercase header name carrying this role.
    pub fn header_name(self) -> &'static str {
        match self {
            Role::From => "from",
            Role::To => "to",
            Role::Cc => "cc",
            Role::Bcc => "bcc",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Role::From => "From",
            Role::To => "To",
            Role::Cc => "Cc",
            Role::Bcc => "Bcc",
        };
        f.write_str(s)
    }
}

/// An address-bearing actor on a message.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Participant {
    /// Normalized address (`local@domain`, lowercase).
    pub address: String,
    /// Display name, if one was given.
    pub label: Option<String>,
    pub role: Role,
    pub protocol: String,
}

/// An address as written in a header, before normalization.
///
/// # Examples
/// - `"Juan García <juan@ejemplo.com>"` → `display_name = "Juan García"`, `address = "juan@ejemplo.com"`
/// - `"user@example.com"` → `display_name = ""`, `address = "user@example.com"`
#[derive(Debug, Clone, PartialEq)]
pub struct RawAddress {
    /// Human-readable display name (may be empty).
    pub display_name: String,
    /// The address part, exactly as found (untrimmed of case).
    pub address: String,
}

impl RawAddress {
    /// Parse a single address from a header value segment.
    ///
    /// Supported formats:
    /// - `"user@domain.com"`
    /// - `"<user@domain.com>"`
    /// - `"Display Name <user@domain.com>"`
    /// - `"\"Display, Name\" <user@domain.com>"`
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();

        if let Some(angle_start) = trimmed.rfind('<') {
            if let Some(angle_end) = trimmed.rfind('>') {
                if angle_end > angle_start {
                    return Self {
                        display_name: strip_quotes(&trimmed[..angle_start]),
                        address: trimmed[angle_start + 1..angle_end].trim().to_string(),
                    };
                }
            }
        }

        Self {
            display_name: String::new(),
            address: trimmed.to_string(),
        }
    }

    /// Split a header value into address segments and parse each one.
    ///
    /// Commas inside quotes or angle brackets do not split. A segment that is
    /// nothing but a quoted list of bare addresses (`"a@x.com, b@y.com"`) is
    /// unwrapped and split again. Empty segments are skipped.
    pub fn parse_list(raw: &str) -> Vec<Self> {
        let mut results = Vec::new();
        for segment in split_address_list(raw) {
            let trimmed = segment.trim();
            if trimmed.is_empty() {
                continue;
            }
            if is_quoted_bare_list(trimmed) {
                let inner = &trimmed[1..trimmed.len() - 1];
                results.extend(
                    split_address_list(inner)
                        .iter()
                        .filter(|s| !s.trim().is_empty())
                        .map(|s| Self::parse(s)),
                );
            } else {
                results.push(Self::parse(trimmed));
            }
        }
        results
    }
}

/// Split on commas that are outside quotes and angle brackets.
///
/// Group syntax (RFC 5322 §3.4) is flattened: `Friends: a@x.com, b@y.com;`
/// drops the group name up to the colon, and the closing `;` ends a segment.
fn split_address_list(raw: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut in_angle = false;

    for ch in raw.chars() {
        match ch {
            '"' => {
                in_quotes = !in_quotes;
                current.push(ch);
            }
            '<' if !in_quotes => {
                in_angle = true;
                current.push(ch);
            }
            '>' if !in_quotes => {
                in_angle = false;
                current.push(ch);
            }
            ',' | ';' if !in_quotes && !in_angle => {
                segments.push(std::mem::take(&mut current));
            }
            ':' if !in_quotes && !in_angle && !current.contains('@') => current.clear(),
            _ => current.push(ch),
        }
    }
    segments.push(current);
    segments
}

fn is_quoted_bare_list(segment: &str) -> bool {
    segment.len() >= 2
        && segment.starts_with('"')
        && segment.ends_with('"')
        && !segment.contains('<')
        && segment[1..segment.len() - 1].contains(',')
}

/// Strip surrounding double-quotes and trim whitespace.
fn strip_quotes(s: &str) -> String {
    let trimmed = s.trim();
    if trimmed.starts_with('"') && trimmed.ends_with('"') && trimmed.len() >= 2 {
        trimmed[1..trimmed.len() - 1].trim().to_string()
    } else {
        trimmed.to_string()
    }
}

/// Normalize an address: trim, strip angle brackets, validate, lowercase.
///
/// Returns `None` if the address is not a plausible `local@domain`.
pub fn normalize_address(raw: &str) -> Option<String> {
    let trimmed = raw
        .trim()
        .trim_start_matches('<')
        .trim_end_matches('>')
        .trim();

    if trimmed.is_empty() || trimmed.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return None;
    }

    let (local, domain) = trimmed.split_once('@')?;
    if local.is_empty() || domain.contains('@') {
        return None;
    }
    if local.starts_with('.') || local.ends_with('.') || local.contains("..") {
        return None;
    }
    if local.chars().any(|c| "()<>,;:\\\"[]".contains(c)) {
        return None;
    }
    if !is_valid_domain(domain) {
        return None;
    }

    Some(trimmed.to_lowercase())
}

fn is_valid_domain(domain: &str) -> bool {
    let labels: Vec<&str> = domain.split('.').collect();
    labels.len() >= 2
        && labels.iter().all(|label| {
            !label.is_empty()
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label
                    .chars()
                    .all(|c| c.is_alphanumeric() || c == '-')
        })
}
