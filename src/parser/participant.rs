//! Participant extraction from the `From`, `To`, `Cc` and `Bcc` headers.

use tracing::warn;

use crate::error::Defect;
use crate::model::address::{normalize_address, Participant, RawAddress, Role, EMAIL_PROTOCOL};
use crate::parser::header::{decode_encoded_words, HeaderTable};

/// Build participants for every role header, in role order then header order.
///
/// Addresses that fail normalization are dropped and recorded as defects.
pub fn extract_participants(headers: &HeaderTable, defects: &mut Vec<Defect>) -> Vec<Participant> {
    let mut participants = Vec::new();

    for role in Role::ORDERED {
        for value in headers.get_all(role.header_name()) {
            for raw in RawAddress::parse_list(value) {
                match normalize_address(&raw.address) {
                    Some(address) => participants.push(Participant {
                        address,
                        label: label_for(&raw),
                        role,
                        protocol: EMAIL_PROTOCOL.to_string(),
                    }),
                    None => {
                        warn!(role = %role, address = %raw.address, "Dropping invalid address");
                        defects.push(Defect::InvalidParticipantAddress {
                            role,
                            value: raw.address,
                        });
                    }
                }
            }
        }
    }

    participants
}

fn label_for(raw: &RawAddress) -> Option<String> {
    let label = decode_encoded_words(&raw.display_name);
    let label = label.trim();
    (!label.is_empty()).then(|| label.to_string())
}

/// The first `From` participant, scanning left to right.
pub fn primary_sender(participants: &[Participant]) -> Option<&Participant> {
    participants.iter().find(|p| p.role == Role::From)
}
