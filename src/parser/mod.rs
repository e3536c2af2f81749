//! Raw message parsing: header grouping, participants, references, and the MIME part tree.

pub mod attachment;
pub mod eml;
pub mod header;
pub mod mime;
pub mod participant;
pub mod raw;
pub mod reference;
pub mod transfer;
