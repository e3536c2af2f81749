//! Core data model types: messages, participants, attachments, discussions.

pub mod address;
pub mod attachment;
pub mod discussion;
pub mod message;
