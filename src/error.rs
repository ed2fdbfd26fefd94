use thiserror::Error;

use crate::models::{ContactId, MediaKind};

/// Errors returned by session operations.
///
/// None of these are fatal: a failed operation leaves the session exactly as it was.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("Contact not found: {0}")]
    NotFound(ContactId),

    #[error("Another attachment is already pending")]
    ConflictingAttachment,

    #[error("No recording in progress")]
    NotRecording,

    #[error("No conversation selected")]
    NoActiveConversation,

    #[error("Message is empty")]
    EmptyMessage,

    #[error("Stop the recording before sending")]
    RecordingInProgress,

    #[error("Invalid media source: {0}")]
    InvalidSource(String),

    #[error("Access to {0} capture was denied")]
    AccessDenied(MediaKind),

    #[error("Duplicate contact in directory: {0}")]
    DuplicateContact(ContactId),
}

pub type SessionResult<T> = std::result::Result<T, SessionError>;
