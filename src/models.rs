use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a contact as handed out by the contact directory
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContactId(pub String);

impl ContactId {
    pub fn new(id: impl Into<String>) -> Self {
        ContactId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Session-wide message sequence number. Higher ids were created later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MessageId(pub u64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The signed-in user, as supplied by the identity provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub id: String,
    pub name: String,
}

impl UserIdentity {
    pub fn new(id: &str, name: &str) -> Self {
        UserIdentity {
            id: id.to_string(),
            name: name.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub id: ContactId,
    pub name: String,
    pub avatar: Option<String>,
    pub presence: Presence,
}

impl Contact {
    pub fn new(id: &str, name: &str, presence: Presence) -> Self {
        Contact {
            id: ContactId::new(id),
            name: name.to_string(),
            avatar: None,
            presence,
        }
    }

    /// First letter of the name, shown when there is no avatar
    pub fn initial(&self) -> String {
        self.name
            .chars()
            .next()
            .map(|c| c.to_uppercase().to_string())
            .unwrap_or_else(|| "?".to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Presence {
    Online,
    Offline,
}

impl fmt::Display for Presence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Presence::Online => write!(f, "online"),
            Presence::Offline => write!(f, "offline"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Audio,
    Image,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Audio => write!(f, "audio"),
            MediaKind::Image => write!(f, "image"),
        }
    }
}

/// Opaque locator for media bytes (path, URL, data URI or capture key)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentRef(pub String);

impl ContentRef {
    pub fn new(locator: impl Into<String>) -> Self {
        ContentRef(locator.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub kind: MediaKind,
    pub content: ContentRef,
    /// Length in seconds, always present for audio
    pub duration: Option<u32>,
}

impl Attachment {
    pub fn audio(content: ContentRef, seconds: u32) -> Self {
        Attachment {
            kind: MediaKind::Audio,
            content,
            duration: Some(seconds),
        }
    }

    pub fn image(content: ContentRef) -> Self {
        Attachment {
            kind: MediaKind::Image,
            content,
            duration: None,
        }
    }

    /// Duration as `m:ss`, for audio attachments
    pub fn duration_label(&self) -> Option<String> {
        self.duration.map(format_duration)
    }

    /// Short text used in conversation previews
    pub fn preview(&self) -> String {
        match self.kind {
            MediaKind::Audio => format!(
                "Voice message {}",
                self.duration_label().unwrap_or_else(|| format_duration(0))
            ),
            MediaKind::Image => "Photo".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub sender_id: String,
    pub receiver_id: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub read: bool,
    pub attachment: Option<Attachment>,
}

impl Message {
    /// Body for previews: the text, or a label for attachment-only messages
    pub fn preview(&self) -> String {
        if !is_blank(&self.body) {
            return self.body.clone();
        }
        match &self.attachment {
            Some(attachment) => attachment.preview(),
            None => String::new(),
        }
    }
}

/// Format whole seconds as `minutes:seconds` with two-digit seconds
pub fn format_duration(seconds: u32) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

pub(crate) fn is_blank(text: &str) -> bool {
    text.trim().is_empty()
}
