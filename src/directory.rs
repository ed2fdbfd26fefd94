// Contact directory: where the session gets its contacts and any earlier
// message history from. Read-only from the session's point of view.

use chrono::{DateTime, TimeZone, Utc};
use std::collections::HashMap;

use crate::models::{is_blank, Attachment, Contact, ContactId, ContentRef, Presence};

/// Which side of the conversation wrote a history entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Incoming,
    Outgoing,
}

/// A message from earlier history, before the session gives it an id
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub direction: Direction,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub read: bool,
    pub attachment: Option<Attachment>,
}

impl HistoryEntry {
    pub fn incoming(body: &str, created_at: DateTime<Utc>) -> Self {
        HistoryEntry {
            direction: Direction::Incoming,
            body: body.to_string(),
            created_at,
            read: false,
            attachment: None,
        }
    }

    pub fn outgoing(body: &str, created_at: DateTime<Utc>) -> Self {
        HistoryEntry {
            direction: Direction::Outgoing,
            body: body.to_string(),
            created_at,
            read: false,
            attachment: None,
        }
    }

    pub fn read(mut self) -> Self {
        self.read = true;
        self
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachment = Some(attachment);
        self
    }

    /// Conversation list text for this entry
    pub fn preview(&self) -> String {
        match &self.attachment {
            Some(attachment) if is_blank(&self.body) => attachment.preview(),
            _ => self.body.clone(),
        }
    }
}

pub trait ContactDirectory: Send {
    fn contacts(&self) -> Vec<Contact>;

    /// Earlier messages with `contact`, oldest first
    fn history(&self, contact: &ContactId) -> Vec<HistoryEntry>;
}

/// Directory backed by fixed, in-memory data
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    contacts: Vec<Contact>,
    histories: HashMap<ContactId, Vec<HistoryEntry>>,
}

impl StaticDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_contact(mut self, contact: Contact) -> Self {
        self.contacts.push(contact);
        self
    }

    pub fn with_history(mut self, contact: &str, entries: Vec<HistoryEntry>) -> Self {
        self.histories
            .entry(ContactId::new(contact))
            .or_default()
            .extend(entries);
        self
    }
}

impl ContactDirectory for StaticDirectory {
    fn contacts(&self) -> Vec<Contact> {
        self.contacts.clone()
    }

    fn history(&self, contact: &ContactId) -> Vec<HistoryEntry> {
        let mut entries = self.histories.get(contact).cloned().unwrap_or_default();
        // Stable, so entries sharing a timestamp keep their order
        entries.sort_by_key(|entry| entry.created_at);
        entries
    }
}

fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2023, 5, 7, hour, minute, 0)
        .single()
        .unwrap_or_else(Utc::now)
}

/// The lounge's demo contacts, with a short history for the first one
pub fn demo_directory(seed_history: bool) -> StaticDirectory {
    let directory = StaticDirectory::new()
        .with_contact(Contact::new("1", "Todo", Presence::Online))
        .with_contact(Contact::new("2", "River Rat", Presence::Online))
        .with_contact(Contact::new("3", "Button Betty", Presence::Offline));

    if !seed_history {
        return directory;
    }

    directory.with_history(
        "1",
        vec![
            HistoryEntry::incoming(
                "I took great photos there. You have to join next time!",
                at(10, 53),
            )
            .read(),
            HistoryEntry::outgoing("Absolutely. When?", at(11, 0)).read(),
            HistoryEntry::outgoing("", at(11, 3))
                .read()
                .with_attachment(Attachment::audio(ContentRef::new("capture://audio/demo"), 34)),
            HistoryEntry::incoming("Yay!", at(11, 5)).read(),
            HistoryEntry::outgoing("I'm so excited!", at(11, 9)).read(),
        ],
    )
}
