// Conversation session manager.
//
// Owns the contact set, the conversations, the active conversation and the
// draft (text, staged attachment, running recording). Every operation checks
// all of its preconditions before touching state, so a failed call leaves the
// session exactly as it found it.

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use crate::directory::{ContactDirectory, Direction, HistoryEntry};
use crate::error::{SessionError, SessionResult};
use crate::media::{CaptureHandle, MediaCapture, SourceResolver, TickGuard, Ticker};
use crate::models::{
    format_duration, is_blank, Attachment, Contact, ContactId, MediaKind, Message, MessageId,
    Presence, UserIdentity,
};

/// External collaborators the session talks to
pub struct Collaborators {
    pub directory: Box<dyn ContactDirectory>,
    pub capture: Box<dyn MediaCapture>,
    pub resolver: Box<dyn SourceResolver>,
    pub ticker: Box<dyn Ticker>,
}

#[derive(Debug, Default)]
struct Draft {
    text: String,
    staged: Option<Attachment>,
}

struct Recording {
    started_at: DateTime<Utc>,
    elapsed: Arc<AtomicU32>,
    capture: Box<dyn CaptureHandle>,
    ticker: TickGuard,
}

impl Recording {
    fn elapsed(&self) -> u32 {
        self.elapsed.load(Ordering::Relaxed)
    }
}

/// Read-only snapshot of the session for rendering
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionView {
    pub user: UserIdentity,
    pub active_contact: Option<Contact>,
    pub messages: Vec<Message>,
    pub draft: DraftView,
    pub recording: Option<RecordingView>,
    pub contacts: Vec<ContactPreview>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DraftView {
    pub text: String,
    pub staged: Option<Attachment>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordingView {
    pub started_at: DateTime<Utc>,
    pub elapsed_secs: u32,
    /// Elapsed time as `m:ss`
    pub elapsed: String,
}

/// One row of the conversation list
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContactPreview {
    pub contact: Contact,
    pub active: bool,
    pub last_message: Option<String>,
    pub last_activity: Option<DateTime<Utc>>,
    pub unread: usize,
}

pub struct SessionManager {
    user: UserIdentity,
    contacts: Vec<Contact>,
    conversations: HashMap<ContactId, Vec<Message>>,
    active: Option<ContactId>,
    draft: Draft,
    recording: Option<Recording>,
    next_message_id: u64,
    directory: Box<dyn ContactDirectory>,
    capture: Box<dyn MediaCapture>,
    resolver: Box<dyn SourceResolver>,
    ticker: Box<dyn Ticker>,
}

impl SessionManager {
    /// Start a session for `user` with the contacts the directory knows about
    pub fn sign_in(user: UserIdentity, collaborators: Collaborators) -> SessionResult<Self> {
        let Collaborators {
            directory,
            capture,
            resolver,
            ticker,
        } = collaborators;

        let contacts = directory.contacts();
        for (i, contact) in contacts.iter().enumerate() {
            if contacts[..i].iter().any(|c| c.id == contact.id) {
                return Err(SessionError::DuplicateContact(contact.id.clone()));
            }
        }

        info!(
            "Session started for {} ({}) with {} contacts",
            user.name,
            user.id,
            contacts.len()
        );

        Ok(SessionManager {
            user,
            contacts,
            conversations: HashMap::new(),
            active: None,
            draft: Draft::default(),
            recording: None,
            next_message_id: 1,
            directory,
            capture,
            resolver,
            ticker,
        })
    }

    /// End the session. Any running recording is stopped first.
    pub fn sign_out(mut self) {
        info!("Signing out {}", self.user.id);
        self.teardown();
    }

    pub fn active_contact(&self) -> Option<&ContactId> {
        self.active.as_ref()
    }

    pub fn is_recording(&self) -> bool {
        self.recording.is_some()
    }

    pub fn select_contact(&mut self, id: &ContactId) -> SessionResult<()> {
        if !self.contacts.iter().any(|c| &c.id == id) {
            warn!("Cannot select unknown contact {}", id);
            return Err(SessionError::NotFound(id.clone()));
        }

        if self.active.as_ref() == Some(id) {
            debug!("Contact {} is already active", id);
            return Ok(());
        }

        // Switching conversations drops whatever media was being composed
        if self.draft.staged.take().is_some() {
            debug!("Discarded staged attachment on contact switch");
        }
        if self.abort_recording() {
            debug!("Cancelled recording on contact switch");
        }

        self.ensure_conversation(id);
        let user_id = self.user.id.clone();
        let mut marked = 0;
        if let Some(messages) = self.conversations.get_mut(id) {
            for message in messages.iter_mut() {
                if !message.read && message.receiver_id == user_id {
                    message.read = true;
                    marked += 1;
                }
            }
        }

        debug!("Selected contact {} ({} messages marked read)", id, marked);
        self.active = Some(id.clone());
        Ok(())
    }

    /// Select the first contact when nothing is selected yet
    pub fn auto_select_first(&mut self) -> SessionResult<()> {
        if self.active.is_some() {
            return Ok(());
        }
        match self.contacts.first().map(|c| c.id.clone()) {
            Some(id) => self.select_contact(&id),
            None => Ok(()),
        }
    }

    pub fn update_draft_text(&mut self, text: &str) {
        self.draft.text = text.to_string();
    }

    /// Stage an existing piece of media (an image, or an audio file) for sending
    pub fn begin_attachment(&mut self, kind: MediaKind, source: &str) -> SessionResult<()> {
        if self.draft.staged.is_some() || self.recording.is_some() {
            return Err(SessionError::ConflictingAttachment);
        }

        let content = self.resolver.resolve(kind, source)?;
        let attachment = match kind {
            MediaKind::Image => Attachment::image(content),
            // Length of a picked audio file is unknown until played
            MediaKind::Audio => Attachment::audio(content, 0),
        };

        debug!("Staged {} attachment {}", kind, attachment.content);
        self.draft.staged = Some(attachment);
        Ok(())
    }

    /// Drop the staged attachment and any recording in progress
    pub fn cancel_attachment(&mut self) {
        if let Some(attachment) = self.draft.staged.take() {
            debug!("Released staged attachment {}", attachment.content);
        }
        if self.abort_recording() {
            debug!("Recording discarded");
        }
    }

    pub fn start_recording(&mut self) -> SessionResult<()> {
        if self.draft.staged.is_some() || self.recording.is_some() {
            return Err(SessionError::ConflictingAttachment);
        }

        let device = self.capture.request_access(MediaKind::Audio)?;
        let capture = device.start();
        let elapsed = Arc::new(AtomicU32::new(0));
        let ticker = self.ticker.start(&elapsed);

        info!("Recording started");
        self.recording = Some(Recording {
            started_at: Utc::now(),
            elapsed,
            capture,
            ticker,
        });
        Ok(())
    }

    pub fn stop_recording(&mut self) -> SessionResult<()> {
        let recording = self.recording.take().ok_or(SessionError::NotRecording)?;

        // Stop the ticker before reading so the duration cannot move afterwards
        recording.ticker.cancel();
        let seconds = recording.elapsed.load(Ordering::Relaxed);
        let content = recording.capture.stop();

        info!("Recording stopped after {}", format_duration(seconds));
        self.draft.staged = Some(Attachment::audio(content, seconds));
        Ok(())
    }

    /// Turn the draft into a message in the active conversation
    pub fn send_message(&mut self) -> SessionResult<Message> {
        let receiver = self
            .active
            .clone()
            .ok_or(SessionError::NoActiveConversation)?;
        if self.recording.is_some() {
            return Err(SessionError::RecordingInProgress);
        }
        if is_blank(&self.draft.text) && self.draft.staged.is_none() {
            return Err(SessionError::EmptyMessage);
        }

        let draft = std::mem::take(&mut self.draft);
        let body = if is_blank(&draft.text) {
            String::new()
        } else {
            draft.text
        };
        let message = Message {
            id: self.next_id(),
            sender_id: self.user.id.clone(),
            receiver_id: receiver.to_string(),
            body,
            created_at: Utc::now(),
            read: false,
            attachment: draft.staged,
        };

        debug!("Sent message {} to {}", message.id, receiver);
        self.conversations
            .entry(receiver)
            .or_default()
            .push(message.clone());
        Ok(message)
    }

    /// Append a message the contact sent us
    pub fn receive_message(
        &mut self,
        from: &ContactId,
        body: &str,
        attachment: Option<Attachment>,
    ) -> SessionResult<Message> {
        if !self.contacts.iter().any(|c| &c.id == from) {
            return Err(SessionError::NotFound(from.clone()));
        }
        if is_blank(body) && attachment.is_none() {
            return Err(SessionError::EmptyMessage);
        }

        self.ensure_conversation(from);
        let message = Message {
            id: self.next_id(),
            sender_id: from.to_string(),
            receiver_id: self.user.id.clone(),
            body: body.to_string(),
            created_at: Utc::now(),
            // Already on screen when the conversation is open
            read: self.active.as_ref() == Some(from),
            attachment,
        };

        debug!("Received message {} from {}", message.id, from);
        self.conversations
            .entry(from.clone())
            .or_default()
            .push(message.clone());
        Ok(message)
    }

    pub fn update_presence(&mut self, id: &ContactId, presence: Presence) -> SessionResult<()> {
        let contact = self
            .contacts
            .iter_mut()
            .find(|c| &c.id == id)
            .ok_or_else(|| SessionError::NotFound(id.clone()))?;
        if contact.presence != presence {
            debug!("Presence of {} changed to {}", id, presence);
            contact.presence = presence;
        }
        Ok(())
    }

    pub fn view(&self) -> SessionView {
        let active_contact = self
            .active
            .as_ref()
            .and_then(|id| self.contacts.iter().find(|c| &c.id == id))
            .cloned();
        let messages = self
            .active
            .as_ref()
            .and_then(|id| self.conversations.get(id))
            .cloned()
            .unwrap_or_default();
        let recording = self.recording.as_ref().map(|rec| {
            let secs = rec.elapsed();
            RecordingView {
                started_at: rec.started_at,
                elapsed_secs: secs,
                elapsed: format_duration(secs),
            }
        });

        SessionView {
            user: self.user.clone(),
            active_contact,
            messages,
            draft: DraftView {
                text: self.draft.text.clone(),
                staged: self.draft.staged.clone(),
            },
            recording,
            contacts: self.contact_previews(),
        }
    }

    fn contact_previews(&self) -> Vec<ContactPreview> {
        self.contacts
            .iter()
            .map(|contact| {
                let (last_message, last_activity, unread) =
                    match self.conversations.get(&contact.id) {
                        Some(messages) => {
                            let last = messages.last();
                            let unread = messages
                                .iter()
                                .filter(|m| !m.read && m.receiver_id == self.user.id)
                                .count();
                            (last.map(Message::preview), last.map(|m| m.created_at), unread)
                        }
                        // Not opened yet, so summarize the directory's history as is
                        None => {
                            let history = self.directory.history(&contact.id);
                            let last = history.last();
                            let unread = history
                                .iter()
                                .filter(|e| !e.read && e.direction == Direction::Incoming)
                                .count();
                            (last.map(HistoryEntry::preview), last.map(|e| e.created_at), unread)
                        }
                    };
                ContactPreview {
                    contact: contact.clone(),
                    active: self.active.as_ref() == Some(&contact.id),
                    last_message,
                    last_activity,
                    unread,
                }
            })
            .collect()
    }

    /// Create the conversation from directory history on first use
    fn ensure_conversation(&mut self, id: &ContactId) {
        if self.conversations.contains_key(id) {
            return;
        }
        let history = self.directory.history(id);
        let mut messages = Vec::with_capacity(history.len());
        for entry in history {
            let message = self.message_from_history(id, entry);
            messages.push(message);
        }
        debug!(
            "Opened conversation with {} ({} earlier messages)",
            id,
            messages.len()
        );
        self.conversations.insert(id.clone(), messages);
    }

    fn message_from_history(&mut self, contact: &ContactId, entry: HistoryEntry) -> Message {
        let (sender_id, receiver_id) = match entry.direction {
            Direction::Incoming => (contact.to_string(), self.user.id.clone()),
            Direction::Outgoing => (self.user.id.clone(), contact.to_string()),
        };
        Message {
            id: self.next_id(),
            sender_id,
            receiver_id,
            body: entry.body,
            created_at: entry.created_at,
            read: entry.read,
            attachment: entry.attachment,
        }
    }

    fn next_id(&mut self) -> MessageId {
        let id = MessageId(self.next_message_id);
        self.next_message_id += 1;
        id
    }

    /// Stop the ticker and throw away the capture. Returns whether one was running.
    fn abort_recording(&mut self) -> bool {
        match self.recording.take() {
            Some(recording) => {
                recording.ticker.cancel();
                drop(recording.capture);
                true
            }
            None => false,
        }
    }

    fn teardown(&mut self) {
        if self.abort_recording() {
            debug!("Recording cancelled during teardown");
        }
        self.draft = Draft::default();
        self.active = None;
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        self.teardown();
    }
}
