// Re-export needed modules for testing
pub mod directory;
pub mod error;
pub mod media;
pub mod models;
pub mod session;

// Re-export main types for convenience
pub use error::{SessionError, SessionResult};
pub use models::*;
pub use session::{Collaborators, SessionManager, SessionView};

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_contact_presence() {
        let online_contact = Contact::new("user1", "Online User", Presence::Online);
        let mut offline_contact = Contact::new("user2", "Offline User", Presence::Offline);
        offline_contact.avatar = Some("https://cdn.example/u2.png".to_string());

        assert_eq!(online_contact.id.as_str(), "user1");
        assert_eq!(offline_contact.name, "Offline User");
        assert_eq!(offline_contact.avatar.as_deref(), Some("https://cdn.example/u2.png"));

        match online_contact.presence {
            Presence::Online => (),
            _ => panic!("Expected Online presence"),
        }

        match offline_contact.presence {
            Presence::Offline => (),
            _ => panic!("Expected Offline presence"),
        }
    }

    #[test]
    fn test_message_with_voice_attachment() {
        let msg = Message {
            id: MessageId(3),
            sender_id: "me".to_string(),
            receiver_id: "1".to_string(),
            body: String::new(),
            created_at: Utc::now(),
            read: true,
            attachment: Some(Attachment::audio(ContentRef::new("capture://audio/demo"), 34)),
        };

        assert_eq!(msg.id, MessageId(3));
        assert!(msg.body.is_empty());
        let attachment = msg.attachment.as_ref().unwrap();
        assert_eq!(attachment.kind, MediaKind::Audio);
        assert_eq!(attachment.duration_label().as_deref(), Some("0:34"));
    }

    #[test]
    fn test_long_message_body() {
        let long_content = "A".repeat(10000);
        let msg = Message {
            id: MessageId(1),
            sender_id: "sender1".to_string(),
            receiver_id: "recipient1".to_string(),
            body: long_content,
            created_at: Utc::now(),
            read: false,
            attachment: None,
        };

        assert_eq!(msg.body.len(), 10000);
        assert_eq!(msg.preview().len(), 10000);
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            SessionError::NotFound(ContactId::new("42")).to_string(),
            "Contact not found: 42"
        );
        assert_eq!(
            SessionError::AccessDenied(MediaKind::Audio).to_string(),
            "Access to audio capture was denied"
        );
        assert_eq!(
            SessionError::RecordingInProgress.to_string(),
            "Stop the recording before sending"
        );
    }
}
