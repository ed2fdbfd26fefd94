// Common test utilities for integration tests
#![allow(dead_code)]

use std::io::Write;
use std::sync::Once;

use log::LevelFilter;
use tempfile::NamedTempFile;

use lounge_chat::{
    directory::{HistoryEntry, StaticDirectory},
    media::{FsSourceResolver, ManualTicker, SimulatedCapture},
    Collaborators, Contact, ContactId, Presence, SessionManager, UserIdentity,
};

pub const ME: &str = "me-123";

// Initialize logging once
static INIT_LOGGER: Once = Once::new();

/// Set up the logger for the tests
pub fn setup_logging() {
    INIT_LOGGER.call_once(|| {
        let _ = env_logger::Builder::new()
            .filter_level(LevelFilter::Debug)
            .is_test(true)
            .try_init();
    });
}

/// A session with simulated time and a simulated microphone
pub struct TestSession {
    pub session: SessionManager,
    pub ticker: ManualTicker,
}

/// Alice has two unread messages waiting; Bob has no history
pub fn directory() -> StaticDirectory {
    let earlier = chrono::Utc::now() - chrono::Duration::minutes(10);
    StaticDirectory::new()
        .with_contact(Contact::new("alice", "Alice", Presence::Online))
        .with_contact(Contact::new("bob", "Bob", Presence::Offline))
        .with_history(
            "alice",
            vec![
                HistoryEntry::incoming("Seat open at table 4?", earlier),
                HistoryEntry::outgoing("On my way", earlier + chrono::Duration::minutes(1))
                    .read(),
                HistoryEntry::incoming("Bring chips", earlier + chrono::Duration::minutes(2)),
            ],
        )
}

pub fn setup_session_with(capture: SimulatedCapture) -> TestSession {
    setup_logging();
    let ticker = ManualTicker::new();
    let session = SessionManager::sign_in(
        UserIdentity::new(ME, "Tester"),
        Collaborators {
            directory: Box::new(directory()),
            capture: Box::new(capture),
            resolver: Box::new(FsSourceResolver),
            ticker: Box::new(ticker.clone()),
        },
    )
    .expect("sign in");
    TestSession { session, ticker }
}

pub fn setup_session() -> TestSession {
    setup_session_with(SimulatedCapture::granting())
}

pub fn alice() -> ContactId {
    ContactId::new("alice")
}

pub fn bob() -> ContactId {
    ContactId::new("bob")
}

/// A readable file that can be attached as an image
pub fn image_file() -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".png")
        .tempfile()
        .expect("temp image");
    file.write_all(b"\x89PNG\r\n\x1a\n").expect("write image");
    file
}
