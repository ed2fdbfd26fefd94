// Media capabilities used by the session: microphone capture, image source
// resolution and the once-per-second recording ticker.

use log::{debug, warn};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use uuid::Uuid;

use crate::error::{SessionError, SessionResult};
use crate::models::{ContentRef, MediaKind};

/// Device access for capturing media (the microphone, in practice)
pub trait MediaCapture: Send {
    /// Ask for access to a capture device. Denial is `SessionError::AccessDenied`.
    fn request_access(&mut self, kind: MediaKind) -> SessionResult<Box<dyn CaptureCapability>>;
}

/// Granted access to a capture device
pub trait CaptureCapability: Send {
    fn start(self: Box<Self>) -> Box<dyn CaptureHandle>;
}

/// A running capture. Dropping it without calling `stop` discards what was captured.
pub trait CaptureHandle: Send {
    fn stop(self: Box<Self>) -> ContentRef;
}

/// Capture device with no hardware behind it.
///
/// Captures are named `capture://<kind>/<uuid>` so they can be told apart in logs.
#[derive(Debug, Clone)]
pub struct SimulatedCapture {
    granted: bool,
}

impl SimulatedCapture {
    pub fn granting() -> Self {
        SimulatedCapture { granted: true }
    }

    pub fn denying() -> Self {
        SimulatedCapture { granted: false }
    }
}

impl MediaCapture for SimulatedCapture {
    fn request_access(&mut self, kind: MediaKind) -> SessionResult<Box<dyn CaptureCapability>> {
        if !self.granted {
            warn!("Simulated {} capture access denied", kind);
            return Err(SessionError::AccessDenied(kind));
        }
        Ok(Box::new(SimulatedDevice { kind }))
    }
}

struct SimulatedDevice {
    kind: MediaKind,
}

impl CaptureCapability for SimulatedDevice {
    fn start(self: Box<Self>) -> Box<dyn CaptureHandle> {
        let key = Uuid::new_v4();
        debug!("Simulated {} capture {} started", self.kind, key);
        Box::new(SimulatedRecording {
            kind: self.kind,
            key,
            stopped: false,
        })
    }
}

struct SimulatedRecording {
    kind: MediaKind,
    key: Uuid,
    stopped: bool,
}

impl CaptureHandle for SimulatedRecording {
    fn stop(mut self: Box<Self>) -> ContentRef {
        self.stopped = true;
        debug!("Simulated {} capture {} stopped", self.kind, self.key);
        ContentRef::new(format!("capture://{}/{}", self.kind, self.key))
    }
}

impl Drop for SimulatedRecording {
    fn drop(&mut self) {
        if !self.stopped {
            debug!("Simulated {} capture {} discarded", self.kind, self.key);
        }
    }
}

/// Turns a user-supplied source (path, URL...) into a content reference
pub trait SourceResolver: Send {
    fn resolve(&self, kind: MediaKind, source: &str) -> SessionResult<ContentRef>;
}

/// Accepts http(s) URLs, `data:` URIs of the right media type and readable local files
#[derive(Debug, Clone, Default)]
pub struct FsSourceResolver;

impl SourceResolver for FsSourceResolver {
    fn resolve(&self, kind: MediaKind, source: &str) -> SessionResult<ContentRef> {
        let source = source.trim();
        if source.is_empty() {
            return Err(SessionError::InvalidSource("empty source".to_string()));
        }

        if source.starts_with("https://") || source.starts_with("http://") {
            return Ok(ContentRef::new(source));
        }

        if let Some(rest) = source.strip_prefix("data:") {
            let prefix = format!("{}/", kind);
            if rest.starts_with(&prefix) && rest.contains(',') {
                return Ok(ContentRef::new(source));
            }
            return Err(SessionError::InvalidSource(format!(
                "data URI is not {} content",
                kind
            )));
        }

        let path = Path::new(source.strip_prefix("file://").unwrap_or(source));
        match std::fs::metadata(path) {
            Ok(meta) if meta.is_file() => {
                // Metadata alone does not prove we may read it
                std::fs::File::open(path).map_err(|e| {
                    SessionError::InvalidSource(format!("{}: {}", path.display(), e))
                })?;
                Ok(ContentRef::new(path.display().to_string()))
            }
            Ok(_) => Err(SessionError::InvalidSource(format!(
                "{} is not a regular file",
                path.display()
            ))),
            Err(e) => Err(SessionError::InvalidSource(format!(
                "{}: {}",
                path.display(),
                e
            ))),
        }
    }
}

/// Cancels a running ticker when cancelled or dropped
pub struct TickGuard {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl TickGuard {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        TickGuard {
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn cancel(mut self) {
        self.fire();
    }

    fn fire(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for TickGuard {
    fn drop(&mut self) {
        self.fire();
    }
}

/// Source of the once-per-second recording tick.
///
/// Each tick adds one to the counter. The ticker only keeps a weak reference,
/// so a counter whose recording is gone is never touched again.
pub trait Ticker: Send {
    fn start(&self, counter: &Arc<AtomicU32>) -> TickGuard;
}

/// Ticker backed by a tokio interval task
#[derive(Debug, Clone)]
pub struct TokioTicker {
    handle: tokio::runtime::Handle,
}

impl TokioTicker {
    pub fn new(handle: tokio::runtime::Handle) -> Self {
        TokioTicker { handle }
    }

    /// Ticker on the runtime the caller is running in
    pub fn current() -> anyhow::Result<Self> {
        Ok(TokioTicker {
            handle: tokio::runtime::Handle::try_current()?,
        })
    }
}

impl Ticker for TokioTicker {
    fn start(&self, counter: &Arc<AtomicU32>) -> TickGuard {
        let counter = Arc::downgrade(counter);
        let task = self.handle.spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));
            // The first tick completes immediately
            interval.tick().await;
            loop {
                interval.tick().await;
                match counter.upgrade() {
                    Some(counter) => {
                        counter.fetch_add(1, Ordering::Relaxed);
                    }
                    None => break,
                }
            }
        });
        TickGuard::new(move || task.abort())
    }
}

struct ManualSlot {
    counter: Weak<AtomicU32>,
    live: Arc<AtomicBool>,
}

/// Ticker driven by hand, for simulated time.
///
/// Clones share the same set of timers, so a test can keep one clone and
/// hand the other to the session.
#[derive(Clone, Default)]
pub struct ManualTicker {
    slots: Arc<Mutex<Vec<ManualSlot>>>,
}

impl ManualTicker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver `seconds` ticks to every running timer
    pub fn advance(&self, seconds: u32) {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots.retain(|slot| slot.live.load(Ordering::SeqCst) && slot.counter.strong_count() > 0);
        for slot in slots.iter() {
            if let Some(counter) = slot.counter.upgrade() {
                counter.fetch_add(seconds, Ordering::Relaxed);
            }
        }
    }

    /// Number of timers that are still running
    pub fn active_timers(&self) -> usize {
        let slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots
            .iter()
            .filter(|slot| slot.live.load(Ordering::SeqCst) && slot.counter.strong_count() > 0)
            .count()
    }
}

impl Ticker for ManualTicker {
    fn start(&self, counter: &Arc<AtomicU32>) -> TickGuard {
        let live = Arc::new(AtomicBool::new(true));
        self.slots
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(ManualSlot {
                counter: Arc::downgrade(counter),
                live: live.clone(),
            });
        TickGuard::new(move || live.store(false, Ordering::SeqCst))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_simulated_capture_denied() {
        let mut capture = SimulatedCapture::denying();
        let err = capture.request_access(MediaKind::Audio).err();
        assert_eq!(err, Some(SessionError::AccessDenied(MediaKind::Audio)));
    }

    #[test]
    fn test_simulated_capture_yields_capture_ref() {
        let mut capture = SimulatedCapture::granting();
        let device = capture.request_access(MediaKind::Audio).unwrap();
        let content = device.start().stop();
        assert!(content.as_str().starts_with("capture://audio/"));
    }

    #[test]
    fn test_resolver_accepts_urls_and_data_uris() {
        let resolver = FsSourceResolver;
        assert!(resolver.resolve(MediaKind::Image, "https://cdn.example/a.png").is_ok());
        assert!(resolver
            .resolve(MediaKind::Image, "data:image/png;base64,iVBORw0KGgo=")
            .is_ok());
        assert!(matches!(
            resolver.resolve(MediaKind::Image, "data:audio/webm;base64,AAAA"),
            Err(SessionError::InvalidSource(_))
        ));
        assert!(matches!(
            resolver.resolve(MediaKind::Image, "   "),
            Err(SessionError::InvalidSource(_))
        ));
    }

    #[test]
    fn test_resolver_checks_files() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"\x89PNG").unwrap();
        let path = file.path().display().to_string();

        let resolver = FsSourceResolver;
        let content = resolver.resolve(MediaKind::Image, &path).unwrap();
        assert_eq!(content.as_str(), path);

        let with_scheme = format!("file://{}", path);
        assert!(resolver.resolve(MediaKind::Image, &with_scheme).is_ok());

        let dir = tempfile::tempdir().unwrap();
        let dir_path = dir.path().display().to_string();
        assert!(matches!(
            resolver.resolve(MediaKind::Image, &dir_path),
            Err(SessionError::InvalidSource(_))
        ));
        let missing = dir.path().join("missing.png").display().to_string();
        assert!(matches!(
            resolver.resolve(MediaKind::Image, &missing),
            Err(SessionError::InvalidSource(_))
        ));
    }

    #[test]
    fn test_manual_ticker_stops_after_cancel() {
        let ticker = ManualTicker::new();
        let counter = Arc::new(AtomicU32::new(0));
        let guard = ticker.start(&counter);

        ticker.advance(3);
        assert_eq!(counter.load(Ordering::Relaxed), 3);
        assert_eq!(ticker.active_timers(), 1);

        guard.cancel();
        ticker.advance(5);
        assert_eq!(counter.load(Ordering::Relaxed), 3);
        assert_eq!(ticker.active_timers(), 0);
    }

    #[test]
    fn test_manual_ticker_drops_released_counters() {
        let ticker = ManualTicker::new();
        let counter = Arc::new(AtomicU32::new(0));
        let _guard = ticker.start(&counter);
        drop(counter);
        assert_eq!(ticker.active_timers(), 0);
        ticker.advance(1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_ticker_counts_seconds() {
        let ticker = TokioTicker::current().unwrap();
        let counter = Arc::new(AtomicU32::new(0));
        let guard = ticker.start(&counter);

        // Let the task register its interval
        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_millis(3500)).await;
        assert_eq!(counter.load(Ordering::Relaxed), 3);

        guard.cancel();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(counter.load(Ordering::Relaxed), 3);
    }
}
