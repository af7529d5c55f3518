//! Recording volume doubles for unit tests.
//!
//! # Why mocks?
//!
//! The real volume adapters talk to the OS audio service, which needs a
//! device and changes the volume of the test machine.  These doubles keep
//! everything in memory:
//!
//! - [`MockVolumeSource`] lets a test push [`VolumeInput`]s by hand.
//! - [`MockVolumeController`] records every `set_level` call together with
//!   the Tokio clock reading, so paused-time tests can assert exactly when
//!   the midpoint reset happened.
//!
//! # Usage in tests
//!
//! ```ignore
//! let source = Arc::new(MockVolumeSource::new());
//! let controller = Arc::new(MockVolumeController::new(15, 3));
//!
//! // ... subscribe a detector ...
//! source.inject(VolumeInput::Level(8));
//!
//! let sets = controller.sets.lock().unwrap();
//! assert_eq!(sets.last().map(|s| s.0), Some(7));
//! ```

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Mutex;

use tokio::sync::mpsc;
use tokio::time::Instant;

use super::{VolumeController, VolumeError, VolumeInput, VolumeSource};

/// A source whose notifications are injected by the test.
#[derive(Default)]
pub struct MockVolumeSource {
    sender: Mutex<Option<mpsc::UnboundedSender<VolumeInput>>>,
    /// Number of successful `subscribe` calls.
    pub subscribe_calls: AtomicUsize,
    /// Number of `unsubscribe` calls.
    pub unsubscribe_calls: AtomicUsize,
    /// When `true`, `subscribe` returns [`VolumeError::Unavailable`].
    pub should_fail: AtomicBool,
}

impl MockVolumeSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// A source whose `subscribe` always fails.
    pub fn failing() -> Self {
        let source = Self::default();
        source.should_fail.store(true, Ordering::SeqCst);
        source
    }

    /// Pushes `input` to the current subscriber.  Returns `false` when nobody
    /// is subscribed.
    pub fn inject(&self, input: VolumeInput) -> bool {
        match self.sender.lock().unwrap().as_ref() {
            Some(tx) => tx.send(input).is_ok(),
            None => false,
        }
    }

    pub fn is_subscribed(&self) -> bool {
        self.sender.lock().unwrap().is_some()
    }
}

impl VolumeSource for MockVolumeSource {
    fn subscribe(&self) -> Result<mpsc::UnboundedReceiver<VolumeInput>, VolumeError> {
        if self.should_fail.load(Ordering::SeqCst) {
            return Err(VolumeError::Unavailable("mock failure".into()));
        }
        let (tx, rx) = mpsc::unbounded_channel();
        *self.sender.lock().unwrap() = Some(tx);
        self.subscribe_calls.fetch_add(1, Ordering::SeqCst);
        Ok(rx)
    }

    fn unsubscribe(&self) {
        self.sender.lock().unwrap().take();
        self.unsubscribe_calls.fetch_add(1, Ordering::SeqCst);
    }
}

/// A controller that records every level it is asked to set.
pub struct MockVolumeController {
    max: u32,
    level: AtomicU32,
    /// Every `(level, when)` passed to `set_level`, in call order.
    pub sets: Mutex<Vec<(u32, Instant)>>,
}

impl MockVolumeController {
    pub fn new(max: u32, initial: u32) -> Self {
        Self {
            max,
            level: AtomicU32::new(initial),
            sets: Mutex::new(Vec::new()),
        }
    }

    /// The levels passed to `set_level`, without timestamps.
    pub fn set_levels(&self) -> Vec<u32> {
        self.sets.lock().unwrap().iter().map(|(l, _)| *l).collect()
    }
}

impl VolumeController for MockVolumeController {
    fn max_level(&self) -> u32 {
        self.max
    }

    fn current_level(&self) -> u32 {
        self.level.load(Ordering::SeqCst)
    }

    fn set_level(&self, level: u32) -> Result<(), VolumeError> {
        if level > self.max {
            return Err(VolumeError::LevelOutOfRange {
                level,
                max: self.max,
            });
        }
        self.level.store(level, Ordering::SeqCst);
        self.sets.lock().unwrap().push((level, Instant::now()));
        Ok(())
    }
}
