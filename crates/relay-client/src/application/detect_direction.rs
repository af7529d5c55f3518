//! DirectionDetector: turns volume notifications into direction events.
//!
//! The detector subscribes to a [`VolumeSource`] and runs one Tokio task per
//! subscription.  Depending on the [`DetectionStrategy`] it either compares
//! consecutive absolute levels or reads key-down events directly.
//!
//! # Why reset the volume? (for beginners)
//!
//! A phone's volume stops at 0 and at its maximum.  Once the presenter has
//! pressed "up" enough times the level no longer changes and no more
//! notifications arrive.  To keep both buttons usable the detector parks the
//! level in the middle of the range:
//!
//! - once when the subscription starts, and
//! - again after every burst of presses, once the volume has been quiet for
//!   the configured period (500 ms by default).
//!
//! Each new press restarts the quiet period, so a burst of presses causes a
//! single reset.  The reset itself changes the volume, and the platform echoes
//! that change back as a notification; the detector swallows the echo so it
//! never turns into a slide command.

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use relay_core::{DirectionEvent, LevelTracker, VolumeSample};
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::{debug, info, warn};

use crate::infrastructure::volume::{
    midpoint, KeyAction, VolumeController, VolumeError, VolumeInput, VolumeKey, VolumeSource,
};

/// How direction is derived from volume notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DetectionStrategy {
    /// Compare consecutive absolute levels, then reset to the midpoint after
    /// a quiet period.
    #[default]
    LevelDelta,
    /// Map volume-up/down key-down events straight to a direction.
    KeyPress,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown detection strategy `{0}` (expected `level` or `keys`)")]
pub struct UnknownStrategy(pub String);

impl FromStr for DetectionStrategy {
    type Err = UnknownStrategy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "level" => Ok(Self::LevelDelta),
            "keys" => Ok(Self::KeyPress),
            other => Err(UnknownStrategy(other.to_string())),
        }
    }
}

impl fmt::Display for DetectionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LevelDelta => f.write_str("level"),
            Self::KeyPress => f.write_str("keys"),
        }
    }
}

/// Tuning for a [`DirectionDetector`].
#[derive(Debug, Clone)]
pub struct DetectorOptions {
    pub strategy: DetectionStrategy,
    /// How long the volume must stay untouched before the midpoint reset.
    pub quiet_period: Duration,
    /// Put the device level back to where it was when the subscription ends.
    pub restore_level_on_stop: bool,
}

impl Default for DetectorOptions {
    fn default() -> Self {
        Self {
            strategy: DetectionStrategy::LevelDelta,
            quiet_period: Duration::from_millis(500),
            restore_level_on_stop: true,
        }
    }
}

/// Creates detector subscriptions over one volume source/controller pair.
pub struct DirectionDetector {
    source: Arc<dyn VolumeSource>,
    controller: Arc<dyn VolumeController>,
    options: DetectorOptions,
}

impl DirectionDetector {
    pub fn new(
        source: Arc<dyn VolumeSource>,
        controller: Arc<dyn VolumeController>,
        options: DetectorOptions,
    ) -> Self {
        Self {
            source,
            controller,
            options,
        }
    }

    pub fn options(&self) -> &DetectorOptions {
        &self.options
    }

    /// Subscribes to the volume source and starts the detection task on `handle`.
    ///
    /// Sets the device level to the midpoint before the task starts.  The
    /// returned receiver yields one [`DirectionEvent`] per detected press, in
    /// order; it ends when the subscription is dropped or unsubscribed.
    pub fn subscribe(
        &self,
        handle: &Handle,
    ) -> Result<(DetectorSubscription, mpsc::UnboundedReceiver<DirectionEvent>), VolumeError>
    {
        let inputs = self.source.subscribe()?;

        let original_level = self.controller.current_level();
        let mid = midpoint(self.controller.max_level());
        if let Err(e) = self.controller.set_level(mid) {
            warn!("could not park volume at midpoint {mid}: {e}");
        }

        let gate = Arc::new(Mutex::new(true));
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let task = handle.spawn(run_detector(
            inputs,
            events_tx,
            Arc::clone(&self.controller),
            self.options.clone(),
            mid,
            Arc::clone(&gate),
        ));

        info!(
            strategy = %self.options.strategy,
            original_level,
            mid,
            "volume detector subscribed"
        );

        let subscription = DetectorSubscription {
            task: Some(task),
            source: Arc::clone(&self.source),
            controller: Arc::clone(&self.controller),
            restore_level: self
                .options
                .restore_level_on_stop
                .then_some(original_level),
            gate,
        };
        Ok((subscription, events_rx))
    }
}

/// A live detector subscription.  Dropping it unsubscribes.
pub struct DetectorSubscription {
    task: Option<JoinHandle<()>>,
    source: Arc<dyn VolumeSource>,
    controller: Arc<dyn VolumeController>,
    restore_level: Option<u32>,
    /// `true` while the detection task may still touch the controller.
    gate: Arc<Mutex<bool>>,
}

impl DetectorSubscription {
    pub fn is_active(&self) -> bool {
        self.task.is_some()
    }

    /// Stops the detection task, cancels a pending midpoint reset, releases
    /// the volume source and optionally restores the original level.
    ///
    /// Calling it again does nothing.
    pub fn unsubscribe(&mut self) {
        let Some(task) = self.task.take() else {
            return;
        };

        {
            let mut active = self.gate.lock().unwrap_or_else(|e| e.into_inner());
            *active = false;
        }
        task.abort();
        self.source.unsubscribe();

        if let Some(level) = self.restore_level {
            if let Err(e) = self.controller.set_level(level) {
                warn!("could not restore volume level {level}: {e}");
            }
        }
        info!("volume detector unsubscribed");
    }
}

impl Drop for DetectorSubscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

fn key_direction(key: VolumeKey) -> DirectionEvent {
    match key {
        VolumeKey::Up => DirectionEvent::Increase,
        VolumeKey::Down => DirectionEvent::Decrease,
    }
}

async fn run_detector(
    mut inputs: mpsc::UnboundedReceiver<VolumeInput>,
    events: mpsc::UnboundedSender<DirectionEvent>,
    controller: Arc<dyn VolumeController>,
    options: DetectorOptions,
    mid: u32,
    gate: Arc<Mutex<bool>>,
) {
    let mut tracker = LevelTracker::new();
    // Level we set ourselves and expect to hear back once.
    let mut pending_echo: Option<u32> = None;

    let reset = time::sleep(options.quiet_period);
    tokio::pin!(reset);
    let mut reset_armed = false;

    loop {
        tokio::select! {
            input = inputs.recv() => {
                let Some(input) = input else {
                    debug!("volume source closed");
                    break;
                };

                let direction = match (options.strategy, input) {
                    (DetectionStrategy::LevelDelta, VolumeInput::Level(level)) => {
                        // Only the very next sample can be the echo; a
                        // controller that does not echo leaves the tracker
                        // rebased at `mid` for the user's sample instead.
                        if pending_echo.take() == Some(level) {
                            tracker.rebase(level);
                            continue;
                        }
                        let direction = tracker.observe(VolumeSample::now(level));
                        if direction.is_some() {
                            reset.as_mut().reset(Instant::now() + options.quiet_period);
                            reset_armed = true;
                        }
                        direction
                    }
                    (
                        DetectionStrategy::KeyPress,
                        VolumeInput::Key { key, action: KeyAction::Down },
                    ) => Some(key_direction(key)),
                    _ => None,
                };

                if let Some(direction) = direction {
                    debug!(?direction, "direction detected");
                    if events.send(direction).is_err() {
                        break;
                    }
                }
            }
            () = &mut reset, if reset_armed => {
                reset_armed = false;
                let active = gate.lock().unwrap_or_else(|e| e.into_inner());
                if !*active {
                    break;
                }
                tracker.rebase(mid);
                if controller.current_level() != mid {
                    pending_echo = Some(mid);
                }
                match controller.set_level(mid) {
                    Ok(()) => debug!(mid, "volume reset to midpoint"),
                    Err(e) => {
                        pending_echo = None;
                        warn!("midpoint reset failed: {e}");
                    }
                }
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::volume::mock::{MockVolumeController, MockVolumeSource};
    use crate::infrastructure::volume::software::SoftwareVolume;

    fn detector(
        source: &Arc<MockVolumeSource>,
        controller: &Arc<MockVolumeController>,
        options: DetectorOptions,
    ) -> DirectionDetector {
        DirectionDetector::new(
            Arc::clone(source) as Arc<dyn VolumeSource>,
            Arc::clone(controller) as Arc<dyn VolumeController>,
            options,
        )
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<DirectionEvent>) -> Vec<DirectionEvent> {
        let mut out = Vec::new();
        while let Ok(event) = rx.try_recv() {
            out.push(event);
        }
        out
    }

    /// Lets the detection task process everything injected so far.
    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[test]
    fn test_strategy_parses_config_names() {
        assert_eq!(
            "level".parse::<DetectionStrategy>(),
            Ok(DetectionStrategy::LevelDelta)
        );
        assert_eq!(
            " Keys ".parse::<DetectionStrategy>(),
            Ok(DetectionStrategy::KeyPress)
        );
        assert_eq!(
            "loudness".parse::<DetectionStrategy>(),
            Err(UnknownStrategy("loudness".into()))
        );
    }

    #[test]
    fn test_default_options_use_level_delta_and_500ms() {
        let options = DetectorOptions::default();
        assert_eq!(options.strategy, DetectionStrategy::LevelDelta);
        assert_eq!(options.quiet_period, Duration::from_millis(500));
        assert!(options.restore_level_on_stop);
    }

    #[tokio::test(start_paused = true)]
    async fn test_subscribe_parks_volume_at_midpoint() {
        // Arrange
        let source = Arc::new(MockVolumeSource::new());
        let controller = Arc::new(MockVolumeController::new(15, 3));

        // Act
        let (_sub, _events) = detector(&source, &controller, DetectorOptions::default())
            .subscribe(&Handle::current())
            .unwrap();

        // Assert
        assert_eq!(controller.set_levels(), vec![7]);
        assert!(source.is_subscribed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_sample_is_baseline_only() {
        // Arrange
        let source = Arc::new(MockVolumeSource::new());
        let controller = Arc::new(MockVolumeController::new(15, 7));
        let (_sub, mut events) = detector(&source, &controller, DetectorOptions::default())
            .subscribe(&Handle::current())
            .unwrap();

        // Act
        source.inject(VolumeInput::Level(12));
        settle().await;

        // Assert
        assert!(drain(&mut events).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_level_changes_emit_signed_directions() {
        // Arrange
        let source = Arc::new(MockVolumeSource::new());
        let controller = Arc::new(MockVolumeController::new(15, 7));
        let (_sub, mut events) = detector(&source, &controller, DetectorOptions::default())
            .subscribe(&Handle::current())
            .unwrap();

        // Act
        for level in [7, 8, 8, 6, 9] {
            source.inject(VolumeInput::Level(level));
        }
        settle().await;

        // Assert – the repeated 8 produces nothing
        assert_eq!(
            drain(&mut events),
            vec![
                DirectionEvent::Increase,
                DirectionEvent::Decrease,
                DirectionEvent::Increase
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_of_samples_schedules_one_reset_after_quiet_period() {
        // Arrange
        let source = Arc::new(MockVolumeSource::new());
        let controller = Arc::new(MockVolumeController::new(15, 3));
        let start = Instant::now();
        let (_sub, mut events) = detector(&source, &controller, DetectorOptions::default())
            .subscribe(&Handle::current())
            .unwrap();

        // Act – samples at t=0, 100, 200
        source.inject(VolumeInput::Level(7));
        time::sleep(Duration::from_millis(100)).await;
        source.inject(VolumeInput::Level(8));
        time::sleep(Duration::from_millis(100)).await;
        source.inject(VolumeInput::Level(9));
        time::sleep(Duration::from_millis(1000)).await;

        // Assert – one subscription park plus exactly one reset at t=700
        let sets = controller.sets.lock().unwrap().clone();
        assert_eq!(sets.len(), 2, "sets: {sets:?}");
        assert_eq!(sets[1].0, 7);
        assert_eq!(sets[1].1.duration_since(start), Duration::from_millis(700));
        assert_eq!(
            drain(&mut events),
            vec![DirectionEvent::Increase, DirectionEvent::Increase]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_sample_before_reset_fires_reschedules_it() {
        // Arrange
        let source = Arc::new(MockVolumeSource::new());
        let controller = Arc::new(MockVolumeController::new(15, 3));
        let start = Instant::now();
        let (_sub, _events) = detector(&source, &controller, DetectorOptions::default())
            .subscribe(&Handle::current())
            .unwrap();

        // Act – samples at t=0, 100, 200, then 600 before the t=700 reset
        source.inject(VolumeInput::Level(7));
        time::sleep(Duration::from_millis(100)).await;
        source.inject(VolumeInput::Level(8));
        time::sleep(Duration::from_millis(100)).await;
        source.inject(VolumeInput::Level(9));
        time::sleep(Duration::from_millis(400)).await;
        source.inject(VolumeInput::Level(10));
        time::sleep(Duration::from_millis(1000)).await;

        // Assert – the single reset moved to t=1100
        let sets = controller.sets.lock().unwrap().clone();
        assert_eq!(sets.len(), 2, "sets: {sets:?}");
        assert_eq!(sets[1].1.duration_since(start), Duration::from_millis(1100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_midpoint_echo_does_not_emit_direction() {
        // Arrange – the software volume echoes every level change
        let volume = Arc::new(SoftwareVolume::new(15, 7));
        let detector = DirectionDetector::new(
            Arc::clone(&volume) as Arc<dyn VolumeSource>,
            Arc::clone(&volume) as Arc<dyn VolumeController>,
            DetectorOptions::default(),
        );
        let (_sub, mut events) = detector.subscribe(&Handle::current()).unwrap();

        // Act – baseline, two presses up, then wait for the reset echo
        volume.set_level(8).unwrap();
        volume.press(VolumeKey::Up);
        volume.press(VolumeKey::Up);
        time::sleep(Duration::from_millis(600)).await;
        settle().await;

        // Assert – the reset back to 7 is not reported as a Decrease
        assert_eq!(volume.current_level(), 7);
        assert_eq!(
            drain(&mut events),
            vec![DirectionEvent::Increase, DirectionEvent::Increase]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_controller_reset_does_not_swallow_later_midpoint_sample() {
        // Arrange – the mock controller never echoes its own changes
        let source = Arc::new(MockVolumeSource::new());
        let controller = Arc::new(MockVolumeController::new(15, 7));
        let (_sub, mut events) = detector(&source, &controller, DetectorOptions::default())
            .subscribe(&Handle::current())
            .unwrap();
        source.inject(VolumeInput::Level(7));
        controller.set_level(8).unwrap();
        source.inject(VolumeInput::Level(8));
        time::sleep(Duration::from_millis(600)).await;

        // Act – user goes up then back down to the midpoint
        source.inject(VolumeInput::Level(8));
        source.inject(VolumeInput::Level(7));
        settle().await;

        // Assert
        assert_eq!(controller.set_levels(), vec![7, 8, 7]);
        assert_eq!(
            drain(&mut events),
            vec![
                DirectionEvent::Increase,
                DirectionEvent::Increase,
                DirectionEvent::Decrease
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_key_strategy_uses_key_down_only() {
        // Arrange
        let source = Arc::new(MockVolumeSource::new());
        let controller = Arc::new(MockVolumeController::new(15, 7));
        let options = DetectorOptions {
            strategy: DetectionStrategy::KeyPress,
            ..DetectorOptions::default()
        };
        let (_sub, mut events) = detector(&source, &controller, options)
            .subscribe(&Handle::current())
            .unwrap();

        // Act
        source.inject(VolumeInput::Key {
            key: VolumeKey::Down,
            action: KeyAction::Down,
        });
        source.inject(VolumeInput::Key {
            key: VolumeKey::Down,
            action: KeyAction::Up,
        });
        source.inject(VolumeInput::Level(3));
        source.inject(VolumeInput::Key {
            key: VolumeKey::Up,
            action: KeyAction::Down,
        });
        settle().await;

        // Assert
        assert_eq!(
            drain(&mut events),
            vec![DirectionEvent::Decrease, DirectionEvent::Increase]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_unsubscribe_cancels_pending_reset_and_restores_level() {
        // Arrange
        let source = Arc::new(MockVolumeSource::new());
        let controller = Arc::new(MockVolumeController::new(15, 3));
        let (mut sub, _events) = detector(&source, &controller, DetectorOptions::default())
            .subscribe(&Handle::current())
            .unwrap();
        source.inject(VolumeInput::Level(7));
        source.inject(VolumeInput::Level(8));
        settle().await;

        // Act – unsubscribe while the reset is pending
        sub.unsubscribe();
        time::sleep(Duration::from_millis(2000)).await;

        // Assert – park at 7, restore to 3, and no midpoint reset afterwards
        assert_eq!(controller.set_levels(), vec![7, 3]);
        assert!(!source.is_subscribed());
        assert!(!sub.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unsubscribe_is_idempotent() {
        // Arrange
        let source = Arc::new(MockVolumeSource::new());
        let controller = Arc::new(MockVolumeController::new(15, 3));
        let (mut sub, _events) = detector(&source, &controller, DetectorOptions::default())
            .subscribe(&Handle::current())
            .unwrap();

        // Act
        sub.unsubscribe();
        sub.unsubscribe();
        drop(sub);

        // Assert
        assert_eq!(source.unsubscribe_calls.load(std::sync::atomic::Ordering::SeqCst), 1);
        assert_eq!(controller.set_levels(), vec![7, 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restore_disabled_leaves_level_alone() {
        // Arrange
        let source = Arc::new(MockVolumeSource::new());
        let controller = Arc::new(MockVolumeController::new(15, 3));
        let options = DetectorOptions {
            restore_level_on_stop: false,
            ..DetectorOptions::default()
        };
        let (mut sub, _events) = detector(&source, &controller, options)
            .subscribe(&Handle::current())
            .unwrap();

        // Act
        sub.unsubscribe();

        // Assert
        assert_eq!(controller.set_levels(), vec![7]);
    }

    #[tokio::test]
    async fn test_subscribe_propagates_source_failure() {
        // Arrange
        let source = Arc::new(MockVolumeSource::failing());
        let controller = Arc::new(MockVolumeController::new(15, 3));

        // Act
        let result = detector(&source, &controller, DetectorOptions::default())
            .subscribe(&Handle::current());

        // Assert – nothing was touched
        assert!(matches!(result, Err(VolumeError::Unavailable(_))));
        assert!(controller.set_levels().is_empty());
    }
}
