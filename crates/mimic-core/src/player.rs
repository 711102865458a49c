//! Playback engine: snapshot the repository and replay it on a dedicated
//! thread with the hybrid wait from [`crate::timing`].

use crate::events::{MacroEvent, SharedEventBus};
use crate::executor::ActionExecutor;
use crate::repository::SharedRepository;
use crate::timing::{self, wait_until};
use crate::{Action, MacroError, MacroResult};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Pause inserted between loop iterations (not after the last one).
pub const SETTLE_DELAY: Duration = Duration::from_millis(50);

/// Slowest accepted playback speed (100x slower than recorded).
pub const MIN_SPEED_MULTIPLIER: f64 = 0.01;

/// Per-run playback parameters, fixed once `play` is called.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Number of times the whole sequence is replayed (>= 1).
    pub loop_count: u32,
    /// Speed multiplier. 1.0 means real-time, 2.0 twice as fast.
    pub speed_multiplier: f64,
    /// Delay before the first action so the triggering click settles.
    pub start_delay_ms: u64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            loop_count: 1,
            speed_multiplier: 1.0,
            start_delay_ms: 100,
        }
    }
}

impl PlaybackConfig {
    pub fn validate(&self) -> MacroResult<()> {
        if self.loop_count == 0 {
            return Err(MacroError::Configuration("loop count must be at least 1".into()));
        }
        if !self.speed_multiplier.is_finite() || self.speed_multiplier < MIN_SPEED_MULTIPLIER {
            return Err(MacroError::Configuration(format!(
                "speed multiplier must be at least {MIN_SPEED_MULTIPLIER}, got {}",
                self.speed_multiplier
            )));
        }
        Ok(())
    }
}

/// State of the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayerState {
    Idle,
    Playing,
}

#[derive(Default)]
struct PlaybackFlags {
    playing: AtomicBool,
    stop_requested: AtomicBool,
    executed: AtomicU64,
}

/// Player: owns at most one playback thread at a time.
pub struct Player {
    repository: SharedRepository,
    executor: Arc<ActionExecutor>,
    bus: SharedEventBus,
    flags: Arc<PlaybackFlags>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl Player {
    pub fn new(
        repository: SharedRepository,
        executor: Arc<ActionExecutor>,
        bus: SharedEventBus,
    ) -> Self {
        Self {
            repository,
            executor,
            bus,
            flags: Arc::new(PlaybackFlags::default()),
            thread: Mutex::new(None),
        }
    }

    pub fn is_playing(&self) -> bool {
        self.flags.playing.load(Ordering::Acquire)
    }

    pub fn state(&self) -> PlayerState {
        if self.is_playing() {
            PlayerState::Playing
        } else {
            PlayerState::Idle
        }
    }

    /// Actions executed so far in the current (or last) run.
    pub fn executed_count(&self) -> u64 {
        self.flags.executed.load(Ordering::Relaxed)
    }

    pub fn executor(&self) -> &ActionExecutor {
        &self.executor
    }

    /// Start replaying the current sequence.
    ///
    /// Returns `Ok(false)` when a run is already in progress (no-op) and
    /// `EmptyState` when there is nothing to play. `PlaybackStarted` is
    /// published before this returns.
    pub fn play(&self, config: &PlaybackConfig) -> MacroResult<bool> {
        config.validate()?;

        if self.is_playing() {
            debug!("play ignored: already playing");
            return Ok(false);
        }
        if self.repository.is_empty() {
            return Err(MacroError::EmptyState("no actions to play".into()));
        }
        if self
            .flags
            .playing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Ok(false);
        }

        let actions = self.repository.snapshot();
        self.flags.stop_requested.store(false, Ordering::Release);
        self.flags.executed.store(0, Ordering::Relaxed);

        info!(
            actions = actions.len(),
            loops = config.loop_count,
            speed = config.speed_multiplier,
            "Playback started"
        );
        self.bus.publish(MacroEvent::PlaybackStarted);

        let mut slot = self.thread.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(previous) = slot.take() {
            // Already past its final flag store; this join is immediate.
            let _ = previous.join();
        }

        let run = PlaybackRun {
            actions,
            config: config.clone(),
            executor: self.executor.clone(),
            bus: self.bus.clone(),
            flags: self.flags.clone(),
        };
        let spawned = thread::Builder::new()
            .name("mimic-playback".into())
            .spawn(move || run.execute());

        match spawned {
            Ok(handle) => {
                *slot = Some(handle);
                Ok(true)
            }
            Err(e) => {
                self.flags.playing.store(false, Ordering::Release);
                self.bus.publish(MacroEvent::PlaybackStopped { executed: 0 });
                Err(MacroError::Io(e))
            }
        }
    }

    /// Request cooperative cancellation. The in-flight action completes.
    pub fn stop(&self) {
        if self.is_playing() {
            info!("Playback stop requested");
            self.flags.stop_requested.store(true, Ordering::Release);
        }
    }

    /// Join the playback thread, giving up after `timeout`.
    /// Returns true if no playback thread is left running.
    pub fn wait_for_completion(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut slot = self.thread.lock().unwrap_or_else(|e| e.into_inner());
        let Some(handle) = slot.take() else {
            return true;
        };

        while !handle.is_finished() {
            if Instant::now() >= deadline {
                warn!(?timeout, "playback thread still running after timeout");
                *slot = Some(handle);
                return false;
            }
            thread::sleep(Duration::from_millis(5));
        }
        let _ = handle.join();
        true
    }
}

/// Shift every offset so the first action happens at zero.
pub fn normalize(actions: &[Action]) -> Vec<Action> {
    let Some(first) = actions.first().map(|a| a.time_offset) else {
        return Vec::new();
    };
    actions
        .iter()
        .map(|a| Action {
            time_offset: a.time_offset.saturating_sub(first),
            input: a.input,
        })
        .collect()
}

/// Everything the playback thread owns for one run.
struct PlaybackRun {
    actions: Vec<Action>,
    config: PlaybackConfig,
    executor: Arc<ActionExecutor>,
    bus: SharedEventBus,
    flags: Arc<PlaybackFlags>,
}

impl PlaybackRun {
    fn cancelled(&self) -> bool {
        self.flags.stop_requested.load(Ordering::Acquire)
    }

    fn execute(self) {
        let _finish = FinishOnExit(&self);
        self.run();
    }

    fn run(&self) {
        self.executor.prepare_thread();

        let actions = normalize(&self.actions);
        if actions.is_empty() {
            return;
        }

        let start_delay = Duration::from_millis(self.config.start_delay_ms);
        if !start_delay.is_zero() {
            timing::delay(start_delay, &self.flags.stop_requested);
        }

        let loops = self.config.loop_count;
        let speed = self.config.speed_multiplier;
        let mut executed = 0u64;

        'loops: for iteration in 0..loops {
            if self.cancelled() {
                break;
            }
            debug!(iteration = iteration + 1, loops, "Playback iteration");
            let clock = Instant::now();

            for action in &actions {
                if self.cancelled() {
                    break 'loops;
                }
                let target = timing::scale(action.time_offset, speed);
                if !wait_until(clock, target, &self.flags.stop_requested) {
                    break 'loops;
                }

                self.executor.execute(action);
                executed += 1;
                self.flags.executed.store(executed, Ordering::Relaxed);
                self.bus.publish(MacroEvent::ActionExecuted { executed });
            }

            if iteration + 1 < loops && !self.cancelled() {
                thread::sleep(SETTLE_DELAY);
            }
        }
    }

    fn finish(&self) {
        let executed = self.flags.executed.load(Ordering::Relaxed);
        // Clear the stop request before releasing `playing`: once `playing`
        // is false a new run may start and its stop must not be lost.
        self.flags.stop_requested.store(false, Ordering::Release);
        self.flags.playing.store(false, Ordering::Release);
        info!(
            executed,
            failures = self.executor.failure_count(),
            "Playback stopped"
        );
        self.bus.publish(MacroEvent::PlaybackStopped { executed });
    }
}

/// Publishes `PlaybackStopped` however the playback thread exits, unwinding included.
struct FinishOnExit<'a>(&'a PlaybackRun);

impl Drop for FinishOnExit<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            error!("Playback thread panicked");
        }
        self.0.finish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::create_event_bus;
    use crate::executor::{InputInjector, SyntheticInput};
    use crate::repository::ActionRepository;
    use crate::MouseButton;
    use crossbeam_channel::Receiver;

    #[derive(Default)]
    struct CountingInjector {
        sent: Mutex<Vec<(Instant, SyntheticInput)>>,
    }

    impl InputInjector for CountingInjector {
        fn screen_size(&self) -> (i32, i32) {
            (1920, 1080)
        }

        fn send(&self, input: &SyntheticInput) -> MacroResult<()> {
            self.sent.lock().unwrap().push((Instant::now(), *input));
            Ok(())
        }
    }

    fn config(loop_count: u32, speed_multiplier: f64) -> PlaybackConfig {
        PlaybackConfig {
            loop_count,
            speed_multiplier,
            start_delay_ms: 0,
        }
    }

    fn setup(
        offsets_ms: &[u64],
    ) -> (Player, Arc<CountingInjector>, Receiver<MacroEvent>) {
        let repo = ActionRepository::shared();
        for (i, ms) in offsets_ms.iter().enumerate() {
            repo.add(Action::keyboard(Duration::from_millis(*ms), 0x41 + i as u32, true));
        }
        let injector = Arc::new(CountingInjector::default());
        let executor = Arc::new(ActionExecutor::new(injector.clone()));
        let bus = create_event_bus();
        let rx = bus.subscribe();
        (Player::new(repo, executor, bus), injector, rx)
    }

    fn wait_stopped(rx: &Receiver<MacroEvent>) -> Vec<MacroEvent> {
        let mut events = Vec::new();
        loop {
            let event = rx
                .recv_timeout(Duration::from_secs(10))
                .expect("playback did not stop");
            let done = matches!(event, MacroEvent::PlaybackStopped { .. });
            events.push(event);
            if done {
                return events;
            }
        }
    }

    #[test]
    fn test_normalize_shifts_to_zero() {
        let actions = vec![
            Action::keyboard(Duration::from_millis(300), 1, true),
            Action::keyboard(Duration::from_millis(450), 1, false),
        ];
        let normalized = normalize(&actions);
        assert_eq!(normalized[0].time_offset, Duration::ZERO);
        assert_eq!(normalized[1].time_offset, Duration::from_millis(150));
        assert!(normalize(&[]).is_empty());
    }

    #[test]
    fn test_loop_count_two_executes_twice() {
        let (player, injector, rx) = setup(&[0, 10, 20]);
        assert!(player.play(&config(2, 1.0)).unwrap());

        let events = wait_stopped(&rx);
        assert_eq!(events.first(), Some(&MacroEvent::PlaybackStarted));
        assert_eq!(events.last(), Some(&MacroEvent::PlaybackStopped { executed: 6 }));
        let progress: Vec<u64> = events
            .iter()
            .filter_map(|e| match e {
                MacroEvent::ActionExecuted { executed } => Some(*executed),
                _ => None,
            })
            .collect();
        assert_eq!(progress, vec![1, 2, 3, 4, 5, 6]);

        let sent = injector.sent.lock().unwrap();
        let codes: Vec<u32> = sent
            .iter()
            .map(|(_, input)| match input {
                SyntheticInput::Key { key_code, .. } => *key_code,
                _ => 0,
            })
            .collect();
        assert_eq!(codes, vec![0x41, 0x42, 0x43, 0x41, 0x42, 0x43]);
        // settle delay separates the iterations
        assert!(sent[3].0 - sent[2].0 >= SETTLE_DELAY);
        assert!(player.wait_for_completion(Duration::from_secs(1)));
        assert!(!player.is_playing());
    }

    #[test]
    fn test_stop_lets_in_flight_action_finish() {
        let (player, injector, rx) = setup(&[0, 400, 800]);
        player.play(&config(2, 1.0)).unwrap();

        loop {
            match rx.recv_timeout(Duration::from_secs(5)).unwrap() {
                MacroEvent::ActionExecuted { executed: 1 } => break,
                _ => continue,
            }
        }
        player.stop();

        let events = wait_stopped(&rx);
        assert_eq!(events.last(), Some(&MacroEvent::PlaybackStopped { executed: 1 }));
        assert_eq!(injector.sent.lock().unwrap().len(), 1);
        assert_eq!(player.executed_count(), 1);
    }

    #[test]
    fn test_speed_multiplier_compresses_timeline() {
        let (player, injector, rx) = setup(&[1000, 2000]);
        player.play(&config(1, 2.0)).unwrap();
        wait_stopped(&rx);

        let sent = injector.sent.lock().unwrap();
        let span = sent[1].0 - sent[0].0;
        assert!(span >= Duration::from_millis(495), "span {span:?}");
        assert!(span < Duration::from_millis(600), "span {span:?}");
    }

    #[test]
    fn test_play_empty_repository_is_rejected() {
        let (player, _injector, rx) = setup(&[]);
        let err = player.play(&config(1, 1.0)).unwrap_err();
        assert!(matches!(err, MacroError::EmptyState(_)));
        assert!(!player.is_playing());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_play_while_playing_is_noop() {
        let (player, _injector, rx) = setup(&[0, 200]);
        assert!(player.play(&config(1, 1.0)).unwrap());
        assert!(!player.play(&config(1, 1.0)).unwrap());
        player.stop();
        let events = wait_stopped(&rx);
        let starts = events
            .iter()
            .filter(|e| **e == MacroEvent::PlaybackStarted)
            .count();
        assert_eq!(starts, 1);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let (player, _injector, _rx) = setup(&[0]);
        assert!(matches!(
            player.play(&config(0, 1.0)),
            Err(MacroError::Configuration(_))
        ));
        assert!(matches!(
            player.play(&config(1, 0.0)),
            Err(MacroError::Configuration(_))
        ));
        assert!(matches!(
            player.play(&config(1, 1e-20)),
            Err(MacroError::Configuration(_))
        ));
        assert!(!player.is_playing());
    }

    struct PanickingInjector;

    impl InputInjector for PanickingInjector {
        fn screen_size(&self) -> (i32, i32) {
            (1920, 1080)
        }

        fn send(&self, _input: &SyntheticInput) -> MacroResult<()> {
            panic!("injector blew up");
        }
    }

    #[test]
    fn test_panicking_run_still_reports_stopped() {
        let repo = ActionRepository::shared();
        repo.add(Action::keyboard(Duration::ZERO, 0x41, true));
        let bus = create_event_bus();
        let rx = bus.subscribe();
        let player = Player::new(
            repo,
            Arc::new(ActionExecutor::new(Arc::new(PanickingInjector))),
            bus,
        );

        assert!(player.play(&config(1, 1.0)).unwrap());
        let events = wait_stopped(&rx);
        assert_eq!(events.last(), Some(&MacroEvent::PlaybackStopped { executed: 0 }));
        assert!(!player.is_playing());
        assert!(player.wait_for_completion(Duration::from_secs(1)));

        // the player is usable again afterwards
        assert!(player.play(&config(1, 1.0)).unwrap());
        wait_stopped(&rx);
    }

    #[test]
    fn test_stop_right_after_restart_is_honoured() {
        let (player, injector, rx) = setup(&[0, 5_000]);
        for _ in 0..20 {
            assert!(player.play(&config(1, 1.0)).unwrap());
            player.stop();
            let events = wait_stopped(&rx);
            assert!(matches!(
                events.last(),
                Some(MacroEvent::PlaybackStopped { executed: 0 | 1 })
            ));
            assert!(!player.is_playing());
        }
        assert!(injector.sent.lock().unwrap().len() <= 20);
    }

    #[test]
    fn test_snapshot_ignores_later_writes() {
        let repo = ActionRepository::shared();
        repo.add(Action::mouse(Duration::ZERO, 1, 1, MouseButton::Move, false, 0));
        repo.add(Action::mouse(Duration::from_millis(100), 2, 2, MouseButton::Move, false, 0));
        let injector = Arc::new(CountingInjector::default());
        let bus = create_event_bus();
        let rx = bus.subscribe();
        let player = Player::new(
            repo.clone(),
            Arc::new(ActionExecutor::new(injector.clone())),
            bus,
        );

        player.play(&config(1, 1.0)).unwrap();
        repo.add(Action::mouse(Duration::from_millis(150), 3, 3, MouseButton::Move, false, 0));
        wait_stopped(&rx);
        assert_eq!(injector.sent.lock().unwrap().len(), 2);
    }
}
