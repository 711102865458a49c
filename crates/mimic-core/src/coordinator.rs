//! Mode arbiter between capture, recorder and player.
//!
//! Owns the hotkeys, the Recording/Playing exclusion and the "ignore next
//! click" latch that keeps the click which started playback out of both the
//! recording and the replay target.

use crate::capture::{
    CaptureDispatcher, CaptureEvent, CaptureHandler, CaptureInput, InputHook, MoveFilter,
    SharedMoveFilter,
};
use crate::config::RecordingConfig;
use crate::events::{MacroEvent, SharedEventBus};
use crate::keys::{key_name, Modifier, VK_F9, VK_TAB};
use crate::player::{PlaybackConfig, Player};
use crate::recorder::Recorder;
use crate::storage::MacroStorage;
use crate::{MacroError, MacroResult};
use crossbeam_channel::Receiver;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// How long `shutdown` waits for a running playback before releasing hooks.
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HotkeyConfig {
    /// Starts/stops recording (not while playing).
    pub toggle_recording: u32,
    /// Held together with `stop_key` to stop playback.
    pub stop_modifier: Modifier,
    pub stop_key: u32,
}

impl Default for HotkeyConfig {
    fn default() -> Self {
        Self {
            toggle_recording: VK_F9,
            stop_modifier: Modifier::Shift,
            stop_key: VK_TAB,
        }
    }
}

impl HotkeyConfig {
    pub fn validate(&self) -> MacroResult<()> {
        for code in [self.toggle_recording, self.stop_key] {
            if code == 0 || code > 0xFE {
                return Err(MacroError::Configuration(format!(
                    "invalid hotkey code 0x{code:X}"
                )));
            }
            if Modifier::of(code).is_some() {
                return Err(MacroError::Configuration(format!(
                    "hotkey cannot be a bare modifier ({})",
                    key_name(code)
                )));
            }
        }
        if self.toggle_recording == self.stop_key {
            return Err(MacroError::Configuration(
                "record toggle and stop key must differ".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CoordinatorState {
    Idle,
    Recording,
    Playing,
}

#[derive(Default)]
struct Latches {
    ignore_next_click: bool,
    held_modifiers: HashSet<Modifier>,
}

/// Mediator. All capture events flow through [`Coordinator::handle_event`].
pub struct Coordinator {
    recorder: Arc<Recorder>,
    player: Arc<Player>,
    storage: MacroStorage,
    hotkeys: HotkeyConfig,
    filter: SharedMoveFilter,
    bus: SharedEventBus,
    lifecycle: Receiver<MacroEvent>,
    latches: Mutex<Latches>,
    hooks: Mutex<Vec<Box<dyn InputHook>>>,
}

impl Coordinator {
    pub fn new(
        recorder: Arc<Recorder>,
        player: Arc<Player>,
        storage: MacroStorage,
        bus: &SharedEventBus,
        hotkeys: HotkeyConfig,
        recording: &RecordingConfig,
    ) -> Arc<Self> {
        let mut filter = MoveFilter::new(recording.filter_profile());
        filter.set_record_moves(recording.record_mouse_moves);

        Arc::new(Self {
            recorder,
            player,
            storage,
            hotkeys,
            filter: Arc::new(Mutex::new(filter)),
            bus: bus.clone(),
            lifecycle: bus.subscribe_filtered(MacroEvent::is_lifecycle),
            latches: Mutex::new(Latches::default()),
            hooks: Mutex::new(Vec::new()),
        })
    }

    fn latches(&self) -> MutexGuard<'_, Latches> {
        self.latches.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Capture handler bound to this coordinator. Holds only a weak
    /// reference so hooks never keep the coordinator alive.
    pub fn capture_handler(self: &Arc<Self>) -> CaptureHandler {
        let weak = Arc::downgrade(self);
        Arc::new(move |event: &mut CaptureEvent| {
            if let Some(coordinator) = weak.upgrade() {
                coordinator.handle_event(event);
            }
        })
    }

    /// Handler plus the move filter, ready to hand to a hook backend.
    pub fn dispatcher(self: &Arc<Self>) -> CaptureDispatcher {
        CaptureDispatcher::new(self.capture_handler(), self.filter.clone())
    }

    /// Install every hook. On the first failure the already-installed ones
    /// are removed again and the error is returned.
    pub fn initialize(&self, hooks: Vec<Box<dyn InputHook>>) -> MacroResult<()> {
        let mut installed = self.hooks.lock().unwrap_or_else(|e| e.into_inner());
        for mut hook in hooks {
            if let Err(e) = hook.install() {
                error!(error = %e, "Input hook installation failed");
                for mut h in installed.drain(..) {
                    h.uninstall();
                }
                return Err(e);
            }
            installed.push(hook);
        }
        info!(hooks = installed.len(), "Input capture initialized");
        Ok(())
    }

    pub fn state(&self) -> CoordinatorState {
        if self.player.is_playing() {
            CoordinatorState::Playing
        } else if self.recorder.is_recording() {
            CoordinatorState::Recording
        } else {
            CoordinatorState::Idle
        }
    }

    pub fn recorder(&self) -> &Recorder {
        &self.recorder
    }

    pub fn player(&self) -> &Player {
        &self.player
    }

    pub fn set_recording_config(&self, recording: &RecordingConfig) {
        let mut filter = self.filter.lock().unwrap_or_else(|e| e.into_inner());
        filter.set_profile(recording.filter_profile());
        filter.set_record_moves(recording.record_mouse_moves);
    }

    pub fn start_recording(&self) -> MacroResult<()> {
        if self.player.is_playing() {
            return Err(MacroError::Busy("cannot record while playing".into()));
        }
        self.reset_filter();
        self.recorder.start_recording();
        Ok(())
    }

    pub fn stop_recording(&self) {
        if self.recorder.is_recording() {
            self.recorder.stop_recording();
        }
    }

    pub fn toggle_recording(&self) -> MacroResult<()> {
        if self.recorder.is_recording() {
            self.stop_recording();
            Ok(())
        } else {
            self.start_recording()
        }
    }

    pub fn play(&self, config: &PlaybackConfig) -> MacroResult<bool> {
        if self.recorder.is_recording() {
            return Err(MacroError::Busy("cannot play while recording".into()));
        }
        self.player.play(config)
    }

    pub fn stop_playback(&self) {
        self.player.stop();
    }

    pub fn clear(&self) -> MacroResult<()> {
        self.ensure_idle("clear")?;
        self.recorder.clear();
        Ok(())
    }

    pub fn save(&self, path: &Path) -> MacroResult<()> {
        self.storage.save(path)
    }

    pub fn load(&self, path: &Path) -> MacroResult<usize> {
        self.ensure_idle("load")?;
        let count = self.storage.load(path)?;
        self.bus.publish(MacroEvent::ActionsChanged { count });
        Ok(count)
    }

    fn ensure_idle(&self, what: &str) -> MacroResult<()> {
        match self.state() {
            CoordinatorState::Idle => Ok(()),
            state => Err(MacroError::Busy(format!("cannot {what} while {state:?}"))),
        }
    }

    fn reset_filter(&self) {
        self.filter.lock().unwrap_or_else(|e| e.into_inner()).reset();
    }

    /// Apply lifecycle notifications published since the last capture event.
    fn drain_lifecycle(&self, latches: &mut Latches) {
        for event in self.lifecycle.try_iter() {
            match event {
                MacroEvent::PlaybackStarted => latches.ignore_next_click = true,
                MacroEvent::PlaybackStopped { .. } => latches.ignore_next_click = false,
                MacroEvent::RecordingStarted => self.reset_filter(),
                _ => {}
            }
        }
    }

    /// Route one capture event. Runs on the hook thread.
    pub fn handle_event(&self, event: &mut CaptureEvent) {
        let mut latches = self.latches();
        self.drain_lifecycle(&mut latches);
        let playing = self.player.is_playing();

        match event.input {
            CaptureInput::Key { key_code, down } => {
                if let Some(modifier) = Modifier::of(key_code) {
                    if down {
                        latches.held_modifiers.insert(modifier);
                    } else {
                        latches.held_modifiers.remove(&modifier);
                    }
                }

                if playing
                    && down
                    && !event.is_injected()
                    && key_code == self.hotkeys.stop_key
                    && latches.held_modifiers.contains(&self.hotkeys.stop_modifier)
                {
                    drop(latches);
                    info!("Stop hotkey pressed");
                    self.player.stop();
                    event.set_handled();
                    return;
                }

                if !playing && key_code == self.hotkeys.toggle_recording {
                    drop(latches);
                    // Swallow the release as well so it never lands in the recording.
                    if down {
                        debug!("Record hotkey pressed");
                        if let Err(e) = self.toggle_recording() {
                            warn!(error = %e, "record hotkey ignored");
                        }
                    }
                    event.set_handled();
                    return;
                }
            }
            CaptureInput::Mouse { .. } => {
                // Replayed clicks come back through the hook; only a physical
                // click consumes the latch.
                if latches.ignore_next_click
                    && event.is_primary_button_down()
                    && !event.is_injected()
                {
                    latches.ignore_next_click = false;
                    debug!("Swallowed the click that started playback");
                    event.set_handled();
                    return;
                }
            }
        }
        drop(latches);

        if !playing && self.recorder.is_recording() {
            self.recorder.record(event.input);
        }
    }

    /// Stop playback (bounded wait), stop recording, release all hooks.
    pub fn shutdown(&self) {
        self.player.stop();
        if !self.player.wait_for_completion(SHUTDOWN_TIMEOUT) {
            warn!("Releasing hooks while playback is still running");
        }
        self.stop_recording();

        let mut hooks = self.hooks.lock().unwrap_or_else(|e| e.into_inner());
        for hook in hooks.iter_mut() {
            hook.uninstall();
        }
        hooks.clear();
        info!("Coordinator shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::create_event_bus;
    use crate::executor::{ActionExecutor, InputInjector, SyntheticInput};
    use crate::keys::{VK_A, VK_LSHIFT};
    use crate::repository::{ActionRepository, SharedRepository};
    use crate::{ActionInput, MouseButton};

    struct NullInjector;

    impl InputInjector for NullInjector {
        fn screen_size(&self) -> (i32, i32) {
            (1920, 1080)
        }

        fn send(&self, _input: &SyntheticInput) -> MacroResult<()> {
            Ok(())
        }
    }

    struct FakeHook {
        fail: bool,
        installed: Arc<Mutex<Vec<&'static str>>>,
        name: &'static str,
    }

    impl InputHook for FakeHook {
        fn install(&mut self) -> MacroResult<()> {
            if self.fail {
                return Err(MacroError::HookInstall("refused".into()));
            }
            self.installed.lock().unwrap().push(self.name);
            Ok(())
        }

        fn uninstall(&mut self) {
            self.installed.lock().unwrap().retain(|n| *n != self.name);
        }

        fn is_installed(&self) -> bool {
            self.installed.lock().unwrap().contains(&self.name)
        }
    }

    fn coordinator() -> (Arc<Coordinator>, SharedRepository) {
        let repo = ActionRepository::shared();
        let bus = create_event_bus();
        let recorder = Arc::new(Recorder::new(repo.clone(), bus.clone()));
        let executor = Arc::new(ActionExecutor::new(Arc::new(NullInjector)));
        let player = Arc::new(Player::new(repo.clone(), executor, bus.clone()));
        let coordinator = Coordinator::new(
            recorder,
            player,
            MacroStorage::new(repo.clone()),
            &bus,
            HotkeyConfig::default(),
            &RecordingConfig::default(),
        );
        (coordinator, repo)
    }

    fn slow_config() -> PlaybackConfig {
        PlaybackConfig {
            loop_count: 1,
            speed_multiplier: 1.0,
            start_delay_ms: 0,
        }
    }

    fn seed_long_macro(repo: &ActionRepository) {
        repo.add(crate::Action::keyboard(Duration::ZERO, VK_A, true));
        repo.add(crate::Action::keyboard(Duration::from_secs(30), VK_A, false));
    }

    #[test]
    fn test_toggle_hotkey_starts_and_stops_recording() {
        let (c, repo) = coordinator();

        let mut press = CaptureEvent::key(VK_F9, true);
        c.handle_event(&mut press);
        assert!(press.is_handled());
        assert_eq!(c.state(), CoordinatorState::Recording);

        let mut release = CaptureEvent::key(VK_F9, false);
        c.handle_event(&mut release);
        assert!(release.is_handled());

        let mut a = CaptureEvent::key(VK_A, true);
        c.handle_event(&mut a);
        assert!(!a.is_handled());

        c.handle_event(&mut CaptureEvent::key(VK_F9, true));
        assert_eq!(c.state(), CoordinatorState::Idle);

        let actions = repo.snapshot();
        assert_eq!(actions.len(), 1);
        assert_eq!(
            actions[0].input,
            ActionInput::Keyboard {
                key_code: VK_A,
                down: true,
            }
        );
    }

    #[test]
    fn test_events_ignored_when_idle() {
        let (c, repo) = coordinator();
        c.handle_event(&mut CaptureEvent::mouse(5, 5, MouseButton::Left, true));
        c.handle_event(&mut CaptureEvent::key(VK_A, true));
        assert!(repo.is_empty());
    }

    #[test]
    fn test_playing_blocks_recording_and_swallows_first_click() {
        let (c, repo) = coordinator();
        seed_long_macro(&repo);
        assert!(c.play(&slow_config()).unwrap());
        assert_eq!(c.state(), CoordinatorState::Playing);

        // record hotkey is inert while playing
        let mut f9 = CaptureEvent::key(VK_F9, true);
        c.handle_event(&mut f9);
        assert!(!f9.is_handled());
        assert!(!c.recorder().is_recording());

        let mut first = CaptureEvent::mouse(10, 10, MouseButton::Right, true);
        c.handle_event(&mut first);
        assert!(first.is_handled());

        let mut second = CaptureEvent::mouse(10, 10, MouseButton::Right, true);
        c.handle_event(&mut second);
        assert!(!second.is_handled());

        c.stop_playback();
        assert!(c.player().wait_for_completion(Duration::from_secs(5)));
        assert_eq!(repo.len(), 2);
    }

    #[test]
    fn test_latch_ignores_moves_and_releases() {
        let (c, repo) = coordinator();
        seed_long_macro(&repo);
        c.play(&slow_config()).unwrap();

        let mut mv = CaptureEvent::mouse(1, 1, MouseButton::Move, false);
        c.handle_event(&mut mv);
        assert!(!mv.is_handled());
        let mut up = CaptureEvent::mouse(1, 1, MouseButton::Left, false);
        c.handle_event(&mut up);
        assert!(!up.is_handled());
        let mut down = CaptureEvent::mouse(1, 1, MouseButton::Middle, true);
        c.handle_event(&mut down);
        assert!(down.is_handled());

        c.shutdown();
    }

    #[test]
    fn test_replayed_click_leaves_latch_armed() {
        let (c, repo) = coordinator();
        repo.add(crate::Action::mouse(Duration::ZERO, 10, 10, MouseButton::Left, true, 0));
        repo.add(crate::Action::keyboard(Duration::from_secs(30), VK_A, false));
        c.play(&slow_config()).unwrap();

        let mut echoed = CaptureEvent::mouse(10, 10, MouseButton::Left, true).injected();
        c.handle_event(&mut echoed);
        assert!(!echoed.is_handled());

        let mut physical = CaptureEvent::mouse(10, 10, MouseButton::Left, true);
        c.handle_event(&mut physical);
        assert!(physical.is_handled());

        c.shutdown();
    }

    #[test]
    fn test_replayed_stop_combo_does_not_stop_playback() {
        let (c, repo) = coordinator();
        seed_long_macro(&repo);
        c.play(&slow_config()).unwrap();

        c.handle_event(&mut CaptureEvent::key(VK_LSHIFT, true).injected());
        let mut combo = CaptureEvent::key(VK_TAB, true).injected();
        c.handle_event(&mut combo);
        assert!(!combo.is_handled());
        assert!(c.player().is_playing());

        c.shutdown();
    }

    #[test]
    fn test_progress_events_do_not_accumulate_without_hooks() {
        let (c, repo) = coordinator();
        for i in 0..200 {
            repo.add(crate::Action::keyboard(Duration::ZERO, VK_A, i % 2 == 0));
        }
        c.play(&slow_config()).unwrap();
        assert!(c.player().wait_for_completion(Duration::from_secs(5)));

        // only PlaybackStarted and PlaybackStopped are queued
        assert_eq!(c.lifecycle.len(), 2);
    }

    #[test]
    fn test_stop_combo_requires_modifier() {
        let (c, repo) = coordinator();
        seed_long_macro(&repo);
        c.play(&slow_config()).unwrap();

        let mut bare_tab = CaptureEvent::key(VK_TAB, true);
        c.handle_event(&mut bare_tab);
        assert!(!bare_tab.is_handled());
        assert!(c.player().is_playing());

        c.handle_event(&mut CaptureEvent::key(VK_LSHIFT, true));
        let mut combo = CaptureEvent::key(VK_TAB, true);
        c.handle_event(&mut combo);
        assert!(combo.is_handled());

        assert!(c.player().wait_for_completion(Duration::from_secs(5)));
        assert_eq!(c.state(), CoordinatorState::Idle);
    }

    #[test]
    fn test_stop_combo_inert_when_not_playing() {
        let (c, _repo) = coordinator();
        c.handle_event(&mut CaptureEvent::key(VK_LSHIFT, true));
        let mut combo = CaptureEvent::key(VK_TAB, true);
        c.handle_event(&mut combo);
        assert!(!combo.is_handled());
    }

    #[test]
    fn test_latch_disarmed_after_playback_stops() {
        let (c, repo) = coordinator();
        repo.add(crate::Action::keyboard(Duration::ZERO, VK_A, true));
        c.play(&slow_config()).unwrap();
        assert!(c.player().wait_for_completion(Duration::from_secs(5)));

        let mut click = CaptureEvent::mouse(1, 1, MouseButton::Left, true);
        c.handle_event(&mut click);
        assert!(!click.is_handled());
    }

    #[test]
    fn test_mutual_exclusion_on_entry_points() {
        let (c, repo) = coordinator();
        c.start_recording().unwrap();
        repo.add(crate::Action::keyboard(Duration::ZERO, VK_A, true));
        assert!(matches!(c.play(&slow_config()), Err(MacroError::Busy(_))));
        assert!(matches!(c.clear(), Err(MacroError::Busy(_))));
        c.stop_recording();
        assert!(c.clear().is_ok());
        assert!(repo.is_empty());
    }

    #[test]
    fn test_initialize_rolls_back_on_failure() {
        let (c, _repo) = coordinator();
        let installed = Arc::new(Mutex::new(Vec::new()));
        let hooks: Vec<Box<dyn InputHook>> = vec![
            Box::new(FakeHook {
                fail: false,
                installed: installed.clone(),
                name: "keyboard",
            }),
            Box::new(FakeHook {
                fail: true,
                installed: installed.clone(),
                name: "mouse",
            }),
        ];

        let err = c.initialize(hooks).unwrap_err();
        assert!(matches!(err, MacroError::HookInstall(_)));
        assert!(installed.lock().unwrap().is_empty());
    }

    #[test]
    fn test_shutdown_uninstalls_hooks() {
        let (c, _repo) = coordinator();
        let installed = Arc::new(Mutex::new(Vec::new()));
        c.initialize(vec![Box::new(FakeHook {
            fail: false,
            installed: installed.clone(),
            name: "keyboard",
        })])
        .unwrap();
        assert_eq!(installed.lock().unwrap().len(), 1);

        c.shutdown();
        assert!(installed.lock().unwrap().is_empty());
    }

    #[test]
    fn test_hotkey_validation() {
        assert!(HotkeyConfig::default().validate().is_ok());
        let same = HotkeyConfig {
            toggle_recording: VK_TAB,
            ..HotkeyConfig::default()
        };
        assert!(same.validate().is_err());
        let modifier = HotkeyConfig {
            stop_key: VK_LSHIFT,
            ..HotkeyConfig::default()
        };
        assert!(modifier.validate().is_err());
    }
}
