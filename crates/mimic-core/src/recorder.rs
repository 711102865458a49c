//! Recording engine: turns capture events into timestamped actions.

use crate::capture::CaptureInput;
use crate::clock::Stopwatch;
use crate::events::{MacroEvent, SharedEventBus};
use crate::repository::SharedRepository;
use crate::{Action, ActionInput, MouseButton};
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info};

/// State of the recorder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecorderState {
    /// Not recording.
    #[default]
    Idle,
    /// Recording in progress.
    Recording,
}

struct RecorderInner {
    state: RecorderState,
    clock: Stopwatch,
}

/// The recorder stamps actions against a monotonic epoch and appends them to
/// the repository. Safe to call from hook callbacks: each append holds the
/// lock only for the stamp and the push.
pub struct Recorder {
    repository: SharedRepository,
    bus: SharedEventBus,
    inner: Mutex<RecorderInner>,
}

impl Recorder {
    pub fn new(repository: SharedRepository, bus: SharedEventBus) -> Self {
        Self {
            repository,
            bus,
            inner: Mutex::new(RecorderInner {
                state: RecorderState::Idle,
                clock: Stopwatch::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, RecorderInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Get current state.
    pub fn state(&self) -> RecorderState {
        self.lock().state
    }

    pub fn is_recording(&self) -> bool {
        self.state() == RecorderState::Recording
    }

    /// Number of actions currently stored.
    pub fn action_count(&self) -> usize {
        self.repository.len()
    }

    /// Time since the recording epoch (frozen once stopped).
    pub fn elapsed(&self) -> Duration {
        self.lock().clock.elapsed()
    }

    /// Discard the current sequence and start a fresh epoch at zero.
    pub fn start_recording(&self) {
        {
            let mut inner = self.lock();
            self.repository.clear();
            inner.clock.reset();
            inner.clock.start();
            inner.state = RecorderState::Recording;
        }
        info!("Recording started");
        self.bus.publish(MacroEvent::RecordingStarted);
    }

    pub fn stop_recording(&self) {
        {
            let mut inner = self.lock();
            inner.state = RecorderState::Idle;
            inner.clock.stop();
        }
        info!(actions = self.repository.len(), "Recording stopped");
        self.bus.publish(MacroEvent::RecordingStopped);
    }

    /// Empty the repository regardless of state. Callers must not clear while
    /// recording or playing.
    pub fn clear(&self) {
        self.repository.clear();
        debug!("Actions cleared");
        self.bus.publish(MacroEvent::ActionsChanged { count: 0 });
    }

    pub fn record_keyboard_action(&self, key_code: u32, down: bool) {
        self.append(ActionInput::Keyboard { key_code, down });
    }

    pub fn record_mouse_action(
        &self,
        x: i32,
        y: i32,
        button: MouseButton,
        down: bool,
        wheel_delta: i32,
    ) {
        self.append(ActionInput::Mouse {
            x,
            y,
            button,
            down,
            wheel_delta,
        });
    }

    /// Record whatever a hook observed.
    pub fn record(&self, input: CaptureInput) {
        match input {
            CaptureInput::Key { key_code, down } => self.record_keyboard_action(key_code, down),
            CaptureInput::Mouse {
                x,
                y,
                button,
                down,
                wheel_delta,
            } => self.record_mouse_action(x, y, button, down, wheel_delta),
        }
    }

    fn append(&self, input: ActionInput) {
        let count = {
            let inner = self.lock();
            if inner.state != RecorderState::Recording {
                return;
            }
            // Stamp and push under the same lock so offsets stay
            // non-decreasing in insertion order.
            let action = Action {
                time_offset: inner.clock.elapsed(),
                input,
            };
            debug!(?action, "Recording action");
            self.repository.add(action);
            self.repository.len()
        };
        self.bus.publish(MacroEvent::ActionsChanged { count });
    }
}
