//! mimic-core: action model, recording, playback scheduling and storage.
//!
//! Platform agnostic. OS hooks and synthetic input live in `mimic-platform`
//! behind the [`InputHook`] and [`InputInjector`] traits.

pub mod capture;
pub mod clock;
pub mod config;
pub mod coordinator;
mod error;
pub mod events;
pub mod executor;
pub mod keys;
pub mod player;
pub mod recorder;
pub mod repository;
pub mod storage;
pub mod timing;

pub use capture::{
    CaptureDispatcher, CaptureEvent, CaptureHandler, CaptureInput, FilterProfile, InputHook,
    MoveFilter, SharedMoveFilter,
};
pub use clock::Stopwatch;
pub use config::{
    load_settings, load_user_settings, save_settings, save_user_settings, settings_file_path,
    RecordingConfig, Settings,
};
pub use coordinator::{Coordinator, CoordinatorState, HotkeyConfig};
pub use error::{MacroError, MacroResult};
pub use events::{create_event_bus, EventBus, MacroEvent, SharedEventBus};
pub use executor::{ActionExecutor, InputInjector, MouseSignal, SyntheticInput, ABSOLUTE_MAX};
pub use player::{PlaybackConfig, Player, PlayerState};
pub use recorder::{Recorder, RecorderState};
pub use repository::{ActionRepository, SharedRepository};
pub use storage::{
    get_app_data_dir, get_macros_dir, list_macros, load_actions, resolve_macro_path,
    save_actions, MacroStorage,
};

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One recorded input, stamped relative to the start of its recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    /// Microseconds on disk.
    #[serde(rename = "timeOffset", with = "micros")]
    pub time_offset: Duration,
    #[serde(flatten)]
    pub input: ActionInput,
}

impl Action {
    pub fn keyboard(time_offset: Duration, key_code: u32, down: bool) -> Self {
        Self {
            time_offset,
            input: ActionInput::Keyboard { key_code, down },
        }
    }

    pub fn mouse(
        time_offset: Duration,
        x: i32,
        y: i32,
        button: MouseButton,
        down: bool,
        wheel_delta: i32,
    ) -> Self {
        Self {
            time_offset,
            input: ActionInput::Mouse {
                x,
                y,
                button,
                down,
                wheel_delta,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ActionInput {
    Keyboard {
        /// Windows virtual-key code, see [`keys`].
        #[serde(rename = "keyCode")]
        key_code: u32,
        down: bool,
    },
    Mouse {
        /// Screen pixels.
        x: i32,
        y: i32,
        #[serde(default)]
        button: MouseButton,
        #[serde(default)]
        down: bool,
        /// Multiples of 120 per notch; positive scrolls away from the user.
        #[serde(rename = "wheelDelta", default)]
        wheel_delta: i32,
    },
}

impl ActionInput {
    pub fn button(&self) -> Option<MouseButton> {
        match self {
            ActionInput::Mouse { button, .. } => Some(*button),
            ActionInput::Keyboard { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MouseButton {
    #[default]
    None,
    Move,
    Left,
    Right,
    Middle,
    Wheel,
}

/// Offset of the last action relative to the first.
pub fn sequence_duration(actions: &[Action]) -> Duration {
    match (actions.first(), actions.last()) {
        (Some(first), Some(last)) => last.time_offset.saturating_sub(first.time_offset),
        _ => Duration::ZERO,
    }
}

mod micros {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_micros()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_micros(u64::deserialize(deserializer)?))
    }
}
