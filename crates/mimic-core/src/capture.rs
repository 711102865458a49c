//! Capture pipeline: structured capture events, mouse-move noise filtering,
//! and the hook lifecycle contract implemented by `mimic-platform`.

use crate::{MacroResult, MouseButton};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::trace;

/// What a hook observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureInput {
    Key {
        key_code: u32,
        down: bool,
    },
    Mouse {
        x: i32,
        y: i32,
        button: MouseButton,
        down: bool,
        wheel_delta: i32,
    },
}

/// One observed input message plus the "handled" flag.
///
/// A consumer that sets the flag asks the hook to keep the message from
/// reaching the rest of the system. `injected` marks synthetic input (our
/// own playback included) on backends that can tell.
#[derive(Debug, Clone)]
pub struct CaptureEvent {
    pub input: CaptureInput,
    injected: bool,
    handled: bool,
}

impl CaptureEvent {
    pub fn new(input: CaptureInput) -> Self {
        Self {
            input,
            injected: false,
            handled: false,
        }
    }

    /// Mark the event as synthetic.
    pub fn injected(mut self) -> Self {
        self.injected = true;
        self
    }

    pub fn key(key_code: u32, down: bool) -> Self {
        Self::new(CaptureInput::Key { key_code, down })
    }

    pub fn mouse(x: i32, y: i32, button: MouseButton, down: bool) -> Self {
        Self::new(CaptureInput::Mouse {
            x,
            y,
            button,
            down,
            wheel_delta: 0,
        })
    }

    pub fn wheel(x: i32, y: i32, wheel_delta: i32) -> Self {
        Self::new(CaptureInput::Mouse {
            x,
            y,
            button: MouseButton::Wheel,
            down: false,
            wheel_delta,
        })
    }

    pub fn is_injected(&self) -> bool {
        self.injected
    }

    pub fn is_handled(&self) -> bool {
        self.handled
    }

    pub fn set_handled(&mut self) {
        self.handled = true;
    }

    /// Left, right or middle button pressed.
    pub fn is_primary_button_down(&self) -> bool {
        matches!(
            self.input,
            CaptureInput::Mouse {
                button: MouseButton::Left | MouseButton::Right | MouseButton::Middle,
                down: true,
                ..
            }
        )
    }
}

/// Consumer invoked synchronously from the hook context. Must return quickly.
pub type CaptureHandler = Arc<dyn Fn(&mut CaptureEvent) + Send + Sync>;

/// Lifecycle of one system-wide interception point.
pub trait InputHook: Send {
    /// Register with the OS. Fails with [`crate::MacroError::HookInstall`]
    /// when registration is refused; installing twice is a no-op.
    fn install(&mut self) -> MacroResult<()>;
    fn uninstall(&mut self);
    fn is_installed(&self) -> bool;
}

/// Trade-off between capture fidelity and event volume.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterProfile {
    #[default]
    Normal,
    HighPrecision,
}

impl FilterProfile {
    /// Displacement (px, per axis) below which a move counts as jitter.
    pub fn threshold(self) -> i32 {
        match self {
            FilterProfile::Normal => 8,
            FilterProfile::HighPrecision => 3,
        }
    }

    /// Minimum spacing between two small moves.
    pub fn interval(self) -> Duration {
        match self {
            FilterProfile::Normal => Duration::from_millis(50),
            FilterProfile::HighPrecision => Duration::from_millis(20),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct LastMove {
    x: i32,
    y: i32,
    at: Instant,
}

/// Drops redundant mouse moves. Button and wheel messages never pass through here.
#[derive(Debug, Clone)]
pub struct MoveFilter {
    profile: FilterProfile,
    record_moves: bool,
    last: Option<LastMove>,
}

pub type SharedMoveFilter = Arc<Mutex<MoveFilter>>;

impl Default for MoveFilter {
    fn default() -> Self {
        Self::new(FilterProfile::Normal)
    }
}

impl MoveFilter {
    pub fn new(profile: FilterProfile) -> Self {
        Self {
            profile,
            record_moves: true,
            last: None,
        }
    }

    pub fn shared(profile: FilterProfile) -> SharedMoveFilter {
        Arc::new(Mutex::new(Self::new(profile)))
    }

    pub fn profile(&self) -> FilterProfile {
        self.profile
    }

    pub fn set_profile(&mut self, profile: FilterProfile) {
        self.profile = profile;
    }

    /// When disabled every move is dropped.
    pub fn set_record_moves(&mut self, enabled: bool) {
        self.record_moves = enabled;
    }

    /// Forget the last emitted move (start of a new capture session).
    pub fn reset(&mut self) {
        self.last = None;
    }

    /// Returns true when the move at `(x, y)` observed at `at` should be emitted.
    pub fn admit(&mut self, x: i32, y: i32, at: Instant) -> bool {
        if !self.record_moves {
            return false;
        }

        if let Some(last) = self.last {
            if last.x == x && last.y == y {
                return false;
            }
            let small = (x - last.x).abs() < self.profile.threshold()
                && (y - last.y).abs() < self.profile.threshold();
            let soon = at.saturating_duration_since(last.at) < self.profile.interval();
            if small && soon {
                trace!(x, y, "move filtered");
                return false;
            }
        }

        self.last = Some(LastMove { x, y, at });
        true
    }
}

/// Glue used by hook backends: filters moves, then hands the event to the
/// consumer and reports whether it asked for suppression.
#[derive(Clone)]
pub struct CaptureDispatcher {
    handler: CaptureHandler,
    filter: SharedMoveFilter,
}

impl CaptureDispatcher {
    pub fn new(handler: CaptureHandler, filter: SharedMoveFilter) -> Self {
        Self { handler, filter }
    }

    /// Returns true when the consumer asked for the message to be swallowed.
    pub fn dispatch(&self, input: CaptureInput, injected: bool, at: Instant) -> bool {
        if let CaptureInput::Mouse {
            x,
            y,
            button: MouseButton::Move,
            ..
        } = input
        {
            let admitted = self
                .filter
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .admit(x, y, at);
            if !admitted {
                return false;
            }
        }

        let mut event = CaptureEvent::new(input);
        event.injected = injected;
        (self.handler)(&mut event);
        event.is_handled()
    }
}
