//! Translation of recorded actions into synthetic input, and the executor
//! that drives an injector while counting failures.

use crate::{Action, ActionInput, MacroResult, MouseButton};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Upper bound of the device-independent absolute coordinate space.
pub const ABSOLUTE_MAX: i32 = 65_535;

/// Button transition carried by a mouse input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseSignal {
    /// Pointer move only.
    Move,
    Press(MouseButton),
    Release(MouseButton),
    /// Signed wheel delta (120 per notch, positive away from the user).
    Wheel(i32),
}

/// Exactly one synthetic OS input call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyntheticInput {
    Key { key_code: u32, down: bool },
    /// `abs_x` / `abs_y` are in `0..=ABSOLUTE_MAX` on both axes.
    Mouse {
        abs_x: i32,
        abs_y: i32,
        signal: MouseSignal,
    },
}

/// Map a screen pixel to the absolute coordinate space of a display of
/// `screen` = (width, height) pixels, clamped to range.
pub fn to_absolute(x: i32, y: i32, screen: (i32, i32)) -> (i32, i32) {
    let (w, h) = (screen.0.max(1), screen.1.max(1));
    let ax = (x as f64 * ABSOLUTE_MAX as f64 / w as f64) as i64;
    let ay = (y as f64 * ABSOLUTE_MAX as f64 / h as f64) as i64;
    (
        ax.clamp(0, ABSOLUTE_MAX as i64) as i32,
        ay.clamp(0, ABSOLUTE_MAX as i64) as i32,
    )
}

/// Inverse of [`to_absolute`], used by injectors that work in pixels.
pub fn from_absolute(abs_x: i32, abs_y: i32, screen: (i32, i32)) -> (i32, i32) {
    let x = (abs_x as f64 * screen.0 as f64 / ABSOLUTE_MAX as f64).round() as i32;
    let y = (abs_y as f64 * screen.1 as f64 / ABSOLUTE_MAX as f64).round() as i32;
    (x, y)
}

/// Pure translation of one action for a primary display of `screen` pixels.
pub fn translate(action: &Action, screen: (i32, i32)) -> SyntheticInput {
    match action.input {
        ActionInput::Keyboard { key_code, down } => SyntheticInput::Key { key_code, down },
        ActionInput::Mouse {
            x,
            y,
            button,
            down,
            wheel_delta,
        } => {
            let (abs_x, abs_y) = to_absolute(x, y, screen);
            let signal = match button {
                MouseButton::Wheel => MouseSignal::Wheel(wheel_delta),
                MouseButton::Left | MouseButton::Right | MouseButton::Middle if down => {
                    MouseSignal::Press(button)
                }
                MouseButton::Left | MouseButton::Right | MouseButton::Middle => {
                    MouseSignal::Release(button)
                }
                MouseButton::Move | MouseButton::None => MouseSignal::Move,
            };
            SyntheticInput::Mouse {
                abs_x,
                abs_y,
                signal,
            }
        }
    }
}

/// Synthetic-input facility of the host OS (implemented by mimic-platform).
pub trait InputInjector: Send + Sync {
    /// Primary display resolution in pixels.
    fn screen_size(&self) -> (i32, i32);

    fn send(&self, input: &SyntheticInput) -> MacroResult<()>;

    /// Called once on a fresh playback thread before the first action.
    fn prepare_thread(&self) {}
}

/// Stateless apart from its failure counter: one action in, one injection out.
pub struct ActionExecutor {
    injector: Arc<dyn InputInjector>,
    failures: AtomicU64,
}

impl ActionExecutor {
    pub fn new(injector: Arc<dyn InputInjector>) -> Self {
        Self {
            injector,
            failures: AtomicU64::new(0),
        }
    }

    /// Inject one action. Returns false (and counts) on failure; never panics
    /// or aborts the caller's sequence.
    pub fn execute(&self, action: &Action) -> bool {
        let input = translate(action, self.injector.screen_size());
        debug!(?input, "injecting");
        match self.injector.send(&input) {
            Ok(()) => true,
            Err(e) => {
                let total = self.failures.fetch_add(1, Ordering::Relaxed) + 1;
                warn!(error = %e, failures = total, "action injection failed");
                false
            }
        }
    }

    pub fn prepare_thread(&self) {
        self.injector.prepare_thread();
    }

    /// Failed injections since construction.
    pub fn failure_count(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }
}
