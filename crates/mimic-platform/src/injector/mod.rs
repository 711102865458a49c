//! Synthetic input injection.
//!
//! - Windows: `SendInput` with absolute coordinates (`windows.rs`)
//! - Elsewhere: `enigo`, with absolute coordinates mapped back to pixels
//!   of the main display

use crate::keycode::vk_to_enigo;
use crate::{PlatformError, PlatformResult};
use enigo::{Axis, Button, Coordinate, Direction, Enigo, Keyboard, Mouse, Settings};
use mimic_core::executor::from_absolute;
use mimic_core::{InputInjector, MacroResult, MouseButton, MouseSignal, SyntheticInput};
use std::sync::{Arc, Mutex};
use tracing::{debug, trace};

#[cfg(windows)]
mod windows;

#[cfg(windows)]
pub use windows::SendInputInjector;

/// Screen size reported when the real one cannot be queried.
pub const FALLBACK_SCREEN: (i32, i32) = (1920, 1080);

/// Injector that only logs. Backs `--dry-run`.
pub struct NoopInjector {
    screen: (i32, i32),
}

impl NoopInjector {
    pub fn new(screen: (i32, i32)) -> Self {
        Self { screen }
    }
}

impl Default for NoopInjector {
    fn default() -> Self {
        Self::new(FALLBACK_SCREEN)
    }
}

impl InputInjector for NoopInjector {
    fn screen_size(&self) -> (i32, i32) {
        self.screen
    }

    fn send(&self, input: &SyntheticInput) -> MacroResult<()> {
        debug!(?input, "NoopInjector: would inject");
        Ok(())
    }
}

/// Injector backed by the `enigo` crate.
pub struct EnigoInjector {
    enigo: Mutex<Enigo>,
    screen: (i32, i32),
}

impl EnigoInjector {
    pub fn new() -> PlatformResult<Self> {
        let enigo = Enigo::new(&Settings::default()).map_err(|e| {
            PlatformError::InjectionFailed(format!("failed to create Enigo: {e}"))
        })?;
        let screen = enigo.main_display().unwrap_or(FALLBACK_SCREEN);
        debug!(?screen, "EnigoInjector ready");
        Ok(Self {
            enigo: Mutex::new(enigo),
            screen,
        })
    }

    fn inject(&self, input: &SyntheticInput) -> PlatformResult<()> {
        let mut enigo = self.enigo.lock().unwrap_or_else(|e| e.into_inner());
        let failed = |e: enigo::InputError| PlatformError::InjectionFailed(e.to_string());

        match *input {
            SyntheticInput::Key { key_code, down } => {
                let key = vk_to_enigo(key_code)?;
                enigo.key(key, direction(down)).map_err(failed)?;
            }
            SyntheticInput::Mouse {
                abs_x,
                abs_y,
                signal,
            } => {
                let (x, y) = from_absolute(abs_x, abs_y, self.screen);
                enigo.move_mouse(x, y, Coordinate::Abs).map_err(failed)?;
                match signal {
                    MouseSignal::Move => {}
                    MouseSignal::Press(button) => {
                        enigo.button(to_enigo_button(button)?, Direction::Press).map_err(failed)?
                    }
                    MouseSignal::Release(button) => enigo
                        .button(to_enigo_button(button)?, Direction::Release)
                        .map_err(failed)?,
                    MouseSignal::Wheel(delta) => {
                        let notches = wheel_notches(delta);
                        if notches != 0 {
                            enigo.scroll(notches, Axis::Vertical).map_err(failed)?;
                        }
                    }
                }
            }
        }
        trace!(?input, "injected");
        Ok(())
    }
}

impl InputInjector for EnigoInjector {
    fn screen_size(&self) -> (i32, i32) {
        self.screen
    }

    fn send(&self, input: &SyntheticInput) -> MacroResult<()> {
        Ok(self.inject(input)?)
    }
}

fn direction(down: bool) -> Direction {
    if down {
        Direction::Press
    } else {
        Direction::Release
    }
}

fn to_enigo_button(button: MouseButton) -> PlatformResult<Button> {
    match button {
        MouseButton::Left => Ok(Button::Left),
        MouseButton::Right => Ok(Button::Right),
        MouseButton::Middle => Ok(Button::Middle),
        other => Err(PlatformError::InjectionFailed(format!("{other:?} is not a button"))),
    }
}

/// Recorded deltas are 120 per notch, positive away from the user; enigo
/// scrolls down for positive amounts.
fn wheel_notches(delta: i32) -> i32 {
    -(delta / 120)
}

/// Best injector for this platform, or the logging one for dry runs.
pub fn create_injector(dry_run: bool) -> PlatformResult<Arc<dyn InputInjector>> {
    if dry_run {
        return Ok(Arc::new(NoopInjector::default()));
    }
    native_injector()
}

#[cfg(windows)]
fn native_injector() -> PlatformResult<Arc<dyn InputInjector>> {
    Ok(Arc::new(SendInputInjector::new()))
}

#[cfg(not(windows))]
fn native_injector() -> PlatformResult<Arc<dyn InputInjector>> {
    Ok(Arc::new(EnigoInjector::new()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wheel_notches_flip_sign() {
        assert_eq!(wheel_notches(120), -1);
        assert_eq!(wheel_notches(-360), 3);
        assert_eq!(wheel_notches(60), 0);
    }

    #[test]
    fn test_to_enigo_button() {
        assert!(matches!(to_enigo_button(MouseButton::Middle), Ok(Button::Middle)));
        assert!(to_enigo_button(MouseButton::Wheel).is_err());
    }

    #[test]
    fn test_noop_injector_accepts_everything() {
        let injector = NoopInjector::new((800, 600));
        assert_eq!(injector.screen_size(), (800, 600));
        let key = SyntheticInput::Key {
            key_code: 0x41,
            down: true,
        };
        assert!(injector.send(&key).is_ok());
    }
}
