//! rdev-based hook for platforms without a native backend.
//!
//! `rdev::listen` blocks its thread for the life of the process and cannot
//! be cancelled, so uninstalling only deactivates delivery; a later install
//! reuses the running listener.

use crate::keycode::rdev_to_vk;
use crate::PlatformError;
use crossbeam_channel::{bounded, RecvTimeoutError};
use mimic_core::{CaptureDispatcher, CaptureInput, InputHook, MacroResult, MouseButton};
use rdev::{listen, Event, EventType};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{error, info, trace};

/// How long `listen` gets to fail before the hook counts as installed.
const LISTEN_GRACE: Duration = Duration::from_millis(250);

/// rdev reports one unit per wheel notch.
const WHEEL_DELTA: i32 = 120;

pub struct RdevHook {
    dispatcher: CaptureDispatcher,
    active: Arc<AtomicBool>,
    listener: Option<JoinHandle<()>>,
}

impl RdevHook {
    pub fn new(dispatcher: CaptureDispatcher) -> Self {
        Self {
            dispatcher,
            active: Arc::new(AtomicBool::new(false)),
            listener: None,
        }
    }
}

impl InputHook for RdevHook {
    fn install(&mut self) -> MacroResult<()> {
        if self.active.load(Ordering::Acquire) {
            return Ok(());
        }
        if self.listener.as_ref().is_some_and(|t| !t.is_finished()) {
            self.active.store(true, Ordering::Release);
            info!("Input hook reactivated (rdev)");
            return Ok(());
        }

        self.active.store(true, Ordering::Release);
        let (err_tx, err_rx) = bounded::<String>(1);
        let active = self.active.clone();
        let dispatcher = self.dispatcher.clone();
        let listener = thread::Builder::new()
            .name("mimic-rdev-hook".into())
            .spawn(move || {
                let mut translator = Translator::default();
                let callback = move |event: Event| {
                    if !active.load(Ordering::Acquire) {
                        return;
                    }
                    if let Some(input) = translator.translate(&event.event_type) {
                        // rdev cannot tell synthetic input apart.
                        dispatcher.dispatch(input, false, Instant::now());
                    }
                };
                if let Err(e) = listen(callback) {
                    let _ = err_tx.send(format!("{e:?}"));
                }
            })
            .map_err(|e| PlatformError::HookFailed(e.to_string()))?;

        match err_rx.recv_timeout(LISTEN_GRACE) {
            Err(RecvTimeoutError::Timeout) => {
                self.listener = Some(listener);
                info!("Input hook installed (rdev)");
                Ok(())
            }
            Ok(msg) => {
                self.active.store(false, Ordering::Release);
                error!(%msg, "rdev listen failed");
                Err(PlatformError::HookFailed(msg).into())
            }
            Err(RecvTimeoutError::Disconnected) => {
                self.active.store(false, Ordering::Release);
                Err(PlatformError::HookFailed("rdev listener exited".into()).into())
            }
        }
    }

    fn uninstall(&mut self) {
        if self.active.swap(false, Ordering::AcqRel) {
            info!("Input hook deactivated (rdev)");
        }
    }

    fn is_installed(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

/// Turns rdev events into capture inputs. Button events carry no position in
/// rdev, so the last reported pointer position is used.
#[derive(Default)]
struct Translator {
    x: i32,
    y: i32,
}

impl Translator {
    fn translate(&mut self, event: &EventType) -> Option<CaptureInput> {
        let input = match *event {
            EventType::KeyPress(key) | EventType::KeyRelease(key) => {
                let Some(key_code) = rdev_to_vk(key) else {
                    trace!(?key, "unmapped key ignored");
                    return None;
                };
                CaptureInput::Key {
                    key_code,
                    down: matches!(event, EventType::KeyPress(_)),
                }
            }
            EventType::MouseMove { x, y } => {
                self.x = x.round() as i32;
                self.y = y.round() as i32;
                self.mouse(MouseButton::Move, false, 0)
            }
            EventType::ButtonPress(button) => self.mouse(map_button(button)?, true, 0),
            EventType::ButtonRelease(button) => self.mouse(map_button(button)?, false, 0),
            EventType::Wheel { delta_y, .. } if delta_y != 0 => {
                self.mouse(MouseButton::Wheel, false, delta_y as i32 * WHEEL_DELTA)
            }
            EventType::Wheel { .. } => return None,
        };
        Some(input)
    }

    fn mouse(&self, button: MouseButton, down: bool, wheel_delta: i32) -> CaptureInput {
        CaptureInput::Mouse {
            x: self.x,
            y: self.y,
            button,
            down,
            wheel_delta,
        }
    }
}

fn map_button(button: rdev::Button) -> Option<MouseButton> {
    match button {
        rdev::Button::Left => Some(MouseButton::Left),
        rdev::Button::Right => Some(MouseButton::Right),
        rdev::Button::Middle => Some(MouseButton::Middle),
        rdev::Button::Unknown(_) => None,
    }
}
