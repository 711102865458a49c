//! System-wide input hooks feeding a [`CaptureDispatcher`].
//!
//! Platform implementations:
//! - Windows: `WH_KEYBOARD_LL` / `WH_MOUSE_LL` on dedicated message-loop
//!   threads (`windows_native.rs`). Handled events are suppressed.
//! - Elsewhere: `rdev::listen` (`rdev_impl.rs`). rdev cannot swallow events,
//!   so the handled flag is only advisory there.

use mimic_core::{CaptureDispatcher, InputHook};

#[cfg(windows)]
mod windows_native;

#[cfg(not(windows))]
mod rdev_impl;

#[cfg(windows)]
pub use windows_native::{HookKind, LowLevelHook};

#[cfg(not(windows))]
pub use rdev_impl::RdevHook;

/// Hooks covering keyboard and mouse on this platform, not yet installed.
#[cfg(windows)]
pub fn create_hooks(dispatcher: CaptureDispatcher) -> Vec<Box<dyn InputHook>> {
    vec![
        Box::new(LowLevelHook::new(HookKind::Keyboard, dispatcher.clone())),
        Box::new(LowLevelHook::new(HookKind::Mouse, dispatcher)),
    ]
}

/// Hooks covering keyboard and mouse on this platform, not yet installed.
#[cfg(not(windows))]
pub fn create_hooks(dispatcher: CaptureDispatcher) -> Vec<Box<dyn InputHook>> {
    vec![Box::new(RdevHook::new(dispatcher))]
}

/// Whether hooks on this platform can keep a handled event from the system.
pub const fn supports_suppression() -> bool {
    cfg!(windows)
}
