//! mimic-platform: OS boundary for mimic.
//!
//! - `input_hook`: system-wide keyboard/mouse capture implementing
//!   [`mimic_core::InputHook`]
//! - `injector`: synthetic input implementing [`mimic_core::InputInjector`]
//! - `keycode`: virtual-key translation for the `enigo` / `rdev` backends
//! - `dpi`: pixel-space setup shared by hooks and injectors

mod dpi;
mod error;
mod injector;
mod input_hook;
pub mod keycode;

pub use dpi::set_dpi_aware;
pub use error::{PlatformError, PlatformResult};
pub use injector::{create_injector, EnigoInjector, NoopInjector, FALLBACK_SCREEN};
pub use input_hook::{create_hooks, supports_suppression};

#[cfg(windows)]
pub use injector::SendInputInjector;

#[cfg(windows)]
pub use input_hook::{HookKind, LowLevelHook};

#[cfg(not(windows))]
pub use input_hook::RdevHook;
