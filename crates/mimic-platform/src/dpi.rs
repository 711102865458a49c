//! DPI awareness.
//!
//! Hook coordinates and the screen size used for absolute injection must be
//! in the same pixel space. On Windows the process opts into Per-Monitor V2
//! awareness so both are physical pixels.

use std::sync::Once;

static INIT: Once = Once::new();

/// Opt into physical-pixel coordinates. Call before installing hooks.
pub fn set_dpi_aware() {
    INIT.call_once(platform_set_dpi_aware);
}

#[cfg(windows)]
fn platform_set_dpi_aware() {
    use windows_sys::Win32::UI::HiDpi::{
        SetProcessDpiAwarenessContext, DPI_AWARENESS_CONTEXT_PER_MONITOR_AWARE_V2,
    };

    let ok = unsafe { SetProcessDpiAwarenessContext(DPI_AWARENESS_CONTEXT_PER_MONITOR_AWARE_V2) };
    if ok != 0 {
        tracing::info!("Set Per-Monitor V2 DPI awareness");
    } else {
        tracing::warn!("Failed to set Per-Monitor V2 DPI awareness, coordinates may be scaled");
    }
}

#[cfg(not(windows))]
fn platform_set_dpi_aware() {
    tracing::debug!("DPI awareness is managed by the display server");
}
