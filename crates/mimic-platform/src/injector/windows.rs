//! `SendInput` injector.

use crate::{PlatformError, PlatformResult};
use mimic_core::keys::{
    VK_DELETE, VK_DIVIDE, VK_DOWN, VK_END, VK_HOME, VK_INSERT, VK_LEFT, VK_LWIN, VK_NEXT,
    VK_NUMLOCK, VK_PRIOR, VK_RCONTROL, VK_RIGHT, VK_RMENU, VK_RWIN, VK_SNAPSHOT, VK_UP,
};
use mimic_core::{InputInjector, MacroResult, MouseButton, MouseSignal, SyntheticInput};
use tracing::{trace, warn};
use windows_sys::Win32::System::Threading::{
    GetCurrentThread, SetThreadPriority, THREAD_PRIORITY_HIGHEST,
};
use windows_sys::Win32::UI::Input::KeyboardAndMouse::{
    SendInput, INPUT, INPUT_0, INPUT_KEYBOARD, INPUT_MOUSE, KEYBDINPUT, KEYEVENTF_EXTENDEDKEY,
    KEYEVENTF_KEYUP, MOUSEEVENTF_ABSOLUTE, MOUSEINPUT, MOUSEEVENTF_LEFTDOWN, MOUSEEVENTF_LEFTUP,
    MOUSEEVENTF_MIDDLEDOWN, MOUSEEVENTF_MIDDLEUP, MOUSEEVENTF_MOVE, MOUSEEVENTF_RIGHTDOWN,
    MOUSEEVENTF_RIGHTUP, MOUSEEVENTF_WHEEL,
};
use windows_sys::Win32::UI::WindowsAndMessaging::{GetSystemMetrics, SM_CXSCREEN, SM_CYSCREEN};

/// Injects through `SendInput`, one call per action. Mouse positions are
/// sent in the 0..65535 absolute space, so no pixel rounding happens here.
#[derive(Default)]
pub struct SendInputInjector;

impl SendInputInjector {
    pub fn new() -> Self {
        Self
    }
}

impl InputInjector for SendInputInjector {
    fn screen_size(&self) -> (i32, i32) {
        let (w, h) = unsafe { (GetSystemMetrics(SM_CXSCREEN), GetSystemMetrics(SM_CYSCREEN)) };
        if w > 0 && h > 0 {
            (w, h)
        } else {
            super::FALLBACK_SCREEN
        }
    }

    fn send(&self, input: &SyntheticInput) -> MacroResult<()> {
        let raw = match *input {
            SyntheticInput::Key { key_code, down } => key_input(key_code, down),
            SyntheticInput::Mouse {
                abs_x,
                abs_y,
                signal,
            } => mouse_input(abs_x, abs_y, signal)?,
        };
        Ok(send_one(&raw)?)
    }

    fn prepare_thread(&self) {
        let ok = unsafe { SetThreadPriority(GetCurrentThread(), THREAD_PRIORITY_HIGHEST) };
        if ok == 0 {
            warn!("SetThreadPriority failed, playback runs at normal priority");
        }
    }
}

fn is_extended(vk: u32) -> bool {
    matches!(
        vk,
        VK_PRIOR
            | VK_NEXT
            | VK_END
            | VK_HOME
            | VK_LEFT
            | VK_UP
            | VK_RIGHT
            | VK_DOWN
            | VK_SNAPSHOT
            | VK_INSERT
            | VK_DELETE
            | VK_LWIN
            | VK_RWIN
            | VK_NUMLOCK
            | VK_DIVIDE
            | VK_RCONTROL
            | VK_RMENU
    )
}

fn key_input(vk: u32, down: bool) -> INPUT {
    let mut flags = 0;
    if !down {
        flags |= KEYEVENTF_KEYUP;
    }
    if is_extended(vk) {
        flags |= KEYEVENTF_EXTENDEDKEY;
    }

    INPUT {
        r#type: INPUT_KEYBOARD,
        Anonymous: INPUT_0 {
            ki: KEYBDINPUT {
                wVk: vk as u16,
                wScan: 0,
                dwFlags: flags,
                time: 0,
                dwExtraInfo: 0,
            },
        },
    }
}

fn mouse_input(abs_x: i32, abs_y: i32, signal: MouseSignal) -> PlatformResult<INPUT> {
    let mut data: i32 = 0;
    let extra = match signal {
        MouseSignal::Move => 0,
        MouseSignal::Press(MouseButton::Left) => MOUSEEVENTF_LEFTDOWN,
        MouseSignal::Release(MouseButton::Left) => MOUSEEVENTF_LEFTUP,
        MouseSignal::Press(MouseButton::Right) => MOUSEEVENTF_RIGHTDOWN,
        MouseSignal::Release(MouseButton::Right) => MOUSEEVENTF_RIGHTUP,
        MouseSignal::Press(MouseButton::Middle) => MOUSEEVENTF_MIDDLEDOWN,
        MouseSignal::Release(MouseButton::Middle) => MOUSEEVENTF_MIDDLEUP,
        MouseSignal::Wheel(delta) => {
            data = delta;
            MOUSEEVENTF_WHEEL
        }
        MouseSignal::Press(other) | MouseSignal::Release(other) => {
            return Err(PlatformError::InjectionFailed(format!("{other:?} is not a button")))
        }
    };

    Ok(INPUT {
        r#type: INPUT_MOUSE,
        Anonymous: INPUT_0 {
            mi: MOUSEINPUT {
                dx: abs_x,
                dy: abs_y,
                mouseData: data as _,
                dwFlags: MOUSEEVENTF_MOVE | MOUSEEVENTF_ABSOLUTE | extra,
                time: 0,
                dwExtraInfo: 0,
            },
        },
    })
}

fn send_one(input: &INPUT) -> PlatformResult<()> {
    let sent = unsafe { SendInput(1, input, std::mem::size_of::<INPUT>() as i32) };
    if sent != 1 {
        return Err(PlatformError::InjectionFailed(format!(
            "SendInput rejected the input: {}",
            std::io::Error::last_os_error()
        )));
    }
    trace!("SendInput ok");
    Ok(())
}
