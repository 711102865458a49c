//! Windows low-level hooks.
//!
//! Each hook owns a thread that installs it, pumps messages until `WM_QUIT`
//! and unhooks. The dispatcher lives in a thread-local of that thread, so a
//! hook instance never shares callback state with another.

use crate::PlatformError;
use crossbeam_channel::bounded;
use mimic_core::{CaptureDispatcher, CaptureInput, InputHook, MacroResult, MouseButton};
use std::cell::RefCell;
use std::thread::{self, JoinHandle};
use std::time::Instant;
use tracing::{debug, error, info};
use windows_sys::Win32::Foundation::{LPARAM, LRESULT, WPARAM};
use windows_sys::Win32::System::LibraryLoader::GetModuleHandleW;
use windows_sys::Win32::System::Threading::GetCurrentThreadId;
use windows_sys::Win32::UI::WindowsAndMessaging::{
    CallNextHookEx, DispatchMessageW, GetMessageW, PeekMessageW, PostThreadMessageW,
    SetWindowsHookExW, UnhookWindowsHookEx, KBDLLHOOKSTRUCT, LLKHF_INJECTED, LLMHF_INJECTED, MSG,
    MSLLHOOKSTRUCT, PM_NOREMOVE, WH_KEYBOARD_LL, WH_MOUSE_LL, WM_KEYDOWN, WM_KEYUP,
    WM_LBUTTONDOWN, WM_LBUTTONUP, WM_MBUTTONDOWN, WM_MBUTTONUP, WM_MOUSEMOVE, WM_MOUSEWHEEL,
    WM_QUIT, WM_RBUTTONDOWN, WM_RBUTTONUP, WM_SYSKEYDOWN, WM_SYSKEYUP,
};

thread_local! {
    static DISPATCHER: RefCell<Option<CaptureDispatcher>> = const { RefCell::new(None) };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookKind {
    Keyboard,
    Mouse,
}

impl HookKind {
    fn name(self) -> &'static str {
        match self {
            HookKind::Keyboard => "keyboard",
            HookKind::Mouse => "mouse",
        }
    }
}

pub struct LowLevelHook {
    kind: HookKind,
    dispatcher: CaptureDispatcher,
    thread: Option<JoinHandle<()>>,
    thread_id: u32,
}

impl LowLevelHook {
    pub fn new(kind: HookKind, dispatcher: CaptureDispatcher) -> Self {
        Self {
            kind,
            dispatcher,
            thread: None,
            thread_id: 0,
        }
    }
}

impl InputHook for LowLevelHook {
    fn install(&mut self) -> MacroResult<()> {
        if self.thread.is_some() {
            return Ok(());
        }

        let kind = self.kind;
        let dispatcher = self.dispatcher.clone();
        let (ready_tx, ready_rx) = bounded::<Result<u32, String>>(1);
        let thread = thread::Builder::new()
            .name(format!("mimic-{}-hook", kind.name()))
            .spawn(move || run_hook_thread(kind, dispatcher, ready_tx))
            .map_err(|e| PlatformError::HookFailed(e.to_string()))?;

        let outcome = ready_rx.recv().unwrap_or_else(|_| {
            Err("hook thread exited before reporting".to_string())
        });
        match outcome {
            Ok(thread_id) => {
                self.thread_id = thread_id;
                self.thread = Some(thread);
                info!(kind = kind.name(), "Low-level hook installed");
                Ok(())
            }
            Err(msg) => {
                let _ = thread.join();
                error!(kind = kind.name(), %msg, "Low-level hook refused");
                Err(PlatformError::HookFailed(format!("{} hook: {msg}", kind.name())).into())
            }
        }
    }

    fn uninstall(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        unsafe { PostThreadMessageW(self.thread_id, WM_QUIT, 0, 0) };
        let _ = thread.join();
        self.thread_id = 0;
        info!(kind = self.kind.name(), "Low-level hook removed");
    }

    fn is_installed(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl Drop for LowLevelHook {
    fn drop(&mut self) {
        self.uninstall();
    }
}

fn run_hook_thread(
    kind: HookKind,
    dispatcher: CaptureDispatcher,
    ready_tx: crossbeam_channel::Sender<Result<u32, String>>,
) {
    let mut msg: MSG = unsafe { std::mem::zeroed() };
    // Force creation of the message queue so WM_QUIT can be posted right away.
    unsafe { PeekMessageW(&mut msg, std::ptr::null_mut(), 0, 0, PM_NOREMOVE) };
    DISPATCHER.with(|d| *d.borrow_mut() = Some(dispatcher));

    let hook = unsafe {
        let module = GetModuleHandleW(std::ptr::null());
        match kind {
            HookKind::Keyboard => {
                SetWindowsHookExW(WH_KEYBOARD_LL, Some(keyboard_proc), module, 0)
            }
            HookKind::Mouse => SetWindowsHookExW(WH_MOUSE_LL, Some(mouse_proc), module, 0),
        }
    };
    if hook.is_null() {
        let _ = ready_tx.send(Err(std::io::Error::last_os_error().to_string()));
        return;
    }
    let _ = ready_tx.send(Ok(unsafe { GetCurrentThreadId() }));
    debug!(kind = kind.name(), "Hook message loop running");

    loop {
        let ret = unsafe { GetMessageW(&mut msg, std::ptr::null_mut(), 0, 0) };
        if ret <= 0 {
            break;
        }
        unsafe { DispatchMessageW(&msg) };
    }

    unsafe { UnhookWindowsHookEx(hook) };
    DISPATCHER.with(|d| d.borrow_mut().take());
    debug!(kind = kind.name(), "Hook thread exiting");
}

fn dispatch(input: CaptureInput, injected: bool) -> bool {
    DISPATCHER.with(|d| {
        d.borrow()
            .as_ref()
            .is_some_and(|dispatcher| dispatcher.dispatch(input, injected, Instant::now()))
    })
}

unsafe extern "system" fn keyboard_proc(code: i32, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
    if code >= 0 {
        let kb = &*(lparam as *const KBDLLHOOKSTRUCT);
        let down = match wparam as u32 {
            WM_KEYDOWN | WM_SYSKEYDOWN => Some(true),
            WM_KEYUP | WM_SYSKEYUP => Some(false),
            _ => None,
        };
        if let Some(down) = down {
            let input = CaptureInput::Key {
                key_code: kb.vkCode,
                down,
            };
            if dispatch(input, kb.flags & LLKHF_INJECTED != 0) {
                return 1;
            }
        }
    }
    CallNextHookEx(std::ptr::null_mut(), code, wparam, lparam)
}

unsafe extern "system" fn mouse_proc(code: i32, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
    if code >= 0 {
        let ms = &*(lparam as *const MSLLHOOKSTRUCT);
        let (x, y) = (ms.pt.x, ms.pt.y);
        let mouse = |button, down, wheel_delta| CaptureInput::Mouse {
            x,
            y,
            button,
            down,
            wheel_delta,
        };

        let input = match wparam as u32 {
            WM_MOUSEMOVE => Some(mouse(MouseButton::Move, false, 0)),
            WM_LBUTTONDOWN => Some(mouse(MouseButton::Left, true, 0)),
            WM_LBUTTONUP => Some(mouse(MouseButton::Left, false, 0)),
            WM_RBUTTONDOWN => Some(mouse(MouseButton::Right, true, 0)),
            WM_RBUTTONUP => Some(mouse(MouseButton::Right, false, 0)),
            WM_MBUTTONDOWN => Some(mouse(MouseButton::Middle, true, 0)),
            WM_MBUTTONUP => Some(mouse(MouseButton::Middle, false, 0)),
            WM_MOUSEWHEEL => {
                let delta = ((ms.mouseData >> 16) as i16) as i32;
                Some(mouse(MouseButton::Wheel, false, delta))
            }
            _ => None,
        };

        if let Some(input) = input {
            if dispatch(input, ms.flags & LLMHF_INJECTED != 0) {
                return 1;
            }
        }
    }
    CallNextHookEx(std::ptr::null_mut(), code, wparam, lparam)
}
