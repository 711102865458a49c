//! Virtual-key codes. Recorded key codes always use this numbering,
//! whatever backend captured them.

use serde::{Deserialize, Serialize};

pub const VK_BACK: u32 = 0x08;
pub const VK_TAB: u32 = 0x09;
pub const VK_RETURN: u32 = 0x0D;
pub const VK_SHIFT: u32 = 0x10;
pub const VK_CONTROL: u32 = 0x11;
pub const VK_MENU: u32 = 0x12;
pub const VK_PAUSE: u32 = 0x13;
pub const VK_CAPITAL: u32 = 0x14;
pub const VK_ESCAPE: u32 = 0x1B;
pub const VK_SPACE: u32 = 0x20;
pub const VK_PRIOR: u32 = 0x21;
pub const VK_NEXT: u32 = 0x22;
pub const VK_END: u32 = 0x23;
pub const VK_HOME: u32 = 0x24;
pub const VK_LEFT: u32 = 0x25;
pub const VK_UP: u32 = 0x26;
pub const VK_RIGHT: u32 = 0x27;
pub const VK_DOWN: u32 = 0x28;
pub const VK_SNAPSHOT: u32 = 0x2C;
pub const VK_INSERT: u32 = 0x2D;
pub const VK_DELETE: u32 = 0x2E;
/// `'0'`; digits run to 0x39.
pub const VK_0: u32 = 0x30;
/// `'A'`; letters run to 0x5A.
pub const VK_A: u32 = 0x41;
pub const VK_LWIN: u32 = 0x5B;
pub const VK_RWIN: u32 = 0x5C;
pub const VK_NUMPAD0: u32 = 0x60;
pub const VK_MULTIPLY: u32 = 0x6A;
pub const VK_ADD: u32 = 0x6B;
pub const VK_SUBTRACT: u32 = 0x6D;
pub const VK_DECIMAL: u32 = 0x6E;
pub const VK_DIVIDE: u32 = 0x6F;
/// F1; function keys run to F24 (0x87).
pub const VK_F1: u32 = 0x70;
pub const VK_F9: u32 = 0x78;
pub const VK_F12: u32 = 0x7B;
pub const VK_NUMLOCK: u32 = 0x90;
pub const VK_SCROLL: u32 = 0x91;
pub const VK_LSHIFT: u32 = 0xA0;
pub const VK_RSHIFT: u32 = 0xA1;
pub const VK_LCONTROL: u32 = 0xA2;
pub const VK_RCONTROL: u32 = 0xA3;
pub const VK_LMENU: u32 = 0xA4;
pub const VK_RMENU: u32 = 0xA5;
pub const VK_OEM_1: u32 = 0xBA;
pub const VK_OEM_PLUS: u32 = 0xBB;
pub const VK_OEM_COMMA: u32 = 0xBC;
pub const VK_OEM_MINUS: u32 = 0xBD;
pub const VK_OEM_PERIOD: u32 = 0xBE;
pub const VK_OEM_2: u32 = 0xBF;
pub const VK_OEM_3: u32 = 0xC0;
pub const VK_OEM_4: u32 = 0xDB;
pub const VK_OEM_5: u32 = 0xDC;
pub const VK_OEM_6: u32 = 0xDD;
pub const VK_OEM_7: u32 = 0xDE;
pub const VK_OEM_102: u32 = 0xE2;

/// Modifier usable in a hotkey combo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Modifier {
    Shift,
    Control,
    Alt,
}

impl Modifier {
    /// Modifier a key code belongs to, if any. Left, right and generic codes
    /// all count.
    pub fn of(key_code: u32) -> Option<Self> {
        match key_code {
            VK_SHIFT | VK_LSHIFT | VK_RSHIFT => Some(Modifier::Shift),
            VK_CONTROL | VK_LCONTROL | VK_RCONTROL => Some(Modifier::Control),
            VK_MENU | VK_LMENU | VK_RMENU => Some(Modifier::Alt),
            _ => None,
        }
    }
}

/// Human-readable name for log lines and the CLI.
pub fn key_name(key_code: u32) -> String {
    match key_code {
        VK_BACK => "Backspace".into(),
        VK_TAB => "Tab".into(),
        VK_RETURN => "Return".into(),
        VK_SHIFT | VK_LSHIFT => "ShiftLeft".into(),
        VK_RSHIFT => "ShiftRight".into(),
        VK_CONTROL | VK_LCONTROL => "ControlLeft".into(),
        VK_RCONTROL => "ControlRight".into(),
        VK_MENU | VK_LMENU => "Alt".into(),
        VK_RMENU => "AltGr".into(),
        VK_ESCAPE => "Escape".into(),
        VK_SPACE => "Space".into(),
        0x30..=0x39 | 0x41..=0x5A => char::from_u32(key_code)
            .map(|c| c.to_string())
            .unwrap_or_default(),
        0x70..=0x87 => format!("F{}", key_code - VK_F1 + 1),
        _ => format!("0x{:02X}", key_code),
    }
}
