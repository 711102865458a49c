//! Translation between virtual-key codes and the key types of `enigo` and
//! `rdev`, so recordings are portable between backends.

use crate::{PlatformError, PlatformResult};
use enigo::Key;
use mimic_core::keys::*;

/// Map a virtual-key code to the key enigo should press.
pub fn vk_to_enigo(vk: u32) -> PlatformResult<Key> {
    let key = match vk {
        VK_BACK => Key::Backspace,
        VK_TAB => Key::Tab,
        VK_RETURN => Key::Return,
        VK_SHIFT | VK_LSHIFT => Key::Shift,
        VK_RSHIFT => Key::RShift,
        VK_CONTROL | VK_LCONTROL => Key::Control,
        VK_RCONTROL => Key::RControl,
        // enigo 0.3 doesn't distinguish left/right Alt
        VK_MENU | VK_LMENU | VK_RMENU => Key::Alt,
        VK_PAUSE => Key::Pause,
        VK_CAPITAL => Key::CapsLock,
        VK_ESCAPE => Key::Escape,
        VK_SPACE => Key::Space,
        VK_PRIOR => Key::PageUp,
        VK_NEXT => Key::PageDown,
        VK_END => Key::End,
        VK_HOME => Key::Home,
        VK_LEFT => Key::LeftArrow,
        VK_UP => Key::UpArrow,
        VK_RIGHT => Key::RightArrow,
        VK_DOWN => Key::DownArrow,
        VK_SNAPSHOT => Key::PrintScr,
        VK_INSERT => Key::Insert,
        VK_DELETE => Key::Delete,
        VK_LWIN | VK_RWIN => Key::Meta,
        VK_NUMLOCK => Key::Numlock,
        0x70 => Key::F1,
        0x71 => Key::F2,
        0x72 => Key::F3,
        0x73 => Key::F4,
        0x74 => Key::F5,
        0x75 => Key::F6,
        0x76 => Key::F7,
        0x77 => Key::F8,
        0x78 => Key::F9,
        0x79 => Key::F10,
        0x7A => Key::F11,
        0x7B => Key::F12,
        _ => Key::Unicode(vk_to_char(vk).ok_or(PlatformError::UnmappedKey(vk))?),
    };
    Ok(key)
}

/// Character produced by a printable key on a US layout, unshifted.
fn vk_to_char(vk: u32) -> Option<char> {
    match vk {
        0x30..=0x39 => char::from_u32(vk),
        0x41..=0x5A => char::from_u32(vk).map(|c| c.to_ascii_lowercase()),
        0x60..=0x69 => char::from_u32(vk - VK_NUMPAD0 + 0x30),
        VK_MULTIPLY => Some('*'),
        VK_ADD => Some('+'),
        VK_SUBTRACT => Some('-'),
        VK_DECIMAL => Some('.'),
        VK_DIVIDE => Some('/'),
        VK_OEM_1 => Some(';'),
        VK_OEM_PLUS => Some('='),
        VK_OEM_COMMA => Some(','),
        VK_OEM_MINUS => Some('-'),
        VK_OEM_PERIOD => Some('.'),
        VK_OEM_2 => Some('/'),
        VK_OEM_3 => Some('`'),
        VK_OEM_4 => Some('['),
        VK_OEM_5 | VK_OEM_102 => Some('\\'),
        VK_OEM_6 => Some(']'),
        VK_OEM_7 => Some('\''),
        _ => None,
    }
}

/// Map a key reported by rdev to its virtual-key code.
pub fn rdev_to_vk(key: rdev::Key) -> Option<u32> {
    use rdev::Key as K;

    let vk = match key {
        K::Alt => VK_LMENU,
        K::AltGr => VK_RMENU,
        K::Backspace => VK_BACK,
        K::CapsLock => VK_CAPITAL,
        K::ControlLeft => VK_LCONTROL,
        K::ControlRight => VK_RCONTROL,
        K::Delete => VK_DELETE,
        K::DownArrow => VK_DOWN,
        K::End => VK_END,
        K::Escape => VK_ESCAPE,
        K::F1 => 0x70,
        K::F2 => 0x71,
        K::F3 => 0x72,
        K::F4 => 0x73,
        K::F5 => 0x74,
        K::F6 => 0x75,
        K::F7 => 0x76,
        K::F8 => 0x77,
        K::F9 => 0x78,
        K::F10 => 0x79,
        K::F11 => 0x7A,
        K::F12 => 0x7B,
        K::Home => VK_HOME,
        K::LeftArrow => VK_LEFT,
        K::MetaLeft => VK_LWIN,
        K::MetaRight => VK_RWIN,
        K::PageDown => VK_NEXT,
        K::PageUp => VK_PRIOR,
        K::Return | K::KpReturn => VK_RETURN,
        K::RightArrow => VK_RIGHT,
        K::ShiftLeft => VK_LSHIFT,
        K::ShiftRight => VK_RSHIFT,
        K::Space => VK_SPACE,
        K::Tab => VK_TAB,
        K::UpArrow => VK_UP,
        K::PrintScreen => VK_SNAPSHOT,
        K::ScrollLock => VK_SCROLL,
        K::Pause => VK_PAUSE,
        K::NumLock => VK_NUMLOCK,
        K::BackQuote => VK_OEM_3,
        K::Num0 => VK_0,
        K::Num1 => VK_0 + 1,
        K::Num2 => VK_0 + 2,
        K::Num3 => VK_0 + 3,
        K::Num4 => VK_0 + 4,
        K::Num5 => VK_0 + 5,
        K::Num6 => VK_0 + 6,
        K::Num7 => VK_0 + 7,
        K::Num8 => VK_0 + 8,
        K::Num9 => VK_0 + 9,
        K::Minus => VK_OEM_MINUS,
        K::Equal => VK_OEM_PLUS,
        K::KeyA => VK_A,
        K::KeyB => VK_A + 1,
        K::KeyC => VK_A + 2,
        K::KeyD => VK_A + 3,
        K::KeyE => VK_A + 4,
        K::KeyF => VK_A + 5,
        K::KeyG => VK_A + 6,
        K::KeyH => VK_A + 7,
        K::KeyI => VK_A + 8,
        K::KeyJ => VK_A + 9,
        K::KeyK => VK_A + 10,
        K::KeyL => VK_A + 11,
        K::KeyM => VK_A + 12,
        K::KeyN => VK_A + 13,
        K::KeyO => VK_A + 14,
        K::KeyP => VK_A + 15,
        K::KeyQ => VK_A + 16,
        K::KeyR => VK_A + 17,
        K::KeyS => VK_A + 18,
        K::KeyT => VK_A + 19,
        K::KeyU => VK_A + 20,
        K::KeyV => VK_A + 21,
        K::KeyW => VK_A + 22,
        K::KeyX => VK_A + 23,
        K::KeyY => VK_A + 24,
        K::KeyZ => VK_A + 25,
        K::LeftBracket => VK_OEM_4,
        K::RightBracket => VK_OEM_6,
        K::SemiColon => VK_OEM_1,
        K::Quote => VK_OEM_7,
        K::BackSlash => VK_OEM_5,
        K::IntlBackslash => VK_OEM_102,
        K::Comma => VK_OEM_COMMA,
        K::Dot => VK_OEM_PERIOD,
        K::Slash => VK_OEM_2,
        K::Insert => VK_INSERT,
        K::KpMinus => VK_SUBTRACT,
        K::KpPlus => VK_ADD,
        K::KpMultiply => VK_MULTIPLY,
        K::KpDivide => VK_DIVIDE,
        K::Kp0 => VK_NUMPAD0,
        K::Kp1 => VK_NUMPAD0 + 1,
        K::Kp2 => VK_NUMPAD0 + 2,
        K::Kp3 => VK_NUMPAD0 + 3,
        K::Kp4 => VK_NUMPAD0 + 4,
        K::Kp5 => VK_NUMPAD0 + 5,
        K::Kp6 => VK_NUMPAD0 + 6,
        K::Kp7 => VK_NUMPAD0 + 7,
        K::Kp8 => VK_NUMPAD0 + 8,
        K::Kp9 => VK_NUMPAD0 + 9,
        K::KpDelete => VK_DECIMAL,
        K::Function | K::Unknown(_) => return None,
    };
    Some(vk)
}
