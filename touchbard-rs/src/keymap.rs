/* Remap tables for the top key row (F1..F12 followed by Esc).
 *
 * In `FnMode::Normal` the row produces special keys and holding Fn gives
 * the literal F-keys; `FnMode::FKeys` swaps the two. */

use crate::config::FnMode;

pub const TOP_ROW_KEYS: usize = 13;

/* Linux input key codes */
pub const KEY_ESC: u16 = 1;
pub const KEY_F1: u16 = 59;
pub const KEY_F2: u16 = 60;
pub const KEY_F3: u16 = 61;
pub const KEY_F4: u16 = 62;
pub const KEY_F5: u16 = 63;
pub const KEY_F6: u16 = 64;
pub const KEY_F7: u16 = 65;
pub const KEY_F8: u16 = 66;
pub const KEY_F9: u16 = 67;
pub const KEY_F10: u16 = 68;
pub const KEY_F11: u16 = 87;
pub const KEY_F12: u16 = 88;
pub const KEY_MUTE: u16 = 113;
pub const KEY_VOLUMEDOWN: u16 = 114;
pub const KEY_VOLUMEUP: u16 = 115;
pub const KEY_POWER: u16 = 116;
pub const KEY_EJECTCD: u16 = 161;
pub const KEY_NEXTSONG: u16 = 163;
pub const KEY_PLAYPAUSE: u16 = 164;
pub const KEY_PREVIOUSSONG: u16 = 165;
pub const KEY_KBDILLUMDOWN: u16 = 229;
pub const KEY_KBDILLUMUP: u16 = 230;

const FKEY_ROW: [u16; TOP_ROW_KEYS] = [
    KEY_F1, KEY_F2, KEY_F3, KEY_F4, KEY_F5, KEY_F6, KEY_F7, KEY_F8, KEY_F9, KEY_F10, KEY_F11,
    KEY_F12, KEY_ESC,
];

const SPECIAL_ROW: [u16; TOP_ROW_KEYS] = [
    KEY_ESC,
    KEY_KBDILLUMDOWN,
    KEY_KBDILLUMUP,
    KEY_MUTE,
    KEY_VOLUMEDOWN,
    KEY_VOLUMEUP,
    KEY_PREVIOUSSONG,
    KEY_PLAYPAUSE,
    KEY_NEXTSONG,
    KEY_POWER,
    KEY_EJECTCD,
    KEY_MUTE,
    KEY_ESC,
];

/* The row in effect for the given mode and Fn state. */
pub fn top_row(fn_mode: FnMode, fn_held: bool) -> &'static [u16; TOP_ROW_KEYS] {
    let special = (fn_mode == FnMode::Normal) != fn_held;
    if special { &SPECIAL_ROW } else { &FKEY_ROW }
}

/* Translate a top-row key, identified by its literal code, into the code
 * that should be reported. Returns `None` for keys outside the top row. */
pub fn remap_key(code: u16, fn_mode: FnMode, fn_held: bool) -> Option<u16> {
    let position = FKEY_ROW.iter().position(|&k| k == code)?;
    Some(top_row(fn_mode, fn_held)[position])
}
