//! Human-readable names for virtual-key codes.
//!
//! Names follow the Windows Forms `Keys` enumeration because hand-written
//! mapping files tend to use those spellings.  A handful of common aliases
//! (`Return`, `Esc`, `Ctrl`, ...) are accepted when parsing but never produced
//! when formatting.
//!
//! Reference: https://learn.microsoft.com/windows/win32/inputdev/virtual-key-codes

/// Canonical name per code, indexed by code (0x00–0xFF).
///
/// Indexing is O(1); this table is consulted when logging every observed key.
const KEY_NAMES: [Option<&str>; 256] = {
    let mut t: [Option<&str>; 256] = [None; 256];

    // ── Editing and whitespace ───────────────────────────────────────────────
    t[0x08] = Some("Backspace");
    t[0x09] = Some("Tab");
    t[0x0C] = Some("Clear");
    t[0x0D] = Some("Enter");
    t[0x10] = Some("Shift");
    t[0x11] = Some("Control");
    t[0x12] = Some("Alt");
    t[0x13] = Some("Pause");
    t[0x14] = Some("CapsLock");
    t[0x1B] = Some("Escape");
    t[0x20] = Some("Space");

    // ── Navigation ───────────────────────────────────────────────────────────
    t[0x21] = Some("PageUp");
    t[0x22] = Some("PageDown");
    t[0x23] = Some("End");
    t[0x24] = Some("Home");
    t[0x25] = Some("Left");
    t[0x26] = Some("Up");
    t[0x27] = Some("Right");
    t[0x28] = Some("Down");
    t[0x2C] = Some("PrintScreen");
    t[0x2D] = Some("Insert");
    t[0x2E] = Some("Delete");

    // ── Digit row (VK_0=0x30 … VK_9=0x39) ────────────────────────────────────
    t[0x30] = Some("D0");
    t[0x31] = Some("D1");
    t[0x32] = Some("D2");
    t[0x33] = Some("D3");
    t[0x34] = Some("D4");
    t[0x35] = Some("D5");
    t[0x36] = Some("D6");
    t[0x37] = Some("D7");
    t[0x38] = Some("D8");
    t[0x39] = Some("D9");

    // ── Letters (VK_A=0x41 … VK_Z=0x5A) ──────────────────────────────────────
    t[0x41] = Some("A");
    t[0x42] = Some("B");
    t[0x43] = Some("C");
    t[0x44] = Some("D");
    t[0x45] = Some("E");
    t[0x46] = Some("F");
    t[0x47] = Some("G");
    t[0x48] = Some("H");
    t[0x49] = Some("I");
    t[0x4A] = Some("J");
    t[0x4B] = Some("K");
    t[0x4C] = Some("L");
    t[0x4D] = Some("M");
    t[0x4E] = Some("N");
    t[0x4F] = Some("O");
    t[0x50] = Some("P");
    t[0x51] = Some("Q");
    t[0x52] = Some("R");
    t[0x53] = Some("S");
    t[0x54] = Some("T");
    t[0x55] = Some("U");
    t[0x56] = Some("V");
    t[0x57] = Some("W");
    t[0x58] = Some("X");
    t[0x59] = Some("Y");
    t[0x5A] = Some("Z");

    t[0x5B] = Some("LWin");
    t[0x5C] = Some("RWin");
    t[0x5D] = Some("Apps");
    t[0x5F] = Some("Sleep");

    // ── Numeric keypad ───────────────────────────────────────────────────────
    t[0x60] = Some("NumPad0");
    t[0x61] = Some("NumPad1");
    t[0x62] = Some("NumPad2");
    t[0x63] = Some("NumPad3");
    t[0x64] = Some("NumPad4");
    t[0x65] = Some("NumPad5");
    t[0x66] = Some("NumPad6");
    t[0x67] = Some("NumPad7");
    t[0x68] = Some("NumPad8");
    t[0x69] = Some("NumPad9");
    t[0x6A] = Some("Multiply");
    t[0x6B] = Some("Add");
    t[0x6C] = Some("Separator");
    t[0x6D] = Some("Subtract");
    t[0x6E] = Some("Decimal");
    t[0x6F] = Some("Divide");

    // ── Function keys (VK_F1=0x70 … VK_F24=0x87) ─────────────────────────────
    t[0x70] = Some("F1");
    t[0x71] = Some("F2");
    t[0x72] = Some("F3");
    t[0x73] = Some("F4");
    t[0x74] = Some("F5");
    t[0x75] = Some("F6");
    t[0x76] = Some("F7");
    t[0x77] = Some("F8");
    t[0x78] = Some("F9");
    t[0x79] = Some("F10");
    t[0x7A] = Some("F11");
    t[0x7B] = Some("F12");
    t[0x7C] = Some("F13");
    t[0x7D] = Some("F14");
    t[0x7E] = Some("F15");
    t[0x7F] = Some("F16");
    t[0x80] = Some("F17");
    t[0x81] = Some("F18");
    t[0x82] = Some("F19");
    t[0x83] = Some("F20");
    t[0x84] = Some("F21");
    t[0x85] = Some("F22");
    t[0x86] = Some("F23");
    t[0x87] = Some("F24");

    t[0x90] = Some("NumLock");
    t[0x91] = Some("Scroll");

    // ── Sided modifiers ──────────────────────────────────────────────────────
    t[0xA0] = Some("LShiftKey");
    t[0xA1] = Some("RShiftKey");
    t[0xA2] = Some("LControlKey");
    t[0xA3] = Some("RControlKey");
    t[0xA4] = Some("LMenu");
    t[0xA5] = Some("RMenu");

    // ── Media ────────────────────────────────────────────────────────────────
    t[0xAD] = Some("VolumeMute");
    t[0xAE] = Some("VolumeDown");
    t[0xAF] = Some("VolumeUp");
    t[0xB0] = Some("MediaNextTrack");
    t[0xB1] = Some("MediaPreviousTrack");
    t[0xB2] = Some("MediaStop");
    t[0xB3] = Some("MediaPlayPause");

    // ── OEM punctuation (US layout legends) ──────────────────────────────────
    t[0xBA] = Some("OemSemicolon");
    t[0xBB] = Some("OemPlus");
    t[0xBC] = Some("OemComma");
    t[0xBD] = Some("OemMinus");
    t[0xBE] = Some("OemPeriod");
    t[0xBF] = Some("OemQuestion");
    t[0xC0] = Some("OemTilde");
    t[0xDB] = Some("OemOpenBrackets");
    t[0xDC] = Some("OemPipe");
    t[0xDD] = Some("OemCloseBrackets");
    t[0xDE] = Some("OemQuotes");
    t[0xE2] = Some("OemBackslash");

    t
};

/// Extra spellings accepted by [`code_for_name`].
const ALIASES: &[(&str, u16)] = &[
    ("Back", 0x08),
    ("Return", 0x0D),
    ("Ctrl", 0x11),
    ("Menu", 0x12),
    ("Capital", 0x14),
    ("Esc", 0x1B),
    ("Prior", 0x21),
    ("Next", 0x22),
    ("Del", 0x2E),
    ("ScrollLock", 0x91),
    ("LShift", 0xA0),
    ("RShift", 0xA1),
    ("LCtrl", 0xA2),
    ("RCtrl", 0xA3),
    ("LAlt", 0xA4),
    ("RAlt", 0xA5),
];

/// Returns the canonical name of `code`, if it has one.
pub(crate) fn name_of(code: u16) -> Option<&'static str> {
    KEY_NAMES.get(code as usize).copied().flatten()
}

/// Resolves a key name (case-insensitive) to its code.
///
/// Linear scan; only used when parsing configuration and CLI input.
pub(crate) fn code_for_name(name: &str) -> Option<u16> {
    KEY_NAMES
        .iter()
        .enumerate()
        .find_map(|(code, entry)| match entry {
            Some(n) if n.eq_ignore_ascii_case(name) => Some(code as u16),
            _ => None,
        })
        .or_else(|| {
            ALIASES
                .iter()
                .find(|(alias, _)| alias.eq_ignore_ascii_case(name))
                .map(|&(_, code)| code)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_letters_and_digits_have_names() {
        assert_eq!(name_of(0x41), Some("A"));
        assert_eq!(name_of(0x5A), Some("Z"));
        assert_eq!(name_of(0x30), Some("D0"));
    }

    #[test]
    fn test_unassigned_code_has_no_name() {
        assert_eq!(name_of(0x07), None);
        assert_eq!(name_of(0xFF), None);
        assert_eq!(name_of(0x1234), None);
    }

    #[test]
    fn test_code_for_name_is_case_insensitive() {
        assert_eq!(code_for_name("space"), Some(0x20));
        assert_eq!(code_for_name("SPACE"), Some(0x20));
        assert_eq!(code_for_name("f12"), Some(0x7B));
    }

    #[test]
    fn test_aliases_resolve_but_are_not_canonical() {
        assert_eq!(code_for_name("Return"), Some(0x0D));
        assert_eq!(name_of(0x0D), Some("Enter"));
        assert_eq!(code_for_name("esc"), Some(0x1B));
    }

    #[test]
    fn test_every_canonical_name_round_trips() {
        for code in 0u16..256 {
            if let Some(name) = name_of(code) {
                assert_eq!(code_for_name(name), Some(code), "name {name} must resolve back");
            }
        }
    }
}
