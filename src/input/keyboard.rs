use enigo::Key;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum KeyError {
    #[error("Tried to press unknown key: {0}")]
    UnknownKey(String),
}

/// Splits a `+`-joined chord name into physical keys. Fails on the first
/// component outside the key table, before any input happens.
pub fn parse_chord(chord: &str) -> Result<Vec<Key>, KeyError> {
    chord.split('+').map(parse_key).collect()
}

/// Closed chord-component-to-physical-key table. Names the model uses
/// (xdotool style, e.g. "Return") match case-insensitively; anything
/// outside the table is an error rather than a silent no-op.
pub fn parse_key(key_str: &str) -> Result<Key, KeyError> {
    let key = match key_str.to_lowercase().as_str() {
        // Letters
        "a" => Key::Unicode('a'),
        "b" => Key::Unicode('b'),
        "c" => Key::Unicode('c'),
        "d" => Key::Unicode('d'),
        "e" => Key::Unicode('e'),
        "f" => Key::Unicode('f'),
        "g" => Key::Unicode('g'),
        "h" => Key::Unicode('h'),
        "i" => Key::Unicode('i'),
        "j" => Key::Unicode('j'),
        "k" => Key::Unicode('k'),
        "l" => Key::Unicode('l'),
        "m" => Key::Unicode('m'),
        "n" => Key::Unicode('n'),
        "o" => Key::Unicode('o'),
        "p" => Key::Unicode('p'),
        "q" => Key::Unicode('q'),
        "r" => Key::Unicode('r'),
        "s" => Key::Unicode('s'),
        "t" => Key::Unicode('t'),
        "u" => Key::Unicode('u'),
        "v" => Key::Unicode('v'),
        "w" => Key::Unicode('w'),
        "x" => Key::Unicode('x'),
        "y" => Key::Unicode('y'),
        "z" => Key::Unicode('z'),

        // Numbers
        "0" => Key::Unicode('0'),
        "1" => Key::Unicode('1'),
        "2" => Key::Unicode('2'),
        "3" => Key::Unicode('3'),
        "4" => Key::Unicode('4'),
        "5" => Key::Unicode('5'),
        "6" => Key::Unicode('6'),
        "7" => Key::Unicode('7'),
        "8" => Key::Unicode('8'),
        "9" => Key::Unicode('9'),

        // Special keys
        "enter" | "return" | "kp_enter" => Key::Return,
        "tab" => Key::Tab,
        "space" => Key::Space,
        "backspace" => Key::Backspace,
        "delete" => Key::Delete,
        "escape" | "esc" => Key::Escape,
        "up" | "arrowup" => Key::UpArrow,
        "down" | "arrowdown" => Key::DownArrow,
        "left" | "arrowleft" => Key::LeftArrow,
        "right" | "arrowright" => Key::RightArrow,
        "home" => Key::Home,
        "end" => Key::End,
        "page_up" | "pageup" | "prior" => Key::PageUp,
        "page_down" | "pagedown" | "next" => Key::PageDown,

        // Function keys
        "f1" => Key::F1,
        "f2" => Key::F2,
        "f3" => Key::F3,
        "f4" => Key::F4,
        "f5" => Key::F5,
        "f6" => Key::F6,
        "f7" => Key::F7,
        "f8" => Key::F8,
        "f9" => Key::F9,
        "f10" => Key::F10,
        "f11" => Key::F11,
        "f12" => Key::F12,

        // Modifiers
        "ctrl" | "control" | "control_l" | "control_r" => Key::Control,
        "alt" | "option" | "alt_l" | "alt_r" => Key::Alt,
        "shift" | "shift_l" | "shift_r" => Key::Shift,
        "meta" | "cmd" | "command" | "win" | "super" | "super_l" => Key::Meta,

        _ => return Err(KeyError::UnknownKey(key_str.to_string())),
    };

    Ok(key)
}
