//! Terminal text sanitization.
//!
//! Model output is untrusted. Escape sequences in it can move the cursor,
//! rewrite the screen, set the clipboard (OSC 52) or forge hyperlinks (OSC 8),
//! so streamed text is filtered before it reaches a terminal.

use std::borrow::Cow;

const ESC: char = '\x1b';
const BEL: char = '\x07';
const C1_CSI: char = '\u{009b}';

#[derive(Clone, Copy, PartialEq, Eq)]
enum Scan {
    Text,
    /// Just saw ESC.
    Escape,
    /// Inside `ESC [` parameters, waiting for a final byte.
    Csi,
    /// Inside an OSC/DCS/PM/APC string, waiting for BEL or `ESC \`.
    Str { bel_ends: bool },
    /// Saw ESC inside a string sequence; `\` terminates it.
    StrEscape { bel_ends: bool },
    /// Two-character escape such as `ESC ( B`; swallow one more char.
    Designator,
}

/// Strip ANSI escape sequences and control characters.
///
/// Keeps `\n`, `\t` and `\r` and every printable character. Returns
/// `Cow::Borrowed` when the input is already clean.
///
/// ```
/// use weft_types::sanitize_terminal_text;
///
/// assert_eq!(sanitize_terminal_text("plain"), "plain");
/// assert_eq!(sanitize_terminal_text("a\x1b[2Jb"), "ab");
/// ```
#[must_use]
pub fn sanitize_terminal_text(input: &str) -> Cow<'_, str> {
    if !input.chars().any(is_disallowed) {
        return Cow::Borrowed(input);
    }

    let mut out = String::with_capacity(input.len());
    let mut scan = Scan::Text;

    for c in input.chars() {
        scan = match scan {
            Scan::Text => match c {
                ESC => Scan::Escape,
                C1_CSI => Scan::Csi,
                c if is_disallowed(c) => Scan::Text,
                c => {
                    out.push(c);
                    Scan::Text
                }
            },
            Scan::Escape => match c {
                '[' => Scan::Csi,
                ']' => Scan::Str { bel_ends: true },
                'P' | '^' | '_' => Scan::Str { bel_ends: false },
                '(' | ')' | '*' | '+' | '#' | ' ' => Scan::Designator,
                // Unknown or single-character command: drop the pair.
                _ => Scan::Text,
            },
            Scan::Csi => match c {
                '\x40'..='\x7e' => Scan::Text,
                '\x20'..='\x3f' => Scan::Csi,
                // Malformed sequence; resume with this char as text.
                c => {
                    if !is_disallowed(c) {
                        out.push(c);
                    }
                    Scan::Text
                }
            },
            Scan::Str { bel_ends } => match c {
                BEL if bel_ends => Scan::Text,
                ESC => Scan::StrEscape { bel_ends },
                _ => Scan::Str { bel_ends },
            },
            Scan::StrEscape { bel_ends } => match c {
                '\\' => Scan::Text,
                _ => Scan::Str { bel_ends },
            },
            Scan::Designator => Scan::Text,
        };
    }

    Cow::Owned(out)
}

fn is_disallowed(c: char) -> bool {
    match c {
        '\n' | '\t' | '\r' => false,
        '\0'..='\x1f' | '\x7f' | '\u{0080}'..='\u{009f}' => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::sanitize_terminal_text;
    use std::borrow::Cow;

    #[test]
    fn clean_text_is_borrowed() {
        let input = "Hello, world! ünïcödé 🦀";
        assert!(matches!(sanitize_terminal_text(input), Cow::Borrowed(_)));
    }

    #[test]
    fn keeps_whitespace_controls() {
        let input = "line 1\nline 2\tcol\r\n";
        assert_eq!(sanitize_terminal_text(input), input);
    }

    #[test]
    fn strips_csi_sequences() {
        assert_eq!(sanitize_terminal_text("\x1b[31mred\x1b[0m"), "red");
        assert_eq!(sanitize_terminal_text("a\u{009b}2Jb"), "ab");
    }

    #[test]
    fn strips_osc_hyperlinks_and_clipboard() {
        let link = "\x1b]8;;https://evil.example\x07click\x1b]8;;\x07";
        assert_eq!(sanitize_terminal_text(link), "click");
        let clip = "x\x1b]52;c;ZXZpbA==\x1b\\y";
        assert_eq!(sanitize_terminal_text(clip), "xy");
    }

    #[test]
    fn strips_bare_control_chars() {
        assert_eq!(sanitize_terminal_text("a\x07b\x08c\x7fd"), "abcd");
    }

    #[test]
    fn strips_designators() {
        assert_eq!(sanitize_terminal_text("\x1b(Bok"), "ok");
    }
}
