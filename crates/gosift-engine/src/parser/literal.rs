//! Decoding of string and rune literals.

/// Decode an interpreted (`"..."`) or raw (`` `...` ``) string literal.
///
/// Byte escapes that don't form valid UTF-8 are replaced. Returns `None`
/// for malformed literals.
pub fn unquote_string(text: &str) -> Option<String> {
    unquote_bytes(text).map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
}

/// Decode a string literal to its bytes.
pub fn unquote_bytes(text: &str) -> Option<Vec<u8>> {
    if text.len() >= 2 && text.starts_with('`') && text.ends_with('`') {
        // Carriage returns are discarded from raw strings.
        return Some(
            text[1..text.len() - 1]
                .bytes()
                .filter(|b| *b != b'\r')
                .collect(),
        );
    }
    if text.len() < 2 || !text.starts_with('"') || !text.ends_with('"') {
        return None;
    }
    let mut out = Vec::with_capacity(text.len());
    let mut chars = text[1..text.len() - 1].chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            let mut buf = [0u8; 4];
            out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            continue;
        }
        match decode_escape(&mut chars, '"')? {
            Escaped::Byte(b) => out.push(b),
            Escaped::Char(c) => {
                let mut buf = [0u8; 4];
                out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            }
        }
    }
    Some(out)
}

/// Decode a rune literal (`'x'`) to its code point.
pub fn unquote_char(text: &str) -> Option<u32> {
    if text.len() < 3 || !text.starts_with('\'') || !text.ends_with('\'') {
        return None;
    }
    let mut chars = text[1..text.len() - 1].chars();
    let value = match chars.next()? {
        '\\' => match decode_escape(&mut chars, '\'')? {
            Escaped::Byte(b) => u32::from(b),
            Escaped::Char(c) => c as u32,
        },
        c => c as u32,
    };
    chars.next().is_none().then_some(value)
}

enum Escaped {
    Byte(u8),
    Char(char),
}

fn decode_escape(chars: &mut std::str::Chars<'_>, quote: char) -> Option<Escaped> {
    let c = chars.next()?;
    let simple = match c {
        'a' => Some('\u{7}'),
        'b' => Some('\u{8}'),
        'f' => Some('\u{c}'),
        'n' => Some('\n'),
        'r' => Some('\r'),
        't' => Some('\t'),
        'v' => Some('\u{b}'),
        '\\' => Some('\\'),
        c if c == quote => Some(c),
        _ => None,
    };
    if let Some(ch) = simple {
        return Some(Escaped::Char(ch));
    }
    match c {
        '0'..='7' => {
            let mut value = c.to_digit(8)?;
            for _ in 0..2 {
                value = value * 8 + chars.next()?.to_digit(8)?;
            }
            u8::try_from(value).ok().map(Escaped::Byte)
        }
        'x' => {
            let value = hex_digits(chars, 2)?;
            Some(Escaped::Byte(value as u8))
        }
        'u' => char::from_u32(hex_digits(chars, 4)?).map(Escaped::Char),
        'U' => char::from_u32(hex_digits(chars, 8)?).map(Escaped::Char),
        _ => None,
    }
}

fn hex_digits(chars: &mut std::str::Chars<'_>, n: usize) -> Option<u32> {
    let mut value = 0u32;
    for _ in 0..n {
        value = value.checked_mul(16)? + chars.next()?.to_digit(16)?;
    }
    Some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interpreted_strings() {
        assert_eq!(unquote_string(r#""fmt""#).as_deref(), Some("fmt"));
        assert_eq!(unquote_string(r#""a\tb\"c""#).as_deref(), Some("a\tb\"c"));
        assert_eq!(unquote_string(r#""é\x41\101""#).as_deref(), Some("éAA"));
        assert_eq!(unquote_string(r#""\q""#), None);
    }

    #[test]
    fn test_raw_strings() {
        assert_eq!(unquote_string("`a\\n\r\nb`").as_deref(), Some("a\\n\nb"));
    }

    #[test]
    fn test_runes() {
        assert_eq!(unquote_char("'a'"), Some(97));
        assert_eq!(unquote_char(r"'\n'"), Some(10));
        assert_eq!(unquote_char(r"'\''"), Some(39));
        assert_eq!(unquote_char("'é'"), Some(0xe9));
        assert_eq!(unquote_char("'ab'"), None);
    }
}
