const HEX: &[u8; 16] = b"0123456789abcdef";

/// Append `value` to `out` as a quoted JSON string.
#[inline]
pub(crate) fn push_json_string_escaped(out: &mut String, value: &str) {
    let bytes = value.as_bytes();
    if bytes.iter().all(|&b| b >= 0x20 && b != b'"' && b != b'\\') {
        out.push('"');
        out.push_str(value);
        out.push('"');
        return;
    }

    out.push('"');
    for ch in value.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{08}' => out.push_str("\\b"),
            '\u{0c}' => out.push_str("\\f"),
            c if c <= '\u{1f}' => {
                let control = c as u8;
                out.push_str("\\u00");
                out.push(char::from(HEX[(control >> 4) as usize]));
                out.push(char::from(HEX[(control & 0x0f) as usize]));
            }
            _ => out.push(ch),
        }
    }
    out.push('"');
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_json_string_escaped_plain() {
        let mut out = String::new();
        push_json_string_escaped(&mut out, "plain text");
        assert_eq!(out, "\"plain text\"");
    }

    #[test]
    fn test_push_json_string_escaped_controls() {
        let mut out = String::new();
        push_json_string_escaped(&mut out, "a\"b\\c\u{01}");
        assert_eq!(out, "\"a\\\"b\\\\c\\u0001\"");
        let back: String = serde_json::from_str(&out).unwrap();
        assert_eq!(back, "a\"b\\c\u{01}");
    }
}
