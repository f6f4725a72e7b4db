//! QR code URL returned by the OFD.
//!
//! The server escapes the URL twice, so after JSON decoding the string still
//! holds literal escape sequences (`\u0026`, `\/`). [`unescape_url`] removes
//! one level of them.

/// Reverse one level of backslash escaping.
///
/// Recognized: `\uXXXX` (surrogate pairs joined), `\UXXXXXXXX`, `\xHH`, `\/`,
/// `\\`, `\"`, `\'`, `\n`, `\r`, `\t`. Anything else, including malformed
/// escapes, is kept verbatim, so text without backslashes is returned as-is.
///
/// # Examples
/// ```rust
/// use ofd_core::qr::unescape_url;
///
/// let raw = r"https:\/\/ofd.soliq.uz\/epi?t=EZ000000000931\u0026r=121";
/// assert_eq!(unescape_url(raw), "https://ofd.soliq.uz/epi?t=EZ000000000931&r=121");
/// ```
pub fn unescape_url(input: &str) -> String {
    if !input.contains('\\') {
        return input.to_string();
    }

    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(pos) = rest.find('\\') {
        out.push_str(&rest[..pos]);
        rest = &rest[pos..];
        let (decoded, consumed) = decode_escape(rest);
        match decoded {
            Some(ch) => out.push(ch),
            None => out.push_str(&rest[..consumed]),
        }
        rest = &rest[consumed..];
    }
    out.push_str(rest);
    out
}

/// Decode the escape at the start of `input` (which begins with `\`).
/// Returns the character, if any, and the number of bytes consumed.
fn decode_escape(input: &str) -> (Option<char>, usize) {
    let mut chars = input[1..].chars();
    let Some(tag) = chars.next() else {
        return (None, 1);
    };
    let simple = match tag {
        '/' => Some('/'),
        '\\' => Some('\\'),
        '"' => Some('"'),
        '\'' => Some('\''),
        'n' => Some('\n'),
        'r' => Some('\r'),
        't' => Some('\t'),
        _ => None,
    };
    if let Some(ch) = simple {
        return (Some(ch), 2);
    }

    let digits = match tag {
        'x' => 2,
        'u' => 4,
        'U' => 8,
        _ => return (None, 1 + tag.len_utf8()),
    };
    let Some(code) = hex_at(input, 2, digits) else {
        return (None, 2);
    };
    let consumed = 2 + digits;

    if tag == 'u' && (0xD800..0xDC00).contains(&code) {
        let tail = &input[consumed..];
        if tail.starts_with("\\u") {
            if let Some(low) = hex_at(tail, 2, 4) {
                if (0xDC00..0xE000).contains(&low) {
                    let combined = 0x10000 + ((code - 0xD800) << 10) + (low - 0xDC00);
                    return (char::from_u32(combined), consumed + 6);
                }
            }
        }
        return (None, consumed);
    }

    match char::from_u32(code) {
        Some(ch) => (Some(ch), consumed),
        None => (None, consumed),
    }
}

fn hex_at(input: &str, start: usize, len: usize) -> Option<u32> {
    let digits = input.get(start..start + len)?;
    if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    u32::from_str_radix(digits, 16).ok()
}
