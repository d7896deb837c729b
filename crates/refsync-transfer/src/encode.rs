//! Percent-encodes a relative path into a URL suffix.
//!
//! This is a deliberate subset of RFC 3986 percent-encoding with one
//! non-standard rule (`\` also emits `/`), so a generic percent-encoding
//! crate doesn't fit; the encoder is small enough to hand-roll and pin with
//! exact test vectors.

/// Encode `path` for safe appending after a fixed archive URL prefix.
/// Unreserved characters (`[A-Za-z0-9\-_.~]`) pass through unchanged; `/`
/// and `\` both emit `/`; everything else is percent-encoded byte-by-byte
/// as lowercase hex.
pub fn encode_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for ch in path.chars() {
        match ch {
            'A'..='Z' | 'a'..='z' | '0'..='9' | '-' | '_' | '.' | '~' => out.push(ch),
            '/' | '\\' => out.push('/'),
            _ => {
                let mut buf = [0u8; 4];
                for byte in ch.encode_utf8(&mut buf).as_bytes() {
                    out.push('%');
                    out.push_str(&format!("{byte:02x}"));
                }
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passthrough_unreserved_and_separators() {
        assert_eq!(encode_path("a/b.c"), "a/b.c");
    }

    #[test]
    fn space_is_percent_encoded() {
        assert_eq!(encode_path("foo bar"), "foo%20bar");
    }

    #[test]
    fn multibyte_utf8_encodes_each_byte() {
        assert_eq!(encode_path("résumé"), "r%c3%a9sum%c3%a9");
    }

    #[test]
    fn backslash_becomes_forward_slash() {
        assert_eq!(encode_path("dir\\x"), "dir/x");
    }

    #[test]
    fn reserved_url_char_is_percent_encoded() {
        assert_eq!(encode_path("a?b"), "a%3fb");
    }
}
