//! Encoding helpers.

use std::borrow::Cow;

/// Decode a markup buffer to a UTF-8 string.
///
/// The engine itself operates on bytes and is agnostic to any ASCII-compatible
/// encoding; callers holding pages in a legacy encoding decode them up front
/// with this and process the result's bytes. Strategy:
///
/// 1. Try UTF-8 (BOM handled by encoding_rs)
/// 2. If malformed, try the hint encoding (from HTTP headers or a
///    `<meta charset>` probe)
/// 3. Fall back to Windows-1252, the usual suspect for legacy pages
pub fn decode_markup<'a>(bytes: &'a [u8], hint_encoding: Option<&str>) -> Cow<'a, str> {
    let (result, _encoding, malformed) = encoding_rs::UTF_8.decode(bytes);

    if !malformed {
        return result;
    }

    if let Some(name) = hint_encoding
        && let Some(encoding) = encoding_rs::Encoding::for_label(name.as_bytes())
    {
        let (result, _, _) = encoding.decode(bytes);
        return result;
    }

    let (result, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_utf8_borrows() {
        let decoded = decode_markup("<p>héllo</p>".as_bytes(), None);
        assert!(matches!(decoded, Cow::Borrowed(_)));
        assert_eq!(decoded, "<p>héllo</p>");
    }

    #[test]
    fn test_hint_encoding_used_for_malformed_utf8() {
        // 0xE9 is 'é' in ISO-8859-1 but malformed as UTF-8.
        let bytes = b"caf\xe9";
        assert_eq!(decode_markup(bytes, Some("iso-8859-1")), "café");
    }

    #[test]
    fn test_windows_1252_fallback() {
        // 0x93/0x94 are curly quotes in CP1252.
        let bytes = b"\x93quoted\x94";
        assert_eq!(decode_markup(bytes, None), "\u{201c}quoted\u{201d}");
    }
}
