//! Single-pass markup tokenizer.
//!
//! Turns an in-memory byte buffer into a forward-only sequence of [`Token`]s
//! without building a tree. Every token remembers the raw source span it was
//! lexed from, so replaying `token.raw()` for the whole stream reconstructs
//! the input byte-for-byte. That fidelity is the load-bearing invariant of
//! the crate: anything the rule dispatcher does not recognize is emitted
//! from these raw spans unchanged.
//!
//! Malformed markup never produces an error. A `<` that doesn't open a
//! well-formed tag, an unterminated tag at end of input, or an unclosed
//! comment/CDATA section all degrade to text runs covering the leftover
//! bytes.

use memchr::{memchr, memmem};

/// A single markup event produced by the [`Tokenizer`].
///
/// All byte slices borrow from the source buffer; tokens are cheap to copy
/// around and are discarded after dispatch.
#[derive(Debug, Clone)]
pub enum Token<'a> {
    /// A run of character data between tags (also covers doctypes,
    /// processing instructions, and anything that failed to lex as a tag).
    Text(&'a [u8]),
    /// An opening (or self-closing) tag with its parsed attributes.
    Open(Tag<'a>),
    /// A closing tag, e.g. `</title>`.
    Close { name: &'a [u8], raw: &'a [u8] },
    /// A `<!-- ... -->` block, contents opaque.
    Comment(&'a [u8]),
    /// A `<![CDATA[ ... ]]>` block, contents opaque.
    CData(&'a [u8]),
}

impl<'a> Token<'a> {
    /// The exact bytes this token was lexed from.
    pub fn raw(&self) -> &'a [u8] {
        match self {
            Token::Text(raw) | Token::Comment(raw) | Token::CData(raw) => raw,
            Token::Open(tag) => tag.raw,
            Token::Close { raw, .. } => raw,
        }
    }
}

/// An opening tag: name, attributes, self-closing flag, raw span.
#[derive(Debug, Clone)]
pub struct Tag<'a> {
    raw: &'a [u8],
    name: &'a [u8],
    attrs: Attributes<'a>,
    self_closing: bool,
}

impl<'a> Tag<'a> {
    /// Tag name with original casing preserved.
    pub fn name(&self) -> &'a [u8] {
        self.name
    }

    /// Case-insensitive name comparison.
    pub fn name_eq(&self, other: &[u8]) -> bool {
        self.name.eq_ignore_ascii_case(other)
    }

    pub fn attributes(&self) -> &Attributes<'a> {
        &self.attrs
    }

    /// True for `<br/>`-style tags that cannot enclose content.
    pub fn is_self_closing(&self) -> bool {
        self.self_closing
    }

    /// The exact bytes of the tag, `<` through `>`.
    pub fn raw(&self) -> &'a [u8] {
        self.raw
    }
}

/// A single parsed attribute. `value` is `None` for bare attributes
/// (`<option selected>`); quotes are not included in the value slice.
#[derive(Debug, Clone, Copy)]
pub struct Attr<'a> {
    pub name: &'a [u8],
    pub value: Option<&'a [u8]>,
}

/// Ordered attribute list of an opening tag.
///
/// Lookup is ASCII-case-insensitive on the name; duplicate names keep the
/// first occurrence, matching browser behavior.
#[derive(Debug, Clone, Default)]
pub struct Attributes<'a>(Vec<Attr<'a>>);

impl<'a> Attributes<'a> {
    /// Value of the first attribute with this name, if any.
    pub fn get(&self, name: &str) -> Option<&'a [u8]> {
        self.0
            .iter()
            .find(|a| a.name.eq_ignore_ascii_case(name.as_bytes()))
            .and_then(|a| a.value)
    }

    pub fn has(&self, name: &str) -> bool {
        self.0
            .iter()
            .any(|a| a.name.eq_ignore_ascii_case(name.as_bytes()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Attr<'a>> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Forward-only tokenizer over a complete source buffer.
///
/// Restartable only by constructing a new tokenizer over the same buffer;
/// there is no mid-stream resume. Each call to [`Tokenizer::next`] makes
/// strict forward progress, so the token count is bounded by the input
/// length even for pathological input.
pub struct Tokenizer<'a> {
    src: &'a [u8],
    pos: usize,
}

impl<'a> Tokenizer<'a> {
    pub fn new(src: &'a [u8]) -> Self {
        Tokenizer { src, pos: 0 }
    }

    /// The buffer this tokenizer scans.
    pub fn source(&self) -> &'a [u8] {
        self.src
    }

    /// Byte offset of the next unconsumed input.
    pub fn offset(&self) -> usize {
        self.pos
    }

    /// Emit everything from `pos` up to the next `<` after it (or end of
    /// input) as a text run.
    fn text_run(&mut self) -> Token<'a> {
        let start = self.pos;
        let end = match memchr(b'<', &self.src[start + 1..]) {
            Some(i) => start + 1 + i,
            None => self.src.len(),
        };
        self.pos = end;
        Token::Text(&self.src[start..end])
    }

    /// Remaining input as one final text run (malformed-tail fallback).
    fn text_to_end(&mut self) -> Token<'a> {
        let start = self.pos;
        self.pos = self.src.len();
        Token::Text(&self.src[start..])
    }

    fn comment(&mut self) -> Token<'a> {
        let start = self.pos;
        match memmem::find(&self.src[start + 4..], b"-->") {
            Some(i) => {
                let end = start + 4 + i + 3;
                self.pos = end;
                Token::Comment(&self.src[start..end])
            }
            None => self.text_to_end(),
        }
    }

    fn cdata(&mut self) -> Token<'a> {
        let start = self.pos;
        match memmem::find(&self.src[start + 9..], b"]]>") {
            Some(i) => {
                let end = start + 9 + i + 3;
                self.pos = end;
                Token::CData(&self.src[start..end])
            }
            None => self.text_to_end(),
        }
    }

    fn closing_tag(&mut self) -> Token<'a> {
        let start = self.pos;
        let name_start = start + 2;
        let mut i = name_start;
        while i < self.src.len() && is_name_byte(self.src[i]) {
            i += 1;
        }
        let name = &self.src[name_start..i];
        match memchr(b'>', &self.src[i..]) {
            Some(j) if !name.is_empty() => {
                let end = i + j + 1;
                self.pos = end;
                Token::Close {
                    name,
                    raw: &self.src[start..end],
                }
            }
            // `</>`: not a usable close tag, ride along as text.
            Some(_) => self.text_run(),
            None => self.text_to_end(),
        }
    }

    /// Scan an opening tag. Quoted attribute values may contain `>`; a `>`
    /// anywhere outside quotes ends the tag. Quote state only opens in
    /// value position (after `=`), so a stray quote in an unquoted value
    /// can't swallow the rest of the document.
    fn open_tag(&mut self) -> Token<'a> {
        let start = self.pos;
        let mut i = start + 1;
        let mut quote: Option<u8> = None;
        let mut after_eq = false;
        let mut end = None;
        while i < self.src.len() {
            let b = self.src[i];
            if let Some(q) = quote {
                if b == q {
                    quote = None;
                }
            } else {
                match b {
                    b'>' => {
                        end = Some(i + 1);
                        break;
                    }
                    b'"' | b'\'' if after_eq => quote = Some(b),
                    b'=' => after_eq = true,
                    b if b.is_ascii_whitespace() => {}
                    _ => after_eq = false,
                }
            }
            i += 1;
        }
        let Some(end) = end else {
            return self.text_to_end();
        };
        self.pos = end;
        let raw = &self.src[start..end];
        Token::Open(parse_tag(raw))
    }
}

impl<'a> Iterator for Tokenizer<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Token<'a>> {
        if self.pos >= self.src.len() {
            return None;
        }
        if self.src[self.pos] != b'<' {
            return Some(self.text_run());
        }
        let rest = &self.src[self.pos..];
        if rest.starts_with(b"<!--") {
            return Some(self.comment());
        }
        if rest.starts_with(b"<![CDATA[") {
            return Some(self.cdata());
        }
        match rest.get(1).copied() {
            Some(b'/') => Some(self.closing_tag()),
            Some(b) if b.is_ascii_alphabetic() => Some(self.open_tag()),
            // Doctype, PI, lone `<`: ride along as text.
            _ => Some(self.text_run()),
        }
    }
}

fn is_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b':' | b'.')
}

/// Parse name, attributes, and self-closing flag out of a complete tag
/// span (`<` through `>`).
fn parse_tag(raw: &[u8]) -> Tag<'_> {
    let body = &raw[1..raw.len() - 1];
    let mut i = 0;
    while i < body.len() && is_name_byte(body[i]) {
        i += 1;
    }
    let name = &body[..i];
    let mut attrs = Vec::new();
    let mut self_closing = false;

    while i < body.len() {
        while i < body.len() && body[i].is_ascii_whitespace() {
            i += 1;
        }
        if i >= body.len() {
            break;
        }
        if body[i] == b'/' {
            self_closing = i == body.len() - 1;
            i += 1;
            continue;
        }
        // Attribute name
        let name_start = i;
        while i < body.len() && !body[i].is_ascii_whitespace() && !matches!(body[i], b'=' | b'/') {
            i += 1;
        }
        let attr_name = &body[name_start..i];
        if attr_name.is_empty() {
            i += 1;
            continue;
        }
        while i < body.len() && body[i].is_ascii_whitespace() {
            i += 1;
        }
        if i >= body.len() || body[i] != b'=' {
            attrs.push(Attr {
                name: attr_name,
                value: None,
            });
            continue;
        }
        i += 1; // consume '='
        while i < body.len() && body[i].is_ascii_whitespace() {
            i += 1;
        }
        let value = if i < body.len() && (body[i] == b'"' || body[i] == b'\'') {
            let q = body[i];
            i += 1;
            let value_start = i;
            let value_end = match memchr(q, &body[i..]) {
                Some(j) => {
                    i += j + 1;
                    value_start + j
                }
                // Unterminated quote inside the tag body: value runs to
                // the end of the tag.
                None => {
                    i = body.len();
                    body.len()
                }
            };
            &body[value_start..value_end]
        } else {
            let value_start = i;
            while i < body.len() && !body[i].is_ascii_whitespace() {
                i += 1;
            }
            &body[value_start..i]
        };
        attrs.push(Attr {
            name: attr_name,
            value: Some(value),
        });
    }

    Tag {
        raw,
        name,
        attrs: Attributes(attrs),
        self_closing,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bstr::ByteSlice;

    fn tokens(src: &[u8]) -> Vec<Token<'_>> {
        Tokenizer::new(src).collect()
    }

    fn replay(src: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        for t in Tokenizer::new(src) {
            out.extend_from_slice(t.raw());
        }
        out
    }

    #[test]
    fn test_text_and_tags() {
        let toks = tokens(b"Hello <b>world</b>!");
        assert_eq!(toks.len(), 5);
        assert!(matches!(&toks[0], Token::Text(t) if *t == b"Hello "));
        assert!(matches!(&toks[1], Token::Open(tag) if tag.name() == b"b"));
        assert!(matches!(&toks[2], Token::Text(t) if *t == b"world"));
        assert!(matches!(&toks[3], Token::Close { name, .. } if *name == b"b"));
        assert!(matches!(&toks[4], Token::Text(t) if *t == b"!"));
    }

    #[test]
    fn test_attributes_quoting() {
        let toks = tokens(br#"<a href="x>y" title='He said "hi"' id=plain checked>"#);
        let Token::Open(tag) = &toks[0] else {
            panic!("expected open tag, got {:?}", toks[0]);
        };
        assert_eq!(tag.attributes().get("href"), Some(b"x>y".as_ref()));
        assert_eq!(
            tag.attributes().get("title"),
            Some(br#"He said "hi""#.as_ref())
        );
        assert_eq!(tag.attributes().get("id"), Some(b"plain".as_ref()));
        assert!(tag.attributes().has("checked"));
        assert_eq!(tag.attributes().get("checked"), None);
    }

    #[test]
    fn test_duplicate_attribute_keeps_first() {
        let toks = tokens(br#"<meta name="a" name="b">"#);
        let Token::Open(tag) = &toks[0] else {
            panic!("expected open tag");
        };
        assert_eq!(tag.attributes().get("NAME"), Some(b"a".as_ref()));
    }

    #[test]
    fn test_unquoted_value_ends_at_gt() {
        let toks = tokens(b"<a href=foo>bar</a>");
        let Token::Open(tag) = &toks[0] else {
            panic!("expected open tag");
        };
        assert_eq!(tag.attributes().get("href"), Some(b"foo".as_ref()));
        assert!(matches!(&toks[1], Token::Text(t) if *t == b"bar"));
    }

    #[test]
    fn test_self_closing() {
        let toks = tokens(b"<br/><hr />");
        for t in &toks {
            let Token::Open(tag) = t else {
                panic!("expected open tag, got {:?}", t);
            };
            assert!(tag.is_self_closing());
        }
    }

    #[test]
    fn test_comment_is_opaque() {
        let toks = tokens(b"<!-- <title>not a tag</title> -->after");
        assert_eq!(toks.len(), 2);
        assert!(matches!(&toks[0], Token::Comment(_)));
        assert!(matches!(&toks[1], Token::Text(t) if *t == b"after"));
    }

    #[test]
    fn test_cdata_is_opaque() {
        let toks = tokens(b"<![CDATA[ <b> ]]>x");
        assert!(matches!(&toks[0], Token::CData(c) if c.contains_str("<b>")));
    }

    #[test]
    fn test_doctype_rides_in_text() {
        let toks = tokens(b"<!DOCTYPE html><html>");
        assert!(matches!(&toks[0], Token::Text(t) if *t == b"<!DOCTYPE html>"));
        assert!(matches!(&toks[1], Token::Open(tag) if tag.name() == b"html"));
    }

    #[test]
    fn test_unterminated_tag_degrades_to_text() {
        let toks = tokens(b"before <a href=\"x");
        assert_eq!(toks.len(), 2);
        assert!(matches!(&toks[1], Token::Text(t) if *t == b"<a href=\"x"));
    }

    #[test]
    fn test_unterminated_comment_degrades_to_text() {
        let toks = tokens(b"x<!-- never closed");
        assert!(matches!(&toks[1], Token::Text(t) if *t == b"<!-- never closed"));
    }

    #[test]
    fn test_lone_angle_bracket() {
        let toks = tokens(b"1 < 2 <b>ok</b>");
        assert_eq!(replay(b"1 < 2 <b>ok</b>"), b"1 < 2 <b>ok</b>");
        assert!(matches!(&toks[0], Token::Text(_)));
    }

    #[test]
    fn test_namespaced_tag_name() {
        let toks = tokens(b"<lamina:write property=\"title\"/>");
        let Token::Open(tag) = &toks[0] else {
            panic!("expected open tag");
        };
        assert_eq!(tag.name(), b"lamina:write");
        assert!(tag.is_self_closing());
        assert_eq!(tag.attributes().get("property"), Some(b"title".as_ref()));
    }

    #[test]
    fn test_replay_reconstructs_input() {
        let cases: &[&[u8]] = &[
            b"",
            b"plain text only",
            b"<html><head><title>Hi</title></head><body>Hello</body></html>",
            b"<a href=\"x>y\">link</a>",
            b"broken <tag",
            b"<!-- c --><![CDATA[d]]><!DOCTYPE html>< loose",
            b"<UL><li CLASS='a'>x</LI></ul>",
        ];
        for case in cases {
            assert_eq!(
                replay(case).as_bstr(),
                case.as_bstr(),
                "replay mismatch for {:?}",
                case.as_bstr()
            );
        }
    }
}
