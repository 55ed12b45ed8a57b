//! Dispatch and merge: the processing core.
//!
//! [`Dispatcher::run`] drives one tokenizer pass: recognized open tags are
//! handed to their rule, everything else is replayed verbatim from raw
//! token spans. The same dispatcher serves both halves of decoration —
//! [`process`] runs it over the source page with a writable
//! [`ContentModel`], [`merge`] runs it over the decorator template with
//! the model frozen so write directives substitute captured values.

use crate::content::ContentModel;
use crate::error::Result;
use crate::rules::RuleRegistry;
use crate::sink::Sink;
use crate::tokenizer::{Tag, Token, Tokenizer};

/// The enclosed region a rule consumed verbatim, up to its matching close
/// tag.
///
/// `inner` is the raw markup between the open and close tags; `close` is
/// the close tag's own span, absent when the tag was self-closing or the
/// close tag was missing at end of input.
pub struct Enclosed<'a> {
    pub inner: &'a [u8],
    pub close: Option<&'a [u8]>,
}

/// An enclosed region consumed with inner rules still dispatched; the
/// bytes are owned because nested rules may have rewritten them.
pub struct Captured<'a> {
    pub bytes: Vec<u8>,
    pub close: Option<&'a [u8]>,
}

/// Everything a rule can touch while it runs: the token cursor, the
/// content model, the output sink, and the registry for nested dispatch.
pub struct RuleContext<'t, 'src> {
    pub(crate) registry: &'t RuleRegistry,
    pub(crate) tokens: &'t mut Tokenizer<'src>,
    pub(crate) content: &'t mut ContentModel,
    pub(crate) out: &'t mut dyn Sink,
}

impl<'t, 'src> RuleContext<'t, 'src> {
    /// Consume tokens up to and including the close tag matching `tag`,
    /// returning the enclosed raw bytes untouched. Used where the region
    /// must stay literal, like a write directive's fallback body.
    ///
    /// Same-named nested opens bump a depth counter so that
    /// `<div><div>inner</div></div>` consumed at the outer `div` yields
    /// `<div>inner</div>`, not an early stop at the first `</div>`.
    /// Self-closing opens don't nest. A missing close tag consumes to end
    /// of input.
    pub fn consume_enclosed(&mut self, tag: &Tag<'src>) -> Enclosed<'src> {
        let src = self.tokens.source();
        let start = self.tokens.offset();
        if tag.is_self_closing() {
            return Enclosed {
                inner: &src[start..start],
                close: None,
            };
        }
        let mut depth = 0usize;
        let mut end = src.len();
        let mut close = None;
        while let Some(token) = self.tokens.next() {
            match &token {
                Token::Open(inner) if inner.name_eq(tag.name()) && !inner.is_self_closing() => {
                    depth += 1;
                }
                Token::Close { name, raw } if name.eq_ignore_ascii_case(tag.name()) => {
                    if depth == 0 {
                        end = self.tokens.offset() - raw.len();
                        close = Some(*raw);
                        break;
                    }
                    depth -= 1;
                }
                _ => {}
            }
        }
        Enclosed {
            inner: &src[start..end],
            close,
        }
    }

    /// Consume the enclosed region like [`consume_enclosed`], but keep
    /// dispatching rules for the inner tags, collecting their output into
    /// a buffer. This is what lets a `<head>` capture own its region while
    /// the `<title>` and `<meta>` rules inside it still populate their own
    /// properties.
    ///
    /// Same-named opens are depth-counted and passed into the buffer
    /// verbatim rather than re-dispatched, so a rule never re-enters
    /// itself on its own nested tags.
    ///
    /// [`consume_enclosed`]: RuleContext::consume_enclosed
    pub fn capture_enclosed(&mut self, tag: &Tag<'src>) -> Result<Captured<'src>> {
        let mut bytes = Vec::new();
        let mut close = None;
        if tag.is_self_closing() {
            return Ok(Captured { bytes, close });
        }
        let mut depth = 0usize;
        while let Some(token) = self.tokens.next() {
            match &token {
                // Same-named tags are never re-dispatched, only counted,
                // so a rule can't re-enter itself on its own nesting.
                Token::Open(inner) if inner.name_eq(tag.name()) => {
                    if !inner.is_self_closing() {
                        depth += 1;
                    }
                    bytes.extend_from_slice(inner.raw());
                }
                Token::Close { name, raw } if name.eq_ignore_ascii_case(tag.name()) => {
                    if depth == 0 {
                        close = Some(*raw);
                        break;
                    }
                    depth -= 1;
                    bytes.extend_from_slice(raw);
                }
                _ => {
                    dispatch_token(self.registry, &token, self.tokens, self.content, &mut bytes)?;
                }
            }
        }
        Ok(Captured { bytes, close })
    }
}

/// Route one token: recognized open tags go to their rule, everything
/// else is replayed from its raw span.
fn dispatch_token<'src>(
    registry: &RuleRegistry,
    token: &Token<'src>,
    tokens: &mut Tokenizer<'src>,
    content: &mut ContentModel,
    out: &mut dyn Sink,
) -> Result<()> {
    if let Token::Open(tag) = token {
        if let Some(rule) = registry.lookup(tag.name()) {
            if rule.matches(tag) && !(content.is_frozen() && rule.mutates_content()) {
                log::trace!("rule fired for <{}>", tag.name().escape_ascii());
                let mut cx = RuleContext {
                    registry,
                    tokens,
                    content,
                    out,
                };
                return rule.apply(tag, &mut cx);
            }
        }
    }
    out.write(token.raw())
}

/// Walks a token stream, routing recognized tags to their rules.
pub struct Dispatcher<'r> {
    registry: &'r RuleRegistry,
}

impl<'r> Dispatcher<'r> {
    pub fn new(registry: &'r RuleRegistry) -> Self {
        Dispatcher { registry }
    }

    /// One full pass over `src`. Rules mutate `content` and/or write to
    /// `out`; unrecognized markup goes to `out` byte-for-byte.
    pub fn run(&self, src: &[u8], content: &mut ContentModel, out: &mut dyn Sink) -> Result<()> {
        let mut tokens = Tokenizer::new(src);
        while let Some(token) = tokens.next() {
            dispatch_token(self.registry, &token, &mut tokens, content, out)?;
        }
        Ok(())
    }
}

/// Extract content properties from a source page.
///
/// The pass-through stream (the page minus consumed directives) is
/// discarded; use [`process_into`] to receive it.
pub fn process(source: &[u8], registry: &RuleRegistry) -> Result<ContentModel> {
    let mut devnull = NullSink;
    process_into(source, registry, &mut devnull)
}

/// Extract content properties, routing the pass-through stream to `out`.
pub fn process_into(
    source: &[u8],
    registry: &RuleRegistry,
    out: &mut dyn Sink,
) -> Result<ContentModel> {
    let mut content = ContentModel::with_appending_keys(registry.appending_keys());
    Dispatcher::new(registry).run(source, &mut content, out)?;
    Ok(content)
}

/// Merge captured content into a decorator template.
///
/// The decorator is tokenized and dispatched exactly like a source page,
/// but against the frozen model: write directives substitute captured
/// values (or emit their own body when the key is absent), capture rules
/// go inert and pass through like ordinary markup, so directives nested in
/// the decorator's own `<head>` or `<body>` still fire. Single pass; the
/// merged output is never re-entered.
pub fn merge(
    mut content: ContentModel,
    decorator: &[u8],
    registry: &RuleRegistry,
) -> Result<Vec<u8>> {
    content.freeze();
    let mut out = Vec::new();
    Dispatcher::new(registry).run(decorator, &mut content, &mut out)?;
    Ok(out)
}

/// Process a source page and merge it into a decorator in one call.
pub fn decorate(source: &[u8], decorator: &[u8], registry: &RuleRegistry) -> Result<Vec<u8>> {
    let content = process(source, registry)?;
    merge(content, decorator, registry)
}

struct NullSink;

impl Sink for NullSink {
    fn write(&mut self, _bytes: &[u8]) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{TagRule, TagRuleBundle};
    use bstr::ByteSlice;

    fn registry_with(bundle: TagRuleBundle) -> RuleRegistry {
        RuleRegistry::builder().register(bundle).build().unwrap()
    }

    #[test]
    fn test_passthrough_with_empty_registry() {
        let registry = RuleRegistry::builder().build().unwrap();
        let src = b"<html><body class='x'>hi <!-- c --> there</body></html>";
        let mut out = Vec::new();
        let content = process_into(src, &registry, &mut out).unwrap();
        assert!(content.is_empty());
        assert_eq!(out.as_bstr(), src.as_bstr());
    }

    #[test]
    fn test_capture_first_wins() {
        let registry = registry_with(TagRuleBundle::new("t").rule("title", TagRule::capture("title")));
        let src = b"<title>A</title>...<title>B</title>";
        let content = process(src, &registry).unwrap();
        assert_eq!(content.value("title"), Some(b"A".as_ref()));
    }

    #[test]
    fn test_capture_nested_same_name() {
        let registry = registry_with(TagRuleBundle::new("t").rule("div", TagRule::capture("div")));
        let content = process(b"<div><div>inner</div></div>", &registry).unwrap();
        assert_eq!(content.value("div"), Some(b"<div>inner</div>".as_ref()));
    }

    #[test]
    fn test_capture_passes_region_through() {
        let registry = registry_with(TagRuleBundle::new("t").rule("title", TagRule::capture("title")));
        let src = b"<head><title>Hi</title></head>";
        let mut out = Vec::new();
        let _ = process_into(src, &registry, &mut out).unwrap();
        assert_eq!(out.as_bstr(), src.as_bstr());
    }

    #[test]
    fn test_capture_directive_is_removed_from_passthrough() {
        let registry = registry_with(TagRuleBundle::decorator_tags());
        let src = b"a<capture property=\"nav\"><ul/></capture>b";
        let mut out = Vec::new();
        let content = process_into(src, &registry, &mut out).unwrap();
        assert_eq!(out.as_bstr(), b"ab".as_bstr());
        assert_eq!(content.value("nav"), Some(b"<ul/>".as_ref()));
    }

    #[test]
    fn test_capture_missing_close_runs_to_end() {
        let registry = registry_with(TagRuleBundle::new("t").rule("body", TagRule::capture("body")));
        let content = process(b"<body>never closed", &registry).unwrap();
        assert_eq!(content.value("body"), Some(b"never closed".as_ref()));
    }

    #[test]
    fn test_self_closing_capture_is_present_and_empty() {
        let registry = registry_with(TagRuleBundle::new("t").rule("head", TagRule::capture("head")));
        let content = process(b"<head/>", &registry).unwrap();
        assert!(content.has("head"));
        assert_eq!(content.value("head"), Some(b"".as_ref()));
    }

    #[test]
    fn test_meta_rule_builds_dotted_keys() {
        let registry = registry_with(TagRuleBundle::core_html());
        let src = b"<head><meta name=\"author\" content=\"jw\"><meta charset=\"utf-8\"></head>";
        let content = process(src, &registry).unwrap();
        assert_eq!(content.value("meta.author"), Some(b"jw".as_ref()));
        // charset-only meta has no name/content pair: no property, plain
        // pass-through.
        assert!(!content.has("meta.charset"));
    }

    #[test]
    fn test_merge_substitutes_and_falls_back() {
        let registry = RuleRegistry::with_default_bundles();
        let mut content = ContentModel::new();
        assert!(content.set("title", b"Hi"));
        let decorator =
            b"<html><h1><write property=\"title\"/></h1><write property=\"head\"><!-- none --></write></html>";
        let out = merge(content, decorator, &registry).unwrap();
        assert_eq!(out.as_bstr(), b"<html><h1>Hi</h1><!-- none --></html>".as_bstr());
    }

    #[test]
    fn test_merge_empty_capture_suppresses_fallback() {
        let registry = RuleRegistry::with_default_bundles();
        let mut content = ContentModel::new();
        assert!(content.set("head", b""));
        let out = merge(content, b"<write property=\"head\">fallback</write>", &registry).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_merge_does_not_capture_from_decorator() {
        let registry = RuleRegistry::with_default_bundles();
        let mut content = ContentModel::new();
        assert!(content.set("title", b"Page"));
        // The decorator's own <title> must not overwrite or capture; it
        // still passes through.
        let out = merge(
            content,
            b"<title>Layout</title><write property=\"title\"/>",
            &registry,
        )
        .unwrap();
        assert_eq!(out.as_bstr(), b"<title>Layout</title>Page".as_bstr());
    }

    #[test]
    fn test_decorate_end_to_end() {
        let registry = RuleRegistry::with_default_bundles();
        let source = b"<html><head><title>Hi</title></head><body>Hello</body></html>";
        let decorator = b"<html><h1><write property=\"title\"/></h1><write property=\"body\"/></html>";
        let out = decorate(source, decorator, &registry).unwrap();
        assert_eq!(out.as_bstr(), b"<html><h1>Hi</h1>Hello</html>".as_bstr());
    }

    #[test]
    fn test_appending_extension_point() {
        let registry = registry_with(
            TagRuleBundle::new("ext").rule("script", TagRule::capture_appending("script")),
        );
        let src = b"<script>a</script><p/><script>b</script><script>c</script>";
        let content = process(src, &registry).unwrap();
        assert_eq!(content.value("script"), Some(b"abc".as_ref()));
    }
}
