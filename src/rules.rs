//! Tag rules, bundles, and the rule registry.
//!
//! A [`TagRule`] is one of a closed set of behaviors attached to a tag
//! name: capture the enclosed region into a content property, write a
//! property back out, or lift `<meta>` pairs into dotted keys. Rules are
//! grouped into named [`TagRuleBundle`]s and compiled into an immutable
//! [`RuleRegistry`]; registering a later bundle overrides earlier bindings
//! for the same tag name, which is how site-specific bundles specialize
//! the defaults.

use std::collections::{HashMap, HashSet};

use bstr::ByteSlice;

use crate::engine::RuleContext;
use crate::error::{Error, Result};
use crate::tokenizer::Tag;

/// Directive namespace prefix recognized by the default decorator bundle.
pub const NAMESPACE: &str = "lamina";

/// One tag-level behavior. Closed set, dispatched by the engine through
/// [`TagRule::matches`] / [`TagRule::apply`].
#[derive(Debug, Clone)]
pub enum TagRule {
    /// Capture the tag's enclosed markup into a fixed property key.
    Capture {
        key: String,
        /// Append to the key instead of first-write-wins.
        append: bool,
        /// Also emit the tag and its contents as pass-through.
        emit: bool,
    },
    /// Capture `<meta name="x" content="y">` into property `meta.x`.
    CaptureMeta,
    /// `<capture property="k">…</capture>`: capture the body into `k` and
    /// drop the whole directive from the pass-through stream.
    CaptureDirective,
    /// `<write property="k">default</write>`: emit the captured value of
    /// `k`, or the directive's own body when `k` was never captured.
    WriteDirective,
}

impl TagRule {
    /// Capture into `key`, first-write-wins, region also passed through.
    pub fn capture(key: impl Into<String>) -> Self {
        TagRule::Capture {
            key: key.into(),
            append: false,
            emit: true,
        }
    }

    /// Capture into `key` without passing the region through.
    pub fn capture_silent(key: impl Into<String>) -> Self {
        TagRule::Capture {
            key: key.into(),
            append: false,
            emit: false,
        }
    }

    /// Capture into an appending extension point (scripts, styles).
    /// Every occurrence concatenates in encounter order.
    pub fn capture_appending(key: impl Into<String>) -> Self {
        TagRule::Capture {
            key: key.into(),
            append: true,
            emit: true,
        }
    }

    /// Tag-level precondition beyond the name match. Rules that don't
    /// match leave the tag to ordinary pass-through.
    pub fn matches(&self, tag: &Tag<'_>) -> bool {
        match self {
            TagRule::Capture { .. } => true,
            TagRule::CaptureMeta => {
                tag.attributes().get("name").is_some() && tag.attributes().get("content").is_some()
            }
            TagRule::CaptureDirective | TagRule::WriteDirective => {
                tag.attributes().get("property").is_some()
            }
        }
    }

    pub(crate) fn apply<'src>(
        &self,
        tag: &Tag<'src>,
        cx: &mut RuleContext<'_, 'src>,
    ) -> Result<()> {
        match self {
            TagRule::Capture { key, emit, .. } => {
                let captured = cx.capture_enclosed(tag)?;
                let _ = cx.content.set(key, &captured.bytes);
                if *emit {
                    cx.out.write(tag.raw())?;
                    cx.out.write(&captured.bytes)?;
                    if let Some(close) = captured.close {
                        cx.out.write(close)?;
                    }
                }
                Ok(())
            }
            TagRule::CaptureMeta => {
                // matches() guarantees both attributes.
                let name = tag.attributes().get("name").unwrap_or_default();
                let content = tag.attributes().get("content").unwrap_or_default();
                let key = format!("meta.{}", name.as_bstr());
                let _ = cx.content.set(&key, content);
                cx.out.write(tag.raw())
            }
            TagRule::CaptureDirective => {
                let key = tag.attributes().get("property").unwrap_or_default();
                let key = key.to_str_lossy().into_owned();
                let captured = cx.capture_enclosed(tag)?;
                let _ = cx.content.set(&key, &captured.bytes);
                Ok(())
            }
            TagRule::WriteDirective => {
                let key = tag.attributes().get("property").unwrap_or_default();
                let key = key.to_str_lossy();
                let fallback = if tag.is_self_closing() {
                    None
                } else {
                    Some(cx.consume_enclosed(tag).inner)
                };
                match cx.content.value(&key) {
                    Some(value) => cx.out.write(value),
                    None => {
                        log::debug!("property {key:?} absent, emitting directive fallback");
                        cx.out.write(fallback.unwrap_or_default())
                    }
                }
            }
        }
    }

    /// Whether this rule writes to the content model. Mutating rules go
    /// inert once the model is frozen for merging: their tags fall back to
    /// ordinary pass-through, so write directives nested inside a
    /// decorator's `<head>` or `<body>` are still dispatched and
    /// substituted instead of being swallowed by a capture.
    pub(crate) fn mutates_content(&self) -> bool {
        !matches!(self, TagRule::WriteDirective)
    }

    /// The property key this rule appends to, if it is an appending rule.
    fn appending_key(&self) -> Option<&str> {
        match self {
            TagRule::Capture {
                key, append: true, ..
            } => Some(key),
            _ => None,
        }
    }

    fn single_key(&self) -> Option<&str> {
        match self {
            TagRule::Capture {
                key, append: false, ..
            } => Some(key),
            _ => None,
        }
    }
}

/// A named, ordered set of tag-name → rule bindings.
#[derive(Debug, Clone, Default)]
pub struct TagRuleBundle {
    name: String,
    rules: Vec<(String, TagRule)>,
}

impl TagRuleBundle {
    pub fn new(name: impl Into<String>) -> Self {
        TagRuleBundle {
            name: name.into(),
            rules: Vec::new(),
        }
    }

    /// Bind `rule` to `tag` (case-insensitive). Within one bundle, later
    /// bindings for the same tag win, same as across bundles.
    pub fn rule(mut self, tag: &str, rule: TagRule) -> Self {
        self.rules.push((tag.to_ascii_lowercase(), rule));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Captures the standard HTML regions: `title`, `head`, `body`, and
    /// `<meta name content>` pairs as `meta.<name>` properties. Captured
    /// regions still pass through, so an undecorated page survives intact.
    pub fn core_html() -> Self {
        TagRuleBundle::new("core-html")
            .rule("title", TagRule::capture("title"))
            .rule("head", TagRule::capture("head"))
            .rule("body", TagRule::capture("body"))
            .rule("meta", TagRule::CaptureMeta)
    }

    /// The decorator directive vocabulary: `<capture property>` and
    /// `<write property>`, with and without the `lamina:` prefix.
    pub fn decorator_tags() -> Self {
        TagRuleBundle::new("decorator-tags")
            .rule("capture", TagRule::CaptureDirective)
            .rule("write", TagRule::WriteDirective)
            .rule(&format!("{NAMESPACE}:capture"), TagRule::CaptureDirective)
            .rule(&format!("{NAMESPACE}:write"), TagRule::WriteDirective)
    }
}

/// Immutable tag-name → rule mapping compiled from bundles.
///
/// Build once, share read-only (it is `Send + Sync`); concurrent
/// processing runs may hold it behind an `Arc`. Reconfiguration means
/// building a fresh registry and swapping the `Arc`, so every run observes
/// one complete snapshot.
#[derive(Debug, Default)]
pub struct RuleRegistry {
    rules: HashMap<String, TagRule>,
    appending: HashSet<String>,
}

impl RuleRegistry {
    pub fn builder() -> RuleRegistryBuilder {
        RuleRegistryBuilder::default()
    }

    /// Registry with [`TagRuleBundle::core_html`] and
    /// [`TagRuleBundle::decorator_tags`] installed.
    pub fn with_default_bundles() -> Self {
        RuleRegistry::builder()
            .register(TagRuleBundle::core_html())
            .register(TagRuleBundle::decorator_tags())
            .build()
            .expect("default bundles are well-formed")
    }

    /// Look up the rule bound to a (possibly namespace-qualified) tag name.
    pub fn lookup(&self, tag_name: &[u8]) -> Option<&TagRule> {
        if self.rules.is_empty() {
            return None;
        }
        let name = tag_name.to_ascii_lowercase();
        self.rules.get(name.to_str_lossy().as_ref())
    }

    /// Property keys declared appending by any registered rule. Used to
    /// seed the [`crate::ContentModel`] for a processing run.
    pub fn appending_keys(&self) -> impl Iterator<Item = &str> {
        self.appending.iter().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Accumulates bundles; `build` validates and produces the snapshot.
#[derive(Debug, Default)]
pub struct RuleRegistryBuilder {
    bundles: Vec<TagRuleBundle>,
}

impl RuleRegistryBuilder {
    /// Add a bundle. Later bundles override earlier ones on tag-name
    /// collisions.
    pub fn register(mut self, bundle: TagRuleBundle) -> Self {
        self.bundles.push(bundle);
        self
    }

    /// Compile the registered bundles into an immutable registry.
    ///
    /// Fails with [`Error::Config`] for an empty tag name or when the same
    /// property key is captured both first-wins and appending; that split
    /// would make capture order silently significant.
    pub fn build(self) -> Result<RuleRegistry> {
        let mut rules: HashMap<String, TagRule> = HashMap::new();
        let mut appending: HashSet<String> = HashSet::new();
        let mut single: HashSet<String> = HashSet::new();

        for bundle in &self.bundles {
            log::debug!(
                "registering bundle {:?} ({} rules)",
                bundle.name(),
                bundle.rules.len()
            );
            for (tag, rule) in &bundle.rules {
                if tag.is_empty() {
                    return Err(Error::Config(format!(
                        "bundle {:?} binds a rule to an empty tag name",
                        bundle.name()
                    )));
                }
                let _ = rules.insert(tag.clone(), rule.clone());
            }
        }

        // Key policy is decided by the rules that survived overriding.
        for rule in rules.values() {
            if let Some(key) = rule.appending_key() {
                let _ = appending.insert(key.to_string());
            }
            if let Some(key) = rule.single_key() {
                let _ = single.insert(key.to_string());
            }
        }
        if let Some(conflict) = appending.intersection(&single).next() {
            return Err(Error::Config(format!(
                "property {conflict:?} is captured both first-wins and appending"
            )));
        }

        Ok(RuleRegistry { rules, appending })
    }
}
