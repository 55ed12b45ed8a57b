//! In-memory content model populated while processing a source page.
//!
//! Properties are raw captured markup fragments keyed by dotted-path names
//! (`title`, `body`, `meta.author`). Values are never re-parsed; they are
//! spliced verbatim into the decorator during merge.

use std::collections::{HashMap, HashSet};

use bstr::ByteSlice;

/// A captured markup fragment.
///
/// Presence of a `ContentProperty` in the model is distinct from emptiness:
/// `<title></title>` captures an empty-but-present value, which still
/// suppresses a write directive's fallback body.
#[derive(Debug, Clone, Default)]
pub struct ContentProperty {
    value: Vec<u8>,
}

impl ContentProperty {
    pub fn value(&self) -> &[u8] {
        &self.value
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }
}

/// Named properties captured from exactly one source page.
///
/// `set` is first-write-wins, except for keys declared appending at
/// construction, which concatenate values in encounter order. There is no
/// removal: a model is write-once-per-key, read-many. Each processing run
/// owns its own model; nothing here is shared across threads.
#[derive(Debug, Default)]
pub struct ContentModel {
    props: HashMap<String, ContentProperty>,
    appending: HashSet<String>,
    frozen: bool,
}

impl ContentModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Model with a set of keys that append instead of first-wins.
    pub fn with_appending_keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ContentModel {
            props: HashMap::new(),
            appending: keys.into_iter().map(Into::into).collect(),
            frozen: false,
        }
    }

    /// Record a captured value. Returns whether the model changed.
    ///
    /// First write wins for ordinary keys; appending keys concatenate with
    /// no separator. Writes against a frozen model are ignored, which is
    /// what keeps capture rules in a decorator template from leaking into
    /// the page's content.
    pub fn set(&mut self, key: &str, value: &[u8]) -> bool {
        if self.frozen {
            return false;
        }
        if self.appending.contains(key) {
            self.props
                .entry(key.to_string())
                .or_default()
                .value
                .extend_from_slice(value);
            return true;
        }
        if self.props.contains_key(key) {
            log::trace!("property {key:?} already captured, keeping first value");
            return false;
        }
        log::trace!("captured property {key:?} ({} bytes)", value.len());
        let _ = self.props.insert(
            key.to_string(),
            ContentProperty {
                value: value.to_vec(),
            },
        );
        true
    }

    pub fn get(&self, key: &str) -> Option<&ContentProperty> {
        self.props.get(key)
    }

    /// Captured value bytes, if the key is present.
    pub fn value(&self, key: &str) -> Option<&[u8]> {
        self.props.get(key).map(ContentProperty::value)
    }

    pub fn has(&self, key: &str) -> bool {
        self.props.contains_key(key)
    }

    /// Iterate over captured (key, fragment) pairs in arbitrary order.
    pub fn properties(&self) -> impl Iterator<Item = (&str, &ContentProperty)> {
        self.props.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn is_empty(&self) -> bool {
        self.props.is_empty()
    }

    /// Make the model read-only. Called once merging begins.
    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Debug view of a property value as a string.
    pub fn value_str(&self, key: &str) -> Option<&bstr::BStr> {
        self.value(key).map(ByteSlice::as_bstr)
    }
}
