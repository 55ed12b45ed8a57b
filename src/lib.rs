//! # lamina
//!
//! A fast, lightweight HTML page decoration library. A site writes plain
//! content pages; lamina extracts named regions (title, head, body,
//! arbitrary properties) in a single streaming pass and merges them into a
//! shared layout template (the *decorator*), so navigation and boilerplate
//! live in one place instead of every page.
//!
//! ## How it works
//!
//! - A forward-only [`tokenizer`] turns the page into markup events while
//!   remembering raw byte spans, so anything unrecognized is passed through
//!   byte-for-byte — malformed markup included.
//! - [`TagRule`]s bound to tag names via [`TagRuleBundle`]s capture enclosed
//!   regions into a [`ContentModel`] or write captured properties back out.
//! - [`merge`] replays the decorator template, substituting each
//!   `<write property="...">` directive with the captured value, or the
//!   directive's own body when the property was never captured.
//!
//! ## Quick start
//!
//! ```
//! use lamina::{decorate, RuleRegistry};
//!
//! let registry = RuleRegistry::with_default_bundles();
//! let page = b"<html><head><title>Hi</title></head><body>Hello</body></html>";
//! let layout = b"<html><h1><write property=\"title\"/></h1><write property=\"body\"/></html>";
//!
//! let merged = decorate(page, layout, &registry).unwrap();
//! assert_eq!(merged, b"<html><h1>Hi</h1>Hello</html>");
//! ```
//!
//! Pages that cannot be decorated stay deliverable: with no matching rules
//! the engine reproduces its input exactly, and [`sink::RoutableSink`] lets
//! a caller decide late whether processed or raw bytes reach the real
//! destination.
//!
//! The [`RuleRegistry`] is immutable once built and `Send + Sync`; share
//! one behind an `Arc` across concurrent processing runs, and swap in a
//! freshly built registry to reconfigure.

pub mod content;
pub mod engine;
pub mod error;
pub mod rules;
pub mod sink;
pub mod tokenizer;
pub mod util;

pub use content::{ContentModel, ContentProperty};
pub use engine::{decorate, merge, process, process_into, Dispatcher};
pub use error::{Error, Result};
pub use rules::{RuleRegistry, TagRule, TagRuleBundle};
pub use sink::{RoutableSink, Sink, SinkFactory, WriteSink};
pub use tokenizer::{Token, Tokenizer};
