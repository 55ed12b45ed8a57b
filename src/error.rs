//! Error types for lamina operations.

use thiserror::Error;

/// Errors that can occur while building a rule registry or writing output.
///
/// Malformed markup is deliberately absent from this list: the tokenizer
/// degrades bad markup to pass-through text instead of failing (see
/// [`crate::tokenizer`]). A missing property during merge is also not an
/// error; the write directive's own body is emitted as the fallback.
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid rule configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
