// MIT License
//
// Copyright (c) 2024 Jerome Johnson
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.

//! Error handling for template compilation and rendering
//!
//! There are two kinds of failure. A [`CompileError`] means the template or the
//! delimiter settings are at fault and no [`Template`](crate::Template) could be
//! built; syntax errors carry the generated source so the offending fragment can
//! be inspected. A [`RenderError`] is raised while a compiled template runs
//! against some data and is returned to the caller untouched.

use thiserror::Error;

use crate::tokenizer::DirectiveKind;

/// Number of characters shown either side of an error position
const CONTEXT: usize = 16;

/// Returns the text surrounding `offset` for error context
pub(crate) fn around(src: &str, offset: usize) -> &str {
    let offset = offset.min(src.len());
    let start = src[..offset]
        .char_indices()
        .rev()
        .nth(CONTEXT - 1)
        .map_or(0, |(pos, _)| pos);
    let end = src[offset..]
        .char_indices()
        .nth(CONTEXT)
        .map_or(src.len(), |(pos, _)| offset + pos);
    &src[start..end]
}

/// Error type for template compilation failures
#[derive(Debug, Clone, Error)]
pub enum CompileError {
    /// A delimiter pattern is not a valid regular expression
    #[error("invalid {kind} delimiter: {error}")]
    InvalidPattern {
        kind: DirectiveKind,
        #[source]
        error: regex::Error,
    },
    /// The three patterns are valid alone but not as one alternation
    #[error("delimiters cannot be combined: {0}")]
    Combined(#[source] regex::Error),
    /// A delimiter pattern has nothing to capture the directive body with
    #[error("{kind} delimiter {pattern:?} has no capture group")]
    MissingCapture { kind: DirectiveKind, pattern: String },
    /// The configured scope variable is not an identifier
    #[error("invalid variable name {0:?}")]
    InvalidVariable(String),
    /// The generated source could not be parsed
    #[error("{message} near \"{near}\"")]
    Syntax {
        message: String,
        /// Byte offset into the generated source
        offset: usize,
        near: String,
        generated: String,
    },
}

impl CompileError {
    pub(crate) fn syntax(message: impl Into<String>, offset: usize, generated: &str) -> Self {
        Self::Syntax {
            message: message.into(),
            offset,
            near: around(generated, offset).to_string(),
            generated: generated.to_string(),
        }
    }

    /// The generated source that failed to compile, when there is one
    pub fn generated_source(&self) -> Option<&str> {
        match self {
            Self::Syntax { generated, .. } => Some(generated),
            _ => None,
        }
    }
}

/// Error type for failures while rendering a compiled template
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RenderError {
    /// An unbound name was read
    #[error("ReferenceError: {0} is not defined")]
    Reference(String),
    /// An operation was applied to a value that does not support it
    #[error("TypeError: {0}")]
    Type(String),
    /// Template code executed `throw`
    #[error("Uncaught {0}")]
    Thrown(String),
    #[error("RangeError: Maximum call stack size exceeded")]
    StackOverflow,
    /// The render data could not be turned into a template value
    #[error("invalid render data: {0}")]
    Data(String),
}

impl From<serde_json::Error> for RenderError {
    fn from(err: serde_json::Error) -> Self {
        Self::Data(err.to_string())
    }
}

/// Result type for template compilation
pub type Result<T> = std::result::Result<T, CompileError>;

/// Result type for template rendering
pub type RenderResult<T> = std::result::Result<T, RenderError>;
