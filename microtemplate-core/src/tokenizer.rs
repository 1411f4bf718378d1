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

//! Template tokenization
//!
//! The three directive patterns are joined into one alternation, in the fixed
//! order escape, interpolate, evaluate, followed by an end-of-input sentinel.
//! A single left-to-right scan then yields literal text and directives in
//! template order.
//!
//! # Token Types
//!
//! With the classic delimiters:
//!
//! ```text
//! Hello <%- name %>!   Literal("Hello "), Escape(" name "), Literal("!")
//! <%= count %>         Interpolate(" count ")
//! <% if (ok) { %>      Evaluate(" if (ok) { ")
//! ```
//!
//! When several patterns could match at the same position the earlier
//! alternative wins, whatever the template author meant.

use std::fmt::Display;

use regex::Regex;
use tracing::trace;

use crate::{
    error::{CompileError, Result},
    settings::Settings,
};

/// The three kinds of directive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DirectiveKind {
    /// HTML-escaped output
    Escape,
    /// Raw output
    Interpolate,
    /// Arbitrary code
    Evaluate,
}

impl DirectiveKind {
    /// Every kind, in matching priority order
    pub const ALL: [DirectiveKind; 3] = [
        DirectiveKind::Escape,
        DirectiveKind::Interpolate,
        DirectiveKind::Evaluate,
    ];
}

impl Display for DirectiveKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            DirectiveKind::Escape => "escape",
            DirectiveKind::Interpolate => "interpolate",
            DirectiveKind::Evaluate => "evaluate",
        })
    }
}

/// A span of template text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token<'a> {
    /// Text outside any directive, unescaped
    Literal(&'a str),
    Escape(&'a str),
    Interpolate(&'a str),
    Evaluate(&'a str),
}

impl<'a> Token<'a> {
    fn directive(kind: DirectiveKind, body: &'a str) -> Self {
        match kind {
            DirectiveKind::Escape => Token::Escape(body),
            DirectiveKind::Interpolate => Token::Interpolate(body),
            DirectiveKind::Evaluate => Token::Evaluate(body),
        }
    }
}

/// The combined directive pattern for one set of settings
#[derive(Debug, Clone)]
pub struct Matcher {
    regex: Regex,
    /// Index of the group wrapping each alternative; the body is the group after it
    groups: [usize; 3],
}

impl Matcher {
    pub fn new(settings: &Settings) -> Result<Self> {
        let mut alternation = Vec::with_capacity(4);
        let mut groups = [0; 3];
        let mut next_group = 1;
        for (slot, kind) in DirectiveKind::ALL.into_iter().enumerate() {
            let pattern = settings.pattern(kind);
            let regex = Regex::new(pattern)
                .map_err(|error| CompileError::InvalidPattern { kind, error })?;
            let captures = regex.captures_len() - 1;
            if captures == 0 {
                return Err(CompileError::MissingCapture {
                    kind,
                    pattern: pattern.to_string(),
                });
            }
            groups[slot] = next_group;
            next_group += captures + 1;
            alternation.push(format!("({pattern})"));
        }
        alternation.push("$".to_string());
        let regex = Regex::new(&alternation.join("|")).map_err(CompileError::Combined)?;
        Ok(Self { regex, groups })
    }

    /// Splits a template into literal and directive tokens
    pub fn tokenize<'a>(&self, text: &'a str) -> Vec<Token<'a>> {
        let mut tokens = Vec::new();
        let mut index = 0;
        for captures in self.regex.captures_iter(text) {
            let Some(whole) = captures.get(0) else {
                continue;
            };
            if whole.start() > index {
                tokens.push(Token::Literal(&text[index..whole.start()]));
            }
            index = whole.end();
            let directive = DirectiveKind::ALL
                .into_iter()
                .zip(self.groups)
                .find(|(_, group)| captures.get(*group).is_some())
                .map(|(kind, group)| {
                    let body = captures.get(group + 1).map_or("", |body| body.as_str());
                    Token::directive(kind, body)
                });
            match directive {
                Some(token) => {
                    trace!(?token, offset = whole.start(), "directive");
                    tokens.push(token);
                }
                None => break,
            }
        }
        // an empty sentinel right after a directive that ends the text is not reported
        if index < text.len() {
            tokens.push(Token::Literal(&text[index..]));
        }
        tokens
    }
}

/// Tokenizes `text` with the given settings
pub fn tokenize<'a>(text: &'a str, settings: &Settings) -> Result<Vec<Token<'a>>> {
    Ok(Matcher::new(settings)?.tokenize(text))
}
