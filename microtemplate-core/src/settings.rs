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

//! Delimiter configuration
//!
//! A [`Settings`] value names the pattern for each directive kind and,
//! optionally, the variable the render data is bound to. Unset fields are
//! filled from a fallback with [`Settings::defaults`], normally the
//! process-wide store behind [`template_settings`].
//!
//! Each pattern is a regular expression whose first capture group is the body
//! of the directive:
//!
//! ```rust
//! use microtemplate_core::Settings;
//!
//! let mustache = Settings::new()
//!     .with_interpolate(r"\{\{([\s\S]+?)\}\}")
//!     .with_variable("data");
//! let merged = mustache.defaults(&Settings::classic());
//! assert_eq!(merged.variable.as_deref(), Some("data"));
//! ```

use std::{borrow::Cow, sync::LazyLock};

use parking_lot::RwLock;
use tracing::trace;

use crate::{error::{CompileError, Result}, tokenizer::DirectiveKind};

/// A pattern that cannot match any input
pub const NO_MATCH: &str = "(.)^";

/// Parameter name used when no variable is configured
pub const DEFAULT_VARIABLE: &str = "obj";

/// How one directive kind is recognized
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delimiter {
    /// Regular expression with the directive body in its first capture group
    Pattern(Cow<'static, str>),
    /// The directive kind never matches, even when a fallback defines it
    Disabled,
}

impl Delimiter {
    /// The regular expression to scan with
    pub fn pattern(&self) -> &str {
        match self {
            Delimiter::Pattern(pattern) => pattern,
            Delimiter::Disabled => NO_MATCH,
        }
    }
}

/// How the render data is exposed to template code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope<'a> {
    /// The data's own properties are bare names; the data itself is `obj`
    Flatten,
    /// The data is bound to this one name only
    Named(&'a str),
}

impl Scope<'_> {
    /// Name of the generated function's parameter
    pub fn param(&self) -> &str {
        match self {
            Scope::Flatten => DEFAULT_VARIABLE,
            Scope::Named(name) => name,
        }
    }
}

/// Delimiter set used to compile a template
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    /// HTML-escaped output, `<%- ... %>` by default
    pub escape: Option<Delimiter>,
    /// Raw output, `<%= ... %>` by default
    pub interpolate: Option<Delimiter>,
    /// Arbitrary code, `<% ... %>` by default
    pub evaluate: Option<Delimiter>,
    /// Name the data is bound to; unset flattens the data into scope
    pub variable: Option<String>,
}

impl Settings {
    /// Settings with every field unset
    pub const fn new() -> Self {
        Self {
            escape: None,
            interpolate: None,
            evaluate: None,
            variable: None,
        }
    }

    /// The ERB-style delimiters used out of the box
    pub fn classic() -> Self {
        Self {
            escape: Some(Delimiter::Pattern(Cow::Borrowed(r"<%-([\s\S]+?)%>"))),
            interpolate: Some(Delimiter::Pattern(Cow::Borrowed(r"<%=([\s\S]+?)%>"))),
            evaluate: Some(Delimiter::Pattern(Cow::Borrowed(r"<%([\s\S]+?)%>"))),
            variable: None,
        }
    }

    pub fn with_escape(mut self, pattern: impl Into<Cow<'static, str>>) -> Self {
        self.escape = Some(Delimiter::Pattern(pattern.into()));
        self
    }

    pub fn with_interpolate(mut self, pattern: impl Into<Cow<'static, str>>) -> Self {
        self.interpolate = Some(Delimiter::Pattern(pattern.into()));
        self
    }

    pub fn with_evaluate(mut self, pattern: impl Into<Cow<'static, str>>) -> Self {
        self.evaluate = Some(Delimiter::Pattern(pattern.into()));
        self
    }

    pub fn with_variable(mut self, name: impl Into<String>) -> Self {
        self.variable = Some(name.into());
        self
    }

    /// Turns a directive kind off regardless of any fallback
    pub fn without(mut self, kind: DirectiveKind) -> Self {
        *self.slot(kind) = Some(Delimiter::Disabled);
        self
    }

    fn slot(&mut self, kind: DirectiveKind) -> &mut Option<Delimiter> {
        match kind {
            DirectiveKind::Escape => &mut self.escape,
            DirectiveKind::Interpolate => &mut self.interpolate,
            DirectiveKind::Evaluate => &mut self.evaluate,
        }
    }

    pub fn delimiter(&self, kind: DirectiveKind) -> Option<&Delimiter> {
        match kind {
            DirectiveKind::Escape => self.escape.as_ref(),
            DirectiveKind::Interpolate => self.interpolate.as_ref(),
            DirectiveKind::Evaluate => self.evaluate.as_ref(),
        }
    }

    /// The pattern a directive kind is scanned with, [`NO_MATCH`] when unset
    pub fn pattern(&self, kind: DirectiveKind) -> &str {
        self.delimiter(kind).map_or(NO_MATCH, Delimiter::pattern)
    }

    /// Fills every unset field from `fallback`
    pub fn defaults(mut self, fallback: &Settings) -> Settings {
        for kind in DirectiveKind::ALL {
            let slot = self.slot(kind);
            if slot.is_none() {
                *slot = fallback.delimiter(kind).cloned();
            }
        }
        if self.variable.is_none() {
            self.variable = fallback.variable.clone();
        }
        trace!(settings = ?self, "merged template settings");
        self
    }

    pub fn scope(&self) -> Scope<'_> {
        match &self.variable {
            Some(name) => Scope::Named(name),
            None => Scope::Flatten,
        }
    }

    pub(crate) fn validate_variable(&self) -> Result<()> {
        match &self.variable {
            Some(name) if !is_identifier(name) => Err(CompileError::InvalidVariable(name.clone())),
            _ => Ok(()),
        }
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

static TEMPLATE_SETTINGS: LazyLock<RwLock<Settings>> =
    LazyLock::new(|| RwLock::new(Settings::classic()));

/// Current process-wide defaults
pub fn template_settings() -> Settings {
    TEMPLATE_SETTINGS.read().clone()
}

/// Replaces the process-wide defaults for every later [`compile`](crate::compile)
pub fn set_template_settings(settings: Settings) {
    *TEMPLATE_SETTINGS.write() = settings;
}

/// Edits the process-wide defaults in place
pub fn update_template_settings(update: impl FnOnce(&mut Settings)) {
    update(&mut TEMPLATE_SETTINGS.write());
}

/// Restores the process-wide defaults to [`Settings::classic`]
pub fn reset_template_settings() {
    set_template_settings(Settings::classic());
}

/// Held by tests that change or read the process-wide defaults
#[cfg(test)]
pub(crate) static STORE_LOCK: parking_lot::Mutex<()> = parking_lot::Mutex::new(());

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn unset_fields_never_match() {
        let settings = Settings::new();
        for kind in DirectiveKind::ALL {
            assert_eq!(settings.pattern(kind), NO_MATCH);
        }
        assert!(!regex::Regex::new(NO_MATCH).unwrap().is_match("anything\nat all"));
    }

    #[test]
    fn defaults_only_fill_unset_fields() {
        let merged = Settings::new()
            .with_interpolate(r"\{\{(.+?)\}\}")
            .defaults(&Settings::classic().with_variable("data"));
        assert_eq!(merged.pattern(DirectiveKind::Interpolate), r"\{\{(.+?)\}\}");
        assert_eq!(merged.pattern(DirectiveKind::Escape), r"<%-([\s\S]+?)%>");
        assert_eq!(merged.scope(), Scope::Named("data"));
    }

    #[test]
    fn disabled_overrides_fallback() {
        let merged = Settings::new()
            .without(DirectiveKind::Evaluate)
            .defaults(&Settings::classic());
        assert_eq!(merged.pattern(DirectiveKind::Evaluate), NO_MATCH);
        assert_eq!(merged.scope(), Scope::Flatten);
        assert_eq!(merged.scope().param(), "obj");
    }

    #[test]
    fn variable_must_be_identifier() {
        assert!(Settings::new().with_variable("data_1").validate_variable().is_ok());
        assert!(Settings::new().with_variable("$").validate_variable().is_ok());
        for bad in ["", "1st", "a-b", "a b"] {
            assert!(matches!(
                Settings::new().with_variable(bad).validate_variable(),
                Err(CompileError::InvalidVariable(_))
            ));
        }
    }
}
