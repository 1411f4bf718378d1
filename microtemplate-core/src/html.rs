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

//! HTML entity escaping
//!
//! Only the six characters that matter inside markup and attribute values are
//! handled. This is not a general entity table.

use std::{borrow::Cow, sync::LazyLock};

use regex::{Captures, Regex};

static ESCAPE: LazyLock<Regex> = LazyLock::new(|| Regex::new("[&<>\"'`]").unwrap());
static UNESCAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("&(?:amp|lt|gt|quot|#x27|#x60);").unwrap());

/// Escapes `& < > " ' \`` as HTML entities
pub fn escape(text: &str) -> Cow<'_, str> {
    ESCAPE.replace_all(text, |captures: &Captures| match &captures[0] {
        "&" => "&amp;",
        "<" => "&lt;",
        ">" => "&gt;",
        "\"" => "&quot;",
        "'" => "&#x27;",
        _ => "&#x60;",
    })
}

/// Reverses [`escape`]
pub fn unescape(text: &str) -> Cow<'_, str> {
    UNESCAPE.replace_all(text, |captures: &Captures| match &captures[0] {
        "&amp;" => "&",
        "&lt;" => "<",
        "&gt;" => ">",
        "&quot;" => "\"",
        "&#x27;" => "'",
        _ => "`",
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn escapes_entity_set() {
        assert_eq!(
            escape(r#"<a href="x">Tom & 'Jerry' `1`</a>"#),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; &#x27;Jerry&#x27; &#x60;1&#x60;&lt;/a&gt;"
        );
    }

    #[test]
    fn leaves_clean_text_borrowed() {
        assert!(matches!(escape("plain text / é"), Cow::Borrowed(_)));
        assert!(matches!(unescape("no entities"), Cow::Borrowed(_)));
    }

    #[test]
    fn unescape_reverses_escape() {
        let text = "a < b && c > 'd' \"e\" `f`";
        assert_eq!(unescape(&escape(text)), text);
    }

    #[test]
    fn unescape_ignores_other_entities() {
        assert_eq!(unescape("&nbsp;&amp;amp;"), "&nbsp;&amp;");
    }
}
