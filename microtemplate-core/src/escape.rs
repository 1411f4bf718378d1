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

//! String literal escaping
//!
//! Literal template text is embedded in the generated source inside
//! single-quoted string literals. [`ESCAPES`] lists every character that cannot
//! appear there verbatim, and [`cook`] turns the body of a string literal back
//! into the text it denotes.

use std::{borrow::Cow, sync::LazyLock};

use regex::{Captures, Regex};

/// Characters that must be escaped inside a generated string literal
pub const ESCAPES: [(&str, &str); 6] = [
    ("\\", "\\\\"),
    ("'", "\\'"),
    ("\r", "\\r"),
    ("\n", "\\n"),
    ("\u{2028}", "\\u2028"),
    ("\u{2029}", "\\u2029"),
];

static ESCAPER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("\\\\|'|\r|\n|\u{2028}|\u{2029}").unwrap());

/// Escapes literal text so it can sit between single quotes in generated source
pub fn escape_literal(text: &str) -> Cow<'_, str> {
    ESCAPER.replace_all(text, |captures: &Captures| {
        ESCAPES
            .iter()
            .find(|(raw, _)| *raw == &captures[0])
            .map_or("", |(_, escaped)| *escaped)
    })
}

fn hex_digits(chars: &mut std::str::Chars<'_>, count: usize) -> Result<u32, String> {
    let digits: String = chars.by_ref().take(count).collect();
    if digits.len() != count {
        return Err(format!("incomplete escape sequence \\{digits}"));
    }
    u32::from_str_radix(&digits, 16).map_err(|_| format!("invalid escape sequence \\{digits}"))
}

fn code_point(value: u32) -> Result<char, String> {
    char::from_u32(value).ok_or_else(|| format!("invalid code point {value:#x}"))
}

/// Decodes the escape sequences in the body of a string literal
///
/// Unknown escapes stand for the escaped character itself, so `\q` is `q`.
pub fn cook(raw: &str) -> Result<Cow<'_, str>, String> {
    if !raw.contains('\\') {
        return Ok(Cow::Borrowed(raw));
    }
    let mut cooked = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            cooked.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => cooked.push('\n'),
            Some('r') => cooked.push('\r'),
            Some('t') => cooked.push('\t'),
            Some('b') => cooked.push('\u{8}'),
            Some('f') => cooked.push('\u{c}'),
            Some('v') => cooked.push('\u{b}'),
            Some('0') => cooked.push('\0'),
            Some('x') => cooked.push(code_point(hex_digits(&mut chars, 2)?)?),
            Some('u') => {
                let mut ahead = chars.clone();
                if ahead.next() == Some('{') {
                    let digits: String = ahead.by_ref().take_while(|c| *c != '}').collect();
                    let value = u32::from_str_radix(&digits, 16)
                        .map_err(|_| format!("invalid escape sequence \\u{{{digits}}}"))?;
                    cooked.push(code_point(value)?);
                    chars = ahead;
                } else {
                    cooked.push(code_point(hex_digits(&mut chars, 4)?)?);
                }
            }
            // line continuation
            Some('\r') => {
                let mut ahead = chars.clone();
                if ahead.next() == Some('\n') {
                    chars = ahead;
                }
            }
            Some('\n' | '\u{2028}' | '\u{2029}') => (),
            Some(other) => cooked.push(other),
            None => return Err("unterminated escape sequence".to_string()),
        }
    }
    Ok(Cow::Owned(cooked))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn escapes_every_table_entry() {
        assert_eq!(
            escape_literal("a\\b'c\rd\ne\u{2028}f\u{2029}g"),
            "a\\\\b\\'c\\rd\\ne\\u2028f\\u2029g"
        );
    }

    #[test]
    fn leaves_other_text_alone() {
        let text = "<p class=\"x\">tab\there</p>";
        assert!(matches!(escape_literal(text), Cow::Borrowed(_)));
    }

    #[test]
    fn cooks_common_escapes() {
        assert_eq!(cook(r"\x41B\u{1F600}\t\q").unwrap(), "AB\u{1F600}\tq");
        assert_eq!(cook("a\\\nb").unwrap(), "ab");
    }

    #[test]
    fn rejects_broken_escapes() {
        assert!(cook(r"\u12").is_err());
        assert!(cook(r"\xZZ").is_err());
        assert!(cook("trailing\\").is_err());
    }

    proptest! {
        #[test]
        fn cook_reverses_escape_literal(text in "[a-z\\\\'\r\n\u{2028}\u{2029} \"]{0,40}") {
            let escaped = escape_literal(&text);
            let cooked = cook(&escaped).unwrap();
            prop_assert_eq!(&*cooked, text.as_str());
        }
    }
}
