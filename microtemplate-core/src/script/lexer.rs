//! Script lexer
//!
//! `RawToken` is the logos-derived token set. [`lex`] drops whitespace and
//! comments, recording on each [`Lexeme`] whether a line break preceded it,
//! which the parser needs for automatic semicolon insertion.

use logos::Logos;

use crate::error::{CompileError, Result};

fn number(lex: &mut logos::Lexer<'_, RawToken>) -> Option<f64> {
    lex.slice().parse().ok()
}

fn hex(lex: &mut logos::Lexer<'_, RawToken>) -> Option<f64> {
    u64::from_str_radix(&lex.slice()[2..], 16).ok().map(|n| n as f64)
}

#[derive(Logos, Debug, Clone, Copy, PartialEq)]
#[logos(skip r"[ \t\x0B\x0C\u{A0}\u{FEFF}]+")]
pub(crate) enum RawToken {
    #[regex(r"\r\n|[\r\n\u{2028}\u{2029}]")]
    Newline,
    #[regex(r"//[^\r\n\u{2028}\u{2029}]*")]
    LineComment,
    #[regex(r"/\*([^*]|\*+[^*/])*\*+/")]
    BlockComment,

    #[token("break")]
    Break,
    #[token("const")]
    Const,
    #[token("continue")]
    Continue,
    #[token("do")]
    Do,
    #[token("else")]
    Else,
    #[token("false")]
    False,
    #[token("for")]
    For,
    #[token("function")]
    Function,
    #[token("if")]
    If,
    #[token("in")]
    In,
    #[token("let")]
    Let,
    #[token("null")]
    Null,
    #[token("return")]
    Return,
    #[token("this")]
    This,
    #[token("throw")]
    Throw,
    #[token("true")]
    True,
    #[token("typeof")]
    Typeof,
    #[token("var")]
    Var,
    #[token("void")]
    Void,
    #[token("while")]
    While,
    #[token("with")]
    With,

    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token(";")]
    Semicolon,
    #[token(",")]
    Comma,
    #[token(".")]
    Dot,
    #[token("?.")]
    QuestionDot,
    #[token("?")]
    Question,
    #[token(":")]
    Colon,
    #[token("=>")]
    Arrow,

    #[token("=")]
    Assign,
    #[token("+=")]
    PlusAssign,
    #[token("-=")]
    MinusAssign,
    #[token("*=")]
    StarAssign,
    #[token("/=")]
    SlashAssign,
    #[token("%=")]
    PercentAssign,

    #[token("==")]
    EqEq,
    #[token("!=")]
    NotEq,
    #[token("===")]
    EqEqEq,
    #[token("!==")]
    NotEqEq,
    #[token("<")]
    Lt,
    #[token("<=")]
    LtEq,
    #[token(">")]
    Gt,
    #[token(">=")]
    GtEq,

    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("++")]
    PlusPlus,
    #[token("--")]
    MinusMinus,
    #[token("!")]
    Bang,
    #[token("&&")]
    AndAnd,
    #[token("||")]
    OrOr,
    #[token("??")]
    Nullish,

    #[regex(r"0[xX][0-9a-fA-F]+", hex)]
    #[regex(r"[0-9]+(\.[0-9]*)?([eE][+-]?[0-9]+)?", number)]
    #[regex(r"\.[0-9]+([eE][+-]?[0-9]+)?", number)]
    Number(f64),

    #[regex(r#""([^"\\\r\n]|\\(.|\n))*""#)]
    #[regex(r"'([^'\\\r\n]|\\(.|\n))*'")]
    String,

    #[regex(r"[A-Za-z_$][A-Za-z0-9_$]*")]
    Ident,
}

impl RawToken {
    /// Keywords are still valid property names after `.` and in object literals
    pub(crate) fn is_word(self) -> bool {
        matches!(
            self,
            RawToken::Ident
                | RawToken::Break
                | RawToken::Const
                | RawToken::Continue
                | RawToken::Do
                | RawToken::Else
                | RawToken::False
                | RawToken::For
                | RawToken::Function
                | RawToken::If
                | RawToken::In
                | RawToken::Let
                | RawToken::Null
                | RawToken::Return
                | RawToken::This
                | RawToken::Throw
                | RawToken::True
                | RawToken::Typeof
                | RawToken::Var
                | RawToken::Void
                | RawToken::While
                | RawToken::With
        )
    }
}

/// A token with its byte span in the source
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Lexeme {
    pub kind: RawToken,
    pub start: usize,
    pub end: usize,
    /// A line terminator appeared between this token and the previous one
    pub newline_before: bool,
}

pub(crate) fn lex(source: &str) -> Result<Vec<Lexeme>> {
    let mut lexemes = Vec::new();
    let mut newline = false;
    let mut lexer = RawToken::lexer(source);
    while let Some(result) = lexer.next() {
        let span = lexer.span();
        match result {
            Ok(RawToken::Newline) => newline = true,
            Ok(RawToken::LineComment) => {}
            Ok(RawToken::BlockComment) => {
                newline |= lexer.slice().contains(['\r', '\n', '\u{2028}', '\u{2029}']);
            }
            Ok(kind) => {
                lexemes.push(Lexeme {
                    kind,
                    start: span.start,
                    end: span.end,
                    newline_before: newline,
                });
                newline = false;
            }
            Err(()) => {
                let message = match lexer.slice().chars().next() {
                    Some(quote @ ('\'' | '"')) => format!("unterminated string starting with {quote}"),
                    Some(c) => format!("unexpected character {c:?}"),
                    None => "unexpected end of input".to_string(),
                };
                return Err(CompileError::syntax(message, span.start, source));
            }
        }
    }
    Ok(lexemes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn kinds(source: &str) -> Vec<RawToken> {
        lex(source).unwrap().into_iter().map(|l| l.kind).collect()
    }

    #[test]
    fn lexes_generated_prelude() {
        assert_eq!(
            kinds("var __t,__p='';"),
            vec![
                RawToken::Var,
                RawToken::Ident,
                RawToken::Comma,
                RawToken::Ident,
                RawToken::Assign,
                RawToken::String,
                RawToken::Semicolon,
            ]
        );
    }

    #[test]
    fn longest_operator_wins() {
        assert_eq!(
            kinds("a===b!==c=>d?.e??f"),
            vec![
                RawToken::Ident,
                RawToken::EqEqEq,
                RawToken::Ident,
                RawToken::NotEqEq,
                RawToken::Ident,
                RawToken::Arrow,
                RawToken::Ident,
                RawToken::QuestionDot,
                RawToken::Ident,
                RawToken::Nullish,
                RawToken::Ident,
            ]
        );
    }

    #[test]
    fn numbers() {
        assert_eq!(
            kinds("1 2.5 .5 1e3 0x1F"),
            vec![
                RawToken::Number(1.0),
                RawToken::Number(2.5),
                RawToken::Number(0.5),
                RawToken::Number(1000.0),
                RawToken::Number(31.0),
            ]
        );
    }

    #[test]
    fn keywords_are_not_identifiers() {
        assert_eq!(kinds("with within"), vec![RawToken::With, RawToken::Ident]);
    }

    #[test]
    fn tracks_line_breaks() {
        let lexemes = lex("a /* x\n */ b // c\n c d").unwrap();
        let breaks: Vec<bool> = lexemes.iter().map(|l| l.newline_before).collect();
        assert_eq!(breaks, vec![false, true, true, false]);
    }

    #[test]
    fn strings_may_continue_lines() {
        assert_eq!(kinds("'a\\\nb' \"it's\""), vec![RawToken::String, RawToken::String]);
    }

    #[test]
    fn reports_unterminated_strings() {
        let err = lex("x = 'abc").unwrap_err();
        assert!(err.to_string().starts_with("unterminated string"), "{err}");
        assert!(matches!(lex("a # b"), Err(CompileError::Syntax { offset: 2, .. })));
    }
}
