//! The lexer.

use derive_more::Display;
use regex::Regex;

use crate::common::Span;

/// Tokens in the program.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Token<'src> {
    /// What token class this token belongs to.
    pub kind: TokenKind,
    /// What part of the input this token carries.
    pub text: &'src str,
    pub span: Span,
}

impl std::fmt::Display for Token<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "kind: '{}', part of input: '{}'", self.kind, self.text)
    }
}

/// Token classes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display)]
pub enum TokenKind {
    #[display("int literal")]
    IntLit,
    #[display("identifier")]
    Id,
    #[display("int")]
    KwInt,
    #[display("void")]
    KwVoid,
    #[display("const")]
    KwConst,
    #[display("if")]
    KwIf,
    #[display("else")]
    KwElse,
    #[display("while")]
    KwWhile,
    #[display("break")]
    KwBreak,
    #[display("continue")]
    KwContinue,
    #[display("return")]
    KwReturn,
    #[display("+")]
    Plus,
    #[display("-")]
    Minus,
    #[display("*")]
    Star,
    #[display("/")]
    Slash,
    #[display("%")]
    Percent,
    #[display("=")]
    Assign,
    #[display("==")]
    Eq,
    #[display("!=")]
    Ne,
    #[display("<")]
    Lt,
    #[display(">")]
    Gt,
    #[display("<=")]
    Le,
    #[display(">=")]
    Ge,
    #[display("&&")]
    AndAnd,
    #[display("||")]
    OrOr,
    #[display("!")]
    Not,
    #[display("(")]
    LParen,
    #[display(")")]
    RParen,
    #[display("{{")]
    LBrace,
    #[display("}}")]
    RBrace,
    #[display("[")]
    LBracket,
    #[display("]")]
    RBracket,
    #[display(";")]
    Semi,
    #[display(",")]
    Comma,
}

const KEYWORDS: &[(&str, TokenKind)] = &[
    ("int", TokenKind::KwInt),
    ("void", TokenKind::KwVoid),
    ("const", TokenKind::KwConst),
    ("if", TokenKind::KwIf),
    ("else", TokenKind::KwElse),
    ("while", TokenKind::KwWhile),
    ("break", TokenKind::KwBreak),
    ("continue", TokenKind::KwContinue),
    ("return", TokenKind::KwReturn),
];

#[derive(Debug)]
pub struct LexError {
    pub span: Span,
    pub ch: char,
}

impl std::fmt::Display for LexError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: unexpected character {:?}", self.span, self.ch)
    }
}

impl std::error::Error for LexError {}

pub struct Lexer<'input> {
    input: &'input str,
    pos: usize,
    line: u32,
    col: u32,
    whitespace: Regex,
    ident_or_kw: Regex,
    hex: Regex,
    octal: Regex,
    decimal: Regex,
}

impl<'input> Lexer<'input> {
    pub fn new(input: &'input str) -> Self {
        Lexer {
            input,
            pos: 0,
            line: 1,
            col: 1,
            whitespace: Regex::new(r"\A(?:[ \t\f\r\n\v]|(?://[^\n]*)|(?s:/\*.*?\*/))*").unwrap(),
            ident_or_kw: Regex::new(r"\A[A-Za-z_][A-Za-z0-9_]*").unwrap(),
            hex: Regex::new(r"\A0[xX][0-9a-fA-F]+").unwrap(),
            octal: Regex::new(r"\A0[0-7]*").unwrap(),
            decimal: Regex::new(r"\A[1-9][0-9]*").unwrap(),
        }
    }

    pub fn end_of_input(&self) -> bool {
        self.pos == self.input.len()
    }

    fn advance_pos(&mut self, text: &str) {
        for ch in text.chars() {
            if ch == '\n' {
                self.line += 1;
                self.col = 1;
            } else {
                self.col += 1;
            }
        }
        self.pos += text.len();
    }

    fn skip_whitespace(&mut self) {
        if let Some(m) = self.whitespace.find(&self.input[self.pos..]) {
            let text = m.as_str().to_string();
            self.advance_pos(&text);
        }
    }

    fn span(&self) -> Span {
        Span {
            line: self.line,
            col: self.col,
        }
    }

    /// Get the next token if possible.
    ///
    /// The return type distinguishes between end-of-input and lexer error.
    pub fn next(&mut self) -> Result<Option<Token<'input>>, LexError> {
        self.skip_whitespace();
        if self.end_of_input() {
            return Ok(None);
        }
        let span = self.span();
        let rest = &self.input[self.pos..];

        if let Some(m) = self.ident_or_kw.find(rest) {
            let text = m.as_str();
            let kind = KEYWORDS
                .iter()
                .find(|(kw, _)| *kw == text)
                .map(|(_, k)| *k)
                .unwrap_or(TokenKind::Id);
            self.advance_pos(text);
            return Ok(Some(Token { kind, text, span }));
        }

        if let Some(m) = self.hex.find(rest) {
            let text = m.as_str();
            self.advance_pos(text);
            return Ok(Some(Token {
                kind: TokenKind::IntLit,
                text,
                span,
            }));
        }
        if let Some(m) = self.decimal.find(rest) {
            let text = m.as_str();
            self.advance_pos(text);
            return Ok(Some(Token {
                kind: TokenKind::IntLit,
                text,
                span,
            }));
        }
        if let Some(m) = self.octal.find(rest) {
            let text = m.as_str();
            self.advance_pos(text);
            return Ok(Some(Token {
                kind: TokenKind::IntLit,
                text,
                span,
            }));
        }

        // Punctuation, longest match first.
        const PUNCT: &[(&str, TokenKind)] = &[
            ("==", TokenKind::Eq),
            ("!=", TokenKind::Ne),
            ("<=", TokenKind::Le),
            (">=", TokenKind::Ge),
            ("&&", TokenKind::AndAnd),
            ("||", TokenKind::OrOr),
            ("+", TokenKind::Plus),
            ("-", TokenKind::Minus),
            ("*", TokenKind::Star),
            ("/", TokenKind::Slash),
            ("%", TokenKind::Percent),
            ("=", TokenKind::Assign),
            ("<", TokenKind::Lt),
            (">", TokenKind::Gt),
            ("!", TokenKind::Not),
            ("(", TokenKind::LParen),
            (")", TokenKind::RParen),
            ("{", TokenKind::LBrace),
            ("}", TokenKind::RBrace),
            ("[", TokenKind::LBracket),
            ("]", TokenKind::RBracket),
            (";", TokenKind::Semi),
            (",", TokenKind::Comma),
        ];
        for (lit, kind) in PUNCT {
            if rest.starts_with(lit) {
                let text = &rest[..lit.len()];
                self.advance_pos(text);
                return Ok(Some(Token {
                    kind: *kind,
                    text,
                    span,
                }));
            }
        }

        let ch = rest.chars().next().unwrap();
        Err(LexError { span, ch })
    }
}

/// Parse the literal text of an `IntLit` token into its `i32` value,
/// honoring decimal/octal/hex radix per the leading digits.
pub fn parse_int_literal(text: &str) -> i32 {
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16).unwrap_or(0) as i32
    } else if text.starts_with('0') && text.len() > 1 {
        i64::from_str_radix(&text[1..], 8).unwrap_or(0) as i32
    } else {
        text.parse::<i64>().unwrap_or(0) as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        let mut lex = Lexer::new(src);
        let mut out = vec![];
        while let Some(tok) = lex.next().unwrap() {
            out.push(tok.kind);
        }
        out
    }

    #[test]
    fn keywords_and_ids() {
        assert_eq!(
            kinds("int x while"),
            vec![TokenKind::KwInt, TokenKind::Id, TokenKind::KwWhile]
        );
    }

    #[test]
    fn int_literal_radixes() {
        assert_eq!(parse_int_literal("42"), 42);
        assert_eq!(parse_int_literal("010"), 8);
        assert_eq!(parse_int_literal("0x1F"), 31);
        assert_eq!(parse_int_literal("0"), 0);
    }

    #[test]
    fn comments_are_skipped() {
        assert_eq!(
            kinds("int x; // comment\nint y; /* block */ int z;"),
            vec![
                TokenKind::KwInt,
                TokenKind::Id,
                TokenKind::Semi,
                TokenKind::KwInt,
                TokenKind::Id,
                TokenKind::Semi,
                TokenKind::KwInt,
                TokenKind::Id,
                TokenKind::Semi,
            ]
        );
    }

    #[test]
    fn unexpected_char_errors() {
        let mut lex = Lexer::new("int x = @;");
        while let Ok(Some(tok)) = lex.next() {
            if tok.kind == TokenKind::Assign {
                break;
            }
        }
        assert!(lex.next().is_err());
    }
}
