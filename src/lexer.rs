use std::fmt;

use crate::diagnostics::{Diagnostic, DiagnosticKind, SourceSpan};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Number,
    String,
    Identifier,
    Var,
    If,
    Else,
    While,
    Return,
    Break,
    Continue,
    True,
    False,
    Null,
    And,
    Or,
    Not,
    Plus,
    Minus,
    Times,
    Divide,
    Modulo,
    Equals,
    Greater,
    Less,
    GreaterEqual,
    LessEqual,
    EqualEqual,
    NotEqual,
    LParen,
    RParen,
    Comma,
    Semicolon,
    LBrace,
    RBrace,
    Eof,
}

impl TokenKind {
    /// Human readable label used in "expected ..." sets.
    pub fn describe(self) -> &'static str {
        use TokenKind::*;
        match self {
            Number => "number",
            String => "string",
            Identifier => "identifier",
            Var => "`var`",
            If => "`if`",
            Else => "`else`",
            While => "`while`",
            Return => "`return`",
            Break => "`break`",
            Continue => "`continue`",
            True => "`true`",
            False => "`false`",
            Null => "`null`",
            And => "`and`",
            Or => "`or`",
            Not => "`not`",
            Plus => "`+`",
            Minus => "`-`",
            Times => "`*`",
            Divide => "`/`",
            Modulo => "`%`",
            Equals => "`=`",
            Greater => "`>`",
            Less => "`<`",
            GreaterEqual => "`>=`",
            LessEqual => "`<=`",
            EqualEqual => "`==`",
            NotEqual => "`!=`",
            LParen => "`(`",
            RParen => "`)`",
            Comma => "`,`",
            Semicolon => "`;`",
            LBrace => "`{`",
            RBrace => "`}`",
            Eof => "end of input",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub span: SourceSpan,
}

const KEYWORDS: &[(&str, TokenKind)] = &[
    ("var", TokenKind::Var),
    ("if", TokenKind::If),
    ("else", TokenKind::Else),
    ("while", TokenKind::While),
    ("return", TokenKind::Return),
    ("break", TokenKind::Break),
    ("continue", TokenKind::Continue),
    ("true", TokenKind::True),
    ("false", TokenKind::False),
    ("null", TokenKind::Null),
    ("and", TokenKind::And),
    ("or", TokenKind::Or),
    ("not", TokenKind::Not),
];

const TWO_CHAR_OPERATORS: &[(&str, TokenKind)] = &[
    ("==", TokenKind::EqualEqual),
    ("!=", TokenKind::NotEqual),
    (">=", TokenKind::GreaterEqual),
    ("<=", TokenKind::LessEqual),
];

const ONE_CHAR_OPERATORS: &[(&str, TokenKind)] = &[
    ("+", TokenKind::Plus),
    ("-", TokenKind::Minus),
    ("*", TokenKind::Times),
    ("/", TokenKind::Divide),
    ("%", TokenKind::Modulo),
    ("=", TokenKind::Equals),
    (">", TokenKind::Greater),
    ("<", TokenKind::Less),
    ("(", TokenKind::LParen),
    (")", TokenKind::RParen),
    (",", TokenKind::Comma),
    (";", TokenKind::Semicolon),
    ("{", TokenKind::LBrace),
    ("}", TokenKind::RBrace),
];

/// One pluggable token rule. The lexer probes `can_start` with the current
/// character and asks the first willing recognizer for the longest match.
pub trait Recognizer {
    fn label(&self) -> &'static str;

    fn can_start(&self, ch: char) -> bool;

    /// Returns the token kind and its end offset, `Ok(None)` when nothing
    /// starting at `start` matches this rule.
    fn recognize(
        &self,
        source: &str,
        start: usize,
    ) -> Result<Option<(TokenKind, usize)>, Diagnostic>;
}

pub struct QuotedString;

impl Recognizer for QuotedString {
    fn label(&self) -> &'static str {
        "string"
    }

    fn can_start(&self, ch: char) -> bool {
        ch == '"'
    }

    fn recognize(
        &self,
        source: &str,
        start: usize,
    ) -> Result<Option<(TokenKind, usize)>, Diagnostic> {
        let mut chars = source[start..].char_indices().skip(1).peekable();
        while let Some((offset, ch)) = chars.next() {
            let idx = start + offset;
            match ch {
                '"' => return Ok(Some((TokenKind::String, idx + 1))),
                '\\' => match chars.peek() {
                    Some((_, '"')) => {
                        chars.next();
                    }
                    _ => {
                        return Err(Diagnostic::new(
                            DiagnosticKind::Lexer,
                            "unsupported escape sequence in string literal",
                        )
                        .with_span(SourceSpan::new(idx, idx + 1))
                        .with_expected(["`\\\"`"]));
                    }
                },
                '\n' | '\r' => {
                    return Err(unterminated_string(start, idx));
                }
                _ => {}
            }
        }
        Err(unterminated_string(start, source.len()))
    }
}

fn unterminated_string(start: usize, end: usize) -> Diagnostic {
    Diagnostic::new(DiagnosticKind::Lexer, "unterminated string literal")
        .with_span(SourceSpan::new(start, end))
        .with_expected(["`\"`"])
}

/// Fixed operator set where every entry has the same width.
pub struct OperatorSet {
    table: &'static [(&'static str, TokenKind)],
    width: usize,
}

impl OperatorSet {
    pub fn two_char() -> Self {
        Self {
            table: TWO_CHAR_OPERATORS,
            width: 2,
        }
    }

    pub fn one_char() -> Self {
        Self {
            table: ONE_CHAR_OPERATORS,
            width: 1,
        }
    }
}

impl Recognizer for OperatorSet {
    fn label(&self) -> &'static str {
        "operator"
    }

    fn can_start(&self, ch: char) -> bool {
        self.table.iter().any(|(text, _)| text.starts_with(ch))
    }

    fn recognize(
        &self,
        source: &str,
        start: usize,
    ) -> Result<Option<(TokenKind, usize)>, Diagnostic> {
        let Some(candidate) = source.get(start..start + self.width) else {
            return Ok(None);
        };
        Ok(self
            .table
            .iter()
            .find(|(text, _)| *text == candidate)
            .map(|(_, kind)| (*kind, start + self.width)))
    }
}

/// Digits with at most one decimal point; always a float literal.
pub struct NumberLiteral;

impl Recognizer for NumberLiteral {
    fn label(&self) -> &'static str {
        "number"
    }

    fn can_start(&self, ch: char) -> bool {
        ch.is_ascii_digit() || ch == '.'
    }

    fn recognize(
        &self,
        source: &str,
        start: usize,
    ) -> Result<Option<(TokenKind, usize)>, Diagnostic> {
        let mut end = start;
        let mut seen_dot = false;
        let mut seen_digit = false;
        for (offset, ch) in source[start..].char_indices() {
            match ch {
                '0'..='9' => seen_digit = true,
                '.' if !seen_dot => seen_dot = true,
                _ => break,
            }
            end = start + offset + 1;
        }
        Ok(seen_digit.then_some((TokenKind::Number, end)))
    }
}

fn word_end(source: &str, start: usize) -> usize {
    source[start..]
        .char_indices()
        .find(|(_, ch)| !(ch.is_alphanumeric() || *ch == '_'))
        .map(|(offset, _)| start + offset)
        .unwrap_or(source.len())
}

/// Reserved words; only whole words match, so `iffy` stays an identifier.
pub struct KeywordSet;

impl Recognizer for KeywordSet {
    fn label(&self) -> &'static str {
        "keyword"
    }

    fn can_start(&self, ch: char) -> bool {
        KEYWORDS.iter().any(|(text, _)| text.starts_with(ch))
    }

    fn recognize(
        &self,
        source: &str,
        start: usize,
    ) -> Result<Option<(TokenKind, usize)>, Diagnostic> {
        let end = word_end(source, start);
        let word = &source[start..end];
        Ok(KEYWORDS
            .iter()
            .find(|(text, _)| *text == word)
            .map(|(_, kind)| (*kind, end)))
    }
}

pub struct Identifier;

impl Recognizer for Identifier {
    fn label(&self) -> &'static str {
        "identifier"
    }

    fn can_start(&self, ch: char) -> bool {
        ch.is_alphabetic() || ch == '_'
    }

    fn recognize(
        &self,
        source: &str,
        start: usize,
    ) -> Result<Option<(TokenKind, usize)>, Diagnostic> {
        Ok(Some((TokenKind::Identifier, word_end(source, start))))
    }
}

/// Recognizers in priority order.
pub fn default_recognizers() -> Vec<Box<dyn Recognizer>> {
    vec![
        Box::new(QuotedString),
        Box::new(OperatorSet::two_char()),
        Box::new(OperatorSet::one_char()),
        Box::new(NumberLiteral),
        Box::new(KeywordSet),
        Box::new(Identifier),
    ]
}

pub struct Lexer<'a> {
    source: &'a str,
    recognizers: Vec<Box<dyn Recognizer>>,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self::with_recognizers(source, default_recognizers())
    }

    pub fn with_recognizers(source: &'a str, recognizers: Vec<Box<dyn Recognizer>>) -> Self {
        Self {
            source,
            recognizers,
        }
    }

    fn skip_whitespace(&self, from: usize) -> usize {
        self.source[from..]
            .char_indices()
            .find(|(_, ch)| !ch.is_whitespace())
            .map(|(offset, _)| from + offset)
            .unwrap_or(self.source.len())
    }

    fn next_token(&self, start: usize, ch: char) -> Result<Token, Diagnostic> {
        for recognizer in &self.recognizers {
            if !recognizer.can_start(ch) {
                continue;
            }
            if let Some((kind, end)) = recognizer.recognize(self.source, start)? {
                return Ok(Token {
                    kind,
                    lexeme: self.source[start..end].to_string(),
                    span: SourceSpan::new(start, end),
                });
            }
        }
        Err(Diagnostic::new(
            DiagnosticKind::Lexer,
            format!("unexpected character `{ch}`"),
        )
        .with_span(SourceSpan::new(start, start + ch.len_utf8()))
        .with_expected(self.recognizers.iter().map(|r| r.label())))
    }

    pub fn tokenize(self) -> Result<Vec<Token>, Diagnostic> {
        let mut tokens = Vec::new();
        let mut cursor = self.skip_whitespace(0);
        while let Some(ch) = self.source[cursor..].chars().next() {
            let token = self
                .next_token(cursor, ch)
                .map_err(|diag| diag.located_in(self.source))?;
            cursor = self.skip_whitespace(token.span.end);
            tokens.push(token);
        }
        tokens.push(Token {
            kind: TokenKind::Eof,
            lexeme: String::new(),
            span: SourceSpan::new(self.source.len(), self.source.len()),
        });
        Ok(tokens)
    }
}

/// Strips the quotes from a string lexeme and resolves `\"`.
pub fn unquote(lexeme: &str) -> String {
    let inner = lexeme
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .unwrap_or(lexeme);
    inner.replace("\\\"", "\"")
}
