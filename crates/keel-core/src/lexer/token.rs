//! Token types for the schema lexer.

use core::fmt;

use super::Span;

/// Top-level block keywords.
///
/// Keywords are contextual: the lexer emits identifiers and the parser
/// only treats them as keywords at the start of a block, so a field may
/// still be named `model`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Model,
    Datasource,
    Generator,
    Enum,
}

impl Keyword {
    /// Looks up a keyword from an identifier.
    #[must_use]
    pub fn from_ident(ident: &str) -> Option<Self> {
        match ident {
            "model" => Some(Self::Model),
            "datasource" => Some(Self::Datasource),
            "generator" => Some(Self::Generator),
            "enum" => Some(Self::Enum),
            _ => None,
        }
    }

    /// Returns the keyword as written in schema files.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Model => "model",
            Self::Datasource => "datasource",
            Self::Generator => "generator",
            Self::Enum => "enum",
        }
    }
}

/// Token kinds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    /// Identifier (model, field, type, attribute or function name).
    Identifier(String),
    /// String literal, unescaped.
    String(String),
    /// Numeric literal as written (may carry a sign or a fraction).
    Number(String),

    // Delimiters
    /// `{`
    LeftBrace,
    /// `}`
    RightBrace,
    /// `(`
    LeftParen,
    /// `)`
    RightParen,
    /// `[`
    LeftBracket,
    /// `]`
    RightBracket,
    /// `,`
    Comma,
    /// `:`
    Colon,
    /// `=`
    Equals,
    /// `?`
    Question,
    /// `.`
    Dot,
    /// `@`
    At,
    /// `@@`
    AtAt,

    /// Unrecognized input.
    Error(String),
    /// End of input.
    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Identifier(name) => write!(f, "identifier `{name}`"),
            Self::String(s) => write!(f, "string \"{s}\""),
            Self::Number(n) => write!(f, "number {n}"),
            Self::LeftBrace => f.write_str("`{`"),
            Self::RightBrace => f.write_str("`}`"),
            Self::LeftParen => f.write_str("`(`"),
            Self::RightParen => f.write_str("`)`"),
            Self::LeftBracket => f.write_str("`[`"),
            Self::RightBracket => f.write_str("`]`"),
            Self::Comma => f.write_str("`,`"),
            Self::Colon => f.write_str("`:`"),
            Self::Equals => f.write_str("`=`"),
            Self::Question => f.write_str("`?`"),
            Self::Dot => f.write_str("`.`"),
            Self::At => f.write_str("`@`"),
            Self::AtAt => f.write_str("`@@`"),
            Self::Error(msg) => f.write_str(msg),
            Self::Eof => f.write_str("end of input"),
        }
    }
}

/// A token with its location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// The token kind.
    pub kind: TokenKind,
    /// The source span.
    pub span: Span,
}

impl Token {
    /// Creates a new token.
    #[must_use]
    pub const fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }

    /// Returns the identifier text if this is an identifier.
    #[must_use]
    pub fn as_identifier(&self) -> Option<&str> {
        match &self.kind {
            TokenKind::Identifier(name) => Some(name),
            _ => None,
        }
    }
}
