//! Schema lexer.
//!
//! A hand-written lexer for the schema language that produces a stream of
//! tokens. Comments (`//`, including `///` doc comments) are skipped.

mod span;
mod token;
mod tokenizer;

pub use span::Span;
pub use token::{Keyword, Token, TokenKind};
pub use tokenizer::Lexer;
