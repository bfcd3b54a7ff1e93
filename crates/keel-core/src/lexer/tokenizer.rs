//! Schema tokenizer implementation.

use super::{Span, Token, TokenKind};

/// A lexer that tokenizes schema source text.
#[derive(Debug, Clone)]
pub struct Lexer<'a> {
    /// The input source text.
    input: &'a str,
    /// The current byte position.
    pos: usize,
    /// The byte position of the start of the current token.
    start: usize,
}

impl<'a> Lexer<'a> {
    /// Creates a new lexer for the given input.
    #[must_use]
    pub const fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            start: 0,
        }
    }

    /// Returns the current character without advancing.
    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    /// Returns the next character without advancing.
    fn peek_next(&self) -> Option<char> {
        let mut chars = self.input[self.pos..].chars();
        chars.next();
        chars.next()
    }

    /// Advances to the next character and returns it.
    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    /// Skips whitespace and `//` comments.
    fn skip_whitespace_and_comments(&mut self) {
        loop {
            while self.peek().is_some_and(char::is_whitespace) {
                self.advance();
            }

            if self.peek() == Some('/') && self.peek_next() == Some('/') {
                while self.peek().is_some_and(|c| c != '\n') {
                    self.advance();
                }
                continue;
            }

            break;
        }
    }

    /// Creates a token with the current span.
    fn make_token(&self, kind: TokenKind) -> Token {
        Token::new(kind, Span::new(self.start, self.pos))
    }

    /// Scans an identifier.
    fn scan_identifier(&mut self) -> Token {
        while self.peek().is_some_and(|c| c.is_alphanumeric() || c == '_') {
            self.advance();
        }
        let text = &self.input[self.start..self.pos];
        self.make_token(TokenKind::Identifier(text.to_string()))
    }

    /// Scans a double-quoted string literal with `\"`, `\\`, `\n` and
    /// `\t` escapes.
    fn scan_string(&mut self) -> Token {
        self.advance(); // opening quote
        let mut value = String::new();
        loop {
            match self.advance() {
                Some('"') => return self.make_token(TokenKind::String(value)),
                Some('\\') => match self.advance() {
                    Some('n') => value.push('\n'),
                    Some('t') => value.push('\t'),
                    Some(c) => value.push(c),
                    None => break,
                },
                Some('\n') | None => break,
                Some(c) => value.push(c),
            }
        }
        self.make_token(TokenKind::Error("unterminated string literal".to_string()))
    }

    /// Scans an integer or decimal number, with an optional leading `-`.
    fn scan_number(&mut self) -> Token {
        if self.peek() == Some('-') {
            self.advance();
        }
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
        }
        if self.peek() == Some('.') && self.peek_next().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.advance();
            }
        }
        let text = &self.input[self.start..self.pos];
        self.make_token(TokenKind::Number(text.to_string()))
    }

    /// Returns the next token.
    pub fn next_token(&mut self) -> Token {
        self.skip_whitespace_and_comments();
        self.start = self.pos;

        let Some(c) = self.peek() else {
            return self.make_token(TokenKind::Eof);
        };

        if c.is_alphabetic() || c == '_' {
            return self.scan_identifier();
        }
        if c.is_ascii_digit() || (c == '-' && self.peek_next().is_some_and(|n| n.is_ascii_digit()))
        {
            return self.scan_number();
        }
        if c == '"' {
            return self.scan_string();
        }

        self.advance();
        let kind = match c {
            '{' => TokenKind::LeftBrace,
            '}' => TokenKind::RightBrace,
            '(' => TokenKind::LeftParen,
            ')' => TokenKind::RightParen,
            '[' => TokenKind::LeftBracket,
            ']' => TokenKind::RightBracket,
            ',' => TokenKind::Comma,
            ':' => TokenKind::Colon,
            '=' => TokenKind::Equals,
            '?' => TokenKind::Question,
            '.' => TokenKind::Dot,
            '@' => {
                if self.peek() == Some('@') {
                    self.advance();
                    TokenKind::AtAt
                } else {
                    TokenKind::At
                }
            }
            other => TokenKind::Error(format!("unexpected character `{other}`")),
        };
        self.make_token(kind)
    }

    /// Tokenizes the whole input, including the trailing `Eof` token.
    #[must_use]
    pub fn tokenize(mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token();
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                break;
            }
        }
        tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        Lexer::new(input)
            .tokenize()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    fn ident(s: &str) -> TokenKind {
        TokenKind::Identifier(s.to_string())
    }

    #[test]
    fn test_field_declaration() {
        assert_eq!(
            kinds("email String? @unique @db.VarChar(255)"),
            vec![
                ident("email"),
                ident("String"),
                TokenKind::Question,
                TokenKind::At,
                ident("unique"),
                TokenKind::At,
                ident("db"),
                TokenKind::Dot,
                ident("VarChar"),
                TokenKind::LeftParen,
                TokenKind::Number("255".to_string()),
                TokenKind::RightParen,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_block_attribute_and_list() {
        assert_eq!(
            kinds("@@unique([a, b])"),
            vec![
                TokenKind::AtAt,
                ident("unique"),
                TokenKind::LeftParen,
                TokenKind::LeftBracket,
                ident("a"),
                TokenKind::Comma,
                ident("b"),
                TokenKind::RightBracket,
                TokenKind::RightParen,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_comments_are_skipped() {
        assert_eq!(
            kinds("// heading\n/// doc\nmodel // trailing\n"),
            vec![ident("model"), TokenKind::Eof]
        );
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(
            kinds(r#""say \"hi\"""#),
            vec![TokenKind::String("say \"hi\"".to_string()), TokenKind::Eof]
        );
    }

    #[test]
    fn test_unterminated_string() {
        let tokens = kinds("\"open\n");
        assert!(matches!(&tokens[0], TokenKind::Error(msg) if msg.contains("unterminated")));
    }

    #[test]
    fn test_numbers() {
        assert_eq!(
            kinds("-4 2.50 7"),
            vec![
                TokenKind::Number("-4".to_string()),
                TokenKind::Number("2.50".to_string()),
                TokenKind::Number("7".to_string()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_spans() {
        let tokens = Lexer::new("model User").tokenize();
        assert_eq!(tokens[0].span, Span::new(0, 5));
        assert_eq!(tokens[1].span, Span::new(6, 10));
        assert_eq!(tokens[1].as_identifier(), Some("User"));
    }
}
