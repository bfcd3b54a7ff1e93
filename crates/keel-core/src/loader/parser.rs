//! Recursive descent parser for schema files.

use super::ast::{
    Argument, Arity, Attribute, Block, ConfigBlock, FieldDecl, Ident, ModelDecl, Property,
    SchemaAst, Value, ValueKind,
};
use crate::error::ParseError;
use crate::lexer::{Keyword, Lexer, Span, Token, TokenKind};

/// Schema parser.
pub struct Parser<'a> {
    input: &'a str,
    lexer: Lexer<'a>,
    current: Token,
    previous: Token,
}

impl<'a> Parser<'a> {
    /// Creates a new parser for the given input.
    #[must_use]
    pub fn new(input: &'a str) -> Self {
        let mut lexer = Lexer::new(input);
        let current = lexer.next_token();
        Self {
            input,
            lexer,
            current,
            previous: Token::new(TokenKind::Eof, Span::new(0, 0)),
        }
    }

    /// Parses the whole input.
    ///
    /// # Errors
    ///
    /// Returns a `ParseError` on the first syntax error.
    pub fn parse_schema(&mut self) -> Result<SchemaAst, ParseError> {
        let mut blocks = Vec::new();
        while !self.is_at_end() {
            blocks.push(self.parse_block()?);
        }
        Ok(SchemaAst { blocks })
    }

    fn parse_block(&mut self) -> Result<Block, ParseError> {
        let token = self.current.clone();
        let Some(keyword) = token.as_identifier().and_then(Keyword::from_ident) else {
            return Err(self.unexpected("`model`, `datasource`, `generator` or `enum`"));
        };
        self.advance();
        let name = self.expect_identifier(&format!("{} name", keyword.as_str()))?;
        let declaration = format!("{} {}", keyword.as_str(), name.name);

        let block = match keyword {
            Keyword::Model => self.parse_model_body(name).map(Block::Model),
            Keyword::Datasource => self.parse_config_body(name).map(Block::Datasource),
            Keyword::Generator => self.parse_config_body(name).map(Block::Generator),
            Keyword::Enum => self.skip_block_body().map(|()| Block::Enum(name)),
        };
        block.map_err(|e| e.in_declaration(declaration))
    }

    fn parse_config_body(&mut self, name: Ident) -> Result<ConfigBlock, ParseError> {
        self.expect(&TokenKind::LeftBrace, "`{`")?;
        let mut properties = Vec::new();
        while !self.check(&TokenKind::RightBrace) {
            let key = self.expect_identifier("property name or `}`")?;
            self.expect(&TokenKind::Equals, "`=`")?;
            let value = self.parse_value()?;
            properties.push(Property { key, value });
        }
        self.advance();
        Ok(ConfigBlock { name, properties })
    }

    fn skip_block_body(&mut self) -> Result<(), ParseError> {
        self.expect(&TokenKind::LeftBrace, "`{`")?;
        while !self.check(&TokenKind::RightBrace) {
            if self.is_at_end() {
                return Err(self.unexpected("`}`"));
            }
            self.advance();
        }
        self.advance();
        Ok(())
    }

    fn parse_model_body(&mut self, name: Ident) -> Result<ModelDecl, ParseError> {
        self.expect(&TokenKind::LeftBrace, "`{`")?;
        let mut fields = Vec::new();
        let mut attributes = Vec::new();

        loop {
            match self.current.kind {
                TokenKind::RightBrace => {
                    self.advance();
                    break;
                }
                TokenKind::AtAt => {
                    let start = self.current.span;
                    self.advance();
                    attributes.push(self.parse_attribute(start)?);
                }
                TokenKind::Identifier(_) => fields.push(self.parse_field(&name)?),
                _ => return Err(self.unexpected("field, `@@` attribute or `}`")),
            }
        }

        Ok(ModelDecl {
            name,
            fields,
            attributes,
        })
    }

    fn parse_field(&mut self, model: &Ident) -> Result<FieldDecl, ParseError> {
        let name = self.expect_identifier("field name")?;
        let declaration = format!("field {}.{}", model.name, name.name);

        let type_name = self
            .expect_identifier("field type")
            .map_err(|e| e.in_declaration(declaration.clone()))?;

        let arity = if self.check(&TokenKind::Question) {
            self.advance();
            Arity::Optional
        } else if self.check(&TokenKind::LeftBracket) {
            self.advance();
            self.expect(&TokenKind::RightBracket, "`]`")
                .map_err(|e| e.in_declaration(declaration.clone()))?;
            Arity::List
        } else {
            Arity::Required
        };

        let mut attributes = Vec::new();
        while self.check(&TokenKind::At) {
            let start = self.current.span;
            self.advance();
            let attribute = self
                .parse_attribute(start)
                .map_err(|e| e.in_declaration(declaration.clone()))?;
            attributes.push(attribute);
        }

        Ok(FieldDecl {
            name,
            type_name,
            arity,
            attributes,
        })
    }

    /// Parses an attribute after its `@` or `@@` sigil.
    fn parse_attribute(&mut self, start: Span) -> Result<Attribute, ParseError> {
        let first = self.expect_identifier("attribute name")?;
        let mut name = first.name;
        let mut span = start.merge(first.span);

        while self.check(&TokenKind::Dot) {
            self.advance();
            let part = self.expect_identifier("attribute name")?;
            name.push('.');
            name.push_str(&part.name);
            span = span.merge(part.span);
        }

        let args = if self.check(&TokenKind::LeftParen) {
            let args = self.parse_arguments()?;
            span = span.merge(self.previous.span);
            args
        } else {
            Vec::new()
        };

        Ok(Attribute { name, span, args })
    }

    /// Parses a parenthesized argument list.
    fn parse_arguments(&mut self) -> Result<Vec<Argument>, ParseError> {
        self.expect(&TokenKind::LeftParen, "`(`")?;
        let mut args = Vec::new();
        if self.check(&TokenKind::RightParen) {
            self.advance();
            return Ok(args);
        }

        loop {
            args.push(self.parse_argument()?);
            if self.check(&TokenKind::Comma) {
                self.advance();
                continue;
            }
            self.expect(&TokenKind::RightParen, "`,` or `)`")?;
            break;
        }
        Ok(args)
    }

    fn parse_argument(&mut self) -> Result<Argument, ParseError> {
        let named = matches!(self.current.kind, TokenKind::Identifier(_))
            && self.peek_kind() == TokenKind::Colon;
        let name = if named {
            let name = self.expect_identifier("argument name")?;
            self.advance(); // :
            Some(name)
        } else {
            None
        };
        let value = self.parse_value()?;
        Ok(Argument { name, value })
    }

    fn parse_value(&mut self) -> Result<Value, ParseError> {
        let token = self.current.clone();
        match token.kind {
            TokenKind::String(s) => {
                self.advance();
                Ok(Value {
                    kind: ValueKind::String(s),
                    span: token.span,
                })
            }
            TokenKind::Number(n) => {
                self.advance();
                Ok(Value {
                    kind: ValueKind::Number(n),
                    span: token.span,
                })
            }
            TokenKind::Identifier(name) => {
                self.advance();
                if self.check(&TokenKind::LeftParen) {
                    let args = self.parse_arguments()?;
                    Ok(Value {
                        kind: ValueKind::Call { name, args },
                        span: token.span.merge(self.previous.span),
                    })
                } else {
                    Ok(Value {
                        kind: ValueKind::Constant(name),
                        span: token.span,
                    })
                }
            }
            TokenKind::LeftBracket => {
                self.advance();
                let mut items = Vec::new();
                while !self.check(&TokenKind::RightBracket) {
                    items.push(self.parse_value()?);
                    if self.check(&TokenKind::Comma) {
                        self.advance();
                    } else if !self.check(&TokenKind::RightBracket) {
                        return Err(self.unexpected("`,` or `]`"));
                    }
                }
                self.advance();
                Ok(Value {
                    kind: ValueKind::Array(items),
                    span: token.span.merge(self.previous.span),
                })
            }
            _ => Err(self.unexpected("value")),
        }
    }

    // Token helpers

    fn is_at_end(&self) -> bool {
        self.current.kind == TokenKind::Eof
    }

    fn advance(&mut self) {
        let next = self.lexer.next_token();
        self.previous = std::mem::replace(&mut self.current, next);
    }

    fn check(&self, kind: &TokenKind) -> bool {
        &self.current.kind == kind
    }

    /// Returns the kind of the token after `current` without consuming it.
    fn peek_kind(&self) -> TokenKind {
        self.lexer.clone().next_token().kind
    }

    fn expect(&mut self, kind: &TokenKind, expected: &str) -> Result<(), ParseError> {
        if self.check(kind) {
            self.advance();
            Ok(())
        } else {
            Err(self.unexpected(expected))
        }
    }

    fn expect_identifier(&mut self, expected: &str) -> Result<Ident, ParseError> {
        if let TokenKind::Identifier(name) = &self.current.kind {
            let ident = Ident {
                name: name.clone(),
                span: self.current.span,
            };
            self.advance();
            Ok(ident)
        } else {
            Err(self.unexpected(expected))
        }
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        let message = match &self.current.kind {
            TokenKind::Error(msg) => msg.clone(),
            TokenKind::Eof => format!("Unexpected end of input: expected {expected}"),
            found => format!("Unexpected token: expected {expected}, found {found}"),
        };
        ParseError::new(message, self.current.span, self.input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &str) -> Result<SchemaAst, ParseError> {
        Parser::new(input).parse_schema()
    }

    #[test]
    fn test_parse_model() {
        let ast = parse(
            r#"
            model User {
              id    Int     @id @default(autoincrement())
              email String? @unique @db.VarChar(255)
              posts Post[]

              @@map("users")
            }
            "#,
        )
        .unwrap();

        let Block::Model(model) = &ast.blocks[0] else {
            panic!("Expected model block");
        };
        assert_eq!(model.name.name, "User");
        assert_eq!(model.fields.len(), 3);

        let id = &model.fields[0];
        assert_eq!(id.type_name.name, "Int");
        assert_eq!(id.arity, Arity::Required);
        assert_eq!(id.attributes[0].name, "id");
        let default = id.attribute("default").unwrap();
        assert!(matches!(
            &default.positional().unwrap().kind,
            ValueKind::Call { name, args } if name == "autoincrement" && args.is_empty()
        ));

        let email = &model.fields[1];
        assert_eq!(email.arity, Arity::Optional);
        let native = email.attribute("db.VarChar").unwrap();
        assert_eq!(
            native.positional().unwrap().kind,
            ValueKind::Number("255".into())
        );

        assert_eq!(model.fields[2].arity, Arity::List);
        assert_eq!(
            model.attribute("map").unwrap().positional().unwrap().as_str(),
            Some("users")
        );
    }

    #[test]
    fn test_parse_named_arguments() {
        let ast = parse(
            "model Post { author User @relation(\"Authored\", fields: [authorId], references: [id], onDelete: Cascade) }",
        )
        .unwrap();
        let Block::Model(model) = &ast.blocks[0] else {
            panic!("Expected model block");
        };
        let relation = model.fields[0].attribute("relation").unwrap();
        assert_eq!(relation.positional().unwrap().as_str(), Some("Authored"));
        assert!(matches!(
            &relation.named("fields").unwrap().kind,
            ValueKind::Array(items) if items.len() == 1
        ));
        assert_eq!(
            relation.named("onDelete").unwrap().as_constant(),
            Some("Cascade")
        );
        assert!(relation.named("onUpdate").is_none());
    }

    #[test]
    fn test_parse_config_blocks() {
        let ast = parse(
            r#"
            datasource db {
              provider = "postgresql"
              url      = env("DATABASE_URL")
            }
            generator client {
              provider = "client-js"
              previewFeatures = ["views"]
            }
            "#,
        )
        .unwrap();
        assert_eq!(ast.blocks.len(), 2);
        let Block::Datasource(db) = &ast.blocks[0] else {
            panic!("Expected datasource block");
        };
        assert_eq!(
            db.property("provider").unwrap().value.as_str(),
            Some("postgresql")
        );
        assert!(matches!(
            &db.property("url").unwrap().value.kind,
            ValueKind::Call { name, .. } if name == "env"
        ));
        assert!(matches!(ast.blocks[1], Block::Generator(_)));
    }

    #[test]
    fn test_enum_body_is_skipped() {
        let ast = parse("enum Role { USER ADMIN }\nmodel A { id Int @id }").unwrap();
        assert!(matches!(&ast.blocks[0], Block::Enum(name) if name.name == "Role"));
        assert!(matches!(&ast.blocks[1], Block::Model(_)));
    }

    #[test]
    fn test_field_named_model() {
        let ast = parse("model Car { model String }").unwrap();
        let Block::Model(car) = &ast.blocks[0] else {
            panic!("Expected model block");
        };
        assert_eq!(car.fields[0].name.name, "model");
    }

    #[test]
    fn test_error_names_declaration() {
        let err = parse("model User {\n  id Int @default(\n}").unwrap_err();
        assert_eq!(err.declaration.as_deref(), Some("field User.id"));
        assert_eq!(err.line, 3);
    }

    #[test]
    fn test_error_unknown_block() {
        let err = parse("table users {}").unwrap_err();
        assert!(err.message.contains("expected `model`"));
        assert_eq!(err.declaration, None);
    }

    #[test]
    fn test_error_unterminated_model() {
        let err = parse("model User {\n  id Int").unwrap_err();
        assert!(err.message.contains("end of input"));
        assert_eq!(err.declaration.as_deref(), Some("model User"));
    }
}
