//! Syntax tree produced by the schema parser.
//!
//! The tree mirrors the source closely; names are not resolved and no
//! validation beyond syntax has happened yet.

use crate::lexer::Span;

/// A parsed schema file.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaAst {
    /// Top-level blocks in source order.
    pub blocks: Vec<Block>,
}

/// A top-level block.
#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    /// `datasource name { ... }`
    Datasource(ConfigBlock),
    /// `generator name { ... }`
    Generator(ConfigBlock),
    /// `model Name { ... }`
    Model(ModelDecl),
    /// `enum Name { ... }`, body skipped.
    Enum(Ident),
}

/// A name with its location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ident {
    pub name: String,
    pub span: Span,
}

/// A key/value block (`datasource` or `generator`).
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigBlock {
    pub name: Ident,
    pub properties: Vec<Property>,
}

impl ConfigBlock {
    /// Looks up a property by key.
    pub fn property(&self, key: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.key.name == key)
    }
}

/// `key = value` inside a config block.
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub key: Ident,
    pub value: Value,
}

/// A model declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelDecl {
    pub name: Ident,
    pub fields: Vec<FieldDecl>,
    /// Block attributes (`@@...`).
    pub attributes: Vec<Attribute>,
}

impl ModelDecl {
    /// Looks up a field by name.
    pub fn field(&self, name: &str) -> Option<&FieldDecl> {
        self.fields.iter().find(|f| f.name.name == name)
    }

    /// Returns the first block attribute with the given name.
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }
}

/// Field arity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Required,
    Optional,
    List,
}

/// A field declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDecl {
    pub name: Ident,
    pub type_name: Ident,
    pub arity: Arity,
    /// Field attributes (`@...`).
    pub attributes: Vec<Attribute>,
}

impl FieldDecl {
    /// Returns the first attribute with the given name.
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }
}

/// An attribute such as `@default(now())` or `@@index([a, b])`.
///
/// Dotted names (`@db.VarChar`) are joined with `.`.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub name: String,
    pub span: Span,
    pub args: Vec<Argument>,
}

impl Attribute {
    /// Returns the first unnamed argument.
    pub fn positional(&self) -> Option<&Value> {
        self.args
            .iter()
            .find(|a| a.name.is_none())
            .map(|a| &a.value)
    }

    /// Returns the named argument `name`.
    pub fn named(&self, name: &str) -> Option<&Value> {
        self.args
            .iter()
            .find(|a| a.name.as_ref().is_some_and(|n| n.name == name))
            .map(|a| &a.value)
    }
}

/// An attribute or function argument, optionally named.
#[derive(Debug, Clone, PartialEq)]
pub struct Argument {
    pub name: Option<Ident>,
    pub value: Value,
}

/// A value expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Value {
    pub kind: ValueKind,
    pub span: Span,
}

/// Value expression kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueKind {
    String(String),
    Number(String),
    /// A bare identifier (`Cascade`, `true`, a field name).
    Constant(String),
    /// A function call such as `now()` or `env("URL")`.
    Call { name: String, args: Vec<Argument> },
    Array(Vec<Value>),
}

impl Value {
    /// Returns the string literal, if this is one.
    pub fn as_str(&self) -> Option<&str> {
        match &self.kind {
            ValueKind::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the identifier, if this is a bare constant.
    pub fn as_constant(&self) -> Option<&str> {
        match &self.kind {
            ValueKind::Constant(s) => Some(s),
            _ => None,
        }
    }
}
