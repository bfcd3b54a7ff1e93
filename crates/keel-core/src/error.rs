//! Error types for loading, diffing and generating migrations.

use core::fmt;

use crate::lexer::Span;

/// A schema file could not be loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    /// The error message.
    pub message: String,
    /// The offending declaration (`model User`, `field User.email`, ...).
    pub declaration: Option<String>,
    /// The location of the error in the source.
    pub span: Span,
    /// 1-based line of `span.start`.
    pub line: usize,
    /// 1-based column of `span.start`.
    pub column: usize,
}

impl ParseError {
    /// Creates a parse error, resolving the line and column of `span`
    /// in `source`.
    #[must_use]
    pub fn new(message: impl Into<String>, span: Span, source: &str) -> Self {
        let (line, column) = span.line_col(source);
        Self {
            message: message.into(),
            declaration: None,
            span,
            line,
            column,
        }
    }

    /// Attaches the offending declaration, unless one is already set.
    #[must_use]
    pub fn in_declaration(mut self, declaration: impl Into<String>) -> Self {
        if self.declaration.is_none() {
            self.declaration = Some(declaration.into());
        }
        self
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.declaration {
            Some(decl) => write!(
                f,
                "{} in `{}` at line {}, column {}",
                self.message, decl, self.line, self.column
            ),
            None => write!(
                f,
                "{} at line {}, column {}",
                self.message, self.line, self.column
            ),
        }
    }
}

impl std::error::Error for ParseError {}

/// A change the differ cannot tell apart from a rename.
#[derive(Debug, Clone, PartialEq)]
pub enum AmbiguousChange {
    /// A dropped and an added column with the same definition and
    /// similar names.
    PossibleRename {
        /// Table containing the columns.
        table: String,
        /// The column that was dropped.
        old_column: String,
        /// The column that was added.
        new_column: String,
        /// Name similarity score (0.0–1.0).
        similarity: f64,
    },
    /// A dropped and an added table with the same column structure.
    PossibleTableRename {
        /// The table that was dropped.
        old_table: String,
        /// The table that was added.
        new_table: String,
        /// Name similarity score (0.0–1.0).
        similarity: f64,
    },
}

impl fmt::Display for AmbiguousChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PossibleRename {
                table,
                old_column,
                new_column,
                ..
            } => write!(
                f,
                "column `{table}.{old_column}` was dropped and `{table}.{new_column}` was added \
                 with the same definition; this may be a rename"
            ),
            Self::PossibleTableRename {
                old_table,
                new_table,
                ..
            } => write!(
                f,
                "table `{old_table}` was dropped and `{new_table}` was added with the same \
                 columns; this may be a rename"
            ),
        }
    }
}

/// Errors produced by keel.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The schema description is invalid.
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// A rename cannot be distinguished from a drop and an add.
    #[error("Diff conflict: {0}")]
    DiffConflict(AmbiguousChange),

    /// The target dialect cannot express a change.
    #[error("Unsupported feature: {feature} is not supported by the {dialect} dialect")]
    UnsupportedFeature {
        /// Dialect identifier.
        dialect: String,
        /// Description of the offending change or type.
        feature: String,
    },

    /// A change does not apply to the schema it was replayed on.
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl Error {
    /// Creates an `UnsupportedFeature` error.
    #[must_use]
    pub fn unsupported(dialect: impl Into<String>, feature: impl Into<String>) -> Self {
        Self::UnsupportedFeature {
            dialect: dialect.into(),
            feature: feature.into(),
        }
    }
}

/// Result type for keel operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_names_declaration() {
        let source = "model User {\n  id Foo\n}";
        let err = ParseError::new("unknown type `Foo`", Span::new(18, 21), source)
            .in_declaration("field User.id")
            .in_declaration("model User");
        assert_eq!(err.line, 2);
        assert_eq!(err.column, 6);
        assert_eq!(
            err.to_string(),
            "unknown type `Foo` in `field User.id` at line 2, column 6"
        );
    }

    #[test]
    fn unsupported_feature_message() {
        let err = Error::unsupported("sqlite", "ALTER COLUMN on `users.email`");
        assert_eq!(
            err.to_string(),
            "Unsupported feature: ALTER COLUMN on `users.email` is not supported by the sqlite dialect"
        );
    }
}
