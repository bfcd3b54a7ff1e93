//! Column data types, default values and referential actions.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Dialect-neutral column data types.
///
/// Dialects map these to concrete SQL type names; a dialect that has no
/// representation for a type reports it as unsupported.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    // Integer types
    /// Small integer (2 bytes).
    SmallInt,
    /// Integer (4 bytes).
    Integer,
    /// Big integer (8 bytes).
    BigInt,

    // Floating point
    /// Real (4-byte float).
    Real,
    /// Double precision (8-byte float).
    Double,
    /// Exact decimal with precision and scale.
    Decimal {
        /// Total number of digits.
        precision: u16,
        /// Number of digits after the decimal point.
        scale: u16,
    },

    // String types
    /// The default string type of a dialect.
    String,
    /// Unbounded text.
    Text,
    /// Fixed-length character string.
    Char(u32),
    /// Variable-length character string with a maximum length.
    VarChar(u32),

    // Boolean
    /// Boolean.
    Boolean,

    // Date/time types
    /// Date.
    Date,
    /// Time of day.
    Time,
    /// Timestamp without time zone, with fractional second precision.
    Timestamp(Option<u8>),
    /// Timestamp with time zone, with fractional second precision.
    TimestampTz(Option<u8>),

    // Structured and binary types
    /// JSON document.
    Json,
    /// Binary data.
    Bytes,
    /// UUID.
    Uuid,
}

impl DataType {
    /// Returns `true` for integer types.
    #[must_use]
    pub const fn is_integer(&self) -> bool {
        matches!(self, Self::SmallInt | Self::Integer | Self::BigInt)
    }

    /// Returns `true` for floating point and decimal types.
    #[must_use]
    pub const fn is_fractional(&self) -> bool {
        matches!(self, Self::Real | Self::Double | Self::Decimal { .. })
    }

    /// Returns `true` for character types.
    #[must_use]
    pub const fn is_textual(&self) -> bool {
        matches!(
            self,
            Self::String | Self::Text | Self::Char(_) | Self::VarChar(_) | Self::Uuid
        )
    }

    /// Returns `true` for date and time types.
    #[must_use]
    pub const fn is_temporal(&self) -> bool {
        matches!(
            self,
            Self::Date | Self::Time | Self::Timestamp(_) | Self::TimestampTz(_)
        )
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SmallInt => f.write_str("SmallInt"),
            Self::Integer => f.write_str("Integer"),
            Self::BigInt => f.write_str("BigInt"),
            Self::Real => f.write_str("Real"),
            Self::Double => f.write_str("Double"),
            Self::Decimal { precision, scale } => write!(f, "Decimal({precision}, {scale})"),
            Self::String => f.write_str("String"),
            Self::Text => f.write_str("Text"),
            Self::Char(n) => write!(f, "Char({n})"),
            Self::VarChar(n) => write!(f, "VarChar({n})"),
            Self::Boolean => f.write_str("Boolean"),
            Self::Date => f.write_str("Date"),
            Self::Time => f.write_str("Time"),
            Self::Timestamp(Some(p)) => write!(f, "Timestamp({p})"),
            Self::Timestamp(None) => f.write_str("Timestamp"),
            Self::TimestampTz(Some(p)) => write!(f, "TimestampTz({p})"),
            Self::TimestampTz(None) => f.write_str("TimestampTz"),
            Self::Json => f.write_str("Json"),
            Self::Bytes => f.write_str("Bytes"),
            Self::Uuid => f.write_str("Uuid"),
        }
    }
}

/// Default value for a column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DefaultValue {
    /// Boolean default.
    Boolean(bool),
    /// Integer default.
    Integer(i64),
    /// Float default.
    Float(f64),
    /// String default.
    String(String),
    /// Raw SQL expression (e.g., `CURRENT_TIMESTAMP`).
    Expression(String),
    /// Database-generated sequence value.
    Autoincrement,
}

impl DefaultValue {
    /// Returns the SQL literal for the default value.
    ///
    /// `Autoincrement` has no literal form; dialects express it through
    /// the column type or a column keyword instead.
    #[must_use]
    pub fn to_sql(&self) -> Option<String> {
        match self {
            Self::Boolean(b) => Some(if *b { "true" } else { "false" }.to_string()),
            Self::Integer(i) => Some(i.to_string()),
            Self::Float(f) => Some(f.to_string()),
            Self::String(s) => Some(format!("'{}'", s.replace('\'', "''"))),
            Self::Expression(expr) => Some(expr.clone()),
            Self::Autoincrement => None,
        }
    }
}

/// Foreign key referential action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReferentialAction {
    /// Cascade the operation.
    Cascade,
    /// Restrict deletion/update.
    Restrict,
    /// No action.
    NoAction,
    /// Set to NULL.
    SetNull,
    /// Set to the column default.
    SetDefault,
}

impl ReferentialAction {
    /// Returns the SQL representation of the action.
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Cascade => "CASCADE",
            Self::Restrict => "RESTRICT",
            Self::NoAction => "NO ACTION",
            Self::SetNull => "SET NULL",
            Self::SetDefault => "SET DEFAULT",
        }
    }

    /// Parses the action name used in schema files (`Cascade`, `SetNull`, ...).
    #[must_use]
    pub fn from_schema_name(name: &str) -> Option<Self> {
        match name {
            "Cascade" => Some(Self::Cascade),
            "Restrict" => Some(Self::Restrict),
            "NoAction" => Some(Self::NoAction),
            "SetNull" => Some(Self::SetNull),
            "SetDefault" => Some(Self::SetDefault),
            _ => None,
        }
    }
}
