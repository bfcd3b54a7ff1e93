//! Lowering of the syntax tree into a [`SchemaSnapshot`].
//!
//! Resolves model and field names, maps scalar and native types onto
//! [`DataType`], turns attributes into constraints and validates
//! everything the parser cannot check on its own.

use std::collections::{HashMap, HashSet};

use super::ast::{
    Arity, Attribute, Block, ConfigBlock, FieldDecl, ModelDecl, SchemaAst, Value, ValueKind,
};
use crate::dialect::DialectKind;
use crate::error::ParseError;
use crate::lexer::Span;
use crate::schema::{
    Column, Constraint, DataType, DefaultValue, ReferentialAction, SchemaSnapshot, Table,
};

/// Built-in scalar field types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scalar {
    Int,
    BigInt,
    Float,
    Decimal,
    String,
    Boolean,
    DateTime,
    Json,
    Bytes,
}

impl Scalar {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "Int" => Some(Self::Int),
            "BigInt" => Some(Self::BigInt),
            "Float" => Some(Self::Float),
            "Decimal" => Some(Self::Decimal),
            "String" => Some(Self::String),
            "Boolean" => Some(Self::Boolean),
            "DateTime" => Some(Self::DateTime),
            "Json" => Some(Self::Json),
            "Bytes" => Some(Self::Bytes),
            _ => None,
        }
    }

    const fn base_type(self) -> DataType {
        match self {
            Self::Int => DataType::Integer,
            Self::BigInt => DataType::BigInt,
            Self::Float => DataType::Double,
            Self::Decimal => DataType::Decimal {
                precision: 65,
                scale: 30,
            },
            Self::String => DataType::String,
            Self::Boolean => DataType::Boolean,
            Self::DateTime => DataType::Timestamp(Some(3)),
            Self::Json => DataType::Json,
            Self::Bytes => DataType::Bytes,
        }
    }
}

const NATIVE_TYPES: &[&str] = &[
    "VarChar",
    "Char",
    "Text",
    "Uuid",
    "SmallInt",
    "Integer",
    "BigInt",
    "Real",
    "DoublePrecision",
    "Decimal",
    "Boolean",
    "Date",
    "Time",
    "Timestamp",
    "Timestamptz",
    "Json",
    "JsonB",
    "ByteA",
];

type Constraints = Vec<(Constraint, Span)>;

/// Lowers a parsed schema into a snapshot named `name`.
pub(super) fn lower(
    name: &str,
    ast: &SchemaAst,
    source: &str,
) -> Result<SchemaSnapshot, ParseError> {
    let mut snapshot = SchemaSnapshot::new(name);
    let mut has_datasource = false;
    let mut models = Vec::new();
    let mut by_name = HashMap::new();

    for block in &ast.blocks {
        match block {
            Block::Datasource(datasource) => {
                let declaration = format!("datasource {}", datasource.name.name);
                if has_datasource {
                    return Err(ParseError::new(
                        "only one datasource block is allowed",
                        datasource.name.span,
                        source,
                    )
                    .in_declaration(declaration));
                }
                has_datasource = true;
                let provider =
                    provider(datasource, source).map_err(|e| e.in_declaration(declaration))?;
                snapshot.provider = Some(provider);
            }
            Block::Generator(_) => {}
            Block::Enum(enum_name) => {
                return Err(ParseError::new(
                    "enums are not supported, use a String field instead",
                    enum_name.span,
                    source,
                )
                .in_declaration(format!("enum {}", enum_name.name)));
            }
            Block::Model(model) => {
                if by_name.insert(model.name.name.as_str(), model).is_some() {
                    return Err(ParseError::new(
                        format!("duplicate model `{}`", model.name.name),
                        model.name.span,
                        source,
                    )
                    .in_declaration(format!("model {}", model.name.name)));
                }
                models.push(model);
            }
        }
    }

    let lowerer = Lowerer {
        source,
        models: by_name,
    };
    for model in models {
        let declaration = format!("model {}", model.name.name);
        let table = lowerer
            .lower_model(model)
            .map_err(|e| e.in_declaration(declaration.clone()))?;
        if snapshot.table(&table.name).is_some() {
            return Err(lowerer
                .error(
                    format!("duplicate table name `{}`", table.name),
                    model.name.span,
                )
                .in_declaration(declaration));
        }
        snapshot.tables.push(table);
    }

    Ok(snapshot)
}

fn provider(datasource: &ConfigBlock, source: &str) -> Result<DialectKind, ParseError> {
    let Some(property) = datasource.property("provider") else {
        return Err(ParseError::new(
            "datasource is missing a `provider`",
            datasource.name.span,
            source,
        ));
    };
    let value = &property.value;
    let Some(name) = value.as_str() else {
        return Err(ParseError::new(
            "`provider` must be a string",
            value.span,
            source,
        ));
    };
    DialectKind::from_name(name).ok_or_else(|| {
        ParseError::new(format!("unknown provider `{name}`"), value.span, source)
    })
}

struct Lowerer<'a> {
    source: &'a str,
    models: HashMap<&'a str, &'a ModelDecl>,
}

impl Lowerer<'_> {
    fn error(&self, message: impl Into<String>, span: Span) -> ParseError {
        ParseError::new(message, span, self.source)
    }

    fn lower_model(&self, model: &ModelDecl) -> Result<Table, ParseError> {
        let table_name = self.table_name(model)?;
        let mut table = Table::new(table_name.as_str());
        let mut constraints = Constraints::new();
        let mut field_names = HashSet::new();

        for field in &model.fields {
            let declaration = format!("field {}.{}", model.name.name, field.name.name);
            if !field_names.insert(field.name.name.as_str()) {
                return Err(self
                    .error(
                        format!("duplicate field `{}`", field.name.name),
                        field.name.span,
                    )
                    .in_declaration(declaration));
            }

            let type_name = field.type_name.name.as_str();
            if let Some(scalar) = Scalar::from_name(type_name) {
                let (column, field_constraints) = self
                    .lower_scalar_field(&table_name, field, scalar)
                    .map_err(|e| e.in_declaration(declaration.clone()))?;
                if table.column(&column.name).is_some() {
                    return Err(self
                        .error(
                            format!("duplicate column name `{}`", column.name),
                            field.name.span,
                        )
                        .in_declaration(declaration));
                }
                table.columns.push(column);
                constraints.extend(field_constraints);
            } else if let Some(target) = self.models.get(type_name) {
                let field_constraints = self
                    .lower_relation_field(model, &table_name, field, target)
                    .map_err(|e| e.in_declaration(declaration))?;
                constraints.extend(field_constraints);
            } else {
                return Err(self
                    .error(format!("unknown type `{type_name}`"), field.type_name.span)
                    .in_declaration(declaration));
            }
        }

        constraints.extend(self.lower_block_attributes(model, &table_name)?);

        for (constraint, span) in constraints {
            if constraint.is_primary_key() && table.primary_key().is_some() {
                return Err(self.error("model has more than one primary key", span));
            }
            if table.constraints.contains_key(constraint.name()) {
                return Err(self.error(
                    format!("duplicate constraint name `{}`", constraint.name()),
                    span,
                ));
            }
            table
                .constraints
                .insert(constraint.name().to_string(), constraint);
        }

        Ok(table)
    }

    fn lower_scalar_field(
        &self,
        table: &str,
        field: &FieldDecl,
        scalar: Scalar,
    ) -> Result<(Column, Constraints), ParseError> {
        if field.arity == Arity::List {
            return Err(self.error(
                "scalar list fields are not supported",
                field.type_name.span,
            ));
        }

        let mut data_type = scalar.base_type();
        let mut seen = HashSet::new();
        let mut native = None;
        for attr in &field.attributes {
            if !seen.insert(attr.name.as_str()) {
                return Err(self.error(format!("duplicate attribute `@{}`", attr.name), attr.span));
            }
            match attr.name.as_str() {
                "id" | "unique" | "default" | "map" | "updatedAt" => {}
                "relation" => {
                    return Err(self.error(
                        "`@relation` is only allowed on relation fields",
                        attr.span,
                    ));
                }
                name if name.starts_with("db.") => {
                    if native.is_some() {
                        return Err(self.error("field has more than one native type", attr.span));
                    }
                    native = Some(attr);
                    data_type = self.native_type(scalar, field, attr)?;
                }
                name => {
                    return Err(self.error(format!("unknown attribute `@{name}`"), attr.span));
                }
            }
        }

        let column_name = self.column_name(field)?;
        let mut column = Column {
            name: column_name.clone(),
            data_type,
            nullable: field.arity == Arity::Optional,
            default: None,
        };
        if let Some(attr) = field.attribute("default") {
            column.default = self.lower_default(attr, &column.data_type)?;
        }
        if let Some(attr) = field.attribute("updatedAt") {
            if scalar != Scalar::DateTime {
                return Err(self.error("`@updatedAt` requires a DateTime field", attr.span));
            }
        }

        let mut constraints = Constraints::new();
        if let Some(attr) = field.attribute("id") {
            if column.nullable {
                return Err(self.error("`@id` field cannot be optional", attr.span));
            }
            let name = self.constraint_name(attr, || format!("{table}_pkey"))?;
            constraints.push((
                Constraint::PrimaryKey {
                    name,
                    columns: vec![column_name.clone()],
                },
                attr.span,
            ));
        }
        if let Some(attr) = field.attribute("unique") {
            let name = self.constraint_name(attr, || format!("{table}_{column_name}_key"))?;
            constraints.push((
                Constraint::Unique {
                    name,
                    columns: vec![column_name.clone()],
                },
                attr.span,
            ));
        }

        Ok((column, constraints))
    }

    fn lower_relation_field(
        &self,
        model: &ModelDecl,
        table: &str,
        field: &FieldDecl,
        target: &ModelDecl,
    ) -> Result<Constraints, ParseError> {
        for attr in &field.attributes {
            if attr.name != "relation" {
                return Err(self.error(
                    format!("attribute `@{}` is not allowed on a relation field", attr.name),
                    attr.span,
                ));
            }
        }

        let owning = field
            .attribute("relation")
            .and_then(|r| r.named("fields").map(|fields| (r, fields)));
        let Some((relation, fields)) = owning else {
            if field.arity == Arity::List {
                let implicit_many_to_many = target.fields.iter().any(|f| {
                    f.type_name.name == model.name.name
                        && f.arity == Arity::List
                        && !std::ptr::eq(f, field)
                });
                if implicit_many_to_many {
                    return Err(self.error(
                        "implicit many-to-many relations are not supported, \
                         declare a join model instead",
                        field.type_name.span,
                    ));
                }
            }
            if !Self::has_owning_side(model, field, target) {
                return Err(self.error(
                    "relation field must declare `fields` and `references`",
                    field.name.span,
                ));
            }
            return Ok(Constraints::new());
        };

        if field.arity == Arity::List {
            return Err(self.error(
                "`fields` cannot be declared on a list relation field",
                relation.span,
            ));
        }
        let Some(references) = relation.named("references") else {
            return Err(self.error("`@relation` is missing `references`", relation.span));
        };

        let columns = self.field_columns(model, fields)?;
        let referenced_columns = self.field_columns(target, references)?;
        if columns.len() != referenced_columns.len() {
            return Err(self.error(
                "`fields` and `references` must list the same number of fields",
                references.span,
            ));
        }

        let default_on_delete = if field.arity == Arity::Optional {
            ReferentialAction::SetNull
        } else {
            ReferentialAction::Restrict
        };
        let on_delete = self
            .referential_action(relation, "onDelete")?
            .unwrap_or(default_on_delete);
        let on_update = self
            .referential_action(relation, "onUpdate")?
            .unwrap_or(ReferentialAction::Cascade);
        let name = self.constraint_name(relation, || {
            format!("{table}_{}_fkey", columns.join("_"))
        })?;

        Ok(vec![(
            Constraint::ForeignKey {
                name,
                columns,
                referenced_table: self.table_name(target)?,
                referenced_columns,
                on_delete,
                on_update,
            },
            relation.span,
        )])
    }

    /// Returns `true` if `target` holds the `fields`/`references` side of
    /// the relation `field` belongs to.
    fn has_owning_side(model: &ModelDecl, field: &FieldDecl, target: &ModelDecl) -> bool {
        target.fields.iter().any(|f| {
            f.type_name.name == model.name.name
                && !std::ptr::eq(f, field)
                && f.attribute("relation")
                    .is_some_and(|r| r.named("fields").is_some())
        })
    }

    fn lower_block_attributes(
        &self,
        model: &ModelDecl,
        table: &str,
    ) -> Result<Constraints, ParseError> {
        let mut constraints = Constraints::new();
        let mut mapped = false;

        for attr in &model.attributes {
            match attr.name.as_str() {
                "map" => {
                    if mapped {
                        return Err(self.error("duplicate attribute `@@map`", attr.span));
                    }
                    mapped = true;
                }
                kind @ ("id" | "unique" | "index") => {
                    let Some(fields) = attr.positional().or_else(|| attr.named("fields")) else {
                        return Err(self.error(
                            format!("`@@{kind}` requires a list of fields"),
                            attr.span,
                        ));
                    };
                    let columns = self.field_columns(model, fields)?;
                    let joined = columns.join("_");
                    let constraint = match kind {
                        "id" => {
                            if let Some(optional) = Self::optional_field(model, fields) {
                                return Err(self.error(
                                    format!("primary key field `{optional}` cannot be optional"),
                                    attr.span,
                                ));
                            }
                            Constraint::PrimaryKey {
                                name: self.constraint_name(attr, || format!("{table}_pkey"))?,
                                columns,
                            }
                        }
                        "unique" => Constraint::Unique {
                            name: self.constraint_name(attr, || format!("{table}_{joined}_key"))?,
                            columns,
                        },
                        _ => Constraint::Index {
                            name: self.constraint_name(attr, || format!("{table}_{joined}_idx"))?,
                            columns,
                        },
                    };
                    constraints.push((constraint, attr.span));
                }
                name => {
                    return Err(self.error(format!("unknown attribute `@@{name}`"), attr.span));
                }
            }
        }

        Ok(constraints)
    }

    fn optional_field<'m>(model: &'m ModelDecl, fields: &Value) -> Option<&'m str> {
        let ValueKind::Array(items) = &fields.kind else {
            return None;
        };
        items
            .iter()
            .filter_map(Value::as_constant)
            .filter_map(|name| model.field(name))
            .find(|f| f.arity == Arity::Optional)
            .map(|f| f.name.name.as_str())
    }

    /// Resolves a `[field, ...]` list to column names of `model`.
    fn field_columns(&self, model: &ModelDecl, value: &Value) -> Result<Vec<String>, ParseError> {
        let ValueKind::Array(items) = &value.kind else {
            return Err(self.error("expected a list of field names", value.span));
        };
        if items.is_empty() {
            return Err(self.error("field list cannot be empty", value.span));
        }

        let mut columns = Vec::with_capacity(items.len());
        for item in items {
            let Some(name) = item.as_constant() else {
                return Err(self.error("expected a field name", item.span));
            };
            let Some(field) = model.field(name) else {
                return Err(self.error(
                    format!("unknown field `{name}` in model `{}`", model.name.name),
                    item.span,
                ));
            };
            if Scalar::from_name(&field.type_name.name).is_none() {
                return Err(self.error(
                    format!("`{}.{name}` is not a scalar field", model.name.name),
                    item.span,
                ));
            }
            let column = self.column_name(field)?;
            if columns.contains(&column) {
                return Err(self.error(format!("field `{name}` is listed twice"), item.span));
            }
            columns.push(column);
        }
        Ok(columns)
    }

    fn table_name(&self, model: &ModelDecl) -> Result<String, ParseError> {
        self.mapped_name(model.attribute("map"), &model.name.name)
    }

    fn column_name(&self, field: &FieldDecl) -> Result<String, ParseError> {
        self.mapped_name(field.attribute("map"), &field.name.name)
    }

    fn mapped_name(&self, map: Option<&Attribute>, name: &str) -> Result<String, ParseError> {
        match map {
            None => Ok(name.to_string()),
            Some(attr) => match attr.positional().and_then(Value::as_str) {
                Some(mapped) if !mapped.is_empty() => Ok(mapped.to_string()),
                _ => Err(self.error("`@map` requires a non-empty name", attr.span)),
            },
        }
    }

    /// Returns the `map:` argument of `attr`, or the generated name.
    fn constraint_name(
        &self,
        attr: &Attribute,
        generated: impl FnOnce() -> String,
    ) -> Result<String, ParseError> {
        match attr.named("map") {
            None => Ok(generated()),
            Some(value) => match value.as_str() {
                Some(name) if !name.is_empty() => Ok(name.to_string()),
                _ => Err(self.error("`map` must be a non-empty string", value.span)),
            },
        }
    }

    fn referential_action(
        &self,
        relation: &Attribute,
        key: &str,
    ) -> Result<Option<ReferentialAction>, ParseError> {
        let Some(value) = relation.named(key) else {
            return Ok(None);
        };
        value
            .as_constant()
            .and_then(ReferentialAction::from_schema_name)
            .map(Some)
            .ok_or_else(|| self.error(format!("invalid referential action for `{key}`"), value.span))
    }

    fn lower_default(
        &self,
        attr: &Attribute,
        data_type: &DataType,
    ) -> Result<Option<DefaultValue>, ParseError> {
        let Some(value) = attr.positional() else {
            return Err(self.error("`@default` requires a value", attr.span));
        };
        let mismatch =
            || self.error(format!("default value is not valid for a {data_type} column"), value.span);

        match &value.kind {
            ValueKind::Call { name, args } => match name.as_str() {
                "autoincrement" if data_type.is_integer() => Ok(Some(DefaultValue::Autoincrement)),
                "now" if data_type.is_temporal() => Ok(Some(DefaultValue::Expression(
                    "CURRENT_TIMESTAMP".to_string(),
                ))),
                // Generated by the client, the column itself has no default.
                "uuid" | "cuid" if data_type.is_textual() => Ok(None),
                "dbgenerated" => match args.first().and_then(|a| a.value.as_str()) {
                    Some(expr) if !expr.is_empty() => {
                        Ok(Some(DefaultValue::Expression(expr.to_string())))
                    }
                    _ => Err(self.error(
                        "`dbgenerated()` requires an SQL expression string",
                        value.span,
                    )),
                },
                "autoincrement" | "now" | "uuid" | "cuid" => Err(self.error(
                    format!("`{name}()` is not valid for a {data_type} column"),
                    value.span,
                )),
                _ => Err(self.error(format!("unknown default function `{name}()`"), value.span)),
            },
            ValueKind::String(s)
                if data_type.is_textual()
                    || data_type.is_temporal()
                    || *data_type == DataType::Json =>
            {
                Ok(Some(DefaultValue::String(s.clone())))
            }
            ValueKind::Number(n) if data_type.is_integer() => n
                .parse()
                .map(|i| Some(DefaultValue::Integer(i)))
                .map_err(|_| mismatch()),
            ValueKind::Number(n) if data_type.is_fractional() => n
                .parse()
                .map(|f| Some(DefaultValue::Float(f)))
                .map_err(|_| mismatch()),
            ValueKind::Constant(c)
                if *data_type == DataType::Boolean && (c == "true" || c == "false") =>
            {
                Ok(Some(DefaultValue::Boolean(c == "true")))
            }
            _ => Err(mismatch()),
        }
    }

    fn native_type(
        &self,
        scalar: Scalar,
        field: &FieldDecl,
        attr: &Attribute,
    ) -> Result<DataType, ParseError> {
        let native = attr.name.trim_start_matches("db.");
        let data_type = match (scalar, native) {
            (Scalar::String, "VarChar") => DataType::VarChar(self.length_arg(attr)?),
            (Scalar::String, "Char") => DataType::Char(self.length_arg(attr)?),
            (Scalar::String, "Text") => self.no_args(attr, DataType::Text)?,
            (Scalar::String, "Uuid") => self.no_args(attr, DataType::Uuid)?,
            (Scalar::Int, "SmallInt") => self.no_args(attr, DataType::SmallInt)?,
            (Scalar::Int, "Integer") => self.no_args(attr, DataType::Integer)?,
            (Scalar::BigInt, "BigInt") => self.no_args(attr, DataType::BigInt)?,
            (Scalar::Float, "Real") => self.no_args(attr, DataType::Real)?,
            (Scalar::Float, "DoublePrecision") => self.no_args(attr, DataType::Double)?,
            (Scalar::Decimal, "Decimal") => {
                let precision: u16 = self.number_arg(attr, 0)?.unwrap_or(65);
                let scale: u16 = self.number_arg(attr, 1)?.unwrap_or(30);
                if precision == 0 || scale > precision {
                    return Err(self.error("invalid decimal precision or scale", attr.span));
                }
                DataType::Decimal { precision, scale }
            }
            (Scalar::Boolean, "Boolean") => self.no_args(attr, DataType::Boolean)?,
            (Scalar::DateTime, "Date") => self.no_args(attr, DataType::Date)?,
            (Scalar::DateTime, "Time") => self.no_args(attr, DataType::Time)?,
            (Scalar::DateTime, "Timestamp") => DataType::Timestamp(self.precision_arg(attr)?),
            (Scalar::DateTime, "Timestamptz") => DataType::TimestampTz(self.precision_arg(attr)?),
            (Scalar::Json, "Json" | "JsonB") => self.no_args(attr, DataType::Json)?,
            (Scalar::Bytes, "ByteA") => self.no_args(attr, DataType::Bytes)?,
            (_, name) if NATIVE_TYPES.contains(&name) => {
                return Err(self.error(
                    format!(
                        "native type `@db.{name}` is not compatible with `{}`",
                        field.type_name.name
                    ),
                    attr.span,
                ));
            }
            (_, name) => {
                return Err(self.error(format!("unknown native type `@db.{name}`"), attr.span));
            }
        };
        Ok(data_type)
    }

    fn no_args(&self, attr: &Attribute, data_type: DataType) -> Result<DataType, ParseError> {
        if attr.args.is_empty() {
            Ok(data_type)
        } else {
            Err(self.error(format!("`@{}` takes no arguments", attr.name), attr.span))
        }
    }

    fn length_arg(&self, attr: &Attribute) -> Result<u32, ParseError> {
        match self.number_arg(attr, 0)? {
            Some(length) if length > 0 => Ok(length),
            _ => Err(self.error(
                format!("`@{}` requires a positive length", attr.name),
                attr.span,
            )),
        }
    }

    fn precision_arg(&self, attr: &Attribute) -> Result<Option<u8>, ParseError> {
        let precision: Option<u8> = self.number_arg(attr, 0)?;
        if precision.is_some_and(|p| p > 6) {
            return Err(self.error("timestamp precision must be between 0 and 6", attr.span));
        }
        Ok(precision)
    }

    /// Parses the `index`-th argument as an unsigned number.
    fn number_arg<T: std::str::FromStr>(
        &self,
        attr: &Attribute,
        index: usize,
    ) -> Result<Option<T>, ParseError> {
        let Some(arg) = attr.args.get(index) else {
            return Ok(None);
        };
        match &arg.value.kind {
            ValueKind::Number(n) if arg.name.is_none() => n
                .parse()
                .map(Some)
                .map_err(|_| self.error(format!("`{n}` is out of range"), arg.value.span)),
            _ => Err(self.error("expected a number", arg.value.span)),
        }
    }
}
