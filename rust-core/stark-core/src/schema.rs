//! # Schemas
//!
//! Field schemas used by links, request validation and document codecs.
//!
//! ## Design Principles (SOLID)
//!
//! - **S**: Schemas validate and describe values, nothing else
//! - **O**: Schema types are added with `SchemaDef` builders or the
//!   `#[derive(SchemaType)]` macro
//! - **L**: References, arrays and objects all validate through `Schema::validate`
//!
//! Validation coerces textual input (path segments and query strings arrive
//! as strings) and fills declared defaults for missing object properties.

use crate::types::TypeTag;
use crate::validation::{FieldError, ValidationErrors, ValidationResult};
use serde_json::{json, Map, Value as Json};
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::sync::Arc;

/// Additional property policy for object schemas
#[derive(Debug, Clone, PartialEq)]
pub enum Additional {
    /// Undeclared properties pass through unchecked
    Allowed,
    /// Undeclared properties are rejected
    Denied,
    /// Undeclared properties must match this schema
    Schema(Box<Schema>),
}

/// The shape of a schema
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaKind {
    /// Any value
    Any,
    /// Integer
    Integer,
    /// Floating point number
    Float,
    /// String
    String,
    /// Boolean
    Boolean,
    /// ISO 8601 date-time string
    DateTime,
    /// ISO 8601 date string
    Date,
    /// ISO 8601 time string
    Time,
    /// Decimal literal, kept as a string
    Decimal,
    /// UUID string
    Uuid,
    /// Array of items
    Array {
        /// Schema for items not covered by `prefix`
        items: Option<Box<Schema>>,
        /// Positional item schemas
        prefix: Vec<Schema>,
        /// Whether the length must equal `prefix.len()`
        fixed: bool,
    },
    /// Object with named properties
    Object {
        /// Declared properties, in order
        properties: Vec<(String, Schema)>,
        /// Required property names
        required: Vec<String>,
        /// Policy for undeclared properties
        additional: Additional,
    },
    /// Reference to a schema type
    Reference(SchemaDef),
    /// Any of several schemas
    Union(Vec<Schema>),
}

/// A field schema with its options
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    /// The shape
    pub kind: SchemaKind,
    /// Default used when the value is missing
    pub default: Option<Json>,
    /// Whether `null` is accepted
    pub allow_null: bool,
    /// Human readable description
    pub description: Option<String>,
}

impl Schema {
    /// Schema of the given kind without options
    #[must_use]
    pub fn new(kind: SchemaKind) -> Self {
        Self {
            kind,
            default: None,
            allow_null: false,
            description: None,
        }
    }

    /// Any value
    #[must_use]
    pub fn any() -> Self {
        Self::new(SchemaKind::Any)
    }

    /// Integer
    #[must_use]
    pub fn integer() -> Self {
        Self::new(SchemaKind::Integer)
    }

    /// Floating point number
    #[must_use]
    pub fn float() -> Self {
        Self::new(SchemaKind::Float)
    }

    /// String
    #[must_use]
    pub fn string() -> Self {
        Self::new(SchemaKind::String)
    }

    /// Boolean
    #[must_use]
    pub fn boolean() -> Self {
        Self::new(SchemaKind::Boolean)
    }

    /// Date-time
    #[must_use]
    pub fn datetime() -> Self {
        Self::new(SchemaKind::DateTime)
    }

    /// Date
    #[must_use]
    pub fn date() -> Self {
        Self::new(SchemaKind::Date)
    }

    /// Time
    #[must_use]
    pub fn time() -> Self {
        Self::new(SchemaKind::Time)
    }

    /// Decimal
    #[must_use]
    pub fn decimal() -> Self {
        Self::new(SchemaKind::Decimal)
    }

    /// UUID
    #[must_use]
    pub fn uuid() -> Self {
        Self::new(SchemaKind::Uuid)
    }

    /// Homogeneous array
    #[must_use]
    pub fn array(items: Self) -> Self {
        Self::new(SchemaKind::Array {
            items: Some(Box::new(items)),
            prefix: Vec::new(),
            fixed: false,
        })
    }

    /// Fixed-length array of positional schemas
    #[must_use]
    pub fn fixed_array(prefix: Vec<Self>) -> Self {
        Self::new(SchemaKind::Array {
            items: None,
            prefix,
            fixed: true,
        })
    }

    /// Object with named properties
    #[must_use]
    pub fn object(properties: Vec<(String, Self)>, required: Vec<String>) -> Self {
        Self::new(SchemaKind::Object {
            properties,
            required,
            additional: Additional::Allowed,
        })
    }

    /// Object with no declared properties
    #[must_use]
    pub fn map(additional: Additional) -> Self {
        Self::new(SchemaKind::Object {
            properties: Vec::new(),
            required: Vec::new(),
            additional,
        })
    }

    /// Reference to a schema type
    #[must_use]
    pub fn reference(def: SchemaDef) -> Self {
        Self::new(SchemaKind::Reference(def))
    }

    /// Any of several schemas
    #[must_use]
    pub fn union(any_of: Vec<Self>) -> Self {
        Self::new(SchemaKind::Union(any_of))
    }

    /// Set the default
    #[must_use]
    pub fn with_default(mut self, default: Json) -> Self {
        self.default = Some(default);
        self
    }

    /// Accept `null`
    #[must_use]
    pub fn nullable(mut self) -> Self {
        self.allow_null = true;
        self
    }

    /// Set the description
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Whether a default was declared
    #[must_use]
    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }

    /// Derive a schema from a type tag
    ///
    /// Containers map to arrays, string-keyed mappings to objects with
    /// additional properties, schema types to references and unions to
    /// `anyOf`. Returns `None` for markers and opaque types, and for unions
    /// with a member that has no schema.
    #[must_use]
    pub fn from_annotation(tag: &TypeTag) -> Option<Self> {
        if let Some(primitive) = tag.primitive_schema() {
            return Some(primitive);
        }
        match tag {
            TypeTag::Schema(def) => Some(Self::reference(def.clone())),
            TypeTag::Sequence(inner) | TypeTag::Set(inner) | TypeTag::VarTuple(inner) => Some(
                Self::array(Self::from_annotation(inner).unwrap_or_else(Self::any)),
            ),
            TypeTag::Tuple(items) => Some(Self::fixed_array(
                items
                    .iter()
                    .map(|item| Self::from_annotation(item).unwrap_or_else(Self::any))
                    .collect(),
            )),
            TypeTag::Mapping(_, value) => Some(Self::map(
                Self::from_annotation(value)
                    .map_or(Additional::Allowed, |s| Additional::Schema(Box::new(s))),
            )),
            TypeTag::Optional(inner) => Self::from_annotation(inner).map(Self::nullable),
            TypeTag::Union(members) => members
                .iter()
                .map(Self::from_annotation)
                .collect::<Option<Vec<_>>>()
                .map(Self::union),
            TypeTag::QueryParam => Some(Self::string()),
            TypeTag::Named(named) => named.schema().cloned(),
            _ => None,
        }
    }

    /// Validate a value, returning it coerced and with defaults applied
    ///
    /// # Errors
    ///
    /// Returns field-indexed `ValidationErrors`; errors on the value itself
    /// carry an empty field path.
    pub fn validate(&self, value: &Json) -> ValidationResult<Json> {
        if value.is_null() {
            return if self.allow_null || matches!(self.kind, SchemaKind::Any) {
                Ok(Json::Null)
            } else {
                Err(ValidationErrors::single(FieldError::not_null("")))
            };
        }
        let root = |error: FieldError| ValidationErrors::single(error);
        match &self.kind {
            SchemaKind::Any => Ok(value.clone()),
            SchemaKind::Integer => coerce_integer(value)
                .map(Json::from)
                .ok_or_else(|| root(FieldError::invalid_type("", "an integer"))),
            SchemaKind::Float => coerce_float(value)
                .map(Json::from)
                .ok_or_else(|| root(FieldError::invalid_type("", "a number"))),
            SchemaKind::String => value
                .as_str()
                .map(|s| Json::String(s.to_string()))
                .ok_or_else(|| root(FieldError::invalid_type("", "a string"))),
            SchemaKind::Boolean => coerce_boolean(value)
                .map(Json::Bool)
                .ok_or_else(|| root(FieldError::invalid_type("", "a boolean"))),
            SchemaKind::DateTime => parse_text(value, "datetime", |s| {
                chrono::DateTime::parse_from_rfc3339(s).is_ok()
                    || chrono::NaiveDateTime::from_str(s).is_ok()
            }),
            SchemaKind::Date => parse_text(value, "date", |s| chrono::NaiveDate::from_str(s).is_ok()),
            SchemaKind::Time => parse_text(value, "time", |s| chrono::NaiveTime::from_str(s).is_ok()),
            SchemaKind::Decimal => match value {
                Json::Number(n) => Ok(Json::String(n.to_string())),
                _ => parse_text(value, "decimal", |s| crate::types::Decimal::parse(s).is_some()),
            },
            SchemaKind::Uuid => value
                .as_str()
                .and_then(|s| uuid::Uuid::parse_str(s).ok())
                .map(|u| Json::String(u.hyphenated().to_string()))
                .ok_or_else(|| root(FieldError::invalid_format("", "UUID"))),
            SchemaKind::Array {
                items,
                prefix,
                fixed,
            } => validate_array(value, items.as_deref(), prefix, *fixed),
            SchemaKind::Object {
                properties,
                required,
                additional,
            } => validate_object(value, properties, required, additional),
            SchemaKind::Reference(def) => def.make_validator().validate(value),
            SchemaKind::Union(any_of) => any_of
                .iter()
                .find_map(|schema| schema.validate(value).ok())
                .ok_or_else(|| {
                    root(FieldError::new(
                        "",
                        "Did not match any valid type.",
                        crate::validation::ValidationCode::InvalidType,
                    ))
                }),
        }
    }

    /// Render as JSON Schema
    ///
    /// Referenced schema types are collected into `defs` and rendered as
    /// `$ref` pointers under `ref_prefix`.
    #[must_use]
    pub fn to_json_schema(&self, defs: &mut BTreeMap<String, SchemaDef>, ref_prefix: &str) -> Json {
        let mut out = match &self.kind {
            SchemaKind::Any => json!({}),
            SchemaKind::Integer => json!({"type": "integer"}),
            SchemaKind::Float => json!({"type": "number"}),
            SchemaKind::String => json!({"type": "string"}),
            SchemaKind::Boolean => json!({"type": "boolean"}),
            SchemaKind::DateTime => json!({"type": "string", "format": "date-time"}),
            SchemaKind::Date => json!({"type": "string", "format": "date"}),
            SchemaKind::Time => json!({"type": "string", "format": "time"}),
            SchemaKind::Decimal => json!({"type": "string", "format": "decimal"}),
            SchemaKind::Uuid => json!({"type": "string", "format": "uuid"}),
            SchemaKind::Array {
                items,
                prefix,
                fixed,
            } => {
                let mut array = json!({"type": "array"});
                if prefix.is_empty() {
                    if let Some(items) = items {
                        array["items"] = items.to_json_schema(defs, ref_prefix);
                    }
                } else {
                    array["items"] = Json::Array(
                        prefix
                            .iter()
                            .map(|s| s.to_json_schema(defs, ref_prefix))
                            .collect(),
                    );
                    if *fixed {
                        array["minItems"] = json!(prefix.len());
                        array["maxItems"] = json!(prefix.len());
                    }
                }
                array
            }
            SchemaKind::Object {
                properties,
                required,
                additional,
            } => object_json_schema(properties, required, additional, defs, ref_prefix),
            SchemaKind::Reference(def) => {
                defs.entry(def.name().to_string())
                    .or_insert_with(|| def.clone());
                json!({"$ref": format!("{ref_prefix}{}", def.name())})
            }
            SchemaKind::Union(any_of) => json!({
                "anyOf": any_of
                    .iter()
                    .map(|s| s.to_json_schema(defs, ref_prefix))
                    .collect::<Vec<_>>()
            }),
        };
        if let Json::Object(map) = &mut out {
            if self.allow_null {
                map.insert("nullable".to_string(), Json::Bool(true));
            }
            if let Some(default) = &self.default {
                map.insert("default".to_string(), default.clone());
            }
            if let Some(description) = &self.description {
                map.insert("description".to_string(), Json::String(description.clone()));
            }
        }
        out
    }
}

#[allow(clippy::cast_possible_truncation)]
fn coerce_integer(value: &Json) -> Option<i64> {
    match value {
        Json::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() < 9.0e15)
                .map(|f| f as i64)
        }),
        Json::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn coerce_float(value: &Json) -> Option<f64> {
    match value {
        Json::Number(n) => n.as_f64(),
        Json::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}

fn coerce_boolean(value: &Json) -> Option<bool> {
    match value {
        Json::Bool(b) => Some(*b),
        Json::Number(n) => match n.as_i64() {
            Some(1) => Some(true),
            Some(0) => Some(false),
            _ => None,
        },
        Json::String(s) => match s.to_lowercase().as_str() {
            "true" | "1" | "on" | "yes" => Some(true),
            "false" | "0" | "off" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn parse_text(value: &Json, format: &str, check: impl Fn(&str) -> bool) -> ValidationResult<Json> {
    match value.as_str() {
        Some(s) if check(s) => Ok(Json::String(s.to_string())),
        Some(_) => Err(ValidationErrors::single(FieldError::invalid_format("", format))),
        None => Err(ValidationErrors::single(FieldError::invalid_type("", "a string"))),
    }
}

fn validate_array(
    value: &Json,
    items: Option<&Schema>,
    prefix: &[Schema],
    fixed: bool,
) -> ValidationResult<Json> {
    let Some(values) = value.as_array() else {
        return Err(ValidationErrors::single(FieldError::invalid_type(
            "",
            "an array",
        )));
    };
    if fixed && values.len() != prefix.len() {
        return Err(ValidationErrors::single(FieldError::new(
            "",
            format!("Must have exactly {} items.", prefix.len()),
            crate::validation::ValidationCode::InvalidLength,
        )));
    }
    let mut errors = ValidationErrors::new();
    let mut out = Vec::with_capacity(values.len());
    for (index, item) in values.iter().enumerate() {
        let schema = prefix.get(index).or(items);
        match schema.map_or_else(|| Ok(item.clone()), |s| s.validate(item)) {
            Ok(valid) => out.push(valid),
            Err(nested) => errors.extend_nested(&index.to_string(), nested),
        }
    }
    if errors.is_empty() {
        Ok(Json::Array(out))
    } else {
        Err(errors)
    }
}

fn validate_object(
    value: &Json,
    properties: &[(String, Schema)],
    required: &[String],
    additional: &Additional,
) -> ValidationResult<Json> {
    let Some(input) = value.as_object() else {
        return Err(ValidationErrors::single(FieldError::invalid_type(
            "",
            "an object",
        )));
    };
    let mut errors = ValidationErrors::new();
    let mut out = Map::new();
    for (name, schema) in properties {
        match input.get(name) {
            Some(item) => match schema.validate(item) {
                Ok(valid) => {
                    out.insert(name.clone(), valid);
                }
                Err(nested) => errors.extend_nested(name, nested),
            },
            None => {
                if let Some(default) = &schema.default {
                    out.insert(name.clone(), default.clone());
                } else if required.contains(name) {
                    errors.add_required(name.clone());
                }
            }
        }
    }
    for (name, item) in input {
        if properties.iter().any(|(declared, _)| declared == name) {
            continue;
        }
        match additional {
            Additional::Allowed => {
                out.insert(name.clone(), item.clone());
            }
            Additional::Denied => errors.add(FieldError::not_allowed(name.clone())),
            Additional::Schema(schema) => match schema.validate(item) {
                Ok(valid) => {
                    out.insert(name.clone(), valid);
                }
                Err(nested) => errors.extend_nested(name, nested),
            },
        }
    }
    if errors.is_empty() {
        Ok(Json::Object(out))
    } else {
        Err(errors)
    }
}

fn object_json_schema(
    properties: &[(String, Schema)],
    required: &[String],
    additional: &Additional,
    defs: &mut BTreeMap<String, SchemaDef>,
    ref_prefix: &str,
) -> Json {
    let mut object = json!({"type": "object"});
    if !properties.is_empty() {
        let mut props = Map::new();
        for (name, schema) in properties {
            props.insert(name.clone(), schema.to_json_schema(defs, ref_prefix));
        }
        object["properties"] = Json::Object(props);
    }
    if !required.is_empty() {
        object["required"] = json!(required);
    }
    match additional {
        Additional::Allowed => {}
        Additional::Denied => object["additionalProperties"] = Json::Bool(false),
        Additional::Schema(schema) => {
            object["additionalProperties"] = schema.to_json_schema(defs, ref_prefix);
        }
    }
    object
}

/// A property declared on a schema type
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    /// Property name
    pub name: String,
    /// Property schema
    pub schema: Schema,
    /// Whether the property must be present
    pub required: bool,
    /// Whether the property is output-only
    pub read_only: bool,
}

#[derive(Debug)]
struct SchemaDefInner {
    name: String,
    description: Option<String>,
    properties: Vec<Property>,
    strict: bool,
}

/// A named schema type (the target of references)
///
/// Compared and hashed by name.
#[derive(Clone)]
pub struct SchemaDef {
    inner: Arc<SchemaDefInner>,
}

impl SchemaDef {
    /// Start building a schema type
    pub fn builder(name: impl Into<String>) -> SchemaDefBuilder {
        SchemaDefBuilder {
            name: name.into(),
            description: None,
            properties: Vec::new(),
            strict: false,
        }
    }

    /// Schema type name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Description
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.inner.description.as_deref()
    }

    /// Declared properties
    #[must_use]
    pub fn properties(&self) -> &[Property] {
        &self.inner.properties
    }

    /// Whether undeclared properties are rejected
    #[must_use]
    pub fn is_strict(&self) -> bool {
        self.inner.strict
    }

    /// Object schema with every declared property
    #[must_use]
    pub fn make_schema(&self) -> Schema {
        self.object_schema(true)
    }

    /// Object schema used for input validation (read-only properties excluded)
    #[must_use]
    pub fn make_validator(&self) -> Schema {
        self.object_schema(false)
    }

    fn object_schema(&self, include_read_only: bool) -> Schema {
        let included: Vec<&Property> = self
            .inner
            .properties
            .iter()
            .filter(|p| include_read_only || !p.read_only)
            .collect();
        let mut schema = Schema::new(SchemaKind::Object {
            properties: included
                .iter()
                .map(|p| (p.name.clone(), p.schema.clone()))
                .collect(),
            required: included
                .iter()
                .filter(|p| p.required)
                .map(|p| p.name.clone())
                .collect(),
            additional: if self.inner.strict {
                Additional::Denied
            } else {
                Additional::Allowed
            },
        });
        schema.description.clone_from(&self.inner.description);
        schema
    }
}

impl fmt::Debug for SchemaDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SchemaDef({})", self.inner.name)
    }
}

impl PartialEq for SchemaDef {
    fn eq(&self, other: &Self) -> bool {
        self.inner.name == other.inner.name
    }
}

impl Eq for SchemaDef {}

impl Hash for SchemaDef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.name.hash(state);
    }
}

/// Builder for [`SchemaDef`]
#[derive(Debug)]
#[must_use]
pub struct SchemaDefBuilder {
    name: String,
    description: Option<String>,
    properties: Vec<Property>,
    strict: bool,
}

impl SchemaDefBuilder {
    /// Set the description
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Declare a property from a type tag
    ///
    /// The property is required unless the tag is `Optional`.
    pub fn field(self, name: impl Into<String>, tag: &TypeTag) -> Self {
        let schema = Schema::from_annotation(tag).unwrap_or_else(Schema::any);
        let required = !matches!(tag, TypeTag::Optional(_));
        self.property(Property {
            name: name.into(),
            schema,
            required,
            read_only: false,
        })
    }

    /// Declare an output-only property from a type tag
    pub fn read_only_field(self, name: impl Into<String>, tag: &TypeTag) -> Self {
        let builder = self.field(name, tag);
        builder.mark_last_read_only()
    }

    fn mark_last_read_only(mut self) -> Self {
        if let Some(last) = self.properties.last_mut() {
            last.read_only = true;
        }
        self
    }

    /// Declare a fully specified property
    pub fn property(mut self, property: Property) -> Self {
        self.properties.push(property);
        self
    }

    /// Reject undeclared properties on input
    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    /// Finish building
    pub fn build(self) -> SchemaDef {
        SchemaDef {
            inner: Arc::new(SchemaDefInner {
                name: self.name,
                description: self.description,
                properties: self.properties,
                strict: self.strict,
            }),
        }
    }
}

/// Types with a schema definition
///
/// Implemented by `#[derive(SchemaType)]`, which also implements
/// [`Annotated`](crate::Annotated) with `TypeTag::Schema`.
pub trait SchemaType {
    /// The schema definition for this type
    fn schema_def() -> SchemaDef;
}
