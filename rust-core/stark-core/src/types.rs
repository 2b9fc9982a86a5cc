//! # Type Tags
//!
//! Closed set of parameter-type tags used for dependency resolution and
//! contract generation.
//!
//! ## Design Principles
//!
//! - **S**: Tags only describe types, schemas are derived in `schema`
//! - **O**: New user types plug in through the `Annotated` trait
//! - **L**: Every annotated type is resolved through the same tag equality
//!
//! Components match parameters by comparing tags, and route generation maps
//! tags onto field schemas. User types either implement [`Annotated`] by hand,
//! derive it (`#[derive(Annotated)]`) or derive a full schema
//! (`#[derive(SchemaType)]`).

use crate::error::{Error, Result};
use crate::schema::{Schema, SchemaDef};
use crate::state::Value;
use serde_json::Value as Json;
use std::any::TypeId;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::sync::Arc;

/// Parameter or return type tag
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeTag {
    /// No annotation
    Empty,
    /// Any JSON value
    Any,
    /// Marker: the previous step's result
    ReturnValue,
    /// Marker: the parameter being resolved
    Parameter,
    /// Marker: raw query string value looked up by parameter name
    QueryParam,
    /// Integer
    Int,
    /// Floating point number
    Float,
    /// String
    Str,
    /// Boolean
    Bool,
    /// Date and time
    DateTime,
    /// Calendar date
    Date,
    /// Time of day
    Time,
    /// Decimal number
    Decimal,
    /// UUID
    Uuid,
    /// Unit return
    NoneType,
    /// A schema type
    Schema(SchemaDef),
    /// Homogeneous sequence
    Sequence(Box<TypeTag>),
    /// Homogeneous set
    Set(Box<TypeTag>),
    /// Fixed-length tuple
    Tuple(Vec<TypeTag>),
    /// Open-ended homogeneous tuple
    VarTuple(Box<TypeTag>),
    /// String-keyed mapping
    Mapping(Box<TypeTag>, Box<TypeTag>),
    /// Optional value
    Optional(Box<TypeTag>),
    /// One of several types
    Union(Vec<TypeTag>),
    /// Any other Rust type
    Named(NamedType),
}

impl TypeTag {
    /// Tag for an arbitrary Rust type
    #[must_use]
    pub fn named<T: 'static>() -> Self {
        Self::Named(NamedType {
            id: TypeId::of::<T>(),
            name: short_type_name(std::any::type_name::<T>()),
            path: std::any::type_name::<T>(),
            schema: None,
        })
    }

    /// Tag for a Rust type carrying a reusable field schema
    #[must_use]
    pub fn named_with_schema<T: 'static>(schema: Schema) -> Self {
        Self::Named(NamedType {
            id: TypeId::of::<T>(),
            name: short_type_name(std::any::type_name::<T>()),
            path: std::any::type_name::<T>(),
            schema: Some(Arc::new(schema)),
        })
    }

    /// Whether this is the "no annotation" tag
    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Lower-cased display name
    #[must_use]
    pub fn name(&self) -> String {
        self.to_string().to_lowercase()
    }

    /// Lower-cased name used to build component identities
    ///
    /// Named types contribute their full path including generic arguments,
    /// so distinct types never share an identity.
    #[must_use]
    pub fn identity_name(&self) -> String {
        self.qualified().to_lowercase()
    }

    fn qualified(&self) -> String {
        let all = |items: &[Self]| items.iter().map(Self::qualified).collect::<Vec<_>>().join(", ");
        match self {
            Self::Named(named) => named.path.to_string(),
            Self::Sequence(inner) => format!("list<{}>", inner.qualified()),
            Self::Set(inner) => format!("set<{}>", inner.qualified()),
            Self::Tuple(items) => format!("tuple<{}>", all(items)),
            Self::VarTuple(inner) => format!("tuple<{}, ...>", inner.qualified()),
            Self::Mapping(key, value) => format!("dict<{}, {}>", key.qualified(), value.qualified()),
            Self::Optional(inner) => format!("option<{}>", inner.qualified()),
            Self::Union(items) => format!("union<{}>", all(items)),
            other => other.to_string(),
        }
    }

    /// Whether the tag is one of the primitive types
    #[must_use]
    pub fn is_primitive(&self) -> bool {
        self.primitive_schema().is_some()
    }

    /// Field schema for a primitive tag
    #[must_use]
    pub fn primitive_schema(&self) -> Option<Schema> {
        let schema = match self {
            Self::Empty | Self::Any => Schema::any(),
            Self::Int => Schema::integer(),
            Self::Float => Schema::float(),
            Self::Str => Schema::string(),
            Self::Bool => Schema::boolean(),
            Self::DateTime => Schema::datetime(),
            Self::Date => Schema::date(),
            Self::Time => Schema::time(),
            Self::Decimal => Schema::decimal(),
            Self::Uuid => Schema::uuid(),
            _ => return None,
        };
        Some(schema)
    }

    /// Whether the tag is a sequence, set or tuple
    #[must_use]
    pub fn is_container(&self) -> bool {
        matches!(
            self,
            Self::Sequence(_) | Self::Set(_) | Self::Tuple(_) | Self::VarTuple(_)
        )
    }

    /// Strip one level of `Optional`, reporting whether it was present
    #[must_use]
    pub fn unwrap_optional(&self) -> (&Self, bool) {
        match self {
            Self::Optional(inner) => (inner, true),
            other => (other, false),
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("empty"),
            Self::Any => f.write_str("any"),
            Self::ReturnValue => f.write_str("ReturnValue"),
            Self::Parameter => f.write_str("Parameter"),
            Self::QueryParam => f.write_str("QueryParam"),
            Self::Int => f.write_str("int"),
            Self::Float => f.write_str("float"),
            Self::Str => f.write_str("str"),
            Self::Bool => f.write_str("bool"),
            Self::DateTime => f.write_str("datetime"),
            Self::Date => f.write_str("date"),
            Self::Time => f.write_str("time"),
            Self::Decimal => f.write_str("decimal"),
            Self::Uuid => f.write_str("uuid"),
            Self::NoneType => f.write_str("none"),
            Self::Schema(def) => f.write_str(def.name()),
            Self::Sequence(inner) => write!(f, "list<{inner}>"),
            Self::Set(inner) => write!(f, "set<{inner}>"),
            Self::Tuple(items) => write!(f, "tuple<{}>", join(items)),
            Self::VarTuple(inner) => write!(f, "tuple<{inner}, ...>"),
            Self::Mapping(key, value) => write!(f, "dict<{key}, {value}>"),
            Self::Optional(inner) => write!(f, "option<{inner}>"),
            Self::Union(items) => write!(f, "union<{}>", join(items)),
            Self::Named(named) => f.write_str(named.name),
        }
    }
}

fn join(items: &[TypeTag]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Strip module paths and generic arguments from a Rust type name
fn short_type_name(full: &'static str) -> &'static str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// A user type identified by its `TypeId`
#[derive(Debug, Clone)]
pub struct NamedType {
    id: TypeId,
    name: &'static str,
    path: &'static str,
    schema: Option<Arc<Schema>>,
}

impl NamedType {
    /// Short type name
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Full type path, generic arguments included
    #[must_use]
    pub fn path(&self) -> &'static str {
        self.path
    }

    /// Reusable field schema, if the type declares one
    #[must_use]
    pub fn schema(&self) -> Option<&Schema> {
        self.schema.as_deref()
    }
}

impl PartialEq for NamedType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for NamedType {}

impl Hash for NamedType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// Types that can be declared as parameters or returned from callables
///
/// `from_value` extracts the type from a stored [`Value`]: first by exact
/// downcast, then by decoding a stored JSON value through `from_json`.
/// `to_json` is used when rendering return values.
pub trait Annotated: Clone + Send + Sync + 'static {
    /// The type tag for this type
    fn annotation() -> TypeTag;

    /// Decode from JSON
    fn from_json(_json: &Json) -> Option<Self> {
        None
    }

    /// Encode as JSON
    fn to_json(&self) -> Option<Json> {
        None
    }

    /// Extract from a type-erased state value
    fn from_value(value: &Value) -> Option<Self> {
        if let Some(exact) = value.downcast_ref::<Self>() {
            return Some(exact.clone());
        }
        value.downcast_ref::<Json>().and_then(Self::from_json)
    }
}

macro_rules! impl_integer {
    ($($t:ty),*) => {
        $(
            impl Annotated for $t {
                fn annotation() -> TypeTag {
                    TypeTag::Int
                }

                fn from_json(json: &Json) -> Option<Self> {
                    json.as_i64()
                        .and_then(|v| <$t>::try_from(v).ok())
                        .or_else(|| json.as_u64().and_then(|v| <$t>::try_from(v).ok()))
                }

                fn to_json(&self) -> Option<Json> {
                    Some(Json::from(*self))
                }
            }
        )*
    };
}

impl_integer!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

impl Annotated for f64 {
    fn annotation() -> TypeTag {
        TypeTag::Float
    }

    fn from_json(json: &Json) -> Option<Self> {
        json.as_f64()
    }

    fn to_json(&self) -> Option<Json> {
        Some(Json::from(*self))
    }
}

impl Annotated for f32 {
    fn annotation() -> TypeTag {
        TypeTag::Float
    }

    #[allow(clippy::cast_possible_truncation)]
    fn from_json(json: &Json) -> Option<Self> {
        json.as_f64().map(|v| v as Self)
    }

    fn to_json(&self) -> Option<Json> {
        Some(Json::from(f64::from(*self)))
    }
}

impl Annotated for String {
    fn annotation() -> TypeTag {
        TypeTag::Str
    }

    fn from_json(json: &Json) -> Option<Self> {
        json.as_str().map(ToString::to_string)
    }

    fn to_json(&self) -> Option<Json> {
        Some(Json::String(self.clone()))
    }
}

impl Annotated for bool {
    fn annotation() -> TypeTag {
        TypeTag::Bool
    }

    fn from_json(json: &Json) -> Option<Self> {
        json.as_bool()
    }

    fn to_json(&self) -> Option<Json> {
        Some(Json::Bool(*self))
    }
}

macro_rules! impl_serde_primitive {
    ($($t:ty => $tag:ident),* $(,)?) => {
        $(
            impl Annotated for $t {
                fn annotation() -> TypeTag {
                    TypeTag::$tag
                }

                fn from_json(json: &Json) -> Option<Self> {
                    serde_json::from_value(json.clone()).ok()
                }

                fn to_json(&self) -> Option<Json> {
                    serde_json::to_value(self).ok()
                }
            }
        )*
    };
}

impl_serde_primitive!(
    chrono::NaiveDateTime => DateTime,
    chrono::DateTime<chrono::Utc> => DateTime,
    chrono::NaiveDate => Date,
    chrono::NaiveTime => Time,
    uuid::Uuid => Uuid,
);

impl Annotated for () {
    fn annotation() -> TypeTag {
        TypeTag::NoneType
    }

    fn from_json(json: &Json) -> Option<Self> {
        json.is_null().then_some(())
    }

    fn to_json(&self) -> Option<Json> {
        Some(Json::Null)
    }
}

impl Annotated for Json {
    fn annotation() -> TypeTag {
        TypeTag::Any
    }

    fn from_json(json: &Json) -> Option<Self> {
        Some(json.clone())
    }

    fn to_json(&self) -> Option<Json> {
        Some(self.clone())
    }
}

impl<T: Annotated> Annotated for Option<T> {
    fn annotation() -> TypeTag {
        TypeTag::Optional(Box::new(T::annotation()))
    }

    fn from_json(json: &Json) -> Option<Self> {
        if json.is_null() {
            Some(None)
        } else {
            T::from_json(json).map(Some)
        }
    }

    fn to_json(&self) -> Option<Json> {
        match self {
            Some(inner) => inner.to_json(),
            None => Some(Json::Null),
        }
    }

    fn from_value(value: &Value) -> Option<Self> {
        if let Some(exact) = value.downcast_ref::<Self>() {
            return Some(exact.clone());
        }
        if value.is_none() {
            return Some(None);
        }
        T::from_value(value).map(Some)
    }
}

impl<T: Annotated + Send + Sync> Annotated for Arc<T> {
    fn annotation() -> TypeTag {
        T::annotation()
    }

    fn from_json(json: &Json) -> Option<Self> {
        T::from_json(json).map(Self::new)
    }

    fn to_json(&self) -> Option<Json> {
        self.as_ref().to_json()
    }

    fn from_value(value: &Value) -> Option<Self> {
        value
            .downcast_arc::<T>()
            .or_else(|| value.downcast_ref::<Self>().cloned())
            .or_else(|| T::from_value(value).map(Self::new))
    }
}

fn json_items<T: Annotated>(json: &Json) -> Option<Vec<T>> {
    json.as_array()?.iter().map(T::from_json).collect()
}

fn items_to_json<'a, T: Annotated>(items: impl Iterator<Item = &'a T>) -> Option<Json> {
    items
        .map(Annotated::to_json)
        .collect::<Option<Vec<_>>>()
        .map(Json::Array)
}

impl<T: Annotated> Annotated for Vec<T> {
    fn annotation() -> TypeTag {
        TypeTag::Sequence(Box::new(T::annotation()))
    }

    fn from_json(json: &Json) -> Option<Self> {
        json_items(json)
    }

    fn to_json(&self) -> Option<Json> {
        items_to_json(self.iter())
    }
}

impl<T: Annotated> Annotated for Box<[T]> {
    fn annotation() -> TypeTag {
        TypeTag::VarTuple(Box::new(T::annotation()))
    }

    fn from_json(json: &Json) -> Option<Self> {
        json_items(json).map(Vec::into_boxed_slice)
    }

    fn to_json(&self) -> Option<Json> {
        items_to_json(self.iter())
    }
}

impl<T: Annotated + Eq + Hash> Annotated for HashSet<T> {
    fn annotation() -> TypeTag {
        TypeTag::Set(Box::new(T::annotation()))
    }

    fn from_json(json: &Json) -> Option<Self> {
        json_items(json).map(|items: Vec<T>| items.into_iter().collect())
    }

    fn to_json(&self) -> Option<Json> {
        items_to_json(self.iter())
    }
}

impl<T: Annotated + Ord> Annotated for BTreeSet<T> {
    fn annotation() -> TypeTag {
        TypeTag::Set(Box::new(T::annotation()))
    }

    fn from_json(json: &Json) -> Option<Self> {
        json_items(json).map(|items: Vec<T>| items.into_iter().collect())
    }

    fn to_json(&self) -> Option<Json> {
        items_to_json(self.iter())
    }
}

impl<V: Annotated> Annotated for HashMap<String, V> {
    fn annotation() -> TypeTag {
        TypeTag::Mapping(Box::new(TypeTag::Str), Box::new(V::annotation()))
    }

    fn from_json(json: &Json) -> Option<Self> {
        json.as_object()?
            .iter()
            .map(|(k, v)| V::from_json(v).map(|v| (k.clone(), v)))
            .collect()
    }

    fn to_json(&self) -> Option<Json> {
        self.iter()
            .map(|(k, v)| v.to_json().map(|v| (k.clone(), v)))
            .collect::<Option<serde_json::Map<_, _>>>()
            .map(Json::Object)
    }
}

impl<V: Annotated> Annotated for BTreeMap<String, V> {
    fn annotation() -> TypeTag {
        TypeTag::Mapping(Box::new(TypeTag::Str), Box::new(V::annotation()))
    }

    fn from_json(json: &Json) -> Option<Self> {
        json.as_object()?
            .iter()
            .map(|(k, v)| V::from_json(v).map(|v| (k.clone(), v)))
            .collect()
    }

    fn to_json(&self) -> Option<Json> {
        self.iter()
            .map(|(k, v)| v.to_json().map(|v| (k.clone(), v)))
            .collect::<Option<serde_json::Map<_, _>>>()
            .map(Json::Object)
    }
}

macro_rules! impl_tuple {
    ($len:expr; $($name:ident : $idx:tt),+) => {
        impl<$($name: Annotated),+> Annotated for ($($name,)+) {
            fn annotation() -> TypeTag {
                TypeTag::Tuple(vec![$($name::annotation()),+])
            }

            fn from_json(json: &Json) -> Option<Self> {
                let items = json.as_array()?;
                if items.len() != $len {
                    return None;
                }
                Some(($($name::from_json(&items[$idx])?,)+))
            }

            fn to_json(&self) -> Option<Json> {
                Some(Json::Array(vec![$(self.$idx.to_json()?),+]))
            }
        }
    };
}

impl_tuple!(1; A: 0);
impl_tuple!(2; A: 0, B: 1);
impl_tuple!(3; A: 0, B: 1, C: 2);
impl_tuple!(4; A: 0, B: 1, C: 2, D: 3);

/// Implement [`Annotated`] for an opaque type, matched by `TypeId`
macro_rules! impl_named {
    ($($t:ty),* $(,)?) => {
        $(
            impl $crate::types::Annotated for $t {
                fn annotation() -> $crate::types::TypeTag {
                    $crate::types::TypeTag::named::<$t>()
                }
            }
        )*
    };
}

pub(crate) use impl_named;

/// Marker: receives the previous step's result
///
/// Lets pipeline steps such as response rendering consume whatever the
/// handler returned.
#[derive(Debug, Clone)]
pub struct ReturnValue(pub Value);

impl Annotated for ReturnValue {
    fn annotation() -> TypeTag {
        TypeTag::ReturnValue
    }

    fn from_value(value: &Value) -> Option<Self> {
        Some(Self(value.clone()))
    }
}

/// Marker: a raw query string value, looked up by parameter name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryParam(pub Option<String>);

impl Annotated for QueryParam {
    fn annotation() -> TypeTag {
        TypeTag::QueryParam
    }

    fn from_json(json: &Json) -> Option<Self> {
        match json {
            Json::Null => Some(Self(None)),
            Json::String(s) => Some(Self(Some(s.clone()))),
            _ => None,
        }
    }

    fn to_json(&self) -> Option<Json> {
        Some(self.0.clone().map_or(Json::Null, Json::String))
    }
}

/// A single request header, looked up by parameter name
///
/// Underscores in the parameter name map to dashes (`user_agent` reads
/// `User-Agent`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header(pub Option<String>);

impl Annotated for Header {
    fn annotation() -> TypeTag {
        TypeTag::named::<Self>()
    }

    fn to_json(&self) -> Option<Json> {
        Some(self.0.clone().map_or(Json::Null, Json::String))
    }
}

/// Arbitrary precision decimal kept in its validated textual form
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Decimal(String);

impl Decimal {
    /// Parse a decimal literal (`-12.50`, `3`, `1e-3`)
    #[must_use]
    pub fn parse(input: &str) -> Option<Self> {
        let trimmed = input.trim();
        let unsigned = trimmed
            .strip_prefix('-')
            .or_else(|| trimmed.strip_prefix('+'))
            .unwrap_or(trimmed);
        let (mantissa, exponent) = match unsigned.find(['e', 'E']) {
            Some(pos) => (&unsigned[..pos], Some(&unsigned[pos + 1..])),
            None => (unsigned, None),
        };
        let (whole, fraction) = mantissa.split_once('.').unwrap_or((mantissa, ""));
        let digits = |s: &str| s.chars().all(|c| c.is_ascii_digit());
        if (whole.is_empty() && fraction.is_empty()) || !digits(whole) || !digits(fraction) {
            return None;
        }
        if let Some(exp) = exponent {
            let exp = exp.strip_prefix(['-', '+']).unwrap_or(exp);
            if exp.is_empty() || !digits(exp) {
                return None;
            }
        }
        Some(Self(trimmed.to_string()))
    }

    /// Textual form
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Decimal {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s).ok_or_else(|| Error::Parse {
            format: "decimal",
            reason: format!("invalid decimal literal '{s}'"),
        })
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Annotated for Decimal {
    fn annotation() -> TypeTag {
        TypeTag::Decimal
    }

    fn from_json(json: &Json) -> Option<Self> {
        match json {
            Json::String(s) => Self::parse(s),
            Json::Number(n) => Self::parse(&n.to_string()),
            _ => None,
        }
    }

    fn to_json(&self) -> Option<Json> {
        Some(Json::String(self.0.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Clone)]
    struct Database;

    impl_named!(Database);

    #[test]
    fn test_primitive_tags() {
        assert_eq!(i64::annotation(), TypeTag::Int);
        assert_eq!(u8::annotation(), TypeTag::Int);
        assert_eq!(f32::annotation(), TypeTag::Float);
        assert_eq!(String::annotation(), TypeTag::Str);
        assert_eq!(<()>::annotation(), TypeTag::NoneType);
        assert_eq!(uuid::Uuid::annotation(), TypeTag::Uuid);
        assert_eq!(chrono::NaiveDate::annotation(), TypeTag::Date);
    }

    #[test]
    fn test_container_tags() {
        assert_eq!(
            Vec::<i64>::annotation(),
            TypeTag::Sequence(Box::new(TypeTag::Int))
        );
        assert_eq!(
            <(i64, String)>::annotation(),
            TypeTag::Tuple(vec![TypeTag::Int, TypeTag::Str])
        );
        assert_eq!(
            Box::<[bool]>::annotation(),
            TypeTag::VarTuple(Box::new(TypeTag::Bool))
        );
        assert_eq!(
            Option::<i64>::annotation().unwrap_optional(),
            (&TypeTag::Int, true)
        );
    }

    #[test]
    fn test_named_tag_identity() {
        let tag = Database::annotation();
        assert_eq!(tag, TypeTag::named::<Database>());
        assert_ne!(tag, TypeTag::named::<String>());
        assert_eq!(tag.name(), "database");
        assert!(!tag.is_primitive());
    }

    #[derive(Debug, Clone)]
    struct Repo<T>(std::marker::PhantomData<T>);

    impl<T: Clone + Send + Sync + 'static> Annotated for Repo<T> {
        fn annotation() -> TypeTag {
            TypeTag::named::<Self>()
        }
    }

    #[test]
    fn test_generic_identities_differ() {
        let users = Repo::<i64>::annotation();
        let orders = Repo::<String>::annotation();
        assert_eq!(users.name(), orders.name());
        assert_ne!(users.identity_name(), orders.identity_name());
        assert!(users.identity_name().ends_with("repo<i64>"));
        assert_eq!(
            Vec::<Database>::annotation().identity_name(),
            format!("list<{}>", std::any::type_name::<Database>().to_lowercase())
        );
        assert_eq!(TypeTag::Int.identity_name(), "int");
    }

    #[test]
    fn test_display_names() {
        assert_eq!(Vec::<i64>::annotation().name(), "list<int>");
        assert_eq!(
            HashMap::<String, bool>::annotation().to_string(),
            "dict<str, bool>"
        );
        assert_eq!(Header::annotation().name(), "header");
    }

    #[test]
    fn test_from_json_conversions() {
        assert_eq!(i32::from_json(&json!(42)), Some(42));
        assert_eq!(u8::from_json(&json!(300)), None);
        assert_eq!(Option::<i64>::from_json(&json!(null)), Some(None));
        assert_eq!(
            Vec::<String>::from_json(&json!(["a", "b"])),
            Some(vec!["a".to_string(), "b".to_string()])
        );
        assert_eq!(
            <(i64, bool)>::from_json(&json!([1, true])),
            Some((1, true))
        );
        assert_eq!(<(i64, bool)>::from_json(&json!([1])), None);
    }

    #[test]
    fn test_from_value_prefers_exact_type() {
        let value = Value::new(7i64);
        assert_eq!(i64::from_value(&value), Some(7));

        let json = Value::new(json!(7));
        assert_eq!(i64::from_value(&json), Some(7));
        assert_eq!(String::from_value(&json), None);
    }

    #[test]
    fn test_decimal_parse() {
        assert!(Decimal::parse("12.50").is_some());
        assert!(Decimal::parse("-3").is_some());
        assert!(Decimal::parse("1e-3").is_some());
        assert!(Decimal::parse(".5").is_some());
        assert!(Decimal::parse("abc").is_none());
        assert!(Decimal::parse(".").is_none());
        assert!("1.2.3".parse::<Decimal>().is_err());
        assert_eq!(
            Decimal::from_json(&json!(2.5)).map(|d| d.to_string()),
            Some("2.5".to_string())
        );
    }
}
