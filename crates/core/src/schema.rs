//! Schema validation: raw JSON in, validated [`Record`] or field-level errors out.
//!
//! The engine only depends on the [`Schema`] trait. Two implementations ship here:
//!
//! - [`ObjectSchema`]: declarative fields, collects *all* issues with paths such as
//!   `items[0].quantity`, strips unknown keys, and can extend a parent schema.
//! - [`SerdeSchema`]: validates by round-tripping through a strongly-typed serde model.

use std::collections::BTreeSet;
use std::marker::PhantomData;
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::{FieldIssue, ValidationError};
use crate::record::{Record, kind_of};
use crate::value_object::{ValueObject, parse_value_object};

/// Validates raw structured data against a declared shape.
pub trait Schema: Send + Sync + core::fmt::Debug {
    fn validate(&self, raw: &Value) -> Result<Record, ValidationError>;

    /// Best-effort validation: every field that passed, plus every issue found.
    ///
    /// Extending schemas use this so a parent failure on a field the child overrides
    /// does not discard the parent's other fields.
    fn validate_lenient(&self, raw: &Value) -> (Map<String, Value>, Vec<FieldIssue>) {
        match self.validate(raw) {
            Ok(record) => (record.into_map(), Vec::new()),
            Err(err) => (Map::new(), err.issues),
        }
    }

    /// Names of the top-level fields this schema declares (empty when opaque).
    fn field_names(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Shared handle to a schema; factories and derived factories hold these.
pub type SchemaRef = Arc<dyn Schema>;

/// Shape of a single field.
#[derive(Debug, Clone)]
pub enum FieldKind {
    String { min_len: Option<usize>, max_len: Option<usize> },
    Integer { min: Option<i64>, max: Option<i64> },
    Number { min: Option<f64>, max: Option<f64> },
    Boolean,
    /// Canonical hyphenated lower-case UUID.
    Uuid,
    /// RFC 3339 timestamp, normalised to UTC.
    DateTime,
    Enum(Vec<String>),
    Array { items: Box<FieldKind>, min_items: Option<usize> },
    Object(ObjectSchema),
    Any,
    ValueObject {
        name: &'static str,
        parse: fn(&Value) -> Result<Value, String>,
    },
}

impl FieldKind {
    pub fn string() -> Self {
        Self::String { min_len: None, max_len: None }
    }

    pub fn integer() -> Self {
        Self::Integer { min: None, max: None }
    }

    pub fn number() -> Self {
        Self::Number { min: None, max: None }
    }

    pub fn boolean() -> Self {
        Self::Boolean
    }

    pub fn uuid() -> Self {
        Self::Uuid
    }

    pub fn datetime() -> Self {
        Self::DateTime
    }

    pub fn any() -> Self {
        Self::Any
    }

    pub fn one_of<I, S>(variants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Enum(variants.into_iter().map(Into::into).collect())
    }

    pub fn array(items: FieldKind) -> Self {
        Self::Array { items: Box::new(items), min_items: None }
    }

    pub fn object(schema: ObjectSchema) -> Self {
        Self::Object(schema)
    }

    /// A value-object fragment (see [`crate::value_object`]).
    pub fn value_object<T: ValueObject>() -> Self {
        Self::ValueObject {
            name: T::type_name(),
            parse: parse_value_object::<T>,
        }
    }

    /// Lower bound: length for strings, value for numbers, item count for arrays.
    /// Other kinds ignore it.
    pub fn with_min(self, n: i64) -> Self {
        match self {
            Self::String { max_len, .. } => Self::String { min_len: Some(n.max(0) as usize), max_len },
            Self::Integer { max, .. } => Self::Integer { min: Some(n), max },
            Self::Number { max, .. } => Self::Number { min: Some(n as f64), max },
            Self::Array { items, .. } => Self::Array { items, min_items: Some(n.max(0) as usize) },
            other => other,
        }
    }

    /// Upper bound: length for strings, value for numbers. Other kinds ignore it.
    pub fn with_max(self, n: i64) -> Self {
        match self {
            Self::String { min_len, .. } => Self::String { min_len, max_len: Some(n.max(0) as usize) },
            Self::Integer { min, .. } => Self::Integer { min, max: Some(n) },
            Self::Number { min, .. } => Self::Number { min, max: Some(n as f64) },
            other => other,
        }
    }

    fn check(&self, value: &Value, path: &str, issues: &mut Vec<FieldIssue>) -> Option<Value> {
        match self {
            Self::String { min_len, max_len } => {
                let Some(s) = value.as_str() else {
                    return reject(issues, path, format!("expected string, received {}", kind_of(value)));
                };
                let len = s.chars().count();
                if let Some(min) = min_len.filter(|m| len < *m) {
                    return reject(issues, path, format!("must contain at least {min} character(s)"));
                }
                if let Some(max) = max_len.filter(|m| len > *m) {
                    return reject(issues, path, format!("must contain at most {max} character(s)"));
                }
                Some(value.clone())
            }
            Self::Integer { min, max } => {
                let Some(n) = value.as_i64() else {
                    return reject(issues, path, format!("expected integer, received {}", describe_number(value)));
                };
                if let Some(min) = min.filter(|m| n < *m) {
                    return reject(issues, path, format!("must be greater than or equal to {min}"));
                }
                if let Some(max) = max.filter(|m| n > *m) {
                    return reject(issues, path, format!("must be less than or equal to {max}"));
                }
                Some(value.clone())
            }
            Self::Number { min, max } => {
                let Some(n) = value.as_f64() else {
                    return reject(issues, path, format!("expected number, received {}", kind_of(value)));
                };
                if let Some(min) = min.filter(|m| n < *m) {
                    return reject(issues, path, format!("must be greater than or equal to {min}"));
                }
                if let Some(max) = max.filter(|m| n > *m) {
                    return reject(issues, path, format!("must be less than or equal to {max}"));
                }
                Some(value.clone())
            }
            Self::Boolean => match value {
                Value::Bool(_) => Some(value.clone()),
                other => reject(issues, path, format!("expected boolean, received {}", kind_of(other))),
            },
            Self::Uuid => match value.as_str().map(uuid::Uuid::parse_str) {
                Some(Ok(id)) => Some(Value::String(id.hyphenated().to_string())),
                Some(Err(_)) => reject(issues, path, "invalid uuid".into()),
                None => reject(issues, path, format!("expected uuid string, received {}", kind_of(value))),
            },
            Self::DateTime => match value.as_str().map(DateTime::parse_from_rfc3339) {
                Some(Ok(ts)) => Some(Value::String(
                    ts.with_timezone(&Utc)
                        .to_rfc3339_opts(SecondsFormat::AutoSi, true),
                )),
                Some(Err(_)) => reject(issues, path, "invalid RFC 3339 datetime".into()),
                None => reject(issues, path, format!("expected datetime string, received {}", kind_of(value))),
            },
            Self::Enum(variants) => match value.as_str() {
                Some(s) if variants.iter().any(|v| v == s) => Some(value.clone()),
                _ => reject(issues, path, format!(
                    "expected one of [{}], received {value}",
                    variants.join(", ")
                )),
            },
            Self::Array { items, min_items } => {
                let Some(elements) = value.as_array() else {
                    return reject(issues, path, format!("expected array, received {}", kind_of(value)));
                };
                if let Some(min) = min_items.filter(|m| elements.len() < *m) {
                    return reject(issues, path, format!("must contain at least {min} item(s)"));
                }
                let before = issues.len();
                let out: Vec<Value> = elements
                    .iter()
                    .enumerate()
                    .filter_map(|(i, el)| items.check(el, &format!("{path}[{i}]"), issues))
                    .collect();
                (issues.len() == before).then_some(Value::Array(out))
            }
            Self::Object(schema) => schema
                .validate_at(value, path, issues)
                .map(Value::Object),
            Self::Any => Some(value.clone()),
            Self::ValueObject { parse, .. } => match parse(value) {
                Ok(normalised) => Some(normalised),
                Err(msg) => reject(issues, path, msg),
            },
        }
    }
}

fn reject(issues: &mut Vec<FieldIssue>, path: &str, message: String) -> Option<Value> {
    issues.push(FieldIssue::new(path, message));
    None
}

fn describe_number(value: &Value) -> &'static str {
    match value {
        Value::Number(n) if n.is_f64() => "non-integer number",
        other => kind_of(other),
    }
}

#[derive(Debug, Clone)]
enum Presence {
    Required,
    Optional,
    Default(Value),
}

#[derive(Debug, Clone)]
struct Field {
    name: String,
    kind: FieldKind,
    presence: Presence,
}

/// Declarative object schema.
#[derive(Debug, Clone, Default)]
pub struct ObjectSchema {
    base: Option<SchemaRef>,
    fields: Vec<Field>,
}

impl ObjectSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// A schema that validates through `base` first and then adds its own fields.
    ///
    /// Own fields replace same-named fields of the parent.
    pub fn extending(base: SchemaRef) -> Self {
        Self {
            base: Some(base),
            fields: Vec::new(),
        }
    }

    pub fn field(self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.push(name.into(), kind, Presence::Required)
    }

    /// Missing or `null` values are accepted and left out of the record.
    pub fn optional(self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.push(name.into(), kind, Presence::Optional)
    }

    /// Missing values are replaced by `default` (which is validated like input).
    pub fn with_default(self, name: impl Into<String>, kind: FieldKind, default: impl Into<Value>) -> Self {
        self.push(name.into(), kind, Presence::Default(default.into()))
    }

    fn push(mut self, name: String, kind: FieldKind, presence: Presence) -> Self {
        self.fields.retain(|f| f.name != name);
        self.fields.push(Field { name, kind, presence });
        self
    }

    pub fn into_ref(self) -> SchemaRef {
        Arc::new(self)
    }

    fn validate_at(&self, raw: &Value, prefix: &str, issues: &mut Vec<FieldIssue>) -> Option<Map<String, Value>> {
        let before = issues.len();
        let out = self.collect(raw, prefix, issues);
        (issues.len() == before).then_some(out)
    }

    fn collect(&self, raw: &Value, prefix: &str, issues: &mut Vec<FieldIssue>) -> Map<String, Value> {
        let mut out = Map::new();
        let Some(input) = raw.as_object() else {
            issues.push(FieldIssue::new(prefix, format!("expected object, received {}", kind_of(raw))));
            return out;
        };

        if let Some(base) = &self.base {
            let (inherited, base_issues) = base.validate_lenient(raw);
            out = inherited;
            issues.extend(
                base_issues
                    .into_iter()
                    .filter(|i| !self.declares(top_segment(&i.path)))
                    .map(|i| FieldIssue::new(join_path(prefix, &i.path), i.message)),
            );
        }

        for field in &self.fields {
            let path = join_path(prefix, &field.name);
            let supplied = input.get(&field.name).filter(|v| !v.is_null());
            let candidate = match (supplied, &field.presence) {
                (Some(v), _) => v,
                (None, Presence::Default(d)) => d,
                (None, Presence::Optional) => {
                    out.remove(&field.name);
                    continue;
                }
                (None, Presence::Required) => {
                    out.remove(&field.name);
                    issues.push(FieldIssue::new(path, "required"));
                    continue;
                }
            };
            match field.kind.check(candidate, &path, issues) {
                Some(v) => {
                    out.insert(field.name.clone(), v);
                }
                None => {
                    out.remove(&field.name);
                }
            }
        }

        out
    }

    fn declares(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f.name == name)
    }
}

impl Schema for ObjectSchema {
    fn validate(&self, raw: &Value) -> Result<Record, ValidationError> {
        let mut issues = Vec::new();
        match self.validate_at(raw, "", &mut issues) {
            Some(map) if issues.is_empty() => Ok(Record::from_map(map)),
            _ => Err(ValidationError::new(issues)),
        }
    }

    fn validate_lenient(&self, raw: &Value) -> (Map<String, Value>, Vec<FieldIssue>) {
        let mut issues = Vec::new();
        let out = self.collect(raw, "", &mut issues);
        (out, issues)
    }

    fn field_names(&self) -> Vec<String> {
        let mut seen = BTreeSet::new();
        let inherited = self.base.as_ref().map(|b| b.field_names()).unwrap_or_default();
        inherited
            .into_iter()
            .chain(self.fields.iter().map(|f| f.name.clone()))
            .filter(|n| seen.insert(n.clone()))
            .collect()
    }
}

fn join_path(prefix: &str, tail: &str) -> String {
    match (prefix.is_empty(), tail.is_empty()) {
        (true, _) => tail.to_string(),
        (false, true) => prefix.to_string(),
        (false, false) if tail.starts_with('[') => format!("{prefix}{tail}"),
        (false, false) => format!("{prefix}.{tail}"),
    }
}

fn top_segment(path: &str) -> &str {
    let end = path.find(['.', '[']).unwrap_or(path.len());
    &path[..end]
}

/// Schema backed by a serde model: input is valid iff it deserializes into `T`.
pub struct SerdeSchema<T> {
    fields: Vec<String>,
    _model: PhantomData<fn() -> T>,
}

impl<T> SerdeSchema<T> {
    pub fn new() -> Self {
        Self {
            fields: Vec::new(),
            _model: PhantomData,
        }
    }

    /// Declare the top-level field names (serde offers no introspection).
    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }
}

impl<T> Default for SerdeSchema<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> core::fmt::Debug for SerdeSchema<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SerdeSchema")
            .field("model", &core::any::type_name::<T>())
            .finish()
    }
}

impl<T> Schema for SerdeSchema<T>
where
    T: Serialize + DeserializeOwned,
{
    fn validate(&self, raw: &Value) -> Result<Record, ValidationError> {
        let model: T = serde_json::from_value(raw.clone())
            .map_err(|e| ValidationError::single("", e.to_string()))?;
        let value = serde_json::to_value(&model)
            .map_err(|e| ValidationError::single("", e.to_string()))?;
        Record::from_value(value)
    }

    fn field_names(&self) -> Vec<String> {
        self.fields.clone()
    }
}
