//! Core types for the x-type algebra.
//!
//! An [`XType`] is the compact type-algebra representation of a data shape:
//! primitives with ordered constraint modifiers, literal values, object
//! maps, arrays, AND/OR composition, and references into the document's
//! named-type namespace. The wire form of an x-type is plain JSON and
//! lives in the document itself (`components/x-types`, `x-type` fields);
//! [`XType::from_value`] and [`XType::to_value`] convert between the two.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

use crate::error::{Diagnostic, Severity};

/// Keywords with structural meaning in the wire form. Literal values that
/// collide with one of these are escaped with [`LITERAL_PREFIX`].
pub const RESERVED_KEYWORDS: &[&str] = &["string", "number", "boolean", "any", "undefined"];

/// Escape prefix for literals and field names that would otherwise be
/// read as reserved keywords or structural keys.
pub const LITERAL_PREFIX: &str = "$literal:";

/// Canonical pointer prefix of the named-schemas namespace.
pub const SCHEMAS_SECTION: &str = "#/components/schemas/";

/// Canonical pointer prefix of the named-x-types namespace.
pub const XTYPES_SECTION: &str = "#/components/x-types/";

/// Default circular-reference depth budget.
pub const DEFAULT_CIRCULAR_DEPTH: usize = 3;

/// Returns the JSON type name for error messages.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// True for JSON objects (not arrays, not null).
pub fn is_plain_object(value: &Value) -> bool {
    value.is_object()
}

/// True for JSON arrays.
pub fn is_array(value: &Value) -> bool {
    value.is_array()
}

/// True for scalar JSON values: strings, numbers, booleans.
pub fn is_primitive_scalar(value: &Value) -> bool {
    matches!(value, Value::String(_) | Value::Number(_) | Value::Bool(_))
}

/// True for `{}` — an object with no keys.
pub fn is_empty_mapping(value: &Value) -> bool {
    value.as_object().is_some_and(|map| map.is_empty())
}

/// Escape a string that collides with a reserved keyword.
///
/// Idempotent: an already-escaped value is never a reserved keyword, so a
/// second pass leaves it unchanged.
pub fn escape_reserved(value: &str) -> String {
    if RESERVED_KEYWORDS.contains(&value) {
        format!("{LITERAL_PREFIX}{value}")
    } else {
        value.to_string()
    }
}

/// Remove the literal-escape prefix, if present.
pub fn unescape_reserved(value: &str) -> &str {
    value.strip_prefix(LITERAL_PREFIX).unwrap_or(value)
}

/// Escape a field name that would collide with reserved structural keys:
/// names starting with `$` and names consisting only of digits.
///
/// Names already carrying the escape prefix are left alone, so the
/// escape/unescape pair is a bijection over raw field names.
pub fn escape_field_name(name: &str) -> String {
    if name.starts_with(LITERAL_PREFIX) {
        return name.to_string();
    }
    let all_digits = !name.is_empty() && name.bytes().all(|b| b.is_ascii_digit());
    if name.starts_with('$') || all_digits {
        format!("{LITERAL_PREFIX}{name}")
    } else {
        name.to_string()
    }
}

/// Remove the field-name escape prefix, if present.
pub fn unescape_field_name(name: &str) -> &str {
    name.strip_prefix(LITERAL_PREFIX).unwrap_or(name)
}

/// Mode of a translation or resolution pass.
///
/// Selects which visibility annotation drives field omission when a
/// reference into the named-schemas section is translated: `readOnly`
/// properties are omitted from requests, `writeOnly` properties from
/// responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Request,
    Response,
}

impl Mode {
    /// The visibility keyword that disqualifies a property in this mode.
    pub fn omission_key(&self) -> &'static str {
        match self {
            Mode::Request => "readOnly",
            Mode::Response => "writeOnly",
        }
    }
}

/// Options for translation and resolution passes.
#[derive(Debug, Clone)]
pub struct ResolveOptions {
    /// Request/response mode. `None` for mode-neutral passes (named
    /// components), where neither visibility annotation applies.
    pub mode: Option<Mode>,
    /// Circular-reference depth budget: how many times the same reference
    /// pointer may appear in the ancestor chain before resolution stops.
    /// Always at least 1.
    pub depth: usize,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            mode: None,
            depth: DEFAULT_CIRCULAR_DEPTH,
        }
    }
}

impl ResolveOptions {
    /// Create options for a specific mode with the default depth budget.
    pub fn new(mode: Mode) -> Self {
        Self {
            mode: Some(mode),
            depth: DEFAULT_CIRCULAR_DEPTH,
        }
    }

    /// Override the circular-reference depth budget (clamped to >= 1).
    pub fn depth(mut self, depth: usize) -> Self {
        self.depth = depth.max(1);
        self
    }
}

/// A concrete scalar value: a single-valued enum in schema terms.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Str(String),
    Num(Number),
    Bool(bool),
}

impl Scalar {
    /// Build from a JSON value; `None` for null, arrays, and objects.
    pub fn from_value(value: &Value) -> Option<Scalar> {
        match value {
            Value::String(s) => Some(Scalar::Str(s.clone())),
            Value::Number(n) => Some(Scalar::Num(n.clone())),
            Value::Bool(b) => Some(Scalar::Bool(*b)),
            _ => None,
        }
    }

    /// The JSON-Schema `type` keyword for this scalar.
    pub fn type_name(&self) -> &'static str {
        match self {
            Scalar::Str(_) => "string",
            Scalar::Num(_) => "number",
            Scalar::Bool(_) => "boolean",
        }
    }

    /// Raw JSON value, without keyword escaping. Used for `const`/`enum`.
    pub fn to_json(&self) -> Value {
        match self {
            Scalar::Str(s) => Value::String(s.clone()),
            Scalar::Num(n) => Value::Number(n.clone()),
            Scalar::Bool(b) => Value::Bool(*b),
        }
    }

    /// Wire-form JSON value, with reserved keywords escaped.
    pub fn to_wire(&self) -> Value {
        match self {
            Scalar::Str(s) => Value::String(escape_reserved(s)),
            Scalar::Num(n) => Value::Number(n.clone()),
            Scalar::Bool(b) => Value::Bool(*b),
        }
    }
}

/// Base of a primitive descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Base {
    String,
    Number,
    Boolean,
}

impl Base {
    fn as_str(&self) -> &'static str {
        match self {
            Base::String => "string",
            Base::Number => "number",
            Base::Boolean => "boolean",
        }
    }

    fn parse(s: &str) -> Option<Base> {
        match s {
            "string" => Some(Base::String),
            "number" => Some(Base::Number),
            "boolean" => Some(Base::Boolean),
            _ => None,
        }
    }
}

/// One constraint modifier of a primitive descriptor.
///
/// `Min`/`Max` are deliberately overloaded: they carry numeric bounds for
/// number bases and length bounds for string bases.
#[derive(Debug, Clone, PartialEq)]
pub enum Modifier {
    Format(String),
    Pattern(String),
    Min(Number),
    Max(Number),
    XMin(Number),
    XMax(Number),
}

/// A primitive descriptor: `base[::modifier]*`.
///
/// Modifiers keep the order they were appended in during translation,
/// which makes the rendered descriptor string deterministic:
///
/// ```
/// use serde_json::json;
/// use xtypes::{translate, Context, ResolveOptions, Sources};
///
/// let sources = Sources::new();
/// let mut ctx = Context::new(&sources, &ResolveOptions::default());
/// let x = translate(
///     &json!({"type": "string", "format": "email", "minLength": 5}),
///     &mut ctx,
///     "",
/// )
/// .unwrap();
/// assert_eq!(x.to_value(), json!("string::email::min(5)"));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Descriptor {
    pub base: Base,
    pub modifiers: Vec<Modifier>,
}

impl Descriptor {
    /// A bare descriptor with no modifiers.
    pub fn bare(base: Base) -> Descriptor {
        Descriptor {
            base,
            modifiers: Vec::new(),
        }
    }

    /// True for the generic `string` primitive with no constraints, the
    /// only primitive a concrete string literal may narrow.
    pub fn is_plain_string(&self) -> bool {
        self.base == Base::String && self.modifiers.is_empty()
    }

    /// Parse a descriptor string. `None` when the input is not a
    /// descriptor (and is therefore a string literal).
    pub fn parse(input: &str) -> Option<Descriptor> {
        let mut segments = split_segments(input);
        let base = Base::parse(segments.next()?)?;
        let mut modifiers = Vec::new();
        for segment in segments {
            modifiers.push(parse_modifier(segment)?);
        }
        Some(Descriptor { base, modifiers })
    }
}

impl fmt::Display for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.base.as_str())?;
        for modifier in &self.modifiers {
            match modifier {
                Modifier::Format(format) => write!(f, "::{format}")?,
                Modifier::Pattern(pattern) => write!(f, "::pattern({pattern})")?,
                Modifier::Min(n) => write!(f, "::min({n})")?,
                Modifier::Max(n) => write!(f, "::max({n})")?,
                Modifier::XMin(n) => write!(f, "::x-min({n})")?,
                Modifier::XMax(n) => write!(f, "::x-max({n})")?,
            }
        }
        Ok(())
    }
}

/// Split on `::` outside parentheses, so `pattern(a::b)` stays whole.
fn split_segments(input: &str) -> impl Iterator<Item = &str> {
    let mut segments = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    let bytes = input.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'(' => depth += 1,
            b')' => depth = depth.saturating_sub(1),
            b':' if depth == 0 && bytes.get(i + 1) == Some(&b':') => {
                segments.push(&input[start..i]);
                i += 2;
                start = i;
                continue;
            }
            _ => {}
        }
        i += 1;
    }
    segments.push(&input[start..]);
    segments.into_iter()
}

fn parse_modifier(segment: &str) -> Option<Modifier> {
    if segment.is_empty() {
        return None;
    }
    let Some(open) = segment.find('(') else {
        // A bare word is a format.
        return Some(Modifier::Format(segment.to_string()));
    };
    if !segment.ends_with(')') {
        return None;
    }
    let name = &segment[..open];
    let arg = &segment[open + 1..segment.len() - 1];
    match name {
        "pattern" => Some(Modifier::Pattern(arg.to_string())),
        "min" => serde_json::from_str(arg).ok().map(Modifier::Min),
        "max" => serde_json::from_str(arg).ok().map(Modifier::Max),
        "x-min" => serde_json::from_str(arg).ok().map(Modifier::XMin),
        "x-max" => serde_json::from_str(arg).ok().map(Modifier::XMax),
        _ => None,
    }
}

/// An object shape: named fields plus the reserved side channels.
///
/// Field names are stored in escaped form (see [`escape_field_name`]).
/// Optionality is expressed in the field type itself: an [`XType::Or`]
/// whose members include [`XType::Undefined`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ObjectMap {
    pub fields: IndexMap<String, XType>,
    /// Catch-all for additional properties (`$record`).
    pub record: Option<Box<XType>>,
    /// Human text per field (`$descriptions`).
    pub descriptions: IndexMap<String, String>,
    /// Raw discriminator metadata carried through for re-emission
    /// (`$discriminator`). Only present for explicit discriminators;
    /// implicit ones become [`XType::Discriminated`].
    pub discriminator: Option<Value>,
}

impl ObjectMap {
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
            && self.record.is_none()
            && self.descriptions.is_empty()
            && self.discriminator.is_none()
    }
}

/// An implicit discriminated union, detected while translating a named
/// schema whose `discriminator.mapping` rides on an `allOf` (no sibling
/// `oneOf`/`anyOf`).
///
/// Produced only by the Schema→XType translator and consumed only by
/// discriminator elevation; reaching the renderer with one is a
/// programmer error.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscriminatedUnion {
    /// One reference per mapping target, in mapping order.
    pub members: Vec<XType>,
    /// The discriminator property name.
    pub property_name: String,
    /// Discriminator value → reference pointer.
    pub mapping: IndexMap<String, String>,
    /// The shared base fields built before the union was detected.
    pub base_fields: ObjectMap,
    /// The component name being defined, seed for `Base_<name>`.
    pub defining_name: Option<String>,
}

/// A node of the x-type algebra.
#[derive(Debug, Clone, PartialEq)]
pub enum XType {
    /// The unconstrained type; identity element of the merge law.
    Any,
    /// Absence of value; absorbing element of the merge law.
    Undefined,
    /// The literal null type.
    Null,
    /// A primitive descriptor, e.g. `number::min(0)::x-max(100)`.
    Primitive(Descriptor),
    /// A concrete scalar: a single-valued enum.
    Literal(Scalar),
    /// An ordered multi-valued enum.
    LiteralSet(Vec<Scalar>),
    /// An object map.
    Object(ObjectMap),
    /// `{ "$array": T }`.
    Array(Box<XType>),
    /// Intersection: `{ "$and": [...] }`.
    And(Vec<XType>),
    /// Union: a bare sequence in the wire form.
    Or(Vec<XType>),
    /// A reference into a named-type namespace, with an optional
    /// post-resolution field-omission set.
    Ref {
        target: String,
        omit: Option<Vec<String>>,
    },
    /// An implicit discriminated union awaiting elevation.
    Discriminated(DiscriminatedUnion),
}

impl XType {
    /// Union constructor; a single-element sequence collapses to its
    /// element.
    pub fn or(mut members: Vec<XType>) -> XType {
        if members.len() == 1 {
            members.pop().expect("length checked")
        } else {
            XType::Or(members)
        }
    }

    /// Wrap a type as optional: a union with `undefined`.
    pub fn optional(self) -> XType {
        XType::Or(vec![self, XType::Undefined])
    }

    /// A plain reference with no omission set.
    pub fn reference(target: impl Into<String>) -> XType {
        XType::Ref {
            target: target.into(),
            omit: None,
        }
    }

    /// Compact wire-form rendering, for diagnostics.
    pub fn describe(&self) -> String {
        self.to_value().to_string()
    }

    /// Decode the wire form. Total: every JSON value maps to some x-type.
    /// Malformed structural keys are reported and degrade to safe values.
    pub fn from_value(value: &Value, diagnostics: &mut Vec<Diagnostic>) -> XType {
        match value {
            Value::Null => XType::Null,
            Value::Bool(b) => XType::Literal(Scalar::Bool(*b)),
            Value::Number(n) => XType::Literal(Scalar::Num(n.clone())),
            Value::String(s) => Self::from_wire_string(s),
            Value::Array(items) => {
                let members: Vec<XType> = items
                    .iter()
                    .map(|item| XType::from_value(item, diagnostics))
                    .collect();
                let scalars: Option<Vec<Scalar>> = members
                    .iter()
                    .map(|m| match m {
                        XType::Literal(s) => Some(s.clone()),
                        _ => None,
                    })
                    .collect();
                match scalars {
                    Some(scalars) if scalars.len() > 1 => XType::LiteralSet(scalars),
                    _ => XType::or(members),
                }
            }
            Value::Object(map) => {
                if let Some(Value::String(target)) = map.get("$ref") {
                    let omit = map.get("$omit").and_then(Value::as_array).map(|names| {
                        names
                            .iter()
                            .filter_map(|n| n.as_str().map(String::from))
                            .collect()
                    });
                    return XType::Ref {
                        target: target.clone(),
                        omit,
                    };
                }
                if let Some(and) = map.get("$and") {
                    return match and {
                        Value::Array(items) => XType::And(
                            items
                                .iter()
                                .map(|item| XType::from_value(item, diagnostics))
                                .collect(),
                        ),
                        other => {
                            diagnostics.push(Diagnostic::new(
                                Severity::Error,
                                "invalid-and",
                                "",
                                format!("expected an array for $and but got: {other}"),
                            ));
                            XType::Undefined
                        }
                    };
                }
                if let Some(items) = map.get("$array") {
                    return XType::Array(Box::new(XType::from_value(items, diagnostics)));
                }

                let mut object = ObjectMap::default();
                for (key, field) in map {
                    match key.as_str() {
                        "$record" => {
                            object.record = Some(Box::new(XType::from_value(field, diagnostics)));
                        }
                        "$descriptions" => {
                            if let Some(texts) = field.as_object() {
                                for (name, text) in texts {
                                    if let Some(text) = text.as_str() {
                                        object
                                            .descriptions
                                            .insert(name.clone(), text.to_string());
                                    }
                                }
                            }
                        }
                        "$discriminator" => {
                            object.discriminator = Some(field.clone());
                        }
                        _ => {
                            object
                                .fields
                                .insert(key.clone(), XType::from_value(field, diagnostics));
                        }
                    }
                }
                XType::Object(object)
            }
        }
    }

    fn from_wire_string(s: &str) -> XType {
        match s {
            "any" => XType::Any,
            "undefined" => XType::Undefined,
            _ => {
                if let Some(raw) = s.strip_prefix(LITERAL_PREFIX) {
                    return XType::Literal(Scalar::Str(raw.to_string()));
                }
                match Descriptor::parse(s) {
                    Some(descriptor) => XType::Primitive(descriptor),
                    None => XType::Literal(Scalar::Str(s.to_string())),
                }
            }
        }
    }

    /// Encode to the wire form. A [`XType::Discriminated`] degrades to
    /// its member sequence, which is its on-document representation.
    pub fn to_value(&self) -> Value {
        match self {
            XType::Any => Value::String("any".to_string()),
            XType::Undefined => Value::String("undefined".to_string()),
            XType::Null => Value::Null,
            XType::Primitive(descriptor) => Value::String(descriptor.to_string()),
            XType::Literal(scalar) => scalar.to_wire(),
            XType::LiteralSet(scalars) => {
                Value::Array(scalars.iter().map(Scalar::to_wire).collect())
            }
            XType::Object(object) => {
                let mut map = serde_json::Map::new();
                for (name, field) in &object.fields {
                    map.insert(name.clone(), field.to_value());
                }
                if let Some(record) = &object.record {
                    map.insert("$record".to_string(), record.to_value());
                }
                if !object.descriptions.is_empty() {
                    let texts: serde_json::Map<String, Value> = object
                        .descriptions
                        .iter()
                        .map(|(name, text)| (name.clone(), Value::String(text.clone())))
                        .collect();
                    map.insert("$descriptions".to_string(), Value::Object(texts));
                }
                if let Some(discriminator) = &object.discriminator {
                    map.insert("$discriminator".to_string(), discriminator.clone());
                }
                Value::Object(map)
            }
            XType::Array(items) => {
                let mut map = serde_json::Map::new();
                map.insert("$array".to_string(), items.to_value());
                Value::Object(map)
            }
            XType::And(members) => {
                let mut map = serde_json::Map::new();
                map.insert(
                    "$and".to_string(),
                    Value::Array(members.iter().map(XType::to_value).collect()),
                );
                Value::Object(map)
            }
            XType::Or(members) => Value::Array(members.iter().map(XType::to_value).collect()),
            XType::Ref { target, omit } => {
                let mut map = serde_json::Map::new();
                map.insert("$ref".to_string(), Value::String(target.clone()));
                if let Some(omit) = omit {
                    map.insert(
                        "$omit".to_string(),
                        Value::Array(omit.iter().cloned().map(Value::String).collect()),
                    );
                }
                Value::Object(map)
            }
            XType::Discriminated(union) => {
                Value::Array(union.members.iter().map(XType::to_value).collect())
            }
        }
    }
}
