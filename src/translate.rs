//! Schema→XType translation.
//!
//! Recursive-descent conversion of a JSON-Schema node into an x-type
//! node. The input tree is never mutated; the only side effects are
//! diagnostics pushed onto the context. Translation rules are ordered by
//! precedence — the first matching rule wins.

use serde_json::{Map, Value};

use crate::context::Context;
use crate::error::TranslateError;
use crate::types::{
    escape_field_name, is_plain_object, json_type_name, Base, Descriptor, DiscriminatedUnion,
    Modifier, ObjectMap, Scalar, XType, SCHEMAS_SECTION, XTYPES_SECTION,
};

/// Bound on reference/allOf hops while flattening property visibility.
/// Visibility chains in real documents are shallow; the bound only stops
/// runaway self-referential properties.
const MAX_VISIBILITY_DEPTH: usize = 32;

/// Translate a JSON-Schema node into an x-type.
///
/// `from` names the document the node was found in, so that relative
/// references resolve correctly; pass `""` for the root document.
///
/// # Errors
///
/// Returns [`TranslateError`] only for malformed input a well-formed
/// document cannot produce: a non-object schema node, or an object-like
/// schema with no extractable shape. Everything else degrades to a safe
/// fallback and a diagnostic.
pub fn translate(schema: &Value, ctx: &mut Context, from: &str) -> Result<XType, TranslateError> {
    translate_at(schema, ctx, from, "")
}

fn translate_at(
    schema: &Value,
    ctx: &mut Context,
    from: &str,
    path: &str,
) -> Result<XType, TranslateError> {
    let Some(map) = schema.as_object() else {
        return Err(TranslateError::UnsupportedNode {
            path: path.to_string(),
            actual: json_type_name(schema).to_string(),
        });
    };

    let declared_type = map.get("type").and_then(Value::as_str);

    if declared_type == Some("null") {
        return Ok(XType::Null);
    }

    if let Some(ty) = declared_type {
        if matches!(ty, "string" | "number" | "integer" | "boolean") {
            return Ok(translate_scalar(ty, map, ctx, path));
        }
    }

    // An object (or typeless) schema with no structure of its own is just
    // a record: open unless additionalProperties is false.
    if is_bare_object(map, declared_type) {
        let record = match map.get("additionalProperties") {
            Some(Value::Bool(false)) => XType::Undefined,
            _ => XType::Any,
        };
        return Ok(XType::Object(ObjectMap {
            record: Some(Box::new(record)),
            ..ObjectMap::default()
        }));
    }

    if let Some(target) = map.get("$ref").and_then(Value::as_str) {
        return translate_ref(target, ctx, from, path);
    }

    if map.get("properties").is_some_and(is_plain_object)
        || map.get("additionalProperties").is_some_and(is_plain_object)
        || map.get("items").is_some_and(is_plain_object)
    {
        return extract_object_like(map, ctx, from, path);
    }

    if let Some(members) = map.get("allOf").and_then(Value::as_array) {
        let mut translated = Vec::with_capacity(members.len());
        for (i, member) in members.iter().enumerate() {
            translated.push(translate_at(member, ctx, from, &format!("{path}/allOf/{i}"))?);
        }
        if translated.len() == 1 {
            return Ok(translated.pop().expect("length checked"));
        }
        return Ok(XType::And(translated));
    }

    for keyword in ["oneOf", "anyOf"] {
        if let Some(members) = map.get(keyword).and_then(Value::as_array) {
            let mut translated = Vec::with_capacity(members.len());
            for (i, member) in members.iter().enumerate() {
                translated.push(translate_at(
                    member,
                    ctx,
                    from,
                    &format!("{path}/{keyword}/{i}"),
                )?);
            }
            return Ok(XType::or(translated));
        }
    }

    ctx.warn(
        "unknown-shape",
        path,
        format!("unable to determine the exact type: {schema}"),
    );
    Ok(XType::Any)
}

fn is_bare_object(map: &Map<String, Value>, declared_type: Option<&str>) -> bool {
    // A typeless schema only counts as an object when additionalProperties
    // is present as its evidence; everything else falls through to the
    // later rules or the unknown-shape diagnostic.
    let additional_bool = matches!(map.get("additionalProperties"), Some(Value::Bool(_)));
    let type_ok =
        declared_type == Some("object") || (declared_type.is_none() && additional_bool);
    type_ok
        && !map.contains_key("properties")
        && !map.contains_key("oneOf")
        && !map.contains_key("anyOf")
        && !map.contains_key("allOf")
        && !map.contains_key("$ref")
        && !map.contains_key("items")
        && !map.contains_key("enum")
        && !map.contains_key("const")
        && matches!(map.get("additionalProperties"), None | Some(Value::Bool(_)))
}

fn translate_scalar(ty: &str, map: &Map<String, Value>, ctx: &mut Context, path: &str) -> XType {
    if let Some(entries) = map.get("enum").and_then(Value::as_array) {
        return translate_enum(entries, ctx, path);
    }
    if let Some(value) = map.get("const") {
        if let Some(scalar) = Scalar::from_value(value) {
            return XType::Literal(scalar);
        }
        if value.is_null() {
            return XType::Null;
        }
        ctx.warn(
            "unknown-shape",
            path,
            format!("non-scalar const value: {value}"),
        );
    }

    let mut modifiers = Vec::new();
    let base = match ty {
        "integer" => {
            let format = map.get("format").and_then(Value::as_str).unwrap_or("integer");
            modifiers.push(Modifier::Format(format.to_string()));
            Base::Number
        }
        "number" => Base::Number,
        "boolean" => Base::Boolean,
        _ => Base::String,
    };
    if ty != "number" && ty != "integer" {
        if let Some(format) = map.get("format").and_then(Value::as_str) {
            modifiers.push(Modifier::Format(format.to_string()));
        }
    }
    if let Some(pattern) = map.get("pattern").and_then(Value::as_str) {
        modifiers.push(Modifier::Pattern(pattern.to_string()));
    }
    let bounds: [(&str, fn(serde_json::Number) -> Modifier); 6] = [
        ("minimum", Modifier::Min),
        ("maximum", Modifier::Max),
        ("exclusiveMinimum", Modifier::XMin),
        ("exclusiveMaximum", Modifier::XMax),
        ("minLength", Modifier::Min),
        ("maxLength", Modifier::Max),
    ];
    for (keyword, constructor) in bounds {
        if let Some(Value::Number(n)) = map.get(keyword) {
            modifiers.push(constructor(n.clone()));
        }
    }
    XType::Primitive(Descriptor { base, modifiers })
}

fn translate_enum(entries: &[Value], ctx: &mut Context, path: &str) -> XType {
    if entries.len() == 1 {
        return match Scalar::from_value(&entries[0]) {
            Some(scalar) => XType::Literal(scalar),
            None if entries[0].is_null() => XType::Null,
            None => {
                ctx.warn(
                    "unknown-shape",
                    path,
                    format!("non-scalar enum value: {}", entries[0]),
                );
                XType::Any
            }
        };
    }

    let scalars: Option<Vec<Scalar>> = entries.iter().map(Scalar::from_value).collect();
    if let Some(scalars) = scalars {
        if scalars.len() > 1 {
            return XType::LiteralSet(scalars);
        }
        return XType::Or(Vec::new());
    }

    // Mixed enum (e.g. containing null): fall back to a plain union.
    let mut members = Vec::new();
    for entry in entries {
        match Scalar::from_value(entry) {
            Some(scalar) => members.push(XType::Literal(scalar)),
            None if entry.is_null() => members.push(XType::Null),
            None => ctx.warn(
                "unknown-shape",
                path,
                format!("non-scalar enum value: {entry}"),
            ),
        }
    }
    XType::or(members)
}

fn translate_ref(
    target: &str,
    ctx: &mut Context,
    from: &str,
    path: &str,
) -> Result<XType, TranslateError> {
    if target.starts_with(SCHEMAS_SECTION) {
        let omit = omission_set(target, ctx, from);
        return Ok(XType::Ref {
            target: target.replacen(SCHEMAS_SECTION, XTYPES_SECTION, 1),
            omit,
        });
    }
    if target.starts_with(XTYPES_SECTION) {
        // Already an x-type reference; idempotent.
        return Ok(XType::reference(target));
    }
    match ctx.resolve(target, from) {
        // References outside the canonical namespaces are transparent.
        Some(resolved) => translate_at(&resolved.node, ctx, &resolved.source, path),
        None => {
            ctx.error(
                "unresolved-ref",
                path,
                format!("cannot resolve $ref: {target}"),
            );
            Ok(XType::reference(target))
        }
    }
}

/// Property names of the reference target whose effective visibility
/// disqualifies them in the current mode: `readOnly` properties for
/// requests, `writeOnly` for responses. An empty result is represented
/// as omission-absent.
fn omission_set(target: &str, ctx: &Context, from: &str) -> Option<Vec<String>> {
    let mode = ctx.mode?;
    let resolved = ctx.resolve(target, from)?;
    let properties = resolved.node.get("properties")?.as_object()?;

    let mut omit = Vec::new();
    for (name, property) in properties {
        let effective = flatten_visibility(property, ctx, &resolved.source, 0);
        if effective.get(mode.omission_key()).and_then(Value::as_bool) == Some(true) {
            omit.push(name.clone());
        }
    }
    if omit.is_empty() {
        None
    } else {
        Some(omit)
    }
}

/// Follow references and flatten `allOf` members so visibility
/// annotations declared indirectly still count.
fn flatten_visibility(property: &Value, ctx: &Context, from: &str, depth: usize) -> Value {
    if depth >= MAX_VISIBILITY_DEPTH {
        return property.clone();
    }
    if let Some(target) = property.get("$ref").and_then(Value::as_str) {
        if let Some(resolved) = ctx.resolve(target, from) {
            return flatten_visibility(&resolved.node, ctx, &resolved.source, depth + 1);
        }
        return property.clone();
    }
    if let Some(members) = property.get("allOf").and_then(Value::as_array) {
        let mut flattened = Map::new();
        for member in members {
            let member = flatten_visibility(member, ctx, from, depth + 1);
            if let Some(object) = member.as_object() {
                for (key, value) in object {
                    flattened.insert(key.clone(), value.clone());
                }
            }
        }
        return Value::Object(flattened);
    }
    property.clone()
}

fn extract_object_like(
    map: &Map<String, Value>,
    ctx: &mut Context,
    from: &str,
    path: &str,
) -> Result<XType, TranslateError> {
    if let Some(items) = map.get("items") {
        if items.is_object() {
            let element = translate_at(items, ctx, from, &format!("{path}/items"))?;
            return Ok(XType::Array(Box::new(element)));
        }
    }

    let mut object = ObjectMap::default();
    let required = map.get("required").and_then(Value::as_array);

    if let Some(properties) = map.get("properties").and_then(Value::as_object) {
        for (name, property) in properties {
            let field_name = escape_field_name(name);
            let child_path = format!("{path}/properties/{name}");
            let mut translated = translate_at(property, ctx, from, &child_path)?;
            if let Some(required) = required {
                if !required.iter().any(|r| r.as_str() == Some(name.as_str())) {
                    translated = translated.optional();
                }
            }
            if let Some(text) = property.get("description").and_then(Value::as_str) {
                object.descriptions.insert(field_name.clone(), text.to_string());
            }
            object.fields.insert(field_name, translated);
        }
    }

    if let Some(additional) = map.get("additionalProperties") {
        if additional.is_object() {
            let record = translate_at(additional, ctx, from, &format!("{path}/additionalProperties"))?;
            object.record = Some(Box::new(record));
        }
    }

    if let Some(discriminator) = map.get("discriminator").and_then(Value::as_object) {
        let implicit = !map.contains_key("oneOf") && !map.contains_key("anyOf");
        if implicit {
            if let Some(mapping) = discriminator.get("mapping").and_then(Value::as_object) {
                return Ok(discriminated_union(mapping, discriminator, object, ctx, from, path)?);
            }
        }
        // Explicit discriminators ride along raw and are re-emitted by
        // the renderer.
        object.discriminator = Some(Value::Object(discriminator.clone()));
    }

    if object.is_empty() {
        return Err(TranslateError::EmptyObjectLike {
            path: path.to_string(),
        });
    }
    Ok(XType::Object(object))
}

/// Implicit discriminated union: a discriminator `mapping` riding on an
/// `allOf` (no sibling `oneOf`/`anyOf`). The union members are references
/// to the variants; the fields collected so far become the shared base.
fn discriminated_union(
    mapping: &Map<String, Value>,
    discriminator: &Map<String, Value>,
    base_fields: ObjectMap,
    ctx: &mut Context,
    from: &str,
    path: &str,
) -> Result<XType, TranslateError> {
    let property_name = discriminator
        .get("propertyName")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let mut members = Vec::with_capacity(mapping.len());
    let mut pairs = indexmap::IndexMap::new();
    for (value, target) in mapping {
        let Some(target) = target.as_str() else {
            ctx.warn(
                "unknown-shape",
                path,
                format!("discriminator mapping '{value}' is not a reference"),
            );
            continue;
        };
        members.push(translate_ref(target, ctx, from, path)?);
        pairs.insert(value.clone(), target.to_string());
    }

    Ok(XType::Discriminated(DiscriminatedUnion {
        members,
        property_name,
        mapping: pairs,
        base_fields,
        defining_name: ctx.key.clone(),
    }))
}
