//! XType→Schema rendering.
//!
//! The structural inverse of translation, applied to an already resolved
//! and merged x-type. The renderer is total over every tree the merge
//! engine can produce; the only fatal case is an internal
//! discriminated-union annotation that elevation should have consumed.
//!
//! `undefined` renders as `Value::Null`, the absence marker: no legal
//! schema keyword ever renders to JSON null, and [`cleanup_schema`]
//! sweeps the markers out before a tree is handed to the host.

use serde_json::{Map, Value};

use crate::error::GenerateError;
use crate::types::{
    unescape_field_name, Base, Descriptor, Modifier, ObjectMap, Scalar, XType, SCHEMAS_SECTION,
    XTYPES_SECTION,
};

/// Render a resolved x-type as a JSON-Schema fragment.
///
/// # Errors
///
/// Returns [`GenerateError::UnconsumedUnion`] if a discriminated-union
/// annotation survives to render time; elevation must consume them first.
pub fn render(xtype: &XType) -> Result<Value, GenerateError> {
    match xtype {
        XType::Any => Ok(Value::Object(Map::new())),
        XType::Undefined => Ok(Value::Null),
        XType::Null => Ok(simple_schema("type", Value::String("null".to_string()))),
        XType::Primitive(descriptor) => Ok(descriptor_schema(descriptor)),
        XType::Literal(scalar) => {
            let mut map = Map::new();
            map.insert(
                "type".to_string(),
                Value::String(scalar.type_name().to_string()),
            );
            map.insert("const".to_string(), scalar.to_json());
            Ok(Value::Object(map))
        }
        XType::LiteralSet(scalars) => Ok(enum_schema(scalars)),
        XType::Object(object) => object_schema(object),
        XType::Array(items) => {
            let mut map = Map::new();
            map.insert("type".to_string(), Value::String("array".to_string()));
            map.insert("items".to_string(), render(items)?);
            Ok(Value::Object(map))
        }
        XType::And(members) => {
            let rendered: Vec<Value> = members.iter().map(render).collect::<Result<_, _>>()?;
            Ok(simple_schema("allOf", Value::Array(rendered)))
        }
        XType::Or(members) => union_schema(members),
        XType::Ref { target, .. } => {
            // The omission set has no schema-side equivalent; by the time
            // an unresolved reference reaches the renderer, pointing back
            // at the named-schemas section is all that can be done.
            let target = if target.starts_with(XTYPES_SECTION) {
                target.replacen(XTYPES_SECTION, SCHEMAS_SECTION, 1)
            } else {
                target.clone()
            };
            Ok(simple_schema("$ref", Value::String(target)))
        }
        XType::Discriminated(union) => Err(GenerateError::UnconsumedUnion {
            name: union
                .defining_name
                .clone()
                .unwrap_or_else(|| "<anonymous>".to_string()),
        }),
    }
}

fn simple_schema(key: &str, value: Value) -> Value {
    let mut map = Map::new();
    map.insert(key.to_string(), value);
    Value::Object(map)
}

/// Reverse the descriptor modifier grammar into schema keywords.
fn descriptor_schema(descriptor: &Descriptor) -> Value {
    let mut map = Map::new();
    let mut modifiers = descriptor.modifiers.as_slice();
    let numeric = match descriptor.base {
        Base::Number => {
            // A leading format on a number base marks an integer origin.
            if let Some(Modifier::Format(format)) = modifiers.first() {
                map.insert("type".to_string(), Value::String("integer".to_string()));
                if format != "integer" {
                    map.insert("format".to_string(), Value::String(format.clone()));
                }
                modifiers = &modifiers[1..];
            } else {
                map.insert("type".to_string(), Value::String("number".to_string()));
            }
            true
        }
        Base::String => {
            map.insert("type".to_string(), Value::String("string".to_string()));
            false
        }
        Base::Boolean => {
            map.insert("type".to_string(), Value::String("boolean".to_string()));
            false
        }
    };

    for modifier in modifiers {
        match modifier {
            Modifier::Format(format) => {
                map.insert("format".to_string(), Value::String(format.clone()));
            }
            Modifier::Pattern(pattern) => {
                map.insert("pattern".to_string(), Value::String(pattern.clone()));
            }
            // min/max carry magnitude for numbers and length for strings.
            Modifier::Min(n) => {
                let keyword = if numeric { "minimum" } else { "minLength" };
                map.insert(keyword.to_string(), Value::Number(n.clone()));
            }
            Modifier::Max(n) => {
                let keyword = if numeric { "maximum" } else { "maxLength" };
                map.insert(keyword.to_string(), Value::Number(n.clone()));
            }
            Modifier::XMin(n) => {
                map.insert("exclusiveMinimum".to_string(), Value::Number(n.clone()));
            }
            Modifier::XMax(n) => {
                map.insert("exclusiveMaximum".to_string(), Value::Number(n.clone()));
            }
        }
    }
    Value::Object(map)
}

fn enum_schema(scalars: &[Scalar]) -> Value {
    let mut map = Map::new();
    let uniform = scalars
        .split_first()
        .filter(|(first, rest)| rest.iter().all(|s| s.type_name() == first.type_name()))
        .map(|(first, _)| first.type_name());
    if let Some(type_name) = uniform {
        map.insert("type".to_string(), Value::String(type_name.to_string()));
    }
    map.insert(
        "enum".to_string(),
        Value::Array(scalars.iter().map(Scalar::to_json).collect()),
    );
    Value::Object(map)
}

fn union_schema(members: &[XType]) -> Result<Value, GenerateError> {
    // `undefined` alternatives mark optionality; the schema form cannot
    // express absence, so they are dropped here. The object renderer has
    // already accounted for them in `required`.
    let present: Vec<&XType> = members
        .iter()
        .filter(|member| **member != XType::Undefined)
        .collect();
    if present.is_empty() {
        return Ok(Value::Null);
    }
    if present.len() == 1 {
        return render(present[0]);
    }

    let scalars: Option<Vec<Scalar>> = present
        .iter()
        .map(|member| match member {
            XType::Literal(scalar) => Some(scalar.clone()),
            _ => None,
        })
        .collect();
    if let Some(scalars) = scalars {
        return Ok(enum_schema(&scalars));
    }

    let rendered: Vec<Value> = present
        .into_iter()
        .map(render)
        .collect::<Result<_, _>>()?;
    Ok(simple_schema("oneOf", Value::Array(rendered)))
}

fn object_schema(object: &ObjectMap) -> Result<Value, GenerateError> {
    let mut properties = Map::new();
    let mut required = Vec::new();

    for (name, field) in &object.fields {
        let raw = unescape_field_name(name).to_string();
        let (field_type, optional) = split_optional(field);
        let mut rendered = render(&field_type)?;
        if !optional && !rendered.is_null() {
            required.push(Value::String(raw.clone()));
        }
        if let Some(text) = object.descriptions.get(name) {
            if let Some(schema) = rendered.as_object_mut() {
                schema.insert("description".to_string(), Value::String(text.clone()));
            }
        }
        properties.insert(raw, rendered);
    }

    let mut map = Map::new();
    map.insert("type".to_string(), Value::String("object".to_string()));
    if !properties.is_empty() {
        map.insert("properties".to_string(), Value::Object(properties));
    }
    if !required.is_empty() {
        map.insert("required".to_string(), Value::Array(required));
    }
    match &object.record {
        // An `any` record is the open default; leave the keyword out.
        None => {}
        Some(record) if **record == XType::Any => {}
        Some(record) if **record == XType::Undefined => {
            map.insert("additionalProperties".to_string(), Value::Bool(false));
        }
        Some(record) => {
            map.insert("additionalProperties".to_string(), render(record)?);
        }
    }
    if let Some(discriminator) = &object.discriminator {
        map.insert("discriminator".to_string(), discriminator.clone());
    }
    Ok(Value::Object(map))
}

/// Split an optionality wrapper off a field type: an `Or` whose members
/// include `undefined` marks the field optional.
fn split_optional(field: &XType) -> (XType, bool) {
    match field {
        XType::Or(members) if members.contains(&XType::Undefined) => {
            let remaining: Vec<XType> = members
                .iter()
                .filter(|member| **member != XType::Undefined)
                .cloned()
                .collect();
            (XType::or(remaining), true)
        }
        other => (other.clone(), false),
    }
}

/// Deep copy that drops every object key whose value is the absence
/// marker. The final step before a schema tree is handed to the host.
pub fn cleanup_schema(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(key, v)| (key, cleanup_schema(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(cleanup_schema).collect()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn decode(value: Value) -> XType {
        let mut diags = Vec::new();
        XType::from_value(&value, &mut diags)
    }

    fn rendered(value: Value) -> Value {
        render(&decode(value)).unwrap()
    }

    #[test]
    fn any_renders_as_the_empty_schema() {
        assert_eq!(rendered(json!("any")), json!({}));
    }

    #[test]
    fn null_renders_as_null_type() {
        assert_eq!(rendered(json!(null)), json!({"type": "null"}));
    }

    #[test]
    fn descriptors_reverse_the_modifier_grammar() {
        assert_eq!(rendered(json!("string")), json!({"type": "string"}));
        assert_eq!(
            rendered(json!("string::email::min(5)")),
            json!({"type": "string", "format": "email", "minLength": 5})
        );
        assert_eq!(
            rendered(json!("number::min(0)::x-max(100)")),
            json!({"type": "number", "minimum": 0, "exclusiveMaximum": 100})
        );
        assert_eq!(rendered(json!("number::integer")), json!({"type": "integer"}));
        assert_eq!(
            rendered(json!("number::int64")),
            json!({"type": "integer", "format": "int64"})
        );
        assert_eq!(
            rendered(json!("string::pattern(^a+$)")),
            json!({"type": "string", "pattern": "^a+$"})
        );
    }

    #[test]
    fn literals_render_as_const() {
        assert_eq!(
            rendered(json!("active")),
            json!({"type": "string", "const": "active"})
        );
        assert_eq!(
            rendered(json!(12)),
            json!({"type": "number", "const": 12})
        );
        // Reserved-word unescaping.
        assert_eq!(
            rendered(json!("$literal:string")),
            json!({"type": "string", "const": "string"})
        );
    }

    #[test]
    fn literal_sets_render_as_enums() {
        assert_eq!(
            rendered(json!(["$literal:string", "foo", "$literal:number"])),
            json!({"type": "string", "enum": ["string", "foo", "number"]})
        );
        // Mixed scalar types leave the type keyword out.
        assert_eq!(
            rendered(json!(["a", 1])),
            json!({"enum": ["a", 1]})
        );
    }

    #[test]
    fn objects_compute_required_as_the_optionality_complement() {
        let schema = rendered(json!({
            "id": "string",
            "name": ["string", "undefined"]
        }));
        assert_eq!(
            schema,
            json!({
                "type": "object",
                "properties": {
                    "id": {"type": "string"},
                    "name": {"type": "string"}
                },
                "required": ["id"]
            })
        );
    }

    #[test]
    fn descriptions_are_re_expanded_onto_properties() {
        let schema = rendered(json!({
            "id": "string",
            "$descriptions": {"id": "unique id"}
        }));
        assert_eq!(
            schema["properties"]["id"],
            json!({"type": "string", "description": "unique id"})
        );
    }

    #[test]
    fn records_become_additional_properties() {
        assert_eq!(rendered(json!({"$record": "any"})), json!({"type": "object"}));
        assert_eq!(
            rendered(json!({"$record": "undefined"})),
            json!({"type": "object", "additionalProperties": false})
        );
        assert_eq!(
            rendered(json!({"$record": "number"})),
            json!({"type": "object", "additionalProperties": {"type": "number"}})
        );
    }

    #[test]
    fn field_names_are_unescaped() {
        let schema = rendered(json!({"$literal:$ref": "string"}));
        assert_eq!(
            schema["properties"],
            json!({"$ref": {"type": "string"}})
        );
    }

    #[test]
    fn arrays_render_items() {
        assert_eq!(
            rendered(json!({"$array": "string"})),
            json!({"type": "array", "items": {"type": "string"}})
        );
    }

    #[test]
    fn compositions_render_as_all_of_and_one_of() {
        assert_eq!(
            rendered(json!({"$and": [{"a": "string"}, {"b": "number"}]})),
            json!({"allOf": [
                {"type": "object", "properties": {"a": {"type": "string"}}, "required": ["a"]},
                {"type": "object", "properties": {"b": {"type": "number"}}, "required": ["b"]}
            ]})
        );
        assert_eq!(
            rendered(json!([{"a": "string"}, "number"])),
            json!({"oneOf": [
                {"type": "object", "properties": {"a": {"type": "string"}}, "required": ["a"]},
                {"type": "number"}
            ]})
        );
    }

    #[test]
    fn discriminator_metadata_is_re_emitted() {
        let schema = rendered(json!({
            "petType": "string",
            "$discriminator": {"propertyName": "petType"}
        }));
        assert_eq!(schema["discriminator"], json!({"propertyName": "petType"}));
    }

    #[test]
    fn xtype_refs_point_back_at_the_schemas_section() {
        assert_eq!(
            rendered(json!({"$ref": "#/components/x-types/Pet"})),
            json!({"$ref": "#/components/schemas/Pet"})
        );
    }

    #[test]
    fn unconsumed_union_is_fatal() {
        use crate::types::{DiscriminatedUnion, ObjectMap};
        let union = XType::Discriminated(DiscriminatedUnion {
            members: Vec::new(),
            property_name: "kind".to_string(),
            mapping: indexmap::IndexMap::new(),
            base_fields: ObjectMap::default(),
            defining_name: Some("Pet".to_string()),
        });
        assert!(matches!(
            render(&union),
            Err(GenerateError::UnconsumedUnion { .. })
        ));
    }

    #[test]
    fn cleanup_drops_absence_markers() {
        let cleaned = cleanup_schema(json!({
            "type": "object",
            "properties": {"gone": null, "kept": {"type": "string"}},
            "nested": {"also_gone": null}
        }));
        assert_eq!(
            cleaned,
            json!({
                "type": "object",
                "properties": {"kept": {"type": "string"}},
                "nested": {}
            })
        );
    }

    #[test]
    fn undefined_fields_vanish_after_cleanup() {
        let schema = cleanup_schema(rendered(json!({
            "ok": "string",
            "conflict": "undefined"
        })));
        assert_eq!(
            schema,
            json!({
                "type": "object",
                "properties": {"ok": {"type": "string"}},
                "required": ["ok"]
            })
        );
    }
}
