//! Discriminator elevation.
//!
//! A named schema using an implicit discriminated union structurally
//! contains itself: each variant `allOf`-includes the base type, and the
//! base type's union points back at the variants. Elevation breaks that
//! cycle by registering a synthetic `Base_<name>` type holding the shared
//! fields, rewiring every variant's base reference to it, and injecting
//! the literal discriminator value into each variant. It runs once per
//! named schema definition, while the named namespaces are being built,
//! and is the only thing that mutates them after creation.

use serde_json::{json, Map, Value};

use crate::context::Context;
use crate::error::GenerateError;
use crate::generate::{cleanup_schema, render};
use crate::types::{escape_reserved, DiscriminatedUnion, XType, SCHEMAS_SECTION, XTYPES_SECTION};

/// Consume a discriminated union detected for the type being defined.
///
/// Registers `Base_<name>` in both namespaces, rewrites each mapped
/// variant (schema side always, x-type side when the variant has already
/// been translated), and returns the plain union that replaces the
/// discriminated one. Variants that are not `allOf`/`$and` compositions
/// referencing the defining type are left untouched.
///
/// # Errors
///
/// Returns [`GenerateError`] if the base fields cannot be rendered, which
/// the translator's invariants rule out for well-formed input.
pub fn elevate(
    union: &DiscriminatedUnion,
    schemas: &mut Map<String, Value>,
    xtypes: &mut Map<String, Value>,
    ctx: &mut Context,
) -> Result<XType, GenerateError> {
    let Some(key) = union.defining_name.as_deref() else {
        ctx.warn(
            "discriminator-context",
            "",
            "discriminated union outside a named definition; elevation skipped",
        );
        return Ok(XType::or(union.members.clone()));
    };
    let base_name = format!("Base_{key}");

    let base = XType::Object(union.base_fields.clone());
    xtypes.insert(base_name.clone(), base.to_value());
    schemas.insert(base_name.clone(), cleanup_schema(render(&base)?));

    for (value, target) in &union.mapping {
        let variant_name = target.rsplit('/').next().unwrap_or(target);
        if let Some(variant) = schemas.get_mut(variant_name) {
            rewrite_schema_variant(variant, key, &base_name, &union.property_name, value);
        }
        if let Some(variant) = xtypes.get_mut(variant_name) {
            rewrite_xtype_variant(variant, key, &base_name, &union.property_name, value);
        }
    }

    Ok(XType::or(union.members.clone()))
}

/// Rewire a variant's schema-side `allOf`: the member referencing the
/// defining type is pointed at the base, and a member asserting the
/// discriminator value is appended.
fn rewrite_schema_variant(
    variant: &mut Value,
    key: &str,
    base_name: &str,
    property: &str,
    value: &str,
) {
    let Some(members) = variant.get_mut("allOf").and_then(Value::as_array_mut) else {
        return;
    };
    let target = format!("{SCHEMAS_SECTION}{key}");
    let mut rewrote = false;
    for member in members.iter_mut() {
        if member.get("$ref").and_then(Value::as_str) == Some(target.as_str()) {
            member["$ref"] = json!(format!("{SCHEMAS_SECTION}{base_name}"));
            rewrote = true;
        }
    }
    if rewrote {
        members.push(json!({
            "type": "object",
            "properties": { property: { "type": "string", "const": value } },
            "required": [property]
        }));
    }
}

/// The same rewrite mirrored on the x-type side: `$and` member pointing
/// at `x-types/<key>` becomes `x-types/Base_<key>`, with a literal
/// discriminator field appended.
fn rewrite_xtype_variant(
    variant: &mut Value,
    key: &str,
    base_name: &str,
    property: &str,
    value: &str,
) {
    let Some(members) = variant.get_mut("$and").and_then(Value::as_array_mut) else {
        return;
    };
    let target = format!("{XTYPES_SECTION}{key}");
    let mut rewrote = false;
    for member in members.iter_mut() {
        if member.get("$ref").and_then(Value::as_str) == Some(target.as_str()) {
            member["$ref"] = json!(format!("{XTYPES_SECTION}{base_name}"));
            rewrote = true;
        }
    }
    if rewrote {
        members.push(json!({ property: escape_reserved(value) }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Sources;
    use crate::types::ResolveOptions;
    use indexmap::IndexMap;
    use serde_json::json;

    fn pet_union() -> DiscriminatedUnion {
        let mut base_fields = crate::types::ObjectMap::default();
        base_fields.fields.insert(
            "petType".to_string(),
            XType::Primitive(crate::types::Descriptor::bare(crate::types::Base::String)),
        );
        let mut mapping = IndexMap::new();
        mapping.insert("dog".to_string(), "#/components/schemas/Dog".to_string());
        DiscriminatedUnion {
            members: vec![XType::reference("#/components/x-types/Dog")],
            property_name: "petType".to_string(),
            mapping,
            base_fields,
            defining_name: Some("Pet".to_string()),
        }
    }

    #[test]
    fn elevation_registers_base_and_rewrites_variants() {
        let mut schemas = json!({
            "Dog": {
                "allOf": [
                    {"$ref": "#/components/schemas/Pet"},
                    {"type": "object", "properties": {"bark": {"type": "boolean"}}}
                ]
            }
        })
        .as_object()
        .unwrap()
        .clone();
        let mut xtypes = Map::new();

        let sources = Sources::new();
        let mut ctx = Context::new(&sources, &ResolveOptions::default());
        let result = elevate(&pet_union(), &mut schemas, &mut xtypes, &mut ctx).unwrap();

        // The defining entry becomes a plain union over the variants.
        assert_eq!(
            result,
            XType::reference("#/components/x-types/Dog")
        );

        // Base_Pet registered in both namespaces.
        assert_eq!(
            schemas["Base_Pet"],
            json!({
                "type": "object",
                "properties": {"petType": {"type": "string"}},
                "required": ["petType"]
            })
        );
        assert_eq!(xtypes["Base_Pet"], json!({"petType": "string"}));

        // Dog's base reference is rewired and the literal constraint
        // appended.
        assert_eq!(
            schemas["Dog"],
            json!({
                "allOf": [
                    {"$ref": "#/components/schemas/Base_Pet"},
                    {"type": "object", "properties": {"bark": {"type": "boolean"}}},
                    {
                        "type": "object",
                        "properties": {"petType": {"type": "string", "const": "dog"}},
                        "required": ["petType"]
                    }
                ]
            })
        );
    }

    #[test]
    fn xtype_side_is_mirrored_when_present() {
        let mut schemas = Map::new();
        let mut xtypes = json!({
            "Dog": {
                "$and": [
                    {"$ref": "#/components/x-types/Pet"},
                    {"bark": "boolean"}
                ]
            }
        })
        .as_object()
        .unwrap()
        .clone();

        let sources = Sources::new();
        let mut ctx = Context::new(&sources, &ResolveOptions::default());
        elevate(&pet_union(), &mut schemas, &mut xtypes, &mut ctx).unwrap();

        assert_eq!(
            xtypes["Dog"],
            json!({
                "$and": [
                    {"$ref": "#/components/x-types/Base_Pet"},
                    {"bark": "boolean"},
                    {"petType": "dog"}
                ]
            })
        );
    }

    #[test]
    fn non_composition_variants_are_left_untouched() {
        let mut schemas = json!({
            "Dog": {"type": "object", "properties": {"bark": {"type": "boolean"}}}
        })
        .as_object()
        .unwrap()
        .clone();
        let before = schemas["Dog"].clone();
        let mut xtypes = Map::new();

        let sources = Sources::new();
        let mut ctx = Context::new(&sources, &ResolveOptions::default());
        elevate(&pet_union(), &mut schemas, &mut xtypes, &mut ctx).unwrap();

        assert_eq!(schemas["Dog"], before);
    }

    #[test]
    fn reserved_discriminator_values_are_escaped_on_the_xtype_side() {
        let mut union = pet_union();
        union.mapping.clear();
        union
            .mapping
            .insert("string".to_string(), "#/components/schemas/Dog".to_string());

        let mut schemas = Map::new();
        let mut xtypes = json!({
            "Dog": {"$and": [{"$ref": "#/components/x-types/Pet"}]}
        })
        .as_object()
        .unwrap()
        .clone();

        let sources = Sources::new();
        let mut ctx = Context::new(&sources, &ResolveOptions::default());
        elevate(&union, &mut schemas, &mut xtypes, &mut ctx).unwrap();

        let members = xtypes["Dog"]["$and"].as_array().unwrap();
        assert_eq!(members.last().unwrap(), &json!({"petType": "$literal:string"}));
    }

    #[test]
    fn anonymous_unions_skip_elevation_with_a_warning() {
        let mut union = pet_union();
        union.defining_name = None;

        let mut schemas = Map::new();
        let mut xtypes = Map::new();
        let sources = Sources::new();
        let mut ctx = Context::new(&sources, &ResolveOptions::default());
        let result = elevate(&union, &mut schemas, &mut xtypes, &mut ctx).unwrap();

        assert_eq!(result, XType::reference("#/components/x-types/Dog"));
        assert!(schemas.is_empty());
        assert!(ctx
            .diagnostics
            .iter()
            .any(|d| d.code == "discriminator-context"));
    }
}
