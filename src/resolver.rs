//! Reference resolution and algebraic merging of x-types.
//!
//! [`resolve_and_merge`] is the central evaluator: it expands references
//! against the document sources (bounding circular expansion with the
//! context's depth budget), applies field omission, folds `$and`
//! compositions through the merge law, and flattens unions. Inputs are
//! never mutated — every result is a newly constructed tree, so the named
//! namespaces stay a stable source of truth across repeated resolutions
//! under different modes.

use crate::context::Context;
use crate::error::ResolveError;
use crate::types::{escape_field_name, ObjectMap, Scalar, XType};

/// Resolve references and merge compositions into a single concrete
/// x-type.
///
/// `from` names the document the tree was found in; pass `""` for the
/// root document.
///
/// # Errors
///
/// Returns [`ResolveError`] only for malformed trees the algebra's
/// invariants rule out: merging shapes no legal evaluation produces, or
/// an unconsumed discriminated-union annotation. Recoverable problems
/// (circular or unresolved references, merge conflicts) are reported as
/// diagnostics and resolved to `any`/`undefined` fallbacks.
pub fn resolve_and_merge(
    xtype: &XType,
    ctx: &mut Context,
    from: &str,
) -> Result<XType, ResolveError> {
    resolve_inner(xtype, ctx, from, &[])
}

fn resolve_inner(
    xtype: &XType,
    ctx: &mut Context,
    from: &str,
    parents: &[String],
) -> Result<XType, ResolveError> {
    match xtype {
        XType::Null => Ok(XType::Null),

        XType::Ref { target, omit } => {
            // Stop unrolling once the same pointer has been expanded
            // `depth` times along this ancestor chain.
            if parents.iter().filter(|p| *p == target).count() >= ctx.depth {
                ctx.warn(
                    "circular-ref",
                    "",
                    format!("circular reference detected: {target}"),
                );
                return Ok(XType::Any);
            }
            let Some(resolved) = ctx.resolve(target, from) else {
                ctx.error("unresolved-ref", "", format!("cannot resolve $ref: {target}"));
                return Ok(XType::Any);
            };
            let node = ctx.decode(&resolved.node);
            let mut chain = parents.to_vec();
            chain.push(target.clone());
            // Follow-up relative references resolve against the document
            // that owns the resolved node.
            let result = resolve_inner(&node, ctx, &resolved.source, &chain)?;
            match omit {
                None => Ok(result),
                Some(names) => Ok(omit_fields(result, names, ctx)),
            }
        }

        XType::And(members) => {
            let mut resolved = Vec::with_capacity(members.len());
            for member in members {
                resolved.push(resolve_inner(member, ctx, from, parents)?);
            }
            merge_all(resolved, ctx)
        }

        XType::Or(members) => {
            if members.is_empty() {
                return Ok(XType::Undefined);
            }
            if members.len() == 1 {
                return resolve_inner(&members[0], ctx, from, parents);
            }
            let mut flattened = Vec::new();
            for member in members {
                match resolve_inner(member, ctx, from, parents)? {
                    // OR distributes over nested ORs by flattening one
                    // level; no deduplication.
                    XType::Or(inner) => flattened.extend(inner),
                    XType::LiteralSet(scalars) => {
                        flattened.extend(scalars.into_iter().map(XType::Literal));
                    }
                    other => flattened.push(other),
                }
            }
            Ok(XType::Or(flattened))
        }

        XType::Object(object) => {
            let mut resolved = ObjectMap {
                descriptions: object.descriptions.clone(),
                discriminator: object.discriminator.clone(),
                ..ObjectMap::default()
            };
            for (name, field) in &object.fields {
                resolved
                    .fields
                    .insert(name.clone(), resolve_inner(field, ctx, from, parents)?);
            }
            if let Some(record) = &object.record {
                resolved.record = Some(Box::new(resolve_inner(record, ctx, from, parents)?));
            }
            Ok(XType::Object(resolved))
        }

        XType::Discriminated(union) => Err(ResolveError::UnconsumedUnion {
            name: union
                .defining_name
                .clone()
                .unwrap_or_else(|| "<anonymous>".to_string()),
        }),

        // Primitives, literals, any, undefined are fixed points.
        other => Ok(other.clone()),
    }
}

/// Apply a reference's omission set to its resolved result.
fn omit_fields(xtype: XType, names: &[String], ctx: &mut Context) -> XType {
    match xtype {
        XType::Object(mut object) => {
            for name in names {
                let escaped = escape_field_name(name);
                object.fields.shift_remove(&escaped);
                object.descriptions.shift_remove(&escaped);
            }
            XType::Object(object)
        }
        XType::Or(members) => XType::Or(
            members
                .into_iter()
                .map(|member| omit_fields(member, names, ctx))
                .collect(),
        ),
        // An array wrapper has no named fields to strip.
        array @ XType::Array(_) => array,
        other => {
            ctx.error(
                "omit-non-object",
                "",
                format!(
                    "cannot omit keys ({}) from non-object: {}",
                    names.join(", "),
                    other.describe()
                ),
            );
            other
        }
    }
}

/// Left fold of [`deep_merge_two`] over a composition's members.
pub fn merge_all(items: Vec<XType>, ctx: &mut Context) -> Result<XType, ResolveError> {
    let mut iter = items.into_iter();
    let Some(first) = iter.next() else {
        ctx.error("empty-merge", "", "cannot merge an empty composition");
        return Ok(XType::Undefined);
    };
    iter.try_fold(first, |acc, item| deep_merge_two(acc, item, ctx))
}

/// The deep-merge law of the algebra.
///
/// `any` is the identity element, `undefined` is absorbing, identical
/// operands merge to themselves, unions distribute element-wise, and a
/// concrete string literal narrows the generic `string` primitive.
/// Incompatible primitives and array-type merges are reported and resolve
/// to `undefined`.
///
/// # Errors
///
/// Returns [`ResolveError::UnmergeableShapes`] for combinations no legal
/// evaluation produces (e.g. two unions reaching this point).
pub fn deep_merge_two(
    first: XType,
    second: XType,
    ctx: &mut Context,
) -> Result<XType, ResolveError> {
    if first == XType::Any {
        return Ok(second);
    }
    if second == XType::Any {
        return Ok(first);
    }
    if first == second {
        return Ok(first);
    }
    if first == XType::Undefined || second == XType::Undefined {
        return Ok(XType::Undefined);
    }

    // A union merged against anything else distributes across its
    // branches: each alternative must also satisfy the other operand.
    let first_is_union = matches!(first, XType::Or(_) | XType::LiteralSet(_));
    let second_is_union = matches!(second, XType::Or(_) | XType::LiteralSet(_));
    if first_is_union && !second_is_union {
        let merged = union_members(first)
            .into_iter()
            .map(|member| deep_merge_two(member, second.clone(), ctx))
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(XType::Or(merged));
    }
    if second_is_union && !first_is_union {
        let merged = union_members(second)
            .into_iter()
            .map(|member| deep_merge_two(first.clone(), member, ctx))
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(XType::Or(merged));
    }

    if is_scalarish(&first) || is_scalarish(&second) {
        // "Any string, further constrained to this one": a concrete
        // string literal narrows the generic string primitive.
        if let (XType::Primitive(descriptor), XType::Literal(Scalar::Str(_))) = (&first, &second) {
            if descriptor.is_plain_string() {
                return Ok(second);
            }
        }
        if let (XType::Literal(Scalar::Str(_)), XType::Primitive(descriptor)) = (&first, &second) {
            if descriptor.is_plain_string() {
                return Ok(first);
            }
        }
        ctx.error(
            "merge-conflict",
            "",
            format!(
                "merging primitives is not allowed: {} & {}",
                first.describe(),
                second.describe()
            ),
        );
        return Ok(XType::Undefined);
    }

    if matches!(first, XType::Array(_)) || matches!(second, XType::Array(_)) {
        ctx.error("array-merge", "", "cannot merge array types");
        return Ok(XType::Undefined);
    }

    match (first, second) {
        // A composition operand re-flattens: fold the other operand into
        // its members instead of treating the composition as opaque.
        (XType::And(mut members), second) => {
            members.push(second);
            merge_all(members, ctx)
        }
        (first, XType::And(mut members)) => {
            members.push(first);
            merge_all(members, ctx)
        }
        (XType::Object(base), XType::Object(other)) => {
            Ok(XType::Object(merge_objects(base, other, ctx)?))
        }
        (first, second) => Err(ResolveError::UnmergeableShapes {
            left: first.describe(),
            right: second.describe(),
        }),
    }
}

fn union_members(xtype: XType) -> Vec<XType> {
    match xtype {
        XType::Or(members) => members,
        XType::LiteralSet(scalars) => scalars.into_iter().map(XType::Literal).collect(),
        other => vec![other],
    }
}

fn is_scalarish(xtype: &XType) -> bool {
    matches!(xtype, XType::Primitive(_) | XType::Literal(_) | XType::Null)
}

fn merge_objects(
    mut base: ObjectMap,
    other: ObjectMap,
    ctx: &mut Context,
) -> Result<ObjectMap, ResolveError> {
    for (name, field) in other.fields {
        match base.fields.get(&name).cloned() {
            None => {
                base.fields.insert(name, field);
            }
            Some(existing) => {
                let merged = deep_merge_two(existing, field, ctx)?;
                base.fields.insert(name, merged);
            }
        }
    }
    base.record = match (base.record, other.record) {
        (Some(a), Some(b)) => Some(Box::new(deep_merge_two(*a, *b, ctx)?)),
        (a, b) => a.or(b),
    };
    for (name, text) in other.descriptions {
        match base.descriptions.get(&name) {
            None => {
                base.descriptions.insert(name, text);
            }
            Some(existing) if *existing == text => {}
            Some(_) => {
                ctx.warn(
                    "description-conflict",
                    "",
                    format!("conflicting descriptions for '{name}'; keeping the first"),
                );
            }
        }
    }
    if base.discriminator.is_none() {
        base.discriminator = other.discriminator;
    }
    Ok(base)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Sources;
    use crate::types::{Base, Descriptor, Mode, ResolveOptions};
    use serde_json::json;

    fn empty_ctx(sources: &Sources) -> Context<'_> {
        Context::new(sources, &ResolveOptions::default())
    }

    fn decode(value: serde_json::Value) -> XType {
        let mut diags = Vec::new();
        XType::from_value(&value, &mut diags)
    }

    #[test]
    fn any_is_the_identity_element() {
        let sources = Sources::new();
        let mut ctx = empty_ctx(&sources);
        for value in [
            json!("string"),
            json!({"a": "number"}),
            json!(["string", "number"]),
            json!("undefined"),
        ] {
            let x = decode(value);
            let merged = merge_all(vec![x.clone(), XType::Any], &mut ctx).unwrap();
            assert_eq!(merged, x);
            let merged = merge_all(vec![XType::Any, x.clone()], &mut ctx).unwrap();
            assert_eq!(merged, x);
        }
        assert!(ctx.diagnostics.is_empty());
    }

    #[test]
    fn identical_operands_merge_to_themselves() {
        let sources = Sources::new();
        let mut ctx = empty_ctx(&sources);
        let x = decode(json!("string::email"));
        assert_eq!(deep_merge_two(x.clone(), x.clone(), &mut ctx).unwrap(), x);
    }

    #[test]
    fn undefined_is_absorbing() {
        let sources = Sources::new();
        let mut ctx = empty_ctx(&sources);
        let merged = deep_merge_two(decode(json!("string")), XType::Undefined, &mut ctx).unwrap();
        assert_eq!(merged, XType::Undefined);
    }

    #[test]
    fn incompatible_primitives_report_and_resolve_to_undefined() {
        let sources = Sources::new();
        let mut ctx = empty_ctx(&sources);
        let merged =
            deep_merge_two(decode(json!("string")), decode(json!("number")), &mut ctx).unwrap();
        assert_eq!(merged, XType::Undefined);
        assert_eq!(ctx.diagnostics.len(), 1);
        assert_eq!(ctx.diagnostics[0].code, "merge-conflict");
    }

    #[test]
    fn concrete_string_literal_narrows_generic_string() {
        let sources = Sources::new();
        let mut ctx = empty_ctx(&sources);
        let literal = decode(json!("active"));
        let merged = deep_merge_two(
            XType::Primitive(Descriptor::bare(Base::String)),
            literal.clone(),
            &mut ctx,
        )
        .unwrap();
        assert_eq!(merged, literal);
        let merged = deep_merge_two(
            literal.clone(),
            XType::Primitive(Descriptor::bare(Base::String)),
            &mut ctx,
        )
        .unwrap();
        assert_eq!(merged, literal);
        assert!(ctx.diagnostics.is_empty());

        // A constrained string primitive is not narrowed.
        let merged = deep_merge_two(decode(json!("string::email")), literal, &mut ctx).unwrap();
        assert_eq!(merged, XType::Undefined);
    }

    #[test]
    fn array_types_never_merge() {
        let sources = Sources::new();
        let mut ctx = empty_ctx(&sources);
        let merged = deep_merge_two(
            decode(json!({"$array": "string"})),
            decode(json!({"$array": "number"})),
            &mut ctx,
        )
        .unwrap();
        assert_eq!(merged, XType::Undefined);
        assert_eq!(ctx.diagnostics[0].code, "array-merge");
    }

    #[test]
    fn unions_distribute_across_the_other_operand() {
        let sources = Sources::new();
        let mut ctx = empty_ctx(&sources);
        let merged = deep_merge_two(
            decode(json!([{"a": "string"}, {"b": "number"}])),
            decode(json!({"c": "boolean"})),
            &mut ctx,
        )
        .unwrap();
        assert_eq!(
            merged.to_value(),
            json!([
                {"a": "string", "c": "boolean"},
                {"b": "number", "c": "boolean"}
            ])
        );
    }

    #[test]
    fn composition_operands_reflatten() {
        let sources = Sources::new();
        let mut ctx = empty_ctx(&sources);
        let merged = deep_merge_two(
            decode(json!({"$and": [{"a": "string"}, {"b": "number"}]})),
            decode(json!({"c": "boolean"})),
            &mut ctx,
        )
        .unwrap();
        assert_eq!(
            merged.to_value(),
            json!({"a": "string", "b": "number", "c": "boolean"})
        );
    }

    #[test]
    fn object_maps_merge_key_recursively() {
        let sources = Sources::new();
        let mut ctx = empty_ctx(&sources);
        let merged = merge_all(
            vec![
                decode(json!({"foo": "string"})),
                decode(json!({"bar": "number"})),
            ],
            &mut ctx,
        )
        .unwrap();
        assert_eq!(merged.to_value(), json!({"foo": "string", "bar": "number"}));
    }

    #[test]
    fn two_unions_are_a_fatal_merge() {
        let sources = Sources::new();
        let mut ctx = empty_ctx(&sources);
        let result = deep_merge_two(
            XType::Or(vec![decode(json!({"a": "string"})), XType::Null]),
            XType::Or(vec![decode(json!({"b": "string"})), XType::Null]),
            &mut ctx,
        );
        assert!(matches!(result, Err(ResolveError::UnmergeableShapes { .. })));
    }

    #[test]
    fn empty_merge_reports() {
        let sources = Sources::new();
        let mut ctx = empty_ctx(&sources);
        let merged = merge_all(Vec::new(), &mut ctx).unwrap();
        assert_eq!(merged, XType::Undefined);
        assert_eq!(ctx.diagnostics[0].code, "empty-merge");
    }

    fn node_document() -> Sources {
        Sources::single(json!({
            "components": {
                "x-types": {
                    "Node": {
                        "value": "string",
                        "next": {"$ref": "#/components/x-types/Node"}
                    }
                }
            }
        }))
    }

    #[test]
    fn and_composition_resolves_and_merges() {
        let sources = Sources::single(json!({
            "components": {"x-types": {
                "A": {"foo": "string"},
                "B": {"bar": "number"}
            }}
        }));
        let mut ctx = empty_ctx(&sources);
        let xtype = decode(json!({"$and": [
            {"$ref": "#/components/x-types/A"},
            {"$ref": "#/components/x-types/B"}
        ]}));
        let resolved = resolve_and_merge(&xtype, &mut ctx, "").unwrap();
        assert_eq!(resolved.to_value(), json!({"foo": "string", "bar": "number"}));
    }

    #[test]
    fn circular_references_bottom_out_at_the_depth_budget() {
        let sources = node_document();
        let mut ctx = empty_ctx(&sources);
        let xtype = decode(json!({"$ref": "#/components/x-types/Node"}));
        let resolved = resolve_and_merge(&xtype, &mut ctx, "").unwrap();
        assert_eq!(
            resolved.to_value(),
            json!({
                "value": "string",
                "next": {
                    "value": "string",
                    "next": {
                        "value": "string",
                        "next": "any"
                    }
                }
            })
        );
        assert!(ctx.diagnostics.iter().any(|d| d.code == "circular-ref"));
    }

    #[test]
    fn depth_budget_of_one_stops_immediately() {
        let sources = node_document();
        let mut ctx = Context::new(&sources, &ResolveOptions::default().depth(1));
        let xtype = decode(json!({"$ref": "#/components/x-types/Node"}));
        let resolved = resolve_and_merge(&xtype, &mut ctx, "").unwrap();
        assert_eq!(resolved.to_value(), json!({"value": "string", "next": "any"}));
    }

    #[test]
    fn unresolved_references_resolve_to_any() {
        let sources = Sources::new();
        let mut ctx = empty_ctx(&sources);
        let xtype = decode(json!({"$ref": "#/components/x-types/Gone"}));
        let resolved = resolve_and_merge(&xtype, &mut ctx, "").unwrap();
        assert_eq!(resolved, XType::Any);
        assert_eq!(ctx.diagnostics[0].code, "unresolved-ref");
    }

    #[test]
    fn omission_applies_after_resolution() {
        let sources = Sources::single(json!({
            "components": {"x-types": {
                "Pet": {"id": "string", "name": "string"}
            }}
        }));
        let mut ctx = empty_ctx(&sources);
        let xtype = decode(json!({
            "$ref": "#/components/x-types/Pet",
            "$omit": ["id"]
        }));
        let resolved = resolve_and_merge(&xtype, &mut ctx, "").unwrap();
        assert_eq!(resolved.to_value(), json!({"name": "string"}));
    }

    #[test]
    fn omission_on_a_primitive_reports_and_passes_through() {
        let sources = Sources::single(json!({
            "components": {"x-types": {"Id": "string"}}
        }));
        let mut ctx = empty_ctx(&sources);
        let xtype = decode(json!({
            "$ref": "#/components/x-types/Id",
            "$omit": ["id"]
        }));
        let resolved = resolve_and_merge(&xtype, &mut ctx, "").unwrap();
        assert_eq!(resolved.to_value(), json!("string"));
        assert_eq!(ctx.diagnostics[0].code, "omit-non-object");
    }

    #[test]
    fn empty_union_resolves_to_undefined() {
        let sources = Sources::new();
        let mut ctx = empty_ctx(&sources);
        let resolved = resolve_and_merge(&XType::Or(Vec::new()), &mut ctx, "").unwrap();
        assert_eq!(resolved, XType::Undefined);
    }

    #[test]
    fn union_flattening_keeps_duplicates() {
        let sources = Sources::single(json!({
            "components": {"x-types": {
                "AB": [{"a": "string"}, {"b": "string"}]
            }}
        }));
        let mut ctx = empty_ctx(&sources);
        let xtype = decode(json!([
            {"$ref": "#/components/x-types/AB"},
            [{"a": "string"}, {"c": "number"}]
        ]));
        let resolved = resolve_and_merge(&xtype, &mut ctx, "").unwrap();
        // One level of flattening, no deduplication.
        assert_eq!(
            resolved.to_value(),
            json!([
                {"a": "string"}, {"b": "string"},
                {"a": "string"}, {"c": "number"}
            ])
        );
    }

    #[test]
    fn modes_share_namespaces_with_independent_contexts() {
        let sources = Sources::single(json!({
            "components": {"x-types": {
                "Pet": {"id": "string", "secret": "string", "name": "string"}
            }}
        }));
        let request = decode(json!({"$ref": "#/components/x-types/Pet", "$omit": ["id"]}));
        let response = decode(json!({"$ref": "#/components/x-types/Pet", "$omit": ["secret"]}));

        let mut request_ctx = Context::new(&sources, &ResolveOptions::new(Mode::Request));
        let mut response_ctx = Context::new(&sources, &ResolveOptions::new(Mode::Response));
        let request_resolved = resolve_and_merge(&request, &mut request_ctx, "").unwrap();
        let response_resolved = resolve_and_merge(&response, &mut response_ctx, "").unwrap();

        assert_eq!(
            request_resolved.to_value(),
            json!({"secret": "string", "name": "string"})
        );
        assert_eq!(
            response_resolved.to_value(),
            json!({"id": "string", "name": "string"})
        );
    }
}
