//! Document passes.
//!
//! An explicit dispatch driver over the fields of an API description
//! document, standing in for a host visitor framework: each pass walks
//! the nodes it cares about (component maps, request/response media
//! types, parameters) and applies one direction of the translation
//! pipeline. The passes read and write `components/x-types`,
//! `components/schemas`, and the `x-type`/`schema` fields of media-type
//! and parameter nodes — nothing else in the document is touched.

use serde_json::{Map, Value};

use crate::context::{Context, Sources};
use crate::elevate::elevate;
use crate::error::{Diagnostic, DocumentError};
use crate::generate::{cleanup_schema, render};
use crate::resolver::resolve_and_merge;
use crate::translate::translate;
use crate::types::{Mode, ResolveOptions, XType};

const OPERATION_KEYS: &[&str] = &[
    "get", "put", "post", "delete", "options", "head", "patch", "trace",
];

/// Translate every named schema into `components/x-types`.
///
/// Runs discriminator elevation when a named schema is flagged as an
/// implicit discriminated union; elevation may add synthetic `Base_<name>`
/// entries to both namespaces and rewrite variant definitions, so each
/// entry is translated against the namespaces as they stand at that
/// point.
///
/// # Errors
///
/// Returns [`DocumentError`] when a named schema is malformed beyond the
/// translator's recoverable rules.
pub fn generate_named_xtypes(
    document: &mut Value,
    options: &ResolveOptions,
) -> Result<Vec<Diagnostic>, DocumentError> {
    let mut diagnostics = Vec::new();

    let Some(components) = document.get("components").and_then(Value::as_object) else {
        return Ok(diagnostics);
    };
    let mut schemas: Map<String, Value> = components
        .get("schemas")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();
    let mut xtypes: Map<String, Value> = Map::new();
    let names: Vec<String> = schemas.keys().cloned().collect();

    for name in names {
        let Some(schema) = schemas.get(&name).cloned() else {
            continue;
        };
        // Elevation may have rewritten entries translated later in this
        // pass, so resolution sees the namespaces as they currently are.
        let mut snapshot = document.clone();
        snapshot["components"]["schemas"] = Value::Object(schemas.clone());
        let sources = Sources::single(snapshot);
        let mut ctx = Context::new(&sources, options).with_key(name.as_str());

        let xtype = translate(&schema, &mut ctx, "")?;
        let wire = match xtype {
            XType::Discriminated(union) => {
                elevate(&union, &mut schemas, &mut xtypes, &mut ctx)?.to_value()
            }
            other => other.to_value(),
        };
        xtypes.insert(name, wire);
        diagnostics.append(&mut ctx.diagnostics);
    }

    let components = document["components"]
        .as_object_mut()
        .expect("components checked above");
    if !schemas.is_empty() {
        components.insert("schemas".to_string(), Value::Object(schemas));
    }
    components.insert("x-types".to_string(), Value::Object(xtypes));
    Ok(diagnostics)
}

/// Resolve every named x-type and merge the generated schemas into
/// `components/schemas`.
///
/// # Errors
///
/// Returns [`DocumentError`] for malformed x-type trees (unmergeable
/// shapes, unconsumed union annotations).
pub fn generate_named_schemas(
    document: &mut Value,
    options: &ResolveOptions,
) -> Result<Vec<Diagnostic>, DocumentError> {
    let mut diagnostics = Vec::new();

    let Some(xtypes) = document
        .pointer("/components/x-types")
        .and_then(Value::as_object)
        .cloned()
    else {
        return Ok(diagnostics);
    };

    let sources = Sources::single(document.clone());
    let mut generated = Map::new();
    for (name, wire) in &xtypes {
        let mut ctx = Context::new(&sources, options).with_key(name.as_str());
        let xtype = ctx.decode(wire);
        let resolved = resolve_and_merge(&xtype, &mut ctx, "")?;
        let schema = cleanup_schema(render(&resolved)?);
        if !schema.is_null() {
            generated.insert(name.clone(), schema);
        }
        diagnostics.append(&mut ctx.diagnostics);
    }

    let components = document["components"]
        .as_object_mut()
        .expect("x-types live under components");
    let schemas = components
        .entry("schemas".to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    if let Some(schemas) = schemas.as_object_mut() {
        for (name, schema) in generated {
            schemas.insert(name, schema);
        }
    }
    Ok(diagnostics)
}

/// Resolve the `x-type` of every media type and parameter into its
/// `schema` counterpart: request bodies and parameters in request mode,
/// responses in response mode.
///
/// # Errors
///
/// Returns [`DocumentError`] for malformed x-type trees.
pub fn generate_schemas(
    document: &mut Value,
    options: &ResolveOptions,
) -> Result<Vec<Diagnostic>, DocumentError> {
    let sources = Sources::single(document.clone());
    let mut diagnostics = Vec::new();

    let mut apply = |node: &mut Map<String, Value>, mode: Mode| -> Result<(), DocumentError> {
        let Some(wire) = node.get("x-type").cloned() else {
            return Ok(());
        };
        let pass_options = ResolveOptions {
            mode: Some(mode),
            depth: options.depth,
        };
        let mut ctx = Context::new(&sources, &pass_options);
        let xtype = ctx.decode(&wire);
        let resolved = resolve_and_merge(&xtype, &mut ctx, "")?;
        let schema = cleanup_schema(render(&resolved)?);
        if schema.is_null() {
            node.remove("schema");
        } else {
            node.insert("schema".to_string(), schema);
        }
        diagnostics.append(&mut ctx.diagnostics);
        Ok(())
    };

    for_each_media_type(document, &mut apply)?;
    for_each_parameter(document, &mut |parameter| apply(parameter, Mode::Request))?;
    Ok(diagnostics)
}

/// The inverse of [`generate_schemas`]: translate each `schema` into an
/// `x-type` and delete the schema.
///
/// # Errors
///
/// Returns [`DocumentError`] when a schema is malformed beyond the
/// translator's recoverable rules.
pub fn generate_xtypes(
    document: &mut Value,
    options: &ResolveOptions,
) -> Result<Vec<Diagnostic>, DocumentError> {
    let sources = Sources::single(document.clone());
    let mut diagnostics = Vec::new();

    let mut apply = |node: &mut Map<String, Value>, mode: Mode| -> Result<(), DocumentError> {
        let Some(schema) = node.get("schema").cloned() else {
            return Ok(());
        };
        let pass_options = ResolveOptions {
            mode: Some(mode),
            depth: options.depth,
        };
        let mut ctx = Context::new(&sources, &pass_options);
        let xtype = translate(&schema, &mut ctx, "")?;
        node.insert("x-type".to_string(), xtype.to_value());
        node.remove("schema");
        diagnostics.append(&mut ctx.diagnostics);
        Ok(())
    };

    for_each_media_type(document, &mut apply)?;
    for_each_parameter(document, &mut |parameter| apply(parameter, Mode::Request))?;
    Ok(diagnostics)
}

/// Delete `components/x-types` and every `x-type` field.
pub fn remove_xtypes(document: &mut Value) {
    if let Some(components) = document.get_mut("components").and_then(Value::as_object_mut) {
        components.remove("x-types");
    }
    let _ = for_each_media_type(document, &mut |node, _| {
        node.remove("x-type");
        Ok(())
    });
    let _ = for_each_parameter(document, &mut |parameter| {
        parameter.remove("x-type");
        Ok(())
    });
}

/// Delete `components/schemas`.
pub fn remove_schemas(document: &mut Value) {
    if let Some(components) = document.get_mut("components").and_then(Value::as_object_mut) {
        components.remove("schemas");
    }
}

fn for_each_media_type(
    document: &mut Value,
    f: &mut impl FnMut(&mut Map<String, Value>, Mode) -> Result<(), DocumentError>,
) -> Result<(), DocumentError> {
    if let Some(paths) = document.get_mut("paths").and_then(Value::as_object_mut) {
        for path_item in paths.values_mut() {
            let Some(path_item) = path_item.as_object_mut() else {
                continue;
            };
            for key in OPERATION_KEYS {
                let Some(operation) = path_item.get_mut(*key).and_then(Value::as_object_mut)
                else {
                    continue;
                };
                if let Some(request_body) = operation.get_mut("requestBody") {
                    media_types_in(request_body, Mode::Request, f)?;
                }
                if let Some(responses) =
                    operation.get_mut("responses").and_then(Value::as_object_mut)
                {
                    for response in responses.values_mut() {
                        media_types_in(response, Mode::Response, f)?;
                    }
                }
            }
        }
    }
    if let Some(bodies) = document
        .pointer_mut("/components/requestBodies")
        .and_then(Value::as_object_mut)
    {
        for body in bodies.values_mut() {
            media_types_in(body, Mode::Request, f)?;
        }
    }
    if let Some(responses) = document
        .pointer_mut("/components/responses")
        .and_then(Value::as_object_mut)
    {
        for response in responses.values_mut() {
            media_types_in(response, Mode::Response, f)?;
        }
    }
    Ok(())
}

fn media_types_in(
    node: &mut Value,
    mode: Mode,
    f: &mut impl FnMut(&mut Map<String, Value>, Mode) -> Result<(), DocumentError>,
) -> Result<(), DocumentError> {
    let Some(content) = node.get_mut("content").and_then(Value::as_object_mut) else {
        return Ok(());
    };
    for media_type in content.values_mut() {
        if let Some(media_type) = media_type.as_object_mut() {
            f(media_type, mode)?;
        }
    }
    Ok(())
}

fn for_each_parameter(
    document: &mut Value,
    f: &mut impl FnMut(&mut Map<String, Value>) -> Result<(), DocumentError>,
) -> Result<(), DocumentError> {
    if let Some(paths) = document.get_mut("paths").and_then(Value::as_object_mut) {
        for path_item in paths.values_mut() {
            let Some(path_item) = path_item.as_object_mut() else {
                continue;
            };
            parameters_in(path_item, f)?;
            for key in OPERATION_KEYS {
                if let Some(operation) = path_item.get_mut(*key).and_then(Value::as_object_mut) {
                    parameters_in(operation, f)?;
                }
            }
        }
    }
    if let Some(parameters) = document
        .pointer_mut("/components/parameters")
        .and_then(Value::as_object_mut)
    {
        for parameter in parameters.values_mut() {
            if let Some(parameter) = parameter.as_object_mut() {
                f(parameter)?;
            }
        }
    }
    Ok(())
}

fn parameters_in(
    node: &mut Map<String, Value>,
    f: &mut impl FnMut(&mut Map<String, Value>) -> Result<(), DocumentError>,
) -> Result<(), DocumentError> {
    let Some(parameters) = node.get_mut("parameters").and_then(Value::as_array_mut) else {
        return Ok(());
    };
    for parameter in parameters {
        if let Some(parameter) = parameter.as_object_mut() {
            f(parameter)?;
        }
    }
    Ok(())
}
