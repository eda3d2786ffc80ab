//! Payload validation against generated schemas.

use serde_json::Value;

use crate::context::{Context, Sources};
use crate::error::{DocumentError, SchemaError, ValidateError};
use crate::generate::{cleanup_schema, render};
use crate::resolver::resolve_and_merge;
use crate::types::ResolveOptions;

/// Validate a payload against a named x-type of a document.
///
/// Resolves the named x-type for the given mode, renders it as a schema,
/// and validates the payload against the result.
///
/// # Errors
///
/// Returns `ValidateError::Document` if the named type is missing or its
/// tree is malformed, or `ValidateError::Invalid` if the payload doesn't
/// match the generated schema.
pub fn validate(
    document: &Value,
    type_name: &str,
    payload: &Value,
    options: &ResolveOptions,
) -> Result<(), ValidateError> {
    let Some(wire) = document
        .pointer("/components/x-types")
        .and_then(|types| types.get(type_name))
        .cloned()
    else {
        return Err(ValidateError::Document(DocumentError::UnknownType {
            name: type_name.to_string(),
        }));
    };

    let sources = Sources::single(document.clone());
    let mut ctx = Context::new(&sources, options);
    let xtype = ctx.decode(&wire);
    let resolved =
        resolve_and_merge(&xtype, &mut ctx, "").map_err(|e| ValidateError::Document(e.into()))?;
    let schema = cleanup_schema(render(&resolved).map_err(|e| ValidateError::Document(e.into()))?);

    validate_against_schema(&schema, payload)
}

/// Validate a payload against an already-generated schema.
///
/// Use this when you've already resolved and rendered the schema and want
/// to validate multiple payloads against it.
pub fn validate_against_schema(schema: &Value, payload: &Value) -> Result<(), ValidateError> {
    let validator =
        jsonschema::validator_for(schema).map_err(|e| ValidateError::InvalidSchema {
            message: e.to_string(),
        })?;

    let errors: Vec<SchemaError> = validator
        .iter_errors(payload)
        .map(|e| SchemaError {
            path: e.instance_path.to_string(),
            message: e.to_string(),
        })
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ValidateError::Invalid { errors })
    }
}
