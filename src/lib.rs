//! x-types Translator
//!
//! Bidirectional translation between JSON Schema and the x-types type
//! algebra used in API description documents.
//!
//! The x-type notation expresses a data shape compactly: primitives with
//! ordered constraint modifiers (`string::email::min(5)`), literal
//! values, object maps, arrays (`{"$array": T}`), intersections
//! (`{"$and": [...]}`), unions (bare sequences), and references into the
//! document's named-type namespace (`{"$ref": ..., "$omit": [...]}`).
//!
//! Four pieces share one data model and stay semantically consistent:
//!
//! | Piece | Entry point |
//! |-------|-------------|
//! | Schema→XType translation | [`translate`] |
//! | XType→Schema rendering | [`render`] (+ [`cleanup_schema`]) |
//! | Reference resolution & merging | [`resolve_and_merge`] |
//! | Discriminator elevation | [`elevate`] |
//!
//! Document-level passes ([`generate_named_xtypes`], [`generate_schemas`],
//! …) drive them over the fields of a loaded document, and
//! [`validate`] checks payloads against the generated schemas.
//!
//! # Example
//!
//! ```
//! use serde_json::json;
//! use xtypes::{generate_named_xtypes, ResolveOptions};
//!
//! let mut document = json!({
//!     "components": {
//!         "schemas": {
//!             "Pet": {
//!                 "type": "object",
//!                 "required": ["name"],
//!                 "properties": {
//!                     "name": { "type": "string" },
//!                     "tag": { "type": "string" }
//!                 }
//!             }
//!         }
//!     }
//! });
//!
//! generate_named_xtypes(&mut document, &ResolveOptions::default()).unwrap();
//!
//! assert_eq!(
//!     document["components"]["x-types"]["Pet"],
//!     json!({ "name": "string", "tag": ["string", "undefined"] })
//! );
//! ```
//!
//! # Modes
//!
//! Request/response [`Mode`] drives field omission when a reference into
//! the named-schemas section is translated:
//!
//! | Mode | Omitted properties |
//! |------|--------------------|
//! | `request` | `readOnly: true` |
//! | `response` | `writeOnly: true` |
//!
//! A property flagged neither is retained in both modes.
//!
//! # Failure model
//!
//! Recoverable problems (unresolved references, circular expansion past
//! the depth budget, merge conflicts) are reported as [`Diagnostic`]s and
//! resolved to safe fallbacks — a pass always produces output. Typed
//! errors are reserved for malformed trees the algebra's invariants rule
//! out for well-formed input.

mod context;
mod elevate;
mod error;
mod generate;
mod loader;
mod passes;
mod resolver;
mod translate;
mod types;
mod validator;

pub use context::{Context, DocumentResolver, Resolved, Sources};
pub use elevate::elevate;
pub use error::{
    Diagnostic, DocumentError, GenerateError, ResolveError, SchemaError, Severity, TranslateError,
    ValidateError,
};
pub use generate::{cleanup_schema, render};
pub use loader::{load_document, load_document_str, save_document};
pub use passes::{
    generate_named_schemas, generate_named_xtypes, generate_schemas, generate_xtypes,
    remove_schemas, remove_xtypes,
};
pub use resolver::{deep_merge_two, merge_all, resolve_and_merge};
pub use translate::translate;
pub use types::{
    escape_field_name, escape_reserved, is_array, is_empty_mapping, is_plain_object,
    is_primitive_scalar, json_type_name, unescape_field_name, unescape_reserved, Base, Descriptor,
    DiscriminatedUnion, Mode, Modifier, ObjectMap, ResolveOptions, Scalar, XType,
    DEFAULT_CIRCULAR_DEPTH, LITERAL_PREFIX, RESERVED_KEYWORDS, SCHEMAS_SECTION, XTYPES_SECTION,
};
pub use validator::{validate, validate_against_schema};
