//! Resolution context and document sources.
//!
//! Reference resolution is a synchronous capability supplied by the host:
//! the core never performs I/O. [`Sources`] is the in-memory
//! implementation used by the document passes and the CLI; anything that
//! can navigate a JSON Pointer can stand in for it through
//! [`DocumentResolver`].
//!
//! The document a reference was found *in* is threaded through every
//! recursive call as an explicit `from` argument, so sibling resolutions
//! can never observe each other's traversal state and concurrent passes
//! over the same namespaces are safe by construction.

use indexmap::IndexMap;
use serde_json::Value;

use crate::error::{Diagnostic, Severity};
use crate::types::{Mode, ResolveOptions, XType};

/// A successfully resolved reference: the target node plus the name of
/// the document that owns it, needed to resolve further relative
/// references found inside the target.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub node: Value,
    pub source: String,
}

/// Capability to resolve reference pointers against a set of source
/// documents.
pub trait DocumentResolver {
    /// Resolve `reference` — either `#/pointer`, relative to the document
    /// named by `from`, or `name#/pointer` into a sibling document.
    /// Returns `None` when the target does not exist.
    fn resolve(&self, reference: &str, from: &str) -> Option<Resolved>;
}

/// In-memory source documents, keyed by name.
///
/// The root document is stored under the empty name, so plain `#/...`
/// references resolve against it until traversal crosses into a named
/// sibling document.
#[derive(Debug, Default)]
pub struct Sources {
    documents: IndexMap<String, Value>,
}

impl Sources {
    pub fn new() -> Self {
        Self::default()
    }

    /// A source set holding a single root document.
    pub fn single(root: Value) -> Self {
        let mut sources = Self::new();
        sources.documents.insert(String::new(), root);
        sources
    }

    /// Add a named sibling document.
    pub fn insert(&mut self, name: impl Into<String>, document: Value) {
        self.documents.insert(name.into(), document);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.documents.get(name)
    }
}

impl DocumentResolver for Sources {
    fn resolve(&self, reference: &str, from: &str) -> Option<Resolved> {
        let (name, fragment) = match reference.split_once('#') {
            Some((doc, fragment)) => {
                let name = if doc.is_empty() { from } else { doc };
                (name, fragment)
            }
            // A bare document name references the whole document.
            None => (reference, ""),
        };
        let document = self.documents.get(name)?;
        let node = document.pointer(fragment)?;
        Some(Resolved {
            node: node.clone(),
            source: name.to_string(),
        })
    }
}

/// Process-local state for one translation or resolution invocation.
///
/// Holds the resolve capability, the mode tag, the circular-depth budget,
/// the name of the component currently being defined, and the diagnostics
/// sink. Independent invocations must use independent contexts.
pub struct Context<'a> {
    resolver: &'a dyn DocumentResolver,
    pub mode: Option<Mode>,
    pub depth: usize,
    /// Name of the named component currently being defined, seed for
    /// discriminator-elevation bookkeeping.
    pub key: Option<String>,
    pub diagnostics: Vec<Diagnostic>,
}

impl<'a> Context<'a> {
    pub fn new(resolver: &'a dyn DocumentResolver, options: &ResolveOptions) -> Self {
        Self {
            resolver,
            mode: options.mode,
            depth: options.depth.max(1),
            key: None,
            diagnostics: Vec::new(),
        }
    }

    /// Set the name of the component being defined.
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn resolve(&self, reference: &str, from: &str) -> Option<Resolved> {
        self.resolver.resolve(reference, from)
    }

    /// Decode a wire-form value, reporting into this context's sink.
    pub fn decode(&mut self, value: &Value) -> XType {
        XType::from_value(value, &mut self.diagnostics)
    }

    pub fn warn(
        &mut self,
        code: impl Into<String>,
        path: impl Into<String>,
        message: impl Into<String>,
    ) {
        self.diagnostics
            .push(Diagnostic::new(Severity::Warning, code, path, message));
    }

    pub fn error(
        &mut self,
        code: impl Into<String>,
        path: impl Into<String>,
        message: impl Into<String>,
    ) {
        self.diagnostics
            .push(Diagnostic::new(Severity::Error, code, path, message));
    }
}
