//! x-types CLI
//!
//! Command-line interface for translating between JSON Schema and the
//! x-types type algebra in API description documents.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde_json::Value;
use xtypes::{
    cleanup_schema, generate_named_schemas, generate_named_xtypes, generate_schemas,
    generate_xtypes, load_document, render, resolve_and_merge, save_document, validate, Context,
    Diagnostic, DocumentError, Mode, ResolveOptions, Sources,
};

#[derive(Parser)]
#[command(name = "xtypes")]
#[command(about = "Translate between JSON Schema and the x-types type algebra")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Translate the document's schemas into x-types (named components,
    /// media types, parameters)
    GenerateXtypes {
        /// Document file to transform
        document: PathBuf,

        /// Circular-reference depth budget (default 3)
        #[arg(long)]
        depth: Option<usize>,

        /// Output file (stdout if not specified)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Generate JSON Schemas from the document's x-types
    GenerateSchemas {
        /// Document file to transform
        document: PathBuf,

        /// Circular-reference depth budget (default 3)
        #[arg(long)]
        depth: Option<usize>,

        /// Output file (stdout if not specified)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Resolve one named x-type into a single concrete JSON Schema
    Resolve {
        /// Document file holding the x-type
        document: PathBuf,

        /// Name of the entry in components/x-types
        name: String,

        /// Resolve for request mode (omit readOnly fields)
        #[arg(long, conflicts_with = "response")]
        request: bool,

        /// Resolve for response mode (omit writeOnly fields)
        #[arg(long, conflicts_with = "request")]
        response: bool,

        /// Circular-reference depth budget (default 3)
        #[arg(long)]
        depth: Option<usize>,

        /// Output file (stdout if not specified)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Validate a payload against a named x-type
    Validate {
        /// Document file holding the x-type
        document: PathBuf,

        /// Name of the entry in components/x-types
        name: String,

        /// Payload file to validate
        payload: PathBuf,

        /// Validate as a request (omit readOnly fields)
        #[arg(long, conflicts_with = "response")]
        request: bool,

        /// Validate as a response (omit writeOnly fields)
        #[arg(long, conflicts_with = "request")]
        response: bool,

        /// Circular-reference depth budget (default 3)
        #[arg(long)]
        depth: Option<usize>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::GenerateXtypes {
            document,
            depth,
            output,
            pretty,
        } => run_generate(&document, depth, output, pretty, false),

        Commands::GenerateSchemas {
            document,
            depth,
            output,
            pretty,
        } => run_generate(&document, depth, output, pretty, true),

        Commands::Resolve {
            document,
            name,
            request,
            response,
            depth,
            output,
            pretty,
        } => run_resolve(&document, &name, build_options(request, response, depth), output, pretty),

        Commands::Validate {
            document,
            name,
            payload,
            request,
            response,
            depth,
        } => run_validate(&document, &name, &payload, build_options(request, response, depth)),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => ExitCode::from(code),
    }
}

fn build_options(request: bool, response: bool, depth: Option<usize>) -> ResolveOptions {
    let mut options = ResolveOptions::default();
    if request {
        options.mode = Some(Mode::Request);
    }
    if response {
        options.mode = Some(Mode::Response);
    }
    if let Some(depth) = depth {
        options = options.depth(depth);
    }
    options
}

fn report_diagnostics(diagnostics: &[Diagnostic]) {
    for diagnostic in diagnostics {
        eprintln!("{diagnostic}");
    }
}

fn load(path: &PathBuf) -> Result<Value, u8> {
    load_document(path).map_err(|e| {
        eprintln!("Error: {e}");
        e.exit_code() as u8
    })
}

fn run_generate(
    path: &PathBuf,
    depth: Option<usize>,
    output: Option<PathBuf>,
    pretty: bool,
    to_schemas: bool,
) -> Result<(), u8> {
    let mut document = load(path)?;
    let options = build_options(false, false, depth);

    let mut diagnostics = Vec::new();
    let passes: [fn(&mut Value, &ResolveOptions) -> Result<Vec<Diagnostic>, DocumentError>; 2] =
        if to_schemas {
            [generate_named_schemas, generate_schemas]
        } else {
            [generate_named_xtypes, generate_xtypes]
        };
    for pass in passes {
        let mut reported = pass(&mut document, &options).map_err(|e| {
            eprintln!("Error: {e}");
            e.exit_code() as u8
        })?;
        diagnostics.append(&mut reported);
    }
    report_diagnostics(&diagnostics);

    emit(&document, output, pretty)
}

fn run_resolve(
    path: &PathBuf,
    name: &str,
    options: ResolveOptions,
    output: Option<PathBuf>,
    pretty: bool,
) -> Result<(), u8> {
    let document = load(path)?;

    let Some(wire) = document
        .pointer("/components/x-types")
        .and_then(|types| types.get(name))
        .cloned()
    else {
        let err = DocumentError::UnknownType {
            name: name.to_string(),
        };
        eprintln!("Error: {err}");
        return Err(err.exit_code() as u8);
    };

    let sources = Sources::single(document);
    let mut ctx = Context::new(&sources, &options);
    let xtype = ctx.decode(&wire);
    let resolved = resolve_and_merge(&xtype, &mut ctx, "").map_err(|e| {
        eprintln!("Error: {e}");
        2u8
    })?;
    report_diagnostics(&ctx.diagnostics);

    let schema = cleanup_schema(render(&resolved).map_err(|e| {
        eprintln!("Error: {e}");
        2u8
    })?);

    emit(&schema, output, pretty)
}

fn run_validate(
    path: &PathBuf,
    name: &str,
    payload_path: &PathBuf,
    options: ResolveOptions,
) -> Result<(), u8> {
    let document = load(path)?;
    let payload = load(payload_path)?;

    match validate(&document, name, &payload, &options) {
        Ok(()) => {
            println!("valid");
            Ok(())
        }
        Err(xtypes::ValidateError::Invalid { errors }) => {
            for error in &errors {
                eprintln!("{error}");
            }
            eprintln!("invalid: {} error(s)", errors.len());
            Err(1)
        }
        Err(e) => {
            eprintln!("Error: {e}");
            Err(e.exit_code() as u8)
        }
    }
}

fn emit(value: &Value, output: Option<PathBuf>, pretty: bool) -> Result<(), u8> {
    match output {
        Some(path) => save_document(&path, value, pretty).map_err(|e| {
            eprintln!("Error: {e}");
            e.exit_code() as u8
        }),
        None => {
            let rendered = if pretty {
                serde_json::to_string_pretty(value)
            } else {
                serde_json::to_string(value)
            }
            .map_err(|e| {
                eprintln!("Error serializing output: {e}");
                2u8
            })?;
            println!("{rendered}");
            Ok(())
        }
    }
}
