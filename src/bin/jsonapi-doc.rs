//! JSON:API document CLI
//!
//! Command-line interface for inspecting type descriptions and for
//! validating and normalizing JSON:API payloads.

use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use jsonapi_doc::{
    load_payload, load_types_auto, marshal_document, unmarshal_document, validate_document,
    Cardinality, Document, ErrorObject, MarshalOptions, QueryParams, Registry, UnmarshalOptions,
    ValidateError,
};
use serde_json::{json, Value};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "jsonapi-doc")]
#[command(about = "Validate and normalize JSON:API documents")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the types of a type description file
    Types {
        /// Type descriptions: file path or URL (http:// or https://)
        source: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate a payload's structure, and its resources if types are given
    Validate {
        /// Payload file to validate
        payload: PathBuf,

        /// Type descriptions to decode resources against: file path or URL
        #[arg(long)]
        types: Option<String>,

        /// Reject members the types do not declare and duplicate included resources
        #[arg(long)]
        strict: bool,

        /// Output results as JSON (for automation)
        #[arg(long)]
        json: bool,
    },

    /// Decode a payload and marshal it again in canonical form
    Normalize {
        /// Payload file to normalize
        payload: PathBuf,

        /// Type descriptions: file path or URL (http:// or https://)
        #[arg(long)]
        types: String,

        /// Sparse fieldset, e.g. articles=title,author (repeatable)
        #[arg(long, value_parser = parse_fields)]
        fields: Vec<(String, Vec<String>)>,

        /// Embed relationship linkage, e.g. articles=author (repeatable)
        #[arg(long = "include-data", value_parser = parse_include_data)]
        include_data: Vec<(String, Vec<String>)>,

        /// Prefix for generated links
        #[arg(long, default_value = "")]
        base_url: String,

        /// Path emitted as the document's self link
        #[arg(long)]
        self_link: Option<String>,

        /// Reject members the types do not declare and duplicate included resources
        #[arg(long)]
        strict: bool,

        /// On failure, print an errors document instead of a message
        #[arg(long)]
        error_document: bool,

        /// Output file (stdout if not specified)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Types { source, json } => run_types(&source, json),

        Commands::Validate {
            payload,
            types,
            strict,
            json,
        } => run_validate(payload, types.as_deref(), strict, json),

        Commands::Normalize {
            payload,
            types,
            fields,
            include_data,
            base_url,
            self_link,
            strict,
            error_document,
            output,
            pretty,
        } => run_normalize(NormalizeArgs {
            payload,
            types,
            fields,
            include_data,
            base_url,
            self_link,
            strict,
            error_document,
            output,
            pretty,
        }),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => ExitCode::from(code),
    }
}

/// Parse `type=a,b` into the type and its fields.
fn parse_fields(s: &str) -> Result<(String, Vec<String>), String> {
    let (type_name, list) = s
        .split_once('=')
        .ok_or_else(|| format!("expected TYPE=FIELD[,FIELD...], got \"{}\"", s))?;
    if type_name.is_empty() {
        return Err(format!("missing type in \"{}\"", s));
    }
    let fields = list
        .split(',')
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .map(String::from)
        .collect();
    Ok((type_name.to_string(), fields))
}

/// Parse `type=rel[,rel]`; every relationship must be named.
fn parse_include_data(s: &str) -> Result<(String, Vec<String>), String> {
    let (type_name, rels) = parse_fields(s)?;
    if rels.is_empty() {
        return Err(format!("no relationship named in \"{}\"", s));
    }
    Ok((type_name, rels))
}

fn run_types(source: &str, json_output: bool) -> Result<(), u8> {
    let registry = load_types_auto(source).map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;

    if json_output {
        let types: Vec<Value> = registry
            .type_names()
            .into_iter()
            .filter_map(|name| registry.lookup(name))
            .map(|desc| {
                json!({
                    "name": desc.name(),
                    "id": desc.id_field(),
                    "attributes": desc.attrs().iter().map(|a| json!({
                        "name": a.name,
                        "kind": a.kind.name(),
                        "nullable": a.nullable,
                    })).collect::<Vec<_>>(),
                    "relationships": desc.rels().iter().map(|r| json!({
                        "name": r.name,
                        "type": r.target,
                        "cardinality": r.cardinality,
                        "inverse": r.inverse,
                    })).collect::<Vec<_>>(),
                })
            })
            .collect();
        println!("{}", Value::Array(types));
        return Ok(());
    }

    for name in registry.type_names() {
        let Some(desc) = registry.lookup(name) else {
            continue;
        };
        println!("{} (id: {})", desc.name(), desc.id_field());
        for attr in desc.attrs() {
            let nullable = if attr.nullable { ", nullable" } else { "" };
            println!("  attr {}: {}{}", attr.name, attr.kind, nullable);
        }
        for rel in desc.rels() {
            let cardinality = match rel.cardinality {
                Cardinality::One => "one",
                Cardinality::Many => "many",
            };
            println!("  rel {} -> {} ({})", rel.name, rel.target, cardinality);
        }
    }
    Ok(())
}

fn run_validate(
    payload_path: PathBuf,
    types: Option<&str>,
    strict: bool,
    json_output: bool,
) -> Result<(), u8> {
    let bytes = load_payload(&payload_path).map_err(|e| {
        report_error(json_output, &format!("loading payload: {}", e));
        e.exit_code() as u8
    })?;
    let payload: Value = serde_json::from_slice(&bytes).map_err(|e| {
        report_error(json_output, &format!("invalid JSON: {}", e));
        2u8
    })?;

    match validate_document(&payload) {
        Ok(()) => {}
        Err(ValidateError::Invalid { errors }) => {
            if json_output {
                let output = json!({
                    "valid": false,
                    "errors": errors
                });
                println!("{}", output);
            } else {
                eprintln!("Validation failed:");
                for error in errors {
                    eprintln!("  {}", error);
                }
            }
            return Err(1);
        }
        Err(e) => {
            report_error(json_output, &e.to_string());
            return Err(e.exit_code() as u8);
        }
    }

    if let Some(source) = types {
        let registry = load_types_auto(source).map_err(|e| {
            report_error(json_output, &format!("loading types: {}", e));
            e.exit_code() as u8
        })?;
        let options = UnmarshalOptions::new().strict(strict);
        if let Err(e) = unmarshal_document(&bytes, &registry, &options) {
            if json_output {
                let output = json!({
                    "valid": false,
                    "errors": [ErrorObject::from(&e)]
                });
                println!("{}", output);
            } else {
                eprintln!("Validation failed:");
                eprintln!("  {}", e);
            }
            return Err(e.exit_code() as u8);
        }
    }

    if json_output {
        println!(r#"{{"valid":true}}"#);
    } else {
        println!("Valid");
    }
    Ok(())
}

struct NormalizeArgs {
    payload: PathBuf,
    types: String,
    fields: Vec<(String, Vec<String>)>,
    include_data: Vec<(String, Vec<String>)>,
    base_url: String,
    self_link: Option<String>,
    strict: bool,
    error_document: bool,
    output: Option<PathBuf>,
    pretty: bool,
}

/// A failed normalization: the operator message, its wire form and the
/// exit code.
struct Failure {
    message: String,
    error: ErrorObject,
    code: u8,
}

impl Failure {
    fn internal(message: String, code: u8) -> Self {
        let mut error = ErrorObject::internal_server_error();
        error.detail = message.clone();
        Self {
            message,
            error,
            code,
        }
    }
}

fn run_normalize(args: NormalizeArgs) -> Result<(), u8> {
    let error_document = args.error_document;
    let pretty = args.pretty;
    normalize(args).map_err(|failure| {
        if error_document {
            let doc = Document::with_errors(vec![failure.error]);
            let options = MarshalOptions::new().pretty(pretty);
            match marshal_document(&doc, &Registry::default(), &options) {
                Ok(bytes) => println!("{}", String::from_utf8_lossy(&bytes)),
                Err(e) => eprintln!("Error: {}", e),
            }
        } else {
            eprintln!("Error: {}", failure.message);
        }
        failure.code
    })
}

fn normalize(args: NormalizeArgs) -> Result<(), Failure> {
    let NormalizeArgs {
        payload: payload_path,
        types,
        fields,
        include_data,
        base_url,
        self_link,
        strict,
        error_document: _,
        output,
        pretty,
    } = args;

    let registry = load_types_auto(&types)
        .map_err(|e| Failure::internal(format!("loading types: {}", e), e.exit_code() as u8))?;

    let params = query_params(&registry, fields, include_data).map_err(|error| Failure {
        message: error.detail.clone(),
        error,
        code: 2,
    })?;

    let bytes = load_payload(&payload_path).map_err(|e| Failure {
        message: format!("loading payload: {}", e),
        error: ErrorObject::bad_request(format!("loading payload: {}", e)),
        code: e.exit_code() as u8,
    })?;
    let options = UnmarshalOptions::new().strict(strict);
    let doc = unmarshal_document(&bytes, &registry, &options).map_err(|e| Failure {
        message: e.to_string(),
        error: ErrorObject::from(&e),
        code: e.exit_code() as u8,
    })?;

    let mut options = MarshalOptions::new()
        .base_url(base_url)
        .params(params)
        .pretty(pretty);
    if let Some(path) = self_link {
        options = options.self_link(path);
    }
    let out = marshal_document(&doc, &registry, &options)
        .map_err(|e| Failure::internal(e.to_string(), e.exit_code() as u8))?;

    match output {
        Some(path) => {
            std::fs::write(&path, &out).map_err(|e| {
                Failure::internal(format!("writing to {}: {}", path.display(), e), 3)
            })?;
        }
        None => {
            println!("{}", String::from_utf8_lossy(&out));
        }
    }

    Ok(())
}

/// Build query parameters from the `--fields` and `--include-data` flags.
fn query_params(
    registry: &Registry,
    fields: Vec<(String, Vec<String>)>,
    include_data: Vec<(String, Vec<String>)>,
) -> Result<QueryParams, ErrorObject> {
    let mut params = QueryParams::new();

    // Repeated flags for one type add to its fieldset.
    let mut fieldsets: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (type_name, list) in fields {
        if !registry.contains(&type_name) {
            return Err(ErrorObject::unknown_type_in_url(&type_name));
        }
        fieldsets.entry(type_name).or_default().extend(list);
    }
    for (type_name, list) in fieldsets {
        if let Some(field) = first_duplicate(&list) {
            return Err(ErrorObject::duplicate_field_in_fields_parameter(
                &type_name, field,
            ));
        }
        params = params.fields(type_name, list);
    }

    for (type_name, rels) in include_data {
        let desc = registry
            .lookup(&type_name)
            .ok_or_else(|| ErrorObject::unknown_type_in_url(&type_name))?;
        for rel in rels {
            if desc.rel(&rel).is_none() {
                return Err(ErrorObject::unknown_parameter(&format!(
                    "include-data[{}].{}",
                    type_name, rel
                )));
            }
            params = params.include_data(type_name.as_str(), rel);
        }
    }

    Ok(params)
}

fn first_duplicate(list: &[String]) -> Option<&str> {
    let mut seen = HashSet::new();
    list.iter()
        .map(String::as_str)
        .find(|field| !seen.insert(*field))
}

/// Output an error message in plain text or JSON format.
fn report_error(json_output: bool, msg: &str) {
    if json_output {
        println!("{}", json!({ "valid": false, "error": msg }));
    } else {
        eprintln!("Error: {}", msg);
    }
}
