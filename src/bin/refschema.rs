//! refschema CLI
//!
//! Command-line interface for building and validating against JSON Schemas.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use refschema::{
    load_document, validate, FileLoader, Location, ResolveError, SchemaStore, StoreOptions,
    ValidationError, DEFAULT_MAX_LOCATIONS, DEFAULT_MAX_REF_HOPS,
};

#[derive(Parser)]
#[command(name = "refschema")]
#[command(about = "Resolve $ref graphs and validate JSON documents against JSON Schema")]
#[command(version)]
struct Cli {
    /// Log build progress to stderr
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Maximum number of schema locations a build may register
    #[arg(long, global = true, default_value_t = DEFAULT_MAX_LOCATIONS)]
    max_locations: usize,

    /// Maximum number of $ref hops followed from one location
    #[arg(long, global = true, default_value_t = DEFAULT_MAX_REF_HOPS)]
    max_ref_hops: usize,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate instance files against a schema
    Validate {
        /// Schema location: file path or URL, optionally with #/json/pointer
        schema: String,

        /// Instance files to validate
        #[arg(required = true)]
        instances: Vec<PathBuf>,

        /// Output results as JSON (one line per instance)
        #[arg(long)]
        json: bool,
    },

    /// Follow $ref aliases from a location and print the schema it lands on
    Resolve {
        /// Location: file path or URL, optionally with #/json/pointer
        location: String,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Compile every schema reachable from a location
    Build {
        /// Schema location: file path or URL, optionally with #/json/pointer
        schema: String,

        /// Only print the summary line
        #[arg(long, short)]
        quiet: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let options = StoreOptions::new()
        .max_locations(cli.max_locations)
        .max_ref_hops(cli.max_ref_hops);

    let result = match cli.command {
        Commands::Validate {
            schema,
            instances,
            json,
        } => run_validate(&schema, &instances, json, options),
        Commands::Resolve { location, pretty } => run_resolve(&location, pretty, options),
        Commands::Build { schema, quiet } => run_build(&schema, quiet, options),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => ExitCode::from(code),
    }
}

/// Build the schema graph rooted at `source`, returning the store and root.
fn load_store(
    source: &str,
    options: StoreOptions,
) -> Result<(SchemaStore, Location), ResolveError> {
    let location = Location::parse(source)?;
    let mut store = SchemaStore::with_options(FileLoader::default(), options);
    let root = store.load(location)?;
    Ok((store, root))
}

fn run_validate(
    schema_source: &str,
    instances: &[PathBuf],
    json_output: bool,
    options: StoreOptions,
) -> Result<(), u8> {
    let (store, root) = load_store(schema_source, options).map_err(|e| {
        report_error(json_output, &format!("building schema: {}", e));
        e.exit_code() as u8
    })?;

    let mut all_valid = true;
    for path in instances {
        let instance = load_document(path).map_err(|e| {
            report_error(json_output, &format!("loading {}: {}", path.display(), e));
            e.exit_code() as u8
        })?;

        let errors = validate(&store, &root, &instance).map_err(|e| {
            report_error(json_output, &e.to_string());
            e.exit_code() as u8
        })?;

        all_valid &= errors.is_empty();
        print_result(path, &errors, json_output);
    }

    if all_valid {
        Ok(())
    } else {
        Err(1)
    }
}

fn print_result(path: &Path, errors: &[ValidationError], json_output: bool) {
    if json_output {
        let output = serde_json::json!({
            "instance": path.display().to_string(),
            "valid": errors.is_empty(),
            "errors": errors,
        });
        println!("{}", output);
    } else if errors.is_empty() {
        println!("{}: valid", path.display());
    } else {
        eprintln!("{}: validation failed:", path.display());
        for error in errors {
            print_error(error, 1);
        }
    }
}

fn print_error(error: &ValidationError, depth: usize) {
    eprintln!("{}{}", "  ".repeat(depth), error);
    for cause in &error.causes {
        print_error(cause, depth + 1);
    }
}

fn run_resolve(source: &str, pretty: bool, options: StoreOptions) -> Result<(), u8> {
    let mut store = SchemaStore::with_options(FileLoader::default(), options);

    let value = Location::parse(source)
        .and_then(|location| store.require(location))
        .and_then(|canonical| {
            log::info!("resolved {} to {}", source, canonical);
            store.resolve(&canonical)
        })
        .map_err(|e| {
            eprintln!("Error: {}", e);
            e.exit_code() as u8
        })?;

    let output = if pretty {
        serde_json::to_string_pretty(&value)
    } else {
        serde_json::to_string(&value)
    }
    .map_err(|e| {
        eprintln!("Error serializing output: {}", e);
        2u8
    })?;

    println!("{}", output);
    Ok(())
}

fn run_build(source: &str, quiet: bool, options: StoreOptions) -> Result<(), u8> {
    let (store, _) = load_store(source, options).map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;

    if !quiet {
        let mut locations: Vec<String> = store.built().map(|(loc, _)| loc.to_string()).collect();
        locations.sort();
        for location in locations {
            println!("  {}", location);
        }
    }
    println!("Built {} schema location(s)", store.built_len());
    Ok(())
}

/// Output an error message in plain text or JSON format.
fn report_error(json_output: bool, msg: &str) {
    if json_output {
        println!("{}", serde_json::json!({ "valid": false, "error": msg }));
    } else {
        eprintln!("Error: {}", msg);
    }
}
