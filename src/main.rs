//! stackscope CLI
//!
//! Usage:
//!   stackscope validate <TEMPLATE>
//!   stackscope resolve <TEMPLATE> [-c context.toml] [-p Key=Value]...
//!   stackscope query <EVENTS|-> -p '<pattern>' [-n LIMIT]
//!
//! Use `-` to read from stdin. Set `RUST_LOG` or pass `-v` for debug output.

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use tracing::warn;

use stackscope::{
    load, query_with_options, resolve, CompiledPattern, Document, EventRecord, ParameterContext,
    QueryOptions,
};

#[derive(Parser)]
#[command(name = "stackscope")]
#[command(about = "Inspect infrastructure templates and query event logs")]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check that a template loads and has the required sections
    Validate {
        /// Template file (`-` for stdin)
        template: PathBuf,
    },

    /// Resolve every reference in a template and print the result
    Resolve {
        /// Template file (`-` for stdin)
        template: PathBuf,

        /// Context file with parameters, pseudo parameters and attributes (TOML format)
        #[arg(short, long)]
        context: Option<PathBuf>,

        /// Parameter value, overrides the context file
        #[arg(short, long = "param", value_name = "KEY=VALUE", value_parser = parse_key_val)]
        params: Vec<(String, String)>,
    },

    /// Print events matching a filter pattern, newest first
    Query {
        /// File with one JSON event per line (`-` for stdin)
        events: PathBuf,

        /// Filter pattern, e.g. '{ $.state = "FAILED" }'
        #[arg(short, long, default_value = "")]
        pattern: String,

        /// Maximum number of matches
        #[arg(short = 'n', long)]
        limit: Option<usize>,

        /// Do not report records skipped by numeric comparisons
        #[arg(long)]
        no_diagnostics: bool,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Command::Validate { template } => run_validate(&template),
        Command::Resolve {
            template,
            context,
            params,
        } => run_resolve(&template, context.as_deref(), params),
        Command::Query {
            events,
            pattern,
            limit,
            no_diagnostics,
        } => run_query(&events, &pattern, limit, !no_diagnostics),
    };

    if let Err(message) = result {
        eprintln!("{}", message);
        process::exit(1);
    }
}

/// Install a stderr subscriber; `RUST_LOG` wins over `-v`
fn init_tracing(verbose: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let default_level = if verbose { "debug" } else { "warn" };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(io::stderr))
        .try_init();
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", s))?;
    if key.is_empty() {
        return Err(format!("empty parameter name in '{}'", s));
    }
    Ok((key.to_string(), value.to_string()))
}

fn read_input(path: &Path) -> Result<Vec<u8>, String> {
    if path.as_os_str() == "-" {
        let mut buffer = Vec::new();
        io::stdin()
            .read_to_end(&mut buffer)
            .map_err(|e| format!("Error reading from stdin: {}", e))?;
        Ok(buffer)
    } else {
        fs::read(path).map_err(|e| format!("Error reading file '{}': {}", path.display(), e))
    }
}

fn display_name(path: &Path) -> String {
    if path.as_os_str() == "-" {
        "<stdin>".to_string()
    } else {
        path.display().to_string()
    }
}

fn load_template(path: &Path) -> Result<Document, String> {
    let raw = read_input(path)?;
    load(&raw).map_err(|e| {
        let source = String::from_utf8_lossy(&raw);
        e.format(&source, &display_name(path))
    })
}

fn run_validate(path: &Path) -> Result<(), String> {
    let doc = load_template(path)?;
    println!(
        "{}: ok ({} resources, {} parameters, {} conditions, {} outputs)",
        display_name(path),
        doc.resources().len(),
        doc.parameters().map_or(0, |p| p.len()),
        doc.conditions().map_or(0, |c| c.len()),
        doc.outputs().map_or(0, |o| o.len()),
    );
    Ok(())
}

fn run_resolve(path: &Path, context: Option<&Path>, params: Vec<(String, String)>) -> Result<(), String> {
    let ctx = match context {
        Some(file) => ParameterContext::from_file(file)
            .map_err(|e| format!("Error loading context '{}': {}", file.display(), e))?,
        None => ParameterContext::new(),
    };
    let ctx = params
        .into_iter()
        .fold(ctx, |ctx, (key, value)| ctx.with_parameter(key, value));

    let doc = load_template(path)?;
    let resolved = resolve(&doc, &ctx).map_err(|e| format!("Error: {}", e))?;
    println!("{}", resolved.to_json());
    Ok(())
}

fn run_query(path: &Path, pattern: &str, limit: Option<usize>, diagnostics: bool) -> Result<(), String> {
    let compiled = CompiledPattern::parse(pattern).map_err(|e| e.format(pattern))?;

    let raw = read_input(path)?;
    let text = String::from_utf8(raw).map_err(|e| format!("Error: {} is not UTF-8: {}", display_name(path), e))?;

    let mut records = Vec::new();
    for (number, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let record = EventRecord::from_json(line)
            .map_err(|e| format!("{}:{}: {}", display_name(path), number + 1, e))?;
        records.push(record);
    }

    let mut options = QueryOptions::new().with_diagnostics(diagnostics);
    options.limit = limit;

    let mut matches = query_with_options(&records, &compiled, options);
    for record in matches.by_ref() {
        println!("{}", record.to_json());
    }
    for diagnostic in matches.diagnostics() {
        warn!("skipped {}", diagnostic);
    }
    Ok(())
}
