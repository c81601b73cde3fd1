//! `hivemlc`: parses a hiveml source file, elaborates it end to end, and
//! either reports the typed errors it finds or writes out the resulting
//! IR.
//!
//! Codegen for the actor-runtime target is out of core scope (spec §6),
//! so `-o` selects where the elaborator's IR dump is written instead of
//! target code; without it the dump goes to stdout and diagnostics go to
//! stderr either way.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;

use hiveml_common::{Diagnostic, DiagnosticCategory, Span};
use hiveml_elab::error::ElabError;
use hiveml_elab::module::{elaborate_program, ElaborationOutput};
use hiveml_elab::primitives::builtin_environment;
use hiveml_types::InferenceContext;

#[derive(Parser, Debug)]
#[command(name = "hivemlc", version, about = "Type-checks and elaborates a hiveml source file")]
struct CliArgs {
    /// Path to the `.hvml` source file to elaborate.
    source: PathBuf,

    /// Directory to write the elaborated IR dump into, instead of stdout.
    #[arg(short = 'o', long = "out-dir")]
    out_dir: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "hivemlc=info,warn".to_string()))
        .init();

    let args = CliArgs::parse();
    if let Err(code) = run(&args) {
        std::process::exit(code);
    }
    Ok(())
}

/// Returns `Err(1)` for a typed/parse failure (already reported to
/// stderr) and `Ok(())` on success, so `main` can translate that into the
/// exit code spec §6 names without `anyhow` swallowing it as a generic
/// failure.
fn run(args: &CliArgs) -> std::result::Result<(), i32> {
    let source = fs::read_to_string(&args.source).map_err(|e| {
        eprintln!("{}: {e}", args.source.display());
        1
    })?;

    let program = hiveml_syntax::parse(&source).map_err(|e| {
        eprintln!("{}: {}", span_prefix(&args.source, e.span), e.message);
        1
    })?;

    let mut ctx = InferenceContext::new();
    let (mut env, ids) = builtin_environment(&mut ctx);

    let output = elaborate_program(&mut ctx, ids, &mut env, &program).map_err(|e: ElabError| {
        eprintln!("{}: {e}", span_prefix(&args.source, e.span()));
        1
    })?;

    for diag in &output.diagnostics {
        report_diagnostic(&args.source, diag);
    }

    render_ir(args, &output).map_err(|e| {
        eprintln!("{e:#}");
        1
    })?;
    Ok(())
}

fn span_prefix(source: &Path, span: Span) -> String {
    if span.is_dummy() {
        source.display().to_string()
    } else {
        format!("{}:{}-{}", source.display(), span.start, span.end)
    }
}

fn report_diagnostic(source: &Path, diag: &Diagnostic) {
    let label = match diag.category {
        DiagnosticCategory::Error => "error",
        DiagnosticCategory::Warning => "warning",
    };
    eprintln!("{}: {label}: {}", span_prefix(source, diag.span), diag.message);
    for note in &diag.notes {
        eprintln!("  note at {}: {}", span_prefix(source, note.span), note.message);
    }
}

/// One pretty-printed file (or stdout section) per top-level binding, in
/// declaration order — the only "module" boundary the flattened elaborator
/// output has.
fn render_ir(args: &CliArgs, output: &ElaborationOutput) -> Result<()> {
    let dump = output.bindings.iter().map(|b| format!("{b:#?}")).collect::<Vec<_>>().join("\n\n");
    match &args.out_dir {
        Some(dir) => {
            fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
            let stem = args.source.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_else(|| "module".to_string());
            let out_path = dir.join(format!("{stem}.ir.txt"));
            fs::write(&out_path, dump).with_context(|| format!("writing {}", out_path.display()))?;
        }
        None => println!("{dump}"),
    }
    Ok(())
}
