//! The `kiln` command line interface.
//!
//! ```text
//! kiln compile <config-path> --target <profile> [--out <dir>] [--dry-run] [-v...] [--quiet]
//! kiln targets
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod artifacts;
mod error;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::{Level, error, info};

use kiln::compiler::Compiler;
use kiln::diagnostics::Diagnostic;
use kiln::target::TargetProfile;

use crate::error::CliError;

#[derive(Parser, Debug)]
#[command(name = "kiln", version)]
#[command(about = "Turn device configuration documents into firmware code-generation plans")]
struct Cli {
    /// Increase logging verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only report errors.
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate a configuration document and emit its artifacts.
    Compile {
        /// Path of the configuration document.
        config: PathBuf,

        /// Target profile, see `kiln targets`.
        #[arg(short, long)]
        target: String,

        /// Output directory, `build/<device-name>` by default.
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Validate and plan without writing anything.
        #[arg(long)]
        dry_run: bool,
    },
    /// List the known target profiles.
    Targets,
}

const fn level(verbose: u8, quiet: bool) -> Level {
    if quiet {
        return Level::ERROR;
    }
    match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

fn init_logging(level: Level) {
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("Logging already initialized");
    }
}

fn report(diagnostics: &[Diagnostic]) {
    for diagnostic in diagnostics {
        eprintln!("{diagnostic}");
    }
}

fn compile(
    config: &std::path::Path,
    target: &str,
    out: Option<&std::path::Path>,
    dry_run: bool,
) -> Result<(), CliError> {
    let registry = kiln_components::registry().map_err(CliError::Catalog)?;
    let compiler = Compiler::new(&registry, target)?;

    info!("Compiling {} for {target}", config.display());
    let output = compiler.compile_path(config)?;
    report(output.warnings());

    if dry_run {
        println!(
            "{}: {} instances, {} statements",
            output.device_name.as_deref().unwrap_or("document"),
            output.plan.instances().len(),
            output.ir.len()
        );
        return Ok(());
    }

    let dir = artifacts::output_dir(out, &output);
    artifacts::write_artifacts(&dir, &output, &compiler.describe(&output))?;
    println!("{}", dir.display());
    Ok(())
}

fn targets() {
    for profile in TargetProfile::all() {
        println!(
            "{:<16} {:<8} {:<8} {}",
            profile.name, profile.platform, profile.framework, profile.capabilities
        );
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(level(cli.verbose, cli.quiet));

    let result = match cli.command {
        Command::Compile {
            config,
            target,
            out,
            dry_run,
        } => compile(&config, &target, out.as_deref(), dry_run),
        Command::Targets => {
            targets();
            Ok(())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if let CliError::Compile(compile) = &err {
                report(compile.diagnostics());
            }
            error!("{err}");
            err.exit_code()
        }
    }
}
