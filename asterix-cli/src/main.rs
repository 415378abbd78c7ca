//! CLI surface for `asterix-core` (spec.md §6): argument parsing, logging
//! setup, and exit-code mapping. Holds no decode logic of its own.

use std::path::PathBuf;
use std::process::ExitCode;

use argh::FromArgs;
use asterix_core::Orchestrator;

#[derive(FromArgs, PartialEq, Debug)]
/// Schema-driven decoder for ASTERIX-style surveillance records.
struct Cli {
    #[argh(subcommand)]
    command: Command,
}

#[derive(FromArgs, PartialEq, Debug)]
#[argh(subcommand)]
enum Command {
    /// decode a recording against a set of schema definitions
    Decode(DecodeArgs),
}

#[derive(FromArgs, PartialEq, Debug)]
/// Decode a recording against a set of JSON schema definitions.
#[argh(subcommand, name = "decode")]
struct DecodeArgs {
    /// path to the input recording
    #[argh(positional)]
    input: PathBuf,

    /// directory holding record.json, categories.json, and per-category files
    #[argh(option)]
    definitions: PathBuf,

    /// name of an outer framing definition file (without its .json suffix)
    #[argh(option)]
    framing: Option<String>,

    /// parse frame/record boundaries only; do not materialize item content
    #[argh(switch)]
    scope_only: bool,

    /// enable per-item debug tracing
    #[argh(switch)]
    debug: bool,
}

fn main() -> ExitCode {
    let cli: Cli = argh::from_env();
    let Command::Decode(args) = cli.command;

    let filter = if args.debug {
        tracing_subscriber::EnvFilter::new("debug")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    run(args)
}

fn run(args: DecodeArgs) -> ExitCode {
    let mut session = match Orchestrator::open(&args.input, &args.definitions, args.framing.as_deref(), args.debug) {
        Ok(session) => session,
        Err(err) => return report(&err),
    };

    let result = if args.scope_only {
        session.scope_frames()
    } else {
        session.decode_records()
    };

    match result {
        Ok(count) => {
            if args.scope_only {
                println!("{count} frame(s)");
            } else {
                println!("{}", session.print());
                eprintln!(
                    "decoded {} record(s), skipped {}",
                    session.records(),
                    session.skipped_records()
                );
            }
            ExitCode::SUCCESS
        }
        Err(err) => report(&err),
    }
}

/// Maps the top-level error to spec.md §6's exit codes: 2 schema error, 3 I/O
/// error, 4 decode error.
fn report(err: &asterix_core::Error) -> ExitCode {
    eprintln!("error: {err}");
    let code = match err {
        asterix_core::Error::Io(_) => 3,
        asterix_core::Error::Load(_) | asterix_core::Error::Schema(_) => 2,
        asterix_core::Error::Decode(_) => 4,
    };
    ExitCode::from(code)
}
