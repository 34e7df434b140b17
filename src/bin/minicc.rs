//! The compiler's command-line entry point: reads a source file, lowers it
//! through the Eeyore/Tigger stages, and prints Eeyore, Tigger, or final
//! RISC-V assembly depending on the requested mode.
//!
//! Run with `--help` for more info.

use std::io::Write as _;
use std::process::ExitCode;

use clap::Parser;

use minic::error::Result;
use minic::front;
use minic::{eeyore, riscv, tigger};

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
struct Args {
    /// Source file to compile.
    input: String,

    /// Emit Eeyore instead of assembly.
    #[arg(short = 'e', long, conflicts_with = "tigger")]
    eeyore: bool,

    /// Emit Tigger instead of assembly.
    #[arg(short = 't', long)]
    tigger: bool,

    /// Output file. Defaults to standard output.
    #[arg(short, long)]
    output: Option<String>,

    /// Increase log verbosity; repeatable.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn filter_level(verbosity: u8) -> log::LevelFilter {
    match verbosity {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    }
}

fn compile(args: &Args) -> Result<String> {
    let source = std::fs::read_to_string(&args.input)
        .unwrap_or_else(|e| panic!("could not read {}: {e}", args.input));

    let ast = front::parse(&source)?;
    let checked = front::check(&ast)?;
    let eeyore_code = eeyore::lower(&ast, &checked)?;

    if args.eeyore {
        return Ok(eeyore::printer::print(&eeyore_code));
    }

    let tigger_code = tigger::lower(&eeyore_code)?;

    if args.tigger {
        return Ok(tigger::printer::print(&tigger_code));
    }

    riscv::lower(&tigger_code)
}

fn main() -> ExitCode {
    let args = Args::parse();

    env_logger::Builder::new()
        .filter_level(filter_level(args.verbose))
        .init();

    match compile(&args) {
        Ok(output) => {
            match &args.output {
                Some(path) => {
                    if let Err(e) = std::fs::write(path, output) {
                        eprintln!("could not write {path}: {e}");
                        return ExitCode::from(2);
                    }
                }
                None => {
                    let _ = std::io::stdout().write_all(output.as_bytes());
                }
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{e}");
            ExitCode::from(e.exit_code() as u8)
        }
    }
}
