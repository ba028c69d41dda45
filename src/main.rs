//! Dues Ledger CLI
//!
//! Replays a DSV event log into per-member dues state and writes the final
//! ledger snapshot.
//!
//! # Usage
//!
//! ```bash
//! dues-ledger -if events.dsv -of snapshot.dsv
//! ```
//!
//! `-if` and `-of` both default to `-` (stdin/stdout).
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: Set to `debug` or `info` to control logging verbosity

use dues_ledger::{LedgerError, ReplayEngine, Result};
use std::env;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::process;

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

struct Args {
    input: String,
    output: String,
}

fn parse_args() -> Result<Args> {
    let mut args = Args {
        input: "-".to_string(),
        output: "-".to_string(),
    };

    let mut argv = env::args().skip(1);
    while let Some(flag) = argv.next() {
        match flag.as_str() {
            "-if" => args.input = next_value(&mut argv, &flag)?,
            "-of" => args.output = next_value(&mut argv, &flag)?,
            other => {
                return Err(LedgerError::Usage(format!("unexpected argument `{other}`")));
            }
        }
    }
    Ok(args)
}

fn next_value(argv: &mut impl Iterator<Item = String>, flag: &str) -> Result<String> {
    argv.next()
        .ok_or_else(|| LedgerError::Usage(format!("missing value for `{flag}`")))
}

fn run() -> Result<()> {
    let args = parse_args()?;

    let input: Box<dyn Read> = if args.input == "-" {
        Box::new(io::stdin())
    } else {
        Box::new(File::open(&args.input)?)
    };

    let mut engine = ReplayEngine::new();
    engine.replay(BufReader::new(input))?;

    // The snapshot is only opened after a fully successful replay; an
    // aborted run never truncates an existing output file.
    let output: Box<dyn Write> = if args.output == "-" {
        Box::new(io::stdout().lock())
    } else {
        Box::new(File::create(&args.output)?)
    };
    engine.write_snapshot(BufWriter::new(output))?;

    Ok(())
}
