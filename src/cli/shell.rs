use std::{
    fs::File,
    io::{self, BufRead, BufReader},
};

use shell_words::split;
use tracing::info;

use crate::cli::output;
use crate::cli::shell_context::{CliMode, ShellContext};
use crate::errors::CliError;

/// Runs the command named by the process arguments, or a script when there is none.
///
/// `circle_ledger_cli --script <file>` reads commands from a file; no arguments reads them
/// from stdin.
pub fn run_cli() -> Result<(), CliError> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    run_with_args(&args)
}

pub fn run_with_args(args: &[String]) -> Result<(), CliError> {
    match args.first().map(String::as_str) {
        None => {
            let mut context = ShellContext::new(CliMode::Script)?;
            run_script(&mut context, io::stdin().lock())
        }
        Some("--script") => {
            let path = args
                .get(1)
                .ok_or_else(|| CliError::input("usage: --script <file>"))?;
            let file = File::open(path)?;
            let mut context = ShellContext::new(CliMode::Script)?;
            info!(script = %path, "running script");
            run_script(&mut context, BufReader::new(file))
        }
        Some(_) => {
            let mut context = ShellContext::new(CliMode::Command)?;
            let tokens: Vec<&str> = args.iter().map(String::as_str).collect();
            context.dispatch(tokens[0], &tokens[1..])
        }
    }
}

pub fn run_script<R: BufRead>(context: &mut ShellContext, reader: R) -> Result<(), CliError> {
    for line in reader.lines() {
        if !context.running {
            break;
        }
        let line = line?;
        if let Err(err) = handle_line(context, &line) {
            context.report_error(err)?;
        }
    }
    Ok(())
}

fn handle_line(context: &mut ShellContext, line: &str) -> Result<(), CliError> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(());
    }
    let tokens = match split(trimmed) {
        Ok(tokens) => tokens,
        Err(err) => {
            output::warning(format!("could not parse `{trimmed}`: {err}"));
            return Ok(());
        }
    };
    let Some((command, rest)) = tokens.split_first() else {
        return Ok(());
    };
    let args: Vec<&str> = rest.iter().map(String::as_str).collect();
    context.dispatch(command, &args)
}
