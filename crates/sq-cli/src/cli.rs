use std::path::PathBuf;

use crate::config;

#[derive(Debug, Clone)]
pub struct CliArgs {
    pub config_path: PathBuf,
    /// Replaces the `[query]` table of the config file.
    pub query_path: Option<PathBuf>,
}

enum ParseOutcome {
    Args(CliArgs),
    Help,
}

fn usage() {
    eprintln!(
        "usage:
  sq [--config <path>] [--query <path>]

Rows are printed to stdout as JSON lines. Set RUST_LOG to adjust logging.
"
    );
}

fn parse_args_impl(mut args: impl Iterator<Item = String>) -> Result<ParseOutcome, String> {
    let mut config_path: Option<PathBuf> = None;
    let mut query_path: Option<PathBuf> = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                let value = args
                    .next()
                    .ok_or_else(|| "--config requires a value".to_string())?;
                config_path = Some(PathBuf::from(value));
            }
            "--query" => {
                let value = args
                    .next()
                    .ok_or_else(|| "--query requires a value".to_string())?;
                query_path = Some(PathBuf::from(value));
            }
            "-h" | "--help" | "help" => {
                return Ok(ParseOutcome::Help);
            }
            other => return Err(format!("unknown argument: {other}")),
        }
    }

    Ok(ParseOutcome::Args(CliArgs {
        config_path: config::resolve_config_path(config_path),
        query_path,
    }))
}

pub fn parse_args() -> CliArgs {
    match parse_args_impl(std::env::args().skip(1)) {
        Ok(ParseOutcome::Args(args)) => args,
        Ok(ParseOutcome::Help) => {
            usage();
            std::process::exit(0);
        }
        Err(error) => {
            eprintln!("error: {error}");
            usage();
            std::process::exit(2);
        }
    }
}
