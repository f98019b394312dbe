//! The command-line interface for the `sdsl-parse` crate.

use clap::{Args, Parser, Subcommand};
use sdsl_parse::{preprocess, ParseOptions, Parser as SdslParser};
use std::{
    fs,
    path::{Path, PathBuf},
    process::ExitCode,
};
use thiserror::Error;

#[derive(Parser)]
#[command(version, about)]
#[command(propagate_version = true)]
struct Cli {
    /// main command
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// check correctness of the source file
    Check(CommonArgs),
    /// output the match tree to stdout
    Dump(DumpArgs),
    /// output the preprocessor structure of the source file, without evaluating it
    Directives(DirectivesArgs),
    /// evaluate a preprocessor condition
    Eval(EvalArgs),
}

#[derive(Args)]
struct CommonArgs {
    /// sdsl source file
    input: PathBuf,
    /// define a name before the first line, `NAME` or `NAME=VALUE`
    #[arg(short = 'D', value_parser = parse_define)]
    define: Vec<(String, String)>,
    /// maximum syntactic nesting depth
    #[arg(long, default_value_t = ParseOptions::default().recursion_limit)]
    recursion_limit: usize,
}

#[derive(Args)]
struct DirectivesArgs {
    /// sdsl source file
    input: PathBuf,
}

#[derive(Args)]
struct DumpArgs {
    #[command(flatten)]
    common: CommonArgs,
    /// print the tree as json
    #[cfg(feature = "serde")]
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct EvalArgs {
    /// the condition, as written after `#if`
    condition: String,
    /// define a name, `NAME` or `NAME=VALUE`
    #[arg(short = 'D', value_parser = parse_define)]
    define: Vec<(String, String)>,
}

#[derive(Error, Debug)]
enum CliError {
    #[error("could not read `{0}`: {1}")]
    Io(PathBuf, std::io::Error),
    /// Already rendered with the source snippet.
    #[error("{0}")]
    Parse(String),
    #[cfg(feature = "serde")]
    #[error("{0}")]
    Json(#[from] serde_json::Error),
}

fn parse_define(arg: &str) -> Result<(String, String), String> {
    let (name, value) = arg.split_once('=').unwrap_or((arg, ""));
    let valid = name.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_')
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok((name.to_string(), value.to_string()))
    } else {
        Err(format!("`{name}` is not a valid name"))
    }
}

fn options(defines: &[(String, String)], recursion_limit: usize) -> ParseOptions {
    defines
        .iter()
        .fold(
            ParseOptions::default().with_recursion_limit(recursion_limit),
            |options, (name, value)| options.with_define(name, value),
        )
}

fn read(input: &Path) -> Result<String, CliError> {
    fs::read_to_string(input).map_err(|e| CliError::Io(input.to_path_buf(), e))
}

fn run(cli: Cli) -> Result<(), CliError> {
    match &cli.command {
        Command::Check(args) => {
            let source = read(&args.input)?;
            let options = options(&args.define, args.recursion_limit);
            print!("{} -- ", args.input.display());
            SdslParser::parse_with_options(&source, &options)
                .map_err(|e| CliError::Parse(e.to_string()))?;
            println!("OK");
        }
        Command::Dump(args) => {
            let source = read(&args.common.input)?;
            let options = options(&args.common.define, args.common.recursion_limit);
            let tree = SdslParser::parse_with_options(&source, &options)
                .map_err(|e| CliError::Parse(e.to_string()))?;
            #[cfg(feature = "serde")]
            if args.json {
                println!("{}", serde_json::to_string_pretty(&tree)?);
                return Ok(());
            }
            print!("{}", tree.root);
        }
        Command::Directives(args) => {
            let source = read(&args.input)?;
            let program = SdslParser::parse_directives(&source)
                .map_err(|e| CliError::Parse(e.to_string()))?;
            print!("{program}");
        }
        Command::Eval(args) => {
            let options = options(&args.define, ParseOptions::default().recursion_limit);
            let value = preprocess::evaluate(&args.condition, &options)
                .map_err(|e| CliError::Parse(e.to_string()))?;
            println!("{value}");
        }
    };
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn arguments() {
        Cli::command().debug_assert();

        let cli = Cli::try_parse_from(["sdsl", "check", "-D", "A=2", "-D", "B", "a.sdsl"]).unwrap();
        let Command::Check(args) = cli.command else {
            panic!("expected the check command");
        };
        let defines = [("A", "2"), ("B", "")].map(|(n, v)| (n.to_string(), v.to_string()));
        assert_eq!(args.define, defines);
        assert_eq!(args.recursion_limit, ParseOptions::default().recursion_limit);

        // directives are never evaluated, so they take no defines
        assert!(Cli::try_parse_from(["sdsl", "directives", "a.sdsl"]).is_ok());
        assert!(Cli::try_parse_from(["sdsl", "directives", "-D", "A", "a.sdsl"]).is_err());
        assert!(Cli::try_parse_from(["sdsl", "check", "-D", "1A", "a.sdsl"]).is_err());
    }
}
