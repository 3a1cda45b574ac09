//! ---
//! twin_section: "08-maintenance-models"
//! twin_subsection: "binary"
//! twin_type: "source"
//! twin_scope: "code"
//! twin_description: "Command line for running, validating and comparing maintenance simulations."
//! twin_version: "v0.0.0-prealpha"
//! twin_owner: "tbd"
//! ---
use anyhow::Result;
use clap::{ArgAction, CommandFactory, Parser, Subcommand};

mod compare;
mod inputs;
mod run;

#[derive(Debug, Parser)]
#[command(
    author,
    disable_version_flag = true,
    about = "MEP-Twin maintenance simulation utility",
    long_about = None
)]
struct Cli {
    #[arg(
        short = 'V',
        long = "version",
        action = ArgAction::SetTrue,
        help = "Print version information and exit"
    )]
    version: bool,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Simulate the configured horizon and export the reports.
    Run(run::RunArgs),
    /// Load and check every input without simulating.
    Validate(inputs::InputArgs),
    /// Simulate the same inputs under several configurations in parallel.
    Compare(compare::CompareArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    if cli.version {
        println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
        return Ok(());
    }
    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        return Ok(());
    };
    match command {
        Commands::Run(args) => run::run(args)?,
        Commands::Validate(args) => inputs::validate(args)?,
        Commands::Compare(args) => compare::run(args)?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn compare_accepts_repeated_config_flags() {
        let cli = Cli::try_parse_from([
            "mep-twin",
            "compare",
            "--config",
            "a.toml",
            "--config",
            "b.toml",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Compare(args)) => assert_eq!(args.configs.len(), 2),
            other => panic!("unexpected command {other:?}"),
        }
    }
}
