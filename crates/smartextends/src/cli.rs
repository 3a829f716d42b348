use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;

use crate::args::Args;
use crate::commands::Command;
use crate::commands::Project;
use crate::commands::SmartExtendsCommand;
use crate::logging;

/// The main CLI structure that defines the command-line interface
#[derive(Parser)]
#[command(name = "smartextends")]
#[command(version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: SmartExtendsCommand,

    #[command(flatten)]
    pub args: Args,
}

/// Parse CLI arguments and execute the chosen command
pub fn run(args: Vec<String>) -> Result<ExitCode> {
    let cli = Cli::try_parse_from(args).unwrap_or_else(|e| {
        e.exit();
    });

    let project = Project::load(cli.args.global.project.as_deref())?;
    let _guard = logging::init_tracing(logging::default_directive(
        &cli.args.global,
        project.settings.debug,
    ));
    tracing::debug!("Using project root {}", project.root);

    let exit = cli.command.execute(&cli.args, &project)?;
    Ok(exit.process(cli.args.global.quiet))
}
