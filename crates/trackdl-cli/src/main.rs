//! CLI entry point.

use std::process::ExitCode;

use clap::Parser;

use trackdl_cli::handlers::run::RunOptions;
use trackdl_cli::{Cli, CliError, Commands, handlers, logging};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match dispatch(cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            let code = e.downcast_ref::<CliError>().map_or(1, CliError::exit_code);
            ExitCode::from(code)
        }
    }
}

async fn dispatch(command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Run {
            tracks,
            script,
            output_dir,
            album,
            cancel_after,
            json,
        } => {
            handlers::run::execute(RunOptions {
                tracks,
                script,
                output_dir,
                album,
                cancel_after,
                json,
            })
            .await
        }
        Commands::Classify { code, message } => {
            handlers::classify::execute(&code, &message)?;
            Ok(())
        }
    }
}
