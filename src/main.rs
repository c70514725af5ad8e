use clap::Parser;
use upwatch::cli::{check, report, run, score, CheckCommand, Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => run::execute(&args).await?,
        Commands::Check(CheckCommand::Config(arg)) => check::config::execute_config(&arg.config)?,
        Commands::Score(args) => score::execute(&args)?,
        Commands::Report(args) => report::execute(&args).await?,
    }
    Ok(())
}
