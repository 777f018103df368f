use anyhow::Result;
use bk_cli::{Cli, Commands, Parser};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config_path = cli.config.clone();

    match cli.command {
        Commands::Backup(args) => args.run(&config_path).await,
        Commands::Cleanup(args) => args.run(&config_path).await,
        Commands::List(args) => args.run(&config_path).await,
        Commands::Verify(args) => args.run(&config_path).await,
        Commands::Daemon(args) => args.run(&config_path).await,
        Commands::Config { subcommand } => subcommand.run(&config_path).await,
    }
}
