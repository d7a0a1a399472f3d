use clap::Parser;
use nb_bootstrap::{cli::Cli, log};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    log::init_logging(cli.verbose);
    cli.run().await?;
    Ok(())
}
