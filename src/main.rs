mod calendar;
mod cli;
mod download;
mod logging;
mod pipeline;
mod settings;
mod stats;
mod table;

use anyhow::Result;
use clap::Parser;
use cli::{command, Cli, Commands};
use settings::Settings;

async fn run(cli: &Cli) -> Result<String> {
    let settings = Settings::load(cli.config.as_deref())?;

    match &cli.command {
        Commands::Fetch(args) => command::fetch(args, &settings).await,
        Commands::Split(args) => command::split(args),
        Commands::Yearly(args) => command::yearly(args, &settings),
        Commands::Anomalies(args) => command::anomalies(args, &settings),
        Commands::Outliers(args) => command::outliers(args, &settings),
        Commands::Setup(args) => command::setup(args, &settings),
        Commands::Baselines(args) => command::baselines(args),
        Commands::Features(args) => command::features(args),
        Commands::Metrics(args) => command::metrics(args),
        Commands::Summary(args) => command::summary(args),
        Commands::Trim(args) => command::trim(args),
        Commands::Globe(args) => command::globe(args, &settings),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match run(&cli).await {
        Ok(message) => println!("{}", message),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}
