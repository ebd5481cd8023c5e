mod config;
mod daily;
mod fetch;
mod sources;
mod switch;

use std::sync::Arc;

use tickbridge_core::{DataClient, SourceFactory};

use crate::cli::{Cli, Command, FetchArgs};
use crate::error::CliError;
use crate::output;

pub async fn run(cli: &Cli) -> Result<(), CliError> {
    let factory = SourceFactory::builder()
        .config_path(cli.config.clone())
        .offline(cli.offline)
        .build()?;

    let data = match &cli.command {
        Command::Sources => sources::run(&factory).await?,
        Command::Switch(args) => switch::run(&factory, args).await?,
        Command::Basics(args) => fetch::basics(&factory, args).await?,
        Command::Daily(args) => daily::run(&factory, args).await?,
        Command::Financials(args) => fetch::financials(&factory, args).await?,
        Command::Sectors(args) => fetch::sectors(&factory, args).await?,
        Command::Flows(args) => fetch::flows(&factory, args).await?,
        Command::Macro(args) => fetch::macro_economic(&factory, args).await?,
        Command::Config(args) => config::run(&factory, args).await?,
    };

    output::render(&data, cli.pretty)
}

/// Selects the explicitly requested provider, or falls through to the
/// current default.
pub(crate) async fn resolve_client(
    factory: &SourceFactory,
    args: &FetchArgs,
) -> Result<Arc<dyn DataClient>, CliError> {
    let client = match args.source {
        Some(provider) => factory.client(provider, args.token.as_deref()).await?,
        None => factory.current_client().await?,
    };
    Ok(client)
}
