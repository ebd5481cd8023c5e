//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use tickbridge_core::ProviderId;

#[derive(Debug, Parser)]
#[command(
    name = "tickbridge",
    about = "Multi-provider China A-share market data with source failover",
    version
)]
pub struct Cli {
    /// Path of the source configuration file.
    #[arg(long, global = true, default_value = "tickbridge-sources.json")]
    pub config: PathBuf,

    /// Serve deterministic offline fixtures instead of calling upstreams.
    #[arg(long, global = true)]
    pub offline: bool,

    /// Pretty-print the JSON output.
    #[arg(long, global = true)]
    pub pretty: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show provider availability and the current default source.
    Sources,
    /// Switch the default source, with validation and rollback.
    Switch(SwitchArgs),
    /// Fetch the normalized stock listing.
    Basics(FetchArgs),
    /// Fetch daily OHLCV bars for one instrument.
    Daily(DailyArgs),
    /// Fetch the latest financial indicators.
    Financials(FetchArgs),
    /// Fetch today's sector ranking.
    Sectors(FetchArgs),
    /// Fetch recent market-wide money flow.
    Flows(FetchArgs),
    /// Fetch macro-economic indicator series.
    #[command(name = "macro")]
    Macro(FetchArgs),
    /// Inspect or edit the source configuration.
    Config(ConfigArgs),
}

#[derive(Debug, Args)]
pub struct SwitchArgs {
    /// Provider to switch to.
    pub source: ProviderId,

    /// Credential token, merged into the provider's configuration on a
    /// successful switch.
    #[arg(long)]
    pub token: Option<String>,
}

#[derive(Debug, Args)]
pub struct FetchArgs {
    /// Provider to query; defaults to the current default source.
    #[arg(long)]
    pub source: Option<ProviderId>,

    /// Credential token for the selected provider.
    #[arg(long, requires = "source")]
    pub token: Option<String>,
}

#[derive(Debug, Args)]
pub struct DailyArgs {
    /// Six-digit A-share instrument code, e.g. 600519.
    pub code: String,

    /// Range start, ISO date (YYYY-MM-DD).
    #[arg(long)]
    pub start: String,

    /// Range end, ISO date (YYYY-MM-DD).
    #[arg(long)]
    pub end: String,

    #[command(flatten)]
    pub fetch: FetchArgs,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the effective configuration (credentials redacted).
    Show,
    /// Persist a new default source without probing it.
    SetDefault { source: ProviderId },
    /// Store a credential token for a provider.
    SetToken {
        source: ProviderId,
        token: String,
    },
    /// Enable or disable a provider.
    Enable { source: ProviderId },
    Disable { source: ProviderId },
}
