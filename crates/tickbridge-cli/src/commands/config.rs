use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use tickbridge_core::{ProviderId, SourceFactory};

use crate::cli::{ConfigArgs, ConfigCommand};
use crate::error::CliError;

#[derive(Debug, Serialize)]
struct RedactedSource {
    enabled: bool,
    credentials: BTreeMap<String, &'static str>,
    rate_limit_hint: Option<u32>,
}

#[derive(Debug, Serialize)]
struct ConfigView {
    default_source: ProviderId,
    sources: BTreeMap<ProviderId, RedactedSource>,
}

#[derive(Debug, Serialize)]
struct ConfigUpdated {
    updated: ProviderId,
}

pub async fn run(factory: &SourceFactory, args: &ConfigArgs) -> Result<Value, CliError> {
    match &args.command {
        ConfigCommand::Show => show(factory).await,
        ConfigCommand::SetDefault { source } => {
            factory.set_default_source(*source).await?;
            Ok(serde_json::to_value(ConfigUpdated { updated: *source })?)
        }
        ConfigCommand::SetToken { source, token } => {
            let mut config = factory.source_config(*source).await;
            config.credentials.insert("token".to_owned(), token.clone());
            factory.update_source_config(*source, config).await?;
            Ok(serde_json::to_value(ConfigUpdated { updated: *source })?)
        }
        ConfigCommand::Enable { source } => set_enabled(factory, *source, true).await,
        ConfigCommand::Disable { source } => set_enabled(factory, *source, false).await,
    }
}

async fn show(factory: &SourceFactory) -> Result<Value, CliError> {
    let default_source = factory.default_source().await;
    let mut sources = BTreeMap::new();
    for provider in ProviderId::ALL {
        let config = factory.source_config(provider).await;
        sources.insert(
            provider,
            RedactedSource {
                enabled: config.enabled,
                // Credential names are safe to show, values never are.
                credentials: config
                    .credentials
                    .keys()
                    .map(|name| (name.clone(), "<redacted>"))
                    .collect(),
                rate_limit_hint: config.rate_limit_hint,
            },
        );
    }
    Ok(serde_json::to_value(ConfigView {
        default_source,
        sources,
    })?)
}

async fn set_enabled(
    factory: &SourceFactory,
    provider: ProviderId,
    enabled: bool,
) -> Result<Value, CliError> {
    let mut config = factory.source_config(provider).await;
    config.enabled = enabled;
    factory.update_source_config(provider, config).await?;
    Ok(serde_json::to_value(ConfigUpdated { updated: provider })?)
}
