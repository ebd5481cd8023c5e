use serde::Serialize;
use serde_json::Value;

use tickbridge_core::{HealthRecord, ProviderId, SourceFactory};

use crate::error::CliError;

#[derive(Debug, Serialize)]
struct SourceStatus {
    id: ProviderId,
    enabled: bool,
    available: bool,
    requires_token: bool,
    health: HealthRecord,
    is_default: bool,
}

#[derive(Debug, Serialize)]
struct SourcesResponse {
    default: ProviderId,
    sources: Vec<SourceStatus>,
}

pub async fn run(factory: &SourceFactory) -> Result<Value, CliError> {
    let default = factory.default_source().await;
    let availability = factory.available_sources().await;
    // Last-known records only; this command never probes a provider.
    let mut health = factory.health_report().await;

    let mut sources = Vec::with_capacity(ProviderId::ALL.len());
    for provider in ProviderId::ALL {
        let config = factory.source_config(provider).await;
        sources.push(SourceStatus {
            id: provider,
            enabled: config.enabled,
            available: availability.get(&provider).copied().unwrap_or(false),
            requires_token: provider.requires_token(),
            health: health.remove(&provider).unwrap_or_default(),
            is_default: provider == default,
        });
    }

    Ok(serde_json::to_value(SourcesResponse { default, sources })?)
}
