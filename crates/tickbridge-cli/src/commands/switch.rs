use serde::Serialize;
use serde_json::Value;

use tickbridge_core::{HealthRecord, ProviderId, SourceFactory};

use crate::cli::SwitchArgs;
use crate::error::CliError;

#[derive(Debug, Serialize)]
struct SwitchResponse {
    switched_to: ProviderId,
    health: HealthRecord,
}

pub async fn run(factory: &SourceFactory, args: &SwitchArgs) -> Result<Value, CliError> {
    let client = factory
        .switch_data_source(args.source, args.token.as_deref())
        .await?;

    Ok(serde_json::to_value(SwitchResponse {
        switched_to: client.id(),
        health: client.health(),
    })?)
}
