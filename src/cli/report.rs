//! Handler for the `report` command.

use crate::cli::ReportArgs;
use crate::domain::id::ProtocolId;
use crate::error::Result;
use crate::infrastructure::bootstrap::{Adapters, Services};
use crate::infrastructure::config::settings::Config;

/// Build the protocol report from stored state and print it as JSON.
pub async fn execute(args: &ReportArgs) -> Result<()> {
    let config = Config::load(&args.config)?;
    let adapters = Adapters::from_config(&config)?;
    let services = Services::assemble(&config, &adapters)?;
    let report = services.pipeline.report(&ProtocolId::from(args.protocol.as_str())).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
