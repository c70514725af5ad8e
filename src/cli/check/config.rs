use std::path::Path;

use crate::domain::risk::RiskComponent;
use crate::error::Result;
use crate::infrastructure::config::settings::{Config, StorageConfig};

/// Validate configuration file without starting the service.
pub fn execute_config<P: AsRef<Path>>(config_path: P) -> Result<()> {
    let path = config_path.as_ref();
    println!("Checking configuration: {}", path.display());
    println!();

    let config = Config::load(path)?;
    let weights = config.risk.weights()?;

    println!("✓ Configuration file is valid");
    println!();
    println!("Summary:");
    for network in &config.networks {
        let state = if network.enabled { "enabled" } else { "disabled" };
        println!("  Network: {} ({state})", network.id);
    }
    for protocol in &config.protocols {
        println!(
            "  Protocol: {} on {} ({} addresses)",
            protocol.id,
            protocol.network,
            protocol.addresses.len()
        );
    }
    let weights: Vec<String> = RiskComponent::ALL
        .iter()
        .map(|c| format!("{} {:.2}", c.as_str(), weights.get(*c)))
        .collect();
    println!("  Weights: {}", weights.join(", "));
    match &config.storage {
        StorageConfig::Memory => println!("  Storage: memory"),
        StorageConfig::Sqlite { path } => println!("  Storage: sqlite ({})", path.display()),
    }
    println!();

    if config.governance.tally_api_key.is_some() {
        println!("✓ Tally API key found (from TALLY_API_KEY env var)");
    } else if config.protocols.iter().any(|p| p.tally_organization.is_some()) {
        println!("⚠ Tally organizations configured but TALLY_API_KEY is not set");
    }
    if config.market.coingecko_api_key.is_some() {
        println!("✓ CoinGecko API key found (from COINGECKO_API_KEY env var)");
    }

    println!();
    println!("Configuration is ready to use.");
    Ok(())
}
