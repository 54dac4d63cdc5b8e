use anyhow::Result;
use colored::Colorize;

use steadfast_core::config as core_config;
use steadfast_core::transport::redact_credentials;
use steadfast_core::{HealthMonitor, PostgresTransport, Transport};

use crate::cli::ConfigCommands;

/// One probe against the primary with the configured timeout.
pub async fn handle_probe() -> Result<()> {
    let config = core_config::load_config().map_err(|e| anyhow::anyhow!(e))?;
    let postgres = PostgresTransport::connect_lazy(&config.primary)?;
    let endpoint = postgres.name().to_string();
    let monitor = HealthMonitor::new(std::sync::Arc::new(postgres), config.health.clone());

    if monitor.manual_probe().await {
        println!("{} Primary {} is reachable", "✓".green(), endpoint);
        Ok(())
    } else {
        println!("{} Primary {} did not answer within {} ms", "✗".red(), endpoint, config.health.probe_timeout_ms);
        anyhow::bail!("primary transport unhealthy")
    }
}

pub fn handle_config_command(cmd: ConfigCommands) -> Result<()> {
    match cmd {
        ConfigCommands::Show { json } => show_config(json),
    }
}

fn show_config(json: bool) -> Result<()> {
    let config = core_config::load_config().map_err(|e| anyhow::anyhow!(e))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    println!("{}", "Health Probe:".cyan().bold());
    println!("  Interval: {}s", config.health.probe_interval_secs);
    println!("  Timeout: {}ms", config.health.probe_timeout_ms);

    println!("{}", "Read Retry:".cyan().bold());
    println!("  Max attempts: {}", config.retry.max_attempts);
    println!("  Delay: {}ms .. {}ms", config.retry.base_delay_ms, config.retry.max_delay_ms);

    println!("{}", "Primary:".cyan().bold());
    let url = config.primary.database_url.as_deref().map(redact_credentials);
    println!("  Database: {}", url.as_deref().unwrap_or("(not set)"));
    println!("  Pool size: {}", config.primary.max_connections);

    println!("{}", "Secondary:".cyan().bold());
    println!("  Base URL: {}", config.secondary.base_url.as_deref().unwrap_or("(not set)"));
    println!("  API Key: {}", config.secondary.api_key.as_deref().map(mask_key).unwrap_or_default());

    println!("{}", "Protected Fields:".cyan().bold());
    for (record_type, fields) in &config.protected_fields {
        println!("  {}: {}", record_type, fields.join(", "));
    }
    Ok(())
}

fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}
