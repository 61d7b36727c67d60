use std::path::Path;

use anyhow::Result;
use coursecal_core::watch::WatchRenewer;
use owo_colors::OwoColorize;

pub async fn run_calendar(config_path: Option<&Path>) -> Result<()> {
    let (config, services) = super::connect(config_path)?;

    let channel = WatchRenewer::new(services, config).renew_calendar_watch().await?;

    println!(
        "{} calendar channel {} (resource {})",
        "Opened".green(),
        channel.id.as_deref().unwrap_or_default(),
        channel.resource_id.as_deref().unwrap_or_default().dimmed()
    );
    Ok(())
}

pub async fn run_gmail(config_path: Option<&Path>) -> Result<()> {
    let (config, services) = super::connect(config_path)?;

    let watch = WatchRenewer::new(services, config).renew_gmail_watch().await?;

    println!(
        "{} mailbox watch at history {}",
        "Started".green(),
        watch.history_id.as_deref().unwrap_or_default()
    );
    Ok(())
}
