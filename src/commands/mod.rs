pub mod poll;
pub mod registration;
pub mod schedule;
pub mod watch;

use std::path::Path;

use anyhow::{Context, Result};
use coursecal_core::AppConfig;
use coursecal_core::services::Services;
use coursecal_google::GoogleServices;
use tracing::debug;

/// Load and validate the config, then connect to Google.
pub fn connect(config_path: Option<&Path>) -> Result<(AppConfig, Services)> {
    let config = AppConfig::load(config_path).context("Failed to load configuration")?;
    config.validate()?;
    debug!(admin_calendar = %config.calendar.admin_calendar_id, per_tag = config.calendar.per_tag, "Configuration loaded");

    let services = GoogleServices::connect(&config).context("Failed to load Google credentials")?;
    Ok((config, services))
}
