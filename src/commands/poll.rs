use std::path::Path;

use anyhow::Result;
use chrono::Utc;
use coursecal_core::sync::CalendarSync;

use crate::render::Render;

pub async fn run(config_path: Option<&Path>) -> Result<()> {
    let (config, services) = super::connect(config_path)?;
    let sync = CalendarSync::new(services, config)?;

    let reports = sync.handle_calendar_change(Utc::now()).await?;

    for report in &reports {
        println!("{}", report.render());
    }
    if reports.iter().all(|r| !r.has_changes()) {
        println!("No changes");
    }

    Ok(())
}
