use std::path::Path;

use anyhow::Result;
use chrono::Utc;
use coursecal_core::Tag;
use coursecal_core::date_range::DayRange;
use coursecal_core::sync::CalendarSync;

pub async fn run(config_path: Option<&Path>, tag: Option<String>, days: Option<DayRange>) -> Result<()> {
    let (config, services) = super::connect(config_path)?;
    let sync = CalendarSync::new(services, config)?;

    let tag = tag.map(Tag::new);
    let sent = sync.send_schedule(tag.as_ref(), days, Utc::now()).await?;

    println!("Sent {} schedule {}", sent, if sent == 1 { "mail" } else { "mails" });
    Ok(())
}
