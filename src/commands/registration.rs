use std::path::Path;

use anyhow::Result;
use coursecal_core::registration::RegistrationProcessor;

use crate::render::Render;

pub async fn run(config_path: Option<&Path>, history_id: &str) -> Result<()> {
    let (config, services) = super::connect(config_path)?;

    let outcome = RegistrationProcessor::new(services, config).process(history_id).await?;

    println!("{}", outcome.render());
    Ok(())
}
