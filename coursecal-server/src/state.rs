use std::sync::Arc;

use anyhow::{Context, Result};
use coursecal_core::AppConfig;
use coursecal_core::registration::RegistrationProcessor;
use coursecal_core::services::Services;
use coursecal_core::sync::CalendarSync;
use coursecal_google::GoogleServices;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub sync: Arc<CalendarSync>,
    pub registrations: Arc<RegistrationProcessor>,
}

impl AppState {
    /// Connect to Google with the credential named in `config`.
    pub fn connect(config: &AppConfig) -> Result<Self> {
        let services = GoogleServices::connect(config).context("Failed to load Google credentials")?;
        Self::with_services(services, config.clone())
    }

    pub fn with_services(services: Services, config: AppConfig) -> Result<Self> {
        let sync = CalendarSync::new(services.clone(), config.clone())?;
        let registrations = RegistrationProcessor::new(services, config);

        Ok(AppState {
            sync: Arc::new(sync),
            registrations: Arc::new(registrations),
        })
    }
}
