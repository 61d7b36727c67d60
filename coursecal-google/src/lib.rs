//! Google implementations of the coursecal service traits.
//!
//! All four services share one [`GoogleClient`], so a token refreshed by one
//! request is reused by the others.

pub mod calendar;
pub mod client;
pub mod error;
pub mod gmail;
pub mod session;
pub mod sheets;
pub mod storage;

use std::sync::Arc;

use coursecal_core::AppConfig;
use coursecal_core::services::Services;

pub use calendar::GoogleCalendar;
pub use client::GoogleClient;
pub use error::{GoogleError, GoogleResult};
pub use gmail::GoogleMail;
pub use session::{CredentialSource, Session};
pub use sheets::GoogleSheets;
pub use storage::GoogleStorage;

pub struct GoogleServices;

impl GoogleServices {
    /// Load the credential named in `config` and build the service bundle.
    pub fn connect(config: &AppConfig) -> GoogleResult<Services> {
        let session = Session::load(&config.credentials)?;
        Ok(Self::with_session(session, config))
    }

    pub fn with_session(session: Session, config: &AppConfig) -> Services {
        let client = GoogleClient::new(session);
        let google = &config.google;

        Services {
            calendar: Arc::new(GoogleCalendar::new(client.clone(), &google.calendar_url)),
            sheets: Arc::new(GoogleSheets::new(
                client.clone(),
                &google.sheets_url,
                &config.contacts.spreadsheet_id,
            )),
            mail: Arc::new(GoogleMail::new(client.clone(), &google.gmail_url, &config.watch.gmail_user_id)),
            blobs: Arc::new(GoogleStorage::new(client, &google.storage_url, &google.storage_upload_url)),
        }
    }
}
