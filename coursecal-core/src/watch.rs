//! Renewal of the push subscriptions on the admin calendar and the mailbox.
//!
//! Both expire and have no automatic renewal, so a scheduled job replaces
//! them. Calendar channels are recorded in the history bucket so the next
//! renewal can stop them first.

use tracing::{info, warn};

use crate::config::{AppConfig, require};
use crate::error::{CourseCalError, CourseCalResult};
use crate::services::{MailboxWatch, Services, WatchChannel, WatchParams, WatchRequest};

pub const CALENDAR_WATCHES_OBJECT: &str = "calendar_watches.json";
const CHANNEL_TYPE: &str = "web_hook";

pub struct WatchRenewer {
    services: Services,
    config: AppConfig,
}

impl WatchRenewer {
    pub fn new(services: Services, config: AppConfig) -> Self {
        WatchRenewer { services, config }
    }

    /// Stop the recorded calendar channels and open a new one.
    pub async fn renew_calendar_watch(&self) -> CourseCalResult<WatchChannel> {
        let watch = &self.config.watch;
        let address = require(&watch.webhook_url, "watch.webhook_url")?;
        let calendar_id = require(&self.config.calendar.admin_calendar_id, "calendar.admin_calendar_id")?;

        for channel in self.load_channels().await? {
            // Expired channels can no longer be stopped
            if let Err(e) = self.services.calendar.stop_channel(&channel).await {
                warn!(channel_id = ?channel.id, error = %e, "Could not stop channel");
            }
        }
        self.save_channels(&[]).await?;

        let mut last_error = String::from("no active channel in response");
        for attempt in 1..=watch.max_tries {
            let request = WatchRequest {
                id: uuid::Uuid::new_v4().to_string(),
                kind: CHANNEL_TYPE.into(),
                address: address.to_string(),
                params: WatchParams {
                    ttl: watch.channel_ttl_secs.to_string(),
                },
            };

            match self.services.calendar.watch_events(calendar_id, &request).await {
                Ok(channel) if channel.is_active() => {
                    info!(attempt, channel_id = ?channel.id, resource_id = ?channel.resource_id, "Calendar watch renewed");
                    self.save_channels(std::slice::from_ref(&channel)).await?;
                    return Ok(channel);
                }
                Ok(channel) => {
                    warn!(attempt, response = ?channel, "Watch response without channel ids");
                    last_error = "no active channel in response".into();
                }
                Err(e) => {
                    warn!(attempt, error = %e, "Watch request failed");
                    last_error = e.to_string();
                }
            }
        }

        Err(CourseCalError::api(
            "calendar",
            format!("Could not renew watch after {} tries: {}", watch.max_tries, last_error),
        ))
    }

    /// Stop the mailbox watch and start a new one on the registration label.
    pub async fn renew_gmail_watch(&self) -> CourseCalResult<MailboxWatch> {
        let watch = &self.config.watch;
        let topic = require(&watch.gmail_topic, "watch.gmail_topic")?;
        let label_ids: Vec<String> = if watch.gmail_label_id.is_empty() {
            Vec::new()
        } else {
            vec![watch.gmail_label_id.clone()]
        };

        if let Err(e) = self.services.mail.stop().await {
            warn!(error = %e, "Could not stop mailbox watch");
        }

        let mut last_error = String::from("no historyId in response");
        for attempt in 1..=watch.max_tries {
            match self.services.mail.watch(&label_ids, topic).await {
                Ok(response) if response.history_id.is_some() => {
                    info!(attempt, history_id = ?response.history_id, expiration = ?response.expiration, "Mailbox watch renewed");
                    return Ok(response);
                }
                Ok(response) => {
                    warn!(attempt, ?response, "Watch response without historyId");
                    last_error = "no historyId in response".into();
                }
                Err(e) => {
                    warn!(attempt, error = %e, "Watch request failed");
                    last_error = e.to_string();
                }
            }
        }

        Err(CourseCalError::api(
            "gmail",
            format!("Could not renew watch after {} tries: {}", watch.max_tries, last_error),
        ))
    }

    async fn load_channels(&self) -> CourseCalResult<Vec<WatchChannel>> {
        match self
            .services
            .blobs
            .get(&self.config.storage.bucket, CALENDAR_WATCHES_OBJECT)
            .await?
        {
            Some(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                CourseCalError::Storage(format!("Could not parse {}: {}", CALENDAR_WATCHES_OBJECT, e))
            }),
            None => Ok(Vec::new()),
        }
    }

    async fn save_channels(&self, channels: &[WatchChannel]) -> CourseCalResult<()> {
        let bytes = serde_json::to_vec(channels)?;
        self.services
            .blobs
            .put(&self.config.storage.bucket, CALENDAR_WATCHES_OBJECT, bytes, "application/json")
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Fakes;

    fn config() -> AppConfig {
        let mut config = AppConfig::default();
        config.storage.bucket = "history".into();
        config.calendar.admin_calendar_id = "admin@group.calendar.google.com".into();
        config.watch.webhook_url = "https://hooks.example.com/notifications".into();
        config.watch.gmail_label_id = "Label_7".into();
        config.watch.gmail_topic = "projects/p/topics/registrations".into();
        config
    }

    fn channel(id: &str) -> WatchChannel {
        WatchChannel {
            id: Some(id.into()),
            resource_id: Some(format!("res-{}", id)),
            extra: Default::default(),
        }
    }

    #[tokio::test]
    async fn calendar_renewal_stops_recorded_channels_first() {
        let fakes = Fakes::default();
        fakes.blobs.insert(
            "history",
            CALENDAR_WATCHES_OBJECT,
            serde_json::to_vec(&vec![channel("old-1"), channel("old-2")]).unwrap(),
        );
        fakes.calendar.fail_stops();
        let renewer = WatchRenewer::new(fakes.services(), config());

        let renewed = renewer.renew_calendar_watch().await.unwrap();

        assert_eq!(fakes.calendar.stopped().len(), 2);
        let requests = fakes.calendar.watch_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].0, "admin@group.calendar.google.com");
        assert_eq!(requests[0].1.kind, "web_hook");
        assert_eq!(requests[0].1.params.ttl, "604800");
        assert_eq!(renewed.id.as_deref(), Some(requests[0].1.id.as_str()));

        let stored: Vec<WatchChannel> =
            serde_json::from_slice(&fakes.blobs.read("history", CALENDAR_WATCHES_OBJECT).unwrap()).unwrap();
        assert_eq!(stored, vec![renewed]);
    }

    #[tokio::test]
    async fn calendar_renewal_retries_until_channel_is_active() {
        let fakes = Fakes::default();
        let empty = WatchChannel {
            id: None,
            resource_id: None,
            extra: Default::default(),
        };
        fakes.calendar.push_watch_response(empty.clone());
        fakes.calendar.push_watch_response(channel("second"));
        let renewer = WatchRenewer::new(fakes.services(), config());

        let renewed = renewer.renew_calendar_watch().await.unwrap();

        assert_eq!(renewed.id.as_deref(), Some("second"));
        let requests = fakes.calendar.watch_requests();
        assert_eq!(requests.len(), 2);
        assert_ne!(requests[0].1.id, requests[1].1.id);
    }

    #[tokio::test]
    async fn calendar_renewal_fails_after_max_tries() {
        let fakes = Fakes::default();
        let empty = WatchChannel {
            id: Some("x".into()),
            resource_id: None,
            extra: Default::default(),
        };
        for _ in 0..3 {
            fakes.calendar.push_watch_response(empty.clone());
        }
        let renewer = WatchRenewer::new(fakes.services(), config());

        let err = renewer.renew_calendar_watch().await.unwrap_err();

        assert!(matches!(err, CourseCalError::Api { service: "calendar", .. }));
        assert_eq!(fakes.calendar.watch_requests().len(), 3);
        assert_eq!(
            fakes.blobs.read("history", CALENDAR_WATCHES_OBJECT).as_deref(),
            Some(&b"[]"[..])
        );
    }

    #[tokio::test]
    async fn calendar_renewal_needs_webhook_url() {
        let fakes = Fakes::default();
        let mut config = config();
        config.watch.webhook_url.clear();

        let err = WatchRenewer::new(fakes.services(), config)
            .renew_calendar_watch()
            .await
            .unwrap_err();
        assert!(matches!(err, CourseCalError::Config(_)));
    }

    #[tokio::test]
    async fn gmail_renewal_stops_then_watches_label() {
        let fakes = Fakes::default();
        fakes.mail.push_watch_response(MailboxWatch {
            history_id: None,
            expiration: None,
        });
        let renewer = WatchRenewer::new(fakes.services(), config());

        let watch = renewer.renew_gmail_watch().await.unwrap();

        assert_eq!(fakes.mail.stop_count(), 1);
        assert_eq!(watch.history_id.as_deref(), Some("1000"));
        let calls = fakes.mail.watch_calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0], (vec!["Label_7".to_string()], "projects/p/topics/registrations".to_string()));
    }
}
