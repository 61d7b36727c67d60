//! Participant notifications: one e-mail per tag group.

use std::sync::Arc;

use tracing::{info, warn};

use crate::config::AppConfig;
use crate::contacts::ContactSheet;
use crate::event::CalendarEvent;
use crate::mail::OutgoingEmail;
use crate::schedule::{group_by_tag, render_schedule};
use crate::services::{MailService, Services, SheetService};
use crate::tag::{Tag, TagKey};
use crate::templates::{NoticeKind, Templates};

pub struct Notifier {
    sheets: Arc<dyn SheetService>,
    mail: Arc<dyn MailService>,
    templates: Templates,
    sender: String,
    contacts_range: String,
    period: String,
}

impl Notifier {
    pub fn new(services: &Services, config: &AppConfig) -> Self {
        Notifier {
            sheets: services.sheets.clone(),
            mail: services.mail.clone(),
            templates: Templates::new(&config.mail.company_name),
            sender: config.mail.sender.clone(),
            contacts_range: config.contacts.range.clone(),
            period: config.mail.schedule_period.clone(),
        }
    }

    /// Send `kind` notices for `events`, one message per tag group.
    ///
    /// With `only_tag`, other groups are skipped. A group that fails is
    /// logged and the rest still go out. Returns the number of messages sent.
    pub async fn notify(&self, events: Vec<CalendarEvent>, kind: NoticeKind, only_tag: Option<&Tag>) -> usize {
        let mut sent = 0;

        for (key, group) in group_by_tag(events) {
            if let Some(only) = only_tag {
                if key.tag() != Some(only) {
                    continue;
                }
            }

            if self.notify_group(&key, &group, kind).await {
                sent += 1;
            }
        }

        sent
    }

    async fn notify_group(&self, key: &TagKey, events: &[CalendarEvent], kind: NoticeKind) -> bool {
        let range = key.contacts_range(&self.contacts_range);
        let rows = match self.sheets.values(&range).await {
            Ok(rows) => rows,
            Err(e) => {
                warn!(tag = %key, range = %range, error = %e, "Could not read contacts");
                return false;
            }
        };

        let recipients = ContactSheet::from_values(rows).email_recipients();
        if recipients.is_empty() {
            warn!(tag = %key, %kind, "No e-mail recipients, skipping notice");
            return false;
        }

        let tag = key.to_string();
        let schedule = render_schedule(events);
        let body = self.templates.notice(kind).render(&[
            ("tag", tag.as_str()),
            ("period", self.period.as_str()),
            ("schedule", schedule.as_str()),
        ]);
        let email = OutgoingEmail::new(&self.sender, recipients, format!("[{}] Salsa Kurs", tag), body);

        match self.mail.send(&email).await {
            Ok(message_id) => {
                info!(tag = %key, %kind, to = %email.recipients(), %message_id, "Sent notice");
                true
            }
            Err(e) => {
                warn!(tag = %key, %kind, error = %e, "Could not send notice");
                false
            }
        }
    }
}
