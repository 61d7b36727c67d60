//! Course registrations arriving by e-mail from the website contact form.
//!
//! The mailbox pushes a Pub/Sub notification for every new message. The
//! message after the pushed history id is fetched, and if it is a contact
//! form request the registrant is added to the course roster (or turned
//! away when the course is full) and gets an answer.

use std::sync::LazyLock;

use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, info, instrument};

use crate::config::AppConfig;
use crate::contacts::ContactSheet;
use crate::error::{CourseCalError, CourseCalResult};
use crate::mail::OutgoingEmail;
use crate::mapping::TagMapping;
use crate::services::Services;
use crate::tag::{Tag, TagKey};
use crate::templates::Templates;

static FORM_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?s)Von:\s*(?P<name>.+)\s+E-Mail:\s*(?P<email>.+)\s+Telefon:\s*(?P<phone>.+)\s+Gewünschter Kurs:\s*(?P<course>.+)\s+Nachrichtentext:\s*(?P<message>.+)\s*(--|$)",
    )
    .expect("registration pattern is valid")
});

/// Pub/Sub push request body.
#[derive(Debug, Deserialize)]
pub struct PushEnvelope {
    pub message: PushMessage,
    #[serde(default)]
    pub subscription: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushMessage {
    /// Base64 JSON of a [`MailboxNotification`]
    pub data: String,
    #[serde(default)]
    pub message_id: Option<String>,
}

/// What the mailbox publishes on every change.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MailboxNotification {
    #[serde(default)]
    pub email_address: Option<String>,
    #[serde(deserialize_with = "history_id_text")]
    pub history_id: String,
}

fn history_id_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum HistoryId {
        Number(u64),
        Text(String),
    }

    Ok(match HistoryId::deserialize(deserializer)? {
        HistoryId::Number(n) => n.to_string(),
        HistoryId::Text(s) => s,
    })
}

impl PushEnvelope {
    pub fn from_slice(body: &[u8]) -> CourseCalResult<Self> {
        serde_json::from_slice(body)
            .map_err(|e| CourseCalError::Registration(format!("Malformed push envelope: {}", e)))
    }

    /// Decode the mailbox notification carried in `message.data`.
    pub fn notification(&self) -> CourseCalResult<MailboxNotification> {
        let data = self.message.data.trim();
        let bytes = STANDARD
            .decode(data)
            .or_else(|_| URL_SAFE.decode(data))
            .map_err(|e| CourseCalError::Registration(format!("Push data is not base64: {}", e)))?;

        serde_json::from_slice(&bytes)
            .map_err(|e| CourseCalError::Registration(format!("Push data is not a mailbox notification: {}", e)))
    }
}

/// The fields of a contact form request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub course: String,
    pub message: String,
}

impl Registration {
    pub fn parse(text: &str) -> Option<Self> {
        let caps = FORM_PATTERN.captures(text)?;
        let field = |name: &str| {
            caps.name(name)
                .map(|m| m.as_str().trim().to_string())
                .unwrap_or_default()
        };

        Some(Registration {
            name: field("name"),
            email: field("email"),
            phone: field("phone"),
            course: field("course"),
            message: field("message"),
        })
    }

    /// The roster row: name, e-mail, phone.
    pub fn roster_row(&self) -> Vec<String> {
        vec![self.name.clone(), self.email.clone(), self.phone.clone()]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationOutcome {
    /// Not a registration; nothing was changed or sent
    Ignored(String),
    Accepted { tag: Tag, email: String },
    /// The course was full
    Denied { tag: Tag, email: String },
}

pub struct RegistrationProcessor {
    services: Services,
    config: AppConfig,
    templates: Templates,
}

impl RegistrationProcessor {
    pub fn new(services: Services, config: AppConfig) -> Self {
        let templates = Templates::new(&config.mail.company_name);
        RegistrationProcessor {
            services,
            config,
            templates,
        }
    }

    /// Handle a raw Pub/Sub push body.
    pub async fn process_push(&self, body: &[u8]) -> CourseCalResult<RegistrationOutcome> {
        let notification = PushEnvelope::from_slice(body)?.notification()?;
        self.process(&notification.history_id).await
    }

    #[instrument(skip(self))]
    pub async fn process(&self, history_id: &str) -> CourseCalResult<RegistrationOutcome> {
        let Some(message) = self.services.mail.message_after(history_id).await? else {
            info!("No message after history id");
            return Ok(RegistrationOutcome::Ignored("no new message".into()));
        };

        let subject = message.header("Subject").unwrap_or_default();
        if subject != self.config.registration.subject {
            info!(message_id = %message.id, %subject, "Other message");
            return Ok(RegistrationOutcome::Ignored(format!("subject '{}'", subject)));
        }

        let registration = message
            .text_body
            .as_deref()
            .and_then(Registration::parse)
            .or_else(|| Registration::parse(&message.snippet));
        let Some(registration) = registration else {
            info!(message_id = %message.id, "Contact form request without registration fields");
            return Ok(RegistrationOutcome::Ignored("no registration fields".into()));
        };

        let storage = &self.config.storage;
        let tag = TagMapping::load(self.services.blobs.as_ref(), &storage.bucket)
            .await?
            .resolve(&registration.course);
        let course_info = self.course_info(&tag).await?;

        let range = TagKey::Tagged(tag.clone()).contacts_range(&self.config.contacts.range);
        let roster = ContactSheet::from_values(self.services.sheets.values(&range).await?);
        let full = roster.participant_count() > self.config.registration.capacity;

        let body = if full {
            self.templates
                .deny_registration()
                .render(&[("name", registration.name.as_str()), ("course", tag.as_str())])
        } else {
            self.services
                .sheets
                .append_rows(tag.as_str(), vec![registration.roster_row()])
                .await?;

            self.templates.accept_registration().render(&[
                ("name", registration.name.as_str()),
                ("course", tag.as_str()),
                ("info", course_info.as_str()),
            ])
        };

        let reply = OutgoingEmail::new(
            &self.config.mail.sender,
            vec![registration.email.clone()],
            tag.as_str(),
            body,
        );
        let message_id = self.services.mail.send(&reply).await?;

        info!(
            %tag,
            email = %registration.email,
            participants = roster.participant_count(),
            accepted = !full,
            %message_id,
            "Answered registration"
        );

        Ok(if full {
            RegistrationOutcome::Denied {
                tag,
                email: registration.email,
            }
        } else {
            RegistrationOutcome::Accepted {
                tag,
                email: registration.email,
            }
        })
    }

    /// `{tag}.txt` from the course bucket, empty when there is none.
    async fn course_info(&self, tag: &Tag) -> CourseCalResult<String> {
        let bucket = &self.config.storage.course_bucket;
        if bucket.is_empty() {
            return Ok(String::new());
        }

        let name = format!("{}.txt", tag);
        match self.services.blobs.get(bucket, &name).await? {
            Some(bytes) => Ok(String::from_utf8_lossy(&bytes).into_owned()),
            None => {
                debug!(%tag, "No course info");
                Ok(String::new())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::TAG_MAPPING_OBJECT;
    use crate::services::MailMessage;
    use crate::testing::Fakes;

    const FORM: &str = "Von: Eva Muster\nE-Mail: eva@example.com\nTelefon: +43 660 123\n\
                        Gewünschter Kurs: Salsa Anfänger\nNachrichtentext: Ich freue mich!\n--\nGesendet von der Website";

    fn config() -> AppConfig {
        let mut config = AppConfig::default();
        config.storage.bucket = "calendar".into();
        config.storage.course_bucket = "courses".into();
        config.mail.sender = "kurse@example.com".into();
        config.mail.company_name = "Tanzschule".into();
        config.registration.capacity = 2;
        config
    }

    fn form_message(subject: &str) -> MailMessage {
        MailMessage {
            id: "m1".into(),
            headers: vec![
                ("From".into(), "website@example.com".into()),
                ("subject".into(), subject.into()),
            ],
            snippet: "Von: Eva Muster E-Mail: eva@example.com".into(),
            text_body: Some(FORM.into()),
        }
    }

    fn setup(participants: usize) -> Fakes {
        let fakes = Fakes::default();
        fakes.blobs.insert(
            "calendar",
            TAG_MAPPING_OBJECT,
            r#"{"Salsa Anfänger":"Salsa1"}"#.as_bytes().to_vec(),
        );
        fakes
            .blobs
            .insert("courses", "Salsa1.txt", "Montags 19:00, Studio 2".as_bytes().to_vec());

        let mut rows = vec![vec!["Name", "E-mail", "Whatsapp", "Preference"]];
        rows.extend(std::iter::repeat_n(vec!["X", "x@example.com", "", "email"], participants));
        fakes.sheets.set_values("Salsa1!A:D", rows);
        fakes
    }

    #[test]
    fn parses_contact_form() {
        let registration = Registration::parse(FORM).unwrap();

        assert_eq!(registration.name, "Eva Muster");
        assert_eq!(registration.email, "eva@example.com");
        assert_eq!(registration.phone, "+43 660 123");
        assert_eq!(registration.course, "Salsa Anfänger");
        assert_eq!(registration.message, "Ich freue mich!\n--\nGesendet von der Website");
    }

    #[test]
    fn unrelated_text_does_not_parse() {
        assert_eq!(Registration::parse("Hallo, wann ist der nächste Kurs?"), None);
    }

    #[test]
    fn decodes_push_envelope() {
        let data = STANDARD.encode(br#"{"emailAddress":"kurse@example.com","historyId":9876}"#);
        let body = format!(r#"{{"message":{{"data":"{}","messageId":"1"}},"subscription":"s"}}"#, data);

        let notification = PushEnvelope::from_slice(body.as_bytes())
            .unwrap()
            .notification()
            .unwrap();

        assert_eq!(notification.history_id, "9876");
        assert_eq!(notification.email_address.as_deref(), Some("kurse@example.com"));
    }

    #[test]
    fn bad_push_data_is_a_registration_error() {
        let envelope = PushEnvelope::from_slice(br#"{"message":{"data":"!!!"}}"#).unwrap();
        assert!(matches!(envelope.notification(), Err(CourseCalError::Registration(_))));
        assert!(PushEnvelope::from_slice(b"[]").is_err());
    }

    #[tokio::test]
    async fn accepts_when_course_has_room() {
        let fakes = setup(2);
        fakes.mail.deliver("100", form_message("Kontaktformularanfrage"));
        let processor = RegistrationProcessor::new(fakes.services(), config());

        let outcome = processor.process("100").await.unwrap();

        assert_eq!(
            outcome,
            RegistrationOutcome::Accepted {
                tag: Tag::new("Salsa1"),
                email: "eva@example.com".into()
            }
        );
        assert_eq!(
            fakes.sheets.appended(),
            vec![(
                "Salsa1".to_string(),
                vec![vec!["Eva Muster".to_string(), "eva@example.com".to_string(), "+43 660 123".to_string()]]
            )]
        );

        let reply = &fakes.mail.sent()[0];
        assert_eq!(reply.to, vec!["eva@example.com"]);
        assert_eq!(reply.subject, "Salsa1");
        assert!(reply.body.starts_with("Liebe(r) Eva Muster,"));
        assert!(reply.body.contains("Montags 19:00, Studio 2"));
    }

    #[tokio::test]
    async fn denies_when_course_is_full() {
        let fakes = setup(3);
        fakes.mail.deliver("100", form_message("Kontaktformularanfrage"));
        let processor = RegistrationProcessor::new(fakes.services(), config());

        let outcome = processor.process("100").await.unwrap();

        assert!(matches!(outcome, RegistrationOutcome::Denied { .. }));
        assert!(fakes.sheets.appended().is_empty());
        assert!(fakes.mail.sent()[0].body.contains("nicht akzeptieren"));
    }

    #[tokio::test]
    async fn other_subjects_are_ignored() {
        let fakes = setup(0);
        fakes.mail.deliver("100", form_message("Rechnung"));
        let processor = RegistrationProcessor::new(fakes.services(), config());

        let outcome = processor.process("100").await.unwrap();

        assert!(matches!(outcome, RegistrationOutcome::Ignored(_)));
        assert!(fakes.mail.sent().is_empty());
    }

    #[tokio::test]
    async fn falls_back_to_snippet_and_ignores_unparseable_forms() {
        let fakes = setup(0);
        let mut message = form_message("Kontaktformularanfrage");
        message.text_body = None;
        message.snippet = FORM.replace('\n', " ");
        fakes.mail.deliver("100", message);

        let mut broken = form_message("Kontaktformularanfrage");
        broken.text_body = Some("Bitte rufen Sie mich an".into());
        broken.snippet = "Bitte rufen Sie mich an".into();
        fakes.mail.deliver("200", broken);

        let processor = RegistrationProcessor::new(fakes.services(), config());

        assert!(matches!(
            processor.process("100").await.unwrap(),
            RegistrationOutcome::Accepted { .. }
        ));
        assert!(matches!(
            processor.process("200").await.unwrap(),
            RegistrationOutcome::Ignored(_)
        ));
        assert!(matches!(
            processor.process("300").await.unwrap(),
            RegistrationOutcome::Ignored(_)
        ));
    }

    #[tokio::test]
    async fn processes_push_body() {
        let fakes = setup(0);
        fakes.mail.deliver("42", form_message("Kontaktformularanfrage"));
        let processor = RegistrationProcessor::new(fakes.services(), config());

        let data = STANDARD.encode(br#"{"emailAddress":"kurse@example.com","historyId":"42"}"#);
        let body = format!(r#"{{"message":{{"data":"{}"}}}}"#, data);

        let outcome = processor.process_push(body.as_bytes()).await.unwrap();
        assert!(matches!(outcome, RegistrationOutcome::Accepted { .. }));
    }
}
