//! Gmail API v1.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD};
use coursecal_core::CourseCalResult;
use coursecal_core::mail::OutgoingEmail;
use coursecal_core::services::{MailMessage, MailService, MailboxWatch};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, instrument};

use crate::client::{GoogleClient, endpoint};

const SERVICE: &str = "gmail";

pub struct GoogleMail {
    client: GoogleClient,
    base_url: String,
    user_id: String,
}

#[derive(Deserialize)]
struct SentMessage {
    id: String,
}

#[derive(Deserialize)]
struct HistoryPage {
    #[serde(default)]
    history: Vec<HistoryRecord>,
}

#[derive(Deserialize)]
struct HistoryRecord {
    #[serde(default)]
    messages: Vec<MessageRef>,
}

#[derive(Deserialize)]
struct MessageRef {
    id: String,
}

#[derive(Debug, Deserialize)]
pub struct GmailMessage {
    pub id: String,
    #[serde(default)]
    pub snippet: String,
    #[serde(default)]
    pub payload: Option<MessagePart>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePart {
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub headers: Vec<Header>,
    #[serde(default)]
    pub body: Option<PartBody>,
    #[serde(default)]
    pub parts: Vec<MessagePart>,
}

#[derive(Debug, Deserialize)]
pub struct Header {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Deserialize)]
pub struct PartBody {
    #[serde(default)]
    pub data: Option<String>,
}

impl MessagePart {
    /// Depth-first search for the first decodable text/plain body.
    fn plain_text(&self) -> Option<String> {
        if self.mime_type.eq_ignore_ascii_case("text/plain") {
            if let Some(text) = self.body.as_ref().and_then(|b| b.data.as_deref()).and_then(decode_body) {
                return Some(text);
            }
        }
        self.parts.iter().find_map(MessagePart::plain_text)
    }
}

fn decode_body(data: &str) -> Option<String> {
    let bytes = URL_SAFE
        .decode(data)
        .or_else(|_| URL_SAFE_NO_PAD.decode(data))
        .ok()?;
    Some(String::from_utf8_lossy(&bytes).into_owned())
}

impl From<GmailMessage> for MailMessage {
    fn from(message: GmailMessage) -> Self {
        let payload = message.payload.unwrap_or_default();
        let text_body = payload.plain_text();

        MailMessage {
            id: message.id,
            headers: payload.headers.into_iter().map(|h| (h.name, h.value)).collect(),
            snippet: message.snippet,
            text_body,
        }
    }
}

impl GoogleMail {
    pub fn new(client: GoogleClient, base_url: impl Into<String>, user_id: impl Into<String>) -> Self {
        GoogleMail {
            client,
            base_url: base_url.into(),
            user_id: user_id.into(),
        }
    }

    fn user_endpoint(&self, segments: &[&str]) -> CourseCalResult<url::Url> {
        let mut all = vec!["users", self.user_id.as_str()];
        all.extend_from_slice(segments);
        Ok(endpoint(&self.base_url, &all)?)
    }
}

#[async_trait]
impl MailService for GoogleMail {
    #[instrument(skip(self, email), fields(to = %email.recipients(), subject = %email.subject))]
    async fn send(&self, email: &OutgoingEmail) -> CourseCalResult<String> {
        let url = self.user_endpoint(&["messages", "send"])?;
        let request = self
            .client
            .http()
            .post(url)
            .json(&json!({ "raw": email.to_raw() }));

        let sent: SentMessage = self.client.json(SERVICE, request).await?;
        info!(message_id = %sent.id, "Sent message");
        Ok(sent.id)
    }

    #[instrument(skip(self))]
    async fn message_after(&self, history_id: &str) -> CourseCalResult<Option<MailMessage>> {
        let url = self.user_endpoint(&["history"])?;
        let request = self
            .client
            .http()
            .get(url)
            .query(&[("startHistoryId", history_id), ("maxResults", "1")]);
        let page: HistoryPage = self.client.json(SERVICE, request).await?;

        let Some(message_id) = page
            .history
            .into_iter()
            .find_map(|record| record.messages.into_iter().next())
            .map(|m| m.id)
        else {
            debug!("No messages found for the given history id");
            return Ok(None);
        };

        let url = self.user_endpoint(&["messages", message_id.as_str()])?;
        let request = self.client.http().get(url).query(&[("format", "full")]);
        let message: GmailMessage = self.client.json(SERVICE, request).await?;

        Ok(Some(message.into()))
    }

    #[instrument(skip(self))]
    async fn watch(&self, label_ids: &[String], topic: &str) -> CourseCalResult<MailboxWatch> {
        let url = self.user_endpoint(&["watch"])?;
        let request = self
            .client
            .http()
            .post(url)
            .json(&json!({ "labelIds": label_ids, "topicName": topic }));

        Ok(self.client.json(SERVICE, request).await?)
    }

    #[instrument(skip(self))]
    async fn stop(&self) -> CourseCalResult<()> {
        let url = self.user_endpoint(&["stop"])?;
        let request = self.client.http().post(url);
        self.client.execute(SERVICE, request, &[]).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_nested_plain_text_part() {
        let encoded = URL_SAFE.encode("Von: Eva\nE-Mail: eva@example.com".as_bytes());
        let message: GmailMessage = serde_json::from_value(json!({
            "id": "m1",
            "snippet": "Von: Eva E-Mail: eva@example.com",
            "payload": {
                "mimeType": "multipart/mixed",
                "headers": [{ "name": "Subject", "value": "Kontaktformularanfrage" }],
                "parts": [{
                    "mimeType": "multipart/alternative",
                    "parts": [
                        { "mimeType": "text/html", "body": { "data": "PGI-PC9iPg==" } },
                        { "mimeType": "text/plain", "body": { "data": encoded } }
                    ]
                }]
            }
        }))
        .unwrap();

        let mail: MailMessage = message.into();
        assert_eq!(mail.header("subject"), Some("Kontaktformularanfrage"));
        assert_eq!(mail.text_body.as_deref(), Some("Von: Eva\nE-Mail: eva@example.com"));
    }

    #[test]
    fn message_without_payload_keeps_snippet() {
        let message: GmailMessage = serde_json::from_value(json!({ "id": "m2", "snippet": "hi" })).unwrap();
        let mail: MailMessage = message.into();

        assert_eq!(mail.text(), "hi");
        assert!(mail.headers.is_empty());
    }
}
