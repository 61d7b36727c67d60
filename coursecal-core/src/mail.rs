//! Outgoing e-mail assembly (RFC 5322 / MIME).

use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE};

const LINE_WIDTH: usize = 76;

/// A plain-text e-mail to one or more recipients.
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingEmail {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub body: String,
}

impl OutgoingEmail {
    pub fn new(from: impl Into<String>, to: Vec<String>, subject: impl Into<String>, body: impl Into<String>) -> Self {
        OutgoingEmail {
            from: from.into(),
            to,
            subject: subject.into(),
            body: body.into(),
        }
    }

    pub fn recipients(&self) -> String {
        self.to.join(", ")
    }

    /// Full MIME message: multipart/mixed with one base64 text/plain part.
    pub fn to_mime(&self) -> String {
        let boundary = format!("=============={}==", uuid::Uuid::new_v4().simple());
        self.to_mime_with_boundary(&boundary)
    }

    /// The message as Gmail's `raw` field expects it (URL-safe base64).
    pub fn to_raw(&self) -> String {
        URL_SAFE.encode(self.to_mime().as_bytes())
    }

    fn to_mime_with_boundary(&self, boundary: &str) -> String {
        let mut out = String::new();

        out.push_str(&format!(
            "Content-Type: multipart/mixed; boundary=\"{}\"\r\n",
            boundary
        ));
        out.push_str("MIME-Version: 1.0\r\n");
        out.push_str(&format!("To: {}\r\n", self.recipients()));
        out.push_str(&format!("From: {}\r\n", self.from));
        out.push_str(&format!("Subject: {}\r\n", encode_header(&self.subject)));
        out.push_str("\r\n");

        out.push_str(&format!("--{}\r\n", boundary));
        out.push_str("Content-Type: text/plain; charset=\"utf-8\"\r\n");
        out.push_str("MIME-Version: 1.0\r\n");
        out.push_str("Content-Transfer-Encoding: base64\r\n");
        out.push_str("\r\n");
        for line in wrap(&STANDARD.encode(self.body.as_bytes())) {
            out.push_str(line);
            out.push_str("\r\n");
        }
        out.push_str(&format!("--{}--\r\n", boundary));

        out
    }
}

/// RFC 2047 encoded-word for non-ASCII header values.
fn encode_header(value: &str) -> String {
    if value.is_ascii() {
        value.to_string()
    } else {
        format!("=?utf-8?b?{}?=", STANDARD.encode(value.as_bytes()))
    }
}

fn wrap(encoded: &str) -> impl Iterator<Item = &str> {
    // base64 output is ASCII, so byte offsets are char boundaries
    (0..encoded.len())
        .step_by(LINE_WIDTH)
        .map(move |start| &encoded[start..(start + LINE_WIDTH).min(encoded.len())])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn email() -> OutgoingEmail {
        OutgoingEmail::new(
            "kurse@example.com",
            vec!["a@example.com".into(), "b@example.com".into()],
            "[Salsa1] Salsa Kurs",
            "Liebe Salsa1 Kurs BesucherInnen,\n\nMit freundlichen Grüßen,\nTemplate Company",
        )
    }

    #[test]
    fn headers_and_part_are_present() {
        let mime = email().to_mime_with_boundary("BOUNDARY");

        assert!(mime.starts_with("Content-Type: multipart/mixed; boundary=\"BOUNDARY\"\r\n"));
        assert!(mime.contains("To: a@example.com, b@example.com\r\n"));
        assert!(mime.contains("From: kurse@example.com\r\n"));
        assert!(mime.contains("Subject: [Salsa1] Salsa Kurs\r\n"));
        assert!(mime.contains("--BOUNDARY\r\nContent-Type: text/plain; charset=\"utf-8\""));
        assert!(mime.ends_with("--BOUNDARY--\r\n"));
    }

    #[test]
    fn body_is_base64_and_decodes_back() {
        let mime = email().to_mime_with_boundary("B");
        let encoded: String = mime
            .split("\r\n\r\n")
            .nth(2)
            .unwrap()
            .lines()
            .take_while(|l| !l.starts_with("--"))
            .collect();

        let decoded = String::from_utf8(STANDARD.decode(encoded).unwrap()).unwrap();
        assert_eq!(decoded, email().body);
    }

    #[test]
    fn long_bodies_wrap_at_76_columns() {
        let mut long = email();
        long.body = "x".repeat(500);
        let mime = long.to_mime_with_boundary("B");

        assert!(mime.lines().all(|l| l.len() <= LINE_WIDTH + 40));
        assert!(mime.lines().filter(|l| l.len() == LINE_WIDTH).count() >= 5);
    }

    #[test]
    fn non_ascii_subject_is_encoded() {
        let mut e = email();
        e.subject = "Anmeldung Übung".into();
        let mime = e.to_mime_with_boundary("B");

        assert!(mime.contains("Subject: =?utf-8?b?"));
    }

    #[test]
    fn raw_is_url_safe() {
        let raw = email().to_raw();
        assert!(!raw.contains('+') && !raw.contains('/'));
        let decoded = String::from_utf8(URL_SAFE.decode(raw).unwrap()).unwrap();
        assert!(decoded.contains("Subject: [Salsa1] Salsa Kurs"));
    }
}
