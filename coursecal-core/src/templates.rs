//! Message templates for participant notifications and registration replies.

use std::fmt;

const SCHEDULE_BODY: &str = "Liebe {tag} Kurs BesucherInnen,\n\nhier ist der Zeitplan für {period}.\n\n{schedule}\n\n";
const UPDATE_BODY: &str = "Liebe {tag} Kurs BesucherInnen,\n\nDiese Terminezeiten wurden geändert.\n\n{schedule}\n\n";
const DELETE_BODY: &str = "Liebe {tag} Kurs BesucherInnen,\n\nDiese Termine wurden abgesagt.\n\n{schedule}\n\n";
const ACCEPT_BODY: &str = "Liebe(r) {name},\n\nIhre Anmeldung wurde akzeptiert. Wir freuen uns auf Ihren Besuch.\n\n{info}\n\n";
const DENY_BODY: &str = "Liebe(r) {name},\n\nLeider können wir Ihre Anmeldung nicht akzeptieren. Es gibt zu viel BesucherInnen. Sie können für andere Kurse anmelden. \n\n";
const CLOSING: &str = "Mit freundlichen Grüßen,\n";

/// Which notification a set of events triggers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Schedule,
    Update,
    Delete,
}

impl fmt::Display for NoticeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NoticeKind::Schedule => write!(f, "schedule"),
            NoticeKind::Update => write!(f, "update"),
            NoticeKind::Delete => write!(f, "delete"),
        }
    }
}

/// A template with `{key}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    text: String,
}

impl Template {
    pub fn new(text: impl Into<String>) -> Self {
        Template { text: text.into() }
    }

    /// Substitute placeholders in one pass. Unknown placeholders stay as they
    /// are and substituted values are never re-scanned.
    pub fn render(&self, vars: &[(&str, &str)]) -> String {
        let mut out = String::with_capacity(self.text.len());
        let mut rest = self.text.as_str();

        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let after = &rest[open + 1..];

            let replaced = after.find('}').and_then(|close| {
                let key = &after[..close];
                vars.iter()
                    .find(|(k, _)| *k == key)
                    .map(|(_, v)| (*v, close))
            });

            match replaced {
                Some((value, close)) => {
                    out.push_str(value);
                    rest = &after[close + 1..];
                }
                None => {
                    out.push('{');
                    rest = after;
                }
            }
        }

        out.push_str(rest);
        out
    }
}

/// The template set, signed with the sender's company name.
#[derive(Debug, Clone)]
pub struct Templates {
    company_name: String,
}

impl Templates {
    pub fn new(company_name: impl Into<String>) -> Self {
        Templates {
            company_name: company_name.into(),
        }
    }

    fn signed(&self, body: &str) -> Template {
        Template::new(format!("{}{}{}", body, CLOSING, self.company_name))
    }

    pub fn notice(&self, kind: NoticeKind) -> Template {
        match kind {
            NoticeKind::Schedule => self.signed(SCHEDULE_BODY),
            NoticeKind::Update => self.signed(UPDATE_BODY),
            NoticeKind::Delete => self.signed(DELETE_BODY),
        }
    }

    pub fn accept_registration(&self) -> Template {
        self.signed(ACCEPT_BODY)
    }

    pub fn deny_registration(&self) -> Template {
        self.signed(DENY_BODY)
    }
}
