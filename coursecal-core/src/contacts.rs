//! Course rosters read from the contacts spreadsheet.
//!
//! One sheet per tag. The first row holds column names; the columns the
//! notifier reads are looked up by name, so their order does not matter.

const NAME_COLUMN: &str = "Name";
const EMAIL_COLUMN: &str = "E-mail";
const WHATSAPP_COLUMN: &str = "Whatsapp";
const PREFERENCE_COLUMN: &str = "Preference";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactPreference {
    Email,
    Whatsapp,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contact {
    pub name: String,
    pub email: String,
    pub whatsapp: String,
    pub preference: ContactPreference,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactSheet {
    rows: Vec<Vec<String>>,
}

impl ContactSheet {
    pub fn from_values(rows: Vec<Vec<String>>) -> Self {
        ContactSheet { rows }
    }

    /// Number of registered participants (all rows but the header).
    pub fn participant_count(&self) -> usize {
        self.rows.len().saturating_sub(1)
    }

    pub fn contacts(&self) -> Vec<Contact> {
        let Some((header, rows)) = self.rows.split_first() else {
            return Vec::new();
        };

        let column = |name: &str| header.iter().position(|h| h.trim() == name);
        let name_col = column(NAME_COLUMN);
        let email_col = column(EMAIL_COLUMN);
        let whatsapp_col = column(WHATSAPP_COLUMN);
        let preference_col = column(PREFERENCE_COLUMN);

        let cell = |row: &Vec<String>, col: Option<usize>| -> String {
            col.and_then(|i| row.get(i))
                .map(|v| v.trim().to_string())
                .unwrap_or_default()
        };

        rows.iter()
            .map(|row| {
                let email = cell(row, email_col);
                let preference = match cell(row, preference_col).to_lowercase().as_str() {
                    "email" | "e-mail" => ContactPreference::Email,
                    "whatsapp" => ContactPreference::Whatsapp,
                    // Rows appended by registration carry no preference yet
                    "" if !email.is_empty() => ContactPreference::Email,
                    _ => ContactPreference::Other,
                };

                Contact {
                    name: cell(row, name_col),
                    email,
                    whatsapp: cell(row, whatsapp_col),
                    preference,
                }
            })
            .collect()
    }

    /// E-mail addresses of everyone who wants to be reached by e-mail.
    pub fn email_recipients(&self) -> Vec<String> {
        self.contacts()
            .into_iter()
            .filter(|c| c.preference == ContactPreference::Email && !c.email.is_empty())
            .map(|c| c.email)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    fn sheet() -> ContactSheet {
        ContactSheet::from_values(vec![
            row(&["Name", "E-mail", "Whatsapp", "Preference"]),
            row(&["Anna", "anna@example.com", "+43 1", "email"]),
            row(&["Ben", "ben@example.com", "+43 2", "whatsapp"]),
            row(&["Cleo", "cleo@example.com", "+43 3"]),
            row(&["Dan"]),
        ])
    }

    #[test]
    fn counts_participants_without_header() {
        assert_eq!(sheet().participant_count(), 4);
        assert_eq!(ContactSheet::default().participant_count(), 0);
    }

    #[test]
    fn selects_email_preference_and_defaults_blank_preference_to_email() {
        assert_eq!(
            sheet().email_recipients(),
            vec!["anna@example.com".to_string(), "cleo@example.com".to_string()]
        );
    }

    #[test]
    fn columns_are_matched_by_name() {
        let sheet = ContactSheet::from_values(vec![
            row(&["Preference", "Name", "E-mail"]),
            row(&["email", "Eva", "eva@example.com"]),
        ]);

        let contacts = sheet.contacts();
        assert_eq!(contacts[0].name, "Eva");
        assert_eq!(sheet.email_recipients(), vec!["eva@example.com".to_string()]);
    }

    #[test]
    fn empty_sheet_has_no_contacts() {
        assert!(ContactSheet::default().contacts().is_empty());
    }
}
