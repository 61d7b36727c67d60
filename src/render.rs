//! Colored terminal summaries of job results.

use coursecal_core::registration::RegistrationOutcome;
use coursecal_core::sync::SyncReport;
use owo_colors::OwoColorize;

pub trait Render {
    fn render(&self) -> String;
}

impl Render for SyncReport {
    fn render(&self) -> String {
        let mut line = format!(
            "📅 {}  {} {} {}",
            self.scope,
            format!("+{}", self.created).green(),
            format!("~{}", self.updated).yellow(),
            format!("-{}", self.deleted).red(),
        );

        if self.mirrored > 0 {
            line.push_str(&format!("  mirrored {}", self.mirrored));
        }
        if self.pruned > 0 {
            line.push_str(&format!("  pruned {}", self.pruned).dimmed().to_string());
        }
        if self.notices > 0 {
            line.push_str(&format!("  ✉ {}", self.notices));
        }

        line
    }
}

impl Render for RegistrationOutcome {
    fn render(&self) -> String {
        match self {
            RegistrationOutcome::Ignored(reason) => format!("{} ({})", "Ignored".dimmed(), reason),
            RegistrationOutcome::Accepted { tag, email } => {
                format!("{} {} for {}", "Accepted".green(), email, tag)
            }
            RegistrationOutcome::Denied { tag, email } => {
                format!("{} {} for {} (course full)", "Denied".red(), email, tag)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coursecal_core::Tag;

    #[test]
    fn report_shows_counts_and_extras() {
        let report = SyncReport {
            scope: "Salsa1".into(),
            created: 2,
            updated: 1,
            deleted: 0,
            pruned: 3,
            mirrored: 3,
            notices: 1,
        };
        let line = report.render();

        assert!(line.contains("Salsa1"));
        assert!(line.contains("+2") && line.contains("~1") && line.contains("-0"));
        assert!(line.contains("mirrored 3"));
        assert!(line.contains("pruned 3"));
        assert!(line.contains("✉ 1"));
    }

    #[test]
    fn quiet_report_omits_extras() {
        let line = SyncReport {
            scope: "Admin".into(),
            ..Default::default()
        }
        .render();

        assert!(!line.contains("mirrored"));
        assert!(!line.contains("✉"));
    }

    #[test]
    fn outcome_names_registrant() {
        let outcome = RegistrationOutcome::Denied {
            tag: Tag::new("Salsa1"),
            email: "eva@example.com".into(),
        };

        let line = outcome.render();
        assert!(line.contains("eva@example.com"));
        assert!(line.contains("course full"));
    }
}
