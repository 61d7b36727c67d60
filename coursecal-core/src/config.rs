//! Application configuration.
//!
//! Layers, lowest first: built-in defaults, a TOML file, then environment
//! variables such as `COURSECAL__CALENDAR__ADMIN_CALENDAR_ID`.

use std::path::{Path, PathBuf};

use chrono_tz::Tz;
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

use crate::error::{CourseCalError, CourseCalResult};

/// Environment variable naming an explicit config file.
pub const CONFIG_PATH_ENV: &str = "COURSECAL_CONFIG";
const ENV_PREFIX: &str = "COURSECAL";
const ENV_SEPARATOR: &str = "__";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub credentials: CredentialsConfig,
    pub storage: StorageConfig,
    pub calendar: CalendarConfig,
    pub contacts: ContactsConfig,
    pub mail: MailConfig,
    pub notify: NotifyConfig,
    pub registration: RegistrationConfig,
    pub watch: WatchConfig,
    pub server: ServerConfig,
    pub google: GoogleConfig,
}

/// Where the OAuth authorized-user credential comes from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialsConfig {
    pub path: PathBuf,
    /// Takes precedence over `path` when set; holds the JSON inline
    pub env_var: String,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        CredentialsConfig {
            path: PathBuf::from("token.json"),
            env_var: "CREDS".into(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// History snapshots, calendar and tag mappings, watch records
    pub bucket: String,
    /// Per-course info texts (`{tag}.txt`)
    pub course_bucket: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CalendarConfig {
    pub admin_calendar_id: String,
    pub lookahead_days: i64,
    pub retention_min_days: i64,
    pub retention_max_days: i64,
    pub time_zone: String,
    pub per_tag: bool,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        CalendarConfig {
            admin_calendar_id: String::new(),
            lookahead_days: 60,
            retention_min_days: 7,
            retention_max_days: 60,
            time_zone: "Europe/Vienna".into(),
            per_tag: true,
        }
    }
}

impl CalendarConfig {
    pub fn zone(&self) -> CourseCalResult<Tz> {
        self.time_zone
            .parse::<Tz>()
            .map_err(|e| CourseCalError::Config(format!("Invalid time_zone '{}': {}", self.time_zone, e)))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContactsConfig {
    pub spreadsheet_id: String,
    pub range: String,
}

impl Default for ContactsConfig {
    fn default() -> Self {
        ContactsConfig {
            spreadsheet_id: String::new(),
            range: "A:D".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MailConfig {
    pub sender: String,
    pub company_name: String,
    pub schedule_period: String,
}

impl Default for MailConfig {
    fn default() -> Self {
        MailConfig {
            sender: String::new(),
            company_name: "Template Company".into(),
            schedule_period: "zwei nächste Wochen".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    pub send_created: bool,
    pub send_updated: bool,
    pub send_deleted: bool,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        NotifyConfig {
            send_created: false,
            send_updated: true,
            send_deleted: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrationConfig {
    pub subject: String,
    pub capacity: usize,
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        RegistrationConfig {
            subject: "Kontaktformularanfrage".into(),
            capacity: 20,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    pub webhook_url: String,
    pub channel_ttl_secs: u64,
    pub max_tries: u32,
    pub gmail_user_id: String,
    pub gmail_label_id: String,
    /// `projects/<project>/topics/<topic>`
    pub gmail_topic: String,
}

impl Default for WatchConfig {
    fn default() -> Self {
        WatchConfig {
            webhook_url: String::new(),
            // 7 days, the longest the calendar API grants
            channel_ttl_secs: 604_800,
            max_tries: 3,
            gmail_user_id: "me".into(),
            gmail_label_id: String::new(),
            gmail_topic: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind: "0.0.0.0:8080".into(),
        }
    }
}

/// API base URLs. Only overridden in tests.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GoogleConfig {
    pub calendar_url: String,
    pub sheets_url: String,
    pub gmail_url: String,
    pub storage_url: String,
    pub storage_upload_url: String,
}

impl Default for GoogleConfig {
    fn default() -> Self {
        GoogleConfig {
            calendar_url: "https://www.googleapis.com/calendar/v3".into(),
            sheets_url: "https://sheets.googleapis.com/v4".into(),
            gmail_url: "https://gmail.googleapis.com/gmail/v1".into(),
            storage_url: "https://storage.googleapis.com/storage/v1".into(),
            storage_upload_url: "https://storage.googleapis.com/upload/storage/v1".into(),
        }
    }
}

impl AppConfig {
    /// ~/.config/coursecal/config.toml
    pub fn default_path() -> CourseCalResult<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| CourseCalError::Config("Could not determine config directory".into()))?
            .join("coursecal");

        Ok(config_dir.join("config.toml"))
    }

    /// Load from `path`, else `$COURSECAL_CONFIG`, else the default path.
    /// An explicitly named file must exist; the default one is optional.
    pub fn load(path: Option<&Path>) -> CourseCalResult<Self> {
        let (path, required) = match path {
            Some(p) => (expand(p), true),
            None => match std::env::var(CONFIG_PATH_ENV) {
                Ok(p) => (expand(Path::new(&p)), true),
                Err(_) => (Self::default_path()?, false),
            },
        };

        Config::builder()
            .add_source(File::from(path).format(FileFormat::Toml).required(required))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator(ENV_SEPARATOR)
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| CourseCalError::Config(e.to_string()))?
            .try_deserialize()
            .map_err(|e| CourseCalError::Config(e.to_string()))
    }

    /// Parse a TOML document on top of the defaults, without the environment.
    pub fn from_toml_str(contents: &str) -> CourseCalResult<Self> {
        Config::builder()
            .add_source(File::from_str(contents, FileFormat::Toml))
            .build()
            .map_err(|e| CourseCalError::Config(e.to_string()))?
            .try_deserialize()
            .map_err(|e| CourseCalError::Config(e.to_string()))
    }

    /// Check the settings every flow needs.
    pub fn validate(&self) -> CourseCalResult<()> {
        require(&self.storage.bucket, "storage.bucket")?;
        require(&self.calendar.admin_calendar_id, "calendar.admin_calendar_id")?;
        require(&self.contacts.spreadsheet_id, "contacts.spreadsheet_id")?;
        require(&self.mail.sender, "mail.sender")?;
        self.calendar.zone()?;

        let calendar = &self.calendar;
        for (value, key) in [
            (calendar.lookahead_days, "calendar.lookahead_days"),
            (calendar.retention_min_days, "calendar.retention_min_days"),
            (calendar.retention_max_days, "calendar.retention_max_days"),
        ] {
            if !(0..=MAX_WINDOW_DAYS).contains(&value) {
                return Err(CourseCalError::Config(format!(
                    "{} must be between 0 and {} days",
                    key, MAX_WINDOW_DAYS
                )));
            }
        }
        if calendar.retention_min_days > calendar.retention_max_days {
            return Err(CourseCalError::Config(
                "calendar.retention_min_days must not exceed calendar.retention_max_days".into(),
            ));
        }
        if self.watch.max_tries == 0 {
            return Err(CourseCalError::Config("watch.max_tries must be at least 1".into()));
        }

        Ok(())
    }
}

/// Upper bound for the lookahead and retention windows (ten years)
pub const MAX_WINDOW_DAYS: i64 = 3660;

/// Fail with a config error naming `key` when `value` is blank.
pub fn require<'a>(value: &'a str, key: &str) -> CourseCalResult<&'a str> {
    if value.trim().is_empty() {
        Err(CourseCalError::Config(format!("{} is not set", key)))
    } else {
        Ok(value)
    }
}

fn expand(path: &Path) -> PathBuf {
    PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).into_owned())
}
