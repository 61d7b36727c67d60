//! Core of coursecal.
//!
//! This crate holds everything that does not talk HTTP:
//! - calendar event payloads, tags and history snapshots
//! - the history diff that decides which changes participants hear about
//! - notification rendering, MIME assembly and registration parsing
//! - the service traits and the flows built on top of them

pub mod config;
pub mod contacts;
pub mod date_range;
pub mod diff;
pub mod error;
pub mod event;
pub mod history;
pub mod mail;
pub mod mapping;
pub mod notifier;
pub mod registration;
pub mod schedule;
pub mod services;
pub mod sync;
pub mod tag;
pub mod templates;
pub mod watch;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use config::AppConfig;
pub use error::{CourseCalError, CourseCalResult};
pub use event::{CalendarEvent, EventTime, Moment};
pub use services::Services;
pub use tag::{HistoryScope, Tag, TagKey};
