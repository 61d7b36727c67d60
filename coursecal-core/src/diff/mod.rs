//! Diff and classification of calendar snapshots against their history.

mod change_kind;
mod event_change;
mod history_diff;

pub use change_kind::ChangeKind;
pub use event_change::EventChange;
pub use history_diff::HistoryDiff;
