//! Append-only infraction history attached to each user record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::record::Actor;

/// What a log entry records, tagged for the persisted representation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LogAction {
    /// A moderator adjusted points by hand.
    ManualAdjustment,
    /// The content filter matched a configured term.
    FilterHit {
        /// The term that matched.
        term: String,
    },
    /// Scheduled point decay.
    Decay,
    /// The subject was excluded from the community.
    Exclusion,
    /// An exclusion was administratively reversed.
    Reversal,
}

impl LogAction {
    /// Stable label for rendering and logging.
    pub fn label(&self) -> &'static str {
        match self {
            LogAction::ManualAdjustment => "manual_adjustment",
            LogAction::FilterHit { .. } => "filter_hit",
            LogAction::Decay => "decay",
            LogAction::Exclusion => "exclusion",
            LogAction::Reversal => "reversal",
        }
    }
}

impl std::fmt::Display for LogAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// One immutable entry in a record's infraction history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Who caused the entry; [`Actor::system`] for automated sources.
    pub actor: Actor,
    /// What happened.
    pub action: LogAction,
    /// The effective point change, after clamping at zero.
    pub point_delta: i64,
    /// Free-form context.
    pub note: String,
    /// When the entry was accepted.
    pub timestamp: DateTime<Utc>,
}

impl LogEntry {
    /// Create an entry stamped with the current time.
    pub fn new(actor: Actor, action: LogAction, point_delta: i64, note: impl Into<String>) -> Self {
        Self {
            actor,
            action,
            point_delta,
            note: note.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Ordered, append-only sequence of [`LogEntry`] values.
///
/// Insertion order is chronological order; appends clamp timestamps so
/// they never run backwards within one record, even across clock skew.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuditLog(Vec<LogEntry>);

impl AuditLog {
    /// Empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry, keeping timestamps monotonically non-decreasing.
    pub fn append(&mut self, mut entry: LogEntry) {
        if let Some(last) = self.0.last() {
            if entry.timestamp < last.timestamp {
                entry.timestamp = last.timestamp;
            }
        }
        self.0.push(entry);
    }

    /// The entries in insertion order.
    pub fn entries(&self) -> &[LogEntry] {
        &self.0
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the log is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Human-readable rendering for warning messages, one line per entry.
    pub fn render(&self) -> String {
        if self.0.is_empty() {
            return "No infractions recorded.".to_string();
        }
        let mut out = String::new();
        for entry in &self.0 {
            let delta = if entry.point_delta >= 0 {
                format!("+{}", entry.point_delta)
            } else {
                entry.point_delta.to_string()
            };
            out.push_str(&format!(
                "• {} | points: {} | {} | {}",
                entry.action.label(),
                delta,
                entry.timestamp.to_rfc3339(),
                entry.note,
            ));
            if let LogAction::FilterHit { term } = &entry.action {
                out.push_str(&format!(" (term: {term})"));
            }
            out.push('\n');
        }
        out.pop();
        out
    }
}
