//! Domain types persisted per (community, user) pair.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::audit::AuditLog;
use crate::tier::Tier;

/// Identity of whoever caused a log entry.
///
/// Automated sources (the content filter, the decay scheduler) carry no
/// platform id and render as "system".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    /// Platform user id, absent for automated sources.
    pub id: Option<u64>,
    /// Display name captured at action time.
    pub name: String,
}

impl Actor {
    /// The automated system actor.
    pub fn system() -> Self {
        Self {
            id: None,
            name: "system".to_string(),
        }
    }

    /// A human actor.
    pub fn user(id: u64, name: impl Into<String>) -> Self {
        Self {
            id: Some(id),
            name: name.into(),
        }
    }
}

/// Per-user moderation state, scoped to one community.
///
/// `status` is always derived from `points` via the tier table, with one
/// exception: once `Excluded` is reached (or set by a manual exclusion)
/// it latches until an administrative readmission releases it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    /// Community the record belongs to.
    pub community_id: u64,
    /// Subject user.
    pub user_id: u64,
    /// Current infraction point total, never negative.
    pub points: i64,
    /// Severity tier derived from `points`.
    pub status: Tier,
    /// Free-form moderator notes, mutable independently of the log.
    pub notes: String,
    /// Append-only infraction history.
    pub log: AuditLog,
    /// Highest tier the user has already been warned about.
    pub last_notified_tier: Option<Tier>,
}

impl UserRecord {
    /// Zero-value record for a user with no history.
    pub fn new(community_id: u64, user_id: u64) -> Self {
        Self {
            community_id,
            user_id,
            points: 0,
            status: Tier::Active,
            notes: String::new(),
            log: AuditLog::new(),
            last_notified_tier: None,
        }
    }
}

/// A record together with the store version it was read at.
///
/// Writers hand the version back on commit; a moved version means a
/// concurrent mutation won and the write must be retried.
#[derive(Debug, Clone)]
pub struct VersionedRecord {
    /// The record as read.
    pub record: UserRecord,
    /// Store version at read time.
    pub version: i64,
}

/// Per-community moderation settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommunityConfig {
    /// Opaque reference to the role whose members may moderate.
    pub authorizer_role: Option<String>,
    /// Filtered terms and the point value each one incurs.
    pub filtered_terms: HashMap<String, i64>,
}
