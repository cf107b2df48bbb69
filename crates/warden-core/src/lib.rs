//! Warden Core — infraction point engine
//!
//! Tracks accumulating infraction points per user per community,
//! escalates through severity tiers as points rise, warns the user once
//! per newly entered tier, enforces exclusion at the terminal threshold,
//! and decays points on a recurring schedule.
//!
//! # Architecture
//!
//! ```text
//! manual command ──┐
//! content filter ──┼──► PointLedger ──► TierTable
//! decay tick ──────┘         │      (status from points)
//!                     one CAS commit:
//!                 points + log + status + marker
//!                            │
//!                ┌───────────┴───────────┐
//!       NotificationDispatcher   EscalationEnforcer
//!        (warn once per tier)    (exclude once at terminal)
//! ```
//!
//! Everything stateful flows through [`PointLedger`]: one optimistic
//! read-modify-write per mutation, so concurrent triggers on the same
//! record are both reflected and every accepted mutation appends exactly
//! one audit entry. Storage, message delivery, and the membership
//! directory are trait seams; the production store lives in
//! `warden-store`.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod audit;
pub mod authz;
pub mod config;
pub mod decay;
pub mod enforce;
pub mod error;
pub mod ledger;
pub mod notify;
pub mod record;
pub mod service;
pub mod store;
pub mod tier;

#[cfg(test)]
pub(crate) mod testutil;

pub use audit::{AuditLog, LogAction, LogEntry};
pub use authz::{CapabilityCheck, RoleDirectory};
pub use config::{ModerationConfig, TierMessages};
pub use decay::{DecayScheduler, TickSummary};
pub use enforce::{EscalationEnforcer, MembershipDirectory};
pub use error::{
    DeliveryError, DirectoryError, Error, Result, StoreError, ValidationError,
};
pub use ledger::{DeltaOutcome, PointLedger};
pub use notify::{NotificationChannel, NotificationDispatcher};
pub use record::{Actor, CommunityConfig, UserRecord, VersionedRecord};
pub use service::{ConfigAction, FilterScan, ModerationService};
pub use store::RecordStore;
pub use tier::{Tier, TierTable};
