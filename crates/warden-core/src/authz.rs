//! Capability check consumed by the command layer.
//!
//! One shared component instead of a permission check re-implemented in
//! every command handler: an actor may moderate a community when the
//! platform reports them as an administrator, or when they hold the
//! community's configured authorizer role.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::DirectoryError;
use crate::store::RecordStore;

/// Role membership lookups against the hosting platform.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RoleDirectory: Send + Sync {
    /// Whether the actor has administrator rights in the community.
    async fn is_admin(&self, community: u64, actor: u64) -> Result<bool, DirectoryError>;

    /// Whether the actor holds the given role in the community.
    async fn has_role(
        &self,
        community: u64,
        actor: u64,
        role: &str,
    ) -> Result<bool, DirectoryError>;
}

/// `(actor, community) -> bool` moderation capability check.
pub struct CapabilityCheck {
    store: Arc<dyn RecordStore>,
    roles: Arc<dyn RoleDirectory>,
}

impl CapabilityCheck {
    /// Create a capability check over the config store and role lookup.
    pub fn new(store: Arc<dyn RecordStore>, roles: Arc<dyn RoleDirectory>) -> Self {
        Self { store, roles }
    }

    /// Whether `actor` may invoke moderation operations in `community`.
    pub async fn can_moderate(&self, community: u64, actor: u64) -> crate::error::Result<bool> {
        if self.roles.is_admin(community, actor).await? {
            return Ok(true);
        }
        let Some(config) = self.store.load_config(community).await? else {
            return Ok(false);
        };
        match config.authorizer_role {
            Some(role) => Ok(self.roles.has_role(community, actor, &role).await?),
            None => Ok(false),
        }
    }
}
