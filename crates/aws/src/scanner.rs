//! Account key inventory

use std::collections::HashSet;

use async_trait::async_trait;
use keycycle_core::{AccountScanner, AccountSession, KeyMetadata, ProviderResult};

/// Lists every user's keys, skipping members of the exemption group
#[derive(Debug, Clone)]
pub struct IamAccountScanner {
    exemption_group: String,
}

impl IamAccountScanner {
    /// Scanner honoring `exemption_group`
    pub fn new(exemption_group: impl Into<String>) -> Self {
        Self {
            exemption_group: exemption_group.into(),
        }
    }

    /// Group whose members are never touched
    pub fn exemption_group(&self) -> &str {
        &self.exemption_group
    }
}

#[async_trait]
impl AccountScanner for IamAccountScanner {
    async fn scan(&self, session: &dyn AccountSession) -> ProviderResult<Vec<KeyMetadata>> {
        let identity = session.identity();

        let exempt: HashSet<String> = match identity.group_members(&self.exemption_group).await {
            Ok(members) => members.into_iter().collect(),
            Err(e) if e.is_not_found() => {
                tracing::warn!(
                    group = %self.exemption_group,
                    "Exemption group does not exist, no users are exempt"
                );
                HashSet::new()
            }
            Err(e) => return Err(e),
        };

        let users = identity.list_users().await?;
        let mut keys = Vec::new();
        for user in &users {
            if exempt.contains(user) {
                tracing::debug!(user = %user, "Skipping exempt user");
                continue;
            }
            keys.extend(identity.list_access_keys(user).await?);
        }

        tracing::info!(
            users = users.len(),
            exempt = exempt.len(),
            keys = keys.len(),
            "Scanned access keys"
        );
        Ok(keys)
    }
}
