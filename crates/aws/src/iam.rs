//! IAM identity provider

use async_trait::async_trait;
use aws_sdk_iam::Client;
use aws_sdk_iam::primitives::DateTime as SmithyDateTime;
use aws_sdk_iam::types::StatusType;
use chrono::{DateTime, Utc};
use keycycle_core::{IdentityProvider, KeyMetadata, KeyStatus, NewAccessKey, ProviderResult};
use secrecy::SecretString;

use crate::error::{missing, sdk_error};
use crate::retry::{RetryPolicy, retry_transient};

/// [`IdentityProvider`] over the IAM API
#[derive(Debug, Clone)]
pub struct IamIdentity {
    client: Client,
    retry: RetryPolicy,
}

impl IamIdentity {
    /// Wrap an IAM client
    pub fn new(client: Client, retry: RetryPolicy) -> Self {
        Self { client, retry }
    }

    async fn last_used(&self, access_key_id: &str) -> ProviderResult<Option<DateTime<Utc>>> {
        let client = &self.client;
        let output = retry_transient(&self.retry, "GetAccessKeyLastUsed", move || async move {
            client
                .get_access_key_last_used()
                .access_key_id(access_key_id)
                .send()
                .await
                .map_err(|e| {
                    sdk_error("GetAccessKeyLastUsed", || format!("access key {access_key_id}"), e)
                })
        })
        .await?;

        Ok(output
            .access_key_last_used()
            .and_then(|used| used.last_used_date())
            .and_then(to_chrono))
    }
}

fn to_chrono(value: &SmithyDateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(value.secs(), value.subsec_nanos())
}

/// Expired keys cannot authenticate, so anything but `Active` is inactive
fn to_key_status(status: &StatusType) -> KeyStatus {
    KeyStatus::parse(status.as_str()).unwrap_or(KeyStatus::Inactive)
}

fn to_status_type(status: KeyStatus) -> StatusType {
    match status {
        KeyStatus::Active => StatusType::Active,
        KeyStatus::Inactive => StatusType::Inactive,
    }
}

#[async_trait]
impl IdentityProvider for IamIdentity {
    async fn list_users(&self) -> ProviderResult<Vec<String>> {
        let client = &self.client;
        let users = retry_transient(&self.retry, "ListUsers", move || async move {
            client
                .list_users()
                .into_paginator()
                .items()
                .send()
                .collect::<Result<Vec<_>, _>>()
                .await
                .map_err(|e| sdk_error("ListUsers", || "users".to_string(), e))
        })
        .await?;

        Ok(users.iter().map(|u| u.user_name().to_string()).collect())
    }

    async fn group_members(&self, group_name: &str) -> ProviderResult<Vec<String>> {
        let client = &self.client;
        let users = retry_transient(&self.retry, "GetGroup", move || async move {
            client
                .get_group()
                .group_name(group_name)
                .into_paginator()
                .items()
                .send()
                .collect::<Result<Vec<_>, _>>()
                .await
                .map_err(|e| sdk_error("GetGroup", || format!("group {group_name}"), e))
        })
        .await?;

        Ok(users.iter().map(|u| u.user_name().to_string()).collect())
    }

    async fn list_access_keys(&self, user_name: &str) -> ProviderResult<Vec<KeyMetadata>> {
        let client = &self.client;
        let listed = retry_transient(&self.retry, "ListAccessKeys", move || async move {
            client
                .list_access_keys()
                .user_name(user_name)
                .into_paginator()
                .items()
                .send()
                .collect::<Result<Vec<_>, _>>()
                .await
                .map_err(|e| sdk_error("ListAccessKeys", || format!("user {user_name}"), e))
        })
        .await?;

        let mut keys = Vec::with_capacity(listed.len());
        for entry in &listed {
            let access_key_id = entry
                .access_key_id()
                .ok_or_else(|| missing("ListAccessKeys", "AccessKeyId"))?;
            let status = entry
                .status()
                .map(to_key_status)
                .ok_or_else(|| missing("ListAccessKeys", "Status"))?;
            let created_at = entry
                .create_date()
                .and_then(to_chrono)
                .ok_or_else(|| missing("ListAccessKeys", "CreateDate"))?;

            // Last-used dates are informational; a failed lookup keeps the key.
            let last_used_at = match self.last_used(access_key_id).await {
                Ok(used) => used,
                Err(e) => {
                    tracing::warn!(user = user_name, key = access_key_id, error = %e, "Could not read key last-used date");
                    None
                }
            };

            keys.push(
                KeyMetadata::new(user_name, access_key_id, status, created_at)
                    .with_last_used(last_used_at),
            );
        }
        Ok(keys)
    }

    async fn create_access_key(&self, user_name: &str) -> ProviderResult<NewAccessKey> {
        let client = &self.client;
        // Not retried: a lost response would leave an orphaned key behind.
        let output = client
            .create_access_key()
            .user_name(user_name)
            .send()
            .await
            .map_err(|e| sdk_error("CreateAccessKey", || format!("user {user_name}"), e))?;

        let key = output
            .access_key()
            .ok_or_else(|| missing("CreateAccessKey", "AccessKey"))?;

        tracing::debug!(user = user_name, key = key.access_key_id(), "Created access key");

        Ok(NewAccessKey {
            user_name: key.user_name().to_string(),
            access_key_id: key.access_key_id().to_string(),
            status: to_key_status(key.status()),
            secret_access_key: SecretString::from(key.secret_access_key().to_string()),
            created_at: key.create_date().and_then(to_chrono),
        })
    }

    async fn update_access_key_status(
        &self,
        user_name: &str,
        access_key_id: &str,
        status: KeyStatus,
    ) -> ProviderResult<()> {
        let client = &self.client;
        retry_transient(&self.retry, "UpdateAccessKey", move || async move {
            client
                .update_access_key()
                .user_name(user_name)
                .access_key_id(access_key_id)
                .status(to_status_type(status))
                .send()
                .await
                .map_err(|e| sdk_error("UpdateAccessKey", || format!("access key {access_key_id}"), e))
        })
        .await?;
        Ok(())
    }

    async fn delete_access_key(&self, user_name: &str, access_key_id: &str) -> ProviderResult<()> {
        let client = &self.client;
        retry_transient(&self.retry, "DeleteAccessKey", move || async move {
            client
                .delete_access_key()
                .user_name(user_name)
                .access_key_id(access_key_id)
                .send()
                .await
                .map_err(|e| sdk_error("DeleteAccessKey", || format!("access key {access_key_id}"), e))
        })
        .await?;
        Ok(())
    }

    async fn user_arn(&self, user_name: &str) -> ProviderResult<String> {
        let client = &self.client;
        let output = retry_transient(&self.retry, "GetUser", move || async move {
            client
                .get_user()
                .user_name(user_name)
                .send()
                .await
                .map_err(|e| sdk_error("GetUser", || format!("user {user_name}"), e))
        })
        .await?;

        output
            .user()
            .map(|u| u.arn().to_string())
            .ok_or_else(|| missing("GetUser", "User"))
    }

    async fn get_user_policy(&self, user_name: &str, policy_name: &str) -> ProviderResult<String> {
        let client = &self.client;
        let output = retry_transient(&self.retry, "GetUserPolicy", move || async move {
            client
                .get_user_policy()
                .user_name(user_name)
                .policy_name(policy_name)
                .send()
                .await
                .map_err(|e| {
                    sdk_error(
                        "GetUserPolicy",
                        || format!("policy {policy_name} on user {user_name}"),
                        e,
                    )
                })
        })
        .await?;

        // IAM returns the document URL-encoded; callers only test for presence.
        Ok(output.policy_document().to_string())
    }

    async fn put_user_policy(
        &self,
        user_name: &str,
        policy_name: &str,
        policy_document: &str,
    ) -> ProviderResult<()> {
        let client = &self.client;
        retry_transient(&self.retry, "PutUserPolicy", move || async move {
            client
                .put_user_policy()
                .user_name(user_name)
                .policy_name(policy_name)
                .policy_document(policy_document)
                .send()
                .await
                .map_err(|e| sdk_error("PutUserPolicy", || format!("user {user_name}"), e))
        })
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn smithy_timestamps_convert_exactly() {
        let smithy = SmithyDateTime::from_secs_and_nanos(1_700_000_000, 250_000_000);
        let converted = to_chrono(&smithy).unwrap();
        assert_eq!(converted.timestamp(), 1_700_000_000);
        assert_eq!(converted.timestamp_subsec_nanos(), 250_000_000);
    }

    #[test]
    fn status_mapping() {
        assert_eq!(to_key_status(&StatusType::Active), KeyStatus::Active);
        assert_eq!(to_key_status(&StatusType::Inactive), KeyStatus::Inactive);
        assert_eq!(to_key_status(&StatusType::from("Expired")), KeyStatus::Inactive);
        assert_eq!(to_status_type(KeyStatus::Inactive), StatusType::Inactive);
    }
}
