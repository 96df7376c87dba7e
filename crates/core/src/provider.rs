//! Provider seams
//!
//! The executor talks to the identity provider and the secret store only
//! through these traits. `keycycle-aws` implements them on top of the AWS
//! SDK; [`crate::testing`] implements them in memory.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::model::{KeyMetadata, KeyStatus, NewAccessKey};

/// Provider call failure
///
/// `NotFound` is kept apart from every other failure so call sites can
/// recover from it explicitly (create instead of update) without inspecting
/// error codes.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The addressed resource does not exist
    #[error("{resource} not found")]
    NotFound {
        /// Resource that was looked up
        resource: String,
    },

    /// Throttling, 5xx, timeouts, dispatch failures. Safe to retry.
    #[error("{operation} failed transiently: {message}")]
    Transient {
        /// Provider operation name
        operation: &'static str,
        /// Provider message
        message: String,
    },

    /// Any other failure (validation, access denied, limits, ...)
    #[error("{operation} failed: {message}")]
    Failed {
        /// Provider operation name
        operation: &'static str,
        /// Provider error code, when the provider returned one
        code: Option<String>,
        /// Provider message
        message: String,
    },

    /// Provider returned a response missing a field we rely on
    #[error("{operation} returned an incomplete response: missing {field}")]
    MalformedResponse {
        /// Provider operation name
        operation: &'static str,
        /// Missing field
        field: &'static str,
    },
}

impl ProviderError {
    /// Build a `NotFound` error
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    /// Build a non-transient failure
    pub fn failed(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Failed {
            operation,
            code: None,
            message: message.into(),
        }
    }

    /// Whether this is the not-found outcome
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Whether retrying the call could succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }
}

/// Result alias for provider calls
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Identity provider operations (IAM)
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Names of every user in the account
    async fn list_users(&self) -> ProviderResult<Vec<String>>;

    /// Names of a group's members. `NotFound` when the group does not exist.
    async fn group_members(&self, group_name: &str) -> ProviderResult<Vec<String>>;

    /// A user's access keys, with last-used dates where known
    async fn list_access_keys(&self, user_name: &str) -> ProviderResult<Vec<KeyMetadata>>;

    /// Issue a new access key pair for the user
    async fn create_access_key(&self, user_name: &str) -> ProviderResult<NewAccessKey>;

    /// Set a key's status
    async fn update_access_key_status(
        &self,
        user_name: &str,
        access_key_id: &str,
        status: KeyStatus,
    ) -> ProviderResult<()>;

    /// Delete a key permanently
    async fn delete_access_key(&self, user_name: &str, access_key_id: &str) -> ProviderResult<()>;

    /// Resolve the user's principal ARN
    async fn user_arn(&self, user_name: &str) -> ProviderResult<String>;

    /// Fetch an inline user policy document. `NotFound` when absent.
    async fn get_user_policy(&self, user_name: &str, policy_name: &str) -> ProviderResult<String>;

    /// Create or replace an inline user policy
    async fn put_user_policy(
        &self,
        user_name: &str,
        policy_name: &str,
        policy_document: &str,
    ) -> ProviderResult<()>;
}

/// Current state of a secret in the store
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecretDescription {
    /// Secret ARN, when reported
    pub arn: Option<String>,
    /// Regions the secret is currently replicated to
    pub replica_regions: Vec<String>,
}

/// Secret store operations (Secrets Manager), bound to one region
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Describe a secret. `NotFound` when it does not exist.
    async fn describe_secret(&self, name: &str) -> ProviderResult<SecretDescription>;

    /// Overwrite the secret's current value
    async fn put_secret_value(&self, name: &str, value: &str) -> ProviderResult<()>;

    /// Add replicas in the given regions, overwriting stale replicas
    async fn replicate_secret(&self, name: &str, regions: &[String]) -> ProviderResult<()>;

    /// Create a secret replicated to `regions` in a single call
    async fn create_secret(
        &self,
        name: &str,
        description: &str,
        value: &str,
        regions: &[String],
    ) -> ProviderResult<()>;

    /// Attach a resource policy, rejecting any policy that would make the
    /// secret public
    async fn put_resource_policy(&self, name: &str, policy: &str) -> ProviderResult<()>;
}

/// Authenticated handle for one account
#[async_trait]
pub trait AccountSession: Send + Sync {
    /// Region the session was opened in
    fn region(&self) -> &str;

    /// Account id the session is authenticated against
    async fn account_id(&self) -> ProviderResult<String>;

    /// Identity provider client
    fn identity(&self) -> Arc<dyn IdentityProvider>;

    /// Secret store client for a region
    fn secrets(&self, region: &str) -> Arc<dyn SecretStore>;
}

/// Opens sessions for accounts
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Open an authenticated session scoped to `account_id`
    async fn open(&self, account_id: &str) -> ProviderResult<Arc<dyn AccountSession>>;
}

/// Enumerates an account's access keys
#[async_trait]
pub trait AccountScanner: Send + Sync {
    /// List every non-exempt user's access keys in user-then-key order
    async fn scan(&self, session: &dyn AccountSession) -> ProviderResult<Vec<KeyMetadata>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_is_distinct() {
        let err = ProviderError::not_found("secret User_alice_AccessKey");
        assert!(err.is_not_found());
        assert!(!err.is_transient());
        assert_eq!(err.to_string(), "secret User_alice_AccessKey not found");
    }

    #[test]
    fn failed_is_neither_not_found_nor_transient() {
        let err = ProviderError::failed("CreateAccessKey", "LimitExceeded");
        assert!(!err.is_not_found());
        assert!(!err.is_transient());
        assert!(err.to_string().contains("CreateAccessKey"));
    }

    #[test]
    fn transient_is_retryable() {
        let err = ProviderError::Transient {
            operation: "DescribeSecret",
            message: "Rate exceeded".into(),
        };
        assert!(err.is_transient());
    }
}
