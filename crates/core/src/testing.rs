//! In-memory fakes for the provider and notifier seams
//!
//! [`FakeAccount`] plays the identity provider, the secret store, the
//! session, the session provider and the scanner for a single account. It
//! keeps real state (keys, secrets, inline policies) so repeated runs observe
//! earlier mutations, and records every call in order.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::SecretString;

use crate::model::{KeyMetadata, KeyStatus, NewAccessKey};
use crate::notify::{NotificationSummary, Notifier, NotifyError};
use crate::partition::Partition;
use crate::provider::{
    AccountScanner, AccountSession, IdentityProvider, ProviderError, ProviderResult,
    SecretDescription, SecretStore, SessionProvider,
};

/// One recorded provider call
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum Call {
    ListUsers,
    GetGroup {
        group: String,
    },
    ListAccessKeys {
        user: String,
    },
    CreateAccessKey {
        user: String,
    },
    UpdateAccessKey {
        user: String,
        key_id: String,
        status: KeyStatus,
    },
    DeleteAccessKey {
        user: String,
        key_id: String,
    },
    GetUser {
        user: String,
    },
    GetUserPolicy {
        user: String,
        policy: String,
    },
    PutUserPolicy {
        user: String,
        policy: String,
    },
    DescribeSecret {
        region: String,
        name: String,
    },
    PutSecretValue {
        region: String,
        name: String,
    },
    ReplicateSecret {
        region: String,
        name: String,
        regions: Vec<String>,
    },
    CreateSecret {
        region: String,
        name: String,
        regions: Vec<String>,
    },
    PutResourcePolicy {
        region: String,
        name: String,
    },
}

impl Call {
    /// Operation name, matching the provider API
    pub fn operation(&self) -> &'static str {
        match self {
            Self::ListUsers => "ListUsers",
            Self::GetGroup { .. } => "GetGroup",
            Self::ListAccessKeys { .. } => "ListAccessKeys",
            Self::CreateAccessKey { .. } => "CreateAccessKey",
            Self::UpdateAccessKey { .. } => "UpdateAccessKey",
            Self::DeleteAccessKey { .. } => "DeleteAccessKey",
            Self::GetUser { .. } => "GetUser",
            Self::GetUserPolicy { .. } => "GetUserPolicy",
            Self::PutUserPolicy { .. } => "PutUserPolicy",
            Self::DescribeSecret { .. } => "DescribeSecret",
            Self::PutSecretValue { .. } => "PutSecretValue",
            Self::ReplicateSecret { .. } => "ReplicateSecretToRegions",
            Self::CreateSecret { .. } => "CreateSecret",
            Self::PutResourcePolicy { .. } => "PutResourcePolicy",
        }
    }

    /// Whether the call changes provider state
    pub fn is_mutation(&self) -> bool {
        !matches!(
            self,
            Self::ListUsers
                | Self::GetGroup { .. }
                | Self::ListAccessKeys { .. }
                | Self::GetUser { .. }
                | Self::GetUserPolicy { .. }
                | Self::DescribeSecret { .. }
        )
    }

    fn user(&self) -> Option<&str> {
        match self {
            Self::ListAccessKeys { user }
            | Self::CreateAccessKey { user }
            | Self::UpdateAccessKey { user, .. }
            | Self::DeleteAccessKey { user, .. }
            | Self::GetUser { user }
            | Self::GetUserPolicy { user, .. }
            | Self::PutUserPolicy { user, .. } => Some(user),
            _ => None,
        }
    }
}

/// Stored secret
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeSecret {
    /// Description given at creation
    pub description: String,
    /// Current value
    pub value: String,
    /// Replica regions
    pub replicas: Vec<String>,
    /// Attached resource policy
    pub resource_policy: Option<String>,
}

#[derive(Debug, Clone)]
struct Failure {
    operation: &'static str,
    user: Option<String>,
    transient: bool,
}

#[derive(Debug, Default)]
struct State {
    users: Vec<String>,
    groups: HashMap<String, Vec<String>>,
    keys: Vec<KeyMetadata>,
    secrets: BTreeMap<String, FakeSecret>,
    user_policies: HashMap<(String, String), String>,
    failures: Vec<Failure>,
    calls: Vec<Call>,
    account_id_lookups: usize,
    issued: usize,
}

#[derive(Debug)]
struct Inner {
    account_id: String,
    region: String,
    now: DateTime<Utc>,
    state: Mutex<State>,
}

/// In-memory account
#[derive(Debug, Clone)]
pub struct FakeAccount {
    inner: Arc<Inner>,
}

impl FakeAccount {
    /// Empty account whose session lives in `region`
    pub fn new(account_id: impl Into<String>, region: impl Into<String>) -> Self {
        Self::at(account_id, region, Utc::now())
    }

    /// Empty account whose clock is frozen at `now` (used for issued keys)
    pub fn at(
        account_id: impl Into<String>,
        region: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                account_id: account_id.into(),
                region: region.into(),
                now,
                state: Mutex::new(State::default()),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a key to the inventory, registering its user
    #[must_use]
    pub fn with_key(self, key: KeyMetadata) -> Self {
        {
            let mut state = self.state();
            if !state.users.contains(&key.user_name) {
                state.users.push(key.user_name.clone());
            }
            state.keys.push(key);
        }
        self
    }

    /// Register a user with no keys
    #[must_use]
    pub fn with_user(self, user: &str) -> Self {
        {
            let mut state = self.state();
            if !state.users.iter().any(|u| u == user) {
                state.users.push(user.to_string());
            }
        }
        self
    }

    /// Add a user to a group, creating the group if needed
    #[must_use]
    pub fn with_group_member(self, group: &str, user: &str) -> Self {
        self.state()
            .groups
            .entry(group.to_string())
            .or_default()
            .push(user.to_string());
        self
    }

    /// Add an existing secret replicated to `replicas`
    #[must_use]
    pub fn with_secret(self, name: &str, replicas: &[&str]) -> Self {
        self.state().secrets.insert(
            name.to_string(),
            FakeSecret {
                description: "pre-existing".to_string(),
                value: "{}".to_string(),
                replicas: replicas.iter().map(|r| (*r).to_string()).collect(),
                resource_policy: None,
            },
        );
        self
    }

    /// Attach an existing inline policy to a user
    #[must_use]
    pub fn with_user_policy(self, user: &str, policy: &str, document: &str) -> Self {
        self.state()
            .user_policies
            .insert((user.to_string(), policy.to_string()), document.to_string());
        self
    }

    /// Fail every call to `operation` with a non-transient error
    #[must_use]
    pub fn failing(self, operation: &'static str) -> Self {
        self.push_failure(operation, None, false)
    }

    /// Fail calls to `operation` for one user only
    #[must_use]
    pub fn failing_for_user(self, operation: &'static str, user: &str) -> Self {
        self.push_failure(operation, Some(user.to_string()), false)
    }

    /// Fail every call to `operation` with a transient error
    #[must_use]
    pub fn failing_transiently(self, operation: &'static str) -> Self {
        self.push_failure(operation, None, true)
    }

    fn push_failure(self, operation: &'static str, user: Option<String>, transient: bool) -> Self {
        self.state().failures.push(Failure {
            operation,
            user,
            transient,
        });
        self
    }

    /// Session handle backed by this account
    pub fn session(&self) -> Arc<dyn AccountSession> {
        Arc::new(self.clone())
    }

    /// Every call made so far, in order
    pub fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    /// Calls that changed state, in order
    pub fn mutations(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_mutation).collect()
    }

    /// Operation names of every call, in order
    pub fn operations(&self) -> Vec<&'static str> {
        self.state().calls.iter().map(Call::operation).collect()
    }

    /// How often the account id was looked up
    pub fn account_id_lookups(&self) -> usize {
        self.state().account_id_lookups
    }

    /// Current key inventory
    pub fn keys(&self) -> Vec<KeyMetadata> {
        self.state().keys.clone()
    }

    /// Stored secret by name
    pub fn secret(&self, name: &str) -> Option<FakeSecret> {
        self.state().secrets.get(name).cloned()
    }

    /// Stored inline policy document
    pub fn user_policy(&self, user: &str, policy: &str) -> Option<String> {
        self.state()
            .user_policies
            .get(&(user.to_string(), policy.to_string()))
            .cloned()
    }

    /// Record the call, then apply any injected failure
    fn record(&self, call: Call) -> ProviderResult<()> {
        let mut state = self.state();
        let operation = call.operation();
        let user = call.user().map(str::to_string);
        state.calls.push(call);

        let failure = state.failures.iter().find(|f| {
            f.operation == operation && (f.user.is_none() || f.user.as_deref() == user.as_deref())
        });
        match failure {
            Some(f) if f.transient => Err(ProviderError::Transient {
                operation,
                message: "Rate exceeded".to_string(),
            }),
            Some(_) => Err(ProviderError::Failed {
                operation,
                code: Some("InjectedFailure".to_string()),
                message: format!("{operation} failed"),
            }),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl IdentityProvider for FakeAccount {
    async fn list_users(&self) -> ProviderResult<Vec<String>> {
        self.record(Call::ListUsers)?;
        Ok(self.state().users.clone())
    }

    async fn group_members(&self, group_name: &str) -> ProviderResult<Vec<String>> {
        self.record(Call::GetGroup {
            group: group_name.to_string(),
        })?;
        self.state()
            .groups
            .get(group_name)
            .cloned()
            .ok_or_else(|| ProviderError::not_found(format!("group {group_name}")))
    }

    async fn list_access_keys(&self, user_name: &str) -> ProviderResult<Vec<KeyMetadata>> {
        self.record(Call::ListAccessKeys {
            user: user_name.to_string(),
        })?;
        Ok(self
            .state()
            .keys
            .iter()
            .filter(|k| k.user_name == user_name)
            .cloned()
            .collect())
    }

    async fn create_access_key(&self, user_name: &str) -> ProviderResult<NewAccessKey> {
        self.record(Call::CreateAccessKey {
            user: user_name.to_string(),
        })?;

        let mut state = self.state();
        state.issued += 1;
        let access_key_id = format!("AKIAFAKE{:08}", state.issued);
        state.keys.push(KeyMetadata::new(
            user_name,
            access_key_id.clone(),
            KeyStatus::Active,
            self.inner.now,
        ));

        Ok(NewAccessKey {
            user_name: user_name.to_string(),
            access_key_id,
            status: KeyStatus::Active,
            secret_access_key: SecretString::from(format!("fake-secret-{}", state.issued)),
            created_at: Some(self.inner.now),
        })
    }

    async fn update_access_key_status(
        &self,
        user_name: &str,
        access_key_id: &str,
        status: KeyStatus,
    ) -> ProviderResult<()> {
        self.record(Call::UpdateAccessKey {
            user: user_name.to_string(),
            key_id: access_key_id.to_string(),
            status,
        })?;

        let mut state = self.state();
        let key = state
            .keys
            .iter_mut()
            .find(|k| k.user_name == user_name && k.access_key_id == access_key_id)
            .ok_or_else(|| ProviderError::not_found(format!("access key {access_key_id}")))?;
        key.status = status;
        Ok(())
    }

    async fn delete_access_key(&self, user_name: &str, access_key_id: &str) -> ProviderResult<()> {
        self.record(Call::DeleteAccessKey {
            user: user_name.to_string(),
            key_id: access_key_id.to_string(),
        })?;

        let mut state = self.state();
        let before = state.keys.len();
        state
            .keys
            .retain(|k| !(k.user_name == user_name && k.access_key_id == access_key_id));
        if state.keys.len() == before {
            return Err(ProviderError::not_found(format!("access key {access_key_id}")));
        }
        Ok(())
    }

    async fn user_arn(&self, user_name: &str) -> ProviderResult<String> {
        self.record(Call::GetUser {
            user: user_name.to_string(),
        })?;
        Ok(format!(
            "arn:{}:iam::{}:user/{user_name}",
            Partition::for_region(&self.inner.region),
            self.inner.account_id
        ))
    }

    async fn get_user_policy(&self, user_name: &str, policy_name: &str) -> ProviderResult<String> {
        self.record(Call::GetUserPolicy {
            user: user_name.to_string(),
            policy: policy_name.to_string(),
        })?;
        self.user_policy(user_name, policy_name)
            .ok_or_else(|| ProviderError::not_found(format!("policy {policy_name}")))
    }

    async fn put_user_policy(
        &self,
        user_name: &str,
        policy_name: &str,
        policy_document: &str,
    ) -> ProviderResult<()> {
        self.record(Call::PutUserPolicy {
            user: user_name.to_string(),
            policy: policy_name.to_string(),
        })?;
        self.state().user_policies.insert(
            (user_name.to_string(), policy_name.to_string()),
            policy_document.to_string(),
        );
        Ok(())
    }
}

/// Secret store view of a [`FakeAccount`] bound to one region
#[derive(Debug, Clone)]
pub struct FakeSecretStore {
    account: FakeAccount,
    region: String,
}

#[async_trait]
impl SecretStore for FakeSecretStore {
    async fn describe_secret(&self, name: &str) -> ProviderResult<SecretDescription> {
        self.account.record(Call::DescribeSecret {
            region: self.region.clone(),
            name: name.to_string(),
        })?;
        let secret = self
            .account
            .secret(name)
            .ok_or_else(|| ProviderError::not_found(format!("secret {name}")))?;
        Ok(SecretDescription {
            arn: None,
            replica_regions: secret.replicas,
        })
    }

    async fn put_secret_value(&self, name: &str, value: &str) -> ProviderResult<()> {
        self.account.record(Call::PutSecretValue {
            region: self.region.clone(),
            name: name.to_string(),
        })?;
        let mut state = self.account.state();
        let secret = state
            .secrets
            .get_mut(name)
            .ok_or_else(|| ProviderError::not_found(format!("secret {name}")))?;
        secret.value = value.to_string();
        Ok(())
    }

    async fn replicate_secret(&self, name: &str, regions: &[String]) -> ProviderResult<()> {
        self.account.record(Call::ReplicateSecret {
            region: self.region.clone(),
            name: name.to_string(),
            regions: regions.to_vec(),
        })?;
        let mut state = self.account.state();
        let secret = state
            .secrets
            .get_mut(name)
            .ok_or_else(|| ProviderError::not_found(format!("secret {name}")))?;
        for region in regions {
            if !secret.replicas.contains(region) {
                secret.replicas.push(region.clone());
            }
        }
        Ok(())
    }

    async fn create_secret(
        &self,
        name: &str,
        description: &str,
        value: &str,
        regions: &[String],
    ) -> ProviderResult<()> {
        self.account.record(Call::CreateSecret {
            region: self.region.clone(),
            name: name.to_string(),
            regions: regions.to_vec(),
        })?;
        let mut state = self.account.state();
        if state.secrets.contains_key(name) {
            return Err(ProviderError::Failed {
                operation: "CreateSecret",
                code: Some("ResourceExistsException".to_string()),
                message: format!("secret {name} already exists"),
            });
        }
        state.secrets.insert(
            name.to_string(),
            FakeSecret {
                description: description.to_string(),
                value: value.to_string(),
                replicas: regions.to_vec(),
                resource_policy: None,
            },
        );
        Ok(())
    }

    async fn put_resource_policy(&self, name: &str, policy: &str) -> ProviderResult<()> {
        self.account.record(Call::PutResourcePolicy {
            region: self.region.clone(),
            name: name.to_string(),
        })?;
        let mut state = self.account.state();
        let secret = state
            .secrets
            .get_mut(name)
            .ok_or_else(|| ProviderError::not_found(format!("secret {name}")))?;
        secret.resource_policy = Some(policy.to_string());
        Ok(())
    }
}

#[async_trait]
impl AccountSession for FakeAccount {
    fn region(&self) -> &str {
        &self.inner.region
    }

    async fn account_id(&self) -> ProviderResult<String> {
        self.state().account_id_lookups += 1;
        Ok(self.inner.account_id.clone())
    }

    fn identity(&self) -> Arc<dyn IdentityProvider> {
        Arc::new(self.clone())
    }

    fn secrets(&self, region: &str) -> Arc<dyn SecretStore> {
        Arc::new(FakeSecretStore {
            account: self.clone(),
            region: region.to_string(),
        })
    }
}

#[async_trait]
impl SessionProvider for FakeAccount {
    async fn open(&self, account_id: &str) -> ProviderResult<Arc<dyn AccountSession>> {
        if account_id == self.inner.account_id {
            Ok(self.session())
        } else {
            Err(ProviderError::Failed {
                operation: "AssumeRole",
                code: Some("AccessDenied".to_string()),
                message: format!("no session for account {account_id}"),
            })
        }
    }
}

#[async_trait]
impl AccountScanner for FakeAccount {
    async fn scan(&self, _session: &dyn AccountSession) -> ProviderResult<Vec<KeyMetadata>> {
        Ok(self.keys())
    }
}

/// Notifier that records what it was asked to send
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    sent: Arc<Mutex<Vec<(String, NotificationSummary)>>>,
    fail: bool,
}

impl RecordingNotifier {
    /// Notifier that accepts everything
    pub fn new() -> Self {
        Self::default()
    }

    /// Notifier that records, then rejects every send
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// `(template_id, summary)` pairs in send order
    pub fn sent(&self) -> Vec<(String, NotificationSummary)> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(
        &self,
        template_id: &str,
        summary: &NotificationSummary,
    ) -> Result<(), NotifyError> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((template_id.to_string(), summary.clone()));

        if self.fail {
            return Err(NotifyError::Delivery {
                code: Some("MessageRejected".to_string()),
                message: "Email address is not verified".to_string(),
            });
        }
        Ok(())
    }
}
