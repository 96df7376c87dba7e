//! Action executor
//!
//! Applies an [`ActionQueue`] against one account session. Entries run one at
//! a time in queue order; a failed entry is logged and recorded in the
//! [`ExecutionReport`], and the executor moves on to the next one.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::OnceCell;

use crate::model::{Action, ActionQueue, ActionSpec, KeyMetadata, KeyStatus};
use crate::partition::SecretPlacement;
use crate::provider::{AccountSession, ProviderError};
use crate::secret::{
    SECRET_DESCRIPTION, SECRETS_ACCESS_POLICY_NAME, identity_policy, missing_replicas,
    resource_policy, secret_arn, secret_name,
};

/// Provider call an action was performing when it failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionStep {
    /// Issuing the replacement key
    CreateAccessKey,
    /// Looking up the account id for secret placement
    ResolvePlacement,
    /// Checking whether the user's secret exists
    DescribeSecret,
    /// Overwriting an existing secret
    PutSecretValue,
    /// Adding missing replica regions
    ReplicateSecret,
    /// Creating the secret with its replicas
    CreateSecret,
    /// Resolving the user's principal ARN
    GetUser,
    /// Attaching the secret's resource policy
    PutResourcePolicy,
    /// Checking for the inline access policy
    GetUserPolicy,
    /// Attaching the inline access policy
    PutUserPolicy,
    /// Deactivating a key
    UpdateAccessKeyStatus,
    /// Deleting a key
    DeleteAccessKey,
}

impl ActionStep {
    /// Provider operation name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreateAccessKey => "CreateAccessKey",
            Self::ResolvePlacement => "ResolvePlacement",
            Self::DescribeSecret => "DescribeSecret",
            Self::PutSecretValue => "PutSecretValue",
            Self::ReplicateSecret => "ReplicateSecretToRegions",
            Self::CreateSecret => "CreateSecret",
            Self::GetUser => "GetUser",
            Self::PutResourcePolicy => "PutResourcePolicy",
            Self::GetUserPolicy => "GetUserPolicy",
            Self::PutUserPolicy => "PutUserPolicy",
            Self::UpdateAccessKeyStatus => "UpdateAccessKey",
            Self::DeleteAccessKey => "DeleteAccessKey",
        }
    }
}

impl fmt::Display for ActionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure of a single queued action
#[derive(Debug, Error)]
pub enum ActionError {
    /// A provider call failed; the action was abandoned at `step`
    #[error("{action} {key_id} for {user} failed at {step}: {source}")]
    Provider {
        /// Action being applied
        action: Action,
        /// Owning user
        user: String,
        /// Key the action targeted
        key_id: String,
        /// Call that failed
        step: ActionStep,
        /// Provider error, unmodified
        #[source]
        source: ProviderError,
    },

    /// The new key could not be encoded for the secret store
    #[error("failed to encode new access key for {user}: {source}")]
    Encode {
        /// Owning user
        user: String,
        /// Serialization error
        #[source]
        source: serde_json::Error,
    },
}

impl ActionError {
    fn provider(spec: &ActionSpec, step: ActionStep, source: ProviderError) -> Self {
        Self::Provider {
            action: spec.action,
            user: spec.key.user_name.clone(),
            key_id: spec.key.access_key_id.clone(),
            step,
            source,
        }
    }

    /// Step the action failed at, if a provider call failed
    pub fn step(&self) -> Option<ActionStep> {
        match self {
            Self::Provider { step, .. } => Some(*step),
            Self::Encode { .. } => None,
        }
    }

    /// Short description of what went wrong, without the key and user
    pub fn cause(&self) -> String {
        match self {
            Self::Provider { step, source, .. } => format!("{source} (at {step})"),
            Self::Encode { source, .. } => format!("failed to encode new access key: {source}"),
        }
    }
}

/// What a successful action changed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    /// A replacement key was issued and published
    Rotated {
        /// Id of the replacement key
        new_access_key_id: String,
        /// Secret the key was written to
        secret_name: String,
        /// Whether the secret had to be created
        secret_created: bool,
    },
    /// The key was set Inactive
    Deactivated,
    /// The key was already Inactive; no call was made
    AlreadyInactive,
    /// The key was deleted
    Deleted,
    /// The provider no longer knew the key
    AlreadyDeleted,
}

/// Outcome of one queue entry
#[derive(Debug)]
pub struct ActionOutcome {
    /// The entry that was applied
    pub spec: ActionSpec,
    /// What happened
    pub result: Result<Applied, ActionError>,
}

impl ActionOutcome {
    /// Whether the action succeeded
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Outcomes of one queue, in queue order
#[derive(Debug, Default)]
pub struct ExecutionReport {
    /// Per-entry outcomes
    pub outcomes: Vec<ActionOutcome>,
}

impl ExecutionReport {
    /// Number of actions that succeeded
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    /// Number of actions that failed
    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    /// Failed entries with their errors
    pub fn failures(&self) -> impl Iterator<Item = (&ActionSpec, &ActionError)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (&o.spec, e)))
    }

    /// Failure cause per access key id
    pub fn failure_causes(&self) -> BTreeMap<String, String> {
        self.failures()
            .map(|(spec, error)| (spec.key.access_key_id.clone(), error.cause()))
            .collect()
    }
}

/// Applies queued actions to one account
pub struct ActionExecutor {
    session: Arc<dyn AccountSession>,
    placement: OnceCell<SecretPlacement>,
}

impl fmt::Debug for ActionExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionExecutor")
            .field("region", &self.session.region())
            .field("placement", &self.placement.get())
            .finish_non_exhaustive()
    }
}

impl ActionExecutor {
    /// Create an executor bound to an account session
    pub fn new(session: Arc<dyn AccountSession>) -> Self {
        Self {
            session,
            placement: OnceCell::new(),
        }
    }

    /// Apply every entry in order. Never stops early.
    pub async fn execute(&self, queue: &ActionQueue) -> ExecutionReport {
        let mut report = ExecutionReport::default();

        for spec in queue {
            let result = self.apply(spec).await;
            match &result {
                Ok(applied) => tracing::info!(
                    action = %spec.action,
                    user = %spec.key.user_name,
                    key_id = %spec.key.access_key_id,
                    ?applied,
                    "Action applied"
                ),
                Err(error) => tracing::error!(
                    action = %spec.action,
                    user = %spec.key.user_name,
                    key_id = %spec.key.access_key_id,
                    %error,
                    "Action failed, continuing with next key"
                ),
            }
            report.outcomes.push(ActionOutcome {
                spec: spec.clone(),
                result,
            });
        }

        report
    }

    /// Apply one entry
    pub async fn apply(&self, spec: &ActionSpec) -> Result<Applied, ActionError> {
        match spec.action {
            Action::Rotate => self.rotate(spec).await,
            Action::Deactivate => self.deactivate(spec).await,
            Action::Delete => self.delete(spec).await,
        }
    }

    /// Secret placement for this account, resolved on first use
    pub async fn placement(&self) -> Result<&SecretPlacement, ProviderError> {
        self.placement
            .get_or_try_init(|| async {
                let account_id = self.session.account_id().await?;
                let placement = SecretPlacement::resolve(account_id, self.session.region());
                tracing::debug!(
                    partition = %placement.partition,
                    home_region = %placement.home_region,
                    replicas = ?placement.replica_regions,
                    "Resolved secret placement"
                );
                Ok::<_, ProviderError>(placement)
            })
            .await
    }

    async fn rotate(&self, spec: &ActionSpec) -> Result<Applied, ActionError> {
        let user = spec.key.user_name.as_str();
        let identity = self.session.identity();

        let new_key = identity
            .create_access_key(user)
            .await
            .map_err(|e| ActionError::provider(spec, ActionStep::CreateAccessKey, e))?;
        tracing::info!(user, new_key_id = %new_key.access_key_id, "Created replacement key");

        let placement = self
            .placement()
            .await
            .map_err(|e| ActionError::provider(spec, ActionStep::ResolvePlacement, e))?;

        let value = new_key.to_secret_json().map_err(|source| ActionError::Encode {
            user: user.to_string(),
            source,
        })?;

        let name = secret_name(user);
        let store = self.session.secrets(&placement.home_region);

        let secret_created = match store.describe_secret(&name).await {
            Ok(description) => {
                store
                    .put_secret_value(&name, &value)
                    .await
                    .map_err(|e| ActionError::provider(spec, ActionStep::PutSecretValue, e))?;

                let missing =
                    missing_replicas(&placement.replica_regions, &description.replica_regions);
                if !missing.is_empty() {
                    tracing::info!(secret = %name, regions = ?missing, "Repairing missing replicas");
                    store
                        .replicate_secret(&name, &missing)
                        .await
                        .map_err(|e| ActionError::provider(spec, ActionStep::ReplicateSecret, e))?;
                }
                false
            }
            Err(e) if e.is_not_found() => {
                store
                    .create_secret(&name, SECRET_DESCRIPTION, &value, &placement.replica_regions)
                    .await
                    .map_err(|e| ActionError::provider(spec, ActionStep::CreateSecret, e))?;
                tracing::info!(secret = %name, "Created secret");
                true
            }
            Err(e) => return Err(ActionError::provider(spec, ActionStep::DescribeSecret, e)),
        };

        let user_arn = identity
            .user_arn(user)
            .await
            .map_err(|e| ActionError::provider(spec, ActionStep::GetUser, e))?;
        store
            .put_resource_policy(&name, &resource_policy(&user_arn))
            .await
            .map_err(|e| ActionError::provider(spec, ActionStep::PutResourcePolicy, e))?;

        match identity
            .get_user_policy(user, SECRETS_ACCESS_POLICY_NAME)
            .await
        {
            Ok(_) => {}
            Err(e) if e.is_not_found() => {
                let document = identity_policy(&secret_arn(placement, &name));
                identity
                    .put_user_policy(user, SECRETS_ACCESS_POLICY_NAME, &document)
                    .await
                    .map_err(|e| ActionError::provider(spec, ActionStep::PutUserPolicy, e))?;
                tracing::info!(user, policy = SECRETS_ACCESS_POLICY_NAME, "Attached inline policy");
            }
            Err(e) => return Err(ActionError::provider(spec, ActionStep::GetUserPolicy, e)),
        }

        Ok(Applied::Rotated {
            new_access_key_id: new_key.access_key_id,
            secret_name: name,
            secret_created,
        })
    }

    async fn deactivate(&self, spec: &ActionSpec) -> Result<Applied, ActionError> {
        let KeyMetadata {
            user_name,
            access_key_id,
            status,
            ..
        } = &spec.key;

        if *status == KeyStatus::Inactive {
            return Ok(Applied::AlreadyInactive);
        }

        self.session
            .identity()
            .update_access_key_status(user_name, access_key_id, KeyStatus::Inactive)
            .await
            .map_err(|e| ActionError::provider(spec, ActionStep::UpdateAccessKeyStatus, e))?;
        Ok(Applied::Deactivated)
    }

    async fn delete(&self, spec: &ActionSpec) -> Result<Applied, ActionError> {
        match self
            .session
            .identity()
            .delete_access_key(&spec.key.user_name, &spec.key.access_key_id)
            .await
        {
            Ok(()) => Ok(Applied::Deleted),
            Err(e) if e.is_not_found() => Ok(Applied::AlreadyDeleted),
            Err(e) => Err(ActionError::provider(spec, ActionStep::DeleteAccessKey, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ReasonCode;
    use crate::testing::{Call, FakeAccount};
    use chrono::{Duration, TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn spec(action: Action, status: KeyStatus) -> ActionSpec {
        let created = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() - Duration::days(120);
        ActionSpec::new(
            action,
            KeyMetadata::new("alice", "AKIAOLD", status, created),
            ReasonCode::RotationPeriodExceeded,
        )
    }

    #[tokio::test]
    async fn deactivate_inactive_key_makes_no_call() {
        let account = FakeAccount::new("111122223333", "us-east-1");
        let executor = ActionExecutor::new(account.session());

        let applied = executor
            .apply(&spec(Action::Deactivate, KeyStatus::Inactive))
            .await
            .unwrap();

        assert_eq!(applied, Applied::AlreadyInactive);
        assert!(account.calls().is_empty());
    }

    #[tokio::test]
    async fn delete_of_missing_key_counts_as_deleted() {
        let account = FakeAccount::new("111122223333", "us-east-1");
        let executor = ActionExecutor::new(account.session());

        let applied = executor
            .apply(&spec(Action::Delete, KeyStatus::Inactive))
            .await
            .unwrap();

        assert_eq!(applied, Applied::AlreadyDeleted);
        assert_eq!(
            account.calls(),
            vec![Call::DeleteAccessKey {
                user: "alice".into(),
                key_id: "AKIAOLD".into()
            }]
        );
    }

    #[tokio::test]
    async fn placement_is_resolved_once() {
        let account = FakeAccount::new("111122223333", "us-gov-east-1");
        let executor = ActionExecutor::new(account.session());

        let first = executor.placement().await.unwrap().clone();
        let second = executor.placement().await.unwrap().clone();

        assert_eq!(first, second);
        assert_eq!(first.home_region, "us-gov-west-1");
        assert_eq!(account.account_id_lookups(), 1);
    }

    #[test]
    fn action_error_names_failed_step() {
        let err = ActionError::provider(
            &spec(Action::Rotate, KeyStatus::Active),
            ActionStep::PutResourcePolicy,
            ProviderError::failed("PutResourcePolicy", "MalformedPolicyDocument"),
        );
        assert_eq!(err.step(), Some(ActionStep::PutResourcePolicy));
        assert!(err.to_string().contains("ROTATE AKIAOLD for alice failed at PutResourcePolicy"));
    }
}
