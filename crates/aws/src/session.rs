//! Account sessions
//!
//! A session is opened per account run. With a role name configured the
//! provider assumes `arn:{partition}:iam::{account}:role/{role}`; without
//! one the ambient credentials are used as-is. Either way the caller
//! identity is checked against the requested account before the session is
//! handed out.

use std::sync::Arc;

use async_trait::async_trait;
use aws_config::{BehaviorVersion, SdkConfig};
use aws_config::sts::AssumeRoleProvider;
use aws_credential_types::provider::SharedCredentialsProvider;
use aws_sdk_secretsmanager::config::Region;
use keycycle_core::{
    AccountSession, IdentityProvider, Partition, ProviderError, ProviderResult, SecretStore,
    SessionProvider,
};

use crate::error::{missing, sdk_error};
use crate::iam::IamIdentity;
use crate::retry::{RetryPolicy, retry_transient};
use crate::secrets::SecretsManagerStore;

/// Session for one verified account
#[derive(Debug, Clone)]
pub struct AwsAccountSession {
    config: SdkConfig,
    region: String,
    account_id: String,
    identity: Arc<IamIdentity>,
    retry: RetryPolicy,
}

impl AwsAccountSession {
    /// Verify the credentials in `config` belong to `expected_account`
    ///
    /// # Errors
    ///
    /// - the config carries no region
    /// - `GetCallerIdentity` fails
    /// - the caller belongs to a different account
    pub async fn verify(
        config: SdkConfig,
        expected_account: &str,
        retry: RetryPolicy,
    ) -> ProviderResult<Self> {
        let region = config
            .region()
            .map(ToString::to_string)
            .ok_or_else(|| ProviderError::failed("OpenSession", "no AWS region configured"))?;

        let sts = aws_sdk_sts::Client::new(&config);
        let sts = &sts;
        let identity = retry_transient(&retry, "GetCallerIdentity", move || async move {
            sts.get_caller_identity()
                .send()
                .await
                .map_err(|e| sdk_error("GetCallerIdentity", || "caller identity".to_string(), e))
        })
        .await?;

        let account_id = identity
            .account()
            .ok_or_else(|| missing("GetCallerIdentity", "Account"))?
            .to_string();
        if account_id != expected_account {
            return Err(ProviderError::Failed {
                operation: "GetCallerIdentity",
                code: Some("AccountMismatch".to_string()),
                message: format!(
                    "credentials belong to account {account_id}, expected {expected_account}"
                ),
            });
        }

        tracing::debug!(account = %account_id, region = %region, "Session verified");

        let identity = Arc::new(IamIdentity::new(
            aws_sdk_iam::Client::new(&config),
            retry.clone(),
        ));
        Ok(Self {
            config,
            region,
            account_id,
            identity,
            retry,
        })
    }
}

#[async_trait]
impl AccountSession for AwsAccountSession {
    fn region(&self) -> &str {
        &self.region
    }

    async fn account_id(&self) -> ProviderResult<String> {
        Ok(self.account_id.clone())
    }

    fn identity(&self) -> Arc<dyn IdentityProvider> {
        self.identity.clone()
    }

    fn secrets(&self, region: &str) -> Arc<dyn SecretStore> {
        let config = aws_sdk_secretsmanager::config::Builder::from(&self.config)
            .region(Region::new(region.to_string()))
            .build();
        Arc::new(SecretsManagerStore::new(
            aws_sdk_secretsmanager::Client::from_conf(config),
            self.retry.clone(),
        ))
    }
}

/// Role ARN for `role_name` in `account_id` within the session's partition
pub fn role_arn(partition: Partition, account_id: &str, role_name: &str) -> String {
    format!("arn:{partition}:iam::{account_id}:role/{role_name}")
}

/// Opens sessions by assuming a role in each target account
#[derive(Debug, Clone)]
pub struct AssumeRoleSessionProvider {
    base: SdkConfig,
    role_name: Option<String>,
    session_name: String,
    retry: RetryPolicy,
}

impl AssumeRoleSessionProvider {
    /// Build on top of an already loaded base config
    pub fn new(
        base: SdkConfig,
        role_name: Option<String>,
        session_name: impl Into<String>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            base,
            role_name,
            session_name: session_name.into(),
            retry,
        }
    }

    /// Load the base config from the environment (profile, env vars, IMDS)
    pub async fn from_env(
        role_name: Option<String>,
        session_name: impl Into<String>,
        retry: RetryPolicy,
    ) -> Self {
        let base = aws_config::defaults(BehaviorVersion::latest()).load().await;
        Self::new(base, role_name, session_name, retry)
    }

    async fn config_for(&self, account_id: &str) -> ProviderResult<SdkConfig> {
        let Some(role_name) = self.role_name.as_deref() else {
            return Ok(self.base.clone());
        };

        let region = self
            .base
            .region()
            .ok_or_else(|| ProviderError::failed("AssumeRole", "no AWS region configured"))?;
        let arn = role_arn(Partition::for_region(region.as_ref()), account_id, role_name);
        tracing::debug!(role = %arn, session = %self.session_name, "Assuming role");

        let provider = AssumeRoleProvider::builder(arn)
            .session_name(self.session_name.clone())
            .configure(&self.base)
            .build()
            .await;

        Ok(self
            .base
            .to_builder()
            .credentials_provider(SharedCredentialsProvider::new(provider))
            .build())
    }
}

#[async_trait]
impl SessionProvider for AssumeRoleSessionProvider {
    async fn open(&self, account_id: &str) -> ProviderResult<Arc<dyn AccountSession>> {
        let config = self.config_for(account_id).await?;
        let session = AwsAccountSession::verify(config, account_id, self.retry.clone()).await?;
        Ok(Arc::new(session))
    }
}
