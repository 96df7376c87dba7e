//! Secrets Manager secret store

use async_trait::async_trait;
use aws_sdk_secretsmanager::Client;
use aws_sdk_secretsmanager::types::ReplicaRegionType;
use keycycle_core::{ProviderResult, SecretDescription, SecretStore};

use crate::error::sdk_error;
use crate::retry::{RetryPolicy, retry_create, retry_transient};

/// [`SecretStore`] over Secrets Manager in one region
#[derive(Debug, Clone)]
pub struct SecretsManagerStore {
    client: Client,
    retry: RetryPolicy,
}

impl SecretsManagerStore {
    /// Wrap a client already bound to the secret's home region
    pub fn new(client: Client, retry: RetryPolicy) -> Self {
        Self { client, retry }
    }
}

fn replica_regions(regions: &[String]) -> Vec<ReplicaRegionType> {
    regions
        .iter()
        .map(|region| ReplicaRegionType::builder().region(region).build())
        .collect()
}

fn secret_resource(name: &str) -> String {
    format!("secret {name}")
}

#[async_trait]
impl SecretStore for SecretsManagerStore {
    async fn describe_secret(&self, name: &str) -> ProviderResult<SecretDescription> {
        let client = &self.client;
        let output = retry_transient(&self.retry, "DescribeSecret", move || async move {
            client
                .describe_secret()
                .secret_id(name)
                .send()
                .await
                .map_err(|e| sdk_error("DescribeSecret", || secret_resource(name), e))
        })
        .await?;

        Ok(SecretDescription {
            arn: output.arn().map(str::to_string),
            replica_regions: output
                .replication_status()
                .iter()
                .filter_map(|status| status.region().map(str::to_string))
                .collect(),
        })
    }

    async fn put_secret_value(&self, name: &str, value: &str) -> ProviderResult<()> {
        let client = &self.client;
        retry_transient(&self.retry, "PutSecretValue", move || async move {
            client
                .put_secret_value()
                .secret_id(name)
                .secret_string(value)
                .send()
                .await
                .map_err(|e| sdk_error("PutSecretValue", || secret_resource(name), e))
        })
        .await?;
        Ok(())
    }

    async fn replicate_secret(&self, name: &str, regions: &[String]) -> ProviderResult<()> {
        let client = &self.client;
        retry_transient(&self.retry, "ReplicateSecretToRegions", move || async move {
            client
                .replicate_secret_to_regions()
                .secret_id(name)
                .set_add_replica_regions(Some(replica_regions(regions)))
                .force_overwrite_replica_secret(true)
                .send()
                .await
                .map_err(|e| sdk_error("ReplicateSecretToRegions", || secret_resource(name), e))
        })
        .await?;
        Ok(())
    }

    async fn create_secret(
        &self,
        name: &str,
        description: &str,
        value: &str,
        regions: &[String],
    ) -> ProviderResult<()> {
        let client = &self.client;
        let replicas = (!regions.is_empty()).then(|| replica_regions(regions));
        let replicas = &replicas;
        retry_create(&self.retry, "CreateSecret", move || async move {
            client
                .create_secret()
                .name(name)
                .description(description)
                .secret_string(value)
                .set_add_replica_regions(replicas.clone())
                .force_overwrite_replica_secret(true)
                .send()
                .await
                .map(|_| ())
                .map_err(|e| sdk_error("CreateSecret", || secret_resource(name), e))
        })
        .await
    }

    async fn put_resource_policy(&self, name: &str, policy: &str) -> ProviderResult<()> {
        let client = &self.client;
        retry_transient(&self.retry, "PutResourcePolicy", move || async move {
            client
                .put_resource_policy()
                .secret_id(name)
                .resource_policy(policy)
                .block_public_policy(true)
                .send()
                .await
                .map_err(|e| sdk_error("PutResourcePolicy", || secret_resource(name), e))
        })
        .await?;
        Ok(())
    }
}
