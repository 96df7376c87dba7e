//! Secret naming and access policy documents
//!
//! The naming convention and the action lists below are load-bearing:
//! existing secrets are found by name, and the policies grant exactly the
//! read access a user needs to fetch their own rotated key.

use serde_json::json;

use crate::partition::SecretPlacement;

/// Name of the inline IAM policy that lets a user read their own secret
pub const SECRETS_ACCESS_POLICY_NAME: &str = "SecretsAccessPolicy";

/// Description attached to secrets created by rotation
pub const SECRET_DESCRIPTION: &str = "Auto-created secret";

const POLICY_VERSION: &str = "2012-10-17";

/// Secret name for a user: `User_{user_name}_AccessKey`
pub fn secret_name(user_name: &str) -> String {
    format!("User_{user_name}_AccessKey")
}

/// Secret ARN in the placement's home region
pub fn secret_arn(placement: &SecretPlacement, secret_name: &str) -> String {
    format!(
        "arn:{partition}:secretsmanager:{region}:{account}:secret:{secret_name}",
        partition = placement.partition,
        region = placement.home_region,
        account = placement.account_id,
    )
}

/// Resource policy attached to the secret: only the owning user may read it
pub fn resource_policy(user_arn: &str) -> String {
    json!({
        "Version": POLICY_VERSION,
        "Statement": [
            {
                "Effect": "Allow",
                "Principal": { "AWS": user_arn },
                "Action": [
                    "secretsmanager:GetSecretValue",
                    "secretsmanager:DescribeSecret",
                    "secretsmanager:ListSecretVersionIds",
                    "secretsmanager:ListSecrets"
                ],
                "Resource": "*"
            }
        ]
    })
    .to_string()
}

/// Inline identity policy granting the user read access to their secret
pub fn identity_policy(secret_arn: &str) -> String {
    json!({
        "Version": POLICY_VERSION,
        "Statement": [
            {
                "Sid": "RetrieveSecretValue",
                "Effect": "Allow",
                "Action": [
                    "secretsmanager:GetSecretValue",
                    "secretsmanager:DescribeSecret",
                    "secretsmanager:ListSecretVersionIds"
                ],
                "Resource": secret_arn
            },
            {
                "Sid": "ListSecret",
                "Effect": "Allow",
                "Action": "secretsmanager:ListSecrets",
                "Resource": "*"
            }
        ]
    })
    .to_string()
}

/// Desired replica regions the secret is not replicated to yet, in table
/// order
pub fn missing_replicas(desired: &[String], current: &[String]) -> Vec<String> {
    desired
        .iter()
        .filter(|region| !current.contains(region))
        .cloned()
        .collect()
}
