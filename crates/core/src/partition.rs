//! Partition table
//!
//! Where rotated secrets live. Static configuration, never discovered at
//! runtime.

use serde::{Deserialize, Serialize};

/// AWS partition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Partition {
    /// Commercial regions (`aws`)
    Aws,
    /// GovCloud regions (`aws-us-gov`)
    AwsUsGov,
    /// China regions (`aws-cn`)
    AwsCn,
}

impl Partition {
    /// Partition a region belongs to
    pub fn for_region(region: &str) -> Self {
        if region.starts_with("us-gov-") {
            Self::AwsUsGov
        } else if region.starts_with("cn-") {
            Self::AwsCn
        } else {
            Self::Aws
        }
    }

    /// Partition identifier as it appears in ARNs
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Aws => "aws",
            Self::AwsUsGov => "aws-us-gov",
            Self::AwsCn => "aws-cn",
        }
    }

    /// Region that hosts the primary copy of every rotated secret
    pub fn secrets_home_region(&self) -> &'static str {
        match self {
            Self::Aws => "us-east-1",
            Self::AwsUsGov => "us-gov-west-1",
            Self::AwsCn => "cn-north-1",
        }
    }

    /// Regions every rotated secret is replicated to
    pub fn replica_regions(&self) -> &'static [&'static str] {
        match self {
            Self::Aws => &["us-east-2", "us-west-1", "us-west-2"],
            Self::AwsUsGov => &["us-gov-east-1"],
            Self::AwsCn => &["cn-northwest-1"],
        }
    }
}

impl std::fmt::Display for Partition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where one account's rotated secrets are written. Resolved once per
/// account run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretPlacement {
    /// Account the secrets belong to
    pub account_id: String,
    /// Account partition
    pub partition: Partition,
    /// Region hosting the primary secret
    pub home_region: String,
    /// Replica regions
    pub replica_regions: Vec<String>,
}

impl SecretPlacement {
    /// Derive the placement for an account from its session region
    pub fn resolve(account_id: impl Into<String>, session_region: &str) -> Self {
        let partition = Partition::for_region(session_region);
        Self {
            account_id: account_id.into(),
            partition,
            home_region: partition.secrets_home_region().to_string(),
            replica_regions: partition
                .replica_regions()
                .iter()
                .map(|r| (*r).to_string())
                .collect(),
        }
    }
}
