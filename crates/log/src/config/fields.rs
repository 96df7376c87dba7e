//! Global fields

use serde::{Deserialize, Serialize};

/// Fields recorded on the root span
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fields {
    /// Service name
    pub service: Option<String>,
    /// Deployment environment (dev/staging/prod)
    pub env: Option<String>,
    /// Build version
    pub version: Option<String>,
    /// AWS region the process runs in
    pub region: Option<String>,
}

impl Fields {
    /// Read fields from the process environment
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read fields through an arbitrary variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            service: lookup("KEYCYCLE_SERVICE"),
            env: lookup("KEYCYCLE_ENV"),
            version: lookup("KEYCYCLE_VERSION")
                .or_else(|| option_env!("CARGO_PKG_VERSION").map(String::from)),
            region: lookup("KEYCYCLE_REGION").or_else(|| lookup("AWS_REGION")),
        }
    }

    /// Whether no field is set
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.service.is_none() && self.env.is_none() && self.version.is_none() && self.region.is_none()
    }
}
