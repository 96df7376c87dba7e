//! keycycle-aws: AWS implementations of the keycycle provider traits
//!
//! - [`IamIdentity`] - users, groups, access keys and inline policies
//! - [`SecretsManagerStore`] - per-user secrets and their replicas
//! - [`AssumeRoleSessionProvider`] - one verified session per account
//! - [`IamAccountScanner`] - key inventory minus the exemption group
//!
//! Every call is classified into a [`keycycle_core::ProviderError`] and
//! transient failures are retried under a [`RetryPolicy`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod iam;
mod retry;
mod scanner;
mod secrets;
mod session;

pub use error::{classify_code, missing, sdk_error};
pub use iam::IamIdentity;
pub use retry::{RetryPolicy, retry_create, retry_transient, transient};
pub use scanner::IamAccountScanner;
pub use secrets::SecretsManagerStore;
pub use session::{AssumeRoleSessionProvider, AwsAccountSession, role_arn};
