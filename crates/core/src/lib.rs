//! keycycle core: IAM access key lifecycle automation
//!
//! Keeps long-lived access keys inside a retention window. Each account run
//! scans the account's keys, classifies every key against the
//! [`PolicyWindow`], and either reports (dry run) or applies the resulting
//! actions before notifying the account owner.
//!
//! # Lifecycle
//!
//! - **Rotate** - issue a replacement key and publish it to the user's secret
//! - **Deactivate** - disable the old key once the installation grace expires
//!   and a newer key is in place
//! - **Delete** - remove the inactive key once the recovery grace expires
//!
//! Provider access goes through the traits in [`provider`]; the AWS
//! implementations live in `keycycle-aws`.
#![forbid(unsafe_code)]

/// Audit lines and run modes
pub mod audit;
/// Policy clock: key age to lifecycle action
pub mod clock;
/// Decision engine: inventory to action queue
pub mod engine;
/// Action executor
pub mod executor;
/// Key lifecycle data model
pub mod model;
/// Notification dispatch
pub mod notify;
/// Secret placement per partition
pub mod partition;
/// Per-account run orchestration
pub mod pipeline;
/// Provider traits and errors
pub mod provider;
/// Secret naming and policy documents
pub mod secret;
/// Runtime settings
pub mod settings;
/// Inbound trigger records
pub mod trigger;
/// Retention thresholds
pub mod window;

/// In-memory fakes for tests
#[cfg(any(test, feature = "test-util"))]
pub mod testing;

// ── Root re-exports ─────────────────────────────────────────────────────────

pub use crate::audit::RunMode;
pub use crate::engine::{Evaluation, build_action_queue, evaluate};
pub use crate::executor::{
    ActionError, ActionExecutor, ActionOutcome, ActionStep, Applied, ExecutionReport,
};
pub use crate::model::{
    Action, ActionQueue, ActionSpec, KeyMetadata, KeyStatus, NewAccessKey, PendingAction,
    ReasonCode,
};
pub use crate::notify::{NotificationSummary, Notifier, NotifyError, TemplateIds, TemplateValue};
pub use crate::partition::{Partition, SecretPlacement};
pub use crate::pipeline::{Pipeline, RunError, RunReport};
pub use crate::provider::{
    AccountScanner, AccountSession, IdentityProvider, ProviderError, ProviderResult,
    SecretDescription, SecretStore, SessionProvider,
};
pub use crate::settings::{Settings, SettingsError};
pub use crate::trigger::{TriggerError, TriggerEvent, parse_events};
pub use crate::window::{PolicyError, PolicyWindow};
