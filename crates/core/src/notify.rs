//! Notification dispatch
//!
//! Picks the audit or enforcement template and hands a
//! [`NotificationSummary`] to a [`Notifier`]. Delivery is the notifier's
//! business; failures propagate to the caller and are never retried here.

use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::audit::{RunMode, describe, describe_failure};
use crate::model::{ActionQueue, PendingAction};

/// Notification failure
#[derive(Debug, Error)]
pub enum NotifyError {
    /// No template with this id could be found
    #[error("template {template_id} not found at {path}")]
    TemplateNotFound {
        /// Requested template id
        template_id: String,
        /// Where it was looked up
        path: PathBuf,
    },

    /// Template could not be read
    #[error("failed to read template {}: {source}", path.display())]
    TemplateRead {
        /// Template path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The message could not be assembled (bad address, empty body, ...)
    #[error("invalid notification: {0}")]
    InvalidMessage(String),

    /// The delivery service rejected or failed the send
    #[error("notification delivery failed: {message}")]
    Delivery {
        /// Service error code, when one was returned
        code: Option<String>,
        /// Service message
        message: String,
    },
}

/// Value substituted for a `{{token}}` in a template
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateValue {
    /// Plain text
    Text(String),
    /// One rendered line per entry
    List(Vec<String>),
}

/// Everything a notifier needs to tell the account owner what happened
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationSummary {
    /// Account id
    pub account_id: String,
    /// Human-readable account name
    pub account_name: String,
    /// Recipient address
    pub recipient: String,
    /// Audit or enforce
    pub mode: RunMode,
    /// Queued actions, in queue order
    pub actions: ActionQueue,
    /// Actions coming due within the warn period
    pub pending: Vec<PendingAction>,
    /// Failure cause per access key id, for actions that were attempted
    /// and failed
    #[serde(default)]
    pub failed: BTreeMap<String, String>,
}

impl NotificationSummary {
    /// One audit line per queued action. Failed actions say so instead of
    /// using the present tense.
    pub fn action_lines(&self) -> Vec<String> {
        self.actions
            .iter()
            .map(|spec| match self.failed.get(&spec.key.access_key_id) {
                Some(cause) => describe_failure(spec, cause),
                None => describe(spec, self.mode),
            })
            .collect()
    }

    /// One line per forecast action
    pub fn pending_lines(&self) -> Vec<String> {
        self.pending
            .iter()
            .map(|p| {
                let unit = if p.due_in_days == 1 { "day" } else { "days" };
                format!(
                    "{action} {key} for {user} in {days} {unit}",
                    action = p.action.label(),
                    key = p.key.access_key_id,
                    user = p.key.user_name,
                    days = p.due_in_days,
                )
            })
            .collect()
    }

    /// Token values for template rendering
    pub fn template_values(&self) -> BTreeMap<&'static str, TemplateValue> {
        BTreeMap::from([
            ("account_id", TemplateValue::Text(self.account_id.clone())),
            ("account_name", TemplateValue::Text(self.account_name.clone())),
            ("mode", TemplateValue::Text(self.mode.as_str().to_string())),
            ("actions", TemplateValue::List(self.action_lines())),
            ("pending_actions", TemplateValue::List(self.pending_lines())),
        ])
    }
}

/// Template ids for both run modes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateIds {
    /// Used for dry runs
    pub audit: String,
    /// Used when actions were applied
    pub enforce: String,
}

impl TemplateIds {
    /// Template id for a run mode
    pub fn for_mode(&self, mode: RunMode) -> &str {
        match mode {
            RunMode::Audit => &self.audit,
            RunMode::Enforce => &self.enforce,
        }
    }
}

/// Delivers notifications to account owners
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Render `template_id` with the summary and deliver it
    async fn notify(
        &self,
        template_id: &str,
        summary: &NotificationSummary,
    ) -> Result<(), NotifyError>;
}

/// Send the summary using the template matching its mode
pub async fn dispatch(
    notifier: &dyn Notifier,
    templates: &TemplateIds,
    summary: &NotificationSummary,
) -> Result<(), NotifyError> {
    let template_id = templates.for_mode(summary.mode);
    tracing::info!(
        account = %summary.account_id,
        recipient = %summary.recipient,
        template_id,
        actions = summary.actions.len(),
        pending = summary.pending.len(),
        "Dispatching notification"
    );
    notifier.notify(template_id, summary).await
}
