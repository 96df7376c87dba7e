//! Per-account run
//!
//! ```text
//! open session → scan → evaluate → audit log ─┬─ dry run ──────────────┬─▶ notify
//!                                             └─ enforce ─▶ execute ───┘
//! ```
//!
//! An empty queue stops after the audit log: nothing is executed and no
//! notification is sent.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::audit::{RunMode, log_actions};
use crate::engine::evaluate;
use crate::executor::{ActionExecutor, ExecutionReport};
use crate::model::{ActionQueue, PendingAction};
use crate::notify::{NotificationSummary, Notifier, NotifyError, TemplateIds, dispatch};
use crate::provider::{AccountScanner, ProviderError, SessionProvider};
use crate::settings::Settings;
use crate::trigger::TriggerEvent;
use crate::window::{PolicyError, PolicyWindow};

/// Failure that aborts a whole account run
///
/// Per-key action failures are not run failures; they are reported in
/// [`ExecutionReport`].
#[derive(Debug, Error)]
pub enum RunError {
    /// No session could be opened for the account
    #[error("failed to open session for account {account}: {source}")]
    Session {
        /// Account id
        account: String,
        /// Provider error
        #[source]
        source: ProviderError,
    },

    /// The key inventory could not be listed
    #[error("failed to scan account {account}: {source}")]
    Scan {
        /// Account id
        account: String,
        /// Provider error
        #[source]
        source: ProviderError,
    },

    /// The owner could not be notified
    #[error("failed to notify owner of account {account}: {source}")]
    Notify {
        /// Account id
        account: String,
        /// Notifier error
        #[source]
        source: NotifyError,
    },
}

/// What one account run did
#[derive(Debug)]
pub struct RunReport {
    /// Account id
    pub account_id: String,
    /// Audit or enforce
    pub mode: RunMode,
    /// Queued actions
    pub actions: ActionQueue,
    /// Forecast actions
    pub pending: Vec<PendingAction>,
    /// Execution outcomes; `None` for dry runs and empty queues
    pub execution: Option<ExecutionReport>,
    /// Whether a notification was sent
    pub notified: bool,
}

/// Wires the engine, executor and notifier together for account runs.
///
/// Holds no per-account state; one pipeline can serve many accounts
/// concurrently.
#[derive(Clone)]
pub struct Pipeline {
    sessions: Arc<dyn SessionProvider>,
    scanner: Arc<dyn AccountScanner>,
    notifier: Arc<dyn Notifier>,
    window: PolicyWindow,
    templates: TemplateIds,
    dry_run_default: bool,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("window", &self.window)
            .field("templates", &self.templates)
            .field("dry_run_default", &self.dry_run_default)
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    /// Build a pipeline from settings and provider implementations
    pub fn new(
        settings: &Settings,
        sessions: Arc<dyn SessionProvider>,
        scanner: Arc<dyn AccountScanner>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, PolicyError> {
        Ok(Self {
            sessions,
            scanner,
            notifier,
            window: settings.window()?,
            templates: settings.templates(),
            dry_run_default: settings.dry_run_flag,
        })
    }

    /// Run one account against the current time
    pub async fn run(&self, event: &TriggerEvent) -> Result<RunReport, RunError> {
        self.run_at(event, Utc::now()).await
    }

    /// Run one account as of `now`
    #[tracing::instrument(name = "account_run", skip_all, fields(account = %event.account, mode))]
    pub async fn run_at(
        &self,
        event: &TriggerEvent,
        now: DateTime<Utc>,
    ) -> Result<RunReport, RunError> {
        let mode = RunMode::from_dry_run(event.effective_dry_run(self.dry_run_default));
        tracing::Span::current().record("mode", mode.as_str());

        let session = self
            .sessions
            .open(&event.account)
            .await
            .map_err(|source| RunError::Session {
                account: event.account.clone(),
                source,
            })?;

        let keys = self
            .scanner
            .scan(session.as_ref())
            .await
            .map_err(|source| RunError::Scan {
                account: event.account.clone(),
                source,
            })?;
        tracing::info!(keys = keys.len(), "Scanned access keys");

        let evaluation = evaluate(&keys, &self.window, now, &event.forced_users());
        log_actions(&evaluation.queue, mode);

        let mut report = RunReport {
            account_id: event.account.clone(),
            mode,
            actions: evaluation.queue,
            pending: evaluation.pending,
            execution: None,
            notified: false,
        };

        if report.actions.is_empty() {
            return Ok(report);
        }

        if !mode.is_dry_run() {
            let execution = ActionExecutor::new(session).execute(&report.actions).await;
            tracing::info!(
                succeeded = execution.succeeded(),
                failed = execution.failed(),
                "Executed actions"
            );
            report.execution = Some(execution);
        }

        let summary = NotificationSummary {
            account_id: event.account.clone(),
            account_name: event.name.clone(),
            recipient: event.email.clone(),
            mode,
            actions: report.actions.clone(),
            pending: report.pending.clone(),
            failed: report
                .execution
                .as_ref()
                .map(ExecutionReport::failure_causes)
                .unwrap_or_default(),
        };
        dispatch(self.notifier.as_ref(), &self.templates, &summary)
            .await
            .map_err(|source| RunError::Notify {
                account: event.account.clone(),
                source,
            })?;
        report.notified = true;

        Ok(report)
    }
}
