//! Audit lines
//!
//! One human-readable line per queued action. Dry runs and enforcing runs
//! produce the same structure; only the verb changes.

use serde::{Deserialize, Serialize};

use crate::model::{Action, ActionQueue, ActionSpec};

/// Whether a run only reports or also applies actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Dry run: report what would happen, mutate nothing
    Audit,
    /// Apply the queued actions
    Enforce,
}

impl RunMode {
    /// Mode for an effective dry-run flag
    pub fn from_dry_run(dry_run: bool) -> Self {
        if dry_run { Self::Audit } else { Self::Enforce }
    }

    /// Whether this is a dry run
    pub fn is_dry_run(&self) -> bool {
        matches!(self, Self::Audit)
    }

    /// Lower-case name, as exposed to notification templates
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Audit => "audit",
            Self::Enforce => "enforce",
        }
    }
}

impl std::fmt::Display for RunMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Logged when an evaluation queues nothing
pub const NO_ACTIONS: &str = "No actions to be taken on this account.";

/// Audit line for one action
pub fn describe(spec: &ActionSpec, mode: RunMode) -> String {
    let verb = match (spec.action, mode) {
        (Action::Rotate, RunMode::Audit) => "Would rotate",
        (Action::Rotate, RunMode::Enforce) => "Rotating",
        (Action::Deactivate, RunMode::Audit) => "Would deactivate",
        (Action::Deactivate, RunMode::Enforce) => "Deactivating",
        (Action::Delete, RunMode::Audit) => "Would delete",
        (Action::Delete, RunMode::Enforce) => "Deleting",
    };
    format!(
        "{verb} {key} for {user} -- {reason}",
        key = spec.key.access_key_id,
        user = spec.key.user_name,
        reason = spec.reason,
    )
}

/// Line for an action that was attempted and failed
pub fn describe_failure(spec: &ActionSpec, cause: &str) -> String {
    let verb = match spec.action {
        Action::Rotate => "rotate",
        Action::Deactivate => "deactivate",
        Action::Delete => "delete",
    };
    format!(
        "Failed to {verb} {key} for {user} -- {cause}",
        key = spec.key.access_key_id,
        user = spec.key.user_name,
    )
}

/// Log one line per queued action and return the lines in queue order.
///
/// An empty queue logs [`NO_ACTIONS`] once and returns nothing.
pub fn log_actions(queue: &ActionQueue, mode: RunMode) -> Vec<String> {
    if queue.is_empty() {
        tracing::info!(%mode, "{NO_ACTIONS}");
        return Vec::new();
    }

    queue
        .iter()
        .map(|spec| {
            let line = describe(spec, mode);
            tracing::info!(
                %mode,
                action = %spec.action,
                user = %spec.key.user_name,
                key_id = %spec.key.access_key_id,
                "{line}"
            );
            line
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{KeyMetadata, KeyStatus, ReasonCode};
    use chrono::{TimeZone, Utc};
    use rstest::rstest;

    fn spec(action: Action, reason: ReasonCode) -> ActionSpec {
        ActionSpec::new(
            action,
            KeyMetadata::new(
                "alice",
                "AKIA1",
                KeyStatus::Active,
                Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            ),
            reason,
        )
    }

    #[rstest]
    #[case(Action::Rotate, ReasonCode::RotationPeriodExceeded, RunMode::Audit,
        "Would rotate AKIA1 for alice -- key exceeded rotation period")]
    #[case(Action::Rotate, ReasonCode::RotationPeriodExceeded, RunMode::Enforce,
        "Rotating AKIA1 for alice -- key exceeded rotation period")]
    #[case(Action::Deactivate, ReasonCode::InstallationGraceExpired, RunMode::Audit,
        "Would deactivate AKIA1 for alice -- installation grace period expired")]
    #[case(Action::Deactivate, ReasonCode::InstallationGraceExpired, RunMode::Enforce,
        "Deactivating AKIA1 for alice -- installation grace period expired")]
    #[case(Action::Delete, ReasonCode::RecoveryGraceExceeded, RunMode::Audit,
        "Would delete AKIA1 for alice -- key exceeded recovery grace period")]
    #[case(Action::Delete, ReasonCode::RecoveryGraceExceeded, RunMode::Enforce,
        "Deleting AKIA1 for alice -- key exceeded recovery grace period")]
    fn audit_line_phrasing(
        #[case] action: Action,
        #[case] reason: ReasonCode,
        #[case] mode: RunMode,
        #[case] expected: &str,
    ) {
        assert_eq!(describe(&spec(action, reason), mode), expected);
    }

    #[test]
    fn empty_queue_yields_no_lines() {
        assert!(log_actions(&ActionQueue::new(), RunMode::Audit).is_empty());
    }

    #[test]
    fn one_line_per_action_in_order() {
        let queue: ActionQueue = [
            spec(Action::Delete, ReasonCode::RecoveryGraceExceeded),
            spec(Action::Rotate, ReasonCode::ForcedRotation),
        ]
        .into_iter()
        .collect();

        let lines = log_actions(&queue, RunMode::Enforce);
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("Deleting"));
        assert!(lines[1].ends_with("rotation forced by request"));
    }

    #[test]
    fn mode_follows_dry_run_flag() {
        assert_eq!(RunMode::from_dry_run(true), RunMode::Audit);
        assert_eq!(RunMode::from_dry_run(false), RunMode::Enforce);
        assert!(RunMode::Audit.is_dry_run());
        assert_eq!(RunMode::Enforce.to_string(), "enforce");
    }
}
