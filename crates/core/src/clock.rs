//! Policy clock
//!
//! Pure mapping from a key's age and status to the lifecycle action it is
//! due for. Per key this is a three-phase retention state machine:
//!
//! ```text
//! Active ──rotate──▶ (old key kept active for installation grace)
//!        ──deactivate──▶ Inactive (kept for recovery grace) ──delete──▶ gone
//! ```
//!
//! All thresholds are inclusive: a key exactly at a threshold is actioned.

use chrono::{DateTime, Utc};

use crate::model::{Action, KeyMetadata, KeyStatus, PendingAction, ReasonCode};
use crate::window::PolicyWindow;

/// Decide which action, if any, a key is due for.
///
/// `forced` short-circuits to [`Action::Rotate`] regardless of age or status.
/// The clock looks at one key only: an active key past its installation
/// grace classifies as [`Action::Deactivate`], and the engine turns that into
/// a rotation when the user has no newer active key.
pub fn classify(
    key: &KeyMetadata,
    window: &PolicyWindow,
    now: DateTime<Utc>,
    forced: bool,
) -> Option<(Action, ReasonCode)> {
    if forced {
        return Some((Action::Rotate, ReasonCode::ForcedRotation));
    }

    let age = key.age_days(now);

    match key.status {
        KeyStatus::Active if age >= window.deactivate_at() => {
            Some((Action::Deactivate, ReasonCode::InstallationGraceExpired))
        }
        KeyStatus::Active if age >= window.rotate_at() => {
            Some((Action::Rotate, ReasonCode::RotationPeriodExceeded))
        }
        KeyStatus::Inactive if age >= window.delete_at() => {
            Some((Action::Delete, ReasonCode::RecoveryGraceExceeded))
        }
        // Fresh, inside installation grace, or inactive inside recovery grace
        KeyStatus::Active | KeyStatus::Inactive => None,
    }
}

/// Report the next threshold a key has not reached yet, if it falls inside
/// the warn period.
///
/// Callers only forecast keys with no queued action. Returns `None` when the
/// key is past its last threshold, when the next threshold is further out
/// than the warn period, or when the warn period is zero.
pub fn forecast(
    key: &KeyMetadata,
    window: &PolicyWindow,
    now: DateTime<Utc>,
) -> Option<PendingAction> {
    let warn = i64::from(window.pending_action_warn_period());
    if warn == 0 {
        return None;
    }

    let age = key.age_days(now);
    let (action, threshold) = match key.status {
        KeyStatus::Active if age < window.rotate_at() => (Action::Rotate, window.rotate_at()),
        KeyStatus::Active if age < window.deactivate_at() => {
            (Action::Deactivate, window.deactivate_at())
        }
        KeyStatus::Inactive if age < window.delete_at() => (Action::Delete, window.delete_at()),
        KeyStatus::Active | KeyStatus::Inactive => return None,
    };

    let due_in_days = threshold - age;
    (due_in_days <= warn).then(|| PendingAction {
        action,
        key: key.clone(),
        due_in_days,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use rstest::rstest;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
    }

    fn key_aged(status: KeyStatus, age_days: i64) -> KeyMetadata {
        KeyMetadata::new("alice", "AKIA1", status, now() - Duration::days(age_days))
    }

    fn window() -> PolicyWindow {
        PolicyWindow::new(90, 7, 7, 5).unwrap()
    }

    #[rstest]
    #[case::fresh(KeyStatus::Active, 0, None)]
    #[case::just_before_rotation(KeyStatus::Active, 89, None)]
    #[case::at_rotation(KeyStatus::Active, 90, Some((Action::Rotate, ReasonCode::RotationPeriodExceeded)))]
    #[case::inside_installation_grace(KeyStatus::Active, 96, Some((Action::Rotate, ReasonCode::RotationPeriodExceeded)))]
    #[case::at_deactivation(KeyStatus::Active, 97, Some((Action::Deactivate, ReasonCode::InstallationGraceExpired)))]
    #[case::lingering_active_sibling(KeyStatus::Active, 400, Some((Action::Deactivate, ReasonCode::InstallationGraceExpired)))]
    #[case::inactive_fresh(KeyStatus::Inactive, 10, None)]
    #[case::inactive_at_recovery_start(KeyStatus::Inactive, 97, None)]
    #[case::inactive_inside_recovery(KeyStatus::Inactive, 103, None)]
    #[case::inactive_at_deletion(KeyStatus::Inactive, 104, Some((Action::Delete, ReasonCode::RecoveryGraceExceeded)))]
    fn classify_boundaries(
        #[case] status: KeyStatus,
        #[case] age: i64,
        #[case] expected: Option<(Action, ReasonCode)>,
    ) {
        assert_eq!(classify(&key_aged(status, age), &window(), now(), false), expected);
    }

    #[rstest]
    #[case(KeyStatus::Active, 0)]
    #[case(KeyStatus::Active, 500)]
    #[case(KeyStatus::Inactive, 3)]
    fn forced_always_rotates(#[case] status: KeyStatus, #[case] age: i64) {
        assert_eq!(
            classify(&key_aged(status, age), &window(), now(), true),
            Some((Action::Rotate, ReasonCode::ForcedRotation))
        );
    }

    #[test]
    fn future_creation_date_is_fresh() {
        let key = key_aged(KeyStatus::Active, -3);
        assert_eq!(classify(&key, &window(), now(), false), None);
    }

    #[rstest]
    #[case::outside_warn(KeyStatus::Active, 80, None)]
    #[case::rotation_in_five(KeyStatus::Active, 85, Some((Action::Rotate, 5)))]
    #[case::rotation_tomorrow(KeyStatus::Active, 89, Some((Action::Rotate, 1)))]
    #[case::deactivation_soon(KeyStatus::Active, 93, Some((Action::Deactivate, 4)))]
    #[case::already_due(KeyStatus::Active, 97, None)]
    #[case::deletion_soon(KeyStatus::Inactive, 100, Some((Action::Delete, 4)))]
    #[case::inactive_far(KeyStatus::Inactive, 50, None)]
    fn forecast_within_warn_period(
        #[case] status: KeyStatus,
        #[case] age: i64,
        #[case] expected: Option<(Action, i64)>,
    ) {
        let pending = forecast(&key_aged(status, age), &window(), now());
        assert_eq!(pending.map(|p| (p.action, p.due_in_days)), expected);
    }

    #[test]
    fn zero_warn_period_disables_forecast() {
        let window = PolicyWindow::new(90, 7, 7, 0).unwrap();
        assert!(forecast(&key_aged(KeyStatus::Active, 89), &window, now()).is_none());
    }
}
