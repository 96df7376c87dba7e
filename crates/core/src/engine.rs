//! Decision engine
//!
//! Turns one account's key inventory into an ordered [`ActionQueue`] by
//! running every key through the [policy clock](crate::clock).
//!
//! Exempt users are filtered out by the scanner before the inventory reaches
//! this module; the engine does no exemption lookup of its own.

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use crate::clock::{classify, forecast};
use crate::model::{Action, ActionQueue, ActionSpec, KeyMetadata, PendingAction, ReasonCode};
use crate::window::PolicyWindow;

/// Result of evaluating one account's inventory
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Evaluation {
    /// Actions to perform, in scan order
    pub queue: ActionQueue,
    /// Upcoming actions inside the warn period, for notification only
    pub pending: Vec<PendingAction>,
}

/// Build the action queue for one account.
///
/// Deterministic for identical inputs. See [`evaluate`] for the rules.
pub fn build_action_queue(
    keys: &[KeyMetadata],
    window: &PolicyWindow,
    now: DateTime<Utc>,
    forced_users: &HashSet<String>,
) -> ActionQueue {
    evaluate(keys, window, now, forced_users).queue
}

/// Evaluate one account's inventory.
///
/// - every key is classified once, in inventory order; repeated key ids are
///   dropped
/// - users in `forced_users` get a rotation regardless of key age
/// - at most one rotation is queued per user
/// - an active key that is due for rotation but already has a newer active
///   sibling has been rotated before and is left alone until its
///   installation grace runs out
/// - an active key past its installation grace is only deactivated when a
///   newer active sibling exists; a user's only key is rotated instead
/// - keys with no queued action are forecast against the warn period
pub fn evaluate(
    keys: &[KeyMetadata],
    window: &PolicyWindow,
    now: DateTime<Utc>,
    forced_users: &HashSet<String>,
) -> Evaluation {
    if keys.is_empty() {
        tracing::info!("Inventory is empty, nothing to evaluate");
        return Evaluation::default();
    }

    let mut queue = ActionQueue::new();
    let mut untouched: Vec<&KeyMetadata> = Vec::new();
    let mut seen: HashSet<&str> = HashSet::with_capacity(keys.len());

    for key in keys {
        if !seen.insert(key.access_key_id.as_str()) {
            tracing::warn!(
                user = %key.user_name,
                key_id = %key.access_key_id,
                "Duplicate key in inventory, ignoring repeat"
            );
            continue;
        }

        let forced = forced_users.contains(&key.user_name);
        let Some((action, reason)) = classify(key, window, now, forced) else {
            untouched.push(key);
            continue;
        };

        let (action, reason) = if action == Action::Deactivate && !has_newer_active_key(keys, key) {
            tracing::info!(
                user = %key.user_name,
                key_id = %key.access_key_id,
                "No replacement key exists, rotating instead of deactivating"
            );
            (Action::Rotate, ReasonCode::RotationPeriodExceeded)
        } else {
            (action, reason)
        };

        if action == Action::Rotate {
            if queue.has_action_for_user(&key.user_name, Action::Rotate) {
                tracing::debug!(
                    user = %key.user_name,
                    key_id = %key.access_key_id,
                    "Rotation already queued for user"
                );
                continue;
            }

            if reason == ReasonCode::RotationPeriodExceeded && has_newer_active_key(keys, key) {
                tracing::debug!(
                    user = %key.user_name,
                    key_id = %key.access_key_id,
                    "Key already replaced, inside installation grace"
                );
                untouched.push(key);
                continue;
            }
        }

        queue.push(ActionSpec::new(action, key.clone(), reason));
    }

    let pending = untouched
        .into_iter()
        .filter(|key| !queue.contains_key(&key.access_key_id))
        .filter_map(|key| forecast(key, window, now))
        .collect();

    Evaluation { queue, pending }
}

fn has_newer_active_key(keys: &[KeyMetadata], key: &KeyMetadata) -> bool {
    keys.iter().any(|other| {
        other.user_name == key.user_name
            && other.access_key_id != key.access_key_id
            && other.is_active()
            && other.created_at > key.created_at
    })
}
