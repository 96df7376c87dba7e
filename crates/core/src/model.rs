//! Key lifecycle data model
//!
//! Snapshots of access keys as the scanner saw them, and the actions the
//! decision engine derives from them.

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

/// Access key status as reported by the identity provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyStatus {
    /// Key can authenticate requests
    Active,
    /// Key is disabled but still exists
    Inactive,
}

impl KeyStatus {
    /// Parse the provider's wire representation (`"Active"` / `"Inactive"`)
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Active" => Some(Self::Active),
            "Inactive" => Some(Self::Inactive),
            _ => None,
        }
    }

    /// Provider wire representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "Active",
            Self::Inactive => "Inactive",
        }
    }
}

impl std::fmt::Display for KeyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable snapshot of one access key taken at scan time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyMetadata {
    /// Owning IAM user name
    pub user_name: String,

    /// Access key identifier (`AKIA...`)
    pub access_key_id: String,

    /// Status at scan time
    pub status: KeyStatus,

    /// When the key was created
    pub created_at: DateTime<Utc>,

    /// When the key last authenticated a request, if ever
    pub last_used_at: Option<DateTime<Utc>>,
}

impl KeyMetadata {
    /// Create a snapshot with no last-used information
    pub fn new(
        user_name: impl Into<String>,
        access_key_id: impl Into<String>,
        status: KeyStatus,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            user_name: user_name.into(),
            access_key_id: access_key_id.into(),
            status,
            created_at,
            last_used_at: None,
        }
    }

    /// Attach a last-used timestamp
    #[must_use]
    pub fn with_last_used(mut self, last_used_at: Option<DateTime<Utc>>) -> Self {
        self.last_used_at = last_used_at;
        self
    }

    /// Whole days elapsed since creation, floored. Negative for keys created
    /// in the future (clock skew between scanner and evaluator).
    pub fn age_days(&self, now: DateTime<Utc>) -> i64 {
        (now - self.created_at).num_days()
    }

    /// Whether the key is currently active
    pub fn is_active(&self) -> bool {
        self.status == KeyStatus::Active
    }
}

/// Lifecycle action the executor can perform on a key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    /// Issue a replacement key and publish it to the user's secret
    Rotate,
    /// Transition the key Active → Inactive
    Deactivate,
    /// Remove the key permanently
    Delete,
}

impl Action {
    /// Upper-case label used in notifications (`ROTATE`, ...)
    pub fn label(&self) -> &'static str {
        match self {
            Self::Rotate => "ROTATE",
            Self::Deactivate => "DEACTIVATE",
            Self::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Why an action was queued
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    /// Active key reached the rotation period
    RotationPeriodExceeded,
    /// Active key outlived the installation grace after rotation
    InstallationGraceExpired,
    /// Inactive key outlived the recovery grace
    RecoveryGraceExceeded,
    /// Rotation requested for this user regardless of age
    ForcedRotation,
}

impl ReasonCode {
    /// Human-readable reason
    pub fn description(&self) -> &'static str {
        match self {
            Self::RotationPeriodExceeded => "key exceeded rotation period",
            Self::InstallationGraceExpired => "installation grace period expired",
            Self::RecoveryGraceExceeded => "key exceeded recovery grace period",
            Self::ForcedRotation => "rotation forced by request",
        }
    }
}

impl std::fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.description())
    }
}

/// One queued lifecycle action. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionSpec {
    /// What to do
    pub action: Action,
    /// Which key
    pub key: KeyMetadata,
    /// Why
    pub reason: ReasonCode,
}

impl ActionSpec {
    /// Create a new action spec
    pub fn new(action: Action, key: KeyMetadata, reason: ReasonCode) -> Self {
        Self {
            action,
            key,
            reason,
        }
    }
}

/// Ordered actions for one account evaluation, in scan order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionQueue(Vec<ActionSpec>);

impl ActionQueue {
    /// Empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an action
    pub fn push(&mut self, spec: ActionSpec) {
        self.0.push(spec);
    }

    /// Number of queued actions
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether nothing is queued
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate in scan order
    pub fn iter(&self) -> std::slice::Iter<'_, ActionSpec> {
        self.0.iter()
    }

    /// Whether a key id already has a queued action
    pub fn contains_key(&self, access_key_id: &str) -> bool {
        self.0.iter().any(|s| s.key.access_key_id == access_key_id)
    }

    /// Whether the user already has a queued action of the given kind
    pub fn has_action_for_user(&self, user_name: &str, action: Action) -> bool {
        self.0
            .iter()
            .any(|s| s.action == action && s.key.user_name == user_name)
    }

    /// Borrow the underlying slice
    pub fn as_slice(&self) -> &[ActionSpec] {
        &self.0
    }
}

impl<'a> IntoIterator for &'a ActionQueue {
    type Item = &'a ActionSpec;
    type IntoIter = std::slice::Iter<'a, ActionSpec>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl FromIterator<ActionSpec> for ActionQueue {
    fn from_iter<I: IntoIterator<Item = ActionSpec>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Forecast of an action that becomes due within the warn period.
/// Reported to the account owner, never executed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingAction {
    /// Action that will become due
    pub action: Action,
    /// Key it applies to
    pub key: KeyMetadata,
    /// Days until the threshold is reached (always >= 1)
    pub due_in_days: i64,
}

/// Freshly issued access key pair
///
/// The secret half is wrapped in [`SecretString`] so it never shows up in
/// `Debug` output or logs.
#[derive(Debug, Clone)]
pub struct NewAccessKey {
    /// Owning IAM user name
    pub user_name: String,
    /// New access key id
    pub access_key_id: String,
    /// Status of the new key (normally Active)
    pub status: KeyStatus,
    /// Secret access key
    pub secret_access_key: SecretString,
    /// Creation time reported by the provider
    pub created_at: Option<DateTime<Utc>>,
}

impl NewAccessKey {
    /// Serialize to the JSON document stored in the user's secret.
    ///
    /// Keys are PascalCase and sorted so existing consumers of rotated secrets
    /// keep parsing them.
    pub fn to_secret_json(&self) -> serde_json::Result<String> {
        #[derive(Serialize)]
        #[serde(rename_all = "PascalCase")]
        struct SecretPayload<'a> {
            access_key_id: &'a str,
            #[serde(skip_serializing_if = "Option::is_none")]
            create_date: Option<String>,
            secret_access_key: &'a str,
            status: &'a str,
            user_name: &'a str,
        }

        let payload = SecretPayload {
            access_key_id: &self.access_key_id,
            create_date: self
                .created_at
                .map(|t| t.format("%Y-%m-%d %H:%M:%S%:z").to_string()),
            secret_access_key: self.secret_access_key.expose_secret(),
            status: self.status.as_str(),
            user_name: &self.user_name,
        };

        serde_json::to_string_pretty(&payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn key(status: KeyStatus) -> KeyMetadata {
        KeyMetadata::new(
            "alice",
            "AKIAEXAMPLE",
            status,
            Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap(),
        )
    }

    #[test]
    fn age_is_floored_to_whole_days() {
        let k = key(KeyStatus::Active);
        let now = k.created_at + Duration::days(89) + Duration::hours(23);
        assert_eq!(k.age_days(now), 89);
        assert_eq!(k.age_days(k.created_at + Duration::days(90)), 90);
    }

    #[test]
    fn age_is_negative_for_future_keys() {
        let k = key(KeyStatus::Active);
        assert_eq!(k.age_days(k.created_at - Duration::days(2)), -2);
    }

    #[test]
    fn status_round_trips_wire_format() {
        assert_eq!(KeyStatus::parse("Active"), Some(KeyStatus::Active));
        assert_eq!(KeyStatus::parse("Inactive"), Some(KeyStatus::Inactive));
        assert_eq!(KeyStatus::parse("active"), None);
    }

    #[test]
    fn queue_lookup_helpers() {
        let mut queue = ActionQueue::new();
        queue.push(ActionSpec::new(
            Action::Rotate,
            key(KeyStatus::Active),
            ReasonCode::RotationPeriodExceeded,
        ));

        assert!(queue.contains_key("AKIAEXAMPLE"));
        assert!(!queue.contains_key("AKIAOTHER"));
        assert!(queue.has_action_for_user("alice", Action::Rotate));
        assert!(!queue.has_action_for_user("alice", Action::Delete));
    }

    #[test]
    fn secret_json_uses_sorted_pascal_case_keys() {
        let new_key = NewAccessKey {
            user_name: "alice".into(),
            access_key_id: "AKIANEW".into(),
            status: KeyStatus::Active,
            secret_access_key: SecretString::from("s3cr3t"),
            created_at: Some(Utc.with_ymd_and_hms(2024, 4, 1, 8, 30, 0).unwrap()),
        };

        let json = new_key.to_secret_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["AccessKeyId"], "AKIANEW");
        assert_eq!(value["SecretAccessKey"], "s3cr3t");
        assert_eq!(value["Status"], "Active");
        assert_eq!(value["UserName"], "alice");
        assert_eq!(value["CreateDate"], "2024-04-01 08:30:00+00:00");

        let order: Vec<_> = ["AccessKeyId", "CreateDate", "SecretAccessKey", "Status", "UserName"]
            .iter()
            .map(|k| json.find(k).unwrap())
            .collect();
        assert!(order.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn new_key_debug_redacts_secret() {
        let new_key = NewAccessKey {
            user_name: "alice".into(),
            access_key_id: "AKIANEW".into(),
            status: KeyStatus::Active,
            secret_access_key: SecretString::from("s3cr3t"),
            created_at: None,
        };
        assert!(!format!("{new_key:?}").contains("s3cr3t"));
    }
}
