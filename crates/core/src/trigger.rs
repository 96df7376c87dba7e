//! Inbound trigger records
//!
//! A trigger names one account to evaluate. Records arrive as JSON, either a
//! single object or an array of them:
//!
//! ```json
//! {"account": "111122223333", "name": "sandbox", "email": "owner@example.com",
//!  "dryrun": "true", "forceRotateUsers": ["alice"]}
//! ```
//!
//! Records missing a required field are rejected outright.

use std::collections::HashSet;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

const REQUIRED_FIELDS: [&str; 3] = ["account", "name", "email"];

/// Trigger parsing failure
#[derive(Debug, Error)]
pub enum TriggerError {
    /// Required fields are absent, null or empty
    #[error("malformed trigger record: missing {}", missing.join(", "))]
    Malformed {
        /// Every missing field, in declaration order
        missing: Vec<&'static str>,
    },

    /// The record is not a JSON object
    #[error("malformed trigger record: expected an object, got {found}")]
    NotAnObject {
        /// JSON type that was found
        found: &'static str,
    },

    /// A field has the wrong type
    #[error("invalid trigger record: {0}")]
    Invalid(#[source] serde_json::Error),

    /// Input is not JSON at all
    #[error("trigger input is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// One account evaluation request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerEvent {
    /// Account id
    pub account: String,
    /// Account name, used in notifications
    pub name: String,
    /// Notification recipient
    pub email: String,
    /// Per-record dry-run request; `"true"` in any case, or `true`
    #[serde(default, deserialize_with = "deserialize_optional_flag")]
    pub dryrun: Option<bool>,
    /// Users whose keys rotate regardless of age
    #[serde(default)]
    pub force_rotate_users: Vec<String>,
}

impl TriggerEvent {
    /// Validate and parse one record
    pub fn from_value(value: Value) -> Result<Self, TriggerError> {
        let Value::Object(map) = &value else {
            return Err(TriggerError::NotAnObject {
                found: json_type(&value),
            });
        };

        let missing: Vec<&'static str> = REQUIRED_FIELDS
            .into_iter()
            .filter(|field| match map.get(*field) {
                None | Some(Value::Null) => true,
                Some(Value::String(s)) => s.trim().is_empty(),
                Some(_) => false,
            })
            .collect();
        if !missing.is_empty() {
            return Err(TriggerError::Malformed { missing });
        }

        serde_json::from_value(value).map_err(TriggerError::Invalid)
    }

    /// Record-level dry run OR the configured default
    pub fn effective_dry_run(&self, configured: bool) -> bool {
        self.dryrun.unwrap_or(false) || configured
    }

    /// Forced users as a set
    pub fn forced_users(&self) -> HashSet<String> {
        self.force_rotate_users.iter().cloned().collect()
    }
}

/// Parse a JSON document holding one record or an array of records.
///
/// The first malformed record fails the whole batch.
pub fn parse_events(input: &str) -> Result<Vec<TriggerEvent>, TriggerError> {
    match serde_json::from_str::<Value>(input)? {
        Value::Array(items) => items.into_iter().map(TriggerEvent::from_value).collect(),
        single => Ok(vec![TriggerEvent::from_value(single)?]),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Flag {
    Bool(bool),
    Text(String),
}

impl Flag {
    fn is_set(&self) -> bool {
        match self {
            Self::Bool(b) => *b,
            Self::Text(s) => s.trim().eq_ignore_ascii_case("true"),
        }
    }
}

/// Accept `true`/`false` or any string; only a case-insensitive `"true"`
/// sets the flag.
pub(crate) fn deserialize_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Flag::deserialize(deserializer).map(|flag| flag.is_set())
}

fn deserialize_optional_flag<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<Flag>::deserialize(deserializer).map(|flag| flag.map(|f| f.is_set()))
}
