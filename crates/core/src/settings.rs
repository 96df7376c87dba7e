//! Runtime settings
//!
//! Loaded once at startup through `figment`: an optional TOML file, then the
//! process environment on top. Keys match the environment variable names,
//! lower-cased in the file (`rotation_period = 90`).

use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Toml};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::notify::TemplateIds;
use crate::trigger::deserialize_flag;
use crate::window::{PolicyError, PolicyWindow};

/// Environment variables read into [`Settings`]
pub const ENV_KEYS: [&str; 12] = [
    "ROTATION_PERIOD",
    "INSTALLATION_GRACE_PERIOD",
    "RECOVERY_GRACE_PERIOD",
    "PENDING_ACTION_WARN_PERIOD",
    "DRY_RUN_FLAG",
    "IAM_EXEMPTION_GROUP",
    "EMAIL_TEMPLATE_AUDIT",
    "EMAIL_TEMPLATE_ENFORCE",
    "IAM_ASSUMED_ROLE_NAME",
    "ROLE_SESSION_NAME",
    "SENDER_EMAIL",
    "TEMPLATE_DIR",
];

/// Settings loading or validation failure. Always fatal at startup.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// `--config` pointed at a file that does not exist
    #[error("config file {} does not exist", path.display())]
    MissingFile {
        /// Requested path
        path: PathBuf,
    },

    /// A source could not be read or a value has the wrong shape
    #[error("failed to load settings: {0}")]
    Load(#[source] Box<figment::Error>),

    /// A value is present but unusable
    #[error("invalid setting {key}: {reason}")]
    Invalid {
        /// Offending key
        key: &'static str,
        /// What is wrong with it
        reason: &'static str,
    },

    /// The retention periods do not form a valid window
    #[error(transparent)]
    Policy(#[from] PolicyError),
}

fn default_role_session_name() -> String {
    "keycycle".to_string()
}

fn default_template_dir() -> PathBuf {
    PathBuf::from("templates")
}

/// Process-wide settings. Immutable once loaded; passed down explicitly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Days before an active key is rotated
    pub rotation_period: u32,
    /// Days the old key stays active after rotation
    pub installation_grace_period: u32,
    /// Days an inactive key is kept before deletion
    pub recovery_grace_period: u32,
    /// Days ahead to forecast upcoming actions (0 disables)
    pub pending_action_warn_period: u32,
    /// Default dry-run mode for every record
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub dry_run_flag: bool,
    /// Members of this IAM group are never evaluated
    pub iam_exemption_group: String,
    /// Template used for dry runs
    pub email_template_audit: String,
    /// Template used when actions were applied
    pub email_template_enforce: String,
    /// Role assumed in each target account; ambient credentials when unset
    #[serde(default)]
    pub iam_assumed_role_name: Option<String>,
    /// Session name for assumed roles
    #[serde(default = "default_role_session_name")]
    pub role_session_name: String,
    /// Notification sender address
    #[serde(default)]
    pub sender_email: Option<String>,
    /// Directory holding notification templates
    #[serde(default = "default_template_dir")]
    pub template_dir: PathBuf,
}

impl Settings {
    /// Layered sources: the optional TOML file, then the environment
    pub fn figment(config_file: Option<&Path>) -> Figment {
        let mut figment = Figment::new();
        if let Some(path) = config_file {
            figment = figment.merge(Toml::file(path));
        }
        figment.merge(Env::raw().only(&ENV_KEYS))
    }

    /// Load and validate settings
    pub fn load(config_file: Option<&Path>) -> Result<Self, SettingsError> {
        if let Some(path) = config_file
            && !path.is_file()
        {
            return Err(SettingsError::MissingFile {
                path: path.to_path_buf(),
            });
        }
        Self::from_figment(&Self::figment(config_file))
    }

    /// Extract and validate settings from any figment
    pub fn from_figment(figment: &Figment) -> Result<Self, SettingsError> {
        let settings: Self = figment
            .extract()
            .map_err(|e| SettingsError::Load(Box::new(e)))?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), SettingsError> {
        let required = [
            ("IAM_EXEMPTION_GROUP", &self.iam_exemption_group),
            ("EMAIL_TEMPLATE_AUDIT", &self.email_template_audit),
            ("EMAIL_TEMPLATE_ENFORCE", &self.email_template_enforce),
            ("ROLE_SESSION_NAME", &self.role_session_name),
        ];
        for (key, value) in required {
            if value.trim().is_empty() {
                return Err(SettingsError::Invalid {
                    key,
                    reason: "must not be empty",
                });
            }
        }

        if self
            .iam_assumed_role_name
            .as_deref()
            .is_some_and(|role| role.trim().is_empty())
        {
            return Err(SettingsError::Invalid {
                key: "IAM_ASSUMED_ROLE_NAME",
                reason: "must not be empty when set",
            });
        }

        if self
            .sender_email
            .as_deref()
            .is_some_and(|sender| !sender.contains('@'))
        {
            return Err(SettingsError::Invalid {
                key: "SENDER_EMAIL",
                reason: "must be an email address",
            });
        }

        self.window()?;
        Ok(())
    }

    /// Retention thresholds
    pub fn window(&self) -> Result<PolicyWindow, PolicyError> {
        PolicyWindow::new(
            self.rotation_period,
            self.installation_grace_period,
            self.recovery_grace_period,
            self.pending_action_warn_period,
        )
    }

    /// Template ids for both run modes
    pub fn templates(&self) -> TemplateIds {
        TemplateIds {
            audit: self.email_template_audit.clone(),
            enforce: self.email_template_enforce.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    const MINIMAL: &str = r#"
        rotation_period = 90
        installation_grace_period = 7
        recovery_grace_period = 7
        pending_action_warn_period = 5
        iam_exemption_group = "key-rotation-exempt"
        email_template_audit = "audit.html"
        email_template_enforce = "enforce.html"
    "#;

    fn from_toml(toml: &str) -> Result<Settings, SettingsError> {
        Settings::from_figment(&Figment::from(Toml::string(toml)))
    }

    #[test]
    fn minimal_settings_use_defaults() {
        let settings = from_toml(MINIMAL).unwrap();

        assert!(!settings.dry_run_flag);
        assert_eq!(settings.role_session_name, "keycycle");
        assert_eq!(settings.template_dir, PathBuf::from("templates"));
        assert_eq!(settings.iam_assumed_role_name, None);
        assert_eq!(settings.window().unwrap().rotation_period(), 90);
        assert_eq!(settings.templates().for_mode(crate::audit::RunMode::Audit), "audit.html");
    }

    #[test]
    fn dry_run_flag_accepts_text() {
        let settings = from_toml(&format!("{MINIMAL}\ndry_run_flag = \"True\"")).unwrap();
        assert!(settings.dry_run_flag);
    }

    #[test]
    fn missing_required_key_fails() {
        let toml = MINIMAL.replace("iam_exemption_group = \"key-rotation-exempt\"", "");
        assert!(matches!(from_toml(&toml), Err(SettingsError::Load(_))));
    }

    #[test]
    fn empty_template_id_is_invalid() {
        let toml = MINIMAL.replace("\"audit.html\"", "\"  \"");
        match from_toml(&toml) {
            Err(SettingsError::Invalid { key, .. }) => assert_eq!(key, "EMAIL_TEMPLATE_AUDIT"),
            other => panic!("expected invalid setting, got {other:?}"),
        }
    }

    #[test]
    fn zero_rotation_period_is_rejected() {
        let toml = MINIMAL.replace("rotation_period = 90", "rotation_period = 0");
        assert!(matches!(
            from_toml(&toml),
            Err(SettingsError::Policy(PolicyError::ZeroRotationPeriod))
        ));
    }

    #[test]
    fn bad_sender_is_rejected() {
        let toml = format!("{MINIMAL}\nsender_email = \"not-an-address\"");
        assert!(matches!(
            from_toml(&toml),
            Err(SettingsError::Invalid { key: "SENDER_EMAIL", .. })
        ));
    }

    #[test]
    fn load_reads_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(MINIMAL.as_bytes()).unwrap();

        let settings = Settings::from_figment(&Figment::from(Toml::file(file.path()))).unwrap();
        assert_eq!(settings.recovery_grace_period, 7);
    }

    #[test]
    fn load_rejects_missing_config_file() {
        let err = Settings::load(Some(Path::new("/nonexistent/keycycle.toml"))).unwrap_err();
        assert!(matches!(err, SettingsError::MissingFile { .. }));
    }
}
