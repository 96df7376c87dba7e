//! Configuration presets

use super::{Config, DisplayConfig, Fields, Format};

impl Config {
    /// Configuration from `KEYCYCLE_LOG` (else `RUST_LOG`) and
    /// `KEYCYCLE_LOG_FORMAT`
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`Config::from_env`] over an arbitrary variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(level) = lookup("KEYCYCLE_LOG").or_else(|| lookup("RUST_LOG")) {
            config.level = level;
        }

        if let Some(format) = lookup("KEYCYCLE_LOG_FORMAT") {
            config.format = Format::parse(&format);
            if config.format == Format::Json {
                config.display.colors = false;
            }
        }

        if lookup("NO_COLOR").is_some() {
            config.display.colors = false;
        }

        config.fields = Fields::from_lookup(lookup);
        config
    }

    /// Pretty output at debug level with source locations
    #[must_use]
    pub fn development() -> Self {
        Self {
            level: "debug".to_string(),
            format: Format::Pretty,
            display: DisplayConfig {
                colors: true,
                source: true,
                ..DisplayConfig::default()
            },
            ..Self::default()
        }
    }

    /// Flattened JSON at info level, no colors
    #[must_use]
    pub fn production() -> Self {
        Self {
            level: "info".to_string(),
            format: Format::Json,
            display: DisplayConfig {
                colors: false,
                source: false,
                flatten: true,
                ..DisplayConfig::default()
            },
            ..Self::default()
        }
    }

    /// Attach global fields
    #[must_use]
    pub fn with_fields(mut self, fields: Fields) -> Self {
        self.fields = fields;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn defaults_without_variables() {
        let config = Config::from_lookup(lookup(&[]));
        assert_eq!(config.level, "info");
        assert_eq!(config.format, Format::Compact);
        assert!(config.display.colors);
    }

    #[test]
    fn keycycle_log_wins_over_rust_log() {
        let config = Config::from_lookup(lookup(&[
            ("KEYCYCLE_LOG", "keycycle_core=trace"),
            ("RUST_LOG", "warn"),
        ]));
        assert_eq!(config.level, "keycycle_core=trace");

        let config = Config::from_lookup(lookup(&[("RUST_LOG", "warn")]));
        assert_eq!(config.level, "warn");
    }

    #[rstest]
    #[case("json", Format::Json)]
    #[case("PRETTY", Format::Pretty)]
    #[case("compact", Format::Compact)]
    #[case("logfmt", Format::Compact)]
    fn format_from_env(#[case] value: &str, #[case] expected: Format) {
        let config = Config::from_lookup(lookup(&[("KEYCYCLE_LOG_FORMAT", value)]));
        assert_eq!(config.format, expected);
    }

    #[test]
    fn json_and_no_color_disable_colors() {
        assert!(!Config::from_lookup(lookup(&[("KEYCYCLE_LOG_FORMAT", "json")])).display.colors);
        assert!(!Config::from_lookup(lookup(&[("NO_COLOR", "1")])).display.colors);
    }

    #[test]
    fn region_falls_back_to_aws_region() {
        let fields = Fields::from_lookup(lookup(&[("AWS_REGION", "us-gov-west-1")]));
        assert_eq!(fields.region.as_deref(), Some("us-gov-west-1"));
        assert!(fields.version.is_some());
    }

    #[test]
    fn presets() {
        let prod = Config::production();
        assert_eq!(prod.format, Format::Json);
        assert!(prod.display.flatten);
        assert!(!prod.display.colors);

        let dev = Config::development();
        assert_eq!(dev.level, "debug");
        assert!(dev.display.source);
    }
}
