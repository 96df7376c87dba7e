//! Logger errors

use thiserror::Error;

/// Logger setup failure
#[derive(Debug, Error)]
pub enum LogError {
    /// Filter directives could not be parsed
    #[error("invalid filter '{filter}': {reason}")]
    Filter {
        /// Directives as given
        filter: String,
        /// Parser message
        reason: String,
    },

    /// A global subscriber was already installed
    #[error("failed to install subscriber: {0}")]
    Init(String),
}

/// Result alias for logger operations
pub type LogResult<T> = Result<T, LogError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_error_names_directives() {
        let err = LogError::Filter {
            filter: "keycycle=loud".into(),
            reason: "invalid level".into(),
        };
        assert_eq!(err.to_string(), "invalid filter 'keycycle=loud': invalid level");
    }
}
