//! Validation rules for check options

use crate::config::CheckOptions;
use crate::{ConfigError, ConfigResult};

/// Validates a set of check options
///
/// # Rules
///
/// - `filter-level` must be 0-3
/// - `max-sockets` and `max-sockets-per-host` must be at least 1
/// - `accepted-schemes` must be non-empty and lowercase
/// - `timeout-secs` must be nonzero
pub fn validate(options: &CheckOptions) -> ConfigResult<()> {
    if options.filter_level > 3 {
        return Err(ConfigError::Validation(format!(
            "filter-level must be 0-3, got {}",
            options.filter_level
        )));
    }

    if options.max_sockets == 0 {
        return Err(ConfigError::Validation(
            "max-sockets must be at least 1".to_string(),
        ));
    }

    if options.max_sockets_per_host == 0 {
        return Err(ConfigError::Validation(
            "max-sockets-per-host must be at least 1".to_string(),
        ));
    }

    if options.accepted_schemes.is_empty() {
        return Err(ConfigError::Validation(
            "accepted-schemes must not be empty".to_string(),
        ));
    }

    for scheme in options
        .accepted_schemes
        .iter()
        .chain(options.excluded_schemes.iter())
    {
        if scheme.chars().any(|c| c.is_ascii_uppercase()) {
            return Err(ConfigError::Validation(format!(
                "schemes must be lowercase: {}",
                scheme
            )));
        }
    }

    if options.timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "timeout-secs must be nonzero".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(validate(&CheckOptions::default()).is_ok());
    }

    #[test]
    fn test_filter_level_out_of_range() {
        let options = CheckOptions {
            filter_level: 4,
            ..CheckOptions::default()
        };
        assert!(matches!(
            validate(&options),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_zero_sockets_rejected() {
        let options = CheckOptions {
            max_sockets: 0,
            ..CheckOptions::default()
        };
        assert!(validate(&options).is_err());
    }

    #[test]
    fn test_uppercase_scheme_rejected() {
        let options = CheckOptions {
            accepted_schemes: vec!["HTTPS".into()],
            ..CheckOptions::default()
        };
        assert!(validate(&options).is_err());
    }
}
