//! Per-domain validation
//!
//! Each configuration domain implements [`Validatable`]; the provided
//! `require_*` checks tag their errors with the domain name.

use std::fmt::Display;
use std::path::Path;
use std::time::Duration;

use crate::error::{ConfigError, ConfigResult};

pub trait Validatable {
    fn validate(&self) -> ConfigResult<()>;

    /// Name used in error messages, e.g. `runner`
    fn domain_name(&self) -> &'static str;

    fn invalid(&self, message: impl Into<String>) -> ConfigError {
        ConfigError::Invalid {
            domain: self.domain_name(),
            message: message.into(),
        }
    }

    fn require_text(&self, value: &str, field: &str) -> ConfigResult<()> {
        if value.trim().is_empty() {
            return Err(self.invalid(format!("{field} cannot be empty")));
        }
        Ok(())
    }

    fn require_path(&self, path: &Path, field: &str) -> ConfigResult<()> {
        if path.as_os_str().is_empty() {
            return Err(self.invalid(format!("{field} cannot be empty")));
        }
        Ok(())
    }

    fn require_positive<T>(&self, value: T, field: &str) -> ConfigResult<()>
    where
        T: PartialOrd + Default + Display,
    {
        if value <= T::default() {
            return Err(self.invalid(format!("{field} must be greater than 0, got {value}")));
        }
        Ok(())
    }

    fn require_nonzero(&self, duration: Duration, field: &str) -> ConfigResult<()> {
        if duration.is_zero() {
            return Err(self.invalid(format!("{field} must be longer than zero")));
        }
        Ok(())
    }

    fn require_port(&self, port: u16, field: &str) -> ConfigResult<()> {
        if port == 0 {
            return Err(self.invalid(format!("{field} cannot be 0")));
        }
        if port < 1024 {
            log::warn!("{} {} is a privileged port", field, port);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixture;

    impl Validatable for Fixture {
        fn validate(&self) -> ConfigResult<()> {
            Ok(())
        }

        fn domain_name(&self) -> &'static str {
            "fixture"
        }
    }

    #[test]
    fn test_errors_carry_the_domain() {
        let err = Fixture.require_text("  ", "binary").unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid fixture configuration: binary cannot be empty"
        );
        assert!(matches!(err, ConfigError::Invalid { domain: "fixture", .. }));
    }

    #[test]
    fn test_numeric_checks() {
        assert!(Fixture.require_positive(1u64, "x").is_ok());
        assert!(Fixture.require_positive(0usize, "x").is_err());
        assert!(Fixture.require_port(8000, "port").is_ok());
        assert!(Fixture.require_port(0, "port").is_err());
        assert!(Fixture.require_nonzero(Duration::ZERO, "grace").is_err());
        assert!(Fixture.require_path(Path::new(""), "dir").is_err());
    }
}
