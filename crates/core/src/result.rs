//! Result type definition and extension traits.
//!
//! Provides combinators for Result types so call sites can log-and-skip
//! recoverable failures without unwrap/expect/panic.

use crate::error::Error;

/// The standard Result type for dispatch operations.
///
/// # Examples
///
/// ```ignore
/// fn load() -> Result<DispatchConfig> {
///     let config = DispatchConfig::from_file("dispatch.toml")?;
///     config.validate()?;
///     Ok(config)
/// }
/// ```
pub type Result<T> = std::result::Result<T, Error>;

/// Extension trait providing logging combinators for Results.
pub trait ResultExt<T> {
    /// Convert a Result to an Option, logging the error at warn level.
    fn into_option_logged(self) -> Option<T>;

    /// Inspect the error without consuming the Result.
    fn inspect_error<F: FnOnce(&Error)>(self, f: F) -> Self;
}

impl<T> ResultExt<T> for Result<T> {
    fn into_option_logged(self) -> Option<T> {
        match self {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(error = %e, recoverable = e.is_recoverable(), "Skipping after error");
                None
            }
        }
    }

    fn inspect_error<F: FnOnce(&Error)>(self, f: F) -> Self {
        if let Err(ref e) = self {
            f(e);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_option_logged_ok() {
        let result: Result<i32> = Ok(42);
        assert_eq!(result.into_option_logged(), Some(42));
    }

    #[test]
    fn test_into_option_logged_err() {
        let result: Result<i32> = Err(Error::malformed_message("no messageType"));
        assert_eq!(result.into_option_logged(), None);
    }

    #[test]
    fn test_inspect_error_sees_error() {
        let mut seen = false;
        let result: Result<()> = Err(Error::unknown_resource("agv_1"));
        let _ = result.inspect_error(|e| seen = e.is_recoverable());
        assert!(seen);
    }
}
