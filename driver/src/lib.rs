use error_stack::Report;
use kernel::KernelError;

pub mod config;
pub mod database;
pub mod error;
pub mod lookup;
pub mod relay;

use crate::error::ConvertError;

pub(crate) fn env(key: &str) -> error_stack::Result<String, KernelError> {
    dotenvy::var(key)
        .convert_error()
        .map_err(|report| report.attach_printable(format!("Missing environment variable: {key}")))
}

/// Reads an optional variable, falling back to `default` when it is unset.
pub(crate) fn env_or<T>(key: &str, default: T) -> error_stack::Result<T, KernelError>
where
    T: std::str::FromStr + 'static,
    T::Err: std::fmt::Display,
{
    match dotenvy::var(key) {
        Ok(raw) => raw.trim().parse::<T>().map_err(|error| {
            Report::new(KernelError::InvalidArgument)
                .attach_printable(format!("Invalid value for {key}: {raw} ({error})"))
        }),
        Err(dotenvy::Error::EnvVar(std::env::VarError::NotPresent)) => Ok(default),
        Err(error) => Err(error).convert_error(),
    }
}
