use std::fmt;

use crate::config::CredentialsConfig;
use crate::prelude::*;

/// Wrapper keeping the root password out of logs and debug output.
///
/// Both `Debug` and `Display` print `[REDACTED]`; the value is only
/// reachable through [`Secret::expose_secret`].
pub struct Secret {
    inner: String,
}

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            inner: value.into(),
        }
    }

    pub fn expose_secret(&self) -> &str {
        &self.inner
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

/// Root credentials taken from the deployment environment
#[derive(Debug)]
pub struct Credentials {
    pub username: String,
    pub password: Secret,
}

impl Credentials {
    /// Resolves both variables named in `config` through `lookup`.
    /// Unset and empty values are both configuration errors.
    pub fn from_lookup<F>(config: &CredentialsConfig, lookup: F) -> BResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let fetch = |var: &str| -> BResult<String> {
            match lookup(var) {
                Some(value) if !value.is_empty() => Ok(value),
                Some(_) => Err(BootstrapError::configuration(format!(
                    "environment variable {var} is empty"
                ))),
                None => Err(BootstrapError::configuration(format!(
                    "environment variable {var} is not set"
                ))),
            }
        };
        Ok(Credentials {
            username: fetch(&config.username_var)?,
            password: Secret::new(fetch(&config.password_var)?),
        })
    }
}
