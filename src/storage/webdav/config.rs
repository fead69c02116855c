use url::Url;

use crate::errors::{Result, StorageError};

/// Connection settings for one WebDAV endpoint.
#[derive(Debug, Clone, Default)]
pub struct WebDAVConfig {
    /// Base URL every remote path is joined onto.
    pub entry: String,
    pub username: String,
    pub password: String,
    /// Exact-match local paths upload skips.
    pub ignores: Vec<String>,
}

impl WebDAVConfig {
    /// Configuration with just an entry URL; credentials arrive later via
    /// `auth`.
    pub fn new(entry: impl Into<String>) -> Self {
        Self {
            entry: entry.into(),
            ..Default::default()
        }
    }

    pub fn with_credentials(
        entry: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            entry: entry.into(),
            username: username.into(),
            password: password.into(),
            ignores: Vec::new(),
        }
    }

    /// Rejects configurations no request could ever succeed against.
    /// Credentials are not validated here; data operations gate on them
    /// separately.
    pub fn validate(&self) -> Result<()> {
        if self.entry.is_empty() {
            return Err(StorageError::InvalidConfig(
                "entry url cannot be empty".to_string(),
            ));
        }

        let parsed = Url::parse(&self.entry)
            .map_err(|err| StorageError::InvalidConfig(format!("entry url: {}", err)))?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(StorageError::InvalidConfig(
                "entry url must use http or https".to_string(),
            ));
        }

        Ok(())
    }
}
