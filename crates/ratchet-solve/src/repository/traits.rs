use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use ratchet_spec::MatchSpec;
use url::Url;

use crate::error::{Result, SolveError};
use crate::package::PackageRecord;

/// A package channel, identified by its base URL
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Channel {
    name: String,
    url: Url,
}

impl Channel {
    /// Resolve a channel name or URL.
    ///
    /// Bare names such as `conda-forge` are joined onto `alias`; anything with a
    /// scheme is taken as a full URL and named after its path.
    pub fn parse(name_or_url: &str, alias: &Url) -> Result<Self> {
        let trimmed = name_or_url.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            return Err(SolveError::Config("Empty channel name".to_string()));
        }

        let url = if trimmed.contains("://") {
            Url::parse(&format!("{}/", trimmed))
        } else {
            alias.join(&format!("{}/", trimmed))
        }
        .map_err(|e| SolveError::Config(format!("Invalid channel \"{}\": {}", name_or_url, e)))?;

        let name = if trimmed.contains("://") {
            url.path().trim_matches('/').to_string()
        } else {
            trimmed.to_string()
        };

        Ok(Self { name, url })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// URL of one platform subdirectory, e.g. `.../conda-forge/linux-64/`
    pub fn platform_url(&self, subdir: &str) -> Result<Url> {
        self.url
            .join(&format!("{}/", subdir))
            .map_err(|e| SolveError::Config(format!("Invalid subdir \"{}\": {}", subdir, e)))
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// A loaded channel subdirectory handed to the solver engine
#[derive(Debug, Clone)]
pub struct RepoHandle {
    pub channel: Channel,
    pub subdir: String,
    pub records: Arc<Vec<PackageRecord>>,
}

impl RepoHandle {
    pub fn new(channel: Channel, subdir: impl Into<String>, records: Vec<PackageRecord>) -> Self {
        Self {
            channel,
            subdir: subdir.into(),
            records: Arc::new(records),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Queryable package metadata for a set of channels
#[async_trait]
pub trait Index: Send + Sync {
    /// Channels this index was loaded from, in priority order
    fn channels(&self) -> &[Channel];

    /// Every loaded repository
    fn repos(&self) -> Vec<RepoHandle>;

    /// Records matching `spec`, newest first
    async fn search(&self, spec: &MatchSpec) -> Vec<PackageRecord>;
}
