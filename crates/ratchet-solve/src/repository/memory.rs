use async_trait::async_trait;
use ratchet_spec::MatchSpec;

use super::traits::{Channel, Index, RepoHandle};
use crate::package::PackageRecord;

/// An index held entirely in memory
#[derive(Debug, Clone, Default)]
pub struct InMemoryIndex {
    channels: Vec<Channel>,
    repos: Vec<RepoHandle>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the records of one channel subdirectory.
    ///
    /// Records without a channel are attributed to `channel`.
    pub fn add_repo(&mut self, channel: Channel, subdir: &str, records: Vec<PackageRecord>) -> &mut Self {
        let records = records
            .into_iter()
            .map(|mut record| {
                if record.channel.is_none() {
                    record.channel = Some(channel.url().as_str().trim_end_matches('/').to_string());
                }
                if record.subdir.is_none() {
                    record.subdir = Some(subdir.to_string());
                }
                record
            })
            .collect();

        if !self.channels.contains(&channel) {
            self.channels.push(channel.clone());
        }
        self.repos.push(RepoHandle::new(channel, subdir, records));
        self
    }

    pub fn len(&self) -> usize {
        self.repos.iter().map(RepoHandle::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl Index for InMemoryIndex {
    fn channels(&self) -> &[Channel] {
        &self.channels
    }

    fn repos(&self) -> Vec<RepoHandle> {
        self.repos.clone()
    }

    async fn search(&self, spec: &MatchSpec) -> Vec<PackageRecord> {
        let mut found: Vec<PackageRecord> = self
            .repos
            .iter()
            .flat_map(|repo| repo.records.iter())
            .filter(|record| spec.matches(*record))
            .cloned()
            .collect();

        found.sort_by(|a, b| {
            b.version
                .cmp(&a.version)
                .then_with(|| b.build_number.cmp(&a.build_number))
                .then_with(|| b.timestamp.cmp(&a.timestamp))
        });
        found
    }
}
