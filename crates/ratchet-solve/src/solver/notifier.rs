use std::fmt;

use ratchet_spec::{MatchSpec, Version, VersionSpec};
use url::Url;

use crate::package::PackageRecord;
use crate::repository::{Channel, Index};
use crate::state::EnvironmentState;

/// A newer build of the package manager itself is available
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutdatedNotice {
    pub package: String,
    pub installed: Version,
    pub latest: Version,
}

impl fmt::Display for OutdatedNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "A newer version of {} exists (installed {}, latest {}). Update it with: update {}",
            self.package, self.installed, self.latest, self.package
        )
    }
}

/// Looks for newer versions of one package after a successful solve
#[derive(Debug, Clone)]
pub struct OutdatedNotifier {
    package: String,
    channel_alias: Url,
}

impl OutdatedNotifier {
    /// `channel_alias` resolves bare channel names stored on records
    pub fn new(package: impl Into<String>, channel_alias: Url) -> Self {
        Self {
            package: package.into().to_lowercase(),
            channel_alias,
        }
    }

    fn same_channel(&self, wanted: &str, actual: &str) -> bool {
        match (
            Channel::parse(wanted, &self.channel_alias),
            Channel::parse(actual, &self.channel_alias),
        ) {
            (Ok(wanted), Ok(actual)) => wanted.url() == actual.url(),
            _ => wanted == actual,
        }
    }

    /// Compare the installed package with the index.
    ///
    /// Only the channel the package was installed from is considered, and
    /// nothing is reported when the solution already updates it.
    pub async fn check(
        &self,
        index: &dyn Index,
        solution: &[PackageRecord],
        env: &EnvironmentState,
    ) -> Option<OutdatedNotice> {
        let installed = env.installed.get(&self.package)?;
        let installed_version = &installed.record.version;

        if solution
            .iter()
            .any(|record| record.name == self.package && record.version > *installed_version)
        {
            return None;
        }

        let newer = VersionSpec::parse(&format!(">{}", installed_version)).ok()?;
        let spec = MatchSpec::name_only(&self.package).ok()?.with_version(newer);
        let latest = index
            .search(&spec)
            .await
            .into_iter()
            .filter(|candidate| match (&installed.record.channel, &candidate.channel) {
                (Some(wanted), Some(actual)) => self.same_channel(wanted, actual),
                _ => true,
            })
            .map(|candidate| candidate.version)
            .max()?;

        let notice = OutdatedNotice {
            package: self.package.clone(),
            installed: installed_version.clone(),
            latest,
        };
        log::warn!("{}", notice);
        Some(notice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{Channel, InMemoryIndex};
    use url::Url;

    fn record(name: &str, version: &str) -> PackageRecord {
        PackageRecord::new(name, Version::parse(version).unwrap(), "0")
    }

    fn alias() -> Url {
        Url::parse("https://conda.anaconda.org/").unwrap()
    }

    fn index() -> InMemoryIndex {
        let alias = alias();
        let mut index = InMemoryIndex::new();
        index.add_repo(
            Channel::parse("conda-forge", &alias).unwrap(),
            "noarch",
            vec![record("ratchet", "1.0"), record("ratchet", "1.2"), record("ratchet", "1.1")],
        );
        index
    }

    fn env_with(version: &str) -> EnvironmentState {
        EnvironmentState::builder()
            .installed(record("ratchet", version))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_reports_latest() {
        let notifier = OutdatedNotifier::new("ratchet", alias());
        let notice = notifier.check(&index(), &[], &env_with("1.0")).await.unwrap();
        assert_eq!(notice.latest.as_str(), "1.2");
        assert_eq!(notice.installed.as_str(), "1.0");
        assert!(notice.to_string().contains("latest 1.2"));
    }

    #[tokio::test]
    async fn test_silent_when_current_or_updating() {
        let notifier = OutdatedNotifier::new("ratchet", alias());
        assert!(notifier.check(&index(), &[], &env_with("1.2")).await.is_none());
        assert!(notifier
            .check(&index(), &[record("ratchet", "1.2")], &env_with("1.0"))
            .await
            .is_none());
        assert!(notifier
            .check(&index(), &[], &EnvironmentState::default())
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_other_channels_ignored() {
        let mut env = env_with("1.0");
        if let Some(installed) = env.installed.get_mut("ratchet") {
            installed.record.channel = Some("https://repo.example.com/internal".to_string());
        }
        let notifier = OutdatedNotifier::new("ratchet", alias());
        assert!(notifier.check(&index(), &[], &env).await.is_none());
    }

    #[tokio::test]
    async fn test_bare_channel_name_resolved_through_alias() {
        let mut env = env_with("1.0");
        if let Some(installed) = env.installed.get_mut("ratchet") {
            installed.record.channel = Some("conda-forge".to_string());
        }
        let notifier = OutdatedNotifier::new("ratchet", alias());
        let notice = notifier.check(&index(), &[], &env).await.unwrap();
        assert_eq!(notice.latest.as_str(), "1.2");

        let mirror = Url::parse("https://mirror.example.com/conda/").unwrap();
        let notifier = OutdatedNotifier::new("ratchet", mirror);
        assert!(notifier.check(&index(), &[], &env).await.is_none());
    }
}
