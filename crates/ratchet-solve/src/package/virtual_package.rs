use std::env::consts;
use std::fmt;
use std::fs;

use ratchet_spec::Version;
use serde::{Deserialize, Serialize};

/// A synthetic package describing a host capability (`__linux`, `__archspec`, ...)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualPackage {
    pub name: String,
    pub version: Version,
    pub build: String,
}

impl VirtualPackage {
    pub fn new(name: impl Into<String>, version: Version, build: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version,
            build: build.into(),
        }
    }

    /// Detect the virtual packages of the running host
    pub fn detect_host() -> Vec<VirtualPackage> {
        let mut packages = Vec::new();

        if cfg!(unix) {
            packages.extend(virtual_package("__unix", "0", "0"));
        }
        if cfg!(windows) {
            packages.extend(virtual_package("__win", "0", "0"));
        }

        match consts::OS {
            "linux" => {
                let release = linux_release().unwrap_or_else(|| "0".to_string());
                packages.extend(virtual_package("__linux", &release, "0"));
            }
            "macos" => packages.extend(virtual_package("__osx", "0", "0")),
            _ => {}
        }

        packages.extend(virtual_package("__archspec", "1", consts::ARCH));
        log::debug!(
            "Detected virtual packages: {}",
            packages.iter().map(|p| p.to_string()).collect::<Vec<_>>().join(", ")
        );
        packages
    }
}

fn virtual_package(name: &str, version: &str, build: &str) -> Option<VirtualPackage> {
    Version::parse(version)
        .ok()
        .map(|version| VirtualPackage::new(name, version, build))
}

/// Leading `X.Y.Z` of the running kernel release
fn linux_release() -> Option<String> {
    let raw = fs::read_to_string("/proc/sys/kernel/osrelease").ok()?;
    let release: String = raw
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    let release = release.trim_end_matches('.');
    (!release.is_empty()).then(|| release.to_string())
}

impl fmt::Display for VirtualPackage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}={}", self.name, self.version, self.build)
    }
}
