// Package model for conda-style environments
//
// Records as stored in channel indexes and environment metadata, host
// virtual packages, and the per-resolution record conversion cache.

mod cache;
mod record;
mod virtual_package;

pub use cache::{RecordCache, RecordKey};
pub use record::{InstalledRecord, NoArchType, PackageRecord};
pub use virtual_package::VirtualPackage;
