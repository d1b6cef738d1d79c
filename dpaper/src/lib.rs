use std::{cmp, fmt, time};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod backend;
pub mod config;
pub mod device;
pub mod matcher;
pub mod pairs;
pub mod reconcile;
pub mod transfer;
pub mod tree;
pub mod walk;

mod error;
mod node;
mod service;

pub use crate::{
    error::{Error, Result},
    node::{NodeKind, RemoteNode},
    service::{find_node, RemoteContentService},
};

/// What to do with a path that exists on both sides of a sync.
///
/// Paths present on only one side are always transferred to the other side,
/// regardless of policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPolicy {
    Skip,
    LocalWins,
    RemoteWins,
    Newer,
}

impl fmt::Display for SyncPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncPolicy::Skip => f.write_str("skip"),
            SyncPolicy::LocalWins => f.write_str("local_wins"),
            SyncPolicy::RemoteWins => f.write_str("remote_wins"),
            SyncPolicy::Newer => f.write_str("newer"),
        }
    }
}

impl std::str::FromStr for SyncPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "skip" => Ok(SyncPolicy::Skip),
            "local_wins" => Ok(SyncPolicy::LocalWins),
            "remote_wins" => Ok(SyncPolicy::RemoteWins),
            "newer" => Ok(SyncPolicy::Newer),
            _ => Err(Error::Config(format!(
                "Unknown sync policy '{s}' (expected one of: skip, local_wins, remote_wins, newer)"
            ))),
        }
    }
}

/// Device clocks and FAT-style filesystems round modification times, so two
/// copies of the same file rarely agree to the nanosecond.
pub const MTIME_TOL: time::Duration = time::Duration::from_secs(1);

pub fn compare_mtime(lhs: DateTime<Utc>, rhs: DateTime<Utc>) -> cmp::Ordering {
    if lhs + MTIME_TOL < rhs {
        cmp::Ordering::Less
    } else if lhs - MTIME_TOL > rhs {
        cmp::Ordering::Greater
    } else {
        cmp::Ordering::Equal
    }
}
