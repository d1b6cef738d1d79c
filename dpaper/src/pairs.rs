//! Configured local/remote directory pairs and the coordinator that runs
//! them back to back.

use std::fmt;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::reconcile::{Reconciler, RunSummary};
use crate::{RemoteContentService, Result, SyncPolicy};

/// One configured pairing of a local directory with a remote folder.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SyncPair {
    pub name: String,
    pub local_root: Utf8PathBuf,
    pub remote_root: Utf8PathBuf,
    pub policy: SyncPolicy,
}

/// How one pair of a multi-pair run ended.
#[derive(Debug)]
pub enum PairOutcome {
    Completed(RunSummary),
    /// The pair could not start (missing root, unreachable remote). The
    /// run moves on to the next pair.
    Aborted(String),
    Cancelled,
}

#[derive(Debug, Default)]
pub struct PairsSummary {
    pub outcomes: Vec<(String, PairOutcome)>,
}

impl PairsSummary {
    pub fn is_clean(&self) -> bool {
        self.outcomes.iter().all(|(_, outcome)| match outcome {
            PairOutcome::Completed(summary) => summary.is_clean(),
            PairOutcome::Aborted(..) | PairOutcome::Cancelled => false,
        })
    }
}

impl fmt::Display for PairsSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, outcome) in &self.outcomes {
            match outcome {
                PairOutcome::Completed(summary) => writeln!(f, "{name}: {summary}")?,
                PairOutcome::Aborted(reason) => writeln!(f, "{name}: aborted, {reason}")?,
                PairOutcome::Cancelled => writeln!(f, "{name}: cancelled")?,
            }
        }
        Ok(())
    }
}

/// Runs the configured pairs in order. A pair aborting does not stop the
/// following pairs; cancellation does.
pub async fn sync_all<S>(
    remote: S,
    pairs: &[SyncPair],
    policy_override: Option<SyncPolicy>,
    cancel: &CancellationToken,
) -> Result<PairsSummary>
where
    S: RemoteContentService,
{
    let reconciler = Reconciler::new(remote);
    let mut summary = PairsSummary::default();
    for pair in pairs {
        if cancel.is_cancelled() {
            summary
                .outcomes
                .push((pair.name.clone(), PairOutcome::Cancelled));
            continue;
        }
        let policy = policy_override.unwrap_or(pair.policy);
        log::info!(
            "syncing pair '{}': {} <-> {} ({policy})",
            pair.name,
            pair.local_root,
            pair.remote_root
        );
        let outcome = match reconciler
            .run(&pair.local_root, &pair.remote_root, policy, cancel)
            .await
        {
            Ok(run) => PairOutcome::Completed(run),
            Err(err) if err.is_cancelled() => PairOutcome::Cancelled,
            Err(err) => {
                log::error!("pair '{}' aborted: {err}", pair.name);
                PairOutcome::Aborted(err.to_string())
            }
        };
        summary.outcomes.push((pair.name.clone(), outcome));
    }
    Ok(summary)
}
