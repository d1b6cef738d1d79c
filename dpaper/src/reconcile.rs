//! Reconciliation of a local directory against a remote folder.
//!
//! A run snapshots both sides, classifies every relative path into
//! local-only, remote-only or present-on-both, then executes the resulting
//! plan sequentially. A failure on one path is recorded and does not stop
//! the run; cancellation marks the remaining planned actions as such.

use std::collections::BTreeMap;
use std::fmt;

use camino::{Utf8Path, Utf8PathBuf};
use tokio_util::sync::CancellationToken;

use crate::transfer::{Disposition, Transfers};
use crate::walk::{self, Depth, Select, WalkedKind};
use crate::{Error, RemoteContentService, Result, SyncPolicy};

/// What a run decided to do for one relative path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Upload,
    Download,
    MakeRemoteFolder,
    MakeLocalFolder,
    /// Present on both sides as the same kind; the policy decides at
    /// execution time whether bytes move.
    Resolve,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedAction {
    pub rel_path: Utf8PathBuf,
    pub action: Action,
}

/// The classification of one snapshot pair, before anything runs.
#[derive(Debug, Default)]
pub struct ReconciliationPlan {
    pub actions: Vec<PlannedAction>,
    /// Paths that are a file on one side and a folder on the other. These
    /// are never acted on, whatever the policy.
    pub mismatches: Vec<Utf8PathBuf>,
}

/// How one planned action ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Uploaded,
    Downloaded,
    FolderCreated,
    Skipped,
    TypeMismatch,
    Failed(String),
    Cancelled,
}

#[derive(Debug, Default)]
pub struct RunSummary {
    pub results: Vec<(Utf8PathBuf, Outcome)>,
}

impl RunSummary {
    pub fn transferred(&self) -> usize {
        self.results
            .iter()
            .filter(|(_, outcome)| {
                matches!(
                    outcome,
                    Outcome::Uploaded | Outcome::Downloaded | Outcome::FolderCreated
                )
            })
            .count()
    }

    /// Kind conflicts (file on one side, folder on the other). Reported,
    /// but they do not fail the run.
    pub fn conflicts(&self) -> usize {
        self.results
            .iter()
            .filter(|(_, outcome)| matches!(outcome, Outcome::TypeMismatch))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.results
            .iter()
            .filter(|(_, outcome)| matches!(outcome, Outcome::Failed(..) | Outcome::Cancelled))
            .count()
    }

    pub fn is_clean(&self) -> bool {
        self.failed() == 0
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let transferred = self.transferred();
        let conflicts = self.conflicts();
        let failed = self.failed();
        if transferred == 0 && conflicts == 0 && failed == 0 {
            return write!(f, "nothing to do, both sides agree");
        }
        write!(f, "completed, {transferred} transfer(s)")?;
        if conflicts > 0 {
            write!(f, ", {conflicts} conflict(s)")?;
        }
        if failed > 0 {
            write!(f, ", {failed} failure(s)")?;
        }
        Ok(())
    }
}

/// Classifies two collected walks into a plan. Pure; the policy only gates
/// which `Resolve` entries will later move bytes, so all of them are kept.
pub fn classify(
    local: &BTreeMap<Utf8PathBuf, WalkedKind>,
    remote: &BTreeMap<Utf8PathBuf, WalkedKind>,
) -> ReconciliationPlan {
    let mut plan = ReconciliationPlan::default();
    for (rel_path, kind) in local {
        match remote.get(rel_path) {
            None => {
                let action = match kind {
                    WalkedKind::Folder => Action::MakeRemoteFolder,
                    WalkedKind::File { .. } => Action::Upload,
                };
                plan.actions.push(PlannedAction {
                    rel_path: rel_path.clone(),
                    action,
                });
            }
            Some(remote_kind) => {
                let local_is_folder = matches!(kind, WalkedKind::Folder);
                let remote_is_folder = matches!(remote_kind, WalkedKind::Folder);
                if local_is_folder != remote_is_folder {
                    plan.mismatches.push(rel_path.clone());
                } else if !local_is_folder {
                    plan.actions.push(PlannedAction {
                        rel_path: rel_path.clone(),
                        action: Action::Resolve,
                    });
                }
            }
        }
    }
    for (rel_path, kind) in remote {
        if local.contains_key(rel_path) {
            continue;
        }
        let action = match kind {
            WalkedKind::Folder => Action::MakeLocalFolder,
            WalkedKind::File { .. } => Action::Download,
        };
        plan.actions.push(PlannedAction {
            rel_path: rel_path.clone(),
            action,
        });
    }
    plan.actions.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
    plan
}

#[derive(Debug, Clone)]
pub struct Reconciler<S> {
    transfers: Transfers<S>,
}

impl<S> Reconciler<S>
where
    S: RemoteContentService,
{
    pub fn new(remote: S) -> Self {
        Self {
            transfers: Transfers::new(remote),
        }
    }

    pub fn transfers(&self) -> &Transfers<S> {
        &self.transfers
    }

    /// Reconciles `local_root` against `remote_root` under `policy`.
    ///
    /// Missing roots are structural and abort the run; per-path failures are
    /// recorded in the summary and the run continues.
    pub async fn run(
        &self,
        local_root: &Utf8Path,
        remote_root: &Utf8Path,
        policy: SyncPolicy,
        cancel: &CancellationToken,
    ) -> Result<RunSummary> {
        let local_md = tokio::fs::metadata(local_root)
            .await
            .map_err(|_| Error::NotFound(local_root.to_owned()))?;
        if !local_md.is_dir() {
            return Err(Error::TypeMismatch(local_root.to_owned()));
        }

        let local = walk::collect_walk(walk::walk_local(
            local_root.to_owned(),
            Depth::FullSubtree,
            Select::FilesAndFolders,
        ))
        .await?;
        let remote = walk::collect_walk(walk::walk_remote(
            self.transfers.remote().clone(),
            remote_root.to_owned(),
            Depth::FullSubtree,
            Select::FilesAndFolders,
            cancel.clone(),
        ))
        .await?;

        let plan = classify(&local, &remote);
        log::info!(
            "reconciling {local_root} with {remote_root}: {} action(s), {} mismatch(es)",
            plan.actions.len(),
            plan.mismatches.len()
        );

        let mut summary = RunSummary::default();
        for rel_path in plan.mismatches {
            log::warn!("{rel_path}: file on one side, folder on the other, leaving both");
            summary.results.push((rel_path, Outcome::TypeMismatch));
        }
        let mut cancelled = false;
        for planned in plan.actions {
            if cancelled || cancel.is_cancelled() {
                cancelled = true;
                summary.results.push((planned.rel_path, Outcome::Cancelled));
                continue;
            }
            let outcome = self
                .execute(local_root, remote_root, &planned, policy, cancel)
                .await;
            if outcome == Outcome::Cancelled {
                cancelled = true;
            }
            summary.results.push((planned.rel_path, outcome));
        }
        Ok(summary)
    }

    async fn execute(
        &self,
        local_root: &Utf8Path,
        remote_root: &Utf8Path,
        planned: &PlannedAction,
        policy: SyncPolicy,
        cancel: &CancellationToken,
    ) -> Outcome {
        let local = walk::root_relative(local_root, &planned.rel_path);
        let remote = walk::root_relative(remote_root, &planned.rel_path);
        let result = match planned.action {
            Action::Upload => self
                .transfers
                .upload_file(&local, &remote, policy, cancel)
                .await
                .map(|disposition| match disposition {
                    Disposition::Transferred => Outcome::Uploaded,
                    Disposition::Skipped => Outcome::Skipped,
                }),
            Action::Download => self
                .transfers
                .download_file(&remote, &local, policy, cancel)
                .await
                .map(|disposition| match disposition {
                    Disposition::Transferred => Outcome::Downloaded,
                    Disposition::Skipped => Outcome::Skipped,
                }),
            Action::Resolve => self
                .resolve_both(&local, &remote, policy, cancel)
                .await,
            Action::MakeRemoteFolder => self
                .transfers
                .ensure_folders(&remote, cancel)
                .await
                .map(|()| Outcome::FolderCreated),
            Action::MakeLocalFolder => tokio::fs::create_dir_all(&local)
                .await
                .map(|()| Outcome::FolderCreated)
                .map_err(Error::from),
        };
        match result {
            Ok(outcome) => outcome,
            Err(err) if err.is_cancelled() => Outcome::Cancelled,
            Err(err) => {
                log::error!("{}: {err}", planned.rel_path);
                Outcome::Failed(err.to_string())
            }
        }
    }

    async fn resolve_both(
        &self,
        local: &Utf8Path,
        remote: &Utf8Path,
        policy: SyncPolicy,
        cancel: &CancellationToken,
    ) -> Result<Outcome> {
        match policy {
            SyncPolicy::Skip => Ok(Outcome::Skipped),
            SyncPolicy::LocalWins | SyncPolicy::Newer => {
                // under `Newer` the upload side decides direction; a strictly
                // newer remote then needs the download leg as well
                let up = self
                    .transfers
                    .upload_file(local, remote, policy, cancel)
                    .await?;
                if up == Disposition::Transferred {
                    return Ok(Outcome::Uploaded);
                }
                if policy == SyncPolicy::Newer {
                    let down = self
                        .transfers
                        .download_file(remote, local, policy, cancel)
                        .await?;
                    if down == Disposition::Transferred {
                        return Ok(Outcome::Downloaded);
                    }
                }
                Ok(Outcome::Skipped)
            }
            SyncPolicy::RemoteWins => {
                let down = self
                    .transfers
                    .download_file(remote, local, policy, cancel)
                    .await?;
                Ok(match down {
                    Disposition::Transferred => Outcome::Downloaded,
                    Disposition::Skipped => Outcome::Skipped,
                })
            }
        }
    }
}
