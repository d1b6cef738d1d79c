#![allow(dead_code)]

use camino::{Utf8Path, Utf8PathBuf};
use dpaper::reconcile::{Reconciler, RunSummary};
use dpaper::transfer::Transfers;
use dpaper::{Result, SyncPolicy};
use tokio_util::sync::CancellationToken;

use crate::stubs::memory::Stub;

pub struct Harness {
    pub remote: Stub,
    pub local_root: Utf8PathBuf,
    pub reconciler: Reconciler<Stub>,
}

impl Harness {
    pub fn transfers(&self) -> &Transfers<Stub> {
        self.reconciler.transfers()
    }

    pub async fn sync(&self, policy: SyncPolicy) -> RunSummary {
        self.sync_with(policy, &CancellationToken::new())
            .await
            .expect("run should not abort")
    }

    pub async fn sync_with(
        &self,
        policy: SyncPolicy,
        cancel: &CancellationToken,
    ) -> Result<RunSummary> {
        self.reconciler
            .run(&self.local_root, Utf8Path::new(""), policy, cancel)
            .await
    }

    pub fn local_path(&self, rel: &str) -> Utf8PathBuf {
        self.local_root.join(rel)
    }

    pub async fn local_content(&self, rel: &str) -> Option<String> {
        tokio::fs::read_to_string(self.local_path(rel)).await.ok()
    }

    pub fn has_local_file(&self, rel: &str) -> bool {
        self.local_path(rel).is_file()
    }

    pub fn has_local_dir(&self, rel: &str) -> bool {
        self.local_path(rel).is_dir()
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        std::fs::remove_dir_all(&self.local_root).ok();
    }
}
