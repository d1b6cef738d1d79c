#![cfg(test)]

use std::sync::Once;

use dataset::Dataset;
use dpaper::reconcile::Reconciler;

mod dataset;
mod harness;
mod stubs {
    pub mod memory;
}
mod tests;
mod utils;

use harness::Harness;
use stubs::memory;

static LOG_INIT: Once = Once::new();

async fn harness(dataset: Dataset) -> Harness {
    LOG_INIT.call_once(env_logger::init);

    let local_root = utils::temp_path(Some("dpaper-local"));
    tokio::fs::create_dir(&local_root).await.unwrap();
    dataset.create_local(&local_root).await;

    let remote = memory::Stub::new();
    dataset.create_remote(&remote);

    let reconciler = Reconciler::new(remote.clone());

    Harness {
        remote,
        local_root,
        reconciler,
    }
}
