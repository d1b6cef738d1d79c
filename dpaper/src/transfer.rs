//! Single-path transfer primitives over the remote store and the local
//! filesystem.
//!
//! Each primitive is idempotent with respect to the remote tree state and
//! touches only the path(s) it names; the recursive delete scopes are the
//! one explicitly scoped exception.

use std::cmp::Ordering;

use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use tokio::fs;
use tokio_util::sync::CancellationToken;

use crate::{
    compare_mtime, find_node, io_bail, Error, NodeKind, RemoteContentService, RemoteNode,
    Result, SyncPolicy,
};

/// How much of a remote folder a delete request covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteScope {
    /// One document or one empty folder. A non-empty folder is refused.
    SingleEntry,
    /// The documents directly inside a folder; subfolders stay.
    FilesOnly,
    /// Everything inside a folder, recursively; the folder itself stays.
    ContentsRecursive,
    /// Everything inside, then the folder itself.
    FullRecursive,
}

/// Whether a primitive moved bytes or decided not to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Transferred,
    Skipped,
}

#[derive(Debug, Clone)]
pub struct Transfers<S> {
    remote: S,
}

impl<S> Transfers<S>
where
    S: RemoteContentService,
{
    pub fn new(remote: S) -> Self {
        Self { remote }
    }

    pub fn remote(&self) -> &S {
        &self.remote
    }

    /// Copies a local file to `remote`. Missing intermediate remote folders
    /// are created along the way; an existing destination is resolved per
    /// `policy` (overwrite is delete-then-put).
    pub async fn upload_file(
        &self,
        local: &Utf8Path,
        remote: &Utf8Path,
        policy: SyncPolicy,
        cancel: &CancellationToken,
    ) -> Result<Disposition> {
        let local_md = fs::metadata(local)
            .await
            .map_err(|_| Error::NotFound(local.to_owned()))?;
        if !local_md.is_file() {
            return Err(Error::TypeMismatch(local.to_owned()));
        }
        let local_mtime: DateTime<Utc> = local_md.modified()?.into();

        match find_node(&self.remote, remote, cancel).await? {
            Some(node) => {
                let remote_mtime = match node.kind() {
                    NodeKind::Folder => return Err(Error::TypeMismatch(remote.to_owned())),
                    NodeKind::Document { mtime, .. } => *mtime,
                };
                let overwrite = match policy {
                    SyncPolicy::Skip | SyncPolicy::RemoteWins => false,
                    SyncPolicy::LocalWins => true,
                    SyncPolicy::Newer => {
                        compare_mtime(local_mtime, remote_mtime) == Ordering::Greater
                    }
                };
                if !overwrite {
                    log::info!("{policy}: skipping upload of {remote}");
                    return Ok(Disposition::Skipped);
                }
                self.remote.delete_node(remote, cancel).await?;
            }
            None => {
                if let Some(parent) = remote.parent() {
                    self.ensure_folders(parent, cancel).await?;
                }
            }
        }

        log::info!("uploading {local} to {remote}");
        let data = fs::File::open(local).await?;
        self.remote
            .put_file(data, remote, Some(local_mtime), cancel)
            .await?;
        Ok(Disposition::Transferred)
    }

    /// Copies a remote document to `local`, creating missing local parent
    /// directories and stamping the remote modification time on the copy.
    pub async fn download_file(
        &self,
        remote: &Utf8Path,
        local: &Utf8Path,
        policy: SyncPolicy,
        cancel: &CancellationToken,
    ) -> Result<Disposition> {
        let node = find_node(&self.remote, remote, cancel)
            .await?
            .ok_or_else(|| Error::NotFound(remote.to_owned()))?;
        let remote_mtime = match node.kind() {
            NodeKind::Folder => return Err(Error::TypeMismatch(remote.to_owned())),
            NodeKind::Document { mtime, .. } => *mtime,
        };

        if let Ok(local_md) = fs::metadata(local).await {
            if local_md.is_dir() {
                return Err(Error::TypeMismatch(local.to_owned()));
            }
            let local_mtime: DateTime<Utc> = local_md.modified()?.into();
            let overwrite = match policy {
                SyncPolicy::Skip | SyncPolicy::LocalWins => false,
                SyncPolicy::RemoteWins => true,
                SyncPolicy::Newer => compare_mtime(remote_mtime, local_mtime) == Ordering::Greater,
            };
            if !overwrite {
                log::info!("{policy}: skipping download of {remote}");
                return Ok(Disposition::Skipped);
            }
        } else if let Some(parent) = local.parent() {
            fs::create_dir_all(parent).await?;
        }

        log::info!("downloading {remote} to {local}");
        {
            let mut file = fs::File::create(local).await?;
            self.remote.get_file(remote, &mut file, cancel).await?;
            let file = file.into_std().await;
            file.set_modified(remote_mtime.into())?;
        }
        Ok(Disposition::Transferred)
    }

    /// Creates one remote folder. The parent must already exist.
    pub async fn mkdir(&self, remote: &Utf8Path, cancel: &CancellationToken) -> Result<RemoteNode> {
        log::info!("mkdir {remote}");
        self.remote.create_folder(remote, cancel).await
    }

    /// Creates `folder` and any missing ancestors, tolerating entries that
    /// appear concurrently.
    pub async fn ensure_folders(
        &self,
        folder: &Utf8Path,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let mut path = Utf8PathBuf::new();
        for segment in folder.components() {
            path.push(segment);
            if find_node(&self.remote, &path, cancel).await?.is_none() {
                match self.remote.create_folder(&path, cancel).await {
                    Ok(..) | Err(Error::AlreadyExists(..)) => (),
                    Err(err) => return Err(err),
                }
            }
        }
        Ok(())
    }

    /// Deletes `remote` per `scope`. See [`DeleteScope`].
    pub async fn delete(
        &self,
        remote: &Utf8Path,
        scope: DeleteScope,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let node = find_node(&self.remote, remote, cancel)
            .await?
            .ok_or_else(|| Error::NotFound(remote.to_owned()))?;
        match scope {
            DeleteScope::SingleEntry => {
                if node.is_folder() {
                    let children = self.remote.list_children(remote, cancel).await?;
                    if !children.is_empty() {
                        io_bail!("{remote} is a non-empty folder");
                    }
                }
                log::info!("deleting {remote}");
                self.remote.delete_node(remote, cancel).await
            }
            DeleteScope::FilesOnly => {
                let children = self.remote.list_children(remote, cancel).await?;
                for child in children.iter().filter(|child| child.is_document()) {
                    log::info!("deleting {}", child.path());
                    self.remote.delete_node(child.path(), cancel).await?;
                }
                Ok(())
            }
            DeleteScope::ContentsRecursive => self.delete_contents(remote, cancel).await,
            DeleteScope::FullRecursive => {
                self.delete_contents(remote, cancel).await?;
                log::info!("deleting {remote}");
                self.remote.delete_node(remote, cancel).await
            }
        }
    }

    fn delete_contents<'a>(
        &'a self,
        folder: &'a Utf8Path,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let children = self.remote.list_children(folder, cancel).await?;
            for child in children {
                if child.is_folder() {
                    self.delete_contents(child.path(), cancel).await?;
                }
                log::info!("deleting {}", child.path());
                self.remote.delete_node(child.path(), cancel).await?;
            }
            Ok(())
        })
    }
}
