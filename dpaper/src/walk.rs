//! Subtree enumeration over the local filesystem and the remote store.
//!
//! Both walkers produce the same currency: lazy streams of paths relative to
//! the walked root, `/`-separated, in discovery order. This is the common key
//! space the reconciliation engine diffs over.

use std::collections::VecDeque;

use async_stream::try_stream;
use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Utc};
use futures::Stream;
use tokio::fs;
use tokio_util::sync::CancellationToken;

use crate::{NodeKind, RemoteContentService, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Depth {
    ImmediateChildren,
    FullSubtree,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Select {
    FilesOnly,
    FilesAndFolders,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalkedKind {
    Folder,
    File { size: u64, mtime: DateTime<Utc> },
}

/// One discovered entry, keyed by its path relative to the walked root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Walked {
    pub rel_path: Utf8PathBuf,
    pub kind: WalkedKind,
}

impl Walked {
    pub fn is_folder(&self) -> bool {
        matches!(self.kind, WalkedKind::Folder)
    }

    pub fn mtime(&self) -> Option<DateTime<Utc>> {
        match self.kind {
            WalkedKind::File { mtime, .. } => Some(mtime),
            WalkedKind::Folder => None,
        }
    }
}

/// Walks a local directory. Symlinks and non-regular files are neither
/// reported nor followed.
pub fn walk_local(
    root: Utf8PathBuf,
    depth: Depth,
    select: Select,
) -> impl Stream<Item = Result<Walked>> + Send {
    try_stream! {
        let mut pending = VecDeque::new();
        pending.push_back((root.clone(), Utf8PathBuf::new()));
        while let Some((dir, rel_dir)) = pending.pop_front() {
            log::trace!("walking local directory {dir}");
            let mut read_dir = fs::read_dir(&dir).await?;
            while let Some(entry) = read_dir.next_entry().await? {
                let file_type = entry.file_type().await?;
                let name = match entry.file_name().into_string() {
                    Ok(name) => name,
                    // non UTF-8 names cannot exist on the device side
                    Err(..) => continue,
                };
                let rel_path = rel_dir.join(&name);
                if file_type.is_dir() {
                    if select == Select::FilesAndFolders {
                        yield Walked { rel_path: rel_path.clone(), kind: WalkedKind::Folder };
                    }
                    if depth == Depth::FullSubtree {
                        pending.push_back((dir.join(&name), rel_path));
                    }
                } else if file_type.is_file() {
                    let metadata = entry.metadata().await?;
                    let mtime: DateTime<Utc> = metadata.modified()?.into();
                    yield Walked {
                        rel_path,
                        kind: WalkedKind::File { size: metadata.len(), mtime },
                    };
                }
                // symlinks and special files are silently excluded
            }
        }
    }
}

/// Walks a remote folder via repeated listing calls, recursing into folders
/// only for [`Depth::FullSubtree`].
pub fn walk_remote<S>(
    service: S,
    root: Utf8PathBuf,
    depth: Depth,
    select: Select,
    cancel: CancellationToken,
) -> impl Stream<Item = Result<Walked>> + Send
where
    S: RemoteContentService,
{
    try_stream! {
        let mut pending = VecDeque::new();
        pending.push_back((root.clone(), Utf8PathBuf::new()));
        while let Some((folder, rel_dir)) = pending.pop_front() {
            let children = service.list_children(&folder, &cancel).await?;
            for node in children {
                let rel_path = rel_dir.join(node.name());
                match node.kind() {
                    NodeKind::Folder => {
                        if select == Select::FilesAndFolders {
                            yield Walked { rel_path: rel_path.clone(), kind: WalkedKind::Folder };
                        }
                        if depth == Depth::FullSubtree {
                            pending.push_back((folder.join(node.name()), rel_path));
                        }
                    }
                    NodeKind::Document { size, mtime } => {
                        yield Walked {
                            rel_path,
                            kind: WalkedKind::File { size: *size, mtime: *mtime },
                        };
                    }
                }
            }
        }
    }
}

/// Collects a walk into a map keyed by relative path, for set reconciliation.
pub async fn collect_walk<St>(
    walk: St,
) -> Result<std::collections::BTreeMap<Utf8PathBuf, WalkedKind>>
where
    St: Stream<Item = Result<Walked>>,
{
    use futures::TryStreamExt;
    futures::pin_mut!(walk);
    let mut map = std::collections::BTreeMap::new();
    while let Some(walked) = walk.try_next().await? {
        map.insert(walked.rel_path, walked.kind);
    }
    Ok(map)
}

pub fn root_relative(root: &Utf8Path, rel: &Utf8Path) -> Utf8PathBuf {
    if rel.as_str().is_empty() {
        root.to_owned()
    } else {
        root.join(rel)
    }
}
