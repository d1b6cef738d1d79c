use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeKind {
    Folder,
    Document { size: u64, mtime: DateTime<Utc> },
}

/// One entry of the remote content tree.
///
/// `path` is root-relative and `/`-separated, unique within a snapshot.
/// `id` is the device-side identifier, stable across renames but not across
/// deletion and recreation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteNode {
    id: String,
    path: Utf8PathBuf,
    kind: NodeKind,
}

impl RemoteNode {
    pub fn root() -> RemoteNode {
        RemoteNode {
            id: "root".to_string(),
            path: Utf8PathBuf::new(),
            kind: NodeKind::Folder,
        }
    }

    pub fn new(id: String, path: Utf8PathBuf, kind: NodeKind) -> RemoteNode {
        RemoteNode { id, path, kind }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    pub fn name(&self) -> &str {
        self.path.file_name().unwrap_or("")
    }

    pub fn parent_path(&self) -> Option<&Utf8Path> {
        self.path.parent()
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn is_folder(&self) -> bool {
        matches!(self.kind, NodeKind::Folder)
    }

    pub fn is_document(&self) -> bool {
        matches!(self.kind, NodeKind::Document { .. })
    }

    pub fn size(&self) -> Option<u64> {
        match self.kind {
            NodeKind::Document { size, .. } => Some(size),
            NodeKind::Folder => None,
        }
    }

    pub fn mtime(&self) -> Option<DateTime<Utc>> {
        match self.kind {
            NodeKind::Document { mtime, .. } => Some(mtime),
            NodeKind::Folder => None,
        }
    }
}

impl Default for RemoteNode {
    fn default() -> Self {
        RemoteNode::root()
    }
}
