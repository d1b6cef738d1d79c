use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt::Write;

use camino::{Utf8Path, Utf8PathBuf};
use tokio_util::sync::CancellationToken;

use crate::{Error, RemoteContentService, RemoteNode, Result};

/// A point-in-time, path-addressable snapshot of the remote content tree.
///
/// Built by repeated `list_children` calls starting at the root. The snapshot
/// is read-only for the duration of one run; the remote tree changing
/// underneath is accepted and shows up as transfer-time errors, not as index
/// updates.
#[derive(Debug, Default)]
pub struct RemoteTreeIndex {
    nodes: BTreeMap<Utf8PathBuf, RemoteNode>,
    children: HashMap<Utf8PathBuf, Vec<String>>,
}

impl RemoteTreeIndex {
    /// Snapshots the whole tree rooted at `root` (empty path for the device
    /// root).
    pub async fn snapshot<S>(
        service: &S,
        root: &Utf8Path,
        cancel: &CancellationToken,
    ) -> Result<Self>
    where
        S: RemoteContentService,
    {
        log::trace!("snapshotting remote tree at '{root}'");
        let mut index = RemoteTreeIndex::default();
        let mut folders = VecDeque::new();
        folders.push_back(root.to_owned());
        while let Some(folder) = folders.pop_front() {
            let entries = service.list_children(&folder, cancel).await?;
            let mut names = Vec::with_capacity(entries.len());
            for node in entries {
                names.push(node.name().to_string());
                if node.is_folder() {
                    folders.push_back(node.path().to_owned());
                }
                index.nodes.insert(node.path().to_owned(), node);
            }
            index.children.insert(folder, names);
        }
        Ok(index)
    }

    pub fn node(&self, path: &Utf8Path) -> Option<&RemoteNode> {
        self.nodes.get(path)
    }

    pub fn is_folder(&self, path: &Utf8Path) -> bool {
        path.as_str().is_empty() || self.node(path).map(RemoteNode::is_folder).unwrap_or(false)
    }

    /// Child names of a listed folder, in discovery order.
    pub fn children(&self, path: &Utf8Path) -> &[String] {
        self.children
            .get(path)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn child_nodes<'a>(&'a self, path: &Utf8Path) -> impl Iterator<Item = &'a RemoteNode> + 'a {
        let parent = path.to_owned();
        self.children(path)
            .iter()
            .filter_map(move |name| self.nodes.get(&parent.join(name)))
    }

    /// Renders the subtree under `root` as an indented listing, folders
    /// marked with a trailing `/`.
    pub fn render(&self, root: &Utf8Path, folders_only: bool) -> Result<String> {
        if !self.is_folder(root) {
            return Err(Error::NotFound(root.to_owned()));
        }
        let mut out = String::new();
        self.render_level(root, 0, folders_only, &mut out);
        Ok(out)
    }

    fn render_level(&self, path: &Utf8Path, indent: usize, folders_only: bool, out: &mut String) {
        for node in self.child_nodes(path) {
            if node.is_folder() {
                writeln!(out, "{}{}/", "  ".repeat(indent), node.name()).unwrap();
                self.render_level(node.path(), indent + 1, folders_only, out);
            } else if !folders_only {
                writeln!(out, "{}{}", "  ".repeat(indent), node.name()).unwrap();
            }
        }
    }
}
