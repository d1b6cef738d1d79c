//! Partial-name resolution for single-entry operations.
//!
//! A user-supplied remote path is resolved with exact leading segments and a
//! final segment treated as a substring fragment against the sibling names in
//! its parent folder. Several matches are all returned; bulk operations like
//! delete act on every one of them. Directory sync never goes through here —
//! it always compares exact relative paths.

use camino::Utf8Path;

use crate::{tree::RemoteTreeIndex, Error, RemoteNode, Result};

/// Nodes among `siblings` whose name contains `fragment` as a substring.
pub fn match_siblings<'a, I>(siblings: I, fragment: &str) -> Vec<&'a RemoteNode>
where
    I: IntoIterator<Item = &'a RemoteNode>,
{
    siblings
        .into_iter()
        .filter(|node| node.name().contains(fragment))
        .collect()
}

/// Resolves `path` against the index: every segment but the last must exist
/// exactly, the last is matched as a substring among its siblings.
///
/// Returns all matches (one or several); zero matches is `NotFound` on the
/// fragment, a missing parent is `NotFound` on the parent.
pub fn resolve_fragment<'a>(
    index: &'a RemoteTreeIndex,
    path: &Utf8Path,
) -> Result<Vec<&'a RemoteNode>> {
    let parent = path.parent().unwrap_or(Utf8Path::new(""));
    let fragment = path.file_name().unwrap_or("");

    if !index.is_folder(parent) {
        return Err(Error::NotFound(parent.to_owned()));
    }

    let matches = match_siblings(index.child_nodes(parent), fragment);

    if matches.is_empty() {
        return Err(Error::NotFound(path.to_owned()));
    }
    if matches.len() > 1 {
        log::info!(
            "'{fragment}' matches {} entries under '{parent}'",
            matches.len()
        );
    }
    Ok(matches)
}

/// The `Ambiguous` report for a multi-match, for callers that demand an
/// explicit confirmation before acting on all of them.
pub fn ambiguity_error(fragment: &str, matches: &[&RemoteNode]) -> Error {
    Error::Ambiguous {
        fragment: fragment.to_string(),
        matches: matches.iter().map(|node| node.name().to_string()).collect(),
    }
}
