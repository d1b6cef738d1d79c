use camino::Utf8Path;
use chrono::{DateTime, Utc};
use futures::Future;
use tokio::io;
use tokio_util::sync::CancellationToken;

use crate::{RemoteNode, Result};

/// The device-side API surface consumed by the core: listing, creating,
/// transferring and deleting entries of the remote document tree.
///
/// Contract per call:
/// - `list_children` returns immediate children only, in device listing
///   order, and fails with [`Error::NotFound`] when `folder` does not exist
///   or is a document.
/// - `create_folder` fails with [`Error::AlreadyExists`] or
///   [`Error::ParentMissing`]; it never creates intermediate folders.
/// - `put_file` fails with [`Error::ParentMissing`] or
///   [`Error::QuotaExceeded`]; replacing an existing document is the
///   caller's business (delete first). The modification time is a hint:
///   backends that cannot stamp it fall back to the device clock.
/// - `get_file` fails with [`Error::NotFound`].
/// - `delete_node` fails with [`Error::NotFound`] and removes exactly one
///   node; scoping deletion of folder contents is the caller's
///   responsibility via repeated calls.
///
/// Every call observes the cancellation token and returns
/// [`Error::Cancelled`] when it fires mid-flight.
///
/// [`Error::NotFound`]: crate::Error::NotFound
/// [`Error::AlreadyExists`]: crate::Error::AlreadyExists
/// [`Error::ParentMissing`]: crate::Error::ParentMissing
/// [`Error::QuotaExceeded`]: crate::Error::QuotaExceeded
/// [`Error::Cancelled`]: crate::Error::Cancelled
pub trait RemoteContentService: Clone + Send + Sync + 'static {
    fn list_children(
        &self,
        folder: &Utf8Path,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<Vec<RemoteNode>>> + Send;

    fn create_folder(
        &self,
        path: &Utf8Path,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<RemoteNode>> + Send;

    fn put_file(
        &self,
        data: impl io::AsyncRead + Send + Unpin,
        path: &Utf8Path,
        mtime: Option<DateTime<Utc>>,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<RemoteNode>> + Send;

    fn get_file(
        &self,
        path: &Utf8Path,
        sink: impl io::AsyncWrite + Send + Unpin,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<()>> + Send;

    fn delete_node(
        &self,
        path: &Utf8Path,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<()>> + Send;
}

/// Looks a single node up by path through its parent listing.
///
/// `Ok(None)` means the path is absent; errors other than `NotFound` on the
/// parent listing are passed through.
pub async fn find_node<S>(
    service: &S,
    path: &Utf8Path,
    cancel: &CancellationToken,
) -> Result<Option<RemoteNode>>
where
    S: RemoteContentService,
{
    if path.as_str().is_empty() {
        return Ok(Some(RemoteNode::root()));
    }
    let parent = path.parent().unwrap_or(Utf8Path::new(""));
    let children = match service.list_children(parent, cancel).await {
        Ok(children) => children,
        Err(crate::Error::NotFound(..)) => return Ok(None),
        Err(err) => return Err(err),
    };
    let name = path.file_name().unwrap_or("");
    Ok(children.into_iter().find(|node| node.name() == name))
}
