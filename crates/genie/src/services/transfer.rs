use std::path::{Path, PathBuf};

use crate::common::error::GenieError;

const FILE_SCHEME: &str = "file://";

/// Moves files between the local node and a storage backend.
pub trait FileTransfer: Send + Sync {
    /// Returns true if this implementation understands the given location.
    fn is_valid(&self, uri: &str) -> bool;

    fn get_file(&self, src_uri: &str, dst_path: &Path) -> crate::Result<()>;

    fn put_file(&self, src_path: &Path, dst_uri: &str) -> crate::Result<()>;
}

/// Transfer to and from locations on a locally mounted filesystem,
/// given either as `file://` URIs or as absolute paths.
#[derive(Default, Debug, Clone)]
pub struct LocalFileTransfer;

impl LocalFileTransfer {
    fn local_path(uri: &str) -> crate::Result<PathBuf> {
        let path = Path::new(uri.strip_prefix(FILE_SCHEME).unwrap_or(uri));
        if !path.is_absolute() {
            return Err(GenieError::FileTransferError(format!(
                "Location {uri} is not an absolute path"
            )));
        }
        Ok(path.to_path_buf())
    }

    fn copy(src: &Path, dst: &Path) -> crate::Result<()> {
        if let Some(parent) = dst.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::copy(src, dst).map_err(|error| {
            GenieError::FileTransferError(format!(
                "Cannot copy {} to {}: {error}",
                src.display(),
                dst.display()
            ))
        })?;
        Ok(())
    }
}

impl FileTransfer for LocalFileTransfer {
    fn is_valid(&self, uri: &str) -> bool {
        uri.starts_with(FILE_SCHEME) || Path::new(uri).is_absolute()
    }

    fn get_file(&self, src_uri: &str, dst_path: &Path) -> crate::Result<()> {
        log::debug!("Copying {src_uri} to {}", dst_path.display());
        Self::copy(&Self::local_path(src_uri)?, dst_path)
    }

    fn put_file(&self, src_path: &Path, dst_uri: &str) -> crate::Result<()> {
        log::debug!("Copying {} to {dst_uri}", src_path.display());
        Self::copy(src_path, &Self::local_path(dst_uri)?)
    }
}

/// Dispatches each transfer to the first implementation that accepts the location.
#[derive(Default)]
pub struct FileTransferRouter {
    transfers: Vec<Box<dyn FileTransfer>>,
}

impl FileTransferRouter {
    pub fn new(transfers: Vec<Box<dyn FileTransfer>>) -> Self {
        Self { transfers }
    }

    /// Router that only understands local locations.
    pub fn local() -> Self {
        Self::new(vec![Box::new(LocalFileTransfer)])
    }

    fn select(&self, uri: &str) -> crate::Result<&dyn FileTransfer> {
        self.transfers
            .iter()
            .find(|transfer| transfer.is_valid(uri))
            .map(|transfer| &**transfer)
            .ok_or_else(|| {
                GenieError::FileTransferError(format!("No file transfer can handle {uri}"))
            })
    }
}

impl FileTransfer for FileTransferRouter {
    fn is_valid(&self, uri: &str) -> bool {
        self.transfers.iter().any(|transfer| transfer.is_valid(uri))
    }

    fn get_file(&self, src_uri: &str, dst_path: &Path) -> crate::Result<()> {
        self.select(src_uri)?.get_file(src_uri, dst_path)
    }

    fn put_file(&self, src_path: &Path, dst_uri: &str) -> crate::Result<()> {
        self.select(dst_uri)?.put_file(src_path, dst_uri)
    }
}
