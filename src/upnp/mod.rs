//! UPnP browse-path bridging
//!
//! A UPnP content directory addresses containers with abstract
//! `virtualpath://` identifiers. This module maps them onto the local
//! filesystem roots of configured shares:
//!
//! - [`MediaKind`] names the four identifier roots and carries their labels
//! - [`ShareRegistry`] supplies the shares of each kind
//! - [`DirectoryLister`] enumerates real directories with an extension mask
//! - [`VirtualPathResolver`] splits identifiers, resolves shares and
//!   produces listings expressed in the virtual namespace

pub mod kind;
pub mod listing;
pub mod share;
pub mod virtual_path;

pub use kind::{ExtensionMasks, MediaKind};
pub use listing::{DirectoryLister, FsDirectoryLister, MediaItem};
pub use share::{MemoryShareRegistry, Share, SharePath, ShareRegistry};
pub use virtual_path::{VirtualPath, VirtualPathResolver};

use std::io;

/// Result type for resolver operations
pub type Result<T> = std::result::Result<T, Error>;

/// Resolver errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid virtual path: {0}")]
    InvalidIdentifier(String),

    #[error("No such share: {0}")]
    NoSuchShare(String),

    #[error("No such item: {0}")]
    NoSuchItem(String),

    #[error("I/O error: {0}")]
    Io(#[source] io::Error),
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Error::NoSuchItem(err.to_string()),
            _ => Error::Io(err),
        }
    }
}

/// Scheme prefix shared by every virtual path identifier
pub const VIRTUAL_PATH_SCHEME: &str = "virtualpath://";
