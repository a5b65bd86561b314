//! Shares and the registry that supplies them

use super::MediaKind;
use std::collections::HashMap;
use std::sync::RwLock;

/// One filesystem root of a share
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharePath {
    path: String,
    remote: bool,
}

impl SharePath {
    /// A path on a local disk
    pub fn local(path: impl Into<String>) -> Self {
        SharePath {
            path: path.into(),
            remote: false,
        }
    }

    /// A path on a network filesystem
    pub fn remote(path: impl Into<String>) -> Self {
        SharePath {
            path: path.into(),
            remote: true,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn is_remote(&self) -> bool {
        self.remote
    }
}

/// A named location exposed for browsing, backed by one or more roots
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Share {
    name: String,
    paths: Vec<SharePath>,
}

impl Share {
    pub fn new(name: impl Into<String>) -> Self {
        Share {
            name: name.into(),
            paths: Vec::new(),
        }
    }

    /// Append a root path
    pub fn with_path(mut self, path: SharePath) -> Self {
        self.paths.push(path);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Root paths in configuration order
    pub fn paths(&self) -> &[SharePath] {
        &self.paths
    }

    /// Root paths that are not remote
    pub fn local_paths(&self) -> Vec<String> {
        self.paths
            .iter()
            .filter(|path| !path.remote)
            .map(|path| path.path.clone())
            .collect()
    }
}

/// Source of configured shares
///
/// Implementations are read concurrently; share names are unique per kind.
pub trait ShareRegistry: Send + Sync {
    /// All shares of a kind, in configuration order
    fn shares(&self, kind: MediaKind) -> Vec<Share>;
}

/// Share registry held in memory
#[derive(Debug, Default)]
pub struct MemoryShareRegistry {
    shares: RwLock<HashMap<MediaKind, Vec<Share>>>,
}

impl MemoryShareRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a share, replacing an existing one of the same kind and name
    pub fn add_share(&self, kind: MediaKind, share: Share) {
        let mut shares = match self.shares.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let list = shares.entry(kind).or_default();
        match list.iter_mut().find(|existing| existing.name == share.name) {
            Some(existing) => *existing = share,
            None => list.push(share),
        }
    }

    /// Remove a share by name, returning whether it existed
    pub fn remove_share(&self, kind: MediaKind, name: &str) -> bool {
        let mut shares = match self.shares.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        match shares.get_mut(&kind) {
            Some(list) => {
                let before = list.len();
                list.retain(|share| share.name != name);
                list.len() != before
            }
            None => false,
        }
    }
}

impl ShareRegistry for MemoryShareRegistry {
    fn shares(&self, kind: MediaKind) -> Vec<Share> {
        let shares = match self.shares.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        shares.get(&kind).cloned().unwrap_or_default()
    }
}
