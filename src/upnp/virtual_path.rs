//! Virtual path resolution
//!
//! Identifiers have the form
//! `virtualpath://upnp<kind>[/<share-name>[/<sub-path>]]`. A sub-path is a
//! real filesystem path under one of the share's local roots, so item
//! paths produced by a listing look like
//! `virtualpath://upnpvideo/Movies//mnt/videos/film.mkv`.
//!
//! All operations are read-only queries over the share registry.

use super::kind::{ExtensionMasks, MediaKind};
use super::listing::{DirectoryLister, FsDirectoryLister, MediaItem};
use super::share::{Share, ShareRegistry};
use super::{Error, Result, VIRTUAL_PATH_SCHEME};
use log::{debug, warn};
use std::sync::Arc;

const MUSIC_LIBRARY_PATH: &str = "musicdb://";
const VIDEO_LIBRARY_PATH: &str = "videodb://";

/// A split virtual path identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualPath {
    kind: MediaKind,
    share: String,
    sub_path: String,
}

impl VirtualPath {
    /// Split an identifier into its share and sub-path
    ///
    /// Trailing slashes are ignored. A bare kind root yields an empty share
    /// and sub-path.
    pub fn parse(identifier: &str) -> Result<Self> {
        let identifier = identifier.trim_end_matches('/');
        let (kind, rest) = MediaKind::match_prefix(identifier)
            .ok_or_else(|| Error::InvalidIdentifier(identifier.to_string()))?;

        if rest.is_empty() {
            return Ok(VirtualPath {
                kind,
                share: String::new(),
                sub_path: String::new(),
            });
        }

        let rest = rest
            .strip_prefix('/')
            .ok_or_else(|| Error::InvalidIdentifier(identifier.to_string()))?;
        let (name, sub_path) = rest.split_once('/').unwrap_or((rest, ""));
        if name.is_empty() {
            return Err(Error::InvalidIdentifier(identifier.to_string()));
        }

        Ok(VirtualPath {
            kind,
            share: format!("{}/{}", kind.prefix(), name),
            sub_path: sub_path.to_string(),
        })
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    /// Identifier of the share, e.g. `virtualpath://upnpmusic/MyMusic`;
    /// empty for a kind root
    pub fn share(&self) -> &str {
        &self.share
    }

    /// Share name without the kind prefix
    pub fn share_name(&self) -> &str {
        self.share
            .get(self.kind.prefix().len() + 1..)
            .unwrap_or("")
    }

    /// Path below the share, empty when the identifier names the share
    pub fn sub_path(&self) -> &str {
        &self.sub_path
    }

    /// Whether the identifier is the kind's root container
    pub fn is_kind_root(&self) -> bool {
        self.share.is_empty()
    }
}

/// Maps virtual path identifiers onto local share roots
pub struct VirtualPathResolver {
    registry: Arc<dyn ShareRegistry>,
    lister: Box<dyn DirectoryLister>,
    masks: ExtensionMasks,
}

impl VirtualPathResolver {
    /// Resolve against `registry`, listing the local filesystem with the
    /// default extension masks
    pub fn new(registry: Arc<dyn ShareRegistry>) -> Self {
        VirtualPathResolver {
            registry,
            lister: Box::new(FsDirectoryLister),
            masks: ExtensionMasks::default(),
        }
    }

    /// Use another directory lister
    pub fn with_lister(mut self, lister: impl DirectoryLister + 'static) -> Self {
        self.lister = Box::new(lister);
        self
    }

    /// Use other extension masks
    pub fn with_extension_masks(mut self, masks: ExtensionMasks) -> Self {
        self.masks = masks;
        self
    }

    pub fn extension_masks(&self) -> &ExtensionMasks {
        &self.masks
    }

    /// Split an identifier into share and sub-path
    pub fn split_identifier(&self, identifier: &str) -> Result<VirtualPath> {
        VirtualPath::parse(identifier)
    }

    /// Find the share an identifier names and its local roots
    ///
    /// Everything after the kind is taken as the share name, so an
    /// identifier with a sub-path does not resolve. Remote roots are
    /// dropped; the returned list may be empty.
    pub fn resolve_share(&self, path: &str) -> Result<(Share, Vec<String>)> {
        let invalid = || Error::InvalidIdentifier(path.to_string());
        let rest = path
            .strip_prefix(VIRTUAL_PATH_SCHEME)
            .ok_or_else(invalid)?
            .trim_end_matches('/');
        let (share_type, source) = rest.split_once('/').unwrap_or((rest, ""));
        let kind = MediaKind::from_share_type(share_type).ok_or_else(invalid)?;

        let share = self
            .registry
            .shares(kind)
            .into_iter()
            .find(|share| share.name() == source)
            .ok_or_else(|| Error::NoSuchShare(path.to_string()))?;

        let local_paths = share.local_paths();
        Ok((share, local_paths))
    }

    /// List a container of the virtual namespace
    ///
    /// The root and the typed roots always succeed, possibly with no
    /// entries. So does a share addressed directly, even when its single
    /// local root cannot be read. Item paths stay in the virtual namespace.
    pub fn list_directory(&self, path: &str) -> Result<Vec<MediaItem>> {
        let path = path.trim_end_matches('/');
        debug!("listing {}", path);

        if path == MediaKind::Root.prefix() {
            return Ok(self.root_items());
        }

        if let Some(kind) = MediaKind::TYPED.iter().find(|kind| kind.prefix() == path) {
            return Ok(self.share_items(*kind));
        }

        let (prefix, mut items) = match self.resolve_share(path) {
            Ok((_, local_paths)) => {
                let mask = self.mask_for(path);
                let items = match local_paths.as_slice() {
                    [single] => match self.lister.list(single, mask) {
                        Ok(items) => items,
                        Err(err) => {
                            warn!("cannot list root {} of {}: {}", single, path, err);
                            Vec::new()
                        }
                    },
                    paths => paths
                        .iter()
                        .map(|root| MediaItem::folder(root.as_str(), root.as_str()))
                        .collect(),
                };
                (path.to_string(), items)
            }
            Err(_) => {
                let split = VirtualPath::parse(path)?;
                let sub_path = split.sub_path();
                let (_, local_paths) = self
                    .resolve_share(split.share())
                    .map_err(|_| Error::NoSuchItem(path.to_string()))?;

                let within_share = local_paths.iter().any(|root| sub_path.starts_with(root.as_str()));
                if !within_share || sub_path.split('/').any(|component| component == "..") {
                    debug!("{} is not under a local root of {}", sub_path, split.share());
                    return Err(Error::NoSuchItem(path.to_string()));
                }

                let mask = self.masks.for_kind(split.kind());
                (split.share().to_string(), self.lister.list(sub_path, mask)?)
            }
        };

        for item in &mut items {
            let virtual_path = format!("{}/{}", prefix, item.path());
            item.set_path(virtual_path);
        }
        Ok(items)
    }

    fn root_items(&self) -> Vec<MediaItem> {
        let mut items: Vec<MediaItem> = MediaKind::TYPED
            .iter()
            .map(|kind| MediaItem::folder(kind.prefix(), kind.label()).preformatted())
            .collect();
        items.push(MediaItem::folder(MUSIC_LIBRARY_PATH, "Music Library").preformatted());
        items.push(MediaItem::folder(VIDEO_LIBRARY_PATH, "Video Library").preformatted());
        items
    }

    fn share_items(&self, kind: MediaKind) -> Vec<MediaItem> {
        let mut items = Vec::new();
        for share in self.registry.shares(kind) {
            let identifier = format!("{}/{}", kind.prefix(), share.name());
            match self.resolve_share(&identifier) {
                Ok((_, local_paths)) if !local_paths.is_empty() => {
                    items.push(
                        MediaItem::folder(format!("{}/", identifier), share.name()).preformatted(),
                    );
                }
                _ => debug!("share {} has no local paths", identifier),
            }
        }
        items
    }

    fn mask_for(&self, path: &str) -> Option<&str> {
        MediaKind::match_prefix(path).and_then(|(kind, _)| self.masks.for_kind(kind))
    }
}
