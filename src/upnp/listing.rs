//! Directory listing

use super::kind::matches_mask;
use super::Result;
use log::trace;
use std::fs;

/// An entry of a browse result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaItem {
    path: String,
    label: String,
    is_folder: bool,
    label_preformatted: bool,
}

impl MediaItem {
    /// A folder entry
    pub fn folder(path: impl Into<String>, label: impl Into<String>) -> Self {
        MediaItem {
            path: path.into(),
            label: label.into(),
            is_folder: true,
            label_preformatted: false,
        }
    }

    /// A file entry
    pub fn file(path: impl Into<String>, label: impl Into<String>) -> Self {
        MediaItem {
            path: path.into(),
            label: label.into(),
            is_folder: false,
            label_preformatted: false,
        }
    }

    /// Mark the label as final, not to be derived from the path
    pub fn preformatted(mut self) -> Self {
        self.label_preformatted = true;
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn set_path(&mut self, path: impl Into<String>) {
        self.path = path.into();
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_folder(&self) -> bool {
        self.is_folder
    }

    pub fn is_label_preformatted(&self) -> bool {
        self.label_preformatted
    }
}

/// Enumerates a real directory
pub trait DirectoryLister: Send + Sync {
    /// List `path`; with a mask, files are kept only when their extension
    /// is in it. Folders are always listed.
    fn list(&self, path: &str, mask: Option<&str>) -> Result<Vec<MediaItem>>;
}

/// Lists directories on the local filesystem
///
/// Entries are sorted by name. Item paths are the directory path joined
/// with the entry name; folder paths end with `/`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsDirectoryLister;

impl DirectoryLister for FsDirectoryLister {
    fn list(&self, path: &str, mask: Option<&str>) -> Result<Vec<MediaItem>> {
        let base = path.trim_end_matches('/');
        let mut items = Vec::new();

        for entry in fs::read_dir(path)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            let is_dir = entry.metadata()?.is_dir();

            if is_dir {
                items.push(MediaItem::folder(format!("{}/{}/", base, name), name));
            } else if mask.map_or(true, |mask| matches_mask(mask, &name)) {
                items.push(MediaItem::file(format!("{}/{}", base, name), name));
            } else {
                trace!("{} filtered out of {}", name, path);
            }
        }

        items.sort_by(|a, b| a.label.cmp(&b.label));
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upnp::Error;

    #[test]
    fn test_fs_lister() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.mp3"), b"").unwrap();
        fs::write(dir.path().join("a.txt"), b"").unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        let root = dir.path().to_string_lossy().into_owned();

        let items = FsDirectoryLister.list(&root, None).unwrap();
        let labels: Vec<_> = items.iter().map(MediaItem::label).collect();
        assert_eq!(labels, vec!["a.txt", "b.mp3", "sub"]);

        let items = FsDirectoryLister.list(&format!("{}/", root), Some(".mp3")).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].path(), format!("{}/b.mp3", root));
        assert!(!items[0].is_folder());
        assert_eq!(items[1].path(), format!("{}/sub/", root));
        assert!(items[1].is_folder());
    }

    #[test]
    fn test_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("gone").to_string_lossy().into_owned();
        assert!(matches!(
            FsDirectoryLister.list(&missing, None),
            Err(Error::NoSuchItem(_))
        ));
    }
}
