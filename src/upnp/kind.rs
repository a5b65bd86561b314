//! Media kinds and their extension masks

use std::fmt;

/// One of the four roots of the virtual path namespace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Root,
    Music,
    Video,
    Pictures,
}

impl MediaKind {
    /// Every kind, root first
    pub const ALL: [MediaKind; 4] = [
        MediaKind::Root,
        MediaKind::Music,
        MediaKind::Video,
        MediaKind::Pictures,
    ];

    /// The typed kinds that have shares
    pub const TYPED: [MediaKind; 3] = [MediaKind::Music, MediaKind::Video, MediaKind::Pictures];

    /// Identifier of the kind's root container, e.g. `virtualpath://upnpmusic`
    pub fn prefix(&self) -> &'static str {
        match self {
            MediaKind::Root => "virtualpath://upnproot",
            MediaKind::Music => "virtualpath://upnpmusic",
            MediaKind::Video => "virtualpath://upnpvideo",
            MediaKind::Pictures => "virtualpath://upnppictures",
        }
    }

    /// Share type tag used by the share registry
    pub fn share_type(&self) -> &'static str {
        &self.prefix()[super::VIRTUAL_PATH_SCHEME.len()..]
    }

    /// Display label of the kind's container
    pub fn label(&self) -> &'static str {
        match self {
            MediaKind::Root => "Root",
            MediaKind::Music => "Music Files",
            MediaKind::Video => "Video Files",
            MediaKind::Pictures => "Picture Files",
        }
    }

    /// Look a kind up by its share type tag
    pub fn from_share_type(share_type: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.share_type() == share_type)
    }

    /// Match the kind prefix of an identifier, returning the kind and the
    /// text after the prefix
    pub fn match_prefix(identifier: &str) -> Option<(Self, &str)> {
        Self::ALL.iter().find_map(|kind| {
            identifier
                .strip_prefix(kind.prefix())
                .map(|rest| (*kind, rest))
        })
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.share_type())
    }
}

/// File extensions listed for each typed kind
///
/// Masks are `|`-separated lists of dotted extensions, e.g. `.mp3|.flac`.
/// Matching is case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionMasks {
    music: String,
    video: String,
    pictures: String,
}

impl Default for ExtensionMasks {
    fn default() -> Self {
        ExtensionMasks {
            music: ".nsv|.m4a|.flac|.aac|.strm|.pls|.rm|.rma|.mpa|.wav|.wma|.ogg|.mp3|.mp2|.m3u|.mod|.ac3|.dts|.cue|.aif|.aiff|.wpl|.ape|.mac|.mpc|.mp+|.mpp|.shn|.wv|.mid|.kar|.oga|.tta|.mka"
                .to_string(),
            video: ".m4v|.3g2|.3gp|.nsv|.tp|.ts|.ty|.strm|.pls|.rm|.rmvb|.m3u|.ifo|.mov|.qt|.divx|.xvid|.bivx|.vob|.nrg|.img|.iso|.pva|.wmv|.asf|.asx|.ogm|.m2v|.avi|.bin|.dat|.mpg|.mpeg|.mp4|.mkv|.avc|.vp3|.svq3|.nuv|.viv|.dv|.fli|.flv|.wpl|.vdr|.dvr-ms|.mts|.m2t|.m2ts|.evo|.ogv|.sdp|.avs|.rec|.vc1|.h264|.rcv|.webm|.wtv"
                .to_string(),
            pictures: ".png|.jpg|.jpeg|.bmp|.gif|.ico|.tif|.tiff|.tga|.pcx|.cbz|.cbr|.dng|.nef|.cr2|.crw|.orf|.arw|.erf|.3fr|.dcr|.x3f|.mef|.raf|.mrw|.pef|.sr2"
                .to_string(),
        }
    }
}

impl ExtensionMasks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the music mask
    pub fn music(mut self, mask: impl Into<String>) -> Self {
        self.music = mask.into();
        self
    }

    /// Set the video mask
    pub fn video(mut self, mask: impl Into<String>) -> Self {
        self.video = mask.into();
        self
    }

    /// Set the pictures mask
    pub fn pictures(mut self, mask: impl Into<String>) -> Self {
        self.pictures = mask.into();
        self
    }

    /// Mask for a kind; the root kind lists everything
    pub fn for_kind(&self, kind: MediaKind) -> Option<&str> {
        match kind {
            MediaKind::Root => None,
            MediaKind::Music => Some(&self.music),
            MediaKind::Video => Some(&self.video),
            MediaKind::Pictures => Some(&self.pictures),
        }
    }
}

/// Whether `filename` carries one of the extensions in `mask`
pub fn matches_mask(mask: &str, filename: &str) -> bool {
    let extension = match filename.rfind('.') {
        Some(dot) => &filename[dot..],
        None => return false,
    };
    mask.split('|')
        .any(|candidate| !candidate.is_empty() && candidate.eq_ignore_ascii_case(extension))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_prefix() {
        assert_eq!(
            MediaKind::match_prefix("virtualpath://upnpvideo/Movies"),
            Some((MediaKind::Video, "/Movies"))
        );
        assert_eq!(
            MediaKind::match_prefix("virtualpath://upnproot"),
            Some((MediaKind::Root, ""))
        );
        assert_eq!(MediaKind::match_prefix("virtualpath://upnpgames"), None);
        assert_eq!(MediaKind::match_prefix("foo://bar"), None);
    }

    #[test]
    fn test_share_type() {
        assert_eq!(MediaKind::Pictures.share_type(), "upnppictures");
        assert_eq!(MediaKind::from_share_type("upnpmusic"), Some(MediaKind::Music));
        assert_eq!(MediaKind::from_share_type("music"), None);
        assert_eq!(MediaKind::Video.to_string(), "upnpvideo");
    }

    #[test]
    fn test_matches_mask() {
        let masks = ExtensionMasks::default();
        let music = masks.for_kind(MediaKind::Music).unwrap();
        assert!(matches_mask(music, "track01.MP3"));
        assert!(matches_mask(music, "album.flac"));
        assert!(!matches_mask(music, "movie.mkv"));
        assert!(!matches_mask(music, "README"));
        assert!(masks.for_kind(MediaKind::Root).is_none());

        let masks = masks.video(".mkv");
        assert!(matches_mask(masks.for_kind(MediaKind::Video).unwrap(), "a.b.MKV"));
        assert!(!matches_mask(masks.for_kind(MediaKind::Video).unwrap(), "a.avi"));
    }
}
