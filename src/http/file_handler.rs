//! Static file serving
//!
//! [`FileRequestHandler`] maps URL paths under a URL root onto files under
//! a filesystem root. It answers GET and HEAD, honours single byte ranges
//! and can render an HTML listing for directories.

use super::handler::{RequestContext, RequestHandler};
use super::header_names::{ACCEPT_RANGES, CONTENT_RANGE, RANGE};
use super::{Error, HttpRequest, HttpResponse, Method, Result, Status, Version};
use log::{debug, trace};
use percent_encoding::percent_decode_str;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::fs::{self, File};
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

const DEFAULT_MIME_TYPE: &str = "text/html";

/// Built-in extension to MIME type map
const DEFAULT_FILE_TYPE_MAP: &[(&str, &str)] = &[
    ("xml", "text/xml; charset=\"utf-8\""),
    ("htm", "text/html"),
    ("html", "text/html"),
    ("c", "text/plain"),
    ("h", "text/plain"),
    ("txt", "text/plain"),
    ("css", "text/css"),
    ("gif", "image/gif"),
    ("thm", "image/jpeg"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("jpe", "image/jpeg"),
    ("jp2", "image/jp2"),
    ("png", "image/png"),
    ("bmp", "image/bmp"),
    ("tif", "image/tiff"),
    ("tiff", "image/tiff"),
    ("mpa", "audio/mpeg"),
    ("mp2", "audio/mpeg"),
    ("mp3", "audio/mpeg"),
    ("m4a", "audio/mp4"),
    ("wma", "audio/x-ms-wma"),
    ("aif", "audio/x-aiff"),
    ("aifc", "audio/x-aiff"),
    ("aiff", "audio/x-aiff"),
    ("wav", "audio/x-wav"),
    ("mpg", "video/mpeg"),
    ("mpeg", "video/mpeg"),
    ("mp4", "video/mp4"),
    ("m4v", "video/mp4"),
    ("mov", "video/quicktime"),
    ("wmv", "video/x-ms-wmv"),
    ("asf", "video/x-ms-asf"),
    ("avi", "video/x-msvideo"),
    ("divx", "video/x-msvideo"),
    ("xvid", "video/x-msvideo"),
    ("doc", "application/msword"),
    ("eps", "application/postscript"),
    ("ps", "application/postscript"),
    ("js", "application/javascript"),
    ("pdf", "application/pdf"),
    ("zip", "application/zip"),
];

/// Serves files below a directory
#[derive(Debug, Clone)]
pub struct FileRequestHandler {
    url_root: String,
    file_root: PathBuf,
    auto_dir: bool,
    auto_index: Option<String>,
    default_mime_type: String,
    use_default_file_type_map: bool,
    file_type_map: HashMap<String, String>,
}

/// Outcome of interpreting a `Range` header against a file size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ByteRange {
    /// Inclusive span to serve with 206
    Satisfiable { start: u64, end: u64 },
    /// 416 with `Content-Range: bytes */size`
    Unsatisfiable,
    /// Multiple ranges, 416 without `Content-Range`
    MultiRange,
    /// 400
    BadSyntax,
}

impl FileRequestHandler {
    /// Serve `file_root` for request paths starting with `url_root`
    pub fn new(url_root: impl Into<String>, file_root: impl Into<PathBuf>) -> Self {
        FileRequestHandler {
            url_root: url_root.into(),
            file_root: file_root.into(),
            auto_dir: false,
            auto_index: None,
            default_mime_type: DEFAULT_MIME_TYPE.to_string(),
            use_default_file_type_map: true,
            file_type_map: HashMap::new(),
        }
    }

    /// Render HTML listings for directories instead of refusing them
    pub fn auto_dir(mut self, enabled: bool) -> Self {
        self.auto_dir = enabled;
        self
    }

    /// Serve this file when a directory is requested and it exists there
    pub fn auto_index(mut self, name: impl Into<String>) -> Self {
        self.auto_index = Some(name.into());
        self
    }

    /// MIME type for unknown extensions
    pub fn default_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.default_mime_type = mime_type.into();
        self
    }

    /// Consult the built-in extension map after the custom one
    pub fn use_default_file_type_map(mut self, enabled: bool) -> Self {
        self.use_default_file_type_map = enabled;
        self
    }

    /// Map a file extension (without dot, any case) to a MIME type
    pub fn add_file_type(mut self, extension: &str, mime_type: impl Into<String>) -> Self {
        self.file_type_map
            .insert(extension.to_ascii_lowercase(), mime_type.into());
        self
    }

    /// Content type for a file name
    ///
    /// The extension after the last dot is looked up case-insensitively in
    /// the custom map, then the built-in map, then the default applies.
    pub fn content_type(&self, filename: &str) -> String {
        let extension = match filename.rfind('.') {
            Some(dot) => filename[dot + 1..].to_ascii_lowercase(),
            None => return self.default_mime_type.clone(),
        };

        if let Some(mime_type) = self.file_type_map.get(&extension) {
            return mime_type.clone();
        }
        if self.use_default_file_type_map {
            if let Some((_, mime_type)) = DEFAULT_FILE_TYPE_MAP
                .iter()
                .find(|(ext, _)| *ext == extension)
            {
                return mime_type.to_string();
            }
        }

        trace!("no MIME type for {}, using {}", filename, self.default_mime_type);
        self.default_mime_type.clone()
    }

    fn directory_listing(&self, request: &HttpRequest, relative_path: &str, dir: &Path) -> Result<String> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            entries.push((entry.file_name().to_string_lossy().into_owned(), is_dir));
        }
        entries.sort();

        let dirname = html_encode(relative_path.trim_start_matches('/'), "<>&");
        let mut base_path = html_encode(request.url().path(), "<>&\"");
        if !base_path.ends_with('/') {
            base_path.push('/');
        }

        let mut html = String::with_capacity(1024 + 128 * entries.len());
        let _ = write!(
            html,
            "<html><head><title>Directory Listing for /{}</title></head><body><h2>Directory Listing for /{}</h2><hr><ul>\r\n",
            dirname, dirname
        );
        for (name, is_dir) in &entries {
            let name = html_encode(name, "<>&");
            let _ = write!(
                html,
                "<li><a href=\"{}{}\">{}{}</a><br>\r\n",
                base_path,
                name,
                name,
                if *is_dir { "/" } else { "" }
            );
        }
        html.push_str("</ul></body></html>");
        Ok(html)
    }
}

impl RequestHandler for FileRequestHandler {
    fn setup_response(
        &self,
        request: &mut HttpRequest,
        _context: &RequestContext,
        response: &mut HttpResponse,
    ) -> Result<()> {
        if !matches!(request.method(), Method::Get | Method::Head) {
            response.set_status(Status::METHOD_NOT_ALLOWED, "Method Not Allowed");
            return Ok(());
        }

        response.headers_mut().set(ACCEPT_RANGES, "bytes", true);
        if request.version().is_http11() {
            response.set_version(Version::Http11);
        }

        let remainder = request
            .url()
            .path()
            .strip_prefix(self.url_root.as_str())
            .ok_or_else(|| {
                Error::InvalidParameters(format!(
                    "{} is not under {}",
                    request.url().path(),
                    self.url_root
                ))
            })?;
        let relative_path = percent_decode_str(remainder)
            .decode_utf8()
            .map_err(|_| Error::InvalidParameters(format!("bad path encoding: {}", remainder)))?
            .into_owned();
        if relative_path.split('/').any(|component| component == "..") {
            return Err(Error::PermissionDenied(relative_path));
        }

        let mut filename = self.file_root.join(relative_path.trim_start_matches('/'));
        debug!("serving {}", filename.display());

        if filename.is_dir() {
            let index = self
                .auto_index
                .as_ref()
                .map(|index| filename.join(index))
                .filter(|index| index.is_file());
            match index {
                Some(index) => filename = index,
                None if self.auto_dir => {
                    let html = self.directory_listing(request, &relative_path, &filename)?;
                    let entity = response.entity_or_default();
                    entity.set_content_type("text/html");
                    entity.set_body(html);
                    return Ok(());
                }
                None => return Err(Error::PermissionDenied(relative_path)),
            }
        }

        let mut file = File::open(&filename).map_err(|err| {
            debug!("cannot open {}: {}", filename.display(), err);
            Error::NoSuchItem(filename.display().to_string())
        })?;
        let file_size = file.metadata()?.len();
        let content_type = self.content_type(&filename.to_string_lossy());

        let range = match request.headers().get(RANGE) {
            Some(spec) if file_size > 0 => Some(parse_byte_range(spec, file_size)?),
            _ => None,
        };

        let entity = response.entity_or_default();
        match range {
            None => {
                entity.set_stream(file, Some(file_size));
            }
            Some(ByteRange::Satisfiable { start, end }) => {
                debug!("range {}-{} of {}", start, end, file_size);
                file.seek(SeekFrom::Start(start))?;
                let length = end - start + 1;
                entity.set_stream(file.take(length), Some(length));
                response.set_status(Status::PARTIAL_CONTENT, "Partial Content");
                response.headers_mut().set(
                    CONTENT_RANGE,
                    format!("bytes {}-{}/{}", start, end, file_size),
                    true,
                );
            }
            Some(ByteRange::Unsatisfiable) => {
                debug!("range not satisfiable for size {}", file_size);
                response.set_status(Status::RANGE_NOT_SATISFIABLE, "Requested Range Not Satisfiable");
                response
                    .headers_mut()
                    .set(CONTENT_RANGE, format!("bytes */{}", file_size), true);
                return Ok(());
            }
            Some(ByteRange::MultiRange) => {
                debug!("multi-range requests not supported");
                response.set_status(Status::RANGE_NOT_SATISFIABLE, "Requested Range Not Satisfiable");
                return Ok(());
            }
            Some(ByteRange::BadSyntax) => {
                debug!("unsupported range syntax");
                response.set_status(Status::BAD_REQUEST, "Bad Request");
                return Ok(());
            }
        }

        if let Some(entity) = response.entity_mut() {
            entity.set_content_type(content_type);
        }
        Ok(())
    }
}

/// Interpret a `Range` header value for a non-empty file
///
/// Unparsable numbers are an error rather than a status.
fn parse_byte_range(spec: &str, file_size: u64) -> Result<ByteRange> {
    let range = match spec.strip_prefix("bytes=") {
        Some(range) => range,
        None => return Ok(ByteRange::BadSyntax),
    };
    if range.contains(',') {
        return Ok(ByteRange::MultiRange);
    }
    let (start, end) = match range.split_once('-') {
        Some(parts) => parts,
        None => return Ok(ByteRange::BadSyntax),
    };

    let parse = |value: &str| {
        value
            .trim()
            .parse::<u64>()
            .map_err(|_| Error::InvalidFormat(format!("bad range value: {}", spec)))
    };
    let start = if start.is_empty() { None } else { Some(parse(start)?) };
    let end = if end.is_empty() { None } else { Some(parse(end)?) };

    let (start, end) = match (start, end) {
        (Some(start), Some(end)) => (start, end),
        (Some(start), None) => (start, file_size - 1),
        (None, Some(suffix)) if suffix > 0 && suffix <= file_size => {
            (file_size - suffix, file_size - 1)
        }
        (None, Some(_)) => return Ok(ByteRange::Unsatisfiable),
        (None, None) => return Ok(ByteRange::BadSyntax),
    };

    if start > end || end >= file_size {
        return Ok(ByteRange::Unsatisfiable);
    }
    Ok(ByteRange::Satisfiable { start, end })
}

/// Escape for HTML: characters in `chars` and anything outside printable
/// ASCII become `&#xHHHH;` (eight hex digits above U+FFFF)
fn html_encode(input: &str, chars: &str) -> String {
    let mut encoded = String::with_capacity(input.len());
    for c in input.chars() {
        if c < ' ' || c > '~' || chars.contains(c) {
            let code = c as u32;
            if code > 0xFFFF {
                let _ = write!(encoded, "&#x{:08X};", code);
            } else {
                let _ = write!(encoded, "&#x{:04X};", code);
            }
        } else {
            encoded.push(c);
        }
    }
    encoded
}
