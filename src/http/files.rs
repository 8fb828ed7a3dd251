//! File lookup and streaming shared by the static and prerendered responders.

use std::ffi::OsString;
use std::io;
use std::path::{Component, Path, PathBuf};

use axum::body::Body;
use axum::http::header::{HeaderMap, HeaderValue, ACCEPT_ENCODING};
use tokio::fs::File;
use tokio_util::io::ReaderStream;

/// Normalize a URL path into a relative filesystem path.
///
/// `.` segments are dropped and `..` pops the previous segment without ever
/// climbing above the root, so the result always stays inside whatever
/// directory it is joined to. Returns `None` for segments that could be
/// reinterpreted by the filesystem (backslashes, NUL, drive prefixes).
pub fn sanitize(url_path: &str) -> Option<PathBuf> {
    let mut segments: Vec<&str> = Vec::new();
    for segment in url_path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s if s.contains('\\') || s.contains('\0') || s.contains(':') => return None,
            s => segments.push(s),
        }
    }

    let path: PathBuf = segments.iter().collect();
    debug_assert!(path.components().all(|c| matches!(c, Component::Normal(_))));
    Some(path)
}

/// Append a suffix to the final component (`about` → `about.html`).
pub fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

/// Content type for well-known web asset extensions.
pub fn known_content_type(path: &str) -> Option<&'static str> {
    let ext = path.rsplit_once('.')?.1.to_ascii_lowercase();
    let mime = match ext.as_str() {
        "html" => "text/html",
        "css" => "text/css",
        "js" | "mjs" => "application/javascript",
        "json" => "application/json",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "eot" => "application/vnd.ms-fontobject",
        "webp" => "image/webp",
        "avif" => "image/avif",
        _ => return None,
    };
    Some(mime)
}

/// Table lookup on the URL path, then the file's own type.
pub fn content_type(url_path: &str, file: &Path) -> String {
    match known_content_type(url_path) {
        Some(mime) => mime.to_string(),
        None => mime_guess::from_path(file).first_or_octet_stream().to_string(),
    }
}

/// Precompressed sibling formats, in order of preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Brotli,
    Gzip,
}

impl Encoding {
    const PREFERENCE: [Encoding; 2] = [Encoding::Brotli, Encoding::Gzip];

    pub fn token(self) -> &'static str {
        match self {
            Encoding::Brotli => "br",
            Encoding::Gzip => "gzip",
        }
    }

    fn suffix(self) -> &'static str {
        match self {
            Encoding::Brotli => ".br",
            Encoding::Gzip => ".gz",
        }
    }

    pub fn header_value(self) -> HeaderValue {
        HeaderValue::from_static(self.token())
    }
}

fn accepts(headers: &HeaderMap, encoding: Encoding) -> bool {
    headers
        .get_all(ACCEPT_ENCODING)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|item| {
            let mut params = item.split(';').map(str::trim);
            let name = params.next().unwrap_or_default();
            let rejected = params.any(|p| {
                p.strip_prefix("q=")
                    .and_then(|q| q.parse::<f32>().ok())
                    .is_some_and(|q| q <= 0.0)
            });
            name.eq_ignore_ascii_case(encoding.token()) && !rejected
        })
}

/// An opened file ready to stream.
#[derive(Debug)]
pub struct ServedFile {
    pub file: File,
    pub len: u64,
    /// Set when a precompressed variant is being served.
    pub encoding: Option<Encoding>,
    /// A precompressed sibling exists, whether or not it was chosen.
    pub has_variants: bool,
}

impl ServedFile {
    pub fn into_body(self) -> Body {
        Body::from_stream(ReaderStream::new(self.file))
    }
}

/// Open `path` if it is a regular file, preferring a precompressed
/// sibling the client accepts. `Ok(None)` means nothing to serve.
pub async fn open(path: &Path, request_headers: &HeaderMap) -> io::Result<Option<ServedFile>> {
    if !is_file(path).await? {
        return Ok(None);
    }

    let mut has_variants = false;
    for encoding in Encoding::PREFERENCE {
        let variant = with_suffix(path, encoding.suffix());
        if accepts(request_headers, encoding) {
            if let Some(served) = open_regular(&variant, Some(encoding)).await? {
                return Ok(Some(ServedFile {
                    has_variants: true,
                    ..served
                }));
            }
        } else if !has_variants {
            has_variants = is_file(&variant).await?;
        }
    }

    Ok(open_regular(path, None)
        .await?
        .map(|served| ServedFile { has_variants, ..served }))
}

/// `true` for an existing regular file, `false` when absent or not a file.
pub async fn is_file(path: &Path) -> io::Result<bool> {
    match tokio::fs::metadata(path).await {
        Ok(meta) => Ok(meta.is_file()),
        Err(e) if is_missing(&e) => Ok(false),
        Err(e) => Err(e),
    }
}

async fn open_regular(path: &Path, encoding: Option<Encoding>) -> io::Result<Option<ServedFile>> {
    let file = match File::open(path).await {
        Ok(file) => file,
        Err(e) if is_missing(&e) => return Ok(None),
        Err(e) => return Err(e),
    };
    let meta = file.metadata().await?;
    if !meta.is_file() {
        return Ok(None);
    }
    Ok(Some(ServedFile {
        file,
        len: meta.len(),
        encoding,
        has_variants: false,
    }))
}

fn is_missing(e: &io::Error) -> bool {
    // A path through a regular file (`a.js/x`) reports NotADirectory on unix.
    e.kind() == io::ErrorKind::NotFound || e.raw_os_error() == Some(20)
}
