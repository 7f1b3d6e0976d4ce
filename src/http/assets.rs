//! Static asset sources and the single-page-application fallback.
//!
//! # Responsibilities
//! - Abstract a read-only virtual filesystem ([`AssetSource`])
//! - Serve the requested file, or the default document when the path is
//!   missing or names a directory
//!
//! # Design Decisions
//! - An opened [`Asset`] is released when dropped, so every branch of the
//!   fallback releases it exactly once
//! - Paths are validated before touching the disk (no `..`, no empty
//!   elements)

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, Read};
use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::Request;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use percent_encoding::percent_decode_str;

/// Document served for paths that do not name a file.
pub const DEFAULT_DOCUMENT: &str = "main.html";

/// Metadata of an opened asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssetMetadata {
    pub is_dir: bool,
    pub len: u64,
}

/// An opened entry. Dropping it releases the underlying handle.
pub trait Asset: Send {
    fn metadata(&self) -> io::Result<AssetMetadata>;

    fn read_to_end(&mut self) -> io::Result<Vec<u8>>;
}

/// A read-only virtual filesystem.
///
/// Names are slash-separated and relative; `.` is the root directory.
pub trait AssetSource: Send + Sync + 'static {
    fn open(&self, name: &str) -> io::Result<Box<dyn Asset>>;
}

/// Whether `name` is a clean, relative, slash-separated path.
pub fn valid_name(name: &str) -> bool {
    if name == "." {
        return true;
    }
    !name.is_empty()
        && name
            .split('/')
            .all(|elem| !elem.is_empty() && elem != "." && elem != ".." && !elem.contains('\\'))
}

fn invalid(name: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidInput, format!("invalid asset name {name:?}"))
}

/// Assets held in memory, e.g. embedded with `include_bytes!`.
#[derive(Debug, Clone, Default)]
pub struct MemoryAssets {
    files: BTreeMap<String, Arc<[u8]>>,
}

impl MemoryAssets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file. Parent directories are implied.
    pub fn with_file(mut self, name: &str, contents: impl AsRef<[u8]>) -> Self {
        self.files
            .insert(name.trim_start_matches('/').to_string(), Arc::from(contents.as_ref()));
        self
    }

    fn is_dir(&self, name: &str) -> bool {
        if name == "." {
            return true;
        }
        let prefix = format!("{name}/");
        self.files
            .range(prefix.clone()..)
            .next()
            .is_some_and(|(key, _)| key.starts_with(&prefix))
    }
}

struct MemoryAsset {
    contents: Option<Arc<[u8]>>,
}

impl Asset for MemoryAsset {
    fn metadata(&self) -> io::Result<AssetMetadata> {
        Ok(AssetMetadata {
            is_dir: self.contents.is_none(),
            len: self.contents.as_ref().map_or(0, |c| c.len() as u64),
        })
    }

    fn read_to_end(&mut self) -> io::Result<Vec<u8>> {
        match &self.contents {
            Some(contents) => Ok(contents.to_vec()),
            None => Err(io::Error::other("is a directory")),
        }
    }
}

impl AssetSource for MemoryAssets {
    fn open(&self, name: &str) -> io::Result<Box<dyn Asset>> {
        if !valid_name(name) {
            return Err(invalid(name));
        }
        if let Some(contents) = self.files.get(name) {
            return Ok(Box::new(MemoryAsset {
                contents: Some(contents.clone()),
            }));
        }
        if self.is_dir(name) {
            return Ok(Box::new(MemoryAsset { contents: None }));
        }
        Err(io::Error::new(io::ErrorKind::NotFound, format!("{name} not found")))
    }
}

/// Assets read from a directory on disk.
#[derive(Debug, Clone)]
pub struct DirAssets {
    root: PathBuf,
}

impl DirAssets {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

struct DiskAsset {
    file: File,
}

impl Asset for DiskAsset {
    fn metadata(&self) -> io::Result<AssetMetadata> {
        let meta = self.file.metadata()?;
        Ok(AssetMetadata {
            is_dir: meta.is_dir(),
            len: meta.len(),
        })
    }

    fn read_to_end(&mut self) -> io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.file.read_to_end(&mut buf)?;
        Ok(buf)
    }
}

impl AssetSource for DirAssets {
    fn open(&self, name: &str) -> io::Result<Box<dyn Asset>> {
        if !valid_name(name) {
            return Err(invalid(name));
        }
        let file = File::open(self.root.join(name))?;
        Ok(Box::new(DiskAsset { file }))
    }
}

/// Map a percent-encoded request path to an asset name.
fn asset_name(path: &str) -> Cow<'_, str> {
    match path.trim_start_matches('/') {
        "" => Cow::Borrowed("."),
        name => percent_decode_str(name).decode_utf8_lossy(),
    }
}

fn content_type(name: &str) -> &'static str {
    let ext = name.rsplit_once('.').map(|(_, ext)| ext).unwrap_or_default();
    match ext.to_ascii_lowercase().as_str() {
        "html" | "htm" => "text/html; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "js" | "mjs" => "text/javascript; charset=utf-8",
        "json" | "map" => "application/json",
        "txt" => "text/plain; charset=utf-8",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "ico" => "image/x-icon",
        "wasm" => "application/wasm",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        _ => "application/octet-stream",
    }
}

/// Read an opened asset into a response. Consumes (and releases) it.
fn respond(name: &str, mut asset: Box<dyn Asset>) -> Response {
    match asset.read_to_end() {
        Ok(contents) => (
            [(header::CONTENT_TYPE, HeaderValue::from_static(content_type(name)))],
            Body::from(contents),
        )
            .into_response(),
        Err(e) => {
            tracing::warn!(asset = %name, error = %e, "Failed to read asset");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

fn serve_default(source: &dyn AssetSource) -> Response {
    let asset = match source.open(DEFAULT_DOCUMENT) {
        Ok(asset) => asset,
        Err(e) => {
            tracing::warn!(error = %e, "Default document unavailable");
            return StatusCode::NOT_FOUND.into_response();
        }
    };
    match asset.metadata() {
        Ok(meta) if !meta.is_dir => respond(DEFAULT_DOCUMENT, asset),
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Serve `path` from `source`, falling back to [`DEFAULT_DOCUMENT`].
pub fn serve(source: &dyn AssetSource, path: &str) -> Response {
    let name = asset_name(path);
    let asset = match source.open(&name) {
        Ok(asset) => asset,
        Err(e) => {
            tracing::trace!(path = %path, error = %e, "Asset not found, serving default document");
            return serve_default(source);
        }
    };

    match asset.metadata() {
        Ok(meta) if !meta.is_dir => respond(&name, asset),
        _ => {
            drop(asset);
            serve_default(source)
        }
    }
}

/// Fallback handler for requests that match no binding.
pub async fn fallback(source: Arc<dyn AssetSource>, request: Request) -> Response {
    let path = request.uri().path().to_string();
    match tokio::task::spawn_blocking(move || serve(source.as_ref(), &path)).await {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(error = %e, "Asset task failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
