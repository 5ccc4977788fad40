//! # pdfium-fetch
//!
//! Resolve a [PDFium](https://pdfium.googlesource.com/pdfium/) shared library
//! for `pdfium-render`, downloading a version-pinned build on demand.
//!
//! Rendering output depends on the exact PDFium build, so every download is
//! pinned to [`PDFIUM_VERSION`]. Resolution is an explicit, awaited step that
//! returns a [`LibrarySource`]; nothing is cached in process-global state, so
//! callers own the handle and decide when (and whether) to hit the network.
//!
//! Resolution order:
//!
//! 1. `PDFIUM_LIB_PATH` — an existing library file chosen by the operator.
//! 2. The per-version cache directory (see [`cache_dir`]).
//! 3. The system library search path.
//! 4. Download of the release archive from
//!    [bblanchon/pdfium-binaries](https://github.com/bblanchon/pdfium-binaries)
//!    into the cache directory, when [`FetchOptions::allow_download`] is set.
//!
//! ```rust,no_run
//! use pdfium_fetch::{locate_or_fetch, FetchOptions};
//!
//! # async fn run() -> Result<(), pdfium_fetch::FetchError> {
//! let source = locate_or_fetch(&FetchOptions::default(), None).await?;
//! let pdfium = source.bind()?;
//! # drop(pdfium);
//! # Ok(())
//! # }
//! ```

use futures::StreamExt;
use pdfium_render::prelude::Pdfium;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// pdfium-binaries release tag every download is pinned to.
pub const PDFIUM_VERSION: &str = "7690";

const RELEASE_BASE_URL: &str = "https://github.com/bblanchon/pdfium-binaries/releases/download";

/// Environment variable naming an existing library file.
pub const LIB_PATH_ENV: &str = "PDFIUM_LIB_PATH";

/// Environment variable overriding the cache root.
pub const CACHE_DIR_ENV: &str = "PDFIUM_FETCH_CACHE_DIR";

/// Errors raised while locating, downloading or binding PDFium.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("No PDFium build is published for {os}/{arch}")]
    UnsupportedPlatform { os: String, arch: String },

    #[error("Cache directory '{path}' is not usable: {source}")]
    CacheDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Downloading PDFium from '{url}' failed: {reason}")]
    Download { url: String, reason: String },

    #[error("PDFium archive could not be unpacked: {0}")]
    Extract(String),

    #[error(
        "PDFium is not installed and downloading it is disabled.\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium or allow the download."
    )]
    NotFound,

    #[error("Failed to bind PDFium from '{location}': {reason}")]
    Bind { location: String, reason: String },
}

/// Where the PDFium library was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LibrarySource {
    /// Path given through [`LIB_PATH_ENV`].
    EnvOverride(PathBuf),
    /// Previously downloaded copy in the cache directory.
    Cached(PathBuf),
    /// Fetched during this call.
    Downloaded(PathBuf),
    /// Loadable from the platform's default library search path.
    System,
}

impl LibrarySource {
    /// Library file path, or `None` for the system library.
    pub fn path(&self) -> Option<&Path> {
        match self {
            LibrarySource::EnvOverride(p)
            | LibrarySource::Cached(p)
            | LibrarySource::Downloaded(p) => Some(p),
            LibrarySource::System => None,
        }
    }

    /// Bind a fresh [`Pdfium`] instance to this library.
    ///
    /// `Pdfium` is not `Send`; bind inside the thread that renders.
    pub fn bind(&self) -> Result<Pdfium, FetchError> {
        let bindings = match self.path() {
            Some(path) => Pdfium::bind_to_library(path).map_err(|e| FetchError::Bind {
                location: path.display().to_string(),
                reason: e.to_string(),
            })?,
            None => Pdfium::bind_to_system_library().map_err(|e| FetchError::Bind {
                location: "system library path".into(),
                reason: e.to_string(),
            })?,
        };
        Ok(Pdfium::new(bindings))
    }
}

/// Knobs for [`locate_or_fetch`].
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Download the pinned build when nothing local is found. Default: true.
    pub allow_download: bool,
    /// Cache root; defaults to [`cache_dir`]'s platform location.
    pub cache_root: Option<PathBuf>,
    /// Whole-download timeout. Default: 300 s.
    pub timeout: Duration,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            allow_download: true,
            cache_root: None,
            timeout: Duration::from_secs(300),
        }
    }
}

/// Byte-progress observer: `(downloaded, total_if_known)`.
pub type DownloadProgress<'a> = &'a (dyn Fn(u64, Option<u64>) + Send + Sync);

// ── Platform table ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Platform {
    os: &'static str,
    arch: &'static str,
    archive: &'static str,
    member: &'static str,
    file_name: &'static str,
}

const PLATFORMS: &[Platform] = &[
    Platform {
        os: "macos",
        arch: "aarch64",
        archive: "pdfium-mac-arm64.tgz",
        member: "lib/libpdfium.dylib",
        file_name: "libpdfium.dylib",
    },
    Platform {
        os: "macos",
        arch: "x86_64",
        archive: "pdfium-mac-x64.tgz",
        member: "lib/libpdfium.dylib",
        file_name: "libpdfium.dylib",
    },
    Platform {
        os: "linux",
        arch: "x86_64",
        archive: "pdfium-linux-x64.tgz",
        member: "lib/libpdfium.so",
        file_name: "libpdfium.so",
    },
    Platform {
        os: "linux",
        arch: "aarch64",
        archive: "pdfium-linux-arm64.tgz",
        member: "lib/libpdfium.so",
        file_name: "libpdfium.so",
    },
    Platform {
        os: "windows",
        arch: "x86_64",
        archive: "pdfium-win-x64.tgz",
        member: "bin/pdfium.dll",
        file_name: "pdfium.dll",
    },
    Platform {
        os: "windows",
        arch: "aarch64",
        archive: "pdfium-win-arm64.tgz",
        member: "bin/pdfium.dll",
        file_name: "pdfium.dll",
    },
    Platform {
        os: "windows",
        arch: "x86",
        archive: "pdfium-win-x86.tgz",
        member: "bin/pdfium.dll",
        file_name: "pdfium.dll",
    },
];

fn platform_for(os: &str, arch: &str) -> Result<Platform, FetchError> {
    PLATFORMS
        .iter()
        .copied()
        .find(|p| p.os == os && p.arch == arch)
        .ok_or_else(|| FetchError::UnsupportedPlatform {
            os: os.to_string(),
            arch: arch.to_string(),
        })
}

fn current_platform() -> Result<Platform, FetchError> {
    platform_for(std::env::consts::OS, std::env::consts::ARCH)
}

// ── Cache location ───────────────────────────────────────────────────────────

/// Per-version cache directory under `root`, or under the platform cache
/// directory (`~/.cache/edgequake-ocr/pdfium-{VERSION}` on Linux) when `root`
/// is `None`. [`CACHE_DIR_ENV`] overrides the platform default.
pub fn cache_dir(root: Option<&Path>) -> PathBuf {
    let leaf = format!("pdfium-{PDFIUM_VERSION}");
    if let Some(root) = root {
        return root.join(leaf);
    }
    if let Ok(dir) = std::env::var(CACHE_DIR_ENV) {
        if !dir.is_empty() {
            return PathBuf::from(dir).join(leaf);
        }
    }
    dirs::cache_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".cache")))
        .unwrap_or_else(std::env::temp_dir)
        .join("edgequake-ocr")
        .join(leaf)
}

// ── Resolution ───────────────────────────────────────────────────────────────

/// Find a usable PDFium library, downloading the pinned build if allowed.
pub async fn locate_or_fetch(
    options: &FetchOptions,
    on_progress: Option<DownloadProgress<'_>>,
) -> Result<LibrarySource, FetchError> {
    if let Ok(p) = std::env::var(LIB_PATH_ENV) {
        let path = PathBuf::from(p);
        if path.is_file() {
            debug!(path = %path.display(), "Using PDFium from {LIB_PATH_ENV}");
            return Ok(LibrarySource::EnvOverride(path));
        }
        warn!(path = %path.display(), "{LIB_PATH_ENV} does not point to a file; ignoring");
    }

    let platform = current_platform()?;
    let dir = cache_dir(options.cache_root.as_deref());
    let lib_path = dir.join(platform.file_name);
    if lib_path.is_file() {
        debug!(path = %lib_path.display(), "Using cached PDFium");
        return Ok(LibrarySource::Cached(lib_path));
    }

    if Pdfium::bind_to_system_library().is_ok() {
        debug!("Using system PDFium");
        return Ok(LibrarySource::System);
    }

    if !options.allow_download {
        return Err(FetchError::NotFound);
    }

    let url = format!(
        "{RELEASE_BASE_URL}/chromium%2F{PDFIUM_VERSION}/{}",
        platform.archive
    );
    info!(%url, "Downloading PDFium {PDFIUM_VERSION}");

    tokio::fs::create_dir_all(&dir)
        .await
        .map_err(|source| FetchError::CacheDir {
            path: dir.clone(),
            source,
        })?;

    let archive = download(&url, options.timeout, on_progress).await?;

    let member = platform.member;
    let dest = lib_path.clone();
    tokio::task::spawn_blocking(move || unpack_member(&archive, member, &dest))
        .await
        .map_err(|e| FetchError::Extract(format!("unpack task panicked: {e}")))??;

    info!(path = %lib_path.display(), "PDFium cached");
    Ok(LibrarySource::Downloaded(lib_path))
}

async fn download(
    url: &str,
    timeout: Duration,
    on_progress: Option<DownloadProgress<'_>>,
) -> Result<Vec<u8>, FetchError> {
    let fail = |reason: String| FetchError::Download {
        url: url.to_string(),
        reason,
    };

    let client = reqwest::Client::builder()
        .user_agent(concat!("pdfium-fetch/", env!("CARGO_PKG_VERSION")))
        .timeout(timeout)
        .build()
        .map_err(|e| fail(e.to_string()))?;

    let response = client.get(url).send().await.map_err(|e| fail(e.to_string()))?;
    if !response.status().is_success() {
        return Err(fail(format!("HTTP {}", response.status())));
    }

    let total = response.content_length();
    let mut buf = Vec::with_capacity(total.unwrap_or(32 * 1024 * 1024) as usize);
    let mut body = response.bytes_stream();
    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|e| fail(e.to_string()))?;
        buf.extend_from_slice(&chunk);
        if let Some(cb) = on_progress {
            cb(buf.len() as u64, total);
        }
    }
    Ok(buf)
}

/// Copy one member of a `.tgz` archive to `dest`, via a sibling temp file so
/// a crash never leaves a truncated library in the cache.
fn unpack_member(archive: &[u8], member: &str, dest: &Path) -> Result<(), FetchError> {
    use flate2::read::GzDecoder;
    use tar::Archive;

    let extract = |e: std::io::Error| FetchError::Extract(e.to_string());
    let mut tarball = Archive::new(GzDecoder::new(archive));

    for entry in tarball.entries().map_err(extract)? {
        let mut entry = entry.map_err(extract)?;
        if entry.path().map_err(extract)?.to_string_lossy() != member {
            continue;
        }
        let partial = dest.with_extension("partial");
        entry.unpack(&partial).map_err(extract)?;
        std::fs::rename(&partial, dest).map_err(extract)?;
        return Ok(());
    }

    Err(FetchError::Extract(format!("'{member}' not found in archive")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;

    fn tgz_with(member: &str, contents: &[u8]) -> Vec<u8> {
        let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::fast()));
        let mut header = tar::Header::new_gnu();
        header.set_size(contents.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, member, contents).unwrap();
        builder.into_inner().unwrap().finish().unwrap()
    }

    #[test]
    fn known_platforms_resolve() {
        let p = platform_for("linux", "x86_64").unwrap();
        assert_eq!(p.file_name, "libpdfium.so");
        assert_eq!(platform_for("windows", "x86").unwrap().member, "bin/pdfium.dll");
    }

    #[test]
    fn unknown_platform_is_rejected() {
        let err = platform_for("plan9", "mips").unwrap_err();
        assert!(err.to_string().contains("plan9/mips"));
    }

    #[test]
    fn cache_dir_is_versioned_under_root() {
        let d = cache_dir(Some(Path::new("/tmp/ocr-cache")));
        assert_eq!(d, PathBuf::from(format!("/tmp/ocr-cache/pdfium-{PDFIUM_VERSION}")));
    }

    #[test]
    fn unpack_member_writes_only_requested_file() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("libpdfium.so");
        let archive = tgz_with("lib/libpdfium.so", b"\x7fELF-fake");

        unpack_member(&archive, "lib/libpdfium.so", &dest).unwrap();

        assert_eq!(std::fs::read(&dest).unwrap(), b"\x7fELF-fake");
        assert!(!dest.with_extension("partial").exists());
    }

    #[test]
    fn unpack_member_reports_missing_entry() {
        let dir = tempfile::tempdir().unwrap();
        let archive = tgz_with("include/fpdfview.h", b"/* header */");
        let err = unpack_member(&archive, "lib/libpdfium.so", &dir.path().join("x")).unwrap_err();
        assert!(matches!(err, FetchError::Extract(ref m) if m.contains("not found")));
    }

    #[tokio::test]
    async fn cached_library_short_circuits_network() {
        if std::env::var(LIB_PATH_ENV).is_ok() {
            return;
        }
        let Ok(platform) = current_platform() else {
            return;
        };
        let root = tempfile::tempdir().unwrap();
        let dir = cache_dir(Some(root.path()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(platform.file_name), b"stub").unwrap();

        let options = FetchOptions {
            allow_download: false,
            cache_root: Some(root.path().to_path_buf()),
            ..FetchOptions::default()
        };
        let source = locate_or_fetch(&options, None).await.unwrap();
        assert_eq!(source, LibrarySource::Cached(dir.join(platform.file_name)));
    }
}
