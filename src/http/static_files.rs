//! Sandboxed static file lookup.
//!
//! Every file is opened with `openat(2)` against a directory handle taken
//! once at startup. The process working directory is never consulted, so a
//! path that somehow slipped past normalization still resolves below the
//! served root's handle.

use crate::{
    http::{response::ResponseDescriptor, types::log_str},
    StatusCode,
};
use memchr::memrchr;
use std::{
    ffi::CString,
    fs::{File, OpenOptions},
    io,
    os::{
        fd::{AsRawFd, FromRawFd, OwnedFd},
        unix::fs::OpenOptionsExt,
    },
    path::Path,
};

/// Fixed body sent when the path names a directory or another non-regular file.
pub(crate) const FORBIDDEN_FILE_ROUTE: &[u8] = b"Forbidden file route";

/// Relative path served for the bare root.
const INDEX_FILE: &[u8] = b"index.html";

/// Read-only handle to the directory files are served from.
///
/// Shared between all connections; nothing in it is ever mutated.
///
/// # Examples
/// ```no_run
/// use rooted_web::StaticRoot;
///
/// let root = StaticRoot::open("public").expect("served directory");
/// ```
#[derive(Debug)]
pub struct StaticRoot {
    dir: OwnedFd,
}

impl StaticRoot {
    /// Opens `path` as the served root. Fails if it is not a directory.
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let dir = OpenOptions::new()
            .read(true)
            .custom_flags(libc::O_DIRECTORY | libc::O_CLOEXEC)
            .open(path)?;

        Ok(Self { dir: dir.into() })
    }

    /// Opens `relative` read-only below the root handle.
    pub(crate) fn open_relative(&self, relative: &[u8]) -> io::Result<File> {
        // openat ignores the directory handle for absolute paths.
        if relative.first() == Some(&b'/') {
            return Err(io::Error::from(io::ErrorKind::NotFound));
        }
        let c_path =
            CString::new(relative).map_err(|_| io::Error::from(io::ErrorKind::NotFound))?;

        // Runs inline on the executor. With `O_NONBLOCK` opening a FIFO or a
        // device node returns at once instead of waiting for a peer.
        //
        // SAFETY: `c_path` is NUL-terminated and outlives the call; the
        // directory descriptor is owned by `self`.
        let fd = unsafe {
            libc::openat(
                self.dir.as_raw_fd(),
                c_path.as_ptr(),
                libc::O_RDONLY | libc::O_CLOEXEC | libc::O_NONBLOCK,
            )
        };
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }

        // SAFETY: `fd` was just returned by a successful `openat` and is not
        // owned by anything else.
        Ok(unsafe { File::from_raw_fd(fd) })
    }
}

/// Resolves a normalized path to a file-backed response.
///
/// The bare root serves `index.html`. Open failures become `404`
/// (missing, or a file used as a directory), `403` (permission) or `500`.
/// Directories and other non-regular files get `403` with a fixed body.
pub fn serve(root: &StaticRoot, normalized_path: &[u8]) -> ResponseDescriptor {
    let relative = match normalized_path.strip_prefix(b"/").unwrap_or(normalized_path) {
        b"" => INDEX_FILE,
        rest => rest,
    };

    let file = match root.open_relative(relative) {
        Ok(file) => file,
        Err(e) => {
            let status = open_error_status(&e);
            tracing::debug!(path = log_str(relative), error = %e, status = status.as_u16(), "static open failed");
            return ResponseDescriptor::empty(status);
        }
    };

    // fstat on an open descriptor, answered from the inode.
    let metadata = match file.metadata() {
        Ok(metadata) => metadata,
        Err(e) => {
            tracing::warn!(path = log_str(relative), error = %e, "static stat failed");
            return ResponseDescriptor::internal_error();
        }
    };

    if !metadata.is_file() {
        return ResponseDescriptor::text(StatusCode::Forbidden, FORBIDDEN_FILE_ROUTE);
    }

    ResponseDescriptor::file(file, metadata.len(), content_type(relative))
}

#[inline]
fn open_error_status(err: &io::Error) -> StatusCode {
    match err.raw_os_error() {
        Some(libc::ENOENT | libc::ENOTDIR) => StatusCode::NotFound,
        Some(libc::EACCES | libc::EPERM) => StatusCode::Forbidden,
        None if err.kind() == io::ErrorKind::NotFound => StatusCode::NotFound,
        _ => StatusCode::InternalServerError,
    }
}

/// Content type derived from the extension of the final path segment.
///
/// Matching is case-sensitive. Paths without an extension and paths with an
/// unknown one both fall back to `application/octet-stream`.
pub fn content_type(path: &[u8]) -> &'static str {
    let segment = match memrchr(b'/', path) {
        Some(i) => &path[i + 1..],
        None => path,
    };
    let extension = match memrchr(b'.', segment) {
        Some(i) => &segment[i + 1..],
        None => return "application/octet-stream",
    };

    match extension {
        b"html" => "text/html",
        b"css" => "text/css",
        b"js" => "application/javascript",
        b"png" => "image/png",
        _ => "application/octet-stream",
    }
}
