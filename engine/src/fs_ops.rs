//! Filesystem operations module.
//!
//! This module provides low-level operations for:
//! - Validating the source file and destination folder before a job starts
//! - Creating and sizing the destination file exactly once
//! - Opening independent, pre-positioned handles for each range worker
//! - Copying the source modification time onto the finished copy

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::error::EngineError;

/// Check that `source` is an existing, readable regular file and return its length.
pub fn inspect_source(source: &Path) -> Result<u64, EngineError> {
    let metadata = match fs::metadata(source) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(EngineError::SourceNotFound {
                path: source.to_path_buf(),
            });
        }
        Err(e) => {
            return Err(EngineError::SourceAccessDenied {
                path: source.to_path_buf(),
                source: e,
            });
        }
    };

    if !metadata.is_file() {
        return Err(EngineError::NotAFile {
            path: source.to_path_buf(),
        });
    }

    // Metadata is readable even when the contents are not.
    File::open(source).map_err(|e| EngineError::SourceAccessDenied {
        path: source.to_path_buf(),
        source: e,
    })?;

    Ok(metadata.len())
}

/// Check that `folder` is an existing directory that is not read-only.
pub fn inspect_destination_folder(folder: &Path) -> Result<(), EngineError> {
    let metadata = match fs::metadata(folder) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(EngineError::DestinationNotFound {
                path: folder.to_path_buf(),
            });
        }
        Err(e) => {
            return Err(EngineError::DestinationAccessDenied {
                path: folder.to_path_buf(),
                source: e,
            });
        }
    };

    if !metadata.is_dir() {
        return Err(EngineError::DestinationNotFound {
            path: folder.to_path_buf(),
        });
    }

    if metadata.permissions().readonly() {
        return Err(EngineError::DestinationAccessDenied {
            path: folder.to_path_buf(),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "folder is read-only"),
        });
    }

    Ok(())
}

/// Path of the copy: the destination folder joined with the source file name.
///
/// Refuses a destination that resolves to the source file itself, since
/// sizing it would destroy the data being copied.
pub fn destination_file_path(source: &Path, folder: &Path) -> Result<PathBuf, EngineError> {
    let file_name = source.file_name().ok_or_else(|| EngineError::NotAFile {
        path: source.to_path_buf(),
    })?;
    let destination = folder.join(file_name);

    if let (Ok(src), Ok(dst)) = (fs::canonicalize(source), fs::canonicalize(&destination)) {
        if src == dst {
            return Err(EngineError::DestinationIsSource { path: destination });
        }
    }

    Ok(destination)
}

/// Create (or reset) the destination file and size it to `len` bytes.
///
/// This is the only place the destination is opened in a truncating mode;
/// workers only ever open it for positioned writes.
pub fn presize_destination(destination: &Path, len: u64) -> Result<(), EngineError> {
    let file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(destination)
        .map_err(|e| EngineError::DestinationAccessDenied {
            path: destination.to_path_buf(),
            source: e,
        })?;

    if let Err(e) = file.set_len(len) {
        drop(file);
        let _ = fs::remove_file(destination);
        return Err(EngineError::DestinationAccessDenied {
            path: destination.to_path_buf(),
            source: e,
        });
    }

    Ok(())
}

/// Copy the source modification time onto the destination.
pub fn copy_mtime(source: &Path, destination: &Path) -> io::Result<()> {
    let mtime = fs::metadata(source)?.modified()?;
    filetime::set_file_mtime(destination, filetime::FileTime::from_system_time(mtime))
}

/// Opens the per-worker handles.
///
/// Each call returns a fresh handle already positioned at `offset`, so no
/// cursor is ever shared between workers.
pub(crate) trait RangeIo: Send + Sync + 'static {
    fn open_source(&self, path: &Path, offset: u64) -> io::Result<Box<dyn Read + Send>>;

    /// Must not create or truncate the file.
    fn open_destination(&self, path: &Path, offset: u64) -> io::Result<Box<dyn Write + Send>>;
}

/// [`RangeIo`] backed by plain files.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct FileRangeIo;

impl RangeIo for FileRangeIo {
    fn open_source(&self, path: &Path, offset: u64) -> io::Result<Box<dyn Read + Send>> {
        let mut file = File::open(path)?;
        file.seek(SeekFrom::Start(offset))?;
        Ok(Box::new(file))
    }

    fn open_destination(&self, path: &Path, offset: u64) -> io::Result<Box<dyn Write + Send>> {
        let mut file = OpenOptions::new().write(true).open(path)?;
        file.seek(SeekFrom::Start(offset))?;
        Ok(Box::new(file))
    }
}
