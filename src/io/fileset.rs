//! A set of SWIN files opened for in-place rewriting.
//!
//! The engine owns every file handle for the lifetime of a run. Callers
//! address bytes by (file index, byte offset); nothing else in the crate
//! opens or closes visibility files.

use std::{
    fs::{File, OpenOptions},
    io::{Cursor, Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
};

use log::debug;

use super::{error::IOError, swin};
use crate::marlu::num_complex::Complex;

/// One member of the set: an opened file and its fixed byte size.
struct SwinFile {
    path: PathBuf,
    handle: File,
    size: u64,
}

/// A group of SWIN visibility files opened for binary random access.
///
/// With a staging directory, each input is first duplicated there and the
/// working copy is opened read/write, leaving the original untouched.
/// Without one, the originals themselves are opened read/write and converted
/// in place.
pub struct SwinFileSet {
    files: Vec<SwinFile>,
}

impl SwinFileSet {
    /// Open all `paths`, staging working copies under `staging_dir` when one
    /// is given. File sizes are captured at open time; the conversion never
    /// grows or shrinks a file.
    ///
    /// # Errors
    ///
    /// Returns [`IOError::FileCopy`] if a working copy cannot be made, or
    /// [`IOError::FileOpen`] if a file cannot be opened read/write. Any
    /// failure abandons the whole set.
    pub fn open(paths: &[PathBuf], staging_dir: Option<&Path>) -> Result<Self, IOError> {
        let mut files = Vec::with_capacity(paths.len());
        for path in paths {
            let working_path = match staging_dir {
                Some(dir) => {
                    let dest = dir.join(path.file_name().unwrap_or(path.as_os_str()));
                    std::fs::copy(path, &dest).map_err(|source| IOError::FileCopy {
                        from: path.display().to_string(),
                        to: dest.display().to_string(),
                        source,
                    })?;
                    dest
                }
                None => path.clone(),
            };
            let handle = OpenOptions::new()
                .read(true)
                .write(true)
                .open(&working_path)
                .map_err(|source| IOError::FileOpen {
                    path: working_path.display().to_string(),
                    source,
                })?;
            let size = handle
                .metadata()
                .map_err(|source| IOError::FileOpen {
                    path: working_path.display().to_string(),
                    source,
                })?
                .len();
            debug!(
                "opened {} ({} bytes{})",
                working_path.display(),
                size,
                if staging_dir.is_some() {
                    ", staged copy"
                } else {
                    ", in place"
                }
            );
            files.push(SwinFile {
                path: working_path,
                handle,
                size,
            });
        }
        Ok(Self { files })
    }

    /// The number of files in the set.
    pub fn num_files(&self) -> usize {
        self.files.len()
    }

    /// Byte size of file `file`, as captured at open time. Like slice
    /// indexing, panics when `file` is not below
    /// [`num_files`](Self::num_files).
    pub fn size(&self, file: usize) -> u64 {
        self.files[file].size
    }

    /// Total byte size across the set, for progress reporting.
    pub fn total_size(&self) -> u64 {
        self.files.iter().map(|f| f.size).sum()
    }

    /// The path of the working file for index `file`. Like slice indexing,
    /// panics when `file` is not below [`num_files`](Self::num_files).
    pub fn path(&self, file: usize) -> &Path {
        &self.files[file].path
    }

    /// The opened file at `file`, or a typed error for an index outside the
    /// set.
    fn checked(&mut self, file: usize) -> Result<&mut SwinFile, IOError> {
        let num_files = self.files.len();
        self.files
            .get_mut(file)
            .ok_or(IOError::FileIndex { file, num_files })
    }

    /// Fill `buf` from `file` starting at byte `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`IOError::FileIndex`] for an index outside the set, and
    /// [`IOError::FileRead`] on seek or read failure; a short read at the
    /// end of a file surfaces as an `UnexpectedEof` source.
    pub fn read_at(&mut self, file: usize, offset: u64, buf: &mut [u8]) -> Result<(), IOError> {
        let f = self.checked(file)?;
        f.handle
            .seek(SeekFrom::Start(offset))
            .and_then(|_| f.handle.read_exact(buf))
            .map_err(|source| IOError::FileRead {
                path: f.path.display().to_string(),
                offset,
                source,
            })
    }

    /// Write `buf` to `file` starting at byte `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`IOError::FileIndex`] for an index outside the set, and
    /// [`IOError::FileWrite`] on seek or write failure.
    pub fn write_at(&mut self, file: usize, offset: u64, buf: &[u8]) -> Result<(), IOError> {
        let f = self.checked(file)?;
        f.handle
            .seek(SeekFrom::Start(offset))
            .and_then(|_| f.handle.write_all(buf))
            .map_err(|source| IOError::FileWrite {
                path: f.path.display().to_string(),
                offset,
                source,
            })
    }

    /// Read a complex spectrum of `num_channels` samples from `file` at
    /// byte `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`IOError::FileIndex`] for an index outside the set, and
    /// [`IOError::FileRead`] on failure.
    pub fn read_spectrum_at(
        &mut self,
        file: usize,
        offset: u64,
        num_channels: usize,
    ) -> Result<Vec<Complex<f32>>, IOError> {
        let mut raw = vec![0_u8; 8 * num_channels];
        self.read_at(file, offset, &mut raw)?;
        swin::read_spectrum(&mut Cursor::new(&raw), num_channels).map_err(|source| {
            IOError::FileRead {
                path: self.files[file].path.display().to_string(),
                offset,
                source,
            }
        })
    }

    /// Write a complex spectrum to `file` at byte `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`IOError::FileIndex`] for an index outside the set, and
    /// [`IOError::FileWrite`] on failure.
    pub fn write_spectrum_at(
        &mut self,
        file: usize,
        offset: u64,
        spectrum: &[Complex<f32>],
    ) -> Result<(), IOError> {
        let mut raw = Vec::with_capacity(8 * spectrum.len());
        for sample in spectrum {
            raw.extend_from_slice(&sample.re.to_le_bytes());
            raw.extend_from_slice(&sample.im.to_le_bytes());
        }
        self.write_at(file, offset, &raw)
    }

    /// Write a single little-endian `f64` to `file` at byte `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`IOError::FileIndex`] for an index outside the set, and
    /// [`IOError::FileWrite`] on failure.
    pub fn write_f64_at(&mut self, file: usize, offset: u64, value: f64) -> Result<(), IOError> {
        self.write_at(file, offset, &value.to_le_bytes())
    }

    /// Flush buffered writes for `file`.
    ///
    /// # Errors
    ///
    /// Returns [`IOError::FileIndex`] for an index outside the set, and
    /// [`IOError::FileWrite`] on failure.
    pub fn flush(&mut self, file: usize) -> Result<(), IOError> {
        let f = self.checked(file)?;
        f.handle.flush().map_err(|source| IOError::FileWrite {
            path: f.path.display().to_string(),
            offset: f.size,
            source,
        })
    }
}
