//! Errors that can occur in the io module

use thiserror::Error;

#[derive(Error, Debug)]
#[allow(clippy::upper_case_acronyms)]
/// All the errors that can occur in file io operations
pub enum IOError {
    /// Error when opening an input file.
    #[error("couldn't open {path}: {source}")]
    FileOpen {
        /// The path of the file that could not be opened
        path: String,
        /// The underlying io error
        source: std::io::Error,
    },

    /// Error when staging a working copy of an input file.
    #[error("couldn't copy {from} to {to}: {source}")]
    FileCopy {
        /// The original file path
        from: String,
        /// The destination path of the working copy
        to: String,
        /// The underlying io error
        source: std::io::Error,
    },

    /// A file index outside the open set.
    #[error("file index {file} is out of range for a set of {num_files} files")]
    FileIndex {
        /// The requested file index
        file: usize,
        /// The number of files in the set
        num_files: usize,
    },

    /// Error when reading from a file at a known offset.
    #[error("read failed at byte {offset} of {path}: {source}")]
    FileRead {
        /// The path of the file being read
        path: String,
        /// The byte offset of the failed read
        offset: u64,
        /// The underlying io error
        source: std::io::Error,
    },

    /// Error when writing to a file at a known offset.
    #[error("write failed at byte {offset} of {path}: {source}")]
    FileWrite {
        /// The path of the file being written
        path: String,
        /// The byte offset of the failed write
        offset: u64,
        /// The underlying io error
        source: std::io::Error,
    },

    /// Error when creating an auxiliary output file.
    #[error("couldn't create {path}: {source}")]
    AuxCreate {
        /// The path of the auxiliary file
        path: String,
        /// The underlying io error
        source: std::io::Error,
    },

    /// Error when writing to an auxiliary output stream.
    #[error("write to auxiliary stream {path} failed: {source}")]
    AuxWrite {
        /// The path of the auxiliary file
        path: String,
        /// The underlying io error
        source: std::io::Error,
    },
}
