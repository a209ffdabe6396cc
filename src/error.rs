//! Error types for the crate.

use thiserror::Error;

use crate::io::IOError;

/// All the errors the conversion engine can produce.
#[derive(Error, Debug)]
pub enum SwinpolError {
    /// An error in file io.
    #[error(transparent)]
    IO(#[from] IOError),

    /// Indexing finished without accepting a single record: none of the
    /// input files contain mixed-polarization visibilities in the requested
    /// bands and time window.
    #[error("no valid mixed-polarization data found in {num_files} input file(s)")]
    NoValidData {
        /// How many files were scanned.
        num_files: usize,
    },

    /// Allocation failure while growing the index buffers against files of
    /// unknown size.
    #[error("ran out of memory growing the record index: {0}")]
    ResourceExhausted(#[from] std::collections::TryReserveError),

    /// A session was requested for a band the table does not have.
    #[error("frequency band {band} cannot be found; the band table has {num_bands} entries")]
    BandOutOfRange {
        /// The requested band index.
        band: usize,
        /// The number of bands in the table.
        num_bands: usize,
    },

    /// A conversion matrix does not cover the active band's channels.
    #[error("conversion matrix covers {received} channels but band {band} has {expected}")]
    MatrixChannelMismatch {
        /// The active band index.
        band: usize,
        /// The band's channel count.
        expected: usize,
        /// The matrix's channel count.
        received: usize,
    },

    /// `apply`, `commit` or `zero_weight` was called before `next` staged a
    /// group.
    #[error("no visibility group is staged; call next() first")]
    NoActiveGroup,
}
