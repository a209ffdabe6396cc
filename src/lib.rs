#![warn(missing_docs)]
#![warn(clippy::missing_safety_doc)]
#![warn(clippy::missing_errors_doc)]

//! swinpol converts mixed-polarization visibilities in DiFX SWIN output
//! to the circular basis, editing the correlator files in place.
//!
//! VLBI arrays mixing linear-feed stations with circular-feed stations
//! correlate to products like X⊗R or X⊗Y. swinpol scans the `DIFX_*`
//! binary files of a correlation job, groups the products of every
//! (baseline, timestamp, band) cell, applies caller-supplied per-channel
//! 2x2 conversion matrices to the linear ends, and writes the converted
//! spectra back over the original payload bytes, rewriting the
//! polarization labels to R/L. Baselines between two linear-feed antennas
//! (autocorrelations included) are visited once per antenna, composing
//! the full transform over two passes.
//!
//! The crate performs no calibration itself: conversion matrices come
//! from an external solver, and sky geometry enters through the
//! [`SourceGeometry`] trait.
//!
//! # Examples
//!
//! Convert every band of a correlation job with identity matrices (a pure
//! relabeling plus parallactic-angle rotation):
//!
//! ```rust,no_run
//! use std::path::PathBuf;
//!
//! use swinpol::{
//!     ConversionMatrix, ConvertOptionsBuilder, FrequencyBand, LinearAntenna, SourceGeometry,
//!     SwinConverter, ANGLE_NONE,
//! };
//!
//! // no geometry on hand: records keep their angles unset and no
//! // parallactic rotation is applied
//! struct NoAngles;
//! impl SourceGeometry for NoAngles {
//!     fn parallactic_angles(
//!         &self,
//!         _source: usize,
//!         _antenna1: i32,
//!         _antenna2: i32,
//!         _uvw: [f64; 3],
//!         _time: f64,
//!     ) -> [f64; 2] {
//!         [ANGLE_NONE; 2]
//!     }
//! }
//!
//! # fn main() -> Result<(), swinpol::SwinpolError> {
//! let paths = vec![PathBuf::from("DIFX_59000_000000.s0000.b0000")];
//! let bands = vec![FrequencyBand::from_grid(86.268e9, 58.0e6, 1920, 1)];
//! let options = ConvertOptionsBuilder::default()
//!     .linear_antennas(vec![LinearAntenna {
//!         id: 1,
//!         averaging_window: 0,
//!     }])
//!     .band_idxs(vec![0])
//!     .ref_mjd(59000.0)
//!     .build()
//!     .unwrap();
//!
//! let mut converter = SwinConverter::open(&paths, bands, options, &NoAngles)?;
//! for band in 0..converter.bands().len() {
//!     let matrix = ConversionMatrix::identity(converter.bands()[band].num_channels());
//!     let mut session = converter.band_session(band)?;
//!     while let Some(cell) = session.next_cell()? {
//!         if cell.convertible {
//!             session.apply(&matrix, None)?;
//!             session.commit()?;
//!         } else {
//!             session.zero_weight()?;
//!         }
//!     }
//! }
//! converter.finish()?;
//! # Ok(())
//! # }
//! ```

mod apply;
pub mod autocorr;
pub mod dataset;
pub mod error;
pub mod freq;
pub mod geom;
mod index;
pub mod io;
mod matcher;
mod median;
pub mod options;
pub mod records;

#[cfg(test)]
pub(crate) mod test_common;

pub use apply::ConversionMatrix;
pub use autocorr::NormalizationTable;
pub use dataset::SwinConverter;
pub use error::SwinpolError;
pub use freq::FrequencyBand;
pub use geom::{SourceGeometry, ANGLE_NONE, ANGLE_VALID_MIN};
pub use io::{DiagnosticSink, IOError, SwinFileSet};
pub use matcher::{CellInfo, ConvertSession};
pub use options::{ConvertOptions, ConvertOptionsBuilder, LinearAntenna};
pub use records::{AutoPol, AutocorrSample, Record, RecordId};

pub use marlu;
