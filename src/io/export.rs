//! Auxiliary binary output streams: per-band autocorrelation and
//! circular-visibility files written during indexing, and the optional
//! per-cell diagnostic stream written during matrix application.
//!
//! These streams exist for downstream consumers (fringe fitting, gain
//! solving, plotting); the conversion itself never reads them back.

use std::{
    collections::BTreeMap,
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use byteorder::{LittleEndian, WriteBytesExt};
use log::debug;

use super::error::IOError;
use crate::{freq::FrequencyBand, marlu::num_complex::Complex};

struct SinkFile {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl SinkFile {
    fn create(path: PathBuf) -> Result<Self, IOError> {
        let file = File::create(&path).map_err(|source| IOError::AuxCreate {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Self {
            path,
            writer: BufWriter::new(file),
        })
    }

    fn wrap(&mut self, result: std::io::Result<()>) -> Result<(), IOError> {
        result.map_err(|source| IOError::AuxWrite {
            path: self.path.display().to_string(),
            source,
        })
    }
}

/// One pair of export files per converted band, living in a caller-supplied
/// directory:
///
/// - `autocorrs_if{n}.bin`: repeated `{antenna: i32, pol code: i32 (1 = X
///   hand, 2 = Y hand), band: i32, time: f64 (days from the reference epoch),
///   reserved: f64 = 0.0}`;
/// - `circvis_if{n}.bin`: a header `{channel count: i32, channel frequencies:
///   f64 × N}`, then per pure-circular cell `{time: f64, antenna 1: i32,
///   antenna 2: i32, parallactic angle 1: f64, parallactic angle 2: f64}`
///   followed per channel by the four products in RR, LL, RL, LR order
///   (complex f32 each).
///
/// `n` is the 1-based band number.
pub(crate) struct ExportSinks {
    autocorr: BTreeMap<usize, SinkFile>,
    circvis: BTreeMap<usize, SinkFile>,
}

impl ExportSinks {
    /// Create the stream pair for every requested band, writing each
    /// circular-visibility header immediately.
    pub(crate) fn create(
        dir: &Path,
        requested_bands: &[usize],
        bands: &[FrequencyBand],
    ) -> Result<Self, IOError> {
        std::fs::create_dir_all(dir).map_err(|source| IOError::AuxCreate {
            path: dir.display().to_string(),
            source,
        })?;
        let mut autocorr = BTreeMap::new();
        let mut circvis = BTreeMap::new();
        for &band in requested_bands {
            let ac = SinkFile::create(dir.join(format!("autocorrs_if{}.bin", band + 1)))?;
            let mut cv = SinkFile::create(dir.join(format!("circvis_if{}.bin", band + 1)))?;

            let freqs = &bands[band].channel_freqs;
            let mut header = || -> std::io::Result<()> {
                cv.writer.write_i32::<LittleEndian>(freqs.len() as i32)?;
                for &f in freqs {
                    cv.writer.write_f64::<LittleEndian>(f)?;
                }
                Ok(())
            };
            let result = header();
            cv.wrap(result)?;

            debug!("created export streams for band {} in {}", band, dir.display());
            autocorr.insert(band, ac);
            circvis.insert(band, cv);
        }
        Ok(Self { autocorr, circvis })
    }

    /// Append one autocorrelation entry for `band`.
    pub(crate) fn write_autocorr(
        &mut self,
        band: usize,
        antenna: i32,
        pol_code: i32,
        rel_day: f64,
    ) -> Result<(), IOError> {
        if let Some(sink) = self.autocorr.get_mut(&band) {
            let mut body = || -> std::io::Result<()> {
                sink.writer.write_i32::<LittleEndian>(antenna)?;
                sink.writer.write_i32::<LittleEndian>(pol_code)?;
                sink.writer.write_i32::<LittleEndian>(band as i32)?;
                sink.writer.write_f64::<LittleEndian>(rel_day)?;
                sink.writer.write_f64::<LittleEndian>(0.0)?;
                Ok(())
            };
            let result = body();
            sink.wrap(result)?;
        }
        Ok(())
    }

    /// Append one pure-circular cell for `band`, products in canonical
    /// RR, LL, RL, LR slot order.
    pub(crate) fn write_circvis_cell(
        &mut self,
        band: usize,
        time: f64,
        antennas: [i32; 2],
        angles: [f64; 2],
        products: &[Vec<Complex<f32>>; 4],
    ) -> Result<(), IOError> {
        if let Some(sink) = self.circvis.get_mut(&band) {
            let num_channels = products[0].len();
            let mut body = || -> std::io::Result<()> {
                sink.writer.write_f64::<LittleEndian>(time)?;
                sink.writer.write_i32::<LittleEndian>(antennas[0])?;
                sink.writer.write_i32::<LittleEndian>(antennas[1])?;
                sink.writer.write_f64::<LittleEndian>(angles[0])?;
                sink.writer.write_f64::<LittleEndian>(angles[1])?;
                for k in 0..num_channels {
                    for product in products {
                        sink.writer.write_f32::<LittleEndian>(product[k].re)?;
                        sink.writer.write_f32::<LittleEndian>(product[k].im)?;
                    }
                }
                Ok(())
            };
            let result = body();
            sink.wrap(result)?;
        }
        Ok(())
    }

    /// Flush and close every stream.
    pub(crate) fn finish(mut self) -> Result<(), IOError> {
        for sink in self.autocorr.values_mut().chain(self.circvis.values_mut()) {
            let result = sink.writer.flush();
            sink.wrap(result)?;
        }
        Ok(())
    }
}

/// A diagnostic stream of converted cells, written during
/// [`apply`](crate::ConvertSession::apply) when a sink is supplied.
///
/// Layout per cell: one header `{owning file index: i32, time: f64,
/// antenna 1: i32, antenna 2: i32, angle 1: f64, angle 2: f64, UV distance:
/// f64}`, then per channel the 4 input products, 4 output products and 4
/// matrix entries (complex f32 each). The writer of the stream has already
/// canonicalized order and conjugation, so this type is layout only.
pub struct DiagnosticSink {
    inner: SinkFile,
}

impl DiagnosticSink {
    /// Create a diagnostic stream at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`IOError::AuxCreate`] if the file cannot be created.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self, IOError> {
        Ok(Self {
            inner: SinkFile::create(path.as_ref().to_path_buf())?,
        })
    }

    pub(crate) fn write_cell_header(
        &mut self,
        file_index: i32,
        time: f64,
        antennas: [i32; 2],
        angles: [f64; 2],
        uv_dist: f64,
    ) -> Result<(), IOError> {
        let mut body = || -> std::io::Result<()> {
            self.inner.writer.write_i32::<LittleEndian>(file_index)?;
            self.inner.writer.write_f64::<LittleEndian>(time)?;
            self.inner.writer.write_i32::<LittleEndian>(antennas[0])?;
            self.inner.writer.write_i32::<LittleEndian>(antennas[1])?;
            self.inner.writer.write_f64::<LittleEndian>(angles[0])?;
            self.inner.writer.write_f64::<LittleEndian>(angles[1])?;
            self.inner.writer.write_f64::<LittleEndian>(uv_dist)?;
            Ok(())
        };
        let result = body();
        self.inner.wrap(result)
    }

    pub(crate) fn write_channel(
        &mut self,
        input: [Complex<f32>; 4],
        output: [Complex<f32>; 4],
        matrix: [Complex<f32>; 4],
    ) -> Result<(), IOError> {
        let mut body = || -> std::io::Result<()> {
            for sample in input.iter().chain(output.iter()).chain(matrix.iter()) {
                self.inner.writer.write_f32::<LittleEndian>(sample.re)?;
                self.inner.writer.write_f32::<LittleEndian>(sample.im)?;
            }
            Ok(())
        };
        let result = body();
        self.inner.wrap(result)
    }

    /// Flush the stream.
    ///
    /// # Errors
    ///
    /// Returns [`IOError::AuxWrite`] on failure.
    pub fn finish(mut self) -> Result<(), IOError> {
        let result = self.inner.writer.flush();
        self.inner.wrap(result)
    }
}
