//! The conversion engine: owns the file set, the record table and the
//! normalization curves, and hands out per-band sessions.

use std::path::PathBuf;

use log::{debug, trace};

use crate::{
    autocorr::NormalizationTable,
    error::SwinpolError,
    freq::FrequencyBand,
    geom::SourceGeometry,
    index::index_files,
    io::fileset::SwinFileSet,
    matcher::ConvertSession,
    options::ConvertOptions,
    records::Record,
};

/// An opened set of SWIN files with every convertible record indexed and
/// the autocorrelation normalization curves built.
///
/// Construction scans the files once; conversion then happens band by band
/// through [`band_session`](Self::band_session), with the caller supplying
/// a matrix per cell.
pub struct SwinConverter {
    pub(crate) fileset: SwinFileSet,
    pub(crate) bands: Vec<FrequencyBand>,
    pub(crate) options: ConvertOptions,
    pub(crate) records: Vec<Record>,
    norm: NormalizationTable,
}

impl SwinConverter {
    /// Open `paths`, index every record inside the configured time window
    /// and requested bands, and build the normalization curves.
    ///
    /// `bands` must list the correlator's full frequency table in file
    /// order. `geometry` supplies parallactic angles for the indexed
    /// records. With a staging directory in the options, working copies
    /// are converted and the originals stay untouched.
    ///
    /// # Errors
    ///
    /// Fails when a file cannot be opened or staged, a requested band is
    /// out of range, or no convertible record exists in any file.
    pub fn open(
        paths: &[PathBuf],
        bands: Vec<FrequencyBand>,
        options: ConvertOptions,
        geometry: &dyn SourceGeometry,
    ) -> Result<Self, SwinpolError> {
        trace!("start SwinConverter::open");
        debug!("{options}");
        let mut fileset = SwinFileSet::open(paths, options.staging_dir.as_deref())?;
        let outcome = index_files(&mut fileset, &bands, &options, geometry)?;
        let norm = NormalizationTable::from_samples(&outcome.autocorrs, &options, &bands);
        trace!("end SwinConverter::open");
        Ok(Self {
            fileset,
            bands,
            options,
            records: outcome.records,
            norm,
        })
    }

    /// Start a conversion session over one band.
    ///
    /// Sessions borrow the engine mutably: run them one at a time, in any
    /// band order. Records claimed by earlier sessions stay claimed; the
    /// per-pass bookkeeping resets with each new session.
    ///
    /// # Errors
    ///
    /// [`SwinpolError::BandOutOfRange`] when `band` is not in the table.
    pub fn band_session(&mut self, band: usize) -> Result<ConvertSession<'_>, SwinpolError> {
        if band >= self.bands.len() {
            return Err(SwinpolError::BandOutOfRange {
                band,
                num_bands: self.bands.len(),
            });
        }
        debug!(
            "starting session for band {band} ({} channels)",
            self.bands[band].num_channels()
        );
        Ok(ConvertSession::new(self, band))
    }

    /// Every record accepted by the indexing pass, in file order.
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// The frequency table the converter was opened with.
    pub fn bands(&self) -> &[FrequencyBand] {
        &self.bands
    }

    /// The options the converter was opened with.
    pub fn options(&self) -> &ConvertOptions {
        &self.options
    }

    /// Autocorrelation normalization curves, one per configured linear
    /// antenna and band.
    pub fn normalization(&self) -> &NormalizationTable {
        &self.norm
    }

    /// Number of files in the set.
    pub fn num_files(&self) -> usize {
        self.fileset.num_files()
    }

    /// Flush every file and release the set.
    ///
    /// Dropping the converter closes the files too; this variant surfaces
    /// flush errors instead of discarding them.
    pub fn finish(mut self) -> Result<(), SwinpolError> {
        for file in 0..self.fileset.num_files() {
            self.fileset.flush(file)?;
        }
        Ok(())
    }
}
