//! The indexing pass over a SWIN file set.
//!
//! Indexing walks every record span sequentially, accepts the ones inside a
//! requested band and the configured time window, precomputes their
//! parallactic angles and rewrites accepted polarization labels to the
//! circular convention on disk. Payloads are untouched here; conversion
//! happens later, cell by cell, through a session.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use log::{debug, info, trace, warn};

use crate::{
    error::SwinpolError,
    freq::FrequencyBand,
    geom::SourceGeometry,
    io::{
        export::ExportSinks,
        swin::{self, SwinRecordHeader},
        IOError, SwinFileSet,
    },
    marlu::num_complex::Complex,
    options::ConvertOptions,
    records::{circular_label, is_first_hand, normalize_linear, AutoPol, AutocorrSample, Record},
};

/// Everything the indexing pass hands back to the engine.
#[derive(Debug)]
pub(crate) struct IndexOutcome {
    pub(crate) records: Vec<Record>,
    pub(crate) autocorrs: Vec<AutocorrSample>,
}

struct Indexer<'a> {
    fileset: &'a mut SwinFileSet,
    bands: &'a [FrequencyBand],
    options: &'a ConvertOptions,
    geometry: &'a dyn SourceGeometry,
    sinks: Option<ExportSinks>,
    records: Vec<Record>,
    autocorrs: Vec<AutocorrSample>,
}

/// Scan `fileset` and build the record table for one conversion run.
///
/// # Errors
///
/// Returns [`SwinpolError::BandOutOfRange`] when a requested band is not in
/// `bands`, [`SwinpolError::NoValidData`] when no file contained a usable
/// record, and propagates I/O and allocation failures.
pub(crate) fn index_files(
    fileset: &mut SwinFileSet,
    bands: &[FrequencyBand],
    options: &ConvertOptions,
    geometry: &dyn SourceGeometry,
) -> Result<IndexOutcome, SwinpolError> {
    trace!("start index_files");

    for &band in &options.band_idxs {
        if band >= bands.len() {
            return Err(SwinpolError::BandOutOfRange {
                band,
                num_bands: bands.len(),
            });
        }
    }

    let sinks = match &options.export_dir {
        Some(dir) => Some(ExportSinks::create(dir, &options.band_idxs, bands)?),
        None => None,
    };

    let num_files = fileset.num_files();
    let draw_target = if options.draw_progress {
        ProgressDrawTarget::stderr()
    } else {
        ProgressDrawTarget::hidden()
    };
    let scan_progress = ProgressBar::with_draw_target(Some(fileset.total_size()), draw_target);
    scan_progress.set_style(
        ProgressStyle::default_bar()
            .template(
                "{msg:16}: [{elapsed_precise}] [{wide_bar:.cyan/blue}] {percent:3}% ({eta:5})",
            )
            .unwrap()
            .progress_chars("=> "),
    );
    scan_progress.set_message("indexing");

    let mut indexer = Indexer {
        fileset,
        bands,
        options,
        geometry,
        sinks,
        records: vec![],
        autocorrs: vec![],
    };

    let mut progress_base = 0_u64;
    for file in 0..num_files {
        debug!(
            "scanning file {} of {} ({} MB)",
            file + 1,
            num_files,
            indexer.fileset.size(file) / (1024 * 1024)
        );
        indexer.scan_file(file, &scan_progress, progress_base)?;
        progress_base += indexer.fileset.size(file);
    }
    scan_progress.finish();

    if let Some(sinks) = indexer.sinks.take() {
        sinks.finish()?;
    }

    if indexer.records.is_empty() {
        return Err(SwinpolError::NoValidData { num_files });
    }

    info!(
        "indexed {} mixed-polarization records and {} autocorrelation spectra from {} files",
        indexer.records.len(),
        indexer.autocorrs.len(),
        num_files
    );

    trace!("end index_files");
    Ok(IndexOutcome {
        records: indexer.records,
        autocorrs: indexer.autocorrs,
    })
}

impl Indexer<'_> {
    /// Walk every record span in `file`, accepting the ones in a requested
    /// band and inside the time window.
    fn scan_file(
        &mut self,
        file: usize,
        progress: &ProgressBar,
        progress_base: u64,
    ) -> Result<(), SwinpolError> {
        let size = self.fileset.size(file);
        let mut loc = swin::FIRST_HEADER_OFFSET;

        while loc + swin::HEADER_BODY_LEN <= size {
            let mut raw = [0_u8; swin::HEADER_BODY_LEN as usize];
            self.fileset.read_at(file, loc, &mut raw)?;
            // the buffer is sized exactly, so the parse cannot fail
            let header =
                SwinRecordHeader::read_from(&mut raw.as_slice()).map_err(|source| {
                    IOError::FileRead {
                        path: self.fileset.path(file).display().to_string(),
                        offset: loc,
                        source,
                    }
                })?;
            let payload_begin = loc + swin::HEADER_BODY_LEN;

            let mut band = None;
            for &requested in &self.options.band_idxs {
                if header.freq_index == requested as i32
                    || header.freq_index == requested as i32 + self.options.band_offset
                {
                    band = Some(requested);
                    break;
                }
            }

            // The payload length of a non-matching record still comes from
            // the band table; without a valid index the rest of the file
            // cannot be walked.
            let num_channels = match band {
                Some(band) => self.bands[band].num_channels(),
                None => match usize::try_from(header.freq_index)
                    .ok()
                    .and_then(|idx| self.bands.get(idx))
                {
                    Some(band_def) => band_def.num_channels(),
                    None => {
                        warn!(
                            "unknown frequency index {} at offset {} of {}, stopping this file",
                            header.freq_index,
                            loc,
                            self.fileset.path(file).display()
                        );
                        break;
                    }
                },
            };

            let payload_end = payload_begin + 8 * num_channels as u64;
            if payload_end > size {
                debug!(
                    "record at offset {} of {} is truncated",
                    loc,
                    self.fileset.path(file).display()
                );
                break;
            }

            if let Some(band) = band {
                let rel_day =
                    f64::from(header.mjd) + header.seconds / 86400.0 - self.options.ref_mjd;
                if rel_day >= self.options.time_range[0] && rel_day <= self.options.time_range[1]
                {
                    self.accept(file, &header, band, rel_day, payload_begin, payload_end)?;
                }
            }

            loc = payload_end + swin::FIRST_HEADER_OFFSET;
            progress.set_position(progress_base + loc.min(size));
        }
        Ok(())
    }

    /// Take in one in-window record: collect autocorrelation spectra, mirror
    /// the export streams, and append a [`Record`] when a linear-feed antenna
    /// is on the baseline.
    fn accept(
        &mut self,
        file: usize,
        header: &SwinRecordHeader,
        band: usize,
        rel_day: f64,
        payload_begin: u64,
        payload_end: u64,
    ) -> Result<(), SwinpolError> {
        let antennas = header.antennas();
        let linear = [
            self.options.is_linear(antennas[0]),
            self.options.is_linear(antennas[1]),
        ];
        let mut pol_pair = header.pol_pair;
        for (label, is_lin) in pol_pair.iter_mut().zip(linear) {
            if is_lin {
                *label = normalize_linear(*label);
            }
        }

        let time = (rel_day + self.options.ref_mjd) * 86400.0;
        let angles = self.geometry.parallactic_angles(
            header.source_index.max(0) as usize,
            antennas[0],
            antennas[1],
            header.uvw,
            time,
        );

        if antennas[0] == antennas[1] {
            let hand = if pol_pair.iter().all(|&label| is_first_hand(label)) {
                Some(AutoPol::X)
            } else if pol_pair.iter().all(|&label| matches!(label, b'L' | b'Y')) {
                Some(AutoPol::Y)
            } else {
                None
            };
            if let Some(pol) = hand {
                let num_channels = ((payload_end - payload_begin) / 8) as usize;
                let vis = self
                    .fileset
                    .read_spectrum_at(file, payload_begin, num_channels)?;
                // band-edge channels stay at zero
                let mut spectrum = vec![0.0_f64; num_channels];
                for channel in 1..num_channels.saturating_sub(1) {
                    spectrum[channel] = f64::from(vis[channel].norm());
                }
                self.autocorrs.try_reserve(1)?;
                self.autocorrs.push(AutocorrSample {
                    antenna: antennas[0],
                    band,
                    pol,
                    rel_day,
                    spectrum,
                });
                if let Some(sinks) = self.sinks.as_mut() {
                    sinks.write_autocorr(band, antennas[0], pol.code(), rel_day)?;
                }
            }
        }

        let export_wanted = match self.options.export_source {
            Some(source) => header.source_index == source,
            None => true,
        };
        if export_wanted
            && self.sinks.is_some()
            && !linear[0]
            && !linear[1]
            && pol_pair.iter().all(|&label| is_first_hand(label))
        {
            self.export_circular(file, header, band, time, angles, payload_begin)?;
        }

        if linear[0] || linear[1] {
            self.records.try_reserve(1)?;
            self.records.push(Record {
                baseline: header.baseline,
                source: header.source_index,
                file,
                time,
                antennas,
                byte_begin: payload_begin,
                byte_end: payload_end,
                pol_pair,
                band,
                linear,
                angles,
                uv_dist: header.uvw[0] * header.uvw[0] + header.uvw[1] * header.uvw[1],
                consumed: false,
            });

            if !self.options.test_mode {
                let rewritten = [circular_label(pol_pair[0]), circular_label(pol_pair[1])];
                self.fileset.write_at(
                    file,
                    payload_begin - swin::PAYLOAD_TO_POLPAIR,
                    &rewritten,
                )?;
            }
        }

        Ok(())
    }

    /// Mirror one pure-circular cell into the per-band export stream.
    /// `header` is the first product of the cell; with standard product
    /// ordering the other three sit at fixed strides behind it.
    fn export_circular(
        &mut self,
        file: usize,
        header: &SwinRecordHeader,
        band: usize,
        time: f64,
        angles: [f64; 2],
        payload_begin: u64,
    ) -> Result<(), SwinpolError> {
        let num_channels = self.bands[band].num_channels();
        let stride = swin::RECORD_OVERHEAD + 8 * num_channels as u64;
        let group_end = payload_begin + 4 * stride - swin::RECORD_OVERHEAD;
        if group_end > self.fileset.size(file) {
            debug!(
                "incomplete product group at offset {} of {}, not exported",
                payload_begin,
                self.fileset.path(file).display()
            );
            return Ok(());
        }

        let mut products: [Vec<Complex<f32>>; 4] = Default::default();
        for (slot, product) in products.iter_mut().enumerate() {
            *product = self.fileset.read_spectrum_at(
                file,
                payload_begin + stride * slot as u64,
                num_channels,
            )?;
        }
        if let Some(sinks) = self.sinks.as_mut() {
            sinks.write_circvis_cell(band, time, header.antennas(), angles, &products)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use tempfile::tempdir;

    use super::*;
    use crate::test_common::{
        flat_spectrum, test_band, test_header, test_options, write_swin_file, FixedAngles,
        TEST_MJD, TEST_NCHAN,
    };

    #[test]
    fn test_index_accepts_linear_baselines() {
        let tmp_dir = tempdir().unwrap();
        let path = tmp_dir.path().join("DIFX_TEST.s0000.b0000");

        let bands = [test_band(TEST_NCHAN), test_band(TEST_NCHAN)];
        let payload = flat_spectrum(Complex::new(1.0, 0.0), TEST_NCHAN);
        write_swin_file(
            &path,
            &[
                // linear antenna 1 on the baseline
                (test_header([1, 2], 30.0, 0, *b"XR"), payload.clone()),
                // band 1 is not requested
                (test_header([1, 2], 30.0, 1, *b"XR"), payload.clone()),
                // no linear antenna
                (test_header([2, 3], 30.0, 0, *b"RR"), payload.clone()),
            ],
        );

        let mut fileset = SwinFileSet::open(&[path], None).unwrap();
        let options = test_options(&[1]);
        let outcome =
            index_files(&mut fileset, &bands, &options, &FixedAngles([0.1, 0.2])).unwrap();

        assert_eq!(outcome.records.len(), 1);
        let record = &outcome.records[0];
        assert_eq!(record.baseline, 258);
        assert_eq!(record.antennas, [1, 2]);
        assert_eq!(record.band, 0);
        assert_eq!(record.linear, [true, false]);
        assert_eq!(record.pol_pair, *b"XR");
        assert_eq!(record.byte_begin, 74);
        assert_eq!(record.byte_end, 74 + 8 * TEST_NCHAN as u64);
        assert_abs_diff_eq!(record.time, (TEST_MJD as f64) * 86400.0 + 30.0, epsilon = 1e-6);
        assert_abs_diff_eq!(record.angles[0], 0.1);
        assert_abs_diff_eq!(record.angles[1], 0.2);
        assert!(!record.consumed());
    }

    #[test]
    fn test_index_rewrites_labels_on_disk() {
        let tmp_dir = tempdir().unwrap();
        let path = tmp_dir.path().join("DIFX_TEST.s0000.b0000");

        let bands = [test_band(TEST_NCHAN)];
        let payload = flat_spectrum(Complex::new(1.0, 0.0), TEST_NCHAN);
        write_swin_file(
            &path,
            &[
                (test_header([1, 1], 30.0, 0, *b"XY"), payload.clone()),
                (test_header([2, 3], 30.0, 0, *b"RL"), payload.clone()),
            ],
        );

        let mut fileset = SwinFileSet::open(&[path.clone()], None).unwrap();
        let options = test_options(&[1]);
        index_files(&mut fileset, &bands, &options, &FixedAngles([0.0, 0.0])).unwrap();
        fileset.flush(0).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        // the linear autocorrelation is rewritten to the circular convention
        assert_eq!(&bytes[36..38], b"RL");
        // the pure-circular baseline keeps its labels
        let second = 74 + 8 * TEST_NCHAN + 36;
        assert_eq!(&bytes[second..second + 2], b"RL");
    }

    #[test]
    fn test_index_test_mode_keeps_labels() {
        let tmp_dir = tempdir().unwrap();
        let path = tmp_dir.path().join("DIFX_TEST.s0000.b0000");

        let bands = [test_band(TEST_NCHAN)];
        let payload = flat_spectrum(Complex::new(1.0, 0.0), TEST_NCHAN);
        write_swin_file(&path, &[(test_header([1, 2], 30.0, 0, *b"XL"), payload)]);

        let mut fileset = SwinFileSet::open(&[path.clone()], None).unwrap();
        let mut options = test_options(&[1]);
        options.test_mode = true;
        index_files(&mut fileset, &bands, &options, &FixedAngles([0.0, 0.0])).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[36..38], b"XL");
    }

    #[test]
    fn test_index_collects_autocorrelations() {
        let tmp_dir = tempdir().unwrap();
        let path = tmp_dir.path().join("DIFX_TEST.s0000.b0000");

        let bands = [test_band(4)];
        let mut xx = flat_spectrum(Complex::new(0.0, 0.0), 4);
        xx[1] = Complex::new(3.0, 4.0);
        xx[2] = Complex::new(2.0, 0.0);
        write_swin_file(
            &path,
            &[
                (test_header([1, 1], 30.0, 0, *b"XX"), xx),
                (
                    test_header([1, 1], 30.0, 0, *b"YY"),
                    flat_spectrum(Complex::new(1.0, 0.0), 4),
                ),
                // cross hands are not autocorrelation samples, but the
                // record still indexes
                (
                    test_header([1, 1], 30.0, 0, *b"XY"),
                    flat_spectrum(Complex::new(1.0, 0.0), 4),
                ),
            ],
        );

        let mut fileset = SwinFileSet::open(&[path], None).unwrap();
        let options = test_options(&[1]);
        let outcome =
            index_files(&mut fileset, &bands, &options, &FixedAngles([0.0, 0.0])).unwrap();

        assert_eq!(outcome.autocorrs.len(), 2);
        let sample = &outcome.autocorrs[0];
        assert_eq!(sample.antenna, 1);
        assert_eq!(sample.band, 0);
        assert_eq!(sample.pol, AutoPol::X);
        assert_abs_diff_eq!(sample.rel_day, 30.0 / 86400.0, epsilon = 1e-9);
        assert_abs_diff_eq!(sample.spectrum[0], 0.0);
        assert_abs_diff_eq!(sample.spectrum[1], 5.0, epsilon = 1e-6);
        assert_abs_diff_eq!(sample.spectrum[2], 2.0, epsilon = 1e-6);
        assert_abs_diff_eq!(sample.spectrum[3], 0.0);
        assert_eq!(outcome.autocorrs[1].pol, AutoPol::Y);
    }

    #[test]
    fn test_index_time_window() {
        let tmp_dir = tempdir().unwrap();
        let path = tmp_dir.path().join("DIFX_TEST.s0000.b0000");

        let bands = [test_band(TEST_NCHAN)];
        let payload = flat_spectrum(Complex::new(1.0, 0.0), TEST_NCHAN);
        let mut late = test_header([1, 2], 30.0, 0, *b"XR");
        late.mjd = TEST_MJD + 2;
        write_swin_file(
            &path,
            &[
                (test_header([1, 2], 30.0, 0, *b"XR"), payload.clone()),
                (late, payload.clone()),
            ],
        );

        let mut fileset = SwinFileSet::open(&[path], None).unwrap();
        let mut options = test_options(&[1]);
        options.time_range = [-1.0, 1.0];
        let outcome =
            index_files(&mut fileset, &bands, &options, &FixedAngles([0.0, 0.0])).unwrap();

        assert_eq!(outcome.records.len(), 1);
    }

    #[test]
    fn test_index_no_valid_data() {
        let tmp_dir = tempdir().unwrap();
        let path = tmp_dir.path().join("DIFX_TEST.s0000.b0000");

        let bands = [test_band(TEST_NCHAN), test_band(TEST_NCHAN)];
        let payload = flat_spectrum(Complex::new(1.0, 0.0), TEST_NCHAN);
        // band 1 only, but band 0 is requested
        write_swin_file(&path, &[(test_header([1, 2], 30.0, 1, *b"XR"), payload)]);

        let mut fileset = SwinFileSet::open(&[path], None).unwrap();
        let options = test_options(&[1]);
        let result = index_files(&mut fileset, &bands, &options, &FixedAngles([0.0, 0.0]));
        assert!(matches!(
            result,
            Err(SwinpolError::NoValidData { num_files: 1 })
        ));
    }

    #[test]
    fn test_index_band_out_of_range() {
        let tmp_dir = tempdir().unwrap();
        let path = tmp_dir.path().join("DIFX_TEST.s0000.b0000");
        write_swin_file(&path, &[]);

        let bands = [test_band(TEST_NCHAN)];
        let mut fileset = SwinFileSet::open(&[path], None).unwrap();
        let mut options = test_options(&[1]);
        options.band_idxs = vec![3];
        let result = index_files(&mut fileset, &bands, &options, &FixedAngles([0.0, 0.0]));
        assert!(matches!(
            result,
            Err(SwinpolError::BandOutOfRange {
                band: 3,
                num_bands: 1
            })
        ));
    }

    #[test]
    fn test_index_band_offset_remaps() {
        let tmp_dir = tempdir().unwrap();
        let path = tmp_dir.path().join("DIFX_TEST.s0000.b0000");

        let bands = [test_band(TEST_NCHAN), test_band(TEST_NCHAN)];
        let payload = flat_spectrum(Complex::new(1.0, 0.0), TEST_NCHAN);
        // labelled band 1 in the file, accepted as band 0 through the offset
        write_swin_file(&path, &[(test_header([1, 2], 30.0, 1, *b"XR"), payload)]);

        let mut fileset = SwinFileSet::open(&[path], None).unwrap();
        let mut options = test_options(&[1]);
        options.band_offset = 1;
        let outcome =
            index_files(&mut fileset, &bands, &options, &FixedAngles([0.0, 0.0])).unwrap();

        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.records[0].band, 0);
    }
}
