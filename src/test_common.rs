//! Helpers shared by the unit tests: synthetic SWIN files, geometry stubs
//! and option presets.

use std::path::Path;

use crate::{
    freq::FrequencyBand,
    geom::{SourceGeometry, ANGLE_NONE},
    io::swin::{self, SwinRecordHeader},
    marlu::num_complex::Complex,
    options::{ConvertOptions, ConvertOptionsBuilder, LinearAntenna},
};

pub(crate) const TEST_MJD: i32 = 59000;
pub(crate) const TEST_NCHAN: usize = 8;

/// Geometry stub returning the same angle pair for every query.
pub(crate) struct FixedAngles(pub(crate) [f64; 2]);

impl SourceGeometry for FixedAngles {
    fn parallactic_angles(
        &self,
        _source: usize,
        _antenna1: i32,
        _antenna2: i32,
        _uvw: [f64; 3],
        _time: f64,
    ) -> [f64; 2] {
        self.0
    }
}

/// Geometry stub with nothing to say.
#[allow(dead_code)]
pub(crate) struct NoGeometry;

impl SourceGeometry for NoGeometry {
    fn parallactic_angles(
        &self,
        _source: usize,
        _antenna1: i32,
        _antenna2: i32,
        _uvw: [f64; 3],
        _time: f64,
    ) -> [f64; 2] {
        [ANGLE_NONE; 2]
    }
}

/// A header for one record of `band` at `seconds` past the test epoch's
/// midnight, with everything else at benign defaults.
pub(crate) fn test_header(
    antennas: [i32; 2],
    seconds: f64,
    band: i32,
    pol_pair: [u8; 2],
) -> SwinRecordHeader {
    SwinRecordHeader {
        baseline: antennas[0] * 256 + antennas[1],
        mjd: TEST_MJD,
        seconds,
        config_index: 0,
        source_index: 0,
        freq_index: band,
        pol_pair,
        pulsar_bin: 0,
        weight: 1.0,
        uvw: [100.0, 50.0, 0.0],
    }
}

/// Write a SWIN file of the given records to `path`.
pub(crate) fn write_swin_file(path: &Path, records: &[(SwinRecordHeader, Vec<Complex<f32>>)]) {
    let mut buffer = vec![];
    for (header, payload) in records {
        swin::write_record(&mut buffer, header, payload).unwrap();
    }
    std::fs::write(path, buffer).unwrap();
}

/// A spectrum holding `value` in every channel.
pub(crate) fn flat_spectrum(value: Complex<f32>, num_channels: usize) -> Vec<Complex<f32>> {
    vec![value; num_channels]
}

/// A spectrum whose real part counts up the channels, for telling slots
/// apart after conversion.
pub(crate) fn ramp_spectrum(offset: f32, num_channels: usize) -> Vec<Complex<f32>> {
    (0..num_channels)
        .map(|channel| Complex::new(offset + channel as f32, 0.0))
        .collect()
}

/// An upper-sideband band of `num_channels` channels at a fixed reference
/// frequency.
pub(crate) fn test_band(num_channels: usize) -> FrequencyBand {
    FrequencyBand::from_grid(86_268.0, 32.0, num_channels, 1)
}

/// Options converting band 0 for the given linear antennas, windows off.
pub(crate) fn test_options(linear: &[i32]) -> ConvertOptions {
    ConvertOptionsBuilder::default()
        .linear_antennas(
            linear
                .iter()
                .map(|&id| LinearAntenna {
                    id,
                    averaging_window: 0,
                })
                .collect::<Vec<_>>(),
        )
        .band_idxs(vec![0])
        .ref_mjd(f64::from(TEST_MJD))
        .build()
        .unwrap()
}
