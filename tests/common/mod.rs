//! Helpers shared by the integration tests: synthetic SWIN files built
//! through the public API, and byte-level readers for checking what the
//! conversion left on disk.

use std::path::Path;

use swinpol::{
    io::swin::{self, SwinRecordHeader},
    marlu::num_complex::Complex,
    ConvertOptions, ConvertOptionsBuilder, FrequencyBand, LinearAntenna, SourceGeometry,
};

pub const TEST_MJD: i32 = 59000;
pub const NCHAN: usize = 8;

/// Geometry stub returning the same angle pair for every query.
pub struct FixedAngles(pub [f64; 2]);

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

pub fn header(antennas: [i32; 2], seconds: f64, pol_pair: [u8; 2]) -> SwinRecordHeader {
    SwinRecordHeader {
        baseline: antennas[0] * 256 + antennas[1],
        mjd: TEST_MJD,
        seconds,
        config_index: 0,
        source_index: 0,
        freq_index: 0,
        pol_pair,
        pulsar_bin: 0,
        weight: 1.0,
        uvw: [100.0, 50.0, 0.0],
    }
}

pub fn write_file(path: &Path, records: &[(SwinRecordHeader, Vec<Complex<f32>>)]) {
    let mut buffer = vec![];
    for (record_header, payload) in records {
        swin::write_record(&mut buffer, record_header, payload).unwrap();
    }
    std::fs::write(path, buffer).unwrap();
}

pub fn flat(re: f32, im: f32) -> Vec<Complex<f32>> {
    vec![Complex::new(re, im); NCHAN]
}

pub fn band() -> FrequencyBand {
    FrequencyBand::from_grid(86_268.0, 32.0, NCHAN, 1)
}

pub fn options(linear: &[i32]) -> ConvertOptions {
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

pub fn i32_at(bytes: &[u8], at: usize) -> i32 {
    i32::from_le_bytes(bytes[at..at + 4].try_into().unwrap())
}

pub fn f32_at(bytes: &[u8], at: usize) -> f32 {
    f32::from_le_bytes(bytes[at..at + 4].try_into().unwrap())
}

pub fn f64_at(bytes: &[u8], at: usize) -> f64 {
    f64::from_le_bytes(bytes[at..at + 8].try_into().unwrap())
}

const RECORD_LEN: usize = 74 + 8 * NCHAN;

fn record_base(record: usize) -> usize {
    record * RECORD_LEN
}

pub fn labels(bytes: &[u8], record: usize) -> [u8; 2] {
    let at = record_base(record) + 36;
    [bytes[at], bytes[at + 1]]
}

pub fn weight(bytes: &[u8], record: usize) -> f64 {
    f64_at(bytes, record_base(record) + 42)
}

pub fn payload(bytes: &[u8], record: usize) -> Vec<Complex<f32>> {
    let at = record_base(record) + 74;
    bytes[at..at + 8 * NCHAN]
        .chunks_exact(8)
        .map(|chunk| Complex::new(f32_at(chunk, 0), f32_at(chunk, 4)))
        .collect()
}
