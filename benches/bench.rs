use std::path::{Path, PathBuf};

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use swinpol::{
    io::swin::{self, SwinRecordHeader},
    marlu::num_complex::Complex,
    ConversionMatrix, ConvertOptions, ConvertOptionsBuilder, FrequencyBand, LinearAntenna,
    SourceGeometry, SwinConverter,
};
use tempfile::tempdir;

const NUM_CHANNELS: usize = 64;
const NUM_TIMESTEPS: usize = 256;
const MJD: i32 = 59000;

struct BenchAngles;

impl SourceGeometry for BenchAngles {
    fn parallactic_angles(
        &self,
        _source: usize,
        _antenna1: i32,
        _antenna2: i32,
        _uvw: [f64; 3],
        _time: f64,
    ) -> [f64; 2] {
        [0.1, 0.2]
    }
}

fn bench_options(staging_dir: Option<PathBuf>) -> ConvertOptions {
    let mut builder = ConvertOptionsBuilder::default();
    builder
        .linear_antennas(vec![LinearAntenna {
            id: 1,
            averaging_window: 0,
        }])
        .band_idxs(vec![0])
        .ref_mjd(f64::from(MJD));
    if let Some(dir) = staging_dir {
        builder.staging_dir(Some(dir));
    }
    builder.build().unwrap()
}

/// One mixed baseline, four products per timestep.
fn write_bench_file(path: &Path) {
    let payload = vec![Complex::new(1.0_f32, 0.5); NUM_CHANNELS];
    let mut buffer = vec![];
    for timestep in 0..NUM_TIMESTEPS {
        for pol_pair in [*b"XR", *b"YL", *b"XL", *b"YR"] {
            let header = SwinRecordHeader {
                baseline: 258,
                mjd: MJD,
                seconds: timestep as f64,
                config_index: 0,
                source_index: 0,
                freq_index: 0,
                pol_pair,
                pulsar_bin: 0,
                weight: 1.0,
                uvw: [100.0, 50.0, 0.0],
            };
            swin::write_record(&mut buffer, &header, &payload).unwrap();
        }
    }
    std::fs::write(path, buffer).unwrap();
}

fn bench_open(crt: &mut Criterion) {
    let tmp_dir = tempdir().unwrap();
    let path = tmp_dir.path().join("DIFX_BENCH.s0000.b0000");
    write_bench_file(&path);
    let paths = [path];
    let bands = vec![FrequencyBand::from_grid(86_268.0, 32.0, NUM_CHANNELS, 1)];

    crt.bench_function(
        format!("open - {} records", 4 * NUM_TIMESTEPS).as_str(),
        |bch| {
            bch.iter(|| {
                SwinConverter::open(
                    black_box(&paths),
                    black_box(bands.clone()),
                    black_box(bench_options(None)),
                    &BenchAngles,
                )
                .unwrap()
            });
        },
    );
}

fn bench_convert_band(crt: &mut Criterion) {
    let tmp_dir = tempdir().unwrap();
    let staging_dir = tempdir().unwrap();
    let path = tmp_dir.path().join("DIFX_BENCH.s0000.b0000");
    write_bench_file(&path);
    let paths = [path];
    let bands = vec![FrequencyBand::from_grid(86_268.0, 32.0, NUM_CHANNELS, 1)];
    let matrix = ConversionMatrix::identity(NUM_CHANNELS);

    // staging copies the pristine originals each iteration, so every run
    // converts the same bytes
    crt.bench_function(
        format!("convert band - {} cells", NUM_TIMESTEPS).as_str(),
        |bch| {
            bch.iter(|| {
                let mut converter = SwinConverter::open(
                    black_box(&paths),
                    black_box(bands.clone()),
                    black_box(bench_options(Some(staging_dir.path().to_path_buf()))),
                    &BenchAngles,
                )
                .unwrap();
                let mut session = converter.band_session(0).unwrap();
                while let Some(cell) = session.next_cell().unwrap() {
                    if cell.convertible {
                        session.apply(black_box(&matrix), None).unwrap();
                        session.commit().unwrap();
                    } else {
                        session.zero_weight().unwrap();
                    }
                }
            });
        },
    );
}

criterion_group!(
    name = benches;
    config = Criterion::default().sample_size(10);
    targets =
        bench_open,
        bench_convert_band,
);
criterion_main!(benches);
