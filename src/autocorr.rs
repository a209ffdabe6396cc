//! Amplitude normalization curves from same-hand autocorrelations.
//!
//! The cross-gain amplitude between a linear antenna's X and Y chains shows
//! up as the ratio of its autocorrelation spectra. The curves computed here
//! are consumed by whatever solves for the conversion matrices; the engine
//! itself only builds and hands them out.

use itertools::izip;
use log::{debug, trace, warn};

use crate::{
    freq::FrequencyBand,
    median::legacy_median,
    options::ConvertOptions,
    records::{AutoPol, AutocorrSample},
};

/// Smoothed per-antenna, per-band, per-channel amplitude corrections,
/// `sqrt(mean Y autocorrelation / mean X autocorrelation)` run through the
/// historical median filter. Curves default to all ones wherever a hand has
/// no samples or an antenna's averaging window is zero.
pub struct NormalizationTable {
    // indexed [linear antenna position][band][channel]
    curves: Vec<Vec<Vec<f32>>>,
}

impl NormalizationTable {
    /// Build the table for every configured linear antenna and band.
    pub(crate) fn from_samples(
        samples: &[AutocorrSample],
        options: &ConvertOptions,
        bands: &[FrequencyBand],
    ) -> Self {
        trace!("start NormalizationTable::from_samples");
        let curves = options
            .linear_antennas
            .iter()
            .map(|antenna| {
                bands
                    .iter()
                    .enumerate()
                    .map(|(band_idx, band)| {
                        band_curve(samples, antenna.id, antenna.averaging_window, band_idx, band)
                    })
                    .collect()
            })
            .collect();
        trace!("end NormalizationTable::from_samples");
        Self { curves }
    }

    /// The curve for the linear antenna at `linear_idx` (its position in the
    /// configured antenna list) and `band`.
    pub fn curve(&self, linear_idx: usize, band: usize) -> &[f32] {
        &self.curves[linear_idx][band]
    }
}

fn band_curve(
    samples: &[AutocorrSample],
    antenna: i32,
    window: usize,
    band_idx: usize,
    band: &FrequencyBand,
) -> Vec<f32> {
    let num_channels = band.num_channels();
    let mut sum_x = vec![0.0_f64; num_channels];
    let mut sum_y = vec![0.0_f64; num_channels];
    let (mut n_x, mut n_y) = (0_usize, 0_usize);

    for sample in samples
        .iter()
        .filter(|s| s.antenna == antenna && s.band == band_idx)
    {
        let sum = match sample.pol {
            AutoPol::X => {
                n_x += 1;
                &mut sum_x
            }
            AutoPol::Y => {
                n_y += 1;
                &mut sum_y
            }
        };
        for (acc, &mag) in izip!(sum.iter_mut(), &sample.spectrum) {
            *acc += mag;
        }
    }

    debug!(
        "antenna {} band {}: {} X and {} Y autocorrelation samples, window {}",
        antenna, band_idx, n_x, n_y, window
    );

    if window == 0 || n_x == 0 || n_y == 0 {
        return vec![1.0; num_channels];
    }
    if window >= num_channels {
        warn!(
            "averaging window {} does not fit in the {} channels of band {}; antenna {} keeps a flat curve",
            window, num_channels, band_idx, antenna
        );
        return vec![1.0; num_channels];
    }

    // X/Y chain gain ratio from the mean spectra
    let scale = n_x as f64 / n_y as f64;
    let ratio: Vec<f64> = izip!(&sum_x, &sum_y)
        .map(|(&x, &y)| (y / x * scale).sqrt())
        .collect();

    // median-filter the ratio; windows at either spectral edge stay anchored
    // just inside the boundary instead of shrinking
    let half = window / 2;
    let mut curve = vec![0.0_f32; num_channels];
    let head = finite_median(&ratio[..window]) as f32;
    let tail_start = num_channels - window - 1;
    let tail = finite_median(&ratio[tail_start..tail_start + window]) as f32;
    for l in 0..half {
        curve[l] = head;
        curve[num_channels - l - 1] = tail;
    }
    for l in half..num_channels - half {
        curve[l] = finite_median(&ratio[l - half..l - half + window]) as f32;
    }
    curve
}

/// Median of the finite entries of `window`, 1.0 when none are. The indexed
/// spectra keep their band-edge channels at zero, so windows touching an
/// edge hold 0/0 ratios that would otherwise skew the sort.
fn finite_median(window: &[f64]) -> f64 {
    let finite: Vec<f64> = window.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        1.0
    } else {
        legacy_median(&finite)
    }
}
