//! Per-band frequency metadata.

/// Static description of one frequency band (IF): its channel grid and
/// sideband sense. Bands are indexed 0..N-1 in the order the correlator
/// numbers them, and owned by the engine for its lifetime.
#[derive(Debug, Clone, PartialEq)]
pub struct FrequencyBand {
    /// Total bandwidth in Hz.
    pub bandwidth: f64,
    /// Frequency of the band edge (first channel) in Hz.
    pub reference_frequency: f64,
    /// Sideband sense: +1 for upper, -1 for lower.
    pub sideband: i8,
    /// Sky frequency of every channel in Hz.
    pub channel_freqs: Vec<f64>,
}

impl FrequencyBand {
    /// Build a band from an explicit channel grid; bandwidth and reference
    /// frequency are derived from the grid's extremes.
    pub fn new(channel_freqs: Vec<f64>, sideband: i8) -> Self {
        let reference_frequency = channel_freqs.first().copied().unwrap_or(0.0);
        let bandwidth = channel_freqs
            .last()
            .map_or(0.0, |&last| (last - reference_frequency).abs());
        Self {
            bandwidth,
            reference_frequency,
            sideband,
            channel_freqs,
        }
    }

    /// Build a band from the correlator description: reference frequency,
    /// total bandwidth and channel count, with the grid spaced evenly and
    /// running downwards for lower sideband.
    pub fn from_grid(
        reference_frequency: f64,
        bandwidth: f64,
        num_channels: usize,
        sideband: i8,
    ) -> Self {
        let step = if num_channels > 0 {
            f64::from(sideband.signum()) * bandwidth / num_channels as f64
        } else {
            0.0
        };
        let channel_freqs = (0..num_channels)
            .map(|k| reference_frequency + step * k as f64)
            .collect();
        Self {
            bandwidth,
            reference_frequency,
            sideband,
            channel_freqs,
        }
    }

    /// The number of spectral channels in this band.
    pub fn num_channels(&self) -> usize {
        self.channel_freqs.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::approx_eq;

    #[test]
    fn test_from_grid_upper_sideband() {
        let band = FrequencyBand::from_grid(8.4e9, 64e6, 32, 1);
        assert_eq!(band.num_channels(), 32);
        assert!(approx_eq!(f64, band.channel_freqs[0], 8.4e9));
        assert!(approx_eq!(f64, band.channel_freqs[1], 8.4e9 + 2e6));
        assert!(band.channel_freqs[31] > band.channel_freqs[0]);
    }

    #[test]
    fn test_from_grid_lower_sideband_runs_down() {
        let band = FrequencyBand::from_grid(8.4e9, 64e6, 32, -1);
        assert!(band.channel_freqs[31] < band.channel_freqs[0]);
    }

    #[test]
    fn test_new_derives_extremes() {
        let band = FrequencyBand::new(vec![1e9, 1.1e9, 1.2e9], 1);
        assert!(approx_eq!(f64, band.reference_frequency, 1e9));
        assert!(approx_eq!(f64, band.bandwidth, 0.2e9));
    }
}
