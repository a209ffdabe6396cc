//! The configuration surface consumed by the engine.

use std::fmt::{Debug, Display};
use std::path::PathBuf;

use derive_builder::Builder;

/// One linear-feed antenna and its autocorrelation-averaging window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinearAntenna {
    /// Antenna id in the correlator's numbering, starting at 1.
    pub id: i32,
    /// Window size in channels for this antenna's normalization curve;
    /// 0 disables averaging (the curve stays all ones).
    pub averaging_window: usize,
}

/// Options for one conversion run.
///
/// The engine consumes this surface but does not own its policy: paths,
/// band selections and antenna classifications come from whatever drives
/// the run (a pipeline script, usually).
#[derive(Builder, Debug, Clone)]
pub struct ConvertOptions {
    /// The linear-feed antennas whose visibilities get converted.
    pub linear_antennas: Vec<LinearAntenna>,
    /// Frequency bands to convert, as 0-based indices into the band table.
    pub band_idxs: Vec<usize>,
    /// Offset tolerated between the band numbering in the files and the
    /// requested indices; a file index of `requested + band_offset` matches.
    #[builder(default)]
    pub band_offset: i32,
    /// Reference epoch as an MJD; record times are windowed relative to it.
    pub ref_mjd: f64,
    /// Accepted time window in days relative to `ref_mjd`, inclusive.
    #[builder(default = "[-1.0e9, 1.0e9]")]
    pub time_range: [f64; 2],
    /// Half-width in channels of the commit-time autocorrelation median
    /// filter; 0 disables it.
    #[builder(default)]
    pub median_half_width: usize,
    /// Stage working copies of the inputs into this directory instead of
    /// rewriting the originals in place.
    #[builder(default)]
    pub staging_dir: Option<PathBuf>,
    /// Leave the on-disk polarization labels untouched during indexing
    /// (calibration dry runs read converted data back without committing to
    /// the circular convention).
    #[builder(default)]
    pub test_mode: bool,
    /// Apply the parallactic-angle phase correction during conversion.
    #[builder(default = "true")]
    pub correct_parang: bool,
    /// Write per-band autocorrelation and circular-visibility export streams
    /// into this directory.
    #[builder(default)]
    pub export_dir: Option<PathBuf>,
    /// Restrict the circular-visibility export to one source index.
    #[builder(default)]
    pub export_source: Option<i32>,
    /// Draw indexing progress bars to stderr.
    #[builder(default)]
    pub draw_progress: bool,
}

impl ConvertOptions {
    /// Whether `antenna` is in the linear-feed set.
    pub fn is_linear(&self, antenna: i32) -> bool {
        self.linear_antennas.iter().any(|a| a.id == antenna)
    }

    /// Position of `antenna` in the linear-feed list, if present.
    pub fn linear_index(&self, antenna: i32) -> Option<usize> {
        self.linear_antennas.iter().position(|a| a.id == antenna)
    }
}

impl Display for ConvertOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "converting bands {:?} (offset {}) for linear antennas {:?}",
            self.band_idxs,
            self.band_offset,
            self.linear_antennas.iter().map(|a| a.id).collect::<Vec<_>>(),
        )?;
        writeln!(
            f,
            "time window [{}, {}] days from MJD {}",
            self.time_range[0], self.time_range[1], self.ref_mjd
        )?;
        writeln!(
            f,
            "{} parallactic angles, median half-width {}, {}{}",
            if self.correct_parang {
                "correcting"
            } else {
                "not correcting"
            },
            self.median_half_width,
            match &self.staging_dir {
                Some(dir) => format!("staging copies in {}", dir.display()),
                None => "rewriting in place".to_string(),
            },
            if self.test_mode { " (test mode)" } else { "" },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_builder() -> ConvertOptionsBuilder {
        let mut builder = ConvertOptionsBuilder::default();
        builder
            .linear_antennas(vec![LinearAntenna {
                id: 1,
                averaging_window: 0,
            }])
            .band_idxs(vec![0])
            .ref_mjd(59000.0);
        builder
    }

    #[test]
    fn test_builder_defaults() {
        let options = base_builder().build().unwrap();
        assert_eq!(options.band_offset, 0);
        assert_eq!(options.time_range, [-1.0e9, 1.0e9]);
        assert!(options.correct_parang);
        assert!(!options.test_mode);
        assert!(options.staging_dir.is_none());
        assert!(options.export_dir.is_none());
    }

    #[test]
    fn test_builder_requires_antennas() {
        let result = ConvertOptionsBuilder::default()
            .band_idxs(vec![0])
            .ref_mjd(59000.0)
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_linear_lookup() {
        let options = base_builder().build().unwrap();
        assert!(options.is_linear(1));
        assert!(!options.is_linear(2));
        assert_eq!(options.linear_index(1), Some(0));
        assert_eq!(options.linear_index(3), None);
    }
}
