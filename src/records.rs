//! Indexed visibility records and autocorrelation samples.

/// Opaque handle to one [`Record`] in the engine's record array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordId(pub(crate) usize);

/// True for labels naming the first polarization hand (circular R or its
/// linear stand-in X); everything else is treated as the second hand (L/Y).
pub(crate) fn is_first_hand(label: u8) -> bool {
    matches!(label, b'R' | b'X')
}

/// Collapse a linear-feed end's label onto the internal X/Y alphabet.
pub(crate) fn normalize_linear(label: u8) -> u8 {
    if is_first_hand(label) {
        b'X'
    } else {
        b'Y'
    }
}

/// The circular label a linear label is rewritten to on disk. Labels that
/// are already circular pass through unchanged.
pub(crate) fn circular_label(label: u8) -> u8 {
    match label {
        b'X' => b'R',
        b'Y' => b'L',
        other => other,
    }
}

/// One correlation product accepted during indexing: a single polarization
/// pair of one (baseline, timestamp, band) cell, addressing its payload bytes
/// in the owning file.
///
/// Records are append-only during indexing and never removed; the matcher
/// flips `consumed` (monotonically) as groups are claimed.
#[derive(Debug, Clone)]
pub struct Record {
    /// Packed antenna pair, `ant1 * 256 + ant2`.
    pub baseline: i32,
    /// Source (field) index from the header.
    pub source: i32,
    /// Index of the owning file within the engine's file set.
    pub file: usize,
    /// Timestamp in seconds on the MJD scale.
    pub time: f64,
    /// The two antenna ids, numbered from 1.
    pub antennas: [i32; 2],
    /// Byte offset of the payload start in the owning file.
    pub byte_begin: u64,
    /// Byte offset one past the payload end.
    pub byte_end: u64,
    /// Polarization labels, normalized to X/Y for linear-feed ends.
    pub pol_pair: [u8; 2],
    /// Frequency-band index after any requested-band remapping.
    pub band: usize,
    /// Whether each end of the baseline is a linear-feed antenna.
    pub linear: [bool; 2],
    /// Precomputed parallactic angles for each end, [`crate::geom::ANGLE_NONE`]
    /// when the geometry had nothing to say.
    pub angles: [f64; 2],
    /// Squared projected baseline length, u² + v².
    pub uv_dist: f64,
    pub(crate) consumed: bool,
}

impl Record {
    /// Whether this record has been claimed by a finished group. Monotonic:
    /// never cleared once set.
    pub fn consumed(&self) -> bool {
        self.consumed
    }

    /// Payload length in complex samples.
    pub(crate) fn num_channels(&self) -> usize {
        ((self.byte_end - self.byte_begin) / 8) as usize
    }
}

/// Which autocorrelation hand a sample belongs to. The discriminants are the
/// polarization codes used in the autocorrelation export stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoPol {
    /// The R/X hand.
    X = 1,
    /// The L/Y hand.
    Y = 2,
}

impl AutoPol {
    /// The export-stream code for this hand.
    pub fn code(self) -> i32 {
        self as i32
    }
}

/// One same-hand autocorrelation spectrum gathered during indexing, feeding
/// the per-antenna normalization curves.
#[derive(Debug, Clone)]
pub struct AutocorrSample {
    /// Antenna id, numbered from 1.
    pub antenna: i32,
    /// Frequency-band index after remapping.
    pub band: usize,
    /// Which hand was correlated with itself.
    pub pol: AutoPol,
    /// Timestamp in days relative to the reference epoch.
    pub rel_day: f64,
    /// Per-channel magnitudes; the first and last channel are left at zero
    /// as band-edge artifacts.
    pub spectrum: Vec<f64>,
}
