//! The seam to the external geometry model.
//!
//! Parallactic angles depend on the array layout, source coordinates and
//! precession handling, none of which this crate owns. The engine consumes
//! them through [`SourceGeometry`] and precomputes one angle pair per record
//! at indexing time.

/// Sentinel angle meaning "no geometry available for this record".
pub const ANGLE_NONE: f64 = -1.0e9;

/// Angles at or below this threshold are treated as [`ANGLE_NONE`] and skip
/// the parallactic-angle phase correction.
pub const ANGLE_VALID_MIN: f64 = -1.0e8;

/// Provider of parallactic angles for both ends of a baseline.
///
/// Implementations typically wrap a precomputed ephemeris or an SPICE/calc
/// style model. Antenna ids are the correlator's, numbered from 1; `time` is
/// in seconds on the MJD scale (MJD × 86400 + seconds within day).
pub trait SourceGeometry {
    /// The parallactic angle pair (radians) for `antenna1` and `antenna2`
    /// observing `source` with baseline vector `uvw` at `time`. Return
    /// [`ANGLE_NONE`] for an end with no usable geometry.
    fn parallactic_angles(
        &self,
        source: usize,
        antenna1: i32,
        antenna2: i32,
        uvw: [f64; 3],
        time: f64,
    ) -> [f64; 2];
}
