//! Grouping of indexed records into convertible cells.
//!
//! A [`ConvertSession`] walks one band's records in storage order,
//! assembling the up-to-four polarization products that describe one
//! (baseline, timestamp) cell and staging their payloads for
//! [`apply`](ConvertSession::apply). Cells with two linear-feed ends,
//! autocorrelations included, come around twice, once per antenna; between
//! the passes the bytes on disk hold a half-converted spectrum, so the
//! first pass's transformed result is kept in a side table and spliced back
//! in when the cell returns.

use std::collections::HashMap;

use itertools::{izip, Itertools};
use log::{debug, warn};

use crate::{
    dataset::SwinConverter,
    error::SwinpolError,
    marlu::num_complex::Complex,
    records::{is_first_hand, RecordId},
};

/// Identity of one physical cell within a band session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct CellKey {
    pub(crate) baseline: i32,
    /// Exact bit pattern of the cell timestamp.
    pub(crate) time_bits: u64,
}

/// Conversion progress of a two-pass cell. Cells not yet visited have no
/// entry in the side table.
#[derive(Debug, Clone)]
pub(crate) enum CellState {
    /// One end is converted. Holds the transformed spectra as they were
    /// applied, before any commit-time filtering; the second pass splices
    /// these in rather than trusting the bytes on disk.
    FirstPassDone([Vec<Complex<f32>>; 4]),
    /// Both ends are converted.
    Complete,
}

/// The group staged by the latest [`ConvertSession::next_cell`] call.
#[derive(Debug, Clone)]
pub(crate) struct ActiveGroup {
    /// Canonical product slots (RR, LL, RL, LR in the fixed antenna's
    /// orientation); missing products stay `None`.
    pub(crate) slots: [Option<RecordId>; 4],
    pub(crate) anchor: RecordId,
    pub(crate) key: CellKey,
    pub(crate) conjugated: bool,
    pub(crate) autocorr: bool,
    /// Whether this cell needs one pass per antenna.
    pub(crate) two_pass: bool,
    /// Whether this pass finishes the cell and claimed its records.
    pub(crate) final_pass: bool,
}

/// What [`ConvertSession::next_cell`] reports about the staged cell.
#[derive(Debug, Clone, PartialEq)]
pub struct CellInfo {
    /// Timestamp in seconds on the MJD scale.
    pub time: f64,
    /// The antenna converted by this pass.
    pub antenna: i32,
    /// The antenna at the other end of the baseline.
    pub other_antenna: i32,
    /// True when the converted antenna is the first of the baseline; the
    /// conversion then uses the direct matrix form instead of the
    /// conjugate transpose.
    pub conjugated: bool,
    /// Source (field) index of the cell.
    pub source: i32,
    /// False when only a single product was found. Such a cell is staged
    /// anyway but cannot be meaningfully converted.
    pub convertible: bool,
}

/// One conversion pass over a single frequency band.
///
/// The session borrows the engine mutably, which serializes the
/// [`next_cell`](Self::next_cell) / [`apply`](Self::apply) /
/// [`commit`](Self::commit) sequence and forces sessions to be consecutive.
/// Record consumption carries over between sessions; the per-record pass
/// flags reset with each new session.
pub struct ConvertSession<'a> {
    pub(crate) engine: &'a mut SwinConverter,
    pub(crate) band: usize,
    pub(crate) num_channels: usize,
    /// Which ends of each record still await conversion, parallel to the
    /// record table.
    pub(crate) shadow: Vec<[bool; 2]>,
    /// Side table of two-pass cells.
    pub(crate) cells: HashMap<CellKey, CellState>,
    pub(crate) group: Option<ActiveGroup>,
    /// Staged input products, canonical slot order RR, LL, RL, LR.
    pub(crate) current: [Vec<Complex<f32>>; 4],
    /// Transformed products, same slot order.
    pub(crate) output: [Vec<Complex<f32>>; 4],
}

impl<'a> ConvertSession<'a> {
    pub(crate) fn new(engine: &'a mut SwinConverter, band: usize) -> Self {
        let num_channels = engine.bands[band].num_channels();
        let shadow = engine.records.iter().map(|record| record.linear).collect();
        let staging = || std::array::from_fn(|_| vec![Complex::default(); num_channels]);
        Self {
            engine,
            band,
            num_channels,
            shadow,
            cells: HashMap::new(),
            group: None,
            current: staging(),
            output: staging(),
        }
    }

    /// The band this session converts.
    pub fn band(&self) -> usize {
        self.band
    }

    /// Channels per spectrum in this band.
    pub fn num_channels(&self) -> usize {
        self.num_channels
    }

    /// Stage the next convertible cell of the band.
    ///
    /// Scans for the first record not yet claimed by a finished group,
    /// gathers the other products of its cell, and reads their payloads
    /// into the staging buffers. `Ok(None)` means the band is exhausted.
    /// Incomplete groups degrade with a warning: missing products stage as
    /// zeros, and a lone product marks the cell unconvertible.
    ///
    /// # Errors
    ///
    /// Propagates payload read failures.
    pub fn next_cell(&mut self) -> Result<Option<CellInfo>, SwinpolError> {
        let mut anchor = None;
        for (idx, record) in self.engine.records.iter().enumerate() {
            if !record.consumed && record.band == self.band {
                anchor = Some(idx);
                break;
            }
        }
        let Some(anchor) = anchor else {
            debug!("band {} has no cells left", self.band);
            return Ok(None);
        };

        // Both pass flags still set means another visit is coming; the
        // records are only claimed by the pass that finishes the cell.
        let final_pass = !(self.shadow[anchor][0] && self.shadow[anchor][1]);
        let (baseline, time, two_pass) = {
            let record = &self.engine.records[anchor];
            (
                record.baseline,
                record.time,
                record.linear[0] && record.linear[1],
            )
        };

        let mut members = [None; 4];
        members[0] = Some(anchor);
        let mut found = 1;
        for (idx, record) in self.engine.records.iter().enumerate().skip(anchor + 1) {
            if record.baseline == baseline
                && record.time.to_bits() == time.to_bits()
                && record.band == self.band
            {
                members[found] = Some(idx);
                found += 1;
                if found == 4 {
                    break;
                }
            }
        }

        if final_pass {
            for &member in members.iter().flatten() {
                self.engine.records[member].consumed = true;
            }
        }

        let mut convertible = true;
        if found < 4 {
            let labels = members
                .iter()
                .flatten()
                .map(|&member| {
                    let pol = self.engine.records[member].pol_pair;
                    format!("{}{}", pol[0] as char, pol[1] as char)
                })
                .join(" ");
            warn!("baseline {baseline:08x} at {time:.3} s has {found} of 4 products ({labels})");
            if found == 1 {
                warn!("a single product cannot be converted, staging it anyway");
                convertible = false;
            }
        }

        let conjugated = if self.shadow[anchor][0] {
            self.shadow[anchor][0] = false;
            true
        } else {
            self.shadow[anchor][1] = false;
            false
        };
        // every product of one physical cell advances through the passes
        // together
        let anchor_shadow = self.shadow[anchor];
        for &member in members.iter().flatten() {
            self.shadow[member] = anchor_shadow;
        }

        let fixed_end = if conjugated { 0 } else { 1 };
        let mut slots: [Option<RecordId>; 4] = [None; 4];
        for &member in members.iter().flatten() {
            let pol = self.engine.records[member].pol_pair;
            let slot = match (
                is_first_hand(pol[fixed_end]),
                is_first_hand(pol[1 - fixed_end]),
            ) {
                (true, true) => 0,
                (false, false) => 1,
                (true, false) => 2,
                (false, true) => 3,
            };
            slots[slot] = Some(RecordId(member));
        }

        let antennas = self.engine.records[anchor].antennas;
        let (antenna, other_antenna) = if conjugated {
            (antennas[0], antennas[1])
        } else {
            (antennas[1], antennas[0])
        };
        let autocorr = antennas[0] == antennas[1];

        let engine = &mut *self.engine;
        for (slot, buffer) in izip!(&slots, self.current.iter_mut()) {
            match slot {
                Some(id) => {
                    let (file, byte_begin, num_channels) = {
                        let record = &engine.records[id.0];
                        (record.file, record.byte_begin, record.num_channels())
                    };
                    *buffer = engine
                        .fileset
                        .read_spectrum_at(file, byte_begin, num_channels)?;
                }
                None => {
                    buffer
                        .iter_mut()
                        .for_each(|value| *value = Complex::default());
                }
            }
        }

        let key = CellKey {
            baseline,
            time_bits: time.to_bits(),
        };
        if final_pass && two_pass {
            if let Some(CellState::FirstPassDone(spectra)) = self.cells.get(&key) {
                debug!("splicing first-pass spectra for baseline {baseline:08x} at {time:.3} s");
                for (buffer, cached) in izip!(self.current.iter_mut(), spectra) {
                    buffer.clone_from(cached);
                }
            }
        }
        if autocorr && !final_pass {
            // cross hands mean nothing until both ends are converted
            for slot in [2, 3] {
                self.current[slot]
                    .iter_mut()
                    .for_each(|value| *value = Complex::default());
            }
        }

        self.group = Some(ActiveGroup {
            slots,
            anchor: RecordId(anchor),
            key,
            conjugated,
            autocorr,
            two_pass,
            final_pass,
        });

        Ok(Some(CellInfo {
            time,
            antenna,
            other_antenna,
            conjugated,
            source: self.engine.records[anchor].source,
            convertible,
        }))
    }
}
