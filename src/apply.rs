//! Application of per-channel conversion matrices to staged cells, and the
//! write-back of the transformed spectra.
//!
//! The math follows the staging convention of
//! [`next_cell`](ConvertSession::next_cell): slot 0 carries the product
//! with both first hands, slot 1 both second hands, slots 2 and 3 the two
//! cross products. A conjugated pass multiplies the matrix from the left;
//! an unconjugated pass folds the conjugate matrix over the other index, so
//! two passes of a two-linear cell compose into the full similarity
//! transform.

use itertools::izip;

use crate::{
    error::SwinpolError,
    geom::ANGLE_VALID_MIN,
    io::{export::DiagnosticSink, swin},
    marlu::{num_complex::Complex, Jones},
    matcher::{ActiveGroup, CellState, ConvertSession},
    median::central_median,
};

const A11: usize = 0;
const A22: usize = 1;
const A12: usize = 2;
const A21: usize = 3;

/// Per-channel 2x2 matrices taking one antenna's linear-feed voltages to
/// circular-feed voltages, in [`Jones`] element order `[m00, m01, m10,
/// m11]`.
///
/// The matrices come from an external calibration step; this crate only
/// applies them. One instance covers one band of one antenna.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionMatrix {
    channels: Vec<Jones<f32>>,
}

impl ConversionMatrix {
    /// The identity for every channel, leaving spectra unchanged apart
    /// from parallactic-angle rotation.
    pub fn identity(num_channels: usize) -> Self {
        Self {
            channels: vec![Jones::identity(); num_channels],
        }
    }

    /// Wrap explicit per-channel matrices.
    pub fn from_channels(channels: Vec<Jones<f32>>) -> Self {
        Self { channels }
    }

    /// Number of channels covered.
    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    /// The matrix of one channel.
    pub fn channel(&self, channel: usize) -> Jones<f32> {
        self.channels[channel]
    }
}

impl ConvertSession<'_> {
    /// Transform the staged cell with `matrix`, leaving the result in the
    /// output staging ready for [`commit`](Self::commit).
    ///
    /// The matrix belongs to the antenna reported by the latest
    /// [`next_cell`](Self::next_cell); the conjugation branch is chosen
    /// from that call's result. When `diagnostics` is given and this pass
    /// finishes the cell, the staged inputs, outputs and matrix are
    /// streamed to the sink, canonicalized to the first antenna's
    /// orientation.
    ///
    /// # Errors
    ///
    /// [`SwinpolError::NoActiveGroup`] without a staged cell, and
    /// [`SwinpolError::MatrixChannelMismatch`] when the matrix does not
    /// cover the band's channels. Diagnostic write failures propagate.
    pub fn apply(
        &mut self,
        matrix: &ConversionMatrix,
        diagnostics: Option<&mut DiagnosticSink>,
    ) -> Result<(), SwinpolError> {
        let Some(group) = self.group.clone() else {
            return Err(SwinpolError::NoActiveGroup);
        };
        if matrix.num_channels() != self.num_channels {
            return Err(SwinpolError::MatrixChannelMismatch {
                band: self.band,
                expected: self.num_channels,
                received: matrix.num_channels(),
            });
        }

        let angles = self.engine.records[group.anchor.0].angles;
        let phasor = if self.engine.options.correct_parang {
            let angle = if group.conjugated {
                angles[0]
            } else {
                angles[1]
            };
            (angle > ANGLE_VALID_MIN).then(|| Complex::from_polar(1.0_f32, angle as f32))
        } else {
            None
        };

        for channel in 0..self.num_channels {
            let m = matrix.channel(channel);
            let a11 = self.current[A11][channel];
            let a22 = self.current[A22][channel];
            let a12 = self.current[A12][channel];
            let a21 = self.current[A21][channel];

            let (mut c11, mut c22, mut c12, mut c21) = if group.conjugated {
                (
                    m[0] * a11 + m[1] * a21,
                    m[2] * a12 + m[3] * a22,
                    m[0] * a12 + m[1] * a22,
                    m[2] * a11 + m[3] * a21,
                )
            } else {
                (
                    m[0].conj() * a11 + m[1].conj() * a12,
                    m[2].conj() * a21 + m[3].conj() * a22,
                    m[2].conj() * a11 + m[3].conj() * a12,
                    m[0].conj() * a21 + m[1].conj() * a22,
                )
            };
            if let Some(p) = phasor {
                if group.conjugated {
                    c11 *= p;
                    c12 *= p;
                    c21 /= p;
                    c22 /= p;
                } else {
                    c11 /= p;
                    c12 *= p;
                    c21 /= p;
                    c22 *= p;
                }
            }
            self.output[A11][channel] = c11;
            self.output[A22][channel] = c22;
            self.output[A12][channel] = c12;
            self.output[A21][channel] = c21;
        }

        if let Some(sink) = diagnostics {
            if group.final_pass {
                self.write_diagnostics(sink, &group, matrix)?;
            }
        }

        // the next pass of a two-pass cell must see these spectra, not the
        // possibly filtered bytes the commit leaves on disk
        if group.two_pass {
            let state = if group.final_pass {
                CellState::Complete
            } else {
                CellState::FirstPassDone(self.output.clone())
            };
            self.cells.insert(group.key, state);
        }
        Ok(())
    }

    /// Stream the staged cell to the diagnostic sink in the first
    /// antenna's orientation. Unconjugated passes conjugate the values and
    /// swap the cross products so both passes of a baseline plot the same
    /// way.
    fn write_diagnostics(
        &self,
        sink: &mut DiagnosticSink,
        group: &ActiveGroup,
        matrix: &ConversionMatrix,
    ) -> Result<(), SwinpolError> {
        let record = &self.engine.records[group.anchor.0];
        if group.conjugated {
            sink.write_cell_header(
                record.file as i32,
                record.time,
                record.antennas,
                record.angles,
                record.uv_dist,
            )?;
            for channel in 0..self.num_channels {
                let m = matrix.channel(channel);
                sink.write_channel(
                    [
                        self.current[A11][channel],
                        self.current[A12][channel],
                        self.current[A21][channel],
                        self.current[A22][channel],
                    ],
                    [
                        self.output[A11][channel],
                        self.output[A12][channel],
                        self.output[A21][channel],
                        self.output[A22][channel],
                    ],
                    [m[0], m[1], m[2], m[3]],
                )?;
            }
        } else {
            sink.write_cell_header(
                record.file as i32,
                record.time,
                [record.antennas[1], record.antennas[0]],
                [record.angles[1], record.angles[0]],
                record.uv_dist,
            )?;
            let transpose =
                |v: [Complex<f32>; 4]| [v[0].conj(), v[2].conj(), v[1].conj(), v[3].conj()];
            for channel in 0..self.num_channels {
                let m = matrix.channel(channel);
                sink.write_channel(
                    transpose([
                        self.current[A11][channel],
                        self.current[A12][channel],
                        self.current[A21][channel],
                        self.current[A22][channel],
                    ]),
                    transpose([
                        self.output[A11][channel],
                        self.output[A12][channel],
                        self.output[A21][channel],
                        self.output[A22][channel],
                    ]),
                    [m[0].conj(), m[2].conj(), m[1].conj(), m[3].conj()],
                )?;
            }
        }
        Ok(())
    }

    /// Write the transformed spectra of the staged cell back over their
    /// original byte ranges, flushing each file so a later pass reading
    /// the same bytes observes them.
    ///
    /// The finishing pass of an autocorrelation is filtered first: both
    /// cross products are forced to zero, and the two same-hand spectra
    /// are replaced by a centered median of their averaged magnitudes over
    /// the configured window (edge channels outside the window keep their
    /// converted values).
    ///
    /// # Errors
    ///
    /// [`SwinpolError::NoActiveGroup`] without a staged cell; write and
    /// flush failures propagate.
    pub fn commit(&mut self) -> Result<(), SwinpolError> {
        let Some(group) = self.group.clone() else {
            return Err(SwinpolError::NoActiveGroup);
        };
        if group.autocorr && group.final_pass {
            self.filter_autocorr();
        }
        let engine = &mut *self.engine;
        for (slot, spectrum) in izip!(&group.slots, &self.output) {
            if let Some(id) = slot {
                let (file, byte_begin) = {
                    let record = &engine.records[id.0];
                    (record.file, record.byte_begin)
                };
                engine.fileset.write_spectrum_at(file, byte_begin, spectrum)?;
                engine.fileset.flush(file)?;
            }
        }
        Ok(())
    }

    fn filter_autocorr(&mut self) {
        let half_width = self.engine.options.median_half_width;
        if half_width == 0 || half_width >= self.num_channels {
            return;
        }
        let magnitudes: Vec<f32> = izip!(&self.output[A11], &self.output[A22])
            .map(|(first, second)| (first.norm() + second.norm()) / 2.0)
            .collect();
        for slot in [A12, A21] {
            self.output[slot]
                .iter_mut()
                .for_each(|value| *value = Complex::default());
        }
        for channel in half_width..self.num_channels - half_width {
            let window = &magnitudes[channel - half_width..=channel + half_width];
            let median = central_median(window);
            self.output[A11][channel] = Complex::new(median, 0.0);
            self.output[A22][channel] = self.output[A11][channel];
        }
    }

    /// Zero the on-disk weight of every record in the staged cell,
    /// flagging it for downstream software. Used by callers when no valid
    /// matrix exists for the cell, instead of [`commit`](Self::commit).
    ///
    /// # Errors
    ///
    /// [`SwinpolError::NoActiveGroup`] without a staged cell; write and
    /// flush failures propagate.
    pub fn zero_weight(&mut self) -> Result<(), SwinpolError> {
        let Some(group) = self.group.clone() else {
            return Err(SwinpolError::NoActiveGroup);
        };
        let engine = &mut *self.engine;
        for id in group.slots.iter().flatten() {
            let (file, byte_begin) = {
                let record = &engine.records[id.0];
                (record.file, record.byte_begin)
            };
            engine
                .fileset
                .write_f64_at(file, byte_begin - swin::PAYLOAD_TO_WEIGHT, 0.0)?;
            engine.fileset.flush(file)?;
        }
        Ok(())
    }
}
