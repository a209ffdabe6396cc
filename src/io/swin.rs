//! Reading and patching of DiFX SWIN visibility records.
//!
//! # SWIN format
//!
//! A SWIN output file is a concatenation of visibility records, one per
//! (baseline, timestamp, frequency band, polarization product). Each record is
//! a fixed 74-byte header span followed by one complex `f32` sample per
//! channel, all little-endian:
//!
//! | offset | size | field |
//! |--------|------|-------|
//! | 0      | 4    | sync word |
//! | 4      | 4    | binary-header version |
//! | 8      | 4    | baseline id (`ant1 * 256 + ant2`) |
//! | 12     | 4    | MJD (integer days) |
//! | 16     | 8    | seconds within day |
//! | 24     | 4    | config index |
//! | 28     | 4    | source index |
//! | 32     | 4    | frequency index |
//! | 36     | 2    | polarization label pair |
//! | 38     | 4    | pulsar bin |
//! | 42     | 8    | data weight |
//! | 50     | 24   | UVW (3 × f64, metres) |
//! | 74     | 8×N  | payload, `Complex<f32>` per channel |
//!
//! The engine consumes records in place: headers are parsed sequentially, and
//! only the two polarization label bytes and the weight field are ever
//! rewritten inside the header span.

use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::marlu::num_complex::Complex;

/// Synchronization word at the start of every record.
pub const SYNC_WORD: i32 = 0xFF00_FF00_u32 as i32;

/// The binary header version this codec understands.
pub const BINARY_HEADER_VERSION: i32 = 1;

/// Byte length of one record span up to (and excluding) the payload.
pub const RECORD_OVERHEAD: u64 = 74;

/// Byte length of the header fields after the sync and version words.
pub const HEADER_BODY_LEN: u64 = RECORD_OVERHEAD - FIRST_HEADER_OFFSET;

/// Offset of the first header body in a file, past the leading sync and
/// version words. Subsequent header bodies sit 8 bytes past the previous
/// record's payload for the same reason.
pub const FIRST_HEADER_OFFSET: u64 = 8;

/// Distance from the start of a record's payload back to its weight field.
pub const PAYLOAD_TO_WEIGHT: u64 = 32;

/// Distance from the start of a record's payload back to its polarization
/// label pair.
pub const PAYLOAD_TO_POLPAIR: u64 = 38;

/// One parsed SWIN record header (sync and version words excluded).
#[derive(Debug, Clone, PartialEq)]
pub struct SwinRecordHeader {
    /// Packed antenna pair, `ant1 * 256 + ant2`, antennas numbered from 1.
    pub baseline: i32,
    /// Integer Modified Julian Date of the integration.
    pub mjd: i32,
    /// Seconds within the MJD.
    pub seconds: f64,
    /// Correlator configuration index.
    pub config_index: i32,
    /// Source (field) index.
    pub source_index: i32,
    /// Frequency band index, in the numbering of the file.
    pub freq_index: i32,
    /// Polarization labels for each end of the baseline.
    pub pol_pair: [u8; 2],
    /// Pulsar bin index.
    pub pulsar_bin: i32,
    /// Data weight.
    pub weight: f64,
    /// Baseline vector (u, v, w) in metres.
    pub uvw: [f64; 3],
}

impl SwinRecordHeader {
    /// Parse the [`HEADER_BODY_LEN`] bytes of header fields from a reader
    /// positioned just past a record's sync and version words.
    ///
    /// # Errors
    ///
    /// Propagates any read failure, including `UnexpectedEof` on a truncated
    /// header, which callers treat as the end of the stream.
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self, std::io::Error> {
        let baseline = reader.read_i32::<LittleEndian>()?;
        let mjd = reader.read_i32::<LittleEndian>()?;
        let seconds = reader.read_f64::<LittleEndian>()?;
        let config_index = reader.read_i32::<LittleEndian>()?;
        let source_index = reader.read_i32::<LittleEndian>()?;
        let freq_index = reader.read_i32::<LittleEndian>()?;
        let mut pol_pair = [0_u8; 2];
        reader.read_exact(&mut pol_pair)?;
        let pulsar_bin = reader.read_i32::<LittleEndian>()?;
        let weight = reader.read_f64::<LittleEndian>()?;
        let mut uvw = [0.0_f64; 3];
        reader.read_f64_into::<LittleEndian>(&mut uvw)?;
        Ok(Self {
            baseline,
            mjd,
            seconds,
            config_index,
            source_index,
            freq_index,
            pol_pair,
            pulsar_bin,
            weight,
            uvw,
        })
    }

    /// Write the header fields, preceded by the sync and version words, so
    /// that the writer advances by a full [`RECORD_OVERHEAD`] bytes.
    ///
    /// # Errors
    ///
    /// Propagates any write failure.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<(), std::io::Error> {
        writer.write_i32::<LittleEndian>(SYNC_WORD)?;
        writer.write_i32::<LittleEndian>(BINARY_HEADER_VERSION)?;
        writer.write_i32::<LittleEndian>(self.baseline)?;
        writer.write_i32::<LittleEndian>(self.mjd)?;
        writer.write_f64::<LittleEndian>(self.seconds)?;
        writer.write_i32::<LittleEndian>(self.config_index)?;
        writer.write_i32::<LittleEndian>(self.source_index)?;
        writer.write_i32::<LittleEndian>(self.freq_index)?;
        writer.write_all(&self.pol_pair)?;
        writer.write_i32::<LittleEndian>(self.pulsar_bin)?;
        writer.write_f64::<LittleEndian>(self.weight)?;
        for &x in &self.uvw {
            writer.write_f64::<LittleEndian>(x)?;
        }
        Ok(())
    }

    /// Antenna ids (numbered from 1) unpacked from the baseline field.
    pub fn antennas(&self) -> [i32; 2] {
        [self.baseline / 256, self.baseline % 256]
    }
}

/// Read one complex spectrum of `num_channels` samples.
///
/// # Errors
///
/// Propagates any read failure.
pub fn read_spectrum<R: Read>(
    reader: &mut R,
    num_channels: usize,
) -> Result<Vec<Complex<f32>>, std::io::Error> {
    let mut raw = vec![0.0_f32; 2 * num_channels];
    reader.read_f32_into::<LittleEndian>(&mut raw)?;
    Ok(raw
        .chunks_exact(2)
        .map(|pair| Complex::new(pair[0], pair[1]))
        .collect())
}

/// Write one complex spectrum.
///
/// # Errors
///
/// Propagates any write failure.
pub fn write_spectrum<W: Write>(
    writer: &mut W,
    spectrum: &[Complex<f32>],
) -> Result<(), std::io::Error> {
    for sample in spectrum {
        writer.write_f32::<LittleEndian>(sample.re)?;
        writer.write_f32::<LittleEndian>(sample.im)?;
    }
    Ok(())
}

/// Write a complete record: sync and version words, header body, payload.
///
/// # Errors
///
/// Propagates any write failure.
pub fn write_record<W: Write>(
    writer: &mut W,
    header: &SwinRecordHeader,
    payload: &[Complex<f32>],
) -> Result<(), std::io::Error> {
    header.write_to(writer)?;
    write_spectrum(writer, payload)
}
