//! MSB-first bit packing for the compressed levels.

use bitbit::{BitReader, BitWriter, MSB};

use crate::error::DecodeError;

/// Counts the bits it writes so the caller can record the final padding.
pub(super) struct BitSink<'a> {
    writer: BitWriter<&'a mut Vec<u8>>,
    written: usize,
}

impl BitSink<'_> {
    /// Appends the low `width` bits of `value`.
    pub(super) fn write(&mut self, value: u32, width: u8) -> Result<(), DecodeError> {
        if width == 0 {
            return Ok(());
        }
        self.writer
            .write_bits(value, width as usize)
            .map_err(|_| DecodeError::InvalidDataDuringDecoding)?;
        self.written += width as usize;
        Ok(())
    }
}

/// Runs `fill` against a fresh sink and returns the bytes plus the number of
/// zero bits padding out the last byte.
pub(super) fn pack<F>(fill: F) -> Result<(Vec<u8>, u8), DecodeError>
where
    F: FnOnce(&mut BitSink<'_>) -> Result<(), DecodeError>,
{
    let mut out = Vec::new();
    let written = {
        let mut sink = BitSink {
            writer: BitWriter::new(&mut out),
            written: 0,
        };
        fill(&mut sink)?;
        if sink.written % 8 != 0 {
            sink.writer
                .pad_to_byte()
                .map_err(|_| DecodeError::InvalidDataDuringDecoding)?;
        }
        sink.written
    };
    out.truncate(written.div_ceil(8));

    let padding = (out.len() * 8)
        .checked_sub(written)
        .filter(|p| *p < 8)
        .ok_or(DecodeError::InvalidDataDuringDecoding)?;
    Ok((out, padding as u8))
}

/// Reads exactly the meaningful bits of a payload, never the padding.
pub(super) struct BitSource<'a> {
    reader: BitReader<&'a [u8], MSB>,
    remaining: usize,
}

impl<'a> BitSource<'a> {
    pub(super) fn new(payload: &'a [u8], padding: u8) -> Result<Self, DecodeError> {
        let remaining = (payload.len() * 8)
            .checked_sub(padding as usize)
            .ok_or(DecodeError::InvalidEncodedGameConstructionData)?;
        Ok(BitSource {
            reader: BitReader::new(payload),
            remaining,
        })
    }

    pub(super) fn is_exhausted(&self) -> bool {
        self.remaining == 0
    }

    pub(super) fn read_bit(&mut self) -> Result<bool, DecodeError> {
        if self.remaining == 0 {
            return Err(DecodeError::InvalidDataDuringDecoding);
        }
        self.remaining -= 1;
        self.reader
            .read_bit()
            .map_err(|_| DecodeError::InvalidDataDuringDecoding)
    }

    pub(super) fn read(&mut self, width: u8) -> Result<u32, DecodeError> {
        let mut value = 0u32;
        for _ in 0..width {
            value = (value << 1) | u32::from(self.read_bit()?);
        }
        Ok(value)
    }
}
