use crate::error::{Result, TsAudioError};

/// A bit-level reader for MSB-first bitstreams.
///
/// Used for the AAC syntax elements (ADTS headers, StreamMuxConfig,
/// AudioSpecificConfig) where fields are packed without byte alignment.
///
/// Example:
/// ```
/// use tsaudio::utils::BitReader;
///
/// let data = [0b10110011];
/// let mut reader = BitReader::new(&data);
///
/// assert_eq!(reader.read_bit().unwrap(), true);   // 1
/// assert_eq!(reader.read_bits(3).unwrap(), 0b011); // 011
/// ```
pub struct BitReader<'a> {
    data: &'a [u8],
    byte_offset: usize,
    bit_offset: u8,
}

impl<'a> BitReader<'a> {
    /// Creates a new BitReader from a byte slice
    pub fn new(data: &'a [u8]) -> Self {
        BitReader {
            data,
            byte_offset: 0,
            bit_offset: 0,
        }
    }

    /// Reads a single bit from the stream.
    /// Returns true for 1, false for 0.
    ///
    /// Returns error if end of data is reached.
    pub fn read_bit(&mut self) -> Result<bool> {
        if self.byte_offset >= self.data.len() {
            return Err(TsAudioError::Codec("Reached end of bitstream".into()));
        }

        let bit = (self.data[self.byte_offset] >> (7 - self.bit_offset)) & 1;
        self.bit_offset += 1;

        if self.bit_offset == 8 {
            self.bit_offset = 0;
            self.byte_offset += 1;
        }

        Ok(bit == 1)
    }

    /// Reads n bits and returns them as a big-endian number.
    ///
    /// Returns error if n > 32 or fewer than n bits remain. On error the
    /// reader position is left untouched.
    pub fn read_bits(&mut self, n: u32) -> Result<u32> {
        if n > 32 {
            return Err(TsAudioError::Codec("Too many bits requested".into()));
        }
        if n as usize > self.available_bits() {
            return Err(TsAudioError::Codec(format!(
                "Requested {} bits, only {} left",
                n,
                self.available_bits()
            )));
        }

        let mut value = 0u64;
        let mut remaining = n;
        while remaining > 0 {
            let in_byte = 8 - self.bit_offset as u32;
            let take = in_byte.min(remaining);
            let shift = in_byte - take;
            let mask = ((1u32 << take) - 1) as u8;
            let bits = (self.data[self.byte_offset] >> shift) & mask;
            value = (value << take) | bits as u64;

            remaining -= take;
            self.bit_offset += take as u8;
            if self.bit_offset == 8 {
                self.bit_offset = 0;
                self.byte_offset += 1;
            }
        }

        Ok(value as u32)
    }

    /// Reads a single byte that may straddle a byte boundary.
    pub fn read_u8(&mut self) -> Result<u8> {
        self.read_bits(8).map(|v| v as u8)
    }

    /// Reads `len` bytes starting at the current bit position.
    ///
    /// LATM payloads follow their headers without byte alignment, so this
    /// takes the fast path only when the reader happens to be aligned.
    pub fn read_bytes(&mut self, out: &mut [u8]) -> Result<()> {
        if out.len() * 8 > self.available_bits() {
            return Err(TsAudioError::Codec(format!(
                "Requested {} bytes, only {} bits left",
                out.len(),
                self.available_bits()
            )));
        }

        if self.bit_offset == 0 {
            let end = self.byte_offset + out.len();
            out.copy_from_slice(&self.data[self.byte_offset..end]);
            self.byte_offset = end;
            return Ok(());
        }

        for byte in out.iter_mut() {
            *byte = self.read_u8()?;
        }
        Ok(())
    }

    /// Skips n bits in the stream.
    pub fn skip_bits(&mut self, n: usize) -> Result<()> {
        if n > self.available_bits() {
            return Err(TsAudioError::Codec(format!(
                "Cannot skip {} bits, only {} left",
                n,
                self.available_bits()
            )));
        }
        let absolute = self.position() + n;
        self.byte_offset = absolute / 8;
        self.bit_offset = (absolute % 8) as u8;
        Ok(())
    }

    /// Aligns reader to next byte boundary by skipping remaining bits in current byte.
    pub fn align_byte(&mut self) {
        if self.bit_offset != 0 {
            self.bit_offset = 0;
            self.byte_offset += 1;
        }
    }

    /// Current position in bits from the start of the data.
    pub fn position(&self) -> usize {
        self.byte_offset * 8 + self.bit_offset as usize
    }

    /// Returns number of bits available to read.
    pub fn available_bits(&self) -> usize {
        (self.data.len() * 8).saturating_sub(self.position())
    }
}

#[cfg(test)]
pub(crate) mod test_utils {
    /// MSB-first bit packer used to build AAC syntax in tests.
    #[derive(Default)]
    pub struct BitWriter {
        data: Vec<u8>,
        bits: usize,
    }

    impl BitWriter {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn write(&mut self, n: u32, value: u32) {
            for i in (0..n).rev() {
                if self.bits % 8 == 0 {
                    self.data.push(0);
                }
                if (value >> i) & 1 == 1 {
                    let last = self.data.len() - 1;
                    self.data[last] |= 1 << (7 - (self.bits % 8));
                }
                self.bits += 1;
            }
        }

        pub fn write_bytes(&mut self, bytes: &[u8]) {
            for &b in bytes {
                self.write(8, b as u32);
            }
        }

        pub fn bit_len(&self) -> usize {
            self.bits
        }

        pub fn finish(self) -> Vec<u8> {
            self.data
        }
    }
}
