//! # Utility Functions and Types
//!
//! Low-level helpers shared by the TS and AAC layers:
//!
//! - Bit-level reading for unaligned AAC syntax elements
//! - CRC-32/MPEG-2 for PSI section validation
//!
//! ## Bit Operations
//!
//! ```rust
//! use tsaudio::utils::BitReader;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let data = vec![0b10110011u8];
//! let mut reader = BitReader::new(&data);
//!
//! let value = reader.read_bits(3)?; // Reads first 3 bits (101)
//! assert_eq!(value, 0b101);
//! # Ok(())
//! # }
//! ```

/// Bitstream reading utilities
pub mod bits;

/// CRC calculation implementations
pub mod crc;

pub use bits::BitReader;
pub use crc::Crc32Mpeg2;

/// Formats bytes as space separated hex, 16 per line, for debug logs.
pub fn hex_dump(data: &[u8]) -> String {
    data.chunks(16)
        .map(|line| {
            line.iter()
                .map(|b| format!("{:02x}", b))
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_dump() {
        assert_eq!(hex_dump(&[0x12, 0x10]), "12 10");
        let long: Vec<u8> = (0u8..18).collect();
        let dump = hex_dump(&long);
        assert_eq!(dump.lines().count(), 2);
        assert!(dump.ends_with("10 11"));
    }
}
