/// CRC-32/MPEG-2 used by PSI sections (PAT, PMT).
/// ITU-T H.222.0 / ISO/IEC 13818-1 Annex A: polynomial 0x04C11DB7,
/// initial value 0xFFFFFFFF, no reflection, no final xor.
const CRC32_MPEG2_POLY: u32 = 0x04C11DB7;

const CRC32_MPEG2_TABLE: [u32; 256] = build_table();

const fn build_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = (i as u32) << 24;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 0x8000_0000 != 0 {
                (crc << 1) ^ CRC32_MPEG2_POLY
            } else {
                crc << 1
            };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

/// Stateless MPEG-2 CRC32 calculator.
///
/// ```
/// use tsaudio::utils::Crc32Mpeg2;
///
/// assert_eq!(Crc32Mpeg2::calculate(&[0x01, 0x01]), 0xD66FB816);
/// ```
pub struct Crc32Mpeg2;

impl Crc32Mpeg2 {
    /// Calculates the checksum of `data`.
    pub fn calculate(data: &[u8]) -> u32 {
        data.iter().fold(0xFFFF_FFFF, |crc, &byte| {
            let index = ((crc >> 24) ^ byte as u32) & 0xFF;
            (crc << 8) ^ CRC32_MPEG2_TABLE[index as usize]
        })
    }

    /// Checks a complete PSI section whose last four bytes are the CRC field.
    ///
    /// Running the CRC over a section including its own checksum yields zero.
    pub fn verify_section(section: &[u8]) -> bool {
        section.len() >= 4 && Self::calculate(section) == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_vector() {
        assert_eq!(Crc32Mpeg2::calculate(&[0x01, 0x01]), 0xD66FB816);
        assert_eq!(Crc32Mpeg2::calculate(&[]), 0xFFFF_FFFF);
    }

    #[test]
    fn test_verify_section() {
        let mut pat = vec![
            0x00, 0xB0, 0x0D, // table id, section length 13
            0x00, 0x01, 0xC1, 0x00, 0x00, // ts id, version, section numbers
            0x00, 0x01, 0xF0, 0x00, // program 1 -> PMT PID 0x1000
        ];
        let crc = Crc32Mpeg2::calculate(&pat);
        pat.extend_from_slice(&crc.to_be_bytes());
        assert!(Crc32Mpeg2::verify_section(&pat));

        pat[9] ^= 0x01;
        assert!(!Crc32Mpeg2::verify_section(&pat));
        assert!(!Crc32Mpeg2::verify_section(&[0x00, 0x00]));
    }
}
