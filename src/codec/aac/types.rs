#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileType {
    Main = 0,
    LC = 1,
    SSR = 2,
    LTP = 3,
}

impl From<u8> for ProfileType {
    fn from(value: u8) -> Self {
        match value & 0x03 {
            0 => ProfileType::Main,
            1 => ProfileType::LC,
            2 => ProfileType::SSR,
            _ => ProfileType::LTP,
        }
    }
}

impl ProfileType {
    /// MPEG-4 audio object type for this MPEG-2 profile.
    pub fn object_type(self) -> u16 {
        self as u16 + 1
    }
}

/// Sampling frequency for a 4-bit sampling_frequency_index.
pub fn sample_rate_from_index(index: u8) -> Option<u32> {
    match index {
        0 => Some(96000),
        1 => Some(88200),
        2 => Some(64000),
        3 => Some(48000),
        4 => Some(44100),
        5 => Some(32000),
        6 => Some(24000),
        7 => Some(22050),
        8 => Some(16000),
        9 => Some(12000),
        10 => Some(11025),
        11 => Some(8000),
        12 => Some(7350),
        _ => None,
    }
}

/// Stream parameters recovered from the first ADTS header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AACConfig {
    pub profile: ProfileType,
    pub sample_rate_index: u8,
    pub channel_configuration: u8,
    pub frame_length: u16,
}

impl Default for AACConfig {
    fn default() -> Self {
        Self {
            profile: ProfileType::LC,
            sample_rate_index: 4, // 44100 Hz
            channel_configuration: 2, // Stereo
            frame_length: 1024,
        }
    }
}

impl AACConfig {
    pub fn sample_rate(&self) -> Option<u32> {
        sample_rate_from_index(self.sample_rate_index)
    }

    /// Equivalent MPEG-4 AudioSpecificConfig, used as decoder extra data.
    pub fn to_audio_specific_config(&self) -> AudioSpecificConfig {
        AudioSpecificConfig {
            object_type: self.profile.object_type(),
            sample_rate_index: self.sample_rate_index,
            sample_rate: self.sample_rate().unwrap_or(0),
            channel_configuration: self.channel_configuration,
            sbr: None,
            frame_length_flag: self.frame_length == 960,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ADTSHeader {
    pub sync_word: u32,          // 12 bits
    pub id: u8,                  // 1 bit, 0=MPEG-4, 1=MPEG-2
    pub layer: u8,               // 2 bits
    pub protection_absent: bool,  // 1 bit
    pub profile: ProfileType,    // 2 bits
    pub sample_rate_index: u8,   // 4 bits
    pub private_bit: bool,       // 1 bit
    pub channel_configuration: u8,// 3 bits
    pub original_copy: bool,     // 1 bit
    pub home: bool,              // 1 bit
    pub copyright_id_bit: bool,  // 1 bit
    pub copyright_id_start: bool,// 1 bit
    pub frame_length: u16,       // 13 bits, header included
    pub buffer_fullness: u16,    // 11 bits
    pub number_of_raw_blocks: u8,// 2 bits
}

impl ADTSHeader {
    pub const MIN_SIZE: usize = 7;

    /// Builds a header for an AAC payload of `payload_len` bytes.
    pub fn for_payload(config: &AACConfig, payload_len: usize) -> Self {
        Self {
            sync_word: 0xFFF,
            id: 0,
            layer: 0,
            protection_absent: true,
            profile: config.profile,
            sample_rate_index: config.sample_rate_index,
            private_bit: false,
            channel_configuration: config.channel_configuration,
            original_copy: false,
            home: false,
            copyright_id_bit: false,
            copyright_id_start: false,
            frame_length: (payload_len + Self::MIN_SIZE) as u16,
            buffer_fullness: 0x7FF, // variable bit rate
            number_of_raw_blocks: 0,
        }
    }

    pub fn sync_word_valid(&self) -> bool {
        self.sync_word == 0xFFF
    }

    pub fn sample_rate(&self) -> Option<u32> {
        sample_rate_from_index(self.sample_rate_index)
    }

    /// Header size in bytes, including the CRC when present.
    pub fn header_len(&self) -> usize {
        if self.protection_absent {
            7
        } else {
            9
        }
    }

    pub fn config(&self) -> AACConfig {
        AACConfig {
            profile: self.profile,
            sample_rate_index: self.sample_rate_index,
            channel_configuration: self.channel_configuration,
            frame_length: 1024,
        }
    }

    /// Serializes the fixed and variable header (7 bytes, no CRC).
    pub fn to_bytes(&self) -> [u8; 7] {
        let mut bits: u64 = 0;
        let mut push = |n: u32, v: u64| bits = (bits << n) | (v & ((1u64 << n) - 1));
        push(12, self.sync_word as u64);
        push(1, self.id as u64);
        push(2, self.layer as u64);
        push(1, self.protection_absent as u64);
        push(2, self.profile as u64);
        push(4, self.sample_rate_index as u64);
        push(1, self.private_bit as u64);
        push(3, self.channel_configuration as u64);
        push(1, self.original_copy as u64);
        push(1, self.home as u64);
        push(1, self.copyright_id_bit as u64);
        push(1, self.copyright_id_start as u64);
        push(13, self.frame_length as u64);
        push(11, self.buffer_fullness as u64);
        push(2, self.number_of_raw_blocks as u64);

        let be = bits.to_be_bytes();
        let mut out = [0u8; 7];
        out.copy_from_slice(&be[1..]);
        out
    }
}

/// Explicitly signalled SBR/PS extension of an AudioSpecificConfig.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SbrSignal {
    /// 5 (SBR) or 29 (PS)
    pub object_type: u16,
    pub sample_rate_index: u8,
    pub sample_rate: u32,
}

/// MPEG-4 AudioSpecificConfig (ISO/IEC 14496-3 1.6.2.1), general audio subset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioSpecificConfig {
    pub object_type: u16,
    pub sample_rate_index: u8,
    pub sample_rate: u32,
    pub channel_configuration: u8,
    pub sbr: Option<SbrSignal>,
    /// 960 sample frames when set, 1024 otherwise
    pub frame_length_flag: bool,
}

/// Object types carrying a GASpecificConfig.
pub(crate) fn is_general_audio(object_type: u16) -> bool {
    matches!(object_type, 1..=4 | 6 | 7 | 17 | 19..=23)
}

impl AudioSpecificConfig {
    /// Serializes back to bytes, zero padded to a byte boundary.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut fields: Vec<(u32, u32)> = Vec::new();
        let object_type = |fields: &mut Vec<(u32, u32)>, aot: u16| {
            if aot > 31 {
                fields.push((5, 31));
                fields.push((6, (aot - 32) as u32));
            } else {
                fields.push((5, aot as u32));
            }
        };
        let frequency = |fields: &mut Vec<(u32, u32)>, index: u8, rate: u32| {
            fields.push((4, index as u32));
            if index == 0x0F {
                fields.push((24, rate));
            }
        };

        match &self.sbr {
            Some(sbr) => {
                object_type(&mut fields, sbr.object_type);
                frequency(&mut fields, self.sample_rate_index, self.sample_rate);
                fields.push((4, self.channel_configuration as u32));
                frequency(&mut fields, sbr.sample_rate_index, sbr.sample_rate);
                object_type(&mut fields, self.object_type);
            }
            None => {
                object_type(&mut fields, self.object_type);
                frequency(&mut fields, self.sample_rate_index, self.sample_rate);
                fields.push((4, self.channel_configuration as u32));
            }
        }

        if is_general_audio(self.object_type) {
            fields.push((1, self.frame_length_flag as u32));
            fields.push((1, 0)); // dependsOnCoreCoder
            fields.push((1, 0)); // extensionFlag
        }

        let mut out = Vec::new();
        let mut acc: u8 = 0;
        let mut used = 0;
        for (n, value) in fields {
            for i in (0..n).rev() {
                acc = (acc << 1) | ((value >> i) & 1) as u8;
                used += 1;
                if used == 8 {
                    out.push(acc);
                    acc = 0;
                    used = 0;
                }
            }
        }
        if used > 0 {
            out.push(acc << (8 - used));
        }
        out
    }
}
