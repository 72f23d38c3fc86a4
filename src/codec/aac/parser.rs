use super::types::{
    is_general_audio, sample_rate_from_index, ADTSHeader, AudioSpecificConfig, ProfileType,
    SbrSignal,
};
use crate::utils::BitReader;
use crate::{Result, TsAudioError};

/// True when `data` starts with an ADTS syncword.
pub fn is_adts_sync(data: &[u8]) -> bool {
    data.len() >= 2 && data[0] == 0xFF && (data[1] & 0xF0) == 0xF0
}

impl ADTSHeader {
    /// Parses and sanity checks the 7 byte fixed+variable ADTS header.
    pub fn parse(data: &[u8]) -> Result<ADTSHeader> {
        if data.len() < Self::MIN_SIZE {
            return Err(TsAudioError::Parser("ADTS header too short".into()));
        }

        let mut reader = BitReader::new(data);

        let sync_word = reader.read_bits(12)?;
        if sync_word != 0xFFF {
            return Err(TsAudioError::Parser("Invalid ADTS sync word".into()));
        }

        let id = reader.read_bits(1)? as u8;
        let layer = reader.read_bits(2)? as u8;
        if layer != 0 {
            return Err(TsAudioError::Parser(format!("Invalid ADTS layer {}", layer)));
        }
        let protection_absent = reader.read_bits(1)? == 1;

        let profile = ProfileType::from(reader.read_bits(2)? as u8);

        let sample_rate_index = reader.read_bits(4)? as u8;
        if sample_rate_from_index(sample_rate_index).is_none() {
            return Err(TsAudioError::Parser(format!(
                "Invalid ADTS sampling frequency index {}",
                sample_rate_index
            )));
        }
        let private_bit = reader.read_bits(1)? == 1;
        let channel_configuration = reader.read_bits(3)? as u8;
        let original_copy = reader.read_bits(1)? == 1;
        let home = reader.read_bits(1)? == 1;

        let copyright_id_bit = reader.read_bits(1)? == 1;
        let copyright_id_start = reader.read_bits(1)? == 1;
        let frame_length = reader.read_bits(13)? as u16;
        let buffer_fullness = reader.read_bits(11)? as u16;
        let number_of_raw_blocks = reader.read_bits(2)? as u8;

        let header = ADTSHeader {
            sync_word,
            id,
            layer,
            protection_absent,
            profile,
            sample_rate_index,
            private_bit,
            channel_configuration,
            original_copy,
            home,
            copyright_id_bit,
            copyright_id_start,
            frame_length,
            buffer_fullness,
            number_of_raw_blocks,
        };

        if (header.frame_length as usize) < header.header_len() {
            return Err(TsAudioError::Parser(format!(
                "ADTS frame length {} shorter than its header",
                header.frame_length
            )));
        }

        Ok(header)
    }
}

fn read_object_type(reader: &mut BitReader) -> Result<u16> {
    let object_type = reader.read_bits(5)? as u16;
    if object_type == 31 {
        return Ok(32 + reader.read_bits(6)? as u16);
    }
    Ok(object_type)
}

fn read_frequency(reader: &mut BitReader) -> Result<(u8, u32)> {
    let index = reader.read_bits(4)? as u8;
    if index == 0x0F {
        return Ok((index, reader.read_bits(24)?));
    }
    let rate = sample_rate_from_index(index).ok_or_else(|| {
        TsAudioError::Parser(format!("Reserved sampling frequency index {}", index))
    })?;
    Ok((index, rate))
}

impl AudioSpecificConfig {
    pub fn parse(data: &[u8]) -> Result<AudioSpecificConfig> {
        let mut reader = BitReader::new(data);
        Self::read(&mut reader)
    }

    /// Reads an AudioSpecificConfig in place, leaving `reader` right after it.
    ///
    /// Only general audio object types are understood; anything else cannot be
    /// skipped reliably inside a StreamMuxConfig and is reported as an error.
    pub fn read(reader: &mut BitReader) -> Result<AudioSpecificConfig> {
        let mut object_type = read_object_type(reader)?;
        let (sample_rate_index, sample_rate) = read_frequency(reader)?;
        let channel_configuration = reader.read_bits(4)? as u8;

        let mut sbr = None;
        if object_type == 5 || object_type == 29 {
            let (ext_index, ext_rate) = read_frequency(reader)?;
            sbr = Some(SbrSignal {
                object_type,
                sample_rate_index: ext_index,
                sample_rate: ext_rate,
            });
            object_type = read_object_type(reader)?;
        }

        if !is_general_audio(object_type) {
            return Err(TsAudioError::Codec(format!(
                "Unsupported audio object type {}",
                object_type
            )));
        }

        // GASpecificConfig
        let frame_length_flag = reader.read_bit()?;
        if reader.read_bit()? {
            reader.skip_bits(14)?; // coreCoderDelay
        }
        let extension_flag = reader.read_bit()?;
        if channel_configuration == 0 {
            return Err(TsAudioError::Codec(
                "program_config_element channel layouts are not supported".into(),
            ));
        }
        if object_type == 6 || object_type == 20 {
            reader.skip_bits(3)?; // layerNr
        }
        if extension_flag {
            if object_type == 22 {
                reader.skip_bits(5 + 11)?; // numOfSubFrame, layer_length
            }
            if matches!(object_type, 17 | 19 | 20 | 23) {
                reader.skip_bits(3)?; // resilience flags
            }
            reader.skip_bits(1)?; // extensionFlag3
        }

        Ok(AudioSpecificConfig {
            object_type,
            sample_rate_index,
            sample_rate,
            channel_configuration,
            sbr,
            frame_length_flag,
        })
    }
}
