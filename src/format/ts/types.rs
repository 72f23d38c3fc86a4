use crate::av::MuxingType;
use crate::error::Result;
use bytes::{BufMut, BytesMut};

// Packet layout
pub const TS_PACKET_SIZE: usize = 188;
pub const M2TS_PACKET_SIZE: usize = 192;
pub const M2TS_PREFIX_SIZE: usize = M2TS_PACKET_SIZE - TS_PACKET_SIZE;
pub const TS_HEADER_SIZE: usize = 4;
pub const TS_SYNC_BYTE: u8 = 0x47;

// PIDs
pub const PID_PAT: u16 = 0x0000;

// Table IDs
pub const TABLE_ID_PAT: u8 = 0x00;
pub const TABLE_ID_PMT: u8 = 0x02;

// Elementary Stream Types
pub const STREAM_TYPE_MPEG1_AUDIO: u8 = 0x03;
pub const STREAM_TYPE_MPEG2_AUDIO: u8 = 0x04;
pub const STREAM_TYPE_PRIVATE_PES: u8 = 0x06;
pub const STREAM_TYPE_AAC: u8 = 0x0f;
pub const STREAM_TYPE_AAC_LATM: u8 = 0x11;
pub const STREAM_TYPE_AC3: u8 = 0x81;
pub const STREAM_TYPE_EAC3: u8 = 0x87;

pub const PTS_HZ: u64 = 90_000;

/// How an audio stream type is carried, `None` for non-audio types.
pub fn muxing_for_stream_type(stream_type: u8) -> Option<MuxingType> {
    match stream_type {
        STREAM_TYPE_AAC => Some(MuxingType::Adts),
        STREAM_TYPE_AAC_LATM => Some(MuxingType::Latm),
        STREAM_TYPE_MPEG1_AUDIO
        | STREAM_TYPE_MPEG2_AUDIO
        | STREAM_TYPE_PRIVATE_PES
        | STREAM_TYPE_AC3
        | STREAM_TYPE_EAC3 => Some(MuxingType::Raw),
        _ => None,
    }
}

/// An audio elementary stream announced by the PMT.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackInfo {
    pub pid: u16,
    pub stream_type: u8,
    pub muxing: MuxingType,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PATEntry {
    pub program_number: u16,
    pub network_pid: u16,
    pub program_map_pid: u16,
}

#[derive(Debug, Clone, Default)]
pub struct PAT {
    pub entries: Vec<PATEntry>,
}

impl PAT {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// First entry describing a real program (number 0 is the network PID).
    pub fn first_program(&self) -> Option<&PATEntry> {
        self.entries.iter().find(|e| e.program_number != 0)
    }

    pub fn write_to(&self, buf: &mut BytesMut) -> Result<()> {
        for entry in &self.entries {
            buf.put_u16(entry.program_number);
            if entry.program_number == 0 {
                buf.put_u16(entry.network_pid & 0x1fff | 7 << 13);
            } else {
                buf.put_u16(entry.program_map_pid & 0x1fff | 7 << 13);
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descriptor {
    pub tag: u8,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementaryStreamInfo {
    pub stream_type: u8,
    pub elementary_pid: u16,
    pub descriptors: Vec<Descriptor>,
}

#[derive(Debug, Clone, Default)]
pub struct PMT {
    pub pcr_pid: u16,
    pub program_descriptors: Vec<Descriptor>,
    pub elementary_stream_infos: Vec<ElementaryStreamInfo>,
}

impl PMT {
    pub fn new() -> Self {
        Self {
            pcr_pid: 0,
            program_descriptors: Vec::new(),
            elementary_stream_infos: Vec::new(),
        }
    }

    /// Audio streams of this program, in PMT order.
    pub fn audio_tracks(&self) -> Vec<TrackInfo> {
        self.elementary_stream_infos
            .iter()
            .filter_map(|info| {
                muxing_for_stream_type(info.stream_type).map(|muxing| TrackInfo {
                    pid: info.elementary_pid,
                    stream_type: info.stream_type,
                    muxing,
                })
            })
            .collect()
    }

    pub fn write_to(&self, buf: &mut BytesMut) -> Result<()> {
        buf.put_u16(self.pcr_pid & 0x1fff | 7 << 13);

        let prog_desc_len = self
            .program_descriptors
            .iter()
            .map(|d| 2 + d.data.len())
            .sum::<usize>();
        buf.put_u16((prog_desc_len as u16) & 0x3ff | 0xf << 12);

        for desc in &self.program_descriptors {
            buf.put_u8(desc.tag);
            buf.put_u8(desc.data.len() as u8);
            buf.put_slice(&desc.data);
        }

        for info in &self.elementary_stream_infos {
            buf.put_u8(info.stream_type);
            buf.put_u16(info.elementary_pid & 0x1fff | 7 << 13);

            let es_desc_len = info
                .descriptors
                .iter()
                .map(|d| 2 + d.data.len())
                .sum::<usize>();
            buf.put_u16((es_desc_len as u16) & 0x3ff | 0xf << 12);

            for desc in &info.descriptors {
                buf.put_u8(desc.tag);
                buf.put_u8(desc.data.len() as u8);
                buf.put_slice(&desc.data);
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct AdaptationField {
    pub length: usize,
    pub discontinuity: bool,
    pub random_access: bool,
    pub pcr: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TSHeader {
    pub sync_byte: u8, // Always 0x47
    pub transport_error: bool,
    pub payload_unit_start: bool,
    pub transport_priority: bool,
    pub pid: u16,
    pub scrambling_control: u8,
    pub adaptation_field_exists: bool,
    pub contains_payload: bool,
    pub continuity_counter: u8,
}

impl Default for TSHeader {
    fn default() -> Self {
        Self {
            sync_byte: TS_SYNC_BYTE,
            transport_error: false,
            payload_unit_start: false,
            transport_priority: false,
            pid: 0,
            scrambling_control: 0,
            adaptation_field_exists: false,
            contains_payload: true,
            continuity_counter: 0,
        }
    }
}

impl TSHeader {
    pub fn write_to(&self, buf: &mut BytesMut) -> Result<()> {
        buf.put_u8(self.sync_byte);

        let mut b1 = 0u8;
        if self.transport_error {
            b1 |= 0x80;
        }
        if self.payload_unit_start {
            b1 |= 0x40;
        }
        if self.transport_priority {
            b1 |= 0x20;
        }
        b1 |= ((self.pid >> 8) & 0x1f) as u8;
        buf.put_u8(b1);

        buf.put_u8((self.pid & 0xff) as u8);

        let mut b3 = self.scrambling_control << 6;
        if self.adaptation_field_exists {
            b3 |= 0x20;
        }
        if self.contains_payload {
            b3 |= 0x10;
        }
        b3 |= self.continuity_counter & 0x0f;
        buf.put_u8(b3);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_stream_type_mapping() {
        assert_eq!(muxing_for_stream_type(0x0f), Some(MuxingType::Adts));
        assert_eq!(muxing_for_stream_type(0x11), Some(MuxingType::Latm));
        assert_eq!(muxing_for_stream_type(0x03), Some(MuxingType::Raw));
        assert_eq!(muxing_for_stream_type(0x81), Some(MuxingType::Raw));
        assert_eq!(muxing_for_stream_type(0x1b), None);
    }

    #[test]
    fn test_pmt_audio_tracks() {
        let pmt = PMT {
            pcr_pid: 0x100,
            program_descriptors: Vec::new(),
            elementary_stream_infos: vec![
                ElementaryStreamInfo {
                    stream_type: 0x1b,
                    elementary_pid: 0x100,
                    descriptors: Vec::new(),
                },
                ElementaryStreamInfo {
                    stream_type: STREAM_TYPE_AAC_LATM,
                    elementary_pid: 0x101,
                    descriptors: Vec::new(),
                },
            ],
        };
        assert_eq!(
            pmt.audio_tracks(),
            vec![TrackInfo {
                pid: 0x101,
                stream_type: 0x11,
                muxing: MuxingType::Latm
            }]
        );
    }

    #[test]
    fn test_header_write() {
        let header = TSHeader {
            payload_unit_start: true,
            pid: 0x1234,
            continuity_counter: 5,
            ..Default::default()
        };
        let mut buf = BytesMut::new();
        header.write_to(&mut buf).unwrap();
        assert_eq!(&buf[..], &[0x47, 0x52, 0x34, 0x15]);
    }
}
