use crate::error::{Result, TsAudioError};
use bytes::{BufMut, BytesMut};

pub const PES_START_CODE: [u8; 3] = [0x00, 0x00, 0x01];
/// start code + stream id + packet length
pub const PES_FIXED_HEADER_SIZE: usize = 6;

// Stream IDs without the optional PES header
const STREAM_ID_PROGRAM_STREAM_MAP: u8 = 0xbc;
const STREAM_ID_PADDING: u8 = 0xbe;
const STREAM_ID_PRIVATE_2: u8 = 0xbf;
const STREAM_ID_ECM: u8 = 0xf0;
const STREAM_ID_EMM: u8 = 0xf1;
const STREAM_ID_DIRECTORY: u8 = 0xff;
const STREAM_ID_DSMCC: u8 = 0xf2;
const STREAM_ID_H222_E: u8 = 0xf8;

/// Packetized Elementary Stream (PES) header structure
///
/// Only the fields needed to locate the payload and its timing are kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PESHeader {
    /// Stream identifier indicating content type (video/audio/etc.)
    pub stream_id: u8,
    /// PES_packet_length, 0 when unbounded
    pub packet_length: u16,
    /// Data alignment indicator
    pub data_alignment: bool,
    /// Length of the header data following the fixed part
    pub header_data_length: u8,
    /// Presentation Time Stamp (33 bits)
    pub pts: Option<u64>,
    /// Decoding Time Stamp (33 bits)
    pub dts: Option<u64>,
}

fn has_optional_header(stream_id: u8) -> bool {
    !matches!(
        stream_id,
        STREAM_ID_PROGRAM_STREAM_MAP
            | STREAM_ID_PADDING
            | STREAM_ID_PRIVATE_2
            | STREAM_ID_ECM
            | STREAM_ID_EMM
            | STREAM_ID_DIRECTORY
            | STREAM_ID_DSMCC
            | STREAM_ID_H222_E
    )
}

impl PESHeader {
    pub fn new(stream_id: u8) -> Self {
        Self {
            stream_id,
            packet_length: 0,
            data_alignment: false,
            header_data_length: 0,
            pts: None,
            dts: None,
        }
    }

    pub fn with_pts(mut self, pts: u64) -> Self {
        self.pts = Some(pts & 0x1_FFFF_FFFF);
        self.header_data_length = self.timestamp_bytes();
        self
    }

    pub fn with_dts(mut self, dts: u64) -> Self {
        self.dts = Some(dts & 0x1_FFFF_FFFF);
        self.header_data_length = self.timestamp_bytes();
        self
    }

    fn timestamp_bytes(&self) -> u8 {
        match (self.pts, self.dts) {
            (Some(_), Some(_)) => 10,
            (Some(_), None) => 5,
            _ => 0,
        }
    }

    /// Parses the header at the start of a PES packet.
    pub fn parse(data: &[u8]) -> Result<PESHeader> {
        if data.len() < PES_FIXED_HEADER_SIZE || data[..3] != PES_START_CODE {
            return Err(TsAudioError::InvalidData("Missing PES start code".into()));
        }

        let mut header = PESHeader::new(data[3]);
        header.packet_length = ((data[4] as u16) << 8) | data[5] as u16;
        if !has_optional_header(header.stream_id) {
            return Ok(header);
        }

        if data.len() < 9 {
            return Err(TsAudioError::InvalidData("PES header too short".into()));
        }
        header.data_alignment = (data[6] & 0x04) != 0;
        let pts_dts_flags = (data[7] >> 6) & 0x03;
        header.header_data_length = data[8];

        let end = 9 + header.header_data_length as usize;
        if data.len() < end {
            return Err(TsAudioError::InvalidData(
                "PES header data exceeds packet".into(),
            ));
        }
        if pts_dts_flags & 0x02 != 0 && end >= 14 {
            header.pts = Some(parse_timestamp(&data[9..14]));
        }
        if pts_dts_flags == 0x03 && end >= 19 {
            header.dts = Some(parse_timestamp(&data[14..19]));
        }
        Ok(header)
    }

    /// Total header size, i.e. the offset of the payload.
    pub fn header_len(&self) -> usize {
        if has_optional_header(self.stream_id) {
            9 + self.header_data_length as usize
        } else {
            PES_FIXED_HEADER_SIZE
        }
    }

    /// Whole packet size announced by PES_packet_length, if bounded.
    pub fn total_len(&self) -> Option<usize> {
        match self.packet_length {
            0 => None,
            n => Some(PES_FIXED_HEADER_SIZE + n as usize),
        }
    }

    /// Writes the PES header to a BytesMut buffer.
    pub fn write_to(&self, buf: &mut BytesMut) -> Result<()> {
        buf.put_slice(&PES_START_CODE);
        buf.put_u8(self.stream_id);
        buf.put_u16(self.packet_length);

        if !has_optional_header(self.stream_id) {
            return Ok(());
        }

        let mut flags = 0x80u8; // '10' marker
        if self.data_alignment {
            flags |= 0x04;
        }
        buf.put_u8(flags);

        let pts_dts_flags = match (self.pts, self.dts) {
            (Some(_), Some(_)) => 0xC0,
            (Some(_), None) => 0x80,
            _ => 0x00,
        };
        buf.put_u8(pts_dts_flags);
        buf.put_u8(self.header_data_length);

        let mut written = 0;
        if let Some(pts) = self.pts {
            let marker = if self.dts.is_some() { 0x30 } else { 0x20 };
            write_timestamp(buf, marker, pts);
            written += 5;
        }
        if let (Some(_), Some(dts)) = (self.pts, self.dts) {
            write_timestamp(buf, 0x10, dts);
            written += 5;
        }
        // stuffing
        buf.put_bytes(0xFF, (self.header_data_length as usize).saturating_sub(written));

        Ok(())
    }
}

/// Decodes a 5-byte PTS/DTS field into 33-bit 90 kHz ticks.
pub fn parse_timestamp(data: &[u8]) -> u64 {
    (((data[0] as u64 >> 1) & 0x07) << 30)
        | ((data[1] as u64) << 22)
        | ((data[2] as u64 >> 1) << 15)
        | ((data[3] as u64) << 7)
        | (data[4] as u64 >> 1)
}

fn write_timestamp(buf: &mut BytesMut, marker: u8, ts: u64) {
    let pts = ts & 0x1FFFFFFFF; // 33 bits

    // First byte: marker bits and 3 MSB of timestamp
    buf.put_u8(marker | ((pts >> 29) & 0x0E) as u8 | 0x01);

    // Middle 15 bits and marker
    buf.put_u16((((pts >> 14) & 0xFFFE) | 0x01) as u16);

    // Final 15 bits and marker
    buf.put_u16((((pts << 1) & 0xFFFE) | 0x01) as u16);
}

/// Reusable working buffer for one demultiplexed PES packet.
///
/// `payload` holds the whole packet, header included; `offset` is where
/// the elementary stream data begins.
#[derive(Debug, Clone, Default)]
pub struct PESPacket {
    /// PID the packet is (to be) read from
    pub pid: u16,
    pub payload: Vec<u8>,
    pub offset: usize,
    /// Raw 90 kHz presentation timestamp
    pub pts: Option<u64>,
    /// Raw 90 kHz decoding timestamp
    pub dts: Option<u64>,
    /// Byte offset of the TS packet that opened this PES
    pub start_at: u64,
}

impl PESPacket {
    pub fn new(pid: u16) -> Self {
        Self {
            pid,
            ..Default::default()
        }
    }

    /// Elementary stream bytes of the packet.
    pub fn data(&self) -> &[u8] {
        self.payload.get(self.offset..).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.data().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data().is_empty()
    }

    /// Forgets the current packet, keeping the PID and the allocation.
    pub fn clear(&mut self) {
        self.payload.clear();
        self.offset = 0;
        self.pts = None;
        self.dts = None;
        self.start_at = 0;
    }
}
