//! Builders for small transport stream files used by the integration tests.

#![allow(dead_code)]

use bytes::{BufMut, BytesMut};
use std::path::{Path, PathBuf};
use tsaudio::codec::aac::{AACConfig, ADTSHeader};
use tsaudio::format::ts::types::{
    ElementaryStreamInfo, PATEntry, TS_HEADER_SIZE, PAT, PMT, TABLE_ID_PAT, TABLE_ID_PMT,
};
use tsaudio::format::ts::{PESHeader, TSHeader, PID_PAT, TS_PACKET_SIZE};
use tsaudio::utils::Crc32Mpeg2;

pub const PMT_PID: u16 = 0x100;
pub const AUDIO_PID: u16 = 0x101;

/// Accumulates TS packets, keeping continuity counters per PID.
#[derive(Default)]
pub struct StreamBuilder {
    data: Vec<u8>,
    counters: std::collections::HashMap<u16, u8>,
}

impl StreamBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Splits `payload` over packets on `pid`, stuffing the last one.
    pub fn packetize(&mut self, pid: u16, payload: &[u8]) -> &mut Self {
        for (i, chunk) in payload.chunks(TS_PACKET_SIZE - TS_HEADER_SIZE).enumerate() {
            let counter = self.counters.entry(pid).or_insert(0);
            let stuffing = TS_PACKET_SIZE - TS_HEADER_SIZE - chunk.len();
            let header = TSHeader {
                payload_unit_start: i == 0,
                pid,
                adaptation_field_exists: stuffing > 0,
                continuity_counter: *counter,
                ..Default::default()
            };
            *counter = (*counter + 1) & 0x0f;

            let mut buf = BytesMut::new();
            header.write_to(&mut buf).unwrap();
            if stuffing > 0 {
                buf.put_u8((stuffing - 1) as u8);
                if stuffing > 1 {
                    buf.put_u8(0);
                    buf.put_bytes(0xFF, stuffing - 2);
                }
            }
            buf.put_slice(chunk);
            self.data.extend_from_slice(&buf);
        }
        self
    }

    /// PAT pointing at `PMT_PID` and a PMT listing `streams`.
    pub fn program(&mut self, streams: &[(u8, u16)]) -> &mut Self {
        let pat = PAT {
            entries: vec![PATEntry {
                program_number: 1,
                network_pid: 0,
                program_map_pid: PMT_PID,
            }],
        };
        let mut body = BytesMut::new();
        pat.write_to(&mut body).unwrap();
        let section = psi_section(TABLE_ID_PAT, 1, &body);
        self.packetize(PID_PAT, &pointer_field(&section));

        let pmt = PMT {
            pcr_pid: streams.first().map_or(0x1fff, |s| s.1),
            program_descriptors: Vec::new(),
            elementary_stream_infos: streams
                .iter()
                .map(|&(stream_type, pid)| ElementaryStreamInfo {
                    stream_type,
                    elementary_pid: pid,
                    descriptors: Vec::new(),
                })
                .collect(),
        };
        let mut body = BytesMut::new();
        pmt.write_to(&mut body).unwrap();
        let section = psi_section(TABLE_ID_PMT, 1, &body);
        self.packetize(PMT_PID, &pointer_field(&section))
    }

    pub fn pes(&mut self, pid: u16, pts: Option<u64>, payload: &[u8]) -> &mut Self {
        let pes = pes(pts, payload);
        self.packetize(pid, &pes)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn write(&self, path: &Path) -> PathBuf {
        std::fs::write(path, &self.data).unwrap();
        path.to_path_buf()
    }
}

fn pointer_field(section: &[u8]) -> Vec<u8> {
    let mut out = vec![0u8];
    out.extend_from_slice(section);
    out
}

/// Long-form PSI section with CRC-32/MPEG-2.
pub fn psi_section(table_id: u8, extension: u16, body: &[u8]) -> Vec<u8> {
    let section_length = 5 + body.len() + 4;
    let mut buf = BytesMut::new();
    buf.put_u8(table_id);
    buf.put_u16(0xB000 | section_length as u16);
    buf.put_u16(extension);
    buf.put_u8(0xC1); // version 0, current
    buf.put_u8(0); // section_number
    buf.put_u8(0); // last_section_number
    buf.put_slice(body);
    let crc = Crc32Mpeg2::calculate(&buf);
    buf.put_u32(crc);
    buf.to_vec()
}

/// Bounded audio PES (stream id 0xC0).
pub fn pes(pts: Option<u64>, payload: &[u8]) -> Vec<u8> {
    let mut header = PESHeader::new(0xc0);
    if let Some(pts) = pts {
        header = header.with_pts(pts);
    }
    header.packet_length = (3 + header.header_data_length as usize + payload.len()) as u16;
    let mut buf = BytesMut::new();
    header.write_to(&mut buf).unwrap();
    buf.put_slice(payload);
    buf.to_vec()
}

/// One ADTS frame around `payload`, AAC-LC 44.1 kHz stereo.
pub fn adts_frame(payload: &[u8]) -> Vec<u8> {
    let header = ADTSHeader::for_payload(&AACConfig::default(), payload.len());
    let mut frame = header.to_bytes().to_vec();
    frame.extend_from_slice(payload);
    frame
}

#[derive(Default)]
struct Bits {
    data: Vec<u8>,
    len: usize,
}

impl Bits {
    fn put(&mut self, n: u32, value: u32) {
        for i in (0..n).rev() {
            if self.len % 8 == 0 {
                self.data.push(0);
            }
            if (value >> i) & 1 == 1 {
                let last = self.data.len() - 1;
                self.data[last] |= 1 << (7 - self.len % 8);
            }
            self.len += 1;
        }
    }
}

/// One LOAS frame carrying `payloads` as sub-frames. With `with_config` the
/// frame carries a StreamMuxConfig for AAC-LC 48 kHz stereo.
pub fn loas_frame(payloads: &[&[u8]], with_config: bool) -> Vec<u8> {
    let mut bits = Bits::default();
    bits.put(1, !with_config as u32); // useSameStreamMux
    if with_config {
        bits.put(1, 0); // audioMuxVersion
        bits.put(1, 1); // allStreamsSameTimeFraming
        bits.put(6, payloads.len() as u32 - 1); // numSubFrames
        bits.put(4, 0); // numProgram
        bits.put(3, 0); // numLayer
        bits.put(5, 2); // AAC-LC
        bits.put(4, 3); // 48000 Hz
        bits.put(4, 2); // stereo
        bits.put(3, 0); // GASpecificConfig flags
        bits.put(3, 0); // frameLengthType
        bits.put(8, 0xFF); // latmBufferFullness
        bits.put(1, 0); // otherDataPresent
        bits.put(1, 0); // crcCheckPresent
    }
    for payload in payloads {
        let mut remaining = payload.len();
        while remaining >= 255 {
            bits.put(8, 255);
            remaining -= 255;
        }
        bits.put(8, remaining as u32);
        for &b in payload.iter() {
            bits.put(8, b as u32);
        }
    }

    let element = bits.data;
    let mut frame = vec![
        0x56,
        0xE0 | (element.len() >> 8) as u8,
        element.len() as u8,
    ];
    frame.extend(element);
    frame
}
