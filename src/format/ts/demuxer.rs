use super::parser::TSPacketParser;
use super::pes::{PESHeader, PESPacket};
use super::source::MultiFileReader;
use super::types::*;
use crate::av::PesSource;
use crate::error::{Result, TsAudioError};
use log::{debug, warn};
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

/// How many packets `probe_tracks` reads looking for PAT and PMT.
const PROBE_PACKET_LIMIT: usize = 20_000;

/// Packets examined when guessing the packet size.
const PROBE_PACKETS: usize = 5;

/// Synchronous MPEG transport stream demuxer.
///
/// Reassembles the PES packets of one PID at a time from 188-byte TS or
/// 192-byte M2TS packets. Byte offsets reported in [`PESPacket::start_at`]
/// can be handed back to [`PesSource::set_pos`].
pub struct TSDemuxer<R: Read + Seek = MultiFileReader> {
    reader: Option<BufReader<R>>,
    parser: TSPacketParser,
    packet_size: usize,
    prefix: usize,
    /// Offset of the next packet to read
    position: u64,
    packet: Vec<u8>,
    pending: Option<PESBuilder>,
}

/// Helper for assembling PES packets from TS packets.
#[derive(Debug)]
struct PESBuilder {
    pid: u16,
    start_at: u64,
    data: Vec<u8>,
}

impl PESBuilder {
    fn new(pid: u16, start_at: u64, payload: &[u8]) -> Self {
        Self {
            pid,
            start_at,
            data: payload.to_vec(),
        }
    }

    /// Returns whether the declared PES length has been reached.
    fn is_complete(&self) -> bool {
        if self.data.len() < 6 {
            return false;
        }
        match ((self.data[4] as usize) << 8) | self.data[5] as usize {
            0 => false,
            len => self.data.len() >= 6 + len,
        }
    }
}

/// Reassembles one PSI section that may span several packets.
#[derive(Debug, Default)]
struct SectionAssembler {
    buf: Vec<u8>,
    active: bool,
}

impl SectionAssembler {
    fn push(&mut self, unit_start: bool, payload: &[u8]) -> Option<Vec<u8>> {
        if unit_start {
            let pointer = *payload.first()? as usize;
            if 1 + pointer > payload.len() {
                self.active = false;
                return None;
            }
            self.buf.clear();
            self.buf.extend_from_slice(&payload[1 + pointer..]);
            self.active = true;
        } else if self.active {
            self.buf.extend_from_slice(payload);
        } else {
            return None;
        }

        if self.buf.len() < 3 {
            return None;
        }
        let needed = 3 + ((((self.buf[1] & 0x0F) as usize) << 8) | self.buf[2] as usize);
        if self.buf.len() < needed {
            return None;
        }
        self.active = false;
        Some(self.buf[..needed].to_vec())
    }

    fn reset(&mut self) {
        self.buf.clear();
        self.active = false;
    }
}

/// Fills as much of `buf` as the stream allows.
fn read_up_to<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

fn detect_packet_size(probe: &[u8]) -> usize {
    let score = |size: usize, prefix: usize| {
        (0..PROBE_PACKETS)
            .map(|i| i * size + prefix)
            .filter(|&offset| probe.get(offset) == Some(&TS_SYNC_BYTE))
            .count()
    };
    if score(M2TS_PACKET_SIZE, M2TS_PREFIX_SIZE) > score(TS_PACKET_SIZE, 0) {
        M2TS_PACKET_SIZE
    } else {
        TS_PACKET_SIZE
    }
}

impl TSDemuxer<MultiFileReader> {
    /// Opens `path`, plus its numbered follow-up parts when `append` is set.
    pub fn open<P: AsRef<Path>>(path: P, append: bool) -> Result<Self> {
        let path = path.as_ref();
        let reader = MultiFileReader::open(path, append).map_err(|source| TsAudioError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Self::new(reader)
    }
}

impl<R: Read + Seek> TSDemuxer<R> {
    /// Creates a demuxer reading from the start of `reader`.
    pub fn new(mut reader: R) -> Result<Self> {
        let mut probe = vec![0u8; M2TS_PACKET_SIZE * PROBE_PACKETS + M2TS_PREFIX_SIZE];
        reader.seek(SeekFrom::Start(0))?;
        let n = read_up_to(&mut reader, &mut probe)?;
        reader.seek(SeekFrom::Start(0))?;

        let packet_size = detect_packet_size(&probe[..n]);
        debug!("ts: {} byte packets", packet_size);

        Ok(Self {
            reader: Some(BufReader::new(reader)),
            parser: TSPacketParser::new(),
            packet_size,
            prefix: packet_size - TS_PACKET_SIZE,
            position: 0,
            packet: vec![0u8; packet_size],
            pending: None,
        })
    }

    /// 188 for plain TS, 192 for M2TS.
    pub fn packet_size(&self) -> usize {
        self.packet_size
    }

    /// Offset of the next packet to be read.
    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn is_closed(&self) -> bool {
        self.reader.is_none()
    }

    fn seek_to(&mut self, offset: u64) -> Result<()> {
        let reader = self
            .reader
            .as_mut()
            .ok_or_else(|| TsAudioError::InvalidData("demuxer is closed".into()))?;
        reader.seek(SeekFrom::Start(offset))?;
        self.position = offset;
        self.pending = None;
        Ok(())
    }

    /// Reads the next synchronized packet into `self.packet` and returns its
    /// offset, or `None` at the end of the stream.
    fn read_packet(&mut self) -> Result<Option<u64>> {
        loop {
            let reader = match self.reader.as_mut() {
                Some(reader) => reader,
                None => return Ok(None),
            };
            let at = self.position;
            if read_up_to(reader, &mut self.packet)? < self.packet_size {
                return Ok(None);
            }
            self.position += self.packet_size as u64;

            if self.packet[self.prefix] == TS_SYNC_BYTE {
                return Ok(Some(at));
            }
            warn!("ts: sync lost at offset {}", at);
            if !self.resync(at + 1)? {
                return Ok(None);
            }
        }
    }

    /// Finds the next sync byte confirmed by another one a packet later.
    fn resync(&mut self, from: u64) -> Result<bool> {
        let span = self.prefix + self.packet_size;
        let mut window = vec![0u8; self.packet_size * 16];
        let mut base = from;

        loop {
            let reader = match self.reader.as_mut() {
                Some(reader) => reader,
                None => return Ok(false),
            };
            reader.seek(SeekFrom::Start(base))?;
            let n = read_up_to(reader, &mut window)?;
            if n <= span {
                return Ok(false);
            }

            let found = (0..n - span).find(|&i| {
                window[i + self.prefix] == TS_SYNC_BYTE && window[i + span] == TS_SYNC_BYTE
            });
            if let Some(i) = found {
                let position = base + i as u64;
                warn!(
                    "ts: resynchronized at offset {} after {} bytes",
                    position,
                    position - from + 1
                );
                reader.seek(SeekFrom::Start(position))?;
                self.position = position;
                return Ok(true);
            }
            base += (n - span) as u64;
        }
    }

    /// Moves a finished PES into `packet`. Returns false if it was unusable.
    fn complete(pes: PESBuilder, packet: &mut PESPacket) -> bool {
        let header = match PESHeader::parse(&pes.data) {
            Ok(header) => header,
            Err(e) => {
                warn!(
                    "ts: dropping PES on pid 0x{:x} at offset {}: {}",
                    pes.pid, pes.start_at, e
                );
                return false;
            }
        };

        let mut data = pes.data;
        if let Some(total) = header.total_len() {
            if data.len() > total {
                data.truncate(total);
            } else if data.len() < total {
                debug!(
                    "ts: short PES on pid 0x{:x}, {} of {} bytes",
                    pes.pid,
                    data.len(),
                    total
                );
            }
        }

        packet.offset = header.header_len().min(data.len());
        packet.payload = data;
        packet.pts = header.pts;
        packet.dts = header.dts;
        packet.start_at = pes.start_at;
        true
    }

    /// Reads the PAT and the first program's PMT and lists its audio
    /// streams. The read position is restored afterwards.
    pub fn probe_tracks(&mut self) -> Result<Vec<TrackInfo>> {
        let saved = self.position;
        self.seek_to(0)?;

        let mut pmt_pid = None;
        let mut assembler = SectionAssembler::default();
        let mut tracks = Vec::new();

        for _ in 0..PROBE_PACKET_LIMIT {
            if self.read_packet()?.is_none() {
                break;
            }
            let (header, payload) = match self.parser.parse_packet(&self.packet[self.prefix..]) {
                Ok(parsed) => parsed,
                Err(_) => continue,
            };
            if header.transport_error || header.pid != pmt_pid.unwrap_or(PID_PAT) {
                continue;
            }
            let section = match assembler.push(header.payload_unit_start, payload) {
                Some(section) => section,
                None => continue,
            };

            match self.parser.parse_section(&section) {
                Ok((TABLE_ID_PAT, body)) if pmt_pid.is_none() => {
                    let pat = self.parser.parse_pat(body)?;
                    if let Some(program) = pat.first_program() {
                        debug!(
                            "ts: program {} has PMT on pid 0x{:x}",
                            program.program_number, program.program_map_pid
                        );
                        pmt_pid = Some(program.program_map_pid);
                        assembler.reset();
                    }
                }
                Ok((TABLE_ID_PMT, body)) => {
                    tracks = self.parser.parse_pmt(body)?.audio_tracks();
                    break;
                }
                Ok(_) => {}
                Err(e) => warn!("ts: bad PSI section: {}", e),
            }
        }

        self.seek_to(saved)?;
        Ok(tracks)
    }
}

impl<R: Read + Seek> PesSource for TSDemuxer<R> {
    fn next_pes(&mut self, packet: &mut PESPacket) -> Result<bool> {
        let pid = packet.pid;
        if self.pending.as_ref().map_or(false, |p| p.pid != pid) {
            self.pending = None;
        }

        loop {
            if self.pending.as_ref().map_or(false, PESBuilder::is_complete) {
                if let Some(done) = self.pending.take() {
                    if Self::complete(done, packet) {
                        return Ok(true);
                    }
                }
            }

            let at = match self.read_packet()? {
                Some(at) => at,
                None => {
                    // End of stream flushes an unbounded PES
                    return Ok(match self.pending.take() {
                        Some(done) => Self::complete(done, packet),
                        None => false,
                    });
                }
            };

            let (header, payload) = match self.parser.parse_packet(&self.packet[self.prefix..]) {
                Ok(parsed) => parsed,
                Err(e) => {
                    debug!("ts: skipping packet at {}: {}", at, e);
                    continue;
                }
            };
            if header.pid != pid || payload.is_empty() {
                continue;
            }
            if header.transport_error || header.scrambling_control != 0 {
                // The PES in progress would have a hole; drop it
                if let Some(lost) = self.pending.take() {
                    warn!(
                        "ts: dropping PES on pid 0x{:x} from offset {}: unusable packet at {}",
                        pid, lost.start_at, at
                    );
                }
                debug!(
                    "ts: skipping packet at {} (transport error {}, scrambling {})",
                    at, header.transport_error, header.scrambling_control
                );
                continue;
            }

            if header.payload_unit_start {
                let previous = self.pending.replace(PESBuilder::new(pid, at, payload));
                if let Some(done) = previous {
                    if Self::complete(done, packet) {
                        return Ok(true);
                    }
                }
            } else if let Some(pes) = self.pending.as_mut() {
                pes.data.extend_from_slice(payload);
            }
        }
    }

    fn set_pos(&mut self, position: u64) -> Result<()> {
        self.seek_to(position)
    }

    fn close(&mut self) {
        self.reader = None;
        self.pending = None;
        self.packet = Vec::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::{BufMut, BytesMut};
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    const PID: u16 = 0x101;

    /// Splits `pes` into TS packets on `pid`, padding the last one with an
    /// adaptation field.
    fn packetize(pid: u16, pes: &[u8], out: &mut Vec<u8>) {
        for (i, chunk) in pes.chunks(TS_PACKET_SIZE - TS_HEADER_SIZE).enumerate() {
            let stuffing = TS_PACKET_SIZE - TS_HEADER_SIZE - chunk.len();
            let header = TSHeader {
                payload_unit_start: i == 0,
                pid,
                adaptation_field_exists: stuffing > 0,
                continuity_counter: i as u8,
                ..Default::default()
            };
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
            out.extend_from_slice(&buf);
        }
    }

    fn pes(pts: u64, payload: &[u8], bounded: bool) -> Vec<u8> {
        let mut header = PESHeader::new(0xc0).with_pts(pts);
        if bounded {
            header.packet_length = (3 + 5 + payload.len()) as u16;
        }
        let mut buf = BytesMut::new();
        header.write_to(&mut buf).unwrap();
        buf.put_slice(payload);
        buf.to_vec()
    }

    #[test]
    fn test_reassembles_pes_across_packets() {
        let mut stream = Vec::new();
        packetize(PID, &pes(900, &[0xAA; 400], true), &mut stream);
        packetize(0x200, &pes(1, &[0x00; 10], true), &mut stream);
        packetize(PID, &pes(1800, &[0xBB; 10], false), &mut stream);

        let mut demuxer = TSDemuxer::new(Cursor::new(stream)).unwrap();
        assert_eq!(demuxer.packet_size(), TS_PACKET_SIZE);

        let mut packet = PESPacket::new(PID);
        assert!(demuxer.next_pes(&mut packet).unwrap());
        assert_eq!(packet.pts, Some(900));
        assert_eq!(packet.data(), &[0xAA; 400][..]);
        assert_eq!(packet.start_at, 0);

        // unbounded PES flushed at end of stream
        assert!(demuxer.next_pes(&mut packet).unwrap());
        assert_eq!(packet.pts, Some(1800));
        assert_eq!(packet.data(), &[0xBB; 10]);
        assert_eq!(packet.start_at, 4 * TS_PACKET_SIZE as u64);

        assert!(!demuxer.next_pes(&mut packet).unwrap());
    }

    #[test]
    fn test_unbounded_pes_ends_at_next_unit_start() {
        let mut stream = Vec::new();
        packetize(PID, &pes(10, &[1; 300], false), &mut stream);
        packetize(PID, &pes(20, &[2; 5], false), &mut stream);

        let mut demuxer = TSDemuxer::new(Cursor::new(stream)).unwrap();
        let mut packet = PESPacket::new(PID);
        assert!(demuxer.next_pes(&mut packet).unwrap());
        assert_eq!(packet.len(), 300);
        assert!(demuxer.next_pes(&mut packet).unwrap());
        assert_eq!(packet.pts, Some(20));
        assert!(!demuxer.next_pes(&mut packet).unwrap());
    }

    #[test]
    fn test_set_pos_restarts_at_packet() {
        let mut stream = Vec::new();
        packetize(PID, &pes(10, &[1; 8], true), &mut stream);
        packetize(PID, &pes(20, &[2; 8], true), &mut stream);

        let mut demuxer = TSDemuxer::new(Cursor::new(stream)).unwrap();
        let mut packet = PESPacket::new(PID);
        assert!(demuxer.next_pes(&mut packet).unwrap());
        assert!(demuxer.next_pes(&mut packet).unwrap());
        let second = packet.start_at;

        demuxer.set_pos(second).unwrap();
        assert!(demuxer.next_pes(&mut packet).unwrap());
        assert_eq!(packet.pts, Some(20));

        demuxer.set_pos(0).unwrap();
        assert!(demuxer.next_pes(&mut packet).unwrap());
        assert_eq!(packet.pts, Some(10));
    }

    #[test]
    fn test_resync_after_garbage() {
        let mut stream = Vec::new();
        packetize(PID, &pes(10, &[1; 8], true), &mut stream);
        stream.extend_from_slice(&[0x00; 37]);
        packetize(PID, &pes(20, &[2; 8], true), &mut stream);
        packetize(PID, &pes(30, &[3; 8], true), &mut stream);

        let mut demuxer = TSDemuxer::new(Cursor::new(stream)).unwrap();
        let mut packet = PESPacket::new(PID);
        let mut seen = Vec::new();
        while demuxer.next_pes(&mut packet).unwrap() {
            seen.push(packet.pts);
        }
        assert_eq!(seen, vec![Some(10), Some(20), Some(30)]);
    }

    #[test]
    fn test_skips_errored_and_scrambled_packets() {
        let mut stream = Vec::new();
        packetize(PID, &pes(10, &[1; 8], true), &mut stream);
        stream[1] |= 0x80; // transport_error_indicator
        packetize(PID, &pes(20, &[2; 8], true), &mut stream);
        stream[TS_PACKET_SIZE + 3] |= 0x80; // scrambled
        packetize(PID, &pes(30, &[3; 8], true), &mut stream);

        let mut demuxer = TSDemuxer::new(Cursor::new(stream)).unwrap();
        let mut packet = PESPacket::new(PID);
        assert!(demuxer.next_pes(&mut packet).unwrap());
        assert_eq!(packet.pts, Some(30));
    }

    #[test]
    fn test_unusable_continuation_drops_pes() {
        let mut stream = Vec::new();
        packetize(PID, &pes(10, &[1; 400], true), &mut stream);
        stream[TS_PACKET_SIZE + 1] |= 0x80; // transport_error_indicator
        packetize(PID, &pes(20, &[2; 400], true), &mut stream);
        stream[4 * TS_PACKET_SIZE + 3] |= 0x80; // scrambled
        packetize(PID, &pes(30, &[3; 8], true), &mut stream);

        let mut demuxer = TSDemuxer::new(Cursor::new(stream)).unwrap();
        let mut packet = PESPacket::new(PID);
        assert!(demuxer.next_pes(&mut packet).unwrap());
        assert_eq!(packet.pts, Some(30));
        assert_eq!(packet.data(), &[3; 8]);
        assert!(!demuxer.next_pes(&mut packet).unwrap());
    }

    #[test]
    fn test_m2ts_packets() {
        let mut plain = Vec::new();
        packetize(PID, &pes(10, &[1; 8], true), &mut plain);
        packetize(PID, &pes(20, &[2; 8], true), &mut plain);
        let mut stream = Vec::new();
        for packet in plain.chunks(TS_PACKET_SIZE) {
            stream.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]);
            stream.extend_from_slice(packet);
        }

        let mut demuxer = TSDemuxer::new(Cursor::new(stream)).unwrap();
        assert_eq!(demuxer.packet_size(), M2TS_PACKET_SIZE);
        let mut packet = PESPacket::new(PID);
        assert!(demuxer.next_pes(&mut packet).unwrap());
        assert!(demuxer.next_pes(&mut packet).unwrap());
        assert_eq!(packet.start_at, M2TS_PACKET_SIZE as u64);
        assert_eq!(packet.data(), &[2; 8]);
    }

    #[test]
    fn test_close() {
        let mut stream = Vec::new();
        packetize(PID, &pes(10, &[1; 8], true), &mut stream);
        let mut demuxer = TSDemuxer::new(Cursor::new(stream)).unwrap();
        demuxer.close();
        assert!(demuxer.is_closed());
        let mut packet = PESPacket::new(PID);
        assert!(!demuxer.next_pes(&mut packet).unwrap());
        assert!(demuxer.set_pos(0).is_err());
    }
}
