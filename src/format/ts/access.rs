use super::demuxer::TSDemuxer;
use super::pes::PESPacket;
use super::reframe::Reframer;
use crate::av::{
    AccessUnit, ExtraData, MuxingType, Packet, PesSource, RolloverState, SeekIndex, SeekPoint,
};
use crate::codec::aac::AudioSpecificConfig;
use crate::config::{get_config, Config};
use crate::Result;
use bytes::Bytes;
use log::{debug, info, warn};
use std::path::Path;

/// Sequential and random access to one audio track of a transport stream.
///
/// Reads yield one access unit at a time with a monotonic microsecond
/// timestamp. The caller records seek points as it reads; `seek_to` then
/// jumps back to the closest recorded point at or before a time.
///
/// ```no_run
/// use tsaudio::av::MuxingType;
/// use tsaudio::format::ts::TSAudioAccess;
///
/// # fn main() -> tsaudio::Result<()> {
/// let mut track = TSAudioAccess::open("capture.ts", 0x101, false, MuxingType::Adts, None)?;
/// let mut buf = vec![0u8; 8192];
/// while let Some(unit) = track.read_packet(&mut buf)? {
///     println!("{} bytes at {:?}", unit.size, unit.dts);
/// }
/// # Ok(())
/// # }
/// ```
pub struct TSAudioAccess<S: PesSource = TSDemuxer> {
    source: S,
    pes: PESPacket,
    reframer: Reframer,
    extra_data: Option<ExtraData>,
    index: SeekIndex,
    clock: RolloverState,
    config: Config,
    scratch: Vec<u8>,
    closed: bool,
}

impl TSAudioAccess<TSDemuxer> {
    /// Opens the track on `pid` of the stream at `path`, reading numbered
    /// follow-up files too when `append` is set.
    pub fn open<P: AsRef<Path>>(
        path: P,
        pid: u16,
        append: bool,
        muxing: MuxingType,
        extra_data: Option<&[u8]>,
    ) -> Result<Self> {
        Self::open_with_config(path, pid, append, muxing, extra_data, get_config())
    }

    pub fn open_with_config<P: AsRef<Path>>(
        path: P,
        pid: u16,
        append: bool,
        muxing: MuxingType,
        extra_data: Option<&[u8]>,
        config: Config,
    ) -> Result<Self> {
        let path = path.as_ref();
        let demuxer = TSDemuxer::open(path, append)?;
        info!("ts audio: opened {} for pid 0x{:x}", path.display(), pid);
        Ok(Self::with_config(demuxer, pid, muxing, extra_data, config))
    }
}

impl<S: PesSource> TSAudioAccess<S> {
    /// Builds a track over an already opened PES source.
    pub fn with_source(
        source: S,
        pid: u16,
        muxing: MuxingType,
        extra_data: Option<&[u8]>,
    ) -> Self {
        Self::with_config(source, pid, muxing, extra_data, get_config())
    }

    pub fn with_config(
        source: S,
        pid: u16,
        muxing: MuxingType,
        extra_data: Option<&[u8]>,
        config: Config,
    ) -> Self {
        let extra_data = extra_data
            .filter(|data| !data.is_empty())
            .map(|data| ExtraData::new(data, config.extra_data_padding));
        info!(
            "ts audio: track pid 0x{:x}, {:?}, {} bytes of extra data",
            pid,
            muxing,
            extra_data.as_ref().map_or(0, ExtraData::len)
        );

        Self {
            source,
            pes: PESPacket::new(pid),
            reframer: Reframer::new(muxing, &config),
            extra_data,
            index: SeekIndex::new(),
            clock: RolloverState::new(),
            config,
            scratch: Vec::new(),
            closed: false,
        }
    }

    pub fn pid(&self) -> u16 {
        self.pes.pid
    }

    pub fn muxing(&self) -> MuxingType {
        self.reframer.muxing()
    }

    pub fn extra_data(&self) -> Option<&ExtraData> {
        self.extra_data.as_ref()
    }

    /// Decoder configuration found in the stream, for ADTS and LATM tracks.
    pub fn audio_config(&self) -> Option<AudioSpecificConfig> {
        self.reframer.audio_config()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn seek_points(&self) -> &[SeekPoint] {
        self.index.points()
    }

    /// Byte offset of the PES packet the last unit came from, a valid seek
    /// point position.
    pub fn last_pes_position(&self) -> u64 {
        self.pes.start_at
    }

    /// Raw 90 kHz value that maps to time zero.
    pub fn set_time_offset(&mut self, raw_ticks: u64) {
        self.clock.set_base_offset(raw_ticks);
    }

    /// Reads the next access unit into `buf`. `Ok(None)` once the track is
    /// exhausted or closed.
    ///
    /// A unit that does not fit `buf` is reported as a fatal
    /// [`TsAudioError::CapacityExceeded`](crate::TsAudioError::CapacityExceeded).
    pub fn read_packet(&mut self, buf: &mut [u8]) -> Result<Option<AccessUnit>> {
        if self.closed {
            return Ok(None);
        }
        let unit = self
            .reframer
            .next_unit(&mut self.source, &mut self.pes, &mut self.clock, buf)?;
        if let Some(AccessUnit {
            size,
            dts: Some(dts),
        }) = unit
        {
            debug!("ts audio: {} bytes, dts {} ms", size, dts / 1000);
        }
        Ok(unit)
    }

    /// Owned variant of [`read_packet`](Self::read_packet), limited to
    /// `max_packet_size` bytes per unit.
    pub fn next_packet(&mut self) -> Result<Option<Packet>> {
        let mut scratch = std::mem::take(&mut self.scratch);
        scratch.resize(self.config.max_packet_size, 0);
        let unit = self.read_packet(&mut scratch);
        let packet = match unit {
            Ok(Some(unit)) => Ok(Some(
                Packet::new(Bytes::copy_from_slice(&scratch[..unit.size])).with_dts(unit.dts),
            )),
            Ok(None) => Ok(None),
            Err(e) => Err(e),
        };
        self.scratch = scratch;
        packet
    }

    pub fn push_seek_point(&mut self, position: u64, timestamp: Option<u64>, size: u32) {
        self.index.push(position, timestamp, size);
    }

    /// Total decoded size recorded in the seek index.
    pub fn length(&self) -> u32 {
        self.index.total_size()
    }

    /// Last known timestamp in the seek index, in microseconds.
    pub fn duration_us(&self) -> u64 {
        self.index.duration_us()
    }

    /// Repositions to the last seek point known to lie before `time_us`.
    ///
    /// Returns false when there is nothing to seek to or the source could
    /// not be repositioned.
    pub fn seek_to(&mut self, time_us: u64) -> bool {
        if self.closed {
            return false;
        }
        self.reframer.reset();

        let resync = match self.index.seek(time_us) {
            Ok(resync) => resync,
            Err(e) => {
                debug!("ts audio: cannot seek to {} us: {}", time_us, e);
                return false;
            }
        };
        if let Err(e) = self.source.set_pos(resync.position) {
            warn!(
                "ts audio: seek to offset {} failed: {}",
                resync.position, e
            );
            return false;
        }
        self.pes.clear();
        self.clock.resync(resync.wrap_count);
        debug!(
            "ts audio: seek {} us -> offset {}, wrap count {}",
            time_us,
            resync.position,
            self.clock.wrap_count()
        );
        true
    }

    /// Releases the source and buffers. Further reads report exhaustion.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.source.close();
        self.reframer.reset();
        self.pes = PESPacket::new(self.pes.pid);
        self.scratch = Vec::new();
        info!("ts audio: closed pid 0x{:x}", self.pes.pid);
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl<S: PesSource> Drop for TSAudioAccess<S> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TsAudioError;
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// PES source over a fixed list, addressed by index.
    struct ListSource {
        packets: Vec<(Vec<u8>, Option<u64>)>,
        next: usize,
        fail_seek: bool,
        closes: Rc<RefCell<u32>>,
    }

    impl ListSource {
        fn new(packets: Vec<(Vec<u8>, Option<u64>)>) -> Self {
            Self {
                packets,
                next: 0,
                fail_seek: false,
                closes: Rc::new(RefCell::new(0)),
            }
        }
    }

    impl PesSource for ListSource {
        fn next_pes(&mut self, packet: &mut PESPacket) -> Result<bool> {
            let (payload, pts) = match self.packets.get(self.next) {
                Some(entry) => entry.clone(),
                None => return Ok(false),
            };
            packet.payload = payload;
            packet.offset = 0;
            packet.pts = pts;
            packet.start_at = self.next as u64;
            self.next += 1;
            Ok(true)
        }

        fn set_pos(&mut self, position: u64) -> Result<()> {
            if self.fail_seek {
                return Err(TsAudioError::Io(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    "seek failed",
                )));
            }
            self.next = position as usize;
            Ok(())
        }

        fn close(&mut self) {
            *self.closes.borrow_mut() += 1;
        }
    }

    fn raw_track(packets: Vec<(Vec<u8>, Option<u64>)>) -> TSAudioAccess<ListSource> {
        TSAudioAccess::with_config(
            ListSource::new(packets),
            0x44,
            MuxingType::Raw,
            Some(&[0x12, 0x10]),
            Config::default(),
        )
    }

    #[test]
    fn test_accessors() {
        let track = raw_track(Vec::new());
        assert_eq!(track.pid(), 0x44);
        assert_eq!(track.muxing(), MuxingType::Raw);
        let extra = track.extra_data().unwrap();
        assert_eq!(extra.as_slice(), &[0x12, 0x10]);
        assert_eq!(extra.padded().len(), 2 + Config::default().extra_data_padding);
        assert_eq!(track.audio_config(), None);
    }

    #[test]
    fn test_worked_example() {
        let mut track = raw_track(Vec::new());
        track.push_seek_point(0, Some(0), 100);
        track.push_seek_point(100, Some(500_000), 300);
        track.push_seek_point(300, Some(1_200_000), 600);

        assert!(track.seek_to(900_000));
        assert_eq!(track.source.next, 100);
        assert_eq!(track.length(), 600);
        assert_eq!(track.duration_us(), 1_200_000);
    }

    #[test]
    fn test_seek_on_empty_index() {
        let mut track = raw_track(vec![(vec![1], Some(0))]);
        assert!(!track.seek_to(0));
    }

    #[test]
    fn test_seek_io_failure_reports_false() {
        let mut track = raw_track(Vec::new());
        track.push_seek_point(0, Some(0), 1);
        track.source.fail_seek = true;
        assert!(!track.seek_to(10));
    }

    #[test]
    fn test_seek_resets_rollover_memory() {
        let packets = vec![
            (vec![1], Some(0)),
            (vec![2], Some(90_000)),
            (vec![3], Some(180_000)),
        ];
        let mut track = raw_track(packets);
        let mut buf = [0u8; 8];
        let mut units = Vec::new();
        while let Some(unit) = track.read_packet(&mut buf).unwrap() {
            track.push_seek_point(track.last_pes_position(), unit.dts, units.len() as u32 + 1);
            units.push(unit);
        }
        assert_eq!(units.len(), 3);
        assert_eq!(track.clock.last_value(), Some(180_000));

        assert!(track.seek_to(1_500_000));
        assert_eq!(track.clock.last_value(), None);
        let unit = track.read_packet(&mut buf).unwrap().unwrap();
        assert_eq!(unit.dts, Some(1_000_000));
        assert_eq!(buf[0], 2);
    }

    #[test]
    fn test_time_offset() {
        let mut track = raw_track(vec![(vec![1], Some(900_000)), (vec![2], Some(990_000))]);
        track.set_time_offset(900_000);
        let mut buf = [0u8; 8];
        assert_eq!(track.read_packet(&mut buf).unwrap().unwrap().dts, Some(0));
        assert_eq!(
            track.read_packet(&mut buf).unwrap().unwrap().dts,
            Some(1_000_000)
        );
    }

    #[test]
    fn test_next_packet_owned() {
        let mut track = raw_track(vec![(vec![7, 8, 9], Some(9_000))]);
        let packet = track.next_packet().unwrap().unwrap();
        assert_eq!(&packet.data[..], &[7, 8, 9]);
        assert_eq!(packet.dts, Some(100_000));
        assert!(track.next_packet().unwrap().is_none());
    }

    #[test]
    fn test_close_is_idempotent() {
        let source = ListSource::new(vec![(vec![1], None)]);
        let closes = source.closes.clone();
        let mut track =
            TSAudioAccess::with_config(source, 1, MuxingType::Raw, None, Config::default());
        track.close();
        track.close();
        assert!(track.is_closed());
        let mut buf = [0u8; 4];
        assert!(track.read_packet(&mut buf).unwrap().is_none());
        drop(track);
        assert_eq!(*closes.borrow(), 1);
    }

    #[test]
    fn test_drop_closes_source() {
        let source = ListSource::new(Vec::new());
        let closes = source.closes.clone();
        drop(TSAudioAccess::with_config(
            source,
            1,
            MuxingType::Latm,
            None,
            Config::default(),
        ));
        assert_eq!(*closes.borrow(), 1);
    }
}
