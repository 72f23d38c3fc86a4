use crate::format::ts::PESPacket;
use crate::utils::hex_dump;
use bytes::{BufMut, Bytes, BytesMut};

/// How the audio access units are carried inside the PES payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MuxingType {
    /// Each PES payload is one access unit (MPEG audio, AC-3, ...)
    Raw,
    /// AAC with ADTS headers, possibly several frames per PES
    Adts,
    /// AAC in LOAS/LATM transport frames
    Latm,
}

/// A source of PES packets for one elementary stream.
///
/// Implemented by [`crate::format::ts::TSDemuxer`]; tests and embedders can
/// supply their own.
pub trait PesSource {
    /// Fills `packet` with the next PES of `packet.pid`.
    /// Returns `Ok(false)` once the stream is exhausted.
    fn next_pes(&mut self, packet: &mut PESPacket) -> crate::Result<bool>;

    /// Repositions to a byte offset previously reported as a packet start.
    fn set_pos(&mut self, position: u64) -> crate::Result<()>;

    /// Releases underlying resources. Further reads report exhaustion.
    fn close(&mut self);
}

impl<S: PesSource + ?Sized> PesSource for Box<S> {
    fn next_pes(&mut self, packet: &mut PESPacket) -> crate::Result<bool> {
        (**self).next_pes(packet)
    }

    fn set_pos(&mut self, position: u64) -> crate::Result<()> {
        (**self).set_pos(position)
    }

    fn close(&mut self) {
        (**self).close()
    }
}

/// Codec initialization data, stored with a zeroed tail so decoders that
/// read past the end stay inside the allocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtraData {
    padded: Bytes,
    len: usize,
}

impl ExtraData {
    pub fn new(data: &[u8], padding: usize) -> Self {
        let mut buf = BytesMut::with_capacity(data.len() + padding);
        buf.put_slice(data);
        buf.put_bytes(0, padding);
        log::debug!("extra data ({} bytes):\n{}", data.len(), hex_dump(data));
        Self {
            padded: buf.freeze(),
            len: data.len(),
        }
    }

    /// The extra data itself.
    pub fn as_slice(&self) -> &[u8] {
        &self.padded[..self.len]
    }

    /// The extra data followed by its zero padding.
    pub fn padded(&self) -> &[u8] {
        &self.padded
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

mod packet;
pub mod seek;
pub mod timestamp;

pub use packet::*;
pub use seek::{Resync, SeekError, SeekIndex, SeekPoint};
pub use timestamp::RolloverState;
