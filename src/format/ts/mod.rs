//! # MPEG Transport Stream (TS) audio track access
//!
//! This module reads one audio elementary stream out of an MPEG transport
//! stream, including support for:
//!
//! - TS (188 byte) and M2TS (192 byte) packets, with resynchronization
//! - Program Specific Information (PAT/PMT) with CRC checking
//! - Packetized Elementary Stream (PES) reassembly
//! - Recordings split over numbered files
//!
//! ## Core Features
//!
//! - **Demuxing**: [`TSDemuxer`] hands out complete PES packets of one PID
//! - **Reframing**: raw, ADTS and LATM payloads become one access unit per read
//! - **Seeking**: a caller-filled seek index maps time to byte offsets
//! - **Timestamps**: 90 kHz values become a monotonic microsecond timeline
//!
//! ## Example Usage
//!
//! ```no_run
//! use tsaudio::format::ts::{TSAudioAccess, TSDemuxer};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut demuxer = TSDemuxer::open("recording_001.ts", true)?;
//! let track = demuxer.probe_tracks()?.into_iter().next().ok_or("no audio")?;
//!
//! let mut access = TSAudioAccess::with_source(demuxer, track.pid, track.muxing, None);
//! let mut buf = vec![0u8; 16 * 1024];
//! let mut total = 0u32;
//! while let Some(unit) = access.read_packet(&mut buf)? {
//!     total += unit.size as u32;
//!     access.push_seek_point(access.last_pes_position(), unit.dts, total);
//! }
//! println!("{} bytes, {} us", access.length(), access.duration_us());
//! # Ok(())
//! # }
//! ```

/// Track access facade
pub mod access;

/// TS demuxer implementation for extracting elementary streams
pub mod demuxer;

/// Low-level TS packet parsing utilities
pub mod parser;

/// PES packet handling and management
pub mod pes;

/// Per-encapsulation access unit reframers
pub mod reframe;

/// Multi-file byte source
pub mod source;

/// Core TS types and constants
pub mod types;

// Re-export commonly used types and constants
pub use access::TSAudioAccess;
pub use demuxer::TSDemuxer;
pub use parser::TSPacketParser;
pub use pes::{PESHeader, PESPacket};
pub use reframe::Reframer;
pub use source::MultiFileReader;
pub use types::{
    muxing_for_stream_type, TSHeader, TrackInfo, PID_PAT, STREAM_TYPE_AAC, STREAM_TYPE_AAC_LATM,
    TS_PACKET_SIZE,
};
