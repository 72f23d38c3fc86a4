#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(rustdoc::missing_crate_level_docs)]

//! # tsaudio - transport stream audio track access
//!
//! `tsaudio` reads a single audio track out of an MPEG transport stream and
//! hands it out as decodable access units, with a seek index and a clean
//! microsecond timeline.
//!
//! ## Features
//!
//! ### Audio encapsulations
//! - Raw PES payloads (MPEG audio, AC-3, E-AC-3, ...)
//! - AAC in ADTS frames, several per PES or split across PES packets
//! - AAC in LOAS/LATM, including in-band StreamMuxConfig
//!
//! ### Stream handling
//! - 188 byte TS and 192 byte M2TS packets, resynchronizing after garbage
//! - Recordings split over numbered files read as one stream
//! - 90 kHz timestamps converted to microseconds across counter rollovers
//! - Caller-built seek index mapping time to byte offsets
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tsaudio::av::MuxingType;
//! use tsaudio::format::ts::TSAudioAccess;
//!
//! fn main() -> tsaudio::Result<()> {
//!     let mut track = TSAudioAccess::open("capture.ts", 0x101, false, MuxingType::Latm, None)?;
//!     let mut buf = vec![0u8; 8192];
//!     let mut size = 0u32;
//!
//!     while let Some(unit) = track.read_packet(&mut buf)? {
//!         size += unit.size as u32;
//!         track.push_seek_point(track.last_pes_position(), unit.dts, size);
//!     }
//!
//!     // jump back to the 10 second mark
//!     track.seek_to(10_000_000);
//!     Ok(())
//! }
//! ```
//!
//! ## Module Overview
//!
//! - `av`: Track level types
//!   - Access units and owned packets
//!   - Seek index and timestamp rollover tracking
//!   - The `PesSource` seam between demuxer and reframers
//!
//! - `codec`: AAC framing
//!   - ADTS header and AudioSpecificConfig parsing
//!   - ADTS and LOAS/LATM unwrapping
//!
//! - `format`: MPEG transport stream handling
//!   - Packet, PSI and PES parsing
//!   - Demuxer, reframers and the `TSAudioAccess` facade
//!
//! - `error`: Error handling types and utilities
//!
//! - `config`: Process wide tunables from `tsaudio.toml` and the environment
//!
//! - `utils`: Bitstream reading, CRC-32/MPEG-2 and hex dumps

/// Track level types: access units, seek index, timestamps
pub mod av;

/// AAC framing support
pub mod codec;

/// Error types and utilities
pub mod error;

/// Container formats (MPEG-TS)
pub mod format;

/// Common utilities and helper functions
pub mod utils;

/// Configuration module
pub mod config;

pub use error::{Result, TsAudioError};
