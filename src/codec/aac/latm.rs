//! LOAS/LATM unwrapping (ISO/IEC 14496-3 1.7).
//!
//! Only the subset found in broadcast transport streams is handled:
//! AudioSyncStream framing with in-band StreamMuxConfig, one program with
//! one layer, and frameLengthType 0.

use super::types::AudioSpecificConfig;
use crate::config::get_config;
use crate::utils::BitReader;
use crate::{Result, TsAudioError};
use bytes::{Buf, Bytes, BytesMut};
use log::{debug, warn};
use std::collections::VecDeque;

const LOAS_SYNC: u8 = 0x56;
const LOAS_HEADER_LEN: usize = 3;

/// Outcome of one [`LATMUnwrapper::convert`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LatmStatus {
    /// No complete AudioSyncStream frame is buffered
    NeedMoreData,
    /// At least one frame was consumed
    Ok,
}

/// StreamMuxConfig fields needed to demultiplex the payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamMuxConfig {
    pub audio_mux_version: u8,
    /// Payloads per AudioMuxElement, minus one
    pub num_sub_frames: u8,
    pub audio_specific_config: AudioSpecificConfig,
    pub other_data_present: bool,
    pub other_data_len_bits: u32,
}

fn latm_get_value(reader: &mut BitReader) -> Result<u32> {
    let bytes_for_value = reader.read_bits(2)?;
    let mut value = 0u32;
    for _ in 0..=bytes_for_value {
        value = (value << 8) | reader.read_bits(8)?;
    }
    Ok(value)
}

impl StreamMuxConfig {
    pub fn read(reader: &mut BitReader) -> Result<StreamMuxConfig> {
        let audio_mux_version = reader.read_bits(1)? as u8;
        let audio_mux_version_a = if audio_mux_version == 1 {
            reader.read_bits(1)?
        } else {
            0
        };
        if audio_mux_version_a != 0 {
            return Err(TsAudioError::Codec("audioMuxVersionA 1 is reserved".into()));
        }
        if audio_mux_version == 1 {
            latm_get_value(reader)?; // taraBufferFullness
        }

        if !reader.read_bit()? {
            return Err(TsAudioError::Codec(
                "allStreamsSameTimeFraming=0 is not supported".into(),
            ));
        }
        let num_sub_frames = reader.read_bits(6)? as u8;
        let num_program = reader.read_bits(4)?;
        let num_layer = reader.read_bits(3)?;
        if num_program != 0 || num_layer != 0 {
            return Err(TsAudioError::Codec(format!(
                "{} programs with {} layers, only one of each is supported",
                num_program + 1,
                num_layer + 1
            )));
        }

        let audio_specific_config = if audio_mux_version == 0 {
            AudioSpecificConfig::read(reader)?
        } else {
            let asc_len = latm_get_value(reader)? as usize;
            let start = reader.position();
            let asc = AudioSpecificConfig::read(reader)?;
            let used = reader.position() - start;
            if used > asc_len {
                return Err(TsAudioError::Codec(format!(
                    "AudioSpecificConfig overruns its declared {} bits",
                    asc_len
                )));
            }
            reader.skip_bits(asc_len - used)?; // fillBits
            asc
        };

        let frame_length_type = reader.read_bits(3)?;
        if frame_length_type != 0 {
            return Err(TsAudioError::Codec(format!(
                "frameLengthType {} is not supported",
                frame_length_type
            )));
        }
        reader.skip_bits(8)?; // latmBufferFullness

        let other_data_present = reader.read_bit()?;
        let mut other_data_len_bits = 0;
        if other_data_present {
            if audio_mux_version == 1 {
                other_data_len_bits = latm_get_value(reader)?;
            } else {
                loop {
                    let escape = reader.read_bit()?;
                    other_data_len_bits = (other_data_len_bits << 8) + reader.read_bits(8)?;
                    if !escape {
                        break;
                    }
                }
            }
        }

        if reader.read_bit()? {
            reader.skip_bits(8)?; // crcCheckSum
        }

        Ok(StreamMuxConfig {
            audio_mux_version,
            num_sub_frames,
            audio_specific_config,
            other_data_present,
            other_data_len_bits,
        })
    }
}

#[derive(Debug)]
struct QueuedFrame {
    data: Bytes,
    dts: Option<u64>,
}

/// Turns a LOAS byte stream into raw AAC frames.
///
/// Input is pushed PES by PES with [`push_data`](Self::push_data);
/// [`convert`](Self::convert) demultiplexes complete AudioSyncStream frames
/// into a queue drained by [`get_data`](Self::get_data). The first frame
/// produced by a `convert` call carries the reference timestamp passed to
/// it, later ones carry none.
#[derive(Debug)]
pub struct LATMUnwrapper {
    buffer: BytesMut,
    frames: VecDeque<QueuedFrame>,
    mux_config: Option<StreamMuxConfig>,
    max_buffer: usize,
}

impl LATMUnwrapper {
    pub fn new() -> Self {
        Self::with_max_buffer(get_config().parser_buffer_size)
    }

    pub fn with_max_buffer(max_buffer: usize) -> Self {
        Self {
            buffer: BytesMut::new(),
            frames: VecDeque::new(),
            mux_config: None,
            max_buffer,
        }
    }

    /// Appends LOAS bytes. Returns false, leaving the buffer untouched, when
    /// they do not fit.
    pub fn push_data(&mut self, data: &[u8]) -> bool {
        if self.buffer.len() + data.len() > self.max_buffer {
            warn!(
                "latm: buffer overflow ({} + {} > {} bytes)",
                self.buffer.len(),
                data.len(),
                self.max_buffer
            );
            return false;
        }
        self.buffer.extend_from_slice(data);
        true
    }

    /// Demultiplexes buffered sync frames until at least one AAC frame is
    /// queued or no complete sync frame is left.
    pub fn convert(&mut self, reference: Option<u64>) -> LatmStatus {
        let mut reference = reference;
        let mut consumed = false;

        while self.frames.is_empty() {
            let element = match self.next_element() {
                Some(element) => element,
                None => break,
            };
            consumed = true;

            let before = self.frames.len();
            if let Err(e) = self.demux_element(&element, reference) {
                warn!("latm: dropping AudioMuxElement: {}", e);
                self.frames.truncate(before);
                continue;
            }
            if self.frames.len() > before {
                reference = None;
            }
        }

        if consumed || !self.frames.is_empty() {
            LatmStatus::Ok
        } else {
            LatmStatus::NeedMoreData
        }
    }

    /// Pops the oldest queued frame into `out`, returning its size and
    /// timestamp. A frame larger than `out` is an error and stays queued.
    pub fn get_data(&mut self, out: &mut [u8]) -> Result<Option<(usize, Option<u64>)>> {
        let len = match self.frames.front() {
            Some(frame) => frame.data.len(),
            None => return Ok(None),
        };
        if len > out.len() {
            return Err(TsAudioError::CapacityExceeded {
                size: len,
                capacity: out.len(),
            });
        }
        match self.frames.pop_front() {
            Some(frame) => {
                out[..len].copy_from_slice(&frame.data);
                Ok(Some((len, frame.dts)))
            }
            None => Ok(None),
        }
    }

    /// Drops buffered input and queued frames. The last StreamMuxConfig is
    /// kept so elements reusing it still decode.
    pub fn flush(&mut self) {
        self.buffer.clear();
        self.frames.clear();
    }

    /// True when no frame is queued.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn queued(&self) -> usize {
        self.frames.len()
    }

    pub fn stream_mux_config(&self) -> Option<&StreamMuxConfig> {
        self.mux_config.as_ref()
    }

    pub fn audio_specific_config(&self) -> Option<&AudioSpecificConfig> {
        self.mux_config.as_ref().map(|c| &c.audio_specific_config)
    }

    /// Splits the next complete AudioSyncStream frame off the buffer,
    /// skipping anything before a syncword.
    fn next_element(&mut self) -> Option<Bytes> {
        loop {
            let sync = self
                .buffer
                .windows(2)
                .position(|w| w[0] == LOAS_SYNC && (w[1] & 0xE0) == 0xE0);
            match sync {
                Some(0) => {}
                Some(skip) => {
                    warn!("latm: skipping {} bytes to next syncword", skip);
                    self.buffer.advance(skip);
                }
                None => {
                    let keep = usize::from(self.buffer.last() == Some(&LOAS_SYNC));
                    let skip = self.buffer.len() - keep;
                    if skip > 0 {
                        warn!("latm: no syncword in {} bytes, discarding", skip);
                        self.buffer.advance(skip);
                    }
                    return None;
                }
            }

            if self.buffer.len() < LOAS_HEADER_LEN {
                return None;
            }
            let length = (((self.buffer[1] & 0x1F) as usize) << 8) | self.buffer[2] as usize;
            if length == 0 {
                self.buffer.advance(LOAS_HEADER_LEN);
                continue;
            }
            if self.buffer.len() < LOAS_HEADER_LEN + length {
                return None;
            }
            self.buffer.advance(LOAS_HEADER_LEN);
            return Some(self.buffer.split_to(length).freeze());
        }
    }

    fn demux_element(&mut self, element: &[u8], reference: Option<u64>) -> Result<()> {
        let mut reader = BitReader::new(element);

        let use_same_stream_mux = reader.read_bit()?;
        if !use_same_stream_mux {
            let config = StreamMuxConfig::read(&mut reader)?;
            if self.mux_config.as_ref() != Some(&config) {
                debug!(
                    "latm: StreamMuxConfig v{}, object type {}, {} Hz, {} channel(s)",
                    config.audio_mux_version,
                    config.audio_specific_config.object_type,
                    config.audio_specific_config.sample_rate,
                    config.audio_specific_config.channel_configuration
                );
            }
            self.mux_config = Some(config);
        }

        let num_sub_frames = match &self.mux_config {
            Some(config) => config.num_sub_frames,
            None => {
                debug!("latm: no StreamMuxConfig yet, dropping element");
                return Ok(());
            }
        };

        let mut dts = reference;
        for _ in 0..=num_sub_frames {
            // PayloadLengthInfo
            let mut len = 0usize;
            loop {
                let tmp = reader.read_bits(8)? as usize;
                len += tmp;
                if tmp != 255 {
                    break;
                }
            }
            // PayloadMux, not byte aligned
            let mut payload = vec![0u8; len];
            reader.read_bytes(&mut payload)?;
            self.frames.push_back(QueuedFrame {
                data: Bytes::from(payload),
                dts: dts.take(),
            });
        }
        // otherData and byte alignment fill the rest of the element
        Ok(())
    }
}

impl Default for LATMUnwrapper {
    fn default() -> Self {
        Self::new()
    }
}
