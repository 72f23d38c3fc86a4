use super::parser::is_adts_sync;
use super::types::{AACConfig, ADTSHeader};
use crate::config::get_config;
use crate::{Result, TsAudioError};
use bytes::{Buf, BytesMut};
use log::{debug, warn};

/// Outcome of one [`ADTSUnwrapper::convert`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdtsStatus {
    /// A raw AAC frame of this many bytes was written to the output
    Frame(usize),
    /// No complete frame is buffered
    NeedMoreInput,
}

/// Strips ADTS headers from a byte stream, one frame per call.
///
/// Input may be split anywhere; partial frames are kept until the rest
/// arrives. Several frames fed at once are handed out over successive
/// calls with an empty input.
#[derive(Debug)]
pub struct ADTSUnwrapper {
    buffer: BytesMut,
    config: Option<AACConfig>,
    max_buffer: usize,
}

impl ADTSUnwrapper {
    pub fn new() -> Self {
        Self::with_max_buffer(get_config().parser_buffer_size)
    }

    pub fn with_max_buffer(max_buffer: usize) -> Self {
        Self {
            buffer: BytesMut::new(),
            config: None,
            max_buffer,
        }
    }

    /// Configuration of the first valid header seen.
    pub fn config(&self) -> Option<&AACConfig> {
        self.config.as_ref()
    }

    /// Bytes waiting for the rest of their frame.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Drops any partially buffered input.
    pub fn flush(&mut self) {
        self.buffer.clear();
    }

    /// Appends `input` and writes the next complete raw frame into `out`.
    ///
    /// A frame larger than `out` is an error; the frame stays buffered.
    pub fn convert(&mut self, input: &[u8], out: &mut [u8]) -> Result<AdtsStatus> {
        self.append(input);

        loop {
            if !self.skip_to_sync() {
                return Ok(AdtsStatus::NeedMoreInput);
            }
            if self.buffer.len() < ADTSHeader::MIN_SIZE {
                return Ok(AdtsStatus::NeedMoreInput);
            }

            let header = match ADTSHeader::parse(&self.buffer[..ADTSHeader::MIN_SIZE]) {
                Ok(header) => header,
                Err(e) => {
                    debug!("adts: false sync ({}), skipping one byte", e);
                    self.buffer.advance(1);
                    continue;
                }
            };

            let frame_len = header.frame_length as usize;
            if self.buffer.len() < frame_len {
                return Ok(AdtsStatus::NeedMoreInput);
            }

            let payload_len = frame_len - header.header_len();
            if payload_len > out.len() {
                return Err(TsAudioError::CapacityExceeded {
                    size: payload_len,
                    capacity: out.len(),
                });
            }

            if self.config.is_none() {
                let config = header.config();
                debug!(
                    "adts: {:?}, {} Hz, {} channel(s)",
                    config.profile,
                    config.sample_rate().unwrap_or(0),
                    config.channel_configuration
                );
                self.config = Some(config);
            }

            out[..payload_len].copy_from_slice(&self.buffer[header.header_len()..frame_len]);
            self.buffer.advance(frame_len);
            return Ok(AdtsStatus::Frame(payload_len));
        }
    }

    fn append(&mut self, input: &[u8]) {
        if input.is_empty() {
            return;
        }
        let total = self.buffer.len() + input.len();
        if total > self.max_buffer {
            let excess = (total - self.max_buffer).min(self.buffer.len());
            warn!("adts: buffer overflow, dropping {} buffered bytes", excess);
            self.buffer.advance(excess);
        }
        self.buffer.extend_from_slice(input);
    }

    /// Discards bytes before the next candidate syncword. Returns false when
    /// the buffer holds no candidate yet; a trailing 0xFF is kept.
    fn skip_to_sync(&mut self) -> bool {
        let found = self
            .buffer
            .windows(2)
            .position(is_adts_sync);
        match found {
            Some(0) => true,
            Some(skip) => {
                warn!("adts: skipping {} bytes of garbage", skip);
                self.buffer.advance(skip);
                true
            }
            None => {
                let keep = usize::from(self.buffer.last() == Some(&0xFF));
                let skip = self.buffer.len() - keep;
                if skip > 0 {
                    warn!("adts: no syncword in {} bytes, discarding", skip);
                    self.buffer.advance(skip);
                }
                false
            }
        }
    }
}

impl Default for ADTSUnwrapper {
    fn default() -> Self {
        Self::new()
    }
}
