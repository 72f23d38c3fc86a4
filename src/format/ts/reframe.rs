//! Turns PES payloads into one audio access unit per call, according to
//! how the track's audio is encapsulated.

use super::pes::PESPacket;
use crate::av::{AccessUnit, MuxingType, PesSource, RolloverState};
use crate::codec::aac::{
    AACConfig, ADTSUnwrapper, AdtsStatus, AudioSpecificConfig, LATMUnwrapper, LatmStatus,
};
use crate::config::Config;
use crate::{Result, TsAudioError};
use log::error;

/// One PES payload per access unit.
#[derive(Debug, Default)]
pub struct RawReframer;

impl RawReframer {
    pub fn next_unit<S: PesSource + ?Sized>(
        &mut self,
        source: &mut S,
        pes: &mut PESPacket,
        clock: &mut RolloverState,
        out: &mut [u8],
    ) -> Result<Option<AccessUnit>> {
        if !source.next_pes(pes)? {
            return Ok(None);
        }
        let data = pes.data();
        if data.len() > out.len() {
            return Err(TsAudioError::CapacityExceeded {
                size: data.len(),
                capacity: out.len(),
            });
        }
        out[..data.len()].copy_from_slice(data);
        Ok(Some(AccessUnit {
            size: data.len(),
            dts: clock.normalize(pes.pts),
        }))
    }
}

/// ADTS frames, possibly several per PES or split across PES packets.
#[derive(Debug)]
pub struct AdtsReframer {
    unwrapper: ADTSUnwrapper,
}

impl AdtsReframer {
    pub fn new(config: &Config) -> Self {
        Self {
            unwrapper: ADTSUnwrapper::with_max_buffer(config.parser_buffer_size),
        }
    }

    /// Only a frame completed by a PES fetched during this call gets that
    /// PES's timestamp; frames left over from an earlier PES get none.
    pub fn next_unit<S: PesSource + ?Sized>(
        &mut self,
        source: &mut S,
        pes: &mut PESPacket,
        clock: &mut RolloverState,
        out: &mut [u8],
    ) -> Result<Option<AccessUnit>> {
        let mut fetched = false;
        let mut feed = false;
        loop {
            let input: &[u8] = if feed { pes.data() } else { &[] };
            feed = false;
            if let AdtsStatus::Frame(size) = self.unwrapper.convert(input, out)? {
                let dts = if fetched {
                    clock.normalize(pes.pts)
                } else {
                    None
                };
                return Ok(Some(AccessUnit { size, dts }));
            }

            if !source.next_pes(pes)? {
                return Ok(None);
            }
            fetched = true;
            feed = true;
        }
    }

    pub fn reset(&mut self) {
        self.unwrapper.flush();
    }

    pub fn config(&self) -> Option<&AACConfig> {
        self.unwrapper.config()
    }
}

/// LOAS/LATM sync frames, each possibly holding several AAC frames.
#[derive(Debug)]
pub struct LatmReframer {
    unwrapper: LATMUnwrapper,
    retries: u32,
}

impl LatmReframer {
    pub fn new(config: &Config) -> Self {
        Self {
            unwrapper: LATMUnwrapper::with_max_buffer(config.parser_buffer_size),
            retries: config.latm_retries,
        }
    }

    pub fn next_unit<S: PesSource + ?Sized>(
        &mut self,
        source: &mut S,
        pes: &mut PESPacket,
        clock: &mut RolloverState,
        out: &mut [u8],
    ) -> Result<Option<AccessUnit>> {
        let mut budget = self.retries;
        let mut fetched = false;
        let mut reference = None;

        while self.unwrapper.is_empty() {
            if budget == 0 {
                error!(
                    "latm: no AAC frame after {} attempts on pid 0x{:x}",
                    self.retries, pes.pid
                );
                return Ok(None);
            }
            if fetched {
                reference = pes.pts;
            }
            if self.unwrapper.convert(reference) == LatmStatus::NeedMoreData {
                if !source.next_pes(pes)? {
                    return Ok(None);
                }
                fetched = true;
                if !self.unwrapper.push_data(pes.data()) {
                    self.unwrapper.flush();
                }
            }
            budget -= 1;
        }

        Ok(self
            .unwrapper
            .get_data(out)?
            .map(|(size, dts)| AccessUnit {
                size,
                dts: clock.normalize(dts),
            }))
    }

    pub fn reset(&mut self) {
        self.unwrapper.flush();
    }

    pub fn audio_specific_config(&self) -> Option<&AudioSpecificConfig> {
        self.unwrapper.audio_specific_config()
    }
}

/// The reframer matching a track's [`MuxingType`].
#[derive(Debug)]
pub enum Reframer {
    Raw(RawReframer),
    Adts(AdtsReframer),
    Latm(LatmReframer),
}

impl Reframer {
    pub fn new(muxing: MuxingType, config: &Config) -> Self {
        match muxing {
            MuxingType::Raw => Reframer::Raw(RawReframer),
            MuxingType::Adts => Reframer::Adts(AdtsReframer::new(config)),
            MuxingType::Latm => Reframer::Latm(LatmReframer::new(config)),
        }
    }

    pub fn muxing(&self) -> MuxingType {
        match self {
            Reframer::Raw(_) => MuxingType::Raw,
            Reframer::Adts(_) => MuxingType::Adts,
            Reframer::Latm(_) => MuxingType::Latm,
        }
    }

    /// Produces the next access unit into `out`, `Ok(None)` once the source
    /// is exhausted. A unit larger than `out` is a fatal error, never
    /// truncated.
    pub fn next_unit<S: PesSource + ?Sized>(
        &mut self,
        source: &mut S,
        pes: &mut PESPacket,
        clock: &mut RolloverState,
        out: &mut [u8],
    ) -> Result<Option<AccessUnit>> {
        match self {
            Reframer::Raw(r) => r.next_unit(source, pes, clock, out),
            Reframer::Adts(r) => r.next_unit(source, pes, clock, out),
            Reframer::Latm(r) => r.next_unit(source, pes, clock, out),
        }
    }

    /// Drops partial input and queued frames, e.g. before a seek.
    pub fn reset(&mut self) {
        match self {
            Reframer::Raw(_) => {}
            Reframer::Adts(r) => r.reset(),
            Reframer::Latm(r) => r.reset(),
        }
    }

    /// Decoder configuration learned from the stream so far.
    pub fn audio_config(&self) -> Option<AudioSpecificConfig> {
        match self {
            Reframer::Raw(_) => None,
            Reframer::Adts(r) => r.config().map(AACConfig::to_audio_specific_config),
            Reframer::Latm(r) => r.audio_specific_config().cloned(),
        }
    }
}
