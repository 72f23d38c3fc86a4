//! AAC framing: ADTS headers, AudioSpecificConfig, and the ADTS and
//! LOAS/LATM unwrappers that turn transport payloads into raw AAC frames.

pub mod adts;
pub mod latm;
pub mod parser;
pub mod types;

pub use adts::{ADTSUnwrapper, AdtsStatus};
pub use latm::{LATMUnwrapper, LatmStatus, StreamMuxConfig};
pub use parser::is_adts_sync;
pub use types::{
    sample_rate_from_index, AACConfig, ADTSHeader, AudioSpecificConfig, ProfileType, SbrSignal,
};
