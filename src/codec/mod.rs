pub mod aac;

// Re-export common types and functions
pub use aac::{ADTSUnwrapper, AudioSpecificConfig, LATMUnwrapper};
