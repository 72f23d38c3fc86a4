use crate::error::{Result, TsAudioError};
use lazy_static::lazy_static;
use serde::Deserialize;
use std::env;
use std::path::Path;
use std::sync::RwLock;

lazy_static! {
    static ref CONFIG: RwLock<Config> = RwLock::new(Config::load());
}

/// Tunables for track access. Snapshotted by each track when it is opened.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Converter attempts allowed per LATM read before giving up on the frame.
    pub latm_retries: u32,
    /// Zeroed bytes appended after codec extra data.
    pub extra_data_padding: usize,
    /// Buffer size used by `TSAudioAccess::next_packet`.
    pub max_packet_size: usize,
    /// Upper bound on bytes held by the ADTS/LATM unwrappers.
    pub parser_buffer_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            latm_retries: 20,
            extra_data_padding: 64,
            max_packet_size: 64 * 1024,
            parser_buffer_size: 256 * 1024,
        }
    }
}

const CONFIG_PATHS: [&str; 2] = ["./tsaudio.toml", "./tsaudio_config.toml"];

impl Config {
    fn load() -> Self {
        let mut config = Config::default();

        for path in &CONFIG_PATHS {
            if !Path::new(path).exists() {
                continue;
            }
            match Config::from_file(path) {
                Ok(file_config) => {
                    config = file_config;
                    break;
                }
                Err(e) => log::warn!("Ignoring config file {}: {}", path, e),
            }
        }

        // Environment wins over the file
        config.apply_env();
        config
    }

    /// Overrides fields from `TSAUDIO_*` environment variables.
    fn apply_env(&mut self) {
        if let Some(v) = env_parse("TSAUDIO_LATM_RETRIES") {
            self.latm_retries = v;
        }
        if let Some(v) = env_parse("TSAUDIO_EXTRA_DATA_PADDING") {
            self.extra_data_padding = v;
        }
        if let Some(v) = env_parse("TSAUDIO_MAX_PACKET_SIZE") {
            self.max_packet_size = v;
        }
        if let Some(v) = env_parse("TSAUDIO_PARSER_BUFFER") {
            self.parser_buffer_size = v;
        }
    }

    /// Parses a TOML config. Missing keys keep their defaults.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| TsAudioError::Config(e.to_string()))
    }

    /// Reads and parses a TOML config file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Re-reads environment and config files into the global config.
    pub fn reload() {
        let new_config = Config::load();
        if let Ok(mut config) = CONFIG.write() {
            *config = new_config;
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            log::warn!("Ignoring {}={:?}: not a number", key, raw);
            None
        }
    }
}

/// Returns a snapshot of the process-wide configuration
pub fn get_config() -> Config {
    CONFIG
        .read()
        .map(|config| config.clone())
        .unwrap_or_default()
}

/// Creates a default config template file if it doesn't exist
pub fn create_default_config_template<P: AsRef<Path>>(path: P) -> std::io::Result<()> {
    if !path.as_ref().exists() {
        let template = r#"# tsaudio configuration

# Converter attempts per LATM read before the track reports end of data
latm_retries = 20

# Zeroed bytes appended after codec extra data
extra_data_padding = 64

# Buffer size for owned packet reads
max_packet_size = 65536

# Upper bound on bytes buffered by the ADTS/LATM unwrappers
parser_buffer_size = 262144
"#;
        std::fs::write(path, template)?;
    }
    Ok(())
}
