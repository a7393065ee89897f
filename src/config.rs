use anyhow::{Context, Result};
use serde::Deserialize;

use crate::audio::PcmSourceKind;
use crate::session::{expand_path, RecorderConfig};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub service: ServiceConfig,
    pub recorder: RecorderConfig,
    pub source: PcmSourceKind,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub name: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "wav-recorder".to_string(),
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()
            .with_context(|| format!("Failed to read config {}", path))?;

        let mut cfg: Self = settings
            .try_deserialize()
            .with_context(|| format!("Invalid config {}", path))?;

        if let Some(dir) = &cfg.recorder.wav_file_dir {
            cfg.recorder.wav_file_dir = Some(expand_path(&dir.to_string_lossy()));
        }

        Ok(cfg)
    }
}
