//! Configuration management for shadowdesk.
//!
//! Loads config from a YAML file in standard locations, then applies
//! environment overrides for credentials and the listen address. The
//! result is read once at startup and never mutated afterwards.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 5000,
        }
    }
}

/// Chat-completion service used to condense tickets into one sentence.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SummarizerConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: f64,
    pub timeout_secs: u64,
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com".into(),
            api_key: None,
            model: "gpt-4".into(),
            temperature: 0.7,
            timeout_secs: 30,
        }
    }
}

/// Remote voice service plus the external player used for its audio.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub voice_id: String,
    pub model_id: String,
    pub stability: f64,
    pub similarity_boost: f64,
    pub timeout_secs: u64,
    pub player: String,
    pub player_args: Vec<String>,
    pub min_playback_ms: u64,
    pub temp_dir: Option<PathBuf>,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.elevenlabs.io".into(),
            api_key: None,
            voice_id: "EXAVITQu4vr4xnSDxMaL".into(),
            model_id: "eleven_multilingual_v2".into(),
            stability: 0.4,
            similarity_boost: 0.7,
            timeout_secs: 60,
            player: "ffplay".into(),
            player_args: vec![
                "-nodisp".into(),
                "-autoexit".into(),
                "-loglevel".into(),
                "quiet".into(),
            ],
            min_playback_ms: 1000,
            temp_dir: None,
        }
    }
}

impl VoiceConfig {
    /// The remote backend is selected only when a credential is configured.
    pub fn has_credential(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }
}

/// In-process Kokoro engine used when no voice credential is present.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LocalVoiceConfig {
    /// Speaking rate in words per minute.
    pub rate: u32,
    pub voice: String,
    pub model_path: String,
    pub voices_path: String,
    pub tokenizer_path: String,
}

impl Default for LocalVoiceConfig {
    fn default() -> Self {
        Self {
            rate: 180,
            voice: "af_heart".into(),
            model_path: "kokoro-v1.0.onnx".into(),
            voices_path: "voices-v1.0.bin".into(),
            tokenizer_path: "tokenizer.json".into(),
        }
    }
}

/// Words per minute that map to Kokoro speed 1.0.
pub const BASELINE_RATE_WPM: f32 = 180.0;

impl LocalVoiceConfig {
    pub fn speed(&self) -> f32 {
        (self.rate as f32 / BASELINE_RATE_WPM).clamp(0.5, 2.0)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub summarizer: SummarizerConfig,
    pub voice: VoiceConfig,
    pub local: LocalVoiceConfig,
    /// Retry a failed remote synthesis once on the local engine.
    pub fallback_to_local: bool,
}

impl Config {
    /// Load configuration from YAML, then apply environment overrides.
    ///
    /// Searches standard locations if no path is provided:
    /// 1. ./shadowdesk.yaml
    /// 2. ~/.config/shadowdesk/config.yaml
    /// 3. /etc/shadowdesk/config.yaml
    pub fn load(path: Option<&Path>) -> Self {
        let mut config = Self::load_file(path);
        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    fn load_file(path: Option<&Path>) -> Self {
        let resolved = path.map(PathBuf::from).or_else(|| {
            let candidates = [
                std::env::current_dir().ok().map(|d| d.join("shadowdesk.yaml")),
                dirs::home_dir().map(|h| h.join(".config/shadowdesk/config.yaml")),
                Some(PathBuf::from("/etc/shadowdesk/config.yaml")),
            ];
            candidates.into_iter().flatten().find(|p| p.exists())
        });

        let Some(config_path) = resolved else {
            info!("No config file found, using defaults");
            return Self::default();
        };

        match std::fs::read_to_string(&config_path) {
            Ok(contents) => match Self::from_yaml(&contents) {
                Ok(config) => {
                    info!("Loaded config from {}", config_path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {e}, using defaults", config_path.display());
                    Self::default()
                }
            },
            Err(e) => {
                tracing::warn!("Failed to read {}: {e}, using defaults", config_path.display());
                Self::default()
            }
        }
    }

    pub fn from_yaml(contents: &str) -> Result<Self, serde_yml::Error> {
        serde_yml::from_str(contents)
    }

    /// Overlay values from the environment. `lookup` is injected so tests
    /// don't have to touch the process environment.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = non_empty("OPENAI_API_KEY") {
            self.summarizer.api_key = Some(key);
        }
        if let Some(url) = non_empty("OPENAI_BASE_URL") {
            self.summarizer.base_url = url;
        }
        if let Some(model) = non_empty("OPENAI_MODEL") {
            self.summarizer.model = model;
        }
        if let Some(key) = non_empty("ELEVENLABS_API_KEY") {
            self.voice.api_key = Some(key);
        }
        if let Some(voice_id) = non_empty("ELEVENLABS_VOICE_ID") {
            self.voice.voice_id = voice_id;
        }
        if let Some(host) = non_empty("SHADOWDESK_HOST") {
            self.server.host = host;
        }
        if let Some(port) = non_empty("SHADOWDESK_PORT") {
            match port.parse() {
                Ok(p) => self.server.port = p,
                Err(_) => tracing::warn!("Ignoring SHADOWDESK_PORT={port}: not a port number"),
            }
        }
    }
}
