/*
 * Golf Caddie CLI - Rust Edition
 * Copyright (c) 2024 Golf Caddie Contributors
 *
 * This work is licensed under the Creative Commons Attribution-NonCommercial 4.0 International License.
 * To view a copy of this license, visit http://creativecommons.org/licenses/by-nc/4.0/
 *
 * You are free to share and adapt this work for non-commercial purposes with attribution.
 * Commercial use is prohibited without explicit written permission.
 *
 * For commercial licensing inquiries, please contact the project maintainers.
 */

use anyhow::{Context, Result};
use dirs::home_dir;
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// Shared application credential, the fallback tier.
    pub api_key: String,
    /// Base URL for both transcription and classification requests.
    pub api_base: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_base: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            max_tokens: 400,
            temperature: 0.2,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AudioConfig {
    pub device: String,
    pub sample_rate: u32,
    pub channels: u16,
    /// Recording sessions longer than this get a warning in the log.
    pub max_recording_secs: u64,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            device: "default".to_string(),
            sample_rate: 16000,
            channels: 1,
            max_recording_secs: 120,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub openai: OpenAiConfig,
    pub audio: AudioConfig,
    pub data_dir: PathBuf,
    pub temp_dir: PathBuf,
    /// Delay before a navigation follow-up fires, so the confirmation
    /// message renders first. Tunable, not a contract.
    pub nav_delay_ms: u64,
    /// Exposes the debug trace queue navigation in the REPL.
    pub verbose_trace: bool,
    pub language: String,
    pub user_id: Option<String>,
}

impl Config {
    pub async fn load() -> Result<Self> {
        // Load environment variables from .env file if it exists
        dotenv::dotenv().ok();

        let api_key = env::var("OPENAI_API_KEY")
            .context("OPENAI_API_KEY environment variable not found")?;

        let api_base = env::var("CADDIE_API_BASE")
            .unwrap_or_else(|_| "https://api.openai.com/v1".to_string());

        let model = env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());

        let max_tokens = env::var("OPENAI_MAX_TOKENS")
            .unwrap_or_else(|_| "400".to_string())
            .parse::<u32>()
            .unwrap_or(400);

        let temperature = env::var("OPENAI_TEMPERATURE")
            .unwrap_or_else(|_| "0.2".to_string())
            .parse::<f32>()
            .unwrap_or(0.2);

        let openai = OpenAiConfig {
            api_key,
            api_base,
            model,
            max_tokens,
            temperature,
        };

        let device = env::var("AUDIO_DEVICE").unwrap_or_else(|_| "default".to_string());

        let sample_rate = env::var("AUDIO_SAMPLE_RATE")
            .unwrap_or_else(|_| "16000".to_string())
            .parse::<u32>()
            .unwrap_or(16000);

        let channels = env::var("AUDIO_CHANNELS")
            .unwrap_or_else(|_| "1".to_string())
            .parse::<u16>()
            .unwrap_or(1);

        let max_recording_secs = env::var("MAX_RECORDING_SECS")
            .unwrap_or_else(|_| "120".to_string())
            .parse::<u64>()
            .unwrap_or(120);

        let audio = AudioConfig {
            device,
            sample_rate,
            channels,
            max_recording_secs,
        };

        let data_dir = env::var("CADDIE_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                home_dir()
                    .unwrap_or_else(|| PathBuf::from("/tmp"))
                    .join(".golf-caddie")
            });

        let temp_dir = data_dir.join("temp");

        std::fs::create_dir_all(&temp_dir).context("Failed to create temporary directory")?;

        let nav_delay_ms = env::var("CADDIE_NAV_DELAY_MS")
            .unwrap_or_else(|_| "900".to_string())
            .parse::<u64>()
            .unwrap_or(900);

        let verbose_trace = env::var("CADDIE_VERBOSE_TRACE")
            .unwrap_or_else(|_| "false".to_string())
            .parse::<bool>()
            .unwrap_or(false);

        let language = env::var("CADDIE_LANGUAGE").unwrap_or_else(|_| "en".to_string());

        let user_id = env::var("CADDIE_USER").ok().filter(|v| !v.trim().is_empty());

        Ok(Config {
            openai,
            audio,
            data_dir,
            temp_dir,
            nav_delay_ms,
            verbose_trace,
            language,
            user_id,
        })
    }

    pub fn get_temp_file(&self, prefix: &str, extension: &str) -> PathBuf {
        let timestamp = chrono::Utc::now().timestamp_millis();
        let filename = format!("{}_{}.{}", prefix, timestamp, extension);
        self.temp_dir.join(filename)
    }
}
