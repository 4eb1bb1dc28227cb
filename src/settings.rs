use directories::ProjectDirs;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct EngineSettings {
    pub host_name: Option<String>,
    pub input_device: Option<String>,
    pub output_device: Option<String>,
    pub sample_rate: Option<u32>,
    pub buffer_size: Option<u32>,
    pub input_latency_compensation_ms: f32,
    pub default_tempo: f32,
    pub count_in_beats: u32,
    pub max_tracks: usize,
    /// Largest block the processor can render without allocating.
    pub max_block_frames: usize,
    /// Capacity of the capture queue between polls of the engine.
    pub capture_buffer_seconds: f32,
    pub history_limit: usize,
    /// Window for merging slider drags into one undo step; 0 disables.
    pub history_coalesce_ms: u64,
    pub metronome_volume: f32,
    pub metronome_pitch_hz: f32,
    pub metronome_accent_pitch_hz: f32,
    pub initial_tracks: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            host_name: None,
            input_device: None,
            output_device: None,
            sample_rate: None,
            buffer_size: None,
            input_latency_compensation_ms: 0.0,
            default_tempo: 120.0,
            count_in_beats: 4,
            max_tracks: 32,
            max_block_frames: 4096,
            capture_buffer_seconds: 8.0,
            history_limit: 200,
            history_coalesce_ms: 400,
            metronome_volume: 0.5,
            metronome_pitch_hz: 880.0,
            metronome_accent_pitch_hz: 1760.0,
            initial_tracks: 1,
        }
    }
}

pub fn get_config_dir() -> Option<PathBuf> {
    let dirs = ProjectDirs::from("", "", "loopcraft")?;
    let dir = dirs.config_dir().to_path_buf();
    if !dir.exists() {
        if let Err(e) = fs::create_dir_all(&dir) {
            warn!("Failed to create config directory at {}: {}", dir.display(), e);
            return None;
        }
    }
    Some(dir)
}

pub fn save_settings(settings: &EngineSettings) {
    if let Some(dir) = get_config_dir() {
        let path = dir.join("settings.json");
        match serde_json::to_string_pretty(settings) {
            Ok(json_string) => {
                if let Err(e) = fs::write(&path, json_string) {
                    warn!("Failed to write settings to {}: {}", path.display(), e);
                }
            }
            Err(e) => warn!("Failed to serialize settings: {}", e),
        }
    }
}

pub fn load_settings() -> EngineSettings {
    if let Some(dir) = get_config_dir() {
        let path = dir.join("settings.json");
        if path.exists() {
            return match fs::read_to_string(&path) {
                Ok(json_string) => parse_settings(&json_string),
                Err(e) => {
                    warn!("Failed to read settings file, using defaults. Error: {}", e);
                    EngineSettings::default()
                }
            };
        }
        info!("No settings at {}, using defaults", path.display());
    }
    EngineSettings::default()
}

fn parse_settings(json_string: &str) -> EngineSettings {
    match serde_json::from_str(json_string) {
        Ok(settings) => settings,
        Err(e) => {
            warn!("Failed to parse settings file, using defaults. Error: {}", e);
            EngineSettings::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults_for_missing_fields() {
        let settings = parse_settings(r#"{ "default_tempo": 96.0, "count_in_beats": 2 }"#);
        assert_eq!(settings.default_tempo, 96.0);
        assert_eq!(settings.count_in_beats, 2);
        assert_eq!(settings.max_tracks, EngineSettings::default().max_tracks);
    }

    #[test]
    fn garbage_falls_back_to_defaults() {
        assert_eq!(parse_settings("not json"), EngineSettings::default());
    }

    #[test]
    fn settings_survive_a_json_round_trip() {
        let mut settings = EngineSettings::default();
        settings.output_device = Some("Studio Out".into());
        settings.history_coalesce_ms = 0;
        let json = serde_json::to_string(&settings).unwrap();
        assert_eq!(parse_settings(&json), settings);
    }
}
