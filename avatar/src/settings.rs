use bevy::prelude::*;
use common::{GestureKind, MotionKey};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

pub const SETTINGS_FILE_PATH: &str = "./avatar.yaml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameSettings {
    /// Upper bound on a single simulation step, whatever the real frame gap.
    pub max_delta_secs: f32,
}

impl Default for FrameSettings {
    fn default() -> Self {
        Self {
            max_delta_secs: 0.033,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GestureSettings {
    pub attack_fraction: f32,
    pub release_fraction: f32,
    pub min_intensity: f32,
    pub max_intensity: f32,
    pub min_duration: f32,
    pub max_duration: f32,
    pub default_duration: f32,
}

impl Default for GestureSettings {
    fn default() -> Self {
        Self {
            attack_fraction: 0.22,
            release_fraction: 0.30,
            min_intensity: 0.15,
            max_intensity: 1.25,
            min_duration: 0.1,
            max_duration: 10.0,
            default_duration: 0.9,
        }
    }
}

impl GestureSettings {
    pub fn clamp_duration(&self, duration: f32) -> f32 {
        if !duration.is_finite() {
            return self.default_duration.clamp(self.min_duration, self.max_duration);
        }
        duration.clamp(self.min_duration, self.max_duration)
    }

    pub fn clamp_intensity(&self, intensity: f32) -> f32 {
        if !intensity.is_finite() {
            return 1.0_f32.clamp(self.min_intensity, self.max_intensity);
        }
        intensity.clamp(self.min_intensity, self.max_intensity)
    }

    pub fn duration_for(&self, kind: GestureKind) -> f32 {
        match kind {
            GestureKind::Wave => 1.2,
            GestureKind::Sad | GestureKind::Shy => 1.1,
            GestureKind::Angry => 1.0,
            GestureKind::Surprise => 0.8,
            GestureKind::Happy | GestureKind::Think => self.default_duration,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GazeSettings {
    pub max_yaw: f32,
    pub max_pitch: f32,
    /// How much the viewer's own facing direction bends the gaze, 0..1.
    pub viewer_facing_blend: f32,
    /// Head height above the actor root when no skeleton is bound.
    pub head_height: f32,
    pub chest_share: f32,
    pub neck_share: f32,
    pub head_share: f32,
    pub chest_response: f32,
    pub neck_response: f32,
    pub head_response: f32,
    pub speaking_strength: f32,
    pub attentive_strength: f32,
    pub idle_strength: f32,
    pub strength_response: f32,
}

impl Default for GazeSettings {
    fn default() -> Self {
        Self {
            max_yaw: 0.9,
            max_pitch: 0.45,
            viewer_facing_blend: 0.25,
            head_height: 1.35,
            chest_share: 0.2,
            neck_share: 0.3,
            head_share: 0.5,
            chest_response: 4.0,
            neck_response: 7.0,
            head_response: 11.0,
            speaking_strength: 1.0,
            attentive_strength: 0.8,
            idle_strength: 0.35,
            strength_response: 3.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InteractionSettings {
    pub wander_enabled: bool,
    /// Floor-plane waypoints as `[x, z]`.
    pub waypoints: Vec<[f32; 2]>,
    pub home: [f32; 2],
    pub wander_speed: f32,
    pub wander_pause_secs: f32,
    pub approach_speed: f32,
    /// Stand-off distance kept from the viewer when approaching.
    pub approach_distance: f32,
    pub arrive_threshold: f32,
    pub approach_timeout_secs: f32,
    pub respond_secs: f32,
    pub attention_secs: f32,
    pub stage_min: [f32; 2],
    pub stage_max: [f32; 2],
    pub bob_height: f32,
    pub bob_frequency: f32,
    pub turn_rate: f32,
}

impl Default for InteractionSettings {
    fn default() -> Self {
        Self {
            wander_enabled: true,
            waypoints: vec![[0.0, 0.0], [-0.6, -0.3], [0.5, -0.4], [0.2, 0.3]],
            home: [0.0, 0.0],
            wander_speed: 0.35,
            wander_pause_secs: 3.5,
            approach_speed: 0.9,
            approach_distance: 1.4,
            arrive_threshold: 0.05,
            approach_timeout_secs: 4.0,
            respond_secs: 3.0,
            attention_secs: 6.0,
            stage_min: [-1.5, -1.2],
            stage_max: [1.5, 1.2],
            bob_height: 0.015,
            bob_frequency: 9.0,
            turn_rate: 6.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LipSyncSettings {
    /// Time each plan entry is held.
    pub step_secs: f32,
    pub pulse_decay_per_sec: f32,
    pub pulse_gain: f32,
    pub base_frequency: f32,
    pub base_level: f32,
    pub base_swing: f32,
    pub base_response: f32,
    pub amplitude_scale: f32,
    /// Longest time the mouth may take to close once speech stops.
    pub release_secs: f32,
    pub fallback_pulse_threshold: f32,
    pub fallback_pulse_rate: f32,
}

impl Default for LipSyncSettings {
    fn default() -> Self {
        Self {
            step_secs: 0.09,
            pulse_decay_per_sec: 5.5,
            pulse_gain: 0.75,
            base_frequency: 18.0,
            base_level: 0.25,
            base_swing: 0.35,
            base_response: 18.0,
            amplitude_scale: 0.85,
            release_secs: 0.2,
            fallback_pulse_threshold: 0.15,
            fallback_pulse_rate: 10.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlinkSettings {
    pub duration_secs: f32,
    pub min_cooldown_secs: f32,
    pub max_cooldown_secs: f32,
}

impl Default for BlinkSettings {
    fn default() -> Self {
        Self {
            duration_secs: 0.12,
            min_cooldown_secs: 1.6,
            max_cooldown_secs: 5.2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClipSettings {
    pub idle_key: String,
    pub base_path: String,
    pub load_timeout_secs: f32,
    pub preload: Vec<String>,
    /// Logical key to asset file, relative to `base_path`.
    pub files: BTreeMap<String, String>,
    pub default_fade_in: f32,
    pub one_shot_fade_out: f32,
    pub return_to_idle_fade: f32,
    /// A play requested before its clip loaded is dropped once older than this.
    pub pending_play_window_secs: f32,
}

impl Default for ClipSettings {
    fn default() -> Self {
        Self {
            idle_key: MotionKey::Idle.key().to_string(),
            base_path: "motions".to_string(),
            load_timeout_secs: 12.0,
            preload: [
                MotionKey::Greeting,
                MotionKey::Happy,
                MotionKey::Thinking,
                MotionKey::Surprised,
            ]
            .into_iter()
            .map(|motion| motion.key().to_string())
            .collect(),
            files: MotionKey::ALL
                .into_iter()
                .map(|motion| (motion.key().to_string(), motion.default_file().to_string()))
                .collect(),
            default_fade_in: 0.2,
            one_shot_fade_out: 0.12,
            return_to_idle_fade: 0.25,
            pending_play_window_secs: 3.0,
        }
    }
}

impl ClipSettings {
    pub fn asset_path(&self, key: &str) -> Option<String> {
        let file = self.files.get(key)?;
        if self.base_path.is_empty() {
            Some(file.clone())
        } else {
            Some(format!("{}/{}", self.base_path.trim_end_matches('/'), file))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechSettings {
    pub pitch: f32,
    pub rate: f32,
    pub voice_discovery_timeout_secs: f32,
}

impl Default for SpeechSettings {
    fn default() -> Self {
        Self {
            pitch: 1.35,
            rate: 1.15,
            voice_discovery_timeout_secs: 1.5,
        }
    }
}

impl SpeechSettings {
    pub fn clamp_pitch(pitch: f32) -> f32 {
        if pitch.is_finite() { pitch.clamp(0.0, 2.0) } else { 1.0 }
    }

    pub fn clamp_rate(rate: f32) -> f32 {
        if rate.is_finite() { rate.clamp(0.1, 10.0) } else { 1.0 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MoodSettings {
    pub baseline_happy: f32,
    pub baseline_relaxed: f32,
    pub reset_after_secs: f32,
    pub response: f32,
}

impl Default for MoodSettings {
    fn default() -> Self {
        Self {
            baseline_happy: 0.18,
            baseline_relaxed: 0.15,
            reset_after_secs: 1.6,
            response: 10.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Resource)]
#[serde(default)]
pub struct AvatarSettings {
    pub frame: FrameSettings,
    pub gesture: GestureSettings,
    pub gaze: GazeSettings,
    pub interaction: InteractionSettings,
    pub lip_sync: LipSyncSettings,
    pub blink: BlinkSettings,
    pub clips: ClipSettings,
    pub speech: SpeechSettings,
    pub mood: MoodSettings,
    pub seed: u64,
}

impl Default for AvatarSettings {
    fn default() -> Self {
        Self {
            frame: FrameSettings::default(),
            gesture: GestureSettings::default(),
            gaze: GazeSettings::default(),
            interaction: InteractionSettings::default(),
            lip_sync: LipSyncSettings::default(),
            blink: BlinkSettings::default(),
            clips: ClipSettings::default(),
            speech: SpeechSettings::default(),
            mood: MoodSettings::default(),
            seed: 0x5eed,
        }
    }
}

#[derive(Debug, Error)]
pub enum SettingsIoError {
    #[error("failed to read settings file: {0}")]
    Read(std::io::Error),
    #[error("failed to write settings file: {0}")]
    Write(std::io::Error),
    #[error("failed to decode YAML settings: {0}")]
    Deserialize(serde_yaml::Error),
    #[error("failed to encode YAML settings: {0}")]
    Serialize(serde_yaml::Error),
}

pub fn parse_settings(raw: &str) -> Result<AvatarSettings, SettingsIoError> {
    serde_yaml::from_str::<AvatarSettings>(raw).map_err(SettingsIoError::Deserialize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_yaml_keeps_defaults() {
        let settings = parse_settings("gesture:\n  attack_fraction: 0.3\nseed: 7\n")
            .expect("partial settings should parse");
        assert_eq!(settings.gesture.attack_fraction, 0.3);
        assert_eq!(settings.gesture.release_fraction, 0.30);
        assert_eq!(settings.seed, 7);
        assert_eq!(settings.clips.idle_key, "idle");
    }

    #[test]
    fn defaults_round_trip_through_yaml() {
        let defaults = AvatarSettings::default();
        let encoded = serde_yaml::to_string(&defaults).expect("encode");
        let decoded = parse_settings(&encoded).expect("decode");
        assert_eq!(decoded, defaults);
    }

    #[test]
    fn gesture_inputs_are_clamped() {
        let gesture = GestureSettings::default();
        assert_eq!(gesture.clamp_duration(f32::NAN), gesture.default_duration);
        assert_eq!(gesture.clamp_duration(1000.0), gesture.max_duration);
        assert_eq!(gesture.clamp_duration(-1.0), gesture.min_duration);
        assert_eq!(gesture.clamp_intensity(5.0), 1.25);
        assert_eq!(gesture.clamp_intensity(0.0), 0.15);
        assert_eq!(gesture.clamp_intensity(f32::INFINITY), 1.0);
    }

    #[test]
    fn asset_path_joins_base() {
        let clips = ClipSettings::default();
        assert_eq!(
            clips.asset_path("idle").as_deref(),
            Some("motions/relax.motion.json")
        );
        assert_eq!(clips.asset_path("nope"), None);
    }
}
