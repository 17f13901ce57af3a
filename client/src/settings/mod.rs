use avatar::settings::AvatarSettings;
pub use avatar::settings::SettingsIoError;
use bevy::prelude::*;
use bevy::window::{MonitorSelection, PresentMode, PrimaryWindow, WindowMode, WindowResolution};
use bevy::winit::{UpdateMode, WinitSettings};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const SETTINGS_FILE_PATH: &str = "./settings.yaml";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowModeSetting {
    #[default]
    Windowed,
    Fullscreen,
}

impl WindowModeSetting {
    pub fn to_bevy(self) -> WindowMode {
        match self {
            Self::Windowed => WindowMode::Windowed,
            Self::Fullscreen => WindowMode::BorderlessFullscreen(MonitorSelection::Current),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FpsLimitSetting {
    #[default]
    Default60,
    Unlimited,
}

impl FpsLimitSetting {
    pub fn to_update_mode(self) -> UpdateMode {
        match self {
            Self::Default60 => UpdateMode::reactive(Duration::from_secs_f64(1.0 / 60.0)),
            Self::Unlimited => UpdateMode::Continuous,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolutionSetting {
    pub width: u32,
    pub height: u32,
}

impl Default for ResolutionSetting {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphicsSettings {
    pub window_mode: WindowModeSetting,
    pub resolution: ResolutionSetting,
    pub vsync: bool,
    pub fps_limit: FpsLimitSetting,
    pub shadows: bool,
}

impl Default for GraphicsSettings {
    fn default() -> Self {
        Self {
            window_mode: WindowModeSetting::Windowed,
            resolution: ResolutionSetting::default(),
            vsync: true,
            fps_limit: FpsLimitSetting::Default60,
            shadows: true,
        }
    }
}

/// What the stage shows and where the camera starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageSettings {
    /// glTF/GLB file relative to the asset directory. VRM models load once
    /// renamed to `.glb`.
    pub model_path: String,
    pub model_scale: f32,
    pub camera_distance: f32,
    pub camera_height: f32,
    pub orbit_sensitivity: f32,
    pub zoom_sensitivity: f32,
}

impl Default for StageSettings {
    fn default() -> Self {
        Self {
            model_path: "models/avatar.glb".to_string(),
            model_scale: 1.0,
            camera_distance: 2.6,
            camera_height: 1.4,
            orbit_sensitivity: 0.005,
            zoom_sensitivity: 0.25,
        }
    }
}

/// Local stand-in for a platform speech service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceBackendSettings {
    /// Also play audio through `espeak-ng` when it is installed.
    pub espeak_enabled: bool,
    pub espeak_command: String,
    pub espeak_voice: String,
    /// Simulated speaking speed at rate 1.0.
    pub chars_per_sec: f32,
    pub reply_delay_secs: f32,
}

impl Default for VoiceBackendSettings {
    fn default() -> Self {
        Self {
            espeak_enabled: true,
            espeak_command: "espeak-ng".to_string(),
            espeak_voice: "ko".to_string(),
            chars_per_sec: 9.0,
            reply_delay_secs: 0.25,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ClientSettings {
    pub graphics: GraphicsSettings,
    pub stage: StageSettings,
    pub voice: VoiceBackendSettings,
    pub avatar: AvatarSettings,
}

#[derive(Resource, Clone)]
pub struct SettingsResource {
    pub current: ClientSettings,
    path: PathBuf,
}

impl SettingsResource {
    pub fn new(current: ClientSettings) -> Self {
        Self {
            current,
            path: PathBuf::from(SETTINGS_FILE_PATH),
        }
    }

    pub fn save_to_disk(&self) -> Result<(), SettingsIoError> {
        write_settings_to_path(&self.current, &self.path)
    }
}

pub struct SettingsPlugin;

impl Plugin for SettingsPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Update, apply_runtime_settings);
    }
}

pub fn load_settings_or_default() -> ClientSettings {
    let path = Path::new(SETTINGS_FILE_PATH);

    if !path.exists() {
        return ClientSettings::default();
    }

    match load_settings_from_path(path) {
        Ok(settings) => settings,
        Err(error) => {
            eprintln!(
                "Failed to load settings from '{}': {}. Falling back to defaults.",
                SETTINGS_FILE_PATH, error
            );
            ClientSettings::default()
        }
    }
}

pub fn ensure_settings_file_exists(settings: &ClientSettings) -> Result<(), SettingsIoError> {
    let path = Path::new(SETTINGS_FILE_PATH);
    if path.exists() {
        return Ok(());
    }

    write_settings_to_path(settings, path)
}

pub fn present_mode_for(graphics: &GraphicsSettings) -> PresentMode {
    if matches!(graphics.fps_limit, FpsLimitSetting::Unlimited) || !graphics.vsync {
        PresentMode::AutoNoVsync
    } else {
        PresentMode::AutoVsync
    }
}

pub fn parse_settings(raw: &str) -> Result<ClientSettings, SettingsIoError> {
    serde_yaml::from_str::<ClientSettings>(raw).map_err(SettingsIoError::Deserialize)
}

fn load_settings_from_path(path: &Path) -> Result<ClientSettings, SettingsIoError> {
    let raw = fs::read_to_string(path).map_err(SettingsIoError::Read)?;
    parse_settings(&raw)
}

fn write_settings_to_path(settings: &ClientSettings, path: &Path) -> Result<(), SettingsIoError> {
    let encoded = serde_yaml::to_string(settings).map_err(SettingsIoError::Serialize)?;
    fs::write(path, encoded).map_err(SettingsIoError::Write)
}

fn apply_runtime_settings(
    settings: Res<SettingsResource>,
    mut windows: Query<&mut Window, With<PrimaryWindow>>,
    mut winit_settings: ResMut<WinitSettings>,
    mut last_applied: Local<Option<GraphicsSettings>>,
) {
    let graphics = &settings.current.graphics;
    if last_applied.as_ref() == Some(graphics) {
        return;
    }

    if let Ok(mut window) = windows.single_mut() {
        let target_mode = graphics.window_mode.to_bevy();
        window.mode = target_mode;
        if matches!(target_mode, WindowMode::Windowed) {
            window.resolution =
                WindowResolution::new(graphics.resolution.width, graphics.resolution.height);
        }
        window.present_mode = present_mode_for(graphics);
    }

    let update_mode = graphics.fps_limit.to_update_mode();
    winit_settings.focused_mode = update_mode;
    winit_settings.unfocused_mode = update_mode;

    *last_applied = Some(graphics.clone());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn avatar_section_is_read_beside_graphics() {
        let raw = "graphics:\n  vsync: false\navatar:\n  speech:\n    pitch: 1.1\n";
        let settings = parse_settings(raw).expect("valid yaml");
        assert!(!settings.graphics.vsync);
        assert_eq!(settings.avatar.speech.pitch, 1.1);
        assert_eq!(settings.avatar.speech.rate, 1.15);
        assert_eq!(settings.stage, StageSettings::default());
    }

    #[test]
    fn unlimited_fps_disables_vsync() {
        let graphics = GraphicsSettings {
            fps_limit: FpsLimitSetting::Unlimited,
            ..GraphicsSettings::default()
        };
        assert_eq!(present_mode_for(&graphics), PresentMode::AutoNoVsync);
        assert_eq!(present_mode_for(&GraphicsSettings::default()), PresentMode::AutoVsync);
    }
}
