use avatar::AvatarPlugin;
use bevy::prelude::*;
use bevy_egui::EguiPlugin;

use crate::app::plugins::{build_bevy_plugins, create_winit_settings};
use crate::chat::ChatPlugin;
use crate::clip_assets::ClipAssetsPlugin;
use crate::rig::RigPlugin;
use crate::settings::{self, ClientSettings, SettingsPlugin, SettingsResource};
use crate::speech::SpeechBackendPlugin;
use crate::stage::StagePlugin;

pub fn run_client_app() {
    let startup_settings = load_startup_settings();
    let mut app = App::new();
    configure_client_app(&mut app, &startup_settings);
    app.run();
}

pub fn configure_client_app(app: &mut App, startup_settings: &ClientSettings) {
    app.insert_resource(SettingsResource::new(startup_settings.clone()))
        .add_plugins(build_bevy_plugins(startup_settings))
        .insert_resource(create_winit_settings(startup_settings))
        .add_plugins(EguiPlugin::default())
        .add_plugins(AvatarPlugin::new(startup_settings.avatar.clone()))
        .add_plugins(SettingsPlugin)
        .add_plugins(StagePlugin)
        .add_plugins(ClipAssetsPlugin)
        .add_plugins(SpeechBackendPlugin)
        .add_plugins(RigPlugin)
        .add_plugins(ChatPlugin);
}

fn load_startup_settings() -> ClientSettings {
    let startup_settings = settings::load_settings_or_default();
    if let Err(error) = settings::ensure_settings_file_exists(&startup_settings) {
        eprintln!(
            "Failed to ensure startup settings file '{}': {}",
            settings::SETTINGS_FILE_PATH,
            error
        );
    }
    startup_settings
}
