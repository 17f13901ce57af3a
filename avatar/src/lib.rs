#![allow(clippy::too_many_arguments)]

pub mod blink;
pub mod cache;
pub mod clip;
pub mod compositor;
pub mod error;
pub mod events;
pub mod expression;
pub mod gaze;
pub mod gesture;
pub mod idle;
pub mod interaction;
pub mod lipsync;
pub mod messages;
pub mod mixer;
pub mod mood;
pub mod pipeline;
pub mod reaction;
pub mod settings;
pub mod skeleton;
pub mod smoothing;
pub mod speech;

use bevy::prelude::*;
use cache::ClipCache;
use compositor::{
    AvatarRig, AvatarRng, AvatarState, FrameClock, FrameOutput, advance_blink_and_mood, advance_gaze,
    advance_gestures, advance_interaction, advance_lip_sync, advance_mixer, resolve_pose, return_to_idle,
    tick_frame_clock,
};
use events::{
    apply_avatar_binding, expire_clip_loads, handle_clip_loads, handle_commands, handle_speech_events,
    handle_voices, release_queued_speech, request_startup_clips,
};
use gaze::Viewer;
use messages::{
    AvatarBound, AvatarCommand, AvatarUnbound, CancelSpeech, ClipFinished, ClipLoadRequest, ClipLoaded,
    SpeakRequest, SpeechEvent, VoicesDiscovered,
};
use pipeline::AvatarPipeline;
use reaction::ReactionTable;
use settings::AvatarSettings;

pub use error::{AvatarError, Result};

/// Installs the avatar engine: its resources, messages and the ordered
/// [`AvatarPipeline`] in `Update`.
///
/// Renderers add their own systems to [`AvatarPipeline::Submit`] and read
/// [`FrameOutput`] there.
#[derive(Default)]
pub struct AvatarPlugin {
    pub settings: AvatarSettings,
}

impl AvatarPlugin {
    pub fn new(settings: AvatarSettings) -> Self {
        Self { settings }
    }
}

impl Plugin for AvatarPlugin {
    fn build(&self, app: &mut App) {
        let settings = self.settings.clone();
        app.insert_resource(ClipCache::new(&settings.clips))
            .insert_resource(ReactionTable::new(&settings.mood))
            .insert_resource(AvatarState::new(&settings))
            .insert_resource(AvatarRng::seeded(settings.seed))
            .insert_resource(settings)
            .init_resource::<FrameClock>()
            .init_resource::<AvatarRig>()
            .init_resource::<FrameOutput>()
            .init_resource::<Viewer>()
            .add_message::<AvatarCommand>()
            .add_message::<SpeakRequest>()
            .add_message::<CancelSpeech>()
            .add_message::<SpeechEvent>()
            .add_message::<VoicesDiscovered>()
            .add_message::<ClipLoadRequest>()
            .add_message::<ClipLoaded>()
            .add_message::<ClipFinished>()
            .add_message::<AvatarBound>()
            .add_message::<AvatarUnbound>();

        register_avatar_pipeline(app);
    }
}

pub fn register_avatar_pipeline(app: &mut App) {
    app.configure_sets(
        Update,
        (
            AvatarPipeline::Events,
            AvatarPipeline::Interaction,
            AvatarPipeline::Gaze,
            AvatarPipeline::Gesture,
            AvatarPipeline::Mixer,
            AvatarPipeline::Resolve,
            AvatarPipeline::Blink,
            AvatarPipeline::LipSync,
            AvatarPipeline::Submit,
        )
            .chain(),
    );

    app.add_systems(Startup, request_startup_clips)
        .add_systems(
            Update,
            (
                tick_frame_clock,
                apply_avatar_binding,
                handle_clip_loads,
                expire_clip_loads,
                handle_voices,
                handle_speech_events,
                handle_commands,
                release_queued_speech,
            )
                .chain()
                .in_set(AvatarPipeline::Events),
        )
        .add_systems(Update, advance_interaction.in_set(AvatarPipeline::Interaction))
        .add_systems(Update, advance_gaze.in_set(AvatarPipeline::Gaze))
        .add_systems(Update, advance_gestures.in_set(AvatarPipeline::Gesture))
        .add_systems(
            Update,
            (advance_mixer, return_to_idle)
                .chain()
                .in_set(AvatarPipeline::Mixer),
        )
        .add_systems(Update, resolve_pose.in_set(AvatarPipeline::Resolve))
        .add_systems(Update, advance_blink_and_mood.in_set(AvatarPipeline::Blink))
        .add_systems(Update, advance_lip_sync.in_set(AvatarPipeline::LipSync));
}
