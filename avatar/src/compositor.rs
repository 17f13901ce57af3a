//! Engine resources and the per-frame stage systems.

use crate::blink::BlinkTimer;
use crate::cache::ClipCache;
use crate::expression::{Capabilities, ExpressionFrame};
use crate::gaze::{GazeController, Viewer};
use crate::gesture::GestureMachine;
use crate::idle::IdleMotion;
use crate::interaction::{InteractionMode, InteractionState, RootTransform};
use crate::lipsync::LipSync;
use crate::messages::ClipFinished;
use crate::mixer::{ClipMixer, LoopMode, PlayOptions};
use crate::mood::Mood;
use crate::settings::AvatarSettings;
use crate::skeleton::{Pose, Skeleton};
use crate::speech::SpeechState;
use bevy::prelude::*;
use common::ExpressionRole;
use rand::SeedableRng;
use rand::rngs::StdRng;

/// Simulation time. `dt` is the real frame gap clamped to
/// `frame.max_delta_secs`; `elapsed` is the sum of clamped steps.
#[derive(Resource, Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameClock {
    pub dt: f32,
    pub elapsed: f32,
}

impl FrameClock {
    pub fn step(&mut self, raw_dt: f32, max_dt: f32) {
        let dt = if raw_dt.is_finite() { raw_dt } else { 0.0 };
        self.dt = dt.clamp(0.0, max_dt.max(0.0));
        self.elapsed += self.dt;
    }
}

#[derive(Resource)]
pub struct AvatarRng(pub StdRng);

impl AvatarRng {
    pub fn seeded(seed: u64) -> Self {
        Self(StdRng::seed_from_u64(seed))
    }
}

/// Bones and expression channels of the currently bound model.
#[derive(Resource, Debug, Clone, Default)]
pub struct AvatarRig {
    pub skeleton: Skeleton,
    pub capabilities: Capabilities,
    pub head_height: Option<f32>,
}

impl AvatarRig {
    pub fn is_bound(&self) -> bool {
        !self.skeleton.is_empty()
    }
}

/// Every piece of transient animation state. Each field has exactly one
/// writing stage in [`crate::pipeline::AvatarPipeline`], plus the event
/// stage that applies queued commands.
#[derive(Resource, Debug, Clone)]
pub struct AvatarState {
    pub interaction: InteractionState,
    pub gaze: GazeController,
    pub gestures: GestureMachine,
    pub mixer: ClipMixer,
    pub idle: IdleMotion,
    pub blink: BlinkTimer,
    pub mood: Mood,
    pub lips: LipSync,
    pub speech: SpeechState,
}

impl AvatarState {
    pub fn new(settings: &AvatarSettings) -> Self {
        Self {
            interaction: InteractionState::new(&settings.interaction),
            gaze: GazeController::default(),
            gestures: GestureMachine::default(),
            mixer: ClipMixer::new(settings.clips.idle_key.clone()),
            idle: IdleMotion::default(),
            blink: BlinkTimer::default(),
            mood: Mood::new(&settings.mood),
            lips: LipSync::default(),
            speech: SpeechState::new(&settings.speech),
        }
    }

    pub fn is_speaking(&self) -> bool {
        self.speech.is_speaking() || self.lips.is_speaking()
    }
}

/// Source that owns the skeleton this frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PoseOwner {
    Clip,
    Gesture,
    #[default]
    Idle,
}

/// Composited result handed to the renderer in [`crate::pipeline::AvatarPipeline::Submit`].
#[derive(Resource, Debug, Clone, Default)]
pub struct FrameOutput {
    pub pose: Pose,
    pub expressions: ExpressionFrame,
    pub root: RootTransform,
    pub owner: PoseOwner,
    pub speaking: bool,
}

pub fn tick_frame_clock(time: Res<Time>, settings: Res<AvatarSettings>, mut clock: ResMut<FrameClock>) {
    clock.step(time.delta_secs(), settings.frame.max_delta_secs);
}

pub fn advance_interaction(
    clock: Res<FrameClock>,
    settings: Res<AvatarSettings>,
    viewer: Res<Viewer>,
    mut state: ResMut<AvatarState>,
) {
    let interaction = &mut state.interaction;
    if let Some(previous) = interaction.advance(clock.dt, viewer.position, &settings.interaction) {
        debug!(
            "Interaction mode {} -> {}",
            previous.name(),
            interaction.mode().name()
        );
    }
}

pub fn advance_gaze(
    clock: Res<FrameClock>,
    settings: Res<AvatarSettings>,
    viewer: Res<Viewer>,
    rig: Res<AvatarRig>,
    mut state: ResMut<AvatarState>,
) {
    let gaze_settings = &settings.gaze;
    let strength = if state.is_speaking() {
        gaze_settings.speaking_strength
    } else if state.interaction.is_attentive()
        || !matches!(state.interaction.mode(), InteractionMode::Wander { .. })
    {
        gaze_settings.attentive_strength
    } else {
        gaze_settings.idle_strength
    };

    let root = state.interaction.root();
    let head_height = rig.head_height.unwrap_or(gaze_settings.head_height);
    state
        .gaze
        .update(clock.dt, &root, head_height, &viewer, strength, gaze_settings);
}

pub fn advance_gestures(clock: Res<FrameClock>, mut state: ResMut<AvatarState>) {
    if let Some(ended) = state.gestures.advance(clock.dt) {
        debug!("Gesture '{}' finished", ended.name());
    }
}

pub fn advance_mixer(
    clock: Res<FrameClock>,
    mut state: ResMut<AvatarState>,
    mut finished: MessageWriter<ClipFinished>,
) {
    for action in state.mixer.advance(clock.dt) {
        finished.write(ClipFinished { key: action.key });
    }
}

/// Crossfades finished one-shots back to the idle clip, or fades them out
/// when no idle clip is available.
pub fn return_to_idle(
    settings: Res<AvatarSettings>,
    cache: Res<ClipCache>,
    mut state: ResMut<AvatarState>,
    mut finished: MessageReader<ClipFinished>,
) {
    let clips = &settings.clips;
    for ClipFinished { key } in finished.read() {
        if state.mixer.current() != Some(key.as_str()) {
            continue;
        }
        let fade = clips.return_to_idle_fade;
        let idle = state.mixer.idle_key().to_string();
        let options = PlayOptions {
            loop_mode: LoopMode::Repeat,
            fade_in: fade,
            fade_out: fade,
            strength: 1.0,
        };
        if *key == idle || !state.mixer.play(&idle, &cache, options) {
            state.mixer.fade_out(key, clips.one_shot_fade_out);
        }
        debug!("Clip '{}' finished; current is now {:?}", key, state.mixer.current());
    }
}

pub fn resolve_pose(
    clock: Res<FrameClock>,
    settings: Res<AvatarSettings>,
    rig: Res<AvatarRig>,
    mut state: ResMut<AvatarState>,
    mut output: ResMut<FrameOutput>,
) {
    let state = &mut *state;
    state.idle.advance(clock.dt);

    let mut pose = Pose::rest(&rig.skeleton);
    state.mixer.apply(&rig.skeleton, &mut pose);

    let clip_regions = state.mixer.clip_regions();
    let idle_clip_weight = state.mixer.weight_of(state.mixer.idle_key());
    state
        .idle
        .apply(&mut pose, 1.0 - idle_clip_weight.clamp(0.0, 1.0), clip_regions);
    let gesture_wrote = state.gestures.apply(&mut pose, clip_regions, &settings.gesture);
    state.gaze.apply(&mut pose, clip_regions);

    output.owner = if clip_regions != 0 {
        PoseOwner::Clip
    } else if gesture_wrote {
        PoseOwner::Gesture
    } else {
        PoseOwner::Idle
    };
    output.pose = pose;
    output.root = state.interaction.root();
}

pub fn advance_blink_and_mood(
    clock: Res<FrameClock>,
    settings: Res<AvatarSettings>,
    mut rng: ResMut<AvatarRng>,
    mut state: ResMut<AvatarState>,
    mut output: ResMut<FrameOutput>,
) {
    let state = &mut *state;
    let blink = state.blink.advance(clock.dt, &mut rng.0, &settings.blink);
    state.mood.advance(clock.dt, &settings.mood);

    let mut expressions = ExpressionFrame::default();
    state.mood.write(&mut expressions);
    expressions.set(ExpressionRole::Blink, blink);
    output.expressions = expressions;
}

pub fn advance_lip_sync(
    clock: Res<FrameClock>,
    settings: Res<AvatarSettings>,
    mut rng: ResMut<AvatarRng>,
    mut state: ResMut<AvatarState>,
    mut output: ResMut<FrameOutput>,
) {
    state.lips.advance(clock.dt, &mut rng.0, &settings.lip_sync);
    state.lips.write(&mut output.expressions);
    output.speaking = state.is_speaking();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_clock_clamps_large_and_invalid_steps() {
        let mut clock = FrameClock::default();
        clock.step(0.5, 0.033);
        assert_eq!(clock.dt, 0.033);
        clock.step(f32::NAN, 0.033);
        assert_eq!(clock.dt, 0.0);
        clock.step(-1.0, 0.033);
        assert_eq!(clock.dt, 0.0);
        clock.step(0.01, 0.033);
        assert!((clock.elapsed - 0.043).abs() < 1e-6);
    }
}
