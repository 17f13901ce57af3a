//! Systems of the `Events` stage: every inbound message is applied here,
//! before any animation stage runs.

use crate::cache::{ClipCache, ClipRequest};
use crate::compositor::{AvatarRig, AvatarRng, AvatarState, FrameClock};
use crate::error::AvatarError;
use crate::gaze::Viewer;
use crate::messages::{
    AvatarBound, AvatarCommand, AvatarUnbound, CancelSpeech, ClipLoadRequest, ClipLoaded, SpeakRequest,
    SpeechEvent, SpeechEventKind, VoicesDiscovered,
};
use crate::mixer::{LoopMode, PlayOptions};
use crate::reaction::{ReactionOrigin, ReactionPlan, ReactionTable, classify};
use crate::settings::AvatarSettings;
use crate::speech::{Lifecycle, SpeechTransition, Utterance};
use bevy::prelude::*;

/// Registers the idle clip for loading as soon as the app starts.
pub fn request_startup_clips(
    settings: Res<AvatarSettings>,
    clock: Res<FrameClock>,
    mut cache: ResMut<ClipCache>,
    mut loads: MessageWriter<ClipLoadRequest>,
) {
    start_clip_load(&settings.clips.idle_key, clock.elapsed, &mut cache, &mut loads);
}

pub fn apply_avatar_binding(
    mut bound: MessageReader<AvatarBound>,
    mut unbound: MessageReader<AvatarUnbound>,
    mut rig: ResMut<AvatarRig>,
) {
    if unbound.read().count() > 0 {
        *rig = AvatarRig::default();
        info!("Avatar model unbound");
    }

    for AvatarBound {
        skeleton,
        capabilities,
        head_height,
    } in bound.read()
    {
        info!(
            "Avatar model bound: {} bones, {} expression channels",
            skeleton.len(),
            capabilities.bound_roles().count()
        );
        for role in capabilities.missing_roles() {
            debug!("No expression channel for '{}'", role.id());
        }
        *rig = AvatarRig {
            skeleton: skeleton.clone(),
            capabilities: capabilities.clone(),
            head_height: *head_height,
        };
    }
}

pub fn handle_clip_loads(
    settings: Res<AvatarSettings>,
    clock: Res<FrameClock>,
    mut loaded: MessageReader<ClipLoaded>,
    mut cache: ResMut<ClipCache>,
    mut state: ResMut<AvatarState>,
    mut loads: MessageWriter<ClipLoadRequest>,
) {
    let clips = &settings.clips;
    let now = clock.elapsed;

    for ClipLoaded { key, result } in loaded.read() {
        let result = match result {
            Ok(clip) => Ok(clip.clone()),
            Err(error) => Err(AvatarError::ClipLoad {
                key: key.clone(),
                reason: error.to_string(),
            }),
        };

        let clip = match cache.complete(key, result) {
            Ok(clip) => clip,
            Err(reason) => {
                warn!("{}", reason);
                if state.mixer.pending_key() == Some(key.as_str()) {
                    state.mixer.cancel_pending();
                }
                continue;
            }
        };
        debug!("Clip '{}' ready ({:.2}s)", key, clip.duration());

        if *key == clips.idle_key && state.mixer.current().is_none() {
            let options = PlayOptions::repeat().with_fades(clips.default_fade_in, clips.one_shot_fade_out);
            state.mixer.play(key, &cache, options);
            for preload in &clips.preload {
                start_clip_load(preload, now, &mut cache, &mut loads);
            }
        }

        if let Some(options) = state
            .mixer
            .take_pending(key, now, clips.pending_play_window_secs)
            && state.mixer.play(key, &cache, options)
        {
            state.interaction.extend_respond(clip.duration());
        }
    }
}

pub fn expire_clip_loads(clock: Res<FrameClock>, mut cache: ResMut<ClipCache>, mut state: ResMut<AvatarState>) {
    for key in cache.expire(clock.elapsed) {
        warn!("{}", AvatarError::ClipTimeout(key.clone()));
        if state.mixer.pending_key() == Some(key.as_str()) {
            state.mixer.cancel_pending();
        }
    }
}

pub fn handle_voices(mut discovered: MessageReader<VoicesDiscovered>, mut state: ResMut<AvatarState>) {
    for VoicesDiscovered { voices } in discovered.read() {
        state.speech.set_voices(voices);
        info!(
            "Discovered {} voices, selected {:?}",
            voices.len(),
            state.speech.selected_voice()
        );
    }
}

pub fn handle_speech_events(
    settings: Res<AvatarSettings>,
    clock: Res<FrameClock>,
    viewer: Res<Viewer>,
    table: Res<ReactionTable>,
    mut rng: ResMut<AvatarRng>,
    mut events: MessageReader<SpeechEvent>,
    mut cache: ResMut<ClipCache>,
    mut state: ResMut<AvatarState>,
    mut loads: MessageWriter<ClipLoadRequest>,
) {
    for SpeechEvent { id, kind } in events.read() {
        let lifecycle = match kind {
            SpeechEventKind::Started => Lifecycle::Started,
            SpeechEventKind::Boundary => Lifecycle::Boundary,
            SpeechEventKind::Ended => Lifecycle::Ended,
            SpeechEventKind::Error(_) => Lifecycle::Failed,
        };

        match state.speech.on_event(*id, lifecycle) {
            SpeechTransition::Started { id, text } => {
                debug!("Utterance {} started", id);
                state.lips.start(&text);
                let plan = table.plan(classify(&text), ReactionOrigin::Avatar, &mut rng.0);
                apply_reaction(&plan, &settings, clock.elapsed, &viewer, &mut state, &mut cache, &mut loads);
            }
            SpeechTransition::Boundary => state.lips.boundary(&settings.lip_sync),
            SpeechTransition::Finished { id, failed } => {
                if let (true, SpeechEventKind::Error(reason)) = (failed, kind) {
                    warn!("{}", AvatarError::Speech(format!("utterance {id}: {reason}")));
                }
                state.lips.stop(&settings.lip_sync);
            }
            SpeechTransition::Stale => debug!("Dropped stale speech event for utterance {}", id),
        }
    }
}

pub fn handle_commands(
    settings: Res<AvatarSettings>,
    clock: Res<FrameClock>,
    viewer: Res<Viewer>,
    table: Res<ReactionTable>,
    mut rng: ResMut<AvatarRng>,
    mut commands: MessageReader<AvatarCommand>,
    mut cache: ResMut<ClipCache>,
    mut state: ResMut<AvatarState>,
    mut loads: MessageWriter<ClipLoadRequest>,
    mut speak: MessageWriter<SpeakRequest>,
    mut cancel: MessageWriter<CancelSpeech>,
) {
    let now = clock.elapsed;

    for command in commands.read() {
        match command {
            AvatarCommand::UserMessage { text } => {
                let plan = table.plan(classify(text), ReactionOrigin::User, &mut rng.0);
                debug!("User message classified as {}", plan.kind.name());
                apply_reaction(&plan, &settings, now, &viewer, &mut state, &mut cache, &mut loads);
            }
            AvatarCommand::Speak { text } => {
                let (cancelled, utterance) = state.speech.speak(text, now);
                if let Some(id) = cancelled {
                    cancel.write(CancelSpeech { id });
                    state.lips.stop(&settings.lip_sync);
                }
                if let Some(utterance) = utterance {
                    speak.write(speak_request(utterance));
                }
            }
            AvatarCommand::React { kind } => {
                let plan = table.plan(*kind, ReactionOrigin::Avatar, &mut rng.0);
                apply_reaction(&plan, &settings, now, &viewer, &mut state, &mut cache, &mut loads);
            }
            AvatarCommand::StopSpeaking => {
                if let Some(id) = state.speech.stop() {
                    cancel.write(CancelSpeech { id });
                }
                state.lips.stop(&settings.lip_sync);
            }
            AvatarCommand::StartGesture {
                kind,
                duration,
                intensity,
            } => state.gestures.start(*kind, *duration, *intensity, &settings.gesture),
            AvatarCommand::PlayClip {
                key,
                loop_mode,
                strength,
            } => {
                let base = match loop_mode {
                    LoopMode::Once => PlayOptions::once(),
                    LoopMode::Repeat => PlayOptions::repeat(),
                };
                let options = base
                    .with_fades(settings.clips.default_fade_in, settings.clips.one_shot_fade_out)
                    .with_strength(*strength);
                request_clip(key, options, now, &mut state, &mut cache, &mut loads);
            }
            AvatarCommand::ApproachViewer { seconds } => {
                state
                    .interaction
                    .start_approach_to_user(*seconds, viewer.position, &settings.interaction);
            }
            AvatarCommand::RequestAttention { seconds } => state.interaction.request_attention(*seconds),
            AvatarCommand::SetVoiceTuning { pitch, rate } => {
                state.speech.pitch = crate::settings::SpeechSettings::clamp_pitch(*pitch);
                state.speech.rate = crate::settings::SpeechSettings::clamp_rate(*rate);
            }
        }
    }
}

/// Sends an utterance that was held back while voices were being discovered.
pub fn release_queued_speech(
    clock: Res<FrameClock>,
    mut state: ResMut<AvatarState>,
    mut speak: MessageWriter<SpeakRequest>,
) {
    if let Some(utterance) = state.speech.poll(clock.elapsed) {
        speak.write(speak_request(utterance));
    }
}

fn speak_request(utterance: Utterance) -> SpeakRequest {
    SpeakRequest {
        id: utterance.id,
        text: utterance.text,
        voice: utterance.voice,
        pitch: utterance.pitch,
        rate: utterance.rate,
    }
}

fn apply_reaction(
    plan: &ReactionPlan,
    settings: &AvatarSettings,
    now: f32,
    viewer: &Viewer,
    state: &mut AvatarState,
    cache: &mut ClipCache,
    loads: &mut MessageWriter<ClipLoadRequest>,
) {
    if plan.approach {
        state.interaction.start_approach_to_user(
            settings.interaction.respond_secs,
            viewer.position,
            &settings.interaction,
        );
    }
    state
        .interaction
        .request_attention(settings.interaction.attention_secs);

    if let Some(cue) = &plan.gesture {
        state
            .gestures
            .start(cue.kind, cue.duration, cue.intensity, &settings.gesture);
    }
    if let Some(targets) = plan.mood {
        state.mood.react(targets, &settings.mood);
    }
    if let Some((key, strength)) = &plan.clip {
        let options = PlayOptions::once()
            .with_fades(settings.clips.default_fade_in, settings.clips.one_shot_fade_out)
            .with_strength(*strength);
        request_clip(key, options, now, state, cache, loads);
    }
}

/// Plays `key` now, or starts loading it and plays on arrival.
fn request_clip(
    key: &str,
    options: PlayOptions,
    now: f32,
    state: &mut AvatarState,
    cache: &mut ClipCache,
    loads: &mut MessageWriter<ClipLoadRequest>,
) -> bool {
    if !start_clip_load(key, now, cache, loads) {
        return false;
    }
    let played = state.mixer.request_play(key, cache, options, now);
    if played && let Some(clip) = cache.get(key) {
        state.interaction.extend_respond(clip.duration());
    }
    played
}

/// Makes sure `key` is loaded or loading. `false` for unknown keys.
fn start_clip_load(
    key: &str,
    now: f32,
    cache: &mut ClipCache,
    loads: &mut MessageWriter<ClipLoadRequest>,
) -> bool {
    match cache.request(key, now) {
        Ok(ClipRequest::Started { path }) => {
            info!("Loading clip '{}' from {}", key, path);
            loads.write(ClipLoadRequest {
                key: key.to_string(),
                path,
            });
            true
        }
        Ok(ClipRequest::Ready(_) | ClipRequest::Loading) => true,
        Err(error) => {
            warn!("{}", error);
            false
        }
    }
}
