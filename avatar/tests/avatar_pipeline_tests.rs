use std::time::Duration;

use avatar::AvatarPlugin;
use avatar::cache::ClipEntry;
use avatar::clip::{ClipDocument, MotionClip, TrackDocument};
use avatar::compositor::{AvatarRig, AvatarState, FrameOutput, PoseOwner};
use avatar::error::AvatarError;
use avatar::expression::Capabilities;
use avatar::messages::{
    AvatarBound, AvatarCommand, AvatarUnbound, ClipLoadRequest, ClipLoaded, SpeakRequest, SpeechEvent, SpeechEventKind,
    VoicesDiscovered,
};
use avatar::mixer::{LoopMode, PlayOptions};
use avatar::pipeline::AvatarPipeline;
use avatar::settings::AvatarSettings;
use avatar::skeleton::Skeleton;
use bevy::prelude::*;
use bevy::time::TimeUpdateStrategy;
use common::{ExpressionRole, GestureKind, HumanoidBone};

const FRAME: Duration = Duration::from_millis(16);

#[derive(Resource, Default)]
struct Outbox {
    speak: Vec<SpeakRequest>,
    loads: Vec<ClipLoadRequest>,
}

fn collect_outbound(
    mut speak: MessageReader<SpeakRequest>,
    mut loads: MessageReader<ClipLoadRequest>,
    mut outbox: ResMut<Outbox>,
) {
    outbox.speak.extend(speak.read().cloned());
    outbox.loads.extend(loads.read().cloned());
}

fn test_app() -> App {
    let mut app = App::new();
    app.add_plugins(MinimalPlugins)
        .insert_resource(TimeUpdateStrategy::ManualDuration(FRAME))
        .add_plugins(AvatarPlugin::default())
        .init_resource::<Outbox>()
        .add_systems(Update, collect_outbound.in_set(AvatarPipeline::Submit));

    app.world_mut().write_message(AvatarBound {
        skeleton: Skeleton::full_humanoid(),
        capabilities: Capabilities::full(),
        head_height: Some(1.4),
    });
    app.update();
    app
}

fn run_frames(app: &mut App, frames: usize) {
    for _ in 0..frames {
        app.update();
    }
}

fn state(app: &App) -> &AvatarState {
    app.world().resource::<AvatarState>()
}

fn clip(key: &str, duration: f32) -> MotionClip {
    let document = ClipDocument {
        name: key.to_string(),
        duration,
        tracks: vec![TrackDocument {
            bone: HumanoidBone::RightUpperArm.id().to_string(),
            times: vec![0.0, duration],
            rotations: vec![[0.0, 0.0, 0.0, 1.0], [0.0, 0.0, 0.38, 0.92]],
        }],
    };
    MotionClip::from_document(key, document).expect("valid clip")
}

fn deliver_clip(app: &mut App, key: &str, duration: f32) {
    app.world_mut().write_message(ClipLoaded {
        key: key.to_string(),
        result: Ok(clip(key, duration)),
    });
}

fn load_requests_for(app: &App, key: &str) -> usize {
    app.world()
        .resource::<Outbox>()
        .loads
        .iter()
        .filter(|request| request.key == key)
        .count()
}

#[test]
fn greeting_message_waves_speaks_and_settles() {
    let mut app = test_app();

    app.world_mut().write_message(AvatarCommand::UserMessage {
        text: "안녕".to_string(),
    });
    app.update();
    let gesture = state(&app).gestures.active().copied().expect("gesture started");
    assert_eq!(gesture.kind, GestureKind::Wave);
    assert!(gesture.duration > 0.0);

    app.world_mut().write_message(VoicesDiscovered { voices: Vec::new() });
    app.world_mut().write_message(AvatarCommand::Speak {
        text: "안녕하세요 반가워요".to_string(),
    });
    app.update();
    let request = app.world().resource::<Outbox>().speak.last().cloned().expect("speech requested");
    assert_eq!(request.text, "안녕하세요 반가워요");

    app.world_mut().write_message(SpeechEvent {
        id: request.id,
        kind: SpeechEventKind::Started,
    });
    app.update();
    let avatar = state(&app);
    assert!(avatar.speech.is_speaking());
    assert!(avatar.lips.plan().is_some_and(|plan| !plan.is_empty()));
    assert_eq!(avatar.gestures.kind(), Some(GestureKind::Wave));

    run_frames(&mut app, 100);
    assert_eq!(state(&app).gestures.kind(), None);
}

#[test]
fn clip_requested_before_load_plays_once_it_arrives() {
    let mut app = test_app();
    let options = PlayOptions::once();

    app.world_mut().write_message(AvatarCommand::PlayClip {
        key: "greeting".to_string(),
        loop_mode: LoopMode::Once,
        strength: 1.0,
    });
    app.update();
    assert_eq!(load_requests_for(&app, "greeting"), 1);
    assert_eq!(state(&app).mixer.pending_key(), Some("greeting"));
    assert_ne!(state(&app).mixer.current(), Some("greeting"));

    app.world_mut()
        .resource_scope(|world, mut avatar: Mut<AvatarState>| {
            let cache = world.resource::<avatar::cache::ClipCache>();
            assert!(!avatar.mixer.play("greeting", cache, options));
        });

    deliver_clip(&mut app, "greeting", 1.0);
    app.update();
    assert_eq!(state(&app).mixer.current(), Some("greeting"));

    app.world_mut()
        .resource_scope(|world, mut avatar: Mut<AvatarState>| {
            let cache = world.resource::<avatar::cache::ClipCache>();
            assert!(avatar.mixer.play("greeting", cache, options));
            assert_eq!(avatar.mixer.current(), Some("greeting"));
        });
}

#[test]
fn later_gesture_replaces_earlier_one() {
    let mut app = test_app();
    let settings = app.world().resource::<AvatarSettings>().gesture.clone();

    app.world_mut().write_message(AvatarCommand::StartGesture {
        kind: GestureKind::Happy,
        duration: 0.9,
        intensity: 1.0,
    });
    run_frames(&mut app, 3);

    app.world_mut().write_message(AvatarCommand::StartGesture {
        kind: GestureKind::Sad,
        duration: 0.9,
        intensity: 1.0,
    });
    run_frames(&mut app, 10);

    let avatar = state(&app);
    assert_eq!(avatar.gestures.kind(), Some(GestureKind::Sad));
    assert_eq!(avatar.gestures.weight_of(GestureKind::Happy, &settings), 0.0);
    assert!(avatar.gestures.weight_of(GestureKind::Sad, &settings) > 0.0);
    assert_eq!(app.world().resource::<FrameOutput>().owner, PoseOwner::Gesture);
}

#[test]
fn speech_error_closes_the_mouth() {
    let mut app = test_app();

    app.world_mut().write_message(VoicesDiscovered { voices: Vec::new() });
    app.world_mut().write_message(AvatarCommand::Speak {
        text: "아아아아아아아아".to_string(),
    });
    app.update();
    let id = app.world().resource::<Outbox>().speak[0].id;

    app.world_mut().write_message(SpeechEvent {
        id,
        kind: SpeechEventKind::Started,
    });
    run_frames(&mut app, 10);
    assert!(state(&app).lips.amplitude() > 0.0);

    app.world_mut().write_message(SpeechEvent {
        id,
        kind: SpeechEventKind::Error("synthesis-failed".to_string()),
    });
    app.update();
    assert!(!state(&app).speech.is_speaking());
    assert!(!state(&app).lips.is_speaking());
    assert!(!app.world().resource::<FrameOutput>().speaking);

    run_frames(&mut app, 20);
    assert_eq!(state(&app).lips.amplitude(), 0.0);
    let expressions = app.world().resource::<FrameOutput>().expressions;
    for role in ExpressionRole::MOUTH {
        assert_eq!(expressions.get(role), 0.0);
    }
}

#[test]
fn repeated_requests_share_one_load() {
    let mut app = test_app();

    for _ in 0..3 {
        app.world_mut().write_message(AvatarCommand::PlayClip {
            key: "happy".to_string(),
            loop_mode: LoopMode::Once,
            strength: 1.0,
        });
        app.update();
    }
    assert_eq!(load_requests_for(&app, "happy"), 1);
    assert_eq!(load_requests_for(&app, "idle"), 1);
}

#[test]
fn idle_starts_on_load_and_one_shots_return_to_it() {
    let mut app = test_app();

    deliver_clip(&mut app, "idle", 2.0);
    app.update();
    assert_eq!(state(&app).mixer.current(), Some("idle"));
    assert_eq!(load_requests_for(&app, "greeting"), 1);
    assert_eq!(load_requests_for(&app, "thinking"), 1);

    deliver_clip(&mut app, "greeting", 0.3);
    app.update();
    app.world_mut().write_message(AvatarCommand::PlayClip {
        key: "greeting".to_string(),
        loop_mode: LoopMode::Once,
        strength: 1.0,
    });
    app.update();
    assert_eq!(state(&app).mixer.current(), Some("greeting"));
    assert_eq!(app.world().resource::<FrameOutput>().owner, PoseOwner::Clip);

    run_frames(&mut app, 40);
    assert_eq!(state(&app).mixer.current(), Some("idle"));
}

#[test]
fn failed_load_drops_pending_play_and_can_retry() {
    let mut app = test_app();

    app.world_mut().write_message(AvatarCommand::PlayClip {
        key: "sad".to_string(),
        loop_mode: LoopMode::Once,
        strength: 1.0,
    });
    app.update();
    app.world_mut().write_message(ClipLoaded {
        key: "sad".to_string(),
        result: Err(AvatarError::EmptyClip("sad".to_string())),
    });
    app.update();

    assert_eq!(state(&app).mixer.pending_key(), None);
    let cache = app.world().resource::<avatar::cache::ClipCache>();
    assert!(matches!(cache.entry("sad"), Some(ClipEntry::Failed { .. })));

    app.world_mut().write_message(AvatarCommand::PlayClip {
        key: "sad".to_string(),
        loop_mode: LoopMode::Once,
        strength: 1.0,
    });
    app.update();
    assert_eq!(load_requests_for(&app, "sad"), 2);
}

#[test]
fn attention_requests_never_shorten_the_window() {
    let mut app = test_app();

    app.world_mut()
        .write_message(AvatarCommand::RequestAttention { seconds: 10.0 });
    app.update();
    let until = state(&app).interaction.attention_until();

    app.world_mut()
        .write_message(AvatarCommand::RequestAttention { seconds: 1.0 });
    app.update();
    assert_eq!(state(&app).interaction.attention_until(), until);
    assert!(state(&app).interaction.is_attentive());
}

#[test]
fn user_message_sends_avatar_toward_viewer() {
    let mut app = test_app();
    let start = state(&app).interaction.root().position;

    app.world_mut().write_message(AvatarCommand::UserMessage {
        text: "오늘 뭐 했어".to_string(),
    });
    app.update();
    assert_eq!(state(&app).interaction.mode().name(), "approach");

    run_frames(&mut app, 30);
    let moved = state(&app).interaction.root().position;
    assert!(moved.z > start.z);
}

#[test]
fn unbinding_leaves_nothing_to_pose() {
    let mut app = test_app();
    assert!(app.world().resource::<FrameOutput>().pose.get(HumanoidBone::Head).is_some());

    app.world_mut().write_message(AvatarUnbound);
    app.update();
    assert!(!app.world().resource::<AvatarRig>().is_bound());
    assert_eq!(app.world().resource::<FrameOutput>().pose.iter().count(), 0);

    app.world_mut().write_message(AvatarBound {
        skeleton: Skeleton::from_rest([(HumanoidBone::Head, Quat::IDENTITY)]),
        capabilities: Capabilities::default(),
        head_height: None,
    });
    app.update();
    assert_eq!(app.world().resource::<FrameOutput>().pose.iter().count(), 1);
}
