//! Message types crossing the engine boundary.
//!
//! Inbound messages are drained at a fixed point of the frame pipeline
//! (`AvatarPipeline::Events`), so out-of-band completions never mutate
//! engine state mid-frame.

use crate::clip::MotionClip;
use crate::error::AvatarError;
use crate::expression::Capabilities;
use crate::mixer::LoopMode;
use crate::skeleton::Skeleton;
use crate::speech::{UtteranceId, VoiceInfo};
use bevy::prelude::*;
use common::{GestureKind, ReactionKind};

/// Caller-facing control surface of the engine.
#[derive(Message, Debug, Clone, PartialEq)]
pub enum AvatarCommand {
    /// The viewer sent a chat line: acknowledge it and come closer.
    UserMessage { text: String },
    /// Speak `text`; its reaction fires when speech actually starts.
    Speak { text: String },
    /// Apply a reaction immediately, without speech.
    React { kind: ReactionKind },
    StopSpeaking,
    StartGesture {
        kind: GestureKind,
        duration: f32,
        intensity: f32,
    },
    PlayClip {
        key: String,
        loop_mode: LoopMode,
        strength: f32,
    },
    ApproachViewer { seconds: f32 },
    RequestAttention { seconds: f32 },
    SetVoiceTuning { pitch: f32, rate: f32 },
}

/// Outbound: synthesize this utterance.
#[derive(Message, Debug, Clone, PartialEq)]
pub struct SpeakRequest {
    pub id: UtteranceId,
    pub text: String,
    pub voice: Option<String>,
    pub pitch: f32,
    pub rate: f32,
}

/// Outbound: stop an utterance that is no longer wanted.
#[derive(Message, Debug, Clone, Copy, PartialEq, Eq)]
pub struct CancelSpeech {
    pub id: UtteranceId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechEventKind {
    Started,
    Boundary,
    Ended,
    Error(String),
}

/// Inbound: lifecycle notification from the speech service.
#[derive(Message, Debug, Clone, PartialEq, Eq)]
pub struct SpeechEvent {
    pub id: UtteranceId,
    pub kind: SpeechEventKind,
}

/// Inbound: the speech service finished listing its voices.
#[derive(Message, Debug, Clone, PartialEq)]
pub struct VoicesDiscovered {
    pub voices: Vec<VoiceInfo>,
}

/// Outbound: load the clip file at `path` for `key`.
#[derive(Message, Debug, Clone, PartialEq, Eq)]
pub struct ClipLoadRequest {
    pub key: String,
    pub path: String,
}

/// Inbound: result of a [`ClipLoadRequest`].
#[derive(Message, Debug)]
pub struct ClipLoaded {
    pub key: String,
    pub result: Result<MotionClip, AvatarError>,
}

/// Emitted once when a `once` clip reaches its end.
#[derive(Message, Debug, Clone, PartialEq, Eq)]
pub struct ClipFinished {
    pub key: String,
}

/// Inbound: a model was loaded and its bones and channels resolved.
#[derive(Message, Debug, Clone)]
pub struct AvatarBound {
    pub skeleton: Skeleton,
    pub capabilities: Capabilities,
    /// Head height above the root, when the renderer could measure it.
    pub head_height: Option<f32>,
}

/// Inbound: the model was removed.
#[derive(Message, Debug, Clone, Copy, PartialEq, Eq)]
pub struct AvatarUnbound;
