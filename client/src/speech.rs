//! Local speech service: a timed simulation of a synthesizer that reports
//! start, word boundaries and end back to the engine, optionally voiced
//! through `espeak-ng`.

use crate::settings::{SettingsResource, VoiceBackendSettings};
use avatar::messages::{CancelSpeech, SpeakRequest, SpeechEvent, SpeechEventKind, VoicesDiscovered};
use avatar::pipeline::AvatarPipeline;
use avatar::speech::{UtteranceId, VoiceInfo};
use bevy::prelude::*;
use std::process::{Child, Command, Stdio};

const MIN_UTTERANCE_SECS: f32 = 0.4;

/// Timeline of one utterance: boundary offsets at each word start.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatedUtterance {
    pub id: UtteranceId,
    boundaries: Vec<f32>,
    duration: f32,
    elapsed: f32,
    next_boundary: usize,
    started: bool,
}

impl SimulatedUtterance {
    pub fn new(id: UtteranceId, text: &str, chars_per_sec: f32, rate: f32) -> Self {
        let speed = (chars_per_sec * rate).max(0.1);
        let chars: Vec<char> = text.chars().collect();
        let duration = (chars.len() as f32 / speed).max(MIN_UTTERANCE_SECS);

        let mut boundaries = Vec::new();
        let mut in_word = false;
        for (index, c) in chars.iter().enumerate() {
            let word_char = !c.is_whitespace();
            if word_char && !in_word && index > 0 {
                boundaries.push(index as f32 / speed);
            }
            in_word = word_char;
        }

        Self {
            id,
            boundaries,
            duration,
            elapsed: 0.0,
            next_boundary: 0,
            started: false,
        }
    }

    pub fn duration(&self) -> f32 {
        self.duration
    }

    /// Advances the timeline; returns the lifecycle events that fall in `dt`.
    /// `hold_end` keeps the utterance open (audio still playing).
    pub fn advance(&mut self, dt: f32, hold_end: bool) -> Vec<SpeechEventKind> {
        let mut events = Vec::new();
        if !self.started {
            self.started = true;
            events.push(SpeechEventKind::Started);
            return events;
        }

        self.elapsed += dt.max(0.0);
        while self
            .boundaries
            .get(self.next_boundary)
            .is_some_and(|at| *at <= self.elapsed)
        {
            self.next_boundary += 1;
            events.push(SpeechEventKind::Boundary);
        }
        if self.elapsed >= self.duration && !hold_end {
            events.push(SpeechEventKind::Ended);
        }
        events
    }
}

struct ActiveSpeech {
    utterance: SimulatedUtterance,
    audio: Option<Child>,
}

impl ActiveSpeech {
    fn stop_audio(&mut self) {
        if let Some(mut child) = self.audio.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

#[derive(Resource, Default)]
pub struct SpeechBackend {
    active: Option<ActiveSpeech>,
    espeak_available: bool,
}

impl SpeechBackend {
    pub fn active_id(&self) -> Option<UtteranceId> {
        self.active.as_ref().map(|active| active.utterance.id)
    }
}

pub struct SpeechBackendPlugin;

impl Plugin for SpeechBackendPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<SpeechBackend>()
            .add_systems(Startup, discover_voices)
            .add_systems(Update, accept_speech_requests.in_set(AvatarPipeline::Submit))
            .add_systems(Update, drive_speech.before(AvatarPipeline::Events));
    }
}

fn espeak_present(settings: &VoiceBackendSettings) -> bool {
    settings.espeak_enabled
        && Command::new(&settings.espeak_command)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .is_ok_and(|status| status.success())
}

fn discover_voices(
    settings: Res<SettingsResource>,
    mut backend: ResMut<SpeechBackend>,
    mut discovered: MessageWriter<VoicesDiscovered>,
) {
    let voice_settings = &settings.current.voice;
    backend.espeak_available = espeak_present(voice_settings);

    let voice = if backend.espeak_available {
        VoiceInfo {
            name: format!("espeak-ng {}", voice_settings.espeak_voice),
            lang: voice_settings.espeak_voice.clone(),
            local: true,
        }
    } else {
        info!("espeak-ng not available, speech is simulated without audio");
        VoiceInfo {
            name: "simulated".to_string(),
            lang: "ko-KR".to_string(),
            local: true,
        }
    };
    discovered.write(VoicesDiscovered { voices: vec![voice] });
}

fn spawn_espeak(settings: &VoiceBackendSettings, request: &SpeakRequest) -> std::io::Result<Child> {
    let pitch = (request.pitch * 50.0).round().clamp(0.0, 99.0) as u32;
    let speed = (175.0 * request.rate).round().clamp(80.0, 450.0) as u32;
    Command::new(&settings.espeak_command)
        .arg("-v")
        .arg(&settings.espeak_voice)
        .arg("-p")
        .arg(pitch.to_string())
        .arg("-s")
        .arg(speed.to_string())
        .arg(&request.text)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
}

fn accept_speech_requests(
    settings: Res<SettingsResource>,
    mut requests: MessageReader<SpeakRequest>,
    mut cancels: MessageReader<CancelSpeech>,
    mut backend: ResMut<SpeechBackend>,
    mut events: MessageWriter<SpeechEvent>,
) {
    let voice_settings = &settings.current.voice;

    for CancelSpeech { id } in cancels.read() {
        if backend.active_id() == Some(*id)
            && let Some(mut active) = backend.active.take()
        {
            active.stop_audio();
            debug!("Cancelled utterance {}", id);
        }
    }

    for request in requests.read() {
        if let Some(mut previous) = backend.active.take() {
            previous.stop_audio();
        }

        let audio = if backend.espeak_available {
            match spawn_espeak(voice_settings, request) {
                Ok(child) => Some(child),
                Err(error) => {
                    events.write(SpeechEvent {
                        id: request.id,
                        kind: SpeechEventKind::Error(error.to_string()),
                    });
                    continue;
                }
            }
        } else {
            None
        };

        backend.active = Some(ActiveSpeech {
            utterance: SimulatedUtterance::new(
                request.id,
                &request.text,
                voice_settings.chars_per_sec,
                request.rate,
            ),
            audio,
        });
    }
}

fn drive_speech(time: Res<Time>, mut backend: ResMut<SpeechBackend>, mut events: MessageWriter<SpeechEvent>) {
    let Some(active) = backend.active.as_mut() else {
        return;
    };

    let audio_running = match active.audio.as_mut().map(Child::try_wait) {
        Some(Ok(None)) => true,
        Some(Ok(Some(_))) | None => false,
        Some(Err(error)) => {
            let id = active.utterance.id;
            backend.active = None;
            events.write(SpeechEvent {
                id,
                kind: SpeechEventKind::Error(error.to_string()),
            });
            return;
        }
    };

    let id = active.utterance.id;
    let lifecycle = active.utterance.advance(time.delta_secs(), audio_running);
    let ended = lifecycle.contains(&SpeechEventKind::Ended);
    events.write_batch(lifecycle.into_iter().map(|kind| SpeechEvent { id, kind }));
    if ended {
        backend.active = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utterance_reports_start_boundaries_and_end() {
        let mut utterance = SimulatedUtterance::new(7, "안녕 반가워 친구", 10.0, 1.0);
        assert_eq!(utterance.advance(0.016, false), vec![SpeechEventKind::Started]);

        let mut boundaries = 0;
        let mut ended = false;
        for _ in 0..200 {
            for kind in utterance.advance(0.016, false) {
                match kind {
                    SpeechEventKind::Boundary => boundaries += 1,
                    SpeechEventKind::Ended => ended = true,
                    _ => {}
                }
            }
            if ended {
                break;
            }
        }
        assert_eq!(boundaries, 2);
        assert!(ended);
    }

    #[test]
    fn faster_rate_shortens_the_timeline() {
        let slow = SimulatedUtterance::new(1, "가나다라마바사아자차", 9.0, 1.0);
        let fast = SimulatedUtterance::new(1, "가나다라마바사아자차", 9.0, 2.0);
        assert!(fast.duration() < slow.duration());
        assert_eq!(SimulatedUtterance::new(1, "", 9.0, 1.0).duration(), MIN_UTTERANCE_SECS);
    }

    #[test]
    fn running_audio_holds_the_end() {
        let mut utterance = SimulatedUtterance::new(1, "네", 9.0, 1.0);
        utterance.advance(0.0, true);
        let events = utterance.advance(5.0, true);
        assert!(!events.contains(&SpeechEventKind::Ended));
        assert_eq!(utterance.advance(0.0, false), vec![SpeechEventKind::Ended]);
    }
}
