//! Speech service bookkeeping: utterance identity, voice choice and the
//! bounded wait for voice discovery.
//!
//! The engine never talks to a synthesizer directly. It emits
//! [`crate::messages::SpeakRequest`]s and consumes
//! [`crate::messages::SpeechEvent`]s; events for anything but the active
//! utterance are stale and dropped.

use crate::settings::SpeechSettings;

pub type UtteranceId = u64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceInfo {
    pub name: String,
    /// BCP 47 language tag, e.g. `ko-KR`.
    pub lang: String,
    pub local: bool,
}

const VOICE_NAME_HINTS: [&str; 13] = [
    "heami", "sunhi", "seoyeon", "yuna", "kyoko", "haruka", "yuri", "sora", "karen", "nana", "moe",
    "female", "girl",
];

pub fn score_voice(voice: &VoiceInfo) -> i32 {
    let lang = voice.lang.to_lowercase();
    let name = voice.name.to_lowercase();

    let lang_score = if lang.starts_with("ko") {
        30
    } else if lang.starts_with("ja") {
        10
    } else {
        0
    };
    let name_score = if VOICE_NAME_HINTS.iter().any(|hint| name.contains(hint)) || name.contains("woman") {
        3
    } else {
        0
    };
    lang_score + name_score + i32::from(voice.local)
}

/// Highest scoring voice; the first one listed wins ties.
pub fn best_voice(voices: &[VoiceInfo]) -> Option<&VoiceInfo> {
    voices
        .iter()
        .enumerate()
        .max_by_key(|(index, voice)| (score_voice(voice), std::cmp::Reverse(*index)))
        .map(|(_, voice)| voice)
}

/// Synthesis request ready to hand to the speech service.
#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    pub id: UtteranceId,
    pub text: String,
    pub voice: Option<String>,
    pub pitch: f32,
    pub rate: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Started,
    Boundary,
    Ended,
    Failed,
}

/// Outcome of feeding a service notification into [`SpeechState`].
#[derive(Debug, Clone, PartialEq)]
pub enum SpeechTransition {
    Started { id: UtteranceId, text: String },
    Boundary,
    Finished { id: UtteranceId, failed: bool },
    Stale,
}

#[derive(Debug, Clone)]
struct ActiveUtterance {
    id: UtteranceId,
    text: String,
    started: bool,
}

#[derive(Debug, Clone)]
pub struct SpeechState {
    next_id: UtteranceId,
    active: Option<ActiveUtterance>,
    queued: Option<Utterance>,
    voices_known: bool,
    selected_voice: Option<String>,
    discovery_deadline: f32,
    pub pitch: f32,
    pub rate: f32,
}

impl SpeechState {
    pub fn new(settings: &SpeechSettings) -> Self {
        Self {
            next_id: 1,
            active: None,
            queued: None,
            voices_known: false,
            selected_voice: None,
            discovery_deadline: settings.voice_discovery_timeout_secs.max(0.0),
            pitch: SpeechSettings::clamp_pitch(settings.pitch),
            rate: SpeechSettings::clamp_rate(settings.rate),
        }
    }

    pub fn set_voices(&mut self, voices: &[VoiceInfo]) {
        self.voices_known = true;
        self.selected_voice = best_voice(voices).map(|voice| voice.name.clone());
    }

    pub fn selected_voice(&self) -> Option<&str> {
        self.selected_voice.as_deref()
    }

    pub fn voices_known(&self) -> bool {
        self.voices_known
    }

    /// `true` between the service's start and end notifications.
    pub fn is_speaking(&self) -> bool {
        self.active.as_ref().is_some_and(|active| active.started)
    }

    pub fn active_id(&self) -> Option<UtteranceId> {
        self.active.as_ref().map(|active| active.id)
    }

    /// Registers a new utterance, replacing any active or queued one.
    ///
    /// Returns the id to cancel (if something was active) and the request
    /// to send now, or `None` while waiting for voice discovery.
    pub fn speak(&mut self, text: &str, now: f32) -> (Option<UtteranceId>, Option<Utterance>) {
        let cancelled = self.stop();

        let id = self.next_id;
        self.next_id += 1;
        self.active = Some(ActiveUtterance {
            id,
            text: text.to_string(),
            started: false,
        });

        let utterance = Utterance {
            id,
            text: text.to_string(),
            voice: self.selected_voice.clone(),
            pitch: self.pitch,
            rate: self.rate,
        };

        if self.voices_known || now >= self.discovery_deadline {
            (cancelled, Some(utterance))
        } else {
            self.queued = Some(utterance);
            (cancelled, None)
        }
    }

    /// Releases the queued request once voices are known or the wait ran out.
    pub fn poll(&mut self, now: f32) -> Option<Utterance> {
        if !(self.voices_known || now >= self.discovery_deadline) {
            return None;
        }
        let mut utterance = self.queued.take()?;
        utterance.voice = self.selected_voice.clone();
        Some(utterance)
    }

    /// Drops the active and queued utterance. Returns the id that was active.
    pub fn stop(&mut self) -> Option<UtteranceId> {
        self.queued = None;
        self.active.take().map(|active| active.id)
    }

    pub fn on_event(&mut self, id: UtteranceId, lifecycle: Lifecycle) -> SpeechTransition {
        let Some(active) = self.active.as_mut().filter(|active| active.id == id) else {
            return SpeechTransition::Stale;
        };

        match lifecycle {
            Lifecycle::Started => {
                active.started = true;
                SpeechTransition::Started {
                    id,
                    text: active.text.clone(),
                }
            }
            Lifecycle::Boundary => SpeechTransition::Boundary,
            Lifecycle::Ended | Lifecycle::Failed => {
                self.active = None;
                SpeechTransition::Finished {
                    id,
                    failed: lifecycle == Lifecycle::Failed,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn voice(name: &str, lang: &str, local: bool) -> VoiceInfo {
        VoiceInfo {
            name: name.to_string(),
            lang: lang.to_string(),
            local,
        }
    }

    #[test]
    fn korean_voice_wins() {
        let voices = vec![
            voice("Samantha", "en-US", true),
            voice("Kyoko", "ja-JP", true),
            voice("Yuna", "ko-KR", false),
            voice("Google 한국의", "ko-KR", false),
        ];
        assert_eq!(score_voice(&voices[2]), 33);
        assert_eq!(score_voice(&voices[1]), 14);
        assert_eq!(best_voice(&voices).map(|v| v.name.as_str()), Some("Yuna"));
        assert_eq!(best_voice(&[]), None);
    }

    #[test]
    fn waits_for_voices_until_deadline() {
        let settings = SpeechSettings::default();
        let mut speech = SpeechState::new(&settings);

        let (cancelled, now) = speech.speak("안녕!", 0.0);
        assert_eq!(cancelled, None);
        assert!(now.is_none());
        assert!(speech.poll(0.5).is_none());

        let released = speech.poll(settings.voice_discovery_timeout_secs).expect("timeout releases");
        assert_eq!(released.voice, None);
        assert_eq!(released.text, "안녕!");
    }

    #[test]
    fn discovered_voices_release_with_choice() {
        let mut speech = SpeechState::new(&SpeechSettings::default());
        speech.speak("hello", 0.0);
        speech.set_voices(&[voice("Yuna", "ko-KR", true)]);
        let released = speech.poll(0.1).expect("voices known");
        assert_eq!(released.voice.as_deref(), Some("Yuna"));
        assert_eq!(released.pitch, 1.35);
        assert_eq!(released.rate, 1.15);
    }

    #[test]
    fn stale_events_are_dropped() {
        let mut speech = SpeechState::new(&SpeechSettings::default());
        speech.set_voices(&[]);
        let (_, first) = speech.speak("one", 0.0);
        let first = first.expect("sent").id;
        let (cancelled, second) = speech.speak("two", 0.1);
        let second = second.expect("sent").id;
        assert_eq!(cancelled, Some(first));

        assert_eq!(speech.on_event(first, Lifecycle::Started), SpeechTransition::Stale);
        assert!(!speech.is_speaking());
        assert!(matches!(speech.on_event(second, Lifecycle::Started), SpeechTransition::Started { .. }));
        assert!(speech.is_speaking());
        assert_eq!(
            speech.on_event(second, Lifecycle::Failed),
            SpeechTransition::Finished { id: second, failed: true }
        );
        assert!(!speech.is_speaking());
        assert_eq!(speech.on_event(second, Lifecycle::Ended), SpeechTransition::Stale);
    }
}
