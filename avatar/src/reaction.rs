//! Chat text to reaction: keyword classification and the reaction table.
//!
//! Both the keyword rules and the table are heuristics. The table is a
//! plain resource, so an application can replace it wholesale.

use crate::mood::MoodTargets;
use crate::settings::MoodSettings;
use bevy::prelude::*;
use common::{GestureKind, MotionKey, ReactionKind};
use rand::Rng;
use std::collections::HashMap;

const GREETING_PREFIXES: [&str; 5] = ["안녕", "ㅎㅇ", "하이", "hello", "hi"];
const SLEEPY_WORDS: [&str; 4] = ["피곤", "졸려", "잠", "sleep"];
const SAD_WORDS: [&str; 6] = ["미안", "sorry", "슬프", "힘들", "우울", "싫어"];
const ANGRY_WORDS: [&str; 3] = ["짜증", "화나", "angry"];
const SHY_WORDS: [&str; 5] = ["사랑", "좋아해", "부끄", "보고싶", "love"];
const HAPPY_WORDS: [&str; 6] = ["ㅋㅋ", "ㅎㅎ", "lol", "귀엽", "좋아", "최고"];

/// `true` when `text` opens with a greeting word. Latin greetings must end
/// at a word boundary so "hint" is not a greeting.
pub fn is_greeting(text: &str) -> bool {
    let lower = text.trim().to_lowercase();
    GREETING_PREFIXES.iter().any(|prefix| {
        let Some(rest) = lower.strip_prefix(prefix) else {
            return false;
        };
        if !prefix.is_ascii() {
            return true;
        }
        rest.chars()
            .next()
            .is_none_or(|next| !next.is_alphanumeric() && next != '_')
    })
}

pub fn classify(text: &str) -> ReactionKind {
    let lower = text.trim().to_lowercase();
    let contains_any = |words: &[&str]| words.iter().any(|word| lower.contains(word));

    if is_greeting(&lower) {
        ReactionKind::Greeting
    } else if contains_any(&SLEEPY_WORDS) {
        ReactionKind::Sleepy
    } else if lower.contains(['!', '！']) {
        ReactionKind::Surprise
    } else if lower.contains(['?', '？']) {
        ReactionKind::Think
    } else if contains_any(&SAD_WORDS) {
        ReactionKind::Sad
    } else if contains_any(&ANGRY_WORDS) {
        ReactionKind::Angry
    } else if contains_any(&SHY_WORDS) {
        ReactionKind::Shy
    } else if contains_any(&HAPPY_WORDS) {
        ReactionKind::Happy
    } else {
        ReactionKind::Neutral
    }
}

/// Who produced the text being reacted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReactionOrigin {
    /// The viewer typed it: acknowledge and turn toward them.
    User,
    /// The avatar is saying it: full reaction when speech starts.
    Avatar,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GestureCue {
    pub kind: GestureKind,
    pub duration: f32,
    pub intensity: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClipVariant {
    pub key: String,
    /// Relative pick weight among the entry's variants.
    pub weight: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReactionEntry {
    pub gesture: Option<GestureCue>,
    /// Small gesture played when the viewer's own message has this kind.
    pub acknowledge: Option<GestureCue>,
    pub clips: Vec<ClipVariant>,
    /// Probability that any clip plays at all.
    pub clip_chance: f32,
    pub clip_strength: f32,
    pub mood: MoodTargets,
}

/// What the engine should do for one reaction.
#[derive(Debug, Clone, PartialEq)]
pub struct ReactionPlan {
    pub kind: ReactionKind,
    pub gesture: Option<GestureCue>,
    pub clip: Option<(String, f32)>,
    pub mood: Option<MoodTargets>,
    pub approach: bool,
}

#[derive(Resource, Debug, Clone)]
pub struct ReactionTable {
    entries: HashMap<ReactionKind, ReactionEntry>,
}

fn cue(kind: GestureKind, duration: f32, intensity: f32) -> Option<GestureCue> {
    Some(GestureCue {
        kind,
        duration,
        intensity,
    })
}

fn clips(variants: &[(MotionKey, f32)]) -> Vec<ClipVariant> {
    variants
        .iter()
        .map(|(motion, weight)| ClipVariant {
            key: motion.key().to_string(),
            weight: *weight,
        })
        .collect()
}

impl ReactionTable {
    pub fn new(mood: &MoodSettings) -> Self {
        let baseline = MoodTargets::baseline(mood);

        let entries = HashMap::from([
            (
                ReactionKind::Greeting,
                ReactionEntry {
                    gesture: cue(GestureKind::Wave, 1.2, 1.0),
                    acknowledge: cue(GestureKind::Wave, 1.0, 0.7),
                    clips: clips(&[(MotionKey::Greeting, 1.0)]),
                    clip_chance: 1.0,
                    clip_strength: 1.0,
                    mood: MoodTargets {
                        happy: 0.45,
                        ..baseline
                    },
                },
            ),
            (
                ReactionKind::Happy,
                ReactionEntry {
                    gesture: cue(GestureKind::Happy, 0.9, 1.0),
                    acknowledge: cue(GestureKind::Happy, 0.7, 0.5),
                    clips: clips(&[(MotionKey::Happy, 0.45), (MotionKey::Clap, 0.55)]),
                    clip_chance: 1.0,
                    clip_strength: 1.0,
                    mood: MoodTargets {
                        happy: 0.55,
                        ..baseline
                    },
                },
            ),
            (
                ReactionKind::Sad,
                ReactionEntry {
                    gesture: cue(GestureKind::Sad, 1.1, 1.0),
                    acknowledge: cue(GestureKind::Sad, 0.8, 0.5),
                    clips: clips(&[(MotionKey::Sad, 1.0)]),
                    clip_chance: 1.0,
                    clip_strength: 1.0,
                    mood: MoodTargets {
                        sad: 0.55,
                        ..baseline
                    },
                },
            ),
            (
                ReactionKind::Angry,
                ReactionEntry {
                    gesture: cue(GestureKind::Angry, 1.0, 1.0),
                    acknowledge: cue(GestureKind::Angry, 0.7, 0.4),
                    clips: clips(&[(MotionKey::Angry, 1.0)]),
                    clip_chance: 1.0,
                    clip_strength: 0.95,
                    mood: MoodTargets {
                        angry: 0.45,
                        ..baseline
                    },
                },
            ),
            (
                ReactionKind::Surprise,
                ReactionEntry {
                    gesture: cue(GestureKind::Surprise, 0.8, 1.0),
                    acknowledge: cue(GestureKind::Surprise, 0.6, 0.5),
                    clips: clips(&[(MotionKey::Surprised, 1.0)]),
                    clip_chance: 1.0,
                    clip_strength: 1.0,
                    mood: MoodTargets {
                        surprised: 0.35,
                        ..baseline
                    },
                },
            ),
            (
                ReactionKind::Shy,
                ReactionEntry {
                    gesture: cue(GestureKind::Shy, 1.1, 1.0),
                    acknowledge: cue(GestureKind::Shy, 0.9, 0.6),
                    clips: clips(&[(MotionKey::Happy, 1.0)]),
                    clip_chance: 1.0,
                    clip_strength: 0.8,
                    mood: MoodTargets {
                        happy: 0.35,
                        blush: 0.6,
                        ..baseline
                    },
                },
            ),
            (
                ReactionKind::Think,
                ReactionEntry {
                    gesture: cue(GestureKind::Think, 1.2, 1.0),
                    acknowledge: cue(GestureKind::Think, 0.8, 0.5),
                    clips: clips(&[(MotionKey::Thinking, 1.0)]),
                    clip_chance: 1.0,
                    clip_strength: 1.0,
                    mood: baseline,
                },
            ),
            (
                ReactionKind::Sleepy,
                ReactionEntry {
                    gesture: cue(GestureKind::Sad, 1.4, 0.6),
                    acknowledge: cue(GestureKind::Sad, 0.8, 0.35),
                    clips: clips(&[(MotionKey::Sleepy, 1.0)]),
                    clip_chance: 1.0,
                    clip_strength: 0.95,
                    mood: MoodTargets {
                        relaxed: 0.4,
                        ..baseline
                    },
                },
            ),
            (
                ReactionKind::Neutral,
                ReactionEntry {
                    gesture: None,
                    acknowledge: cue(GestureKind::Happy, 0.6, 0.35),
                    clips: clips(&[(MotionKey::Look, 1.0)]),
                    clip_chance: 0.22,
                    clip_strength: 0.9,
                    mood: baseline,
                },
            ),
        ]);

        Self { entries }
    }

    pub fn insert(&mut self, kind: ReactionKind, entry: ReactionEntry) {
        self.entries.insert(kind, entry);
    }

    pub fn entry(&self, kind: ReactionKind) -> Option<&ReactionEntry> {
        self.entries.get(&kind)
    }

    pub fn plan<R: Rng>(&self, kind: ReactionKind, origin: ReactionOrigin, rng: &mut R) -> ReactionPlan {
        if let ReactionKind::Clip(motion) = kind {
            return ReactionPlan {
                kind,
                gesture: None,
                clip: Some((motion.key().to_string(), 1.0)),
                mood: None,
                approach: false,
            };
        }

        let Some(entry) = self.entries.get(&kind) else {
            return ReactionPlan {
                kind,
                gesture: None,
                clip: None,
                mood: None,
                approach: origin == ReactionOrigin::User,
            };
        };

        match origin {
            ReactionOrigin::User => ReactionPlan {
                kind,
                gesture: entry.acknowledge.clone(),
                clip: None,
                mood: Some(entry.mood),
                approach: true,
            },
            ReactionOrigin::Avatar => ReactionPlan {
                kind,
                gesture: entry.gesture.clone(),
                clip: pick_clip(entry, rng).map(|key| (key, entry.clip_strength)),
                mood: Some(entry.mood),
                approach: false,
            },
        }
    }
}

fn pick_clip<R: Rng>(entry: &ReactionEntry, rng: &mut R) -> Option<String> {
    let total: f32 = entry.clips.iter().map(|clip| clip.weight.max(0.0)).sum();
    if total <= 0.0 {
        return None;
    }
    let chance = entry.clip_chance.clamp(0.0, 1.0) as f64;
    if !rng.gen_bool(chance) {
        return None;
    }

    let mut roll = rng.gen_range(0.0..total);
    for clip in &entry.clips {
        let weight = clip.weight.max(0.0);
        if roll < weight {
            return Some(clip.key.clone());
        }
        roll -= weight;
    }
    entry.clips.last().map(|clip| clip.key.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn classifies_keyword_rules_in_order() {
        assert_eq!(classify("안녕"), ReactionKind::Greeting);
        assert_eq!(classify("  Hi there"), ReactionKind::Greeting);
        assert_eq!(classify("hint please"), ReactionKind::Neutral);
        assert_eq!(classify("너무 졸려!"), ReactionKind::Sleepy);
        assert_eq!(classify("대박!"), ReactionKind::Surprise);
        assert_eq!(classify("이거 뭐야?"), ReactionKind::Think);
        assert_eq!(classify("오늘 너무 힘들어"), ReactionKind::Sad);
        assert_eq!(classify("진짜 짜증나"), ReactionKind::Angry);
        assert_eq!(classify("좋아해"), ReactionKind::Shy);
        assert_eq!(classify("ㅋㅋㅋ 최고"), ReactionKind::Happy);
        assert_eq!(classify("점심 먹었어"), ReactionKind::Neutral);
    }

    #[test]
    fn greeting_from_avatar_waves_and_plays_clip() {
        let table = ReactionTable::new(&MoodSettings::default());
        let mut rng = StdRng::seed_from_u64(5);
        let plan = table.plan(ReactionKind::Greeting, ReactionOrigin::Avatar, &mut rng);

        let gesture = plan.gesture.expect("wave");
        assert_eq!(gesture.kind, GestureKind::Wave);
        assert!(gesture.duration > 0.0);
        assert_eq!(plan.clip, Some(("greeting".to_string(), 1.0)));
        assert!(!plan.approach);
    }

    #[test]
    fn user_messages_acknowledge_without_clips() {
        let table = ReactionTable::new(&MoodSettings::default());
        let mut rng = StdRng::seed_from_u64(5);
        let plan = table.plan(ReactionKind::Happy, ReactionOrigin::User, &mut rng);
        assert!(plan.clip.is_none());
        assert!(plan.approach);
        assert!(plan.gesture.is_some_and(|cue| cue.intensity < 1.0));
    }

    #[test]
    fn happy_picks_between_variants() {
        let table = ReactionTable::new(&MoodSettings::default());
        let mut rng = StdRng::seed_from_u64(11);
        let mut seen = std::collections::HashSet::new();
        for _ in 0..64 {
            let plan = table.plan(ReactionKind::Happy, ReactionOrigin::Avatar, &mut rng);
            seen.insert(plan.clip.expect("always a clip").0);
        }
        assert!(seen.contains("happy"));
        assert!(seen.contains("clap"));
    }

    #[test]
    fn direct_clip_selector_bypasses_table() {
        let table = ReactionTable::new(&MoodSettings::default());
        let mut rng = StdRng::seed_from_u64(1);
        let plan = table.plan(ReactionKind::Clip(MotionKey::Jump), ReactionOrigin::Avatar, &mut rng);
        assert_eq!(plan.clip, Some(("jump".to_string(), 1.0)));
        assert!(plan.gesture.is_none());
    }

    #[test]
    fn table_entries_are_replaceable() {
        let mut table = ReactionTable::new(&MoodSettings::default());
        table.insert(
            ReactionKind::Neutral,
            ReactionEntry {
                gesture: cue(GestureKind::Think, 0.5, 1.0),
                acknowledge: None,
                clips: Vec::new(),
                clip_chance: 0.0,
                clip_strength: 1.0,
                mood: MoodTargets::default(),
            },
        );
        let mut rng = StdRng::seed_from_u64(1);
        let plan = table.plan(ReactionKind::Neutral, ReactionOrigin::Avatar, &mut rng);
        assert_eq!(plan.gesture.map(|cue| cue.kind), Some(GestureKind::Think));
        assert_eq!(plan.clip, None);
    }
}
