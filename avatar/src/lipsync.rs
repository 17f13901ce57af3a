//! Text-driven mouth shapes.
//!
//! A [`LipPlan`] is built once per utterance and indexed by elapsed speech
//! time, so replaying the same text from the same start gives the same
//! mouth. [`LipSync`] turns the plan plus boundary pulses into a single
//! active mouth channel per frame.

use crate::expression::ExpressionFrame;
use crate::settings::LipSyncSettings;
use crate::smoothing::damp;
use common::Viseme;
use rand::Rng;
use std::f32::consts::TAU;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LipStep {
    Shape(Viseme),
    Silence,
}

/// Vowel bucket per Hangul medial, in Unicode jungseong order
/// (ㅏ ㅐ ㅑ ㅒ ㅓ ㅔ ㅕ ㅖ ㅗ ㅘ ㅙ ㅚ ㅛ ㅜ ㅝ ㅞ ㅟ ㅠ ㅡ ㅢ ㅣ).
const HANGUL_MEDIALS: [Viseme; 21] = [
    Viseme::Aa,
    Viseme::Ee,
    Viseme::Aa,
    Viseme::Ee,
    Viseme::Oh,
    Viseme::Ee,
    Viseme::Oh,
    Viseme::Ee,
    Viseme::Oh,
    Viseme::Aa,
    Viseme::Ee,
    Viseme::Ee,
    Viseme::Oh,
    Viseme::Ou,
    Viseme::Oh,
    Viseme::Ee,
    Viseme::Ih,
    Viseme::Ou,
    Viseme::Ou,
    Viseme::Ih,
    Viseme::Ih,
];

const HANGUL_SYLLABLES: std::ops::RangeInclusive<u32> = 0xAC00..=0xD7A3;
const HANGUL_COMPAT_VOWELS: std::ops::RangeInclusive<u32> = 0x314F..=0x3163;

const FALLBACK_CYCLE: [Viseme; 5] = [Viseme::Aa, Viseme::Ih, Viseme::Ou, Viseme::Ee, Viseme::Oh];

pub fn viseme_for_char(c: char) -> Option<Viseme> {
    let code = c as u32;
    if HANGUL_SYLLABLES.contains(&code) {
        let medial = ((code - 0xAC00) % 588) / 28;
        return HANGUL_MEDIALS.get(medial as usize).copied();
    }
    if HANGUL_COMPAT_VOWELS.contains(&code) {
        return HANGUL_MEDIALS.get((code - 0x314F) as usize).copied();
    }
    match c.to_ascii_lowercase() {
        'a' => Some(Viseme::Aa),
        'e' => Some(Viseme::Ee),
        'i' | 'y' => Some(Viseme::Ih),
        'o' => Some(Viseme::Oh),
        'u' | 'w' => Some(Viseme::Ou),
        _ => None,
    }
}

fn is_pause(c: char) -> bool {
    matches!(
        c,
        '.' | ',' | '!' | '?' | ';' | ':' | '…' | '~' | '。' | '、' | '！' | '？' | '\n'
    )
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LipPlan {
    steps: Vec<LipStep>,
    fallback: bool,
}

impl LipPlan {
    /// Builds the plan for `text`. Never empty: text without any vowel
    /// yields the fixed fallback cycle.
    pub fn from_text(text: &str) -> Self {
        let mut steps: Vec<LipStep> = Vec::new();
        for c in text.chars() {
            if let Some(viseme) = viseme_for_char(c) {
                steps.push(LipStep::Shape(viseme));
            } else if is_pause(c) && matches!(steps.last(), Some(LipStep::Shape(_))) {
                steps.push(LipStep::Silence);
            }
        }
        while steps.last() == Some(&LipStep::Silence) {
            steps.pop();
        }

        if steps.is_empty() {
            return Self {
                steps: FALLBACK_CYCLE.iter().copied().map(LipStep::Shape).collect(),
                fallback: true,
            };
        }
        Self {
            steps,
            fallback: false,
        }
    }

    pub fn steps(&self) -> &[LipStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn is_fallback(&self) -> bool {
        self.fallback
    }

    /// Entry held at `elapsed`, wrapping past the end.
    pub fn step_at(&self, elapsed: f32, step_secs: f32) -> LipStep {
        if self.steps.is_empty() {
            return LipStep::Silence;
        }
        let step_secs = step_secs.max(1e-3);
        let index = (elapsed.max(0.0) / step_secs).floor() as usize % self.steps.len();
        self.steps[index]
    }
}

#[derive(Debug, Clone)]
pub struct LipSync {
    speaking: bool,
    plan: Option<LipPlan>,
    elapsed: f32,
    pulse: f32,
    base: f32,
    amplitude: f32,
    release_rate: f32,
    shape: Viseme,
}

impl Default for LipSync {
    fn default() -> Self {
        Self {
            speaking: false,
            plan: None,
            elapsed: 0.0,
            pulse: 0.0,
            base: 0.0,
            amplitude: 0.0,
            release_rate: 0.0,
            shape: Viseme::Aa,
        }
    }
}

impl LipSync {
    pub fn start(&mut self, text: &str) {
        self.plan = Some(LipPlan::from_text(text));
        self.speaking = true;
        self.elapsed = 0.0;
        self.pulse = 0.0;
        self.release_rate = 0.0;
    }

    /// Word or sentence boundary reported by the speech service.
    pub fn boundary(&mut self, settings: &LipSyncSettings) {
        if self.speaking {
            self.pulse = (self.pulse + settings.pulse_gain).min(1.0);
        }
    }

    /// Ends speech: the plan is dropped and the mouth closes within
    /// `release_secs`.
    pub fn stop(&mut self, settings: &LipSyncSettings) {
        self.speaking = false;
        self.plan = None;
        self.pulse = 0.0;
        self.base = 0.0;
        let release = settings.release_secs.max(1e-3);
        self.release_rate = self.amplitude / release;
    }

    pub fn is_speaking(&self) -> bool {
        self.speaking
    }

    pub fn plan(&self) -> Option<&LipPlan> {
        self.plan.as_ref()
    }

    pub fn amplitude(&self) -> f32 {
        self.amplitude
    }

    pub fn pulse(&self) -> f32 {
        self.pulse
    }

    pub fn shape(&self) -> Viseme {
        self.shape
    }

    pub fn advance<R: Rng>(&mut self, dt: f32, rng: &mut R, settings: &LipSyncSettings) {
        if !self.speaking {
            self.amplitude = (self.amplitude - self.release_rate * dt).max(0.0);
            return;
        }

        self.elapsed += dt;

        let chance = (dt * settings.fallback_pulse_rate).clamp(0.0, 1.0) as f64;
        if self.pulse < settings.fallback_pulse_threshold && rng.gen_bool(chance) {
            self.pulse = (self.pulse + settings.pulse_gain).min(1.0);
        }
        self.pulse *= (-settings.pulse_decay_per_sec * dt).exp();

        let wave = 0.5 + 0.5 * (self.elapsed * settings.base_frequency).sin();
        let base_target = settings.base_level + settings.base_swing * wave;
        self.base = damp(self.base, base_target, settings.base_response, dt);

        let step = self
            .plan
            .as_ref()
            .map_or(LipStep::Silence, |plan| plan.step_at(self.elapsed, settings.step_secs));
        let target = match step {
            LipStep::Shape(viseme) => {
                self.shape = viseme;
                (self.base + self.pulse).min(1.0) * settings.amplitude_scale
            }
            LipStep::Silence => 0.0,
        };
        self.amplitude = damp(self.amplitude, target, TAU * 4.0, dt).clamp(0.0, 1.0);
    }

    /// Writes the active shape and zeroes every other mouth channel.
    pub fn write(&self, frame: &mut ExpressionFrame) {
        frame.clear_mouth();
        if self.amplitude > 0.0 {
            frame.set(self.shape.role(), self.amplitude);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::ExpressionRole;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn hangul_syllables_map_by_medial() {
        assert_eq!(viseme_for_char('안'), Some(Viseme::Aa));
        assert_eq!(viseme_for_char('녕'), Some(Viseme::Oh));
        assert_eq!(viseme_for_char('비'), Some(Viseme::Ih));
        assert_eq!(viseme_for_char('무'), Some(Viseme::Ou));
        assert_eq!(viseme_for_char('세'), Some(Viseme::Ee));
        assert_eq!(viseme_for_char('ㅗ'), Some(Viseme::Oh));
        assert_eq!(viseme_for_char('ㄱ'), None);
        assert_eq!(viseme_for_char('k'), None);
    }

    #[test]
    fn plan_is_deterministic_with_collapsed_pauses() {
        let first = LipPlan::from_text("안녕, 반가워!! ok?");
        let second = LipPlan::from_text("안녕, 반가워!! ok?");
        assert_eq!(first, second);
        assert!(!first.is_fallback());
        assert_eq!(
            first.steps(),
            &[
                LipStep::Shape(Viseme::Aa),
                LipStep::Shape(Viseme::Oh),
                LipStep::Silence,
                LipStep::Shape(Viseme::Aa),
                LipStep::Shape(Viseme::Aa),
                LipStep::Shape(Viseme::Oh),
                LipStep::Silence,
                LipStep::Shape(Viseme::Oh),
            ]
        );
    }

    #[test]
    fn non_phonetic_text_uses_fallback_cycle() {
        let plan = LipPlan::from_text("ㅋㅋㅋ 123 ...");
        assert!(plan.is_fallback());
        assert_eq!(plan.len(), 5);
        assert_eq!(plan.step_at(0.0, 0.09), LipStep::Shape(Viseme::Aa));
        assert_eq!(plan.step_at(0.09 * 5.5, 0.09), LipStep::Shape(Viseme::Aa));
        assert_eq!(plan.step_at(0.09 * 1.5, 0.09), LipStep::Shape(Viseme::Ih));
    }

    #[test]
    fn only_one_mouth_channel_is_open() {
        let settings = LipSyncSettings::default();
        let mut rng = StdRng::seed_from_u64(3);
        let mut lips = LipSync::default();
        lips.start("hello there");
        lips.boundary(&settings);

        let mut frame = ExpressionFrame::default();
        for role in ExpressionRole::MOUTH {
            frame.set(role, 1.0);
        }
        for _ in 0..10 {
            lips.advance(1.0 / 60.0, &mut rng, &settings);
        }
        lips.write(&mut frame);

        let open: Vec<_> = ExpressionRole::MOUTH
            .into_iter()
            .filter(|role| frame.get(*role) > 0.0)
            .collect();
        assert_eq!(open, vec![lips.shape().role()]);
    }

    #[test]
    fn stop_closes_mouth_within_release() {
        let settings = LipSyncSettings::default();
        let mut rng = StdRng::seed_from_u64(9);
        let mut lips = LipSync::default();
        lips.start("아아아아아아");
        for _ in 0..20 {
            lips.advance(1.0 / 60.0, &mut rng, &settings);
        }
        assert!(lips.amplitude() > 0.0);

        lips.stop(&settings);
        assert!(!lips.is_speaking());
        assert!(lips.plan().is_none());

        let frames = (settings.release_secs * 60.0).ceil() as usize + 1;
        for _ in 0..frames {
            lips.advance(1.0 / 60.0, &mut rng, &settings);
        }
        assert_eq!(lips.amplitude(), 0.0);
    }

    #[test]
    fn boundary_is_ignored_when_silent() {
        let settings = LipSyncSettings::default();
        let mut lips = LipSync::default();
        lips.boundary(&settings);
        assert_eq!(lips.pulse(), 0.0);
    }
}
