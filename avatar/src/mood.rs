//! Emotional expression overlay with a timed return to baseline.

use crate::expression::ExpressionFrame;
use crate::settings::MoodSettings;
use crate::smoothing::damp;
use common::ExpressionRole;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MoodTargets {
    pub happy: f32,
    pub sad: f32,
    pub angry: f32,
    pub surprised: f32,
    pub relaxed: f32,
    pub blush: f32,
}

impl MoodTargets {
    pub fn baseline(settings: &MoodSettings) -> Self {
        Self {
            happy: settings.baseline_happy,
            relaxed: settings.baseline_relaxed,
            ..Self::default()
        }
    }

    fn channels(&self) -> [(ExpressionRole, f32); 6] {
        [
            (ExpressionRole::Happy, self.happy),
            (ExpressionRole::Sad, self.sad),
            (ExpressionRole::Angry, self.angry),
            (ExpressionRole::Surprised, self.surprised),
            (ExpressionRole::Relaxed, self.relaxed),
            (ExpressionRole::Blush, self.blush),
        ]
    }
}

#[derive(Debug, Clone)]
pub struct Mood {
    current: MoodTargets,
    target: MoodTargets,
    generation: u64,
    reset_at: Option<f32>,
    clock: f32,
}

impl Mood {
    pub fn new(settings: &MoodSettings) -> Self {
        let baseline = MoodTargets::baseline(settings);
        Self {
            current: baseline,
            target: baseline,
            generation: 0,
            reset_at: None,
            clock: 0.0,
        }
    }

    /// Sets new targets. Only the latest reaction's reset timer survives.
    pub fn react(&mut self, targets: MoodTargets, settings: &MoodSettings) -> u64 {
        self.generation += 1;
        self.target = targets;
        self.reset_at = Some(self.clock + settings.reset_after_secs.max(0.0));
        self.generation
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn target(&self) -> MoodTargets {
        self.target
    }

    pub fn current(&self) -> MoodTargets {
        self.current
    }

    pub fn advance(&mut self, dt: f32, settings: &MoodSettings) {
        self.clock += dt;
        if self.reset_at.is_some_and(|at| self.clock >= at) {
            self.reset_at = None;
            // Sad, surprised, angry and blush drop out; relaxed stays where the reaction put it.
            self.target = MoodTargets {
                happy: settings.baseline_happy,
                relaxed: self.target.relaxed,
                ..MoodTargets::default()
            };
        }

        let rate = settings.response;
        self.current = MoodTargets {
            happy: damp(self.current.happy, self.target.happy, rate, dt),
            sad: damp(self.current.sad, self.target.sad, rate, dt),
            angry: damp(self.current.angry, self.target.angry, rate, dt),
            surprised: damp(self.current.surprised, self.target.surprised, rate, dt),
            relaxed: damp(self.current.relaxed, self.target.relaxed, rate, dt),
            blush: damp(self.current.blush, self.target.blush, rate, dt),
        };
    }

    pub fn write(&self, frame: &mut ExpressionFrame) {
        for (role, value) in self.current.channels() {
            frame.set(role, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sad() -> MoodTargets {
        MoodTargets {
            happy: 0.18,
            sad: 0.55,
            relaxed: 0.15,
            ..MoodTargets::default()
        }
    }

    #[test]
    fn returns_to_baseline_after_reset_delay() {
        let settings = MoodSettings::default();
        let mut mood = Mood::new(&settings);
        mood.react(sad(), &settings);

        for _ in 0..60 {
            mood.advance(1.0 / 60.0, &settings);
        }
        assert!(mood.current().sad > 0.4);

        for _ in 0..120 {
            mood.advance(1.0 / 60.0, &settings);
        }
        assert_eq!(mood.target().sad, 0.0);
        assert_eq!(mood.target().happy, settings.baseline_happy);
        assert!(mood.current().sad < 0.05);
    }

    #[test]
    fn newer_reaction_supersedes_older_reset() {
        let settings = MoodSettings::default();
        let mut mood = Mood::new(&settings);
        mood.react(sad(), &settings);
        for _ in 0..60 {
            mood.advance(1.0 / 60.0, &settings);
        }
        let angry = MoodTargets {
            angry: 0.45,
            ..MoodTargets::baseline(&settings)
        };
        assert_eq!(mood.react(angry, &settings), 2);

        // Past the first reaction's reset time, before the second's.
        for _ in 0..48 {
            mood.advance(1.0 / 60.0, &settings);
        }
        assert_eq!(mood.target().angry, 0.45);
    }
}
