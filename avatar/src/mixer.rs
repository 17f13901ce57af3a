//! Motion clip playback: per-key actions with linear fades and a single
//! "current" driver.

use crate::cache::ClipCache;
use crate::clip::MotionClip;
use crate::skeleton::{Pose, Skeleton};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopMode {
    Once,
    Repeat,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayOptions {
    pub loop_mode: LoopMode,
    pub fade_in: f32,
    /// Fade applied to whatever was current before this play.
    pub fade_out: f32,
    /// Target weight once the fade-in completes.
    pub strength: f32,
}

impl PlayOptions {
    pub fn once() -> Self {
        Self {
            loop_mode: LoopMode::Once,
            fade_in: 0.2,
            fade_out: 0.12,
            strength: 1.0,
        }
    }

    pub fn repeat() -> Self {
        Self {
            loop_mode: LoopMode::Repeat,
            ..Self::once()
        }
    }

    pub fn with_fades(mut self, fade_in: f32, fade_out: f32) -> Self {
        self.fade_in = fade_in;
        self.fade_out = fade_out;
        self
    }

    pub fn with_strength(mut self, strength: f32) -> Self {
        self.strength = strength;
        self
    }
}

/// A finished `once` action, reported by [`ClipMixer::advance`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinishedAction {
    pub key: String,
}

#[derive(Debug, Clone)]
struct Action {
    key: String,
    clip: Arc<MotionClip>,
    time: f32,
    weight: f32,
    target: f32,
    /// Weight units per second toward `target`.
    rate: f32,
    loop_mode: LoopMode,
    finished: bool,
}

impl Action {
    fn fade_to(&mut self, target: f32, seconds: f32) {
        self.target = target;
        let distance = (target - self.weight).abs();
        self.rate = if seconds > 0.0 && seconds.is_finite() {
            (distance / seconds).max(self.rate_floor())
        } else {
            f32::INFINITY
        };
    }

    fn rate_floor(&self) -> f32 {
        1e-3
    }

    fn step_weight(&mut self, dt: f32) {
        if self.rate.is_infinite() {
            self.weight = self.target;
            return;
        }
        let step = self.rate * dt;
        if self.weight < self.target {
            self.weight = (self.weight + step).min(self.target);
        } else {
            self.weight = (self.weight - step).max(self.target);
        }
    }
}

#[derive(Debug, Clone)]
struct PendingPlay {
    key: String,
    options: PlayOptions,
    requested_at: f32,
}

/// Owns every live [`Action`]. At most one action per key exists, and at
/// most one key is current.
#[derive(Debug, Clone)]
pub struct ClipMixer {
    actions: Vec<Action>,
    current: Option<String>,
    idle_key: String,
    pending: Option<PendingPlay>,
}

impl ClipMixer {
    pub fn new(idle_key: impl Into<String>) -> Self {
        Self {
            actions: Vec::new(),
            current: None,
            idle_key: idle_key.into(),
            pending: None,
        }
    }

    pub fn idle_key(&self) -> &str {
        &self.idle_key
    }

    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// Starts `key` if it is loaded. Returns `false` when it is not.
    pub fn play(&mut self, key: &str, cache: &ClipCache, options: PlayOptions) -> bool {
        let Some(clip) = cache.get(key) else {
            return false;
        };

        for action in self.actions.iter_mut().filter(|action| action.key != key) {
            if action.target > 0.0 {
                action.fade_to(0.0, options.fade_out);
            }
        }

        let strength = if options.strength.is_finite() {
            options.strength.clamp(0.0, 1.0)
        } else {
            1.0
        };

        match self.actions.iter_mut().find(|action| action.key == key) {
            Some(action) => {
                action.clip = clip;
                action.time = 0.0;
                action.finished = false;
                action.loop_mode = options.loop_mode;
                action.fade_to(strength, options.fade_in);
            }
            None => {
                let mut action = Action {
                    key: key.to_string(),
                    clip,
                    time: 0.0,
                    weight: 0.0,
                    target: 0.0,
                    rate: 0.0,
                    loop_mode: options.loop_mode,
                    finished: false,
                };
                action.fade_to(strength, options.fade_in);
                self.actions.push(action);
            }
        }

        self.current = Some(key.to_string());
        self.pending = None;
        true
    }

    /// Plays `key` now if loaded, otherwise remembers it so the load
    /// completion can start it. A newer request replaces an older one.
    pub fn request_play(
        &mut self,
        key: &str,
        cache: &ClipCache,
        options: PlayOptions,
        now: f32,
    ) -> bool {
        if self.play(key, cache, options) {
            return true;
        }
        self.pending = Some(PendingPlay {
            key: key.to_string(),
            options,
            requested_at: now,
        });
        false
    }

    pub fn pending_key(&self) -> Option<&str> {
        self.pending.as_ref().map(|pending| pending.key.as_str())
    }

    pub fn cancel_pending(&mut self) {
        self.pending = None;
    }

    /// Takes the pending play for `key` if it is still wanted and younger
    /// than `max_age` seconds.
    pub fn take_pending(&mut self, key: &str, now: f32, max_age: f32) -> Option<PlayOptions> {
        let pending = self.pending.as_ref()?;
        if pending.key != key {
            return None;
        }
        let pending = self.pending.take()?;
        (now - pending.requested_at <= max_age).then_some(pending.options)
    }

    /// Fades `key` out. Clears `current` when it was the current action.
    pub fn fade_out(&mut self, key: &str, seconds: f32) {
        if let Some(action) = self.actions.iter_mut().find(|action| action.key == key) {
            action.fade_to(0.0, seconds);
        }
        if self.current.as_deref() == Some(key) {
            self.current = None;
        }
    }

    /// Advances time and fades; returns actions that just finished.
    pub fn advance(&mut self, dt: f32) -> Vec<FinishedAction> {
        let mut finished = Vec::new();

        for action in &mut self.actions {
            let duration = action.clip.duration();
            action.time += dt;
            match action.loop_mode {
                LoopMode::Repeat => {
                    if action.time >= duration {
                        action.time %= duration;
                    }
                }
                LoopMode::Once => {
                    if action.time >= duration {
                        action.time = duration;
                        if !action.finished {
                            action.finished = true;
                            finished.push(FinishedAction {
                                key: action.key.clone(),
                            });
                        }
                    }
                }
            }
            action.step_weight(dt);
        }

        let current = self.current.clone();
        self.actions.retain(|action| {
            action.weight > 0.0 || action.target > 0.0 || current.as_deref() == Some(&action.key)
        });

        finished
    }

    pub fn weight_of(&self, key: &str) -> f32 {
        self.actions
            .iter()
            .find(|action| action.key == key)
            .map_or(0.0, |action| action.weight)
    }

    pub fn is_active(&self, key: &str) -> bool {
        self.actions
            .iter()
            .any(|action| action.key == key && (action.weight > 0.0 || action.target > 0.0))
    }

    pub fn active_count(&self) -> usize {
        self.actions.len()
    }

    /// Body regions driven by any non-idle action with live weight.
    pub fn clip_regions(&self) -> u8 {
        self.actions
            .iter()
            .filter(|action| action.key != self.idle_key)
            .filter(|action| action.weight > 0.0 || action.target > 0.0)
            .fold(0, |mask, action| mask | action.clip.regions())
    }

    /// `true` when a non-idle action is driving any part of the body.
    pub fn has_foreground_clip(&self) -> bool {
        self.clip_regions() != 0
    }

    /// Blends every live action onto `pose` in play order.
    pub fn apply(&self, skeleton: &Skeleton, pose: &mut Pose) {
        for action in &self.actions {
            if action.weight <= 0.0 {
                continue;
            }
            for (bone, offset) in action.clip.sample(action.time) {
                let (Some(rest), Some(current)) = (skeleton.rest(bone), pose.get(bone)) else {
                    continue;
                };
                let target = rest * offset;
                pose.set(bone, current.slerp(target, action.weight.min(1.0)));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clip::{ClipDocument, TrackDocument};
    use crate::settings::ClipSettings;
    use bevy::prelude::*;
    use common::{BodyRegion, HumanoidBone};

    fn clip(key: &str, bone: &str, duration: f32) -> MotionClip {
        MotionClip::from_document(
            key,
            ClipDocument {
                name: key.to_string(),
                duration,
                tracks: vec![TrackDocument {
                    bone: bone.to_string(),
                    times: vec![0.0, duration],
                    rotations: vec![[0.0, 0.0, 0.0, 1.0], [0.0, 0.0, 0.38268343, 0.9238795]],
                }],
            },
        )
        .expect("valid clip")
    }

    fn loaded_cache() -> ClipCache {
        let mut cache = ClipCache::new(&ClipSettings::default());
        for (key, bone, duration) in [
            ("idle", "spine", 2.0),
            ("greeting", "rightUpperArm", 1.0),
            ("happy", "leftUpperArm", 1.0),
        ] {
            cache.request(key, 0.0).expect("known key");
            cache.complete(key, Ok(clip(key, bone, duration))).expect("ready");
        }
        cache
    }

    #[test]
    fn play_returns_false_until_loaded() {
        let cache = ClipCache::new(&ClipSettings::default());
        let mut mixer = ClipMixer::new("idle");
        assert!(!mixer.play("greeting", &cache, PlayOptions::once()));
        assert_eq!(mixer.current(), None);
    }

    #[test]
    fn second_play_crossfades_out_the_first() {
        let cache = loaded_cache();
        let mut mixer = ClipMixer::new("idle");

        assert!(mixer.play("greeting", &cache, PlayOptions::repeat()));
        mixer.advance(0.5);
        assert_eq!(mixer.weight_of("greeting"), 1.0);

        assert!(mixer.play("happy", &cache, PlayOptions::repeat()));
        assert_eq!(mixer.current(), Some("happy"));

        let mut previous = mixer.weight_of("greeting");
        for _ in 0..30 {
            mixer.advance(1.0 / 60.0);
            let weight = mixer.weight_of("greeting");
            assert!(weight <= previous);
            previous = weight;
        }
        assert_eq!(mixer.weight_of("greeting"), 0.0);
        assert_eq!(mixer.weight_of("happy"), 1.0);
        assert_eq!(mixer.active_count(), 1);
    }

    #[test]
    fn once_action_reports_finish_exactly_once() {
        let cache = loaded_cache();
        let mut mixer = ClipMixer::new("idle");
        mixer.play("greeting", &cache, PlayOptions::once());

        let mut finishes = 0;
        for _ in 0..90 {
            finishes += mixer.advance(1.0 / 30.0).len();
        }
        assert_eq!(finishes, 1);
    }

    #[test]
    fn pending_play_respects_newer_requests_and_age() {
        let cache = ClipCache::new(&ClipSettings::default());
        let mut mixer = ClipMixer::new("idle");

        assert!(!mixer.request_play("greeting", &cache, PlayOptions::once(), 0.0));
        assert!(!mixer.request_play("happy", &cache, PlayOptions::once(), 0.1));
        assert_eq!(mixer.take_pending("greeting", 0.2, 2.0), None);
        assert_eq!(mixer.pending_key(), Some("happy"));
        assert_eq!(mixer.take_pending("happy", 5.0, 2.0), None);
        assert_eq!(mixer.pending_key(), None);
    }

    #[test]
    fn clip_regions_ignore_idle() {
        let cache = loaded_cache();
        let mut mixer = ClipMixer::new("idle");
        mixer.play("idle", &cache, PlayOptions::repeat());
        mixer.advance(0.3);
        assert_eq!(mixer.clip_regions(), 0);

        mixer.play("greeting", &cache, PlayOptions::once());
        assert_eq!(mixer.clip_regions(), BodyRegion::RightArm.bit());
        assert!(mixer.has_foreground_clip());
    }

    #[test]
    fn apply_only_touches_present_bones() {
        let cache = loaded_cache();
        let mut mixer = ClipMixer::new("idle");
        mixer.play("greeting", &cache, PlayOptions::once().with_fades(0.0, 0.0));
        mixer.advance(1.0);

        let skeleton = Skeleton::from_rest([(HumanoidBone::Head, Quat::IDENTITY)]);
        let mut pose = Pose::rest(&skeleton);
        mixer.apply(&skeleton, &mut pose);
        assert_eq!(pose.get(HumanoidBone::Head), Some(Quat::IDENTITY));
        assert_eq!(pose.get(HumanoidBone::RightUpperArm), None);

        let full = Skeleton::full_humanoid();
        let mut pose = Pose::rest(&full);
        mixer.apply(&full, &mut pose);
        let arm = pose.get(HumanoidBone::RightUpperArm).expect("bound");
        assert!(arm.angle_between(Quat::IDENTITY) > 0.7);
    }
}
