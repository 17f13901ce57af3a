//! Short procedural emotional overlays.

use crate::settings::GestureSettings;
use crate::skeleton::Pose;
use crate::smoothing::smoothstep;
use common::{GestureKind, HumanoidBone};
use std::f32::consts::PI;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActiveGesture {
    pub kind: GestureKind,
    pub elapsed: f32,
    pub duration: f32,
    pub intensity: f32,
}

impl ActiveGesture {
    pub fn progress(&self) -> f32 {
        (self.elapsed / self.duration).clamp(0.0, 1.0)
    }
}

/// Attack/hold/release envelope over `[0, duration]`.
///
/// Zero at both ends, one while holding, never above one.
pub fn envelope(elapsed: f32, duration: f32, attack_fraction: f32, release_fraction: f32) -> f32 {
    if !(duration > 0.0) || !(elapsed > 0.0) || elapsed >= duration {
        return 0.0;
    }

    let mut attack = attack_fraction.clamp(0.0, 1.0);
    let mut release = release_fraction.clamp(0.0, 1.0);
    if attack + release > 1.0 {
        let scale = 1.0 / (attack + release);
        attack *= scale;
        release *= scale;
    }

    let p = elapsed / duration;
    let rise = if attack > 0.0 { smoothstep(p / attack) } else { 1.0 };
    let fall = if release > 0.0 {
        smoothstep((1.0 - p) / release)
    } else {
        1.0
    };
    rise.min(fall)
}

/// Holds at most one gesture. A new start always preempts the old one.
#[derive(Debug, Clone, Default)]
pub struct GestureMachine {
    active: Option<ActiveGesture>,
}

impl GestureMachine {
    pub fn start(&mut self, kind: GestureKind, duration: f32, intensity: f32, settings: &GestureSettings) {
        self.active = Some(ActiveGesture {
            kind,
            elapsed: 0.0,
            duration: settings.clamp_duration(duration),
            intensity: settings.clamp_intensity(intensity),
        });
    }

    /// Advances the active gesture; returns its kind if it ended this step.
    pub fn advance(&mut self, dt: f32) -> Option<GestureKind> {
        let gesture = self.active.as_mut()?;
        gesture.elapsed += dt;
        if gesture.elapsed >= gesture.duration {
            let ended = gesture.kind;
            self.active = None;
            return Some(ended);
        }
        None
    }

    pub fn clear(&mut self) {
        self.active = None;
    }

    pub fn active(&self) -> Option<&ActiveGesture> {
        self.active.as_ref()
    }

    pub fn kind(&self) -> Option<GestureKind> {
        self.active.map(|gesture| gesture.kind)
    }

    /// Envelope times intensity for the active gesture, zero when idle.
    pub fn weight(&self, settings: &GestureSettings) -> f32 {
        self.active.map_or(0.0, |gesture| {
            envelope(
                gesture.elapsed,
                gesture.duration,
                settings.attack_fraction,
                settings.release_fraction,
            ) * gesture.intensity
        })
    }

    pub fn weight_of(&self, kind: GestureKind, settings: &GestureSettings) -> f32 {
        if self.kind() == Some(kind) {
            self.weight(settings)
        } else {
            0.0
        }
    }

    /// Writes the gesture's bone offsets, skipping bones in `blocked_regions`.
    /// Returns `true` if any bone was written.
    pub fn apply(&self, pose: &mut Pose, blocked_regions: u8, settings: &GestureSettings) -> bool {
        let Some(gesture) = self.active else {
            return false;
        };
        let weight = self.weight(settings);
        if weight <= 0.0 {
            return false;
        }
        let mut writer = OffsetWriter {
            pose,
            blocked_regions,
            wrote: false,
        };
        pose_for(gesture.kind, weight, gesture.progress(), &mut writer);
        writer.wrote
    }
}

struct OffsetWriter<'a> {
    pose: &'a mut Pose,
    blocked_regions: u8,
    wrote: bool,
}

impl OffsetWriter<'_> {
    fn euler(&mut self, bone: HumanoidBone, x: f32, y: f32, z: f32) {
        if bone.region().bit() & self.blocked_regions != 0 {
            return;
        }
        self.wrote |= self.pose.add_euler(bone, x, y, z);
    }
}

fn pose_for(kind: GestureKind, w: f32, p: f32, out: &mut OffsetWriter<'_>) {
    let s = smoothstep(p);
    match kind {
        GestureKind::Wave => {
            out.euler(HumanoidBone::RightUpperArm, -0.4 * w, 0.0, -0.9 * w);
            let swing = 0.6 * (PI * 4.0 * s).sin() * (1.0 - p);
            out.euler(HumanoidBone::RightLowerArm, 0.0, swing * w, -0.4 * w);
            out.euler(HumanoidBone::Head, -0.08 * w, 0.0, 0.0);
        }
        GestureKind::Happy => {
            out.euler(HumanoidBone::Chest, -0.22 * w, 0.0, 0.0);
            out.euler(HumanoidBone::Head, -0.18 * w, 0.0, 0.0);
            out.euler(HumanoidBone::LeftUpperArm, 0.0, 0.0, 0.3 * w);
            out.euler(HumanoidBone::RightUpperArm, 0.0, 0.0, -0.3 * w);
        }
        GestureKind::Sad => {
            out.euler(HumanoidBone::Chest, 0.28 * w, 0.0, 0.0);
            out.euler(HumanoidBone::Head, 0.25 * w, 0.0, 0.08 * (PI * s).sin() * w);
            out.euler(HumanoidBone::LeftUpperArm, 0.0, 0.0, -0.12 * w);
            out.euler(HumanoidBone::RightUpperArm, 0.0, 0.0, 0.12 * w);
        }
        GestureKind::Angry => {
            out.euler(HumanoidBone::Chest, 0.12 * w, 0.0, 0.0);
            let shake = 0.18 * (PI * 6.0 * s).sin() * (1.0 - p);
            out.euler(HumanoidBone::Head, 0.1 * w, shake * w, 0.0);
            out.euler(HumanoidBone::LeftUpperArm, 0.0, 0.0, 0.25 * w);
            out.euler(HumanoidBone::RightUpperArm, 0.0, 0.0, -0.25 * w);
            out.euler(HumanoidBone::LeftLowerArm, 0.0, -0.5 * w, 0.0);
            out.euler(HumanoidBone::RightLowerArm, 0.0, 0.5 * w, 0.0);
        }
        GestureKind::Surprise => {
            out.euler(HumanoidBone::Chest, -0.12 * w, 0.0, 0.0);
            out.euler(HumanoidBone::Head, -0.2 * w, 0.0, 0.0);
            out.euler(HumanoidBone::LeftUpperArm, -0.2 * w, 0.0, 0.35 * w);
            out.euler(HumanoidBone::RightUpperArm, -0.2 * w, 0.0, -0.35 * w);
        }
        GestureKind::Shy => {
            out.euler(HumanoidBone::Neck, 0.06 * w, 0.0, 0.12 * w);
            out.euler(HumanoidBone::Head, 0.15 * w, 0.0, 0.25 * w);
            out.euler(HumanoidBone::LeftUpperArm, 0.25 * w, 0.0, -0.1 * w);
            out.euler(HumanoidBone::RightUpperArm, 0.25 * w, 0.0, 0.1 * w);
        }
        GestureKind::Think => {
            out.euler(HumanoidBone::Neck, 0.0, 0.0, 0.1 * w);
            out.euler(HumanoidBone::Head, -0.05 * w, 0.1 * w, 0.2 * w);
            out.euler(HumanoidBone::RightUpperArm, -0.6 * w, 0.0, -0.3 * w);
            out.euler(HumanoidBone::RightLowerArm, 0.0, 0.0, -1.1 * w);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skeleton::Skeleton;
    use bevy::prelude::*;
    use common::BodyRegion;

    #[test]
    fn envelope_is_zero_at_both_ends_and_bounded() {
        let settings = GestureSettings::default();
        for duration in [0.1_f32, 0.4, 1.0, 3.7, 10.0] {
            assert_eq!(envelope(0.0, duration, settings.attack_fraction, settings.release_fraction), 0.0);
            assert_eq!(envelope(duration, duration, settings.attack_fraction, settings.release_fraction), 0.0);
            for step in 0..=100 {
                let elapsed = duration * step as f32 / 100.0;
                let value = envelope(elapsed, duration, settings.attack_fraction, settings.release_fraction);
                assert!((0.0..=1.0).contains(&value));
            }
        }
        assert_eq!(envelope(0.5, 1.0, 0.22, 0.30), 1.0);
    }

    #[test]
    fn overlapping_fractions_are_rescaled() {
        let value = envelope(0.5, 1.0, 0.8, 0.8);
        assert!(value > 0.0 && value <= 1.0);
    }

    #[test]
    fn gesture_returns_to_none_after_duration() {
        let settings = GestureSettings::default();
        let mut gestures = GestureMachine::default();
        gestures.start(GestureKind::Wave, 0.5, 1.0, &settings);

        let mut ended = None;
        for _ in 0..40 {
            if let Some(kind) = gestures.advance(1.0 / 60.0) {
                ended = Some(kind);
            }
        }
        assert_eq!(ended, Some(GestureKind::Wave));
        assert_eq!(gestures.kind(), None);
        assert_eq!(gestures.weight(&settings), 0.0);
    }

    #[test]
    fn start_preempts_and_clamps() {
        let settings = GestureSettings::default();
        let mut gestures = GestureMachine::default();
        gestures.start(GestureKind::Happy, 1.0, 1.0, &settings);
        gestures.advance(0.05);
        gestures.start(GestureKind::Sad, f32::NAN, 9.0, &settings);

        let active = gestures.active().expect("sad active");
        assert_eq!(active.kind, GestureKind::Sad);
        assert_eq!(active.elapsed, 0.0);
        assert_eq!(active.duration, settings.default_duration);
        assert_eq!(active.intensity, 1.25);

        gestures.advance(0.2);
        assert_eq!(gestures.weight_of(GestureKind::Happy, &settings), 0.0);
        assert!(gestures.weight_of(GestureKind::Sad, &settings) > 0.0);
    }

    #[test]
    fn blocked_regions_are_not_written() {
        let settings = GestureSettings::default();
        let skeleton = Skeleton::full_humanoid();
        let mut gestures = GestureMachine::default();
        gestures.start(GestureKind::Wave, 1.0, 1.0, &settings);
        gestures.advance(0.5);

        let mut pose = Pose::rest(&skeleton);
        let blocked = BodyRegion::RightArm.bit();
        assert!(gestures.apply(&mut pose, blocked, &settings));
        assert_eq!(pose.get(HumanoidBone::RightUpperArm), Some(Quat::IDENTITY));
        assert_ne!(pose.get(HumanoidBone::Head), Some(Quat::IDENTITY));

        let mut pose = Pose::rest(&skeleton);
        let everything = BodyRegion::ALL.iter().fold(0, |mask, region| mask | region.bit());
        assert!(!gestures.apply(&mut pose, everything, &settings));
    }
}
