//! Procedural sway and breathing used when nothing else drives the body.

use crate::skeleton::Pose;
use common::HumanoidBone;

#[derive(Debug, Clone, Copy, Default)]
pub struct IdleMotion {
    time: f32,
}

impl IdleMotion {
    pub fn advance(&mut self, dt: f32) {
        self.time += dt;
    }

    pub fn time(&self) -> f32 {
        self.time
    }

    /// Adds sway and breathing scaled by `amount` (0..1) to unblocked bones.
    pub fn apply(&self, pose: &mut Pose, amount: f32, blocked_regions: u8) {
        if amount <= 0.0 {
            return;
        }
        let sway = (self.time * 1.2).sin() * 0.06 * amount;
        let breathe = (self.time * 2.0).sin() * 0.04 * amount;
        let nod = (self.time * 1.6).sin() * 0.03 * amount;

        let offsets = [
            (HumanoidBone::Spine, breathe * 0.25, sway * 0.35),
            (HumanoidBone::Chest, breathe * 0.35, sway * 0.5),
            (HumanoidBone::Head, nod, sway * 0.8),
        ];
        for (bone, x, y) in offsets {
            if bone.region().bit() & blocked_regions == 0 {
                pose.add_euler(bone, x, y, 0.0);
            }
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
    fn idle_moves_torso_and_head() {
        let skeleton = Skeleton::full_humanoid();
        let mut idle = IdleMotion::default();
        idle.advance(1.0);

        let mut pose = Pose::rest(&skeleton);
        idle.apply(&mut pose, 1.0, 0);
        assert_ne!(pose.get(HumanoidBone::Chest), Some(Quat::IDENTITY));
        assert_ne!(pose.get(HumanoidBone::Head), Some(Quat::IDENTITY));
        assert_eq!(pose.get(HumanoidBone::LeftHand), Some(Quat::IDENTITY));
    }

    #[test]
    fn blocked_head_is_left_alone() {
        let skeleton = Skeleton::full_humanoid();
        let mut idle = IdleMotion::default();
        idle.advance(0.7);

        let mut pose = Pose::rest(&skeleton);
        idle.apply(&mut pose, 1.0, BodyRegion::Head.bit());
        assert_eq!(pose.get(HumanoidBone::Head), Some(Quat::IDENTITY));
    }
}
