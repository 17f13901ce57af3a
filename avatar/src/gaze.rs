//! Look-at distribution over chest, neck and head.

use crate::interaction::RootTransform;
use crate::settings::GazeSettings;
use crate::skeleton::Pose;
use crate::smoothing::{CriticalSpring, damp};
use bevy::prelude::*;
use common::HumanoidBone;

/// Viewer (camera) placement, refreshed by the renderer every frame.
#[derive(Resource, Debug, Clone, Copy, PartialEq)]
pub struct Viewer {
    pub position: Vec3,
    /// Unit direction the viewer is looking along.
    pub forward: Vec3,
}

impl Default for Viewer {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 1.4, 2.6),
            forward: Vec3::NEG_Z,
        }
    }
}

/// Local yaw/pitch (radians) from `head` toward the viewer, in the actor's
/// frame, clamped to the configured range.
pub fn look_angles(root: &RootTransform, head: Vec3, viewer: &Viewer, settings: &GazeSettings) -> (f32, f32) {
    let Some(to_viewer) = (viewer.position - head).try_normalize() else {
        return (0.0, 0.0);
    };
    let blend = settings.viewer_facing_blend.clamp(0.0, 1.0);
    let facing = (-viewer.forward).try_normalize().unwrap_or(to_viewer);
    let direction = to_viewer.lerp(facing, blend).try_normalize().unwrap_or(to_viewer);

    let local = root.rotation().inverse() * direction;
    let yaw = local.x.atan2(local.z);
    let pitch = local.y.clamp(-1.0, 1.0).asin();

    (
        yaw.clamp(-settings.max_yaw, settings.max_yaw),
        pitch.clamp(-settings.max_pitch, settings.max_pitch),
    )
}

#[derive(Debug, Clone, Copy, Default)]
struct BoneGaze {
    yaw: CriticalSpring,
    pitch: CriticalSpring,
}

#[derive(Debug, Clone, Default)]
pub struct GazeController {
    chest: BoneGaze,
    neck: BoneGaze,
    head: BoneGaze,
    strength: f32,
}

impl GazeController {
    pub fn strength(&self) -> f32 {
        self.strength
    }

    pub fn update(
        &mut self,
        dt: f32,
        root: &RootTransform,
        head_height: f32,
        viewer: &Viewer,
        strength_target: f32,
        settings: &GazeSettings,
    ) {
        let head = root.position + Vec3::Y * head_height;
        let (yaw, pitch) = look_angles(root, head, viewer, settings);

        let target = strength_target.clamp(0.0, 1.0);
        self.strength = damp(self.strength, target, settings.strength_response, dt).clamp(0.0, 1.0);

        let bones = [
            (&mut self.chest, settings.chest_share, settings.chest_response),
            (&mut self.neck, settings.neck_share, settings.neck_response),
            (&mut self.head, settings.head_share, settings.head_response),
        ];
        for (bone, share, response) in bones {
            bone.yaw.update(yaw * share * self.strength, response, dt);
            bone.pitch.update(pitch * share * self.strength, response, dt);
        }
    }

    /// Smoothed `(bone, yaw, pitch)` offsets.
    pub fn offsets(&self) -> [(HumanoidBone, f32, f32); 3] {
        [
            (HumanoidBone::Chest, self.chest.yaw.value, self.chest.pitch.value),
            (HumanoidBone::Neck, self.neck.yaw.value, self.neck.pitch.value),
            (HumanoidBone::Head, self.head.yaw.value, self.head.pitch.value),
        ]
    }

    pub fn apply(&self, pose: &mut Pose, blocked_regions: u8) {
        for (bone, yaw, pitch) in self.offsets() {
            if bone.region().bit() & blocked_regions != 0 {
                continue;
            }
            pose.rotate_local(bone, Quat::from_rotation_y(yaw) * Quat::from_rotation_x(-pitch));
        }
    }
}
