//! Humanoid bone binding and the per-frame pose buffer.
//!
//! A loaded model exposes arbitrary node names. [`resolve_bones`] maps them
//! onto [`HumanoidBone`] slots once, using a prioritized name table, and the
//! result is kept as plain data for the rest of the session. Bones the model
//! lacks stay `None` and every write to them is a silent no-op.

use bevy::prelude::*;
use common::HumanoidBone;

/// Candidate node names per bone, normalized (lowercase ASCII alphanumerics),
/// highest priority first.
fn candidates(bone: HumanoidBone) -> &'static [&'static str] {
    match bone {
        HumanoidBone::Hips => &["hips", "jbipchips", "mixamorighips", "pelvis", "bip01pelvis"],
        HumanoidBone::Spine => &["spine", "jbipcspine", "mixamorigspine", "bip01spine"],
        HumanoidBone::Chest => &[
            "chest",
            "jbipcchest",
            "upperchest",
            "jbipcupperchest",
            "mixamorigspine1",
            "spine1",
            "bip01spine1",
        ],
        HumanoidBone::Neck => &["neck", "jbipcneck", "mixamorigneck", "bip01neck"],
        HumanoidBone::Head => &["head", "jbipchead", "mixamorighead", "bip01head"],
        HumanoidBone::LeftUpperArm => &[
            "leftupperarm",
            "jbiplupperarm",
            "mixamorigleftarm",
            "upperarml",
            "leftarm",
            "bip01lupperarm",
        ],
        HumanoidBone::LeftLowerArm => &[
            "leftlowerarm",
            "jbipllowerarm",
            "mixamorigleftforearm",
            "lowerarml",
            "leftforearm",
            "bip01lforearm",
        ],
        HumanoidBone::LeftHand => &["lefthand", "jbiplhand", "mixamoriglefthand", "handl", "bip01lhand"],
        HumanoidBone::RightUpperArm => &[
            "rightupperarm",
            "jbiprupperarm",
            "mixamorigrightarm",
            "upperarmr",
            "rightarm",
            "bip01rupperarm",
        ],
        HumanoidBone::RightLowerArm => &[
            "rightlowerarm",
            "jbiprlowerarm",
            "mixamorigrightforearm",
            "lowerarmr",
            "rightforearm",
            "bip01rforearm",
        ],
        HumanoidBone::RightHand => &[
            "righthand",
            "jbiprhand",
            "mixamorigrighthand",
            "handr",
            "bip01rhand",
        ],
        HumanoidBone::LeftUpperLeg => &[
            "leftupperleg",
            "jbiplupperleg",
            "mixamorigleftupleg",
            "upperlegl",
            "thighl",
            "bip01lthigh",
        ],
        HumanoidBone::LeftLowerLeg => &[
            "leftlowerleg",
            "jbipllowerleg",
            "mixamorigleftleg",
            "lowerlegl",
            "shinl",
            "bip01lcalf",
        ],
        HumanoidBone::LeftFoot => &["leftfoot", "jbiplfoot", "mixamorigleftfoot", "footl", "bip01lfoot"],
        HumanoidBone::LeftToes => &[
            "lefttoes",
            "jbipltoebase",
            "mixamoriglefttoebase",
            "toesl",
            "bip01ltoe0",
        ],
        HumanoidBone::RightUpperLeg => &[
            "rightupperleg",
            "jbiprupperleg",
            "mixamorigrightupleg",
            "upperlegr",
            "thighr",
            "bip01rthigh",
        ],
        HumanoidBone::RightLowerLeg => &[
            "rightlowerleg",
            "jbiprlowerleg",
            "mixamorigrightleg",
            "lowerlegr",
            "shinr",
            "bip01rcalf",
        ],
        HumanoidBone::RightFoot => &[
            "rightfoot",
            "jbiprfoot",
            "mixamorigrightfoot",
            "footr",
            "bip01rfoot",
        ],
        HumanoidBone::RightToes => &[
            "righttoes",
            "jbiprtoebase",
            "mixamorigrighttoebase",
            "toesr",
            "bip01rtoe0",
        ],
    }
}

/// Lowercases and strips everything but ASCII alphanumerics.
pub fn normalize_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Best bone for a single node name, with its priority (lower wins).
pub fn match_bone_name(name: &str) -> Option<(HumanoidBone, usize)> {
    let normalized = normalize_name(name);
    if normalized.is_empty() {
        return None;
    }

    HumanoidBone::ALL.into_iter().find_map(|bone| {
        candidates(bone)
            .iter()
            .position(|candidate| *candidate == normalized)
            .map(|priority| (bone, priority))
    })
}

/// Resolved node handle per humanoid bone.
#[derive(Debug, Clone, PartialEq)]
pub struct BoneMap<H> {
    slots: [Option<H>; HumanoidBone::COUNT],
}

impl<H> Default for BoneMap<H> {
    fn default() -> Self {
        Self {
            slots: std::array::from_fn(|_| None),
        }
    }
}

impl<H> BoneMap<H> {
    pub fn get(&self, bone: HumanoidBone) -> Option<&H> {
        self.slots[bone.index()].as_ref()
    }

    pub fn iter(&self) -> impl Iterator<Item = (HumanoidBone, &H)> {
        HumanoidBone::ALL
            .into_iter()
            .filter_map(|bone| self.get(bone).map(|handle| (bone, handle)))
    }

    pub fn missing(&self) -> impl Iterator<Item = HumanoidBone> + '_ {
        HumanoidBone::ALL
            .into_iter()
            .filter(|bone| self.slots[bone.index()].is_none())
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Maps arbitrary `(node name, handle)` pairs onto humanoid bones.
///
/// When several nodes match the same bone, the one matching the
/// higher-priority candidate wins; ties keep the first node seen.
pub fn resolve_bones<'a, H, I>(nodes: I) -> BoneMap<H>
where
    I: IntoIterator<Item = (&'a str, H)>,
{
    let mut map = BoneMap::default();
    let mut priorities = [usize::MAX; HumanoidBone::COUNT];

    for (name, handle) in nodes {
        let Some((bone, priority)) = match_bone_name(name) else {
            continue;
        };
        let slot = bone.index();
        if priority < priorities[slot] {
            priorities[slot] = priority;
            map.slots[slot] = Some(handle);
        }
    }

    map
}

/// Rest orientation of every bone the bound model has.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Skeleton {
    rest: [Option<Quat>; HumanoidBone::COUNT],
}

impl Skeleton {
    pub fn new() -> Self {
        Self::default()
    }

    /// A skeleton with every humanoid bone present at identity rest.
    pub fn full_humanoid() -> Self {
        Self {
            rest: [Some(Quat::IDENTITY); HumanoidBone::COUNT],
        }
    }

    pub fn from_rest<I>(bones: I) -> Self
    where
        I: IntoIterator<Item = (HumanoidBone, Quat)>,
    {
        let mut skeleton = Self::new();
        for (bone, rest) in bones {
            skeleton.insert(bone, rest);
        }
        skeleton
    }

    pub fn insert(&mut self, bone: HumanoidBone, rest: Quat) {
        self.rest[bone.index()] = Some(rest.normalize());
    }

    pub fn has(&self, bone: HumanoidBone) -> bool {
        self.rest[bone.index()].is_some()
    }

    pub fn rest(&self, bone: HumanoidBone) -> Option<Quat> {
        self.rest[bone.index()]
    }

    pub fn bones(&self) -> impl Iterator<Item = HumanoidBone> + '_ {
        HumanoidBone::ALL.into_iter().filter(|bone| self.has(*bone))
    }

    pub fn len(&self) -> usize {
        self.rest.iter().filter(|rest| rest.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Local bone orientations for one frame.
///
/// Only bones present in the skeleton the pose was created from hold a value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Pose {
    local: [Option<Quat>; HumanoidBone::COUNT],
}

impl Pose {
    pub fn rest(skeleton: &Skeleton) -> Self {
        Self {
            local: skeleton.rest,
        }
    }

    pub fn get(&self, bone: HumanoidBone) -> Option<Quat> {
        self.local[bone.index()]
    }

    /// Overwrites a bone. Returns `false` when the bone is absent.
    pub fn set(&mut self, bone: HumanoidBone, rotation: Quat) -> bool {
        match &mut self.local[bone.index()] {
            Some(slot) => {
                *slot = rotation;
                true
            }
            None => false,
        }
    }

    pub fn rotate_local(&mut self, bone: HumanoidBone, delta: Quat) -> bool {
        match &mut self.local[bone.index()] {
            Some(slot) => {
                *slot = (*slot * delta).normalize();
                true
            }
            None => false,
        }
    }

    /// Applies an XYZ euler offset (radians) on top of the current rotation.
    pub fn add_euler(&mut self, bone: HumanoidBone, x: f32, y: f32, z: f32) -> bool {
        self.rotate_local(bone, Quat::from_euler(EulerRot::XYZ, x, y, z))
    }

    pub fn iter(&self) -> impl Iterator<Item = (HumanoidBone, Quat)> + '_ {
        HumanoidBone::ALL
            .into_iter()
            .filter_map(|bone| self.get(bone).map(|rotation| (bone, rotation)))
    }
}
