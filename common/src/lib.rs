//! Avatar vocabulary shared by the engine and the demo client.
//!
//! This crate names the humanoid bones, facial expression roles, mouth-shape
//! buckets, motion-clip keys and chat reaction kinds. It carries no behavior
//! beyond lookups, so both the engine and any rendering front-end can agree on
//! the same identifiers without pulling in each other's dependencies.
//!
//! String identifiers follow the VRM humanoid naming (`leftUpperArm`, `aa`,
//! `blink`, ...), which is also what motion-clip files use for bone tracks.

/// A bone of the humanoid rig.
///
/// Discriminants are dense so callers can index fixed-size arrays with
/// [`HumanoidBone::index`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum HumanoidBone {
    // ==================== Torso ====================
    Hips = 0,
    Spine = 1,
    Chest = 2,
    Neck = 3,
    Head = 4,

    // ==================== Arms ====================
    LeftUpperArm = 5,
    LeftLowerArm = 6,
    LeftHand = 7,
    RightUpperArm = 8,
    RightLowerArm = 9,
    RightHand = 10,

    // ==================== Legs ====================
    LeftUpperLeg = 11,
    LeftLowerLeg = 12,
    LeftFoot = 13,
    LeftToes = 14,
    RightUpperLeg = 15,
    RightLowerLeg = 16,
    RightFoot = 17,
    RightToes = 18,
}

impl HumanoidBone {
    pub const COUNT: usize = 19;

    pub const ALL: [HumanoidBone; Self::COUNT] = [
        HumanoidBone::Hips,
        HumanoidBone::Spine,
        HumanoidBone::Chest,
        HumanoidBone::Neck,
        HumanoidBone::Head,
        HumanoidBone::LeftUpperArm,
        HumanoidBone::LeftLowerArm,
        HumanoidBone::LeftHand,
        HumanoidBone::RightUpperArm,
        HumanoidBone::RightLowerArm,
        HumanoidBone::RightHand,
        HumanoidBone::LeftUpperLeg,
        HumanoidBone::LeftLowerLeg,
        HumanoidBone::LeftFoot,
        HumanoidBone::LeftToes,
        HumanoidBone::RightUpperLeg,
        HumanoidBone::RightLowerLeg,
        HumanoidBone::RightFoot,
        HumanoidBone::RightToes,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// VRM humanoid identifier, used by motion-clip tracks.
    pub fn id(self) -> &'static str {
        match self {
            HumanoidBone::Hips => "hips",
            HumanoidBone::Spine => "spine",
            HumanoidBone::Chest => "chest",
            HumanoidBone::Neck => "neck",
            HumanoidBone::Head => "head",
            HumanoidBone::LeftUpperArm => "leftUpperArm",
            HumanoidBone::LeftLowerArm => "leftLowerArm",
            HumanoidBone::LeftHand => "leftHand",
            HumanoidBone::RightUpperArm => "rightUpperArm",
            HumanoidBone::RightLowerArm => "rightLowerArm",
            HumanoidBone::RightHand => "rightHand",
            HumanoidBone::LeftUpperLeg => "leftUpperLeg",
            HumanoidBone::LeftLowerLeg => "leftLowerLeg",
            HumanoidBone::LeftFoot => "leftFoot",
            HumanoidBone::LeftToes => "leftToes",
            HumanoidBone::RightUpperLeg => "rightUpperLeg",
            HumanoidBone::RightLowerLeg => "rightLowerLeg",
            HumanoidBone::RightFoot => "rightFoot",
            HumanoidBone::RightToes => "rightToes",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|bone| bone.id() == id)
    }

    pub fn region(self) -> BodyRegion {
        match self {
            HumanoidBone::Hips | HumanoidBone::Spine | HumanoidBone::Chest => BodyRegion::Torso,
            HumanoidBone::Neck | HumanoidBone::Head => BodyRegion::Head,
            HumanoidBone::LeftUpperArm | HumanoidBone::LeftLowerArm | HumanoidBone::LeftHand => {
                BodyRegion::LeftArm
            }
            HumanoidBone::RightUpperArm
            | HumanoidBone::RightLowerArm
            | HumanoidBone::RightHand => BodyRegion::RightArm,
            _ => BodyRegion::Legs,
        }
    }
}

/// Coarse body partition used to decide which layer owns a bone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum BodyRegion {
    Torso = 0,
    Head = 1,
    LeftArm = 2,
    RightArm = 3,
    Legs = 4,
}

impl BodyRegion {
    pub const ALL: [BodyRegion; 5] = [
        BodyRegion::Torso,
        BodyRegion::Head,
        BodyRegion::LeftArm,
        BodyRegion::RightArm,
        BodyRegion::Legs,
    ];

    pub fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

/// Abstract facial control. Concrete models expose some subset of these
/// under their own channel names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ExpressionRole {
    Blink = 0,
    Happy = 1,
    Sad = 2,
    Angry = 3,
    Surprised = 4,
    Relaxed = 5,
    Blush = 6,
    Aa = 7,
    Ih = 8,
    Ou = 9,
    Ee = 10,
    Oh = 11,
}

impl ExpressionRole {
    pub const COUNT: usize = 12;

    pub const ALL: [ExpressionRole; Self::COUNT] = [
        ExpressionRole::Blink,
        ExpressionRole::Happy,
        ExpressionRole::Sad,
        ExpressionRole::Angry,
        ExpressionRole::Surprised,
        ExpressionRole::Relaxed,
        ExpressionRole::Blush,
        ExpressionRole::Aa,
        ExpressionRole::Ih,
        ExpressionRole::Ou,
        ExpressionRole::Ee,
        ExpressionRole::Oh,
    ];

    pub const MOUTH: [ExpressionRole; 5] = [
        ExpressionRole::Aa,
        ExpressionRole::Ih,
        ExpressionRole::Ou,
        ExpressionRole::Ee,
        ExpressionRole::Oh,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn id(self) -> &'static str {
        match self {
            ExpressionRole::Blink => "blink",
            ExpressionRole::Happy => "happy",
            ExpressionRole::Sad => "sad",
            ExpressionRole::Angry => "angry",
            ExpressionRole::Surprised => "surprised",
            ExpressionRole::Relaxed => "relaxed",
            ExpressionRole::Blush => "blush",
            ExpressionRole::Aa => "aa",
            ExpressionRole::Ih => "ih",
            ExpressionRole::Ou => "ou",
            ExpressionRole::Ee => "ee",
            ExpressionRole::Oh => "oh",
        }
    }

    pub fn is_mouth(self) -> bool {
        Self::MOUTH.contains(&self)
    }
}

/// Mouth-shape bucket for text-driven lip sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Viseme {
    Aa,
    Ih,
    Ou,
    Ee,
    Oh,
}

impl Viseme {
    pub const ALL: [Viseme; 5] = [Viseme::Aa, Viseme::Ih, Viseme::Ou, Viseme::Ee, Viseme::Oh];

    pub fn role(self) -> ExpressionRole {
        match self {
            Viseme::Aa => ExpressionRole::Aa,
            Viseme::Ih => ExpressionRole::Ih,
            Viseme::Ou => ExpressionRole::Ou,
            Viseme::Ee => ExpressionRole::Ee,
            Viseme::Oh => ExpressionRole::Oh,
        }
    }
}

/// Short procedural emotional overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GestureKind {
    Wave,
    Happy,
    Sad,
    Angry,
    Surprise,
    Shy,
    Think,
}

impl GestureKind {
    pub const ALL: [GestureKind; 7] = [
        GestureKind::Wave,
        GestureKind::Happy,
        GestureKind::Sad,
        GestureKind::Angry,
        GestureKind::Surprise,
        GestureKind::Shy,
        GestureKind::Think,
    ];

    pub fn name(self) -> &'static str {
        match self {
            GestureKind::Wave => "wave",
            GestureKind::Happy => "happy",
            GestureKind::Sad => "sad",
            GestureKind::Angry => "angry",
            GestureKind::Surprise => "surprise",
            GestureKind::Shy => "shy",
            GestureKind::Think => "think",
        }
    }
}

/// Logical motion-clip keys of the default clip catalogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MotionKey {
    Idle,
    Greeting,
    Happy,
    Clap,
    Sad,
    Surprised,
    Thinking,
    Sleepy,
    Jump,
    Look,
    Angry,
}

impl MotionKey {
    pub const ALL: [MotionKey; 11] = [
        MotionKey::Idle,
        MotionKey::Greeting,
        MotionKey::Happy,
        MotionKey::Clap,
        MotionKey::Sad,
        MotionKey::Surprised,
        MotionKey::Thinking,
        MotionKey::Sleepy,
        MotionKey::Jump,
        MotionKey::Look,
        MotionKey::Angry,
    ];

    pub fn key(self) -> &'static str {
        match self {
            MotionKey::Idle => "idle",
            MotionKey::Greeting => "greeting",
            MotionKey::Happy => "happy",
            MotionKey::Clap => "clap",
            MotionKey::Sad => "sad",
            MotionKey::Surprised => "surprised",
            MotionKey::Thinking => "thinking",
            MotionKey::Sleepy => "sleepy",
            MotionKey::Jump => "jump",
            MotionKey::Look => "look",
            MotionKey::Angry => "angry",
        }
    }

    /// Default asset file backing the key.
    pub fn default_file(self) -> &'static str {
        match self {
            MotionKey::Idle => "relax.motion.json",
            MotionKey::Greeting => "goodbye.motion.json",
            MotionKey::Happy => "blush.motion.json",
            MotionKey::Clap => "clapping.motion.json",
            MotionKey::Sad => "sad.motion.json",
            MotionKey::Surprised => "surprised.motion.json",
            MotionKey::Thinking => "thinking.motion.json",
            MotionKey::Sleepy => "sleepy.motion.json",
            MotionKey::Jump => "jump.motion.json",
            MotionKey::Look => "look_around.motion.json",
            MotionKey::Angry => "angry.motion.json",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|motion| motion.key() == key)
    }
}

/// Classified reaction handed to the engine by the chat layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReactionKind {
    Greeting,
    Happy,
    Sad,
    Angry,
    Surprise,
    Shy,
    Think,
    Sleepy,
    Neutral,
    /// Direct motion-clip selector, bypassing the emotion table.
    Clip(MotionKey),
}

impl ReactionKind {
    pub fn name(self) -> &'static str {
        match self {
            ReactionKind::Greeting => "greeting",
            ReactionKind::Happy => "happy",
            ReactionKind::Sad => "sad",
            ReactionKind::Angry => "angry",
            ReactionKind::Surprise => "surprise",
            ReactionKind::Shy => "shy",
            ReactionKind::Think => "think",
            ReactionKind::Sleepy => "sleepy",
            ReactionKind::Neutral => "neutral",
            ReactionKind::Clip(_) => "clip",
        }
    }
}
