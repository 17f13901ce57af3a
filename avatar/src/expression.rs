//! Facial expression roles and the capability table of the bound model.

use crate::skeleton::normalize_name;
use common::ExpressionRole;

/// Normalized channel names per role, highest priority first.
///
/// Names shorter than four characters must match exactly; longer ones may
/// also match as a suffix so prefixed exports (`Face.Fcl_MTH_A`) resolve.
fn channel_candidates(role: ExpressionRole) -> &'static [&'static str] {
    match role {
        ExpressionRole::Blink => &["blink", "fcleyeclose", "fclallclose", "eyeblink", "eyeclose", "blinkboth"],
        ExpressionRole::Happy => &["happy", "joy", "fclalljoy", "smile", "fclmthjoy"],
        ExpressionRole::Sad => &["sad", "sorrow", "fclallsorrow", "fclmthsorrow"],
        ExpressionRole::Angry => &["angry", "fclallangry", "fclmthangry", "anger"],
        ExpressionRole::Surprised => &["surprised", "fclallsurprised", "surprise", "fclmthsurprised"],
        ExpressionRole::Relaxed => &["relaxed", "fun", "fclallfun", "fclmthfun", "calm"],
        ExpressionRole::Blush => &["blush", "fclblush", "cheek", "shy"],
        ExpressionRole::Aa => &["aa", "a", "fclmtha", "vrcvaa", "moutha", "mtha"],
        ExpressionRole::Ih => &["ih", "i", "fclmthi", "vrcvih", "mouthi", "mthi"],
        ExpressionRole::Ou => &["ou", "u", "fclmthu", "vrcvou", "mouthu", "mthu"],
        ExpressionRole::Ee => &["ee", "e", "fclmthe", "vrcve", "mouthe", "mthe"],
        ExpressionRole::Oh => &["oh", "o", "fclmtho", "vrcvoh", "moutho", "mtho"],
    }
}

/// Abstract role to concrete channel name, resolved once at bind time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Capabilities {
    channels: [Option<String>; ExpressionRole::COUNT],
}

impl Capabilities {
    /// Detects which roles the model exposes from its channel names.
    pub fn resolve<'a, I>(names: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let available: Vec<(String, &str)> = names
            .into_iter()
            .map(|name| (normalize_name(name), name))
            .filter(|(normalized, _)| !normalized.is_empty())
            .collect();

        let mut capabilities = Self::default();
        for role in ExpressionRole::ALL {
            capabilities.channels[role.index()] = channel_candidates(role)
                .iter()
                .find_map(|candidate| {
                    available
                        .iter()
                        .find(|(normalized, _)| normalized == candidate)
                        .or_else(|| {
                            (candidate.len() >= 4)
                                .then(|| {
                                    available
                                        .iter()
                                        .find(|(normalized, _)| normalized.ends_with(candidate))
                                })
                                .flatten()
                        })
                })
                .map(|(_, original)| original.to_string());
        }
        capabilities
    }

    /// Every role bound to its own identifier.
    pub fn full() -> Self {
        Self {
            channels: ExpressionRole::ALL.map(|role| Some(role.id().to_string())),
        }
    }

    pub fn channel(&self, role: ExpressionRole) -> Option<&str> {
        self.channels[role.index()].as_deref()
    }

    pub fn has(&self, role: ExpressionRole) -> bool {
        self.channels[role.index()].is_some()
    }

    pub fn bound_roles(&self) -> impl Iterator<Item = ExpressionRole> + '_ {
        ExpressionRole::ALL.into_iter().filter(|role| self.has(*role))
    }

    pub fn missing_roles(&self) -> impl Iterator<Item = ExpressionRole> + '_ {
        ExpressionRole::ALL.into_iter().filter(|role| !self.has(*role))
    }

    /// Hands every bound channel's value to `sink`. Unbound roles are skipped.
    pub fn apply(&self, frame: &ExpressionFrame, mut sink: impl FnMut(&str, f32)) {
        for role in ExpressionRole::ALL {
            if let Some(channel) = self.channel(role) {
                sink(channel, frame.get(role));
            }
        }
    }
}

/// Expression weights for one frame, one slot per role, each in `[0, 1]`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ExpressionFrame {
    weights: [f32; ExpressionRole::COUNT],
}

impl ExpressionFrame {
    pub fn get(&self, role: ExpressionRole) -> f32 {
        self.weights[role.index()]
    }

    pub fn set(&mut self, role: ExpressionRole, value: f32) {
        self.weights[role.index()] = if value.is_finite() {
            value.clamp(0.0, 1.0)
        } else {
            0.0
        };
    }

    pub fn clear_mouth(&mut self) {
        for role in ExpressionRole::MOUTH {
            self.weights[role.index()] = 0.0;
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (ExpressionRole, f32)> + '_ {
        ExpressionRole::ALL
            .into_iter()
            .map(|role| (role, self.weights[role.index()]))
    }
}
