use bevy::prelude::*;

/// Fixed per-frame order of the avatar engine. Configured as a chain, so
/// each stage sees the results of every earlier one in the same frame.
#[derive(SystemSet, Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum AvatarPipeline {
    /// Frame clock, then every queued inbound message.
    Events,
    Interaction,
    Gaze,
    Gesture,
    Mixer,
    /// Decides which source owns each bone and composes the pose.
    Resolve,
    Blink,
    LipSync,
    /// Renderer hand-off. The engine registers nothing here itself.
    Submit,
}
