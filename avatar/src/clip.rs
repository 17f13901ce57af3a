//! Motion clip data: the JSON document format and the sampled in-memory clip.

use crate::error::{AvatarError, Result};
use bevy::prelude::*;
use common::HumanoidBone;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClipDocument {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub duration: f32,
    #[serde(default)]
    pub tracks: Vec<TrackDocument>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackDocument {
    /// Humanoid bone id (`leftUpperArm`, `head`, ...).
    pub bone: String,
    pub times: Vec<f32>,
    /// `[x, y, z, w]` rotations relative to the bone's rest orientation.
    pub rotations: Vec<[f32; 4]>,
}

#[derive(Debug, Clone, PartialEq)]
struct BoneTrack {
    bone: HumanoidBone,
    times: Vec<f32>,
    rotations: Vec<Quat>,
}

impl BoneTrack {
    fn sample(&self, time: f32) -> Quat {
        let last = self.times.len() - 1;
        if time <= self.times[0] {
            return self.rotations[0];
        }
        if time >= self.times[last] {
            return self.rotations[last];
        }

        let next = self.times.partition_point(|t| *t <= time);
        let prev = next - 1;
        let span = self.times[next] - self.times[prev];
        if span <= f32::EPSILON {
            return self.rotations[next];
        }
        let t = (time - self.times[prev]) / span;
        self.rotations[prev].slerp(self.rotations[next], t)
    }
}

/// Immutable, time-parameterized skeletal animation.
#[derive(Debug, Clone, PartialEq)]
pub struct MotionClip {
    name: String,
    duration: f32,
    tracks: Vec<BoneTrack>,
    regions: u8,
}

impl MotionClip {
    pub fn from_json(key: &str, bytes: &[u8]) -> Result<Self> {
        let document: ClipDocument = serde_json::from_slice(bytes)?;
        Self::from_document(key, document)
    }

    pub fn from_document(key: &str, document: ClipDocument) -> Result<Self> {
        let name = if document.name.is_empty() {
            key.to_string()
        } else {
            document.name
        };

        let mut tracks = Vec::with_capacity(document.tracks.len());
        for track in document.tracks {
            let Some(bone) = HumanoidBone::from_id(&track.bone) else {
                debug!("Clip '{}': skipping track for unknown bone '{}'", name, track.bone);
                continue;
            };
            if let Some(track) = build_track(bone, track.times, track.rotations) {
                tracks.push(track);
            } else {
                debug!("Clip '{}': skipping malformed track for '{}'", name, bone.id());
            }
        }

        let track_end = tracks
            .iter()
            .filter_map(|track| track.times.last().copied())
            .fold(0.0_f32, f32::max);
        let duration = if document.duration.is_finite() && document.duration > 0.0 {
            document.duration
        } else {
            track_end
        };

        if tracks.is_empty() || duration <= 0.0 {
            return Err(AvatarError::EmptyClip(name));
        }

        let regions = tracks
            .iter()
            .fold(0u8, |mask, track| mask | track.bone.region().bit());

        Ok(Self {
            name,
            duration,
            tracks,
            regions,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn duration(&self) -> f32 {
        self.duration
    }

    /// Body regions animated by at least one track, as a [`common::BodyRegion::bit`] mask.
    pub fn regions(&self) -> u8 {
        self.regions
    }

    pub fn animates(&self, bone: HumanoidBone) -> bool {
        self.tracks.iter().any(|track| track.bone == bone)
    }

    /// Rotation offsets at `time`, clamped to the clip range.
    pub fn sample(&self, time: f32) -> impl Iterator<Item = (HumanoidBone, Quat)> + '_ {
        let time = if time.is_finite() {
            time.clamp(0.0, self.duration)
        } else {
            0.0
        };
        self.tracks
            .iter()
            .map(move |track| (track.bone, track.sample(time)))
    }
}

fn build_track(bone: HumanoidBone, times: Vec<f32>, rotations: Vec<[f32; 4]>) -> Option<BoneTrack> {
    let len = times.len().min(rotations.len());
    if len == 0 {
        return None;
    }
    let times = times[..len].to_vec();
    if times.iter().any(|t| !t.is_finite()) || times.windows(2).any(|pair| pair[1] < pair[0]) {
        return None;
    }

    let rotations = rotations[..len]
        .iter()
        .map(|[x, y, z, w]| {
            let q = Quat::from_xyzw(*x, *y, *z, *w);
            if q.length_squared() <= f32::EPSILON || !q.is_finite() {
                Quat::IDENTITY
            } else {
                q.normalize()
            }
        })
        .collect();

    Some(BoneTrack {
        bone,
        times,
        rotations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::BodyRegion;
    use std::f32::consts::FRAC_PI_2;

    fn wave_json() -> &'static str {
        r#"{
            "name": "wave",
            "duration": 1.0,
            "tracks": [
                { "bone": "rightUpperArm", "times": [0.0, 1.0],
                  "rotations": [[0, 0, 0, 1], [0, 0, 0.70710677, 0.70710677]] },
                { "bone": "tail", "times": [0.0], "rotations": [[0, 0, 0, 1]] }
            ]
        }"#
    }

    #[test]
    fn parses_and_skips_unknown_bones() {
        let clip = MotionClip::from_json("greeting", wave_json().as_bytes()).expect("valid clip");
        assert_eq!(clip.name(), "wave");
        assert_eq!(clip.duration(), 1.0);
        assert!(clip.animates(HumanoidBone::RightUpperArm));
        assert_eq!(clip.regions(), BodyRegion::RightArm.bit());
    }

    #[test]
    fn samples_with_slerp_and_clamps_time() {
        let clip = MotionClip::from_json("greeting", wave_json().as_bytes()).expect("valid clip");
        let (_, mid) = clip.sample(0.5).next().expect("one track");
        assert!((mid.angle_between(Quat::IDENTITY) - FRAC_PI_2 * 0.5).abs() < 1e-3);

        let (_, late) = clip.sample(42.0).next().expect("one track");
        assert!((late.angle_between(Quat::IDENTITY) - FRAC_PI_2).abs() < 1e-3);
    }

    #[test]
    fn empty_clip_is_rejected() {
        let result = MotionClip::from_json("idle", br#"{ "name": "idle", "duration": 2.0, "tracks": [] }"#);
        assert!(matches!(result, Err(AvatarError::EmptyClip(name)) if name == "idle"));
    }

    #[test]
    fn broken_json_reports_parse_error() {
        let result = MotionClip::from_json("idle", b"{ nope");
        assert!(matches!(result, Err(AvatarError::ClipParse(_))));
    }

    #[test]
    fn duration_falls_back_to_last_key() {
        let json = r#"{ "tracks": [ { "bone": "head", "times": [0.0, 0.4], "rotations": [[0,0,0,1],[0,0,0,1]] } ] }"#;
        let clip = MotionClip::from_json("look", json.as_bytes()).expect("valid clip");
        assert_eq!(clip.name(), "look");
        assert!((clip.duration() - 0.4).abs() < 1e-6);
    }
}
