//! Wander / approach / respond navigation and the actor root it owns.

use crate::settings::InteractionSettings;
use crate::smoothing::damp;
use bevy::prelude::*;
use std::f32::consts::{PI, TAU};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InteractionMode {
    Wander {
        waypoint: usize,
        pause_left: f32,
    },
    Approach {
        target: Vec2,
        deadline: f32,
        respond_for: f32,
    },
    Respond {
        deadline: f32,
    },
}

impl InteractionMode {
    pub fn name(&self) -> &'static str {
        match self {
            InteractionMode::Wander { .. } => "wander",
            InteractionMode::Approach { .. } => "approach",
            InteractionMode::Respond { .. } => "respond",
        }
    }
}

/// World placement of the actor. `yaw` 0 faces +Z.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RootTransform {
    pub position: Vec3,
    pub yaw: f32,
}

impl RootTransform {
    pub fn floor(&self) -> Vec2 {
        Vec2::new(self.position.x, self.position.z)
    }

    pub fn forward(&self) -> Vec3 {
        Vec3::new(self.yaw.sin(), 0.0, self.yaw.cos())
    }

    pub fn rotation(&self) -> Quat {
        Quat::from_rotation_y(self.yaw)
    }
}

#[derive(Debug, Clone)]
pub struct InteractionState {
    mode: InteractionMode,
    attention_until: f32,
    clock: f32,
    bob_phase: f32,
    root: RootTransform,
}

fn sanitize_secs(seconds: f32) -> f32 {
    if seconds.is_finite() {
        seconds.clamp(0.0, 600.0)
    } else {
        0.0
    }
}

fn wrap_angle(angle: f32) -> f32 {
    (angle + PI).rem_euclid(TAU) - PI
}

fn yaw_towards(direction: Vec2) -> f32 {
    direction.x.atan2(direction.y)
}

impl InteractionState {
    pub fn new(settings: &InteractionSettings) -> Self {
        let home = Vec2::from(settings.home);
        Self {
            mode: InteractionMode::Wander {
                waypoint: 0,
                pause_left: settings.wander_pause_secs,
            },
            attention_until: 0.0,
            clock: 0.0,
            bob_phase: 0.0,
            root: RootTransform {
                position: Vec3::new(home.x, 0.0, home.y),
                yaw: 0.0,
            },
        }
    }

    pub fn mode(&self) -> InteractionMode {
        self.mode
    }

    pub fn root(&self) -> RootTransform {
        self.root
    }

    pub fn clock(&self) -> f32 {
        self.clock
    }

    pub fn attention_until(&self) -> f32 {
        self.attention_until
    }

    pub fn is_attentive(&self) -> bool {
        self.clock < self.attention_until
    }

    /// Extends the attention deadline. Never shortens it.
    pub fn request_attention(&mut self, seconds: f32) {
        let until = self.clock + sanitize_secs(seconds);
        self.attention_until = self.attention_until.max(until);
    }

    /// Walks toward a stand-off point in front of the viewer, then responds
    /// for `seconds`.
    pub fn start_approach_to_user(
        &mut self,
        seconds: f32,
        viewer: Vec3,
        settings: &InteractionSettings,
    ) {
        let respond_for = sanitize_secs(seconds).max(0.5);
        self.request_attention(respond_for + settings.approach_timeout_secs);

        let viewer_floor = Vec2::new(viewer.x, viewer.z);
        let away = self.root.floor() - viewer_floor;
        let direction = away.try_normalize().unwrap_or(Vec2::Y);
        let target = viewer_floor + direction * settings.approach_distance;
        let target = target.clamp(Vec2::from(settings.stage_min), Vec2::from(settings.stage_max));

        self.mode = InteractionMode::Approach {
            target,
            deadline: self.clock + settings.approach_timeout_secs.max(0.0),
            respond_for,
        };
    }

    /// Lengthens the respond hold so a playing clip can finish.
    pub fn extend_respond(&mut self, seconds: f32) {
        let seconds = sanitize_secs(seconds);
        match &mut self.mode {
            InteractionMode::Respond { deadline } => {
                *deadline = deadline.max(self.clock + seconds);
            }
            InteractionMode::Approach { respond_for, .. } => {
                *respond_for = respond_for.max(seconds);
            }
            InteractionMode::Wander { .. } => {}
        }
    }

    /// Steps the active mode. Returns the previous mode when it changed.
    pub fn advance(
        &mut self,
        dt: f32,
        viewer: Vec3,
        settings: &InteractionSettings,
    ) -> Option<InteractionMode> {
        self.clock += dt;
        let previous = self.mode;
        let viewer_floor = Vec2::new(viewer.x, viewer.z);

        match self.mode {
            InteractionMode::Wander {
                waypoint,
                pause_left,
            } => self.wander(dt, waypoint, pause_left, viewer_floor, settings),
            InteractionMode::Approach {
                target,
                deadline,
                respond_for,
            } => {
                let arrived = self.step_towards(target, settings.approach_speed, dt, settings);
                self.bob_phase += dt * settings.bob_frequency;
                self.root.position.y = settings.bob_height * self.bob_phase.sin().abs();
                if arrived || self.clock >= deadline {
                    self.mode = InteractionMode::Respond {
                        deadline: self.clock + respond_for,
                    };
                }
            }
            InteractionMode::Respond { deadline } => {
                self.settle_bob(dt);
                self.face(viewer_floor, dt, settings);
                if self.clock >= deadline {
                    self.mode = InteractionMode::Wander {
                        waypoint: self.nearest_waypoint(settings),
                        pause_left: settings.wander_pause_secs,
                    };
                }
            }
        }

        (previous.name() != self.mode.name()).then_some(previous)
    }

    fn wander(
        &mut self,
        dt: f32,
        waypoint: usize,
        pause_left: f32,
        viewer_floor: Vec2,
        settings: &InteractionSettings,
    ) {
        self.settle_bob(dt);

        if self.is_attentive() || !settings.wander_enabled || settings.waypoints.is_empty() {
            if self.is_attentive() {
                self.face(viewer_floor, dt, settings);
            }
            return;
        }

        if pause_left > 0.0 {
            self.mode = InteractionMode::Wander {
                waypoint,
                pause_left: pause_left - dt,
            };
            return;
        }

        let index = waypoint % settings.waypoints.len();
        let target = Vec2::from(settings.waypoints[index])
            .clamp(Vec2::from(settings.stage_min), Vec2::from(settings.stage_max));
        if self.step_towards(target, settings.wander_speed, dt, settings) {
            self.mode = InteractionMode::Wander {
                waypoint: (index + 1) % settings.waypoints.len(),
                pause_left: settings.wander_pause_secs,
            };
        }
    }

    /// Moves the root toward `target`, turning toward travel. Returns `true`
    /// once within the arrive threshold.
    fn step_towards(
        &mut self,
        target: Vec2,
        speed: f32,
        dt: f32,
        settings: &InteractionSettings,
    ) -> bool {
        let position = self.root.floor();
        let offset = target - position;
        let distance = offset.length();
        if distance <= settings.arrive_threshold {
            return true;
        }

        let direction = offset / distance;
        let step = (speed.max(0.0) * dt).min(distance);
        let next = position + direction * step;
        self.root.position.x = next.x;
        self.root.position.z = next.y;
        self.turn_to(yaw_towards(direction), dt, settings);

        distance - step <= settings.arrive_threshold
    }

    fn face(&mut self, point: Vec2, dt: f32, settings: &InteractionSettings) {
        let offset = point - self.root.floor();
        if offset.length_squared() > 1e-6 {
            self.turn_to(yaw_towards(offset), dt, settings);
        }
    }

    fn turn_to(&mut self, desired: f32, dt: f32, settings: &InteractionSettings) {
        let delta = wrap_angle(desired - self.root.yaw);
        self.root.yaw = wrap_angle(self.root.yaw + damp(0.0, delta, settings.turn_rate, dt));
    }

    fn settle_bob(&mut self, dt: f32) {
        self.root.position.y = damp(self.root.position.y, 0.0, 12.0, dt);
        self.bob_phase = 0.0;
    }

    fn nearest_waypoint(&self, settings: &InteractionSettings) -> usize {
        let position = self.root.floor();
        settings
            .waypoints
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| {
                let da = Vec2::from(**a).distance_squared(position);
                let db = Vec2::from(**b).distance_squared(position);
                da.total_cmp(&db)
            })
            .map_or(0, |(index, _)| index)
    }
}
