//! Set dressing and the viewer: orbit camera, lights and floor.

use crate::settings::SettingsResource;
use avatar::gaze::Viewer;
use avatar::pipeline::AvatarPipeline;
use bevy::input::mouse::{MouseMotion, MouseScrollUnit, MouseWheel};
use bevy::light::GlobalAmbientLight;
use bevy::prelude::*;
use bevy_egui::input::EguiWantsInput;

const BACKGROUND: Color = Color::srgb(0.1, 0.1, 0.15);
const MIN_DISTANCE: f32 = 0.8;
const MAX_DISTANCE: f32 = 6.0;
const PITCH_LIMIT: f32 = 1.2;

#[derive(Component)]
pub struct StageCamera;

/// Orbit around the avatar's chest height.
#[derive(Resource, Debug, Clone, Copy, PartialEq)]
pub struct OrbitController {
    pub focus: Vec3,
    pub yaw: f32,
    pub pitch: f32,
    pub distance: f32,
}

impl OrbitController {
    pub fn eye(&self) -> Vec3 {
        let rotation = Quat::from_euler(EulerRot::YXZ, self.yaw, -self.pitch, 0.0);
        self.focus + rotation * (Vec3::Z * self.distance)
    }

    pub fn transform(&self) -> Transform {
        Transform::from_translation(self.eye()).looking_at(self.focus, Vec3::Y)
    }
}

pub struct StagePlugin;

impl Plugin for StagePlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(ClearColor(BACKGROUND))
            .add_systems(Startup, spawn_stage)
            .add_systems(Update, (control_orbit_camera, sync_viewer).chain().before(AvatarPipeline::Events));
    }
}

fn spawn_stage(
    mut commands: Commands,
    settings: Res<SettingsResource>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    let stage = &settings.current.stage;
    let focus = Vec3::new(0.0, stage.camera_height, 0.0);
    let orbit = OrbitController {
        focus,
        yaw: 0.0,
        pitch: 0.0,
        distance: stage.camera_distance.clamp(MIN_DISTANCE, MAX_DISTANCE),
    };

    commands.spawn((StageCamera, Camera3d::default(), orbit.transform()));
    commands.insert_resource(orbit);

    commands.spawn((
        DirectionalLight {
            illuminance: 9_000.0,
            shadows_enabled: settings.current.graphics.shadows,
            ..default()
        },
        Transform::from_xyz(2.0, 4.0, 3.0).looking_at(Vec3::ZERO, Vec3::Y),
    ));
    commands.insert_resource(GlobalAmbientLight {
        color: Color::WHITE,
        brightness: 350.0,
        affects_lightmapped_meshes: true,
    });

    commands.spawn((
        Mesh3d(meshes.add(Plane3d::default().mesh().size(6.0, 6.0))),
        MeshMaterial3d(materials.add(StandardMaterial {
            base_color: Color::srgb(0.32, 0.3, 0.36),
            perceptual_roughness: 0.9,
            ..default()
        })),
        Transform::default(),
    ));
}

fn control_orbit_camera(
    settings: Res<SettingsResource>,
    mouse_buttons: Res<ButtonInput<MouseButton>>,
    mut mouse_motion: MessageReader<MouseMotion>,
    mut mouse_wheel: MessageReader<MouseWheel>,
    egui_wants_input: Option<Res<EguiWantsInput>>,
    mut orbit: ResMut<OrbitController>,
    mut camera_query: Query<&mut Transform, With<StageCamera>>,
) {
    let pointer_on_ui = egui_wants_input.is_some_and(|input| input.wants_any_pointer_input());

    let mut mouse_delta = Vec2::ZERO;
    for motion in mouse_motion.read() {
        mouse_delta += motion.delta;
    }
    let mut zoom_units = 0.0;
    for wheel in mouse_wheel.read() {
        let unit_scale = match wheel.unit {
            MouseScrollUnit::Line => 1.0,
            MouseScrollUnit::Pixel => 0.03,
        };
        zoom_units += wheel.y * unit_scale;
    }
    if pointer_on_ui {
        return;
    }

    let stage = &settings.current.stage;
    if mouse_buttons.pressed(MouseButton::Left) {
        orbit.yaw -= mouse_delta.x * stage.orbit_sensitivity;
        orbit.pitch = (orbit.pitch + mouse_delta.y * stage.orbit_sensitivity).clamp(-PITCH_LIMIT, PITCH_LIMIT);
    }
    if zoom_units.abs() > f32::EPSILON {
        orbit.distance = (orbit.distance - zoom_units * stage.zoom_sensitivity).clamp(MIN_DISTANCE, MAX_DISTANCE);
    }

    if let Ok(mut transform) = camera_query.single_mut() {
        *transform = orbit.transform();
    }
}

fn sync_viewer(camera_query: Query<&Transform, With<StageCamera>>, mut viewer: ResMut<Viewer>) {
    let Ok(camera) = camera_query.single() else {
        return;
    };
    viewer.position = camera.translation;
    viewer.forward = *camera.forward();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orbit_eye_sits_in_front_of_focus() {
        let orbit = OrbitController {
            focus: Vec3::new(0.0, 1.4, 0.0),
            yaw: 0.0,
            pitch: 0.0,
            distance: 2.6,
        };
        assert!(orbit.eye().abs_diff_eq(Vec3::new(0.0, 1.4, 2.6), 1e-5));

        let raised = OrbitController { pitch: 0.5, ..orbit };
        assert!(raised.eye().y > 1.4);
        assert!((raised.eye() - raised.focus).length() - 2.6 < 1e-4);
    }
}
