use std::time::Duration;

use avatar::AvatarPlugin;
use avatar::compositor::AvatarRig;
use avatar::messages::AvatarCommand;
use avatar::pipeline::AvatarPipeline;
use bevy::prelude::*;
use bevy::time::TimeUpdateStrategy;
use client::rig::{self, AvatarBinding, AvatarModel};
use common::{GestureKind, HumanoidBone};

fn spawn_test_mannequin(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    rig::spawn_mannequin(&mut commands, Transform::default(), &mut meshes, &mut materials);
}

fn mannequin_app() -> App {
    let mut app = App::new();
    app.add_plugins(MinimalPlugins)
        .insert_resource(TimeUpdateStrategy::ManualDuration(Duration::from_millis(16)))
        .init_resource::<Assets<Mesh>>()
        .init_resource::<Assets<StandardMaterial>>()
        .add_plugins(AvatarPlugin::default())
        .add_systems(Startup, spawn_test_mannequin)
        .add_systems(Update, rig::bind_avatar_model.before(AvatarPipeline::Events))
        .add_systems(Update, rig::submit_frame.in_set(AvatarPipeline::Submit));
    app.update();
    app
}

fn bone_entity(app: &mut App, bone: HumanoidBone) -> Entity {
    let mut query = app.world_mut().query::<&AvatarBinding>();
    let binding = query.single(app.world()).expect("one bound model");
    *binding.bones.get(bone).expect("bone bound")
}

#[test]
fn mannequin_binds_every_spawned_bone() {
    let mut app = mannequin_app();

    let rig = app.world().resource::<AvatarRig>();
    assert!(rig.is_bound());
    assert!(rig.skeleton.has(HumanoidBone::Head));
    let head_height = rig.head_height.expect("head height measured");
    assert!(head_height > 1.2 && head_height < 1.6);

    let mut query = app.world_mut().query_filtered::<&AvatarBinding, With<AvatarModel>>();
    let binding = query.single(app.world()).expect("one bound model");
    assert_eq!(binding.bones.len(), 15);
    assert!(binding.morphs.is_empty());
}

#[test]
fn gestures_reach_the_bone_transforms() {
    let mut app = mannequin_app();
    let arm = bone_entity(&mut app, HumanoidBone::RightUpperArm);

    app.world_mut().write_message(AvatarCommand::StartGesture {
        kind: GestureKind::Wave,
        duration: 2.0,
        intensity: 1.0,
    });
    for _ in 0..20 {
        app.update();
    }

    let rotation = app.world().get::<Transform>(arm).map(|t| t.rotation).expect("arm transform");
    assert!(rotation.angle_between(Quat::IDENTITY) > 0.1);
}
