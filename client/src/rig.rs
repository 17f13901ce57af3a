//! Binds the rendered model to the engine and applies each frame's output.
//!
//! The model is a glTF/VRM scene. Its nodes are matched to humanoid bones by
//! name and its morph targets to expression roles, then announced with
//! `AvatarBound`. When the model file cannot be loaded, a primitive
//! mannequin with the same node names stands in.

use crate::settings::SettingsResource;
use avatar::compositor::FrameOutput;
use avatar::expression::Capabilities;
use avatar::messages::AvatarBound;
use avatar::pipeline::AvatarPipeline;
use avatar::skeleton::{BoneMap, Skeleton, resolve_bones};
use bevy::asset::LoadState;
use bevy::gltf::Gltf;
use bevy::mesh::morph::MorphWeights;
use bevy::prelude::*;
use common::{BodyRegion, HumanoidBone};

#[derive(Component)]
pub struct AvatarModel;

/// The glTF file behind a model scene, watched for load failure.
#[derive(Component)]
struct ModelSource(Handle<Gltf>);

/// Morph target names of one weighted node, in weight order.
#[derive(Debug, Clone)]
pub struct MorphChannels {
    pub entity: Entity,
    pub names: Vec<String>,
}

#[derive(Component, Debug, Clone)]
pub struct AvatarBinding {
    pub bones: BoneMap<Entity>,
    pub morphs: Vec<MorphChannels>,
    pub capabilities: Capabilities,
}

pub struct RigPlugin;

impl Plugin for RigPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Startup, spawn_avatar_model)
            .add_systems(
                Update,
                (replace_failed_model, bind_avatar_model)
                    .chain()
                    .before(AvatarPipeline::Events),
            )
            .add_systems(Update, submit_frame.in_set(AvatarPipeline::Submit));
    }
}

fn spawn_avatar_model(mut commands: Commands, settings: Res<SettingsResource>, asset_server: Res<AssetServer>) {
    let stage = &settings.current.stage;
    let source: Handle<Gltf> = asset_server.load(stage.model_path.clone());
    let scene: Handle<Scene> = asset_server.load(format!("{}#Scene0", stage.model_path));
    info!("Loading avatar model '{}'", stage.model_path);
    commands.spawn((
        AvatarModel,
        ModelSource(source),
        SceneRoot(scene),
        Transform::from_scale(Vec3::splat(stage.model_scale)),
    ));
}

fn replace_failed_model(
    mut commands: Commands,
    asset_server: Res<AssetServer>,
    models: Query<(Entity, &ModelSource, &SceneRoot, &Transform), With<AvatarModel>>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    for (entity, source, scene_root, transform) in &models {
        let failure = [source.0.id().untyped(), scene_root.0.id().untyped()]
            .into_iter()
            .find_map(|id| match asset_server.load_state(id) {
                LoadState::Failed(error) => Some(error),
                _ => None,
            });
        let Some(error) = failure else {
            continue;
        };
        warn!("Avatar model failed to load ({}); using the mannequin", error);
        commands.entity(entity).despawn();
        spawn_mannequin(&mut commands, *transform, &mut meshes, &mut materials);
    }
}

/// `(bone, parent, offset from parent, segment size)` for the stand-in body.
const MANNEQUIN: [(HumanoidBone, Option<HumanoidBone>, [f32; 3], [f32; 3]); 15] = [
    (HumanoidBone::Hips, None, [0.0, 0.95, 0.0], [0.28, 0.12, 0.16]),
    (HumanoidBone::Spine, Some(HumanoidBone::Hips), [0.0, 0.1, 0.0], [0.24, 0.16, 0.14]),
    (HumanoidBone::Chest, Some(HumanoidBone::Spine), [0.0, 0.16, 0.0], [0.3, 0.2, 0.16]),
    (HumanoidBone::Neck, Some(HumanoidBone::Chest), [0.0, 0.2, 0.0], [0.06, 0.08, 0.06]),
    (HumanoidBone::Head, Some(HumanoidBone::Neck), [0.0, 0.1, 0.0], [0.18, 0.22, 0.18]),
    (HumanoidBone::LeftUpperArm, Some(HumanoidBone::Chest), [0.18, 0.14, 0.0], [0.26, 0.06, 0.06]),
    (HumanoidBone::LeftLowerArm, Some(HumanoidBone::LeftUpperArm), [0.26, 0.0, 0.0], [0.24, 0.05, 0.05]),
    (HumanoidBone::RightUpperArm, Some(HumanoidBone::Chest), [-0.18, 0.14, 0.0], [0.26, 0.06, 0.06]),
    (HumanoidBone::RightLowerArm, Some(HumanoidBone::RightUpperArm), [-0.26, 0.0, 0.0], [0.24, 0.05, 0.05]),
    (HumanoidBone::LeftUpperLeg, Some(HumanoidBone::Hips), [0.09, -0.05, 0.0], [0.09, 0.42, 0.09]),
    (HumanoidBone::LeftLowerLeg, Some(HumanoidBone::LeftUpperLeg), [0.0, -0.42, 0.0], [0.08, 0.42, 0.08]),
    (HumanoidBone::RightUpperLeg, Some(HumanoidBone::Hips), [-0.09, -0.05, 0.0], [0.09, 0.42, 0.09]),
    (HumanoidBone::RightLowerLeg, Some(HumanoidBone::RightUpperLeg), [0.0, -0.42, 0.0], [0.08, 0.42, 0.08]),
    (HumanoidBone::LeftHand, Some(HumanoidBone::LeftLowerArm), [0.24, 0.0, 0.0], [0.07, 0.05, 0.04]),
    (HumanoidBone::RightHand, Some(HumanoidBone::RightLowerArm), [-0.24, 0.0, 0.0], [0.07, 0.05, 0.04]),
];

pub fn spawn_mannequin(
    commands: &mut Commands,
    transform: Transform,
    meshes: &mut Assets<Mesh>,
    materials: &mut Assets<StandardMaterial>,
) -> Entity {
    let material = materials.add(StandardMaterial {
        base_color: Color::srgb(0.86, 0.78, 0.9),
        perceptual_roughness: 0.7,
        ..default()
    });
    let root = commands
        .spawn((AvatarModel, transform, Visibility::default(), Name::new("mannequin")))
        .id();

    let mut spawned: Vec<(HumanoidBone, Entity)> = Vec::with_capacity(MANNEQUIN.len());
    for (bone, parent, offset, size) in MANNEQUIN {
        let parent_entity = parent
            .and_then(|parent| spawned.iter().find(|(spawned_bone, _)| *spawned_bone == parent))
            .map_or(root, |(_, entity)| *entity);

        let size = Vec3::from(size);
        // Segments hang from their joint toward the child.
        let segment_center = match bone.region() {
            BodyRegion::LeftArm | BodyRegion::RightArm => {
                Vec3::new(size.x * 0.5 * offset[0].signum(), 0.0, 0.0)
            }
            BodyRegion::Legs => Vec3::new(0.0, -size.y * 0.5, 0.0),
            _ => Vec3::new(0.0, size.y * 0.5, 0.0),
        };

        let joint = commands
            .spawn((
                Name::new(bone.id()),
                Transform::from_translation(Vec3::from(offset)),
                Visibility::default(),
                ChildOf(parent_entity),
            ))
            .id();
        commands.spawn((
            Mesh3d(meshes.add(Cuboid::from_size(size))),
            MeshMaterial3d(material.clone()),
            Transform::from_translation(segment_center),
            ChildOf(joint),
        ));
        spawned.push((bone, joint));
    }
    root
}

/// Collects every descendant of `root` with its accumulated local transform.
fn collect_nodes(
    root: Entity,
    root_transform: Transform,
    children_query: &Query<&Children>,
    transforms: &Query<&Transform>,
) -> Vec<(Entity, Transform)> {
    let mut nodes = Vec::new();
    let mut queue = vec![(root, Transform::from_scale(root_transform.scale))];
    while let Some((entity, accumulated)) = queue.pop() {
        let Ok(children) = children_query.get(entity) else {
            continue;
        };
        for child in children.iter() {
            let local = transforms.get(child).copied().unwrap_or_default();
            let child_accumulated = accumulated.mul_transform(local);
            nodes.push((child, child_accumulated));
            queue.push((child, child_accumulated));
        }
    }
    nodes
}

pub fn bind_avatar_model(
    mut commands: Commands,
    models: Query<(Entity, &Transform), (With<AvatarModel>, Without<AvatarBinding>)>,
    children_query: Query<&Children>,
    transforms: Query<&Transform>,
    names: Query<&Name>,
    morph_nodes: Query<(), With<MorphWeights>>,
    mesh_nodes: Query<&Mesh3d>,
    meshes: Res<Assets<Mesh>>,
    mut bound: MessageWriter<AvatarBound>,
) {
    for (root, root_transform) in &models {
        let nodes = collect_nodes(root, *root_transform, &children_query, &transforms);
        let named: Vec<(&str, (Entity, Transform))> = nodes
            .iter()
            .filter_map(|(entity, accumulated)| {
                names
                    .get(*entity)
                    .ok()
                    .map(|name| (name.as_str(), (*entity, *accumulated)))
            })
            .collect();
        if named.is_empty() {
            continue;
        }

        let resolved = resolve_bones(named.iter().map(|(name, node)| (*name, *node)));
        if resolved.is_empty() {
            warn!("Avatar model has no recognisable humanoid bones");
        }
        let skeleton = Skeleton::from_rest(resolved.iter().filter_map(|(bone, (entity, _))| {
            transforms.get(*entity).ok().map(|transform| (bone, transform.rotation))
        }));
        let head_height = resolved
            .get(HumanoidBone::Head)
            .map(|(_, accumulated)| accumulated.translation.y)
            .filter(|height| *height > 0.1);

        let morphs: Vec<MorphChannels> = nodes
            .iter()
            .filter(|(entity, _)| morph_nodes.contains(*entity))
            .filter_map(|(entity, _)| {
                morph_target_names(*entity, &children_query, &mesh_nodes, &meshes).map(|names| MorphChannels {
                    entity: *entity,
                    names,
                })
            })
            .collect();
        let capabilities = Capabilities::resolve(
            morphs
                .iter()
                .flat_map(|channels| channels.names.iter().map(String::as_str)),
        );

        let bones = resolve_bones(named.iter().map(|(name, (entity, _))| (*name, *entity)));
        for bone in bones.missing() {
            debug!("Avatar model has no '{}' bone", bone.id());
        }

        bound.write(AvatarBound {
            skeleton,
            capabilities: capabilities.clone(),
            head_height,
        });
        commands.entity(root).insert(AvatarBinding {
            bones,
            morphs,
            capabilities,
        });
    }
}

/// Morph target names of the mesh under a weighted node.
fn morph_target_names(
    entity: Entity,
    children_query: &Query<&Children>,
    mesh_nodes: &Query<&Mesh3d>,
    meshes: &Assets<Mesh>,
) -> Option<Vec<String>> {
    let own = mesh_nodes.get(entity).ok().into_iter();
    let children = children_query
        .get(entity)
        .into_iter()
        .flat_map(|children| children.iter())
        .filter_map(|child| mesh_nodes.get(child).ok());
    own.chain(children)
        .filter_map(|mesh| meshes.get(&mesh.0))
        .find_map(|mesh| mesh.morph_target_names().map(<[String]>::to_vec))
}

pub fn submit_frame(
    output: Res<FrameOutput>,
    models: Query<(Entity, &AvatarBinding)>,
    mut transforms: Query<&mut Transform>,
    mut morph_weights: Query<&mut MorphWeights>,
) {
    for (root, binding) in &models {
        if let Ok(mut transform) = transforms.get_mut(root) {
            transform.translation = output.root.position;
            transform.rotation = output.root.rotation();
        }

        for (bone, entity) in binding.bones.iter() {
            let Some(rotation) = output.pose.get(bone) else {
                continue;
            };
            if let Ok(mut transform) = transforms.get_mut(*entity) {
                transform.rotation = rotation;
            }
        }

        binding.capabilities.apply(&output.expressions, |channel, value| {
            for target in &binding.morphs {
                let Some(index) = target.names.iter().position(|name| name == channel) else {
                    continue;
                };
                if let Ok(mut weights) = morph_weights.get_mut(target.entity)
                    && let Some(weight) = weights.weights_mut().get_mut(index)
                {
                    *weight = value;
                }
            }
        });
    }
}
