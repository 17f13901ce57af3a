//! Motion clips as Bevy assets. Turns the engine's `ClipLoadRequest`s into
//! `AssetServer` loads and reports each outcome back as `ClipLoaded`.

use avatar::clip::{ClipDocument, MotionClip};
use avatar::error::AvatarError;
use avatar::messages::{ClipLoadRequest, ClipLoaded};
use avatar::pipeline::AvatarPipeline;
use bevy::asset::io::Reader;
use bevy::asset::{AssetLoader, AsyncReadExt, LoadContext, LoadState};
use bevy::prelude::*;
use std::collections::HashMap;
use thiserror::Error;

pub const MOTION_CLIP_EXTENSION: &str = "motion.json";

#[derive(Asset, TypePath, Debug, Clone)]
pub struct MotionClipAsset {
    pub document: ClipDocument,
}

#[derive(Default, TypePath)]
pub struct MotionClipLoader;

#[derive(Debug, Error)]
pub enum MotionClipLoaderError {
    #[error("Could not load motion clip: {0}")]
    Io(#[from] std::io::Error),
    #[error("Could not parse JSON: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl AssetLoader for MotionClipLoader {
    type Asset = MotionClipAsset;
    type Settings = ();
    type Error = MotionClipLoaderError;

    async fn load(
        &self,
        reader: &mut dyn Reader,
        _settings: &(),
        _load_context: &mut LoadContext<'_>,
    ) -> Result<Self::Asset, Self::Error> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes).await?;
        let document = serde_json::from_slice::<ClipDocument>(&bytes)?;
        Ok(MotionClipAsset { document })
    }

    fn extensions(&self) -> &[&str] {
        &[MOTION_CLIP_EXTENSION]
    }
}

/// Loads in flight, by clip key.
#[derive(Resource, Default)]
pub struct PendingClipLoads {
    handles: HashMap<String, Handle<MotionClipAsset>>,
}

impl PendingClipLoads {
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

pub struct ClipAssetsPlugin;

impl Plugin for ClipAssetsPlugin {
    fn build(&self, app: &mut App) {
        app.init_asset::<MotionClipAsset>()
            .init_asset_loader::<MotionClipLoader>()
            .init_resource::<PendingClipLoads>()
            .add_systems(Update, start_clip_loads.in_set(AvatarPipeline::Submit))
            .add_systems(Update, finish_clip_loads.before(AvatarPipeline::Events));
    }
}

fn start_clip_loads(
    mut requests: MessageReader<ClipLoadRequest>,
    asset_server: Res<AssetServer>,
    mut pending: ResMut<PendingClipLoads>,
) {
    for ClipLoadRequest { key, path } in requests.read() {
        let handle = asset_server.load::<MotionClipAsset>(path.clone());
        pending.handles.insert(key.clone(), handle);
    }
}

fn finish_clip_loads(
    asset_server: Res<AssetServer>,
    clips: Res<Assets<MotionClipAsset>>,
    mut pending: ResMut<PendingClipLoads>,
    mut loaded: MessageWriter<ClipLoaded>,
) {
    pending.handles.retain(|key, handle| {
        let result = match asset_server.load_state(handle.id()) {
            LoadState::Loaded => match clips.get(handle.id()) {
                Some(asset) => MotionClip::from_document(key, asset.document.clone()),
                None => return true,
            },
            LoadState::Failed(error) => Err(AvatarError::ClipLoad {
                key: key.clone(),
                reason: error.to_string(),
            }),
            LoadState::NotLoaded | LoadState::Loading => return true,
        };
        loaded.write(ClipLoaded {
            key: key.clone(),
            result,
        });
        false
    });
}
