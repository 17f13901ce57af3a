//! Process-lifetime motion clip cache with load deduplication.
//!
//! The cache never performs I/O itself. [`ClipCache::request`] answers with
//! [`ClipRequest::Started`] exactly once per load attempt; the caller turns
//! that into a load message, and the asset layer eventually reports back
//! through [`ClipCache::complete`].

use crate::clip::MotionClip;
use crate::error::{AvatarError, Result};
use crate::settings::ClipSettings;
use bevy::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub enum ClipEntry {
    Loading { started_at: f32 },
    Ready(Arc<MotionClip>),
    Failed { reason: String },
}

/// Outcome of asking the cache for a clip.
#[derive(Debug, Clone)]
pub enum ClipRequest {
    Ready(Arc<MotionClip>),
    /// A load for this key is already in flight.
    Loading,
    /// No load was in flight; the caller must issue one for `path`.
    Started { path: String },
}

#[derive(Resource, Debug, Default)]
pub struct ClipCache {
    catalogue: HashMap<String, String>,
    entries: HashMap<String, ClipEntry>,
    load_timeout: f32,
}

impl ClipCache {
    pub fn new(settings: &ClipSettings) -> Self {
        let catalogue = settings
            .files
            .keys()
            .filter_map(|key| settings.asset_path(key).map(|path| (key.clone(), path)))
            .collect();

        Self {
            catalogue,
            entries: HashMap::new(),
            load_timeout: settings.load_timeout_secs.max(0.1),
        }
    }

    pub fn register(&mut self, key: impl Into<String>, path: impl Into<String>) {
        self.catalogue.insert(key.into(), path.into());
    }

    pub fn is_known(&self, key: &str) -> bool {
        self.catalogue.contains_key(key) || self.entries.contains_key(key)
    }

    pub fn request(&mut self, key: &str, now: f32) -> Result<ClipRequest> {
        match self.entries.get(key) {
            Some(ClipEntry::Ready(clip)) => return Ok(ClipRequest::Ready(clip.clone())),
            Some(ClipEntry::Loading { .. }) => return Ok(ClipRequest::Loading),
            Some(ClipEntry::Failed { .. }) | None => {}
        }

        let Some(path) = self.catalogue.get(key).cloned() else {
            return Err(AvatarError::UnknownClip(key.to_string()));
        };

        self.entries
            .insert(key.to_string(), ClipEntry::Loading { started_at: now });
        Ok(ClipRequest::Started { path })
    }

    /// Records a finished load. Late results still populate the cache; a
    /// failure never replaces a clip that is already ready.
    pub fn complete(
        &mut self,
        key: &str,
        result: Result<MotionClip>,
    ) -> std::result::Result<Arc<MotionClip>, String> {
        match result {
            Ok(clip) => {
                let clip = Arc::new(clip);
                self.entries
                    .insert(key.to_string(), ClipEntry::Ready(clip.clone()));
                Ok(clip)
            }
            Err(error) => {
                let reason = error.to_string();
                if let Some(ClipEntry::Ready(clip)) = self.entries.get(key) {
                    return Ok(clip.clone());
                }
                self.entries.insert(
                    key.to_string(),
                    ClipEntry::Failed {
                        reason: reason.clone(),
                    },
                );
                Err(reason)
            }
        }
    }

    /// Marks loads older than the timeout as failed and returns their keys.
    pub fn expire(&mut self, now: f32) -> Vec<String> {
        let timeout = self.load_timeout;
        let mut expired = Vec::new();
        for (key, entry) in self.entries.iter_mut() {
            if let ClipEntry::Loading { started_at } = entry {
                if now - *started_at >= timeout {
                    *entry = ClipEntry::Failed {
                        reason: AvatarError::ClipTimeout(key.clone()).to_string(),
                    };
                    expired.push(key.clone());
                }
            }
        }
        expired.sort();
        expired
    }

    pub fn get(&self, key: &str) -> Option<Arc<MotionClip>> {
        match self.entries.get(key) {
            Some(ClipEntry::Ready(clip)) => Some(clip.clone()),
            _ => None,
        }
    }

    pub fn entry(&self, key: &str) -> Option<&ClipEntry> {
        self.entries.get(key)
    }

    pub fn is_loading(&self, key: &str) -> bool {
        matches!(self.entries.get(key), Some(ClipEntry::Loading { .. }))
    }

    /// Number of loads currently in flight.
    pub fn outstanding(&self) -> usize {
        self.entries
            .values()
            .filter(|entry| matches!(entry, ClipEntry::Loading { .. }))
            .count()
    }
}
