#![allow(clippy::too_many_arguments, clippy::type_complexity)]

pub mod app;
pub mod chat;
pub mod clip_assets;
pub mod replies;
pub mod rig;
pub mod settings;
pub mod speech;
pub mod stage;
