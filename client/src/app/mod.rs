pub mod bootstrap;
pub mod plugins;

pub use bootstrap::{configure_client_app, run_client_app};
