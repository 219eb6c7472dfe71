pub mod catalog;
pub mod config;
pub mod controller;
pub mod fetch;
pub mod input;
pub mod media;
pub mod source;

use std::sync::Arc;

use anyhow::Result;

// Re-exports
pub use catalog::{CatalogError, CatalogStore, Episode, JsonCatalog, MemoryCatalog, Title, TitleDraft, TitlePatch};
pub use config::{AppConfig, PlayerConfig};
pub use controller::{ControllerEvent, Notice, Phase, PlaybackController, PlaybackError, PlaybackState, SurfaceId};
pub use fetch::{HttpLayer, ReqwestFetch};
pub use input::{Command, GestureLayer, InputContext, Key, PointerPress};
pub use media::{Backend, DefaultPlayerFactory, MediaErrorKind, MediaPlayer, PlayerFactory};
pub use source::{EmbedProvider, PlayableSource, Strategy, classify, split_headers};

/// Controller wired to the built-in backends over HTTP
pub type DefaultController = PlaybackController<DefaultPlayerFactory>;

/// Fetch layer backed by reqwest, configured from `config`
pub fn create_http_layer(config: &AppConfig) -> Result<HttpLayer> {
    let transport = ReqwestFetch::new(config.request_timeout(), &config.user_agent)?;
    Ok(HttpLayer::new(Arc::new(transport)))
}

/// Playback controller using the built-in player backends
pub fn create_controller(config: &AppConfig) -> Result<DefaultController> {
    let http = create_http_layer(config)?;
    let factory = DefaultPlayerFactory::new(http.clone());
    Ok(PlaybackController::new(factory, http, config.player.clone()))
}
