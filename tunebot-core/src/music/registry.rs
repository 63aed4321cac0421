use std::sync::Arc;

use dashmap::DashMap;
use tracing::info;

use crate::music::config::MusicConfig;
use crate::music::controller::{GuildCollaborators, MusicController};

/// Builds the collaborator bundle for a guild. The embedding layer
/// implements this with its real platform clients; tests hand in
/// scripted fakes.
pub trait CollaboratorFactory: Send + Sync {
    fn for_guild(&self, guild_id: &str) -> GuildCollaborators;
}

/// Owns every live controller, keyed by guild id, with
/// creation-on-first-use. This is the only place controllers are
/// created or dropped; nothing else holds ambient per-guild state.
pub struct MusicRegistry {
    config: MusicConfig,
    factory: Arc<dyn CollaboratorFactory>,
    controllers: DashMap<String, Arc<MusicController>>,
}

impl MusicRegistry {
    pub fn new(config: MusicConfig, factory: Arc<dyn CollaboratorFactory>) -> Self {
        Self {
            config,
            factory,
            controllers: DashMap::new(),
        }
    }

    /// The controller for a guild, creating it on first use.
    pub fn controller_for(&self, guild_id: &str) -> Arc<MusicController> {
        self.controllers
            .entry(guild_id.to_string())
            .or_insert_with(|| {
                info!("(MusicRegistry) creating controller for guild {guild_id}");
                MusicController::new(guild_id, self.config.clone(), self.factory.for_guild(guild_id))
            })
            .value()
            .clone()
    }

    /// The controller for a guild, if one already exists.
    pub fn get(&self, guild_id: &str) -> Option<Arc<MusicController>> {
        self.controllers.get(guild_id).map(|c| c.value().clone())
    }

    /// Stops and forgets a guild's controller.
    pub async fn drop_guild(&self, guild_id: &str) {
        if let Some((_, controller)) = self.controllers.remove(guild_id) {
            info!("(MusicRegistry) dropping controller for guild {guild_id}");
            controller.shutdown().await;
        }
    }

    pub fn len(&self) -> usize {
        self.controllers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.controllers.is_empty()
    }
}
