// File: src/music/mod.rs
//
// The per-guild music playback controller. One `MusicController` per
// guild, handed out by `MusicRegistry`; everything platform-specific
// lives behind the collaborator traits in `tunebot-common`.

pub mod access;
pub mod config;
pub mod controller;
pub mod queue;
pub mod registry;
pub mod resolver;
pub mod session;

pub use access::AccessGuard;
pub use config::MusicConfig;
pub use controller::{GuildCollaborators, MusicController, MusicReply};
pub use queue::PlaybackQueue;
pub use registry::{CollaboratorFactory, MusicRegistry};
pub use resolver::TrackResolver;
pub use session::{AdvanceCause, PlaybackSession, PlaybackState, PlayOutcome, SeekDirection};
