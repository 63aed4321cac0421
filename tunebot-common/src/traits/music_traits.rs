// File: tunebot-common/src/traits/music_traits.rs
//
// Capability seams between the music controller and the outside world:
// the search/metadata backend, the reaction-based disambiguation prompt,
// the voice gateway and the byte-stream source. The controller only ever
// talks to these traits; real platform clients live behind them.

use std::collections::HashSet;

use async_trait::async_trait;
use tokio::sync::mpsc::UnboundedSender;

use crate::error::Error;
use crate::models::track::Track;

/// Lifecycle events a live stream reports back into the state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// The stream ran to its natural end.
    Finished,
    /// The stream died mid-track. Treated as an automatic skip.
    Failed(String),
}

/// Outcome of asking the requester to pick one of several candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// 1-based index into the candidate list.
    Chosen(usize),
    TimedOut,
}

/// The external search/metadata provider.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TrackSearcher: Send + Sync {
    /// Free-text search, ordered best-first. May return more results
    /// than the caller wants; the caller truncates.
    async fn search(&self, query: &str) -> Result<Vec<Track>, Error>;

    /// Metadata fetch for a direct link to the provider.
    async fn fetch_by_url(&self, url: &str) -> Result<Track, Error>;
}

/// The reaction/pagination browsing UI, reduced to one question:
/// "which of these did you mean?"
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SelectionPrompter: Send + Sync {
    async fn choose_one(
        &self,
        titles: Vec<String>,
        requester_id: &str,
        timeout_secs: u64,
    ) -> Result<Selection, Error>;
}

/// A held voice connection. `leave` must not suspend; implementations
/// that need I/O to disconnect do it in the background.
#[cfg_attr(test, mockall::automock)]
pub trait VoiceConnection: Send + Sync {
    fn leave(&self);
}

/// The guild's voice channel, as the controller sees it: join it, and
/// ask who is in it.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VoiceGateway: Send + Sync {
    async fn join(&self) -> Result<Box<dyn VoiceConnection>, Error>;

    async fn current_occupants(&self) -> Result<HashSet<String>, Error>;

    async fn is_occupant(&self, member_id: &str) -> Result<bool, Error>;
}

/// A live audio stream. All controls are fire-and-forget so the state
/// machine can drive them without suspending.
#[cfg_attr(test, mockall::automock)]
pub trait StreamHandle: Send + Sync {
    fn pause(&self);
    fn resume(&self);
    fn set_volume(&self, volume: f64);
    fn stop(&self);
}

/// Opens byte streams for tracks. Events for the opened stream are
/// delivered on `events`; the sender is dropped when the stream is
/// stopped or replaced, which ends delivery.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StreamSource: Send + Sync {
    async fn open(
        &self,
        track: Track,
        offset_secs: u64,
        volume: f64,
        events: UnboundedSender<StreamEvent>,
    ) -> Result<Box<dyn StreamHandle>, Error>;
}
