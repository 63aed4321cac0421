// File: src/music/controller.rs
//
// The per-guild facade over resolver + queue + session + access guard.
// Every mutating command runs the same gauntlet: voice-presence check,
// manager check where a specific listing is targeted, the state-machine
// transition, then exactly one confirmation or refusal reply.

use std::sync::Arc;

use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use tunebot_common::models::{format_clock, Listing};
use tunebot_common::traits::{
    SelectionPrompter, StreamEvent, StreamSource, TrackSearcher, VoiceGateway,
};
use tunebot_common::Error;

use crate::music::access::AccessGuard;
use crate::music::config::MusicConfig;
use crate::music::queue::PlaybackQueue;
use crate::music::resolver::TrackResolver;
use crate::music::session::{AdvanceCause, PlaybackSession, PlaybackState, PlayOutcome, SeekDirection};

/// What a command hands back to the dispatch layer: one or more lines
/// of user-visible text plus a success flag. Refusals are replies too;
/// commands never propagate errors past this boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct MusicReply {
    pub lines: Vec<String>,
    pub success: bool,
}

impl MusicReply {
    fn ok(line: impl Into<String>) -> Self {
        Self {
            lines: vec![line.into()],
            success: true,
        }
    }

    fn ok_lines(lines: Vec<String>) -> Self {
        Self {
            lines,
            success: true,
        }
    }

    fn refusal(err: &Error) -> Self {
        Self {
            lines: vec![err.to_string()],
            success: false,
        }
    }
}

/// The collaborator bundle a controller needs for its guild.
pub struct GuildCollaborators {
    pub searcher: Arc<dyn TrackSearcher>,
    pub prompter: Arc<dyn SelectionPrompter>,
    pub gateway: Arc<dyn VoiceGateway>,
    pub source: Arc<dyn StreamSource>,
}

struct Inner {
    queue: PlaybackQueue,
    session: PlaybackSession,
}

pub struct MusicController {
    guild_id: String,
    config: MusicConfig,
    resolver: TrackResolver,
    guard: AccessGuard,
    gateway: Arc<dyn VoiceGateway>,
    inner: Arc<Mutex<Inner>>,
    /// Informational notices produced by the event pump (auto-advance,
    /// stream failures). The dispatch layer drains these at its leisure.
    notice_rx: Mutex<Option<UnboundedReceiver<String>>>,
}

impl MusicController {
    pub fn new(guild_id: &str, config: MusicConfig, collab: GuildCollaborators) -> Arc<Self> {
        let (pump_tx, mut pump_rx) = unbounded_channel::<(u64, StreamEvent)>();
        let (notice_tx, notice_rx) = unbounded_channel::<String>();

        let session = PlaybackSession::new(
            collab.gateway.clone(),
            collab.source,
            MusicConfig::volume_for_percent(config.default_volume_percent),
            pump_tx,
        );
        let inner = Arc::new(Mutex::new(Inner {
            queue: PlaybackQueue::new(),
            session,
        }));

        // The event pump: the one place stream lifecycle events re-enter
        // the state machine. Holds only a weak handle on the shared
        // state; a strong one would keep the session (and its sender
        // half of this channel) alive forever. Ends when the controller
        // is dropped.
        let pump_inner = Arc::downgrade(&inner);
        let pump_guild = guild_id.to_string();
        tokio::spawn(async move {
            while let Some((seq, event)) = pump_rx.recv().await {
                let Some(pump_inner) = pump_inner.upgrade() else {
                    break;
                };
                let mut guard = pump_inner.lock().await;
                let Inner { queue, session } = &mut *guard;
                if !session.is_current_stream(seq) {
                    debug!("(MusicController) [{pump_guild}] discarding stale stream event");
                    continue;
                }
                let cause = match &event {
                    StreamEvent::Finished => AdvanceCause::Finished,
                    StreamEvent::Failed(reason) => {
                        warn!("(MusicController) [{pump_guild}] stream failed: {reason}");
                        AdvanceCause::Errored
                    }
                };
                let next_title = session
                    .advance(queue, cause)
                    .await
                    .map(|l| l.title().to_string());
                let notice = match (&event, next_title) {
                    (StreamEvent::Finished, Some(title)) => format!("Now playing: {title}"),
                    (StreamEvent::Finished, None) => "Queue finished.".to_string(),
                    (StreamEvent::Failed(reason), Some(title)) => {
                        format!("Playback failed ({reason}); now playing: {title}")
                    }
                    (StreamEvent::Failed(reason), None) => {
                        format!("Playback failed ({reason}); queue is empty.")
                    }
                };
                if notice_tx.send(notice).is_err() {
                    break;
                }
            }
            debug!("(MusicController) [{pump_guild}] event pump ended");
        });

        let resolver = TrackResolver::new(collab.searcher, collab.prompter, &config);
        Arc::new(Self {
            guild_id: guild_id.to_string(),
            config,
            resolver,
            guard: AccessGuard::new(),
            gateway: collab.gateway,
            inner,
            notice_rx: Mutex::new(Some(notice_rx)),
        })
    }

    pub fn guild_id(&self) -> &str {
        &self.guild_id
    }

    /// Awaits the next informational notice (auto-advance, stream
    /// failure). `None` once the pump has shut down.
    pub async fn next_notice(&self) -> Option<String> {
        let mut guard = self.notice_rx.lock().await;
        match guard.as_mut() {
            Some(rx) => rx.recv().await,
            None => None,
        }
    }

    // ---------------------------------------------------------------
    // Command surface
    // ---------------------------------------------------------------

    pub async fn play(&self, issuer: &str, query: &str) -> MusicReply {
        self.reply(self.play_inner(issuer, query).await)
    }

    pub async fn pause(&self, issuer: &str) -> MusicReply {
        self.reply(self.pause_inner(issuer).await)
    }

    pub async fn resume(&self, issuer: &str) -> MusicReply {
        self.reply(self.resume_inner(issuer).await)
    }

    pub async fn skip(&self, issuer: &str) -> MusicReply {
        self.reply(self.skip_inner(issuer).await)
    }

    pub async fn unskip(&self, issuer: &str) -> MusicReply {
        self.reply(self.unskip_inner(issuer).await)
    }

    pub async fn replay(&self, issuer: &str) -> MusicReply {
        self.reply(self.replay_inner(issuer).await)
    }

    pub async fn remove(&self, issuer: &str, index_or_title: &str) -> MusicReply {
        self.reply(self.remove_inner(issuer, index_or_title).await)
    }

    pub async fn seek(&self, issuer: &str, amount_secs: u64, direction: SeekDirection) -> MusicReply {
        self.reply(self.seek_inner(issuer, amount_secs, direction).await)
    }

    pub async fn set_volume(&self, issuer: &str, percent: u32) -> MusicReply {
        self.reply(self.set_volume_inner(issuer, percent).await)
    }

    pub async fn stop(&self, issuer: &str) -> MusicReply {
        self.reply(self.stop_inner(issuer).await)
    }

    pub async fn list_queue(&self) -> MusicReply {
        let inner = self.inner.lock().await;
        if inner.queue.is_empty() {
            return MusicReply::ok("The queue is empty.");
        }
        let mut lines = vec!["Up next:".to_string()];
        for (i, listing) in inner.queue.pending().enumerate() {
            lines.push(display_line(i + 1, listing));
        }
        MusicReply::ok_lines(lines)
    }

    pub async fn list_history(&self) -> MusicReply {
        let inner = self.inner.lock().await;
        if inner.queue.history_len() == 0 {
            return MusicReply::ok("Nothing has played yet.");
        }
        let mut lines = vec!["Previously played (most recent first):".to_string()];
        let history: Vec<&Listing> = inner.queue.history().collect();
        for (i, listing) in history.into_iter().rev().enumerate() {
            lines.push(display_line(i + 1, listing));
        }
        MusicReply::ok_lines(lines)
    }

    pub async fn now_playing(&self) -> MusicReply {
        let inner = self.inner.lock().await;
        match inner.session.active() {
            None => MusicReply::ok("Nothing is playing."),
            Some(listing) => {
                let position = format_clock(inner.session.position_secs());
                let duration = format_clock(listing.current_duration_secs());
                let suffix = if inner.session.state() == PlaybackState::Paused {
                    " (paused)"
                } else {
                    ""
                };
                MusicReply::ok(format!(
                    "Now playing: {} [{position}/{duration}]{suffix}",
                    listing.title()
                ))
            }
        }
    }

    /// Tears the session down without permission checks. For the
    /// registry and process shutdown, not for command dispatch.
    pub async fn shutdown(&self) {
        let mut guard = self.inner.lock().await;
        let Inner { queue, session } = &mut *guard;
        session.stop(queue);
    }

    // ---------------------------------------------------------------
    // Implementations
    // ---------------------------------------------------------------

    async fn play_inner(&self, issuer: &str, query: &str) -> Result<MusicReply, Error> {
        self.ensure_present(issuer).await?;
        let occupants = self.gateway.current_occupants().await?;

        // Snapshot the generation before the (suspending) resolution;
        // if a stop ran in the meantime, the result is stale.
        let generation = self.inner.lock().await.session.generation();
        let listing = self.resolver.resolve(query, issuer, occupants).await?;

        let mut guard = self.inner.lock().await;
        let Inner { queue, session } = &mut *guard;
        if session.generation() != generation {
            info!(
                "(MusicController) [{}] discarding request resolved before a stop",
                self.guild_id
            );
            return Err(Error::Resolution(
                "the player was stopped while resolving; request discarded".into(),
            ));
        }

        let title = listing.title().to_string();
        match session.request_play(listing, queue).await? {
            PlayOutcome::Started => Ok(MusicReply::ok(format!("Now playing: {title}"))),
            PlayOutcome::Enqueued(position) => Ok(MusicReply::ok(format!(
                "Added to queue at position {position}: {title}"
            ))),
        }
    }

    async fn pause_inner(&self, issuer: &str) -> Result<MusicReply, Error> {
        self.ensure_present(issuer).await?;
        let mut guard = self.inner.lock().await;
        self.ensure_manages_active(issuer, &guard.session)?;
        match guard.session.pause()? {
            PlaybackState::Paused => Ok(MusicReply::ok("Paused.")),
            _ => Ok(MusicReply::ok("Resumed.")),
        }
    }

    async fn resume_inner(&self, issuer: &str) -> Result<MusicReply, Error> {
        self.ensure_present(issuer).await?;
        let mut guard = self.inner.lock().await;
        self.ensure_manages_active(issuer, &guard.session)?;
        guard.session.resume()?;
        Ok(MusicReply::ok("Resumed."))
    }

    async fn skip_inner(&self, issuer: &str) -> Result<MusicReply, Error> {
        self.ensure_present(issuer).await?;
        let mut guard = self.inner.lock().await;
        let Inner { queue, session } = &mut *guard;
        let skipped = match session.active() {
            Some(listing) => {
                self.ensure_can_manage(issuer, listing)?;
                listing.title().to_string()
            }
            None => return Err(Error::UserInput("nothing to skip".into())),
        };
        let mut lines = vec![format!("Skipped: {skipped}")];
        match session.skip(queue).await? {
            Some(next) => lines.push(format!("Now playing: {}", next.title())),
            None => lines.push("The queue is empty.".to_string()),
        }
        Ok(MusicReply::ok_lines(lines))
    }

    async fn unskip_inner(&self, issuer: &str) -> Result<MusicReply, Error> {
        self.ensure_present(issuer).await?;
        // Occupants are fetched before taking the lock; unskip itself
        // must not suspend mid-mutation.
        let occupants = self.gateway.current_occupants().await?;
        let mut guard = self.inner.lock().await;
        let Inner { queue, session } = &mut *guard;
        self.ensure_manages_active(issuer, session)?;
        session.unskip(queue, occupants).await?;
        match session.active() {
            Some(listing) => Ok(MusicReply::ok(format!("Rewound to: {}", listing.title()))),
            None => Ok(MusicReply::ok("Rewound.")),
        }
    }

    async fn replay_inner(&self, issuer: &str) -> Result<MusicReply, Error> {
        self.ensure_present(issuer).await?;
        let mut guard = self.inner.lock().await;
        let Inner { queue, session } = &mut *guard;
        let title = match session.active() {
            Some(listing) => {
                self.ensure_can_manage(issuer, listing)?;
                listing.title().to_string()
            }
            None => return Err(Error::UserInput("nothing is playing".into())),
        };
        session.replay(queue).await?;
        Ok(MusicReply::ok(format!("Replaying from the start: {title}")))
    }

    async fn remove_inner(&self, issuer: &str, index_or_title: &str) -> Result<MusicReply, Error> {
        self.ensure_present(issuer).await?;
        let mut guard = self.inner.lock().await;

        let index = match index_or_title.trim().parse::<usize>() {
            Ok(n) => n,
            Err(_) => guard
                .queue
                .find_by_title_substring(index_or_title)
                .ok_or_else(|| {
                    Error::UserInput(format!("nothing in the queue matches '{index_or_title}'"))
                })?,
        };

        if let Some(target) = guard.queue.peek_at(index) {
            self.ensure_can_manage(issuer, target)?;
        }
        let removed = guard.queue.remove_at(index)?;
        Ok(MusicReply::ok(format!("Removed: {}", removed.title())))
    }

    async fn seek_inner(
        &self,
        issuer: &str,
        amount_secs: u64,
        direction: SeekDirection,
    ) -> Result<MusicReply, Error> {
        self.ensure_present(issuer).await?;
        let mut guard = self.inner.lock().await;
        let Inner { queue, session } = &mut *guard;
        let title = match session.active() {
            Some(listing) => {
                self.ensure_can_manage(issuer, listing)?;
                listing.title().to_string()
            }
            None => return Err(Error::UserInput("nothing is playing".into())),
        };
        let offset = session
            .seek(amount_secs, direction, self.config.guard_secs, queue)
            .await?;
        Ok(MusicReply::ok(format!(
            "Jumped to {} in {title}.",
            format_clock(offset)
        )))
    }

    async fn set_volume_inner(&self, issuer: &str, percent: u32) -> Result<MusicReply, Error> {
        self.ensure_present(issuer).await?;
        if percent == 0 || percent > self.config.max_volume_percent {
            return Err(Error::UserInput(format!(
                "volume must be between 1 and {}",
                self.config.max_volume_percent
            )));
        }
        let mut guard = self.inner.lock().await;
        guard
            .session
            .set_volume(MusicConfig::volume_for_percent(percent));
        Ok(MusicReply::ok(format!("Volume set to {percent}%.")))
    }

    async fn stop_inner(&self, issuer: &str) -> Result<MusicReply, Error> {
        self.ensure_present(issuer).await?;
        let mut guard = self.inner.lock().await;
        let Inner { queue, session } = &mut *guard;
        self.ensure_manages_active(issuer, session)?;
        session.stop(queue);
        Ok(MusicReply::ok("Stopped playback and cleared the queue."))
    }

    // ---------------------------------------------------------------
    // Checks and helpers
    // ---------------------------------------------------------------

    async fn ensure_present(&self, issuer: &str) -> Result<(), Error> {
        if self.gateway.is_occupant(issuer).await? {
            Ok(())
        } else {
            Err(Error::Permission(
                "you need to be in the voice channel to use the music player".into(),
            ))
        }
    }

    fn ensure_can_manage(&self, issuer: &str, listing: &Listing) -> Result<(), Error> {
        if self.guard.can_manage(issuer, listing) {
            Ok(())
        } else {
            Err(Error::Permission(
                "only members who were in the channel when this was requested can manage it".into(),
            ))
        }
    }

    fn ensure_manages_active(&self, issuer: &str, session: &PlaybackSession) -> Result<(), Error> {
        match session.active() {
            Some(listing) => self.ensure_can_manage(issuer, listing),
            None => Ok(()),
        }
    }

    fn reply(&self, result: Result<MusicReply, Error>) -> MusicReply {
        match result {
            Ok(reply) => reply,
            Err(e) => {
                debug!("(MusicController) [{}] refused: {e}", self.guild_id);
                MusicReply::refusal(&e)
            }
        }
    }
}

fn display_line(position: usize, listing: &Listing) -> String {
    format!(
        "{position}. {} [{}] (requested by {})",
        listing.title(),
        format_clock(listing.current_duration_secs()),
        listing.requested_by
    )
}
