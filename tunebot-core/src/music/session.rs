// File: src/music/session.rs
//
// The playback state machine. Finish, error and skip all funnel
// through one `advance` transition; replay, seek and unskip reposition
// the active listing and re-run it through the normal
// dequeue-and-start path instead of special-casing a restart.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc::{unbounded_channel, UnboundedSender};
use tracing::{debug, info, warn};

use tunebot_common::models::Listing;
use tunebot_common::traits::{StreamEvent, StreamHandle, StreamSource, VoiceConnection, VoiceGateway};
use tunebot_common::Error;

use crate::music::queue::PlaybackQueue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Playing,
    Paused,
}

/// Which way a seek moves relative to the current position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekDirection {
    Forward,
    Backward,
}

/// What triggered an advance. A natural finish steps through a
/// collection and retires the listing with offset 0; error and skip
/// retire it with the position it had reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceCause {
    Finished,
    Errored,
    Skipped,
}

/// What `request_play` did with the listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayOutcome {
    Started,
    /// Enqueued at this 1-based queue position.
    Enqueued(usize),
}

pub struct PlaybackSession {
    gateway: Arc<dyn VoiceGateway>,
    source: Arc<dyn StreamSource>,
    /// Stream events, tagged with the stream sequence they belong to,
    /// on their way back into the state machine.
    pump_tx: UnboundedSender<(u64, StreamEvent)>,

    state: PlaybackState,
    active: Option<Listing>,
    connection: Option<Box<dyn VoiceConnection>>,
    stream: Option<Box<dyn StreamHandle>>,
    volume: f64,

    /// Bumped by `stop`. A play request resolved against an older
    /// generation is stale and gets discarded by the caller.
    generation: u64,
    /// Bumped whenever the current stream stops being current, so late
    /// events from a dead stream cannot re-enter the machine.
    stream_seq: u64,

    base_offset: u64,
    started_at: Option<Instant>,
    paused_at: Option<Instant>,
    paused_total: Duration,
}

impl PlaybackSession {
    pub fn new(
        gateway: Arc<dyn VoiceGateway>,
        source: Arc<dyn StreamSource>,
        volume: f64,
        pump_tx: UnboundedSender<(u64, StreamEvent)>,
    ) -> Self {
        Self {
            gateway,
            source,
            pump_tx,
            state: PlaybackState::Idle,
            active: None,
            connection: None,
            stream: None,
            volume,
            generation: 0,
            stream_seq: 0,
            base_offset: 0,
            started_at: None,
            paused_at: None,
            paused_total: Duration::ZERO,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn active(&self) -> Option<&Listing> {
        self.active.as_ref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn volume(&self) -> f64 {
        self.volume
    }

    /// Whether an event tagged with `seq` belongs to the stream that is
    /// current right now.
    pub fn is_current_stream(&self, seq: u64) -> bool {
        seq == self.stream_seq
    }

    /// Seconds into the current track, excluding time spent paused.
    pub fn position_secs(&self) -> u64 {
        let Some(started) = self.started_at else {
            return self.active.as_ref().map(|l| l.offset_secs).unwrap_or(0);
        };
        let mut played = started.elapsed().saturating_sub(self.paused_total);
        if let Some(paused) = self.paused_at {
            played = played.saturating_sub(paused.elapsed());
        }
        self.base_offset + played.as_secs()
    }

    /// Starts playing if idle, otherwise appends to the queue without
    /// interrupting the current stream. This is what makes two
    /// concurrently resolved play requests safe: the second one becomes
    /// an enqueue, never an overwrite.
    pub async fn request_play(
        &mut self,
        listing: Listing,
        queue: &mut PlaybackQueue,
    ) -> Result<PlayOutcome, Error> {
        if self.active.is_none() && self.state == PlaybackState::Idle {
            // A fresh request that cannot start never entered the
            // machine; the caller reports the error and the listing is
            // not retired to history.
            self.start(listing).await.map_err(|(e, _)| e)?;
            Ok(PlayOutcome::Started)
        } else {
            queue.enqueue(listing);
            Ok(PlayOutcome::Enqueued(queue.pending_len()))
        }
    }

    /// The unified retire-and-promote transition. Invoked from stream
    /// finish, stream error and explicit skip alike. A no-op when both
    /// the active slot and the queue are already empty.
    pub async fn advance(
        &mut self,
        queue: &mut PlaybackQueue,
        cause: AdvanceCause,
    ) -> Option<&Listing> {
        let position = self.position_secs();
        if let Some(stream) = self.stream.take() {
            stream.stop();
        }
        self.stream_seq += 1;

        if let Some(mut listing) = self.active.take() {
            if cause == AdvanceCause::Finished && listing.body.step() {
                // A collection with another track: keep the listing
                // active and play its next entry.
                listing.offset_secs = 0;
                match self.start(listing).await {
                    Ok(()) => return self.active.as_ref(),
                    Err((e, lost)) => {
                        warn!("(PlaybackSession) could not continue '{}': {e}", lost.title());
                        queue.record_played(lost);
                    }
                }
            } else {
                let duration = listing.current_duration_secs();
                listing.offset_secs = match cause {
                    AdvanceCause::Finished => 0,
                    _ => position.min(duration.saturating_sub(1)),
                };
                queue.record_played(listing);
            }
        }

        loop {
            match queue.dequeue_next() {
                None => {
                    self.go_idle();
                    return None;
                }
                Some(next) => match self.start(next).await {
                    Ok(()) => return self.active.as_ref(),
                    Err((e, lost)) => {
                        warn!("(PlaybackSession) skipping '{}', could not start: {e}", lost.title());
                        queue.record_played(lost);
                    }
                },
            }
        }
    }

    /// Pauses the stream. Issued while already paused it toggles back
    /// to playing.
    pub fn pause(&mut self) -> Result<PlaybackState, Error> {
        match self.state {
            PlaybackState::Idle => Err(Error::UserInput("nothing is playing".into())),
            PlaybackState::Paused => self.resume(),
            PlaybackState::Playing => {
                if let Some(stream) = &self.stream {
                    stream.pause();
                }
                self.paused_at = Some(Instant::now());
                self.state = PlaybackState::Paused;
                Ok(self.state)
            }
        }
    }

    pub fn resume(&mut self) -> Result<PlaybackState, Error> {
        match self.state {
            PlaybackState::Idle => Err(Error::UserInput("nothing is playing".into())),
            PlaybackState::Playing => Err(Error::UserInput("already playing".into())),
            PlaybackState::Paused => {
                if let Some(paused) = self.paused_at.take() {
                    self.paused_total += paused.elapsed();
                }
                if let Some(stream) = &self.stream {
                    stream.resume();
                }
                self.state = PlaybackState::Playing;
                Ok(self.state)
            }
        }
    }

    /// Explicit skip: exactly the finish transition, triggered by a
    /// command instead of a stream event.
    pub async fn skip(&mut self, queue: &mut PlaybackQueue) -> Result<Option<&Listing>, Error> {
        if self.active.is_none() {
            return Err(Error::UserInput("nothing to skip".into()));
        }
        Ok(self.advance(queue, AdvanceCause::Skipped).await)
    }

    /// Restarts the active listing from the top by pushing it back to
    /// the queue head and re-running dequeue-and-start.
    pub async fn replay(&mut self, queue: &mut PlaybackQueue) -> Result<(), Error> {
        let mut listing = match self.active.take() {
            Some(l) => l,
            None => return Err(Error::UserInput("nothing is playing".into())),
        };
        if let Some(stream) = self.stream.take() {
            stream.stop();
        }
        self.stream_seq += 1;

        listing.offset_secs = 0;
        queue.push_front(listing);
        self.start_next(queue).await?;
        Ok(())
    }

    /// Brings the most recently played listing back to active play.
    /// The current listing, if any, goes back to the queue head with
    /// its position preserved; the restored listing gets a fresh
    /// manager snapshot from the channel's current occupants.
    pub async fn unskip(
        &mut self,
        queue: &mut PlaybackQueue,
        occupants: HashSet<String>,
    ) -> Result<(), Error> {
        let mut restored = queue
            .pop_history()
            .ok_or_else(|| Error::UserInput("playback history is empty".into()))?;

        let position = self.position_secs();
        if let Some(stream) = self.stream.take() {
            stream.stop();
        }
        self.stream_seq += 1;

        if let Some(mut current) = self.active.take() {
            let duration = current.current_duration_secs();
            current.offset_secs = position.min(duration.saturating_sub(1));
            queue.push_front(current);
        }

        restored.resnapshot_managers(occupants);
        queue.push_front(restored);
        self.start_next(queue).await?;
        Ok(())
    }

    /// Jumps within the active track. The target is the current
    /// position plus or minus `amount_secs`, clamped to `[0, duration -
    /// guard_secs]`; the listing then re-runs through the queue head
    /// like a replay, starting at the new offset. Returns the offset
    /// actually used.
    pub async fn seek(
        &mut self,
        amount_secs: u64,
        direction: SeekDirection,
        guard_secs: u64,
        queue: &mut PlaybackQueue,
    ) -> Result<u64, Error> {
        let position = self.position_secs();
        let mut listing = match self.active.take() {
            Some(l) => l,
            None => return Err(Error::UserInput("nothing is playing".into())),
        };
        if let Some(stream) = self.stream.take() {
            stream.stop();
        }
        self.stream_seq += 1;

        let delta = match direction {
            SeekDirection::Forward => amount_secs as i64,
            SeekDirection::Backward => -(amount_secs as i64),
        };
        let ceiling = listing.current_duration_secs().saturating_sub(guard_secs) as i64;
        let target = (position as i64 + delta).clamp(0, ceiling.max(0)) as u64;

        listing.offset_secs = target;
        queue.push_front(listing);
        self.start_next(queue).await?;
        Ok(target)
    }

    pub fn set_volume(&mut self, volume: f64) {
        self.volume = volume;
        if let Some(stream) = &self.stream {
            stream.set_volume(volume);
        }
    }

    /// Tears the whole session down in one non-suspending step: clears
    /// queue and history, drops the active listing, kills the stream,
    /// releases the voice connection and bumps the generation so any
    /// in-flight resolution or stream event is discarded on arrival.
    pub fn stop(&mut self, queue: &mut PlaybackQueue) {
        info!("(PlaybackSession) stop: clearing queue and leaving voice");
        queue.clear();
        self.active = None;
        if let Some(stream) = self.stream.take() {
            stream.stop();
        }
        if let Some(connection) = self.connection.take() {
            connection.leave();
        }
        self.generation += 1;
        self.stream_seq += 1;
        self.go_idle();
    }

    /// Acquires the voice connection if absent, opens the stream at the
    /// listing's offset and makes it the active one. On failure the
    /// listing comes back with the error so the caller decides where it
    /// goes; losing it here would leave it in none of active, pending
    /// or history.
    async fn start(&mut self, listing: Listing) -> Result<(), (Error, Listing)> {
        if self.connection.is_none() {
            match self.gateway.join().await {
                Ok(connection) => self.connection = Some(connection),
                Err(e) => return Err((e, listing)),
            }
        }

        let track = match listing.current_track().cloned() {
            Some(track) => track,
            None => {
                return Err((
                    Error::Resolution("listing has no playable track".into()),
                    listing,
                ))
            }
        };

        self.stream_seq += 1;
        let seq = self.stream_seq;
        let (tx, mut rx) = unbounded_channel::<StreamEvent>();
        let handle = match self
            .source
            .open(track.clone(), listing.offset_secs, self.volume, tx)
            .await
        {
            Ok(handle) => handle,
            Err(e) => return Err((e, listing)),
        };

        // Forward this stream's events into the pump, tagged with its
        // sequence number, the same way inbound platform events reach
        // the rest of the bot.
        let pump = self.pump_tx.clone();
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                if pump.send((seq, event)).is_err() {
                    break;
                }
            }
        });

        info!(
            "(PlaybackSession) now playing '{}' at {}s",
            track.title, listing.offset_secs
        );
        self.base_offset = listing.offset_secs;
        self.started_at = Some(Instant::now());
        self.paused_at = None;
        self.paused_total = Duration::ZERO;
        self.stream = Some(handle);
        self.active = Some(listing);
        self.state = PlaybackState::Playing;
        Ok(())
    }

    /// The shared tail of replay/seek/unskip: pull from the queue head
    /// and start, or go idle if starting fails or nothing is pending.
    /// A listing that fails to start was active a moment ago, so it
    /// retires to history rather than vanishing.
    async fn start_next(&mut self, queue: &mut PlaybackQueue) -> Result<(), Error> {
        match queue.dequeue_next() {
            Some(next) => match self.start(next).await {
                Ok(()) => Ok(()),
                Err((e, lost)) => {
                    queue.record_played(lost);
                    self.go_idle();
                    Err(e)
                }
            },
            None => {
                debug!("(PlaybackSession) queue exhausted, going idle");
                self.go_idle();
                Ok(())
            }
        }
    }

    fn go_idle(&mut self) {
        self.state = PlaybackState::Idle;
        self.base_offset = 0;
        self.started_at = None;
        self.paused_at = None;
        self.paused_total = Duration::ZERO;
    }
}
