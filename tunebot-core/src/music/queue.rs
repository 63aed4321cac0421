use std::collections::VecDeque;

use tunebot_common::models::Listing;
use tunebot_common::Error;

/// Pending listings in play order plus a history stack of everything
/// that has already been active. Listings move between the two (and
/// the session's active slot) by value; nothing is ever duplicated, so
/// a listing lives in exactly one place at a time.
#[derive(Debug, Default)]
pub struct PlaybackQueue {
    pending: VecDeque<Listing>,
    history: Vec<Listing>,
}

impl PlaybackQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends to the tail of the pending queue.
    pub fn enqueue(&mut self, listing: Listing) {
        self.pending.push_back(listing);
    }

    /// Pops the next listing to play, if any.
    pub fn dequeue_next(&mut self) -> Option<Listing> {
        self.pending.pop_front()
    }

    /// Reinserts a listing at the head of the queue. Replay, seek and
    /// unskip use this so the re-run goes through the normal
    /// dequeue-and-start path.
    pub fn push_front(&mut self, listing: Listing) {
        self.pending.push_front(listing);
    }

    /// Records a listing that has stopped being active. Called exactly
    /// once per listing, whether it finished, errored or was skipped.
    pub fn record_played(&mut self, listing: Listing) {
        self.history.push(listing);
    }

    /// Pops the most recently played listing off the history stack.
    pub fn pop_history(&mut self) -> Option<Listing> {
        self.history.pop()
    }

    /// Removes the listing at a 1-based queue position.
    pub fn remove_at(&mut self, index: usize) -> Result<Listing, Error> {
        if index == 0 || index > self.pending.len() {
            return Err(Error::UserInput(format!(
                "queue position {index} is out of range (the queue has {} items)",
                self.pending.len()
            )));
        }
        self.pending
            .remove(index - 1)
            .ok_or_else(|| Error::UserInput(format!("queue position {index} is out of range")))
    }

    /// 1-based position of the first pending listing whose title
    /// contains `text`, case-insensitively.
    pub fn find_by_title_substring(&self, text: &str) -> Option<usize> {
        let needle = text.to_lowercase();
        self.pending
            .iter()
            .position(|l| l.title().to_lowercase().contains(&needle))
            .map(|i| i + 1)
    }

    /// Pending listing at a 1-based position, without removing it.
    pub fn peek_at(&self, index: usize) -> Option<&Listing> {
        self.pending.get(index.checked_sub(1)?)
    }

    pub fn pending(&self) -> impl Iterator<Item = &Listing> {
        self.pending.iter()
    }

    /// History, most recently played last.
    pub fn history(&self) -> impl Iterator<Item = &Listing> {
        self.history.iter()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Drops everything, pending and history. Used by stop.
    pub fn clear(&mut self) {
        self.pending.clear();
        self.history.clear();
    }
}
