use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::track::Track;

/// What a listing actually wraps: one track, or an ordered collection
/// of tracks played through in sequence. The tag replaces runtime
/// type-sniffing; everything downstream dispatches on this enum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ListingBody {
    Single(Track),
    Collection {
        name: String,
        tracks: Vec<Track>,
        current: usize,
    },
}

impl ListingBody {
    /// The track that plays (or would play) right now. `None` only for
    /// an empty or exhausted collection.
    pub fn current_track(&self) -> Option<&Track> {
        match self {
            ListingBody::Single(track) => Some(track),
            ListingBody::Collection { tracks, current, .. } => tracks.get(*current),
        }
    }

    /// Steps a collection to its next track. Returns `true` if another
    /// track is now current; a `Single` body never has a next track.
    pub fn step(&mut self) -> bool {
        match self {
            ListingBody::Single(_) => false,
            ListingBody::Collection { tracks, current, .. } => {
                if *current + 1 < tracks.len() {
                    *current += 1;
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Display title: the track title, or the collection name.
    pub fn title(&self) -> &str {
        match self {
            ListingBody::Single(track) => &track.title,
            ListingBody::Collection { name, .. } => name,
        }
    }
}

/// A queued or currently-playing unit: one body plus the members who
/// may manage it. The manager set is a snapshot of the voice channel's
/// occupants at request time and is re-snapshotted only when the
/// listing is pulled back out of history by unskip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub id: Uuid,
    pub body: ListingBody,
    /// Seconds into the current track. 0 for a listing that has never
    /// played; always below the track duration once it has.
    pub offset_secs: u64,
    pub authorized_managers: HashSet<String>,
    pub requested_by: String,
    pub requested_at: DateTime<Utc>,
}

impl Listing {
    pub fn single(track: Track, requested_by: impl Into<String>, managers: HashSet<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            body: ListingBody::Single(track),
            offset_secs: 0,
            authorized_managers: managers,
            requested_by: requested_by.into(),
            requested_at: Utc::now(),
        }
    }

    pub fn collection(
        name: impl Into<String>,
        tracks: Vec<Track>,
        requested_by: impl Into<String>,
        managers: HashSet<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            body: ListingBody::Collection {
                name: name.into(),
                tracks,
                current: 0,
            },
            offset_secs: 0,
            authorized_managers: managers,
            requested_by: requested_by.into(),
            requested_at: Utc::now(),
        }
    }

    pub fn current_track(&self) -> Option<&Track> {
        self.body.current_track()
    }

    pub fn title(&self) -> &str {
        self.body.title()
    }

    /// Duration of the track that is current right now.
    pub fn current_duration_secs(&self) -> u64 {
        self.current_track().map(|t| t.duration_secs).unwrap_or(0)
    }

    /// Called only on the unskip path, when a listing returns to active
    /// play from history.
    pub fn resnapshot_managers(&mut self, occupants: HashSet<String>) {
        self.authorized_managers = occupants;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(title: &str) -> Track {
        Track::new(title, format!("https://media.example/{title}"), 180)
    }

    #[test]
    fn single_never_steps() {
        let mut body = ListingBody::Single(track("a"));
        assert!(!body.step());
        assert_eq!(body.current_track().unwrap().title, "a");
    }

    #[test]
    fn collection_steps_until_exhausted() {
        let mut body = ListingBody::Collection {
            name: "mix".into(),
            tracks: vec![track("a"), track("b")],
            current: 0,
        };
        assert_eq!(body.current_track().unwrap().title, "a");
        assert!(body.step());
        assert_eq!(body.current_track().unwrap().title, "b");
        assert!(!body.step());
        assert_eq!(body.current_track().unwrap().title, "b");
    }

    #[test]
    fn fresh_listing_starts_at_zero() {
        let listing = Listing::single(track("a"), "user-1", HashSet::new());
        assert_eq!(listing.offset_secs, 0);
        assert_eq!(listing.title(), "a");
    }
}
