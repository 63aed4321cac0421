// File: tunebot-common/src/models/mod.rs
pub mod listing;
pub mod track;

pub use listing::{Listing, ListingBody};
pub use track::{format_clock, Track};
