// File: tunebot-common/src/traits/mod.rs
pub mod music_traits;

pub use music_traits::{
    Selection, SelectionPrompter, StreamEvent, StreamHandle, StreamSource, TrackSearcher,
    VoiceConnection, VoiceGateway,
};
