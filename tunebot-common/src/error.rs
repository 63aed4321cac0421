// ================================================================
// File: tunebot-common/src/error.rs
// ================================================================

use thiserror::Error;

/// Shared error type for the bot. Every variant here is expected to be
/// caught at a command boundary and turned into a single user-visible
/// line; nothing in this enum should escape as an uncaught fault.
#[derive(Debug, Error)]
pub enum Error {
    /// Bad input from the command issuer: empty query, out-of-range
    /// index, not-a-number, volume outside the allowed range.
    #[error("Invalid input: {0}")]
    UserInput(String),

    /// The issuer is not allowed to perform this action (wrong voice
    /// channel, or not one of the listing's authorized managers).
    #[error("Not permitted: {0}")]
    Permission(String),

    /// A query could not be turned into a playable track: no results,
    /// selection timed out or was invalid, metadata fetch failed.
    #[error("Resolution failed: {0}")]
    Resolution(String),

    /// Playback failure mid-track. Recovered by advancing the queue;
    /// reported as informational.
    #[error("Stream error: {0}")]
    Stream(String),

    /// Could not join the voice channel.
    #[error("Voice connection error: {0}")]
    Connection(String),

    /// Anything the chat platform or an external collaborator throws
    /// at us that does not fit a variant above.
    #[error("Platform error: {0}")]
    Platform(String),
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Platform(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Platform(s.to_string())
    }
}
