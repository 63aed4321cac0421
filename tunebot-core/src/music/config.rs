use serde::Deserialize;

/// Tunables for the music controller. Every field has a sensible
/// default so an empty config section works out of the box.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MusicConfig {
    /// Search results offered for disambiguation.
    pub max_results: usize,
    /// How long the requester gets to pick a candidate.
    pub selection_timeout_secs: u64,
    /// Safety margin keeping seeks away from the very end of a track.
    pub guard_secs: u64,
    /// Upper bound for the volume command, in percent.
    pub max_volume_percent: u32,
    pub default_volume_percent: u32,
}

impl Default for MusicConfig {
    fn default() -> Self {
        Self {
            max_results: 10,
            selection_timeout_secs: 10,
            guard_secs: 5,
            max_volume_percent: 150,
            default_volume_percent: 100,
        }
    }
}

impl MusicConfig {
    /// Stream volume for a given percent value (100% == 1.0).
    pub fn volume_for_percent(percent: u32) -> f64 {
        percent as f64 / 100.0
    }
}
