use serde::{Deserialize, Serialize};

/// Immutable metadata for one playable audio item. Built once by the
/// resolver and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub title: String,
    pub source_url: String,
    pub duration_secs: u64,
}

impl Track {
    pub fn new(title: impl Into<String>, source_url: impl Into<String>, duration_secs: u64) -> Self {
        Self {
            title: title.into(),
            source_url: source_url.into(),
            duration_secs,
        }
    }

    /// `m:ss` rendering of the track length, for queue displays.
    pub fn duration_clock(&self) -> String {
        format_clock(self.duration_secs)
    }
}

/// Renders a second count as `m:ss` (or `h:mm:ss` past the hour mark).
pub fn format_clock(secs: u64) -> String {
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{h}:{m:02}:{s:02}")
    } else {
        format!("{m}:{s:02}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_formatting() {
        assert_eq!(format_clock(0), "0:00");
        assert_eq!(format_clock(65), "1:05");
        assert_eq!(format_clock(3600), "1:00:00");
        assert_eq!(format_clock(3725), "1:02:05");
    }
}
