use std::collections::HashSet;
use std::sync::Arc;

use tracing::debug;
use url::Url;

use tunebot_common::models::Listing;
use tunebot_common::traits::{Selection, SelectionPrompter, TrackSearcher};
use tunebot_common::Error;

use crate::music::config::MusicConfig;

/// Turns a free-text query or a direct link into a ready-to-queue
/// [`Listing`]. Resolution talks to the search backend and, when a
/// query is ambiguous, to the disambiguation prompt; it never touches
/// queue or session state.
pub struct TrackResolver {
    searcher: Arc<dyn TrackSearcher>,
    prompter: Arc<dyn SelectionPrompter>,
    max_results: usize,
    selection_timeout_secs: u64,
}

impl TrackResolver {
    pub fn new(
        searcher: Arc<dyn TrackSearcher>,
        prompter: Arc<dyn SelectionPrompter>,
        config: &MusicConfig,
    ) -> Self {
        Self {
            searcher,
            prompter,
            max_results: config.max_results,
            selection_timeout_secs: config.selection_timeout_secs,
        }
    }

    pub async fn resolve(
        &self,
        query: &str,
        requester_id: &str,
        present_members: HashSet<String>,
    ) -> Result<Listing, Error> {
        let query = query.trim();
        if query.is_empty() {
            return Err(Error::UserInput("give me something to search for".into()));
        }

        if let Some(link) = direct_link(query) {
            debug!("(TrackResolver) direct link => {link}");
            let track = self
                .searcher
                .fetch_by_url(link.as_str())
                .await
                .map_err(|e| Error::Resolution(format!("could not fetch track metadata: {e}")))?;
            return Ok(Listing::single(track, requester_id, present_members));
        }

        let mut candidates = self.searcher.search(query).await?;
        candidates.truncate(self.max_results);

        let track = match candidates.len() {
            0 => return Err(Error::Resolution(format!("no results for '{query}'"))),
            1 => candidates.remove(0),
            count => {
                let titles: Vec<String> = candidates.iter().map(|t| t.title.clone()).collect();
                let selection = self
                    .prompter
                    .choose_one(titles, requester_id, self.selection_timeout_secs)
                    .await?;
                match selection {
                    Selection::Chosen(index) if (1..=count).contains(&index) => {
                        candidates.remove(index - 1)
                    }
                    Selection::Chosen(index) => {
                        return Err(Error::Resolution(format!(
                            "selection {index} is out of range (1-{count})"
                        )));
                    }
                    Selection::TimedOut => {
                        return Err(Error::Resolution("selection timed out".into()));
                    }
                }
            }
        };

        debug!("(TrackResolver) '{query}' => '{}'", track.title);
        Ok(Listing::single(track, requester_id, present_members))
    }
}

/// A query counts as a direct link when it parses as an absolute
/// http(s) URL with a host. Anything else goes through search.
fn direct_link(query: &str) -> Option<Url> {
    let url = Url::parse(query).ok()?;
    match url.scheme() {
        "http" | "https" if url.host_str().is_some() => Some(url),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direct_link_detection() {
        assert!(direct_link("https://media.example/watch?v=abc").is_some());
        assert!(direct_link("http://media.example/abc").is_some());
        assert!(direct_link("lofi beats to study to").is_none());
        assert!(direct_link("ftp://media.example/abc").is_none());
    }
}
