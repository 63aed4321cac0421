// tests/support/mod.rs
//
// Scripted fakes for the collaborator traits, shared by the
// integration tests. They record every call so tests can assert on
// the exact stream/voice traffic a command produced.
#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::Notify;

use tunebot_common::models::Track;
use tunebot_common::traits::{
    Selection, SelectionPrompter, StreamEvent, StreamHandle, StreamSource, TrackSearcher,
    VoiceConnection, VoiceGateway,
};
use tunebot_common::Error;
use tunebot_core::music::GuildCollaborators;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_env_filter("debug").try_init();
}

pub fn track(title: &str, duration_secs: u64) -> Track {
    Track::new(title, format!("https://media.example/{title}"), duration_secs)
}

// ---------- Voice gateway ----------

#[derive(Default)]
pub struct FakeGateway {
    occupants: Mutex<HashSet<String>>,
    pub join_fails: AtomicBool,
    pub joins: AtomicUsize,
    pub leaves: Arc<AtomicUsize>,
}

impl FakeGateway {
    pub fn with_occupants(members: &[&str]) -> Arc<Self> {
        let gateway = Arc::new(Self::default());
        gateway.set_occupants(members);
        gateway
    }

    pub fn set_occupants(&self, members: &[&str]) {
        *self.occupants.lock().unwrap() = members.iter().map(|m| m.to_string()).collect();
    }
}

struct FakeConnection {
    leaves: Arc<AtomicUsize>,
}

impl VoiceConnection for FakeConnection {
    fn leave(&self) {
        self.leaves.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl VoiceGateway for FakeGateway {
    async fn join(&self) -> Result<Box<dyn VoiceConnection>, Error> {
        if self.join_fails.load(Ordering::SeqCst) {
            return Err(Error::Connection("cannot join voice".into()));
        }
        self.joins.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeConnection {
            leaves: self.leaves.clone(),
        }))
    }

    async fn current_occupants(&self) -> Result<HashSet<String>, Error> {
        Ok(self.occupants.lock().unwrap().clone())
    }

    async fn is_occupant(&self, member_id: &str) -> Result<bool, Error> {
        Ok(self.occupants.lock().unwrap().contains(member_id))
    }
}

// ---------- Stream source ----------

#[derive(Debug, Clone)]
pub struct OpenRecord {
    pub title: String,
    pub offset_secs: u64,
    pub volume: f64,
}

#[derive(Default)]
pub struct FakeStreamSource {
    opens: Mutex<Vec<OpenRecord>>,
    senders: Mutex<Vec<UnboundedSender<StreamEvent>>>,
    pub fail_next_open: AtomicBool,
    handle_calls: Arc<Mutex<Vec<String>>>,
}

impl FakeStreamSource {
    pub fn open_count(&self) -> usize {
        self.opens.lock().unwrap().len()
    }

    pub fn opens(&self) -> Vec<OpenRecord> {
        self.opens.lock().unwrap().clone()
    }

    pub fn last_open(&self) -> OpenRecord {
        self.opens.lock().unwrap().last().cloned().expect("no stream was opened")
    }

    pub fn handle_calls(&self) -> Vec<String> {
        self.handle_calls.lock().unwrap().clone()
    }

    /// Fires `Finished` on the most recently opened stream.
    pub fn finish_current(&self) {
        let senders = self.senders.lock().unwrap();
        let sender = senders.last().expect("no stream was opened");
        sender.send(StreamEvent::Finished).expect("event channel closed");
    }

    /// Fires `Failed` on the most recently opened stream.
    pub fn fail_current(&self, reason: &str) {
        let senders = self.senders.lock().unwrap();
        let sender = senders.last().expect("no stream was opened");
        sender
            .send(StreamEvent::Failed(reason.to_string()))
            .expect("event channel closed");
    }
}

struct FakeStreamHandle {
    calls: Arc<Mutex<Vec<String>>>,
}

impl StreamHandle for FakeStreamHandle {
    fn pause(&self) {
        self.calls.lock().unwrap().push("pause".into());
    }
    fn resume(&self) {
        self.calls.lock().unwrap().push("resume".into());
    }
    fn set_volume(&self, volume: f64) {
        self.calls.lock().unwrap().push(format!("set_volume:{volume}"));
    }
    fn stop(&self) {
        self.calls.lock().unwrap().push("stop".into());
    }
}

#[async_trait]
impl StreamSource for FakeStreamSource {
    async fn open(
        &self,
        track: Track,
        offset_secs: u64,
        volume: f64,
        events: UnboundedSender<StreamEvent>,
    ) -> Result<Box<dyn StreamHandle>, Error> {
        if self.fail_next_open.swap(false, Ordering::SeqCst) {
            return Err(Error::Stream("could not open stream".into()));
        }
        self.opens.lock().unwrap().push(OpenRecord {
            title: track.title.clone(),
            offset_secs,
            volume,
        });
        self.senders.lock().unwrap().push(events);
        Ok(Box::new(FakeStreamHandle {
            calls: self.handle_calls.clone(),
        }))
    }
}

// ---------- Search + disambiguation ----------

#[derive(Default)]
pub struct FakeSearcher {
    pub results: Mutex<Vec<Track>>,
    pub by_url: Mutex<Option<Track>>,
}

impl FakeSearcher {
    pub fn with_results(tracks: Vec<Track>) -> Arc<Self> {
        let searcher = Arc::new(Self::default());
        *searcher.results.lock().unwrap() = tracks;
        searcher
    }

    pub fn set_results(&self, tracks: Vec<Track>) {
        *self.results.lock().unwrap() = tracks;
    }
}

#[async_trait]
impl TrackSearcher for FakeSearcher {
    async fn search(&self, _query: &str) -> Result<Vec<Track>, Error> {
        Ok(self.results.lock().unwrap().clone())
    }

    async fn fetch_by_url(&self, _url: &str) -> Result<Track, Error> {
        self.by_url
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| Error::Resolution("no metadata for that link".into()))
    }
}

#[derive(Default)]
pub struct FakePrompter {
    pub selection: Mutex<Option<Selection>>,
    /// When set, `choose_one` parks until notified. Lets a test run
    /// other commands while a resolution is mid-flight.
    pub gate: Mutex<Option<Arc<Notify>>>,
}

impl FakePrompter {
    pub fn set_selection(&self, selection: Selection) {
        *self.selection.lock().unwrap() = Some(selection);
    }

    pub fn gate(&self) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        *self.gate.lock().unwrap() = Some(notify.clone());
        notify
    }
}

#[async_trait]
impl SelectionPrompter for FakePrompter {
    async fn choose_one(
        &self,
        _titles: Vec<String>,
        _requester_id: &str,
        _timeout_secs: u64,
    ) -> Result<Selection, Error> {
        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        Ok(self
            .selection
            .lock()
            .unwrap()
            .expect("FakePrompter::choose_one called without a scripted selection"))
    }
}

// ---------- Bundle ----------

#[derive(Clone)]
pub struct Collabs {
    pub searcher: Arc<FakeSearcher>,
    pub prompter: Arc<FakePrompter>,
    pub gateway: Arc<FakeGateway>,
    pub source: Arc<FakeStreamSource>,
}

impl Collabs {
    pub fn new(occupants: &[&str]) -> Self {
        Self {
            searcher: Arc::new(FakeSearcher::default()),
            prompter: Arc::new(FakePrompter::default()),
            gateway: FakeGateway::with_occupants(occupants),
            source: Arc::new(FakeStreamSource::default()),
        }
    }

    pub fn bundle(&self) -> GuildCollaborators {
        GuildCollaborators {
            searcher: self.searcher.clone(),
            prompter: self.prompter.clone(),
            gateway: self.gateway.clone(),
            source: self.source.clone(),
        }
    }
}
