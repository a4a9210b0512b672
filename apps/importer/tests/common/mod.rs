//! Common test utilities for importer integration tests.
//!
//! Provides in-memory fakes for the clipboard, the remote note store and
//! the import recorder, plus a fast test configuration.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use clipcard_core::Card;
use clipcard_importer::clipboard::ClipboardSource;
use clipcard_importer::config::Config;
use clipcard_importer::importer::Importer;
use clipcard_importer::record::{ImportRecord, ImportRecorder};
use clipcard_importer::sink::{BackoffPolicy, CardSink};
use clipcard_importer::SinkError;

pub const MCQ: &str = "question: 2+2?\noptionA: 3\noptionB: 4\nanswer: B\nnote: basic";
pub const BULLET_MCQ: &str = "• question: Which planet is red?\n• options:\nA. Venus\nB. Earth\nC. Mars\nD. Jupiter\nanswer: C";
pub const MISSING_ANSWER: &str = "question: 2+2?\noptionA: 3\noptionB: 4\nnote: no answer line";

/// Clipboard whose content the test sets directly.
#[derive(Default)]
pub struct FakeClipboard {
    text: Mutex<Option<String>>,
    reads: AtomicUsize,
}

impl FakeClipboard {
    pub fn set(&self, text: &str) {
        *self.text.lock().unwrap() = Some(text.to_string());
    }

    pub fn clear(&self) {
        *self.text.lock().unwrap() = None;
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

impl ClipboardSource for FakeClipboard {
    fn read_text(&self) -> Option<String> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.text.lock().unwrap().clone()
    }
}

#[derive(Default)]
struct SinkState {
    notes: Vec<Card>,
    add_calls: usize,
    /// Errors returned by the next `add_note` calls, in order.
    failures: VecDeque<SinkError>,
    decks: Vec<String>,
    created_decks: Vec<String>,
    models: HashMap<String, Vec<String>>,
    unreachable: bool,
    /// Requests answered before the store starts refusing connections.
    refuse_after: Option<usize>,
    requests: usize,
    delay: Option<Duration>,
}

impl SinkState {
    fn connect(&mut self) -> Result<(), SinkError> {
        self.requests += 1;
        let exhausted = self.refuse_after.is_some_and(|n| self.requests > n);
        if self.unreachable || exhausted {
            Err(SinkError::Connection("connection refused".to_string()))
        } else {
            Ok(())
        }
    }
}

/// In-memory note store.
#[derive(Default)]
pub struct FakeSink {
    state: Mutex<SinkState>,
}

impl FakeSink {
    /// A store that already has the decks and models of `config`.
    pub fn for_config(config: &Config) -> Self {
        let sink = Self::default();
        {
            let mut state = sink.state.lock().unwrap();
            state.decks.push(config.deck.clone());
            state.models.insert(
                config.mcq_model.clone(),
                ["Question", "OptionA", "OptionB", "OptionC", "OptionD", "OptionE", "OptionF", "Answer", "Note"]
                    .map(String::from)
                    .to_vec(),
            );
            state
                .models
                .insert(config.basic_model.clone(), vec!["Front".into(), "Back".into()]);
        }
        sink
    }

    pub fn fail_next(&self, error: SinkError) {
        self.state.lock().unwrap().failures.push_back(error);
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.state.lock().unwrap().unreachable = unreachable;
    }

    /// Answer `requests` more requests, then refuse connections.
    pub fn refuse_after(&self, requests: usize) {
        let mut state = self.state.lock().unwrap();
        state.refuse_after = Some(state.requests + requests);
    }

    pub fn set_delay(&self, delay: Duration) {
        self.state.lock().unwrap().delay = Some(delay);
    }

    pub fn set_model(&self, model: &str, fields: &[&str]) {
        self.state
            .lock()
            .unwrap()
            .models
            .insert(model.to_string(), fields.iter().map(|f| f.to_string()).collect());
    }

    pub fn remove_model(&self, model: &str) {
        self.state.lock().unwrap().models.remove(model);
    }

    pub fn remove_deck(&self, deck: &str) {
        self.state.lock().unwrap().decks.retain(|d| d != deck);
    }

    pub fn notes(&self) -> Vec<Card> {
        self.state.lock().unwrap().notes.clone()
    }

    pub fn add_calls(&self) -> usize {
        self.state.lock().unwrap().add_calls
    }

    pub fn created_decks(&self) -> Vec<String> {
        self.state.lock().unwrap().created_decks.clone()
    }

    fn check_reachable(&self) -> Result<(), SinkError> {
        self.state.lock().unwrap().connect()
    }
}

#[async_trait]
impl CardSink for FakeSink {
    async fn add_note(&self, card: &Card) -> Result<i64, SinkError> {
        let delay = self.state.lock().unwrap().delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock().unwrap();
        state.add_calls += 1;
        state.connect()?;
        if let Some(error) = state.failures.pop_front() {
            return Err(error);
        }
        state.notes.push(card.clone());
        Ok(state.notes.len() as i64)
    }

    async fn deck_names(&self) -> Result<Vec<String>, SinkError> {
        self.check_reachable()?;
        Ok(self.state.lock().unwrap().decks.clone())
    }

    async fn model_names(&self) -> Result<Vec<String>, SinkError> {
        self.check_reachable()?;
        let mut names: Vec<String> = self.state.lock().unwrap().models.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn model_field_names(&self, model: &str) -> Result<Vec<String>, SinkError> {
        self.check_reachable()?;
        self.state
            .lock()
            .unwrap()
            .models
            .get(model)
            .cloned()
            .ok_or_else(|| SinkError::Remote(format!("model was not found: {model}")))
    }

    async fn create_deck(&self, deck: &str) -> Result<i64, SinkError> {
        self.check_reachable()?;
        let mut state = self.state.lock().unwrap();
        state.decks.push(deck.to_string());
        state.created_decks.push(deck.to_string());
        Ok(state.decks.len() as i64)
    }
}

/// Collects records in memory.
#[derive(Default)]
pub struct MemoryRecorder {
    records: Mutex<Vec<ImportRecord>>,
}

impl MemoryRecorder {
    pub fn records(&self) -> Vec<ImportRecord> {
        self.records.lock().unwrap().clone()
    }

    pub fn labels(&self) -> Vec<&'static str> {
        self.records().iter().map(|r| r.status.label()).collect()
    }
}

impl ImportRecorder for MemoryRecorder {
    fn record(&self, record: &ImportRecord) {
        self.records.lock().unwrap().push(record.clone());
    }
}

/// Fast timings for tests.
pub fn test_config() -> Config {
    Config {
        poll_interval: Duration::from_millis(10),
        clipboard_timeout: Duration::from_millis(500),
        sink_timeout: Duration::from_millis(200),
        backoff: BackoffPolicy {
            base: Duration::from_millis(100),
            max_delay: Duration::from_millis(400),
            max_failures: 3,
        },
        ..Config::default()
    }
}

pub struct Harness {
    pub importer: Importer,
    pub clipboard: Arc<FakeClipboard>,
    pub sink: Arc<FakeSink>,
    pub recorder: Arc<MemoryRecorder>,
}

pub fn harness(config: &Config) -> Harness {
    let clipboard = Arc::new(FakeClipboard::default());
    let sink = Arc::new(FakeSink::for_config(config));
    let recorder = Arc::new(MemoryRecorder::default());
    let importer = Importer::new(config, clipboard.clone(), sink.clone()).with_recorder(recorder.clone());
    Harness {
        importer,
        clipboard,
        sink,
        recorder,
    }
}
