//! The clipboard poll loop.

use chrono::Utc;
use clipcard_core::{
    fingerprint, parse, Classifier, ContentKind, DedupCache, FormatOptions, TemplateSet,
};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;

use crate::clipboard::{self, ClipboardSource};
use crate::config::Config;
use crate::error::ConfigError;
use crate::record::{ImportRecord, ImportRecorder, TracingRecorder};
use crate::sink::{CardSink, SinkAdapter, SinkHealth, SubmitOutcome};

/// Final status of one processed clip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ImportStatus {
    Created { note_id: i64 },
    DuplicateLocal,
    DuplicateRemote,
    /// No marker matched.
    Skipped,
    Invalid { reason: String },
    Failed { reason: String },
}

impl ImportStatus {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Created { .. } => "created",
            Self::DuplicateLocal => "duplicate_local",
            Self::DuplicateRemote => "duplicate_remote",
            Self::Skipped => "skipped",
            Self::Invalid { .. } => "invalid",
            Self::Failed { .. } => "failed",
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Invalid { reason } | Self::Failed { reason } => Some(reason),
            _ => None,
        }
    }
}

/// What a single tick did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    NoChange,
    Unavailable,
    BackingOff,
    Processed(ImportStatus),
}

/// Counters kept for the session summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportStats {
    pub ticks: u64,
    pub imported: u64,
    /// Distinct contents accepted (created or already in Anki).
    pub distinct: u64,
    pub duplicates_local: u64,
    pub duplicates_remote: u64,
    pub skipped: u64,
    pub invalid: u64,
    pub failed: u64,
}

/// Owns all loop state: last clipboard text, dedup cache, sink backoff.
pub struct Importer {
    clipboard: Arc<dyn ClipboardSource>,
    sink: SinkAdapter,
    classifier: Classifier,
    templates: TemplateSet,
    format: FormatOptions,
    cache: DedupCache,
    recorder: Arc<dyn ImportRecorder>,
    last_text: Option<String>,
    poll_interval: Duration,
    clipboard_timeout: Duration,
    heartbeat_ticks: u64,
    stats: ImportStats,
}

impl Importer {
    pub fn new(
        config: &Config,
        clipboard: Arc<dyn ClipboardSource>,
        sink: Arc<dyn CardSink>,
    ) -> Self {
        let max_age = config
            .cache_max_age
            .and_then(|age| chrono::Duration::from_std(age).ok());

        Self {
            clipboard,
            sink: SinkAdapter::new(sink, config.backoff, config.sink_timeout),
            classifier: config.classifier(),
            templates: config.templates(),
            format: config.format_options(),
            cache: DedupCache::new(config.cache_capacity, max_age),
            recorder: Arc::new(TracingRecorder),
            last_text: None,
            poll_interval: config.poll_interval,
            clipboard_timeout: config.clipboard_timeout,
            heartbeat_ticks: config.heartbeat_ticks,
            stats: ImportStats::default(),
        }
    }

    pub fn with_recorder(mut self, recorder: Arc<dyn ImportRecorder>) -> Self {
        self.recorder = recorder;
        self
    }

    pub fn stats(&self) -> ImportStats {
        self.stats
    }

    pub fn health(&self) -> SinkHealth {
        self.sink.health()
    }

    pub fn cache(&self) -> &DedupCache {
        &self.cache
    }

    /// Verify decks and models before the loop starts.
    pub async fn preflight(&mut self) -> Result<(), ConfigError> {
        self.sink.preflight(&self.templates).await
    }

    /// Poll until `shutdown` resolves, then return the session counters.
    ///
    /// A tick in progress always finishes before shutdown is observed.
    pub async fn run(&mut self, shutdown: impl Future<Output = ()>) -> ImportStats {
        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        tracing::info!(
            poll_ms = self.poll_interval.as_millis() as u64,
            kinds = ?self.templates.iter().map(|t| t.kind).collect::<Vec<_>>(),
            "Watching clipboard, press Ctrl+C to stop"
        );

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                _ = interval.tick() => {
                    self.tick().await;
                }
            }
        }

        tracing::info!(
            imported = self.stats.imported,
            distinct = self.stats.distinct,
            ticks = self.stats.ticks,
            "Stopped watching clipboard"
        );
        self.stats
    }

    /// Run one poll cycle.
    pub async fn tick(&mut self) -> TickOutcome {
        self.stats.ticks += 1;

        let expired = self.cache.sweep(Utc::now());
        if expired > 0 {
            tracing::debug!(expired, "Swept expired fingerprints");
        }
        if self.heartbeat_ticks > 0 && self.stats.ticks % self.heartbeat_ticks == 0 {
            tracing::debug!(
                ticks = self.stats.ticks,
                imported = self.stats.imported,
                cached = self.cache.len(),
                "Still watching"
            );
        }

        if let Some(wait) = self.sink.retry_in() {
            tracing::trace!(wait_ms = wait.as_millis() as u64, "Backing off, clipboard not read");
            return TickOutcome::BackingOff;
        }

        let Some(text) =
            clipboard::read_with_timeout(self.clipboard.clone(), self.clipboard_timeout).await
        else {
            tracing::debug!("Clipboard unavailable");
            return TickOutcome::Unavailable;
        };

        if text.trim().is_empty() || self.last_text.as_deref() == Some(text.as_str()) {
            return TickOutcome::NoChange;
        }
        self.last_text = Some(text.clone());

        TickOutcome::Processed(self.process(&text).await)
    }

    /// Run one clip through classify, parse, build, dedup and submit.
    pub async fn process(&mut self, text: &str) -> ImportStatus {
        let Some(kind) = self.classifier.classify(text) else {
            tracing::debug!(len = text.len(), "Clipboard changed, no card markers");
            return self.finish(&fingerprint(text), None, ImportStatus::Skipped);
        };

        let parsed = match parse(kind, text) {
            Ok(parsed) => parsed,
            Err(err) => {
                tracing::warn!(%kind, error = %err, "Could not parse clip");
                let status = ImportStatus::Invalid {
                    reason: err.to_string(),
                };
                return self.finish(&fingerprint(text), Some(kind), status);
            }
        };
        let hash = parsed.fingerprint.clone();

        let card = match self.templates.build(&parsed, &self.format) {
            Ok(card) => card,
            Err(err) => {
                tracing::warn!(%kind, error = %err, "Could not build card");
                let status = ImportStatus::Invalid {
                    reason: err.to_string(),
                };
                return self.finish(&hash, Some(kind), status);
            }
        };

        if self.cache.seen(&hash) {
            tracing::info!(%kind, "Already imported this session, skipping");
            return self.finish(&hash, Some(kind), ImportStatus::DuplicateLocal);
        }

        let status = match self.sink.submit(&card).await {
            SubmitOutcome::Created(note_id) => {
                tracing::info!(%kind, note_id, total = self.stats.imported + 1, "Imported card");
                self.accept(&hash);
                ImportStatus::Created { note_id }
            }
            SubmitOutcome::DuplicateRejectedByRemote => {
                tracing::info!(%kind, "Anki already has this note");
                self.accept(&hash);
                ImportStatus::DuplicateRemote
            }
            SubmitOutcome::Failed(failure, reason) => {
                tracing::warn!(%kind, ?failure, %reason, "Import failed");
                ImportStatus::Failed { reason }
            }
        };
        self.finish(&hash, Some(kind), status)
    }

    fn accept(&mut self, hash: &str) {
        if !self.cache.seen(hash) {
            self.stats.distinct += 1;
        }
        self.cache.record(hash);
    }

    fn finish(&mut self, hash: &str, kind: Option<ContentKind>, status: ImportStatus) -> ImportStatus {
        match &status {
            ImportStatus::Created { .. } => self.stats.imported += 1,
            ImportStatus::DuplicateLocal => self.stats.duplicates_local += 1,
            ImportStatus::DuplicateRemote => self.stats.duplicates_remote += 1,
            ImportStatus::Skipped => self.stats.skipped += 1,
            ImportStatus::Invalid { .. } => self.stats.invalid += 1,
            ImportStatus::Failed { .. } => self.stats.failed += 1,
        }
        self.recorder
            .record(&ImportRecord::new(hash, kind, status.clone()));
        status
    }
}
